/*!
 * Scripted text detector
 *
 * Returns the same regions for every picture, or fails, without any network
 * access. Calls are counted so tests can check which pictures were scanned.
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use doctran::errors::OcrError;
use doctran::ocr::overlay::OverlaySettings;
use doctran::ocr::{BoundingBox, OcrEngine, OcrOverlay, TextRegion};

#[derive(Debug, Clone)]
pub struct MockOcrEngine {
    regions: Vec<TextRegion>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockOcrEngine {
    /// Detector reporting `regions` for every picture
    pub fn with_regions(regions: Vec<TextRegion>) -> Self {
        Self { regions, fail: false, calls: Arc::new(AtomicUsize::new(0)) }
    }

    /// Detector whose every call fails
    pub fn failing() -> Self {
        Self { regions: Vec::new(), fail: true, calls: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// One confident word at the given box
pub fn region(text: &str, x: u32, y: u32, width: u32, height: u32) -> TextRegion {
    TextRegion {
        text: text.to_string(),
        confidence: 0.95,
        bbox: BoundingBox::new(x, y, width, height),
    }
}

/// Overlay around `engine`, or None when the machine has no usable font
pub fn overlay_with(engine: MockOcrEngine) -> Option<OcrOverlay> {
    let font = OcrOverlay::load_font(None).ok()?;
    Some(OcrOverlay::new(Arc::new(engine), font, OverlaySettings::default()))
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn detect(&self, _image: &[u8], _languages: &[String]) -> Result<Vec<TextRegion>, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OcrError::Detection("simulated detector outage".to_string()));
        }
        Ok(self.regions.clone())
    }

    fn name(&self) -> &str {
        "mock-ocr"
    }
}
