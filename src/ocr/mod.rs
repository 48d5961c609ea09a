/*!
 * OCR overlay for pictures.
 *
 * Pictures (bare PNG/JPEG inputs and media embedded in DOCX/XLSX) go through:
 * 1. text-region detection by an `OcrEngine`
 * 2. confidence filtering, IoU de-duplication and line grouping (`regions`)
 * 3. translation of each line as an ordinary unit, through the same executor
 *    as document text
 * 4. erasing the source text (inpainting or a solid patch) and drawing the
 *    translation at the largest size that fits the line box (`layout`, `overlay`)
 *
 * The overlay never touches document structure; redrawn pictures are handed
 * back to reassembly as media overrides.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::OcrError;

pub mod regions;
pub mod layout;
pub mod overlay;
pub mod remote;

pub use overlay::{OcrOverlay, OverlayPlan};
pub use remote::RemoteOcrEngine;

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Vertical center, doubled to stay in integers
    pub fn center_y2(&self) -> u64 {
        self.y as u64 * 2 + self.height as u64
    }

    pub fn intersection(&self, other: &BoundingBox) -> u64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return 0;
        }
        (right - left) as u64 * (bottom - top) as u64
    }

    /// Intersection over union, 0.0 when either box is empty
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let intersection = self.intersection(other);
        let union = self.area() + other.area() - intersection;
        if union == 0 {
            return 0.0;
        }
        intersection as f32 / union as f32
    }

    /// Smallest box containing both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        BoundingBox {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Clip to an image of the given size
    pub fn clamp_to(&self, width: u32, height: u32) -> BoundingBox {
        let x = self.x.min(width);
        let y = self.y.min(height);
        BoundingBox {
            x,
            y,
            width: self.right().min(width) - x,
            height: self.bottom().min(height) - y,
        }
    }
}

/// One detection as reported by an engine (a word or a line fragment)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Detections merged into one line of text
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Text detector
#[async_trait]
pub trait OcrEngine: Send + Sync + Debug {
    /// Detect text regions in an encoded PNG or JPEG
    async fn detect(&self, image: &[u8], languages: &[String]) -> Result<Vec<TextRegion>, OcrError>;

    fn name(&self) -> &str;
}
