use std::collections::HashMap;

use crate::document::{DocumentFormat, MediaItem, Reassembled};
use crate::errors::DocumentError;

/// A bare PNG or JPEG picture
///
/// Pictures have no text units of their own. The OCR overlay contributes
/// line units and hands back the redrawn picture as a media override.
#[derive(Debug)]
pub struct PictureDocument {
    name: String,
    bytes: Vec<u8>,
    format: DocumentFormat,
}

impl PictureDocument {
    pub fn open(file_name: &str, bytes: Vec<u8>, format: DocumentFormat) -> Result<Self, DocumentError> {
        let detected = image::guess_format(&bytes)
            .map_err(|e| DocumentError::Decode(format!("{}: {}", file_name, e)))?;
        let expected = match format {
            DocumentFormat::Png => image::ImageFormat::Png,
            DocumentFormat::Jpeg => image::ImageFormat::Jpeg,
            other => return Err(DocumentError::UnsupportedFormat(format!(".{}", other.extension()))),
        };
        if detected != expected {
            return Err(DocumentError::Decode(format!(
                "{} is a {:?} picture, expected {:?}",
                file_name, detected, expected
            )));
        }

        Ok(Self { name: file_name.to_string(), bytes, format })
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn media(&self) -> MediaItem {
        MediaItem { name: self.name.clone(), bytes: self.bytes.clone() }
    }

    /// The redrawn picture if the overlay produced one, else the original
    pub fn reassemble(mut self, mut media_overrides: HashMap<String, Vec<u8>>) -> Reassembled {
        if let Some(redrawn) = media_overrides.remove(&self.name) {
            self.bytes = redrawn;
        }
        Reassembled::Native(self.bytes)
    }
}
