/*!
 * Document model for translation.
 *
 * A document is opened into a `DocumentHandle`, which owns the decoded source
 * and the ordered `TranslatableUnit`s extracted from it. After translation the
 * handle is consumed by `reassemble`, which writes the translated strings back
 * into the original structure or produces a plain-text fallback when the
 * rebuilt document does not validate.
 *
 * Format strategies:
 * - `text`: paragraphs and sentence-bounded chunks
 * - `docx`: paragraphs with run-length vectors (OOXML)
 * - `xlsx`: string cells (OOXML)
 * - `pdf`: page groups, re-rendered as a flat document
 * - `picture`: no text units of its own; OCR lines are added by the pipeline
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::warn;

use crate::errors::DocumentError;
use crate::file_utils::FileManager;

pub mod sanitize;
pub mod package;
pub mod text;
pub mod docx;
pub mod xlsx;
pub mod pdf;
pub mod picture;

pub use sanitize::sanitize_text;

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// Plain UTF-8 text
    Text,
    /// Word document (OOXML)
    Docx,
    /// Excel workbook (OOXML)
    Xlsx,
    /// Portable Document Format
    Pdf,
    /// PNG picture (OCR only)
    Png,
    /// JPEG picture (OCR only)
    Jpeg,
}

impl DocumentFormat {
    /// Resolve the format from a file name
    ///
    /// Pictures are only accepted when the OCR overlay is available for the job.
    pub fn from_file_name(file_name: &str, ocr_available: bool) -> Result<Self, DocumentError> {
        let extension = FileManager::extension_of(file_name)
            .ok_or_else(|| DocumentError::UnsupportedFormat(format!("{} has no extension", file_name)))?;

        match extension.as_str() {
            "txt" => Ok(Self::Text),
            "docx" => Ok(Self::Docx),
            "xlsx" => Ok(Self::Xlsx),
            "pdf" => Ok(Self::Pdf),
            "png" if ocr_available => Ok(Self::Png),
            "jpg" | "jpeg" if ocr_available => Ok(Self::Jpeg),
            "png" | "jpg" | "jpeg" => Err(DocumentError::UnsupportedFormat(format!(
                ".{} (pictures require the OCR overlay)",
                extension
            ))),
            other => Err(DocumentError::UnsupportedFormat(format!(".{}", other))),
        }
    }

    /// Canonical extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// Whether the format is a bare picture
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }
}

/// Where a unit's translation goes back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitPosition {
    /// A `w:p` paragraph of an OOXML part, with the character length of each run
    Paragraph {
        part: String,
        index: usize,
        run_lengths: Vec<usize>,
    },
    /// A string cell of a worksheet
    Cell {
        part: String,
        sheet: String,
        reference: String,
    },
    /// A run of consecutive PDF pages (zero-based)
    Pages { first: usize, count: usize },
    /// One chunk of a plain-text paragraph
    Chunk { paragraph: usize, chunk: usize },
    /// One detected text line of a picture
    ImageLine { media: String, region: usize },
}

/// The atomic piece of text sent to the translator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatableUnit {
    /// Source text, never blank
    pub text: String,
    /// Locator used during reassembly
    pub position: UnitPosition,
}

impl TranslatableUnit {
    pub fn new(text: impl Into<String>, position: UnitPosition) -> Self {
        Self { text: text.into(), position }
    }
}

/// Extraction settings
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Upper bound on characters per unit (plain text and PDF)
    pub max_chars_per_unit: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { max_chars_per_unit: 3000 }
    }
}

/// Reassembly settings
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Rebuild PDFs as PDF; when false a text fallback is written
    pub render_pdf: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { render_pdf: true }
    }
}

/// A picture embedded in (or equal to) a document
#[derive(Debug, Clone)]
pub struct MediaItem {
    /// Package path, or the file name for bare pictures
    pub name: String,
    /// Encoded picture
    pub bytes: Vec<u8>,
}

/// Result of reassembly before it is written out
#[derive(Debug)]
pub enum Reassembled {
    /// The document in its original format
    Native(Vec<u8>),
    /// A plain-text stand-in, with the reason the original format was abandoned
    Fallback { text: String, detail: String },
}

/// Where the output went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassemblyOutcome {
    /// Written file
    pub path: PathBuf,
    /// Set when a plain-text fallback replaced the original format
    pub fallback_reason: Option<String>,
}

impl Reassembled {
    /// Write to `intended_path`, or to its `.txt` sibling for a fallback
    pub fn write_to(self, intended_path: &Path) -> Result<ReassemblyOutcome, DocumentError> {
        let write = |path: &Path, bytes: &[u8]| {
            FileManager::write_atomic(path, bytes)
                .map_err(|e| DocumentError::Io(std::io::Error::other(format!("{:#}", e))))
        };

        match self {
            Self::Native(bytes) => {
                write(intended_path, &bytes)?;
                Ok(ReassemblyOutcome { path: intended_path.to_path_buf(), fallback_reason: None })
            }
            Self::Fallback { text, detail } => {
                let path = FileManager::fallback_path(intended_path);
                write(&path, text.as_bytes())?;
                let original_ext = intended_path
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                    .unwrap_or_default();
                let reason = format!("Output changed from {} to .txt: {}", original_ext, detail);
                warn!("Fallback applied for {:?}: {}", intended_path, detail);
                Ok(ReassemblyOutcome { path, fallback_reason: Some(reason) })
            }
        }
    }
}

/// An opened document, owned by exactly one pipeline run
#[derive(Debug)]
pub enum DocumentHandle {
    Text(text::TextDocument),
    Docx(docx::DocxDocument),
    Xlsx(xlsx::XlsxDocument),
    Pdf(pdf::PdfDocument),
    Image(picture::PictureDocument),
}

impl DocumentHandle {
    /// Decode a document and extract its units
    pub fn open(
        format: DocumentFormat,
        file_name: &str,
        bytes: Vec<u8>,
        options: &ExtractOptions,
    ) -> Result<Self, DocumentError> {
        Ok(match format {
            DocumentFormat::Text => Self::Text(text::TextDocument::open(&bytes, options)?),
            DocumentFormat::Docx => Self::Docx(docx::DocxDocument::open(&bytes)?),
            DocumentFormat::Xlsx => Self::Xlsx(xlsx::XlsxDocument::open(&bytes)?),
            DocumentFormat::Pdf => Self::Pdf(pdf::PdfDocument::open(&bytes, options)?),
            DocumentFormat::Png | DocumentFormat::Jpeg => {
                Self::Image(picture::PictureDocument::open(file_name, bytes, format)?)
            }
        })
    }

    /// Format of the opened document
    pub fn format(&self) -> DocumentFormat {
        match self {
            Self::Text(_) => DocumentFormat::Text,
            Self::Docx(_) => DocumentFormat::Docx,
            Self::Xlsx(_) => DocumentFormat::Xlsx,
            Self::Pdf(_) => DocumentFormat::Pdf,
            Self::Image(doc) => doc.format(),
        }
    }

    /// Units in extraction order
    pub fn units(&self) -> &[TranslatableUnit] {
        match self {
            Self::Text(doc) => doc.units(),
            Self::Docx(doc) => doc.units(),
            Self::Xlsx(doc) => doc.units(),
            Self::Pdf(doc) => doc.units(),
            Self::Image(_) => &[],
        }
    }

    /// Pictures the OCR overlay may rewrite
    pub fn media(&self) -> Vec<MediaItem> {
        match self {
            Self::Docx(doc) => doc.media(),
            Self::Xlsx(doc) => doc.media(),
            Self::Image(doc) => vec![doc.media()],
            Self::Text(_) | Self::Pdf(_) => Vec::new(),
        }
    }

    /// Write translations back into the document
    ///
    /// `translations` must line up one-to-one with `units()`. Every string is
    /// sanitized before it reaches a format writer. `media_overrides` replaces
    /// pictures by name.
    pub fn reassemble(
        self,
        translations: Vec<String>,
        media_overrides: HashMap<String, Vec<u8>>,
        options: &RenderOptions,
    ) -> Result<Reassembled, DocumentError> {
        let expected = self.units().len();
        if translations.len() != expected {
            return Err(DocumentError::UnitMismatch { expected, actual: translations.len() });
        }
        let translations: Vec<String> = translations.iter().map(|t| sanitize_text(t)).collect();

        match self {
            Self::Text(doc) => doc.reassemble(&translations),
            Self::Docx(doc) => doc.reassemble(&translations, &media_overrides),
            Self::Xlsx(doc) => doc.reassemble(&translations, &media_overrides),
            Self::Pdf(doc) => doc.reassemble(&translations, options),
            Self::Image(doc) => Ok(doc.reassemble(media_overrides)),
        }
    }
}
