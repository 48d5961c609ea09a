/*!
 * Error types for the doctran library.
 *
 * Provider failures carry an explicit classification (`ErrorClass`) so that the
 * retry and fail-fast decisions in the executor never depend on message text.
 * Document and pipeline errors are kept separate so callers can tell a corrupt
 * upload apart from an exhausted provider quota.
 */

use thiserror::Error;

/// How the executor must react to a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Quota or credit exhausted; the whole job must stop
    RateLimited,
    /// Timeout or connection trouble; worth retrying with backoff
    Transient,
    /// Anything else; the unit keeps its original text
    Permanent,
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Error related to rate limiting or exhausted credit
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The request itself was unusable (missing target language, unsupported pair)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No provider is configured for the requested translation
    #[error("Translator is not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Classify this error for retry and abort decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RateLimitExceeded(_) => ErrorClass::RateLimited,
            Self::ApiError { status_code, message } => {
                match classify_status(*status_code) {
                    ErrorClass::Permanent => classify_message(message),
                    class => class,
                }
            }
            Self::ConnectionError(_) | Self::Timeout(_) => ErrorClass::Transient,
            Self::RequestFailed(message) => classify_message(message),
            Self::ParseError(_)
            | Self::AuthenticationError(_)
            | Self::InvalidRequest(_)
            | Self::NotConfigured(_) => ErrorClass::Permanent,
        }
    }

    /// Build an error from an HTTP status and response body
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            402 | 429 => Self::RateLimitExceeded(format!("{} - {}", status_code, message)),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if let Some(status) = error.status() {
            Self::from_status(status.as_u16(), error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Classify an HTTP status code
pub fn classify_status(status_code: u16) -> ErrorClass {
    match status_code {
        402 | 429 => ErrorClass::RateLimited,
        408 | 500..=599 => ErrorClass::Transient,
        _ => ErrorClass::Permanent,
    }
}

/// Classify a provider message when nothing but text is available.
///
/// This is the only place that looks at message contents. Providers that
/// expose status codes should build their errors with `ProviderError::from_status`.
pub fn classify_message(message: &str) -> ErrorClass {
    const RATE_LIMITED: [&str; 7] = [
        "rate limit", "rate_limit", "quota", "credit", "insufficient", "429", "402",
    ];
    const TRANSIENT: [&str; 6] = [
        "timeout", "timed out", "connection", "temporarily", "unavailable", "503",
    ];

    let lowered = message.to_lowercase();
    if RATE_LIMITED.iter().any(|needle| lowered.contains(needle)) {
        ErrorClass::RateLimited
    } else if TRANSIENT.iter().any(|needle| lowered.contains(needle)) {
        ErrorClass::Transient
    } else {
        ErrorClass::Permanent
    }
}

/// Errors raised while decoding or rebuilding a document
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The file extension is not one of the supported formats
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// The document could not be read or parsed
    #[error("Failed to decode document: {0}")]
    Decode(String),

    /// The rebuilt document did not pass validation
    #[error("Reassembly validation failed: {0}")]
    ReassemblyValidationFailed(String),

    /// The rebuilt document could not be rendered
    #[error("Failed to render document: {0}")]
    Render(String),

    /// Translations do not line up with the extracted units
    #[error("Translation count mismatch: expected {expected}, got {actual}")]
    UnitMismatch {
        /// Number of extracted units
        expected: usize,
        /// Number of translations supplied
        actual: usize,
    },

    /// Error from a file operation
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for DocumentError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::Decode(format!("zip: {}", error))
    }
}

/// Errors raised by the OCR overlay
#[derive(Error, Debug)]
pub enum OcrError {
    /// The OCR engine failed to analyse an image
    #[error("Text detection failed: {0}")]
    Detection(String),

    /// An image could not be decoded or encoded
    #[error("Image error: {0}")]
    Image(String),

    /// No font is available for redrawing text
    #[error("Font error: {0}")]
    Font(String),
}

impl From<image::ImageError> for OcrError {
    fn from(error: image::ImageError) -> Self {
        Self::Image(error.to_string())
    }
}

/// Errors that end a translation job
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The provider signalled quota or credit exhaustion
    #[error("Translation provider rate limited: {0}")]
    RateLimited(ProviderError),

    /// Document decoding or rebuilding failed
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// The OCR overlay failed
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// The submission itself is unusable (missing target language, no file name)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The caller exhausted their plan quota
    #[error("Quota exceeded for today ({quota} translations)")]
    QuotaExceeded {
        /// Daily quota of the caller's plan
        quota: u32,
    },

    /// A pipeline stage panicked or was cancelled
    #[error("Pipeline stage failed: {0}")]
    Stage(String),
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Stage(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from document handling
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Error from the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Error from the history store
    #[error("History error: {0}")]
    History(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        Self::History(error.to_string())
    }
}
