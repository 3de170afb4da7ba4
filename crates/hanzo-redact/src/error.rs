//! Error types for document redaction

use hanzo_pii::PiiError;
use thiserror::Error;

/// Result type for redaction operations
pub type Result<T> = std::result::Result<T, RedactError>;

/// Errors that abort a document's batch
///
/// Misses on individual spans or targets are not errors; they are reported
/// in [`crate::BatchResult`].
#[derive(Error, Debug)]
pub enum RedactError {
    /// Source bytes are not a supported document
    #[error("Unsupported or unreadable document: {0}")]
    DocumentFormat(String),

    /// PDF parse or write error
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Image decode or encode error
    #[error("Image error: {0}")]
    Image(String),

    /// Text engine error
    #[error("PII engine error: {0}")]
    Pii(#[from] PiiError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A batch worker stopped before returning
    #[error("Task failed: {0}")]
    Task(String),
}

#[cfg(feature = "pdf")]
impl From<lopdf::Error> for RedactError {
    fn from(err: lopdf::Error) -> Self {
        RedactError::Pdf(err.to_string())
    }
}

#[cfg(feature = "raster")]
impl From<image::ImageError> for RedactError {
    fn from(err: image::ImageError) -> Self {
        RedactError::Image(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RedactError {
    fn from(err: tokio::task::JoinError) -> Self {
        RedactError::Task(err.to_string())
    }
}
