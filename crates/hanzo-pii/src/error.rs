//! Error types for Hanzo PII

use thiserror::Error;

/// Result type alias for PII engine operations
pub type Result<T> = std::result::Result<T, PiiError>;

/// PII engine error types
///
/// Detection, resolution and anchoring never fail per span: a broken
/// detector yields no spans and a malformed span is dropped. These errors
/// only surface while building configuration or compiling user patterns.
#[derive(Debug, Error)]
pub enum PiiError {
    /// A user-defined pattern did not compile
    #[error("Invalid pattern for {category}: {message}")]
    InvalidPattern { category: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
