//! Configuration for document redaction

use crate::error::Result;
use hanzo_pii::PiiConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the redactor
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RedactConfig {
    /// Text engine configuration
    pub pii: PiiConfig,
    /// Rendering configuration
    pub redaction: RenderConfig,
    /// Audit configuration
    pub audit: AuditConfig,
}

impl RedactConfig {
    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: RedactConfig = toml::from_str(source)?;
        config.pii.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn with_pii(mut self, pii: PiiConfig) -> Self {
        self.pii = pii;
        self
    }

    pub fn with_redaction(mut self, redaction: RenderConfig) -> Self {
        self.redaction = redaction;
        self
    }

    pub fn with_audit(mut self, audit: AuditConfig) -> Self {
        self.audit = audit;
        self
    }
}

/// How redaction marks are drawn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Fill colour of redaction boxes (RGB)
    pub fill_color: [u8; 3],
    /// Remove PDF text operators under redaction boxes
    pub strip_text: bool,
    /// Search supplied OCR fields as well as native text
    pub use_field_fragments: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fill_color: [0, 0, 0],
            strip_text: true,
            use_field_fragments: true,
        }
    }
}

/// Audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Enable audit logging
    pub enabled: bool,
    /// Record matched values (vs. just hashes and counts)
    pub log_values: bool,
    /// JSON-lines log file
    pub log_file: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_values: false, // Privacy by default
            log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanzo_pii::{Category, MaskingMode};

    #[test]
    fn test_defaults() {
        let config = RedactConfig::default();
        assert_eq!(config.redaction.fill_color, [0, 0, 0]);
        assert!(config.redaction.strip_text);
        assert!(config.audit.enabled);
        assert!(!config.audit.log_values);
    }

    #[test]
    fn test_from_toml() {
        let config = RedactConfig::from_toml_str(
            r#"
            [pii.detection]
            keyword_window = 50

            [pii.masking.rules.EMAIL]
            mode = "full"

            [redaction]
            fill_color = [255, 255, 255]
            strip_text = false

            [audit]
            log_file = "/tmp/redact-audit.jsonl"
            "#,
        )
        .unwrap();
        assert_eq!(config.pii.detection.keyword_window, 50);
        assert_eq!(
            config.pii.masking.rules[&Category::Email].mode,
            MaskingMode::Full
        );
        assert_eq!(config.redaction.fill_color, [255, 255, 255]);
        assert!(!config.redaction.strip_text);
        assert!(config.redaction.use_field_fragments);
        assert_eq!(
            config.audit.log_file.as_deref(),
            Some(Path::new("/tmp/redact-audit.jsonl"))
        );
    }

    #[test]
    fn test_invalid_pii_section_rejected() {
        assert!(RedactConfig::from_toml_str("[pii.detection]\nkeyword_window = 999\n").is_err());
    }
}
