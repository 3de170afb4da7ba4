//! Configuration for Hanzo PII

use crate::error::{PiiError, Result};
use crate::masking::KEEP_MARKER;
use crate::types::{Category, MaskingMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Largest keyword window radius accepted, in characters
pub const MAX_KEYWORD_WINDOW: usize = 256;

/// Main configuration for the PII engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PiiConfig {
    /// Span producer configuration
    pub detection: DetectionConfig,
    /// Overlap resolution configuration
    pub resolution: ResolutionConfig,
    /// Coordinate anchoring configuration
    pub anchoring: AnchorConfig,
    /// Masking policy configuration
    pub masking: MaskingConfig,
}

impl PiiConfig {
    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: PiiConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        self.masking.validate()
    }
}

/// Span producer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Enable detection
    pub enabled: bool,
    /// Built-in categories to run (empty = all)
    pub categories: Vec<Category>,
    /// Radius in characters scanned around each domain keyword
    pub keyword_window: usize,
    /// Spans below this confidence are discarded before resolution
    pub min_confidence: f64,
    /// Named-entity lexicons
    pub entities: EntityLexicon,
    /// User-defined categories
    pub custom: Vec<CustomCategory>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            categories: Vec::new(),
            keyword_window: 40,
            min_confidence: 0.0,
            entities: EntityLexicon::default(),
            custom: Vec::new(),
        }
    }
}

impl DetectionConfig {
    /// Restrict detection to the given built-in categories
    pub fn with_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    /// Set the keyword window radius
    pub fn with_keyword_window(mut self, window: usize) -> Self {
        self.keyword_window = window;
        self
    }

    /// Add a user-defined category
    pub fn with_custom(mut self, custom: CustomCategory) -> Self {
        self.custom.push(custom);
        self
    }

    /// Replace the named-entity lexicons
    pub fn with_entities(mut self, entities: EntityLexicon) -> Self {
        self.entities = entities;
        self
    }

    /// Whether a built-in category should run
    pub fn is_enabled(&self, category: &Category) -> bool {
        self.enabled && (self.categories.is_empty() || self.categories.contains(category))
    }

    pub fn validate(&self) -> Result<()> {
        if self.keyword_window == 0 || self.keyword_window > MAX_KEYWORD_WINDOW {
            return Err(PiiError::Config(format!(
                "keyword_window must be within 1..={}, got {}",
                MAX_KEYWORD_WINDOW, self.keyword_window
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(PiiError::Config(format!(
                "min_confidence must be within 0..=1, got {}",
                self.min_confidence
            )));
        }
        for custom in &self.custom {
            if custom.name.trim().is_empty() {
                return Err(PiiError::Config(
                    "custom category name must not be empty".to_string(),
                ));
            }
            if !Category::parse(&custom.name).is_custom() {
                return Err(PiiError::Config(format!(
                    "custom category {} shadows a built-in category",
                    custom.name
                )));
            }
        }
        Ok(())
    }
}

/// Gazetteers for the named-entity producer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityLexicon {
    /// Enable the named-entity producer
    pub enabled: bool,
    /// Known person names
    pub persons: Vec<String>,
    /// Known organization names
    pub organizations: Vec<String>,
    /// Known place names
    pub locations: Vec<String>,
}

impl Default for EntityLexicon {
    fn default() -> Self {
        Self {
            enabled: true,
            persons: Vec::new(),
            organizations: Vec::new(),
            locations: Vec::new(),
        }
    }
}

/// A category defined by an administrator at runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCategory {
    /// Category name (normalized to upper-snake)
    pub name: String,
    /// Whole-text pattern
    pub pattern: String,
    /// Keywords that anchor the window scan
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Looser pattern used inside keyword windows (defaults to `pattern`)
    #[serde(default)]
    pub keyword_pattern: Option<String>,
    /// Window radius override
    #[serde(default)]
    pub window: Option<usize>,
    /// Confidence of whole-text matches
    #[serde(default = "default_custom_confidence")]
    pub confidence: f64,
}

fn default_custom_confidence() -> f64 {
    0.8
}

impl CustomCategory {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            keywords: Vec::new(),
            keyword_pattern: None,
            window: None,
            confidence: default_custom_confidence(),
        }
    }

    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keyword_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.keyword_pattern = Some(pattern.into());
        self
    }

    pub fn category(&self) -> Category {
        Category::Custom(Category::parse(&self.name).as_str().to_string())
    }
}

/// Overlap resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Categories from highest to lowest priority
    pub priority: Vec<Category>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            priority: vec![
                Category::NationalId,
                Category::Phone,
                Category::CardNumber,
                Category::Passport,
                Category::DriverLicense,
                Category::BankAccount,
            ],
        }
    }
}

/// Coordinate anchoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Separator placed between fields when the flat text is built
    pub separator: char,
    /// Narrow a containing field's box to the span's characters
    pub narrow_to_span: bool,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            separator: ' ',
            narrow_to_span: false,
        }
    }
}

/// Masking policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    /// Mask character when a rule does not name one
    pub default_mask_char: char,
    /// Per-category rules
    pub rules: HashMap<Category, MaskingRule>,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            default_mask_char: '*',
            rules: HashMap::new(),
        }
    }
}

impl MaskingConfig {
    /// Set the rule for a category
    pub fn with_rule(mut self, category: Category, rule: MaskingRule) -> Self {
        self.rules.insert(category, rule);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (category, rule) in &self.rules {
            if rule.mode == MaskingMode::Custom && rule.custom_pattern.is_none() {
                tracing::warn!(
                    category = %category,
                    "custom masking without a template, full masking will be used"
                );
            }
            if let Some(c) = rule.mask_char {
                check_mask_char(c, &format!("mask_char for {category}"))?;
            }
        }
        check_mask_char(self.default_mask_char, "default_mask_char")
    }
}

/// Mask characters must not read as data or as the template keep marker
fn check_mask_char(c: char, name: &str) -> Result<()> {
    if c.is_alphanumeric() {
        return Err(PiiError::Config(format!("{name} must not be alphanumeric")));
    }
    if c == KEEP_MARKER {
        return Err(PiiError::Config(format!(
            "{name} must not be '{KEEP_MARKER}', which custom templates use to keep a character"
        )));
    }
    Ok(())
}

/// Masking rule for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskingRule {
    pub mode: MaskingMode,
    #[serde(default)]
    pub mask_char: Option<char>,
    #[serde(default)]
    pub custom_pattern: Option<String>,
}

impl MaskingRule {
    pub fn new(mode: MaskingMode) -> Self {
        Self {
            mode,
            mask_char: None,
            custom_pattern: None,
        }
    }

    pub fn custom(pattern: impl Into<String>) -> Self {
        Self {
            mode: MaskingMode::Custom,
            mask_char: None,
            custom_pattern: Some(pattern.into()),
        }
    }

    pub fn with_mask_char(mut self, mask_char: char) -> Self {
        self.mask_char = Some(mask_char);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priority_order() {
        let config = ResolutionConfig::default();
        assert_eq!(config.priority[0], Category::NationalId);
        assert_eq!(config.priority[1], Category::Phone);
        assert_eq!(config.priority.last(), Some(&Category::BankAccount));
    }

    #[test]
    fn test_from_toml() {
        let config = PiiConfig::from_toml_str(
            r##"
            [detection]
            keyword_window = 30
            categories = ["EMAIL", "phone"]

            [[detection.custom]]
            name = "employee_no"
            pattern = 'EMP-\d{6}'
            keywords = ["employee"]

            [anchoring]
            separator = "\n"

            [masking]
            default_mask_char = "#"

            [masking.rules.PHONE]
            mode = "partial"

            [masking.rules.NATIONAL_ID]
            mode = "custom"
            custom_pattern = '######-*******'
            "##,
        )
        .unwrap();

        assert_eq!(config.detection.keyword_window, 30);
        assert!(config.detection.is_enabled(&Category::Phone));
        assert!(!config.detection.is_enabled(&Category::Mac));
        assert_eq!(config.detection.custom[0].category().as_str(), "EMPLOYEE_NO");
        assert_eq!(config.anchoring.separator, '\n');
        assert_eq!(config.masking.default_mask_char, '#');
        assert_eq!(
            config.masking.rules[&Category::Phone].mode,
            MaskingMode::Partial
        );
        assert_eq!(
            config.masking.rules[&Category::NationalId]
                .custom_pattern
                .as_deref(),
            Some("######-*******")
        );
    }

    #[test]
    fn test_invalid_window_rejected() {
        let err = PiiConfig::from_toml_str("[detection]\nkeyword_window = 0\n").unwrap_err();
        assert!(matches!(err, PiiError::Config(_)));
    }

    #[test]
    fn test_alphanumeric_mask_char_rejected() {
        let config = MaskingConfig::default()
            .with_rule(Category::Email, MaskingRule::new(MaskingMode::Full).with_mask_char('x'));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keep_marker_mask_char_rejected() {
        let rule = MaskingRule::custom("###-****").with_mask_char('#');
        let config = MaskingConfig::default().with_rule(Category::Phone, rule);
        assert!(matches!(config.validate(), Err(PiiError::Config(_))));

        let err = PiiConfig::from_toml_str("[masking]\ndefault_mask_char = \"#\"\n").unwrap_err();
        assert!(matches!(err, PiiError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pii.toml");
        std::fs::write(&path, "[resolution]\npriority = [\"PHONE\"]\n").unwrap();
        let config = PiiConfig::from_file(&path).unwrap();
        assert_eq!(config.resolution.priority, vec![Category::Phone]);
    }
}
