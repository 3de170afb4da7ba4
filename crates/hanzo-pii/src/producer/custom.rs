//! Administrator-defined categories

use super::{two_pass_scan, Boundary, MatchContext, ScanPlan, SpanProducer};
use crate::config::CustomCategory;
use crate::error::{PiiError, Result};
use crate::types::{Category, Span};
use regex::Regex;

/// Detector carrying its own pattern and keyword data
pub struct CustomDetector {
    name: String,
    category: Category,
    whole: Vec<Regex>,
    window: Vec<Regex>,
    keywords: Vec<String>,
    radius: usize,
    confidence: f64,
}

impl CustomDetector {
    /// Compile a definition, surfacing pattern errors
    pub fn try_compile(definition: &CustomCategory, default_radius: usize) -> Result<Self> {
        let category = definition.category();
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| PiiError::InvalidPattern {
                category: category.to_string(),
                message: e.to_string(),
            })
        };
        let whole = vec![compile(&definition.pattern)?];
        let window = match &definition.keyword_pattern {
            Some(pattern) => vec![compile(pattern)?],
            None => Vec::new(),
        };
        Ok(Self {
            name: category.as_str().to_lowercase(),
            whole,
            window,
            keywords: definition
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            radius: definition.window.unwrap_or(default_radius),
            confidence: definition.confidence,
            category,
        })
    }

    /// Compile a definition; a broken pattern yields a detector that finds nothing
    pub fn compile(definition: &CustomCategory, default_radius: usize) -> Self {
        Self::try_compile(definition, default_radius).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "custom category disabled");
            let category = definition.category();
            Self {
                name: category.as_str().to_lowercase(),
                category,
                whole: Vec::new(),
                window: Vec::new(),
                keywords: Vec::new(),
                radius: default_radius,
                confidence: definition.confidence,
            }
        })
    }

    /// Whether the detector can produce anything
    pub fn is_active(&self) -> bool {
        !self.whole.is_empty()
    }
}

fn accept_any(_value: &str, _context: MatchContext) -> bool {
    true
}

impl SpanProducer for CustomDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn categories(&self) -> Vec<Category> {
        vec![self.category.clone()]
    }

    fn detect(&self, text: &str) -> Vec<Span> {
        if !self.is_active() {
            return Vec::new();
        }
        two_pass_scan(
            text,
            &ScanPlan {
                category: &self.category,
                whole: &self.whole,
                window: &self.window,
                keywords: &self.keywords,
                radius: self.radius,
                confidence: self.confidence,
                keyword_confidence: (self.confidence + 0.1).min(1.0),
                validator: accept_any,
                boundary: Boundary::Alnum,
            },
        )
    }
}
