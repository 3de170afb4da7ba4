//! Text-side engine: producers, resolver, anchor and masking in one place

use crate::anchor::CoordinateAnchor;
use crate::config::{DetectionConfig, PiiConfig};
use crate::error::Result;
use crate::masking::{apply_to_text, MaskedPreview, MaskingDecisions, MaskingEngine};
use crate::registry::ProducerRegistry;
use crate::resolver::SpanResolver;
use crate::types::{DocumentField, SpanGroup};

/// Scans text, resolves conflicts and renders masking previews
pub struct PiiEngine {
    config: PiiConfig,
    registry: ProducerRegistry,
    resolver: SpanResolver,
    masking: MaskingEngine,
}

impl PiiEngine {
    pub fn new(config: PiiConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: ProducerRegistry::new(config.detection.clone())?,
            resolver: SpanResolver::from_config(&config.resolution),
            masking: MaskingEngine::new(config.masking.clone()),
            config,
        })
    }

    pub fn builder() -> PiiEngineBuilder {
        PiiEngineBuilder::new()
    }

    /// Current configuration, including detection settings swapped in by
    /// [`PiiEngine::reload_detection`]
    pub fn config(&self) -> PiiConfig {
        PiiConfig {
            detection: self.registry.config(),
            ..self.config.clone()
        }
    }

    pub fn registry(&self) -> &ProducerRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &SpanResolver {
        &self.resolver
    }

    pub fn masking(&self) -> &MaskingEngine {
        &self.masking
    }

    /// Detect and resolve spans in `text`
    pub fn scan(&self, text: &str) -> SpanGroup {
        let candidates = self.registry.detect_all(text);
        let group = self.resolver.resolve(candidates);
        tracing::debug!(spans = group.len(), "scan complete");
        group
    }

    /// Anchor for a field list, using the configured separator
    pub fn anchor(&self, fields: Vec<DocumentField>) -> CoordinateAnchor {
        CoordinateAnchor::new(fields, &self.config.anchoring)
    }

    pub fn preview(&self, group: &SpanGroup, decisions: &MaskingDecisions) -> Vec<MaskedPreview> {
        self.masking.preview_all(group, decisions)
    }

    /// Scan and mask a plain-text artifact
    pub fn mask_text(&self, text: &str, decisions: &MaskingDecisions) -> String {
        let group = self.scan(text);
        apply_to_text(text, &self.preview(&group, decisions))
    }

    /// Swap detection settings; compiled producers are rebuilt on next scan
    pub fn reload_detection(&self, detection: DetectionConfig) -> Result<()> {
        self.registry.reload(detection)
    }
}

/// Builder for [`PiiEngine`]
pub struct PiiEngineBuilder {
    config: PiiConfig,
}

impl PiiEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: PiiConfig::default(),
        }
    }

    pub fn with_detection(mut self, detection: DetectionConfig) -> Self {
        self.config.detection = detection;
        self
    }

    pub fn with_resolution(mut self, resolution: crate::config::ResolutionConfig) -> Self {
        self.config.resolution = resolution;
        self
    }

    pub fn with_anchoring(mut self, anchoring: crate::config::AnchorConfig) -> Self {
        self.config.anchoring = anchoring;
        self
    }

    pub fn with_masking(mut self, masking: crate::config::MaskingConfig) -> Self {
        self.config.masking = masking;
        self
    }

    pub fn build(self) -> Result<PiiEngine> {
        PiiEngine::new(self.config)
    }
}

impl Default for PiiEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
