//! Producer registry
//!
//! Owns the compiled detector set for one [`DetectionConfig`]. Detectors are
//! compiled on first use and cached until [`ProducerRegistry::invalidate`] or
//! [`ProducerRegistry::reload`] is called.

use crate::config::DetectionConfig;
use crate::error::Result;
use crate::producer::{
    builtin_specs, BuiltinDetector, CustomDetector, Detector, EntityDetector, SpanProducer,
};
use crate::types::Span;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub struct ProducerRegistry {
    config: RwLock<DetectionConfig>,
    detectors: RwLock<Option<Arc<Vec<Detector>>>>,
    generation: AtomicU64,
}

impl ProducerRegistry {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(config),
            detectors: RwLock::new(None),
            generation: AtomicU64::new(0),
        })
    }

    /// Current configuration
    pub fn config(&self) -> DetectionConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times the detector set has been compiled
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Drop the compiled detectors; the next scan recompiles
    pub fn invalidate(&self) {
        *self
            .detectors
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        tracing::debug!("producer registry invalidated");
    }

    /// Swap in a new configuration
    pub fn reload(&self, config: DetectionConfig) -> Result<()> {
        config.validate()?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        self.invalidate();
        Ok(())
    }

    /// Compiled detectors, building them if needed
    pub fn detectors(&self) -> Arc<Vec<Detector>> {
        if let Some(cached) = self
            .detectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Arc::clone(cached);
        }

        let mut slot = self
            .detectors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = slot.as_ref() {
            return Arc::clone(cached);
        }
        let compiled = Arc::new(build_detectors(&self.config()));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            generation,
            detectors = compiled.len(),
            "compiled span producers"
        );
        *slot = Some(Arc::clone(&compiled));
        compiled
    }

    /// Run every enabled detector and concatenate their candidates
    ///
    /// A detector that panics is skipped; the others still run.
    pub fn detect_all(&self, text: &str) -> Vec<Span> {
        let min_confidence = self.config().min_confidence;
        let detectors = self.detectors();
        let mut spans = Vec::new();
        for detector in detectors.iter() {
            match catch_unwind(AssertUnwindSafe(|| detector.detect(text))) {
                Ok(found) => {
                    tracing::trace!(producer = detector.name(), count = found.len(), "producer finished");
                    spans.extend(found.into_iter().filter(|s| s.confidence >= min_confidence));
                }
                Err(_) => {
                    tracing::warn!(producer = detector.name(), "producer failed, skipping");
                }
            }
        }
        spans
    }
}

fn build_detectors(config: &DetectionConfig) -> Vec<Detector> {
    if !config.enabled {
        return Vec::new();
    }
    let mut detectors: Vec<Detector> = builtin_specs()
        .iter()
        .filter(|spec| config.is_enabled(&spec.category))
        .map(|spec| Detector::Builtin(BuiltinDetector::new(spec, config.keyword_window)))
        .collect();

    if config.entities.enabled {
        detectors.push(Detector::Entities(EntityDetector::new(&config.entities)));
    }
    for custom in &config.custom {
        detectors.push(Detector::Custom(CustomDetector::compile(
            custom,
            config.keyword_window,
        )));
    }
    detectors
}
