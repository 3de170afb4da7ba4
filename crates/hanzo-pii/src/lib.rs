//! # Hanzo PII
//!
//! PII span detection, conflict resolution, document anchoring and masking
//! policy for data-loss-prevention pipelines.
//!
//! - **Span Producers**: one detector per category, two-pass pattern scans
//!   with validity checks, named-entity tagging, user-defined categories
//! - **Span Resolver**: one ordered, non-overlapping span set from all
//!   producers, decided by category priority, length and confidence
//! - **Coordinate Anchor**: maps character offsets back to the OCR field,
//!   page and bounding box they came from
//! - **Masking Policy**: full, partial and template-driven replacements
//!
//! ## Quick Start
//!
//! ```rust
//! use hanzo_pii::prelude::*;
//!
//! let engine = PiiEngine::new(PiiConfig::default()).unwrap();
//! let spans = engine.scan("연락처 010-1234-5678");
//! assert_eq!(spans.by_category(&Category::Phone).len(), 1);
//!
//! let decisions = MaskingDecisions::new().with_category(Category::Phone, MaskingMode::Full);
//! assert_eq!(
//!     engine.mask_text("연락처 010-1234-5678", &decisions),
//!     "연락처 ***-****-****"
//! );
//! ```
//!
//! ## Architecture
//!
//! ```text
//! raw text ──► ┌───────────────┐   candidates   ┌──────────────┐
//!              │ Producer      │ ─────────────► │ Span         │
//!              │ Registry      │                │ Resolver     │
//!              └───────────────┘                └──────┬───────┘
//!                                                      │ SpanGroup
//!                         ┌────────────────────────────┼──────────────┐
//!                         ▼                            ▼              │
//!                 ┌──────────────┐             ┌──────────────┐       │
//!                 │ Coordinate   │             │ Masking      │       │
//!                 │ Anchor       │             │ Engine       │       │
//!                 └──────┬───────┘             └──────┬───────┘       │
//!                        ▼                            ▼               │
//!              RedactionTargets               MaskedPreviews  ◄───────┘
//! ```

pub mod anchor;
pub mod config;
pub mod engine;
pub mod error;
pub mod masking;
pub mod producer;
pub mod registry;
pub mod resolver;
mod text;
pub mod types;

pub use anchor::{Anchor, AnchorKind, AnchorPlan, CoordinateAnchor, FieldLayout};
pub use config::PiiConfig;
pub use engine::{PiiEngine, PiiEngineBuilder};
pub use error::{PiiError, Result};
pub use masking::{render, MaskedPreview, MaskingDecisions, MaskingEngine};
pub use registry::ProducerRegistry;
pub use resolver::{compare_spans, PriorityTable, SpanResolver};
pub use types::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::anchor::{AnchorPlan, CoordinateAnchor};
    pub use crate::config::{MaskingRule, PiiConfig};
    pub use crate::engine::PiiEngine;
    pub use crate::error::{PiiError, Result};
    pub use crate::masking::{MaskedPreview, MaskingDecisions};
    pub use crate::types::*;
}
