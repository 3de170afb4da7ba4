//! # Hanzo Redact
//!
//! Irreversible, document-anchored PII redaction built on [`hanzo_pii`].
//!
//! A batch takes raw text, OCR fields and masking decisions, plus an optional
//! PDF or image. Spans are detected and resolved on the text, anchored back
//! to page geometry, then burned into the document:
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌────────────┐   ┌──────────────┐
//! │ BatchReq   │──►│ PiiEngine│──►│ Coordinate │──►│ Redaction    │──► redacted bytes
//! │ text+fields│   │ scan     │   │ Anchor     │   │ Canvas       │    + per-target report
//! └────────────┘   └────┬─────┘   └────────────┘   │ (PDF/raster) │
//!                       │                          └──────────────┘
//!                       └──► masking previews ──► masked text
//! ```
//!
//! ## Example
//!
//! ```rust
//! use hanzo_redact::{BatchRequest, RedactConfig, Redactor};
//!
//! let redactor = Redactor::new(RedactConfig::default()).unwrap();
//! let result = redactor.process(BatchRequest::new("연락처 010-1234-5678")).unwrap();
//! assert_eq!(result.spans.len(), 1);
//! assert!(!result.masked_text.contains("1234-5678"));
//! ```

#[cfg(not(any(feature = "pdf", feature = "raster")))]
compile_error!("enable at least one of the `pdf` or `raster` features");

pub mod audit;
pub mod config;
pub mod document;
pub mod error;
pub mod locate;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod pipeline;
#[cfg(feature = "raster")]
pub mod raster;

pub use config::{AuditConfig, RedactConfig, RenderConfig};
pub use document::DocumentKind;
pub use error::{RedactError, Result};
pub use locate::{
    apply_targets, locate, LocateStage, RedactionCanvas, TargetOutcome, TargetReport, TextFragment,
};
pub use pipeline::{BatchRequest, BatchResult, RedactedDocument, Redactor};

#[cfg(feature = "pdf")]
pub use pdf::PdfCanvas;
#[cfg(feature = "raster")]
pub use raster::RasterCanvas;
