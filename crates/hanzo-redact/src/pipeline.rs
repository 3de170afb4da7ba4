//! Batch pipeline: scan, resolve, anchor, mask, render

use crate::audit::{AuditEntry, AuditLogger};
use crate::config::{RedactConfig, RenderConfig};
use crate::document::DocumentKind;
use crate::error::{RedactError, Result};
use crate::locate::{apply_targets, RedactionCanvas, TargetReport};
use futures::future::join_all;
use hanzo_pii::masking::apply_to_text;
use hanzo_pii::{
    DocumentField, MaskedPreview, MaskingDecisions, PiiEngine, RedactionTarget, Span, SpanGroup,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

#[cfg(feature = "pdf")]
use crate::pdf::PdfCanvas;
#[cfg(feature = "raster")]
use crate::raster::RasterCanvas;

/// One document's worth of input
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    /// Text to mask; rebuilt from `fields` when empty
    pub raw_text: String,
    /// OCR fields with page locations
    pub fields: Vec<DocumentField>,
    /// Per-request masking choices
    pub decisions: MaskingDecisions,
    /// PDF or image bytes to redact
    pub document: Option<Vec<u8>>,
}

impl BatchRequest {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: Vec<DocumentField>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_decisions(mut self, decisions: MaskingDecisions) -> Self {
        self.decisions = decisions;
        self
    }

    pub fn with_document(mut self, bytes: Vec<u8>) -> Self {
        self.document = Some(bytes);
        self
    }
}

/// Redacted document bytes, same format as the input
#[derive(Debug, Clone)]
pub struct RedactedDocument {
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

/// Everything produced for one request
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub request_id: Uuid,
    /// Resolved spans; offsets index the field layout when fields exist
    pub spans: SpanGroup,
    pub previews: Vec<MaskedPreview>,
    pub masked_text: String,
    /// Spans carrying a page and a box or occurrence ordinal
    pub anchored: Vec<Span>,
    /// Spans with no document location
    pub unanchored: Vec<Span>,
    pub targets: Vec<RedactionTarget>,
    pub reports: Vec<TargetReport>,
    #[serde(skip)]
    pub document: Option<RedactedDocument>,
}

impl BatchResult {
    pub fn applied_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_applied()).count()
    }

    pub fn not_found_count(&self) -> usize {
        self.reports.len() - self.applied_count()
    }
}

/// End-to-end redactor
pub struct Redactor {
    config: RedactConfig,
    engine: PiiEngine,
    audit: AuditLogger,
}

impl Redactor {
    pub fn new(config: RedactConfig) -> Result<Self> {
        Ok(Self {
            engine: PiiEngine::new(config.pii.clone())?,
            audit: AuditLogger::new(config.audit.clone()),
            config,
        })
    }

    pub fn config(&self) -> &RedactConfig {
        &self.config
    }

    pub fn engine(&self) -> &PiiEngine {
        &self.engine
    }

    /// Process one request
    ///
    /// Only an unreadable or unwritable document fails the batch; spans that
    /// cannot be anchored and targets that cannot be located are reported.
    pub fn process(&self, request: BatchRequest) -> Result<BatchResult> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let BatchRequest {
            raw_text,
            fields,
            decisions,
            document,
        } = request;

        let canvas = document
            .as_deref()
            .map(|bytes| Canvas::open(bytes, &self.config.redaction))
            .transpose()?;

        let supplied_fields = !fields.is_empty();
        let fields = match &canvas {
            Some(canvas) if !supplied_fields => canvas.native_fields(),
            _ => fields,
        };
        let anchor = self.engine.anchor(fields);
        let scan_text = if anchor.layout().is_empty() {
            raw_text.as_str()
        } else {
            anchor.layout().text()
        };

        let spans = self.engine.scan(scan_text);
        let previews = self.engine.preview(&spans, &decisions);
        let masked_text = if raw_text.is_empty() || raw_text == scan_text {
            apply_to_text(scan_text, &previews)
        } else {
            self.engine.mask_text(&raw_text, &decisions)
        };

        let plan = anchor.targets_for(&spans);
        let (reports, document) = match canvas {
            Some(canvas) => {
                let mut canvas = if supplied_fields && self.config.redaction.use_field_fragments {
                    canvas.with_fields(anchor.layout().fields())
                } else {
                    canvas
                };
                let separator = self.config.pii.anchoring.separator;
                let reports = apply_targets(canvas.as_canvas(), &plan.targets, separator);
                let kind = canvas.kind();
                let bytes = canvas.finish()?;
                (reports, Some(RedactedDocument { kind, bytes }))
            }
            None => (Vec::new(), None),
        };

        let result = BatchResult {
            request_id,
            spans,
            previews,
            masked_text,
            anchored: plan.spans,
            unanchored: plan.misses,
            targets: plan.targets,
            reports,
            document,
        };

        let mut entry = AuditEntry::new(request_id, scan_text, &result.spans);
        entry.document = result.document.as_ref().map(|d| d.kind);
        entry.anchored = result.anchored.len();
        entry.unanchored = result.unanchored.len();
        entry.applied = result.applied_count();
        entry.not_found = result.not_found_count();
        entry.processing_time_ms = started.elapsed().as_millis() as u64;
        self.audit.log(&entry);

        Ok(result)
    }

    /// Process independent requests concurrently on the blocking pool
    ///
    /// Results keep request order; one failure does not affect the others.
    pub async fn process_many(self: Arc<Self>, requests: Vec<BatchRequest>) -> Vec<Result<BatchResult>> {
        let tasks = requests.into_iter().map(|request| {
            let redactor = Arc::clone(&self);
            tokio::task::spawn_blocking(move || redactor.process(request))
        });

        join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.map_err(RedactError::from).and_then(|result| result))
            .collect()
    }
}

/// Opened source document
enum Canvas {
    #[cfg(feature = "pdf")]
    Pdf(PdfCanvas),
    #[cfg(feature = "raster")]
    Raster(RasterCanvas),
}

impl Canvas {
    fn open(bytes: &[u8], config: &RenderConfig) -> Result<Self> {
        match DocumentKind::detect(bytes)? {
            #[cfg(feature = "pdf")]
            DocumentKind::Pdf => Ok(Canvas::Pdf(PdfCanvas::open(bytes, config)?)),
            #[cfg(feature = "raster")]
            DocumentKind::Image => Ok(Canvas::Raster(RasterCanvas::open(bytes, config)?)),
            #[allow(unreachable_patterns)]
            kind => Err(RedactError::DocumentFormat(format!(
                "{kind} support is not enabled"
            ))),
        }
    }

    fn kind(&self) -> DocumentKind {
        match self {
            #[cfg(feature = "pdf")]
            Canvas::Pdf(_) => DocumentKind::Pdf,
            #[cfg(feature = "raster")]
            Canvas::Raster(_) => DocumentKind::Image,
        }
    }

    /// Fields recovered from the document itself
    fn native_fields(&self) -> Vec<DocumentField> {
        match self {
            #[cfg(feature = "pdf")]
            Canvas::Pdf(pdf) => pdf.document_fields(),
            #[cfg(feature = "raster")]
            Canvas::Raster(_) => Vec::new(),
        }
    }

    fn with_fields(self, fields: &[DocumentField]) -> Self {
        match self {
            #[cfg(feature = "pdf")]
            Canvas::Pdf(pdf) => Canvas::Pdf(pdf.with_fields(fields)),
            #[cfg(feature = "raster")]
            Canvas::Raster(raster) => Canvas::Raster(raster.with_fields(fields)),
        }
    }

    fn as_canvas(&mut self) -> &mut dyn RedactionCanvas {
        match self {
            #[cfg(feature = "pdf")]
            Canvas::Pdf(pdf) => pdf,
            #[cfg(feature = "raster")]
            Canvas::Raster(raster) => raster,
        }
    }

    fn finish(self) -> Result<Vec<u8>> {
        match self {
            #[cfg(feature = "pdf")]
            Canvas::Pdf(pdf) => pdf.finish(),
            #[cfg(feature = "raster")]
            Canvas::Raster(raster) => raster.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanzo_pii::{BoundingBox, Category, MaskingMode};

    fn quiet_config() -> RedactConfig {
        let mut config = RedactConfig::default();
        config.audit.enabled = false;
        config
    }

    #[test]
    fn test_text_only_request() {
        let redactor = Redactor::new(quiet_config()).unwrap();
        let decisions = MaskingDecisions::new().with_category(Category::Phone, MaskingMode::Full);
        let result = redactor
            .process(BatchRequest::new("call 010-1234-5678").with_decisions(decisions))
            .unwrap();
        assert_eq!(result.masked_text, "call ***-****-****");
        assert!(result.targets.is_empty());
        assert_eq!(result.unanchored.len(), 1);
        assert!(result.document.is_none());
    }

    #[test]
    fn test_fields_rebuild_text_and_anchor() {
        let redactor = Redactor::new(quiet_config()).unwrap();
        let fields = vec![
            DocumentField::new(0, "Email:", BoundingBox::new(0.0, 0.0, 60.0, 10.0)),
            DocumentField::new(0, "jane@corp.io", BoundingBox::new(70.0, 0.0, 190.0, 10.0)),
        ];
        let result = redactor.process(BatchRequest::default().with_fields(fields)).unwrap();

        assert_eq!(result.spans.len(), 1);
        assert_eq!(result.anchored.len(), 1);
        assert_eq!(
            result.targets[0],
            RedactionTarget::region(0, BoundingBox::new(70.0, 0.0, 190.0, 10.0), Category::Email)
        );
        assert!(result.masked_text.starts_with("Email: "));
        assert!(!result.masked_text.contains("jane@corp.io"));
    }

    #[test]
    fn test_unknown_document_fails_batch() {
        let redactor = Redactor::new(quiet_config()).unwrap();
        let err = redactor
            .process(BatchRequest::new("x").with_document(b"not a document".to_vec()))
            .unwrap_err();
        assert!(matches!(err, RedactError::DocumentFormat(_)));
    }

    #[test]
    fn test_counts() {
        let result = BatchResult {
            request_id: Uuid::nil(),
            spans: SpanGroup::default(),
            previews: Vec::new(),
            masked_text: String::new(),
            anchored: Vec::new(),
            unanchored: Vec::new(),
            targets: Vec::new(),
            reports: Vec::new(),
            document: None,
        };
        assert_eq!(result.applied_count(), 0);
        assert_eq!(result.not_found_count(), 0);
    }
}
