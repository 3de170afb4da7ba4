//! Audit logging for redaction batches

use crate::config::AuditConfig;
use crate::document::DocumentKind;
use chrono::{DateTime, Utc};
use hanzo_pii::SpanGroup;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use tracing::info;
use uuid::Uuid;

/// One audit record per processed batch
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Hash of the scanned text, never the text itself
    pub content_hash: String,
    pub document: Option<DocumentKind>,
    /// Resolved span counts per category
    pub spans: BTreeMap<String, usize>,
    pub anchored: usize,
    pub unanchored: usize,
    pub applied: usize,
    pub not_found: usize,
    pub processing_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl AuditEntry {
    pub fn new(request_id: Uuid, content: &str, group: &SpanGroup) -> Self {
        let mut spans = BTreeMap::new();
        for span in group {
            *spans.entry(span.category.to_string()).or_insert(0) += 1;
        }
        Self {
            request_id,
            timestamp: Utc::now(),
            content_hash: hash_content(content),
            document: None,
            spans,
            anchored: 0,
            unanchored: 0,
            applied: 0,
            not_found: 0,
            processing_time_ms: 0,
            values: Some(group.iter().map(|s| truncate(&s.text, 100)).collect()),
        }
    }
}

/// Audit logger
pub struct AuditLogger {
    config: AuditConfig,
}

impl AuditLogger {
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    /// Emit an entry to tracing and, if configured, the JSON-lines file
    pub fn log(&self, entry: &AuditEntry) {
        if !self.config.enabled {
            return;
        }

        let mut entry = entry.clone();
        if !self.config.log_values {
            entry.values = None;
        }

        info!(
            request_id = %entry.request_id,
            content_hash = %entry.content_hash,
            document = ?entry.document,
            spans = ?entry.spans,
            anchored = entry.anchored,
            unanchored = entry.unanchored,
            applied = entry.applied,
            not_found = entry.not_found,
            processing_time_ms = entry.processing_time_ms,
            "Redaction audit"
        );

        if let Some(ref path) = self.config.log_file {
            if let Ok(json) = serde_json::to_string(&entry) {
                let written = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .and_then(|mut f| {
                        use std::io::Write;
                        writeln!(f, "{json}")
                    });
                if let Err(err) = written {
                    tracing::warn!(path = %path.display(), error = %err, "audit write failed");
                }
            }
        }
    }
}

/// Hash content for audit (privacy-preserving)
fn hash_content(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Truncate on a char boundary
fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte, _)) => format!("{}...", &s[..byte]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanzo_pii::{PiiConfig, PiiEngine};

    #[test]
    fn test_hash_content() {
        assert_eq!(hash_content("test"), hash_content("test"));
        assert_ne!(hash_content("test"), hash_content("different"));
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("주민등록번호", 2), "주민...");
    }

    #[test]
    fn test_entry_counts_categories() {
        let engine = PiiEngine::new(PiiConfig::default()).unwrap();
        let text = "a@b.io, c@d.io, 010-1234-5678";
        let entry = AuditEntry::new(Uuid::new_v4(), text, &engine.scan(text));
        assert_eq!(entry.spans.get("EMAIL"), Some(&2));
        assert_eq!(entry.spans.get("PHONE"), Some(&1));
        assert_ne!(entry.content_hash, text);
    }

    #[test]
    fn test_file_log_omits_values_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let logger = AuditLogger::new(AuditConfig {
            log_file: Some(path.clone()),
            ..Default::default()
        });

        let engine = PiiEngine::new(PiiConfig::default()).unwrap();
        let text = "mail a@b.io";
        let entry = AuditEntry::new(Uuid::new_v4(), text, &engine.scan(text));
        logger.log(&entry);
        logger.log(&entry);

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let json: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(json["spans"]["EMAIL"], 1);
        assert!(json.get("values").is_none());
        assert!(!written.contains("a@b.io"));
    }

    #[test]
    fn test_audit_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let logger = AuditLogger::new(AuditConfig {
            enabled: false,
            log_file: Some(path.clone()),
            ..Default::default()
        });
        logger.log(&AuditEntry::new(Uuid::new_v4(), "x", &SpanGroup::default()));
        assert!(!path.exists());
    }
}
