//! Command-line redaction of a single document
//!
//! ```text
//! hanzo-redact --input scan.pdf --fields ocr.json --output redacted.pdf
//! hanzo-redact --text "연락처 010-1234-5678"
//! ```
//!
//! The batch report (spans, previews, targets, per-target outcomes) is
//! printed to stdout as JSON unless `--report` names a file.

use anyhow::{Context, Result};
use clap::Parser;
use hanzo_pii::{DocumentField, MaskingDecisions};
use hanzo_redact::{BatchRequest, RedactConfig, Redactor};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hanzo-redact")]
#[command(about = "Detect, mask and irreversibly redact PII in text, PDFs and images")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raw text to scan and mask
    #[arg(short, long, conflicts_with = "text_file")]
    text: Option<String>,

    /// File holding the raw text
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// OCR fields as a JSON array of {page_index, text, bbox}
    #[arg(short, long)]
    fields: Option<PathBuf>,

    /// Masking decisions as JSON {by_value, by_category}
    #[arg(short, long)]
    decisions: Option<PathBuf>,

    /// PDF or image to redact
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to write the redacted document
    #[arg(short, long, requires = "input")]
    output: Option<PathBuf>,

    /// Where to write the JSON report (stdout if omitted)
    #[arg(short, long)]
    report: Option<PathBuf>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn main() -> Result<()> {
    // Logs go to stderr so the report can be piped
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RedactConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RedactConfig::default(),
    };
    let redactor = Redactor::new(config).context("Failed to build redactor")?;

    let text = match (&args.text, &args.text_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => String::new(),
    };

    let mut request = BatchRequest::new(text);
    if let Some(path) = &args.fields {
        let fields: Vec<DocumentField> = read_json(path)?;
        request = request.with_fields(fields);
    }
    if let Some(path) = &args.decisions {
        let decisions: MaskingDecisions = read_json(path)?;
        request = request.with_decisions(decisions);
    }
    if let Some(path) = &args.input {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        request = request.with_document(bytes);
    }

    let result = redactor.process(request)?;
    info!(
        spans = result.spans.len(),
        applied = result.applied_count(),
        not_found = result.not_found_count(),
        unanchored = result.unanchored.len(),
        "redaction complete"
    );

    if let (Some(path), Some(document)) = (&args.output, &result.document) {
        std::fs::write(path, &document.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), kind = %document.kind, "redacted document written");
    }

    let report = serde_json::to_string_pretty(&result)?;
    match &args.report {
        Some(path) => std::fs::write(path, report)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{report}"),
    }

    Ok(())
}
