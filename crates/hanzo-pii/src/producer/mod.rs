//! Span producers
//!
//! Each producer scans raw text for the categories it declares and emits
//! candidate spans. Producers are restartable and side-effect free; a
//! producer that cannot do its job yields an empty sequence.
//!
//! Structured categories share one two-pass scanner:
//!
//! ```text
//! text ──► whole-text pattern scan ─────────────┐
//!   │                                           ├──► dedup by (text, start) ──► spans
//!   └──► keyword hits ──► ±radius windows ──────┘
//!                          (looser patterns)
//! ```

mod builtin;
mod custom;
mod entity;

pub use builtin::BuiltinDetector;
pub use custom::CustomDetector;
pub use entity::EntityDetector;

pub(crate) use builtin::builtin_specs;

use crate::resolver::{compare_spans, PriorityTable};
use crate::text::{char_after, char_before, CharIndex};
use crate::types::{Category, Span};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Capability shared by every detector
pub trait SpanProducer: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Categories this producer can emit
    fn categories(&self) -> Vec<Category>;

    /// Scan `text` and return candidate spans ordered by `(start, end)`
    fn detect(&self, text: &str) -> Vec<Span>;
}

/// Closed set of detector implementations
pub enum Detector {
    /// Entry of the static pattern table
    Builtin(BuiltinDetector),
    /// Person / organization / location tagger
    Entities(EntityDetector),
    /// Administrator-defined category
    Custom(CustomDetector),
}

impl SpanProducer for Detector {
    fn name(&self) -> &str {
        match self {
            Detector::Builtin(d) => d.name(),
            Detector::Entities(d) => d.name(),
            Detector::Custom(d) => d.name(),
        }
    }

    fn categories(&self) -> Vec<Category> {
        match self {
            Detector::Builtin(d) => d.categories(),
            Detector::Entities(d) => d.categories(),
            Detector::Custom(d) => d.categories(),
        }
    }

    fn detect(&self, text: &str) -> Vec<Span> {
        match self {
            Detector::Builtin(d) => d.detect(text),
            Detector::Entities(d) => d.detect(text),
            Detector::Custom(d) => d.detect(text),
        }
    }
}

/// Where a pattern match was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchContext {
    /// Whole-text pass
    Anywhere,
    /// Inside a keyword window
    NearKeyword,
}

/// Semantic check applied to a match before it becomes a span
pub type Validator = fn(&str, MatchContext) -> bool;

/// Characters that must not touch a match on either side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    None,
    /// No ASCII digit directly before or after
    Digit,
    /// No alphanumeric directly before or after
    Alnum,
}

impl Boundary {
    fn holds(self, text: &str, start: usize, end: usize) -> bool {
        let blocked = |c: char| match self {
            Boundary::None => false,
            Boundary::Digit => c.is_ascii_digit(),
            Boundary::Alnum => c.is_ascii_alphanumeric(),
        };
        !char_before(text, start).is_some_and(blocked) && !char_after(text, end).is_some_and(blocked)
    }
}

/// Compiled inputs of one two-pass scan
pub(crate) struct ScanPlan<'a> {
    pub category: &'a Category,
    pub whole: &'a [Regex],
    pub window: &'a [Regex],
    /// Lowercased keywords
    pub keywords: &'a [String],
    pub radius: usize,
    pub confidence: f64,
    pub keyword_confidence: f64,
    pub validator: Validator,
    pub boundary: Boundary,
}

/// Whole-text scan plus keyword-window scan, de-duplicated by `(text, start)`
pub(crate) fn two_pass_scan(text: &str, plan: &ScanPlan<'_>) -> Vec<Span> {
    if text.is_empty() {
        return Vec::new();
    }
    let index = CharIndex::new(text);
    let mut spans = Vec::new();

    for regex in plan.whole {
        for m in regex.find_iter(text) {
            push_match(
                &mut spans,
                text,
                &index,
                plan,
                m.start(),
                m.end(),
                MatchContext::Anywhere,
            );
        }
    }

    let window_patterns = if plan.window.is_empty() {
        plan.whole
    } else {
        plan.window
    };
    for (w_start, w_end) in keyword_windows(text, &index, plan.keywords, plan.radius) {
        let offset = index.to_byte(w_start);
        let slice = index.slice(w_start, w_end);
        for regex in window_patterns {
            for m in regex.find_iter(slice) {
                push_match(
                    &mut spans,
                    text,
                    &index,
                    plan,
                    offset + m.start(),
                    offset + m.end(),
                    MatchContext::NearKeyword,
                );
            }
        }
    }

    dedup_by_position(spans)
}

fn push_match(
    spans: &mut Vec<Span>,
    text: &str,
    index: &CharIndex<'_>,
    plan: &ScanPlan<'_>,
    byte_start: usize,
    byte_end: usize,
    context: MatchContext,
) {
    if byte_start >= byte_end || !plan.boundary.holds(text, byte_start, byte_end) {
        return;
    }
    let value = &text[byte_start..byte_end];
    if !(plan.validator)(value, context) {
        tracing::trace!(category = %plan.category, ?context, "match rejected by validator");
        return;
    }
    let confidence = match context {
        MatchContext::Anywhere => plan.confidence,
        MatchContext::NearKeyword => plan.keyword_confidence,
    };
    spans.push(Span::new(
        plan.category.clone(),
        value,
        index.to_char(byte_start),
        index.to_char(byte_end),
        confidence,
    ));
}

/// Merged character windows of `radius` around every keyword occurrence
pub(crate) fn keyword_windows(
    text: &str,
    index: &CharIndex<'_>,
    keywords: &[String],
    radius: usize,
) -> Vec<(usize, usize)> {
    if keywords.is_empty() {
        return Vec::new();
    }
    // One lowercase char per source char keeps offsets aligned
    let lowered: String = text
        .chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect();
    let lowered_index = CharIndex::new(&lowered);
    let total = index.char_len();

    let mut windows: Vec<(usize, usize)> = Vec::new();
    for keyword in keywords.iter().filter(|k| !k.is_empty()) {
        let keyword_chars = keyword.chars().count();
        for (byte, _) in lowered.match_indices(keyword.as_str()) {
            let start = lowered_index.to_char(byte);
            let end = start + keyword_chars;
            windows.push((start.saturating_sub(radius), (end + radius).min(total)));
        }
    }
    windows.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(windows.len());
    for (start, end) in windows {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Keep one span per `(text, start)`, chosen by the shared comparator
pub(crate) fn dedup_by_position(spans: Vec<Span>) -> Vec<Span> {
    let table = PriorityTable::flat();
    let mut best: HashMap<(String, usize), Span> = HashMap::with_capacity(spans.len());
    for span in spans {
        let key = (span.text.clone(), span.start);
        match best.get(&key) {
            Some(current) if compare_spans(&span, current, &table) != Ordering::Greater => {}
            _ => {
                best.insert(key, span);
            }
        }
    }
    let mut out: Vec<Span> = best.into_values().collect();
    out.sort_by(|a, b| {
        (a.start, a.end)
            .cmp(&(b.start, b.end))
            .then_with(|| a.category.cmp(&b.category))
    });
    out
}

/// Compile patterns, logging and skipping the ones that fail
pub(crate) fn compile_all(category: &Category, patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(category = %category, error = %e, "pattern failed to compile");
                None
            }
        })
        .collect()
}
