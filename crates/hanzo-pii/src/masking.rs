//! Masking policy
//!
//! [`render`] is the pure replacement function; [`MaskingEngine`] picks the
//! mode, mask character and template for a span from configuration and
//! per-request decisions.

use crate::config::MaskingConfig;
use crate::types::{Category, MaskingMode, Span, SpanGroup};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Template character that copies the next value character
pub const KEEP_MARKER: char = '#';

/// Replacement text for a matched value
pub fn render(
    value: &str,
    category: &Category,
    mode: MaskingMode,
    mask_char: char,
    pattern: Option<&str>,
) -> String {
    match mode {
        MaskingMode::Full => full_mask(category, mask_char),
        MaskingMode::Partial => partial_mask(value, category, mask_char),
        MaskingMode::Custom => match pattern {
            Some(template) if !template.is_empty() => custom_mask(value, template, mask_char),
            _ => full_mask(category, mask_char),
        },
    }
}

fn canonical_shape(category: &Category) -> Option<&'static str> {
    match category {
        Category::Email => Some("***@***.***"),
        Category::Phone => Some("***-****-****"),
        Category::NationalId => Some("******-*******"),
        Category::CardNumber => Some("****-****-****-****"),
        Category::BankAccount => Some("***-***-******"),
        Category::Passport => Some("*********"),
        Category::DriverLicense => Some("**-**-******-**"),
        Category::Mac => Some("**:**:**:**:**:**"),
        Category::Gps => Some("**.******, ***.******"),
        _ => None,
    }
}

/// Fixed placeholder in the category's canonical shape
///
/// The result depends only on the category, never on the value.
pub fn full_mask(category: &Category, mask_char: char) -> String {
    match canonical_shape(category) {
        Some(shape) => shape
            .chars()
            .map(|c| if c == '*' { mask_char } else { c })
            .collect(),
        None => std::iter::repeat(mask_char).take(3).collect(),
    }
}

/// Category-specific mask that keeps a diagnostic fragment
pub fn partial_mask(value: &str, category: &Category, mask_char: char) -> String {
    match category {
        Category::Email => match value.rsplit_once('@') {
            Some((local, domain)) => {
                let len = local.chars().count();
                let keep = if len > 2 { 2 } else { len.saturating_sub(1) };
                format!("{}@{}", keep_prefix(local, keep, mask_char), domain)
            }
            None => keep_prefix(value, default_keep(value), mask_char),
        },
        Category::Phone => mask_phone(value, mask_char),
        // Resident numbers keep the date segment, SSNs the last four
        Category::NationalId if digit_count(value) == 13 => {
            mask_digits(value, mask_char, |idx, _| idx < 6)
        }
        Category::NationalId | Category::BankAccount | Category::CardNumber => {
            mask_digits(value, mask_char, |idx, total| idx + 4 >= total)
        }
        Category::Person => keep_prefix(value, 1, mask_char),
        _ => keep_prefix(value, default_keep(value), mask_char),
    }
}

/// First three characters, but never the whole value
fn default_keep(value: &str) -> usize {
    3.min(value.chars().count().saturating_sub(1))
}

fn keep_prefix(value: &str, keep: usize, mask_char: char) -> String {
    value
        .chars()
        .enumerate()
        .map(|(idx, c)| if idx < keep { c } else { mask_char })
        .collect()
}

fn digit_count(value: &str) -> usize {
    value.chars().filter(char::is_ascii_digit).count()
}

/// Mask digits for which `keep(digit_index, digit_total)` is false
fn mask_digits(value: &str, mask_char: char, keep: impl Fn(usize, usize) -> bool) -> String {
    let total = digit_count(value);
    let mut idx = 0;
    value
        .chars()
        .map(|c| {
            if !c.is_ascii_digit() {
                return c;
            }
            let kept = keep(idx, total);
            idx += 1;
            if kept {
                c
            } else {
                mask_char
            }
        })
        .collect()
}

/// Hide the subscriber middle group (`010-****-5678`)
fn mask_phone(value: &str, mask_char: char) -> String {
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut run_start = None;
    for (idx, c) in value.chars().enumerate() {
        match (c.is_ascii_digit(), run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(start)) => {
                groups.push((start, idx));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        groups.push((start, value.chars().count()));
    }

    let hidden = match groups.len() {
        0 => return keep_prefix(value, default_keep(value), mask_char),
        1 => {
            let (start, end) = groups[0];
            if end - start < 8 {
                return keep_prefix(value, default_keep(value), mask_char);
            }
            (start + 3, end - 4)
        }
        n => groups[n - 2],
    };
    value
        .chars()
        .enumerate()
        .map(|(idx, c)| {
            if idx >= hidden.0 && idx < hidden.1 {
                mask_char
            } else {
                c
            }
        })
        .collect()
}

/// Template-driven mask
///
/// `#` keeps the next value character, `*` or `mask_char` hides it, and any
/// other template character is copied, swallowing the value's separator at
/// the same position. Output ends with the template; a short value leaves
/// keep markers empty and mask markers still pad.
pub fn custom_mask(value: &str, template: &str, mask_char: char) -> String {
    let mut chars = value.chars().peekable();
    let mut out = String::with_capacity(template.len());
    for t in template.chars() {
        if t == KEEP_MARKER {
            if let Some(c) = chars.next() {
                out.push(c);
            }
        } else if t == '*' || t == mask_char {
            chars.next();
            out.push(mask_char);
        } else {
            out.push(t);
            if chars.peek().is_some_and(|c| !c.is_alphanumeric()) {
                chars.next();
            }
        }
    }
    out
}

/// Modes chosen by the advisory collaborator for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingDecisions {
    /// Decisions for specific matched values
    pub by_value: HashMap<String, MaskingMode>,
    /// Decisions for whole categories
    pub by_category: HashMap<Category, MaskingMode>,
}

impl MaskingDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, value: impl Into<String>, mode: MaskingMode) -> Self {
        self.by_value.insert(value.into(), mode);
        self
    }

    pub fn with_category(mut self, category: Category, mode: MaskingMode) -> Self {
        self.by_category.insert(category, mode);
        self
    }

    pub fn mode_for(&self, span: &Span) -> Option<MaskingMode> {
        self.by_value
            .get(&span.text)
            .or_else(|| self.by_category.get(&span.category))
            .copied()
    }
}

/// Replacement preview for one span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskedPreview {
    pub category: Category,
    pub mode: MaskingMode,
    pub masked: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MaskingEngine {
    config: MaskingConfig,
}

impl MaskingEngine {
    pub fn new(config: MaskingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MaskingConfig {
        &self.config
    }

    /// Decision, then configured rule, then sensitivity default
    pub fn mode_for(&self, span: &Span, decisions: &MaskingDecisions) -> MaskingMode {
        if let Some(mode) = decisions.mode_for(span) {
            return mode;
        }
        if let Some(rule) = self.config.rules.get(&span.category) {
            return rule.mode;
        }
        if span.category.is_high_sensitivity() {
            MaskingMode::Full
        } else {
            MaskingMode::Partial
        }
    }

    pub fn preview(&self, span: &Span, decisions: &MaskingDecisions) -> MaskedPreview {
        let mode = self.mode_for(span, decisions);
        let rule = self.config.rules.get(&span.category);
        let mask_char = rule
            .and_then(|r| r.mask_char)
            .unwrap_or(self.config.default_mask_char);
        let pattern = rule.and_then(|r| r.custom_pattern.as_deref());
        MaskedPreview {
            category: span.category.clone(),
            mode,
            masked: render(&span.text, &span.category, mode, mask_char, pattern),
            start: span.start,
            end: span.end,
        }
    }

    pub fn preview_all(&self, group: &SpanGroup, decisions: &MaskingDecisions) -> Vec<MaskedPreview> {
        group.iter().map(|span| self.preview(span, decisions)).collect()
    }
}

/// Masked copy of a plain-text artifact
///
/// Previews are applied by character offset; ones that overlap an earlier
/// preview or run past the text are skipped.
pub fn apply_to_text(text: &str, previews: &[MaskedPreview]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut ordered: Vec<&MaskedPreview> = previews.iter().collect();
    ordered.sort_by_key(|p| (p.start, p.end));

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for preview in ordered {
        if preview.start < cursor || preview.start >= preview.end || preview.end > chars.len() {
            tracing::debug!(start = preview.start, end = preview.end, "skipping preview");
            continue;
        }
        out.extend(&chars[cursor..preview.start]);
        out.push_str(&preview.masked);
        cursor = preview.end;
    }
    out.extend(&chars[cursor..]);
    out
}
