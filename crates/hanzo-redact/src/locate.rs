//! Target location on a page and the canvas abstraction
//!
//! Every target goes through the same fallback chain; the first stage that
//! produces geometry wins:
//!
//! 1. supplied region
//! 2. exact text search over the page's fragments joined in order (one
//!    occurrence if an ordinal is given, else all)
//! 3. normalized match against whole fragments (case, whitespace, containment)
//! 4. search for any single whitespace-delimited token of the target
//!
//! A target that survives all four is reported as not found. That is a
//! per-target outcome, never an error for the batch.

use hanzo_pii::{BoundingBox, Category, RedactionTarget, TargetLocator};
use serde::Serialize;
use std::collections::BTreeMap;

/// Shortest normalized fragment considered by the fuzzy stage
const MIN_FUZZY_CHARS: usize = 2;

/// Shortest token considered by the token stage
const MIN_TOKEN_CHARS: usize = 2;

/// A run of text on a page with its box (top-left origin)
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub bbox: BoundingBox,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// Which fallback stage located a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateStage {
    Geometry,
    ExactText,
    Fuzzy,
    Token,
}

/// What happened to one redaction target
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetOutcome {
    Applied {
        stage: LocateStage,
        regions: Vec<BoundingBox>,
    },
    NotFound,
}

/// Per-target report, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetReport {
    pub target_index: usize,
    pub page_index: usize,
    pub category: Category,
    #[serde(flatten)]
    pub outcome: TargetOutcome,
}

impl TargetReport {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, TargetOutcome::Applied { .. })
    }

    pub fn stage(&self) -> Option<LocateStage> {
        match &self.outcome {
            TargetOutcome::Applied { stage, .. } => Some(*stage),
            TargetOutcome::NotFound => None,
        }
    }
}

/// A document that redaction marks can be drawn onto
///
/// Implementations keep their own page state; `fill` is called for every
/// located region and the redacted bytes come out of the concrete type.
pub trait RedactionCanvas {
    fn page_count(&self) -> usize;

    /// Searchable text on a page, in reading order
    fn fragments(&self, page_index: usize) -> Vec<TextFragment>;

    /// Mark a region for irreversible redaction
    fn fill(&mut self, page_index: usize, region: BoundingBox);
}

/// Locate one target among a page's fragments
///
/// Fragments are searched as one text joined by `separator`, the same way
/// the field layout joins fields, so a value split across fields is found
/// whole and an occurrence ordinal counts the same hits the anchor counted.
pub fn locate(
    fragments: &[TextFragment],
    locator: &TargetLocator,
    separator: char,
) -> Option<(LocateStage, Vec<BoundingBox>)> {
    let (text, instance_index) = match locator {
        TargetLocator::Region(bbox) => return Some((LocateStage::Geometry, vec![*bbox])),
        TargetLocator::Text {
            text,
            instance_index,
        } => (text.as_str(), *instance_index),
    };
    if text.trim().is_empty() {
        return None;
    }

    let page = PageText::new(fragments, separator);
    let mut hits = page.search(text);
    let exact = match instance_index {
        Some(i) if i < hits.len() => hits.swap_remove(i),
        Some(_) => Vec::new(),
        None => hits.into_iter().flatten().collect(),
    };
    if !exact.is_empty() {
        return Some((LocateStage::ExactText, exact));
    }

    if let Some(bbox) = fuzzy_match(fragments, text) {
        return Some((LocateStage::Fuzzy, vec![bbox]));
    }

    text.split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .map(|token| page.search(token).into_iter().flatten().collect::<Vec<_>>())
        .find(|regions| !regions.is_empty())
        .map(|regions| (LocateStage::Token, regions))
}

/// A page's fragments joined into one searchable string
struct PageText<'a> {
    fragments: &'a [TextFragment],
    text: String,
    /// Character range of each fragment in `text`
    ranges: Vec<(usize, usize)>,
}

impl<'a> PageText<'a> {
    fn new(fragments: &'a [TextFragment], separator: char) -> Self {
        let mut text = String::new();
        let mut ranges = Vec::with_capacity(fragments.len());
        let mut offset = 0;
        for (i, fragment) in fragments.iter().enumerate() {
            if i > 0 {
                text.push(separator);
                offset += 1;
            }
            let len = fragment.text.chars().count();
            text.push_str(&fragment.text);
            ranges.push((offset, offset + len));
            offset += len;
        }
        Self {
            fragments,
            text,
            ranges,
        }
    }

    /// Every occurrence of `needle`, each as slices of the fragments it covers
    fn search(&self, needle: &str) -> Vec<Vec<BoundingBox>> {
        if needle.is_empty() {
            return Vec::new();
        }
        let needle_chars = needle.chars().count();
        let mut hits = Vec::new();
        let mut chars_before = 0;
        let mut last_byte = 0;
        for (byte, _) in self.text.match_indices(needle) {
            chars_before += self.text[last_byte..byte].chars().count();
            last_byte = byte;
            let regions = self.regions(chars_before, chars_before + needle_chars);
            if !regions.is_empty() {
                hits.push(regions);
            }
        }
        hits
    }

    fn regions(&self, start: usize, end: usize) -> Vec<BoundingBox> {
        self.ranges
            .iter()
            .zip(self.fragments)
            .filter_map(|(&(from, to), fragment)| {
                let lo = start.max(from);
                let hi = end.min(to);
                (lo < hi).then(|| fragment.bbox.slice(lo - from, hi - from, to - from))
            })
            .collect()
    }
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn fuzzy_match(fragments: &[TextFragment], target: &str) -> Option<BoundingBox> {
    let target = normalize(target);
    if target.is_empty() {
        return None;
    }
    fragments.iter().find_map(|fragment| {
        let candidate = normalize(&fragment.text);
        if candidate.chars().count() < MIN_FUZZY_CHARS {
            return None;
        }
        (candidate == target || candidate.contains(&target) || target.contains(&candidate))
            .then_some(fragment.bbox)
    })
}

/// Apply targets page by page, filling every located region
///
/// `separator` must be the one the field layout was built with.
pub fn apply_targets<C: RedactionCanvas + ?Sized>(
    canvas: &mut C,
    targets: &[RedactionTarget],
    separator: char,
) -> Vec<TargetReport> {
    let mut by_page: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, target) in targets.iter().enumerate() {
        by_page.entry(target.page_index).or_default().push(i);
    }

    let page_count = canvas.page_count();
    let mut reports = Vec::with_capacity(targets.len());
    for (page_index, indices) in by_page {
        let fragments = if page_index < page_count {
            canvas.fragments(page_index)
        } else {
            tracing::warn!(page_index, page_count, "target page out of range");
            Vec::new()
        };

        for i in indices {
            let target = &targets[i];
            let located = if page_index < page_count {
                locate(&fragments, &target.locator, separator)
            } else {
                None
            };

            let outcome = match located {
                Some((stage, regions)) => {
                    for region in &regions {
                        canvas.fill(page_index, *region);
                    }
                    tracing::debug!(target_index = i, page_index, ?stage, "target applied");
                    TargetOutcome::Applied { stage, regions }
                }
                None => {
                    tracing::warn!(
                        target_index = i,
                        page_index,
                        category = %target.category,
                        "target not found"
                    );
                    TargetOutcome::NotFound
                }
            };
            reports.push(TargetReport {
                target_index: i,
                page_index,
                category: target.category.clone(),
                outcome,
            });
        }
    }

    reports.sort_by_key(|report| report.target_index);
    reports
}
