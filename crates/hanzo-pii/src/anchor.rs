//! Coordinate anchoring
//!
//! Maps a span's character range in the flat text back to the OCR field it
//! came from. The flat text is the fields joined by a single separator, so
//! every field owns a fixed range of it:
//!
//! ```text
//! fields: "John"   "Doe"    "Doe"(p1)
//! flat:   John␣Doe␣Doe
//!         0   4 5  8 9  12
//! ```
//!
//! A span anchors to at most one field. Exact matches win over containment,
//! and identical text on other fields is never considered.

use crate::config::AnchorConfig;
use crate::text::{find_char_offsets, CharIndex};
use crate::types::{BoundingBox, DocumentField, RedactionTarget, Span, SpanGroup};
use serde::Serialize;

/// Character range a field occupies in the flat text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldRange {
    start: usize,
    end: usize,
}

impl FieldRange {
    fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Flat text rebuilt from fields, with each field's offsets
#[derive(Debug, Clone)]
pub struct FieldLayout {
    fields: Vec<DocumentField>,
    ranges: Vec<FieldRange>,
    text: String,
    separator: char,
}

impl FieldLayout {
    pub fn build(fields: Vec<DocumentField>, separator: char) -> Self {
        let mut text = String::new();
        let mut ranges = Vec::with_capacity(fields.len());
        let mut offset = 0;
        for (idx, field) in fields.iter().enumerate() {
            if idx > 0 {
                text.push(separator);
                offset += 1;
            }
            let len = field.text.chars().count();
            text.push_str(&field.text);
            ranges.push(FieldRange {
                start: offset,
                end: offset + len,
            });
            offset += len;
        }
        Self {
            fields,
            ranges,
            text,
            separator,
        }
    }

    /// The text producers should scan
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fields(&self) -> &[DocumentField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Text of one page, fields joined in order
    pub fn page_text(&self, page_index: usize) -> String {
        self.fields
            .iter()
            .filter(|f| f.page_index == page_index)
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.separator.to_string())
    }

    fn field_at(&self, offset: usize) -> Option<usize> {
        self.ranges.iter().position(|r| r.contains(offset))
    }
}

/// How a span matched its field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    /// Field starts at the span and has the same text
    Exact,
    /// Span lies inside the field at the implied offset
    Contained,
}

/// Physical location of a span
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub page_index: usize,
    pub bbox: BoundingBox,
    pub field_index: usize,
    pub kind: AnchorKind,
}

/// Spans split by how they will be redacted
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnchorPlan {
    /// Derived copies carrying page and geometry or occurrence ordinal
    pub spans: Vec<Span>,
    pub targets: Vec<RedactionTarget>,
    /// Spans with no document location
    pub misses: Vec<Span>,
}

pub struct CoordinateAnchor {
    layout: FieldLayout,
    narrow_to_span: bool,
}

impl CoordinateAnchor {
    pub fn new(fields: Vec<DocumentField>, config: &AnchorConfig) -> Self {
        Self {
            layout: FieldLayout::build(fields, config.separator),
            narrow_to_span: config.narrow_to_span,
        }
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    /// Locate a span; `None` means it must be found by text search
    pub fn anchor(&self, span: &Span) -> Option<Anchor> {
        let fields = &self.layout.fields;
        let ranges = &self.layout.ranges;

        let exact = ranges
            .iter()
            .zip(fields)
            .position(|(range, field)| range.start == span.start && field.text == span.text);
        if let Some(idx) = exact {
            return Some(Anchor {
                page_index: fields[idx].page_index,
                bbox: fields[idx].bbox,
                field_index: idx,
                kind: AnchorKind::Exact,
            });
        }

        let span_len = span.len();
        for (idx, (range, field)) in ranges.iter().zip(fields).enumerate() {
            if !range.contains(span.start) {
                continue;
            }
            let relative = span.start - range.start;
            let field_len = range.end - range.start;
            if relative + span_len > field_len {
                continue;
            }
            if CharIndex::new(&field.text).slice(relative, relative + span_len) != span.text {
                continue;
            }
            let bbox = if self.narrow_to_span {
                field.bbox.slice(relative, relative + span_len, field_len)
            } else {
                field.bbox
            };
            return Some(Anchor {
                page_index: field.page_index,
                bbox,
                field_index: idx,
                kind: AnchorKind::Contained,
            });
        }

        tracing::debug!(category = %span.category, start = span.start, "span not anchored");
        None
    }

    /// Page of an unanchored span and its ordinal among identical text there
    pub fn locate_page(&self, span: &Span) -> Option<(usize, usize)> {
        let idx = self.layout.field_at(span.start).or_else(|| {
            // Spans starting on a separator belong to the next field
            self.layout.ranges.iter().position(|r| r.start > span.start)
        })?;
        let page_index = self.layout.fields[idx].page_index;

        let mut local_start = 0;
        for (i, (range, field)) in self
            .layout
            .ranges
            .iter()
            .zip(&self.layout.fields)
            .enumerate()
        {
            if field.page_index != page_index {
                continue;
            }
            if i == idx {
                local_start += span.start.saturating_sub(range.start);
                break;
            }
            local_start += field.text.chars().count() + 1;
        }

        let page_text = self.layout.page_text(page_index);
        let instance = find_char_offsets(&page_text, &span.text)
            .into_iter()
            .filter(|&offset| offset < local_start)
            .count();
        Some((page_index, instance))
    }

    /// Turn resolved spans into redaction targets
    pub fn targets_for(&self, group: &SpanGroup) -> AnchorPlan {
        let mut plan = AnchorPlan::default();
        for span in group {
            if let Some(anchor) = self.anchor(span) {
                plan.targets.push(RedactionTarget::region(
                    anchor.page_index,
                    anchor.bbox,
                    span.category.clone(),
                ));
                plan.spans.push(span.with_anchor(anchor.page_index, anchor.bbox));
            } else if let Some((page_index, instance)) = self.locate_page(span) {
                plan.targets.push(RedactionTarget::text(
                    page_index,
                    span.text.clone(),
                    Some(instance),
                    span.category.clone(),
                ));
                plan.spans.push(span.with_instance(page_index, instance));
            } else {
                tracing::warn!(category = %span.category, start = span.start, "no document location for span");
                plan.misses.push(span.clone());
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SpanResolver;
    use crate::types::{Category, TargetLocator};

    fn field(page: usize, text: &str, x: f32) -> DocumentField {
        DocumentField::new(page, text, BoundingBox::new(x, 0.0, x + 10.0 * text.chars().count() as f32, 10.0))
    }

    fn anchor_for(fields: Vec<DocumentField>) -> CoordinateAnchor {
        CoordinateAnchor::new(fields, &AnchorConfig::default())
    }

    #[test]
    fn test_layout_offsets() {
        let layout = FieldLayout::build(
            vec![field(0, "John", 0.0), field(0, "Doe", 50.0), field(1, "Doe", 0.0)],
            ' ',
        );
        assert_eq!(layout.text(), "John Doe Doe");
        assert_eq!(layout.page_text(0), "John Doe");
        assert_eq!(layout.page_text(1), "Doe");
    }

    #[test]
    fn test_exact_anchor_ignores_duplicate_text_elsewhere() {
        let anchor = anchor_for(vec![
            field(0, "John", 0.0),
            field(0, "Doe", 50.0),
            field(1, "Doe", 0.0),
        ]);
        let span = Span::new(Category::Person, "Doe", 5, 8, 0.9);
        let found = anchor.anchor(&span).unwrap();
        assert_eq!(found.page_index, 0);
        assert_eq!(found.field_index, 1);
        assert_eq!(found.kind, AnchorKind::Exact);
        assert_eq!(found.bbox.x1, 50.0);

        let second = Span::new(Category::Person, "Doe", 9, 12, 0.9);
        assert_eq!(anchor.anchor(&second).unwrap().page_index, 1);
    }

    #[test]
    fn test_contained_anchor_and_narrowing() {
        let fields = vec![field(0, "Tel 010-1234-5678", 0.0)];
        let span = Span::new(Category::Phone, "010-1234-5678", 4, 17, 0.9);

        let plain = anchor_for(fields.clone()).anchor(&span).unwrap();
        assert_eq!(plain.kind, AnchorKind::Contained);
        assert_eq!(plain.bbox, BoundingBox::new(0.0, 0.0, 170.0, 10.0));

        let config = AnchorConfig {
            narrow_to_span: true,
            ..AnchorConfig::default()
        };
        let narrowed = CoordinateAnchor::new(fields, &config).anchor(&span).unwrap();
        assert_eq!(narrowed.bbox.x1, 40.0);
        assert_eq!(narrowed.bbox.x2, 170.0);
    }

    #[test]
    fn test_text_mismatch_is_not_anchored() {
        let anchor = anchor_for(vec![field(0, "John", 0.0), field(0, "Doe", 50.0)]);
        assert!(anchor.anchor(&Span::new(Category::Person, "Jane", 0, 4, 0.9)).is_none());
        // Crosses the field boundary
        assert!(anchor
            .anchor(&Span::new(Category::Person, "John Doe", 0, 8, 0.9))
            .is_none());
    }

    #[test]
    fn test_locate_page_counts_earlier_occurrences() {
        let anchor = anchor_for(vec![
            field(0, "Kim", 0.0),
            field(0, "met Kim Lee", 40.0),
            field(1, "Kim Lee", 0.0),
        ]);
        let span = Span::new(Category::Person, "Kim Lee", 8, 15, 0.8);
        assert!(anchor.anchor(&span).is_some());

        let crossing = Span::new(Category::Person, "Kim met", 0, 7, 0.8);
        assert_eq!(anchor.locate_page(&crossing), Some((0, 0)));

        let later = Span::new(Category::Person, "Kim", 8, 11, 0.8);
        assert_eq!(anchor.locate_page(&later), Some((0, 1)));
    }

    #[test]
    fn test_targets_for_mixes_geometry_text_and_misses() {
        let anchor = anchor_for(vec![field(0, "John", 0.0), field(0, "Doe", 50.0)]);
        let group = SpanResolver::default().resolve(vec![
            Span::new(Category::Person, "John Doe", 0, 8, 0.9),
        ]);
        let plan = anchor.targets_for(&group);
        assert_eq!(plan.targets.len(), 1);
        assert!(matches!(
            &plan.targets[0].locator,
            TargetLocator::Text { text, instance_index: Some(0) } if text == "John Doe"
        ));

        let anchored = anchor.targets_for(&SpanResolver::default().resolve(vec![
            Span::new(Category::Person, "Doe", 5, 8, 0.9),
        ]));
        assert!(matches!(anchored.targets[0].locator, TargetLocator::Region(_)));
        assert_eq!(anchored.spans[0].page_index, Some(0));

        let empty = anchor_for(Vec::new());
        let missed = empty.targets_for(&SpanResolver::default().resolve(vec![
            Span::new(Category::Person, "Doe", 5, 8, 0.9),
        ]));
        assert!(missed.targets.is_empty());
        assert_eq!(missed.misses.len(), 1);
    }
}
