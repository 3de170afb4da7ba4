//! Span resolution
//!
//! Merges candidates from every producer into one ordered, conflict-free
//! [`SpanGroup`]. Overlapping spans are decided by [`compare_spans`], the
//! same comparator producers use to de-duplicate their own passes.

use crate::config::ResolutionConfig;
use crate::types::{Category, Span, SpanGroup};
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;

/// Rank of each category when spans of different categories collide
///
/// Built from an ordered list, first entry highest. Categories not listed
/// rank 0, below every listed one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorityTable {
    ranks: HashMap<Category, usize>,
}

impl PriorityTable {
    pub fn new(order: impl IntoIterator<Item = Category>) -> Self {
        let order: Vec<Category> = order.into_iter().collect();
        let total = order.len();
        let mut ranks = HashMap::with_capacity(total);
        for (position, category) in order.into_iter().enumerate() {
            // Earlier duplicates keep their higher rank
            ranks.entry(category).or_insert(total - position);
        }
        Self { ranks }
    }

    /// Every category ranks equally
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ResolutionConfig) -> Self {
        Self::new(config.priority.iter().cloned())
    }

    pub fn rank(&self, category: &Category) -> usize {
        self.ranks.get(category).copied().unwrap_or(0)
    }
}

/// Shared tie-break: `Greater` means `a` should be kept over `b`
///
/// Higher priority rank wins, then the longer match, then the higher
/// confidence.
pub fn compare_spans(a: &Span, b: &Span, table: &PriorityTable) -> Ordering {
    table
        .rank(&a.category)
        .cmp(&table.rank(&b.category))
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.confidence.total_cmp(&b.confidence))
}

/// How two offset ranges relate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    None,
    Identical,
    /// First range contains the second
    Contains,
    /// First range lies inside the second
    ContainedBy,
    Partial,
}

pub fn classify_overlap(a: &Span, b: &Span) -> Overlap {
    if !a.overlaps(b) {
        Overlap::None
    } else if a.start == b.start && a.end == b.end {
        Overlap::Identical
    } else if a.start <= b.start && b.end <= a.end {
        Overlap::Contains
    } else if b.start <= a.start && a.end <= b.end {
        Overlap::ContainedBy
    } else {
        Overlap::Partial
    }
}

/// Overlap resolver
#[derive(Debug, Clone, Default)]
pub struct SpanResolver {
    table: PriorityTable,
}

impl SpanResolver {
    pub fn new(table: PriorityTable) -> Self {
        Self { table }
    }

    pub fn from_config(config: &ResolutionConfig) -> Self {
        Self::new(PriorityTable::from_config(config))
    }

    pub fn table(&self) -> &PriorityTable {
        &self.table
    }

    /// Resolve candidates into a conflict-free group
    pub fn resolve(&self, spans: impl IntoIterator<Item = Span>) -> SpanGroup {
        let mut candidates: Vec<Span> = spans
            .into_iter()
            .filter(|span| {
                let valid = span.is_valid();
                if !valid {
                    tracing::trace!(
                        category = %span.category,
                        start = span.start,
                        end = span.end,
                        "dropping malformed span"
                    );
                }
                valid
            })
            .collect();

        // Total order so the outcome never depends on input order
        candidates.sort_by(|a, b| {
            (a.start, Reverse(a.len()))
                .cmp(&(b.start, Reverse(b.len())))
                .then_with(|| compare_spans(b, a, &self.table))
                .then_with(|| a.category.cmp(&b.category))
                .then_with(|| a.text.cmp(&b.text))
        });

        let mut accepted: Vec<Span> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let conflicts: Vec<usize> = accepted
                .iter()
                .enumerate()
                .filter(|(_, kept)| kept.overlaps(&candidate))
                .map(|(idx, _)| idx)
                .collect();

            if conflicts.is_empty() {
                accepted.push(candidate);
                continue;
            }

            let wins = conflicts.iter().all(|&idx| {
                compare_spans(&candidate, &accepted[idx], &self.table) == Ordering::Greater
            });
            for &idx in &conflicts {
                let (kept, dropped) = if wins {
                    (&candidate, &accepted[idx])
                } else {
                    (&accepted[idx], &candidate)
                };
                tracing::debug!(
                    kept = %kept.category,
                    dropped = %dropped.category,
                    overlap = ?classify_overlap(kept, dropped),
                    "resolved overlapping spans"
                );
            }
            if wins {
                for idx in conflicts.into_iter().rev() {
                    accepted.remove(idx);
                }
                accepted.push(candidate);
            }
        }

        accepted.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
        SpanGroup::from_resolved(accepted)
    }

    /// Merge several producer groups with the same tie-break as `resolve`
    pub fn merge(&self, groups: impl IntoIterator<Item = SpanGroup>) -> SpanGroup {
        self.resolve(groups.into_iter().flat_map(SpanGroup::into_vec))
    }
}
