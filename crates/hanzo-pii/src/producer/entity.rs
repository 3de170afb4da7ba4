//! Person / organization / location tagging
//!
//! Two sources: gazetteers from [`EntityLexicon`] and contextual patterns
//! (honorifics, name labels, corporate suffixes, Korean addresses). The
//! pattern's first capture group, when present, is the entity itself.

use super::{dedup_by_position, SpanProducer};
use crate::config::EntityLexicon;
use crate::text::CharIndex;
use crate::types::{Category, Span};
use regex::Regex;

const GAZETTEER_CONFIDENCE: f64 = 0.9;

static CONTEXT_RULES: [(Category, &str, f64); 8] = [
    (
        Category::Person,
        r"\b(?:Mr|Mrs|Ms|Miss|Dr|Prof)\.?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)",
        0.75,
    ),
    (
        Category::Person,
        r"(?:성명|이름|(?i:name))\s*[:：]\s*([가-힣]{2,4}|[A-Z][a-z]+\s[A-Z][a-z]+)",
        0.8,
    ),
    (Category::Person, r"([가-힣]{2,4})\s?(?:님|씨)", 0.6),
    (
        Category::Organization,
        r"([A-Z][A-Za-z&]*(?:\s+[A-Z][A-Za-z&]*)*\s+(?:Inc|Corp|Corporation|LLC|Ltd|Co)\.?)",
        0.7,
    ),
    (
        Category::Organization,
        r"((?:주식회사|㈜)\s?[가-힣A-Za-z0-9]+|[가-힣A-Za-z0-9]+(?:주식회사|㈜))",
        0.75,
    ),
    (
        Category::Organization,
        r"([가-힣]{2,}(?:은행|대학교|병원|재단))",
        0.6,
    ),
    (
        Category::Location,
        r"((?:서울|부산|대구|인천|광주|대전|울산|세종|경기|강원|충북|충남|전북|전남|경북|경남|제주)[가-힣]*\s[가-힣]+(?:시|군|구)(?:\s[가-힣]+(?:구|읍|면|동))?(?:\s[가-힣0-9]+(?:로|길))?(?:\s\d+(?:-\d+)?)?)",
        0.75,
    ),
    (
        Category::Location,
        r"(\d{1,5}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr)\b\.?)",
        0.7,
    ),
];

struct EntityRule {
    category: Category,
    regex: Regex,
    confidence: f64,
}

/// Named-entity producer
pub struct EntityDetector {
    rules: Vec<EntityRule>,
}

impl EntityDetector {
    pub fn new(lexicon: &EntityLexicon) -> Self {
        let mut rules = Vec::new();
        for (category, terms) in [
            (Category::Person, &lexicon.persons),
            (Category::Organization, &lexicon.organizations),
            (Category::Location, &lexicon.locations),
        ] {
            if let Some(regex) = gazetteer(&category, terms) {
                rules.push(EntityRule {
                    category,
                    regex,
                    confidence: GAZETTEER_CONFIDENCE,
                });
            }
        }
        for (category, pattern, confidence) in CONTEXT_RULES.iter() {
            match Regex::new(pattern) {
                Ok(regex) => rules.push(EntityRule {
                    category: category.clone(),
                    regex,
                    confidence: *confidence,
                }),
                Err(e) => {
                    tracing::warn!(category = %category, error = %e, "entity pattern failed to compile")
                }
            }
        }
        Self { rules }
    }
}

/// One alternation over every term, longest first
fn gazetteer(category: &Category, terms: &[String]) -> Option<Regex> {
    let mut terms: Vec<&str> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return None;
    }
    terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    terms.dedup();

    let alternation = terms
        .iter()
        .map(|term| {
            // Hangul runs into suffixes (홍길동님), so only ASCII terms get word boundaries
            if term.is_ascii() {
                format!(r"\b{}\b", regex::escape(term))
            } else {
                regex::escape(term)
            }
        })
        .collect::<Vec<_>>()
        .join("|");

    match Regex::new(&format!("({alternation})")) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!(category = %category, error = %e, "gazetteer failed to compile");
            None
        }
    }
}

impl SpanProducer for EntityDetector {
    fn name(&self) -> &str {
        "entities"
    }

    fn categories(&self) -> Vec<Category> {
        vec![Category::Person, Category::Organization, Category::Location]
    }

    fn detect(&self, text: &str) -> Vec<Span> {
        if text.is_empty() {
            return Vec::new();
        }
        let index = CharIndex::new(text);
        let mut spans = Vec::new();
        for rule in &self.rules {
            for caps in rule.regex.captures_iter(text) {
                let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                let value = m.as_str().trim_end_matches([' ', '.']);
                if value.chars().count() < 2 {
                    continue;
                }
                let start = index.to_char(m.start());
                spans.push(Span::new(
                    rule.category.clone(),
                    value,
                    start,
                    start + value.chars().count(),
                    rule.confidence,
                ));
            }
        }
        dedup_by_position(spans)
    }
}
