//! Core types for Hanzo PII

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// Category of a detected PII occurrence
///
/// Serialized as its canonical upper-snake name (`"NATIONAL_ID"`), so it can
/// be used directly as a map key in JSON and TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Email address
    Email,
    /// Phone number
    Phone,
    /// National identification number (resident registration number, SSN)
    NationalId,
    /// Bank account number
    BankAccount,
    /// Payment card number
    CardNumber,
    /// Passport number
    Passport,
    /// Driver license number
    DriverLicense,
    /// Hardware MAC address
    Mac,
    /// GPS coordinate pair
    Gps,
    /// Person name
    Person,
    /// Organization name
    Organization,
    /// Location or street address
    Location,
    /// Category defined at runtime by configuration
    Custom(String),
}

impl Category {
    /// All built-in categories, in declaration order
    pub fn builtin() -> [Category; 12] {
        [
            Category::Email,
            Category::Phone,
            Category::NationalId,
            Category::BankAccount,
            Category::CardNumber,
            Category::Passport,
            Category::DriverLicense,
            Category::Mac,
            Category::Gps,
            Category::Person,
            Category::Organization,
            Category::Location,
        ]
    }

    /// Canonical upper-snake name
    pub fn as_str(&self) -> &str {
        match self {
            Category::Email => "EMAIL",
            Category::Phone => "PHONE",
            Category::NationalId => "NATIONAL_ID",
            Category::BankAccount => "BANK_ACCOUNT",
            Category::CardNumber => "CARD_NUMBER",
            Category::Passport => "PASSPORT",
            Category::DriverLicense => "DRIVER_LICENSE",
            Category::Mac => "MAC",
            Category::Gps => "GPS",
            Category::Person => "PERSON",
            Category::Organization => "ORGANIZATION",
            Category::Location => "LOCATION",
            Category::Custom(name) => name,
        }
    }

    /// Categories masked in full unless a decision says otherwise
    pub fn is_high_sensitivity(&self) -> bool {
        matches!(
            self,
            Category::NationalId
                | Category::CardNumber
                | Category::BankAccount
                | Category::Passport
                | Category::DriverLicense
        )
    }

    /// Whether this is a user-defined category
    pub fn is_custom(&self) -> bool {
        matches!(self, Category::Custom(_))
    }

    /// Parse a category name; unknown names become [`Category::Custom`]
    pub fn parse(name: &str) -> Self {
        let normalized = name.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "EMAIL" => Category::Email,
            "PHONE" => Category::Phone,
            "NATIONAL_ID" => Category::NationalId,
            "BANK_ACCOUNT" => Category::BankAccount,
            "CARD_NUMBER" => Category::CardNumber,
            "PASSPORT" => Category::Passport,
            "DRIVER_LICENSE" => Category::DriverLicense,
            "MAC" => Category::Mac,
            "GPS" => Category::Gps,
            "PERSON" => Category::Person,
            "ORGANIZATION" => Category::Organization,
            "LOCATION" => Category::Location,
            _ => Category::Custom(normalized),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Category::parse(s))
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Category::parse(name)
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Category::parse(&name)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

/// Axis-aligned rectangle in page coordinates (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Create a box, normalizing corner order
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Smallest box enclosing a polygon (e.g. an OCR quadrilateral)
    pub fn from_polygon(points: &[(f32, f32)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = Self::new(first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            bbox.x1 = bbox.x1.min(x);
            bbox.y1 = bbox.y1.min(y);
            bbox.x2 = bbox.x2.max(x);
            bbox.y2 = bbox.y2.max(y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// True when both boxes share a region of positive area
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x1 < other.x2 && other.x1 < self.x2 && self.y1 < other.y2 && other.y1 < self.y2
    }

    /// Clamp to `[0, width] x [0, height]`
    pub fn clamp(&self, width: f32, height: f32) -> BoundingBox {
        BoundingBox {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }

    /// Horizontal slice covering characters `start..end` of `total`
    ///
    /// Assumes glyphs of equal width, which is what OCR fields and PDF text
    /// runs give us without font metrics.
    pub fn slice(&self, start: usize, end: usize, total: usize) -> BoundingBox {
        if total == 0 || start >= end {
            return *self;
        }
        let unit = self.width() / total as f32;
        BoundingBox {
            x1: self.x1 + unit * start.min(total) as f32,
            y1: self.y1,
            x2: self.x1 + unit * end.min(total) as f32,
            y2: self.y2,
        }
    }
}

/// A detected PII occurrence
///
/// `start`/`end` are character offsets (Unicode scalar values) into the text
/// the producer scanned, half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub category: Category,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_index: Option<usize>,
}

impl Span {
    /// Create an unanchored span; confidence is clamped to `[0, 1]`
    pub fn new(
        category: Category,
        text: impl Into<String>,
        start: usize,
        end: usize,
        confidence: f64,
    ) -> Self {
        Self {
            category,
            text: text.into(),
            start,
            end,
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
            page_index: None,
            bbox: None,
            instance_index: None,
        }
    }

    /// Length of the offset range in characters
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Offsets are well-formed and agree with the matched text
    pub fn is_valid(&self) -> bool {
        self.start < self.end && self.text.chars().count() == self.len()
    }

    /// Half-open range overlap
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Copy carrying a resolved document location
    pub fn with_anchor(&self, page_index: usize, bbox: BoundingBox) -> Span {
        Span {
            page_index: Some(page_index),
            bbox: Some(bbox),
            instance_index: None,
            ..self.clone()
        }
    }

    /// Copy carrying a page and occurrence ordinal, for text search
    pub fn with_instance(&self, page_index: usize, instance_index: usize) -> Span {
        Span {
            page_index: Some(page_index),
            bbox: None,
            instance_index: Some(instance_index),
            ..self.clone()
        }
    }
}

/// Ordered, conflict-free set of spans
///
/// Only the resolver and the anchor construct groups, so the invariant
/// (sorted by `(start, end)`, no overlaps) holds for every value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpanGroup {
    spans: Vec<Span>,
}

impl SpanGroup {
    pub(crate) fn from_resolved(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Span> {
        self.spans.iter()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn into_vec(self) -> Vec<Span> {
        self.spans
    }

    /// Spans of a single category
    pub fn by_category(&self, category: &Category) -> Vec<&Span> {
        self.spans
            .iter()
            .filter(|s| &s.category == category)
            .collect()
    }
}

impl<'a> IntoIterator for &'a SpanGroup {
    type Item = &'a Span;
    type IntoIter = std::slice::Iter<'a, Span>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans.iter()
    }
}

/// One OCR-extracted text fragment with its location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentField {
    pub page_index: usize,
    pub text: String,
    pub bbox: BoundingBox,
}

impl DocumentField {
    pub fn new(page_index: usize, text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            page_index,
            text: text.into(),
            bbox,
        }
    }

    /// Build from an OCR polygon; an empty polygon gives a zero box
    pub fn from_polygon(page_index: usize, text: impl Into<String>, polygon: &[(f32, f32)]) -> Self {
        Self::new(
            page_index,
            text,
            BoundingBox::from_polygon(polygon).unwrap_or_default(),
        )
    }
}

/// How a redaction target is found on its page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetLocator {
    /// Exact geometry
    Region(BoundingBox),
    /// Text to search for, optionally a specific occurrence
    Text {
        text: String,
        instance_index: Option<usize>,
    },
}

/// Unit of work for the redaction renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionTarget {
    pub page_index: usize,
    pub locator: TargetLocator,
    pub category: Category,
}

impl RedactionTarget {
    pub fn region(page_index: usize, bbox: BoundingBox, category: Category) -> Self {
        Self {
            page_index,
            locator: TargetLocator::Region(bbox),
            category,
        }
    }

    pub fn text(
        page_index: usize,
        text: impl Into<String>,
        instance_index: Option<usize>,
        category: Category,
    ) -> Self {
        Self {
            page_index,
            locator: TargetLocator::Text {
                text: text.into(),
                instance_index,
            },
            category,
        }
    }
}

/// Masking strategy for a matched value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskingMode {
    /// Canonical fixed-shape placeholder
    Full,
    /// Keep a diagnostic fragment
    Partial,
    /// Template-driven
    Custom,
}

impl std::fmt::Display for MaskingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaskingMode::Full => write!(f, "full"),
            MaskingMode::Partial => write!(f, "partial"),
            MaskingMode::Custom => write!(f, "custom"),
        }
    }
}
