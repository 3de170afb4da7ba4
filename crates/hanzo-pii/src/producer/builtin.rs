//! Static pattern table for structured categories

use super::{compile_all, two_pass_scan, Boundary, MatchContext, ScanPlan, SpanProducer, Validator};
use crate::types::{Category, Span};
use regex::Regex;

/// One entry of the built-in pattern table
pub(crate) struct PatternSpec {
    pub category: Category,
    pub name: &'static str,
    /// Whole-text patterns
    pub patterns: &'static [&'static str],
    /// Looser patterns used inside keyword windows; empty reuses `patterns`
    pub keyword_patterns: &'static [&'static str],
    /// Lowercase domain keywords
    pub keywords: &'static [&'static str],
    pub validator: Validator,
    pub boundary: Boundary,
    pub confidence: f64,
    pub keyword_confidence: f64,
}

static BUILTIN_PATTERNS: [PatternSpec; 9] = [
    PatternSpec {
        category: Category::Email,
        name: "email",
        patterns: &[r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"],
        keyword_patterns: &[],
        keywords: &["email", "e-mail", "mail", "이메일", "메일"],
        validator: valid_email,
        boundary: Boundary::None,
        confidence: 0.95,
        keyword_confidence: 0.97,
    },
    PatternSpec {
        category: Category::Phone,
        name: "phone",
        patterns: &[
            r"(?:\+82[-.\s]?|0)(?:1[016789]|2|[3-6][1-5]|70)[-.\s]?\d{3,4}[-.\s]?\d{4}",
            r"\+1[-.\s]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}",
            r"\(?\d{3}\)?[-.\s]\d{3}[-.\s]\d{4}",
        ],
        keyword_patterns: &[r"\+?\d[\d\-.\s]{7,15}\d"],
        keywords: &[
            "phone", "tel", "mobile", "cell", "fax", "전화", "연락처", "휴대폰", "핸드폰", "휴대전화",
        ],
        validator: valid_phone,
        boundary: Boundary::Digit,
        confidence: 0.9,
        keyword_confidence: 0.75,
    },
    PatternSpec {
        category: Category::NationalId,
        name: "national_id",
        patterns: &[r"\d{6}[-\s]?\d{7}", r"\d{3}-\d{2}-\d{4}"],
        keyword_patterns: &[],
        keywords: &[
            "주민번호",
            "주민등록",
            "주민",
            "외국인등록",
            "resident registration",
            "rrn",
            "ssn",
            "social security",
        ],
        validator: valid_national_id,
        boundary: Boundary::Digit,
        confidence: 0.95,
        keyword_confidence: 0.8,
    },
    PatternSpec {
        category: Category::BankAccount,
        name: "bank_account",
        patterns: &[r"\d{3,6}-\d{2,6}-\d{2,7}(?:-\d{1,3})?"],
        keyword_patterns: &[r"\d{2,6}(?:[-\s]\d{2,7}){1,3}", r"\d{8,16}"],
        keywords: &["account", "acct", "bank", "계좌", "은행", "입금", "예금주"],
        validator: valid_bank_account,
        boundary: Boundary::Digit,
        confidence: 0.6,
        keyword_confidence: 0.85,
    },
    PatternSpec {
        category: Category::CardNumber,
        name: "card_number",
        patterns: &[
            r"\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}",
            r"\d{4}[-\s]?\d{6}[-\s]?\d{5}",
        ],
        keyword_patterns: &[],
        keywords: &["card", "credit", "visa", "master", "amex", "카드", "신용카드", "체크카드"],
        validator: valid_card,
        boundary: Boundary::Digit,
        confidence: 0.9,
        keyword_confidence: 0.8,
    },
    PatternSpec {
        category: Category::Passport,
        name: "passport",
        patterns: &[r"[MSRODG]\d{8}", r"[MSRODG]\d{3}[A-Z]\d{4}"],
        keyword_patterns: &[r"[A-Z]{1,2}\d{6,8}", r"[MSRODG]\d{3}[A-Z]\d{4}"],
        keywords: &["passport", "여권"],
        validator: accept_any,
        boundary: Boundary::Alnum,
        confidence: 0.7,
        keyword_confidence: 0.85,
    },
    PatternSpec {
        category: Category::DriverLicense,
        name: "driver_license",
        patterns: &[r"\d{2}-\d{2}-\d{6}-\d{2}"],
        keyword_patterns: &[r"\d{2}[-\s]?\d{2}[-\s]?\d{6}[-\s]?\d{2}"],
        keywords: &["driver", "license", "licence", "면허", "운전"],
        validator: valid_driver_license,
        boundary: Boundary::Digit,
        confidence: 0.85,
        keyword_confidence: 0.8,
    },
    PatternSpec {
        category: Category::Mac,
        name: "mac",
        patterns: &[r"[0-9A-Fa-f]{2}(?:[:-][0-9A-Fa-f]{2}){5}"],
        keyword_patterns: &[r"[0-9A-Fa-f]{2}(?:[:-][0-9A-Fa-f]{2}){5}", r"[0-9A-Fa-f]{12}"],
        keywords: &["mac", "맥주소", "hwaddr", "ether"],
        validator: accept_any,
        boundary: Boundary::Alnum,
        confidence: 0.9,
        keyword_confidence: 0.9,
    },
    PatternSpec {
        category: Category::Gps,
        name: "gps",
        patterns: &[r"-?\d{1,2}\.\d{4,}\s*,\s*-?\d{1,3}\.\d{4,}"],
        keyword_patterns: &[r"-?\d{1,3}\.\d{2,}\s*,\s*-?\d{1,3}\.\d{2,}"],
        keywords: &["gps", "lat", "lon", "coordinates", "좌표", "위도", "경도", "위치"],
        validator: valid_gps,
        boundary: Boundary::Digit,
        confidence: 0.85,
        keyword_confidence: 0.9,
    },
];

pub(crate) fn builtin_specs() -> &'static [PatternSpec] {
    &BUILTIN_PATTERNS
}

/// Detector for one entry of the pattern table
pub struct BuiltinDetector {
    spec: &'static PatternSpec,
    whole: Vec<Regex>,
    window: Vec<Regex>,
    keywords: Vec<String>,
    radius: usize,
}

impl BuiltinDetector {
    pub(crate) fn new(spec: &'static PatternSpec, radius: usize) -> Self {
        Self {
            spec,
            whole: compile_all(&spec.category, spec.patterns),
            window: compile_all(&spec.category, spec.keyword_patterns),
            keywords: spec.keywords.iter().map(|k| k.to_lowercase()).collect(),
            radius,
        }
    }

    /// Detector for a built-in category, if the table has one
    pub fn for_category(category: &Category, radius: usize) -> Option<Self> {
        builtin_specs()
            .iter()
            .find(|spec| &spec.category == category)
            .map(|spec| Self::new(spec, radius))
    }
}

impl SpanProducer for BuiltinDetector {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn categories(&self) -> Vec<Category> {
        vec![self.spec.category.clone()]
    }

    fn detect(&self, text: &str) -> Vec<Span> {
        if self.whole.is_empty() {
            return Vec::new();
        }
        two_pass_scan(
            text,
            &ScanPlan {
                category: &self.spec.category,
                whole: &self.whole,
                window: &self.window,
                keywords: &self.keywords,
                radius: self.radius,
                confidence: self.spec.confidence,
                keyword_confidence: self.spec.keyword_confidence,
                validator: self.spec.validator,
                boundary: self.spec.boundary,
            },
        )
    }
}

fn accept_any(_value: &str, _context: MatchContext) -> bool {
    true
}

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn digit_groups(value: &str) -> Vec<usize> {
    value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|group| !group.is_empty())
        .map(str::len)
        .collect()
}

fn number(digits: &[u32]) -> u32 {
    digits.iter().fold(0, |acc, d| acc * 10 + d)
}

/// Shaped like a domestic or international phone number
fn is_phone_shaped(value: &str) -> bool {
    if value.trim_start().starts_with('+') {
        return true;
    }
    let digits = digits_of(value);
    let leading_zero = digits.first() == Some(&0);
    match digit_groups(value).as_slice() {
        [a, b, c] => leading_zero && (2..=3).contains(a) && (3..=4).contains(b) && *c == 4,
        [_] => leading_zero && digits.get(1) == Some(&1) && (10..=11).contains(&digits.len()),
        _ => false,
    }
}

fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn is_valid_date(year: u32, month: u32, day: u32) -> bool {
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => return false,
    };
    (1..=days).contains(&day)
}

fn valid_email(value: &str, _context: MatchContext) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.starts_with('.') && !domain.starts_with('.') && !domain.contains("..")
        }
        None => false,
    }
}

fn valid_phone(value: &str, _context: MatchContext) -> bool {
    (9..=12).contains(&digits_of(value).len())
}

fn valid_national_id(value: &str, context: MatchContext) -> bool {
    if is_phone_shaped(value) {
        return false;
    }
    let digits = digits_of(value);
    match digits.len() {
        13 => valid_resident_number(&digits, context),
        9 => valid_ssn(&digits),
        _ => false,
    }
}

/// Korean resident registration number: YYMMDD-GNNNNNN
///
/// The gender digit fixes the century. Inside a keyword window the date
/// segment is not checked.
fn valid_resident_number(digits: &[u32], context: MatchContext) -> bool {
    let century = match digits[6] {
        1 | 2 | 5 | 6 => 1900,
        3 | 4 | 7 | 8 => 2000,
        _ => return false,
    };
    if context == MatchContext::NearKeyword {
        return true;
    }
    is_valid_date(
        century + number(&digits[0..2]),
        number(&digits[2..4]),
        number(&digits[4..6]),
    )
}

/// US social security number: AAA-GG-SSSS
fn valid_ssn(digits: &[u32]) -> bool {
    let area = number(&digits[0..3]);
    let group = number(&digits[3..5]);
    let serial = number(&digits[5..9]);
    area != 0 && area != 666 && area < 900 && group != 0 && serial != 0
}

fn valid_bank_account(value: &str, context: MatchContext) -> bool {
    if is_phone_shaped(value) {
        return false;
    }
    let len = digits_of(value).len();
    match context {
        MatchContext::Anywhere => (10..=14).contains(&len),
        MatchContext::NearKeyword => (8..=16).contains(&len),
    }
}

fn valid_card(value: &str, context: MatchContext) -> bool {
    let digits = digits_of(value);
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    match context {
        MatchContext::Anywhere => luhn_check(&digits),
        MatchContext::NearKeyword => true,
    }
}

fn luhn_check(digits: &[u32]) -> bool {
    let mut sum = 0;
    let mut double = false;

    for &digit in digits.iter().rev() {
        let mut d = digit;
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }

    sum % 10 == 0
}

/// Korean license: RR-YY-NNNNNN-CC with a region code of 11..=28
fn valid_driver_license(value: &str, context: MatchContext) -> bool {
    let digits = digits_of(value);
    if digits.len() != 12 {
        return false;
    }
    match context {
        MatchContext::Anywhere => (11..=28).contains(&number(&digits[0..2])),
        MatchContext::NearKeyword => true,
    }
}

fn valid_gps(value: &str, _context: MatchContext) -> bool {
    let Some((lat, lon)) = value.split_once(',') else {
        return false;
    };
    match (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
        (Ok(lat), Ok(lon)) => lat.abs() <= 90.0 && lon.abs() <= 180.0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(category: Category, text: &str) -> Vec<Span> {
        BuiltinDetector::for_category(&category, 40)
            .unwrap()
            .detect(text)
    }

    #[test]
    fn test_table_covers_structured_categories() {
        for category in Category::builtin() {
            let expected = !matches!(
                category,
                Category::Person | Category::Organization | Category::Location
            );
            assert_eq!(BuiltinDetector::for_category(&category, 40).is_some(), expected);
        }
    }

    #[test]
    fn test_all_builtin_patterns_compile() {
        for spec in builtin_specs() {
            for pattern in spec.patterns.iter().chain(spec.keyword_patterns) {
                assert!(Regex::new(pattern).is_ok(), "{} failed: {}", spec.name, pattern);
            }
        }
    }

    #[test]
    fn test_email() {
        let spans = detect(Category::Email, "Contact me at test@example.com please");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "test@example.com");
        assert_eq!((spans[0].start, spans[0].end), (14, 30));
    }

    #[test]
    fn test_korean_and_us_phones() {
        let spans = detect(Category::Phone, "휴대폰 010-1234-5678, office (555) 123-4567");
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert!(texts.contains(&"010-1234-5678"));
        assert!(texts.contains(&"(555) 123-4567"));
        let korean = spans.iter().find(|s| s.text == "010-1234-5678").unwrap();
        assert_eq!(korean.start, 4);
        assert_eq!(korean.confidence, 0.9);
    }

    #[test]
    fn test_resident_number_needs_valid_date_outside_keyword_window() {
        assert_eq!(detect(Category::NationalId, "번호 900101-1234567").len(), 1);
        assert!(detect(Category::NationalId, "번호 901234-1234567").is_empty());
        // Invalid gender digit
        assert!(detect(Category::NationalId, "번호 900101-9234567").is_empty());
    }

    #[test]
    fn test_resident_number_near_keyword_tolerates_date() {
        let spans = detect(Category::NationalId, "주민번호 901234-1234567");
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].start, spans[0].end), (5, 19));
        assert_eq!(spans[0].confidence, 0.8);

        // Gender digit is still enforced
        assert!(detect(Category::NationalId, "주민번호 901234-0234567").is_empty());
    }

    #[test]
    fn test_ssn() {
        assert_eq!(detect(Category::NationalId, "SSN: 123-45-6789").len(), 1);
        assert!(detect(Category::NationalId, "id 666-45-6789").is_empty());
        assert!(detect(Category::NationalId, "id 123-00-6789").is_empty());
    }

    #[test]
    fn test_phone_shaped_national_id_rejected() {
        assert!(is_phone_shaped("010-1234-5678"));
        assert!(is_phone_shaped("01012345678"));
        assert!(!is_phone_shaped("900101-1234567"));
        assert!(!valid_national_id("010-1234-5678", MatchContext::NearKeyword));
    }

    #[test]
    fn test_card_requires_luhn_outside_keyword_window() {
        assert_eq!(detect(Category::CardNumber, "4532-0151-1283-0366").len(), 1);
        assert!(detect(Category::CardNumber, "ref 1234-5678-9012-3456").is_empty());
        assert_eq!(
            detect(Category::CardNumber, "카드번호 1234-5678-9012-3456").len(),
            1
        );
    }

    #[test]
    fn test_bank_account_near_keyword() {
        let spans = detect(Category::BankAccount, "입금 계좌: 110-123-456789");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "110-123-456789");
        assert_eq!(spans[0].confidence, 0.85);

        // Phone-shaped numbers are not accounts
        assert!(detect(Category::BankAccount, "account 010-1234-5678").is_empty());
    }

    #[test]
    fn test_digit_run_not_cut() {
        assert!(detect(Category::NationalId, "99900101-12345678").is_empty());
    }

    #[test]
    fn test_passport_driver_license_mac_gps() {
        assert_eq!(detect(Category::Passport, "여권 M12345678").len(), 1);
        assert!(detect(Category::Passport, "XM12345678").is_empty());
        assert_eq!(detect(Category::DriverLicense, "11-12-123456-78").len(), 1);
        assert!(detect(Category::DriverLicense, "99-12-123456-78").is_empty());
        assert_eq!(detect(Category::Mac, "hw 00:1A:2B:3C:4D:5E").len(), 1);
        assert_eq!(detect(Category::Gps, "at 37.5665, 126.9780").len(), 1);
        assert!(detect(Category::Gps, "at 97.5665, 126.9780").is_empty());
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_check(&digits_of("4532015112830366")));
        assert!(!luhn_check(&digits_of("1234567890123456")));
    }

    #[test]
    fn test_dates() {
        assert!(is_valid_date(2000, 2, 29));
        assert!(!is_valid_date(1900, 2, 29));
        assert!(!is_valid_date(1990, 12, 34));
        assert!(!is_valid_date(1990, 13, 1));
    }
}
