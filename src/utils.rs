use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+(]?\s*\d[\d\s.,']*\)?$").expect("valid numeric pattern"));

/// True when a text cell reads as an amount (digits with optional sign,
/// parentheses and thousands/decimal separators).
pub fn looks_numeric(text: &str) -> bool {
    NUMERIC_LIKE.is_match(text.trim())
}

/// Parses an amount as exported by accounting software.
///
/// Handles `1,234.56`, `1.234,56`, `1 234,56`, `(123.00)` and stray currency
/// symbols. When only one kind of separator is present, a separator that
/// repeats, or a single one followed by exactly three digits, groups
/// thousands (`15.000`, `1,234`); otherwise it is the decimal point.
pub fn parse_amount(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let negative = trimmed.starts_with('-') || (trimmed.starts_with('(') && trimmed.ends_with(')'));

    let kept: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_dot = kept.rfind('.');
    let last_comma = kept.rfind(',');

    let canonical = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            if dot > comma {
                kept.replace(',', "")
            } else {
                kept.replace('.', "").replace(',', ".")
            }
        }
        (None, Some(comma)) => {
            if groups_thousands(&kept, ',', comma) {
                kept.replace(',', "")
            } else {
                kept.replace(',', ".")
            }
        }
        (Some(dot), None) => {
            if groups_thousands(&kept, '.', dot) {
                kept.replace('.', "")
            } else {
                kept
            }
        }
        (None, None) => kept,
    };

    let value: f64 = canonical.parse().ok()?;
    Some(if negative { -value } else { value })
}

fn groups_thousands(digits: &str, separator: char, last: usize) -> bool {
    digits.matches(separator).count() > 1 || digits.len() - last - 1 == 3
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
