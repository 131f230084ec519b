//! Betting-odds recovery from the free text around a fixture.
//!
//! The portal renders odds either as an `H/D/A` slash triple
//! ("1.80 / 3.40 / 4.20", comma decimals on the German locale) or as three
//! loose numeric cells. Missing or unparseable odds are not an error.

use regex::Regex;
use std::sync::LazyLock;

static TRIPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+(?:[.,]\d+)?)\s*/\s*(\d+(?:[.,]\d+)?)\s*/\s*(\d+(?:[.,]\d+)?)\b").unwrap()
});

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:[.,]\d+)?\b").unwrap());

/// Parse a decimal number with either `.` or `,` as the separator.
/// Rejects anything that is not a plain unsigned decimal.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', ".");
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if s.matches('.').count() > 1 || s.starts_with('.') || s.ends_with('.') {
        return None;
    }
    s.parse().ok()
}

/// Extract (home, draw, away) odds from a container's visible text.
///
/// Prefers a slash triple; falls back to the first three standalone numeric
/// tokens in order. Returns `None` per slot when nothing usable is found.
pub fn extract_odds(text: &str) -> (Option<f64>, Option<f64>, Option<f64>) {
    if let Some(caps) = TRIPLE_RE.captures(text) {
        return (
            parse_decimal(&caps[1]),
            parse_decimal(&caps[2]),
            parse_decimal(&caps[3]),
        );
    }
    let nums: Vec<f64> = NUMBER_RE
        .find_iter(text)
        .filter_map(|m| parse_decimal(m.as_str()))
        .collect();
    if nums.len() >= 3 {
        (Some(nums[0]), Some(nums[1]), Some(nums[2]))
    } else {
        (None, None, None)
    }
}

/// Render odds for logs and prompts: "1.80/3.40/4.20", `-` for unknown slots.
pub fn odds_to_str(h: Option<f64>, d: Option<f64>, a: Option<f64>) -> String {
    fn fmt(x: Option<f64>) -> String {
        match x {
            Some(v) => format!("{v:.2}"),
            None => "-".to_string(),
        }
    }
    format!("{}/{}/{}", fmt(h), fmt(d), fmt(a))
}
