//! Locale-aware conversion of statement cells into decimals and dates.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

const CURRENCY_GLYPHS: &[char] = &['€', '$', '£', '¥', '₽', '₴', '₹', '¤'];
const CURRENCY_CODES: &[&str] = &["EUR", "USD", "GBP", "SEK", "NOK", "DKK", "PLN", "CHF"];

/// Layouts tried, in order, by [`probe_date`].
pub const PROBE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%Y%m%d",
    "%d.%m.%y",
    "%d %b %Y",
    "%b %d, %Y",
];

/// Parses a monetary cell.
///
/// Whitespace (including non-breaking spaces) and currency noise are
/// dropped, the thousands separator is removed, the decimal separator becomes
/// `.`, and `(12.00)` or a trailing `12.00-` mean a negative value.
pub fn parse_amount(
    raw: &str,
    decimal_separator: char,
    thousands_separator: Option<char>,
) -> Result<Decimal, NormalizeError> {
    let invalid = || NormalizeError::InvalidAmount(raw.trim().to_string());

    let mut s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_GLYPHS.contains(c))
        .collect();
    for code in CURRENCY_CODES {
        if let Some(rest) = s.strip_prefix(code) {
            s = rest.to_string();
        } else if let Some(rest) = s.strip_suffix(code) {
            s = rest.to_string();
        }
    }

    let (negative, body) = if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        if inner.starts_with(['-', '+']) {
            return Err(invalid());
        }
        (true, inner)
    } else if let Some(inner) = s.strip_suffix('-') {
        if inner.starts_with(['-', '+']) {
            return Err(invalid());
        }
        (true, inner)
    } else {
        (false, s.strip_prefix('+').unwrap_or(s.as_str()))
    };

    let mut cleaned: String = match thousands_separator {
        Some(sep) if sep != decimal_separator => body.chars().filter(|c| *c != sep).collect(),
        _ => body.to_string(),
    };
    if decimal_separator != '.' {
        cleaned = cleaned.replace(decimal_separator, ".");
    }

    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let value = Decimal::from_str(&cleaned).map_err(|_| invalid())?;
    Ok(if negative { -value } else { value })
}

/// Parses a date cell with the mapping's explicit layout. Layouts carrying a
/// time component are accepted and the time is discarded.
pub fn parse_date(raw: &str, layout: &str) -> Result<NaiveDate, NormalizeError> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, layout)
        .or_else(|_| NaiveDateTime::parse_from_str(s, layout).map(|dt| dt.date()))
        .map_err(|_| NormalizeError::InvalidDate(s.to_string()))
}

/// Best-effort parse of a free-form date: the first layout in
/// [`PROBE_LAYOUTS`] that succeeds wins.
pub fn probe_date(raw: &str) -> Result<NaiveDate, NormalizeError> {
    let s = raw.trim();
    PROBE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(s, layout).ok())
        .ok_or_else(|| NormalizeError::InvalidDate(s.to_string()))
}
