//! Monetary amounts in minor units (hundredths).
//!
//! Marketplace exports write amounts as `₹1,234.50`, `Rs. 1234.5`, `(200.00)`
//! or plain `1234.5`. Everything is parsed as a decimal, rounded to two places
//! (midpoint away from zero) and carried as `i64` minor units.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Outcome of reading one amount cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountCell {
    Value(i64),
    Blank,
    Invalid,
}

const CURRENCY_MARKERS: &[&str] = &["INR", "Rs.", "Rs", "USD", "₹", "$", "€", "£"];

/// Parse a cell into minor units.
pub fn parse_cell(raw: &str) -> AmountCell {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return AmountCell::Blank;
    }
    match parse_minor(trimmed) {
        Some(v) => AmountCell::Value(v),
        None => AmountCell::Invalid,
    }
}

/// Parse a decimal amount into minor units. `None` when not a number.
pub fn parse_minor(raw: &str) -> Option<i64> {
    let mut s = raw.trim().to_string();

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
        negative = true;
        s = s[1..s.len() - 1].trim().to_string();
    }

    for marker in CURRENCY_MARKERS {
        if let Some(rest) = s.strip_prefix(marker) {
            s = rest.trim_start().to_string();
        }
        if let Some(rest) = s.strip_suffix(marker) {
            s = rest.trim_end().to_string();
        }
    }

    // Sign may sit before the currency marker: "-₹200"
    if let Some(rest) = s.strip_prefix('-') {
        let rest = rest.trim_start();
        if let Some(stripped) = CURRENCY_MARKERS.iter().find_map(|m| rest.strip_prefix(m)) {
            s = format!("-{}", stripped.trim_start());
        }
    }

    let cleaned: String = s.chars().filter(|c| *c != ',' && *c != '_' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;
    let value = if negative { -value } else { value };

    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.checked_mul(Decimal::ONE_HUNDRED)?.to_i64()
}

/// Render minor units as a plain two-decimal amount: `-1234.50`.
pub fn format_minor(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Render minor units with thousands separators: `-1,234.50`.
pub fn format_minor_grouped(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let units = (abs / 100).to_string();

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, ch) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{:02}", abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_numbers() {
        assert_eq!(parse_minor("1000"), Some(100_000));
        assert_eq!(parse_minor("12.5"), Some(1_250));
        assert_eq!(parse_minor("-0.01"), Some(-1));
        assert_eq!(parse_minor("  700.00 "), Some(70_000));
    }

    #[test]
    fn currency_and_separators() {
        assert_eq!(parse_minor("₹1,234.50"), Some(123_450));
        assert_eq!(parse_minor("Rs. 1,00,000"), Some(10_000_000));
        assert_eq!(parse_minor("INR 250"), Some(25_000));
        assert_eq!(parse_minor("250 INR"), Some(25_000));
        assert_eq!(parse_minor("-₹200"), Some(-20_000));
        assert_eq!(parse_minor("$ 5"), Some(500));
    }

    #[test]
    fn accounting_negative() {
        assert_eq!(parse_minor("(200.00)"), Some(-20_000));
        assert_eq!(parse_minor("(₹1,000)"), Some(-100_000));
    }

    #[test]
    fn rounding_to_two_places() {
        assert_eq!(parse_minor("0.005"), Some(1));
        assert_eq!(parse_minor("0.004"), Some(0));
        assert_eq!(parse_minor("-0.005"), Some(-1));
        assert_eq!(parse_minor("1e3"), Some(100_000));
    }

    #[test]
    fn non_numeric_rejected() {
        assert_eq!(parse_minor("N/A"), None);
        assert_eq!(parse_minor("twelve"), None);
        assert_eq!(parse_minor("12abc"), None);
        assert_eq!(parse_minor("₹"), None);
    }

    #[test]
    fn cells_distinguish_blank_and_invalid() {
        assert_eq!(parse_cell(""), AmountCell::Blank);
        assert_eq!(parse_cell("  "), AmountCell::Blank);
        assert_eq!(parse_cell("-"), AmountCell::Blank);
        assert_eq!(parse_cell("pending"), AmountCell::Invalid);
        assert_eq!(parse_cell("300"), AmountCell::Value(30_000));
    }

    #[test]
    fn formatting() {
        assert_eq!(format_minor(0), "0.00");
        assert_eq!(format_minor(50_000), "500.00");
        assert_eq!(format_minor(-5), "-0.05");
        assert_eq!(format_minor_grouped(123_456_789), "1,234,567.89");
        assert_eq!(format_minor_grouped(-100_000), "-1,000.00");
        assert_eq!(format_minor_grouped(99), "0.99");
    }
}
