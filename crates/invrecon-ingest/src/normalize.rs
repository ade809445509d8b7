//! Field normalization for imported rows.
//!
//! Raw CSV cells become typed values here: amounts lose currency symbols
//! and grouping, dates are tried against the supported format list, and
//! vendor names are canonicalized for matching. Normalization is total -
//! unparseable input yields `None`, never a panic.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Maximum stored invoice number length.
pub const MAX_INVOICE_NUMBER_LEN: usize = 100;

/// Maximum stored vendor name length.
pub const MAX_VENDOR_NAME_LEN: usize = 255;

/// Maximum stored PO reference length.
pub const MAX_PO_REFERENCE_LEN: usize = 50;

/// Maximum stored line description length.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Currency markers stripped before amount parsing. Multi-character codes
/// are listed first so "USD" is removed before its letters could confuse
/// the parser.
const CURRENCY_MARKERS: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "INR", "$", "\u{20ac}", "\u{a3}", "\u{a5}", "\u{20b9}",
];

/// Date formats tried in order: ISO, US, EU, compact, two-digit years.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%Y%m%d",
    "%m/%d/%y",
    "%d/%m/%y",
];

/// Earliest acceptable invoice year.
const MIN_YEAR: i32 = 1900;

/// Years past the current year still accepted.
const MAX_FUTURE_YEARS: i32 = 10;

/// Business suffixes stripped from vendor names for matching.
const BUSINESS_SUFFIXES: &[&str] = &[
    "LLC",
    "INC",
    "CORP",
    "LTD",
    "LIMITED",
    "CORPORATION",
    "COMPANY",
    "CO",
    "ASSOCIATES",
    "ASSOC",
    "&",
    "AND",
];

/// Trim and cap an invoice number. Empty input yields `None`.
pub fn normalize_invoice_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_INVOICE_NUMBER_LEN).collect())
}

/// Canonicalize a vendor name: uppercase, collapse whitespace, strip common
/// business suffixes (unless stripping would empty the name), cap length.
pub fn normalize_vendor_name(raw: &str) -> Option<String> {
    let upper = raw.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }

    let words: Vec<&str> = upper.split_whitespace().collect();
    let filtered: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !BUSINESS_SUFFIXES.contains(w))
        .collect();

    let normalized = if filtered.is_empty() {
        words.join(" ")
    } else {
        filtered.join(" ")
    };

    Some(normalized.chars().take(MAX_VENDOR_NAME_LEN).collect())
}

/// Parse an amount string: strip currency markers, grouping commas, and
/// spaces; parentheses or a leading minus mean negative; quantize to two
/// decimal places, rounding half up.
pub fn normalize_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parenthesized = trimmed.contains('(') && trimmed.contains(')');

    let mut cleaned = trimmed.to_string();
    for marker in CURRENCY_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }
    cleaned = cleaned
        .replace(['(', ')'], "")
        .replace([',', ' '], "");

    let mut negative = parenthesized;
    if let Some(stripped) = cleaned.strip_prefix('-') {
        negative = true;
        cleaned = stripped.to_string();
    }

    let amount: Decimal = cleaned.parse().ok()?;
    let amount = if negative { -amount } else { amount };
    Some(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Parse a date against the supported format list and range-check the year
/// to [1900, current year + 10].
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }

    let max_year = Utc::now().year() + MAX_FUTURE_YEARS;
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, format) {
            if (MIN_YEAR..=max_year).contains(&date.year()) {
                return Some(date);
            }
        }
    }
    None
}

/// Trim and cap a PO reference. Empty input yields `None`.
pub fn normalize_po_reference(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_PO_REFERENCE_LEN).collect())
}

/// Trim and cap a description. Empty input yields `None`.
pub fn normalize_description(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_DESCRIPTION_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_strips_currency_symbols() {
        assert_eq!(normalize_amount("$1,234.56"), Some(dec!(1234.56)));
        assert_eq!(normalize_amount("\u{20ac} 999.00"), Some(dec!(999.00)));
        assert_eq!(normalize_amount("USD 42"), Some(dec!(42.00)));
    }

    #[test]
    fn test_amount_negative_forms() {
        assert_eq!(normalize_amount("-15.25"), Some(dec!(-15.25)));
        assert_eq!(normalize_amount("(15.25)"), Some(dec!(-15.25)));
        assert_eq!(normalize_amount("($1,000.00)"), Some(dec!(-1000.00)));
    }

    #[test]
    fn test_amount_quantizes_to_cents() {
        assert_eq!(normalize_amount("10.005"), Some(dec!(10.01)));
        assert_eq!(normalize_amount("10.004"), Some(dec!(10.00)));
    }

    #[test]
    fn test_amount_rejects_garbage() {
        assert_eq!(normalize_amount("abc"), None);
        assert_eq!(normalize_amount(""), None);
        assert_eq!(normalize_amount("12.3.4"), None);
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 12, 25).unwrap();
        for raw in ["2023-12-25", "12/25/2023", "25/12/2023", "2023/12/25", "20231225", "12/25/23"] {
            assert_eq!(normalize_date(raw), Some(expected), "format: {}", raw);
        }
    }

    #[test]
    fn test_date_range_check() {
        assert_eq!(normalize_date("1899-12-31"), None);
        assert!(normalize_date("1900-01-01").is_some());
        let too_far = format!("{}-01-01", Utc::now().year() + 11);
        assert_eq!(normalize_date(&too_far), None);
    }

    #[test]
    fn test_vendor_name_suffix_stripping() {
        assert_eq!(
            normalize_vendor_name("Acme Corporation").as_deref(),
            Some("ACME")
        );
        assert_eq!(normalize_vendor_name("  beta   llc ").as_deref(), Some("BETA"));
        // Stripping everything falls back to the unstripped form.
        assert_eq!(normalize_vendor_name("LLC").as_deref(), Some("LLC"));
    }

    #[test]
    fn test_invoice_number_cap() {
        let long = "X".repeat(150);
        assert_eq!(normalize_invoice_number(&long).unwrap().len(), 100);
    }

    proptest! {
        /// Rendering a normalized amount and normalizing again is a fixpoint.
        #[test]
        fn prop_amount_normalization_idempotent(cents in -10_000_000i64..10_000_000i64) {
            let amount = Decimal::new(cents, 2);
            let rendered = amount.to_string();
            prop_assert_eq!(normalize_amount(&rendered), Some(amount));
        }

        /// Every supported rendering of a date parses to the same day.
        #[test]
        fn prop_date_roundtrip_across_formats(days in 0u32..20_000) {
            let date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
                + chrono::Duration::days(days as i64);
            let iso = date.format("%Y-%m-%d").to_string();
            let us = date.format("%m/%d/%Y").to_string();
            let compact = date.format("%Y%m%d").to_string();
            prop_assert_eq!(normalize_date(&iso), Some(date));
            prop_assert_eq!(normalize_date(&us), Some(date));
            prop_assert_eq!(normalize_date(&compact), Some(date));
        }
    }
}
