//! OCR confusion-variant generation.
//!
//! Scanned documents routinely confuse visually similar glyphs. The
//! generator produces a bounded set of single-substitution variants of a
//! candidate string from a fixed confusion table, so a noisy reference like
//! "PO-l2345" can still match "PO-12345".

/// Maximum variants returned, including the original string.
pub const MAX_OCR_VARIANTS: usize = 5;

/// Inputs longer than this are returned unchanged; substitution on long
/// strings explodes combinatorially without improving recall.
pub const MAX_OCR_INPUT_LEN: usize = 50;

/// Confusion table: each entry maps a sequence to its common misreads.
/// Only the first two substitutes per entry are applied.
const OCR_SUBSTITUTIONS: &[(&str, &[&str])] = &[
    ("0", &["O", "Q", "D"]),
    ("O", &["0", "Q", "D"]),
    ("1", &["I", "l", "|"]),
    ("I", &["1", "l", "|"]),
    ("2", &["Z"]),
    ("Z", &["2"]),
    ("5", &["S"]),
    ("S", &["5"]),
    ("6", &["G", "b"]),
    ("G", &["6", "b"]),
    ("8", &["B"]),
    ("B", &["8"]),
    ("RN", &["M"]),
    ("M", &["RN"]),
    ("CL", &["D"]),
    ("D", &["CL"]),
];

/// Substitutes applied per table entry.
const SUBSTITUTES_PER_ENTRY: usize = 2;

/// Generate OCR confusion variants of `text`.
///
/// The original string is always the first element. At most
/// [`MAX_OCR_VARIANTS`] strings are returned, and inputs longer than
/// [`MAX_OCR_INPUT_LEN`] characters yield only the original.
pub fn generate_ocr_variants(text: &str) -> Vec<String> {
    let mut variants = vec![text.to_string()];
    if text.is_empty() || text.chars().count() > MAX_OCR_INPUT_LEN {
        return variants;
    }

    let original: Vec<char> = text.to_uppercase().chars().collect();

    'outer: for (pos, _) in original.iter().enumerate() {
        for (pattern, substitutes) in OCR_SUBSTITUTIONS {
            let pattern_chars: Vec<char> = pattern.chars().collect();
            let end = pos + pattern_chars.len();
            if end > original.len() || original[pos..end] != pattern_chars[..] {
                continue;
            }

            for substitute in substitutes.iter().take(SUBSTITUTES_PER_ENTRY) {
                let mut variant: String = original[..pos].iter().collect();
                variant.push_str(substitute);
                variant.extend(&original[end..]);

                if !variants.contains(&variant) {
                    variants.push(variant);
                }
                if variants.len() >= MAX_OCR_VARIANTS {
                    break 'outer;
                }
            }
        }
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_variants_include_original_first() {
        let variants = generate_ocr_variants("PO-12345");
        assert_eq!(variants[0], "PO-12345");
    }

    #[test]
    fn test_digit_confusions_generated() {
        let variants = generate_ocr_variants("A0");
        assert!(variants.iter().any(|v| v == "AO"));
    }

    #[test]
    fn test_multichar_confusion() {
        let variants = generate_ocr_variants("RN");
        assert!(variants.iter().any(|v| v == "M"));
    }

    #[test]
    fn test_long_input_returned_unchanged() {
        let long = "0".repeat(51);
        let variants = generate_ocr_variants(&long);
        assert_eq!(variants, vec![long]);
    }

    #[test]
    fn test_no_confusable_characters() {
        let variants = generate_ocr_variants("XYX");
        assert_eq!(variants, vec!["XYX".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_variant_count_is_bounded(s in ".{0,120}") {
            let variants = generate_ocr_variants(&s);
            prop_assert!(variants.len() <= MAX_OCR_VARIANTS);
            prop_assert_eq!(&variants[0], &s);
        }
    }
}
