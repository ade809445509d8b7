//! Vendor code generation for auto-created vendors.

use rand::Rng;

/// Maximum collision counter before falling back to a random suffix.
const MAX_COLLISION_COUNTER: u32 = 99;

/// Generate a unique vendor code from a vendor name.
///
/// The base code is the first six alphanumeric characters of the name,
/// uppercased and padded with `X` to at least three. On collision a
/// two-digit counter from 02 upward is appended to the first four
/// characters; after 99 collisions a random three-character suffix is used.
///
/// `is_taken` must answer against both committed vendors and any codes
/// staged in the current import transaction.
pub fn generate_vendor_code(vendor_name: &str, mut is_taken: impl FnMut(&str) -> bool) -> String {
    let cleaned: String = vendor_name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let mut base: String = cleaned.chars().take(6).collect();
    while base.len() < 3 {
        base.push('X');
    }

    if !is_taken(&base) {
        return base;
    }

    let prefix: String = base.chars().take(4).collect();
    for counter in 2..=MAX_COLLISION_COUNTER {
        let candidate = format!("{}{:02}", prefix, counter);
        if !is_taken(&candidate) {
            return candidate;
        }
    }

    let short: String = base.chars().take(3).collect();
    let mut rng = rand::thread_rng();
    loop {
        let suffix: String = (0..3)
            .map(|_| {
                let n = rng.gen_range(0..36);
                char::from_digit(n, 36).unwrap_or('0').to_ascii_uppercase()
            })
            .collect();
        let candidate = format!("{}{}", short, suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_basic_code_from_name() {
        assert_eq!(generate_vendor_code("Acme Corporation", |_| false), "ACMECO");
        assert_eq!(generate_vendor_code("ACME", |_| false), "ACME");
    }

    #[test]
    fn test_short_names_padded() {
        assert_eq!(generate_vendor_code("AB", |_| false), "ABX");
        assert_eq!(generate_vendor_code("A", |_| false), "AXX");
    }

    #[test]
    fn test_non_alphanumerics_dropped() {
        assert_eq!(generate_vendor_code("A & B Co.", |_| false), "ABCO");
    }

    #[test]
    fn test_collision_appends_counter() {
        let taken: HashSet<&str> = ["ACMECO"].into();
        let code = generate_vendor_code("Acme Corporation", |c| taken.contains(c));
        assert_eq!(code, "ACME02");
    }

    #[test]
    fn test_counter_advances_past_taken_codes() {
        let taken: HashSet<&str> = ["ACMECO", "ACME02", "ACME03"].into();
        let code = generate_vendor_code("Acme Corporation", |c| taken.contains(c));
        assert_eq!(code, "ACME04");
    }

    #[test]
    fn test_random_fallback_after_exhaustion() {
        // Everything with the 4-char prefix is taken; only a random
        // 3+3 suffix code can escape.
        let code = generate_vendor_code("Acme Corporation", |c| {
            c == "ACMECO" || (c.starts_with("ACME") && c.len() == 6 && c != "ACMECO")
                && c[4..].chars().all(|ch| ch.is_ascii_digit())
        });
        assert_eq!(code.len(), 6);
        assert!(code.starts_with("ACM"));
    }
}
