//! Character- and token-level string similarity.

use strsim::levenshtein;

/// Composite weights: token measures dominate for business names.
const LEVENSHTEIN_WEIGHT: f64 = 0.3;
const TOKEN_SORT_WEIGHT: f64 = 0.4;
const TOKEN_SET_WEIGHT: f64 = 0.3;

fn clean(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Levenshtein ratio: `1 - edit_distance / max_len`, in [0, 1].
pub fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let a = clean(a);
    let b = clean(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    1.0 - (levenshtein(&a, &b) as f64 / max_len as f64)
}

/// Token-sort ratio: lowercase, split on whitespace, sort tokens, then
/// compare at character level.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    levenshtein_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Token-set ratio: compares the token sets, so duplicated and reordered
/// tokens score as equal. The score is the best pairwise ratio among the
/// shared-token string and each side's full sorted token string.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a = token_set(a);
    let tokens_b = token_set(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let mut shared: Vec<&str> = tokens_a.intersection(&tokens_b).map(|s| s.as_str()).collect();
    let mut only_a: Vec<&str> = tokens_a.difference(&tokens_b).map(|s| s.as_str()).collect();
    let mut only_b: Vec<&str> = tokens_b.difference(&tokens_a).map(|s| s.as_str()).collect();
    shared.sort_unstable();
    only_a.sort_unstable();
    only_b.sort_unstable();

    let base = shared.join(" ");
    let full_a = join_nonempty(&base, &only_a.join(" "));
    let full_b = join_nonempty(&base, &only_b.join(" "));

    let r1 = levenshtein_ratio(&base, &full_a);
    let r2 = levenshtein_ratio(&base, &full_b);
    let r3 = levenshtein_ratio(&full_a, &full_b);
    r1.max(r2).max(r3)
}

/// Weighted mean of the character- and token-level ratios.
pub fn composite_similarity(a: &str, b: &str) -> f64 {
    let a_clean = clean(a);
    let b_clean = clean(b);
    if a_clean.is_empty() || b_clean.is_empty() {
        return 0.0;
    }
    if a_clean == b_clean {
        return 1.0;
    }

    LEVENSHTEIN_WEIGHT * levenshtein_ratio(a, b)
        + TOKEN_SORT_WEIGHT * token_sort_ratio(a, b)
        + TOKEN_SET_WEIGHT * token_set_ratio(a, b)
}

fn sorted_tokens(s: &str) -> String {
    let cleaned = clean(s);
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn token_set(s: &str) -> std::collections::BTreeSet<String> {
    clean(s)
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

fn join_nonempty(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{} {}", a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_ratio_identity() {
        assert_eq!(levenshtein_ratio("Acme Corp", "acme corp"), 1.0);
    }

    #[test]
    fn test_levenshtein_ratio_single_edit() {
        // One substitution over nine characters.
        let score = levenshtein_ratio("acme corp", "acme_corp");
        assert!((score - (1.0 - 1.0 / 9.0)).abs() < 1e-9);
    }

    #[test]
    fn test_token_sort_handles_reordering() {
        assert_eq!(token_sort_ratio("Corp Acme", "Acme Corp"), 1.0);
        assert!(levenshtein_ratio("Corp Acme", "Acme Corp") < 1.0);
    }

    #[test]
    fn test_token_set_handles_duplicates() {
        assert_eq!(token_set_ratio("acme acme corp", "corp acme"), 1.0);
    }

    #[test]
    fn test_token_set_partial_overlap() {
        let score = token_set_ratio("acme corporation", "acme industries");
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn test_composite_bounds() {
        let pairs = [
            ("Acme Corporation", "ACME CORP"),
            ("Globex", "Initech"),
            ("", "anything"),
            ("same", "same"),
        ];
        for (a, b) in pairs {
            let score = composite_similarity(a, b);
            assert!((0.0..=1.0).contains(&score), "{} vs {} -> {}", a, b, score);
        }
    }
}
