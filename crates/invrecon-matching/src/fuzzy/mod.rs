//! Fuzzy matching primitives.
//!
//! Pure similarity functions over strings, each returning a score in
//! [0, 1], plus the OCR confusion-variant generator and the TF-IDF vendor
//! index. The composite score combines the character- and token-level
//! measures with fixed weights tuned for business names.

mod ocr;
mod phonetic;
mod similarity;
mod tfidf;

pub use ocr::*;
pub use phonetic::*;
pub use similarity::*;
pub use tfidf::*;

/// Fuzzy matcher holding the tenant's vendor corpus.
///
/// The TF-IDF index is immutable after [`FuzzyMatcher::fit_vendor_corpus`]
/// and may be shared across batch workers.
#[derive(Default)]
pub struct FuzzyMatcher {
    tfidf: Option<TfidfVendorIndex>,
}

impl FuzzyMatcher {
    /// Create a matcher with no corpus fitted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the TF-IDF index on the tenant's vendor names.
    pub fn fit_vendor_corpus(&mut self, vendor_names: &[String]) {
        if vendor_names.is_empty() {
            self.tfidf = None;
        } else {
            self.tfidf = Some(TfidfVendorIndex::fit(vendor_names));
        }
    }

    /// Whether a corpus has been fitted.
    pub fn has_corpus(&self) -> bool {
        self.tfidf.is_some()
    }

    /// Composite similarity between two strings.
    pub fn composite(&self, a: &str, b: &str) -> f64 {
        composite_similarity(a, b)
    }

    /// TF-IDF cosine similarity of `query` against the corpus, credited only
    /// when the best-matching corpus entry is `target`.
    pub fn tfidf(&self, query: &str, target: &str) -> f64 {
        match &self.tfidf {
            Some(index) => index.similarity(query, target),
            None => 0.0,
        }
    }

    /// Find the best composite match for `query` among `candidates`,
    /// considering OCR confusion variants of the query.
    ///
    /// Returns the winning candidate and its score, or `None` when either
    /// side is empty.
    pub fn find_best_vendor_match(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Option<(String, f64)> {
        if query.is_empty() || candidates.is_empty() {
            return None;
        }

        let variants = generate_ocr_variants(query);
        let mut best: Option<(String, f64)> = None;

        for variant in &variants {
            for candidate in candidates {
                let score = composite_similarity(variant, candidate);
                if best.as_ref().map_or(true, |(_, s)| score > *s) {
                    best = Some((candidate.clone(), score));
                }
            }
        }

        best
    }
}
