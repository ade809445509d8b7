//! Character n-gram TF-IDF index over vendor names.
//!
//! The index is fitted once per engine initialization on the tenant's vendor
//! corpus and is immutable afterwards, so batch workers can share it. A
//! query is credited with its cosine similarity only when the best-matching
//! corpus entry is the comparand; otherwise the signal is considered noise
//! and scores 0.

use std::collections::HashMap;

/// N-gram sizes extracted from each word.
const NGRAM_SIZES: [usize; 2] = [2, 3];

/// Vocabulary cap; the most frequent n-grams are kept.
const MAX_FEATURES: usize = 1000;

/// A fitted TF-IDF index over a vendor name corpus.
pub struct TfidfVendorIndex {
    corpus: Vec<String>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    corpus_vectors: Vec<Vec<f64>>,
}

impl TfidfVendorIndex {
    /// Fit the index on a corpus of vendor names. Empty names are skipped.
    pub fn fit(names: &[String]) -> Self {
        let corpus: Vec<String> = names
            .iter()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();

        // Document frequency per n-gram.
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let corpus_grams: Vec<HashMap<String, usize>> = corpus
            .iter()
            .map(|name| {
                let grams = ngram_counts(name);
                for gram in grams.keys() {
                    *document_frequency.entry(gram.clone()).or_insert(0) += 1;
                }
                grams
            })
            .collect();

        // Cap the vocabulary at the most frequent n-grams; ties break
        // lexicographically so fitting is deterministic.
        let mut ranked: Vec<(&String, &usize)> = document_frequency.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(MAX_FEATURES);

        let vocabulary: HashMap<String, usize> = ranked
            .iter()
            .enumerate()
            .map(|(idx, (gram, _))| ((*gram).clone(), idx))
            .collect();

        // Smoothed idf: ln((1 + n) / (1 + df)) + 1.
        let n_docs = corpus.len() as f64;
        let mut idf = vec![0.0; vocabulary.len()];
        for (gram, &idx) in &vocabulary {
            let df = document_frequency[gram] as f64;
            idf[idx] = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;
        }

        let corpus_vectors = corpus_grams
            .iter()
            .map(|grams| vectorize(grams, &vocabulary, &idf))
            .collect();

        Self {
            corpus,
            vocabulary,
            idf,
            corpus_vectors,
        }
    }

    /// Number of corpus entries.
    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    /// Whether the corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    /// Cosine similarity of `query` against the corpus, returned only when
    /// the argmax corpus entry equals `target` (compared lowercased and
    /// trimmed).
    pub fn similarity(&self, query: &str, target: &str) -> f64 {
        if self.corpus.is_empty() {
            return 0.0;
        }

        let query_vec = vectorize(&ngram_counts(&query.trim().to_lowercase()), &self.vocabulary, &self.idf);
        let target_clean = target.trim().to_lowercase();

        let mut best_idx = 0;
        let mut best_sim = f64::MIN;
        for (idx, corpus_vec) in self.corpus_vectors.iter().enumerate() {
            let sim = dot(&query_vec, corpus_vec);
            if sim > best_sim {
                best_sim = sim;
                best_idx = idx;
            }
        }

        if self.corpus[best_idx] == target_clean {
            best_sim.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Extract character n-grams the way a word-boundary analyzer does: each
/// whitespace-separated word is padded with a leading and trailing space
/// before n-grams are taken.
fn ngram_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in text.split_whitespace() {
        let padded: Vec<char> = format!(" {} ", word).chars().collect();
        for n in NGRAM_SIZES {
            if padded.len() < n {
                continue;
            }
            for window in padded.windows(n) {
                let gram: String = window.iter().collect();
                *counts.entry(gram).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Build an l2-normalized tf-idf vector.
fn vectorize(
    grams: &HashMap<String, usize>,
    vocabulary: &HashMap<String, usize>,
    idf: &[f64],
) -> Vec<f64> {
    let mut vector = vec![0.0; vocabulary.len()];
    for (gram, &count) in grams {
        if let Some(&idx) = vocabulary.get(gram) {
            vector[idx] = count as f64 * idf[idx];
        }
    }
    let norm: f64 = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "Acme Corporation".to_string(),
            "Globex Industries".to_string(),
            "Initech Solutions".to_string(),
        ]
    }

    #[test]
    fn test_exact_corpus_entry_scores_one() {
        let index = TfidfVendorIndex::fit(&corpus());
        let sim = index.similarity("Acme Corporation", "acme corporation");
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_credited_only_for_argmax() {
        let index = TfidfVendorIndex::fit(&corpus());
        // The query clearly resolves to Acme, so comparing against Globex
        // yields nothing.
        assert!(index.similarity("Acme Corp", "Acme Corporation") > 0.0);
        assert_eq!(index.similarity("Acme Corp", "Globex Industries"), 0.0);
    }

    #[test]
    fn test_empty_corpus_scores_zero() {
        let index = TfidfVendorIndex::fit(&[]);
        assert_eq!(index.similarity("anything", "anything"), 0.0);
        assert!(index.is_empty());
    }
}
