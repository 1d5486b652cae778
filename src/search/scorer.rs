//! Match Scoring
//!
//! Scores a company name against a query by summing weighted signals:
//! whole-name exact/prefix/substring hits, per-word hits, an acronym hit
//! and an edit-distance similarity bonus.

use crate::company::fold;
use unicode_segmentation::UnicodeSegmentation;

/// Weights for the individual match signals
#[derive(Debug, Clone)]
pub struct MatchWeights {
    /// Whole name equals the query
    pub exact: u32,
    /// Whole name starts with the query
    pub prefix: u32,
    /// Whole name contains the query
    pub substring: u32,
    /// Extra for a substring hit that starts a word
    pub word_boundary: u32,
    /// A word equals the query
    pub token_exact: u32,
    /// A word starts with the query
    pub token_prefix: u32,
    /// A word contains the query (long queries only)
    pub token_contains: u32,
    /// Queries must be longer than this for `token_contains`
    pub token_contains_min_len: usize,
    /// Initials of the words contain the query
    pub acronym: u32,
    /// Similarity must exceed this for the edit-distance bonus
    pub similarity_threshold: f64,
    /// Similarity is multiplied by this and rounded
    pub similarity_scale: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            exact: 100,
            prefix: 80,
            substring: 60,
            word_boundary: 15,
            token_exact: 50,
            token_prefix: 40,
            token_contains: 30,
            token_contains_min_len: 3,
            acronym: 45,
            similarity_threshold: 0.7,
            similarity_scale: 40.0,
        }
    }
}

/// Scores candidate names against a query
#[derive(Debug, Clone, Default)]
pub struct MatchScorer {
    weights: MatchWeights,
}

impl MatchScorer {
    /// Score `candidate` against `query`; 0 means no match
    pub fn score(&self, query: &str, candidate: &str) -> u32 {
        let q = fold(query);
        if q.is_empty() {
            return 0;
        }
        self.score_folded(&q, &fold(candidate))
    }

    /// Score already-folded strings
    fn score_folded(&self, q: &str, c: &str) -> u32 {
        let w = &self.weights;

        // A whole-name hit cannot be improved on
        if c == q {
            return w.exact;
        }

        let mut score = 0;

        if c.starts_with(q) {
            score += w.prefix;
        } else if c.contains(q) {
            score += w.substring;
            if c.contains(&format!(" {}", q)) {
                score += w.word_boundary;
            }
        }

        let long_query = q.chars().count() > w.token_contains_min_len;
        let words: Vec<&str> = c.split_whitespace().collect();
        for word in &words {
            if *word == q {
                score += w.token_exact;
            } else if word.starts_with(q) {
                score += w.token_prefix;
            } else if long_query && word.contains(q) {
                score += w.token_contains;
            }
        }

        let initials: String = words
            .iter()
            .filter_map(|word| word.graphemes(true).next())
            .collect();
        if initials.contains(q) {
            score += w.acronym;
        }

        let sim = similarity(q, c);
        if sim > w.similarity_threshold {
            score += (sim * w.similarity_scale).round() as u32;
        }

        score
    }
}

/// Normalized Levenshtein similarity in `[0, 1]`, over characters
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=a.len()).collect();
    let mut curr = vec![0; a.len() + 1];

    for (j, cb) in b.iter().enumerate() {
        curr[0] = j + 1;
        for (i, ca) in a.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[i + 1] = (curr[i] + 1).min(prev[i + 1] + 1).min(prev[i] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[a.len()]
}
