//! Fuzzy Index
//!
//! Ranks a set of company records against a query with the match scorer
//! and returns the best matches.

use super::scorer::MatchScorer;
use crate::company::{fold, CompanyRecord};
use std::collections::HashSet;

/// A record with its match score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate<'a> {
    pub record: &'a CompanyRecord,
    pub score: u32,
}

/// In-memory fuzzy search over company records
#[derive(Debug, Clone, Default)]
pub struct FuzzyIndex {
    scorer: MatchScorer,
}

impl FuzzyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score every candidate and return the matches, best first
    ///
    /// Ties keep the candidates' original order. A name that appears more
    /// than once (case-insensitively) is scored only at its first position.
    pub fn rank<'a>(&self, query: &str, candidates: &'a [CompanyRecord]) -> Vec<ScoredCandidate<'a>> {
        let q = fold(query);
        if q.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::with_capacity(candidates.len());
        let mut scored: Vec<ScoredCandidate<'a>> = candidates
            .iter()
            .filter(|record| seen.insert(record.key()))
            .filter_map(|record| {
                let score = self.scorer.score(&q, &record.name);
                (score > 0).then_some(ScoredCandidate { record, score })
            })
            .collect();

        // sort_by is stable, so equal scores stay in input order
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored
    }

    /// Names of the best `limit` matches
    pub fn top_matches(&self, query: &str, candidates: &[CompanyRecord], limit: usize) -> Vec<String> {
        self.rank(query, candidates)
            .into_iter()
            .take(limit)
            .map(|c| c.record.name.clone())
            .collect()
    }

    /// The best `limit` matching records
    pub fn top_records(&self, query: &str, candidates: &[CompanyRecord], limit: usize) -> Vec<CompanyRecord> {
        self.rank(query, candidates)
            .into_iter()
            .take(limit)
            .map(|c| c.record.clone())
            .collect()
    }
}
