//! Fuzzy company-name search
//!
//! Scoring of single candidates, ranking over record sets, and the builtin
//! fallback names used when no live source answers.

pub mod fallback;
pub mod index;
pub mod scorer;

pub use fallback::builtin_fallback;
pub use index::FuzzyIndex;
