//! Company records and the canonical name key used for identity

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Status used when the registry does not report one
pub const UNKNOWN_STATUS: &str = "Unknown";

/// A company as stored in the caches and served to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub name: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default = "unknown_status")]
    pub status: String,
}

fn unknown_status() -> String {
    UNKNOWN_STATUS.to_string()
}

impl CompanyRecord {
    pub fn new(name: impl Into<String>, reference: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
            status: status.into(),
        }
    }

    /// Record for a bare name with no registry metadata
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, "", UNKNOWN_STATUS)
    }

    /// Identity key: two records with equal keys are duplicates
    pub fn key(&self) -> String {
        fold(&self.name)
    }
}

/// Canonical comparison form: NFC composed, then lowercased
///
/// Leading and trailing whitespace is not significant.
pub fn fold(text: &str) -> String {
    text.trim().nfc().collect::<String>().to_lowercase()
}

/// Extract the names from a slice of records, preserving order
pub fn names(records: &[CompanyRecord]) -> Vec<String> {
    records.iter().map(|r| r.name.clone()).collect()
}
