//! Error types and handling for the company lookup proxy

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Longest upstream body excerpt kept in an error
const MAX_BODY_EXCERPT: usize = 500;

/// Failures talking to a company source (the registry or the proxy itself)
///
/// Every variant is recoverable: orchestrators fall back to cached or
/// builtin data instead of failing the search.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// No response was received (connect failure, timeout, broken body)
    #[error("transport error: {0}")]
    Transport(String),
    /// The source answered with a non-success HTTP status
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    /// The response did not have the expected shape
    #[error("unexpected response format: {0}")]
    Format(String),
}

impl SourceError {
    /// Build an upstream error, keeping only the head of a large body
    pub fn upstream(status: u16, body: &str) -> Self {
        let body = if body.chars().count() > MAX_BODY_EXCERPT {
            let head: String = body.chars().take(MAX_BODY_EXCERPT).collect();
            format!("{}...", head)
        } else {
            body.to_string()
        };
        SourceError::Upstream { status, body }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Format(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::upstream(status.as_u16(), &err.to_string())
        } else {
            // Timeouts, connect failures and body read errors all mean
            // no usable response arrived
            SourceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Format(err.to_string())
    }
}

/// Application error types
#[derive(Debug, Serialize)]
pub enum AppError {
    InvalidInput(String),
    Source(String),
    StorageError(String),
    ConfigError(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::Source(msg) => write!(f, "Company source failed: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Stable machine-readable code, used in HTTP error bodies
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Source(_) => "source_error",
            AppError::StorageError(_) => "storage_error",
            AppError::ConfigError(_) => "config_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::Source(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

/// Reject queries that could never be served sensibly
pub fn validate_limit(limit: usize) -> Result<usize, AppError> {
    if limit == 0 {
        return Err(AppError::InvalidInput("Limit must be at least 1".to_string()));
    }
    if limit > 100 {
        return Err(AppError::InvalidInput(
            "Limit too large, maximum 100 results".to_string(),
        ));
    }
    Ok(limit)
}
