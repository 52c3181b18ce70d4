//! Error types for ec2cost
//!
//! There are two error types: `CostReportError` (main error enum) and
//! `ConfigError` (configuration-specific).
//!
//! ## Error Handling Philosophy
//!
//! Library code uses `crate::error::Result<T>` which returns `CostReportError`.
//! The binary uses `anyhow::Result<T>` and maps the underlying
//! `CostReportError` to an exit code at the boundary (see `exit_codes.rs`).
//!
//! ## Retry Awareness
//!
//! Errors implement `IsRetryable`. The `RetryPolicy` in `src/retry.rs` uses it
//! to decide whether a Cost Explorer page request is attempted again.
//! Only `CloudProvider`, `Io`, and `Retryable` variants are retryable.
//!
//! ## When to Use Which Error
//!
//! - `RatesFile` / `MalformedRate`: the local rate CSV could not be opened or
//!   contains a bad row. Loading stops and the report never starts.
//!
//! - `CloudProvider`: throttled or transient Cost Explorer failures.
//!   Retryable.
//!
//! - `Aws`: every other Cost Explorer failure (auth, bad request, ...).
//!   Not retryable.
//!
//! - `Validation`: bad user input (lookback months, output format).

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ec2cost
#[derive(Error, Debug)]
pub enum CostReportError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cloud provider error: {provider} - {message}")]
    CloudProvider {
        provider: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Retryable error (attempt {attempt}/{max_attempts}): {reason}")]
    Retryable {
        attempt: u32,
        max_attempts: u32,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Cannot open rates file {}: {source}", path.display())]
    RatesFile {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed rate on line {line}: {reason}")]
    MalformedRate { line: u64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("AWS SDK error: {0}")]
    Aws(String),

    #[error("Validation error: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to read config {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CostReportError>;

/// Trait for determining if an error is retryable
///
/// Used by `RetryPolicy` implementations to determine whether an error
/// should trigger a retry attempt.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for CostReportError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            CostReportError::Retryable { .. }
                | CostReportError::CloudProvider { .. }
                | CostReportError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_variants() {
        let throttled = CostReportError::CloudProvider {
            provider: "aws".to_string(),
            message: "Rate exceeded".to_string(),
            source: None,
        };
        assert!(throttled.is_retryable());

        let denied = CostReportError::Aws("AccessDeniedException".to_string());
        assert!(!denied.is_retryable());

        let bad_row = CostReportError::MalformedRate {
            line: 3,
            reason: "expected 2 fields, found 1".to_string(),
        };
        assert!(!bad_row.is_retryable());
    }

    #[test]
    fn test_malformed_rate_names_line() {
        let err = CostReportError::MalformedRate {
            line: 7,
            reason: "expected 2 fields, found 1".to_string(),
        };
        assert!(err.to_string().contains("line 7"));
    }
}
