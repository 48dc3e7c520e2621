//! Error types for sheet-classifier
//!
//! This module provides error handling for the library:
//! - [`Error`], the crate-wide error returned by fallible operations
//! - [`ClientError`], the per-call failure of a classification backend,
//!   split into rate-limit signals (rotate and retry) and everything else
//!   (terminal for the row)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sheet-classifier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sheet-classifier
///
/// Row-level classification failures never surface here; they are recorded in
/// the output table instead. This type covers failures that stop a run before
/// any row is attempted (missing credentials, unreadable inputs) and I/O
/// failures while persisting results.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "KEYS")
        key: Option<String>,
    },

    /// Spreadsheet could not be read or written
    #[error("workbook error at {path}: {message}")]
    Workbook {
        /// The spreadsheet involved
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// A configured column does not exist in a sheet
    #[error("column '{column}' not found in {sheet}")]
    ColumnNotFound {
        /// The missing column header
        column: String,
        /// Which sheet was searched (e.g., "classification sheet")
        sheet: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed JSON settings
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Shorthand for a workbook error on `path`
    pub fn workbook(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Error::Workbook {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Failure of a single classification call
///
/// The row processor rotates credentials on [`ClientError::RateLimited`] and
/// gives up on the row for any other variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Upstream signalled quota exhaustion or throttling (HTTP 429)
    #[error("rate limited: {message}")]
    RateLimited {
        /// Upstream message, if any
        message: String,
    },

    /// Any other failure: transport, timeout, malformed request or response
    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Whether this error is a rate-limit signal
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ClientError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            return ClientError::RateLimited {
                message: e.to_string(),
            };
        }
        ClientError::Other(e.to_string())
    }
}
