//! Unified error types for chatmood.
//!
//! [`ChatmoodError`] covers every failure a caller can observe from the
//! library. Classifier and configuration failures have their own enums
//! ([`ClassifierError`], [`ConfigError`]) because they are handled at
//! different layers: classifier errors are absorbed by the batch engine,
//! configuration errors stop the run before any file is read.
//!
//! # Propagation
//!
//! - Per-record problems are never errors: they become
//!   [`ParseWarning`](crate::parser::ParseWarning)s.
//! - Per-file problems ([`ChatmoodError::Io`], [`ChatmoodError::FileTimeout`],
//!   [`ChatmoodError::InvalidFormat`]) are logged and the file is skipped.
//! - Per-batch problems ([`ClassifierError`]) are retried and then resolved
//!   with the unknown-label sentinel.
//! - [`ConfigError`] is fatal.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A specialized [`Result`] type for chatmood operations.
pub type Result<T> = std::result::Result<T, ChatmoodError>;

/// The error type for chatmood operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatmoodError {
    /// An I/O error occurred.
    ///
    /// This typically happens when:
    /// - An input file or directory doesn't exist
    /// - Permission denied
    /// - Disk is full (when writing output)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Reading an input file took longer than the configured timeout.
    #[error("Timed out after {}s reading {}", timeout.as_secs(), path.display())]
    FileTimeout {
        /// The file being read
        path: PathBuf,
        /// The configured limit
        timeout: Duration,
    },

    /// The file content doesn't match the expected structure.
    ///
    /// This occurs when:
    /// - A WhatsApp TXT file matches none of the known header layouts
    /// - A Telegram HTML file has no message history at all
    /// - An output path has an unknown extension
    #[error("Invalid {format} format: {message}")]
    InvalidFormat {
        /// The format that was expected
        format: &'static str,
        /// Description of what's wrong
        message: String,
    },

    /// Invalid date format in filter configuration.
    ///
    /// Date filters expect YYYY-MM-DD format.
    #[error("Invalid date '{input}'. Expected format: {expected}")]
    InvalidDate {
        /// The invalid date string that was provided
        input: String,
        /// Expected format description
        expected: &'static str,
    },

    /// The configuration is unusable; the pipeline must not start.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// CSV writing error.
    #[cfg(feature = "csv-output")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// UTF-8 encoding error.
    #[error("UTF-8 encoding error in {context}: {source}")]
    Utf8 {
        /// Description of where the error occurred
        context: String,
        /// The underlying UTF-8 error
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Errors raised by a [`Classifier`](crate::classify::Classifier) for a whole batch.
///
/// None of these ever reach the caller of the pipeline: the batch engine
/// retries the transient ones and labels the batch with the sentinel once
/// attempts run out.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClassifierError {
    /// Transport-level failure (connection refused, reset, DNS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The classifier did not answer within the request timeout.
    #[error("Classifier request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The classifier answered with a non-success status.
    #[error("Classifier returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// The response could not be turned into per-position labels.
    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),

    /// The run was cancelled while the batch was waiting or in flight.
    #[error("Classification cancelled")]
    Cancelled,
}

impl ClassifierError {
    /// Creates a malformed response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        ClassifierError::MalformedResponse(message.into())
    }

    /// Returns `true` if another attempt could plausibly succeed.
    ///
    /// Rate limiting (429) and server errors (5xx) are retried; other 4xx
    /// statuses mean the request itself is wrong and are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClassifierError::Http(_)
            | ClassifierError::Timeout(_)
            | ClassifierError::MalformedResponse(_) => true,
            ClassifierError::Status { status, .. } => *status == 429 || *status >= 500,
            ClassifierError::Cancelled => false,
        }
    }
}

/// Fatal configuration problems detected before any file is processed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required variable is absent or empty.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// A variable is present but cannot be used.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Reading the environment failed.
    #[error("{0}")]
    Env(#[from] envconfig::Error),
}

impl ConfigError {
    /// Creates an invalid-value error.
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

impl From<std::string::FromUtf8Error> for ChatmoodError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ChatmoodError::Utf8 {
            context: "output conversion".to_string(),
            source: err,
        }
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl ChatmoodError {
    /// Creates an invalid format error.
    pub fn invalid_format(format: &'static str, message: impl Into<String>) -> Self {
        ChatmoodError::InvalidFormat {
            format,
            message: message.into(),
        }
    }

    /// Creates an invalid date error.
    pub fn invalid_date(input: impl Into<String>) -> Self {
        ChatmoodError::InvalidDate {
            input: input.into(),
            expected: "YYYY-MM-DD",
        }
    }

    /// Creates a file read timeout error.
    pub fn file_timeout(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        ChatmoodError::FileTimeout {
            path: path.into(),
            timeout,
        }
    }

    /// Returns `true` if this is an IO error.
    pub fn is_io(&self) -> bool {
        matches!(self, ChatmoodError::Io(_) | ChatmoodError::FileTimeout { .. })
    }

    /// Returns `true` if this is an invalid format error.
    pub fn is_invalid_format(&self) -> bool {
        matches!(self, ChatmoodError::InvalidFormat { .. })
    }

    /// Returns `true` if this is a date-related error.
    pub fn is_invalid_date(&self) -> bool {
        matches!(self, ChatmoodError::InvalidDate { .. })
    }

    /// Returns `true` if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, ChatmoodError::Config(_))
    }
}
