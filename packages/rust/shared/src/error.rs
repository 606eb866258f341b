//! Error types for the publisher.
//!
//! Library crates use [`PublisherError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all publisher operations.
#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside attachment retrieval.
    #[error("network error: {0}")]
    Network(String),

    /// Text parsing error (dates, CSV, identifiers).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad headings, blank titles, duplicate imports).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// An attachment could not be fetched for an import row.
    #[error("line {line_number}: unable to fetch attachment {url}: {message}")]
    AttachmentRetrieval {
        url: String,
        line_number: usize,
        message: String,
    },

    /// A record looked up by id does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PublisherError>;

impl PublisherError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attachment retrieval failure for the row at `line_number`.
    pub fn attachment(url: impl Into<String>, line_number: usize, msg: impl Into<String>) -> Self {
        Self::AttachmentRetrieval {
            url: url.into(),
            line_number,
            message: msg.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: i64) -> Self {
        Self::NotFound { kind, id }
    }

    /// Wrap any storage driver error.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}
