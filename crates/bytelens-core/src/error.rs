//! Error types for the bytelens-core library.
//!
//! Two layers of failure exist. Decoding failures never escape a single
//! field and are modelled by [`FieldError`], whose `Display` output is the
//! marker shown in place of a value. Everything else (ingestion, analysis,
//! argument parsing) returns [`Error`] through the crate-wide [`Result`].

use std::path::PathBuf;
use thiserror::Error;

use crate::analysis::Provider;

/// Result type alias for bytelens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all bytelens operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Input file exceeds the configured size limit
    #[error("file '{path}' is {size} bytes, limit is {limit} bytes")]
    FileTooLarge {
        /// Path to the offending file
        path: PathBuf,
        /// Actual size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },

    /// A user supplied offset could not be parsed
    #[error("invalid offset '{input}': expected a decimal or 0x-prefixed hex number")]
    InvalidOffset {
        /// The rejected input
        input: String,
    },

    /// No analyzer is registered for the selected provider
    #[error("analysis provider '{provider}' is not configured")]
    ProviderNotConfigured {
        /// The provider that was requested
        provider: Provider,
    },

    /// An analyzer reported a failure
    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    /// The request was cancelled before it completed
    #[error("request was cancelled")]
    Cancelled,

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file size error
    pub fn file_too_large(path: impl Into<PathBuf>, size: u64, limit: u64) -> Self {
        Self::FileTooLarge {
            path: path.into(),
            size,
            limit,
        }
    }

    /// Creates a new offset parse error
    pub fn invalid_offset(input: impl Into<String>) -> Self {
        Self::InvalidOffset {
            input: input.into(),
        }
    }

    /// Creates a new analysis failure
    pub fn analysis_failed(msg: impl Into<String>) -> Self {
        Self::AnalysisFailed(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if a batch operation may skip this error and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FileTooLarge { .. } | Self::AnalysisFailed(_) | Self::Cancelled
        )
    }
}

/// Marker shown for a field whose bytes run past the end of the buffer.
pub const OUT_OF_BOUNDS: &str = "Out of Bounds";

/// Marker shown for an interpretation that is intentionally not computed.
pub const NOT_AVAILABLE: &str = "N/A";

/// Per-field decoding failure.
///
/// A failure in one field never affects its siblings; the decoder stores
/// the error in place of the value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Not enough trailing bytes for the field's width
    #[error("Out of Bounds")]
    OutOfBounds,

    /// Structurally invalid content (bad calendar fields, broken LEB128, ...)
    #[error("{0}")]
    Malformed(String),

    /// Interpretation deliberately not implemented
    #[error("N/A")]
    Unsupported,

    /// Any other failure raised while computing the field
    #[error("{0}")]
    Unexpected(String),
}

impl FieldError {
    /// Creates a malformed-content error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Wraps an unexpected failure, keeping only its message
    pub fn unexpected(err: impl std::fmt::Display) -> Self {
        Self::Unexpected(err.to_string())
    }
}
