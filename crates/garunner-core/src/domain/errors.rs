//! Query error types
//!
//! Every failure a query can end with is one [`QueryError`] variant. Errors
//! are values returned to the caller of that query; nothing here terminates
//! the process.

use thiserror::Error;

use crate::ports::ReportError;

/// Errors that can end a report query
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A required query parameter is absent or empty
    #[error("Missing argument for {0}")]
    MissingArgument(&'static str),

    /// A query parameter is present but cannot be interpreted
    #[error("Invalid argument for {field}: {reason}")]
    InvalidArgument {
        /// Name of the offending parameter (camelCase, as the caller spells it)
        field: &'static str,
        /// Human-readable explanation
        reason: String,
    },

    /// The provider kept signalling quota exhaustion until retries ran out
    #[error("Quota exceeded, gave up after {attempts} attempts: {message}")]
    QuotaExhausted {
        /// Total number of attempts made, including the first one
        attempts: u32,
        /// Message from the last quota failure
        message: String,
    },

    /// The provider rejected the call with a non-quota error
    #[error("Remote call failed with status {status}: {message}")]
    Remote {
        /// HTTP status code returned by the provider
        status: u16,
        /// Error message extracted from the response
        message: String,
    },

    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a body that could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The external authorizer failed to produce credentials
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Token or configuration storage could not be used
    #[error("Storage error: {0}")]
    Storage(String),

    /// The dispatcher backlog is full and the call was rejected
    #[error("Dispatcher backlog full ({limit} calls already queued)")]
    Backlog {
        /// Configured queue limit
        limit: usize,
    },
}

impl QueryError {
    /// Maps a final reporting failure, made after `attempts` tries, to a query error
    pub fn from_report(error: ReportError, attempts: u32) -> Self {
        match error {
            ReportError::QuotaExceeded { message, .. } => Self::QuotaExhausted { attempts, message },
            ReportError::Remote { status, message } => Self::Remote { status, message },
            ReportError::Network(message) => Self::Network(message),
            ReportError::InvalidResponse(message) => Self::InvalidResponse(message),
        }
    }

    /// Returns true for errors raised before any I/O took place
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingArgument(_) | Self::InvalidArgument { .. }
        )
    }
}
