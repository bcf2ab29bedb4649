//! Reporting API port
//!
//! Defines the remote reporting call and its failure classification. The
//! only distinction the pipeline relies on is [`ReportError::QuotaExceeded`]
//! versus everything else: quota failures are retried, the rest are not.
//!
//! ## Design Notes
//!
//! - Unlike the authorizer port this one returns a typed error, because the
//!   retry policy must be able to tell quota exhaustion apart from other
//!   failures without inspecting message text.
//! - Report bodies are opaque JSON; the query path never interprets them.

use thiserror::Error;

use crate::domain::{Credentials, ReportQuery};

/// A report body as returned by the provider
pub type Report = serde_json::Value;

/// Failure of a single remote reporting call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// The provider signalled quota or concurrency exhaustion
    #[error("Quota exceeded (HTTP {status}): {message}")]
    QuotaExceeded {
        /// HTTP status that carried the signal (403 or 429)
        status: u16,
        /// Provider message
        message: String,
    },

    /// Any other error status from the provider
    #[error("Remote error (HTTP {status}): {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Provider message
        message: String,
    },

    /// The request failed before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// A success response whose body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ReportError {
    /// Returns true for the transient quota signal that warrants a retry
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// Port trait for the remote reporting call
///
/// Implementations perform exactly one request per invocation; throttling and
/// retrying are layered on top by the caller.
#[async_trait::async_trait]
pub trait IReportingApi: Send + Sync {
    /// Fetches the report described by `query`
    ///
    /// # Arguments
    /// * `query` - The validated query
    /// * `credentials` - A non-expired credential for the query's identity
    ///
    /// # Returns
    /// The report body on success
    async fn batch_get(
        &self,
        query: &ReportQuery,
        credentials: &Credentials,
    ) -> Result<Report, ReportError>;
}
