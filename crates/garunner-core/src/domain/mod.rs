//! Domain types
//!
//! This module contains the core data records for garunner:
//! - Query parameters, validated report queries and their cache fingerprint
//! - Credential records cached per identity
//! - The query error taxonomy

pub mod credentials;
pub mod errors;
pub mod query;

// Re-export commonly used types
pub use credentials::Credentials;
pub use errors::QueryError;
pub use query::{
    Fingerprint, MonthMarker, QueryParams, ReportDate, ReportQuery, DEFAULT_IDENTITY,
    REQUIRED_FIELDS,
};
