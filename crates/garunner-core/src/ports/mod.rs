//! Port definitions
//!
//! Ports are the interfaces the query pipeline depends on but whose
//! implementations live in adapter crates (or in tests).
//!
//! ## Ports Overview
//!
//! - [`IReportingApi`] - The remote reporting call (one `batchGet` per query)
//! - [`IAuthorizer`] - The identity provider's authorization flow

pub mod authorizer;
pub mod reporting;

pub use authorizer::IAuthorizer;
pub use reporting::{IReportingApi, Report, ReportError};
