//! garunner API - Analytics Reporting client with throttling, retries and caching
//!
//! Provides:
//! - An HTTP adapter for `reports:batchGet`
//! - Service-account and refresh-token authorizers
//! - A FIFO dispatcher bounding concurrent remote calls
//! - Fixed-delay retries on quota exhaustion
//! - The [`QueryRunner`](runner::QueryRunner) tying them to the response cache
//!
//! ## Modules
//!
//! - [`auth`] - Authorizer implementations
//! - [`client`] - Analytics Reporting HTTP client
//! - [`dispatcher`] - Bounded FIFO dispatcher
//! - [`retry`] - Quota retry policy
//! - [`runner`] - Query orchestration
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::{path::Path, sync::Arc};
//!
//! use garunner_api::{auth::ServiceAccountAuthorizer, runner::QueryRunner};
//! use garunner_core::{config::Config, domain::QueryParams};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load_or_default(&Config::default_path());
//! let authorizer = ServiceAccountAuthorizer::from_key_file(Path::new("key.json"), &config.api)?;
//! let runner = QueryRunner::from_config(&config, Arc::new(authorizer))?;
//!
//! let params = QueryParams::new()
//!     .with_quota_id("site-42")
//!     .with_view_id("123456")
//!     .with_dates("2024-01-01", "2024-01-31")
//!     .with_metrics("ga:sessions")
//!     .with_dimensions("ga:date")
//!     .with_filters(vec![])
//!     .with_page_size(100);
//! let report = runner.run(&params).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod dispatcher;
pub mod retry;
pub mod runner;

pub use dispatcher::{DispatchError, Dispatcher};
pub use retry::RetryPolicy;
pub use runner::{QueryOutcome, QueryRunner, ReportSource};
