//! Analytics Reporting API client
//!
//! Implements the [`IReportingApi`] port with one `reports:batchGet` POST per
//! call. Handles the bearer header, the request body layout, the `quotaUser`
//! parameter and the classification of error responses into
//! [`ReportError`] variants. It never retries; that is the job of
//! [`RetryPolicy`](crate::retry::RetryPolicy).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrono::{Duration, Utc};
//! use garunner_api::client::AnalyticsClient;
//! use garunner_core::domain::{Credentials, QueryParams};
//! use garunner_core::ports::IReportingApi;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = AnalyticsClient::new();
//! let query = QueryParams::new()
//!     .with_view_id("123456")
//!     .with_dates("30daysAgo", "yesterday")
//!     .with_metrics("ga:sessions")
//!     .with_dimensions("ga:date")
//!     .with_filters(vec![])
//!     .with_page_size(100)
//!     .validate()?;
//! let credentials = Credentials::bearer("ya29.token", Utc::now() + Duration::hours(1));
//! let report = client.batch_get(&query, &credentials).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use garunner_core::{
    config::ApiConfig,
    domain::{Credentials, ReportQuery},
    ports::{IReportingApi, Report, ReportError},
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

/// Default base URL of the Analytics Reporting API
pub const DEFAULT_BASE_URL: &str = "https://analyticsreporting.googleapis.com";

/// Path of the batchGet method
const BATCH_GET_PATH: &str = "/v4/reports:batchGet";

/// Error status that marks a 403 as a real permission problem rather than quota
const PERMISSION_DENIED: &str = "PERMISSION_DENIED";

// ============================================================================
// Request body
// ============================================================================

/// `reports:batchGet` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetRequest<'a> {
    pub report_requests: Vec<ReportRequest<'a>>,
}

/// A single report request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_id: Option<&'a str>,
    pub date_ranges: Vec<DateRange>,
    pub metrics: Vec<Metric<'a>>,
    pub order_bys: Vec<OrderBy<'a>>,
    pub page_size: u32,
    pub sampling_level: &'static str,
    pub dimensions: Vec<Dimension<'a>>,
    pub dimension_filter_clauses: &'a [Value],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
pub struct Metric<'a> {
    pub expression: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy<'a> {
    pub field_name: &'a str,
    pub sort_order: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Dimension<'a> {
    pub name: &'a str,
}

impl<'a> BatchGetRequest<'a> {
    /// Builds the request body for `query`.
    ///
    /// Rows are ordered by the metric, descending, and the largest sampling
    /// level is requested.
    pub fn for_query(query: &'a ReportQuery) -> Self {
        Self {
            report_requests: vec![ReportRequest {
                view_id: query.view_id.as_deref(),
                date_ranges: vec![DateRange {
                    start_date: query.start_date.to_string(),
                    end_date: query.end_date.to_string(),
                }],
                metrics: vec![Metric {
                    expression: &query.metrics,
                }],
                order_bys: vec![OrderBy {
                    field_name: &query.metrics,
                    sort_order: "DESCENDING",
                }],
                page_size: query.page_size,
                sampling_level: "LARGE",
                dimensions: vec![Dimension {
                    name: &query.dimensions,
                }],
                dimension_filter_clauses: &query.filters,
            }],
        }
    }
}

// ============================================================================
// Error responses
// ============================================================================

/// Google API error envelope
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Classifies an error response.
///
/// HTTP 429, and HTTP 403 unless the provider marks it `PERMISSION_DENIED`,
/// are quota signals. Everything else is a plain remote error.
fn classify_error(status: StatusCode, body: &str) -> ReportError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = match &envelope {
        Some(e) if !e.error.message.is_empty() => e.error.message.clone(),
        _ if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        _ => body.trim().to_string(),
    };
    let permission_denied = envelope
        .as_ref()
        .and_then(|e| e.error.status.as_deref())
        .is_some_and(|s| s == PERMISSION_DENIED);

    let code = status.as_u16();
    match status {
        StatusCode::TOO_MANY_REQUESTS => ReportError::QuotaExceeded {
            status: code,
            message,
        },
        StatusCode::FORBIDDEN if !permission_denied => ReportError::QuotaExceeded {
            status: code,
            message,
        },
        _ => ReportError::Remote {
            status: code,
            message,
        },
    }
}

// ============================================================================
// AnalyticsClient
// ============================================================================

/// HTTP client for the Analytics Reporting API
#[derive(Debug, Clone)]
pub struct AnalyticsClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
}

impl AnalyticsClient {
    /// Creates a client for the public Analytics Reporting endpoint
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Creates a client with a custom base URL (useful for testing)
    ///
    /// # Arguments
    /// * `base_url` - Scheme and host (and optional path prefix) of the API
    pub fn with_base_url(base_url: &str) -> anyhow::Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&format!("{base_url}{BATCH_GET_PATH}"))
            .with_context(|| format!("Invalid reporting API base URL: {base_url}"))?;
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    /// Creates a client from the `api` configuration section
    pub fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        Self::with_base_url(&config.base_url)
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The batchGet URL for a request made on behalf of `quota_user`
    fn url_for(&self, quota_user: Option<&str>) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}{BATCH_GET_PATH}", self.base_url))?;
        if let Some(quota_user) = quota_user {
            url.query_pairs_mut().append_pair("quotaUser", quota_user);
        }
        Ok(url)
    }
}

impl Default for AnalyticsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IReportingApi for AnalyticsClient {
    async fn batch_get(
        &self,
        query: &ReportQuery,
        credentials: &Credentials,
    ) -> Result<Report, ReportError> {
        let url = self
            .url_for(query.quota_id.as_deref())
            .map_err(|e| ReportError::Network(format!("Invalid request URL: {e}")))?;
        info!(
            view_id = query.view_id.as_deref().unwrap_or(""),
            start_date = %query.start_date,
            end_date = %query.end_date,
            metrics = %query.metrics,
            "Fetching report"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&credentials.access_token)
            .json(&BatchGetRequest::for_query(query))
            .send()
            .await
            .map_err(|e| ReportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = classify_error(status, &body);
            debug!(status = status.as_u16(), error = %error, "batchGet returned error status");
            return Err(error);
        }

        response
            .json::<Report>()
            .await
            .map_err(|e| ReportError::InvalidResponse(e.to_string()))
    }
}
