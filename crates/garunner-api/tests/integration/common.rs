//! Shared test helpers for garunner-api integration tests
//!
//! Provides wiremock-based mock endpoints for the Analytics Reporting API,
//! a counting authorizer, and a runner configuration pointing at the mock
//! server with its cache and token directories in a temp dir.

use std::{
    path::Path,
    sync::atomic::{AtomicU32, Ordering},
};

use chrono::{Duration, Utc};
use garunner_core::{
    config::{Config, ConfigBuilder},
    domain::{Credentials, QueryParams},
    ports::IAuthorizer,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// RSA private key (PKCS#8) used to sign test assertions
pub const TEST_PRIVATE_KEY_PEM: &str = include_str!("fixtures/test_service_account.pem");

/// Public half of [`TEST_PRIVATE_KEY_PEM`]
pub const TEST_PUBLIC_KEY_PEM: &str = include_str!("fixtures/test_service_account.pub.pem");

/// Path of the batchGet method on the mock server
pub const BATCH_GET_PATH: &str = "/v4/reports:batchGet";

/// The query used throughout the scenarios: January 2024, created January 2024.
pub fn scenario_params() -> QueryParams {
    QueryParams::new()
        .with_quota_id("site-42")
        .with_view_id("ga:1234")
        .with_dates("2024-01-01", "2024-01-31")
        .with_created_date("2024-01")
        .with_metrics("ga:sessions")
        .with_dimensions("ga:date")
        .with_filters(vec![])
        .with_page_size(100)
}

/// A credential valid for the next hour
pub fn test_credentials(token: &str) -> Credentials {
    Credentials::bearer(token, Utc::now() + Duration::hours(1))
}

/// A minimal batchGet response body
pub fn report_body() -> Value {
    json!({
        "reports": [{
            "columnHeader": {
                "dimensions": ["ga:date"],
                "metricHeader": {"metricHeaderEntries": [{"name": "ga:sessions", "type": "INTEGER"}]}
            },
            "data": {
                "rows": [{"dimensions": ["20240101"], "metrics": [{"values": ["42"]}]}],
                "rowCount": 1
            }
        }]
    })
}

/// A Google API error body
pub fn error_body(code: u16, message: &str, status: &str) -> Value {
    json!({"error": {"code": code, "message": message, "status": status}})
}

/// Runner configuration pointing at `server`, storing files under `dir`.
///
/// Quota retries are immediate and limited to two.
pub fn test_config(server: &MockServer, dir: &Path) -> Config {
    ConfigBuilder::new()
        .cache_dir(dir.join("cache"))
        .token_dir(dir.join("tokens"))
        .concurrency_delay_ms(0)
        .concurrency_max_retries(2)
        .api_base_url(server.uri())
        .api_token_url(format!("{}/token", server.uri()))
        .build()
}

/// Mounts a batchGet endpoint answering `report_body()`, expected `calls` times.
pub async fn mount_report(server: &MockServer, calls: u64) {
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_body()))
        .expect(calls)
        .mount(server)
        .await;
}

/// Authorizer that hands out a fixed token and counts its calls
pub struct StaticAuthorizer {
    token: String,
    calls: AtomicU32,
}

impl StaticAuthorizer {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IAuthorizer for StaticAuthorizer {
    async fn authorize(&self, _identity: &str) -> anyhow::Result<Credentials> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(test_credentials(&self.token))
    }
}
