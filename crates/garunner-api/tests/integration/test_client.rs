//! Integration tests for the Analytics Reporting HTTP client
//!
//! Verifies request layout (bearer header, quotaUser, body) and the
//! classification of error responses.

use garunner_api::client::AnalyticsClient;
use garunner_core::ports::{IReportingApi, ReportError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, BATCH_GET_PATH};

async fn client_for(server: &MockServer) -> AnalyticsClient {
    AnalyticsClient::with_base_url(&server.uri()).expect("valid base url")
}

#[tokio::test]
async fn test_batch_get_sends_expected_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .and(header("authorization", "Bearer test-access-token"))
        .and(query_param("quotaUser", "site-42"))
        .and(body_partial_json(json!({
            "reportRequests": [{
                "viewId": "ga:1234",
                "dateRanges": [{"startDate": "2024-01-01", "endDate": "2024-01-31"}],
                "metrics": [{"expression": "ga:sessions"}],
                "orderBys": [{"fieldName": "ga:sessions", "sortOrder": "DESCENDING"}],
                "pageSize": 100,
                "samplingLevel": "LARGE",
                "dimensions": [{"name": "ga:date"}]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::report_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let query = common::scenario_params().validate().unwrap();
    let report = client
        .batch_get(&query, &common::test_credentials("test-access-token"))
        .await
        .expect("batch_get failed");

    assert_eq!(report, common::report_body());
}

#[tokio::test]
async fn test_429_is_quota_exceeded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(common::error_body(
            429,
            "Quota exceeded for quota metric 'Requests'",
            "RESOURCE_EXHAUSTED",
        )))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let query = common::scenario_params().validate().unwrap();
    let err = client
        .batch_get(&query, &common::test_credentials("t"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ReportError::QuotaExceeded {
            status: 429,
            message: "Quota exceeded for quota metric 'Requests'".to_string()
        }
    );
}

#[tokio::test]
async fn test_403_rate_limit_is_quota_exceeded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "User Rate Limit Exceeded"}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let query = common::scenario_params().validate().unwrap();
    let err = client
        .batch_get(&query, &common::test_credentials("t"))
        .await
        .unwrap_err();

    assert!(err.is_quota_exceeded(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_403_permission_denied_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(common::error_body(
            403,
            "User does not have sufficient permissions for this profile.",
            "PERMISSION_DENIED",
        )))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let query = common::scenario_params().validate().unwrap();
    let err = client
        .batch_get(&query, &common::test_credentials("t"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::Remote { status: 403, .. }));
}

#[tokio::test]
async fn test_400_is_remote_error_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(common::error_body(
            400,
            "Unknown metric(s): ga:sesions",
            "INVALID_ARGUMENT",
        )))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let query = common::scenario_params().validate().unwrap();
    let err = client
        .batch_get(&query, &common::test_credentials("t"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ReportError::Remote {
            status: 400,
            message: "Unknown metric(s): ga:sesions".to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_success_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let query = common::scenario_params().validate().unwrap();
    let err = client
        .batch_get(&query, &common::test_credentials("t"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let client = AnalyticsClient::with_base_url("http://127.0.0.1:1").unwrap();
    let query = common::scenario_params().validate().unwrap();
    let err = client
        .batch_get(&query, &common::test_credentials("t"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReportError::Network(_)));
}
