//! End-to-end tests for the query runner against a mock reporting API
//!
//! Covers the cache scenarios (hit within the same day, hit for a closed
//! month, refetch for the current month), quota retries through the real
//! HTTP client, and re-authorization of expired tokens.

use std::{path::Path, sync::Arc, time::SystemTime};

use chrono::{Duration, Local, TimeZone, Utc};
use futures_util::future::join_all;
use garunner_api::runner::{QueryRunner, ReportSource};
use garunner_cache::FingerprintCache;
use garunner_core::domain::{Credentials, QueryError};
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, StaticAuthorizer, BATCH_GET_PATH};

fn set_mtime(path: &Path, when: chrono::DateTime<Local>) {
    std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .expect("open cached file")
        .set_modified(SystemTime::from(when))
        .expect("set modification time");
}

/// Writes the scenario query's cache entry and backdates it to `written`.
async fn seed_cache(runner: &QueryRunner, written: chrono::DateTime<Local>) {
    let key = FingerprintCache::key_for(&common::scenario_params().validate().unwrap()).unwrap();
    let body = serde_json::to_vec(&common::report_body()).unwrap();
    let path = runner.cache().write(&key, &body).await.unwrap();
    set_mtime(&path, written);
}

#[tokio::test]
async fn test_repeated_query_is_served_from_cache() {
    let server = MockServer::start().await;
    common::mount_report(&server, 1).await;
    let dir = tempdir().expect("Failed to create temp dir");
    let authorizer = Arc::new(StaticAuthorizer::new("test-access-token"));
    let runner = QueryRunner::from_config(&common::test_config(&server, dir.path()), authorizer.clone())
        .unwrap();

    let first = runner.run_detailed(&common::scenario_params()).await.unwrap();
    let second = runner.run_detailed(&common::scenario_params()).await.unwrap();

    assert_eq!(first.source, ReportSource::Remote);
    assert_eq!(second.source, ReportSource::Cache);
    assert_eq!(second.report, common::report_body());
    assert_eq!(authorizer.calls(), 1);
}

#[tokio::test]
async fn test_identities_share_cache_entries() {
    let server = MockServer::start().await;
    common::mount_report(&server, 1).await;
    let dir = tempdir().expect("Failed to create temp dir");
    let authorizer = Arc::new(StaticAuthorizer::new("test-access-token"));
    let runner = QueryRunner::from_config(&common::test_config(&server, dir.path()), authorizer.clone())
        .unwrap();

    runner.run(&common::scenario_params()).await.unwrap();
    let other = runner
        .run_detailed(&common::scenario_params().with_quota_id("site-99"))
        .await
        .unwrap();

    assert_eq!(other.source, ReportSource::Cache);
    // Each identity still gets its own credential.
    assert_eq!(authorizer.calls(), 2);
    assert!(runner.tokens().path_for("site-99").exists());
}

#[tokio::test]
async fn test_closed_month_entry_is_served_in_a_later_month() {
    let server = MockServer::start().await;
    common::mount_report(&server, 0).await;
    let dir = tempdir().expect("Failed to create temp dir");
    let runner = QueryRunner::from_config(
        &common::test_config(&server, dir.path()),
        Arc::new(StaticAuthorizer::new("t")),
    )
    .unwrap();

    // Cached on 2024-02-10, asked again on 2024-03-05.
    seed_cache(&runner, Local.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap()).await;
    let outcome = runner
        .run_detailed_at(
            &common::scenario_params(),
            Local.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.source, ReportSource::Cache);
    assert_eq!(outcome.report, common::report_body());
}

#[tokio::test]
async fn test_current_month_entry_from_earlier_day_is_refetched() {
    let server = MockServer::start().await;
    common::mount_report(&server, 1).await;
    let dir = tempdir().expect("Failed to create temp dir");
    let runner = QueryRunner::from_config(
        &common::test_config(&server, dir.path()),
        Arc::new(StaticAuthorizer::new("t")),
    )
    .unwrap();

    // Cached on 2024-01-15, asked again on 2024-01-20 while January is open.
    seed_cache(&runner, Local.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()).await;
    let outcome = runner
        .run_detailed_at(
            &common::scenario_params(),
            Local.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.source, ReportSource::Remote);
    // The refetch refreshed the entry.
    let key = FingerprintCache::key_for(&common::scenario_params().validate().unwrap()).unwrap();
    let entry = runner.cache().read(&key).await.unwrap().unwrap();
    assert_eq!(entry.modified.date_naive(), Local::now().date_naive());
}

#[tokio::test]
async fn test_quota_errors_are_retried_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(common::error_body(
            429,
            "Rate Limit Exceeded",
            "RESOURCE_EXHAUSTED",
        )))
        .expect(3)
        .mount(&server)
        .await;
    let dir = tempdir().expect("Failed to create temp dir");
    let runner = QueryRunner::from_config(
        &common::test_config(&server, dir.path()),
        Arc::new(StaticAuthorizer::new("t")),
    )
    .unwrap();

    let err = runner.run(&common::scenario_params()).await.unwrap_err();

    assert_eq!(
        err,
        QueryError::QuotaExhausted {
            attempts: 3,
            message: "Rate Limit Exceeded".to_string()
        }
    );
}

#[tokio::test]
async fn test_quota_error_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(common::error_body(
            403,
            "User Rate Limit Exceeded",
            "RESOURCE_EXHAUSTED",
        )))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    common::mount_report(&server, 1).await;
    let dir = tempdir().expect("Failed to create temp dir");
    let runner = QueryRunner::from_config(
        &common::test_config(&server, dir.path()),
        Arc::new(StaticAuthorizer::new("t")),
    )
    .unwrap();

    let report = runner.run(&common::scenario_params()).await.unwrap();
    assert_eq!(report, common::report_body());
}

#[tokio::test]
async fn test_permission_denied_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(common::error_body(
            403,
            "User does not have sufficient permissions for this profile.",
            "PERMISSION_DENIED",
        )))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempdir().expect("Failed to create temp dir");
    let runner = QueryRunner::from_config(
        &common::test_config(&server, dir.path()),
        Arc::new(StaticAuthorizer::new("t")),
    )
    .unwrap();

    let err = runner.run(&common::scenario_params()).await.unwrap_err();
    assert!(matches!(err, QueryError::Remote { status: 403, .. }));
}

#[tokio::test]
async fn test_expired_token_is_replaced_before_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::report_body()))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempdir().expect("Failed to create temp dir");
    let authorizer = Arc::new(StaticAuthorizer::new("fresh-token"));
    let runner = QueryRunner::from_config(&common::test_config(&server, dir.path()), authorizer.clone())
        .unwrap();

    let expired = Credentials::bearer("stale-token", Utc::now() - Duration::minutes(5));
    runner.tokens().store("site-42", &expired).await.unwrap();

    runner.run(&common::scenario_params()).await.unwrap();

    assert_eq!(authorizer.calls(), 1);
    let stored = runner.tokens().load("site-42").await.unwrap().unwrap();
    assert_eq!(stored.access_token, "fresh-token");
}

#[tokio::test]
async fn test_concurrent_distinct_queries_all_complete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_GET_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::report_body())
                .set_delay(std::time::Duration::from_millis(20)),
        )
        .expect(8)
        .mount(&server)
        .await;
    let dir = tempdir().expect("Failed to create temp dir");
    let mut config = common::test_config(&server, dir.path());
    config.concurrency.limit = 3;
    let runner = QueryRunner::from_config(&config, Arc::new(StaticAuthorizer::new("t"))).unwrap();

    // Store the credential first so that concurrent queries only fetch.
    runner
        .tokens()
        .store("site-42", &common::test_credentials("t"))
        .await
        .unwrap();

    let queries: Vec<_> = (1..=8)
        .map(|page_size| common::scenario_params().with_page_size(page_size))
        .collect();
    let results = join_all(queries.iter().map(|params| runner.run(params))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(runner.dispatcher().in_flight(), 0);
    assert_eq!(runner.dispatcher().queued(), 0);
}
