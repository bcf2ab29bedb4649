//! Integration tests for the authorizers against a mock token endpoint

use garunner_api::auth::{
    AssertionClaims, RefreshTokenAuthorizer, ServiceAccountAuthorizer, ServiceAccountKey,
};
use garunner_core::{config::ApiConfig, ports::IAuthorizer};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: server.uri(),
        token_url: format!("{}/token", server.uri()),
        ..ApiConfig::default()
    }
}

fn service_account_key() -> ServiceAccountKey {
    ServiceAccountKey::from_json(
        &json!({
            "type": "service_account",
            "private_key_id": "key-1",
            "private_key": common::TEST_PRIVATE_KEY_PEM,
            "client_email": "runner@demo.iam.gserviceaccount.com"
        })
        .to_string(),
    )
    .expect("valid key json")
}

#[tokio::test]
async fn test_service_account_exchanges_signed_assertion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.service",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_config(&server);
    let authorizer =
        ServiceAccountAuthorizer::new(service_account_key(), &api).expect("valid key");
    let before = chrono::Utc::now();
    let credentials = authorizer.authorize("site-42").await.expect("authorize");

    assert_eq!(credentials.access_token, "ya29.service");
    assert_eq!(credentials.token_type.as_deref(), Some("Bearer"));
    assert!(credentials.refresh_token.is_none());
    assert!(credentials.expires_at > before + chrono::Duration::minutes(59));

    // The assertion must verify with the public key and carry the right claims.
    let requests = server.received_requests().await.expect("recording enabled");
    let assertion = url::form_urlencoded::parse(&requests[0].body)
        .find(|(k, _)| k == "assertion")
        .map(|(_, v)| v.into_owned())
        .expect("assertion parameter");

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[api.token_url.as_str()]);
    let decoded = jsonwebtoken::decode::<AssertionClaims>(
        &assertion,
        &DecodingKey::from_rsa_pem(common::TEST_PUBLIC_KEY_PEM.as_bytes()).unwrap(),
        &validation,
    )
    .expect("assertion verifies");

    assert_eq!(decoded.header.kid.as_deref(), Some("key-1"));
    assert_eq!(decoded.claims.iss, "runner@demo.iam.gserviceaccount.com");
    assert_eq!(
        decoded.claims.scope,
        "https://www.googleapis.com/auth/analytics.readonly"
    );
    assert_eq!(decoded.claims.exp - decoded.claims.iat, 3600);
}

#[tokio::test]
async fn test_service_account_token_endpoint_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .mount(&server)
        .await;

    let authorizer =
        ServiceAccountAuthorizer::new(service_account_key(), &api_config(&server)).unwrap();
    let err = authorizer.authorize("site-42").await.unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("HTTP 400"), "unexpected error: {message}");
    assert!(message.contains("invalid_grant"), "unexpected error: {message}");
}

#[tokio::test]
async fn test_refresh_token_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.refreshed",
            "token_type": "Bearer",
            "expires_in": 1800
        })))
        .expect(1)
        .mount(&server)
        .await;

    let authorizer =
        RefreshTokenAuthorizer::new("client-id", "client-secret", "1//refresh", &api_config(&server))
            .unwrap();
    let before = chrono::Utc::now();
    let credentials = authorizer.authorize("site-42").await.expect("authorize");

    assert_eq!(credentials.access_token, "ya29.refreshed");
    // No new refresh token in the response: the original one is kept.
    assert_eq!(credentials.refresh_token.as_deref(), Some("1//refresh"));
    assert!(credentials.expires_at > before + chrono::Duration::minutes(29));
    assert!(credentials.expires_at < before + chrono::Duration::minutes(31));
}

#[tokio::test]
async fn test_refresh_token_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let authorizer =
        RefreshTokenAuthorizer::new("client-id", "client-secret", "1//revoked", &api_config(&server))
            .unwrap();
    assert!(authorizer.authorize("site-42").await.is_err());
}
