//! Integration tests for garunner-api
//!
//! Uses wiremock to simulate the Analytics Reporting API and the OAuth token
//! endpoint, and verifies end-to-end behavior of the HTTP client, the
//! authorizers and the query runner.

mod common;

mod test_auth;
mod test_client;
mod test_runner;
