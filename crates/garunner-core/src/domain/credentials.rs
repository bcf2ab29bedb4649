//! Credential records
//!
//! A [`Credentials`] value is what an authorizer hands back and what the
//! token store persists per identity. The on-disk JSON uses the same field
//! names as the token files written by earlier runners (`access_token`,
//! `refresh_token`, `token_type`, `expiry_date` in epoch milliseconds), so
//! existing token directories keep working.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authorization credential for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for obtaining a new access token without the original key material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token type reported by the identity provider (usually `Bearer`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// When the access token expires
    #[serde(rename = "expiry_date", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    /// Creates a bearer credential without a refresh token
    pub fn bearer(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: Some("Bearer".to_string()),
            expires_at,
        }
    }

    /// Returns true if the access token is no longer valid at `now`.
    ///
    /// A token is valid only while its expiry lies strictly in the future.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
