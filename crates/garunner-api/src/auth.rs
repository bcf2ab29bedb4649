//! Authorizers for the Analytics Reporting API
//!
//! Two implementations of the [`IAuthorizer`] port:
//!
//! - [`ServiceAccountAuthorizer`]: signs an RS256 JWT assertion with a
//!   service account key and exchanges it at the token endpoint
//!   (`urn:ietf:params:oauth:grant-type:jwt-bearer`)
//! - [`RefreshTokenAuthorizer`]: OAuth2 refresh-token grant for an installed
//!   application, using the `oauth2` crate
//!
//! Neither caches anything; the token store decides when to call them.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use garunner_core::{config::ApiConfig, domain::Credentials, ports::IAuthorizer};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use oauth2::{
    basic::BasicClient, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Grant type for service-account assertions
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for assertions (the provider's maximum)
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Expiry assumed when the token endpoint does not report one
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

fn expiry_from(now: DateTime<Utc>, expires_in_secs: Option<i64>) -> DateTime<Utc> {
    now + Duration::seconds(expires_in_secs.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS))
}

// ============================================================================
// Service account
// ============================================================================

/// The fields of a service account JSON key that are needed for assertions
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
}

impl ServiceAccountKey {
    /// Parses a key from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid service account key")
    }

    /// Reads a key file downloaded from the cloud console
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file {}", path.display()))?;
        Self::from_json(&content)
    }
}

/// JWT claims of a service-account assertion
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token endpoint response for the JWT-bearer grant
#[derive(Debug, Deserialize)]
struct AssertionTokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Authorizes with a service account key
pub struct ServiceAccountAuthorizer {
    client_email: String,
    key_id: Option<String>,
    encoding_key: EncodingKey,
    token_url: String,
    scopes: Vec<String>,
    http: reqwest::Client,
}

impl ServiceAccountAuthorizer {
    /// Creates an authorizer from a parsed key
    ///
    /// # Arguments
    /// * `key` - Service account key (PEM private key in PKCS#1 or PKCS#8 form)
    /// * `api` - Token endpoint and scopes
    pub fn new(key: ServiceAccountKey, api: &ApiConfig) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Service account private key is not a valid RSA PEM key")?;
        Ok(Self {
            client_email: key.client_email,
            key_id: key.private_key_id,
            encoding_key,
            token_url: api.token_url.clone(),
            scopes: api.scopes.clone(),
            http: reqwest::Client::new(),
        })
    }

    /// Creates an authorizer from a key file
    pub fn from_key_file(path: &Path, api: &ApiConfig) -> Result<Self> {
        Self::new(ServiceAccountKey::from_file(path)?, api)
    }

    /// Service account e-mail used as the assertion issuer
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Builds a signed assertion valid from `now`
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.token_url.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let header = Header {
            kid: self.key_id.clone(),
            ..Header::new(Algorithm::RS256)
        };
        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .context("Failed to sign service account assertion")
    }
}

#[async_trait::async_trait]
impl IAuthorizer for ServiceAccountAuthorizer {
    async fn authorize(&self, identity: &str) -> Result<Credentials> {
        info!(identity, client_email = %self.client_email, "Requesting service account token");

        let now = Utc::now();
        let assertion = self.assertion(now)?;
        let response = self
            .http
            .post(&self.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("Failed to reach token endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Token endpoint returned HTTP {}: {}", status.as_u16(), body.trim());
        }

        let token: AssertionTokenResponse = response
            .json()
            .await
            .context("Failed to parse token endpoint response")?;

        debug!(identity, expires_in = ?token.expires_in, "Obtained service account token");
        Ok(Credentials {
            access_token: token.access_token,
            refresh_token: None,
            token_type: token.token_type.or_else(|| Some("Bearer".to_string())),
            expires_at: expiry_from(now, token.expires_in),
        })
    }
}

// ============================================================================
// Refresh token
// ============================================================================

/// Authorizes with an installed-application refresh token
pub struct RefreshTokenAuthorizer {
    client: BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    refresh_token: String,
    http: reqwest::Client,
}

impl RefreshTokenAuthorizer {
    /// Creates a new authorizer
    ///
    /// # Arguments
    /// * `client_id` - OAuth client id
    /// * `client_secret` - OAuth client secret
    /// * `refresh_token` - Long-lived refresh token issued for the client
    /// * `api` - Token endpoint configuration
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        api: &ApiConfig,
    ) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(client_id.into()))
            .set_client_secret(ClientSecret::new(client_secret.into()))
            .set_token_uri(TokenUrl::new(api.token_url.clone()).context("Invalid token URL")?);

        // Token endpoints must not be followed through redirects.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            refresh_token: refresh_token.into(),
            http,
        })
    }
}

#[async_trait::async_trait]
impl IAuthorizer for RefreshTokenAuthorizer {
    async fn authorize(&self, identity: &str) -> Result<Credentials> {
        info!(identity, "Refreshing access token");

        let now = Utc::now();
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(self.refresh_token.clone()))
            .request_async(&self.http)
            .await
            .context("Failed to refresh token")?;

        let expires_in = token_result.expires_in().map(|d| d.as_secs() as i64);
        let credentials = Credentials {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| Some(self.refresh_token.clone())),
            token_type: Some("Bearer".to_string()),
            expires_at: expiry_from(now, expires_in),
        };

        info!(identity, "Successfully refreshed access token");
        Ok(credentials)
    }
}
