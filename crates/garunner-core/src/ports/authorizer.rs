//! Authorizer port
//!
//! The identity provider's authorization flow, injected into the pipeline.
//! Uses `anyhow::Result` because authorizer failures are adapter-specific and
//! all of them end up as [`QueryError::Authorization`](crate::domain::QueryError).

use crate::domain::Credentials;

/// Port trait for acquiring fresh credentials
#[async_trait::async_trait]
pub trait IAuthorizer: Send + Sync {
    /// Runs the authorization flow for `identity`
    ///
    /// # Arguments
    /// * `identity` - The identity/quota key the credential is cached under
    ///
    /// # Returns
    /// A newly issued credential with its expiry timestamp
    async fn authorize(&self, identity: &str) -> anyhow::Result<Credentials>;
}
