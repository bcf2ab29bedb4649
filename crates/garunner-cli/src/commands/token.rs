//! Token command - Inspect and clear stored access tokens

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use garunner_cache::TokenStore;
use garunner_core::domain::{Credentials, DEFAULT_IDENTITY};
use serde_json::{json, Value};
use tracing::info;

use super::{ensure_valid, ConfigSource};
use crate::output::{get_formatter, OutputFormat};

/// Token subcommands
#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Show the stored token of an identity
    Show {
        /// Identity / quota key
        #[arg(long, default_value = DEFAULT_IDENTITY)]
        quota_id: String,
    },
    /// Delete the stored token of an identity
    Clear {
        /// Identity / quota key
        #[arg(long, default_value = DEFAULT_IDENTITY)]
        quota_id: String,
    },
}

impl TokenCommand {
    /// Execute the token command
    pub async fn execute(&self, format: OutputFormat, source: &ConfigSource) -> Result<()> {
        let config = source.load()?;
        ensure_valid(&config)?;
        let store = TokenStore::new(&config.cache.token_dir);

        match self {
            TokenCommand::Show { quota_id } => self.execute_show(&store, quota_id, format).await,
            TokenCommand::Clear { quota_id } => self.execute_clear(&store, quota_id, format).await,
        }
    }

    async fn execute_show(
        &self,
        store: &TokenStore,
        identity: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let path = store.path_for(identity);

        let Some(credentials) = store.load(identity).await? else {
            if format.is_json() {
                formatter.print_json(&json!({
                    "identity": identity,
                    "path": path.display().to_string(),
                    "stored": false,
                }));
            } else {
                formatter.info(&format!("No token stored for '{identity}'"));
            }
            return Ok(());
        };

        let summary = token_summary(identity, &path, &credentials, Utc::now());
        if format.is_json() {
            formatter.print_json(&summary);
        } else {
            formatter.success(&format!("Token for '{identity}'"));
            formatter.info(&format!("Path:          {}", path.display()));
            formatter.info(&format!(
                "Access token:  {}",
                summary["access_token"].as_str().unwrap_or_default()
            ));
            formatter.info(&format!(
                "Expires:       {}{}",
                credentials.expires_at.to_rfc3339(),
                if summary["expired"] == true { " (expired)" } else { "" }
            ));
            formatter.info(&format!(
                "Refresh token: {}",
                if credentials.refresh_token.is_some() { "yes" } else { "no" }
            ));
        }
        Ok(())
    }

    async fn execute_clear(
        &self,
        store: &TokenStore,
        identity: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let removed = store.clear(identity).await?;
        info!(identity, removed, "Token removal");

        if format.is_json() {
            formatter.print_json(&json!({"identity": identity, "removed": removed}));
        } else if removed {
            formatter.success(&format!("Removed token for '{identity}'"));
        } else {
            formatter.info(&format!("No token stored for '{identity}'"));
        }
        Ok(())
    }
}

/// Describes a stored credential without revealing the tokens
pub fn token_summary(
    identity: &str,
    path: &Path,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Value {
    json!({
        "identity": identity,
        "path": path.display().to_string(),
        "stored": true,
        "access_token": mask(&credentials.access_token),
        "token_type": credentials.token_type,
        "expires_at": credentials.expires_at.to_rfc3339(),
        "expired": credentials.is_expired_at(now),
        "has_refresh_token": credentials.refresh_token.is_some(),
    })
}

/// Keeps the first few characters of a secret
fn mask(secret: &str) -> String {
    const VISIBLE: usize = 6;
    if secret.chars().count() <= VISIBLE {
        return "*".repeat(secret.chars().count());
    }
    let prefix: String = secret.chars().take(VISIBLE).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_mask_hides_token() {
        assert_eq!(mask("ya29.a0AfH6SMBx"), "ya29.a...");
        assert_eq!(mask("short"), "*****");
        assert_eq!(mask(""), "");
    }

    #[test]
    fn test_token_summary() {
        let now = Utc::now();
        let mut credentials =
            Credentials::bearer("ya29.secret-token", now - Duration::minutes(1));
        credentials.refresh_token = Some("1//refresh".to_string());

        let path = Path::new("/tokens/ga-runner-site-42");
        let summary = token_summary("site-42", path, &credentials, now);

        assert_eq!(summary["identity"], "site-42");
        assert_eq!(summary["access_token"], "ya29.s...");
        assert_eq!(summary["expired"], true);
        assert_eq!(summary["has_refresh_token"], true);
        assert!(!summary.to_string().contains("secret-token"));
        assert!(!summary.to_string().contains("1//refresh"));
    }

    #[tokio::test]
    async fn test_show_and_clear_round_trip_through_store() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        let credentials = Credentials::bearer("ya29.stored", Utc::now() + Duration::hours(1));
        store.store("site-7", &credentials).await.unwrap();

        let show = TokenCommand::Show {
            quota_id: "site-7".to_string(),
        };
        show.execute_show(&store, "site-7", OutputFormat::Json).await.unwrap();

        let clear = TokenCommand::Clear {
            quota_id: "site-7".to_string(),
        };
        clear.execute_clear(&store, "site-7", OutputFormat::Json).await.unwrap();

        assert!(store.load("site-7").await.unwrap().is_none());
        assert!(!store.path_for("site-7").exists());
    }
}
