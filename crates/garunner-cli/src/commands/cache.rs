//! Cache command - Inspect the response cache
//!
//! `garunner cache key` shows how a query is fingerprinted and where its
//! entry lives; `garunner cache remove` deletes that entry.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Subcommand;
use garunner_cache::{freshness, FingerprintCache};
use garunner_core::domain::ReportQuery;
use serde_json::{json, Value};
use tracing::info;

use super::{ensure_valid, query::QueryArgs, ConfigSource};
use crate::output::{get_formatter, OutputFormat};

/// Cache subcommands
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show the fingerprint, key and entry of a query
    Key {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Remove the cached entry of a query
    Remove {
        #[command(flatten)]
        query: QueryArgs,
    },
}

impl CacheCommand {
    /// Execute the cache command
    pub async fn execute(&self, format: OutputFormat, source: &ConfigSource) -> Result<()> {
        let config = source.load()?;
        ensure_valid(&config)?;
        let cache = FingerprintCache::new(&config.cache.dir);

        match self {
            CacheCommand::Key { query } => {
                let query = query.to_params()?.validate()?;
                self.execute_key(&cache, &query, format).await
            }
            CacheCommand::Remove { query } => {
                let query = query.to_params()?.validate()?;
                self.execute_remove(&cache, &query, format).await
            }
        }
    }

    async fn execute_key(
        &self,
        cache: &FingerprintCache,
        query: &ReportQuery,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let description = describe_entry(cache, query, Local::now()).await?;

        if format.is_json() {
            formatter.print_json(&description);
            return Ok(());
        }

        formatter.success(&format!(
            "Cache key {}",
            description["key"].as_str().unwrap_or_default()
        ));
        formatter.info(&format!(
            "Path: {}",
            description["path"].as_str().unwrap_or_default()
        ));
        formatter.info(&format!("Fingerprint: {}", description["fingerprint"]));
        match description.get("entry").filter(|entry| !entry.is_null()) {
            Some(entry) => {
                formatter.info(&format!(
                    "Cached: {}",
                    entry["modified"].as_str().unwrap_or_default()
                ));
                formatter.info(if entry["fresh"].as_bool().unwrap_or(false) {
                    "Fresh: yes (would be served from cache)"
                } else {
                    "Fresh: no (would be refetched)"
                });
            }
            None => formatter.info("Cached: no"),
        }
        Ok(())
    }

    async fn execute_remove(
        &self,
        cache: &FingerprintCache,
        query: &ReportQuery,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let key = FingerprintCache::key_for(query)?;
        let path = cache.path_for(&key);

        let removed = cache.remove(&key).await?;
        info!(key = %key, removed, "Cache entry removal");

        if format.is_json() {
            formatter.print_json(&json!({
                "key": key.as_str(),
                "path": path.display().to_string(),
                "removed": removed,
            }));
        } else if removed {
            formatter.success(&format!("Removed {}", path.display()));
        } else {
            formatter.info(&format!("No cache entry for key {key}"));
        }
        Ok(())
    }
}

/// Describes the cache entry of `query` as seen at `now`
pub async fn describe_entry(
    cache: &FingerprintCache,
    query: &ReportQuery,
    now: DateTime<Local>,
) -> Result<Value> {
    let canonical = query
        .fingerprint()
        .canonical_bytes()
        .context("Failed to fingerprint query")?;
    let fingerprint: Value = serde_json::from_slice(&canonical)?;
    let key = FingerprintCache::key_for(query)?;
    let path = cache.path_for(&key);

    let entry = cache.read(&key).await?.map(|entry| {
        json!({
            "modified": entry.modified.to_rfc3339(),
            "size": entry.body.len(),
            "fresh": freshness::is_fresh(entry.modified.date_naive(), query, now.date_naive()),
        })
    });

    Ok(json!({
        "key": key.as_str(),
        "path": path.display().to_string(),
        "fingerprint": fingerprint,
        "entry": entry,
    }))
}
