//! Query orchestration
//!
//! [`QueryRunner`] is the public entry point. For every query it
//!
//! 1. validates the parameters (failing before any I/O),
//! 2. ensures a valid credential for the query's identity, authorizing
//!    through the dispatcher when the stored one is missing or expired,
//! 3. serves a fresh cached response if there is one, and otherwise
//! 4. fetches through the dispatcher with quota retries and writes the
//!    response back to the cache.
//!
//! All settings are fixed when the runner is built. Runners are cheap to
//! share behind an `Arc`; every call made through one runner shares its
//! dispatcher and therefore its concurrency ceiling.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use garunner_cache::{FingerprintCache, TokenStore};
use garunner_core::{
    config::Config,
    domain::{QueryError, QueryParams},
    ports::{IAuthorizer, IReportingApi, Report},
};
use tracing::{debug, info, warn};

use crate::{client::AnalyticsClient, dispatcher::Dispatcher, retry::RetryPolicy};

/// Where a report came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSource {
    /// Served from the fingerprint cache without a remote call
    Cache,
    /// Fetched from the reporting API
    Remote,
}

/// A report together with how it was obtained
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub report: Report,
    pub source: ReportSource,
    /// Non-fatal problems, such as a failed cache write
    pub warnings: Vec<String>,
}

/// Caching, throttled, retrying query runner
pub struct QueryRunner {
    api: Arc<dyn IReportingApi>,
    authorizer: Arc<dyn IAuthorizer>,
    dispatcher: Dispatcher,
    retry: RetryPolicy,
    cache: FingerprintCache,
    tokens: TokenStore,
    cache_enabled: bool,
}

impl QueryRunner {
    /// Creates a runner from `config` with explicit adapters.
    pub fn new(
        config: &Config,
        api: Arc<dyn IReportingApi>,
        authorizer: Arc<dyn IAuthorizer>,
    ) -> Self {
        Self {
            api,
            authorizer,
            dispatcher: Dispatcher::new(config.concurrency.limit, config.concurrency.queue_limit),
            retry: RetryPolicy::from_config(&config.concurrency),
            cache: FingerprintCache::new(&config.cache.dir),
            tokens: TokenStore::new(&config.cache.token_dir),
            cache_enabled: config.cache.enabled,
        }
    }

    /// Creates a runner talking to the API configured in `config.api`.
    pub fn from_config(config: &Config, authorizer: Arc<dyn IAuthorizer>) -> anyhow::Result<Self> {
        let api = AnalyticsClient::from_config(&config.api)?;
        Ok(Self::new(config, Arc::new(api), authorizer))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Runs a query and returns its report.
    pub async fn run(&self, params: &QueryParams) -> Result<Report, QueryError> {
        self.run_detailed(params).await.map(|outcome| outcome.report)
    }

    /// Runs a query and reports where the result came from.
    pub async fn run_detailed(&self, params: &QueryParams) -> Result<QueryOutcome, QueryError> {
        self.run_detailed_at(params, Local::now()).await
    }

    /// Runs a query as if the current time were `now`.
    ///
    /// `now` drives token expiry and cache freshness.
    pub async fn run_detailed_at(
        &self,
        params: &QueryParams,
        now: DateTime<Local>,
    ) -> Result<QueryOutcome, QueryError> {
        let query = params.validate()?;
        let identity = query.identity();

        let credentials = self
            .tokens
            .ensure(identity, now.with_timezone(&Utc), || async {
                self.dispatcher
                    .submit(self.authorizer.authorize(identity))
                    .await?
                    .map_err(|e| QueryError::Authorization(format!("{e:#}")))
            })
            .await?;

        let key = FingerprintCache::key_for(&query)?;

        if self.cache_enabled {
            if let Some(report) = self.cache.lookup(&query, &key, now).await {
                return Ok(QueryOutcome {
                    report,
                    source: ReportSource::Cache,
                    warnings: Vec::new(),
                });
            }
        } else {
            debug!(key = %key, "Cache disabled, skipping lookup");
        }

        let report = self
            .retry
            .run(&self.dispatcher, |attempt| {
                debug!(key = %key, attempt, "Dispatching batchGet");
                self.api.batch_get(&query, &credentials)
            })
            .await?;
        info!(key = %key, identity, "Fetched report");

        let mut warnings = Vec::new();
        if self.cache_enabled {
            let written = match serde_json::to_vec(&report) {
                Ok(body) => self.cache.write(&key, &body).await.map(drop),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = written {
                warn!(key = %key, error = %e, "Failed to write cached file");
                warnings.push(format!("Failed to write cache entry {key}: {e}"));
            }
        }

        Ok(QueryOutcome {
            report,
            source: ReportSource::Remote,
            warnings,
        })
    }
}
