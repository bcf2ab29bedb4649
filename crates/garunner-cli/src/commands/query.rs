//! Query command - Run a report query
//!
//! Builds query parameters from flags (optionally on top of a JSON
//! parameters file), picks an authorizer from the credential flags and runs
//! the query through a [`QueryRunner`] built from the configuration.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use garunner_api::{
    auth::{RefreshTokenAuthorizer, ServiceAccountAuthorizer},
    runner::{QueryRunner, ReportSource},
};
use garunner_core::{
    config::{ApiConfig, Settings},
    domain::{QueryParams, DEFAULT_IDENTITY},
    ports::IAuthorizer,
};
use serde_json::Value;
use tracing::info;

use super::{ensure_valid, ConfigSource};
use crate::output::{get_formatter, summarize_report, OutputFormat};

/// Environment variable naming a service-account key file
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Query parameter flags, shared by `query` and `cache`
#[derive(Debug, Clone, Default, clap::Args)]
pub struct QueryArgs {
    /// JSON file with query parameters; the flags below override its fields
    #[arg(long, value_name = "FILE")]
    pub params: Option<PathBuf>,
    /// Identity / quota key (selects the stored token, sent as quotaUser)
    #[arg(long)]
    pub quota_id: Option<String>,
    /// Reporting view id
    #[arg(long)]
    pub view_id: Option<String>,
    /// First day of the range (YYYY-MM-DD, today, yesterday, NdaysAgo)
    #[arg(long)]
    pub start_date: Option<String>,
    /// Last day of the range
    #[arg(long)]
    pub end_date: Option<String>,
    /// Month the tracked entity was created (YYYY-MM)
    #[arg(long)]
    pub created_date: Option<String>,
    /// Metric expression, e.g. ga:sessions
    #[arg(long)]
    pub metrics: Option<String>,
    /// Dimension name, e.g. ga:date
    #[arg(long)]
    pub dimensions: Option<String>,
    /// Dimension filter clauses as a JSON array
    #[arg(long, value_name = "JSON")]
    pub filters: Option<String>,
    /// Maximum number of rows
    #[arg(long)]
    pub page_size: Option<u32>,
}

impl QueryArgs {
    /// Merges the parameters file (if any) with the individual flags
    pub fn to_params(&self) -> Result<QueryParams> {
        let mut params = match &self.params {
            Some(path) => read_params_file(path)?,
            None => QueryParams::new(),
        };

        let overrides = [
            (&mut params.quota_id, &self.quota_id),
            (&mut params.view_id, &self.view_id),
            (&mut params.start_date, &self.start_date),
            (&mut params.end_date, &self.end_date),
            (&mut params.created_date, &self.created_date),
            (&mut params.metrics, &self.metrics),
            (&mut params.dimensions, &self.dimensions),
        ];
        for (field, flag) in overrides {
            if flag.is_some() {
                field.clone_from(flag);
            }
        }
        if let Some(filters) = &self.filters {
            params.filters = Some(parse_filters(filters)?);
        }
        if self.page_size.is_some() {
            params.page_size = self.page_size;
        }

        Ok(params)
    }
}

fn read_params_file(path: &Path) -> Result<QueryParams> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameters file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid parameters file {}", path.display()))
}

fn parse_filters(json: &str) -> Result<Vec<Value>> {
    serde_json::from_str(json).context("--filters must be a JSON array of filter clauses")
}

/// Credential flags
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CredentialArgs {
    /// Service-account key file (JSON)
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with_all = ["client_id", "client_secret", "refresh_token"]
    )]
    pub key_file: Option<PathBuf>,
    /// OAuth client id for the refresh-token grant
    #[arg(long, requires = "client_secret", requires = "refresh_token")]
    pub client_id: Option<String>,
    /// OAuth client secret for the refresh-token grant
    #[arg(long, requires = "client_id")]
    pub client_secret: Option<String>,
    /// Refresh token issued to the client
    #[arg(long, requires = "client_id")]
    pub refresh_token: Option<String>,
}

/// How the command obtains access tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    KeyFile(PathBuf),
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

impl CredentialArgs {
    /// Picks the credential source: `--key-file`, then the refresh-token
    /// flags, then the key file named by `env_key_file`.
    pub fn source(&self, env_key_file: Option<String>) -> Result<CredentialSource> {
        if let Some(path) = &self.key_file {
            return Ok(CredentialSource::KeyFile(path.clone()));
        }
        if let (Some(client_id), Some(client_secret), Some(refresh_token)) =
            (&self.client_id, &self.client_secret, &self.refresh_token)
        {
            return Ok(CredentialSource::RefreshToken {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                refresh_token: refresh_token.clone(),
            });
        }
        match env_key_file.filter(|path| !path.trim().is_empty()) {
            Some(path) => Ok(CredentialSource::KeyFile(PathBuf::from(path))),
            None => bail!(
                "No credentials: pass --key-file, --client-id/--client-secret/--refresh-token, or set {CREDENTIALS_ENV}"
            ),
        }
    }

    /// Builds the authorizer for the selected source
    pub fn authorizer(&self, api: &ApiConfig) -> Result<Arc<dyn IAuthorizer>> {
        let source = self.source(std::env::var(CREDENTIALS_ENV).ok())?;
        let authorizer: Arc<dyn IAuthorizer> = match source {
            CredentialSource::KeyFile(path) => {
                Arc::new(ServiceAccountAuthorizer::from_key_file(&path, api)?)
            }
            CredentialSource::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => Arc::new(RefreshTokenAuthorizer::new(
                client_id,
                client_secret,
                refresh_token,
                api,
            )?),
        };
        Ok(authorizer)
    }
}

/// Arguments for the query subcommand
#[derive(Debug, clap::Args)]
pub struct QueryCommand {
    #[command(flatten)]
    pub query: QueryArgs,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// Neither read nor write the response cache
    #[arg(long)]
    pub no_cache: bool,

    /// Runtime settings as JSON, e.g. '{"concurrentMaxRetry": 5}'
    #[arg(long, value_name = "JSON")]
    pub settings: Option<String>,
}

impl QueryCommand {
    /// Execute the query command
    pub async fn execute(&self, format: OutputFormat, source: &ConfigSource) -> Result<()> {
        let formatter = get_formatter(format.is_json());

        let config = source.load()?.with_settings(&self.runtime_settings()?);
        ensure_valid(&config)?;

        let params = self.query.to_params()?;
        // Parameter problems are reported before credentials are looked at.
        params.validate()?;

        let authorizer = self.credentials.authorizer(&config.api)?;
        let runner = QueryRunner::from_config(&config, authorizer)?;

        info!(
            identity = params.quota_id.as_deref().unwrap_or(DEFAULT_IDENTITY),
            cache = runner.cache_enabled(),
            "Running query"
        );
        let outcome = runner.run_detailed(&params).await?;

        for warning in &outcome.warnings {
            formatter.warn(warning);
        }

        if format.is_json() {
            formatter.print_json(&outcome.report);
        } else {
            let origin = match outcome.source {
                ReportSource::Cache => "cache",
                ReportSource::Remote => "API",
            };
            formatter.success(&format!("Report served from {origin}"));
            for line in summarize_report(&outcome.report) {
                formatter.info(&line);
            }
        }

        Ok(())
    }

    /// `--settings` with `--no-cache` applied on top
    fn runtime_settings(&self) -> Result<Settings> {
        let mut settings = match &self.settings {
            Some(json) => Settings::from_json(json).context("Invalid --settings")?,
            None => Settings::default(),
        };
        if self.no_cache {
            settings.cache = Some(false);
        }
        Ok(settings)
    }
}
