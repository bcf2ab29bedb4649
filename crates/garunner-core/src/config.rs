//! Configuration module for garunner.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, a camelCase [`Settings`] overlay for the
//! per-run options callers are used to passing, and a builder pattern for
//! programmatic use.
//!
//! A [`Config`] is built once and handed to the query runner, which copies the
//! values it needs into its dispatcher, retry policy and caches. Nothing reads
//! configuration from global state after that.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable overriding the default cache directory.
pub const CACHE_DIR_ENV: &str = "CACHEDIR";

/// Environment variable overriding the default token directory.
pub const TOKEN_DIR_ENV: &str = "TOKENDIR";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for garunner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub concurrency: ConcurrencyConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

/// Response cache and token storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether responses are read from and written to the fingerprint cache.
    pub enabled: bool,
    /// Root directory of the fingerprint cache.
    pub dir: PathBuf,
    /// Directory holding one credential file per identity.
    pub token_dir: PathBuf,
}

/// Outbound concurrency and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum number of remote calls in flight at once.
    pub limit: usize,
    /// Fixed delay between quota-exceeded retries, in milliseconds.
    pub delay_ms: u64,
    /// Retries after the first attempt before a quota failure is surfaced.
    pub max_retries: u32,
    /// Maximum number of calls waiting for a slot. `None` means unbounded.
    pub queue_limit: Option<usize>,
}

/// Reporting API and identity provider endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the reporting API.
    pub base_url: String,
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// OAuth scopes requested for service-account assertions.
    pub scopes: Vec<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    ///
    /// Sections and fields missing from the file keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/garunner/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("garunner")
            .join("config.yaml")
    }

    /// Returns a copy of this configuration with `settings` applied on top.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.apply(settings);
        self
    }

    /// Applies the options present in `settings`, leaving the others untouched.
    ///
    /// Changing the cache directory also moves the token directory when the
    /// latter was still the default `tokens` subdirectory of the old cache dir.
    pub fn apply(&mut self, settings: &Settings) {
        if let Some(enabled) = settings.cache {
            self.cache.enabled = enabled;
        }
        if let Some(dir) = &settings.cache_dir {
            if self.cache.token_dir == self.cache.dir.join("tokens") {
                self.cache.token_dir = dir.join("tokens");
            }
            self.cache.dir = dir.clone();
        }
        if let Some(limit) = settings.concurrent_limit {
            self.concurrency.limit = limit;
        }
        if let Some(delay) = settings.concurrent_delay {
            self.concurrency.delay_ms = delay;
        }
        if let Some(max_retries) = settings.concurrent_max_retry {
            self.concurrency.max_retries = max_retries;
        }
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.
// (clippy::derivable_impls)

impl CacheConfig {
    /// Builds cache defaults from explicit environment values.
    ///
    /// `cache_dir` falls back to `$XDG_DATA_HOME/garunner/cache`; `token_dir`
    /// falls back to the `tokens` subdirectory of the cache directory.
    pub fn from_env_values(cache_dir: Option<String>, token_dir: Option<String>) -> Self {
        let dir = cache_dir
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                    .join("garunner")
                    .join("cache")
            });
        let token_dir = token_dir
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| dir.join("tokens"));

        Self {
            enabled: true,
            dir,
            token_dir,
        }
    }
}

impl Default for CacheConfig {
    /// Reads `CACHEDIR` / `TOKENDIR` from the environment.
    fn default() -> Self {
        Self::from_env_values(
            std::env::var(CACHE_DIR_ENV).ok(),
            std::env::var(TOKEN_DIR_ENV).ok(),
        )
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            delay_ms: 1000,
            max_retries: 3,
            queue_limit: Some(1000),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://analyticsreporting.googleapis.com".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/analytics.readonly".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings overlay
// ---------------------------------------------------------------------------

/// Per-run option overrides, spelled the way callers pass them as JSON.
///
/// ```json
/// {"cache": false, "cacheDir": "/tmp/ga", "concurrentLimit": 5,
///  "concurrentDelay": 500, "concurrentMaxRetry": 2}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_limit: Option<usize>,
    /// Milliseconds between quota retries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_max_retry: Option<u32>,
}

impl Settings {
    /// Parses a JSON settings document.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns true when no option is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"concurrency.limit"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- cache ---
        if self.cache.dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "cache.dir".into(),
                message: "must not be empty".into(),
            });
        }
        if self.cache.token_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "cache.token_dir".into(),
                message: "must not be empty".into(),
            });
        }

        // --- concurrency ---
        if self.concurrency.limit == 0 {
            errors.push(ValidationError {
                field: "concurrency.limit".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.concurrency.queue_limit == Some(0) {
            errors.push(ValidationError {
                field: "concurrency.queue_limit".into(),
                message: "must be greater than 0 (use null for an unbounded queue)".into(),
            });
        }

        // --- api ---
        for (field, value) in [
            ("api.base_url", &self.api.base_url),
            ("api.token_url", &self.api.token_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("must be an http(s) URL, got '{value}'"),
                });
            }
        }
        if self.api.scopes.is_empty() {
            errors.push(ValidationError {
                field: "api.scopes".into(),
                message: "at least one scope is required".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use garunner_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .cache_dir(PathBuf::from("/var/cache/garunner"))
///     .concurrency_limit(5)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- cache ---

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.config.cache.dir = dir;
        self
    }

    pub fn token_dir(mut self, dir: PathBuf) -> Self {
        self.config.cache.token_dir = dir;
        self
    }

    // --- concurrency ---

    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency.limit = limit;
        self
    }

    pub fn concurrency_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.concurrency.delay_ms = delay_ms;
        self
    }

    pub fn concurrency_max_retries(mut self, max_retries: u32) -> Self {
        self.config.concurrency.max_retries = max_retries;
        self
    }

    pub fn concurrency_queue_limit(mut self, queue_limit: Option<usize>) -> Self {
        self.config.concurrency.queue_limit = queue_limit;
        self
    }

    // --- api ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.token_url = url.into();
        self
    }

    pub fn api_scopes(mut self, scopes: Vec<String>) -> Self {
        self.config.api.scopes = scopes;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- settings overlay ---

    pub fn settings(mut self, settings: &Settings) -> Self {
        self.config.apply(settings);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
