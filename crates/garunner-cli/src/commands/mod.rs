//! CLI subcommands

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use garunner_core::config::Config;

pub mod cache;
pub mod completions;
pub mod config;
pub mod query;
pub mod token;

/// Where the configuration file comes from
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// True when the path was given with `--config`
    pub explicit: bool,
}

impl ConfigSource {
    /// Uses `path` when given, the platform default otherwise
    pub fn new(path: Option<&str>) -> Self {
        match path {
            Some(path) => Self {
                path: PathBuf::from(path),
                explicit: true,
            },
            None => Self {
                path: Config::default_path(),
                explicit: false,
            },
        }
    }

    /// Loads the configuration.
    ///
    /// A file named with `--config` must exist and parse. The default file is
    /// optional and falls back to built-in defaults.
    pub fn load(&self) -> Result<Config> {
        if self.explicit {
            Config::load(&self.path)
                .with_context(|| format!("Failed to load configuration {}", self.path.display()))
        } else {
            Ok(Config::load_or_default(&self.path))
        }
    }

    /// Log level from the configuration, `info` when it cannot be loaded
    pub fn logging_level(&self) -> String {
        Config::load_or_default(&self.path).logging.level
    }
}

/// Fails with every validation error of `config` joined into one message
pub fn ensure_valid(config: &Config) -> Result<()> {
    let errors = config.validate();
    if errors.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    bail!("Invalid configuration: {}", messages.join("; "))
}
