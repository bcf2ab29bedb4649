//! Config command - View and validate garunner configuration

use anyhow::{Context, Result};
use clap::Subcommand;
use garunner_core::config::Config;
use tracing::info;

use super::ConfigSource;
use crate::output::{get_formatter, OutputFormat};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, format: OutputFormat, source: &ConfigSource) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(format, source).await,
            ConfigCommand::Validate => self.execute_validate(format, source).await,
        }
    }

    async fn execute_show(&self, format: OutputFormat, source: &ConfigSource) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let config = source.load()?;

        info!(config_path = %source.path.display(), "Showing configuration");

        if format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", source.path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    async fn execute_validate(&self, format: OutputFormat, source: &ConfigSource) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let path = source.path.display().to_string();

        let config = match Config::load(&source.path) {
            Ok(config) => config,
            Err(_) if !source.path.exists() => {
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": true,
                        "config_path": path,
                        "errors": [],
                        "defaults": true,
                    }));
                } else {
                    formatter.info(&format!("Configuration file not found at {path}"));
                    formatter.info("Built-in defaults are in effect.");
                }
                return Ok(());
            }
            Err(e) => {
                anyhow::bail!("Failed to parse configuration {path}: {e}");
            }
        };

        info!(config_path = %path, "Validating configuration");
        let errors = config.validate();

        if format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": path,
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {path}"));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {path}"));
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }
}
