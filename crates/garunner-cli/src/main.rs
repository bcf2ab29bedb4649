//! garunner CLI - Command-line interface for garunner
//!
//! Provides commands for:
//! - Running report queries through the cache, dispatcher and retry policy
//! - Inspecting and removing cache entries
//! - Inspecting and clearing stored tokens
//! - Viewing and validating configuration

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    cache::CacheCommand, completions::CompletionsCommand, config::ConfigCommand,
    query::QueryCommand, token::TokenCommand, ConfigSource,
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "garunner",
    version,
    about = "Cached, throttled Analytics Reporting queries"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a report query
    Query(QueryCommand),
    /// Inspect the response cache
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Inspect stored access tokens
    #[command(subcommand)]
    Token(TokenCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Log filter for a `-v` count, falling back to the configured level
fn filter_for(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let source = ConfigSource::new(cli.config.as_deref());

    // Setup tracing
    let configured = source.logging_level();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for(cli.verbose, &configured)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let result = match cli.command {
        Commands::Query(cmd) => cmd.execute(format, &source).await,
        Commands::Cache(cmd) => cmd.execute(format, &source).await,
        Commands::Token(cmd) => cmd.execute(format, &source).await,
        Commands::Config(cmd) => cmd.execute(format, &source).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            get_formatter(cli.json).error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
