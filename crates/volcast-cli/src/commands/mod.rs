mod cache;
mod describe;
mod fit;
mod forecast;
mod models;

use serde_json::Value;
use volcast_core::{ForecastOrchestrator, VolcastConfig};

use crate::cli::{CacheCommand, Cli, Command};
use crate::error::CliError;

/// JSON printed on stdout; `success = false` exits with code 3.
pub struct CommandResult {
    pub data: Value,
    pub success: bool,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            success: true,
        }
    }

    pub fn failed(data: Value) -> Self {
        Self {
            data,
            success: false,
        }
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let config = resolve_config(cli);
    tracing::debug!(?config, "resolved configuration");
    let orchestrator = ForecastOrchestrator::from_config(&config)?;

    match &cli.command {
        Command::Describe(args) => describe::run(args, &orchestrator).await,
        Command::Forecast(args) => forecast::run(args, &orchestrator, config.n_observations).await,
        Command::Fit(args) => fit::run(args, &orchestrator, config.n_observations).await,
        Command::Models(args) => models::run(args, &orchestrator),
        Command::Cache(args) => match &args.command {
            CacheCommand::Status(status_args) => cache::status(status_args, &orchestrator),
        },
    }
}

/// Result for a command cut off by `--timeout-ms`. Forecast and fit keep
/// their response shape; other commands fail outright.
pub fn timed_out(cli: &Cli) -> Result<CommandResult, CliError> {
    let message = format!("command timed out after {} ms", cli.timeout_ms);
    match &cli.command {
        Command::Forecast(args) => forecast::failure(args, message),
        Command::Fit(args) => fit::failure(args, resolve_config(cli).n_observations, message),
        _ => Err(CliError::Timeout {
            timeout_ms: cli.timeout_ms,
        }),
    }
}

fn resolve_config(cli: &Cli) -> VolcastConfig {
    let config = VolcastConfig::from_env();
    match cli.n_observations {
        Some(n_observations) => config.with_n_observations(n_observations),
        None => config,
    }
}
