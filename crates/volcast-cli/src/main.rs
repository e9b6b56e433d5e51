mod cli;
mod commands;
mod error;
mod output;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(%error, "command failed");
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

/// Logs go to stderr; stdout carries only command output.
fn init_tracing() {
    let log_format = std::env::var("VOLCAST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    let budget = Duration::from_millis(cli.timeout_ms);

    let result = match tokio::time::timeout(budget, commands::run(&cli)).await {
        Ok(result) => result?,
        Err(_) => commands::timed_out(&cli)?,
    };
    output::render(&result.data, cli.pretty)?;

    if result.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(3))
    }
}
