use serde::Serialize;
use volcast_core::{ForecastOrchestrator, SnapshotInfo, Ticker};

use crate::cli::CacheStatusArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct CacheStatus {
    ticker: Ticker,
    cached: bool,
    snapshot: Option<SnapshotInfo>,
}

pub fn status(
    args: &CacheStatusArgs,
    orchestrator: &ForecastOrchestrator,
) -> Result<CommandResult, CliError> {
    let ticker = Ticker::parse(&args.ticker)?;
    let snapshot = orchestrator.price_snapshot(&ticker)?;

    let data = serde_json::to_value(CacheStatus {
        ticker,
        cached: snapshot.is_some(),
        snapshot,
    })?;
    Ok(CommandResult::ok(data))
}
