use serde::Serialize;
use volcast_core::{format_date, ArtifactKey, ForecastOrchestrator, Ticker};

use crate::cli::ModelsArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct ModelEntry {
    #[serde(flatten)]
    key: ArtifactKey,
    fit_date: String,
    file_name: String,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    ticker: Ticker,
    models: Vec<ModelEntry>,
}

pub fn run(args: &ModelsArgs, orchestrator: &ForecastOrchestrator) -> Result<CommandResult, CliError> {
    let ticker = Ticker::parse(&args.ticker)?;
    let models = orchestrator
        .list_models(&ticker)?
        .into_iter()
        .map(|key| {
            Ok(ModelEntry {
                fit_date: format_date(key.fit_date()),
                file_name: key.file_name()?,
                key,
            })
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    let data = serde_json::to_value(ModelsResponse { ticker, models })?;
    Ok(CommandResult::ok(data))
}
