use serde::Serialize;
use volcast_core::{FitParams, FitRequest, ForecastOrchestrator, Ticker};

use crate::cli::FitArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct FitResponse<'a> {
    ticker: &'a str,
    use_new_data: bool,
    n_observations: usize,
    p: usize,
    q: usize,
    success: bool,
    message: String,
}

pub async fn run(
    args: &FitArgs,
    orchestrator: &ForecastOrchestrator,
    n_observations: usize,
) -> Result<CommandResult, CliError> {
    let request = FitRequest {
        ticker: Ticker::parse(&args.ticker)?,
        use_new_data: args.use_new_data,
        fit: FitParams {
            p: args.orders.p,
            q: args.orders.q,
            n_observations,
        },
    };

    match orchestrator.fit_model(&request).await {
        Ok(artifact) => {
            let file_name = artifact.key().file_name()?;
            let message = format!(
                "trained and saved '{file_name}' (persistence {:.4}, {} observations)",
                artifact.state.persistence(),
                artifact.state.n_obs
            );
            respond(args, n_observations, true, message)
        }
        Err(error) => {
            tracing::warn!(ticker = %request.ticker, stage = %error.stage, %error, "fit failed");
            respond(args, n_observations, false, error.to_string())
        }
    }
}

pub fn failure(
    args: &FitArgs,
    n_observations: usize,
    message: String,
) -> Result<CommandResult, CliError> {
    respond(args, n_observations, false, message)
}

fn respond(
    args: &FitArgs,
    n_observations: usize,
    success: bool,
    message: String,
) -> Result<CommandResult, CliError> {
    let data = serde_json::to_value(FitResponse {
        ticker: &args.ticker,
        use_new_data: args.use_new_data,
        n_observations,
        p: args.orders.p,
        q: args.orders.q,
        success,
        message,
    })?;

    Ok(if success {
        CommandResult::ok(data)
    } else {
        CommandResult::failed(data)
    })
}
