use serde::Serialize;
use volcast_core::{FitParams, ForecastOrchestrator, ForecastRequest, ForecastResult, Ticker};

use crate::cli::ForecastArgs;
use crate::error::CliError;

use super::CommandResult;

/// The request echoed back with the outcome.
#[derive(Debug, Serialize)]
struct ForecastResponse<'a> {
    ticker: &'a str,
    horizon: usize,
    use_new_data: bool,
    p: usize,
    q: usize,
    success: bool,
    forecast: ForecastResult,
    message: String,
}

pub async fn run(
    args: &ForecastArgs,
    orchestrator: &ForecastOrchestrator,
    n_observations: usize,
) -> Result<CommandResult, CliError> {
    let request = ForecastRequest {
        ticker: Ticker::parse(&args.ticker)?,
        horizon: args.horizon,
        use_new_data: args.use_new_data,
        fit: FitParams {
            p: args.orders.p,
            q: args.orders.q,
            n_observations,
        },
    };

    match orchestrator.forecast_volatility(&request).await {
        Ok(forecast) => respond(args, true, forecast, String::new()),
        Err(error) => {
            tracing::warn!(ticker = %request.ticker, stage = %error.stage, %error, "forecast failed");
            respond(args, false, ForecastResult::default(), error.to_string())
        }
    }
}

pub fn failure(args: &ForecastArgs, message: String) -> Result<CommandResult, CliError> {
    respond(args, false, ForecastResult::default(), message)
}

fn respond(
    args: &ForecastArgs,
    success: bool,
    forecast: ForecastResult,
    message: String,
) -> Result<CommandResult, CliError> {
    let data = serde_json::to_value(ForecastResponse {
        ticker: &args.ticker,
        horizon: args.horizon,
        use_new_data: args.use_new_data,
        p: args.orders.p,
        q: args.orders.q,
        success,
        forecast,
        message,
    })?;

    Ok(if success {
        CommandResult::ok(data)
    } else {
        CommandResult::failed(data)
    })
}
