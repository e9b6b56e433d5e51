use volcast_core::{DescribeView, ForecastOrchestrator, Ticker};

use crate::cli::{DescribeArgs, DescribeKind};
use crate::error::CliError;

use super::CommandResult;

pub async fn run(
    args: &DescribeArgs,
    orchestrator: &ForecastOrchestrator,
) -> Result<CommandResult, CliError> {
    let ticker = Ticker::parse(&args.ticker)?;
    let view = match args.view {
        DescribeKind::Volatility => DescribeView::RollingVolatility {
            window: args.window.unwrap_or_else(|| orchestrator.rolling_window()),
        },
        DescribeKind::Price => DescribeView::Price,
    };

    let output = orchestrator.ensure_and_describe(&ticker, view).await?;
    Ok(CommandResult::ok(serde_json::to_value(output)?))
}
