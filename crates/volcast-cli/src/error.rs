use thiserror::Error;
use volcast_core::{ForecastError, PipelineError, ValidationError};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("setup failed: {0}")]
    Setup(#[from] ForecastError),

    #[error("command timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Pipeline(_) => 3,
            Self::Serialization(_) => 4,
            Self::Setup(_) => 5,
            Self::Timeout { .. } => 6,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_separate_usage_from_pipeline_failures() {
        assert_eq!(CliError::Validation(ValidationError::EmptyTicker).exit_code(), 2);
        assert_eq!(CliError::Timeout { timeout_ms: 10 }.exit_code(), 6);
        assert_eq!(
            CliError::Setup(ForecastError::storage("disk full")).exit_code(),
            5
        );
    }
}
