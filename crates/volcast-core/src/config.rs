use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::feed::OutputSize;

pub const DEFAULT_N_OBSERVATIONS: usize = 2000;
pub const DEFAULT_ROLLING_WINDOW: usize = 6;
pub const DEFAULT_MAX_POOL_SIZE: usize = 4;

/// Runtime configuration of a volcast installation.
///
/// Paths and the API key come from the environment:
///
/// | Variable | Default |
/// |----------|---------|
/// | `VOLCAST_HOME` | `$HOME/.volcast` |
/// | `VOLCAST_DB_PATH` | `$VOLCAST_HOME/cache/prices.duckdb` |
/// | `VOLCAST_MODEL_DIR` | `$VOLCAST_HOME/models` |
/// | `VOLCAST_ALPHAVANTAGE_API_KEY` | `demo` (falls back to `ALPHAVANTAGE_API_KEY`) |
#[derive(Clone, PartialEq, Eq)]
pub struct VolcastConfig {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub model_dir: PathBuf,
    pub api_key: String,
    /// Observations used to fit a model; the cache read keeps one extra row
    /// so the return series has exactly this many points.
    pub n_observations: usize,
    pub output_size: OutputSize,
    pub rolling_window: usize,
    pub max_pool_size: usize,
}

impl VolcastConfig {
    /// Resolve the configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var_os(name))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let home = non_empty("VOLCAST_HOME")
            .map(PathBuf::from)
            .or_else(|| non_empty("HOME").map(|home| PathBuf::from(home).join(".volcast")))
            .unwrap_or_else(|| PathBuf::from(".volcast"));
        let db_path = non_empty("VOLCAST_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("cache").join("prices.duckdb"));
        let model_dir = non_empty("VOLCAST_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("models"));
        let api_key = non_empty("VOLCAST_ALPHAVANTAGE_API_KEY")
            .or_else(|| non_empty("ALPHAVANTAGE_API_KEY"))
            .and_then(|value| value.into_string().ok())
            .unwrap_or_else(|| String::from("demo"));

        Self {
            home,
            db_path,
            model_dir,
            api_key,
            n_observations: DEFAULT_N_OBSERVATIONS,
            output_size: OutputSize::Full,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
        }
    }

    /// Configuration rooted at `home` with the default layout beneath it.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            db_path: home.join("cache").join("prices.duckdb"),
            model_dir: home.join("models"),
            home,
            api_key: String::from("demo"),
            n_observations: DEFAULT_N_OBSERVATIONS,
            output_size: OutputSize::Full,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_n_observations(mut self, n_observations: usize) -> Self {
        self.n_observations = n_observations;
        self
    }

    pub fn with_output_size(mut self, output_size: OutputSize) -> Self {
        self.output_size = output_size;
        self
    }

    /// Rows to read back from the price cache.
    pub fn read_limit(&self) -> usize {
        self.n_observations.saturating_add(1)
    }
}

// Manual impl keeps the API key out of debug logs.
impl std::fmt::Debug for VolcastConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolcastConfig")
            .field("home", &self.home)
            .field("db_path", &self.db_path)
            .field("model_dir", &self.model_dir)
            .field("api_key", &"<redacted>")
            .field("n_observations", &self.n_observations)
            .field("output_size", &self.output_size)
            .field("rolling_window", &self.rolling_window)
            .field("max_pool_size", &self.max_pool_size)
            .finish()
    }
}
