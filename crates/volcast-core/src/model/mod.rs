//! # Volatility Model
//!
//! Constant-mean GARCH(p, q) with Gaussian innovations, fitted by maximum
//! likelihood over a bounded Nelder-Mead search.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`GarchModel`] | Fits a [`FittedState`] and forecasts forward variances |
//! | [`FittedState`] | Serializable parameters plus the trailing filter state |
//! | [`VarianceForecast`] | Horizon-length variances after the last fitted date |
//! | [`optimizer`] | The simplex minimiser used by the fit |
//!
//! Results are deterministic for identical inputs, but no bit-for-bit
//! agreement with other GARCH libraries is promised.

mod garch;
pub mod optimizer;

pub use garch::{FittedState, GarchModel, VarianceForecast, MAX_HORIZON};
pub use optimizer::{NelderMeadOptions, OptimisationResult};
