use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use time::Date;

use super::optimizer::{nelder_mead, NelderMeadOptions};
use crate::domain::iso_date;
use crate::{ForecastError, ReturnSeries};

const BACKCAST_DECAY: f64 = 0.94;
const BACKCAST_TERMS: usize = 75;
const MIN_OBSERVATIONS_PER_PARAMETER: usize = 10;
const MIN_VARIANCE: f64 = 1e-12;

/// Longest forecast accepted, about ten years of business days.
pub const MAX_HORIZON: usize = 2_520;

/// Fitted constant-mean GARCH(p, q) model with Gaussian innovations:
///
/// ```text
/// r_t = mu + e_t
/// s2_t = omega + sum_i alpha_i * e_{t-i}^2 + sum_j beta_j * s2_{t-j}
/// ```
///
/// Holds everything needed to forecast without the original returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedState {
    pub p: usize,
    pub q: usize,
    pub mu: f64,
    pub omega: f64,
    pub alpha: Vec<f64>,
    pub beta: Vec<f64>,
    pub log_likelihood: f64,
    pub converged: bool,
    pub iterations: usize,
    pub n_obs: usize,
    /// Date of the last return the model saw; forecasts start after it.
    #[serde(with = "iso_date")]
    pub last_date: Date,
    /// Last `p` squared residuals, oldest first.
    pub recent_squared_residuals: Vec<f64>,
    /// Last `q` conditional variances, oldest first.
    pub recent_variances: Vec<f64>,
}

impl FittedState {
    pub fn persistence(&self) -> f64 {
        self.alpha.iter().sum::<f64>() + self.beta.iter().sum::<f64>()
    }

    /// Long-run variance the forecast converges to.
    pub fn unconditional_variance(&self) -> f64 {
        self.omega / (1.0 - self.persistence())
    }
}

/// Forward conditional variances, one per step after `last_date`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarianceForecast {
    #[serde(with = "iso_date")]
    pub last_date: Date,
    pub variances: Vec<f64>,
}

impl VarianceForecast {
    pub fn horizon(&self) -> usize {
        self.variances.len()
    }
}

/// Gaussian maximum-likelihood GARCH estimator.
#[derive(Debug, Clone)]
pub struct GarchModel {
    options: NelderMeadOptions,
}

impl Default for GarchModel {
    fn default() -> Self {
        Self::new(NelderMeadOptions {
            max_iterations: 10_000,
            x_tolerance: 1e-6,
            f_tolerance: 1e-6,
            initial_step: 0.05,
        })
    }
}

impl GarchModel {
    pub fn new(options: NelderMeadOptions) -> Self {
        Self { options }
    }

    /// Smallest return series accepted for a GARCH(p, q) fit.
    pub const fn min_observations(p: usize, q: usize) -> usize {
        MIN_OBSERVATIONS_PER_PARAMETER * (2 + p + q)
    }

    pub fn fit(&self, returns: &ReturnSeries, p: usize, q: usize) -> Result<FittedState, ForecastError> {
        if p == 0 || q == 0 {
            return Err(ForecastError::fit(format!(
                "GARCH orders must be >= 1, got p={p} q={q}"
            )));
        }

        let required = Self::min_observations(p, q);
        if returns.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: returns.len(),
            });
        }
        let last_date = returns
            .last_date()
            .ok_or(ForecastError::InsufficientData {
                required,
                actual: 0,
            })?;

        let values = returns.values();
        if values.iter().any(|value| !value.is_finite()) {
            return Err(ForecastError::fit("return series contains non-finite values"));
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / n;
        if variance <= MIN_VARIANCE {
            return Err(ForecastError::fit("return series has zero variance"));
        }

        let start = starting_point(mean, variance, p, q);
        let objective = |params: &[f64]| negative_log_likelihood(params, &values, p, q);
        let first = nelder_mead(objective, &start, &self.options);
        // Restart from the optimum to recover from a collapsed simplex.
        let result = if first.converged {
            let mut restarted = nelder_mead(objective, &first.x, &self.options);
            restarted.iterations += first.iterations;
            restarted
        } else {
            first
        };

        if !result.converged {
            return Err(ForecastError::fit(format!(
                "optimiser did not converge within {} iterations",
                self.options.max_iterations
            )));
        }
        if !result.value.is_finite() || result.x.iter().any(|value| !value.is_finite()) {
            return Err(ForecastError::fit("likelihood optimum is not finite"));
        }

        let params = GarchParams::split(&result.x, p, q);
        let (residuals, variances) = filter(&params, &values);
        let state = FittedState {
            p,
            q,
            mu: params.mu,
            omega: params.omega,
            alpha: params.alpha.to_vec(),
            beta: params.beta.to_vec(),
            log_likelihood: -result.value,
            converged: result.converged,
            iterations: result.iterations,
            n_obs: values.len(),
            last_date,
            recent_squared_residuals: tail(&residuals, p).iter().map(|e| e * e).collect(),
            recent_variances: tail(&variances, q).to_vec(),
        };

        tracing::debug!(
            p,
            q,
            omega = state.omega,
            persistence = state.persistence(),
            log_likelihood = state.log_likelihood,
            iterations = state.iterations,
            "garch fit converged"
        );
        Ok(state)
    }

    /// Analytic multi-step variance forecast: future squared residuals are
    /// replaced by their expectation, the forecast variance itself.
    pub fn forecast(&self, state: &FittedState, horizon: usize) -> Result<VarianceForecast, ForecastError> {
        if horizon == 0 {
            return Err(ForecastError::fit("forecast horizon must be >= 1"));
        }
        if horizon > MAX_HORIZON {
            return Err(ForecastError::fit(format!(
                "forecast horizon {horizon} exceeds max {MAX_HORIZON}"
            )));
        }
        if state.alpha.len() != state.p
            || state.beta.len() != state.q
            || state.recent_squared_residuals.len() != state.p
            || state.recent_variances.len() != state.q
        {
            return Err(ForecastError::fit("fitted state is inconsistent with its orders"));
        }

        let mut squared_residuals = state.recent_squared_residuals.clone();
        let mut variances_hist = state.recent_variances.clone();
        let mut forecast = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let next = state.omega
                + weighted_lags(&state.alpha, &squared_residuals)
                + weighted_lags(&state.beta, &variances_hist);
            squared_residuals.push(next);
            variances_hist.push(next);
            forecast.push(next);
        }

        Ok(VarianceForecast {
            last_date: state.last_date,
            variances: forecast,
        })
    }
}

/// `sum_k weights[k] * history[len - 1 - k]`: lag 1 is the newest entry.
fn weighted_lags(weights: &[f64], history: &[f64]) -> f64 {
    weights
        .iter()
        .zip(history.iter().rev())
        .map(|(weight, value)| weight * value)
        .sum()
}

fn tail(values: &[f64], count: usize) -> &[f64] {
    &values[values.len().saturating_sub(count)..]
}

struct GarchParams<'a> {
    mu: f64,
    omega: f64,
    alpha: &'a [f64],
    beta: &'a [f64],
}

impl<'a> GarchParams<'a> {
    /// Parameter vector layout: `[mu, omega, alpha_1..alpha_p, beta_1..beta_q]`.
    fn split(params: &'a [f64], p: usize, q: usize) -> Self {
        Self {
            mu: params[0],
            omega: params[1],
            alpha: &params[2..2 + p],
            beta: &params[2 + p..2 + p + q],
        }
    }

    fn is_stationary(&self) -> bool {
        let persistence = self.alpha.iter().sum::<f64>() + self.beta.iter().sum::<f64>();
        self.omega > 0.0
            && self.alpha.iter().all(|value| *value >= 0.0)
            && self.beta.iter().all(|value| *value >= 0.0)
            && persistence < 1.0
    }
}

fn starting_point(mean: f64, variance: f64, p: usize, q: usize) -> Vec<f64> {
    let alpha_total = 0.1;
    let beta_total = 0.8;
    let mut start = Vec::with_capacity(2 + p + q);
    start.push(mean);
    start.push(variance * (1.0 - alpha_total - beta_total));
    start.extend(std::iter::repeat(alpha_total / p as f64).take(p));
    start.extend(std::iter::repeat(beta_total / q as f64).take(q));
    start
}

/// Exponentially weighted mean of the leading squared residuals; stands in
/// for pre-sample residuals and variances.
fn backcast(residuals: &[f64]) -> f64 {
    let terms = residuals.len().min(BACKCAST_TERMS);
    let mut weight = 1.0;
    let mut weighted = 0.0;
    let mut total = 0.0;
    for residual in &residuals[..terms] {
        weighted += weight * residual * residual;
        total += weight;
        weight *= BACKCAST_DECAY;
    }
    (weighted / total).max(MIN_VARIANCE)
}

/// Residuals and conditional variances implied by `params`.
fn filter(params: &GarchParams<'_>, returns: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let residuals: Vec<f64> = returns.iter().map(|value| value - params.mu).collect();
    let seed = backcast(&residuals);

    let mut variances = Vec::with_capacity(residuals.len());
    for t in 0..residuals.len() {
        let mut variance = params.omega;
        for (lag, alpha) in params.alpha.iter().enumerate() {
            let squared = match t.checked_sub(lag + 1) {
                Some(index) => residuals[index] * residuals[index],
                None => seed,
            };
            variance += alpha * squared;
        }
        for (lag, beta) in params.beta.iter().enumerate() {
            let previous = match t.checked_sub(lag + 1) {
                Some(index) => variances[index],
                None => seed,
            };
            variance += beta * previous;
        }
        variances.push(variance.max(MIN_VARIANCE));
    }
    (residuals, variances)
}

fn negative_log_likelihood(params: &[f64], returns: &[f64], p: usize, q: usize) -> f64 {
    let params = GarchParams::split(params, p, q);
    if !params.is_stationary() {
        return f64::INFINITY;
    }

    let (residuals, variances) = filter(&params, returns);
    let ln_two_pi = (2.0 * PI).ln();
    0.5 * residuals
        .iter()
        .zip(&variances)
        .map(|(residual, variance)| ln_two_pi + variance.ln() + residual * residual / variance)
        .sum::<f64>()
}
