//! Fitting of pulse models to daily incidence by bounded nonlinear least squares.
//!
//! The fit is sensitive to the initial guess: a poor guess may exhaust the evaluation budget or
//! settle on a degenerate optimum, such as a narrow spike over a single outlier. Choosing and
//! retrying guesses is left to the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::linear::{invert, Matrix};
use crate::model::{FitStats, FittedModel, ModelKind, NUM_PARAMS};
use crate::opt::{levenberg_marquardt, LevenbergMarquardtConfig, OptError};

/// The fewest observations for which three free parameters are over-determined.
pub const MIN_POINTS: usize = NUM_PARAMS + 1;

/// Starting point for the solver. `peak` is the mean (Gaussian) or x0 (logistic); `width` is the
/// standard deviation (Gaussian) or the growth rate (logistic).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Guess {
    pub amplitude: f64,
    pub peak: f64,
    pub width: f64,
}
impl Guess {
    pub fn params(&self) -> [f64; NUM_PARAMS] {
        [self.amplitude, self.peak, self.width]
    }

    fn is_valid(&self) -> bool {
        self.params()
            .iter()
            .all(|param| param.is_finite() && *param > 0.0)
    }

    /// A data-driven starting point: the day of the largest value, and a spread derived from the
    /// half-width at half-maximum. For the logistic derivative the spread is converted to the
    /// matching growth rate and the amplitude to the matching `L`. This is a caller-side
    /// convenience; [`fit`] never invokes it. Returns `None` if no value is positive or the
    /// slices differ in length.
    pub fn from_incidence(kind: ModelKind, days: &[f64], values: &[f64]) -> Option<Self> {
        if days.len() != values.len() {
            return None;
        }
        let (peak_index, &peak_value) = values
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_finite())
            .max_by(|(_, a), (_, b)| a.total_cmp(b))?;
        if peak_value <= 0.0 {
            return None;
        }
        let peak = f64::max(days[peak_index], 1.0);
        let half_max = peak_value / 2.0;
        let mut lower = peak_index;
        while lower > 0 && values[lower - 1] >= half_max {
            lower -= 1;
        }
        let mut upper = peak_index;
        while upper + 1 < values.len() && values[upper + 1] >= half_max {
            upper += 1;
        }
        let hwhm = f64::max((days[upper] - days[lower]) / 2.0, 1.0);
        let (amplitude, width) = match kind {
            // HWHM = σ·√(2 ln 2)
            ModelKind::Gaussian => (peak_value, hwhm / f64::sqrt(2.0 * f64::ln(2.0))),
            // HWHM = ln(3 + 2√2) / k, and the peak value is L·k/4
            ModelKind::Logistic => {
                let growth_rate = f64::ln(3.0 + 2.0 * f64::sqrt(2.0)) / hwhm;
                (4.0 * peak_value / growth_rate, growth_rate)
            }
        };
        Some(Self {
            amplitude,
            peak,
            width,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub solver: LevenbergMarquardtConfig,
}
impl FitOptions {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.solver.validate()
    }
}

#[derive(Debug, Error)]
pub enum FitError {
    #[error("at least {MIN_POINTS} points are required, got {points}")]
    InsufficientData { points: usize },

    #[error("{days} days but {values} values")]
    LengthMismatch { days: usize, values: usize },

    #[error("initial guess {0:?} must be finite and positive")]
    InvalidGuess(Guess),

    #[error("did not converge within {evaluations} evaluations; retry with a different initial guess")]
    DidNotConverge { evaluations: u64 },

    #[error("model is not finite at the initial guess")]
    NonFiniteResidual,

    #[error("invalid options: {0}")]
    InvalidOptions(anyhow::Error),
}

impl From<OptError> for FitError {
    fn from(err: OptError) -> Self {
        match err {
            OptError::DidNotConverge { evaluations } => FitError::DidNotConverge { evaluations },
            OptError::NonFiniteResidual => FitError::NonFiniteResidual,
            // the log-parameter transform keeps every finite start feasible
            OptError::InfeasibleStart => FitError::NonFiniteResidual,
        }
    }
}

/// Fits `kind` to the `(days[i], incidence[i])` pairs from the given starting point.
///
/// All three parameters are confined to `(0, ∞)` by solving for their logarithms.
/// The returned covariance is `(JᵀJ)⁻¹·SSR/(n−3)`, with `J` the Jacobian with respect to the
/// natural parameters at the optimum; it is infinite throughout if `JᵀJ` is singular.
pub fn fit(
    days: &[f64],
    incidence: &[f64],
    kind: ModelKind,
    guess: &Guess,
    options: &FitOptions,
) -> Result<FittedModel, FitError> {
    options.validate().map_err(FitError::InvalidOptions)?;
    if days.len() != incidence.len() {
        return Err(FitError::LengthMismatch {
            days: days.len(),
            values: incidence.len(),
        });
    }
    if days.len() < MIN_POINTS {
        return Err(FitError::InsufficientData { points: days.len() });
    }
    if !guess.is_valid() {
        return Err(FitError::InvalidGuess(*guess));
    }

    let log_guess = guess.params().map(f64::ln);
    let outcome = levenberg_marquardt(
        &options.solver,
        &log_guess,
        days.len(),
        |log_params| natural(log_params).is_some(),
        |log_params, residuals| match natural(log_params) {
            Some(params) => {
                for (residual, (&x, &y)) in residuals.iter_mut().zip(days.iter().zip(incidence)) {
                    *residual = kind.evaluate(x, &params) - y;
                }
            }
            None => residuals.fill(f64::NAN),
        },
        |log_params, jacobian| {
            if let Some(params) = natural(log_params) {
                fill_jacobian(kind, days, &params, true, jacobian);
            }
        },
    )?;

    let params = natural(&outcome.optimal_values).ok_or(FitError::NonFiniteResidual)?;
    let dof = (days.len() - NUM_PARAMS) as f64;
    let covariance = covariance(kind, days, &params, outcome.optimal_residual / dof);
    Ok(FittedModel::new(
        kind,
        params,
        covariance,
        FitStats {
            evaluations: outcome.evaluations,
            iterations: outcome.iterations,
            ssr: outcome.optimal_residual,
            termination: outcome.termination,
        },
    ))
}

/// Fits once per guess and keeps the successful fit with the smallest sum of squared residuals.
/// If every guess fails, the error from the last one is returned.
///
/// # Panics
/// If `guesses` is empty.
pub fn fit_multistart(
    days: &[f64],
    incidence: &[f64],
    kind: ModelKind,
    guesses: &[Guess],
    options: &FitOptions,
) -> Result<FittedModel, FitError> {
    assert!(!guesses.is_empty(), "at least one guess must be supplied");
    let mut best: Option<FittedModel> = None;
    let mut last_err = None;
    for guess in guesses {
        match fit(days, incidence, kind, guess, options) {
            Ok(model) => {
                let improved = best
                    .as_ref()
                    .map(|best| model.stats().ssr < best.stats().ssr)
                    .unwrap_or(true);
                if improved {
                    best = Some(model);
                }
            }
            Err(err) => last_err = Some(err),
        }
    }
    match (best, last_err) {
        (Some(best), _) => Ok(best),
        (None, Some(err)) => Err(err),
        (None, None) => unreachable!(),
    }
}

/// Maps log-parameters back to the natural domain; `None` unless every parameter is finite and
/// strictly positive.
fn natural(log_params: &[f64]) -> Option<[f64; NUM_PARAMS]> {
    let mut params = [0.0; NUM_PARAMS];
    for (param, log_param) in params.iter_mut().zip(log_params) {
        *param = log_param.exp();
    }
    if params.iter().all(|param| param.is_finite() && *param > 0.0) {
        Some(params)
    } else {
        None
    }
}

/// Writes `∂f(xᵢ)/∂pⱼ` into `jacobian`, or `∂f(xᵢ)/∂(ln pⱼ)` when `log_scale` is set.
fn fill_jacobian(kind: ModelKind, days: &[f64], params: &[f64; NUM_PARAMS], log_scale: bool, jacobian: &mut Matrix) {
    for (row, &x) in days.iter().enumerate() {
        let gradient = kind.gradient(x, params);
        for (col, partial) in gradient.iter().enumerate() {
            jacobian[(row, col)] = if log_scale {
                partial * params[col]
            } else {
                *partial
            };
        }
    }
}

fn covariance(
    kind: ModelKind,
    days: &[f64],
    params: &[f64; NUM_PARAMS],
    residual_variance: f64,
) -> [[f64; NUM_PARAMS]; NUM_PARAMS] {
    let mut jacobian = Matrix::allocate(days.len(), NUM_PARAMS);
    fill_jacobian(kind, days, params, false, &mut jacobian);
    let mut covariance = [[f64::INFINITY; NUM_PARAMS]; NUM_PARAMS];
    if let Some(inverse) = invert(&jacobian.gram()) {
        for (row, cov_row) in covariance.iter_mut().enumerate() {
            for (col, cov) in cov_row.iter_mut().enumerate() {
                *cov = inverse[(row, col)] * residual_variance;
            }
        }
    }
    covariance
}
