//! Nonlinear least-squares optimisation.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

use crate::linear::{solve, Matrix};

const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e32;
const DAMPING_FACTOR: f64 = 10.0;

/// Floor applied to the diagonal scaling so that parameters with a vanishing gradient column
/// are still damped.
const MIN_SCALE: f64 = 1e-30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevenbergMarquardtConfig {
    pub max_evaluations: u64,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    pub init_damping: f64,
}
impl LevenbergMarquardtConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_evaluations < 2 {
            bail!("at least two evaluations must be permitted")
        }
        for (name, tolerance) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !tolerance.is_finite() || tolerance < 0.0 {
                bail!("{name} must be finite and non-negative")
            }
        }
        if !self.init_damping.is_finite() || self.init_damping <= 0.0 {
            bail!("initial damping must be positive")
        }
        Ok(())
    }
}

impl Default for LevenbergMarquardtConfig {
    fn default() -> Self {
        Self {
            max_evaluations: 1_500,
            ftol: 1e-5,
            xtol: 1e-8,
            gtol: 1e-8,
            init_damping: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Termination {
    /// The residuals vanished.
    ExactFit,
    /// The residual vector is orthogonal to every Jacobian column, within `gtol`.
    Gradient,
    /// Both the actual and the predicted relative reduction of the sum of squares fell to `ftol`.
    Residual,
    /// The step fell to `xtol` relative to the parameter norm.
    Step,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptError {
    #[error("did not converge within {evaluations} evaluations")]
    DidNotConverge { evaluations: u64 },

    #[error("initial values violate the constraints")]
    InfeasibleStart,

    #[error("residuals at the initial values are not finite")]
    NonFiniteResidual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevenbergMarquardtOutcome {
    pub evaluations: u64,
    pub iterations: u64,
    pub optimal_values: Vec<f64>,
    pub optimal_residual: f64,
    pub termination: Termination,
}

/// Minimises `‖r(x)‖²` by Levenberg–Marquardt, with Marquardt's diagonal scaling.
///
/// `residual_f` writes the residuals for the given values into its output slice;
/// `jacobian_f` writes `∂rᵢ/∂xⱼ` into row `i`, column `j`. Trial points rejected by `constraint_f`,
/// or producing non-finite residuals, are treated as uphill steps, so the reported optimum is
/// always feasible. Every trial counts towards `max_evaluations`.
pub fn levenberg_marquardt(
    config: &LevenbergMarquardtConfig,
    init_values: &[f64],
    num_residuals: usize,
    mut constraint_f: impl FnMut(&[f64]) -> bool,
    mut residual_f: impl FnMut(&[f64], &mut [f64]),
    mut jacobian_f: impl FnMut(&[f64], &mut Matrix),
) -> Result<LevenbergMarquardtOutcome, OptError> {
    debug_assert!(config.validate().is_ok(), "{:?}", config.validate());

    let dimensions = init_values.len();
    if !constraint_f(init_values) {
        return Err(OptError::InfeasibleStart);
    }
    let mut values = init_values.to_vec();
    let mut residuals = vec![0.0; num_residuals];
    residual_f(&values, &mut residuals);
    let mut evaluations = 1;
    let mut ssr = sum_sq(&residuals);
    if !ssr.is_finite() {
        return Err(OptError::NonFiniteResidual);
    }

    let mut jacobian = Matrix::allocate(num_residuals, dimensions);
    let mut trial_values = vec![0.0; dimensions];
    let mut trial_residuals = vec![0.0; num_residuals];
    let mut damping = config.init_damping;
    let mut iterations = 0;

    let outcome = |values: Vec<f64>, ssr, evaluations, iterations, termination| LevenbergMarquardtOutcome {
        evaluations,
        iterations,
        optimal_values: values,
        optimal_residual: ssr,
        termination,
    };

    loop {
        if ssr == 0.0 {
            return Ok(outcome(values, ssr, evaluations, iterations, Termination::ExactFit));
        }

        jacobian_f(&values, &mut jacobian);
        let gram = jacobian.gram();
        let gradient = jacobian.transpose_mul_vec(&residuals);
        if scaled_gradient(&gram, &gradient, ssr) <= config.gtol {
            return Ok(outcome(values, ssr, evaluations, iterations, Termination::Gradient));
        }

        loop {
            if evaluations >= config.max_evaluations {
                return Err(OptError::DidNotConverge { evaluations });
            }
            if damping > MAX_DAMPING {
                return Err(OptError::DidNotConverge { evaluations });
            }

            let mut damped = gram.clone();
            for diag in 0..dimensions {
                damped[(diag, diag)] += damping * f64::max(gram[(diag, diag)], MIN_SCALE);
            }
            let neg_gradient: Vec<_> = gradient.iter().map(|g| -g).collect();
            let Some(step) = solve(&damped, &neg_gradient) else {
                damping *= DAMPING_FACTOR;
                continue;
            };

            for (trial, (value, delta)) in trial_values.iter_mut().zip(values.iter().zip(&step)) {
                *trial = value + delta;
            }
            let step_small = norm(&step) <= config.xtol * (norm(&values) + config.xtol);

            evaluations += 1;
            let trial_ssr = if constraint_f(&trial_values) {
                residual_f(&trial_values, &mut trial_residuals);
                sum_sq(&trial_residuals)
            } else {
                f64::INFINITY
            };

            if trial_ssr.is_finite() && trial_ssr < ssr {
                let linearised: Vec<_> = jacobian
                    .mul_vec(&step)
                    .iter()
                    .zip(&residuals)
                    .map(|(jd, r)| jd + r)
                    .collect();
                let actual_reduction = (ssr - trial_ssr) / ssr;
                let predicted_reduction = (ssr - sum_sq(&linearised)) / ssr;

                values.copy_from_slice(&trial_values);
                residuals.copy_from_slice(&trial_residuals);
                ssr = trial_ssr;
                iterations += 1;
                damping = f64::max(damping / DAMPING_FACTOR, MIN_DAMPING);

                if actual_reduction <= config.ftol && predicted_reduction.abs() <= config.ftol {
                    return Ok(outcome(values, ssr, evaluations, iterations, Termination::Residual));
                }
                if step_small {
                    return Ok(outcome(values, ssr, evaluations, iterations, Termination::Step));
                }
                break;
            } else {
                if step_small {
                    return Ok(outcome(values, ssr, evaluations, iterations, Termination::Step));
                }
                damping *= DAMPING_FACTOR;
            }
        }
    }
}

/// The largest cosine between the residual vector and a Jacobian column. A column with zero
/// norm contributes nothing.
fn scaled_gradient(gram: &Matrix, gradient: &[f64], ssr: f64) -> f64 {
    let residual_norm = ssr.sqrt();
    gradient
        .iter()
        .enumerate()
        .map(|(col, g)| {
            let col_norm = gram[(col, col)].sqrt();
            if col_norm == 0.0 {
                0.0
            } else {
                g.abs() / (col_norm * residual_norm)
            }
        })
        .fold(0.0, f64::max)
}

fn sum_sq(values: &[f64]) -> f64 {
    values.iter().map(|value| value * value).sum()
}

fn norm(values: &[f64]) -> f64 {
    sum_sq(values).sqrt()
}

#[cfg(test)]
mod tests;
