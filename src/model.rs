//! Parametric epidemic pulse models and their fitted instances.

use std::ops::RangeInclusive;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::opt::Termination;

pub const NUM_PARAMS: usize = 3;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Bell-shaped incidence models, each with three positive parameters.
///
/// * [`Gaussian`](ModelKind::Gaussian): `(amplitude, mean day, std-dev in days)`.
/// * [`Logistic`](ModelKind::Logistic): `(L, peak day x0, growth rate k)` of the first
///   derivative of the logistic growth curve, i.e. the daily rate of a logistic cumulative count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString)]
pub enum ModelKind {
    Gaussian,
    Logistic,
}
impl ModelKind {
    pub fn evaluate(&self, x: f64, params: &[f64; NUM_PARAMS]) -> f64 {
        let [a, b, c] = *params;
        match self {
            ModelKind::Gaussian => gaussian(x, a, b, c),
            ModelKind::Logistic => logistic_derivative(x, a, b, c),
        }
    }

    /// Analytic partial derivatives of [`evaluate`](Self::evaluate) with respect to each parameter.
    pub fn gradient(&self, x: f64, params: &[f64; NUM_PARAMS]) -> [f64; NUM_PARAMS] {
        let [a, b, c] = *params;
        match self {
            ModelKind::Gaussian => {
                let (amp, mean, dev) = (a, b, c);
                let z = (x - mean) / dev;
                let shape = f64::exp(-0.5 * z * z);
                let value = amp * shape;
                [shape, value * z / dev, value * z * z / dev]
            }
            ModelKind::Logistic => {
                let (l, x0, k) = (a, b, c);
                let t = k * (x - x0);
                let value = logistic_derivative(x, l, x0, k);
                if value == 0.0 {
                    return [0.0; NUM_PARAMS];
                }
                let tanh = f64::tanh(0.5 * t);
                [value / l, value * k * tanh, value / k * (1.0 - t * tanh)]
            }
        }
    }

    pub fn parameter_names(&self) -> [&'static str; NUM_PARAMS] {
        match self {
            ModelKind::Gaussian => ["Amplitude [new cases]", "Peak in [days]", "Std-dev [days]"],
            ModelKind::Logistic => ["Amplitude [new cases]", "Peak in [days]", "Growth rate []"],
        }
    }

    pub fn peak_day(&self, params: &[f64; NUM_PARAMS]) -> f64 {
        params[1]
    }

    pub fn peak_value(&self, params: &[f64; NUM_PARAMS]) -> f64 {
        match self {
            ModelKind::Gaussian => params[0],
            ModelKind::Logistic => params[0] * params[2] / 4.0,
        }
    }

    /// The day range over which the curve carries nearly all of its mass as seen from the first
    /// case: three deviations past the mean for the Gaussian, twice the peak day for the logistic.
    pub fn default_range(&self, params: &[f64; NUM_PARAMS]) -> RangeInclusive<f64> {
        match self {
            ModelKind::Gaussian => 0.0..=params[1] + 3.0 * params[2],
            ModelKind::Logistic => 0.0..=2.0 * params[1],
        }
    }
}

/// Unnormalised Gaussian pulse.
pub fn gaussian(x: f64, amp: f64, mean: f64, dev: f64) -> f64 {
    let z = (x - mean) / dev;
    amp * f64::exp(-0.5 * z * z)
}

/// `L·k·e^(−k(x−x0)) / (1 + e^(−k(x−x0)))²`, evaluated in the equivalent and overflow-free form
/// `L·k / (2 + 2·cosh(k(x−x0)))`.
pub fn logistic_derivative(x: f64, l: f64, x0: f64, k: f64) -> f64 {
    let t = k * (x - x0);
    l * k / (2.0 + 2.0 * f64::cosh(t))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitStats {
    pub evaluations: u64,
    pub iterations: u64,
    /// Sum of squared residuals at the optimum.
    pub ssr: f64,
    pub termination: Termination,
}

/// A model kind with its fitted parameters and the parameter covariance estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    kind: ModelKind,
    params: [f64; NUM_PARAMS],
    covariance: [[f64; NUM_PARAMS]; NUM_PARAMS],
    stats: FitStats,
}
impl FittedModel {
    pub(crate) fn new(
        kind: ModelKind,
        params: [f64; NUM_PARAMS],
        covariance: [[f64; NUM_PARAMS]; NUM_PARAMS],
        stats: FitStats,
    ) -> Self {
        Self {
            kind,
            params,
            covariance,
            stats,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn params(&self) -> &[f64; NUM_PARAMS] {
        &self.params
    }

    pub fn covariance(&self) -> &[[f64; NUM_PARAMS]; NUM_PARAMS] {
        &self.covariance
    }

    pub fn stats(&self) -> &FitStats {
        &self.stats
    }

    pub fn std_errors(&self) -> [f64; NUM_PARAMS] {
        let mut std_errors = [0.0; NUM_PARAMS];
        for (param, std_error) in std_errors.iter_mut().enumerate() {
            *std_error = self.covariance[param][param].sqrt();
        }
        std_errors
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.kind.evaluate(x, &self.params)
    }

    pub fn peak_day(&self) -> f64 {
        self.kind.peak_day(&self.params)
    }

    pub fn peak_value(&self) -> f64 {
        self.kind.peak_value(&self.params)
    }

    pub fn default_range(&self) -> RangeInclusive<f64> {
        self.kind.default_range(&self.params)
    }

    /// Calendar time of the parametric peak, counting from `anchor` (the first case). `None` if
    /// the peak lies outside the representable calendar.
    pub fn peak_date(&self, anchor: NaiveDate) -> Option<NaiveDateTime> {
        offset_timestamp(anchor, self.peak_day())
    }
}

/// `anchor` at midnight plus `day` days, truncated to whole seconds.
pub fn offset_timestamp(anchor: NaiveDate, day: f64) -> Option<NaiveDateTime> {
    let seconds = (day * SECONDS_PER_DAY).trunc();
    if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 {
        return None;
    }
    let offset = Duration::try_seconds(seconds as i64)?;
    anchor.and_time(NaiveTime::MIN).checked_add_signed(offset)
}

#[cfg(test)]
mod tests;
