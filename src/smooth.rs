//! Savitzky–Golay smoothing of daily incidence.
//!
//! Each output point is the value, at that point, of the least-squares polynomial fitted over a
//! symmetric window. Near the edges, where no symmetric window exists, the polynomial fitted to
//! the first (or last) full window is evaluated instead, so the output is as long as the input.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::linear::{invert, Matrix};

pub const MIN_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmoothError {
    #[error("invalid window {window} for degree {degree} over {len} values: {reason}")]
    InvalidWindow {
        window: usize,
        degree: usize,
        len: usize,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Smoothing {
    pub window: usize,
    pub degree: usize,
}
impl Smoothing {
    /// Checks everything about the window that does not depend on the input length.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(reason) = window_fault(self.window, self.degree) {
            bail!("invalid smoothing window {} for degree {}: {reason}", self.window, self.degree);
        }
        Ok(())
    }

    pub fn apply(&self, values: &[f64]) -> Result<Vec<f64>, SmoothError> {
        smooth(values, self.window, self.degree)
    }
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            window: 13,
            degree: 2,
        }
    }
}

pub fn smooth(values: &[f64], window: usize, degree: usize) -> Result<Vec<f64>, SmoothError> {
    let invalid = |reason| SmoothError::InvalidWindow {
        window,
        degree,
        len: values.len(),
        reason,
    };
    if let Some(reason) = window_fault(window, degree) {
        return Err(invalid(reason));
    }
    if window > values.len() {
        return Err(invalid("window exceeds the input length"));
    }

    let projection = projection(window, degree).ok_or_else(|| invalid("ill-conditioned window"))?;
    let half = window / 2;
    let len = values.len();
    let apply = |row: usize, start: usize| -> f64 {
        projection
            .row_slice(row)
            .iter()
            .zip(&values[start..start + window])
            .map(|(weight, value)| weight * value)
            .sum()
    };

    let mut smoothed = Vec::with_capacity(len);
    for index in 0..len {
        let value = if index < half {
            apply(index, 0)
        } else if index >= len - half {
            apply(index + window - len, len - window)
        } else {
            apply(half, index - half)
        };
        smoothed.push(value);
    }
    Ok(smoothed)
}

fn window_fault(window: usize, degree: usize) -> Option<&'static str> {
    if window % 2 == 0 {
        Some("window must be odd")
    } else if window < MIN_WINDOW {
        Some("window is too short")
    } else if window <= degree {
        Some("window must exceed the degree")
    } else {
        None
    }
}

/// The `window × window` hat matrix `V (VᵀV)⁻¹ Vᵀ` of a polynomial fit over the offsets
/// `-window/2..=window/2`. Row `i` holds the weights that evaluate the fitted polynomial at
/// offset `i`; the middle row holds the classic convolution coefficients.
fn projection(window: usize, degree: usize) -> Option<Matrix> {
    let half = (window / 2) as f64;
    let mut vandermonde = Matrix::allocate(window, degree + 1);
    for row in 0..window {
        let offset = row as f64 - half;
        let mut power = 1.0;
        for col in 0..=degree {
            vandermonde[(row, col)] = power;
            power *= offset;
        }
    }
    let inverse_gram = invert(&vandermonde.gram())?;
    Some(
        vandermonde
            .mul(&inverse_gram)
            .mul(&vandermonde.transpose()),
    )
}
