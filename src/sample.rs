//! Sampling of a fitted model over a grid of day offsets, mapped back to calendar time.

use std::ops::RangeInclusive;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{offset_timestamp, FittedModel};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("at least 2 points are required, got {0}")]
    TooFewPoints(usize),

    #[error("invalid day range {start}..={end}")]
    InvalidRange { start: f64, end: f64 },

    #[error("day offset lies outside the representable calendar")]
    DateOverflow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub day: f64,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCurve {
    points: Vec<CurvePoint>,
}
impl ModelCurve {
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The sampled point of greatest value; the first of equal maxima. This is bounded by the
    /// grid resolution; see [`peak_divergence`](Self::peak_divergence).
    pub fn peak(&self) -> &CurvePoint {
        let mut peak = &self.points[0];
        for point in &self.points[1..] {
            if point.value > peak.value {
                peak = point;
            }
        }
        peak
    }

    /// Distance between adjacent day offsets.
    pub fn spacing(&self) -> f64 {
        self.points[1].day - self.points[0].day
    }

    /// How many grid cells separate the sampled peak from the parametric one. Anything beyond
    /// one cell signals a poor sampling range or a poor fit.
    pub fn peak_divergence(&self, model: &FittedModel) -> f64 {
        let distance = (self.peak().day - model.peak_day()).abs();
        let spacing = self.spacing();
        if spacing == 0.0 {
            if distance == 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            distance / spacing
        }
    }
}

/// Evaluates `model` at `num_points` evenly spaced day offsets spanning `range` inclusively.
/// Each offset maps to `anchor` at midnight plus that many days, truncated to the second.
pub fn sample(
    model: &FittedModel,
    range: RangeInclusive<f64>,
    num_points: usize,
    anchor: NaiveDate,
) -> Result<ModelCurve, SampleError> {
    if num_points < 2 {
        return Err(SampleError::TooFewPoints(num_points));
    }
    let (start, end) = range.into_inner();
    if !start.is_finite() || !end.is_finite() || start > end {
        return Err(SampleError::InvalidRange { start, end });
    }

    let step = (end - start) / (num_points - 1) as f64;
    let points = (0..num_points)
        .map(|index| {
            let day = if index == num_points - 1 {
                end
            } else {
                start + index as f64 * step
            };
            let timestamp = offset_timestamp(anchor, day).ok_or(SampleError::DateOverflow)?;
            Ok(CurvePoint {
                day,
                timestamp,
                value: model.evaluate(day),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ModelCurve { points })
}
