//! Run settings that can be loaded from a JSON file.

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::fit::FitOptions;
use crate::smooth::Smoothing;

pub const DEFAULT_POINTS: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fit_options: FitOptions,
    pub smoothing: Smoothing,
    /// Number of points at which the fitted model is sampled.
    pub points: usize,
}
impl Config {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.fit_options.validate()?;
        self.smoothing.validate()?;
        if self.points < 2 {
            bail!("at least two sample points are required")
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fit_options: FitOptions::default(),
            smoothing: Smoothing::default(),
            points: DEFAULT_POINTS,
        }
    }
}
