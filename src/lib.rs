//! Fits bell-shaped epidemic models to daily case counts.
//! Coalesces regional cumulative counts into a national series, derives the daily incidence,
//! smooths it, and fits a Gaussian or logistic-derivative pulse by bounded least squares.

pub mod coalesce;
pub mod config;
pub mod csv;
pub mod data;
pub mod file;
pub mod fit;
pub mod linear;
pub mod model;
pub mod opt;
pub mod print;
pub mod reshape;
pub mod sample;
pub mod series;
pub mod smooth;
pub mod timed;

#[cfg(test)]
pub(crate) mod testing;

#[doc = include_str!("../README.md")]
#[cfg(doc)]
fn readme() {}
