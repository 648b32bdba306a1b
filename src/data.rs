//! Observation records as they arrive from the ingestion boundary.

use std::ops::{Add, AddAssign};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString)]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region {
    pub country: String,
    pub province: Option<String>,
}
impl Region {
    pub fn country(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            province: None,
        }
    }

    pub fn province(country: impl Into<String>, province: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            province: Some(province.into()),
        }
    }
}

/// Cumulative-to-date counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub confirmed: u64,
    pub deaths: u64,
    pub recovered: u64,
}
impl Counts {
    pub fn new(confirmed: u64, deaths: u64, recovered: u64) -> Self {
        Self {
            confirmed,
            deaths,
            recovered,
        }
    }

    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Confirmed => self.confirmed,
            Metric::Deaths => self.deaths,
            Metric::Recovered => self.recovered,
        }
    }

    /// Active infections. Inconsistent reporting can make this negative; the value is kept as-is.
    pub fn infected(&self) -> i64 {
        self.confirmed as i64 - self.deaths as i64 - self.recovered as i64
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(self, rhs: Self) -> Self::Output {
        Counts {
            confirmed: self.confirmed + rhs.confirmed,
            deaths: self.deaths + rhs.deaths,
            recovered: self.recovered + rhs.recovered,
        }
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub region: Region,
    pub date: NaiveDate,
    pub counts: Counts,
}
