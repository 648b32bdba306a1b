//! Daily national series: cumulative counts and the incidence derived from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::{Counts, Metric};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCounts {
    /// Whole days since the first confirmed case.
    pub day: u32,
    pub date: NaiveDate,
    pub counts: Counts,
}

/// One row per reported date, summed across sub-regions, starting at the first confirmed case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoalescedSeries {
    pub country: String,
    pub rows: Vec<DailyCounts>,
}
impl CoalescedSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|row| row.date)
    }

    pub fn days(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.day as f64).collect()
    }

    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.counts.get(metric) as f64)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyIncidence {
    pub day: u32,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
}
impl DailyIncidence {
    pub fn get(&self, metric: Metric) -> i64 {
        match metric {
            Metric::Confirmed => self.confirmed,
            Metric::Deaths => self.deaths,
            Metric::Recovered => self.recovered,
        }
    }
}

/// New counts per reported date, aligned 1:1 with a [`CoalescedSeries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidenceSeries {
    pub rows: Vec<DailyIncidence>,
}
impl IncidenceSeries {
    /// First difference of the cumulative counts. The first row has no predecessor and is
    /// defined as zero for every metric. Downward revisions surface as negative values.
    pub fn difference(coalesced: &CoalescedSeries) -> Self {
        let mut previous: Option<&Counts> = None;
        let rows = coalesced
            .rows
            .iter()
            .map(|row| {
                let delta = |metric| match previous {
                    None => 0,
                    Some(previous) => row.counts.get(metric) as i64 - previous.get(metric) as i64,
                };
                let incidence = DailyIncidence {
                    day: row.day,
                    date: row.date,
                    confirmed: delta(Metric::Confirmed),
                    deaths: delta(Metric::Deaths),
                    recovered: delta(Metric::Recovered),
                };
                previous = Some(&row.counts);
                incidence
            })
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn days(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.day as f64).collect()
    }

    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.rows.iter().map(|row| row.get(metric) as f64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
    }

    fn sample_series() -> CoalescedSeries {
        CoalescedSeries {
            country: "CountryX".into(),
            rows: vec![
                DailyCounts { day: 0, date: date(1), counts: Counts::new(4, 0, 0) },
                DailyCounts { day: 1, date: date(2), counts: Counts::new(10, 1, 0) },
                DailyCounts { day: 3, date: date(4), counts: Counts::new(9, 2, 5) },
            ],
        }
    }

    #[test]
    fn difference_zeroes_first_row() {
        let incidence = IncidenceSeries::difference(&sample_series());
        assert_eq!(3, incidence.len());
        let first = incidence.rows[0];
        assert_eq!((0, 0, 0), (first.confirmed, first.deaths, first.recovered));
    }

    #[test]
    fn difference_keeps_downward_revisions() {
        let incidence = IncidenceSeries::difference(&sample_series());
        assert_eq!(vec![0.0, 6.0, -1.0], incidence.values(Metric::Confirmed));
        assert_eq!(vec![0.0, 1.0, 1.0], incidence.values(Metric::Deaths));
        assert_eq!(vec![0.0, 0.0, 5.0], incidence.values(Metric::Recovered));
    }

    #[test]
    fn difference_preserves_alignment() {
        let series = sample_series();
        let incidence = IncidenceSeries::difference(&series);
        assert_eq!(series.days(), incidence.days());
        assert_eq!(vec![0.0, 1.0, 3.0], incidence.days());
        assert_eq!(date(4), incidence.rows[2].date);
    }

    #[test]
    fn difference_of_empty() {
        let series = CoalescedSeries { country: "CountryX".into(), rows: vec![] };
        assert!(IncidenceSeries::difference(&series).is_empty());
        assert_eq!(None, series.first_date());
    }

    #[test]
    fn serialises_dates_as_iso_strings() {
        let incidence = IncidenceSeries::difference(&sample_series());
        let json = serde_json::to_string(&incidence.rows[1]).unwrap();
        assert!(json.contains(r#""date":"2020-03-02""#), "{json}");
        let decoded: DailyIncidence = serde_json::from_str(&json).unwrap();
        assert_eq!(incidence.rows[1], decoded);
    }
}
