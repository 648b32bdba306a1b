//! Ingestion: reshaping of wide per-region tables into long observations, and loading of
//! preprocessed long tables. Malformed rows are rejected here so that downstream stages can
//! assume well-typed input.

use std::io;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::data::{Counts, Metric, RawObservation, Region};

const PROVINCE_HEADER: &str = "Province/State";
const COUNTRY_HEADER: &str = "Country/Region";
const GEO_HEADERS: [&str; 2] = ["Lat", "Long"];

#[derive(Debug, Error)]
pub enum ReshapeError {
    #[error("table has no header")]
    EmptyTable,

    #[error("missing column {0:?}")]
    MissingColumn(String),

    #[error("line {line}: expected {expected} fields, got {actual}")]
    RaggedRow {
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("line {line}: malformed date {value:?}")]
    MalformedDate { line: usize, value: String },

    #[error("line {line}: malformed count {value:?}")]
    MalformedCount { line: usize, value: String },

    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Parses ISO-8601 (`2020-03-01`) and the short US form used in wide table headers (`3/1/20`).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%y"))
        .ok()
}

/// Parses a non-negative integer count, tolerating a zero fractional part (`12.0`).
pub fn parse_count(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(count) = value.parse::<u64>() {
        return Some(count);
    }
    let float = value.parse::<f64>().ok()?;
    if float.is_finite() && float >= 0.0 && float.fract() == 0.0 && float <= u64::MAX as f64 {
        Some(float as u64)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub region: Region,
    pub date: NaiveDate,
    pub value: u64,
}

/// A wide table for a single metric: one row per region, one column per date.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub metric: Metric,
    pub dates: Vec<NaiveDate>,
    pub regions: Vec<(Region, Vec<u64>)>,
}
impl WideTable {
    pub fn parse<I>(records: I, metric: Metric) -> Result<Self, ReshapeError>
    where
        I: IntoIterator<Item = Result<Vec<String>, io::Error>>,
    {
        let mut records = records.into_iter();
        let header = records.next().ok_or(ReshapeError::EmptyTable)??;
        let province_col = find_column(&header, PROVINCE_HEADER)?;
        let country_col = find_column(&header, COUNTRY_HEADER)?;

        let mut date_cols = vec![];
        let mut dates = vec![];
        for (col, name) in header.iter().enumerate() {
            if col == province_col || col == country_col || GEO_HEADERS.contains(&name.trim()) {
                continue;
            }
            let date = parse_date(name).ok_or_else(|| ReshapeError::MalformedDate {
                line: 1,
                value: name.clone(),
            })?;
            date_cols.push(col);
            dates.push(date);
        }

        let mut regions = vec![];
        for (index, record) in records.enumerate() {
            let record = record?;
            let line = index + 2;
            check_width(&record, header.len(), line)?;
            let province = record[province_col].trim();
            let region = Region {
                country: record[country_col].trim().to_string(),
                province: (!province.is_empty()).then(|| province.to_string()),
            };
            let values = date_cols
                .iter()
                .map(|&col| {
                    parse_count(&record[col]).ok_or_else(|| ReshapeError::MalformedCount {
                        line,
                        value: record[col].clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            regions.push((region, values));
        }

        Ok(Self {
            metric,
            dates,
            regions,
        })
    }

    /// Stacks the date columns into one row per region per date.
    pub fn to_long(&self) -> Vec<LongRow> {
        self.regions
            .iter()
            .flat_map(|(region, values)| {
                self.dates
                    .iter()
                    .zip(values)
                    .map(|(&date, &value)| LongRow {
                        region: region.clone(),
                        date,
                        value,
                    })
            })
            .collect()
    }
}

/// Joins the three per-metric tables on (region, date). Rows absent from any table are
/// dropped; the output follows the order of `confirmed`.
pub fn merge(confirmed: &WideTable, deaths: &WideTable, recovered: &WideTable) -> Vec<RawObservation> {
    fn index(table: &WideTable) -> FxHashMap<(Region, NaiveDate), u64> {
        table
            .to_long()
            .into_iter()
            .map(|row| ((row.region, row.date), row.value))
            .collect()
    }
    let deaths = index(deaths);
    let recovered = index(recovered);

    confirmed
        .to_long()
        .into_iter()
        .filter_map(|row| {
            let key = (row.region, row.date);
            let deaths = *deaths.get(&key)?;
            let recovered = *recovered.get(&key)?;
            let (region, date) = key;
            Some(RawObservation {
                region,
                date,
                counts: Counts::new(row.value, deaths, recovered),
            })
        })
        .collect()
}

/// Loads the preprocessed long table: columns `Country`, `Date`, `Confirmed`, `Deaths` and
/// `Recovered` are required, `Province` is optional and anything else is ignored.
pub fn read_long_table<I>(records: I) -> Result<Vec<RawObservation>, ReshapeError>
where
    I: IntoIterator<Item = Result<Vec<String>, io::Error>>,
{
    let mut records = records.into_iter();
    let header = records.next().ok_or(ReshapeError::EmptyTable)??;
    let country_col = find_column(&header, "Country")?;
    let province_col = find_column(&header, "Province").ok();
    let date_col = find_column(&header, "Date")?;
    let metric_cols = [
        find_column(&header, &Metric::Confirmed.to_string())?,
        find_column(&header, &Metric::Deaths.to_string())?,
        find_column(&header, &Metric::Recovered.to_string())?,
    ];

    let mut observations = vec![];
    for (index, record) in records.enumerate() {
        let record = record?;
        let line = index + 2;
        check_width(&record, header.len(), line)?;
        let date = parse_date(&record[date_col]).ok_or_else(|| ReshapeError::MalformedDate {
            line,
            value: record[date_col].clone(),
        })?;
        let mut counts = [0; 3];
        for (count, &col) in counts.iter_mut().zip(&metric_cols) {
            *count = parse_count(&record[col]).ok_or_else(|| ReshapeError::MalformedCount {
                line,
                value: record[col].clone(),
            })?;
        }
        let province = province_col
            .map(|col| record[col].trim())
            .filter(|province| !province.is_empty())
            .map(ToString::to_string);
        observations.push(RawObservation {
            region: Region {
                country: record[country_col].trim().to_string(),
                province,
            },
            date,
            counts: Counts::new(counts[0], counts[1], counts[2]),
        });
    }
    Ok(observations)
}

fn find_column(header: &[String], name: &str) -> Result<usize, ReshapeError> {
    header
        .iter()
        .position(|col| col.trim() == name)
        .ok_or_else(|| ReshapeError::MissingColumn(name.to_string()))
}

fn check_width(record: &[String], expected: usize, line: usize) -> Result<(), ReshapeError> {
    if record.len() != expected {
        return Err(ReshapeError::RaggedRow {
            line,
            expected,
            actual: record.len(),
        });
    }
    Ok(())
}
