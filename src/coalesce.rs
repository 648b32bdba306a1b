//! Coalescing of multi-region observations into a single national daily series.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use strum_macros::Display;
use thiserror::Error;

use crate::data::{Counts, RawObservation};
use crate::series::{CoalescedSeries, DailyCounts, IncidenceSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EmptyCause {
    #[strum(serialize = "no observations")]
    NoObservations,

    #[strum(serialize = "no confirmed cases")]
    NoConfirmedCases,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoalesceError {
    #[error("empty series for {country:?}: {cause}")]
    EmptySeries { country: String, cause: EmptyCause },
}

/// Filters `observations` to `country`, discards rows before the outbreak (zero confirmed),
/// sums the remaining rows across sub-regions per date and anchors the result at the first
/// confirmed case. Also returns the derived incidence.
///
/// Day offsets are computed from the calendar, so gaps in the source dates carry through as
/// gaps in the offsets.
pub fn coalesce(
    observations: &[RawObservation],
    country: &str,
) -> Result<(CoalescedSeries, IncidenceSeries), CoalesceError> {
    let empty = |cause| CoalesceError::EmptySeries {
        country: country.to_string(),
        cause,
    };

    let mut country_rows = observations
        .iter()
        .filter(|observation| observation.region.country == country)
        .peekable();
    if country_rows.peek().is_none() {
        return Err(empty(EmptyCause::NoObservations));
    }

    let mut by_date: BTreeMap<NaiveDate, Counts> = BTreeMap::new();
    for observation in country_rows.filter(|observation| observation.counts.confirmed > 0) {
        *by_date.entry(observation.date).or_default() += observation.counts;
    }

    let first_date = *by_date
        .keys()
        .next()
        .ok_or_else(|| empty(EmptyCause::NoConfirmedCases))?;
    let rows = by_date
        .into_iter()
        .map(|(date, counts)| DailyCounts {
            day: (date - first_date).num_days() as u32,
            date,
            counts,
        })
        .collect();
    let coalesced = CoalescedSeries {
        country: country.to_string(),
        rows,
    };
    let incidence = IncidenceSeries::difference(&coalesced);
    Ok((coalesced, incidence))
}
