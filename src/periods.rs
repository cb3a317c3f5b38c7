//! Averaging of growth records over historical periods (by default, decades).
use crate::growth::GrowthRecord;
use crate::panel::{Periodicity, period_dates};
use anyhow::{Result, bail, ensure};
use chrono::Datelike;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Deserialize;

/// A labelled range of calendar years, `[start_year, end_year)`.
///
/// A missing start or end year leaves that side of the range open.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeriodBucket {
    /// Label used in output
    pub label: String,
    /// First year in the bucket
    pub start_year: Option<i32>,
    /// First year after the bucket
    pub end_year: Option<i32>,
}

impl PeriodBucket {
    /// Create a new [`PeriodBucket`]
    pub fn new(label: &str, start_year: Option<i32>, end_year: Option<i32>) -> Self {
        Self {
            label: label.into(),
            start_year,
            end_year,
        }
    }

    /// Whether the given year falls within this bucket
    pub fn contains(&self, year: i32) -> bool {
        self.start_year.is_none_or(|start| year >= start)
            && self.end_year.is_none_or(|end| year < end)
    }
}

/// The means of the four growth columns, keyed by bucket label
pub type PeriodAverages = IndexMap<String, [Option<f64>; 4]>;

/// The decade buckets: everything before 2000, the 2000s, the 2010s and 2020 onwards
pub fn default_decade_buckets() -> Vec<PeriodBucket> {
    vec![
        PeriodBucket::new("1990an", None, Some(2000)),
        PeriodBucket::new("2000an", Some(2000), Some(2010)),
        PeriodBucket::new("2010an", Some(2010), Some(2020)),
        PeriodBucket::new("2020an", Some(2020), None),
    ]
}

/// Check that buckets are non-empty, uniquely labelled, chronologically ordered and do not overlap
pub fn check_buckets(buckets: &[PeriodBucket]) -> Result<()> {
    ensure!(!buckets.is_empty(), "At least one period bucket is required");

    if let Some(label) = buckets.iter().map(|b| &b.label).duplicates().next() {
        bail!("Duplicate period bucket label: {label}");
    }

    for bucket in buckets {
        if let (Some(start), Some(end)) = (bucket.start_year, bucket.end_year) {
            ensure!(
                start < end,
                "Period bucket {} must start before it ends ({start} >= {end})",
                bucket.label
            );
        }
    }

    for (prev, next) in buckets.iter().tuple_windows() {
        let ordered = matches!(
            (prev.end_year, next.start_year),
            (Some(end), Some(start)) if end <= start
        );
        ensure!(
            ordered,
            "Period buckets {} and {} overlap or are out of order",
            prev.label,
            next.label
        );
    }

    Ok(())
}

/// Overwrite the dates of growth records with an evenly spaced index beginning in `start_year`
pub fn relabel_records(
    records: &mut [GrowthRecord],
    start_year: i32,
    periodicity: Periodicity,
) -> Result<()> {
    let dates = period_dates(start_year, periodicity, records.len())?;
    for (record, date) in records.iter_mut().zip(dates) {
        record.date = date;
    }

    Ok(())
}

/// The mean of the defined values, or `None` if there are none
fn mean_defined<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Average the growth columns of records within each bucket.
///
/// Every bucket appears in the result, in the order given. Undefined growth values are ignored.
pub fn average_by_period(records: &[GrowthRecord], buckets: &[PeriodBucket]) -> PeriodAverages {
    buckets
        .iter()
        .map(|bucket| {
            let in_bucket = records
                .iter()
                .filter(|record| bucket.contains(record.date.year()))
                .collect_vec();
            let means = std::array::from_fn(|column| {
                mean_defined(in_bucket.iter().map(|record| record.growth_columns()[column]))
            });
            (bucket.label.clone(), means)
        })
        .collect()
}
