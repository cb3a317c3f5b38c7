//! Panels hold the raw time series for a single region.
//!
//! A panel has one row per period (a year or a quarter) with regional output (PDRB), investment
//! (PMTB), population and the number of employed persons.
use crate::region::RegionID;
use anyhow::{Context, Result, bail, ensure};
use chrono::{Datelike, NaiveDate};
use serde_string_enum::DeserializeLabeledStringEnum;

/// How often observations in a panel are recorded
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum, strum::Display)]
pub enum Periodicity {
    /// One observation per year
    #[default]
    #[string = "annual"]
    #[strum(serialize = "annual")]
    Annual,
    /// One observation per quarter
    #[string = "quarterly"]
    #[strum(serialize = "quarterly")]
    Quarterly,
}

impl Periodicity {
    /// The default lag for growth rates: same period in the previous year
    pub fn default_lag(self) -> usize {
        match self {
            Self::Annual => 1,
            Self::Quarterly => 4,
        }
    }

    /// The number of calendar months covered by one period
    pub fn months_per_period(self) -> u32 {
        match self {
            Self::Annual => 12,
            Self::Quarterly => 3,
        }
    }

    /// The label used to identify the periodicity in output file names
    pub fn output_label(self) -> &'static str {
        match self {
            Self::Annual => "Tahunan",
            Self::Quarterly => "Triwulan",
        }
    }
}

/// A single row of panel data
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    /// The start of the period
    pub date: NaiveDate,
    /// Regional gross output (PDRB)
    pub output: f64,
    /// Gross fixed capital formation (PMTB)
    pub investment: f64,
    /// Population
    pub population: f64,
    /// Number of employed persons
    pub employed: f64,
}

/// The time series for one region, stored column-wise.
///
/// Rows are in strictly increasing date order and all values are finite.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    region_id: RegionID,
    periodicity: Periodicity,
    dates: Vec<NaiveDate>,
    output: Vec<f64>,
    investment: Vec<f64>,
    population: Vec<f64>,
    employed: Vec<f64>,
}

impl Panel {
    /// Create a new [`Panel`] from rows of data, checking that it is valid.
    pub fn from_rows<I>(region_id: RegionID, periodicity: Periodicity, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = PanelRow>,
    {
        let mut panel = Self {
            region_id,
            periodicity,
            dates: Vec::new(),
            output: Vec::new(),
            investment: Vec::new(),
            population: Vec::new(),
            employed: Vec::new(),
        };
        for row in rows {
            panel.dates.push(row.date);
            panel.output.push(row.output);
            panel.investment.push(row.investment);
            panel.population.push(row.population);
            panel.employed.push(row.employed);
        }

        panel.validate()?;

        Ok(panel)
    }

    /// Check the panel invariants
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.dates.is_empty(),
            "Panel for region {} has no rows",
            self.region_id
        );

        if let Some((prev, next)) = self
            .dates
            .iter()
            .zip(self.dates.iter().skip(1))
            .find(|(prev, next)| prev >= next)
        {
            bail!(
                "Panel for region {} is not in chronological order: {prev} is followed by {next}",
                self.region_id
            );
        }

        for (name, column) in [
            ("PDRB", &self.output),
            ("PMTB", &self.investment),
            ("Populasi", &self.population),
            ("Jumlah.Orang.Bekerja", &self.employed),
        ] {
            check_column_finite(name, &self.dates, column)
                .with_context(|| format!("Invalid panel for region {}", self.region_id))?;
        }

        Ok(())
    }

    /// Return a copy of this panel with the output and investment columns replaced.
    ///
    /// Used to substitute seasonally adjusted flow series.
    pub fn with_flows(&self, output: Vec<f64>, investment: Vec<f64>) -> Result<Self> {
        ensure!(
            output.len() == self.len() && investment.len() == self.len(),
            "Replacement flow series must have {} values (got {} and {})",
            self.len(),
            output.len(),
            investment.len()
        );

        let panel = Self {
            output,
            investment,
            ..self.clone()
        };
        panel.validate()?;

        Ok(panel)
    }

    /// The region this panel describes
    pub fn region_id(&self) -> &RegionID {
        &self.region_id
    }

    /// How often observations are recorded
    pub fn periodicity(&self) -> Periodicity {
        self.periodicity
    }

    /// The number of periods
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the panel has no periods (never true for a validated panel)
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// The start date of each period
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Regional gross output (PDRB)
    pub fn output(&self) -> &[f64] {
        &self.output
    }

    /// Gross fixed capital formation (PMTB)
    pub fn investment(&self) -> &[f64] {
        &self.investment
    }

    /// Population
    pub fn population(&self) -> &[f64] {
        &self.population
    }

    /// Number of employed persons
    pub fn employed(&self) -> &[f64] {
        &self.employed
    }
}

/// Check that all values in a column are finite
fn check_column_finite(name: &str, dates: &[NaiveDate], column: &[f64]) -> Result<()> {
    if let Some((date, value)) = dates.iter().zip(column).find(|(_, v)| !v.is_finite()) {
        bail!("Column {name} has a non-finite value ({value}) for period {date}");
    }

    Ok(())
}

/// Parse a period label into the date on which the period starts.
///
/// Accepted forms are a year (`2010`), a full date (`2010-04-01`) or a quarter (`2010Q2`,
/// `2010-Q2`).
pub fn parse_period(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Some((year, quarter)) = s.split_once(['Q', 'q']) {
        let year: i32 = year
            .trim_end_matches('-')
            .parse()
            .with_context(|| format!("Invalid year in period '{s}'"))?;
        let quarter: u32 = quarter
            .parse()
            .ok()
            .filter(|q| (1..=4).contains(q))
            .with_context(|| format!("Invalid quarter in period '{s}'"))?;
        return NaiveDate::from_ymd_opt(year, 3 * (quarter - 1) + 1, 1)
            .with_context(|| format!("Invalid period '{s}'"));
    }

    let year: i32 = s
        .parse()
        .with_context(|| format!("Invalid period '{s}': expected a year, date or quarter"))?;
    NaiveDate::from_ymd_opt(year, 1, 1).with_context(|| format!("Invalid period '{s}'"))
}

/// Generate `count` evenly spaced period start dates, beginning on 1 January of `start_year`
pub fn period_dates(start_year: i32, periodicity: Periodicity, count: usize) -> Result<Vec<NaiveDate>> {
    let start = NaiveDate::from_ymd_opt(start_year, 1, 1)
        .with_context(|| format!("Invalid start year: {start_year}"))?;
    let step = periodicity.months_per_period();

    (0..count)
        .map(|i| {
            let months = u32::try_from(i)
                .ok()
                .and_then(|i| i.checked_mul(step))
                .context("Too many periods")?;
            start
                .checked_add_months(chrono::Months::new(months))
                .context("Date out of range")
        })
        .collect()
}

/// The year in which the panel starts
pub fn first_year(panel: &Panel) -> i32 {
    panel.dates()[0].year()
}
