//! Growth rates and the decomposition of output growth into capital, labour and TFP.
use crate::shares::FactorShare;
use anyhow::{Result, ensure};
use chrono::NaiveDate;

/// Growth rates of a series relative to the value `lag` periods earlier.
///
/// `growth[i] = (x[i] - x[i-lag]) / x[i-lag]`. The rate is `None` for the first `lag` periods and
/// wherever the lagged value is zero or either value is not finite.
pub fn growth_rates(series: &[f64], lag: usize) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|i| {
            let previous = series[i.checked_sub(lag)?];
            let current = series[i];
            if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
                return None;
            }

            Some((current - previous) / previous)
        })
        .collect()
}

/// The growth accounts for a single period
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthRecord {
    /// The start of the period
    pub date: NaiveDate,
    /// Growth rate of output
    pub output_growth: Option<f64>,
    /// Growth rate of capital, weighted by the capital share
    pub weighted_capital_growth: Option<f64>,
    /// Growth rate of labour, weighted by the labour share
    pub weighted_labor_growth: Option<f64>,
    /// Growth of total factor productivity (the residual)
    pub tfp_growth: Option<f64>,
    /// The estimated capital stock
    pub capital_estimate: f64,
}

impl GrowthRecord {
    /// The four growth columns, in output order
    pub fn growth_columns(&self) -> [Option<f64>; 4] {
        [
            self.output_growth,
            self.weighted_capital_growth,
            self.weighted_labor_growth,
            self.tfp_growth,
        ]
    }
}

/// Attribute output growth to capital, labour and a TFP residual.
///
/// # Arguments
///
/// * `dates` - The start date of each period
/// * `output` - Output levels
/// * `capital` - Capital stock levels
/// * `labor` - Labour input levels (employed persons)
/// * `shares` - Factor shares, as percentages
/// * `lag` - The number of periods over which growth is measured
///
/// # Returns
///
/// One [`GrowthRecord`] per period. Growth fields are `None` where no growth rate is defined.
pub fn decompose_growth(
    dates: &[NaiveDate],
    output: &[f64],
    capital: &[f64],
    labor: &[f64],
    shares: &FactorShare,
    lag: usize,
) -> Result<Vec<GrowthRecord>> {
    ensure!(lag > 0, "Lag must be a positive number of periods");
    let n = dates.len();
    ensure!(
        output.len() == n && capital.len() == n && labor.len() == n,
        "Series must all have {n} values (output: {}, capital: {}, labour: {})",
        output.len(),
        capital.len(),
        labor.len()
    );

    let capital_share = shares.capital / 100.0;
    let labor_share = shares.labor / 100.0;

    let output_growth = growth_rates(output, lag);
    let capital_growth = growth_rates(capital, lag);
    let labor_growth = growth_rates(labor, lag);

    let records = dates
        .iter()
        .zip(capital)
        .zip(output_growth.into_iter().zip(capital_growth).zip(labor_growth))
        .map(|((&date, &capital_estimate), ((y, k), l))| {
            let weighted_capital_growth = k.map(|k| capital_share * k);
            let weighted_labor_growth = l.map(|l| labor_share * l);
            let tfp_growth = match (y, weighted_capital_growth, weighted_labor_growth) {
                (Some(y), Some(k), Some(l)) => Some(y - k - l),
                _ => None,
            };

            GrowthRecord {
                date,
                output_growth: y,
                weighted_capital_growth,
                weighted_labor_growth,
                tfp_growth,
                capital_estimate,
            }
        })
        .collect();

    Ok(records)
}
