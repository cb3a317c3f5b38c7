//! Construction of capital-stock series from output and investment flows.
//!
//! Both methods seed the first period with a steady-state value derived from the long-run mean
//! output growth rate and the depreciation rate, then accumulate forwards one period at a time.
use crate::growth::growth_rates;
use crate::panel::Panel;
use serde_string_enum::DeserializeLabeledStringEnum;

/// The algorithm used to accumulate the capital stock
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum, strum::Display)]
pub enum CapitalMethod {
    /// Depreciate the previous stock and add new investment
    #[default]
    #[string = "perpetual_inventory"]
    #[strum(serialize = "perpetual_inventory")]
    PerpetualInventory,
    /// Add saved output to the previous stock, less depreciation of investment
    #[string = "saving_rate"]
    #[strum(serialize = "saving_rate")]
    SavingRate,
}

/// Parameters for capital accumulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapitalParameters {
    /// Proportion of capital lost each period (0-1)
    pub depreciation_rate: f64,
    /// Proportion of output saved each period (0-1). Only used by [`CapitalMethod::SavingRate`].
    pub saving_rate: f64,
}

impl Default for CapitalParameters {
    fn default() -> Self {
        Self {
            depreciation_rate: 0.05,
            saving_rate: 0.2,
        }
    }
}

/// An estimated capital stock, aligned with the periods of the panel it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct CapitalSeries(Vec<f64>);

impl CapitalSeries {
    /// The capital stock in each period
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// The number of periods
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the series is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl CapitalMethod {
    /// Estimate the capital stock for a panel
    pub fn estimate(self, panel: &Panel, parameters: &CapitalParameters) -> CapitalSeries {
        let output = panel.output();
        let investment = panel.investment();
        let values = match self {
            Self::PerpetualInventory => {
                perpetual_inventory(output, investment, parameters.depreciation_rate)
            }
            Self::SavingRate => saving_rate_flow(
                output,
                investment,
                parameters.saving_rate,
                parameters.depreciation_rate,
            ),
        };

        CapitalSeries(values)
    }
}

/// The arithmetic mean of one-period growth rates, ignoring periods without a defined rate.
///
/// Returns NaN if no growth rate can be calculated.
pub fn mean_growth_rate(series: &[f64]) -> f64 {
    let (sum, count) = growth_rates(series, 1)
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), g| (sum + g, count + 1));

    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// The steady-state capital stock used to seed the first period
pub fn steady_state_capital(investment: f64, mean_output_growth: f64, depreciation_rate: f64) -> f64 {
    investment / (mean_output_growth + depreciation_rate)
}

/// Accumulate a capital stock with a per-period recurrence, seeded with the steady-state value.
///
/// # Panics
///
/// If `output` and `investment` have different lengths.
fn accumulate<F>(output: &[f64], investment: &[f64], depreciation_rate: f64, step: F) -> Vec<f64>
where
    F: Fn(f64, f64, f64) -> f64,
{
    assert_eq!(
        output.len(),
        investment.len(),
        "Output and investment series must be the same length"
    );

    let Some(&first_investment) = investment.first() else {
        return Vec::new();
    };

    let seed = steady_state_capital(
        first_investment,
        mean_growth_rate(output),
        depreciation_rate,
    );

    let mut capital = Vec::with_capacity(investment.len());
    let mut previous = seed;
    capital.push(previous);
    for (&output, &investment) in output.iter().zip(investment).skip(1) {
        previous = step(previous, output, investment);
        capital.push(previous);
    }

    capital
}

/// Capital stock by the perpetual inventory method.
///
/// `capital[i] = (1 - d) * capital[i-1] + investment[i]`
pub fn perpetual_inventory(output: &[f64], investment: &[f64], depreciation_rate: f64) -> Vec<f64> {
    accumulate(output, investment, depreciation_rate, |previous, _, investment| {
        (1.0 - depreciation_rate) * previous + investment
    })
}

/// Capital stock by the saving-rate (flow) method.
///
/// `capital[i] = capital[i-1] + s * output[i] - d * investment[i]`
pub fn saving_rate_flow(
    output: &[f64],
    investment: &[f64],
    saving_rate: f64,
    depreciation_rate: f64,
) -> Vec<f64> {
    accumulate(output, investment, depreciation_rate, |previous, output, investment| {
        previous + saving_rate * output - depreciation_rate * investment
    })
}
