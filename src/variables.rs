//! Construction of the log-ratio variables used to estimate factor shares.
use crate::capital::CapitalSeries;
use crate::panel::Panel;
use anyhow::{Result, bail, ensure};
use log::{debug, warn};
use serde_string_enum::DeserializeLabeledStringEnum;

/// How to treat undefined values (from the log of a non-positive number or division by zero)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum, strum::Display)]
pub enum UndefinedValuePolicy {
    /// Replace undefined values with zero
    #[default]
    #[string = "zero_fill"]
    #[strum(serialize = "zero_fill")]
    ZeroFill,
    /// Keep undefined values as missing; incomplete rows are left out of the regression
    #[string = "propagate"]
    #[strum(serialize = "propagate")]
    Propagate,
    /// Treat undefined values as an error
    #[string = "fail"]
    #[strum(serialize = "fail")]
    Fail,
}

/// The transform applied to the ratio of employed persons to population
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LaborTransform {
    /// `log(1 + employed / population)`
    #[strum(serialize = "log_one_plus_ratio")]
    LogOnePlusRatio,
    /// `log(employed / population)`
    #[strum(serialize = "log_ratio")]
    LogRatio,
}

impl LaborTransform {
    /// Apply the transform to a single ratio
    pub fn apply(self, ratio: f64) -> f64 {
        match self {
            Self::LogOnePlusRatio => ratio.ln_1p(),
            Self::LogRatio => ratio.ln(),
        }
    }
}

/// How the labour transform is chosen
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum)]
pub enum LaborTransformPolicy {
    /// Choose once per series: [`LaborTransform::LogOnePlusRatio`] if the mean ratio is below one,
    /// otherwise [`LaborTransform::LogRatio`]
    #[default]
    #[string = "auto"]
    Auto,
    /// Always use [`LaborTransform::LogOnePlusRatio`]
    #[string = "log_one_plus_ratio"]
    LogOnePlusRatio,
    /// Always use [`LaborTransform::LogRatio`]
    #[string = "log_ratio"]
    LogRatio,
}

impl LaborTransformPolicy {
    /// Select the transform to use for the given employed/population ratios
    pub fn resolve(self, ratios: &[f64]) -> LaborTransform {
        match self {
            Self::LogOnePlusRatio => LaborTransform::LogOnePlusRatio,
            Self::LogRatio => LaborTransform::LogRatio,
            Self::Auto => {
                if mean_finite(ratios) < 1.0 {
                    LaborTransform::LogOnePlusRatio
                } else {
                    LaborTransform::LogRatio
                }
            }
        }
    }
}

/// The mean of the finite values in a slice (NaN if there are none)
fn mean_finite(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// The variables for the factor-share regression
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionVariables {
    /// Dependent variable: `log(output / population)`
    pub output_per_capita: Vec<f64>,
    /// First regressor: `log(capital / output)`
    pub capital_output_ratio: Vec<f64>,
    /// Second regressor: the transformed ratio of employed persons to population
    pub labor_participation: Vec<f64>,
    /// The transform used for the labour regressor
    pub labor_transform: LaborTransform,
}

impl RegressionVariables {
    /// The number of observations
    pub fn len(&self) -> usize {
        self.output_per_capita.len()
    }

    /// Whether there are no observations
    pub fn is_empty(&self) -> bool {
        self.output_per_capita.is_empty()
    }

    /// The observations with every variable defined, as (dependent, capital, labour) columns
    pub fn complete_rows(&self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut y = Vec::with_capacity(self.len());
        let mut capital = Vec::with_capacity(self.len());
        let mut labor = Vec::with_capacity(self.len());
        for ((&yi, &ki), &li) in self
            .output_per_capita
            .iter()
            .zip(&self.capital_output_ratio)
            .zip(&self.labor_participation)
        {
            if yi.is_finite() && ki.is_finite() && li.is_finite() {
                y.push(yi);
                capital.push(ki);
                labor.push(li);
            }
        }

        (y, capital, labor)
    }
}

/// Apply the undefined value policy to a variable in place
fn handle_undefined(
    name: &str,
    panel: &Panel,
    values: &mut [f64],
    policy: UndefinedValuePolicy,
) -> Result<()> {
    let undefined = values.iter().filter(|v| !v.is_finite()).count();
    if undefined == 0 {
        return Ok(());
    }

    match policy {
        UndefinedValuePolicy::ZeroFill => {
            warn!(
                "Region {}: {undefined} undefined value(s) of {name} replaced with zero",
                panel.region_id()
            );
            for value in values.iter_mut().filter(|v| !v.is_finite()) {
                *value = 0.0;
            }
        }
        UndefinedValuePolicy::Propagate => {
            warn!(
                "Region {}: {undefined} undefined value(s) of {name} will be left out of the \
                regression",
                panel.region_id()
            );
            for value in values.iter_mut().filter(|v| !v.is_finite()) {
                *value = f64::NAN;
            }
        }
        UndefinedValuePolicy::Fail => {
            if let Some((date, _)) = panel
                .dates()
                .iter()
                .zip(values.iter())
                .find(|(_, v)| !v.is_finite())
            {
                bail!("Undefined value of {name} for period {date}");
            }
            bail!("Undefined value of {name}");
        }
    }

    Ok(())
}

/// Build the regression variables from a panel and its capital stock.
///
/// # Arguments
///
/// * `panel` - The panel of raw levels
/// * `capital` - The capital stock estimated for the panel
/// * `labor_policy` - How to choose the labour transform
/// * `undefined_policy` - How to treat undefined values
pub fn build_variables(
    panel: &Panel,
    capital: &CapitalSeries,
    labor_policy: LaborTransformPolicy,
    undefined_policy: UndefinedValuePolicy,
) -> Result<RegressionVariables> {
    ensure!(
        capital.len() == panel.len(),
        "Capital series has {} values but the panel has {} periods",
        capital.len(),
        panel.len()
    );

    let output = panel.output();
    let population = panel.population();

    let mut output_per_capita: Vec<f64> = output
        .iter()
        .zip(population)
        .map(|(y, n)| (y / n).ln())
        .collect();
    let mut capital_output_ratio: Vec<f64> = capital
        .values()
        .iter()
        .zip(output)
        .map(|(k, y)| (k / y).ln())
        .collect();

    let ratios: Vec<f64> = panel
        .employed()
        .iter()
        .zip(population)
        .map(|(l, n)| l / n)
        .collect();
    let labor_transform = labor_policy.resolve(&ratios);
    debug!(
        "Region {}: using {labor_transform} transform for labour participation",
        panel.region_id()
    );
    let mut labor_participation: Vec<f64> = ratios
        .into_iter()
        .map(|ratio| labor_transform.apply(ratio))
        .collect();

    handle_undefined(
        "output per capita",
        panel,
        &mut output_per_capita,
        undefined_policy,
    )?;
    handle_undefined(
        "capital-output ratio",
        panel,
        &mut capital_output_ratio,
        undefined_policy,
    )?;
    handle_undefined(
        "labour participation",
        panel,
        &mut labor_participation,
        undefined_policy,
    )?;

    Ok(RegressionVariables {
        output_per_capita,
        capital_output_ratio,
        labor_participation,
        labor_transform,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capital::{CapitalMethod, CapitalParameters};
    use crate::fixture::{annual_panel, assert_error};
    use crate::panel::{PanelRow, Periodicity};
    use chrono::NaiveDate;
    use float_cmp::assert_approx_eq;
    use itertools::Itertools;
    use rstest::rstest;

    /// A panel in which the second period has zero output.
    ///
    /// Output grows strongly afterwards, so the mean growth rate (and the capital seed) stays
    /// positive and only the second period is undefined.
    fn degenerate_panel() -> Panel {
        let rows = [
            (2000, 100.0),
            (2001, 0.0),
            (2002, 110.0),
            (2003, 220.0),
            (2004, 440.0),
        ]
        .map(|(year, output)| PanelRow {
            date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            output,
            investment: 10.0,
            population: 50.0,
            employed: 20.0,
        });
        Panel::from_rows("R1".into(), Periodicity::Annual, rows).unwrap()
    }

    fn capital_for(panel: &Panel) -> CapitalSeries {
        CapitalMethod::PerpetualInventory.estimate(panel, &CapitalParameters::default())
    }

    #[rstest]
    #[case(&[0.3, 0.4, 0.5], LaborTransform::LogOnePlusRatio)]
    #[case(&[0.9, 1.2, 1.2], LaborTransform::LogRatio)]
    #[case(&[1.0, 1.0], LaborTransform::LogRatio)]
    #[case(&[0.5, f64::INFINITY], LaborTransform::LogOnePlusRatio)]
    fn test_labor_transform_auto(#[case] ratios: &[f64], #[case] expected: LaborTransform) {
        assert_eq!(LaborTransformPolicy::Auto.resolve(ratios), expected);
    }

    #[test]
    fn test_labor_transform_fixed() {
        let ratios = [0.5, 0.5];
        assert_eq!(
            LaborTransformPolicy::LogRatio.resolve(&ratios),
            LaborTransform::LogRatio
        );
        assert_eq!(
            LaborTransformPolicy::LogOnePlusRatio.resolve(&[2.0]),
            LaborTransform::LogOnePlusRatio
        );
    }

    #[rstest]
    fn test_build_variables(annual_panel: Panel) {
        let capital = capital_for(&annual_panel);
        let vars = build_variables(
            &annual_panel,
            &capital,
            LaborTransformPolicy::Auto,
            UndefinedValuePolicy::ZeroFill,
        )
        .unwrap();

        assert_eq!(vars.len(), annual_panel.len());
        assert_eq!(vars.labor_transform, LaborTransform::LogOnePlusRatio);
        for i in 0..annual_panel.len() {
            let y = annual_panel.output()[i];
            let n = annual_panel.population()[i];
            let l = annual_panel.employed()[i];
            assert_approx_eq!(f64, vars.output_per_capita[i], (y / n).ln());
            assert_approx_eq!(
                f64,
                vars.capital_output_ratio[i],
                (capital.values()[i] / y).ln()
            );
            assert_approx_eq!(f64, vars.labor_participation[i], (1.0 + l / n).ln());
        }
    }

    #[test]
    fn test_degenerate_panel_capital() {
        // Only the zero-output period has an undefined capital-output ratio
        let panel = degenerate_panel();
        let capital = capital_for(&panel);
        assert!(capital.values().iter().all(|&k| k > 0.0));
        let undefined = capital
            .values()
            .iter()
            .zip(panel.output())
            .map(|(k, y)| (k / y).ln())
            .positions(|ratio| !ratio.is_finite())
            .collect_vec();
        assert_eq!(undefined, [1]);
    }

    #[test]
    fn test_build_variables_zero_fill() {
        let panel = degenerate_panel();
        let capital = capital_for(&panel);
        let vars = build_variables(
            &panel,
            &capital,
            LaborTransformPolicy::Auto,
            UndefinedValuePolicy::ZeroFill,
        )
        .unwrap();
        assert_eq!(vars.output_per_capita[1], 0.0);
        assert_eq!(vars.capital_output_ratio[1], 0.0);
        assert!(vars.output_per_capita[0] != 0.0);
        assert_eq!(vars.complete_rows().0.len(), 5);
    }

    #[test]
    fn test_build_variables_propagate() {
        let panel = degenerate_panel();
        let capital = capital_for(&panel);
        let vars = build_variables(
            &panel,
            &capital,
            LaborTransformPolicy::Auto,
            UndefinedValuePolicy::Propagate,
        )
        .unwrap();
        assert!(vars.output_per_capita[1].is_nan());
        assert!(vars.capital_output_ratio[1].is_nan());
        let (y, k, l) = vars.complete_rows();
        assert_eq!(y.len(), 4);
        assert_eq!(k.len(), 4);
        assert_eq!(l.len(), 4);
        assert_eq!(y[0], vars.output_per_capita[0]);
        assert_eq!(y[1], vars.output_per_capita[2]);
        assert_eq!(k[0], vars.capital_output_ratio[0]);
    }

    #[test]
    fn test_build_variables_fail() {
        let panel = degenerate_panel();
        let capital = capital_for(&panel);
        assert_error!(
            build_variables(
                &panel,
                &capital,
                LaborTransformPolicy::Auto,
                UndefinedValuePolicy::Fail,
            ),
            "Undefined value of output per capita for period 2001-01-01"
        );
    }
}
