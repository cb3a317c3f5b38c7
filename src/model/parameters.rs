//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::capital::{CapitalMethod, CapitalParameters};
use crate::estimation::EstimationOptions;
use crate::input::{deserialise_proportion, input_err_msg, read_toml};
use crate::panel::Periodicity;
use crate::periods::{PeriodBucket, check_buckets, default_decade_buckets};
use crate::seasonal::StlParameters;
use crate::shares::{CoefficientSource, RegressionOptions};
use crate::variables::{LaborTransformPolicy, UndefinedValuePolicy};
use anyhow::{Context, Result, bail, ensure};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_depreciation_rate, f64, 0.05);
define_param_default!(default_saving_rate, f64, 0.2);
define_param_default!(default_period_buckets, Vec<PeriodBucket>, default_decade_buckets());

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// Whether the panels hold annual or quarterly data
    #[serde(default)]
    pub periodicity: Periodicity,
    /// Proportion of capital lost each period
    #[serde(default = "default_depreciation_rate")]
    #[serde(deserialize_with = "deserialise_proportion")]
    pub depreciation_rate: f64,
    /// Proportion of output saved each period (used by the saving-rate capital method)
    #[serde(default = "default_saving_rate")]
    #[serde(deserialize_with = "deserialise_proportion")]
    pub saving_rate: f64,
    /// How to accumulate the capital stock
    #[serde(default)]
    pub capital_method: CapitalMethod,
    /// Number of periods over which growth is measured. Defaults to one year.
    #[serde(default)]
    pub lag: Option<usize>,
    /// Whether to seasonally adjust output and investment. Defaults to true for quarterly data.
    #[serde(default)]
    pub seasonal_adjustment: Option<bool>,
    /// Parameters for seasonal adjustment
    #[serde(default)]
    pub stl: StlParameters,
    /// Whether to fit an intercept in the factor-share regression
    #[serde(default)]
    pub intercept: bool,
    /// Which fit the capital coefficient and R² are taken from
    #[serde(default)]
    pub coefficient_source: CoefficientSource,
    /// How to treat undefined regression variables
    #[serde(default)]
    pub undefined_values: UndefinedValuePolicy,
    /// How to choose the labour participation transform
    #[serde(default)]
    pub labor_transform: LaborTransformPolicy,
    /// First year of the date index used for period averages. Defaults to each panel's first year.
    #[serde(default)]
    pub start_year: Option<i32>,
    /// Buckets for period averages
    #[serde(default = "default_period_buckets")]
    pub period_buckets: Vec<PeriodBucket>,
}

/// Check that the `lag` parameter is valid
fn check_lag(lag: Option<usize>) -> Result<()> {
    ensure!(lag != Some(0), "lag must be a positive number of periods");

    Ok(())
}

/// Check that seasonal adjustment is only requested for quarterly data
fn check_seasonal_adjustment(periodicity: Periodicity, seasonal_adjustment: bool) -> Result<()> {
    if seasonal_adjustment && periodicity == Periodicity::Annual {
        bail!("seasonal_adjustment cannot be enabled for annual data");
    }

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        // depreciation_rate and saving_rate already validated with deserialise_proportion

        // lag
        check_lag(self.lag)?;

        // seasonal_adjustment
        check_seasonal_adjustment(self.periodicity, self.seasonal_adjustment())?;

        // stl
        self.stl.validate().context("Invalid value for stl")?;

        // period_buckets
        check_buckets(&self.period_buckets).context("Invalid value for period_buckets")?;

        if self.periodicity == Periodicity::Quarterly && !self.seasonal_adjustment() {
            warn!("Seasonal adjustment is disabled for quarterly data");
        }

        Ok(())
    }

    /// The number of periods over which growth is measured
    pub fn lag(&self) -> usize {
        self.lag.unwrap_or_else(|| self.periodicity.default_lag())
    }

    /// Whether flow series should be seasonally adjusted
    pub fn seasonal_adjustment(&self) -> bool {
        self.seasonal_adjustment
            .unwrap_or(self.periodicity == Periodicity::Quarterly)
    }

    /// The options for estimating growth accounts for each panel
    pub fn estimation_options(&self) -> EstimationOptions {
        EstimationOptions {
            capital_method: self.capital_method,
            capital_parameters: CapitalParameters {
                depreciation_rate: self.depreciation_rate,
                saving_rate: self.saving_rate,
            },
            lag: self.lag(),
            seasonal_adjustment: self.seasonal_adjustment().then_some(self.stl),
            undefined_values: self.undefined_values,
            labor_transform: self.labor_transform,
            regression: RegressionOptions {
                intercept: self.intercept,
                coefficient_source: self.coefficient_source,
            },
            start_year: self.start_year,
            period_buckets: self.period_buckets.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Write a model file with the given contents and try to load it
    fn load_parameters(contents: &str) -> Result<ModelParameters> {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(file, "{contents}").unwrap();
        }

        ModelParameters::from_path(dir.path())
    }

    #[test]
    fn test_model_params_defaults() {
        let params = load_parameters("").unwrap();
        assert_eq!(params.periodicity, Periodicity::Annual);
        assert_eq!(params.depreciation_rate, 0.05);
        assert_eq!(params.saving_rate, 0.2);
        assert_eq!(params.capital_method, CapitalMethod::PerpetualInventory);
        assert_eq!(params.lag(), 1);
        assert!(!params.seasonal_adjustment());
        assert_eq!(params.period_buckets, default_decade_buckets());
        assert_eq!(params.estimation_options(), EstimationOptions::annual());
    }

    #[test]
    fn test_model_params_quarterly() {
        let params = load_parameters("periodicity = \"quarterly\"").unwrap();
        assert_eq!(params.lag(), 4);
        assert!(params.seasonal_adjustment());
        assert_eq!(params.estimation_options(), EstimationOptions::quarterly());
    }

    #[test]
    fn test_model_params_from_path() {
        let params = load_parameters(
            "periodicity = \"quarterly\"
depreciation_rate = 0.1
capital_method = \"saving_rate\"
lag = 1
intercept = true
coefficient_source = \"statistical\"
undefined_values = \"propagate\"
labor_transform = \"log_ratio\"
start_year = 2006

[stl]
period = 7
robust = true

[[period_buckets]]
label = \"early\"
end_year = 2015

[[period_buckets]]
label = \"late\"
start_year = 2015",
        )
        .unwrap();

        let options = params.estimation_options();
        assert_eq!(options.capital_method, CapitalMethod::SavingRate);
        assert_eq!(options.capital_parameters.depreciation_rate, 0.1);
        assert_eq!(options.lag, 1);
        assert_eq!(
            options.seasonal_adjustment,
            Some(StlParameters {
                period: 7,
                robust: true,
                ..Default::default()
            })
        );
        assert!(options.regression.intercept);
        assert_eq!(
            options.regression.coefficient_source,
            CoefficientSource::Statistical
        );
        assert_eq!(options.undefined_values, UndefinedValuePolicy::Propagate);
        assert_eq!(options.labor_transform, LaborTransformPolicy::LogRatio);
        assert_eq!(options.start_year, Some(2006));
        assert_eq!(
            options.period_buckets,
            [
                PeriodBucket::new("early", None, Some(2015)),
                PeriodBucket::new("late", Some(2015), None)
            ]
        );
    }

    #[rstest]
    #[case("depreciation_rate = 1.5")]
    #[case("saving_rate = -0.1")]
    #[case("capital_method = \"unknown\"")]
    #[case("unknown_key = 1")]
    fn test_model_params_invalid_syntax(#[case] contents: &str) {
        assert!(load_parameters(contents).is_err());
    }

    #[rstest]
    #[case("lag = 0", "lag must be a positive number of periods")]
    #[case(
        "seasonal_adjustment = true",
        "seasonal_adjustment cannot be enabled for annual data"
    )]
    #[case("[stl]\nperiod = 4", "Invalid value for stl")]
    #[case("[[period_buckets]]\nlabel = \"a\"\nstart_year = 2010\nend_year = 2000", "Invalid value for period_buckets")]
    fn test_model_params_invalid(#[case] contents: &str, #[case] msg: &str) {
        let err = load_parameters(contents).unwrap_err();
        let messages = err.chain().map(ToString::to_string).collect::<Vec<_>>();
        assert!(
            messages.iter().any(|m| m == msg),
            "Expected error message {msg:?}, got: {messages:?}"
        );
    }

    #[test]
    fn test_check_lag() {
        assert!(check_lag(None).is_ok());
        assert!(check_lag(Some(4)).is_ok());
        assert!(check_lag(Some(0)).is_err());
    }

    #[rstest]
    #[case(Periodicity::Annual, false, true)]
    #[case(Periodicity::Annual, true, false)]
    #[case(Periodicity::Quarterly, true, true)]
    #[case(Periodicity::Quarterly, false, true)]
    fn test_check_seasonal_adjustment(
        #[case] periodicity: Periodicity,
        #[case] seasonal_adjustment: bool,
        #[case] valid: bool,
    ) {
        assert_eq!(
            check_seasonal_adjustment(periodicity, seasonal_adjustment).is_ok(),
            valid
        );
    }
}
