//! Estimation of factor shares from the Cobb-Douglas regression.
use crate::regression::{OlsFit, fit_ols};
use crate::variables::RegressionVariables;
use anyhow::{Context, Result};
use log::{debug, warn};
use serde_string_enum::DeserializeLabeledStringEnum;

/// Which fit supplies the capital coefficient and R²
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum)]
pub enum CoefficientSource {
    /// The direct fit, unless its R² is negative, in which case the statistical fit
    #[default]
    #[string = "auto"]
    Auto,
    /// Always the direct fit (centred R²)
    #[string = "direct"]
    Direct,
    /// Always the statistical fit (adjusted R²)
    #[string = "statistical"]
    Statistical,
}

/// The fit that a [`ShareEstimate`] was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum FitSource {
    /// Direct fit with centred R²
    #[strum(serialize = "direct")]
    Direct,
    /// Statistical fit with adjusted R²
    #[strum(serialize = "statistical")]
    Statistical,
}

/// Options for the factor-share regression
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RegressionOptions {
    /// Whether to fit an intercept
    pub intercept: bool,
    /// Which fit to take the coefficient and R² from
    pub coefficient_source: CoefficientSource,
}

/// Factor shares, as percentages rounded to two decimal places.
///
/// The shares are not normalised and need not sum to exactly 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorShare {
    /// Share of capital
    pub capital: f64,
    /// Share of labour
    pub labor: f64,
    /// Share of the residual (technology/TFP)
    pub tech: f64,
}

/// The result of the share estimation for one panel
#[derive(Debug, Clone, PartialEq)]
pub struct ShareEstimate {
    /// The rounded factor shares
    pub shares: FactorShare,
    /// The output elasticity of capital, before rounding
    pub alpha: f64,
    /// The R² used to derive the shares
    pub r_squared: f64,
    /// The coefficient on the capital-output ratio
    pub capital_coefficient: f64,
    /// The fit the coefficient and R² were taken from
    pub source: FitSource,
}

/// Round to two decimal places, with ties to even
fn round_percentage(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Calculate the unrounded factor shares (as percentages) from a coefficient and R²
fn unrounded_shares(capital_coefficient: f64, r_squared: f64) -> (f64, FactorShare) {
    let magnitude = capital_coefficient.abs();
    let alpha = magnitude / (1.0 + magnitude) * r_squared;
    let shares = FactorShare {
        capital: alpha * 100.0,
        labor: (r_squared - alpha) * 100.0,
        tech: (1.0 - r_squared) * 100.0,
    };

    (alpha, shares)
}

/// Choose which fit to use according to the coefficient source
fn select_source(fit: &OlsFit, source: CoefficientSource) -> FitSource {
    match source {
        CoefficientSource::Direct => FitSource::Direct,
        CoefficientSource::Statistical => FitSource::Statistical,
        CoefficientSource::Auto if fit.r_squared < 0.0 => {
            warn!(
                "Direct fit has negative R² ({}); using the statistical fit instead",
                fit.r_squared
            );
            FitSource::Statistical
        }
        CoefficientSource::Auto => FitSource::Direct,
    }
}

/// Estimate factor shares by regressing output per capita on the capital-output ratio and labour
/// participation.
///
/// Rows with undefined values are left out of the regression.
pub fn estimate_shares(
    variables: &RegressionVariables,
    options: &RegressionOptions,
) -> Result<ShareEstimate> {
    let (y, capital, labor) = variables.complete_rows();
    if y.len() < variables.len() {
        debug!(
            "{} incomplete row(s) left out of the regression",
            variables.len() - y.len()
        );
    }

    let fit = fit_ols(&y, &[&capital, &labor], options.intercept)
        .context("Failed to estimate factor shares")?;

    // Both fits share the same coefficients and differ only in their goodness of fit
    let capital_coefficient = fit.coefficients[0];
    let source = select_source(&fit, options.coefficient_source);
    let r_squared = match source {
        FitSource::Direct => fit.r_squared,
        FitSource::Statistical => fit.adjusted_r_squared,
    };
    debug!("Capital coefficient {capital_coefficient} with {source} R² {r_squared}");

    let (alpha, shares) = unrounded_shares(capital_coefficient, r_squared);
    let shares = FactorShare {
        capital: round_percentage(shares.capital),
        labor: round_percentage(shares.labor),
        tech: round_percentage(shares.tech),
    };

    Ok(ShareEstimate {
        shares,
        alpha,
        r_squared,
        capital_coefficient,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::variables::LaborTransform;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn variables(y: Vec<f64>, capital: Vec<f64>, labor: Vec<f64>) -> RegressionVariables {
        RegressionVariables {
            output_per_capita: y,
            capital_output_ratio: capital,
            labor_participation: labor,
            labor_transform: LaborTransform::LogOnePlusRatio,
        }
    }

    /// Noiseless data with a capital coefficient of -0.5 and labour coefficient of 2
    fn exact_variables() -> RegressionVariables {
        let capital = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let labor = vec![2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
        let y = capital
            .iter()
            .zip(&labor)
            .map(|(k, l)| -0.5 * k + 2.0 * l)
            .collect();
        variables(y, capital, labor)
    }

    #[rstest]
    #[case(0.5, 0.8)]
    #[case(-0.5, 0.8)]
    #[case(3.0, 0.25)]
    #[case(0.0, 1.0)]
    #[case(1.2, -0.4)]
    fn test_unrounded_shares(#[case] coefficient: f64, #[case] r_squared: f64) {
        let (alpha, shares) = unrounded_shares(coefficient, r_squared);
        assert_approx_eq!(
            f64,
            alpha,
            coefficient.abs() / (1.0 + coefficient.abs()) * r_squared
        );
        assert_approx_eq!(f64, shares.capital + shares.labor, r_squared * 100.0);
        assert_approx_eq!(f64, shares.tech, (1.0 - r_squared) * 100.0);
    }

    #[rstest]
    #[case(12.345, 12.34)]
    #[case(12.355, 12.36)]
    #[case(0.125, 0.12)]
    #[case(0.375, 0.38)]
    #[case(33.333_333, 33.33)]
    fn test_round_percentage(#[case] value: f64, #[case] expected: f64) {
        assert_approx_eq!(f64, round_percentage(value), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_estimate_shares_exact() {
        let estimate = estimate_shares(&exact_variables(), &RegressionOptions::default()).unwrap();
        assert_eq!(estimate.source, FitSource::Direct);
        assert_approx_eq!(f64, estimate.capital_coefficient, -0.5, epsilon = 1e-10);
        assert_approx_eq!(f64, estimate.r_squared, 1.0, epsilon = 1e-10);

        // alpha = 0.5 / 1.5
        assert_approx_eq!(f64, estimate.alpha, 1.0 / 3.0, epsilon = 1e-10);
        assert_eq!(
            estimate.shares,
            FactorShare {
                capital: 33.33,
                labor: 66.67,
                tech: 0.0
            }
        );
    }

    #[test]
    fn test_estimate_shares_negative_r_squared() {
        // A flat response far from the origin fits badly without an intercept
        let vars = variables(
            vec![10.0, 9.0, 10.0, 9.0, 10.0, 9.0],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![0.1, 0.3, 0.2, 0.4, 0.3, 0.5],
        );
        let fit = fit_ols(
            &vars.output_per_capita,
            &[&vars.capital_output_ratio, &vars.labor_participation],
            false,
        )
        .unwrap();
        assert!(fit.r_squared < 0.0);

        let auto = estimate_shares(&vars, &RegressionOptions::default()).unwrap();
        assert_eq!(auto.source, FitSource::Statistical);
        assert_eq!(auto.r_squared, fit.adjusted_r_squared);
        assert_eq!(auto.capital_coefficient, fit.coefficients[0]);

        let direct = estimate_shares(
            &vars,
            &RegressionOptions {
                intercept: false,
                coefficient_source: CoefficientSource::Direct,
            },
        )
        .unwrap();
        assert_eq!(direct.source, FitSource::Direct);
        assert_eq!(direct.r_squared, fit.r_squared);
        assert_eq!(direct.capital_coefficient, auto.capital_coefficient);
    }

    #[test]
    fn test_estimate_shares_statistical() {
        let estimate = estimate_shares(
            &exact_variables(),
            &RegressionOptions {
                intercept: true,
                coefficient_source: CoefficientSource::Statistical,
            },
        )
        .unwrap();
        assert_eq!(estimate.source, FitSource::Statistical);
        assert_approx_eq!(f64, estimate.capital_coefficient, -0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_estimate_shares_skips_incomplete_rows() {
        let mut vars = exact_variables();
        vars.output_per_capita[2] = f64::NAN;
        let estimate = estimate_shares(&vars, &RegressionOptions::default()).unwrap();
        assert_approx_eq!(f64, estimate.capital_coefficient, -0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_estimate_shares_insufficient_observations() {
        let vars = variables(vec![1.0], vec![1.0], vec![2.0]);
        assert_error!(
            estimate_shares(&vars, &RegressionOptions::default()),
            "Failed to estimate factor shares"
        );
    }
}
