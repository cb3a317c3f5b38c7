//! Seasonal adjustment by STL (seasonal-trend decomposition using LOESS).
//!
//! This follows Cleveland et al. (1990), "STL: A Seasonal-Trend Decomposition Procedure Based on
//! Loess", with local linear fits and every smoother evaluated at every point.
use anyhow::{Result, ensure};
use serde::Deserialize;

/// Number of passes of the inner loop for a non-robust fit
const INNER_ITERATIONS: usize = 5;
/// Number of passes of the inner loop for a robust fit
const ROBUST_INNER_ITERATIONS: usize = 2;
/// Number of robustness iterations for a robust fit
const ROBUST_OUTER_ITERATIONS: usize = 15;

/// Parameters for the STL decomposition
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StlParameters {
    /// Length of the seasonal cycle
    pub period: usize,
    /// Length of the seasonal smoother
    pub seasonal: usize,
    /// Length of the trend smoother. Defaults to a value derived from `period` and `seasonal`.
    pub trend: Option<usize>,
    /// Length of the low-pass filter. Defaults to the smallest odd number greater than `period`.
    pub low_pass: Option<usize>,
    /// Whether to downweight outliers with robustness iterations
    pub robust: bool,
}

impl Default for StlParameters {
    fn default() -> Self {
        Self {
            period: 5,
            seasonal: 7,
            trend: None,
            low_pass: None,
            robust: false,
        }
    }
}

/// Round up to the nearest odd number
fn next_odd(value: usize) -> usize {
    if value % 2 == 0 { value + 1 } else { value }
}

/// Check that a smoother length is odd and at least 3
fn check_smoother_length(name: &str, value: usize) -> Result<()> {
    ensure!(
        value >= 3 && value % 2 == 1,
        "STL {name} length must be an odd number of at least 3 (got {value})"
    );

    Ok(())
}

impl StlParameters {
    /// The length of the trend smoother
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn trend_length(&self) -> usize {
        self.trend.unwrap_or_else(|| {
            let period = self.period as f64;
            let seasonal = self.seasonal as f64;
            next_odd((1.5 * period / (1.0 - 1.5 / seasonal)).ceil() as usize)
        })
    }

    /// The length of the low-pass filter
    pub fn low_pass_length(&self) -> usize {
        self.low_pass.unwrap_or_else(|| next_odd(self.period + 1))
    }

    /// Check that the parameters are valid
    pub fn validate(&self) -> Result<()> {
        check_smoother_length("period", self.period)?;
        check_smoother_length("seasonal", self.seasonal)?;

        let trend = self.trend_length();
        check_smoother_length("trend", trend)?;
        ensure!(
            trend > self.period,
            "STL trend length ({trend}) must be greater than the period ({})",
            self.period
        );

        let low_pass = self.low_pass_length();
        check_smoother_length("low-pass", low_pass)?;
        ensure!(
            low_pass > self.period,
            "STL low-pass length ({low_pass}) must be greater than the period ({})",
            self.period
        );

        Ok(())
    }
}

/// The components of a decomposed series
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// The trend component
    pub trend: Vec<f64>,
    /// The seasonal component
    pub seasonal: Vec<f64>,
    /// What is left over
    pub residual: Vec<f64>,
}

/// Estimate the value at position `xs` from a weighted local linear fit over the points in
/// `left..=right`.
///
/// Positions are 1-based. Returns `None` if all the weights are zero.
fn loess_estimate(
    y: &[f64],
    len: usize,
    xs: f64,
    left: usize,
    right: usize,
    robustness: Option<&[f64]>,
) -> Option<f64> {
    let n = y.len();
    let range = n as f64 - 1.0;
    let mut h = (xs - left as f64).max(right as f64 - xs);
    if len > n {
        h += ((len - n) / 2) as f64;
    }
    let h9 = 0.999 * h;
    let h1 = 0.001 * h;

    let positions: Vec<f64> = (left..=right).map(|j| j as f64).collect();
    let mut weights: Vec<f64> = (left..=right)
        .zip(&positions)
        .map(|(j, &x)| {
            let r = (x - xs).abs();
            let weight = if r <= h1 {
                1.0
            } else if r <= h9 {
                (1.0 - (r / h).powi(3)).powi(3)
            } else {
                0.0
            };
            robustness.map_or(weight, |rw| weight * rw[j - 1])
        })
        .collect();

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    for weight in &mut weights {
        *weight /= total;
    }

    if h > 0.0 {
        let mean: f64 = weights.iter().zip(&positions).map(|(w, x)| w * x).sum();
        let variance: f64 = weights
            .iter()
            .zip(&positions)
            .map(|(w, x)| w * (x - mean).powi(2))
            .sum();
        if variance.sqrt() > 0.001 * range {
            let slope = (xs - mean) / variance;
            for (weight, x) in weights.iter_mut().zip(&positions) {
                *weight *= slope * (x - mean) + 1.0;
            }
        }
    }

    Some(
        weights
            .iter()
            .zip(&y[left - 1..right])
            .map(|(w, y)| w * y)
            .sum(),
    )
}

/// Smooth a series with LOESS of span `len`, evaluated at every point
fn loess_smooth(y: &[f64], len: usize, robustness: Option<&[f64]>) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return y.to_vec();
    }

    let mut left = 1;
    let mut right = len.min(n);
    let half = (len + 1) / 2;
    (1..=n)
        .map(|i| {
            if len < n && i > half && right != n {
                left += 1;
                right += 1;
            }
            loess_estimate(y, len, i as f64, left, right, robustness).unwrap_or(y[i - 1])
        })
        .collect()
}

/// Smooth each cycle-subseries and extend it by one value at each end.
///
/// The result has `y.len() + 2 * period` values.
fn smooth_cycle_subseries(
    y: &[f64],
    period: usize,
    len: usize,
    robustness: Option<&[f64]>,
) -> Vec<f64> {
    let mut cycle = vec![0.0; y.len() + 2 * period];
    for phase in 0..period {
        let subseries: Vec<f64> = y.iter().skip(phase).step_by(period).copied().collect();
        let sub_robustness: Option<Vec<f64>> =
            robustness.map(|rw| rw.iter().skip(phase).step_by(period).copied().collect());
        let sub_robustness = sub_robustness.as_deref();
        let k = subseries.len();

        let smoothed = loess_smooth(&subseries, len, sub_robustness);
        let first = loess_estimate(&subseries, len, 0.0, 1, len.min(k), sub_robustness)
            .unwrap_or(smoothed[0]);
        let left = if k >= len { k - len + 1 } else { 1 };
        let last = loess_estimate(&subseries, len, (k + 1) as f64, left, k, sub_robustness)
            .unwrap_or(smoothed[k - 1]);

        let extended = std::iter::once(first)
            .chain(smoothed)
            .chain(std::iter::once(last));
        for (m, value) in extended.enumerate() {
            cycle[m * period + phase] = value;
        }
    }

    cycle
}

/// Moving average with a window of `len` values
fn moving_average(x: &[f64], len: usize) -> Vec<f64> {
    x.windows(len)
        .map(|window| window.iter().sum::<f64>() / len as f64)
        .collect()
}

/// Bisquare robustness weights from the residuals of the current fit
fn robustness_weights(y: &[f64], fit: &[f64]) -> Vec<f64> {
    let residuals: Vec<f64> = y.iter().zip(fit).map(|(y, f)| (y - f).abs()).collect();
    let mut sorted = residuals.clone();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let cmad = 3.0 * (sorted[n / 2] + sorted[(n - 1) / 2]);
    let c9 = 0.999 * cmad;
    let c1 = 0.001 * cmad;

    residuals
        .into_iter()
        .map(|r| {
            if r <= c1 {
                1.0
            } else if r <= c9 {
                (1.0 - (r / cmad).powi(2)).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

/// Decompose a series into trend, seasonal and residual components.
///
/// # Arguments
///
/// * `series` - The observed series. Must be finite with at least two full cycles.
/// * `parameters` - Smoother lengths and robustness
pub fn decompose(series: &[f64], parameters: &StlParameters) -> Result<Decomposition> {
    parameters.validate()?;
    let n = series.len();
    let period = parameters.period;
    ensure!(
        n >= 2 * period,
        "Insufficient data for seasonal decomposition: {n} observations, at least {} required",
        2 * period
    );
    ensure!(
        series.iter().all(|value| value.is_finite()),
        "Series for seasonal decomposition must contain only finite values"
    );

    let (inner, outer) = if parameters.robust {
        (ROBUST_INNER_ITERATIONS, ROBUST_OUTER_ITERATIONS)
    } else {
        (INNER_ITERATIONS, 0)
    };

    Ok(decompose_with_iterations(series, parameters, inner, outer))
}

/// Run `outer` robustness iterations (plus the initial fit), each with `inner` passes
fn decompose_with_iterations(
    series: &[f64],
    parameters: &StlParameters,
    inner: usize,
    outer: usize,
) -> Decomposition {
    let n = series.len();
    let period = parameters.period;
    let trend_length = parameters.trend_length();
    let low_pass_length = parameters.low_pass_length();

    let mut trend = vec![0.0; n];
    let mut seasonal = vec![0.0; n];
    let mut robustness: Option<Vec<f64>> = None;
    for iteration in 0..=outer {
        for _ in 0..inner {
            let detrended: Vec<f64> = series.iter().zip(&trend).map(|(y, t)| y - t).collect();
            let cycle = smooth_cycle_subseries(
                &detrended,
                period,
                parameters.seasonal,
                robustness.as_deref(),
            );
            let filtered = moving_average(
                &moving_average(&moving_average(&cycle, period), period),
                3,
            );
            let low_pass = loess_smooth(&filtered, low_pass_length, None);
            for (i, value) in seasonal.iter_mut().enumerate() {
                *value = cycle[period + i] - low_pass[i];
            }

            let deseasoned: Vec<f64> = series.iter().zip(&seasonal).map(|(y, s)| y - s).collect();
            trend = loess_smooth(&deseasoned, trend_length, robustness.as_deref());
        }

        if iteration < outer {
            let fit: Vec<f64> = trend.iter().zip(&seasonal).map(|(t, s)| t + s).collect();
            robustness = Some(robustness_weights(series, &fit));
        }
    }

    let residual = series
        .iter()
        .zip(&trend)
        .zip(&seasonal)
        .map(|((y, t), s)| y - t - s)
        .collect();

    Decomposition {
        trend,
        seasonal,
        residual,
    }
}

/// Remove the seasonal component from a series, leaving trend and residual
pub fn seasonally_adjust(series: &[f64], parameters: &StlParameters) -> Result<Vec<f64>> {
    let decomposition = decompose(series, parameters)?;
    Ok(series
        .iter()
        .zip(decomposition.seasonal)
        .map(|(y, s)| y - s)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    const PATTERN: [f64; 5] = [3.0, -1.0, -2.0, 1.0, -1.0];

    /// A linear trend plus a periodic pattern which sums to zero
    fn seasonal_series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|t| 100.0 + 2.0 * t as f64 + PATTERN[t % PATTERN.len()])
            .collect()
    }

    #[test]
    fn test_default_lengths() {
        let parameters = StlParameters::default();
        assert_eq!(parameters.trend_length(), 11);
        assert_eq!(parameters.low_pass_length(), 7);
        assert!(parameters.validate().is_ok());
    }

    #[rstest]
    #[case(StlParameters{period: 4, ..Default::default()}, "STL period length must be an odd number of at least 3 (got 4)")]
    #[case(StlParameters{period: 1, ..Default::default()}, "STL period length must be an odd number of at least 3 (got 1)")]
    #[case(StlParameters{seasonal: 6, ..Default::default()}, "STL seasonal length must be an odd number of at least 3 (got 6)")]
    #[case(StlParameters{trend: Some(5), ..Default::default()}, "STL trend length (5) must be greater than the period (5)")]
    #[case(StlParameters{low_pass: Some(8), ..Default::default()}, "STL low-pass length must be an odd number of at least 3 (got 8)")]
    fn test_validate_invalid(#[case] parameters: StlParameters, #[case] msg: &str) {
        assert_error!(parameters.validate(), msg);
    }

    #[test]
    fn test_moving_average() {
        assert_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0], 3), [2.0, 3.0]);
    }

    #[test]
    fn test_loess_smooth_linear() {
        // Local linear fits reproduce a straight line
        let y: Vec<f64> = (0..12).map(|i| 3.0 - 0.5 * i as f64).collect();
        for len in [3, 7, 15] {
            let smoothed = loess_smooth(&y, len, None);
            for (s, y) in smoothed.iter().zip(&y) {
                assert_approx_eq!(f64, *s, *y, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_robustness_weights() {
        let y = [1.0, 1.0, 1.0, 1.0, 10.0];
        let fit = [1.0, 1.5, 0.5, 1.0, 1.0];
        let weights = robustness_weights(&y, &fit);
        assert_eq!(weights[0], 1.0);
        assert_eq!(weights[4], 0.0);
        assert!(weights[1] > 0.0 && weights[1] < 1.0);
    }

    #[rstest]
    #[case(20)]
    #[case(33)]
    fn test_decompose_exact(#[case] n: usize) {
        let series = seasonal_series(n);
        let decomposition = decompose(&series, &StlParameters::default()).unwrap();
        for t in 0..n {
            assert_approx_eq!(
                f64,
                decomposition.seasonal[t],
                PATTERN[t % PATTERN.len()],
                epsilon = 1e-8
            );
            assert_approx_eq!(
                f64,
                decomposition.trend[t],
                100.0 + 2.0 * t as f64,
                epsilon = 1e-8
            );
            assert_approx_eq!(f64, decomposition.residual[t], 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_decompose_robust_outlier() {
        let mut series = seasonal_series(30);
        series[17] += 50.0;
        let plain = decompose(&series, &StlParameters::default()).unwrap();
        let robust = decompose(
            &series,
            &StlParameters {
                robust: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(robust.residual[17] > 45.0);
        assert!(robust.residual[17] > plain.residual[17]);
    }

    /// A curved trend with a drifting seasonal pattern and irregular noise
    fn irregular_series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|t| {
                let t = t as f64;
                1000.0 + 15.0 * t + 0.4 * t * t
                    + (1.0 + 0.03 * t) * 40.0 * (t * 1.2566).sin()
                    + 7.0 * (t * 2.9).cos()
                    + 3.0 * (t * 0.37).sin()
            })
            .collect()
    }

    fn max_abs_difference(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max)
    }

    #[test]
    fn test_decompose_inner_passes() {
        let series = irregular_series(40);
        let parameters = StlParameters::default();
        let decomposition = decompose(&series, &parameters).unwrap();

        // A non-robust fit runs five passes of the inner loop and no robustness iterations
        assert_eq!(
            decomposition,
            decompose_with_iterations(&series, &parameters, 5, 0)
        );
        for passes in [2, 4, 6] {
            let other = decompose_with_iterations(&series, &parameters, passes, 0);
            assert!(max_abs_difference(&decomposition.seasonal, &other.seasonal) > 1e-9);
        }
    }

    #[test]
    fn test_decompose_robust_passes() {
        let series = irregular_series(40);
        let parameters = StlParameters {
            robust: true,
            ..Default::default()
        };
        let decomposition = decompose(&series, &parameters).unwrap();

        // A robust fit runs two inner passes in each of 15 robustness iterations
        assert_eq!(
            decomposition,
            decompose_with_iterations(&series, &parameters, 2, 15)
        );
        let other = decompose_with_iterations(&series, &parameters, 5, 15);
        assert!(max_abs_difference(&decomposition.seasonal, &other.seasonal) > 1e-9);
    }

    #[test]
    fn test_seasonally_adjust() {
        let series = seasonal_series(20);
        let adjusted = seasonally_adjust(&series, &StlParameters::default()).unwrap();
        for (t, value) in adjusted.iter().enumerate() {
            assert_approx_eq!(f64, *value, 100.0 + 2.0 * t as f64, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_decompose_insufficient_data() {
        assert_error!(
            decompose(&seasonal_series(9), &StlParameters::default()),
            "Insufficient data for seasonal decomposition: 9 observations, at least 10 required"
        );
    }

    #[test]
    fn test_decompose_non_finite() {
        let mut series = seasonal_series(10);
        series[3] = f64::NAN;
        assert_error!(
            decompose(&series, &StlParameters::default()),
            "Series for seasonal decomposition must contain only finite values"
        );
    }
}
