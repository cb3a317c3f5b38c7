//! Ordinary least squares regression.
//!
//! The fit reports two flavours of goodness of fit, mirroring the two conventions that analysts
//! commonly compare: a "direct" centred R² (which can be negative for models without an intercept)
//! and a "statistical" adjusted R², which uses the uncentred R² when the model has no constant
//! term.
use anyhow::{Result, ensure};
use nalgebra::{DMatrix, DVector};

/// The result of an ordinary least squares fit
#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    /// Coefficients on the regressors, in the order they were supplied
    pub coefficients: Vec<f64>,
    /// The fitted intercept, if one was requested
    pub intercept: Option<f64>,
    /// Centred coefficient of determination, `1 - SSR / Σ(y - ȳ)²`
    pub r_squared: f64,
    /// Adjusted R², centred if the model has a constant term and uncentred otherwise
    pub adjusted_r_squared: f64,
    /// Whether the model has a constant term, either fitted or as a constant regressor
    pub has_constant: bool,
    /// Number of observations used in the fit
    pub n_obs: usize,
    /// Residual degrees of freedom
    pub df_resid: usize,
}

/// Whether any regressor is a non-zero constant and therefore acts as an intercept
fn has_implicit_constant(regressors: &[&[f64]]) -> bool {
    regressors.iter().any(|column| {
        column.first().is_some_and(|&first| {
            first != 0.0 && column.iter().all(|&value| value == first)
        })
    })
}

/// Fit `y = [intercept +] Σ β_j x_j` by ordinary least squares.
///
/// # Arguments
///
/// * `y` - The dependent variable
/// * `regressors` - The independent variables, one slice per column
/// * `intercept` - Whether to fit an intercept
///
/// # Returns
///
/// The fit, or an error if the inputs are not finite, have mismatched lengths, have fewer
/// observations than parameters or the design matrix is rank-deficient.
pub fn fit_ols(y: &[f64], regressors: &[&[f64]], intercept: bool) -> Result<OlsFit> {
    let n = y.len();
    let p = regressors.len() + usize::from(intercept);
    ensure!(p > 0, "Regression needs at least one parameter");
    ensure!(
        regressors.iter().all(|column| column.len() == n),
        "All regression variables must have {n} observations"
    );
    ensure!(
        n >= p,
        "Insufficient observations for regression: {n} observations for {p} parameters"
    );
    ensure!(
        y.iter()
            .chain(regressors.iter().flat_map(|column| column.iter()))
            .all(|value| value.is_finite()),
        "Regression variables must contain only finite values"
    );

    let offset = usize::from(intercept);
    let x = DMatrix::from_fn(n, p, |i, j| {
        if intercept && j == 0 {
            1.0
        } else {
            regressors[j - offset][i]
        }
    });
    let y_vec = DVector::from_column_slice(y);

    let svd = x.clone().svd(true, true);
    let max_singular_value = svd.singular_values.max();
    let tolerance = f64::EPSILON * n.max(p) as f64 * max_singular_value;
    let rank = svd.rank(tolerance);
    ensure!(
        rank == p,
        "Design matrix is rank-deficient (rank {rank} for {p} parameters)"
    );
    let beta = svd
        .solve(&y_vec, tolerance)
        .map_err(|err| anyhow::anyhow!("Failed to solve least squares problem: {err}"))?;

    let residuals = &y_vec - &x * &beta;
    let ssr = residuals.norm_squared();
    let mean = y_vec.mean();
    let centred_tss: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let uncentred_tss = y_vec.norm_squared();

    let r_squared = if centred_tss == 0.0 {
        // A constant dependent variable: perfect fit scores 1, anything else 0
        if ssr == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ssr / centred_tss
    };

    let has_constant = intercept || has_implicit_constant(regressors);
    let (base_r_squared, k_constant) = if has_constant {
        (r_squared, 1)
    } else {
        (1.0 - ssr / uncentred_tss, 0)
    };
    let df_resid = n - rank;
    let adjusted_r_squared = if df_resid == 0 {
        f64::NAN
    } else {
        1.0 - (n - k_constant) as f64 / df_resid as f64 * (1.0 - base_r_squared)
    };

    let mut coefficients: Vec<f64> = beta.iter().copied().collect();
    let intercept = intercept.then(|| coefficients.remove(0));

    Ok(OlsFit {
        coefficients,
        intercept,
        r_squared,
        adjusted_r_squared,
        has_constant,
        n_obs: n,
        df_resid,
    })
}
