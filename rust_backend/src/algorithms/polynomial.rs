//! Background polynomial regression.
//!
//! A fit sample is one selected time interval: its total counts, the midpoints of
//! the native bins it contains, and its total exposure. The model expectation for
//! a sample is `exposure * mean(p(t_b))`, with `p` a polynomial rate in counts per
//! second. Time is normalized as `u = (t - t_ref) / t_scale` before fitting so the
//! normal matrix stays well conditioned for large mission-elapsed times.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::core::error::{TimeSeriesError, TimeSeriesResult};

/// Smallest model expectation used as a Poisson weight denominator
const MIN_EXPECTED_COUNTS: f64 = 1e-6;
const MAX_IRLS_ITERATIONS: usize = 100;
const IRLS_TOLERANCE: f64 = 1e-10;
const SINGULAR_PIVOT_RATIO: f64 = 1e-10;

/// Regression method used for the background polynomials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    /// Maximum Poisson likelihood, solved by iteratively reweighted least squares.
    #[default]
    PoissonLikelihood,
    /// Least squares with `1/max(n, 1)` weights.
    WeightedLeastSquares,
}

impl FitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMethod::PoissonLikelihood => "poisson_likelihood",
            FitMethod::WeightedLeastSquares => "weighted_least_squares",
        }
    }
}

impl fmt::Display for FitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitMethod {
    type Err = TimeSeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "poisson_likelihood" | "poisson" => Ok(FitMethod::PoissonLikelihood),
            "weighted_least_squares" | "wls" => Ok(FitMethod::WeightedLeastSquares),
            other => Err(TimeSeriesError::ConfigurationError(format!(
                "unknown fit method '{}'",
                other
            ))),
        }
    }
}

/// A fitted background rate polynomial with its coefficient covariance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolynomialRepr")]
pub struct Polynomial {
    /// Coefficients in the normalized time variable, lowest order first.
    coefficients: Vec<f64>,
    /// Row-major covariance of `coefficients`.
    covariance: Vec<Vec<f64>>,
    t_ref: f64,
    t_scale: f64,
}

#[derive(Deserialize)]
struct PolynomialRepr {
    coefficients: Vec<f64>,
    covariance: Vec<Vec<f64>>,
    t_ref: f64,
    t_scale: f64,
}

impl TryFrom<PolynomialRepr> for Polynomial {
    type Error = TimeSeriesError;

    fn try_from(repr: PolynomialRepr) -> Result<Self, Self::Error> {
        Polynomial::new(repr.coefficients, repr.covariance, repr.t_ref, repr.t_scale)
    }
}

impl Polynomial {
    /// Builds a polynomial from normalized-time coefficients.
    pub fn new(
        coefficients: Vec<f64>,
        covariance: Vec<Vec<f64>>,
        t_ref: f64,
        t_scale: f64,
    ) -> TimeSeriesResult<Self> {
        let n = coefficients.len();
        if n == 0 {
            return Err(TimeSeriesError::FitError(
                "a polynomial needs at least one coefficient".to_string(),
            ));
        }
        if covariance.len() != n || covariance.iter().any(|row| row.len() != n) {
            return Err(TimeSeriesError::FitError(format!(
                "covariance must be {}x{}",
                n, n
            )));
        }
        if !(t_scale.is_finite() && t_scale > 0.0) || !t_ref.is_finite() {
            return Err(TimeSeriesError::FitError(format!(
                "invalid time normalization ({}, {})",
                t_ref, t_scale
            )));
        }
        Ok(Self {
            coefficients,
            covariance,
            t_ref,
            t_scale,
        })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn covariance(&self) -> &[Vec<f64>] {
        &self.covariance
    }

    /// One-sigma error of each coefficient.
    pub fn errors(&self) -> Vec<f64> {
        (0..self.coefficients.len())
            .map(|i| self.covariance[i][i].max(0.0).sqrt())
            .collect()
    }

    fn normalize(&self, t: f64) -> f64 {
        (t - self.t_ref) / self.t_scale
    }

    /// Background rate (counts per second) at time `t`.
    pub fn evaluate(&self, t: f64) -> f64 {
        let u = self.normalize(t);
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * u + c)
    }

    /// Gradient of the definite integral over `[a, b]` with respect to the
    /// coefficients.
    fn integral_gradient(&self, a: f64, b: f64) -> Vec<f64> {
        let ua = self.normalize(a);
        let ub = self.normalize(b);
        (0..self.coefficients.len())
            .map(|k| {
                let p = (k + 1) as i32;
                self.t_scale * (ub.powi(p) - ua.powi(p)) / p as f64
            })
            .collect()
    }

    /// Expected background counts over `[a, b]`.
    pub fn integral(&self, a: f64, b: f64) -> f64 {
        self.integral_gradient(a, b)
            .iter()
            .zip(&self.coefficients)
            .map(|(g, c)| g * c)
            .sum()
    }

    /// Propagated standard error of [`Polynomial::integral`].
    pub fn integral_error(&self, a: f64, b: f64) -> f64 {
        let g = self.integral_gradient(a, b);
        let mut variance = 0.0;
        for (i, gi) in g.iter().enumerate() {
            for (j, gj) in g.iter().enumerate() {
                variance += gi * self.covariance[i][j] * gj;
            }
        }
        variance.max(0.0).sqrt()
    }
}

/// Fit a polynomial of the given order to per-interval background samples.
///
/// # Arguments
/// * `counts` - Total counts of each sample
/// * `midpoints` - Midpoints of the native bins inside each sample
/// * `order` - Polynomial order
/// * `exposures` - Total exposure of each sample in seconds
/// * `method` - Regression method
///
/// # Returns
/// The fitted polynomial and the fit statistic (chi-square for least squares,
/// Poisson deviance for the likelihood fit). Lower is better; differences between
/// nested orders are comparable to a chi-square with one degree of freedom.
pub fn polyfit(
    counts: &[f64],
    midpoints: &[Vec<f64>],
    order: usize,
    exposures: &[f64],
    method: FitMethod,
) -> TimeSeriesResult<(Polynomial, f64)> {
    let n_samples = counts.len();
    if midpoints.len() != n_samples || exposures.len() != n_samples {
        return Err(TimeSeriesError::FitError(format!(
            "got {} counts, {} midpoint groups and {} exposures",
            n_samples,
            midpoints.len(),
            exposures.len()
        )));
    }
    if n_samples < order + 1 {
        return Err(TimeSeriesError::FitError(format!(
            "order {} needs at least {} intervals, got {}",
            order,
            order + 1,
            n_samples
        )));
    }
    if midpoints.iter().any(Vec::is_empty) {
        return Err(TimeSeriesError::FitError(
            "every fit interval must contain at least one bin".to_string(),
        ));
    }
    if exposures.iter().any(|e| !(e.is_finite() && *e > 0.0)) {
        return Err(TimeSeriesError::FitError(
            "every fit interval must have positive exposure".to_string(),
        ));
    }

    let (t_ref, t_scale) = normalization(midpoints);
    let n_params = order + 1;

    let design = DMatrix::from_fn(n_samples, n_params, |j, k| {
        let mean_power = midpoints[j]
            .iter()
            .map(|t| ((t - t_ref) / t_scale).powi(k as i32))
            .sum::<f64>()
            / midpoints[j].len() as f64;
        exposures[j] * mean_power
    });
    let observed = DVector::from_column_slice(counts);

    let wls_weights = DVector::from_iterator(n_samples, counts.iter().map(|n| 1.0 / n.max(1.0)));
    let (mut beta, mut covariance) = solve_weighted(&design, &observed, &wls_weights)?;

    let statistic = match method {
        FitMethod::WeightedLeastSquares => {
            let expected = &design * &beta;
            observed
                .iter()
                .zip(expected.iter())
                .zip(wls_weights.iter())
                .map(|((n, mu), w)| w * (n - mu).powi(2))
                .sum()
        }
        FitMethod::PoissonLikelihood => {
            let (refined_beta, refined_cov, converged) =
                refine_poisson(&design, &observed, beta, covariance, MAX_IRLS_ITERATIONS)?;
            beta = refined_beta;
            covariance = refined_cov;
            if !converged {
                warn!(
                    "Poisson fit of order {} did not converge after {} iterations",
                    order, MAX_IRLS_ITERATIONS
                );
            }
            poisson_deviance(&observed, &(&design * &beta))
        }
    };

    if !statistic.is_finite() {
        return Err(TimeSeriesError::FitError(
            "fit statistic is not finite".to_string(),
        ));
    }

    let coefficients = beta.iter().copied().collect();
    let covariance = (0..n_params)
        .map(|i| (0..n_params).map(|j| covariance[(i, j)]).collect())
        .collect();

    Ok((Polynomial::new(coefficients, covariance, t_ref, t_scale)?, statistic))
}

/// Iteratively reweighted least squares with `1/mu` weights, starting from `beta`.
///
/// Returns the refined coefficients, their covariance and whether the coefficient
/// step fell below tolerance within `max_iterations`.
fn refine_poisson(
    design: &DMatrix<f64>,
    observed: &DVector<f64>,
    mut beta: DVector<f64>,
    mut covariance: DMatrix<f64>,
    max_iterations: usize,
) -> TimeSeriesResult<(DVector<f64>, DMatrix<f64>, bool)> {
    for iteration in 0..max_iterations {
        let expected = design * &beta;
        let weights = expected.map(|mu| 1.0 / mu.max(MIN_EXPECTED_COUNTS));
        let (next_beta, next_cov) = solve_weighted(design, observed, &weights)?;

        let step = (&next_beta - &beta).amax();
        beta = next_beta;
        covariance = next_cov;

        if step <= IRLS_TOLERANCE * (1.0 + beta.amax()) {
            debug!("IRLS converged after {} iterations", iteration + 1);
            return Ok((beta, covariance, true));
        }
    }
    Ok((beta, covariance, false))
}

fn normalization(midpoints: &[Vec<f64>]) -> (f64, f64) {
    let all = midpoints.iter().flatten();
    let count = midpoints.iter().map(Vec::len).sum::<usize>() as f64;
    let t_ref = all.clone().sum::<f64>() / count;
    let spread = all.fold(0.0_f64, |acc, t| acc.max((t - t_ref).abs()));
    let t_scale = if spread > 0.0 { spread } else { 1.0 };
    (t_ref, t_scale)
}

/// Solves the weighted normal equations, returning the coefficients and the
/// inverse of the normal matrix.
fn solve_weighted(
    design: &DMatrix<f64>,
    observed: &DVector<f64>,
    weights: &DVector<f64>,
) -> TimeSeriesResult<(DVector<f64>, DMatrix<f64>)> {
    let weighted_design = DMatrix::from_fn(design.nrows(), design.ncols(), |j, k| {
        design[(j, k)] * weights[j]
    });
    let normal = design.transpose() * &weighted_design;
    let rhs = weighted_design.transpose() * observed;

    let cholesky = normal.cholesky().ok_or_else(|| {
        TimeSeriesError::FitError(
            "normal matrix is singular; intervals do not constrain the polynomial".to_string(),
        )
    })?;

    let pivots = cholesky.l().diagonal();
    let largest = pivots.amax();
    if pivots.iter().any(|p| !(*p > largest * SINGULAR_PIVOT_RATIO)) {
        return Err(TimeSeriesError::FitError(
            "normal matrix is singular; intervals do not constrain the polynomial".to_string(),
        ));
    }

    let beta = cholesky.solve(&rhs);
    let covariance = cholesky.inverse();

    if beta.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
        return Err(TimeSeriesError::FitError(
            "regression produced non-finite coefficients".to_string(),
        ));
    }
    Ok((beta, covariance))
}

fn poisson_deviance(observed: &DVector<f64>, expected: &DVector<f64>) -> f64 {
    observed
        .iter()
        .zip(expected.iter())
        .map(|(n, mu)| {
            let mu = mu.max(MIN_EXPECTED_COUNTS);
            let log_term = if *n > 0.0 { n * (n / mu).ln() } else { 0.0 };
            2.0 * (mu - n + log_term)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn single_bin_midpoints(times: &[f64]) -> Vec<Vec<f64>> {
        times.iter().map(|t| vec![*t]).collect()
    }

    #[test]
    fn test_line_through_two_points() {
        for method in [FitMethod::PoissonLikelihood, FitMethod::WeightedLeastSquares] {
            let (poly, stat) = polyfit(
                &[5.0, 6.0],
                &single_bin_midpoints(&[0.5, 3.5]),
                1,
                &[1.0, 1.0],
                method,
            )
            .unwrap();

            assert_eq!(poly.degree(), 1);
            assert_abs_diff_eq!(poly.evaluate(0.5), 5.0, epsilon = 1e-9);
            assert_abs_diff_eq!(poly.evaluate(3.5), 6.0, epsilon = 1e-9);
            assert_abs_diff_eq!(poly.integral(1.0, 3.0), 11.0, epsilon = 1e-9);
            assert_abs_diff_eq!(stat, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_constant_fit_is_mean_rate() {
        let (poly, _) = polyfit(
            &[10.0, 10.0, 10.0, 10.0],
            &single_bin_midpoints(&[0.5, 1.5, 2.5, 3.5]),
            0,
            &[2.0, 2.0, 2.0, 2.0],
            FitMethod::PoissonLikelihood,
        )
        .unwrap();

        assert_abs_diff_eq!(poly.evaluate(100.0), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(poly.integral(0.0, 4.0), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_integral_error_grows_with_range() {
        let (poly, _) = polyfit(
            &[100.0, 120.0, 95.0, 130.0, 110.0],
            &single_bin_midpoints(&[0.5, 1.5, 2.5, 3.5, 4.5]),
            1,
            &[1.0; 5],
            FitMethod::PoissonLikelihood,
        )
        .unwrap();

        let short = poly.integral_error(1.0, 2.0);
        let long = poly.integral_error(1.0, 4.0);
        assert!(short > 0.0);
        assert!(long > short);
        assert_eq!(poly.integral_error(2.0, 2.0), 0.0);
        assert!(poly.errors().iter().all(|e| *e > 0.0));
    }

    #[test]
    fn test_multi_bin_samples_use_mean_rate() {
        // Two bins per interval at rate 3 counts/s, 2s exposure per interval
        let (poly, _) = polyfit(
            &[6.0, 6.0],
            &[vec![0.5, 1.5], vec![8.5, 9.5]],
            0,
            &[2.0, 2.0],
            FitMethod::WeightedLeastSquares,
        )
        .unwrap();
        assert_abs_diff_eq!(poly.evaluate(5.0), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_underdetermined_fit_is_rejected() {
        let result = polyfit(
            &[5.0],
            &single_bin_midpoints(&[0.5]),
            1,
            &[1.0],
            FitMethod::PoissonLikelihood,
        );
        assert!(matches!(result, Err(TimeSeriesError::FitError(_))));
    }

    #[test]
    fn test_degenerate_midpoints_are_rejected() {
        let result = polyfit(
            &[5.0, 6.0],
            &single_bin_midpoints(&[1.0, 1.0]),
            1,
            &[1.0, 1.0],
            FitMethod::WeightedLeastSquares,
        );
        assert!(matches!(result, Err(TimeSeriesError::FitError(_))));
    }

    #[test]
    fn test_zero_counts_fit() {
        let (poly, stat) = polyfit(
            &[0.0, 0.0, 0.0],
            &single_bin_midpoints(&[0.5, 1.5, 2.5]),
            0,
            &[1.0, 1.0, 1.0],
            FitMethod::PoissonLikelihood,
        )
        .unwrap();
        assert_abs_diff_eq!(poly.integral(0.0, 3.0), 0.0, epsilon = 1e-6);
        assert!(stat.is_finite());
    }

    #[test]
    fn test_irls_reports_convergence() {
        let counts = [100.0, 120.0, 95.0, 130.0, 110.0];
        let midpoints = single_bin_midpoints(&[0.5, 1.5, 2.5, 3.5, 4.5]);
        let design = DMatrix::from_fn(5, 2, |j, k| midpoints[j][0].powi(k as i32));
        let observed = DVector::from_column_slice(&counts);
        let wls_weights = observed.map(|n| 1.0 / n);
        let (beta, cov) = solve_weighted(&design, &observed, &wls_weights).unwrap();

        let (_, _, converged) =
            refine_poisson(&design, &observed, beta.clone(), cov.clone(), 1).unwrap();
        assert!(!converged);

        let (refined, _, converged) =
            refine_poisson(&design, &observed, beta, cov, MAX_IRLS_ITERATIONS).unwrap();
        assert!(converged);
        assert!(refined.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_fit_method_parsing() {
        assert_eq!("poisson".parse::<FitMethod>().unwrap(), FitMethod::PoissonLikelihood);
        assert_eq!(
            "Weighted_Least_Squares".parse::<FitMethod>().unwrap(),
            FitMethod::WeightedLeastSquares
        );
        assert!("bayes".parse::<FitMethod>().is_err());
        assert_eq!(FitMethod::default().to_string(), "poisson_likelihood");
    }
}
