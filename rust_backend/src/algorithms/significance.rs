//! Detection significance of observed counts over an uncertain background.

/// Significance (in Gaussian sigmas) of `observed` Poisson counts over an
/// `expected` background known with Gaussian uncertainty `sigma`.
///
/// Uses the profile-likelihood result of Vianello (2018, ApJS 236, 17), which
/// reduces to the Poisson likelihood-ratio significance when `sigma` is zero. The
/// sign is negative when fewer counts than expected were observed.
pub fn poisson_gaussian_significance(observed: f64, expected: f64, sigma: f64) -> f64 {
    if !(expected > 0.0) || observed < 0.0 {
        return 0.0;
    }

    let sigma2 = sigma * sigma;
    let (profiled, background_term) = if sigma2 > 0.0 {
        let b0 = 0.5
            * ((expected * expected - 2.0 * sigma2 * (expected - 2.0 * observed) + sigma2 * sigma2)
                .sqrt()
                + expected
                - sigma2);
        (b0, (b0 - expected).powi(2) / (2.0 * sigma2))
    } else {
        (expected, 0.0)
    };

    let log_term = if observed > 0.0 {
        observed * (observed / profiled).ln()
    } else {
        0.0
    };
    let statistic = 2.0 * (log_term + background_term + profiled - observed);
    let magnitude = statistic.max(0.0).sqrt();

    if observed > expected {
        magnitude
    } else {
        -magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_no_excess_is_zero() {
        assert_abs_diff_eq!(poisson_gaussian_significance(10.0, 10.0, 0.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(poisson_gaussian_significance(10.0, 10.0, 2.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pure_poisson_limit() {
        // sqrt(2 * (20 ln 2 + 10 - 20))
        let expected = (2.0 * (20.0 * 2.0_f64.ln() - 10.0)).sqrt();
        assert_abs_diff_eq!(poisson_gaussian_significance(20.0, 10.0, 0.0), expected, epsilon = 1e-12);
        assert_abs_diff_eq!(
            poisson_gaussian_significance(20.0, 10.0, 1e-9),
            expected,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_background_uncertainty_reduces_significance() {
        let sharp = poisson_gaussian_significance(150.0, 100.0, 0.0);
        let broad = poisson_gaussian_significance(150.0, 100.0, 10.0);
        assert!(sharp > broad);
        assert!(broad > 0.0);
    }

    #[test]
    fn test_deficit_is_negative() {
        assert!(poisson_gaussian_significance(50.0, 100.0, 5.0) < 0.0);
        assert!(poisson_gaussian_significance(0.0, 5.0, 0.0) < 0.0);
    }

    #[test]
    fn test_degenerate_background() {
        assert_eq!(poisson_gaussian_significance(5.0, 0.0, 1.0), 0.0);
    }
}
