//! Integration tests for background fitting and active-interval selection.
//!
//! These tests ensure that:
//! 1. Background polynomials follow the counts of the background intervals
//! 2. Active selections aggregate counts, exposure and dead time consistently
//! 3. Failed calls leave previously derived state untouched
//! 4. Background errors propagate as documented

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use spectral_timeseries::algorithms::FitMethod;
use spectral_timeseries::services::InstrumentInfo;
use spectral_timeseries::{
    BackgroundFitConfig, BinnedSpectrumSeries, BinnedSpectrumSet, TimeIntervalSet,
    TimeSeriesError, TrueIntervalSelection,
};

// ==================== Helper Functions ====================

fn reference_series() -> BinnedSpectrumSeries {
    let bins = TimeIntervalSet::from_strings(&["0-1", "1-2", "2-3", "3-4"]).unwrap();
    let set = BinnedSpectrumSet::from_arrays(
        &bins,
        vec![vec![5.0, 1.0], vec![4.0, 1.0], vec![3.0, 1.0], vec![6.0, 1.0]],
        &[1.0; 4],
        None,
    )
    .unwrap();
    BinnedSpectrumSeries::new(Arc::new(set))
}

/// 100 one-second bins with a linearly rising background plus a burst in 40-50 s.
fn burst_series() -> BinnedSpectrumSeries {
    let starts: Vec<f64> = (0..100).map(f64::from).collect();
    let stops: Vec<f64> = starts.iter().map(|s| s + 1.0).collect();
    let bins = TimeIntervalSet::from_starts_and_stops(&starts, &stops).unwrap();

    let counts = starts
        .iter()
        .map(|t| {
            let mid = t + 0.5;
            let background = 200.0 + 2.0 * mid;
            let burst = if (40.0..50.0).contains(t) { 500.0 } else { 0.0 };
            vec![(background + burst).round(), (0.5 * background).round(), 80.0]
        })
        .collect();

    let set = BinnedSpectrumSet::from_arrays(&bins, counts, &vec![1.0; 100], None).unwrap();
    BinnedSpectrumSeries::new(Arc::new(set)).with_instrument(InstrumentInfo {
        mission: Some("TestMission".to_string()),
        instrument: Some("Detector-0".to_string()),
        ..Default::default()
    })
}

fn linear() -> BackgroundFitConfig {
    BackgroundFitConfig::default().with_polynomial_order(1)
}

// ==================== Reference Scenario ====================

#[test]
fn test_reference_scenario() {
    let mut series = reference_series();

    series.set_background_interval(&["0-1,3-4"], &linear()).unwrap();
    series.set_active_time_intervals(&["1-3"]).unwrap();

    let ts = series.time_series();
    assert_eq!(ts.counts().unwrap(), &[7.0, 2.0]);
    assert_eq!(ts.exposure().unwrap().value(), 2.0);
    assert_eq!(ts.active_dead_time().unwrap().value(), 0.0);

    // Line through (0.5, 5) and (3.5, 6) integrated over [1, 3]
    let polys = ts.polynomials().unwrap();
    assert_abs_diff_eq!(polys[0].evaluate(0.5), 5.0, epsilon = 1e-9);
    assert_abs_diff_eq!(polys[0].evaluate(3.5), 6.0, epsilon = 1e-9);
    assert_abs_diff_eq!(ts.background_counts().unwrap()[0], 11.0, epsilon = 1e-9);

    // Channel 1 is flat at one count per second
    assert_abs_diff_eq!(polys[1].evaluate(2.0), 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(ts.background_counts().unwrap()[1], 2.0, epsilon = 1e-9);
}

#[test]
fn test_out_of_range_selection_keeps_previous_state() {
    let mut series = reference_series();
    series.set_active_time_intervals(&["1-3"]).unwrap();
    let before = series.time_series().active_selection().cloned();

    let err = series.set_active_time_intervals(&["5-6"]).unwrap_err();
    assert!(matches!(err, TimeSeriesError::OutOfRangeError(_)));
    assert_eq!(series.time_series().active_selection().cloned(), before);
}

#[test]
fn test_single_interval_cannot_fit_a_line() {
    let mut series = reference_series();
    let err = series.fit_polynomials(&["0-1"], &linear()).unwrap_err();
    assert!(matches!(err, TimeSeriesError::FitError(_)));
    assert!(!series.time_series().poly_fit_exists());
}

#[test]
fn test_malformed_selection_is_a_format_error() {
    let mut series = reference_series();
    assert!(matches!(
        series.set_active_time_intervals(&["1-3", "three-four"]),
        Err(TimeSeriesError::FormatError(_))
    ));
    assert!(!series.time_series().time_selection_exists());
}

// ==================== Larger Data ====================

#[test]
fn test_burst_background_recovers_trend() {
    let mut series = burst_series();
    series
        .set_background_interval(&["0-30", "60-100"], &BackgroundFitConfig::default())
        .unwrap();
    series.set_active_time_intervals(&["40-50"]).unwrap();

    let ts = series.time_series();
    assert_eq!(ts.optimal_polynomial_grade().unwrap(), 1);

    // Expected background in 40-50: integral of 200 + 2t
    let background = ts.background_counts().unwrap();
    assert!((background[0] - 2900.0).abs() < 15.0, "got {}", background[0]);
    assert!((background[1] - 1450.0).abs() < 10.0, "got {}", background[1]);
    assert!((background[2] - 800.0).abs() < 1e-6, "got {}", background[2]);

    // Burst of 500 counts/s over 10 s in channel 0 only
    let excess = ts.counts().unwrap()[0] - background[0];
    assert!((excess - 5000.0).abs() < 20.0, "got {}", excess);
    assert!(ts.significance().unwrap() > 20.0);

    let per_channel = ts.significance_per_channel().unwrap();
    assert!(per_channel[0] > 20.0);
    assert!(per_channel[2].abs() < 1.0);
}

#[test]
fn test_fit_methods_agree_on_clean_data() {
    let mut poisson = burst_series();
    let mut wls = burst_series();
    let base = linear();

    poisson
        .set_background_interval(&["0-30", "60-100"], &base.clone().with_fit_method(FitMethod::PoissonLikelihood))
        .unwrap();
    wls.set_background_interval(&["0-30", "60-100"], &base.with_fit_method(FitMethod::WeightedLeastSquares))
        .unwrap();
    poisson.set_active_time_intervals(&["40-50"]).unwrap();
    wls.set_active_time_intervals(&["40-50"]).unwrap();

    let a = poisson.time_series().background_counts().unwrap()[0];
    let b = wls.time_series().background_counts().unwrap()[0];
    assert!((a - b).abs() < 5.0, "{} vs {}", a, b);
    assert_eq!(
        wls.time_series().fit_method_info().unwrap().fit_method,
        FitMethod::WeightedLeastSquares
    );
}

#[test]
fn test_background_error_grows_with_active_intervals() {
    let mut series = burst_series();
    series
        .set_background_interval(&["0-30", "60-100"], &linear())
        .unwrap();

    series.set_active_time_intervals(&["40-45"]).unwrap();
    let one = series.time_series().background_count_errors().unwrap().to_vec();

    series.set_active_time_intervals(&["40-45", "70-80"]).unwrap();
    let two = series.time_series().background_count_errors().unwrap().to_vec();

    for (a, b) in one.iter().zip(&two) {
        assert!(b >= a, "{} < {}", b, a);
    }
}

#[test]
fn test_exposure_plus_dead_time_is_selected_duration() {
    let starts: Vec<f64> = (0..20).map(|i| f64::from(i) * 0.5).collect();
    let stops: Vec<f64> = starts.iter().map(|s| s + 0.5).collect();
    let bins = TimeIntervalSet::from_starts_and_stops(&starts, &stops).unwrap();
    let exposures: Vec<f64> = (0..20).map(|i| 0.45 - 0.01 * f64::from(i % 3)).collect();
    let set = BinnedSpectrumSet::from_arrays(&bins, vec![vec![3.0]; 20], &exposures, None).unwrap();
    let mut series = BinnedSpectrumSeries::new(Arc::new(set));

    series.set_active_time_intervals(&["0.2-2.7", "4-6.1", "5.5-7"]).unwrap();

    let ts = series.time_series();
    let duration = ts.time_intervals().unwrap().total_duration();
    let exposure = ts.exposure().unwrap().value();
    let dead_time = ts.active_dead_time().unwrap().value();
    assert_abs_diff_eq!(exposure + dead_time, duration, epsilon = 1e-9);
    assert!(dead_time > 0.0);
}

#[test]
fn test_counts_additive_over_partition() {
    let series = burst_series();
    let whole = series.counts_over_interval(0.0, 100.0);
    let parts = series.counts_over_interval(0.0, 37.0)
        + series.counts_over_interval(37.0, 62.0)
        + series.counts_over_interval(62.0, 100.0);
    assert_eq!(whole, parts);
    assert_eq!(series.exposure_over_interval(0.0, 100.0), 100.0);
}

#[test]
fn test_information_summary() {
    let mut series = burst_series();
    series.set_active_time_intervals(&["40-50"]).unwrap();
    series.set_background_interval(&["0-30", "60-100"], &linear()).unwrap();

    let info = series.time_series().information();
    assert_eq!(info.mission.as_deref(), Some("TestMission"));
    assert_eq!(info.active_intervals.as_deref(), Some("40-50"));
    assert_eq!(info.background_intervals.as_deref(), Some("0-30,60-100"));
    assert_eq!(info.polynomial_grade, Some(1));
    assert_eq!(info.n_channels, 3);

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["fit_method"], "poisson_likelihood");
}
