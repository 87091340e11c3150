//! Bookkeeping shared by every kind of time series.
//!
//! A [`TimeSeries`] carries two independent pieces of derived state:
//!
//! - the background fit: per-channel polynomials fitted over the background
//!   intervals ([`PolyFitState`])
//! - the active selection: counts, exposure and dead time aggregated over the
//!   active (source) intervals, plus the background expected there when a fit
//!   existed at selection time ([`ActiveSelection`])
//!
//! Each is replaced as a whole on success and left untouched on failure.

use std::ops::Range;

use qtty::Seconds;
use serde::{Deserialize, Serialize};

use crate::algorithms::polynomial::{FitMethod, Polynomial};
use crate::algorithms::significance::poisson_gaussian_significance;
use crate::core::domain::Quality;
use crate::core::error::{TimeSeriesError, TimeSeriesResult};
use crate::time::intervals::TimeIntervalSet;

/// Operations whose implementation depends on how the underlying data is stored.
pub trait TrueIntervalSelection {
    /// Mask over the native bins, true for every bin lying within `[start, stop]`.
    fn select_bins(&self, start: f64, stop: f64) -> Vec<bool>;

    /// Snap requested intervals onto the native bin boundaries.
    fn adjust_to_true_intervals(
        &self,
        intervals: &TimeIntervalSet,
    ) -> TimeSeriesResult<TimeIntervalSet>;

    /// Total counts (all channels) of the bins within `[start, stop]`.
    fn counts_over_interval(&self, start: f64, stop: f64) -> f64;

    /// Total exposure of the bins within `[start, stop]`.
    fn exposure_over_interval(&self, start: f64, stop: f64) -> f64;
}

/// Optional instrument metadata carried alongside the series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub mission: Option<String>,
    pub instrument: Option<String>,
    pub rsp_file: Option<String>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitMethodInfo {
    pub bin_type: String,
    pub fit_method: FitMethod,
}

/// Result of a background fit.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyFitState {
    method_info: FitMethodInfo,
    grade: usize,
    intervals: TimeIntervalSet,
    polynomials: Vec<Polynomial>,
}

impl PolyFitState {
    pub(crate) fn new(
        method_info: FitMethodInfo,
        grade: usize,
        intervals: TimeIntervalSet,
        polynomials: Vec<Polynomial>,
    ) -> Self {
        Self {
            method_info,
            grade,
            intervals,
            polynomials,
        }
    }

    pub fn method_info(&self) -> &FitMethodInfo {
        &self.method_info
    }

    pub fn grade(&self) -> usize {
        self.grade
    }

    /// Background intervals as snapped to the native bins.
    pub fn intervals(&self) -> &TimeIntervalSet {
        &self.intervals
    }

    pub fn polynomials(&self) -> &[Polynomial] {
        &self.polynomials
    }
}

/// Expected background counts and their propagated errors, one entry per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundEstimate {
    pub counts: Vec<f64>,
    pub errors: Vec<f64>,
}

impl BackgroundEstimate {
    /// Integrate every channel polynomial over every interval.
    ///
    /// Counts add linearly; errors add in quadrature.
    pub fn over_intervals(polynomials: &[Polynomial], intervals: &TimeIntervalSet) -> Self {
        let (counts, errors) = polynomials
            .iter()
            .map(|poly| {
                let (total, variance) =
                    intervals.iter().fold((0.0, 0.0), |(total, variance), interval| {
                        (
                            total + poly.integral(interval.start(), interval.stop()),
                            variance + poly.integral_error(interval.start(), interval.stop()).powi(2),
                        )
                    });
                (total, variance.sqrt())
            })
            .unzip();
        Self { counts, errors }
    }
}

/// Aggregates over the active (source) intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSelection {
    intervals: TimeIntervalSet,
    counts: Vec<f64>,
    exposure: f64,
    dead_time: f64,
    background: Option<BackgroundEstimate>,
}

impl ActiveSelection {
    pub(crate) fn new(
        intervals: TimeIntervalSet,
        counts: Vec<f64>,
        exposure: f64,
        dead_time: f64,
        background: Option<BackgroundEstimate>,
    ) -> Self {
        Self {
            intervals,
            counts,
            exposure,
            dead_time,
            background,
        }
    }

    /// Active intervals as snapped to the native bins.
    pub fn intervals(&self) -> &TimeIntervalSet {
        &self.intervals
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn exposure(&self) -> f64 {
        self.exposure
    }

    pub fn dead_time(&self) -> f64 {
        self.dead_time
    }

    pub fn background(&self) -> Option<&BackgroundEstimate> {
        self.background.as_ref()
    }
}

/// Fitted coefficients of one channel, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPolynomialSummary {
    pub channel: usize,
    pub coefficients: Vec<f64>,
    pub errors: Vec<f64>,
}

/// Serializable overview of a series and its current selections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesInformation {
    pub mission: Option<String>,
    pub instrument: Option<String>,
    pub rsp_file: Option<String>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub n_channels: usize,
    pub first_channel: usize,
    pub start: f64,
    pub stop: f64,
    pub active_intervals: Option<String>,
    pub active_exposure: Option<f64>,
    pub active_dead_time: Option<f64>,
    pub background_intervals: Option<String>,
    pub polynomial_grade: Option<usize>,
    pub fit_method: Option<FitMethod>,
}

/// Shared state of a time series over a fixed channel layout.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    start: f64,
    stop: f64,
    n_channels: usize,
    first_channel: usize,
    native_quality: Quality,
    instrument: InstrumentInfo,
    poly_fit: Option<PolyFitState>,
    active: Option<ActiveSelection>,
}

impl TimeSeries {
    pub fn new(
        start: f64,
        stop: f64,
        n_channels: usize,
        native_quality: Quality,
        first_channel: usize,
        instrument: InstrumentInfo,
    ) -> Self {
        Self {
            start,
            stop,
            n_channels,
            first_channel,
            native_quality,
            instrument,
            poly_fit: None,
            active: None,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn first_channel(&self) -> usize {
        self.first_channel
    }

    /// Channel numbers, starting at `first_channel`.
    pub fn channels(&self) -> Range<usize> {
        self.first_channel..self.first_channel + self.n_channels
    }

    pub fn native_quality(&self) -> Quality {
        self.native_quality
    }

    pub fn instrument(&self) -> &InstrumentInfo {
        &self.instrument
    }

    pub(crate) fn set_first_channel(&mut self, first_channel: usize) {
        self.first_channel = first_channel;
    }

    pub(crate) fn set_instrument(&mut self, instrument: InstrumentInfo) {
        self.instrument = instrument;
    }

    pub fn poly_fit_exists(&self) -> bool {
        self.poly_fit.is_some()
    }

    pub fn time_selection_exists(&self) -> bool {
        self.active.is_some()
    }

    pub fn poly_fit(&self) -> Option<&PolyFitState> {
        self.poly_fit.as_ref()
    }

    pub fn active_selection(&self) -> Option<&ActiveSelection> {
        self.active.as_ref()
    }

    fn require_poly_fit(&self) -> TimeSeriesResult<&PolyFitState> {
        self.poly_fit.as_ref().ok_or_else(|| {
            TimeSeriesError::PreconditionError(
                "a polynomial fit to the channels does not exist".to_string(),
            )
        })
    }

    fn require_active(&self) -> TimeSeriesResult<&ActiveSelection> {
        self.active.as_ref().ok_or_else(|| {
            TimeSeriesError::PreconditionError("no active time interval selected".to_string())
        })
    }

    fn require_background(&self) -> TimeSeriesResult<&BackgroundEstimate> {
        self.require_active()?.background().ok_or_else(|| {
            TimeSeriesError::PreconditionError(
                "no background polynomial fit existed for the active selection".to_string(),
            )
        })
    }

    pub fn polynomials(&self) -> TimeSeriesResult<&[Polynomial]> {
        Ok(self.require_poly_fit()?.polynomials())
    }

    pub fn poly_intervals(&self) -> TimeSeriesResult<&TimeIntervalSet> {
        Ok(self.require_poly_fit()?.intervals())
    }

    pub fn optimal_polynomial_grade(&self) -> TimeSeriesResult<usize> {
        Ok(self.require_poly_fit()?.grade())
    }

    pub fn fit_method_info(&self) -> TimeSeriesResult<&FitMethodInfo> {
        Ok(self.require_poly_fit()?.method_info())
    }

    /// Active intervals as snapped to the native bins.
    pub fn time_intervals(&self) -> TimeSeriesResult<&TimeIntervalSet> {
        Ok(self.require_active()?.intervals())
    }

    /// Per-channel counts over the active intervals.
    pub fn counts(&self) -> TimeSeriesResult<&[f64]> {
        Ok(self.require_active()?.counts())
    }

    pub fn exposure(&self) -> TimeSeriesResult<Seconds> {
        Ok(Seconds::new(self.require_active()?.exposure()))
    }

    pub fn active_dead_time(&self) -> TimeSeriesResult<Seconds> {
        Ok(Seconds::new(self.require_active()?.dead_time()))
    }

    /// Expected background counts per channel over the active intervals.
    pub fn background_counts(&self) -> TimeSeriesResult<&[f64]> {
        Ok(&self.require_background()?.counts)
    }

    pub fn background_count_errors(&self) -> TimeSeriesResult<&[f64]> {
        Ok(&self.require_background()?.errors)
    }

    /// Significance of the total active counts over the total expected background.
    pub fn significance(&self) -> TimeSeriesResult<f64> {
        let observed: f64 = self.counts()?.iter().sum();
        let background = self.require_background()?;
        let expected: f64 = background.counts.iter().sum();
        let sigma = background.errors.iter().map(|e| e * e).sum::<f64>().sqrt();
        Ok(poisson_gaussian_significance(observed, expected, sigma))
    }

    pub fn significance_per_channel(&self) -> TimeSeriesResult<Vec<f64>> {
        let counts = self.counts()?;
        let background = self.require_background()?;
        Ok(counts
            .iter()
            .zip(&background.counts)
            .zip(&background.errors)
            .map(|((o, b), s)| poisson_gaussian_significance(*o, *b, *s))
            .collect())
    }

    /// Coefficients and coefficient errors of every channel polynomial.
    pub fn poly_info(&self) -> TimeSeriesResult<Vec<ChannelPolynomialSummary>> {
        Ok(self
            .polynomials()?
            .iter()
            .zip(self.channels())
            .map(|(poly, channel)| ChannelPolynomialSummary {
                channel,
                coefficients: poly.coefficients().to_vec(),
                errors: poly.errors(),
            })
            .collect())
    }

    pub fn information(&self) -> SeriesInformation {
        SeriesInformation {
            mission: self.instrument.mission.clone(),
            instrument: self.instrument.instrument.clone(),
            rsp_file: self.instrument.rsp_file.clone(),
            ra: self.instrument.ra,
            dec: self.instrument.dec,
            n_channels: self.n_channels,
            first_channel: self.first_channel,
            start: self.start,
            stop: self.stop,
            active_intervals: self.active.as_ref().map(|a| a.intervals().to_string()),
            active_exposure: self.active.as_ref().map(ActiveSelection::exposure),
            active_dead_time: self.active.as_ref().map(ActiveSelection::dead_time),
            background_intervals: self.poly_fit.as_ref().map(|p| p.intervals().to_string()),
            polynomial_grade: self.poly_fit.as_ref().map(PolyFitState::grade),
            fit_method: self.poly_fit.as_ref().map(|p| p.method_info().fit_method),
        }
    }

    pub(crate) fn replace_poly_fit(&mut self, state: PolyFitState) {
        self.poly_fit = Some(state);
    }

    pub(crate) fn replace_active_selection(&mut self, selection: ActiveSelection) {
        self.active = Some(selection);
    }

    /// Recompute the background of the current active selection from the current fit.
    pub(crate) fn refresh_active_background(&mut self) {
        if let (Some(active), Some(fit)) = (self.active.as_mut(), self.poly_fit.as_ref()) {
            active.background = Some(BackgroundEstimate::over_intervals(
                fit.polynomials(),
                &active.intervals,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::TimeInterval;

    fn flat_polynomial(rate: f64, variance: f64) -> Polynomial {
        Polynomial::new(vec![rate], vec![vec![variance]], 0.0, 1.0).unwrap()
    }

    fn series() -> TimeSeries {
        TimeSeries::new(0.0, 10.0, 2, Quality::Good, 1, InstrumentInfo::default())
    }

    #[test]
    fn test_queries_before_any_state() {
        let ts = series();
        assert!(!ts.poly_fit_exists());
        assert!(!ts.time_selection_exists());
        assert!(matches!(ts.polynomials(), Err(TimeSeriesError::PreconditionError(_))));
        assert!(matches!(ts.counts(), Err(TimeSeriesError::PreconditionError(_))));
        assert!(matches!(ts.background_counts(), Err(TimeSeriesError::PreconditionError(_))));
        assert!(ts.significance().is_err());
        assert_eq!(ts.channels(), 1..3);
    }

    #[test]
    fn test_background_estimate_adds_errors_in_quadrature() {
        let polys = vec![flat_polynomial(2.0, 0.25)];
        let intervals: TimeIntervalSet = [(0.0, 1.0), (5.0, 7.0)]
            .iter()
            .map(|(a, b)| TimeInterval::new(*a, *b).unwrap())
            .collect();

        let estimate = BackgroundEstimate::over_intervals(&polys, &intervals);

        assert_eq!(estimate.counts, vec![6.0]);
        // errors per interval are 0.5 and 1.0
        assert!((estimate.errors[0] - (0.25_f64 + 1.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_refresh_uses_current_fit() {
        let mut ts = series();
        let intervals = TimeIntervalSet::new(vec![TimeInterval::new(0.0, 2.0).unwrap()]);
        ts.replace_active_selection(ActiveSelection::new(intervals.clone(), vec![4.0, 6.0], 2.0, 0.0, None));
        assert!(ts.background_counts().is_err());

        ts.replace_poly_fit(PolyFitState::new(
            FitMethodInfo {
                bin_type: "Binned".to_string(),
                fit_method: FitMethod::PoissonLikelihood,
            },
            0,
            intervals,
            vec![flat_polynomial(1.0, 0.0), flat_polynomial(3.0, 0.0)],
        ));
        ts.refresh_active_background();

        assert_eq!(ts.background_counts().unwrap(), &[2.0, 6.0]);
        assert_eq!(ts.exposure().unwrap().value(), 2.0);
        assert_eq!(ts.significance_per_channel().unwrap()[1], 0.0);

        let info = ts.poly_info().unwrap();
        assert_eq!(info[1].channel, 2);
        assert_eq!(info[1].coefficients, vec![3.0]);

        let summary = ts.information();
        assert_eq!(summary.active_intervals.as_deref(), Some("0-2"));
        assert_eq!(summary.polynomial_grade, Some(0));
    }
}
