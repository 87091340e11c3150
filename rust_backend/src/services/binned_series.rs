//! Time series over pre-binned spectra.
//!
//! Because the data are already binned, every user selection is snapped onto the
//! native bin boundaries before counts and exposure are aggregated. Background
//! polynomials are fitted per channel over the summed counts of each background
//! interval, with one polynomial grade shared by all channels.

use std::sync::Arc;

use log::{info, warn};

use super::progress::{LogProgress, ProgressSink};
use super::time_series::{
    ActiveSelection, BackgroundEstimate, FitMethodInfo, InstrumentInfo, PolyFitState,
    TimeSeries, TrueIntervalSelection,
};
use crate::algorithms::grade::determine_optimal_grade;
use crate::algorithms::polynomial::polyfit;
use crate::config::BackgroundFitConfig;
use crate::core::domain::BinnedSpectrumSet;
use crate::core::error::{TimeSeriesError, TimeSeriesResult};
use crate::time::intervals::TimeIntervalSet;

const BIN_TYPE: &str = "Binned";

/// Background samples aggregated over the selected background intervals.
struct FitSamples {
    /// Per-interval counts, one vector of `n_channels` entries per interval.
    channel_counts: Vec<Vec<f64>>,
    exposures: Vec<f64>,
    midpoints: Vec<Vec<f64>>,
}

/// Active-interval selection and background fitting over a [`BinnedSpectrumSet`].
///
/// The spectrum set is shared read-only; several series may view the same set.
/// Mutating calls on one series must be serialized by the caller.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use spectral_timeseries::config::BackgroundFitConfig;
/// use spectral_timeseries::core::domain::BinnedSpectrumSet;
/// use spectral_timeseries::services::BinnedSpectrumSeries;
/// use spectral_timeseries::time::TimeIntervalSet;
///
/// let bins = TimeIntervalSet::from_strings(&["0-1,1-2,2-3,3-4"]).unwrap();
/// let set = BinnedSpectrumSet::from_arrays(
///     &bins,
///     vec![vec![5.0, 1.0], vec![4.0, 1.0], vec![3.0, 1.0], vec![6.0, 1.0]],
///     &[1.0; 4],
///     None,
/// )
/// .unwrap();
///
/// let mut series = BinnedSpectrumSeries::new(Arc::new(set));
/// let config = BackgroundFitConfig::default().with_polynomial_order(1);
/// series.set_background_interval(&["0-1,3-4"], &config).unwrap();
/// series.set_active_time_intervals(&["1-3"]).unwrap();
///
/// assert_eq!(series.time_series().counts().unwrap(), &[7.0, 2.0]);
/// assert!((series.time_series().background_counts().unwrap()[0] - 11.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct BinnedSpectrumSeries {
    series: TimeSeries,
    spectra: Arc<BinnedSpectrumSet>,
}

impl BinnedSpectrumSeries {
    /// Creates a series over `spectra` with channels numbered from 1.
    pub fn new(spectra: Arc<BinnedSpectrumSet>) -> Self {
        let bins = spectra.time_intervals();
        let native_quality = spectra
            .get(0)
            .map(|spectrum| spectrum.quality)
            .unwrap_or_default();
        let series = TimeSeries::new(
            bins.absolute_start().unwrap_or(0.0),
            bins.absolute_stop().unwrap_or(0.0),
            spectra.n_channels(),
            native_quality,
            1,
            InstrumentInfo::default(),
        );
        Self { series, spectra }
    }

    pub fn with_first_channel(mut self, first_channel: usize) -> Self {
        self.series.set_first_channel(first_channel);
        self
    }

    pub fn with_instrument(mut self, instrument: InstrumentInfo) -> Self {
        self.series.set_instrument(instrument);
        self
    }

    /// The shared bookkeeping state and its accessors.
    pub fn time_series(&self) -> &TimeSeries {
        &self.series
    }

    pub(crate) fn time_series_mut(&mut self) -> &mut TimeSeries {
        &mut self.series
    }

    pub fn binned_spectrum_set(&self) -> &Arc<BinnedSpectrumSet> {
        &self.spectra
    }

    /// The native bins.
    pub fn bins(&self) -> &TimeIntervalSet {
        self.spectra.time_intervals()
    }

    /// Per-channel counts of the bins within `[start, stop]`.
    pub fn channel_counts_over_interval(&self, start: f64, stop: f64) -> Vec<f64> {
        self.sum_channel_counts(&self.select_bins(start, stop))
    }

    fn sum_channel_counts(&self, mask: &[bool]) -> Vec<f64> {
        let mut totals = vec![0.0; self.spectra.n_channels()];
        for (spectrum, _) in self.spectra.iter().zip(mask).filter(|(_, selected)| **selected) {
            for (total, count) in totals.iter_mut().zip(&spectrum.counts) {
                *total += count;
            }
        }
        totals
    }

    fn sum_exposure(&self, mask: &[bool]) -> f64 {
        self.spectra
            .iter()
            .zip(mask)
            .filter(|(_, selected)| **selected)
            .map(|(spectrum, _)| spectrum.exposure)
            .sum()
    }

    /// Fit the background polynomials over `fit_intervals` and refresh the
    /// background of the current active selection, if any.
    pub fn set_background_interval<S: AsRef<str>>(
        &mut self,
        fit_intervals: &[S],
        config: &BackgroundFitConfig,
    ) -> TimeSeriesResult<()> {
        self.fit_polynomials(fit_intervals, config)?;
        self.series.refresh_active_background();
        Ok(())
    }

    /// Fit one background polynomial per channel over the given intervals.
    ///
    /// The previous fit is replaced only if the new one succeeds. The active
    /// selection is not touched; use [`Self::set_background_interval`] to also
    /// refresh its background estimate.
    pub fn fit_polynomials<S: AsRef<str>>(
        &mut self,
        fit_intervals: &[S],
        config: &BackgroundFitConfig,
    ) -> TimeSeriesResult<()> {
        self.fit_polynomials_with_progress(fit_intervals, config, &mut LogProgress)
    }

    /// Like [`Self::fit_polynomials`], reporting each fitted channel to `progress`.
    pub fn fit_polynomials_with_progress<S: AsRef<str>>(
        &mut self,
        fit_intervals: &[S],
        config: &BackgroundFitConfig,
        progress: &mut dyn ProgressSink,
    ) -> TimeSeriesResult<()> {
        config.validate()?;

        let requested = TimeIntervalSet::from_strings(fit_intervals)?;
        if requested.is_empty() {
            return Err(TimeSeriesError::FitError(
                "no background intervals supplied".to_string(),
            ));
        }
        let poly_intervals = self.adjust_to_true_intervals(&requested)?;
        let samples = self.collect_fit_samples(&poly_intervals);

        let grade = match config.polynomial_order {
            Some(order) => {
                if samples.exposures.len() < order + 1 {
                    return Err(TimeSeriesError::FitError(format!(
                        "polynomial order {} needs at least {} usable background intervals, got {}",
                        order,
                        order + 1,
                        samples.exposures.len()
                    )));
                }
                order
            }
            None => {
                let summed: Vec<f64> = samples
                    .channel_counts
                    .iter()
                    .map(|counts| counts.iter().sum())
                    .collect();
                determine_optimal_grade(
                    &summed,
                    &samples.midpoints,
                    &samples.exposures,
                    config.fit_method,
                    config.max_auto_order,
                    config.order_selection_threshold,
                )?
            }
        };

        let n_channels = self.spectra.n_channels();
        let mut polynomials = Vec::with_capacity(n_channels);
        for channel in 0..n_channels {
            let counts: Vec<f64> = samples
                .channel_counts
                .iter()
                .map(|interval_counts| interval_counts[channel])
                .collect();
            let (polynomial, _) = polyfit(
                &counts,
                &samples.midpoints,
                grade,
                &samples.exposures,
                config.fit_method,
            )?;
            polynomials.push(polynomial);
            progress.channel_fitted(channel + 1, n_channels);
        }

        info!(
            "Fitted {} background polynomials of grade {} over {} ({})",
            n_channels, grade, poly_intervals, config.fit_method
        );

        self.series.replace_poly_fit(PolyFitState::new(
            FitMethodInfo {
                bin_type: BIN_TYPE.to_string(),
                fit_method: config.fit_method,
            },
            grade,
            poly_intervals,
            polynomials,
        ));
        Ok(())
    }

    fn collect_fit_samples(&self, poly_intervals: &TimeIntervalSet) -> FitSamples {
        let half_times = self.bins().half_times();
        let mut samples = FitSamples {
            channel_counts: Vec::with_capacity(poly_intervals.len()),
            exposures: Vec::with_capacity(poly_intervals.len()),
            midpoints: Vec::with_capacity(poly_intervals.len()),
        };

        for selection in poly_intervals {
            let mask = self.select_bins(selection.start(), selection.stop());
            let exposure = self.sum_exposure(&mask);
            if exposure <= 0.0 {
                warn!(
                    "Background interval {} contains no exposed bins; skipping it",
                    selection
                );
                continue;
            }

            samples.channel_counts.push(self.sum_channel_counts(&mask));
            samples.exposures.push(exposure);
            samples.midpoints.push(
                half_times
                    .iter()
                    .zip(&mask)
                    .filter(|(_, selected)| **selected)
                    .map(|(t, _)| *t)
                    .collect(),
            );
        }
        samples
    }

    /// Select the active (source) intervals.
    ///
    /// The intervals are merged, snapped to the native bins, and the counts,
    /// exposure and dead time over them are recomputed. When a background fit
    /// exists, the expected background per channel is derived as well. Nothing is
    /// changed if any step fails.
    pub fn set_active_time_intervals<S: AsRef<str>>(
        &mut self,
        intervals: &[S],
    ) -> TimeSeriesResult<()> {
        let requested = TimeIntervalSet::from_strings(intervals)?.merge_intersecting_intervals();
        if requested.is_empty() {
            return Err(TimeSeriesError::FormatError(
                "no active time intervals supplied".to_string(),
            ));
        }
        let time_intervals = self.adjust_to_true_intervals(&requested)?;

        let mut counts = vec![0.0; self.spectra.n_channels()];
        let mut all_selected = vec![false; self.spectra.len()];
        let mut total_time = 0.0;

        for interval in &time_intervals {
            let mask = self.select_bins(interval.start(), interval.stop());
            for (total, count) in counts.iter_mut().zip(self.sum_channel_counts(&mask)) {
                *total += count;
            }
            for (any, selected) in all_selected.iter_mut().zip(&mask) {
                *any |= *selected;
            }
            total_time += interval.duration();
        }

        let background = self
            .series
            .poly_fit()
            .map(|fit| BackgroundEstimate::over_intervals(fit.polynomials(), &time_intervals));

        let exposure = self.sum_exposure(&all_selected);
        let dead_time = total_time - exposure;

        info!(
            "Active selection {}: exposure {:.3} s, dead time {:.3} s",
            time_intervals, exposure, dead_time
        );

        self.series.replace_active_selection(ActiveSelection::new(
            time_intervals,
            counts,
            exposure,
            dead_time,
            background,
        ));
        Ok(())
    }
}

impl TrueIntervalSelection for BinnedSpectrumSeries {
    fn select_bins(&self, start: f64, stop: f64) -> Vec<bool> {
        self.bins().containing_mask(start, stop)
    }

    /// Snaps each start to the first true bin start at or after it, and each stop to
    /// the first true bin stop at or after it.
    ///
    /// Boundaries outside the binned data, and selections that no longer cover any
    /// true bin once snapped, are rejected rather than clipped.
    fn adjust_to_true_intervals(
        &self,
        intervals: &TimeIntervalSet,
    ) -> TimeSeriesResult<TimeIntervalSet> {
        let true_starts = self.bins().start_times();
        let true_stops = self.bins().stop_times();
        let (data_start, data_stop) = (self.series.start(), self.series.stop());

        let mut new_starts = Vec::with_capacity(intervals.len());
        let mut new_stops = Vec::with_capacity(intervals.len());

        for interval in intervals {
            for boundary in [interval.start(), interval.stop()] {
                if boundary < data_start || boundary > data_stop {
                    return Err(TimeSeriesError::OutOfRangeError(format!(
                        "boundary {} of {} lies outside the binned data range [{}, {}]",
                        boundary, interval, data_start, data_stop
                    )));
                }
            }

            let start_idx = true_starts.partition_point(|t| *t < interval.start());
            let new_start = *true_starts.get(start_idx).ok_or_else(|| {
                TimeSeriesError::OutOfRangeError(format!(
                    "no bin starts at or after {} (interval {})",
                    interval.start(),
                    interval
                ))
            })?;

            let stop_idx = true_stops.partition_point(|t| *t < interval.stop());
            let new_stop = *true_stops.get(stop_idx).ok_or_else(|| {
                TimeSeriesError::OutOfRangeError(format!(
                    "no bin stops at or after {} (interval {})",
                    interval.stop(),
                    interval
                ))
            })?;

            if new_start > new_stop
                || !self
                    .bins()
                    .containing_mask(new_start, new_stop)
                    .contains(&true)
            {
                return Err(TimeSeriesError::OutOfRangeError(format!(
                    "interval {} contains no true bin once snapped",
                    interval
                )));
            }

            new_starts.push(new_start);
            new_stops.push(new_stop);
        }

        TimeIntervalSet::from_starts_and_stops(&new_starts, &new_stops)
    }

    fn counts_over_interval(&self, start: f64, stop: f64) -> f64 {
        self.channel_counts_over_interval(start, stop).iter().sum()
    }

    fn exposure_over_interval(&self, start: f64, stop: f64) -> f64 {
        self.sum_exposure(&self.select_bins(start, stop))
    }
}
