//! Domain models for binned detector data.
//!
//! This module provides the core data structures that represent a time series of
//! pre-binned spectra: the time interval each bin covers, the per-channel counts
//! recorded in it, its exposure, and a quality flag.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{TimeSeriesError, TimeSeriesResult};
use crate::time::intervals::TimeIntervalSet;

/// Represents a single time interval with start and stop times in seconds.
///
/// A `TimeInterval` is immutable once constructed and always satisfies
/// `start <= stop` with both bounds finite.
///
/// # Examples
///
/// ```
/// use spectral_timeseries::core::domain::TimeInterval;
///
/// let interval = TimeInterval::new(2.0, 5.0).unwrap();
///
/// assert_eq!(interval.duration(), 3.0);
/// assert_eq!(interval.half_time(), 3.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct TimeInterval {
    start: f64,
    stop: f64,
}

impl TimeInterval {
    /// Creates a new time interval.
    ///
    /// # Arguments
    ///
    /// * `start` - The start time of the interval in seconds
    /// * `stop` - The stop time of the interval in seconds
    ///
    /// # Errors
    ///
    /// Returns [`TimeSeriesError::FormatError`] if either bound is not finite or if
    /// `start > stop`.
    pub fn new(start: f64, stop: f64) -> TimeSeriesResult<Self> {
        if !start.is_finite() || !stop.is_finite() {
            return Err(TimeSeriesError::FormatError(format!(
                "interval bounds must be finite, got {}-{}",
                start, stop
            )));
        }
        if start > stop {
            return Err(TimeSeriesError::FormatError(format!(
                "interval start {} is after its stop {}",
                start, stop
            )));
        }
        Ok(Self { start, stop })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn stop(&self) -> f64 {
        self.stop
    }

    /// Returns `stop - start`.
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    /// Returns the midpoint of the interval.
    pub fn half_time(&self) -> f64 {
        0.5 * (self.start + self.stop)
    }

    /// True if `other` lies entirely within this interval (bounds inclusive).
    pub fn contains_interval(&self, other: &TimeInterval) -> bool {
        other.start >= self.start && other.stop <= self.stop
    }

    /// True if the two intervals overlap or touch.
    pub fn overlaps_with(&self, other: &TimeInterval) -> bool {
        self.start <= other.stop && other.start <= self.stop
    }

    /// Returns the smallest interval covering both `self` and `other`.
    pub fn merge(&self, other: &TimeInterval) -> TimeInterval {
        TimeInterval {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.stop)
    }
}

impl TryFrom<(f64, f64)> for TimeInterval {
    type Error = TimeSeriesError;

    fn try_from((start, stop): (f64, f64)) -> Result<Self, Self::Error> {
        TimeInterval::new(start, stop)
    }
}

impl From<TimeInterval> for (f64, f64) {
    fn from(interval: TimeInterval) -> Self {
        (interval.start, interval.stop)
    }
}

/// Data quality flag attached to each bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Good,
    Warn,
    Bad,
}

/// One pre-integrated record: a time interval, its per-channel counts, its
/// exposure in seconds, and a quality flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedSpectrum {
    pub interval: TimeInterval,
    pub counts: Vec<f64>,
    pub exposure: f64,
    #[serde(default)]
    pub quality: Quality,
}

impl BinnedSpectrum {
    pub fn new(interval: TimeInterval, counts: Vec<f64>, exposure: f64) -> Self {
        Self {
            interval,
            counts,
            exposure,
            quality: Quality::Good,
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Total counts summed over all channels.
    pub fn total_counts(&self) -> f64 {
        self.counts.iter().sum()
    }
}

/// Ordered sequence of binned spectra sharing one channel layout.
///
/// The set is validated once at construction: bins are sorted by start time and
/// pairwise non-overlapping, every bin carries the same number of channels, and all
/// counts and exposures are finite and non-negative. It is never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedSpectrumSet {
    spectra: Vec<BinnedSpectrum>,
    time_intervals: TimeIntervalSet,
    n_channels: usize,
}

impl BinnedSpectrumSet {
    /// Builds a validated set from individual spectra.
    ///
    /// # Errors
    ///
    /// Returns [`TimeSeriesError::InvalidData`] if the set is empty, the channel
    /// counts disagree, bins are unsorted or overlapping, or any value is negative
    /// or not finite.
    pub fn new(spectra: Vec<BinnedSpectrum>) -> TimeSeriesResult<Self> {
        let first = spectra
            .first()
            .ok_or_else(|| TimeSeriesError::InvalidData("no spectra supplied".to_string()))?;
        let n_channels = first.counts.len();
        if n_channels == 0 {
            return Err(TimeSeriesError::InvalidData(
                "spectra must have at least one channel".to_string(),
            ));
        }

        for (idx, spectrum) in spectra.iter().enumerate() {
            if spectrum.counts.len() != n_channels {
                return Err(TimeSeriesError::InvalidData(format!(
                    "bin {} has {} channels, expected {}",
                    idx,
                    spectrum.counts.len(),
                    n_channels
                )));
            }
            if spectrum.counts.iter().any(|c| !c.is_finite() || *c < 0.0) {
                return Err(TimeSeriesError::InvalidData(format!(
                    "bin {} has negative or non-finite counts",
                    idx
                )));
            }
            if !spectrum.exposure.is_finite() || spectrum.exposure < 0.0 {
                return Err(TimeSeriesError::InvalidData(format!(
                    "bin {} has invalid exposure {}",
                    idx, spectrum.exposure
                )));
            }
        }

        for (idx, pair) in spectra.windows(2).enumerate() {
            if pair[0].interval.stop() > pair[1].interval.start() {
                return Err(TimeSeriesError::InvalidData(format!(
                    "bins {} and {} are unsorted or overlapping ({} / {})",
                    idx,
                    idx + 1,
                    pair[0].interval,
                    pair[1].interval
                )));
            }
        }

        let time_intervals = TimeIntervalSet::new(spectra.iter().map(|s| s.interval).collect());

        Ok(Self {
            spectra,
            time_intervals,
            n_channels,
        })
    }

    /// Builds a set from parallel arrays, one entry per bin.
    ///
    /// `quality` defaults to [`Quality::Good`] for every bin when `None`.
    pub fn from_arrays(
        intervals: &TimeIntervalSet,
        counts: Vec<Vec<f64>>,
        exposures: &[f64],
        quality: Option<&[Quality]>,
    ) -> TimeSeriesResult<Self> {
        if counts.len() != intervals.len() || exposures.len() != intervals.len() {
            return Err(TimeSeriesError::InvalidData(format!(
                "got {} intervals, {} count vectors and {} exposures",
                intervals.len(),
                counts.len(),
                exposures.len()
            )));
        }
        if let Some(q) = quality {
            if q.len() != intervals.len() {
                return Err(TimeSeriesError::InvalidData(format!(
                    "got {} quality flags for {} bins",
                    q.len(),
                    intervals.len()
                )));
            }
        }

        let spectra = intervals
            .iter()
            .zip(counts)
            .zip(exposures)
            .enumerate()
            .map(|(idx, ((interval, counts), exposure))| BinnedSpectrum {
                interval: *interval,
                counts,
                exposure: *exposure,
                quality: quality.map(|q| q[idx]).unwrap_or_default(),
            })
            .collect();

        Self::new(spectra)
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn get(&self, idx: usize) -> Option<&BinnedSpectrum> {
        self.spectra.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BinnedSpectrum> {
        self.spectra.iter()
    }

    /// The bin intervals, in bin order.
    pub fn time_intervals(&self) -> &TimeIntervalSet {
        &self.time_intervals
    }

    pub fn counts_per_bin(&self, idx: usize) -> Option<&[f64]> {
        self.spectra.get(idx).map(|s| s.counts.as_slice())
    }

    pub fn exposure_per_bin(&self) -> Vec<f64> {
        self.spectra.iter().map(|s| s.exposure).collect()
    }

    pub fn quality_per_bin(&self) -> Vec<Quality> {
        self.spectra.iter().map(|s| s.quality).collect()
    }
}
