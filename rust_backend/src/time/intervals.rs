//! Ordered collections of time intervals.
//!
//! [`TimeIntervalSet`] is used both for the native bins of a binned spectrum set and
//! for user selections (active and background intervals). Constructors keep the
//! order they are given; [`TimeIntervalSet::merge_intersecting_intervals`] produces
//! the normalized form, sorted by start with no two intervals overlapping or
//! touching.

use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::core::domain::TimeInterval;
use crate::core::error::{TimeSeriesError, TimeSeriesResult};
use crate::parsing::IntervalParser;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeIntervalSet {
    intervals: Vec<TimeInterval>,
}

impl TimeIntervalSet {
    pub fn new(intervals: Vec<TimeInterval>) -> Self {
        Self { intervals }
    }

    /// Builds a set from `"tmin-tmax"` strings.
    ///
    /// Each string may hold several comma-separated intervals. A single malformed
    /// token fails the whole call.
    ///
    /// # Examples
    ///
    /// ```
    /// use spectral_timeseries::time::TimeIntervalSet;
    ///
    /// let set = TimeIntervalSet::from_strings(&["0-1,3-4", "10-12.5"]).unwrap();
    /// assert_eq!(set.len(), 3);
    /// assert_eq!(set.stop_times(), vec![1.0, 4.0, 12.5]);
    /// ```
    pub fn from_strings<S: AsRef<str>>(inputs: &[S]) -> TimeSeriesResult<Self> {
        Ok(Self::new(IntervalParser::parse_all(inputs)?))
    }

    /// Builds a set from parallel start and stop arrays, keeping their order.
    pub fn from_starts_and_stops(starts: &[f64], stops: &[f64]) -> TimeSeriesResult<Self> {
        if starts.len() != stops.len() {
            return Err(TimeSeriesError::FormatError(format!(
                "{} starts but {} stops",
                starts.len(),
                stops.len()
            )));
        }
        let intervals = starts
            .iter()
            .zip(stops)
            .map(|(start, stop)| TimeInterval::new(*start, *stop))
            .collect::<TimeSeriesResult<Vec<_>>>()?;
        Ok(Self::new(intervals))
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimeInterval> {
        self.intervals.iter()
    }

    pub fn as_slice(&self) -> &[TimeInterval] {
        &self.intervals
    }

    /// Returns a copy sorted by start time.
    pub fn sort(&self) -> Self {
        let mut intervals = self.intervals.clone();
        intervals.sort_by(|a, b| a.start().total_cmp(&b.start()));
        Self::new(intervals)
    }

    pub fn is_sorted(&self) -> bool {
        self.intervals
            .windows(2)
            .all(|pair| pair[0].start() <= pair[1].start())
    }

    /// Collapses overlapping or touching intervals.
    ///
    /// The result is sorted by start and satisfies
    /// `intervals[i].stop < intervals[i + 1].start` for every `i`.
    pub fn merge_intersecting_intervals(&self) -> Self {
        let sorted = self.sort();
        let mut merged: Vec<TimeInterval> = Vec::with_capacity(sorted.len());

        for interval in sorted.intervals {
            match merged.last_mut() {
                Some(last) if last.overlaps_with(&interval) => *last = last.merge(&interval),
                _ => merged.push(interval),
            }
        }

        Self::new(merged)
    }

    /// Mask of the stored intervals lying entirely within `[start, stop]`.
    pub fn containing_mask(&self, start: f64, stop: f64) -> Vec<bool> {
        self.intervals
            .iter()
            .map(|interval| interval.start() >= start && interval.stop() <= stop)
            .collect()
    }

    /// The stored intervals lying entirely within `[start, stop]`.
    pub fn containing_interval(&self, start: f64, stop: f64) -> Self {
        Self::new(
            self.intervals
                .iter()
                .filter(|interval| interval.start() >= start && interval.stop() <= stop)
                .copied()
                .collect(),
        )
    }

    pub fn start_times(&self) -> Vec<f64> {
        self.intervals.iter().map(TimeInterval::start).collect()
    }

    pub fn stop_times(&self) -> Vec<f64> {
        self.intervals.iter().map(TimeInterval::stop).collect()
    }

    /// Midpoint of every interval.
    pub fn half_times(&self) -> Vec<f64> {
        self.intervals.iter().map(TimeInterval::half_time).collect()
    }

    /// Duration of every interval.
    pub fn widths(&self) -> Vec<f64> {
        self.intervals.iter().map(TimeInterval::duration).collect()
    }

    /// Earliest start over all intervals.
    pub fn absolute_start(&self) -> Option<f64> {
        self.intervals.iter().map(TimeInterval::start).reduce(f64::min)
    }

    /// Latest stop over all intervals.
    pub fn absolute_stop(&self) -> Option<f64> {
        self.intervals.iter().map(TimeInterval::stop).reduce(f64::max)
    }

    /// Sum of all durations.
    pub fn total_duration(&self) -> f64 {
        self.intervals.iter().map(TimeInterval::duration).sum()
    }
}

impl Index<usize> for TimeIntervalSet {
    type Output = TimeInterval;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.intervals[idx]
    }
}

impl<'a> IntoIterator for &'a TimeIntervalSet {
    type Item = &'a TimeInterval;
    type IntoIter = std::slice::Iter<'a, TimeInterval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

impl FromIterator<TimeInterval> for TimeIntervalSet {
    fn from_iter<I: IntoIterator<Item = TimeInterval>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Comma-separated `"tmin-tmax"` list, readable back by [`TimeIntervalSet::from_strings`].
impl fmt::Display for TimeIntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, interval) in self.intervals.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", interval)?;
        }
        Ok(())
    }
}
