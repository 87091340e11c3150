use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::algorithms::polynomial::Polynomial;
use crate::core::error::{TimeSeriesError, TimeSeriesResult};
use crate::services::binned_series::BinnedSpectrumSeries;
use crate::services::time_series::{FitMethodInfo, PolyFitState, TimeSeries};
use crate::time::intervals::TimeIntervalSet;

/// Serializable form of a background fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSnapshot {
    pub n_channels: usize,
    pub first_channel: usize,
    pub method_info: FitMethodInfo,
    pub grade: usize,
    pub poly_intervals: TimeIntervalSet,
    pub polynomials: Vec<Polynomial>,
}

impl BackgroundSnapshot {
    /// Capture the current background fit of `series`.
    pub fn from_series(series: &TimeSeries) -> TimeSeriesResult<Self> {
        let fit = series.poly_fit().ok_or_else(|| {
            TimeSeriesError::PreconditionError(
                "cannot save a background before it has been fitted".to_string(),
            )
        })?;
        Ok(Self {
            n_channels: series.n_channels(),
            first_channel: series.first_channel(),
            method_info: fit.method_info().clone(),
            grade: fit.grade(),
            poly_intervals: fit.intervals().clone(),
            polynomials: fit.polynomials().to_vec(),
        })
    }

    pub fn to_json(&self) -> TimeSeriesResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> TimeSeriesResult<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.polynomials.len() != snapshot.n_channels {
            return Err(TimeSeriesError::InvalidData(format!(
                "snapshot declares {} channels but holds {} polynomials",
                snapshot.n_channels,
                snapshot.polynomials.len()
            )));
        }
        if snapshot.polynomials.iter().any(|p| p.degree() != snapshot.grade) {
            return Err(TimeSeriesError::InvalidData(format!(
                "snapshot polynomials do not all have grade {}",
                snapshot.grade
            )));
        }
        Ok(snapshot)
    }

    /// Install this fit on `series`, refreshing the background of its active
    /// selection. The series is left unchanged if the channel counts differ.
    pub fn apply_to(self, series: &mut BinnedSpectrumSeries) -> TimeSeriesResult<()> {
        let state = series.time_series_mut();
        if state.n_channels() != self.n_channels {
            return Err(TimeSeriesError::InvalidData(format!(
                "background has {} channels, series has {}",
                self.n_channels,
                state.n_channels()
            )));
        }
        state.replace_poly_fit(PolyFitState::new(
            self.method_info,
            self.grade,
            self.poly_intervals,
            self.polynomials,
        ));
        state.refresh_active_background();
        Ok(())
    }
}

/// Write the background fit of `series` to `path` as JSON.
pub fn save_background<P: AsRef<Path>>(series: &TimeSeries, path: P) -> TimeSeriesResult<()> {
    let json = BackgroundSnapshot::from_series(series)?.to_json()?;
    fs::write(path.as_ref(), json)?;
    info!("Saved background fit to {}", path.as_ref().display());
    Ok(())
}

/// Read a background fit from `path` and install it on `series`.
pub fn restore_background<P: AsRef<Path>>(
    series: &mut BinnedSpectrumSeries,
    path: P,
) -> TimeSeriesResult<()> {
    let json = fs::read_to_string(path.as_ref())?;
    BackgroundSnapshot::from_json(&json)?.apply_to(series)?;
    info!("Restored background fit from {}", path.as_ref().display());
    Ok(())
}
