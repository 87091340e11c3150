//! Active-interval selection and polynomial background fitting for time series of
//! pre-binned detector spectra.
//!
//! Background intervals are snapped onto the native bins, one polynomial per
//! channel is fitted over the summed counts of each interval, and the fitted
//! polynomials are integrated over the active (source) intervals to estimate the
//! background there, with propagated errors.

#[cfg(feature = "python")]
use pyo3::prelude::*;

pub mod algorithms;
pub mod config;
pub mod core;
pub mod io;
pub mod parsing;
pub mod services;
pub mod time;

#[cfg(feature = "python")]
pub mod python;

pub use crate::config::BackgroundFitConfig;
pub use crate::core::{BinnedSpectrum, BinnedSpectrumSet, Quality, TimeInterval, TimeSeriesError, TimeSeriesResult};
pub use crate::services::{BinnedSpectrumSeries, TimeSeries, TrueIntervalSelection};
pub use crate::time::TimeIntervalSet;

/// Spectral time series - background fitting for binned detector data
#[cfg(feature = "python")]
#[pymodule]
fn spectral_timeseries(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyBinnedSpectrumSeries>()?;
    m.add_function(wrap_pyfunction!(python::parse_time_intervals, m)?)?;
    Ok(())
}
