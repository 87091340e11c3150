//! Python bindings for the time-series engine.
//!
//! This module exposes the binned spectrum series to Python via PyO3, so analysis
//! scripts can select intervals and fit backgrounds without leaving Python.
//!
//! # Modules
//!
//! - [`series`]: The `BinnedSpectrumSeries` class
//! - [`time_bindings`]: Interval parsing helpers
//!
//! # Python API
//!
//! All classes and functions are available in the `spectral_timeseries` Python
//! module after installation (build with the `python` feature).

pub mod series;
pub mod time_bindings;

pub use series::PyBinnedSpectrumSeries;
pub use time_bindings::parse_time_intervals;

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::PyErr;

use crate::core::error::TimeSeriesError;

impl From<TimeSeriesError> for PyErr {
    fn from(err: TimeSeriesError) -> Self {
        match err {
            TimeSeriesError::Io(e) => PyIOError::new_err(e.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}
