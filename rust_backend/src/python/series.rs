use std::path::PathBuf;
use std::sync::Arc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::algorithms::polynomial::FitMethod;
use crate::config::BackgroundFitConfig;
use crate::core::domain::BinnedSpectrumSet;
use crate::core::error::TimeSeriesResult;
use crate::io::{restore_background, save_background};
use crate::services::{BinnedSpectrumSeries, TrueIntervalSelection};
use crate::time::intervals::TimeIntervalSet;

/// Python wrapper for BinnedSpectrumSeries
#[pyclass(name = "BinnedSpectrumSeries", module = "spectral_timeseries")]
pub struct PyBinnedSpectrumSeries {
    inner: BinnedSpectrumSeries,
}

#[pymethods]
impl PyBinnedSpectrumSeries {
    #[new]
    #[pyo3(signature = (starts, stops, counts, exposures, first_channel = 1))]
    fn py_new(
        starts: Vec<f64>,
        stops: Vec<f64>,
        counts: Vec<Vec<f64>>,
        exposures: Vec<f64>,
        first_channel: usize,
    ) -> PyResult<Self> {
        let bins = TimeIntervalSet::from_starts_and_stops(&starts, &stops)?;
        let set = BinnedSpectrumSet::from_arrays(&bins, counts, &exposures, None)?;
        Ok(Self {
            inner: BinnedSpectrumSeries::new(Arc::new(set)).with_first_channel(first_channel),
        })
    }

    #[pyo3(signature = (*intervals, fit_method = None, polynomial_order = None))]
    fn set_background_interval(
        &mut self,
        intervals: Vec<String>,
        fit_method: Option<String>,
        polynomial_order: Option<usize>,
    ) -> PyResult<()> {
        let config = fit_config(fit_method, polynomial_order)?;
        self.inner.set_background_interval(&intervals, &config)?;
        Ok(())
    }

    /// Fit the background without touching the active selection
    #[pyo3(signature = (*intervals, fit_method = None, polynomial_order = None))]
    fn fit_polynomials(
        &mut self,
        intervals: Vec<String>,
        fit_method: Option<String>,
        polynomial_order: Option<usize>,
    ) -> PyResult<()> {
        let config = fit_config(fit_method, polynomial_order)?;
        self.inner.fit_polynomials(&intervals, &config)?;
        Ok(())
    }

    #[pyo3(signature = (*intervals))]
    fn set_active_time_intervals(&mut self, intervals: Vec<String>) -> PyResult<()> {
        self.inner.set_active_time_intervals(&intervals)?;
        Ok(())
    }

    fn counts_over_interval(&self, start: f64, stop: f64) -> f64 {
        self.inner.counts_over_interval(start, stop)
    }

    fn exposure_over_interval(&self, start: f64, stop: f64) -> f64 {
        self.inner.exposure_over_interval(start, stop)
    }

    #[getter]
    fn n_channels(&self) -> usize {
        self.inner.time_series().n_channels()
    }

    #[getter]
    fn poly_fit_exists(&self) -> bool {
        self.inner.time_series().poly_fit_exists()
    }

    #[getter]
    fn counts(&self) -> PyResult<Vec<f64>> {
        Ok(self.inner.time_series().counts()?.to_vec())
    }

    #[getter]
    fn exposure(&self) -> PyResult<f64> {
        Ok(self.inner.time_series().exposure()?.value())
    }

    #[getter]
    fn active_dead_time(&self) -> PyResult<f64> {
        Ok(self.inner.time_series().active_dead_time()?.value())
    }

    #[getter]
    fn background_counts(&self) -> PyResult<Vec<f64>> {
        Ok(self.inner.time_series().background_counts()?.to_vec())
    }

    #[getter]
    fn background_count_errors(&self) -> PyResult<Vec<f64>> {
        Ok(self.inner.time_series().background_count_errors()?.to_vec())
    }

    #[getter]
    fn optimal_polynomial_grade(&self) -> PyResult<usize> {
        Ok(self.inner.time_series().optimal_polynomial_grade()?)
    }

    #[getter]
    fn time_intervals(&self) -> PyResult<Vec<(f64, f64)>> {
        Ok(as_pairs(self.inner.time_series().time_intervals()?))
    }

    #[getter]
    fn poly_intervals(&self) -> PyResult<Vec<(f64, f64)>> {
        Ok(as_pairs(self.inner.time_series().poly_intervals()?))
    }

    /// `(bin_type, fit_method)` of the current background fit
    #[getter]
    fn fit_method_info(&self) -> PyResult<(String, String)> {
        let info = self.inner.time_series().fit_method_info()?;
        Ok((info.bin_type.clone(), info.fit_method.to_string()))
    }

    /// Per-channel coefficients and errors as a JSON string
    fn poly_info(&self) -> PyResult<String> {
        let info = self.inner.time_series().poly_info()?;
        serde_json::to_string(&info).map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn significance(&self) -> PyResult<f64> {
        Ok(self.inner.time_series().significance()?)
    }

    fn significance_per_channel(&self) -> PyResult<Vec<f64>> {
        Ok(self.inner.time_series().significance_per_channel()?)
    }

    fn save_background(&self, path: PathBuf) -> PyResult<()> {
        save_background(self.inner.time_series(), path)?;
        Ok(())
    }

    fn restore_background(&mut self, path: PathBuf) -> PyResult<()> {
        restore_background(&mut self.inner, path)?;
        Ok(())
    }

    /// Series metadata and selections as a JSON string
    fn information(&self) -> PyResult<String> {
        let info = self.inner.time_series().information();
        serde_json::to_string(&info)
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn __repr__(&self) -> String {
        let ts = self.inner.time_series();
        format!(
            "BinnedSpectrumSeries(bins={}, channels={}, start={}, stop={})",
            self.inner.bins().len(),
            ts.n_channels(),
            ts.start(),
            ts.stop()
        )
    }
}

fn fit_config(
    fit_method: Option<String>,
    polynomial_order: Option<usize>,
) -> TimeSeriesResult<BackgroundFitConfig> {
    let mut config = BackgroundFitConfig::default();
    if let Some(method) = fit_method {
        config = config.with_fit_method(method.parse::<FitMethod>()?);
    }
    if let Some(order) = polynomial_order {
        config = config.with_polynomial_order(order);
    }
    Ok(config)
}

fn as_pairs(intervals: &TimeIntervalSet) -> Vec<(f64, f64)> {
    intervals.iter().map(|interval| <(f64, f64)>::from(*interval)).collect()
}
