use pyo3::prelude::*;

use crate::time::intervals::TimeIntervalSet;

/// Parse `"tmin-tmax"` strings into a list of `(start, stop)` tuples (PyO3 binding)
#[pyfunction]
#[pyo3(signature = (*intervals))]
pub fn parse_time_intervals(intervals: Vec<String>) -> PyResult<Vec<(f64, f64)>> {
    let set = TimeIntervalSet::from_strings(&intervals)?;
    Ok(set.iter().map(|interval| <(f64, f64)>::from(*interval)).collect())
}
