//! Automatic selection of the background polynomial grade.

use log::debug;

use super::polynomial::{polyfit, FitMethod};
use crate::core::error::{TimeSeriesError, TimeSeriesResult};

/// Determine the polynomial grade best supported by the data.
///
/// Every grade from 0 up to `max_grade` (capped so the fit stays determined) is
/// fitted to the same samples. Going from grade `k - 1` to `k` is considered an
/// improvement when the fit statistic drops by at least `threshold`; the selected
/// grade is the highest one reached by such an improvement, or 0 if none is.
///
/// # Arguments
/// * `counts` - Total counts of each sample (usually summed over channels)
/// * `midpoints` - Midpoints of the native bins inside each sample
/// * `exposures` - Total exposure of each sample
/// * `method` - Regression method
/// * `max_grade` - Highest grade tried
/// * `threshold` - Minimal statistic improvement for a higher grade
pub fn determine_optimal_grade(
    counts: &[f64],
    midpoints: &[Vec<f64>],
    exposures: &[f64],
    method: FitMethod,
    max_grade: usize,
    threshold: f64,
) -> TimeSeriesResult<usize> {
    if counts.is_empty() {
        return Err(TimeSeriesError::FitError(
            "no background intervals to fit".to_string(),
        ));
    }

    let top_grade = max_grade.min(counts.len() - 1);
    let mut statistics = Vec::with_capacity(top_grade + 1);

    for grade in 0..=top_grade {
        let (_, statistic) = polyfit(counts, midpoints, grade, exposures, method)?;
        debug!("grade {}: fit statistic {:.4}", grade, statistic);
        statistics.push(statistic);
    }

    let best = statistics
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0] - pair[1] >= threshold)
        .map(|(idx, _)| idx + 1)
        .last()
        .unwrap_or(0);

    debug!("selected polynomial grade {} of {} tried", best, top_grade + 1);
    Ok(best)
}
