//! Progress notification for long per-channel loops.

use log::debug;

/// Observer notified once per channel while background polynomials are fitted.
///
/// Notifications are informational only; they never affect fit results.
pub trait ProgressSink {
    fn channel_fitted(&mut self, completed: usize, total: usize);
}

/// Default sink writing progress to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn channel_fitted(&mut self, completed: usize, total: usize) {
        if completed == total || completed % 64 == 0 {
            debug!("Fitting background: {}/{} channels", completed, total);
        }
    }
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize),
{
    fn channel_fitted(&mut self, completed: usize, total: usize) {
        self(completed, total)
    }
}
