//! Persistence of fitted background models.
//!
//! A background fit can be written to JSON and restored onto another series over
//! data with the same channel layout, so an expensive fit need not be repeated.
//!
//! # Example
//!
//! ```no_run
//! use spectral_timeseries::io::{restore_background, save_background};
//! # fn example(
//! #     fitted: &spectral_timeseries::services::BinnedSpectrumSeries,
//! #     other: &mut spectral_timeseries::services::BinnedSpectrumSeries,
//! # ) -> spectral_timeseries::core::TimeSeriesResult<()> {
//! save_background(fitted.time_series(), "background.json")?;
//! restore_background(other, "background.json")?;
//! # Ok(())
//! # }
//! ```

pub mod background;

pub use background::{restore_background, save_background, BackgroundSnapshot};
