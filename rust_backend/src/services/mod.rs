//! Service layer for active-interval selection and background fitting.
//!
//! This module contains the time-series engine that sits between the binned data
//! and its consumers (reporting layers and the Python bindings). [`TimeSeries`]
//! owns the bookkeeping shared by every kind of series; [`BinnedSpectrumSeries`]
//! implements bin selection and snapping for pre-binned data.

pub mod binned_series;
pub mod progress;
pub mod time_series;

pub use binned_series::BinnedSpectrumSeries;
pub use progress::{LogProgress, ProgressSink};
pub use time_series::{
    ActiveSelection, BackgroundEstimate, ChannelPolynomialSummary, FitMethodInfo,
    InstrumentInfo, PolyFitState, SeriesInformation, TimeSeries, TrueIntervalSelection,
};
