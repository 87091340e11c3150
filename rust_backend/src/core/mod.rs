//! Core domain models for binned detector data.
//!
//! This module defines the fundamental data structures used throughout the crate,
//! representing time intervals, per-bin spectra, and the error taxonomy shared by
//! every operation.

pub mod domain;
pub mod error;

pub use domain::{BinnedSpectrum, BinnedSpectrumSet, Quality, TimeInterval};
pub use error::{TimeSeriesError, TimeSeriesResult};
