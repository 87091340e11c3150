//! Numerical algorithms behind the background model.
//!
//! # Components
//!
//! - [`polynomial`]: Polynomial regression of per-interval counts and the fitted
//!   [`Polynomial`] with integral and integral-error queries
//! - [`grade`]: Automatic polynomial grade selection
//! - [`significance`]: Source significance over a fitted background

pub mod grade;
pub mod polynomial;
pub mod significance;

pub use grade::determine_optimal_grade;
pub use polynomial::{polyfit, FitMethod, Polynomial};
pub use significance::poisson_gaussian_significance;
