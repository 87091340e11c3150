//! Parsers for user-supplied time selections.
//!
//! Selections arrive as strings of the form `"tmin-tmax"`, possibly several per
//! string separated by commas (`"-10.0--2.5, 30-45"`).
//!
//! # Example
//!
//! ```
//! use spectral_timeseries::parsing::IntervalParser;
//!
//! let intervals = IntervalParser::parse("-10.0--2.5, 30-45").unwrap();
//! assert_eq!(intervals.len(), 2);
//! assert_eq!(intervals[0].start(), -10.0);
//! ```

pub mod intervals;

pub use intervals::{parse_interval_token, parse_interval_string, IntervalParser};
