pub mod intervals;

pub use intervals::TimeIntervalSet;
