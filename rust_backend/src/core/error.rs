//! Error types for time-series operations.

/// Result type for time-series operations
pub type TimeSeriesResult<T> = Result<T, TimeSeriesError>;

/// Error type for time-series operations
#[derive(Debug, thiserror::Error)]
pub enum TimeSeriesError {
    /// Malformed interval string or interval bounds.
    #[error("Format error: {0}")]
    FormatError(String),

    /// A requested boundary cannot be snapped onto the true bins.
    #[error("Out of range: {0}")]
    OutOfRangeError(String),

    /// The background regression could not be carried out.
    #[error("Fit error: {0}")]
    FitError(String),

    /// A query was made before the state it depends on exists.
    #[error("Precondition failed: {0}")]
    PreconditionError(String),

    /// Inconsistent binned spectrum data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
