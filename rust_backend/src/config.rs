//! Background fit configuration.
//!
//! Settings are passed explicitly to every fit; nothing is read from process-wide
//! state. A configuration can be built in code or read from a TOML file:
//!
//! ```toml
//! fit_method = "poisson_likelihood"
//! polynomial_order = 2          # omit for automatic selection
//! max_auto_order = 4
//! order_selection_threshold = 9.0
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::algorithms::polynomial::FitMethod;
use crate::core::error::{TimeSeriesError, TimeSeriesResult};

/// Highest polynomial grade accepted anywhere in the configuration.
pub const MAX_SUPPORTED_ORDER: usize = 10;

/// Settings for the background polynomial fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackgroundFitConfig {
    #[serde(default)]
    pub fit_method: FitMethod,
    /// Fixed polynomial order; `None` selects the order automatically.
    #[serde(default)]
    pub polynomial_order: Option<usize>,
    #[serde(default = "default_max_auto_order")]
    pub max_auto_order: usize,
    /// Minimal fit-statistic improvement required to accept a higher order.
    #[serde(default = "default_order_selection_threshold")]
    pub order_selection_threshold: f64,
}

fn default_max_auto_order() -> usize {
    4
}

fn default_order_selection_threshold() -> f64 {
    9.0
}

impl Default for BackgroundFitConfig {
    fn default() -> Self {
        Self {
            fit_method: FitMethod::default(),
            polynomial_order: None,
            max_auto_order: default_max_auto_order(),
            order_selection_threshold: default_order_selection_threshold(),
        }
    }
}

impl BackgroundFitConfig {
    pub fn with_fit_method(mut self, fit_method: FitMethod) -> Self {
        self.fit_method = fit_method;
        self
    }

    pub fn with_polynomial_order(mut self, order: usize) -> Self {
        self.polynomial_order = Some(order);
        self
    }

    pub fn with_automatic_order(mut self) -> Self {
        self.polynomial_order = None;
        self
    }

    /// Load a configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(BackgroundFitConfig)` if the file was read, parsed and validated
    /// * `Err(TimeSeriesError::ConfigurationError)` otherwise
    pub fn from_file<P: AsRef<Path>>(path: P) -> TimeSeriesResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            TimeSeriesError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> TimeSeriesResult<Self> {
        let deserializer = toml::Deserializer::new(content);
        let config: BackgroundFitConfig = serde_path_to_error::deserialize(deserializer)
            .map_err(|e| {
                TimeSeriesError::ConfigurationError(format!(
                    "Failed to parse config at '{}': {}",
                    e.path(),
                    e.inner()
                ))
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TimeSeriesResult<()> {
        if self.max_auto_order > MAX_SUPPORTED_ORDER {
            return Err(TimeSeriesError::ConfigurationError(format!(
                "max_auto_order {} exceeds {}",
                self.max_auto_order, MAX_SUPPORTED_ORDER
            )));
        }
        if let Some(order) = self.polynomial_order {
            if order > MAX_SUPPORTED_ORDER {
                return Err(TimeSeriesError::ConfigurationError(format!(
                    "polynomial_order {} exceeds {}",
                    order, MAX_SUPPORTED_ORDER
                )));
            }
        }
        if !(self.order_selection_threshold.is_finite() && self.order_selection_threshold >= 0.0) {
            return Err(TimeSeriesError::ConfigurationError(format!(
                "order_selection_threshold must be a non-negative number, got {}",
                self.order_selection_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = BackgroundFitConfig::from_toml_str("").unwrap();
        assert_eq!(config, BackgroundFitConfig::default());
        assert_eq!(config.max_auto_order, 4);
        assert_eq!(config.order_selection_threshold, 9.0);
        assert_eq!(config.polynomial_order, None);
    }

    #[test]
    fn test_full_document() {
        let config = BackgroundFitConfig::from_toml_str(
            r#"
            fit_method = "weighted_least_squares"
            polynomial_order = 2
            max_auto_order = 3
            order_selection_threshold = 4.5
            "#,
        )
        .unwrap();
        assert_eq!(config.fit_method, FitMethod::WeightedLeastSquares);
        assert_eq!(config.polynomial_order, Some(2));
        assert_eq!(config.max_auto_order, 3);
        assert_eq!(config.order_selection_threshold, 4.5);
    }

    #[test]
    fn test_error_reports_key_path() {
        let err = BackgroundFitConfig::from_toml_str("fit_method = \"bayes\"").unwrap_err();
        match err {
            TimeSeriesError::ConfigurationError(msg) => assert!(msg.contains("fit_method")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validation_limits() {
        assert!(BackgroundFitConfig::from_toml_str("max_auto_order = 11").is_err());
        assert!(BackgroundFitConfig::from_toml_str("order_selection_threshold = -1.0").is_err());
        assert!(BackgroundFitConfig::from_toml_str("unknown = 1").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "polynomial_order = 1").unwrap();
        let config = BackgroundFitConfig::from_file(file.path()).unwrap();
        assert_eq!(config.polynomial_order, Some(1));

        assert!(matches!(
            BackgroundFitConfig::from_file("/nonexistent/background.toml"),
            Err(TimeSeriesError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_builder_methods() {
        let config = BackgroundFitConfig::default()
            .with_fit_method(FitMethod::WeightedLeastSquares)
            .with_polynomial_order(3);
        assert_eq!(config.polynomial_order, Some(3));
        assert_eq!(config.with_automatic_order().polynomial_order, None);
    }
}
