//! Tunables for the scoring pipeline.
#![forbid(unsafe_code)]

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use waypost_core::context::{DEFAULT_RADIUS_KM, DEFAULT_REGION_FALLBACK_KM};

use crate::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};

/// Scoring pipeline configuration.
///
/// Every field has a default, so partial documents deserialise cleanly.
///
/// # Examples
///
/// ```
/// use waypost_scorer::ScorerConfig;
///
/// let config: ScorerConfig = serde_json::from_str(r#"{"cache_ttl_secs": 60}"#)
///     .expect("partial config");
/// assert_eq!(config.cache_ttl_secs, 60);
/// assert_eq!(config.cache_capacity, 10_000);
/// config.validate().expect("defaults are valid");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Lifetime of cached results in seconds.
    pub cache_ttl_secs: u64,
    /// Maximum number of cached results; `0` disables caching.
    pub cache_capacity: u64,
    /// Radius used to count nearby records.
    pub nearby_radius_km: f64,
    /// Radius searched for the nearest region.
    pub region_fallback_km: f64,
    /// Reject records without coordinates instead of using defaults.
    pub require_coordinates: bool,
    /// Include the feature vector in every result.
    pub echo_features: bool,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            nearby_radius_km: DEFAULT_RADIUS_KM,
            region_fallback_km: DEFAULT_REGION_FALLBACK_KM,
            require_coordinates: false,
            echo_features: false,
        }
    }
}

/// A configuration value outside its valid range.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// A radius is zero, negative or not finite.
    #[error("{field} must be a positive number of kilometres, got {value}")]
    InvalidRadius {
        /// Offending field.
        field: &'static str,
        /// Supplied value.
        value: f64,
    },
}

impl ScorerConfig {
    /// Cache lifetime as a [`Duration`].
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Check that radii are usable.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidRadius`] for the first bad radius.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("nearby_radius_km", self.nearby_radius_km),
            ("region_fallback_km", self.region_fallback_km),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidRadius { field, value });
            }
        }
        Ok(())
    }
}
