//! Engine configuration, read from TOML.
//!
//! Every field has a default; the embedded `config/default.toml` spells
//! them out and is what [`EngineConfig::default`] returns.

use std::path::Path;
use std::time::Duration;

use drivetime_boundary_models::{BoundarySource, DEFAULT_COUNTRIES, DEFAULT_NATIONAL_MEDIAN_AGE};
use drivetime_isochrone::TransportSettings;
use drivetime_prices_models::{DEFAULT_HEX_COUNT_CUTOFF, DEFAULT_HEX_RESOLUTION};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Errors from reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Config file path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The TOML is malformed or has unknown keys.
    #[error("Invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config: {message}")]
    Invalid {
        /// What was wrong.
        message: String,
    },
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Isochrone provider id from the service registry.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Per-request timeout for provider calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for transient provider failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Queries run at once by [`crate::Engine::query_all`].
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Countries whose units are loaded.
    #[serde(default = "default_countries")]
    pub countries: Vec<String>,
    /// National median age for the area comparison.
    #[serde(default = "default_national_median_age")]
    pub national_median_age: f64,
    /// Reference data locations.
    #[serde(default)]
    pub data: DataConfig,
    /// Hex aggregation settings.
    #[serde(default)]
    pub hex: HexConfig,
}

/// Where reference data is loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Ward boundary `FeatureCollection`.
    #[serde(default = "default_boundaries")]
    pub boundaries: BoundarySource,
    /// Ward population CSV.
    #[serde(default = "default_population")]
    pub population: String,
    /// Price-paid CSV.
    #[serde(default = "default_prices")]
    pub prices: String,
}

/// Hex aggregation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HexConfig {
    /// H3 resolution (0-15).
    #[serde(default = "default_resolution")]
    pub resolution: u8,
    /// Cells with this many sales or fewer are dropped.
    #[serde(default = "default_count_cutoff")]
    pub count_cutoff: u64,
    /// Precomputed cells in `GeoJSON`, used instead of building.
    #[serde(default)]
    pub precomputed: Option<String>,
}

fn default_provider() -> String {
    "geoapify".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_concurrency() -> usize {
    4
}

fn default_countries() -> Vec<String> {
    DEFAULT_COUNTRIES.iter().map(ToString::to_string).collect()
}

const fn default_national_median_age() -> f64 {
    DEFAULT_NATIONAL_MEDIAN_AGE
}

fn default_boundaries() -> BoundarySource {
    BoundarySource::File {
        path: "data/wards/wards.geojson".to_string(),
    }
}

fn default_population() -> String {
    "data/wards/ward_population_2019.csv".to_string()
}

fn default_prices() -> String {
    "data/prices_paid_2019.csv".to_string()
}

const fn default_resolution() -> u8 {
    DEFAULT_HEX_RESOLUTION
}

const fn default_count_cutoff() -> u64 {
    DEFAULT_HEX_COUNT_CUTOFF
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            boundaries: default_boundaries(),
            population: default_population(),
            prices: default_prices(),
        }
    }
}

impl Default for HexConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            count_cutoff: default_count_cutoff(),
            precomputed: None,
        }
    }
}

impl Default for EngineConfig {
    /// The embedded `config/default.toml`.
    ///
    /// # Panics
    ///
    /// Panics if the embedded file is invalid. It is a compile-time
    /// constant covered by the tests below.
    fn default() -> Self {
        Self::from_toml_str(DEFAULT_CONFIG)
            .unwrap_or_else(|e| panic!("Failed to parse embedded default config: {e}"))
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed or a value is out
    /// of range.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };

        if self.provider.trim().is_empty() {
            return invalid("provider must not be empty");
        }
        if self.timeout_secs == 0 {
            return invalid("timeout_secs must be greater than zero");
        }
        if self.concurrency == 0 {
            return invalid("concurrency must be greater than zero");
        }
        if self.countries.is_empty() {
            return invalid("countries must list at least one country");
        }
        if !self.national_median_age.is_finite() || self.national_median_age <= 0.0 {
            return invalid("national_median_age must be a positive number");
        }
        if self.hex.resolution > 15 {
            return invalid("hex.resolution must be between 0 and 15");
        }
        Ok(())
    }

    /// HTTP settings for the provider clients.
    #[must_use]
    pub const fn transport(&self) -> TransportSettings {
        TransportSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_parses() {
        let config = EngineConfig::default();
        assert_eq!(config.provider, "geoapify");
        assert_eq!(config.countries, vec!["England", "Wales"]);
        assert_eq!(config.hex.resolution, 8);
        assert_eq!(config.hex.count_cutoff, 10);
        assert!(matches!(config.data.boundaries, BoundarySource::Url { .. }));
        assert_eq!(config.transport().timeout, Duration::from_secs(30));
    }

    #[test]
    fn empty_document_uses_field_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.concurrency, 4);
        assert!((config.national_median_age - 40.5).abs() < f64::EPSILON);
        assert_eq!(
            config.data.boundaries,
            BoundarySource::File {
                path: "data/wards/wards.geojson".to_string()
            }
        );
        assert!(config.hex.precomputed.is_none());
    }

    #[test]
    fn parses_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            provider = "mapbox"
            timeout_secs = 5
            countries = ["Wales"]

            [data.boundaries]
            type = "file"
            path = "wards.geojson"

            [hex]
            resolution = 7
            count_cutoff = 0
            precomputed = "prices-paid-hex.geojson"
            "#,
        )
        .unwrap();

        assert_eq!(config.provider, "mapbox");
        assert_eq!(config.transport().timeout, Duration::from_secs(5));
        assert_eq!(config.countries, vec!["Wales"]);
        assert_eq!(config.hex.precomputed.as_deref(), Some("prices-paid-hex.geojson"));
        assert_eq!(config.data.prices, "data/prices_paid_2019.csv");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("timeout_secs = 0").unwrap_err(),
            ConfigError::Invalid { .. }
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[hex]\nresolution = 16").unwrap_err(),
            ConfigError::Invalid { .. }
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("countries = []").unwrap_err(),
            ConfigError::Invalid { .. }
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("colour = \"blue\"").unwrap_err(),
            ConfigError::Toml(_)
        ));
    }
}
