#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Travel modes and isochrone provider definition types.
//!
//! Provider definitions are deserialized from the TOML files embedded by
//! the `drivetime_isochrone` service registry. Each provider speaks its
//! own mode vocabulary; [`ProviderConfig::profile`] maps the shared
//! [`TravelMode`] onto it and reports modes the provider cannot route.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How the traveller moves.
///
/// Parses both the short spelling (`drive`) and the gerund spelling
/// (`driving`) used by some routing vendors.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum TravelMode {
    /// On foot.
    #[serde(rename = "walk", alias = "walking")]
    #[strum(to_string = "walk", serialize = "walking")]
    Walk,
    /// Bicycle.
    #[serde(rename = "bicycle", alias = "cycling")]
    #[strum(to_string = "bicycle", serialize = "cycling")]
    Bicycle,
    /// Public transport.
    #[serde(rename = "transit")]
    #[strum(to_string = "transit")]
    Transit,
    /// Private car.
    #[serde(rename = "drive", alias = "driving")]
    #[strum(to_string = "drive", serialize = "driving")]
    Drive,
    /// Heavy goods vehicle.
    #[serde(rename = "truck")]
    #[strum(to_string = "truck")]
    Truck,
}

impl TravelMode {
    /// Every travel mode, in display order.
    pub const ALL: &[Self] = &[
        Self::Walk,
        Self::Bicycle,
        Self::Transit,
        Self::Drive,
        Self::Truck,
    ];
}

/// Which outbound call a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpstreamCall {
    /// Address → point lookup.
    Geocode,
    /// Point → travel-time polygon request.
    Isochrone,
}

/// An isochrone provider definition loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Unique identifier (e.g., `"geoapify"`, `"mapbox"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this provider may be selected.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Geoapify geocoding + isoline API.
    Geoapify {
        /// API base URL (e.g., `"https://api.geoapify.com"`).
        base_url: String,
        /// ISO country code used to filter geocoding results.
        country_code: String,
        /// Environment variable holding the API key.
        api_key_env: String,
    },
    /// Mapbox geocoding + isochrone API.
    Mapbox {
        /// API base URL (e.g., `"https://api.mapbox.com"`).
        base_url: String,
        /// ISO country code used to filter geocoding results.
        country_code: String,
        /// Environment variable holding the access token.
        api_key_env: String,
        /// Denoise factor between 0 and 1 (1 keeps only the largest
        /// contour).
        #[serde(default = "default_denoise")]
        denoise: f64,
        /// Polygon generalization tolerance in metres. Omitted from the
        /// request when unset.
        #[serde(default)]
        generalize: Option<u32>,
    },
}

impl ProviderConfig {
    /// Returns the provider's own name for `mode`, or `None` if the
    /// provider cannot route it.
    #[must_use]
    pub const fn profile(&self, mode: TravelMode) -> Option<&'static str> {
        match self {
            Self::Geoapify { .. } => Some(match mode {
                TravelMode::Walk => "walk",
                TravelMode::Bicycle => "bicycle",
                TravelMode::Transit => "transit",
                TravelMode::Drive => "drive",
                TravelMode::Truck => "truck",
            }),
            Self::Mapbox { .. } => match mode {
                TravelMode::Walk => Some("walking"),
                TravelMode::Bicycle => Some("cycling"),
                TravelMode::Drive => Some("driving"),
                TravelMode::Transit | TravelMode::Truck => None,
            },
        }
    }

    /// Returns the provider's base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match self {
            Self::Geoapify { base_url, .. } | Self::Mapbox { base_url, .. } => base_url,
        }
    }

    /// Returns the ISO country code used to filter geocoding results.
    #[must_use]
    pub fn country_code(&self) -> &str {
        match self {
            Self::Geoapify { country_code, .. } | Self::Mapbox { country_code, .. } => country_code,
        }
    }

    /// Returns the environment variable that holds the provider key.
    #[must_use]
    pub fn api_key_env(&self) -> &str {
        match self {
            Self::Geoapify { api_key_env, .. } | Self::Mapbox { api_key_env, .. } => api_key_env,
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_denoise() -> f64 {
    1.0
}
