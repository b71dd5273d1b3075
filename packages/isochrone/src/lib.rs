#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resolves an address into an origin point and a travel-time polygon.
//!
//! The [`IsochroneResolver`] only knows the two service contracts,
//! [`GeocodingService`] and [`IsochroneService`]: a geocoder returns a
//! `GeoJSON` `FeatureCollection` whose first feature is the best match,
//! and a router returns a `FeatureCollection` of polygons. Concrete HTTP
//! clients for Geoapify and Mapbox live in [`geoapify`] and [`mapbox`],
//! configured from the embedded [`service_registry`].
//!
//! The resolver never retries. Transient-failure retry belongs to the
//! transport ([`retry`]).

pub mod geoapify;
pub mod mapbox;
pub mod resolver;
pub mod retry;
pub mod service_registry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drivetime_geometry::{GeoPoint, GeometryError};
use drivetime_isochrone_models::{ProviderConfig, ServiceDefinition, TravelMode, UpstreamCall};
use thiserror::Error;

pub use resolver::{IsochroneResolver, ResolvedIsochrone};

/// User agent sent with every provider request.
const USER_AGENT: &str = concat!("drivetime/", env!("CARGO_PKG_VERSION"));

/// Errors from the HTTP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Request URL with credentials removed.
        url: String,
    },

    /// The response body was not valid JSON.
    #[error("Invalid JSON response: {message}")]
    Json {
        /// Parser error description.
        message: String,
    },

    /// A request URL could not be built.
    #[error("Invalid URL: {message}")]
    Url {
        /// Description of the URL problem.
        message: String,
    },

    /// The environment variable holding the provider key is unset.
    #[error("Missing credentials: environment variable {var} is not set")]
    MissingCredentials {
        /// Name of the environment variable.
        var: String,
    },
}

/// Errors from isochrone resolution.
#[derive(Debug, Error)]
pub enum IsochroneError {
    /// The geocoder found no match for the address.
    #[error("No result for address '{address}'")]
    AddressNotFound {
        /// The address as given by the caller.
        address: String,
    },

    /// The configured provider cannot route this mode.
    #[error("Travel mode '{mode}' is not supported by {provider}")]
    UnsupportedMode {
        /// The requested mode.
        mode: TravelMode,
        /// Provider name.
        provider: String,
    },

    /// A request parameter is out of range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// What was wrong.
        message: String,
    },

    /// A call to the geocoding or isochrone service failed.
    #[error("{call} request failed: {source}")]
    Upstream {
        /// Which call failed.
        call: UpstreamCall,
        /// The transport failure.
        #[source]
        source: TransportError,
    },

    /// The service response did not contain usable geometry.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// One isochrone request, after the address has been geocoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsochroneRequest {
    /// Where the journey starts.
    pub origin: GeoPoint,
    /// How the traveller moves.
    pub mode: TravelMode,
    /// Travel-time budget in seconds.
    pub duration_seconds: u32,
}

/// Address lookup contract.
///
/// Implementations return the raw `GeoJSON` `FeatureCollection`, ranked
/// best match first.
#[async_trait]
pub trait GeocodingService: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Geocodes free-form address text.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request fails.
    async fn geocode(&self, address: &str) -> Result<serde_json::Value, TransportError>;
}

/// Travel-time polygon contract.
#[async_trait]
pub trait IsochroneService: Send + Sync {
    /// Provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Returns the provider's name for `mode`, or `None` if unsupported.
    fn profile(&self, mode: TravelMode) -> Option<&'static str>;

    /// Requests the reachable area for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request fails.
    async fn isochrone(
        &self,
        request: &IsochroneRequest,
    ) -> Result<serde_json::Value, TransportError>;
}

/// HTTP settings shared by every provider client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    /// Per-request timeout; an expired request fails as upstream error.
    pub timeout: Duration,
    /// Retry attempts for transient failures.
    pub max_retries: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

/// The two service handles a resolver needs, usually the same client.
#[derive(Clone)]
pub struct ProviderClients {
    /// Geocoding half.
    pub geocoder: Arc<dyn GeocodingService>,
    /// Routing half.
    pub router: Arc<dyn IsochroneService>,
}

/// Builds a `reqwest::Client` with the configured timeout.
///
/// # Errors
///
/// Returns [`TransportError`] if the client cannot be built.
pub fn build_http_client(settings: &TransportSettings) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(settings.timeout)
        .build()
        .map_err(Into::into)
}

/// Reads the provider key named by `var` from the environment.
///
/// # Errors
///
/// Returns [`TransportError::MissingCredentials`] if the variable is
/// unset or empty.
pub fn api_key_from_env(var: &str) -> Result<String, TransportError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(TransportError::MissingCredentials {
            var: var.to_string(),
        }),
    }
}

/// Connects the provider described by `definition`.
///
/// # Errors
///
/// Returns [`TransportError`] if the API key is missing or the HTTP
/// client cannot be built.
pub fn connect(
    definition: &ServiceDefinition,
    settings: &TransportSettings,
) -> Result<ProviderClients, TransportError> {
    let http = build_http_client(settings)?;
    let api_key = api_key_from_env(definition.provider.api_key_env())?;
    let policy = retry::RetryPolicy::with_max_retries(settings.max_retries);

    log::info!(
        "Using {} ({}) with timeout {:?}",
        definition.name,
        definition.provider.base_url(),
        settings.timeout
    );

    Ok(match &definition.provider {
        ProviderConfig::Geoapify { .. } => {
            let client = Arc::new(geoapify::GeoapifyClient::new(
                http,
                definition.provider.clone(),
                api_key,
                policy,
            ));
            ProviderClients {
                geocoder: client.clone(),
                router: client,
            }
        }
        ProviderConfig::Mapbox { .. } => {
            let client = Arc::new(mapbox::MapboxClient::new(
                http,
                definition.provider.clone(),
                api_key,
                policy,
            ));
            ProviderClients {
                geocoder: client.clone(),
                router: client,
            }
        }
    })
}

/// Removes API keys from a URL before it is logged or put in an error.
pub(crate) fn redact_url(url: &reqwest::Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "apiKey" || k == "access_token" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();

    if pairs.is_empty() {
        return redacted.to_string();
    }

    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_keys() {
        let url = reqwest::Url::parse(
            "https://api.geoapify.com/v1/isoline?lat=51.5&apiKey=secret&mode=drive",
        )
        .unwrap();
        let redacted = redact_url(&url);
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("apiKey=***"));
        assert!(redacted.contains("mode=drive"));
    }

    #[test]
    fn missing_key_is_reported() {
        let err = api_key_from_env("DRIVETIME_TEST_KEY_THAT_IS_NEVER_SET").unwrap_err();
        assert!(matches!(
            err,
            TransportError::MissingCredentials { var } if var == "DRIVETIME_TEST_KEY_THAT_IS_NEVER_SET"
        ));
    }
}
