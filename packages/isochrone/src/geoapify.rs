//! Geoapify geocoding and isoline client.
//!
//! Both endpoints answer with `GeoJSON` `FeatureCollection`s: geocoding
//! results are ranked points, isolines are (multi)polygons.
//!
//! See <https://apidocs.geoapify.com/docs/geocoding/forward-geocoding/>
//! and <https://apidocs.geoapify.com/docs/isolines/>

use async_trait::async_trait;
use drivetime_isochrone_models::{ProviderConfig, TravelMode};

use crate::retry::{self, RetryPolicy};
use crate::{GeocodingService, IsochroneRequest, IsochroneService, TransportError};

/// Geoapify API client.
pub struct GeoapifyClient {
    client: reqwest::Client,
    provider: ProviderConfig,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl GeoapifyClient {
    /// Creates a client for the API described by `provider`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        provider: ProviderConfig,
        api_key: String,
        policy: RetryPolicy,
    ) -> Self {
        let base_url = provider.base_url().trim_end_matches('/').to_string();
        Self {
            client,
            provider,
            base_url,
            api_key,
            policy,
        }
    }

    fn geocode_params(&self, address: &str) -> Vec<(&'static str, String)> {
        vec![
            ("text", address.to_string()),
            ("filter", format!("countrycode:{}", self.provider.country_code())),
            ("format", "geojson".to_string()),
            ("apiKey", self.api_key.clone()),
        ]
    }

    fn isoline_params(
        &self,
        request: &IsochroneRequest,
        profile: &str,
    ) -> Vec<(&'static str, String)> {
        vec![
            ("lat", request.origin.latitude.to_string()),
            ("lon", request.origin.longitude.to_string()),
            ("type", "time".to_string()),
            ("mode", profile.to_string()),
            ("range", request.duration_seconds.to_string()),
            ("apiKey", self.api_key.clone()),
        ]
    }
}

#[async_trait]
impl GeocodingService for GeoapifyClient {
    fn name(&self) -> &str {
        "Geoapify"
    }

    async fn geocode(&self, address: &str) -> Result<serde_json::Value, TransportError> {
        let url = format!("{}/v1/geocode/search", self.base_url);
        let params = self.geocode_params(address);
        log::debug!("Geoapify geocode: '{address}'");
        retry::send_json(&self.policy, || self.client.get(&url).query(&params)).await
    }
}

#[async_trait]
impl IsochroneService for GeoapifyClient {
    fn name(&self) -> &str {
        "Geoapify"
    }

    fn profile(&self, mode: TravelMode) -> Option<&'static str> {
        self.provider.profile(mode)
    }

    async fn isochrone(
        &self,
        request: &IsochroneRequest,
    ) -> Result<serde_json::Value, TransportError> {
        let profile = self
            .profile(request.mode)
            .ok_or_else(|| TransportError::Url {
                message: format!("no Geoapify mode for {}", request.mode),
            })?;
        let url = format!("{}/v1/isoline", self.base_url);
        let params = self.isoline_params(request, profile);
        log::debug!(
            "Geoapify isoline: {profile} {}s from ({}, {})",
            request.duration_seconds,
            request.origin.longitude,
            request.origin.latitude
        );
        retry::send_json(&self.policy, || self.client.get(&url).query(&params)).await
    }
}
