//! Mapbox geocoding and isochrone client.
//!
//! The geocoder takes the address as a path segment
//! (`/geocoding/v5/mapbox.places/{address}.json`), so it is pushed
//! through [`reqwest::Url::path_segments_mut`] to get proper escaping.
//! The isochrone API takes whole minutes, not seconds; durations are
//! rounded up.
//!
//! See <https://docs.mapbox.com/api/navigation/isochrone/>

use async_trait::async_trait;
use drivetime_isochrone_models::{ProviderConfig, TravelMode};

use crate::retry::{self, RetryPolicy};
use crate::{GeocodingService, IsochroneRequest, IsochroneService, TransportError};

/// Mapbox API client.
pub struct MapboxClient {
    client: reqwest::Client,
    provider: ProviderConfig,
    api_key: String,
    policy: RetryPolicy,
}

impl MapboxClient {
    /// Creates a client for the API described by `provider`.
    #[must_use]
    pub const fn new(
        client: reqwest::Client,
        provider: ProviderConfig,
        api_key: String,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            provider,
            api_key,
            policy,
        }
    }

    fn base_url(&self) -> Result<reqwest::Url, TransportError> {
        reqwest::Url::parse(self.provider.base_url()).map_err(|e| TransportError::Url {
            message: format!("{}: {e}", self.provider.base_url()),
        })
    }

    fn geocode_url(&self, address: &str) -> Result<reqwest::Url, TransportError> {
        let mut url = self.base_url()?;
        let segment = format!("{address}.json");
        url.path_segments_mut()
            .map_err(|()| TransportError::Url {
                message: "base URL cannot have path segments".to_string(),
            })?
            .pop_if_empty()
            .extend(["geocoding", "v5", "mapbox.places", segment.as_str()]);
        url.query_pairs_mut()
            .append_pair("country", self.provider.country_code())
            .append_pair("access_token", &self.api_key);
        Ok(url)
    }

    fn isochrone_url(
        &self,
        request: &IsochroneRequest,
        profile: &str,
    ) -> Result<reqwest::Url, TransportError> {
        let mut url = self.base_url()?;
        let origin = format!("{},{}", request.origin.longitude, request.origin.latitude);
        url.path_segments_mut()
            .map_err(|()| TransportError::Url {
                message: "base URL cannot have path segments".to_string(),
            })?
            .pop_if_empty()
            .extend(["isochrone", "v1", "mapbox", profile, origin.as_str()]);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair(
                    "contours_minutes",
                    &contour_minutes(request.duration_seconds).to_string(),
                )
                .append_pair("polygons", "true");
            if let ProviderConfig::Mapbox {
                denoise,
                generalize,
                ..
            } = &self.provider
            {
                query.append_pair("denoise", &denoise.to_string());
                if let Some(generalize) = generalize {
                    query.append_pair("generalize", &generalize.to_string());
                }
            }
            query.append_pair("access_token", &self.api_key);
        }

        Ok(url)
    }
}

/// Converts a duration in seconds to whole minutes, rounding up.
const fn contour_minutes(seconds: u32) -> u32 {
    seconds.div_ceil(60)
}

#[async_trait]
impl GeocodingService for MapboxClient {
    fn name(&self) -> &str {
        "Mapbox"
    }

    async fn geocode(&self, address: &str) -> Result<serde_json::Value, TransportError> {
        let url = self.geocode_url(address)?;
        log::debug!("Mapbox geocode: '{address}'");
        retry::send_json(&self.policy, || self.client.get(url.clone())).await
    }
}

#[async_trait]
impl IsochroneService for MapboxClient {
    fn name(&self) -> &str {
        "Mapbox"
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
                message: format!("no Mapbox profile for {}", request.mode),
            })?;
        let url = self.isochrone_url(request, profile)?;
        log::debug!(
            "Mapbox isochrone: {profile} {} min from ({}, {})",
            contour_minutes(request.duration_seconds),
            request.origin.longitude,
            request.origin.latitude
        );
        retry::send_json(&self.policy, || self.client.get(url.clone())).await
    }
}
