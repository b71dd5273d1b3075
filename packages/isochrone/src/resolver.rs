//! Address → origin point → travel-time polygon.

use std::sync::Arc;

use drivetime_geometry::{Crs, GeoPoint, IsochronePolygon, parse_feature_collection};
use drivetime_isochrone_models::{TravelMode, UpstreamCall};

use crate::{
    GeocodingService, IsochroneError, IsochroneRequest, IsochroneService, ProviderClients,
};

/// A resolved travel-time area.
#[derive(Debug, Clone)]
pub struct ResolvedIsochrone {
    /// The geocoded address.
    pub origin: GeoPoint,
    /// Everything reachable from `origin` within the budget.
    pub isochrone: IsochronePolygon,
    /// How the traveller moves.
    pub mode: TravelMode,
    /// Travel-time budget in seconds.
    pub duration_seconds: u32,
}

/// Runs the geocode then isochrone sequence against a pair of services.
#[derive(Clone)]
pub struct IsochroneResolver {
    geocoder: Arc<dyn GeocodingService>,
    router: Arc<dyn IsochroneService>,
}

impl IsochroneResolver {
    /// Creates a resolver from explicit service handles.
    #[must_use]
    pub fn new(geocoder: Arc<dyn GeocodingService>, router: Arc<dyn IsochroneService>) -> Self {
        Self { geocoder, router }
    }

    /// Creates a resolver from a connected provider.
    #[must_use]
    pub fn from_clients(clients: ProviderClients) -> Self {
        Self::new(clients.geocoder, clients.router)
    }

    /// Geocodes `address` and returns the best match.
    ///
    /// # Errors
    ///
    /// * [`IsochroneError::InvalidParameter`] if the address is blank
    /// * [`IsochroneError::AddressNotFound`] if the geocoder has no match
    /// * [`IsochroneError::Upstream`] if the geocoding call fails
    /// * [`IsochroneError::Geometry`] if the best match is not a point
    pub async fn geocode(&self, address: &str) -> Result<GeoPoint, IsochroneError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(IsochroneError::InvalidParameter {
                message: "address must not be empty".to_string(),
            });
        }

        let raw = self
            .geocoder
            .geocode(address)
            .await
            .map_err(|source| IsochroneError::Upstream {
                call: UpstreamCall::Geocode,
                source,
            })?;

        let results = parse_feature_collection(&raw, Some(Crs::WGS84.code()))?;
        let point = results
            .first_point()?
            .ok_or_else(|| IsochroneError::AddressNotFound {
                address: address.to_string(),
            })?;

        log::debug!(
            "{} geocoded '{address}' to ({}, {}) from {} candidates",
            self.geocoder.name(),
            point.x(),
            point.y(),
            results.len()
        );

        Ok(GeoPoint {
            longitude: point.x(),
            latitude: point.y(),
            crs: results.crs(),
        })
    }

    /// Resolves `address` into the area reachable by `mode` within
    /// `duration_seconds`.
    ///
    /// Parameters are validated before any network call. The isochrone
    /// service is only called once the address has geocoded to a point.
    /// A response with several polygons is unioned into one.
    ///
    /// # Errors
    ///
    /// * [`IsochroneError::InvalidParameter`] for a zero duration or a
    ///   blank address
    /// * [`IsochroneError::UnsupportedMode`] if the router cannot route
    ///   `mode`
    /// * [`IsochroneError::AddressNotFound`] if the address has no match
    /// * [`IsochroneError::Upstream`] naming whichever call failed
    /// * [`IsochroneError::Geometry`] if a response is malformed
    pub async fn resolve(
        &self,
        address: &str,
        mode: TravelMode,
        duration_seconds: u32,
    ) -> Result<ResolvedIsochrone, IsochroneError> {
        if duration_seconds == 0 {
            return Err(IsochroneError::InvalidParameter {
                message: "duration must be greater than zero".to_string(),
            });
        }
        if self.router.profile(mode).is_none() {
            return Err(IsochroneError::UnsupportedMode {
                mode,
                provider: self.router.name().to_string(),
            });
        }

        let origin = self.geocode(address).await?;
        let request = IsochroneRequest {
            origin,
            mode,
            duration_seconds,
        };

        let raw = self
            .router
            .isochrone(&request)
            .await
            .map_err(|source| IsochroneError::Upstream {
                call: UpstreamCall::Isochrone,
                source,
            })?;

        let polygons = parse_feature_collection(&raw, Some(origin.crs.code()))?;
        let polygon = polygons.union_polygons()?;
        let isochrone = IsochronePolygon::new(polygons.crs(), polygon);

        log::info!(
            "Resolved {mode} isochrone for '{}': {} polygon(s), {duration_seconds}s",
            address.trim(),
            isochrone.polygon().0.len()
        );

        Ok(ResolvedIsochrone {
            origin,
            isochrone,
            mode,
            duration_seconds,
        })
    }
}
