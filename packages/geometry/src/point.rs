//! CRS-tagged points.

use serde::{Deserialize, Serialize};

use crate::Crs;

/// A longitude/latitude pair tagged with its CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude (x).
    pub longitude: f64,
    /// Latitude (y).
    pub latitude: f64,
    /// Coordinate reference system of the pair.
    pub crs: Crs,
}

impl GeoPoint {
    /// Creates a WGS84 point.
    #[must_use]
    pub const fn wgs84(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            crs: Crs::WGS84,
        }
    }

    /// Returns the point as a [`geo::Point`] (x = longitude).
    #[must_use]
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}
