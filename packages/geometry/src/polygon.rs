//! The CRS-tagged clipping polygon both overlays run against.

use geo::{Area as _, MultiPolygon};
use rstar::AABB;

use crate::{Crs, ops};

/// A travel-time polygon: every point reachable from an origin within a
/// time budget.
#[derive(Debug, Clone)]
pub struct IsochronePolygon {
    crs: Crs,
    polygon: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl IsochronePolygon {
    /// Wraps a polygon with its CRS.
    #[must_use]
    pub fn new(crs: Crs, polygon: MultiPolygon<f64>) -> Self {
        let envelope = ops::envelope(&polygon);
        Self {
            crs,
            polygon,
            envelope,
        }
    }

    /// CRS of the polygon.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// The reachable area.
    #[must_use]
    pub const fn polygon(&self) -> &MultiPolygon<f64> {
        &self.polygon
    }

    /// Bounding-box envelope, used to prefilter R-tree candidates.
    #[must_use]
    pub const fn envelope(&self) -> &AABB<[f64; 2]> {
        &self.envelope
    }

    /// Planar area in squared CRS units.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }
}
