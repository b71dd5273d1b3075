//! Isochrone × unit intersection.

use drivetime_boundary_models::UnitAttributes;
use drivetime_geometry::{IsochronePolygon, ensure_same_crs, ops};
use geo::{Area as _, MultiPolygon};

use crate::{OverlayError, UnitIndex};

/// One connected piece of the intersection between an isochrone and a
/// unit, carrying an unapportioned copy of the unit's attributes.
#[derive(Debug, Clone)]
pub struct OverlapFragment {
    /// Attributes of the source unit.
    pub attributes: UnitAttributes,
    /// The clipped geometry, for display.
    pub geometry: MultiPolygon<f64>,
}

impl OverlapFragment {
    /// Code of the source unit.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.attributes.code
    }

    /// Planar area of the fragment.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }
}

/// Clips `isochrone` against every unit in `units`.
///
/// Candidates come from the R-tree envelope query; each is intersected
/// exactly. An intersection made of several disjoint polygons yields one
/// fragment per polygon. Results are ordered by unit code.
///
/// An empty result is `Ok(vec![])`; [`crate::weighted_aggregate`] turns it
/// into [`OverlayError::EmptyOverlay`].
///
/// # Errors
///
/// Returns [`OverlayError::Geometry`] if the isochrone and the units are
/// in different CRSs.
pub fn overlay(
    isochrone: &IsochronePolygon,
    units: &UnitIndex,
) -> Result<Vec<OverlapFragment>, OverlayError> {
    ensure_same_crs(isochrone.crs(), units.crs())?;

    let mut candidates = 0usize;
    let mut fragments = Vec::new();

    for unit in units.candidates(isochrone.envelope()) {
        candidates += 1;
        let Some(clipped) = ops::clip(unit.boundary(), isochrone.polygon()) else {
            continue;
        };

        for piece in clipped {
            let geometry = MultiPolygon(vec![piece]);
            if geometry.unsigned_area() > 0.0 {
                fragments.push(OverlapFragment {
                    attributes: unit.attributes().clone(),
                    geometry,
                });
            }
        }
    }

    fragments.sort_by(|a, b| a.attributes.code.cmp(&b.attributes.code));

    log::debug!(
        "Overlay: {candidates} candidate units, {} fragments",
        fragments.len()
    );

    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use drivetime_geometry::{Crs, GeometryError};
    use geo::{Polygon, Rect, coord};

    use super::*;
    use crate::AdministrativeUnit;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()
    }

    fn attributes(code: &str, population: u64) -> UnitAttributes {
        UnitAttributes {
            code: code.to_string(),
            name: format!("Ward {code}"),
            population,
            mean_age: 38.0,
            median_age: 40.0,
            country: "England".to_string(),
        }
    }

    fn grid() -> UnitIndex {
        UnitIndex::new(
            Crs::WGS84,
            vec![
                AdministrativeUnit::new(
                    attributes("U2", 200),
                    MultiPolygon(vec![rect(1.0, 0.0, 2.0, 1.0)]),
                ),
                AdministrativeUnit::new(
                    attributes("U1", 100),
                    MultiPolygon(vec![rect(0.0, 0.0, 1.0, 1.0)]),
                ),
                AdministrativeUnit::new(
                    attributes("U3", 300),
                    MultiPolygon(vec![rect(5.0, 5.0, 6.0, 6.0)]),
                ),
            ],
        )
    }

    #[test]
    fn fragments_are_non_empty_and_bounded_by_isochrone() {
        let isochrone = IsochronePolygon::new(
            Crs::WGS84,
            MultiPolygon(vec![rect(0.5, 0.25, 1.5, 0.75)]),
        );
        let fragments = overlay(&isochrone, &grid()).unwrap();

        let codes: Vec<&str> = fragments.iter().map(OverlapFragment::code).collect();
        assert_eq!(codes, vec!["U1", "U2"]);
        assert!(fragments.iter().all(|f| f.area() > 0.0));

        let total: f64 = fragments.iter().map(OverlapFragment::area).sum();
        assert!(total <= isochrone.area() + 1e-9);
        assert!((total - 0.5).abs() < 1e-9);
    }

    #[test]
    fn attributes_are_copied_not_apportioned() {
        let isochrone = IsochronePolygon::new(
            Crs::WGS84,
            MultiPolygon(vec![rect(0.0, 0.0, 0.1, 0.1)]),
        );
        let fragments = overlay(&isochrone, &grid()).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].attributes.population, 100);
    }

    #[test]
    fn split_unit_yields_one_fragment_per_piece() {
        let units = UnitIndex::new(
            Crs::WGS84,
            vec![AdministrativeUnit::new(
                attributes("U1", 5_000),
                MultiPolygon(vec![rect(0.0, 0.0, 3.0, 1.0)]),
            )],
        );
        let isochrone = IsochronePolygon::new(
            Crs::WGS84,
            MultiPolygon(vec![rect(0.0, 0.0, 1.0, 1.0), rect(2.0, 0.0, 3.0, 1.0)]),
        );

        let fragments = overlay(&isochrone, &units).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments.iter().all(|f| f.code() == "U1"));
    }

    #[test]
    fn touching_only_is_not_an_overlap() {
        let isochrone = IsochronePolygon::new(
            Crs::WGS84,
            MultiPolygon(vec![rect(2.0, 0.0, 3.0, 1.0)]),
        );
        assert!(overlay(&isochrone, &grid()).unwrap().is_empty());
    }

    #[test]
    fn rejects_crs_mismatch() {
        let isochrone = IsochronePolygon::new(
            Crs::epsg(27700),
            MultiPolygon(vec![rect(0.0, 0.0, 1.0, 1.0)]),
        );
        let err = overlay(&isochrone, &grid()).unwrap_err();
        assert!(matches!(
            err,
            OverlayError::Geometry(GeometryError::CrsMismatch { .. })
        ));
    }
}
