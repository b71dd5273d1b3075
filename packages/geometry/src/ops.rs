//! Polygon primitives shared by the boundary and price overlays.

use geo::{Area as _, BooleanOps as _, BoundingRect as _, Geometry, MultiPolygon};
use rstar::AABB;

/// Converts a polygonal geometry into a [`MultiPolygon`].
///
/// Returns `None` for any non-polygonal geometry.
#[must_use]
pub fn to_multi_polygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        Geometry::Rect(r) => Some(MultiPolygon(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon(vec![t.to_polygon()])),
        _ => None,
    }
}

/// Computes the R-tree bounding-box envelope for a [`MultiPolygon`].
///
/// An empty multipolygon gets a degenerate envelope at the origin.
#[must_use]
pub fn envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

/// Exact intersection of `subject` with `clip`.
///
/// Returns `None` when the two only touch or do not meet at all, i.e.
/// when the intersection has no area.
#[must_use]
pub fn clip(subject: &MultiPolygon<f64>, clip: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    let result = subject.intersection(clip);
    if result.0.is_empty() || result.unsigned_area() <= 0.0 {
        None
    } else {
        Some(result)
    }
}

/// Unions a sequence of multipolygons into one.
#[must_use]
pub fn union_all(parts: impl IntoIterator<Item = MultiPolygon<f64>>) -> MultiPolygon<f64> {
    let mut iter = parts.into_iter();
    let Some(first) = iter.next() else {
        return MultiPolygon(vec![]);
    };
    iter.fold(first, |acc, next| acc.union(&next))
}
