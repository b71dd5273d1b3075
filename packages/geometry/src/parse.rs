//! Normalizes raw `GeoJSON` feature collections into [`FeatureSet`]s.
//!
//! Unlike a permissive reader, every feature must carry both a geometry
//! and a properties object; anything else is rejected with the feature
//! index so bad upstream payloads are easy to trace.

use geo::{Geometry, MultiPolygon, Point};

use crate::crs::legacy_crs_code;
use crate::{Crs, GeometryError, ops};

/// A single feature: converted geometry plus its untyped properties.
///
/// Properties stay untyped here; each consumer validates them into its
/// own record type at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    /// Feature geometry in the collection's CRS.
    pub geometry: Geometry<f64>,
    /// The feature's `properties` object.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl GeoFeature {
    /// Returns a trimmed, non-empty string property.
    #[must_use]
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns a numeric property, accepting numbers encoded as strings.
    #[must_use]
    pub fn property_f64(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A parsed feature collection tagged with its CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    crs: Crs,
    features: Vec<GeoFeature>,
}

impl FeatureSet {
    /// Builds a feature set from already-converted features.
    #[must_use]
    pub const fn new(crs: Crs, features: Vec<GeoFeature>) -> Self {
        Self { crs, features }
    }

    /// CRS shared by every feature in the set.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// The parsed features in input order.
    #[must_use]
    pub fn features(&self) -> &[GeoFeature] {
        &self.features
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the set has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns the first feature's geometry as a point.
    ///
    /// Returns `Ok(None)` for an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Malformed`] if the first feature is not a
    /// point.
    pub fn first_point(&self) -> Result<Option<Point<f64>>, GeometryError> {
        let Some(first) = self.features.first() else {
            return Ok(None);
        };

        match &first.geometry {
            Geometry::Point(p) => Ok(Some(*p)),
            other => Err(GeometryError::malformed(format!(
                "expected a point for feature 0, found {}",
                geometry_kind(other)
            ))),
        }
    }

    /// Unions every polygonal feature into one [`MultiPolygon`].
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Malformed`] if a feature is not a polygon
    /// or multipolygon, or if the set holds no polygons at all.
    pub fn union_polygons(&self) -> Result<MultiPolygon<f64>, GeometryError> {
        let mut parts = Vec::with_capacity(self.features.len());
        for (index, feature) in self.features.iter().enumerate() {
            let kind = geometry_kind(&feature.geometry);
            let mp = ops::to_multi_polygon(feature.geometry.clone()).ok_or_else(|| {
                GeometryError::malformed(format!("feature {index} is a {kind}, expected a polygon"))
            })?;
            parts.push(mp);
        }

        if parts.is_empty() {
            return Err(GeometryError::malformed("feature collection has no polygons"));
        }

        Ok(ops::union_all(parts))
    }
}

/// Parses a `GeoJSON` `FeatureCollection` into a CRS-tagged [`FeatureSet`].
///
/// `epsg` is the CRS the caller asserts the payload is in. A legacy
/// `crs` member inside the payload must agree with it.
///
/// # Errors
///
/// Returns [`GeometryError::UnsupportedCrs`] if `epsg` is missing or
/// unsupported or contradicts the payload, and
/// [`GeometryError::Malformed`] if the payload is not a feature
/// collection or any feature lacks a geometry or properties.
pub fn parse_feature_collection(
    raw: &serde_json::Value,
    epsg: Option<u32>,
) -> Result<FeatureSet, GeometryError> {
    let crs = Crs::from_epsg(epsg)?;

    match legacy_crs_code(raw)? {
        Some(declared) if declared != crs.code() => {
            return Err(GeometryError::UnsupportedCrs {
                crs: format!("EPSG:{declared} (expected {crs})"),
            });
        }
        _ => {}
    }

    if raw.get("type").and_then(serde_json::Value::as_str) != Some("FeatureCollection") {
        return Err(GeometryError::malformed("payload is not a FeatureCollection"));
    }

    let raw_features = raw
        .get("features")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| GeometryError::malformed("FeatureCollection missing 'features' array"))?;

    let features = raw_features
        .iter()
        .enumerate()
        .map(|(index, feature)| parse_feature(index, feature))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Parsed {} features ({crs})", features.len());

    Ok(FeatureSet { crs, features })
}

/// String convenience wrapper around [`parse_feature_collection`].
///
/// # Errors
///
/// Returns [`GeometryError::Malformed`] if `raw` is not valid JSON, plus
/// every error [`parse_feature_collection`] can return.
pub fn parse_feature_collection_str(
    raw: &str,
    epsg: Option<u32>,
) -> Result<FeatureSet, GeometryError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| GeometryError::malformed(format!("invalid JSON: {e}")))?;
    parse_feature_collection(&value, epsg)
}

fn parse_feature(index: usize, feature: &serde_json::Value) -> Result<GeoFeature, GeometryError> {
    let geometry = feature
        .get("geometry")
        .filter(|g| !g.is_null())
        .ok_or_else(|| GeometryError::malformed(format!("feature {index} has no geometry")))?;

    let properties = feature
        .get("properties")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| {
            GeometryError::malformed(format!("feature {index} has no properties object"))
        })?;

    let geometry: geojson::Geometry = serde_json::from_value(geometry.clone()).map_err(|e| {
        GeometryError::malformed(format!("feature {index} has invalid geometry: {e}"))
    })?;

    let geometry: Geometry<f64> = geometry.try_into().map_err(|e: geojson::Error| {
        GeometryError::malformed(format!("feature {index} geometry not convertible: {e}"))
    })?;

    Ok(GeoFeature {
        geometry,
        properties: properties.clone(),
    })
}

const fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use geo::Area as _;

    use super::*;

    fn square_feature(x: f64, y: f64, size: f64) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]
                ]]
            },
            "properties": { "name": "square" }
        })
    }

    #[test]
    fn parses_polygon_collection() {
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "features": [square_feature(0.0, 0.0, 1.0)]
        });
        let set = parse_feature_collection(&raw, Some(4326)).unwrap();
        assert_eq!(set.crs(), Crs::WGS84);
        assert_eq!(set.len(), 1);
        assert_eq!(set.features()[0].property_str("name"), Some("square"));
    }

    #[test]
    fn rejects_missing_geometry() {
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                square_feature(0.0, 0.0, 1.0),
                { "type": "Feature", "geometry": null, "properties": {} }
            ]
        });
        let err = parse_feature_collection(&raw, Some(4326)).unwrap_err();
        assert!(
            matches!(&err, GeometryError::Malformed { message } if message.contains("feature 1")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_missing_properties() {
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [0.0, 51.5] }
            }]
        });
        assert!(matches!(
            parse_feature_collection(&raw, Some(4326)),
            Err(GeometryError::Malformed { .. })
        ));
    }

    #[test]
    fn rejects_unspecified_crs() {
        let raw = serde_json::json!({ "type": "FeatureCollection", "features": [] });
        assert!(matches!(
            parse_feature_collection(&raw, None),
            Err(GeometryError::UnsupportedCrs { .. })
        ));
    }

    #[test]
    fn rejects_contradicting_crs_member() {
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "EPSG:27700" } },
            "features": []
        });
        assert!(matches!(
            parse_feature_collection(&raw, Some(4326)),
            Err(GeometryError::UnsupportedCrs { .. })
        ));
    }

    #[test]
    fn rejects_non_collection() {
        let raw = serde_json::json!({ "type": "Feature", "geometry": null, "properties": {} });
        assert!(matches!(
            parse_feature_collection(&raw, Some(4326)),
            Err(GeometryError::Malformed { .. })
        ));
        assert!(matches!(
            parse_feature_collection_str("{not json", Some(4326)),
            Err(GeometryError::Malformed { .. })
        ));
    }

    #[test]
    fn first_point_of_geocode_response() {
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [-0.1419, 51.5014] },
                    "properties": { "formatted": "Buckingham Palace" }
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [-2.0, 53.0] },
                    "properties": {}
                }
            ]
        });
        let set = parse_feature_collection(&raw, Some(4326)).unwrap();
        let point = set.first_point().unwrap().unwrap();
        assert!((point.x() - -0.1419).abs() < 1e-9);
        assert!((point.y() - 51.5014).abs() < 1e-9);

        let empty = FeatureSet::new(Crs::WGS84, vec![]);
        assert!(empty.first_point().unwrap().is_none());
    }

    #[test]
    fn unions_overlapping_polygons() {
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "features": [square_feature(0.0, 0.0, 2.0), square_feature(1.0, 0.0, 2.0)]
        });
        let set = parse_feature_collection(&raw, Some(4326)).unwrap();
        let union = set.union_polygons().unwrap();
        assert!((union.unsigned_area() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn union_rejects_points() {
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [0.0, 0.0] },
                "properties": {}
            }]
        });
        let set = parse_feature_collection(&raw, Some(4326)).unwrap();
        assert!(matches!(set.union_polygons(), Err(GeometryError::Malformed { .. })));
    }

    #[test]
    fn numeric_properties_accept_strings() {
        let feature = GeoFeature {
            geometry: Geometry::Point(Point::new(0.0, 0.0)),
            properties: serde_json::json!({ "a": 1.5, "b": " 2 ", "c": true })
                .as_object()
                .unwrap()
                .clone(),
        };
        assert_eq!(feature.property_f64("a"), Some(1.5));
        assert_eq!(feature.property_f64("b"), Some(2.0));
        assert_eq!(feature.property_f64("c"), None);
        assert_eq!(feature.property_f64("missing"), None);
    }
}
