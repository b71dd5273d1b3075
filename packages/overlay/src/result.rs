//! Query output and its serializable renderings.

use drivetime_boundary::{OverlapFragment, distinct_units};
use drivetime_boundary_models::AreaProfile;
use drivetime_geometry::GeoPoint;
use drivetime_isochrone::ResolvedIsochrone;
use drivetime_isochrone_models::TravelMode;
use drivetime_prices_models::{JoinStrategy, NationalComparison, PriceSummary};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EngineError;

/// Everything one query produced.
#[derive(Debug, Clone)]
pub struct OverlayResult {
    /// The address as given.
    pub address: String,
    /// Origin and travel-time polygon.
    pub resolved: ResolvedIsochrone,
    /// Overlap with each unit, ordered by unit code.
    pub fragments: Vec<OverlapFragment>,
    /// Weighted profile of the distinct units, `None` when nothing
    /// overlaps.
    pub demographics: Option<AreaProfile>,
    /// How prices were joined.
    pub strategy: JoinStrategy,
    /// Hex cells used by a hex join, empty for a direct join.
    pub hex_ids: Vec<String>,
    /// Price figures for the area, `None` when no sale matched.
    pub prices: Option<PriceSummary>,
    /// Figures for the whole dataset.
    pub national: Option<PriceSummary>,
    /// Area figures relative to `national`.
    pub comparison: Option<NationalComparison>,
}

/// Flat, serializable view of an [`OverlayResult`] without geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySummary {
    /// Address as given in the request.
    pub address: String,
    /// Geocoded origin of the isochrone.
    pub origin: GeoPoint,
    /// Travel mode.
    pub mode: TravelMode,
    /// Travel-time budget in seconds.
    pub duration_seconds: u32,
    /// Planar area in squared degrees.
    pub isochrone_area: f64,
    /// Distinct unit codes touched, sorted.
    pub unit_codes: Vec<String>,
    /// Number of unit fragments.
    pub fragment_count: usize,
    /// Population-weighted profile, `None` if no unit overlaps.
    pub demographics: Option<AreaProfile>,
    /// Price join strategy used.
    pub strategy: JoinStrategy,
    /// Hex cells joined, 0 for a direct join.
    pub hex_cell_count: usize,
    /// Prices inside the isochrone, `None` if nothing was joined.
    pub prices: Option<PriceSummary>,
    /// Summary of the whole dataset.
    pub national: Option<PriceSummary>,
    /// Percent differences of `prices` against `national`.
    pub comparison: Option<NationalComparison>,
}

impl OverlayResult {
    /// Codes of the distinct units touched, in code order.
    #[must_use]
    pub fn unit_codes(&self) -> Vec<String> {
        distinct_units(&self.fragments)
            .into_iter()
            .map(|unit| unit.code.clone())
            .collect()
    }

    /// The geometry-free summary.
    #[must_use]
    pub fn summary(&self) -> OverlaySummary {
        OverlaySummary {
            address: self.address.clone(),
            origin: self.resolved.origin,
            mode: self.resolved.mode,
            duration_seconds: self.resolved.duration_seconds,
            isochrone_area: self.resolved.isochrone.area(),
            unit_codes: self.unit_codes(),
            fragment_count: self.fragments.len(),
            demographics: self.demographics.clone(),
            strategy: self.strategy,
            hex_cell_count: self.hex_ids.len(),
            prices: self.prices,
            national: self.national,
            comparison: self.comparison,
        }
    }

    /// Renders the origin, the isochrone and every fragment as one
    /// `GeoJSON` `FeatureCollection`. Each feature has a `kind` property
    /// (`origin`, `isochrone` or `fragment`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Json`] if serialization fails.
    pub fn to_geojson(&self) -> Result<Value, EngineError> {
        let mut features = Vec::with_capacity(self.fragments.len() + 2);

        let mut origin = Map::new();
        origin.insert("kind".to_string(), "origin".into());
        origin.insert("address".to_string(), self.address.clone().into());
        features.push(feature(
            geojson::Value::from(&self.resolved.origin.to_point()),
            origin,
        ));

        let mut isochrone = Map::new();
        isochrone.insert("kind".to_string(), "isochrone".into());
        isochrone.insert("mode".to_string(), self.resolved.mode.to_string().into());
        isochrone.insert(
            "durationSeconds".to_string(),
            self.resolved.duration_seconds.into(),
        );
        features.push(feature(
            geojson::Value::from(self.resolved.isochrone.polygon()),
            isochrone,
        ));

        for fragment in &self.fragments {
            let mut properties = match serde_json::to_value(&fragment.attributes)? {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            properties.insert("kind".to_string(), "fragment".into());
            features.push(feature(geojson::Value::from(&fragment.geometry), properties));
        }

        let collection = geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        Ok(serde_json::to_value(&collection)?)
    }
}

fn feature(geometry: geojson::Value, properties: Map<String, Value>) -> geojson::Feature {
    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use drivetime_boundary_models::UnitAttributes;
    use drivetime_geometry::{Crs, IsochronePolygon, parse_feature_collection};
    use drivetime_prices_models::SummaryMethod;

    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> IsochronePolygon {
        let raw = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size], [x0, y0]]]
                },
                "properties": {}
            }]
        });
        let polygon = parse_feature_collection(&raw, Some(4326))
            .unwrap()
            .union_polygons()
            .unwrap();
        IsochronePolygon::new(Crs::WGS84, polygon)
    }

    fn fragment(code: &str, x0: f64) -> OverlapFragment {
        OverlapFragment {
            attributes: UnitAttributes {
                code: code.to_string(),
                name: format!("Ward {code}"),
                population: 1_000,
                mean_age: 38.0,
                median_age: 36.0,
                country: "England".to_string(),
            },
            geometry: square(x0, 0.0, 0.5).polygon().clone(),
        }
    }

    fn result() -> OverlayResult {
        let summary = PriceSummary {
            method: SummaryMethod::Exact,
            median_price: 250_000.0,
            mean_price: 275_000.0,
            total_paid: 550_000.0,
            count: 2,
        };
        OverlayResult {
            address: "10 Downing Street".to_string(),
            resolved: ResolvedIsochrone {
                origin: GeoPoint::wgs84(0.5, 0.5),
                isochrone: square(0.0, 0.0, 1.0),
                mode: TravelMode::Drive,
                duration_seconds: 600,
            },
            fragments: vec![fragment("E1", 0.0), fragment("E1", 0.5), fragment("E2", 0.5)],
            demographics: None,
            strategy: JoinStrategy::Direct,
            hex_ids: vec![],
            prices: Some(summary),
            national: Some(summary),
            comparison: None,
        }
    }

    #[test]
    fn summary_lists_distinct_units() {
        let summary = result().summary();
        assert_eq!(summary.unit_codes, vec!["E1", "E2"]);
        assert_eq!(summary.fragment_count, 3);
        assert!((summary.isochrone_area - 1.0).abs() < 1e-12);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["durationSeconds"], 600);
        assert_eq!(json["mode"], "drive");
        assert_eq!(json["strategy"], "direct");
    }

    #[test]
    fn geojson_has_origin_isochrone_and_fragments() {
        let json = result().to_geojson().unwrap();
        let features = json["features"].as_array().unwrap();
        assert_eq!(features.len(), 5);
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(features[0]["properties"]["kind"], "origin");
        assert_eq!(features[1]["properties"]["kind"], "isochrone");
        assert_eq!(features[1]["properties"]["mode"], "drive");
        assert_eq!(features[2]["properties"]["kind"], "fragment");
        assert_eq!(features[2]["properties"]["code"], "E1");
        assert_eq!(features[2]["geometry"]["type"], "MultiPolygon");
    }
}
