//! Ward boundary and population loading.
//!
//! Boundaries come as a `GeoJSON` `FeatureCollection` whose features carry
//! `wd20cd` (code) and `wd20nm` (name). Population rows are joined on the
//! code. A boundary with no population row has no country and is dropped
//! along with every unit outside the supported countries.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use drivetime_boundary_models::{BoundarySource, PopulationRecord, UnitAttributes};
use drivetime_geometry::{Crs, FeatureSet, ops, parse_feature_collection};

use crate::{AdministrativeUnit, BoundaryError, UnitIndex};

const CODE_PROPERTY: &str = "wd20cd";
const NAME_PROPERTY: &str = "wd20nm";

/// Reads the boundary `FeatureCollection` from a file or URL.
///
/// # Errors
///
/// Returns [`BoundaryError`] if the document cannot be read, is not JSON,
/// or is not a valid feature collection.
pub async fn fetch_boundaries(
    client: &reqwest::Client,
    source: &BoundarySource,
) -> Result<FeatureSet, BoundaryError> {
    log::info!("Loading ward boundaries from {source}");

    let raw: serde_json::Value = match source {
        BoundarySource::File { path } => {
            let text = tokio::fs::read_to_string(path).await?;
            serde_json::from_str(&text)?
        }
        BoundarySource::Url { url } => {
            client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?
        }
    };

    let features = parse_feature_collection(&raw, Some(Crs::WGS84.code()))?;
    log::info!("Loaded {} boundary features", features.len());
    Ok(features)
}

/// Parses the population table, keyed by unit code.
///
/// # Errors
///
/// Returns [`BoundaryError::Csv`] for unparseable rows,
/// [`BoundaryError::DuplicateCode`] if a code repeats, and
/// [`BoundaryError::InvalidRecord`] for non-finite or negative ages.
pub fn read_population<R: Read>(
    reader: R,
) -> Result<BTreeMap<String, PopulationRecord>, BoundaryError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = BTreeMap::new();

    for result in reader.deserialize::<PopulationRecord>() {
        let record = result?;
        for (label, age) in [("mean_age", record.mean_age), ("median_age", record.median_age)] {
            if !age.is_finite() || age < 0.0 {
                return Err(BoundaryError::InvalidRecord {
                    code: record.code,
                    message: format!("{label} is {age}"),
                });
            }
        }
        if records.contains_key(&record.code) {
            return Err(BoundaryError::DuplicateCode { code: record.code });
        }
        records.insert(record.code.clone(), record);
    }

    log::debug!("Read {} population rows", records.len());
    Ok(records)
}

/// Merges boundaries with population rows into a [`UnitIndex`].
///
/// Only units whose country is in `countries` are kept.
///
/// # Errors
///
/// Returns [`BoundaryError`] if the population table is invalid, a
/// boundary feature lacks its code or name, a boundary is not polygonal,
/// or a boundary code repeats.
pub fn load_units<R: Read>(
    boundaries: &FeatureSet,
    population: R,
    countries: &[String],
) -> Result<UnitIndex, BoundaryError> {
    let mut population = read_population(population)?;
    let mut seen = BTreeSet::new();
    let mut units = Vec::new();
    let mut unmatched = 0usize;
    let mut excluded = 0usize;

    for (index, feature) in boundaries.features().iter().enumerate() {
        let code = feature
            .property_str(CODE_PROPERTY)
            .ok_or(BoundaryError::MissingProperty {
                index,
                key: CODE_PROPERTY,
            })?;
        let name = feature
            .property_str(NAME_PROPERTY)
            .ok_or(BoundaryError::MissingProperty {
                index,
                key: NAME_PROPERTY,
            })?;

        if !seen.insert(code) {
            return Err(BoundaryError::DuplicateCode {
                code: code.to_string(),
            });
        }

        let Some(record) = population.remove(code) else {
            unmatched += 1;
            continue;
        };
        if !countries.iter().any(|c| c == &record.country) {
            excluded += 1;
            continue;
        }

        let boundary = ops::to_multi_polygon(feature.geometry.clone()).ok_or_else(|| {
            BoundaryError::NotPolygonal {
                code: code.to_string(),
            }
        })?;

        units.push(AdministrativeUnit::new(
            UnitAttributes {
                code: record.code,
                name: name.to_string(),
                population: record.total_population,
                mean_age: record.mean_age,
                median_age: record.median_age,
                country: record.country,
            },
            boundary,
        ));
    }

    log::info!(
        "Loaded {} administrative units ({unmatched} without population, \
         {excluded} outside {countries:?})",
        units.len()
    );

    Ok(UnitIndex::new(boundaries.crs(), units))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const POPULATION: &str = "\
wd20cd,total_population,mean_age,median_age,country
E1,10000,41.2,40,England
W1,4000,44.0,45,Wales
S1,3000,39.0,38,Scotland
";

    fn square(code: &str, name: &str, x0: f64) -> serde_json::Value {
        json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[x0, 0.0], [x0 + 1.0, 0.0], [x0 + 1.0, 1.0], [x0, 1.0], [x0, 0.0]]]
            },
            "properties": { "wd20cd": code, "wd20nm": name }
        })
    }

    fn boundaries(features: Vec<serde_json::Value>) -> FeatureSet {
        parse_feature_collection(
            &json!({ "type": "FeatureCollection", "features": features }),
            Some(4326),
        )
        .unwrap()
    }

    fn supported() -> Vec<String> {
        vec!["England".to_string(), "Wales".to_string()]
    }

    #[test]
    fn merges_and_filters_by_country() {
        let fc = boundaries(vec![
            square("E1", "Abbey", 0.0),
            square("W1", "Aber", 1.0),
            square("S1", "Leith", 2.0),
            square("N1", "Nowhere", 3.0),
        ]);

        let index = load_units(&fc, POPULATION.as_bytes(), &supported()).unwrap();
        assert_eq!(index.len(), 2);

        let abbey = index.get("E1").unwrap().attributes();
        assert_eq!(abbey.name, "Abbey");
        assert_eq!(abbey.population, 10_000);
        assert!((abbey.median_age - 40.0).abs() < f64::EPSILON);
        assert!(index.get("S1").is_none());
        assert!(index.get("N1").is_none());
    }

    #[test]
    fn duplicate_population_code_fails() {
        let csv = "wd20cd,total_population,mean_age,median_age,country\n\
                   E1,1,40,40,England\n\
                   E1,2,40,40,England\n";
        let err = read_population(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, BoundaryError::DuplicateCode { code } if code == "E1"));
    }

    #[test]
    fn duplicate_boundary_code_fails() {
        let fc = boundaries(vec![square("E1", "Abbey", 0.0), square("E1", "Abbey", 1.0)]);
        let err = load_units(&fc, POPULATION.as_bytes(), &supported()).unwrap_err();
        assert!(matches!(err, BoundaryError::DuplicateCode { .. }));
    }

    #[test]
    fn missing_name_fails() {
        let mut feature = square("E1", "Abbey", 0.0);
        feature["properties"] = json!({ "wd20cd": "E1" });
        let err = load_units(&boundaries(vec![feature]), POPULATION.as_bytes(), &supported())
            .unwrap_err();
        assert!(matches!(
            err,
            BoundaryError::MissingProperty { index: 0, key: "wd20nm" }
        ));
    }

    #[test]
    fn bad_rows_are_errors() {
        let csv = "wd20cd,total_population,mean_age,median_age,country\nE1,lots,40,40,England\n";
        assert!(matches!(
            read_population(csv.as_bytes()).unwrap_err(),
            BoundaryError::Csv(_)
        ));

        let csv = "wd20cd,total_population,mean_age,median_age,country\nE1,5,-1,40,England\n";
        assert!(matches!(
            read_population(csv.as_bytes()).unwrap_err(),
            BoundaryError::InvalidRecord { .. }
        ));
    }

    #[tokio::test]
    async fn reads_boundaries_from_file() {
        let path = std::env::temp_dir().join(format!(
            "drivetime_boundaries_{}.geojson",
            std::process::id()
        ));
        let fc = json!({ "type": "FeatureCollection", "features": [square("E1", "Abbey", 0.0)] });
        std::fs::write(&path, fc.to_string()).unwrap();

        let source = BoundarySource::File {
            path: path.display().to_string(),
        };
        let features = fetch_boundaries(&reqwest::Client::new(), &source).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(features.len(), 1);
        assert_eq!(features.features()[0].property_str("wd20cd"), Some("E1"));
    }
}
