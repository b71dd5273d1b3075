#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative unit and demographic profile types.
//!
//! These are the plain records the boundary overlay produces and consumes.
//! Geometry lives in `drivetime_boundary`; everything here is attribute
//! data that can be serialized into a query summary.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Countries whose wards are loaded when none are configured.
pub const DEFAULT_COUNTRIES: &[&str] = &["England", "Wales"];

/// National median age used for the area comparison when none is
/// configured.
pub const DEFAULT_NATIONAL_MEDIAN_AGE: f64 = 40.5;

/// Demographic attributes of one administrative unit.
///
/// Overlap fragments carry a full copy of this record. Values are never
/// apportioned by the share of the unit an isochrone covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAttributes {
    /// Unique unit code (e.g. `"E05000026"`).
    pub code: String,
    /// Human-readable unit name.
    pub name: String,
    /// Resident population.
    pub population: u64,
    /// Mean resident age.
    pub mean_age: f64,
    /// Median resident age.
    pub median_age: f64,
    /// Country the unit belongs to (e.g. `"England"`).
    pub country: String,
}

/// Where the ward boundary `FeatureCollection` is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundarySource {
    /// A local `GeoJSON` file.
    File {
        /// Path to the file.
        path: String,
    },
    /// A remote `GeoJSON` document fetched over HTTP.
    Url {
        /// Document URL.
        url: String,
    },
}

impl std::fmt::Display for BoundarySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File { path } => write!(f, "file {path}"),
            Self::Url { url } => write!(f, "{url}"),
        }
    }
}

/// One row of the ward population table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRecord {
    /// Ward code joining this row to its boundary.
    #[serde(rename = "wd20cd")]
    pub code: String,
    /// Resident population.
    pub total_population: u64,
    /// Mean resident age.
    pub mean_age: f64,
    /// Median resident age.
    pub median_age: f64,
    /// Country label.
    pub country: String,
}

/// A unit-level attribute that can be averaged or used as a weight.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnitMeasure {
    /// Resident population.
    Population,
    /// Mean resident age.
    MeanAge,
    /// Median resident age.
    MedianAge,
}

impl UnitMeasure {
    /// Reads this measure from a unit's attributes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn value(self, unit: &UnitAttributes) -> f64 {
        match self {
            Self::Population => unit.population as f64,
            Self::MeanAge => unit.mean_age,
            Self::MedianAge => unit.median_age,
        }
    }
}

/// The demographic picture of a reachable area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaProfile {
    /// Population summed over distinct units.
    pub total_population: u64,
    /// Number of distinct units touched.
    pub unit_count: usize,
    /// Number of overlap fragments (a split unit counts once per piece).
    pub fragment_count: usize,
    /// Population-weighted mean age.
    pub weighted_mean_age: f64,
    /// Population-weighted median age.
    pub weighted_median_age: f64,
    /// National median age the area is compared against.
    pub national_median_age: f64,
    /// `weighted_median_age / national_median_age`, `None` when the
    /// national figure is zero.
    pub median_age_ratio: Option<f64>,
}

impl AreaProfile {
    /// Ratio of an area median age to the national one.
    #[must_use]
    pub fn median_age_ratio(weighted_median_age: f64, national_median_age: f64) -> Option<f64> {
        if national_median_age == 0.0 {
            None
        } else {
            Some(weighted_median_age / national_median_age)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    fn unit() -> UnitAttributes {
        UnitAttributes {
            code: "E05000026".to_string(),
            name: "Abbey".to_string(),
            population: 12_500,
            mean_age: 37.2,
            median_age: 35.0,
            country: "England".to_string(),
        }
    }

    #[test]
    fn measure_reads_attribute() {
        let unit = unit();
        assert!((UnitMeasure::Population.value(&unit) - 12_500.0).abs() < f64::EPSILON);
        assert!((UnitMeasure::MeanAge.value(&unit) - 37.2).abs() < f64::EPSILON);
        assert!((UnitMeasure::MedianAge.value(&unit) - 35.0).abs() < f64::EPSILON);
    }

    #[test]
    fn measure_names_are_snake_case() {
        assert_eq!(UnitMeasure::MedianAge.to_string(), "median_age");
        assert_eq!(UnitMeasure::from_str("mean_age").unwrap(), UnitMeasure::MeanAge);
    }

    #[test]
    fn ratio_guards_zero_national() {
        assert_eq!(AreaProfile::median_age_ratio(40.5, 40.5), Some(1.0));
        assert_eq!(AreaProfile::median_age_ratio(40.0, 0.0), None);
    }
}
