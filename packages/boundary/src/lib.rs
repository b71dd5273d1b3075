#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Overlay of a travel-time polygon against administrative units.
//!
//! Units are loaded once by merging a ward boundary `FeatureCollection`
//! with a population table ([`load_units`]) into an R-tree backed
//! [`UnitIndex`]. Each query clips the isochrone against the candidate
//! units ([`overlay`]) and derives population-weighted statistics from the
//! resulting fragments ([`weighted_aggregate`], [`area_profile`]).
//!
//! Fragments carry the whole unit's attributes, so a unit cut into several
//! pieces shows up several times. Aggregation always deduplicates by unit
//! code first.

pub mod aggregate;
pub mod load;
pub mod overlay;
pub mod unit;

pub use aggregate::{area_profile, distinct_units, weighted_aggregate};
pub use load::{fetch_boundaries, load_units, read_population};
pub use overlay::{OverlapFragment, overlay};
pub use unit::{AdministrativeUnit, UnitIndex};

use drivetime_boundary_models::UnitMeasure;
use drivetime_geometry::GeometryError;
use thiserror::Error;

/// Errors raised while loading boundary and population data.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fetching a remote boundary document failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The population table could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The boundary document is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The boundary document is not a usable feature collection.
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// A boundary feature lacks a required property.
    #[error("Boundary feature {index} is missing property '{key}'")]
    MissingProperty {
        /// Feature index in the collection.
        index: usize,
        /// Property name.
        key: &'static str,
    },

    /// A boundary feature is not a polygon or multipolygon.
    #[error("Boundary for unit {code} is not polygonal")]
    NotPolygonal {
        /// Unit code.
        code: String,
    },

    /// The same unit code appears twice in one input.
    #[error("Duplicate unit code {code}")]
    DuplicateCode {
        /// The repeated code.
        code: String,
    },

    /// A population row holds an impossible value.
    #[error("Invalid population record for {code}: {message}")]
    InvalidRecord {
        /// Unit code of the row.
        code: String,
        /// What was wrong.
        message: String,
    },
}

/// Errors raised by the overlay and its aggregates.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// No unit intersects the isochrone. Callers treat this as "no data".
    #[error("Isochrone does not intersect any administrative unit")]
    EmptyOverlay,

    /// The weights of an aggregate sum to zero.
    #[error("Weight '{weight}' sums to zero over the overlay")]
    ZeroWeight {
        /// The weight measure.
        weight: UnitMeasure,
    },

    /// The isochrone and the units disagree on CRS.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
