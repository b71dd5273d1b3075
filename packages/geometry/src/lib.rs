#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CRS-tagged geometry parsing and shared polygon operations.
//!
//! Every geometry that enters the overlay engine passes through
//! [`parse_feature_collection`], which turns a raw `GeoJSON`
//! `FeatureCollection` into a [`FeatureSet`] tagged with an explicit
//! [`Crs`]. Only EPSG:4326 (longitude/latitude) is accepted.
//!
//! The [`ops`] module holds the polygon primitives that both overlay
//! shapes (polygon-over-polygon and polygon-over-points) are built on:
//! R-tree envelopes, exact clipping, and union.

pub mod crs;
pub mod ops;
pub mod parse;
pub mod point;
pub mod polygon;

pub use crs::{Crs, ensure_same_crs};
pub use parse::{FeatureSet, GeoFeature, parse_feature_collection, parse_feature_collection_str};
pub use point::GeoPoint;
pub use polygon::IsochronePolygon;

use thiserror::Error;

/// Errors raised while parsing or combining geometries.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The input is not a well-formed feature collection, or a feature
    /// lacks a usable geometry or properties map.
    #[error("Malformed geometry: {message}")]
    Malformed {
        /// Description of what was wrong with the input.
        message: String,
    },

    /// The coordinate reference system is missing or not supported.
    #[error("Unsupported CRS: {crs}")]
    UnsupportedCrs {
        /// The offending CRS name or code.
        crs: String,
    },

    /// Two geometry sets with different CRSs were combined.
    #[error("CRS mismatch: {left} vs {right}")]
    CrsMismatch {
        /// CRS of the left-hand operand.
        left: Crs,
        /// CRS of the right-hand operand.
        right: Crs,
    },
}

impl GeometryError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}
