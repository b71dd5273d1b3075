#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Price-paid data: loading, H3 hex aggregation and joins against a
//! reachable area.
//!
//! The dataset is loaded once ([`load_prices`]) and outlier-trimmed. A
//! query then relates its area to the sales either directly
//! ([`PriceIndex`]) or through precomputed hex cells
//! ([`hex::build`], [`join::join_hex_cells`]), and summarizes the result
//! against the national figures ([`join::compare_to_national`]).

pub mod dataset;
pub mod hex;
pub mod join;

pub use dataset::{PriceDataset, load_prices, read_prices};
pub use hex::{HexCache, HexCell};
pub use join::{
    PriceIndex, compare_to_national, join_hex_cells, summarize_cells, summarize_points,
};

use drivetime_geometry::GeometryError;
use thiserror::Error;

/// Errors raised by price loading and aggregation.
#[derive(Debug, Error)]
pub enum PriceError {
    /// Reading a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The price table could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Hex cells could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A price row parsed but holds an impossible value.
    #[error("Invalid price record on line {line}: {message}")]
    InvalidRecord {
        /// 1-based line in the CSV, counting the header.
        line: u64,
        /// What was wrong.
        message: String,
    },

    /// A coordinate cannot be placed on the H3 grid.
    #[error("Invalid coordinate ({longitude}, {latitude})")]
    InvalidCoordinate {
        /// Longitude.
        longitude: f64,
        /// Latitude.
        latitude: f64,
    },

    /// An H3 resolution outside 0..=15.
    #[error("Invalid H3 resolution {resolution}")]
    InvalidResolution {
        /// The requested resolution.
        resolution: u8,
    },

    /// A precomputed hex cell feature is unusable.
    #[error("Invalid hex cell {index}: {message}")]
    InvalidHexCell {
        /// Feature index.
        index: usize,
        /// What was wrong.
        message: String,
    },

    /// Geometry parsing or CRS checks failed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Median of `values`, averaging the two middle values for an even count.
///
/// Returns `None` for an empty slice.
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(f64::midpoint(values[mid - 1], values[mid]))
    } else {
        Some(values[mid])
    }
}

/// Arithmetic mean, `None` for an empty slice.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
