#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Runs drivetime queries end to end.
//!
//! A query resolves an address into a travel-time polygon, overlays it on
//! the administrative units for a population-weighted profile, and relates
//! it to the price dataset either directly or through hex cells. The
//! [`ReferenceData`] behind every query (units, sales, national summary,
//! hex cache) is loaded once and shared through an `Arc`.

pub mod config;
pub mod engine;
pub mod reference;
pub mod result;

pub use config::{ConfigError, DataConfig, EngineConfig, HexConfig};
pub use engine::{Engine, QueryRequest};
pub use reference::ReferenceData;
pub use result::{OverlayResult, OverlaySummary};

use drivetime_boundary::{BoundaryError, OverlayError};
use drivetime_isochrone::{IsochroneError, TransportError};
use drivetime_prices::PriceError;
use thiserror::Error;

/// Errors from loading reference data or running a query.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured provider id is not in the registry.
    #[error("Unknown isochrone provider '{id}' (available: {available})")]
    UnknownProvider {
        /// Requested id.
        id: String,
        /// Comma-separated registry ids.
        available: String,
    },

    /// Provider clients could not be set up.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Geocoding or isochrone resolution failed.
    #[error(transparent)]
    Isochrone(#[from] IsochroneError),

    /// Boundary or population data could not be loaded.
    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    /// The boundary overlay failed.
    #[error(transparent)]
    Overlay(#[from] OverlayError),

    /// Price data could not be loaded or aggregated.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// A blocking hex build task failed to complete.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Reading a data file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A result could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
