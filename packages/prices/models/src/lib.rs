#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Price-paid transaction and summary types.
//!
//! A [`PricePoint`] is one validated sale. Summaries of a set of sales
//! are [`PriceSummary`] values tagged with the [`SummaryMethod`] that
//! produced them, since hex-derived medians and means are approximations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default H3 resolution for price cells.
pub const DEFAULT_HEX_RESOLUTION: u8 = 8;

/// Default minimum number of sales a cell needs, exclusive.
pub const DEFAULT_HEX_COUNT_CUTOFF: u64 = 10;

/// A single validated price-paid transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    /// WGS84 longitude.
    pub longitude: f64,
    /// WGS84 latitude.
    pub latitude: f64,
    /// Price paid.
    pub amount: f64,
    /// Registry transaction identifier.
    pub transaction_id: Option<String>,
    /// Date of transfer.
    pub date: Option<NaiveDate>,
    /// Postcode of the property.
    pub postcode: Option<String>,
    /// Property type code (e.g. `D`, `S`, `T`, `F`).
    pub property_type: Option<String>,
}

/// How a reachable area is related to the price dataset.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum JoinStrategy {
    /// Point-in-polygon join against individual sales.
    #[default]
    Direct,
    /// Overlay against precomputed hex cells.
    Hex,
}

/// Which computation produced a [`PriceSummary`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SummaryMethod {
    /// Record-level statistics over joined sales.
    Exact,
    /// Averages of per-cell statistics. The median is the mean of cell
    /// medians, not a record-level median.
    HexApproximation,
}

/// Price statistics for a set of sales.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSummary {
    /// How the figures were derived.
    pub method: SummaryMethod,
    /// Median price.
    pub median_price: f64,
    /// Mean price.
    pub mean_price: f64,
    /// Sum of all prices.
    pub total_paid: f64,
    /// Number of sales.
    pub count: u64,
}

/// Percentage difference of an area against the national figures,
/// `(area - national) / national * 100`.
///
/// A metric is `None` when the national value is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NationalComparison {
    /// Median price difference.
    pub median_price_pct: Option<f64>,
    /// Mean price difference.
    pub mean_price_pct: Option<f64>,
    /// Total paid difference.
    pub total_paid_pct: Option<f64>,
    /// Sales count difference.
    pub count_pct: Option<f64>,
}
