//! H3 hexagonal binning of sales.
//!
//! Every sale is hashed to an H3 cell at a fixed resolution. Cells with
//! `count <= cutoff` are too sparse to report and are dropped. Built cells
//! are immutable and shared through [`HexCache`], keyed by
//! `(resolution, cutoff)`.

use std::collections::BTreeMap;
use std::str::FromStr as _;
use std::sync::{Arc, Mutex, PoisonError};

use drivetime_geometry::{Crs, ops, parse_feature_collection};
use drivetime_prices_models::PricePoint;
use geo::{Centroid as _, LineString, MultiPolygon, Polygon, coord};
use h3o::{CellIndex, LatLng, Resolution};
use rstar::AABB;

use crate::{PriceError, median};

/// Per-cell price statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct HexCell {
    cell: CellIndex,
    boundary: MultiPolygon<f64>,
    /// Mean price of the cell's sales.
    pub mean_price: f64,
    /// Median price of the cell's sales.
    pub median_price: f64,
    /// Sum of the cell's sale prices.
    pub total_paid: f64,
    /// Number of sales in the cell.
    pub count: u64,
}

impl HexCell {
    /// Builds a cell from its id and statistics, deriving the boundary.
    #[must_use]
    pub fn new(
        cell: CellIndex,
        mean_price: f64,
        median_price: f64,
        total_paid: f64,
        count: u64,
    ) -> Self {
        Self {
            cell,
            boundary: MultiPolygon(vec![cell_polygon(cell)]),
            mean_price,
            median_price,
            total_paid,
            count,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_amounts(cell: CellIndex, amounts: &mut [f64]) -> Self {
        let median_price = median(amounts).unwrap_or_default();
        // Sorted by `median`, so the sum does not depend on input order.
        let total_paid: f64 = amounts.iter().sum();
        let count = amounts.len() as u64;
        Self::new(cell, total_paid / count as f64, median_price, total_paid, count)
    }

    /// The H3 cell.
    #[must_use]
    pub const fn cell(&self) -> CellIndex {
        self.cell
    }

    /// The cell id as an H3 hex string (e.g. `"88195da49bfffff"`).
    #[must_use]
    pub fn hex_id(&self) -> String {
        self.cell.to_string()
    }

    /// Cell resolution.
    #[must_use]
    pub fn resolution(&self) -> u8 {
        u8::from(self.cell.resolution())
    }

    /// Cell boundary polygon.
    #[must_use]
    pub const fn boundary(&self) -> &MultiPolygon<f64> {
        &self.boundary
    }

    /// Bounding box of the boundary.
    #[must_use]
    pub fn envelope(&self) -> AABB<[f64; 2]> {
        ops::envelope(&self.boundary)
    }
}

fn cell_polygon(cell: CellIndex) -> Polygon<f64> {
    let ring: Vec<_> = cell
        .boundary()
        .iter()
        .map(|vertex| coord! { x: vertex.lng(), y: vertex.lat() })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

fn parse_resolution(resolution: u8) -> Result<Resolution, PriceError> {
    Resolution::try_from(resolution).map_err(|_| PriceError::InvalidResolution { resolution })
}

fn cell_at(longitude: f64, latitude: f64, res: Resolution) -> Result<CellIndex, PriceError> {
    LatLng::new(latitude, longitude)
        .map(|ll| ll.to_cell(res))
        .map_err(|_| PriceError::InvalidCoordinate {
            longitude,
            latitude,
        })
}

/// Groups `points` into H3 cells at `resolution` and keeps cells with
/// more than `cutoff` sales.
///
/// Output is sorted by cell id and does not depend on input order.
///
/// # Errors
///
/// Returns [`PriceError::InvalidResolution`] for a resolution above 15
/// and [`PriceError::InvalidCoordinate`] for a point H3 cannot index.
pub fn build(
    points: &[PricePoint],
    resolution: u8,
    cutoff: u64,
) -> Result<Vec<HexCell>, PriceError> {
    let res = parse_resolution(resolution)?;
    let mut groups: BTreeMap<u64, (CellIndex, Vec<f64>)> = BTreeMap::new();

    for point in points {
        let cell = cell_at(point.longitude, point.latitude, res)?;
        groups
            .entry(u64::from(cell))
            .or_insert_with(|| (cell, Vec::new()))
            .1
            .push(point.amount);
    }

    let occupied = groups.len();
    let cells: Vec<HexCell> = groups
        .into_values()
        .filter(|(_, amounts)| amounts.len() as u64 > cutoff)
        .map(|(cell, mut amounts)| HexCell::from_amounts(cell, &mut amounts))
        .collect();

    log::info!(
        "Built {} hex cells at resolution {resolution} ({} of {occupied} at or below cutoff {cutoff})",
        cells.len(),
        occupied - cells.len()
    );

    Ok(cells)
}

/// Maps a cell boundary back to its cell id by hashing its centroid.
///
/// # Errors
///
/// Returns [`PriceError::InvalidResolution`] for a bad resolution and
/// [`PriceError::InvalidCoordinate`] if the boundary is empty.
pub fn cell_for_polygon(
    boundary: &MultiPolygon<f64>,
    resolution: u8,
) -> Result<CellIndex, PriceError> {
    let res = parse_resolution(resolution)?;
    let centroid = boundary.centroid().ok_or(PriceError::InvalidCoordinate {
        longitude: f64::NAN,
        latitude: f64::NAN,
    })?;
    cell_at(centroid.x(), centroid.y(), res)
}

/// Memoized hex builds keyed by `(resolution, cutoff)`.
///
/// The lock is only held to look up or insert. Two callers missing the
/// same key both build; the second insert replaces an identical value.
#[derive(Debug, Default)]
pub struct HexCache {
    cells: Mutex<BTreeMap<(u8, u64), Arc<[HexCell]>>>,
}

impl HexCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached cells for a key.
    #[must_use]
    pub fn get(&self, resolution: u8, cutoff: u64) -> Option<Arc<[HexCell]>> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(resolution, cutoff))
            .cloned()
    }

    fn insert(&self, resolution: u8, cutoff: u64, cells: Vec<HexCell>) -> Arc<[HexCell]> {
        let cells: Arc<[HexCell]> = cells.into();
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((resolution, cutoff), cells.clone());
        cells
    }

    /// Returns the cells for a key, building them from `points` on a miss.
    ///
    /// # Errors
    ///
    /// Returns every error [`build`] can return.
    pub fn get_or_build(
        &self,
        points: &[PricePoint],
        resolution: u8,
        cutoff: u64,
    ) -> Result<Arc<[HexCell]>, PriceError> {
        if let Some(cells) = self.get(resolution, cutoff) {
            log::debug!("Hex cache hit ({resolution}, {cutoff})");
            return Ok(cells);
        }
        let cells = build(points, resolution, cutoff)?;
        Ok(self.insert(resolution, cutoff, cells))
    }

    /// Seeds a key with cells imported from a precomputed file.
    ///
    /// Cells with `count <= cutoff` are dropped so the cached value matches
    /// what [`build`] would return for the key.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::InvalidResolution`] for a resolution above 15
    /// and [`PriceError::InvalidHexCell`] for a cell at another resolution.
    pub fn insert_precomputed(
        &self,
        resolution: u8,
        cutoff: u64,
        cells: Vec<HexCell>,
    ) -> Result<Arc<[HexCell]>, PriceError> {
        parse_resolution(resolution)?;
        if let Some((index, cell)) = cells
            .iter()
            .enumerate()
            .find(|(_, cell)| cell.resolution() != resolution)
        {
            return Err(PriceError::InvalidHexCell {
                index,
                message: format!(
                    "cell {} is at resolution {}, expected {resolution}",
                    cell.hex_id(),
                    cell.resolution()
                ),
            });
        }

        let total = cells.len();
        let kept: Vec<HexCell> = cells.into_iter().filter(|cell| cell.count > cutoff).collect();
        if kept.len() < total {
            log::warn!(
                "Dropped {} precomputed cells with {cutoff} sales or fewer",
                total - kept.len()
            );
        }
        Ok(self.insert(resolution, cutoff, kept))
    }

    /// Number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renders cells as a `GeoJSON` `FeatureCollection` with properties
/// `hex_id`, `mean_price`, `median_price`, `total_paid` and `count`.
///
/// # Errors
///
/// Returns [`PriceError::Json`] if serialization fails.
pub fn to_feature_collection(cells: &[HexCell]) -> Result<serde_json::Value, PriceError> {
    let features = cells
        .iter()
        .map(|cell| {
            let mut properties = serde_json::Map::new();
            properties.insert("hex_id".to_string(), cell.hex_id().into());
            properties.insert("mean_price".to_string(), cell.mean_price.into());
            properties.insert("median_price".to_string(), cell.median_price.into());
            properties.insert("total_paid".to_string(), cell.total_paid.into());
            properties.insert("count".to_string(), cell.count.into());

            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&cell.boundary))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let collection = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    Ok(serde_json::to_value(&collection)?)
}

/// Reads cells written by [`to_feature_collection`].
///
/// Every property is required. Boundaries are rederived from `hex_id`.
/// Output is sorted by cell id.
///
/// # Errors
///
/// Returns [`PriceError::Geometry`] if `raw` is not a feature collection
/// and [`PriceError::InvalidHexCell`] for a missing or invalid property.
pub fn from_feature_collection(raw: &serde_json::Value) -> Result<Vec<HexCell>, PriceError> {
    let features = parse_feature_collection(raw, Some(Crs::WGS84.code()))?;
    let mut cells = Vec::with_capacity(features.len());

    for (index, feature) in features.features().iter().enumerate() {
        let invalid = |message: String| PriceError::InvalidHexCell { index, message };

        let hex_id = feature
            .property_str("hex_id")
            .ok_or_else(|| invalid("missing hex_id".to_string()))?;
        let cell = CellIndex::from_str(hex_id)
            .map_err(|e| invalid(format!("bad hex_id '{hex_id}': {e}")))?;

        let number = |key: &str| {
            feature
                .property_f64(key)
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| invalid(format!("missing or invalid {key}")))
        };
        let mean_price = number("mean_price")?;
        let median_price = number("median_price")?;
        let total_paid = number("total_paid")?;
        let count = number("count")?;
        if count.fract() != 0.0 {
            return Err(invalid(format!("count {count} is not an integer")));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        cells.push(HexCell::new(
            cell,
            mean_price,
            median_price,
            total_paid,
            count as u64,
        ));
    }

    cells.sort_by_key(|cell| u64::from(cell.cell()));
    Ok(cells)
}
