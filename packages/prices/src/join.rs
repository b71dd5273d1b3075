//! Relating a reachable area to the price dataset.
//!
//! Two strategies: a direct point-in-polygon join over an R-tree of sales
//! ([`PriceIndex`]), or an overlay against precomputed hex cells
//! ([`join_hex_cells`]). Direct joins summarize exactly; hex joins average
//! per-cell statistics and are marked as approximations.

use std::collections::BTreeSet;

use drivetime_boundary::OverlapFragment;
use drivetime_geometry::{Crs, IsochronePolygon, ensure_same_crs, ops};
use drivetime_prices_models::{NationalComparison, PricePoint, PriceSummary, SummaryMethod};
use geo::{Intersects as _, MultiPolygon, Point};
use rstar::primitives::GeomWithData;
use rstar::{AABB, Envelope as _, RTree};

use crate::{HexCell, PriceError, mean, median};

type IndexedSale = GeomWithData<[f64; 2], usize>;

/// R-tree over sale locations.
pub struct PriceIndex {
    points: Vec<PricePoint>,
    tree: RTree<IndexedSale>,
}

impl PriceIndex {
    /// Indexes `points` (WGS84).
    #[must_use]
    pub fn new(points: Vec<PricePoint>) -> Self {
        let entries = points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new([p.longitude, p.latitude], i))
            .collect();
        Self {
            points,
            tree: RTree::bulk_load(entries),
        }
    }

    /// The indexed sales.
    #[must_use]
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// CRS of the indexed locations.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        Crs::WGS84
    }

    fn indices_within(&self, polygon: &MultiPolygon<f64>, envelope: &AABB<[f64; 2]>) -> Vec<usize> {
        self.tree
            .locate_in_envelope(envelope)
            .filter(|entry| {
                let [x, y] = *entry.geom();
                polygon.intersects(&Point::new(x, y))
            })
            .map(|entry| entry.data)
            .collect()
    }

    /// Sales inside `area`, boundary inclusive, in index order.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Geometry`] if `area` is not WGS84.
    pub fn join_points(&self, area: &IsochronePolygon) -> Result<Vec<&PricePoint>, PriceError> {
        ensure_same_crs(area.crs(), self.crs())?;

        let mut indices = self.indices_within(area.polygon(), area.envelope());
        indices.sort_unstable();

        log::debug!("Direct join matched {} sales", indices.len());
        Ok(indices.into_iter().map(|i| &self.points[i]).collect())
    }

    /// Sales inside any of `fragments`, each counted once even when it sits
    /// on a shared fragment edge.
    #[must_use]
    pub fn join_fragments(&self, fragments: &[OverlapFragment]) -> Vec<&PricePoint> {
        let indices: BTreeSet<usize> = fragments
            .iter()
            .flat_map(|fragment| {
                self.indices_within(&fragment.geometry, &ops::envelope(&fragment.geometry))
            })
            .collect();

        log::debug!(
            "Fragment join matched {} sales across {} fragments",
            indices.len(),
            fragments.len()
        );
        indices.into_iter().map(|i| &self.points[i]).collect()
    }
}

/// Hex cells whose overlap with `area` has non-zero area.
///
/// # Errors
///
/// Returns [`PriceError::Geometry`] if `area` is not WGS84.
pub fn join_hex_cells<'a>(
    area: &IsochronePolygon,
    cells: &'a [HexCell],
) -> Result<Vec<&'a HexCell>, PriceError> {
    ensure_same_crs(area.crs(), Crs::WGS84)?;

    let joined: Vec<&HexCell> = cells
        .iter()
        .filter(|cell| cell.envelope().intersects(area.envelope()))
        .filter(|cell| ops::clip(cell.boundary(), area.polygon()).is_some())
        .collect();

    log::debug!("Hex join matched {} of {} cells", joined.len(), cells.len());
    Ok(joined)
}

/// Exact record-level statistics. `None` when nothing was joined.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize_points<'a>(
    points: impl IntoIterator<Item = &'a PricePoint>,
) -> Option<PriceSummary> {
    let mut amounts: Vec<f64> = points.into_iter().map(|p| p.amount).collect();
    let median_price = median(&mut amounts)?;
    let total_paid: f64 = amounts.iter().sum();

    Some(PriceSummary {
        method: SummaryMethod::Exact,
        median_price,
        mean_price: total_paid / amounts.len() as f64,
        total_paid,
        count: amounts.len() as u64,
    })
}

/// Hex approximation: the mean of cell medians and the mean of cell
/// means, with totals and counts summed. `None` when nothing was joined.
#[must_use]
pub fn summarize_cells<'a>(cells: impl IntoIterator<Item = &'a HexCell>) -> Option<PriceSummary> {
    let cells: Vec<&HexCell> = cells.into_iter().collect();
    let medians: Vec<f64> = cells.iter().map(|c| c.median_price).collect();
    let means: Vec<f64> = cells.iter().map(|c| c.mean_price).collect();

    Some(PriceSummary {
        method: SummaryMethod::HexApproximation,
        median_price: mean(&medians)?,
        mean_price: mean(&means)?,
        total_paid: cells.iter().map(|c| c.total_paid).sum(),
        count: cells.iter().map(|c| c.count).sum(),
    })
}

/// `(area - national) / national * 100` for each metric.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compare_to_national(area: &PriceSummary, national: &PriceSummary) -> NationalComparison {
    let pct = |area: f64, national: f64| {
        if national == 0.0 {
            None
        } else {
            Some((area - national) / national * 100.0)
        }
    };

    NationalComparison {
        median_price_pct: pct(area.median_price, national.median_price),
        mean_price_pct: pct(area.mean_price, national.mean_price),
        total_paid_pct: pct(area.total_paid, national.total_paid),
        count_pct: pct(area.count as f64, national.count as f64),
    }
}
