//! Reference data shared by every query.

use std::sync::Arc;

use drivetime_boundary::{UnitIndex, fetch_boundaries, load_units};
use drivetime_prices::hex::{self, HexCell};
use drivetime_prices::{HexCache, PriceDataset, PriceIndex, load_prices, summarize_points};
use drivetime_prices_models::PriceSummary;

use crate::{EngineConfig, EngineError, HexConfig};

/// Units, sales and the hex cache, loaded once and read-only afterwards.
pub struct ReferenceData {
    units: UnitIndex,
    prices: PriceIndex,
    national: Option<PriceSummary>,
    hex_cache: HexCache,
}

impl ReferenceData {
    /// Assembles reference data from loaded parts and computes the
    /// national price summary over the trimmed dataset.
    #[must_use]
    pub fn new(units: UnitIndex, prices: PriceDataset) -> Self {
        let national = summarize_points(prices.points());
        if let Some(national) = &national {
            log::info!(
                "National summary: {} sales, median {:.0}, mean {:.0}",
                national.count,
                national.median_price,
                national.mean_price
            );
        }

        Self {
            units,
            prices: PriceIndex::new(prices.points().to_vec()),
            national,
            hex_cache: HexCache::new(),
        }
    }

    /// Loads boundaries, population and prices as configured.
    ///
    /// Precomputed hex cells, if configured, are placed in the cache under
    /// the configured `(resolution, count_cutoff)` key. Cells at or below
    /// the cutoff are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if any source cannot be read or parsed, or
    /// if a precomputed cell is not at the configured resolution.
    pub async fn load(
        config: &EngineConfig,
        client: &reqwest::Client,
    ) -> Result<Arc<Self>, EngineError> {
        let boundaries = fetch_boundaries(client, &config.data.boundaries).await?;
        let population = read_file(&config.data.population).await?;
        let units = load_units(&boundaries, population.as_slice(), &config.countries)?;

        let prices = load_prices(read_file(&config.data.prices).await?.as_slice())?;

        let reference = Self::new(units, prices);

        if let Some(path) = &config.hex.precomputed {
            let raw: serde_json::Value = serde_json::from_slice(&read_file(path).await?)?;
            let cells = hex::from_feature_collection(&raw)?;
            log::info!("Loaded {} precomputed hex cells from {path}", cells.len());
            reference.hex_cache.insert_precomputed(
                config.hex.resolution,
                config.hex.count_cutoff,
                cells,
            )?;
        }

        Ok(Arc::new(reference))
    }

    /// The unit index.
    #[must_use]
    pub const fn units(&self) -> &UnitIndex {
        &self.units
    }

    /// The sale index.
    #[must_use]
    pub const fn prices(&self) -> &PriceIndex {
        &self.prices
    }

    /// Summary of the whole trimmed dataset, `None` if it is empty.
    #[must_use]
    pub const fn national(&self) -> Option<&PriceSummary> {
        self.national.as_ref()
    }

    /// Hex cells for `settings` if they are already cached.
    #[must_use]
    pub fn cached_hex_cells(&self, settings: &HexConfig) -> Option<Arc<[HexCell]>> {
        self.hex_cache.get(settings.resolution, settings.count_cutoff)
    }

    /// Hex cells for `settings`, built on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Price`] if the build fails.
    pub fn hex_cells(&self, settings: &HexConfig) -> Result<Arc<[HexCell]>, EngineError> {
        Ok(self.hex_cache.get_or_build(
            self.prices.points(),
            settings.resolution,
            settings.count_cutoff,
        )?)
    }
}

async fn read_file(path: &str) -> Result<Vec<u8>, EngineError> {
    tokio::fs::read(path).await.map_err(|source| EngineError::Io {
        path: path.to_string(),
        source,
    })
}
