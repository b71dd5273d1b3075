//! One query end to end, and batches of them.

use std::sync::Arc;

use drivetime_boundary::{OverlayError, area_profile, overlay};
use drivetime_isochrone::{IsochroneResolver, connect, service_registry};
use drivetime_isochrone_models::TravelMode;
use drivetime_prices::hex::HexCell;
use drivetime_prices::{compare_to_national, join_hex_cells, summarize_cells, summarize_points};
use drivetime_prices_models::JoinStrategy;
use futures::StreamExt as _;
use serde::{Deserialize, Serialize};

use crate::{EngineConfig, EngineError, HexConfig, OverlayResult, ReferenceData};

/// Parameters of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Free-text address to geocode.
    pub address: String,
    /// How the isochrone is travelled.
    pub mode: TravelMode,
    /// Travel-time budget in seconds.
    pub duration_seconds: u32,
    /// Price join strategy, `direct` when omitted.
    #[serde(default)]
    pub strategy: JoinStrategy,
}

impl QueryRequest {
    /// A direct-join query.
    #[must_use]
    pub fn new(address: impl Into<String>, mode: TravelMode, duration_seconds: u32) -> Self {
        Self {
            address: address.into(),
            mode,
            duration_seconds,
            strategy: JoinStrategy::default(),
        }
    }

    /// Replaces the price join strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: JoinStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Runs queries against shared reference data.
#[derive(Clone)]
pub struct Engine {
    resolver: IsochroneResolver,
    reference: Arc<ReferenceData>,
    hex: HexConfig,
    national_median_age: f64,
    concurrency: usize,
}

impl Engine {
    /// Builds an engine around an already connected resolver.
    ///
    /// A `concurrency` of 0 in `config` is treated as 1.
    #[must_use]
    pub fn new(
        resolver: IsochroneResolver,
        reference: Arc<ReferenceData>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            resolver,
            reference,
            hex: config.hex.clone(),
            national_median_age: config.national_median_age,
            concurrency: config.concurrency.max(1),
        }
    }

    /// Connects the configured provider from the service registry.
    ///
    /// # Errors
    ///
    /// * [`EngineError::UnknownProvider`] if `config.provider` is not
    ///   registered
    /// * [`EngineError::Transport`] if the provider's API key is missing
    ///   or the HTTP client cannot be built
    pub fn connect(
        config: &EngineConfig,
        reference: Arc<ReferenceData>,
    ) -> Result<Self, EngineError> {
        let definition = service_registry::service(&config.provider).ok_or_else(|| {
            EngineError::UnknownProvider {
                id: config.provider.clone(),
                available: service_registry::service_ids().join(", "),
            }
        })?;
        let clients = connect(&definition, &config.transport())?;

        Ok(Self::new(
            IsochroneResolver::from_clients(clients),
            reference,
            config,
        ))
    }

    /// Reference data shared with every query.
    #[must_use]
    pub const fn reference(&self) -> &Arc<ReferenceData> {
        &self.reference
    }

    /// Resolves the isochrone for `request`, overlays it on the units and
    /// joins prices with the requested strategy.
    ///
    /// An isochrone touching no unit is not an error: the result has no
    /// fragments and `demographics` is `None`. Likewise `prices` is `None`
    /// when no sale or hex cell falls inside.
    ///
    /// # Errors
    ///
    /// * [`EngineError::Isochrone`] if resolution fails
    /// * [`EngineError::Overlay`] on a CRS mismatch or if every touched
    ///   unit has zero population
    /// * [`EngineError::Price`] if the price join fails
    /// * [`EngineError::Join`] if the hex build task panics
    pub async fn query(&self, request: &QueryRequest) -> Result<OverlayResult, EngineError> {
        let resolved = self
            .resolver
            .resolve(&request.address, request.mode, request.duration_seconds)
            .await?;

        let fragments = overlay(&resolved.isochrone, self.reference.units())?;
        let demographics = match area_profile(&fragments, self.national_median_age) {
            Ok(profile) => Some(profile),
            Err(OverlayError::EmptyOverlay) => None,
            Err(e) => return Err(e.into()),
        };

        let (prices, hex_ids) = match request.strategy {
            JoinStrategy::Direct => {
                let joined = self.reference.prices().join_points(&resolved.isochrone)?;
                (summarize_points(joined), Vec::new())
            }
            JoinStrategy::Hex => {
                let cells = self.hex_cells().await?;
                let joined = join_hex_cells(&resolved.isochrone, &cells)?;
                (
                    summarize_cells(joined.iter().copied()),
                    joined.iter().map(|cell| cell.hex_id()).collect(),
                )
            }
        };

        let national = self.reference.national().copied();
        let comparison = prices
            .as_ref()
            .zip(national.as_ref())
            .map(|(area, national)| compare_to_national(area, national));

        log::info!(
            "{} ({}, {}s): {} fragments, {} sales via {}",
            request.address,
            request.mode,
            request.duration_seconds,
            fragments.len(),
            prices.map_or(0, |summary| summary.count),
            request.strategy
        );

        Ok(OverlayResult {
            address: request.address.clone(),
            resolved,
            fragments,
            demographics,
            strategy: request.strategy,
            hex_ids,
            prices,
            national,
            comparison,
        })
    }

    /// Cached hex cells, or a build on the blocking pool on a miss.
    async fn hex_cells(&self) -> Result<Arc<[HexCell]>, EngineError> {
        if let Some(cells) = self.reference.cached_hex_cells(&self.hex) {
            return Ok(cells);
        }

        let reference = Arc::clone(&self.reference);
        let settings = self.hex.clone();
        tokio::task::spawn_blocking(move || reference.hex_cells(&settings)).await?
    }

    /// Runs `requests` with at most `concurrency` in flight. Results are
    /// returned in request order; one failure does not stop the others.
    pub async fn query_all(
        &self,
        requests: &[QueryRequest],
    ) -> Vec<Result<OverlayResult, EngineError>> {
        let mut results: Vec<(usize, Result<OverlayResult, EngineError>)> =
            futures::stream::iter(requests.iter().enumerate())
                .map(|(i, request)| async move { (i, self.query(request).await) })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        results.sort_by_key(|(i, _)| *i);

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        log::info!("Ran {} queries, {failed} failed", results.len());

        results.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use drivetime_boundary::load_units;
    use drivetime_geometry::parse_feature_collection;
    use drivetime_isochrone::{
        GeocodingService, IsochroneError, IsochroneRequest, IsochroneService, TransportError,
    };
    use drivetime_prices::PriceDataset;
    use drivetime_prices_models::{PricePoint, SummaryMethod};
    use serde_json::{Value, json};

    use super::*;

    struct StubGeocoder {
        hits: bool,
    }

    #[async_trait]
    impl GeocodingService for StubGeocoder {
        fn name(&self) -> &str {
            "stub"
        }

        async fn geocode(&self, _address: &str) -> Result<Value, TransportError> {
            let features = if self.hits {
                json!([{
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [-0.1, 51.5] },
                    "properties": {}
                }])
            } else {
                json!([])
            };
            Ok(json!({ "type": "FeatureCollection", "features": features }))
        }
    }

    /// Returns a fixed square, sleeping for `duration_seconds` ms so batch
    /// results complete out of order.
    struct StubRouter {
        square: [f64; 4],
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IsochroneService for StubRouter {
        fn name(&self) -> &str {
            "stub"
        }

        fn profile(&self, _mode: TravelMode) -> Option<&'static str> {
            Some("drive")
        }

        async fn isochrone(&self, request: &IsochroneRequest) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(u64::from(request.duration_seconds))).await;
            Ok(rect_collection(&[self.square], &[json!({})]))
        }
    }

    fn rect_collection(rects: &[[f64; 4]], properties: &[Value]) -> Value {
        let features: Vec<Value> = rects
            .iter()
            .zip(properties)
            .map(|(&[x0, y0, x1, y1], properties)| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
                    },
                    "properties": properties
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }

    fn sale(longitude: f64, latitude: f64, amount: f64) -> PricePoint {
        PricePoint {
            longitude,
            latitude,
            amount,
            transaction_id: None,
            date: None,
            postcode: None,
            property_type: None,
        }
    }

    fn reference() -> Arc<ReferenceData> {
        let boundaries = rect_collection(
            &[[-0.2, 51.45, -0.1, 51.55], [-0.1, 51.45, 0.0, 51.55]],
            &[
                json!({ "wd20cd": "E05000001", "wd20nm": "West" }),
                json!({ "wd20cd": "E05000002", "wd20nm": "East" }),
            ],
        );
        let boundaries = parse_feature_collection(&boundaries, Some(4326)).unwrap();
        let population = "wd20cd,total_population,mean_age,median_age,country\n\
                          E05000001,10000,42,40,England\n\
                          E05000002,30000,38,36,England\n";
        let units =
            load_units(&boundaries, population.as_bytes(), &["England".to_string()]).unwrap();

        let prices = PriceDataset::new(vec![
            sale(-0.12, 51.5, 100_000.0),
            sale(-0.08, 51.5, 300_000.0),
            sale(0.5, 52.0, 500_000.0),
        ]);
        Arc::new(ReferenceData::new(units, prices))
    }

    fn engine(hits: bool, square: [f64; 4]) -> (Engine, Arc<StubRouter>) {
        let router = Arc::new(StubRouter {
            square,
            calls: AtomicUsize::new(0),
        });
        let resolver = IsochroneResolver::new(Arc::new(StubGeocoder { hits }), router.clone());
        let mut config = EngineConfig::default();
        config.hex.count_cutoff = 0;
        (Engine::new(resolver, reference(), &config), router)
    }

    const CENTRAL: [f64; 4] = [-0.15, 51.48, -0.05, 51.52];

    #[tokio::test]
    async fn direct_query_weights_demographics_and_compares_prices() {
        let (engine, _) = engine(true, CENTRAL);
        let result = engine
            .query(&QueryRequest::new("Westminster", TravelMode::Drive, 10))
            .await
            .unwrap();

        assert_eq!(result.unit_codes(), vec!["E05000001", "E05000002"]);
        let profile = result.demographics.as_ref().unwrap();
        assert_eq!(profile.total_population, 40_000);
        assert!((profile.weighted_median_age - 37.0).abs() < 1e-9);
        assert!((profile.weighted_mean_age - 39.0).abs() < 1e-9);

        let prices = result.prices.unwrap();
        assert_eq!(prices.method, SummaryMethod::Exact);
        assert_eq!(prices.count, 2);
        assert!((prices.median_price - 200_000.0).abs() < 1e-9);

        let comparison = result.comparison.unwrap();
        assert!((comparison.median_price_pct.unwrap() + 100.0 / 3.0).abs() < 1e-9);
        assert!(result.hex_ids.is_empty());
    }

    #[tokio::test]
    async fn hex_query_uses_cells() {
        let (engine, _) = engine(true, CENTRAL);
        let request = QueryRequest::new("Westminster", TravelMode::Drive, 10)
            .with_strategy(JoinStrategy::Hex);
        assert!(engine.reference().cached_hex_cells(&engine.hex).is_none());
        let result = engine.query(&request).await.unwrap();

        let prices = result.prices.unwrap();
        assert_eq!(prices.method, SummaryMethod::HexApproximation);
        assert_eq!(prices.count, 2);
        assert_eq!(result.hex_ids.len(), 2);

        let built = engine.reference().cached_hex_cells(&engine.hex).unwrap();
        assert_eq!(built.len(), 3);
        let again = engine.query(&request).await.unwrap();
        assert_eq!(again.hex_ids, result.hex_ids);
        assert!(Arc::ptr_eq(
            &built,
            &engine.reference().cached_hex_cells(&engine.hex).unwrap()
        ));
    }

    #[tokio::test]
    async fn isochrone_outside_every_unit_has_no_data() {
        let (engine, _) = engine(true, [10.0, 10.0, 10.1, 10.1]);
        let result = engine
            .query(&QueryRequest::new("Nowhere", TravelMode::Walk, 10))
            .await
            .unwrap();

        assert!(result.fragments.is_empty());
        assert!(result.demographics.is_none());
        assert!(result.prices.is_none());
        assert!(result.comparison.is_none());
        assert!(result.national.is_some());
    }

    #[tokio::test]
    async fn unknown_address_stops_before_the_isochrone_call() {
        let (engine, router) = engine(false, CENTRAL);
        let err = engine
            .query(&QueryRequest::new("Atlantis", TravelMode::Drive, 10))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Isochrone(IsochroneError::AddressNotFound { .. })
        ));
        assert_eq!(router.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn batch_keeps_request_order() {
        let (engine, router) = engine(true, CENTRAL);
        let requests: Vec<QueryRequest> = [60, 5, 30, 1]
            .into_iter()
            .map(|seconds| QueryRequest::new("Westminster", TravelMode::Drive, seconds))
            .collect();

        let results = engine.query_all(&requests).await;
        let durations: Vec<u32> = results
            .into_iter()
            .map(|r| r.unwrap().resolved.duration_seconds)
            .collect();
        assert_eq!(durations, vec![60, 5, 30, 1]);
        assert_eq!(router.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn batch_reports_failures_per_request() {
        let (engine, _) = engine(true, CENTRAL);
        let requests = vec![
            QueryRequest::new("Westminster", TravelMode::Drive, 10),
            QueryRequest::new("Westminster", TravelMode::Drive, 0),
        ];

        let results = engine.query_all(&requests).await;
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(EngineError::Isochrone(IsochroneError::InvalidParameter { .. }))
        ));
    }

    #[test]
    fn unknown_provider_lists_registered_ids() {
        let config = EngineConfig {
            provider: "here".to_string(),
            ..EngineConfig::default()
        };
        match Engine::connect(&config, reference()) {
            Err(EngineError::UnknownProvider { id, available }) => {
                assert_eq!(id, "here");
                assert!(available.contains("geoapify"));
                assert!(available.contains("mapbox"));
            }
            _ => panic!("expected UnknownProvider"),
        }
    }

    #[test]
    fn request_parses_from_json() {
        let request: QueryRequest = serde_json::from_value(json!({
            "address": "10 Downing Street",
            "mode": "driving",
            "durationSeconds": 900
        }))
        .unwrap();
        assert_eq!(request.mode, TravelMode::Drive);
        assert_eq!(request.strategy, JoinStrategy::Direct);
    }
}
