//! Price-paid CSV loading and outlier trimming.

use std::io::Read;

use chrono::NaiveDate;
use drivetime_prices_models::PricePoint;
use serde::Deserialize;

use crate::{PriceError, mean};

/// Number of standard deviations above the mean beyond which a sale is an
/// outlier.
const OUTLIER_SIGMAS: f64 = 3.0;

#[derive(Debug, Deserialize)]
struct PriceRow {
    longitude: f64,
    latitude: f64,
    #[serde(alias = "AMOUNT")]
    amount: f64,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    postcode: Option<String>,
    #[serde(default)]
    property_type: Option<String>,
}

impl PriceRow {
    fn validate(self, line: u64) -> Result<PricePoint, PriceError> {
        let invalid = |message: String| PriceError::InvalidRecord { line, message };

        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(invalid(format!("longitude {} out of range", self.longitude)));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(invalid(format!("latitude {} out of range", self.latitude)));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(invalid(format!("amount {} is not a positive price", self.amount)));
        }

        Ok(PricePoint {
            longitude: self.longitude,
            latitude: self.latitude,
            amount: self.amount,
            transaction_id: non_empty(self.transaction_id),
            date: self.date,
            postcode: non_empty(self.postcode),
            property_type: non_empty(self.property_type),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The loaded sales, with the outlier cutoff once trimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceDataset {
    points: Vec<PricePoint>,
    cutoff: Option<f64>,
}

impl PriceDataset {
    /// Wraps untrimmed sales.
    #[must_use]
    pub const fn new(points: Vec<PricePoint>) -> Self {
        Self {
            points,
            cutoff: None,
        }
    }

    /// The sales.
    #[must_use]
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Number of sales.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no sales.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The amount above which sales were dropped, once trimmed.
    #[must_use]
    pub const fn cutoff(&self) -> Option<f64> {
        self.cutoff
    }

    /// Drops sales with `amount > mean + 3·stddev` and returns how many
    /// were removed.
    ///
    /// The cutoff is computed on the first call and reused afterwards, so
    /// trimming an already trimmed dataset removes nothing.
    pub fn trim(&mut self) -> usize {
        let cutoff = match self.cutoff {
            Some(cutoff) => cutoff,
            None => {
                let amounts: Vec<f64> = self.points.iter().map(|p| p.amount).collect();
                outlier_cutoff(&amounts)
            }
        };

        let before = self.points.len();
        self.points.retain(|p| p.amount <= cutoff);
        self.cutoff = Some(cutoff);

        let removed = before - self.points.len();
        log::debug!("Trimmed {removed} of {before} sales above {cutoff:.0}");
        removed
    }
}

/// `mean + 3·s` where `s` is the sample standard deviation.
///
/// Fewer than two values give an infinite cutoff (nothing is an outlier).
#[allow(clippy::cast_precision_loss)]
fn outlier_cutoff(amounts: &[f64]) -> f64 {
    if amounts.len() < 2 {
        return f64::INFINITY;
    }
    let Some(average) = mean(amounts) else {
        return f64::INFINITY;
    };
    let variance = amounts.iter().map(|a| (a - average).powi(2)).sum::<f64>()
        / (amounts.len() - 1) as f64;
    OUTLIER_SIGMAS.mul_add(variance.sqrt(), average)
}

/// Parses and validates the price CSV without trimming.
///
/// # Errors
///
/// Returns [`PriceError::Csv`] for unparseable rows and
/// [`PriceError::InvalidRecord`] for out-of-range coordinates or
/// non-positive amounts.
pub fn read_prices<R: Read>(reader: R) -> Result<PriceDataset, PriceError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut points = Vec::new();

    for (index, result) in reader.deserialize::<PriceRow>().enumerate() {
        let row = result?;
        points.push(row.validate(index as u64 + 2)?);
    }

    Ok(PriceDataset::new(points))
}

/// Parses, validates and outlier-trims the price CSV.
///
/// # Errors
///
/// Returns every error [`read_prices`] can return.
pub fn load_prices<R: Read>(reader: R) -> Result<PriceDataset, PriceError> {
    let mut dataset = read_prices(reader)?;
    let total = dataset.len();
    let removed = dataset.trim();
    log::info!(
        "Loaded {} sales ({removed} of {total} trimmed as outliers)",
        dataset.len()
    );
    Ok(dataset)
}
