//! Weighted demographic aggregates over overlap fragments.

use std::collections::{BTreeMap, BTreeSet};

use drivetime_boundary_models::{AreaProfile, UnitAttributes, UnitMeasure};

use crate::{OverlapFragment, OverlayError};

/// Distinct units behind `fragments`, first fragment per code wins.
///
/// Order follows the first appearance of each code.
#[must_use]
pub fn distinct_units(fragments: &[OverlapFragment]) -> Vec<&UnitAttributes> {
    let mut seen = BTreeSet::new();
    fragments
        .iter()
        .filter(|fragment| seen.insert(fragment.code()))
        .map(|fragment| &fragment.attributes)
        .collect()
}

/// Computes `Σ(measure·weight) / Σweight` over the distinct units for each
/// `(measure, weight)` pair.
///
/// A measure listed twice keeps the value of its last pair.
///
/// # Errors
///
/// * [`OverlayError::EmptyOverlay`] if `fragments` is empty
/// * [`OverlayError::ZeroWeight`] if a weight sums to zero
pub fn weighted_aggregate(
    fragments: &[OverlapFragment],
    pairs: &[(UnitMeasure, UnitMeasure)],
) -> Result<BTreeMap<UnitMeasure, f64>, OverlayError> {
    let units = distinct_units(fragments);
    if units.is_empty() {
        return Err(OverlayError::EmptyOverlay);
    }

    let mut out = BTreeMap::new();
    for &(measure, weight) in pairs {
        let total_weight: f64 = units.iter().map(|unit| weight.value(unit)).sum();
        if total_weight == 0.0 {
            return Err(OverlayError::ZeroWeight { weight });
        }

        let weighted: f64 = units
            .iter()
            .map(|unit| measure.value(unit) * (weight.value(unit) / total_weight))
            .sum();
        out.insert(measure, weighted);
    }

    Ok(out)
}

/// Builds the population-weighted demographic profile of `fragments`.
///
/// # Errors
///
/// * [`OverlayError::EmptyOverlay`] if `fragments` is empty
/// * [`OverlayError::ZeroWeight`] if every touched unit has zero
///   population
pub fn area_profile(
    fragments: &[OverlapFragment],
    national_median_age: f64,
) -> Result<AreaProfile, OverlayError> {
    let ages = weighted_aggregate(
        fragments,
        &[
            (UnitMeasure::MeanAge, UnitMeasure::Population),
            (UnitMeasure::MedianAge, UnitMeasure::Population),
        ],
    )?;

    let units = distinct_units(fragments);
    let total_population = units.iter().map(|unit| unit.population).sum();
    let weighted_mean_age = ages.get(&UnitMeasure::MeanAge).copied().unwrap_or_default();
    let weighted_median_age = ages
        .get(&UnitMeasure::MedianAge)
        .copied()
        .unwrap_or_default();

    Ok(AreaProfile {
        total_population,
        unit_count: units.len(),
        fragment_count: fragments.len(),
        weighted_mean_age,
        weighted_median_age,
        national_median_age,
        median_age_ratio: AreaProfile::median_age_ratio(weighted_median_age, national_median_age),
    })
}
