//! Compile-time registry of isochrone provider definitions.
//!
//! Each provider is defined in a TOML file under `services/`. The
//! registry embeds these at compile time and exposes them via
//! [`all_services`], [`enabled_services`] and [`service`].

use drivetime_isochrone_models::ServiceDefinition;

const SERVICE_TOMLS: &[(&str, &str)] = &[
    ("geoapify", include_str!("../services/geoapify.toml")),
    ("mapbox", include_str!("../services/mapbox.toml")),
];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 2;

/// Returns all provider definitions (enabled and disabled).
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. These are
/// compile-time constants, so a failure is a development error caught by
/// the tests below.
#[must_use]
pub fn all_services() -> Vec<ServiceDefinition> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse isochrone service '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled providers.
#[must_use]
pub fn enabled_services() -> Vec<ServiceDefinition> {
    all_services().into_iter().filter(|s| s.enabled).collect()
}

/// Looks up an enabled provider by id.
#[must_use]
pub fn service(id: &str) -> Option<ServiceDefinition> {
    enabled_services().into_iter().find(|s| s.id == id)
}

/// Returns the ids of every provider, for error messages.
#[must_use]
pub fn service_ids() -> Vec<String> {
    all_services().into_iter().map(|s| s.id).collect()
}
