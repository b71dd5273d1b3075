//! Coordinate reference system tags.

use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// EPSG codes accepted by [`Crs::from_epsg`].
pub const SUPPORTED_EPSG: &[u32] = &[4326];

/// An EPSG-coded coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(u32);

impl Crs {
    /// WGS84 longitude/latitude, the only CRS the engine computes in.
    pub const WGS84: Self = Self(4326);

    /// Tags geometry with an arbitrary EPSG code without validating it.
    ///
    /// Use [`Crs::from_epsg`] for untrusted input.
    #[must_use]
    pub const fn epsg(code: u32) -> Self {
        Self(code)
    }

    /// Returns the numeric EPSG code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Validates an EPSG code supplied by a caller.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::UnsupportedCrs`] when the code is missing
    /// or not in [`SUPPORTED_EPSG`].
    pub fn from_epsg(code: Option<u32>) -> Result<Self, GeometryError> {
        let Some(code) = code else {
            return Err(GeometryError::UnsupportedCrs {
                crs: "unspecified".to_string(),
            });
        };

        if SUPPORTED_EPSG.contains(&code) {
            Ok(Self(code))
        } else {
            Err(GeometryError::UnsupportedCrs {
                crs: format!("EPSG:{code}"),
            })
        }
    }

    /// Resolves a named CRS as found in the legacy `GeoJSON` `crs` member.
    ///
    /// `CRS84` is axis-order `lon,lat`, which is what `GeoJSON` uses for
    /// EPSG:4326 anyway, so both map to the same code.
    #[must_use]
    pub fn code_from_name(name: &str) -> Option<u32> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84")
            || name.eq_ignore_ascii_case("CRS84")
        {
            return Some(4326);
        }

        let code = name
            .strip_prefix("urn:ogc:def:crs:EPSG::")
            .or_else(|| name.strip_prefix("EPSG:"))
            .or_else(|| name.strip_prefix("epsg:"))?;

        code.parse().ok()
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Ensures two geometry sets share a CRS before they are overlaid.
///
/// # Errors
///
/// Returns [`GeometryError::CrsMismatch`] if the CRSs differ.
pub fn ensure_same_crs(left: Crs, right: Crs) -> Result<Crs, GeometryError> {
    if left == right {
        Ok(left)
    } else {
        Err(GeometryError::CrsMismatch { left, right })
    }
}

/// Reads the legacy `crs` member of a `GeoJSON` object, if present.
///
/// # Errors
///
/// Returns [`GeometryError::UnsupportedCrs`] if a name is given but is
/// not an EPSG code this module understands.
pub(crate) fn legacy_crs_code(object: &serde_json::Value) -> Result<Option<u32>, GeometryError> {
    let Some(name) = object
        .pointer("/crs/properties/name")
        .and_then(serde_json::Value::as_str)
    else {
        return Ok(None);
    };

    Crs::code_from_name(name)
        .map(Some)
        .ok_or_else(|| GeometryError::UnsupportedCrs {
            crs: name.to_string(),
        })
}
