//! Administrative units and their R-tree index.

use drivetime_boundary_models::UnitAttributes;
use drivetime_geometry::{Crs, ops};
use geo::{Area as _, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

/// A unit boundary with its demographic attributes.
#[derive(Debug, Clone)]
pub struct AdministrativeUnit {
    attributes: UnitAttributes,
    boundary: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl AdministrativeUnit {
    /// Pairs `attributes` with `boundary`.
    #[must_use]
    pub fn new(attributes: UnitAttributes, boundary: MultiPolygon<f64>) -> Self {
        let envelope = ops::envelope(&boundary);
        Self {
            attributes,
            boundary,
            envelope,
        }
    }

    /// Demographic attributes.
    #[must_use]
    pub const fn attributes(&self) -> &UnitAttributes {
        &self.attributes
    }

    /// Unit code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.attributes.code
    }

    /// Unit boundary.
    #[must_use]
    pub const fn boundary(&self) -> &MultiPolygon<f64> {
        &self.boundary
    }

    /// Planar area of the boundary.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.boundary.unsigned_area()
    }
}

impl RTreeObject for AdministrativeUnit {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Immutable unit reference set, bulk-loaded into an R-tree.
#[derive(Debug)]
pub struct UnitIndex {
    crs: Crs,
    tree: RTree<AdministrativeUnit>,
}

impl UnitIndex {
    /// Builds the index over `units`, all in `crs`.
    #[must_use]
    pub fn new(crs: Crs, units: Vec<AdministrativeUnit>) -> Self {
        Self {
            crs,
            tree: RTree::bulk_load(units),
        }
    }

    /// CRS of every unit boundary.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Looks up a unit by code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&AdministrativeUnit> {
        self.tree.iter().find(|unit| unit.code() == code)
    }

    /// Units whose bounding box intersects `envelope`.
    pub fn candidates<'a>(
        &'a self,
        envelope: &AABB<[f64; 2]>,
    ) -> impl Iterator<Item = &'a AdministrativeUnit> + 'a {
        self.tree.locate_in_envelope_intersecting(envelope)
    }
}
