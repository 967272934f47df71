//! Cells, universes and materials

use super::region::Region;
use super::surface::Surface;
use super::{CellId, MaterialId, MeshId, UniverseId};
use crate::float_types::Real;
use crate::search::SearchMesh;
use nalgebra::{Point3, Vector3};
use std::sync::atomic::{AtomicU64, Ordering};

/// A material known to the geometry. Cross sections are looked up by id
/// through the transport collaborator, so only the name is stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub name: String,
}

/// What fills the region of a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellFill {
    Material(MaterialId),
    /// No material; the true cross section is zero
    Void,
    /// A nested universe, shifted by `translation`
    Universe {
        universe: UniverseId,
        translation: Vector3<Real>,
    },
    /// An unstructured tetrahedral mesh; points outside the mesh see the
    /// `background` material (or void)
    Mesh {
        mesh: MeshId,
        background: Option<MaterialId>,
    },
    /// The region outside the modelled geometry
    Outside,
}

#[derive(Debug)]
pub struct Cell {
    pub name: String,
    pub universe: UniverseId,
    pub region: Region,
    pub fill: CellFill,
    /// Index unique within the owning universe
    pub region_index: usize,
    /// Compute rank owning the cell under domain decomposition
    pub domain: Option<u32>,
    /// Cells to try first when a lookup starts next to this one
    pub search_list: Vec<CellId>,
    pub(crate) hits: AtomicU64,
}

impl Cell {
    #[inline]
    pub fn contains(&self, surfaces: &[Surface], p: &Point3<Real>, direction: &Vector3<Real>) -> bool {
        self.region.contains(surfaces, p, direction)
    }

    pub const fn is_outside(&self) -> bool {
        matches!(self.fill, CellFill::Outside)
    }

    /// Count one cached lookup that resolved to this cell.
    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Distance along `direction` to the nearest surface bounding the cell.
    ///
    /// This is the surface-tracking counterpart of delta tracking; callers
    /// mixing both methods use it to stop at cell boundaries.
    pub fn distance_to_boundary(
        &self,
        surfaces: &[Surface],
        p: &Point3<Real>,
        direction: &Vector3<Real>,
    ) -> Option<Real> {
        self.region
            .surfaces()
            .into_iter()
            .filter_map(|s| surfaces[s.0].distance(p, direction))
            .fold(None, |best: Option<Real>, d| Some(best.map_or(d, |b| b.min(d))))
    }
}

#[derive(Debug)]
pub struct Universe {
    pub name: String,
    pub cells: Vec<CellId>,
    /// Optional uniform search grid over the universe
    pub search_mesh: Option<SearchMesh<CellId>>,
    /// Scan order used when neither the cache nor the search mesh resolves a point
    pub search_list: Vec<CellId>,
    /// Restricted scan order used for source sampling
    pub source_list: Option<Vec<CellId>>,
    pub(crate) list_hits: AtomicU64,
}

impl Universe {
    #[inline]
    pub(crate) fn record_list_hit(&self) {
        self.list_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn list_hits(&self) -> u64 {
        self.list_hits.load(Ordering::Relaxed)
    }
}
