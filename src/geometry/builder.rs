//! Assembly and validation of a [`GeometryModel`]

use super::cell::{Cell, CellFill, Material, Universe};
use super::region::Region;
use super::surface::{Surface, SurfaceType};
use super::{CellId, GeometryModel, MaterialId, MeshId, SurfaceId, UniverseId};
use crate::config::LocatorConfig;
use crate::errors::GeometryError;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::mesh::TetMesh;
use crate::search::SearchMesh;
use log::{debug, error, info};
use nalgebra::{Point3, Vector3};
use std::sync::atomic::AtomicU64;

/// Collects the records of a geometry and checks them once in
/// [`GeometryBuilder::build`].
///
/// The first universe added is the root unless [`GeometryBuilder::set_root`]
/// says otherwise. Every cell is appended to its universe's search list in
/// insertion order, and its region index is its position in that order.
#[derive(Debug, Default)]
pub struct GeometryBuilder {
    materials: Vec<Material>,
    surfaces: Vec<Surface>,
    cells: Vec<Cell>,
    universes: Vec<Universe>,
    search_bounds: Vec<Option<Aabb>>,
    meshes: Vec<TetMesh>,
    root: Option<UniverseId>,
}

impl GeometryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&mut self, name: impl Into<String>) -> MaterialId {
        self.materials.push(Material { name: name.into() });
        MaterialId(self.materials.len() - 1)
    }

    pub fn add_surface(
        &mut self,
        name: impl Into<String>,
        kind: SurfaceType,
        params: &[Real],
    ) -> Result<SurfaceId, GeometryError> {
        self.surfaces.push(Surface::new(name, kind, params)?);
        Ok(SurfaceId(self.surfaces.len() - 1))
    }

    pub fn add_universe(&mut self, name: impl Into<String>) -> UniverseId {
        self.universes.push(Universe {
            name: name.into(),
            cells: Vec::new(),
            search_mesh: None,
            search_list: Vec::new(),
            source_list: None,
            list_hits: AtomicU64::new(0),
        });
        self.search_bounds.push(None);
        UniverseId(self.universes.len() - 1)
    }

    pub fn add_cell(
        &mut self,
        universe: UniverseId,
        name: impl Into<String>,
        region: Region,
        fill: CellFill,
    ) -> Result<CellId, GeometryError> {
        let len = self.universes.len();
        let owner = self.universes.get_mut(universe.0).ok_or(GeometryError::IndexOutOfRange {
            what: "universe",
            index: universe.0,
            len,
        })?;
        let id = CellId(self.cells.len());
        owner.cells.push(id);
        owner.search_list.push(id);
        self.cells.push(Cell {
            name: name.into(),
            universe,
            region,
            fill,
            region_index: 0,
            domain: None,
            search_list: Vec::new(),
            hits: AtomicU64::new(0),
        });
        Ok(id)
    }

    /// Assign `cell` to compute rank `rank`.
    pub fn set_domain(&mut self, cell: CellId, rank: u32) -> Result<(), GeometryError> {
        self.cell_mut(cell)?.domain = Some(rank);
        Ok(())
    }

    /// Cells to try right after `cell` when the cached lookup misses.
    pub fn link_search_list(&mut self, cell: CellId, list: Vec<CellId>) -> Result<(), GeometryError> {
        self.cell_mut(cell)?.search_list = list;
        Ok(())
    }

    /// Replace the scan order of `universe`.
    pub fn set_search_list(&mut self, universe: UniverseId, list: Vec<CellId>) -> Result<(), GeometryError> {
        self.universe_mut(universe)?.search_list = list;
        Ok(())
    }

    /// Scan order used by source-mode lookups in `universe`.
    pub fn set_source_list(&mut self, universe: UniverseId, list: Vec<CellId>) -> Result<(), GeometryError> {
        self.universe_mut(universe)?.source_list = Some(list);
        Ok(())
    }

    /// Build a search mesh over `bounds` for `universe` at build time.
    pub fn enable_search_mesh(&mut self, universe: UniverseId, bounds: Aabb) -> Result<(), GeometryError> {
        self.universe_mut(universe)?;
        self.search_bounds[universe.0] = Some(bounds);
        Ok(())
    }

    pub fn add_mesh(&mut self, mesh: TetMesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() - 1)
    }

    pub fn set_root(&mut self, universe: UniverseId) -> Result<(), GeometryError> {
        self.universe_mut(universe)?;
        self.root = Some(universe);
        Ok(())
    }

    fn cell_mut(&mut self, cell: CellId) -> Result<&mut Cell, GeometryError> {
        let len = self.cells.len();
        self.cells.get_mut(cell.0).ok_or(GeometryError::IndexOutOfRange {
            what: "cell",
            index: cell.0,
            len,
        })
    }

    fn universe_mut(&mut self, universe: UniverseId) -> Result<&mut Universe, GeometryError> {
        let len = self.universes.len();
        self.universes.get_mut(universe.0).ok_or(GeometryError::IndexOutOfRange {
            what: "universe",
            index: universe.0,
            len,
        })
    }

    /// Validate every reference, reject cyclic universe nesting, assign
    /// region indices and build the requested search meshes.
    pub fn build(mut self, config: &LocatorConfig) -> Result<GeometryModel, GeometryError> {
        self.validate().inspect_err(|e| error!("{}", e))?;

        for universe in &self.universes {
            for (index, cell) in universe.cells.iter().enumerate() {
                self.cells[cell.0].region_index = index;
            }
        }

        let search_meshes: Vec<Option<SearchMesh<CellId>>> = (0..self.universes.len())
            .map(|u| self.search_bounds[u].map(|bounds| self.sample_search_mesh(UniverseId(u), bounds, config)))
            .collect();
        for (universe, mesh) in self.universes.iter_mut().zip(search_meshes) {
            universe.search_mesh = mesh;
        }

        let root = self.root.unwrap_or(UniverseId(0));
        info!(
            "geometry built: {} universes, {} cells, {} surfaces, {} materials, {} meshes",
            self.universes.len(),
            self.cells.len(),
            self.surfaces.len(),
            self.materials.len(),
            self.meshes.len()
        );
        Ok(GeometryModel {
            materials: self.materials,
            surfaces: self.surfaces,
            cells: self.cells,
            universes: self.universes,
            meshes: self.meshes,
            root,
        })
    }

    fn validate(&self) -> Result<(), GeometryError> {
        let root = self.root.unwrap_or(UniverseId(0));
        check_index("universe", root.0, self.universes.len())?;

        for universe in &self.universes {
            if universe.cells.is_empty() {
                return Err(GeometryError::EmptyUniverse(universe.name.clone()));
            }
        }

        for cell in &self.cells {
            for surface in cell.region.surfaces() {
                check_index("surface", surface.0, self.surfaces.len())?;
            }
            match &cell.fill {
                CellFill::Material(m) => check_index("material", m.0, self.materials.len())?,
                CellFill::Universe { universe, .. } => check_index("universe", universe.0, self.universes.len())?,
                CellFill::Mesh { mesh, background } => {
                    check_index("mesh", mesh.0, self.meshes.len())?;
                    if let Some(m) = background {
                        check_index("material", m.0, self.materials.len())?;
                    }
                },
                CellFill::Void | CellFill::Outside => {},
            }
            self.check_members(&cell.search_list, cell.universe)?;
        }

        for mesh in &self.meshes {
            for material in mesh.parents().iter().filter_map(|p| p.material) {
                check_index("material", material.0, self.materials.len())?;
            }
        }

        for (u, universe) in self.universes.iter().enumerate() {
            self.check_members(&universe.search_list, UniverseId(u))?;
            if let Some(list) = &universe.source_list {
                self.check_members(list, UniverseId(u))?;
            }
        }

        self.check_acyclic()
    }

    /// Every cell in `list` must exist and belong to `universe`.
    fn check_members(&self, list: &[CellId], universe: UniverseId) -> Result<(), GeometryError> {
        for cell in list {
            check_index("cell", cell.0, self.cells.len())?;
            if self.cells[cell.0].universe != universe {
                return Err(GeometryError::MisplacedCell {
                    cell: self.cells[cell.0].name.clone(),
                    universe: self.universes[universe.0].name.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_acyclic(&self) -> Result<(), GeometryError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        let children: Vec<Vec<UniverseId>> = self
            .universes
            .iter()
            .map(|u| {
                u.cells
                    .iter()
                    .filter_map(|c| match self.cells[c.0].fill {
                        CellFill::Universe { universe, .. } => Some(universe),
                        _ => None,
                    })
                    .collect()
            })
            .collect();

        // explicit stack of (universe, next child to visit)
        let mut marks = vec![Mark::New; self.universes.len()];
        for start in 0..self.universes.len() {
            if marks[start] != Mark::New {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::Active;
            while let Some((u, next)) = stack.pop() {
                let Some(child) = children[u].get(next) else {
                    marks[u] = Mark::Done;
                    continue;
                };
                stack.push((u, next + 1));
                match marks[child.0] {
                    Mark::Active => {
                        return Err(GeometryError::CyclicUniverse(self.universes[child.0].name.clone()));
                    },
                    Mark::New => {
                        marks[child.0] = Mark::Active;
                        stack.push((child.0, 0));
                    },
                    Mark::Done => {},
                }
            }
        }
        Ok(())
    }

    /// Sample `samples_per_axis³` points in every bucket and list the cells
    /// of `universe` that contain any of them.
    fn sample_search_mesh(&self, universe: UniverseId, bounds: Aabb, config: &LocatorConfig) -> SearchMesh<CellId> {
        let n = config.universe_search.samples_per_axis.max(1);
        let direction = Vector3::new(1.0, 2.0, 3.0).normalize();
        let cells = &self.universes[universe.0].cells;
        let mesh = SearchMesh::build_with(bounds, config.universe_search.dims, |bucket| {
            let size = bucket.maxs - bucket.mins;
            let mut found = Vec::new();
            for k in 0..n {
                for j in 0..n {
                    for i in 0..n {
                        let t = Vector3::new(i as Real + 0.5, j as Real + 0.5, k as Real + 0.5) / n as Real;
                        let p: Point3<Real> = bucket.mins + size.component_mul(&t);
                        found.extend(
                            cells
                                .iter()
                                .copied()
                                .filter(|c| self.cells[c.0].contains(&self.surfaces, &p, &direction)),
                        );
                    }
                }
            }
            found
        });
        let stats = mesh.stats();
        debug!(
            "search mesh for universe {}: {} buckets, {} empty, {} preassigned, {} lists (longest {})",
            self.universes[universe.0].name,
            mesh.len(),
            stats.empty,
            stats.preassigned,
            stats.candidate_lists,
            stats.max_candidates
        );
        mesh
    }
}

fn check_index(what: &'static str, index: usize, len: usize) -> Result<(), GeometryError> {
    if index < len {
        Ok(())
    } else {
        Err(GeometryError::IndexOutOfRange { what, index, len })
    }
}
