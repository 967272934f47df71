//! `GeometryModel`: the immutable CSG hierarchy plus the tetrahedral meshes
//! it embeds.
//!
//! All records live in typed arenas owned by the model and are addressed by
//! the index newtypes below. A model is assembled once through
//! [`GeometryBuilder`] and is then shared read-only between tracking tasks;
//! the only mutation afterwards is the relaxed instrumentation counters.

use crate::mesh::{TetId, TetMesh};

pub mod builder;
pub mod cell;
pub mod region;
pub mod surface;

pub use builder::GeometryBuilder;
pub use cell::{Cell, CellFill, Material, Universe};
pub use region::Region;
pub use surface::{Surface, SurfaceShape, SurfaceType};

macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub usize);

            impl $name {
                #[inline]
                pub const fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

arena_id!(
    /// Index of a [`Surface`] in its model
    SurfaceId,
    /// Index of a [`Cell`] in its model
    CellId,
    /// Index of a [`Universe`] in its model
    UniverseId,
    /// Index of a [`Material`] in its model
    MaterialId,
    /// Index of a [`TetMesh`] in its model
    MeshId,
);

#[derive(Debug)]
pub struct GeometryModel {
    pub(crate) materials: Vec<Material>,
    pub(crate) surfaces: Vec<Surface>,
    pub(crate) cells: Vec<Cell>,
    pub(crate) universes: Vec<Universe>,
    pub(crate) meshes: Vec<TetMesh>,
    pub(crate) root: UniverseId,
}

impl GeometryModel {
    pub const fn root(&self) -> UniverseId {
        self.root
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn surface(&self, id: SurfaceId) -> &Surface {
        &self.surfaces[id.0]
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn universe(&self, id: UniverseId) -> &Universe {
        &self.universes[id.0]
    }

    pub fn universes(&self) -> &[Universe] {
        &self.universes
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn mesh(&self, id: MeshId) -> &TetMesh {
        &self.meshes[id.0]
    }

    pub fn meshes(&self) -> &[TetMesh] {
        &self.meshes
    }

    /// Look a cell up by name.
    pub fn find_cell(&self, name: &str) -> Option<CellId> {
        self.cells.iter().position(|c| c.name == name).map(CellId)
    }

    /// Material seen at a located cell, resolving mesh fills through the
    /// located tet. `None` means void.
    pub fn material_of(&self, cell: CellId, tet: Option<TetId>) -> Option<MaterialId> {
        match &self.cells[cell.0].fill {
            CellFill::Material(m) => Some(*m),
            CellFill::Mesh { mesh, background } => tet
                .and_then(|t| self.meshes[mesh.0].material(t))
                .or(*background),
            CellFill::Void | CellFill::Universe { .. } | CellFill::Outside => None,
        }
    }

    /// Cached lookups that resolved to `cell` so far.
    pub fn cell_hit_count(&self, cell: CellId) -> u64 {
        self.cells[cell.0].hits()
    }

    /// Compute ranks referenced by the model, sorted.
    pub fn domains(&self) -> Vec<u32> {
        let mut ranks: Vec<u32> = self.cells.iter().filter_map(|c| c.domain).collect();
        ranks.sort_unstable();
        ranks.dedup();
        ranks
    }
}
