//! Per-task "last resolved" slots

use super::SearchMode;
use crate::geometry::{CellId, MeshId, UniverseId};
use crate::mesh::TetId;

/// Last cell found in every universe (one slot per search mode) and last
/// tet found in every mesh.
///
/// Slots persist across consecutive lookups of one task and grow on first
/// use, so a cache can be created before the geometry is known.
#[derive(Debug, Clone, Default)]
pub struct LocationCache {
    universes: Vec<[Option<CellId>; 2]>,
    tets: Vec<Option<TetId>>,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(&self, universe: UniverseId, mode: SearchMode) -> Option<CellId> {
        self.universes.get(universe.0).and_then(|slots| slots[mode.slot()])
    }

    pub fn set_cell(&mut self, universe: UniverseId, mode: SearchMode, cell: CellId) {
        if self.universes.len() <= universe.0 {
            self.universes.resize(universe.0 + 1, [None; 2]);
        }
        self.universes[universe.0][mode.slot()] = Some(cell);
    }

    pub fn tet(&self, mesh: MeshId) -> Option<TetId> {
        self.tets.get(mesh.0).copied().flatten()
    }

    pub fn set_tet(&mut self, mesh: MeshId, tet: TetId) {
        if self.tets.len() <= mesh.0 {
            self.tets.resize(mesh.0 + 1, None);
        }
        self.tets[mesh.0] = Some(tet);
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        self.universes.clear();
        self.tets.clear();
    }
}
