//! CSG cell location
//!
//! A lookup descends from the root universe. On every level the cell
//! containing the point is resolved by the first strategy that succeeds:
//!
//! 1. the cell cached for this universe and search mode,
//! 2. the candidates of the universe's search-mesh bucket,
//! 3. the search list of the cached cell (cells that usually border it),
//! 4. the universe's own search list, or its source list in
//!    [`SearchMode::Source`].
//!
//! In plot mode none of this applies: every cell of the universe is tested
//! so that overlapping cells are detected.

use super::{CellLocation, SearchMode};
use crate::context::TaskContext;
use crate::float_types::Real;
use crate::geometry::{CellFill, CellId, GeometryModel, UniverseId};
use log::warn;
use nalgebra::{Point3, Vector3};

impl GeometryModel {
    /// Resolve `p` to the deepest cell containing it. `direction` breaks ties
    /// for points on a surface.
    pub fn locate_cell(
        &self,
        p: &Point3<Real>,
        direction: &Vector3<Real>,
        mode: SearchMode,
        ctx: &mut TaskContext,
    ) -> CellLocation {
        let mut universe = self.root;
        let mut local = *p;
        loop {
            let cell = if ctx.plot_mode() {
                match self.scan_universe(universe, &local, direction) {
                    Ok(Some(cell)) => cell,
                    Ok(None) => return CellLocation::NotFound,
                    Err(cells) => return CellLocation::Ambiguous { cells },
                }
            } else {
                match self.find_in_universe(universe, &local, direction, mode, ctx) {
                    Some(cell) => cell,
                    None => return CellLocation::NotFound,
                }
            };
            ctx.cache_mut().set_cell(universe, mode, cell);

            let record = &self.cells[cell.0];
            match &record.fill {
                CellFill::Universe { universe: inner, translation } => {
                    local -= *translation;
                    universe = *inner;
                },
                CellFill::Mesh { mesh, .. } => {
                    let tet = self.meshes[mesh.0].locate(&local, *mesh, ctx);
                    return CellLocation::Found {
                        cell,
                        region_index: record.region_index,
                        tet,
                    };
                },
                CellFill::Material(_) | CellFill::Void | CellFill::Outside => {
                    return CellLocation::Found {
                        cell,
                        region_index: record.region_index,
                        tet: None,
                    };
                },
            }
        }
    }

    fn find_in_universe(
        &self,
        universe: UniverseId,
        p: &Point3<Real>,
        direction: &Vector3<Real>,
        mode: SearchMode,
        ctx: &TaskContext,
    ) -> Option<CellId> {
        let u = &self.universes[universe.0];
        let contains = |c: &CellId| self.cells[c.0].contains(&self.surfaces, p, direction);

        let cached = ctx.cache().cell(universe, mode);
        if let Some(cell) = cached.filter(contains) {
            self.cells[cell.0].record_hit();
            return Some(cell);
        }

        if let Some(mesh) = &u.search_mesh {
            if let Some((bucket, entry)) = mesh.entry_at(p) {
                if let Some(&cell) = entry.candidates().iter().find(|c| contains(c)) {
                    mesh.record_hit(bucket);
                    return Some(cell);
                }
            }
        }

        if let Some(previous) = cached {
            if let Some(&cell) = self.cells[previous.0].search_list.iter().find(|c| contains(c)) {
                u.record_list_hit();
                return Some(cell);
            }
        }

        let list = match mode {
            SearchMode::Source => u.source_list.as_deref().unwrap_or(&u.search_list),
            SearchMode::Transport => &u.search_list,
        };
        let cell = list.iter().copied().find(contains)?;
        u.record_list_hit();
        Some(cell)
    }

    /// Every cell of `universe` containing `p`: `Ok(None)` for none,
    /// `Err(cells)` for more than one.
    fn scan_universe(
        &self,
        universe: UniverseId,
        p: &Point3<Real>,
        direction: &Vector3<Real>,
    ) -> Result<Option<CellId>, Vec<CellId>> {
        let u = &self.universes[universe.0];
        let hits: Vec<CellId> = u
            .cells
            .iter()
            .copied()
            .filter(|c| self.cells[c.0].contains(&self.surfaces, p, direction))
            .collect();
        match hits.as_slice() {
            [] => Ok(None),
            [cell] => Ok(Some(*cell)),
            _ => {
                warn!(
                    "point {} is inside {} cells of universe {}: {:?}",
                    p,
                    hits.len(),
                    u.name,
                    hits.iter().map(|c| self.cells[c.0].name.as_str()).collect::<Vec<_>>()
                );
                Err(hits)
            },
        }
    }
}
