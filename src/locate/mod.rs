//! Point location in the CSG hierarchy and in tetrahedral meshes
//!
//! Both locators are read-only on the geometry. Everything they remember
//! between calls lives in the [`LocationCache`] of the calling task.

pub mod cache;
pub mod cell;
pub mod tet;

pub use cache::LocationCache;
pub use tet::{WalkFallback, WalkStats};

use crate::geometry::CellId;
use crate::mesh::TetId;

/// Which cache slot a lookup reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// Lookups along particle tracks
    Transport,
    /// Lookups made while sampling source points; scans the universe's
    /// source list when it has one
    Source,
}

impl SearchMode {
    #[inline]
    pub const fn slot(self) -> usize {
        match self {
            SearchMode::Transport => 0,
            SearchMode::Source => 1,
        }
    }
}

/// Result of a CSG lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellLocation {
    /// The deepest cell containing the point, its region index within its
    /// universe and, for mesh-filled cells, the tet containing the point
    Found {
        cell: CellId,
        region_index: usize,
        tet: Option<TetId>,
    },
    NotFound,
    /// More than one cell of a universe contains the point; only reported
    /// in plot mode
    Ambiguous { cells: Vec<CellId> },
}

impl CellLocation {
    pub const fn cell(&self) -> Option<CellId> {
        match self {
            CellLocation::Found { cell, .. } => Some(*cell),
            _ => None,
        }
    }

    pub const fn is_found(&self) -> bool {
        matches!(self, CellLocation::Found { .. })
    }
}
