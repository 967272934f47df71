//! Delta tracking and its collaborators
//!
//! The tracker only knows geometry. Cross sections and boundary conditions
//! are provided by the caller through [`CrossSections`] and
//! [`BoundaryConditions`]; both must be shareable between tasks.

use crate::float_types::Real;
use crate::geometry::{CellId, MaterialId};
use crate::mesh::TetId;
use nalgebra::{Point3, Vector3};

pub mod boundary;
pub mod delta;
pub mod slices;

pub use boundary::OuterBoundary;
pub use delta::DeltaTracker;
pub use slices::{SliceReport, run_slices, total_counters};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleType {
    Neutron,
    Photon,
}

impl ParticleType {
    const fn slot(self) -> usize {
        match self {
            ParticleType::Neutron => 0,
            ParticleType::Photon => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleState {
    pub position: Point3<Real>,
    /// Unit direction of flight
    pub direction: Vector3<Real>,
    pub energy: Real,
    pub weight: Real,
    pub particle: ParticleType,
    /// Rank currently responsible for the particle
    pub rank: u32,
    /// Set when the particle was just handed over from another rank; the
    /// next step then does not move it
    pub received_handoff: bool,
    /// Cell of the last step, if any
    pub cell: Option<CellId>,
}

impl ParticleState {
    /// A unit-weight particle on rank 0. `direction` is normalized.
    pub fn new(position: Point3<Real>, direction: Vector3<Real>, energy: Real, particle: ParticleType) -> Self {
        Self {
            position,
            direction: direction.normalize(),
            energy,
            weight: 1.0,
            particle,
            rank: 0,
            received_handoff: false,
            cell: None,
        }
    }
}

/// Total macroscopic cross sections.
pub trait CrossSections: Sync {
    fn total_macroscopic_xs(&self, material: MaterialId, particle: ParticleType, energy: Real, task: usize) -> Real;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryResult {
    /// The particle was moved (and possibly turned) by the condition
    Applied,
    /// There is no condition here; the particle leaks out
    NoConditionAvailable,
}

/// Boundary conditions applied when a particle ends up outside the geometry.
///
/// `cell` is the outside cell the particle was found in, or `None` when no
/// cell contains it. Implementations must either move the particle or report
/// [`BoundaryResult::NoConditionAvailable`], and must preserve its weight.
pub trait BoundaryConditions: Sync {
    fn apply(&self, cell: Option<CellId>, state: &mut ParticleState, task: usize) -> BoundaryResult;
}

/// How one delta-tracking step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Real collision at the new position
    Collision,
    /// Rejected (virtual) collision; the caller samples the next step
    Virtual,
    /// The particle left the geometry
    Surface,
    /// The particle entered a cell owned by another rank
    DomainHandoff,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackStep {
    pub cell: Option<CellId>,
    pub tet: Option<TetId>,
    pub material: Option<MaterialId>,
    /// True total cross section at the new position (zero when none was evaluated)
    pub cross_section: Real,
    pub path_length: Real,
    pub outcome: Outcome,
}

/// Accepted and rejected collisions per particle type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeltaCounters {
    accepted: [u64; 2],
    rejected: [u64; 2],
}

impl DeltaCounters {
    pub(crate) fn record(&mut self, particle: ParticleType, accepted: bool) {
        if accepted {
            self.accepted[particle.slot()] += 1;
        } else {
            self.rejected[particle.slot()] += 1;
        }
    }

    pub const fn accepted(&self, particle: ParticleType) -> u64 {
        self.accepted[particle.slot()]
    }

    pub const fn rejected(&self, particle: ParticleType) -> u64 {
        self.rejected[particle.slot()]
    }

    /// Fraction of sampled collisions that were real, or `None` before any.
    pub fn acceptance_ratio(&self, particle: ParticleType) -> Option<Real> {
        let a = self.accepted(particle);
        let total = a + self.rejected(particle);
        (total > 0).then(|| a as Real / total as Real)
    }

    pub fn merge(&mut self, other: &DeltaCounters) {
        for slot in 0..2 {
            self.accepted[slot] += other.accepted[slot];
            self.rejected[slot] += other.rejected[slot];
        }
    }
}
