//! Construction, topology and tracking errors

use crate::float_types::Real;
use nalgebra::Point3;
use std::fmt::Display;

/// All the fatal issues we might encounter while building or loading geometry.
///
/// Every variant means the precomputed geometry cannot be trusted, so callers
/// are expected to abort before any particle is tracked.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// (DegenerateTet) A child tetrahedron has a non-positive signed volume
    DegenerateTet {
        parent: usize,
        face: usize,
        volume: Real,
    },
    /// (UnmatchedFace) No child of the neighbouring polyhedron shares this face
    UnmatchedFace {
        parent: usize,
        neighbour: usize,
        face: usize,
    },
    /// (TopologyMismatch) Two linked tets do not share the expected three vertices
    TopologyMismatch {
        tet: usize,
        face: usize,
        other: usize,
        other_face: usize,
    },
    /// (PendingLink) A parent-polyhedron link was never resolved
    PendingLink { tet: usize, face: usize, parent: usize },
    /// (IndexOutOfRange) An index refers past the end of its table
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    /// (SurfaceParameters) Wrong number of parameters for a surface type
    SurfaceParameters {
        name: String,
        expected: usize,
        got: usize,
    },
    /// (InvalidSurface) Parameters are well counted but geometrically meaningless
    InvalidSurface { name: String, reason: String },
    /// (CyclicUniverse) A universe is (indirectly) filled with itself
    CyclicUniverse(String),
    /// (EmptyUniverse) A universe without cells
    EmptyUniverse(String),
    /// (MisplacedCell) A search or source list names a cell of another universe
    MisplacedCell { cell: String, universe: String },
    /// (InvalidCoordinate) A mesh point has a NaN or infinite coordinate
    InvalidCoordinate(Point3<Real>),
    /// In general, anything else wrong with a polyhedral mesh
    MalformedMesh(String),
    /// A persisted topology artifact could not be decoded
    InvalidArtifact(String),
    /// Underlying I/O failure while reading or writing an artifact
    Io(#[from] std::io::Error),
}

impl Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::DegenerateTet { parent, face, volume } => write!(
                f,
                "(DegenerateTet) Tetrahedron on face {} of polyhedron {} has signed volume {}",
                face, parent, volume
            ),
            GeometryError::UnmatchedFace { parent, neighbour, face } => write!(
                f,
                "(UnmatchedFace) Face {} of polyhedron {} has no match among the children of polyhedron {}",
                face, parent, neighbour
            ),
            GeometryError::TopologyMismatch { tet, face, other, other_face } => write!(
                f,
                "(TopologyMismatch) Face {} of tet {} does not match face {} of tet {}",
                face, tet, other_face, other
            ),
            GeometryError::PendingLink { tet, face, parent } => write!(
                f,
                "(PendingLink) Face {} of tet {} still points at polyhedron {}",
                face, tet, parent
            ),
            GeometryError::IndexOutOfRange { what, index, len } => write!(
                f,
                "(IndexOutOfRange) {} index {} is out of range (len = {})",
                what, index, len
            ),
            GeometryError::SurfaceParameters { name, expected, got } => write!(
                f,
                "(SurfaceParameters) Surface {} expects {} parameters, got {}",
                name, expected, got
            ),
            GeometryError::InvalidSurface { name, reason } => {
                write!(f, "(InvalidSurface) Surface {}: {}", name, reason)
            },
            GeometryError::CyclicUniverse(name) => {
                write!(f, "(CyclicUniverse) Universe {} is nested inside itself", name)
            },
            GeometryError::EmptyUniverse(name) => {
                write!(f, "(EmptyUniverse) Universe {} has no cells", name)
            },
            GeometryError::MisplacedCell { cell, universe } => write!(
                f,
                "(MisplacedCell) Cell {} is listed in universe {} but belongs elsewhere",
                cell, universe
            ),
            GeometryError::InvalidCoordinate(opoint) => write!(
                f,
                "(InvalidCoordinate) The coordinate ({}) has a NaN or infinite",
                opoint
            ),
            GeometryError::MalformedMesh(str) => write!(f, "(MalformedMesh) {}", str),
            GeometryError::InvalidArtifact(str) => write!(f, "(InvalidArtifact) {}", str),
            GeometryError::Io(err) => err.fmt(f),
        }
    }
}

/// Internal-consistency failures detected while advancing a particle.
///
/// These are never user-facing conditions: they imply a broken boundary
/// condition or a majorant that does not bound the true cross section.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackingError {
    /// A boundary condition reported success without moving the particle
    #[error("boundary condition reported success but left the particle at {position}")]
    StationaryBoundary { position: Point3<Real> },

    /// A boundary condition modified a weight it must preserve
    #[error("boundary condition changed particle weight from {before} to {after}")]
    WeightChanged { before: Real, after: Real },

    /// No condition was available after a successful relocation
    #[error("no boundary condition available after relocation at {0}")]
    MissingBoundary(Point3<Real>),

    /// Repeated boundary conditions never brought the particle back inside
    #[error("particle still outside the geometry after {0} boundary applications")]
    BoundaryLimit(usize),

    /// True cross section above the majorant
    #[error("true cross section {xs} exceeds majorant {majorant}")]
    MajorantViolation { xs: Real, majorant: Real },

    /// Majorant is not usable for sampling a flight length
    #[error("invalid majorant cross section {0}")]
    InvalidMajorant(Real),

    /// Minimum cross section is NaN or infinite
    #[error("invalid minimum cross section {0}")]
    InvalidMinimumXs(Real),
}

/// Configuration loading and saving errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
