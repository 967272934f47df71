//! Geometry location and **delta-tracking** kernel for Monte Carlo particle
//! transport.
//!
//! The kernel resolves points to cells of a hierarchical constructive solid
//! geometry (universes of cells bounded by surface half-spaces) or to
//! tetrahedra of unstructured meshes embedded in it, and advances particles
//! through that geometry with delta tracking.
//!
//! - [`geometry`]: surfaces, regions, cells and universes, assembled by a
//!   [`GeometryBuilder`] into an immutable [`GeometryModel`]
//! - [`mesh`]: tetrahedral meshes, the polyhedron divider that builds them and
//!   their binary persistence
//! - [`search`]: uniform-grid search meshes pruning containment tests
//! - [`locate`]: the CSG and tet locators with their per-task caches
//! - [`tracking`]: the delta-tracking step, boundary conditions and the
//!   multi-task driver
//! - [`diagnostics`]: overlap and volume checks of a geometry
//!
//! The geometry is shared read-only between tasks; all mutable state of a
//! task is carried in a [`TaskContext`].
//!
//! # Features
//! #### Optional
//! - **parallel**: use rayon for search-mesh construction and
//!   [`tracking::run_slices`]

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod aabb;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod errors;
pub mod float_types;
pub mod geometry;
pub mod locate;
pub mod mesh;
pub mod search;
pub mod tracking;

pub use config::KernelConfig;
pub use context::TaskContext;
pub use errors::{ConfigError, GeometryError, TrackingError};
pub use geometry::{GeometryBuilder, GeometryModel};
pub use locate::{CellLocation, SearchMode};
pub use mesh::{PolyMesh, PolyhedronDivider, TetId, TetMesh};
pub use tracking::{DeltaTracker, Outcome, ParticleState, ParticleType, TrackStep};
