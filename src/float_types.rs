// Re-export parry for the tracking precision
pub use parry3d_f64 as parry3d;

// Our Real scalar type:
pub type Real = f64;

use core::str::FromStr;
use std::sync::OnceLock;

/// Machine epsilon of [`Real`]
pub const EPSILON: Real = f64::EPSILON;

/// Lazily-initialized geometric tolerance used for containment ties.
/// Defaults to `1e-9`, but can be overridden:
///  1) **Build-time**: set env var `CSGTRACK_TOLERANCE` (e.g. `CSGTRACK_TOLERANCE=1e-7 cargo build`)
///  2) **Runtime**: call [`set_tolerance`] once before building a geometry
static TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
const fn default_tolerance() -> Real {
    1e-9
}

/// Returns the current tolerance.
/// If not set yet, it tries `CSGTRACK_TOLERANCE` (parsed as `Real`) and
/// falls back to the default.
pub fn tolerance() -> Real {
    *TOLERANCE_CELL.get_or_init(|| {
        if let Some(environment_variable) = option_env!("CSGTRACK_TOLERANCE") {
            if let Ok(value) = Real::from_str(environment_variable) {
                return value.max(EPSILON);
            }
        }
        default_tolerance()
    })
}

/// Set the tolerance programmatically once (subsequent calls are ignored).
pub fn set_tolerance(value: Real) {
    let _ = TOLERANCE_CELL.set(value.max(EPSILON));
}

/// Archimedes' constant (π)
pub const PI: Real = core::f64::consts::PI;
