//! Outer boundary conditions on an axis-aligned box

use super::{BoundaryConditions, BoundaryResult, ParticleState};
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::geometry::CellId;

#[derive(Debug, Clone, PartialEq)]
pub enum OuterBoundary {
    /// Particles leaving the geometry are lost
    Black,
    /// Mirror the particle back into the box
    Reflective(Aabb),
    /// Wrap the particle around to the opposite side of the box
    Periodic(Aabb),
}

impl BoundaryConditions for OuterBoundary {
    fn apply(&self, _cell: Option<CellId>, state: &mut ParticleState, _task: usize) -> BoundaryResult {
        match self {
            OuterBoundary::Black => BoundaryResult::NoConditionAvailable,
            OuterBoundary::Reflective(bounds) => {
                for axis in 0..3 {
                    let (x, d) = reflect(
                        state.position[axis],
                        state.direction[axis],
                        bounds.mins[axis],
                        bounds.maxs[axis],
                    );
                    state.position[axis] = x;
                    state.direction[axis] = d;
                }
                BoundaryResult::Applied
            },
            OuterBoundary::Periodic(bounds) => {
                for axis in 0..3 {
                    let lo = bounds.mins[axis];
                    let length = bounds.maxs[axis] - lo;
                    if length > 0.0 {
                        state.position[axis] = lo + (state.position[axis] - lo).rem_euclid(length);
                    }
                }
                BoundaryResult::Applied
            },
        }
    }
}

/// Fold coordinate `x` with direction component `d` into `[lo, hi]` by
/// repeated mirroring. A particle sitting exactly on a wall is turned inwards.
fn reflect(x: Real, d: Real, lo: Real, hi: Real) -> (Real, Real) {
    let length = hi - lo;
    if length <= 0.0 || (lo < x && x < hi) {
        return (x, d);
    }
    if x == lo {
        return (lo, d.abs());
    }
    if x == hi {
        return (hi, -d.abs());
    }
    let t = (x - lo) / length;
    let n = t.floor();
    let frac = t - n;
    if (n as i64).rem_euclid(2) == 1 {
        (hi - frac * length, -d)
    } else {
        (lo + frac * length, d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::ParticleType;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn unit_box() -> Aabb {
        Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn reflect_folds_and_flips() {
        let (x, d) = reflect(1.25, 1.0, 0.0, 1.0);
        assert_relative_eq!(x, 0.75);
        assert_eq!(d, -1.0);
        let (x, d) = reflect(-0.25, -0.5, 0.0, 1.0);
        assert_relative_eq!(x, 0.25);
        assert_eq!(d, 0.5);
        let (x, d) = reflect(2.25, 1.0, 0.0, 1.0);
        assert_relative_eq!(x, 0.25);
        assert_eq!(d, 1.0);
        assert_eq!(reflect(0.5, 1.0, 0.0, 1.0), (0.5, 1.0));
        assert_eq!(reflect(0.0, -1.0, 0.0, 1.0), (0.0, 1.0));
    }

    #[test]
    fn periodic_wraps_position_only() {
        let mut state = ParticleState::new(
            Point3::new(1.2, -0.1, 0.5),
            Vector3::new(1.0, -1.0, 0.0),
            1.0,
            ParticleType::Neutron,
        );
        let direction = state.direction;
        let result = OuterBoundary::Periodic(unit_box()).apply(None, &mut state, 0);
        assert_eq!(result, BoundaryResult::Applied);
        assert_relative_eq!(state.position.x, 0.2, epsilon = 1e-12);
        assert_relative_eq!(state.position.y, 0.9, epsilon = 1e-12);
        assert_relative_eq!(state.position.z, 0.5);
        assert_eq!(state.direction, direction);
    }

    #[test]
    fn reflective_turns_the_particle() {
        let mut state = ParticleState::new(
            Point3::new(1.2, 0.5, 0.5),
            Vector3::new(1.0, 0.0, 0.0),
            1.0,
            ParticleType::Neutron,
        );
        OuterBoundary::Reflective(unit_box()).apply(None, &mut state, 0);
        assert_relative_eq!(state.position.x, 0.8, epsilon = 1e-12);
        assert_relative_eq!(state.direction.x, -1.0);
        assert_eq!(
            OuterBoundary::Black.apply(None, &mut state, 0),
            BoundaryResult::NoConditionAvailable
        );
    }
}
