//! The delta-tracking step
//!
//! A step samples a flight length against the majorant cross section, moves
//! the particle and locates it. Leaving the geometry either ends the step at
//! the surface or applies boundary conditions until the particle is back
//! inside. Inside, a cell owned by another rank ends the step with a
//! handoff; otherwise the true cross section decides between a real and a
//! virtual collision.

use super::{BoundaryConditions, BoundaryResult, CrossSections, Outcome, ParticleState, TrackStep};
use crate::config::TrackingConfig;
use crate::context::TaskContext;
use crate::errors::TrackingError;
use crate::float_types::Real;
use crate::geometry::{CellId, GeometryModel, MaterialId};
use crate::locate::{CellLocation, SearchMode};
use crate::mesh::TetId;
use log::error;

/// Result of the accept/reject test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Sample {
    Virtual,
    /// Real collision; the particle weight is multiplied by `weight_factor`
    Real { weight_factor: Real },
}

/// Two-tier rejection test.
///
/// The first draw accepts with probability `max(xs, min_xs) / majorant`. When
/// the true cross section is below `min_xs` a second draw thins that down to
/// `xs / majorant` overall, unless forced collisions trade the second draw
/// for a weight factor of `xs / min_xs`.
pub(crate) fn sample_collision(
    xs: Real,
    majorant: Real,
    min_xs: Real,
    forced_collisions: bool,
    mut draw: impl FnMut() -> Real,
) -> Sample {
    let min_xs = min_xs.clamp(0.0, majorant);
    if draw() * majorant >= xs.max(min_xs) {
        return Sample::Virtual;
    }
    if xs >= min_xs {
        return Sample::Real { weight_factor: 1.0 };
    }
    if forced_collisions && xs > 0.0 {
        return Sample::Real { weight_factor: xs / min_xs };
    }
    if draw() * min_xs < xs {
        Sample::Real { weight_factor: 1.0 }
    } else {
        Sample::Virtual
    }
}

pub struct DeltaTracker<'a> {
    model: &'a GeometryModel,
    cross_sections: &'a dyn CrossSections,
    boundaries: &'a dyn BoundaryConditions,
    config: TrackingConfig,
}

impl<'a> DeltaTracker<'a> {
    pub fn new(
        model: &'a GeometryModel,
        cross_sections: &'a dyn CrossSections,
        boundaries: &'a dyn BoundaryConditions,
        config: TrackingConfig,
    ) -> Self {
        Self { model, cross_sections, boundaries, config }
    }

    pub const fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Advance `state` by one delta-tracking step.
    ///
    /// `majorant` must bound the true cross section everywhere the particle
    /// can go; `min_xs` is the threshold below which the second rejection
    /// tier (or forced collisions) applies.
    pub fn advance(
        &self,
        state: &mut ParticleState,
        majorant: Real,
        min_xs: Real,
        ctx: &mut TaskContext,
    ) -> Result<TrackStep, TrackingError> {
        if !(majorant.is_finite() && majorant > 0.0) {
            error!("cannot sample a flight length with majorant {}", majorant);
            return Err(TrackingError::InvalidMajorant(majorant));
        }
        if !min_xs.is_finite() {
            error!("cannot thin collisions with minimum cross section {}", min_xs);
            return Err(TrackingError::InvalidMinimumXs(min_xs));
        }
        let (majorant, min_xs) = if self.config.sensitivity {
            (2.0 * majorant, 2.0 * min_xs)
        } else {
            (majorant, min_xs)
        };

        let path_length = if state.received_handoff {
            state.received_handoff = false;
            0.0
        } else {
            -(1.0 - ctx.uniform()).ln() / majorant
        };
        state.position += state.direction * path_length;

        let (cell, tet) = match self.locate_inside(state, path_length, ctx)? {
            Some(found) => found,
            None => {
                return Ok(TrackStep {
                    cell: state.cell,
                    tet: None,
                    material: None,
                    cross_section: 0.0,
                    path_length,
                    outcome: Outcome::Surface,
                });
            },
        };
        state.cell = Some(cell);

        if self.config.domain_decomposition {
            if let Some(owner) = self.model.cell(cell).domain {
                if owner != self.config.rank {
                    state.rank = owner;
                    state.received_handoff = true;
                    return Ok(TrackStep {
                        cell: Some(cell),
                        tet,
                        material: None,
                        cross_section: 0.0,
                        path_length,
                        outcome: Outcome::DomainHandoff,
                    });
                }
            }
        }

        let material = self.model.material_of(cell, tet);
        let mut xs = material.map_or(0.0, |m| self.total_xs(m, state, ctx));
        if self.config.sensitivity {
            xs *= 2.0;
        }
        if xs > majorant {
            error!("cross section {} above majorant {} in cell {}", xs, majorant, self.model.cell(cell).name);
            return Err(TrackingError::MajorantViolation { xs, majorant });
        }

        let sample = sample_collision(xs, majorant, min_xs, self.config.forced_collisions, || ctx.uniform());
        let outcome = match sample {
            Sample::Real { weight_factor } => {
                state.weight *= weight_factor;
                Outcome::Collision
            },
            Sample::Virtual => Outcome::Virtual,
        };
        ctx.counters_mut().record(state.particle, outcome == Outcome::Collision);

        Ok(TrackStep {
            cell: Some(cell),
            tet,
            material,
            cross_section: xs,
            path_length,
            outcome,
        })
    }

    /// Locate the particle, applying boundary conditions while it is outside.
    /// `None` means the step ends on the outer surface.
    fn locate_inside(
        &self,
        state: &mut ParticleState,
        path_length: Real,
        ctx: &mut TaskContext,
    ) -> Result<Option<(CellId, Option<TetId>)>, TrackingError> {
        let mut applied = 0usize;
        loop {
            let location = self
                .model
                .locate_cell(&state.position, &state.direction, SearchMode::Transport, ctx);
            let outside_cell = match location {
                CellLocation::Found { cell, tet, .. } if !self.model.cell(cell).is_outside() => {
                    return Ok(Some((cell, tet)));
                },
                CellLocation::Found { cell, .. } => Some(cell),
                CellLocation::NotFound | CellLocation::Ambiguous { .. } => None,
            };

            if path_length <= 0.0 || self.config.stop_at_outer_boundary {
                state.cell = outside_cell;
                return Ok(None);
            }
            if applied >= self.config.max_boundary_iterations {
                error!("particle still outside after {} boundary conditions", applied);
                return Err(TrackingError::BoundaryLimit(applied));
            }

            let (position, direction, weight) = (state.position, state.direction, state.weight);
            match self.boundaries.apply(outside_cell, state, ctx.id()) {
                BoundaryResult::NoConditionAvailable if applied == 0 => {
                    state.cell = outside_cell;
                    return Ok(None);
                },
                BoundaryResult::NoConditionAvailable => {
                    error!("no boundary condition after relocating to {}", state.position);
                    return Err(TrackingError::MissingBoundary(state.position));
                },
                BoundaryResult::Applied => {
                    if state.position == position && state.direction == direction {
                        error!("boundary condition left the particle at {}", position);
                        return Err(TrackingError::StationaryBoundary { position });
                    }
                    if state.weight != weight {
                        return Err(TrackingError::WeightChanged { before: weight, after: state.weight });
                    }
                },
            }
            applied += 1;
        }
    }

    fn total_xs(&self, material: MaterialId, state: &ParticleState, ctx: &mut TaskContext) -> Real {
        if let Some(xs) = ctx.xs_cache_mut().get(material, state.particle, state.energy) {
            return xs;
        }
        let xs = self
            .cross_sections
            .total_macroscopic_xs(material, state.particle, state.energy, ctx.id());
        ctx.xs_cache_mut().insert(material, state.particle, state.energy, xs);
        xs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draws(values: &[Real]) -> impl FnMut() -> Real + '_ {
        let mut it = values.iter().copied();
        move || it.next().unwrap()
    }

    #[test]
    fn analog_limit_is_never_virtual() {
        for xi in [0.0, 0.3, 0.999_999] {
            assert_eq!(
                sample_collision(2.0, 2.0, 2.0, false, draws(&[xi])),
                Sample::Real { weight_factor: 1.0 }
            );
        }
    }

    #[test]
    fn first_tier_rejects_above_threshold() {
        assert_eq!(sample_collision(1.0, 4.0, 0.0, false, draws(&[0.5])), Sample::Virtual);
        assert_eq!(
            sample_collision(1.0, 4.0, 0.0, false, draws(&[0.2])),
            Sample::Real { weight_factor: 1.0 }
        );
    }

    #[test]
    fn second_tier_below_minimum() {
        // threshold is min_xs = 2, so xi1 = 0.25 passes the first tier
        assert_eq!(
            sample_collision(0.5, 4.0, 2.0, false, draws(&[0.25, 0.2])),
            Sample::Real { weight_factor: 1.0 }
        );
        assert_eq!(sample_collision(0.5, 4.0, 2.0, false, draws(&[0.25, 0.3])), Sample::Virtual);
        assert_eq!(
            sample_collision(0.5, 4.0, 2.0, true, draws(&[0.25])),
            Sample::Real { weight_factor: 0.25 }
        );
    }

    #[test]
    fn void_is_always_virtual() {
        assert_eq!(sample_collision(0.0, 1.0, 0.5, true, draws(&[0.0, 0.0])), Sample::Virtual);
        assert_eq!(sample_collision(0.0, 1.0, 0.0, false, draws(&[0.0])), Sample::Virtual);
    }
}
