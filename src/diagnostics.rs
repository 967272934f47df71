//! Geometry checks built on plot-mode lookups
//!
//! Both checks switch the task into plot mode for their duration, so every
//! lookup scans whole universes and reports overlaps, and restore the task's
//! previous mode afterwards. Caches are reset whenever the mode changes.

use crate::aabb;
use crate::context::TaskContext;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use crate::geometry::{CellId, GeometryModel};
use crate::locate::{CellLocation, SearchMode};
use log::{info, warn};
use nalgebra::{Point3, Vector3};

/// Direction handed to plot lookups; only matters for points on a surface.
fn probe_direction() -> Vector3<Real> {
    Vector3::new(0.267, 0.535, 0.802).normalize()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlapReport {
    pub probes: usize,
    /// Probe points inside more than one cell of some universe
    pub ambiguous: Vec<(Point3<Real>, Vec<CellId>)>,
    /// Probe points inside no cell at all
    pub undefined: Vec<Point3<Real>>,
}

impl OverlapReport {
    pub fn is_clean(&self) -> bool {
        self.ambiguous.is_empty() && self.undefined.is_empty()
    }
}

/// Locate the centre of every cell of a `samples[0] × samples[1] × samples[2]`
/// grid over `bounds` and collect the points that are multiply defined or
/// not defined at all.
pub fn check_overlaps(
    model: &GeometryModel,
    bounds: &Aabb,
    samples: [usize; 3],
    ctx: &mut TaskContext,
) -> OverlapReport {
    let [nx, ny, nz] = samples.map(|n| n.max(1));
    let step = (bounds.maxs - bounds.mins).component_div(&Vector3::new(nx as Real, ny as Real, nz as Real));
    let direction = probe_direction();
    let mut report = OverlapReport::default();

    let previous = ctx.plot_mode();
    ctx.set_plot_mode(true);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let offset = Vector3::new(i as Real + 0.5, j as Real + 0.5, k as Real + 0.5);
                let p = bounds.mins + offset.component_mul(&step);
                report.probes += 1;
                match model.locate_cell(&p, &direction, SearchMode::Transport, ctx) {
                    CellLocation::Found { .. } => {},
                    CellLocation::NotFound => report.undefined.push(p),
                    CellLocation::Ambiguous { cells } => report.ambiguous.push((p, cells)),
                }
            }
        }
    }
    ctx.set_plot_mode(previous);

    if report.is_clean() {
        info!("geometry check: {} probes, no overlaps or undefined points", report.probes);
    } else {
        warn!(
            "geometry check: {} probes, {} in overlapping cells, {} undefined",
            report.probes,
            report.ambiguous.len(),
            report.undefined.len()
        );
    }
    report
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeEstimate {
    pub cell: CellId,
    pub volume: Real,
    /// One standard deviation relative to `volume`
    pub relative_error: Real,
}

/// Estimate the volume of every cell hit by `n` uniform random points in
/// `bounds`. Points in overlapping or undefined regions are not counted.
/// Results are sorted by cell.
pub fn estimate_volumes(
    model: &GeometryModel,
    bounds: &Aabb,
    n: usize,
    ctx: &mut TaskContext,
) -> Vec<VolumeEstimate> {
    let direction = probe_direction();
    let extent = bounds.maxs - bounds.mins;
    let mut hits = vec![0usize; model.cells().len()];

    let previous = ctx.plot_mode();
    ctx.set_plot_mode(true);
    for _ in 0..n {
        let t = Vector3::new(ctx.uniform(), ctx.uniform(), ctx.uniform());
        let p = bounds.mins + extent.component_mul(&t);
        if let CellLocation::Found { cell, .. } = model.locate_cell(&p, &direction, SearchMode::Transport, ctx) {
            hits[cell.0] += 1;
        }
    }
    ctx.set_plot_mode(previous);

    let total = aabb::volume(bounds);
    hits.iter()
        .enumerate()
        .filter(|&(_, &k)| k > 0)
        .map(|(c, &k)| {
            let f = k as Real / n as Real;
            VolumeEstimate {
                cell: CellId(c),
                volume: total * f,
                relative_error: ((1.0 - f) / k as Real).sqrt(),
            }
        })
        .collect()
}
