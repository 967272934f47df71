//! Tet location: neighbour walk from the cached tet, search-mesh fallback

use crate::aabb;
use crate::context::TaskContext;
use crate::float_types::{Real, tolerance};
use crate::geometry::MeshId;
use crate::mesh::{TetId, TetMesh, TetNeighbour};
use log::debug;
use nalgebra::Point3;

/// Why the neighbour walk handed over to the search-mesh scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkFallback {
    /// Nothing cached for this mesh yet
    NoStart,
    /// The walk reached a face on the mesh boundary
    LeftMesh,
    /// The walk stepped straight back to the tet it came from
    Cycle,
    /// The hop cap was reached
    HopCap,
}

/// How a tet lookup was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkStats {
    pub hops: usize,
    pub cache_hit: bool,
    pub fallback: Option<WalkFallback>,
}

impl TetMesh {
    /// Tet containing `p`, or `None` when `p` is outside the mesh. `mesh` is
    /// the id of this mesh in its model and keys the cache slot in `ctx`.
    pub fn locate(&self, p: &Point3<Real>, mesh: MeshId, ctx: &mut TaskContext) -> Option<TetId> {
        self.locate_with_stats(p, mesh, ctx).0
    }

    pub fn locate_with_stats(
        &self,
        p: &Point3<Real>,
        mesh: MeshId,
        ctx: &mut TaskContext,
    ) -> (Option<TetId>, WalkStats) {
        let mut stats = WalkStats::default();
        let found = match ctx.cache().tet(mesh) {
            None => {
                stats.fallback = Some(WalkFallback::NoStart);
                None
            },
            Some(start) if self.contains(start, p) => {
                stats.cache_hit = true;
                Some(start)
            },
            Some(start) => match self.walk(start, p, &mut stats) {
                Ok(t) => Some(t),
                Err(reason) => {
                    stats.fallback = Some(reason);
                    None
                },
            },
        };

        let found = found.or_else(|| {
            if let Some(reason) = stats.fallback {
                debug!("tet walk fell back ({:?}) after {} hops", reason, stats.hops);
            }
            self.scan_bucket(p, ctx.plot_mode())
        });

        if let Some(t) = found {
            ctx.cache_mut().set_tet(mesh, t);
        }
        (found, stats)
    }

    /// Step across the face whose centroid is nearest `p` until a tet
    /// contains it.
    fn walk(&self, start: TetId, p: &Point3<Real>, stats: &mut WalkStats) -> Result<TetId, WalkFallback> {
        let mut previous: Option<TetId> = None;
        let mut current = start;
        while stats.hops < self.hop_cap() {
            let face = self.nearest_face(current, p);
            let next = match self.tet(current).neighbours[face] {
                TetNeighbour::Tet(next) => next,
                TetNeighbour::Outside | TetNeighbour::Pending { .. } => return Err(WalkFallback::LeftMesh),
            };
            if previous == Some(next) {
                return Err(WalkFallback::Cycle);
            }
            stats.hops += 1;
            if self.contains(next, p) {
                return Ok(next);
            }
            previous = Some(current);
            current = next;
        }
        Err(WalkFallback::HopCap)
    }

    /// Face of `tet` with the centroid nearest `p`; the lowest face wins ties.
    fn nearest_face(&self, tet: TetId, p: &Point3<Real>) -> usize {
        let mut best = 0;
        let mut best_d = Real::INFINITY;
        for face in 0..4 {
            let d = (self.face_centroid(tet, face) - p).norm_squared();
            if d < best_d {
                best = face;
                best_d = d;
            }
        }
        best
    }

    fn scan_bucket(&self, p: &Point3<Real>, plot_mode: bool) -> Option<TetId> {
        let (bucket, entry) = self.search().entry_at(p)?;
        let tol = tolerance();
        let found = entry
            .candidates()
            .iter()
            .copied()
            .find(|&t| aabb::contains(&self.tet(t).bounds, p, tol) && self.contains(t, p));
        if found.is_some() && !plot_mode {
            self.search().record_hit(bucket);
        }
        found
    }
}
