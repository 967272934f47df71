//! Uniform-grid search meshes
//!
//! A [`SearchMesh`] splits a bounding box into `nx × ny × nz` buckets. Each
//! bucket remembers which entities (CSG cells or tetrahedra) might contain a
//! point inside it, so the locators only run exact containment tests on a
//! short candidate list instead of on every entity.
//!
//! Buckets are built once and are read-only afterwards; the only shared
//! mutation is a relaxed atomic hit counter per bucket, which is purely
//! informational.

use crate::aabb;
use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use nalgebra::{Point3, Vector3};
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Content of one search-mesh bucket.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchMeshEntry<T> {
    /// Nothing can be found in this bucket
    Empty,
    /// Exactly one entity was assigned to the whole bucket
    Preassigned(T),
    /// Short list of entities to test in order
    Candidates(Vec<T>),
}

impl<T: Copy + PartialEq> SearchMeshEntry<T> {
    /// Classify a candidate list, dropping duplicates while keeping order.
    pub fn from_candidates(candidates: Vec<T>) -> Self {
        let mut unique: Vec<T> = Vec::with_capacity(candidates.len());
        for c in candidates {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        match unique.len() {
            0 => SearchMeshEntry::Empty,
            1 => SearchMeshEntry::Preassigned(unique[0]),
            _ => SearchMeshEntry::Candidates(unique),
        }
    }

    /// All entities of this bucket as a slice.
    pub fn candidates(&self) -> &[T] {
        match self {
            SearchMeshEntry::Empty => &[],
            SearchMeshEntry::Preassigned(entity) => std::slice::from_ref(entity),
            SearchMeshEntry::Candidates(list) => list,
        }
    }

    pub const fn is_empty(&self) -> bool {
        matches!(self, SearchMeshEntry::Empty)
    }
}

/// Occupancy summary of a search mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchMeshStats {
    pub empty: usize,
    pub preassigned: usize,
    pub candidate_lists: usize,
    pub max_candidates: usize,
}

#[derive(Debug)]
pub struct SearchMesh<T> {
    bounds: Aabb,
    dims: [usize; 3],
    bucket_size: Vector3<Real>,
    entries: Vec<SearchMeshEntry<T>>,
    hits: Vec<AtomicU64>,
}

impl<T: Copy + PartialEq + Send + Sync> SearchMesh<T> {
    /// Build a search mesh by asking `fill` for the candidates of every bucket.
    ///
    /// `fill` receives the bounds of one bucket and returns the entities that
    /// may contain points inside it. Buckets are independent, so with the
    /// `parallel` feature they are filled concurrently.
    pub fn build_with<F>(bounds: Aabb, dims: [usize; 3], fill: F) -> Self
    where
        F: Fn(&Aabb) -> Vec<T> + Sync,
    {
        let mut mesh = Self::empty(bounds, dims);
        let n = mesh.len();

        #[cfg(not(feature = "parallel"))]
        let entries = (0..n)
            .map(|i| SearchMeshEntry::from_candidates(fill(&mesh.bucket_bounds(i))))
            .collect();

        #[cfg(feature = "parallel")]
        let entries = (0..n)
            .into_par_iter()
            .map(|i| SearchMeshEntry::from_candidates(fill(&mesh.bucket_bounds(i))))
            .collect();

        mesh.entries = entries;
        mesh
    }

    /// Build a search mesh from entities with known bounding boxes; every
    /// bucket overlapped by a box lists the owning entity.
    pub fn from_boxes<I>(bounds: Aabb, dims: [usize; 3], items: I) -> Self
    where
        I: IntoIterator<Item = (T, Aabb)>,
    {
        let mut mesh = Self::empty(bounds, dims);
        let mut lists: Vec<Vec<T>> = vec![Vec::new(); mesh.len()];

        for (entity, bb) in items {
            if !aabb::intersects(&bb, &mesh.bounds) {
                continue;
            }
            let lo = mesh.clamped_coords(&bb.mins);
            let hi = mesh.clamped_coords(&bb.maxs);
            for k in lo[2]..=hi[2] {
                for j in lo[1]..=hi[1] {
                    for i in lo[0]..=hi[0] {
                        lists[mesh.linearize([i, j, k])].push(entity);
                    }
                }
            }
        }

        mesh.entries = lists
            .into_iter()
            .map(SearchMeshEntry::from_candidates)
            .collect();
        mesh
    }

    fn empty(bounds: Aabb, dims: [usize; 3]) -> Self {
        let dims = [dims[0].max(1), dims[1].max(1), dims[2].max(1)];
        let extent = bounds.maxs - bounds.mins;
        let bucket_size = Vector3::new(
            extent.x / dims[0] as Real,
            extent.y / dims[1] as Real,
            extent.z / dims[2] as Real,
        );
        let n = dims[0] * dims[1] * dims[2];
        Self {
            bounds,
            dims,
            bucket_size,
            entries: vec![SearchMeshEntry::Empty; n],
            hits: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

impl<T> SearchMesh<T> {
    pub const fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub const fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Number of buckets.
    pub const fn len(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn linearize(&self, [i, j, k]: [usize; 3]) -> usize {
        (k * self.dims[1] + j) * self.dims[0] + i
    }

    #[inline]
    fn delinearize(&self, index: usize) -> [usize; 3] {
        let i = index % self.dims[0];
        let jk = index / self.dims[0];
        [i, jk % self.dims[1], jk / self.dims[1]]
    }

    fn axis_coord(&self, value: Real, axis: usize) -> usize {
        let size = self.bucket_size[axis];
        if size <= 0.0 {
            return 0;
        }
        let t = ((value - self.bounds.mins[axis]) / size).floor();
        if t <= 0.0 {
            0
        } else {
            (t as usize).min(self.dims[axis] - 1)
        }
    }

    fn clamped_coords(&self, p: &Point3<Real>) -> [usize; 3] {
        [
            self.axis_coord(p.x, 0),
            self.axis_coord(p.y, 1),
            self.axis_coord(p.z, 2),
        ]
    }

    /// Bucket containing `p`, or `None` outside the mesh bounds.
    ///
    /// Points on the upper boundary belong to the last bucket of the axis.
    pub fn bucket_index(&self, p: &Point3<Real>) -> Option<usize> {
        if !aabb::contains(&self.bounds, p, 0.0) {
            return None;
        }
        Some(self.linearize(self.clamped_coords(p)))
    }

    /// Bounds of bucket `index`.
    pub fn bucket_bounds(&self, index: usize) -> Aabb {
        let [i, j, k] = self.delinearize(index);
        let mins = Point3::new(
            self.bounds.mins.x + i as Real * self.bucket_size.x,
            self.bounds.mins.y + j as Real * self.bucket_size.y,
            self.bounds.mins.z + k as Real * self.bucket_size.z,
        );
        Aabb::new(mins, mins + self.bucket_size)
    }

    pub fn entry(&self, index: usize) -> &SearchMeshEntry<T> {
        &self.entries[index]
    }

    /// Bucket index and entry for `p`, or `None` outside the mesh bounds.
    pub fn entry_at(&self, p: &Point3<Real>) -> Option<(usize, &SearchMeshEntry<T>)> {
        let index = self.bucket_index(p)?;
        Some((index, &self.entries[index]))
    }

    /// Count one successful lookup in bucket `index`.
    #[inline]
    pub fn record_hit(&self, index: usize) {
        self.hits[index].fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self, index: usize) -> u64 {
        self.hits[index].load(Ordering::Relaxed)
    }

    pub fn total_hits(&self) -> u64 {
        self.hits.iter().map(|h| h.load(Ordering::Relaxed)).sum()
    }

    pub fn stats(&self) -> SearchMeshStats {
        let mut stats = SearchMeshStats::default();
        for entry in &self.entries {
            match entry {
                SearchMeshEntry::Empty => stats.empty += 1,
                SearchMeshEntry::Preassigned(_) => stats.preassigned += 1,
                SearchMeshEntry::Candidates(list) => {
                    stats.candidate_lists += 1;
                    stats.max_candidates = stats.max_candidates.max(list.len());
                },
            }
        }
        stats
    }
}
