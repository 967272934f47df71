//! Boolean cell regions over surface half-spaces

use super::SurfaceId;
use super::surface::Surface;
use crate::float_types::Real;
use nalgebra::{Point3, Vector3};

/// Boolean combination of surface half-spaces.
///
/// An empty [`Region::Intersection`] is the whole space and an empty
/// [`Region::Union`] is the empty set.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    Halfspace { surface: SurfaceId, inside: bool },
    Intersection(Vec<Region>),
    Union(Vec<Region>),
    Complement(Box<Region>),
}

impl Region {
    pub const fn everything() -> Self {
        Region::Intersection(Vec::new())
    }

    pub const fn inside(surface: SurfaceId) -> Self {
        Region::Halfspace { surface, inside: true }
    }

    pub const fn outside(surface: SurfaceId) -> Self {
        Region::Halfspace { surface, inside: false }
    }

    /// Intersection of `self` and `other`, flattening nested intersections.
    pub fn and(self, other: Region) -> Self {
        match (self, other) {
            (Region::Intersection(mut a), Region::Intersection(b)) => {
                a.extend(b);
                Region::Intersection(a)
            },
            (Region::Intersection(mut a), r) => {
                a.push(r);
                Region::Intersection(a)
            },
            (l, r) => Region::Intersection(vec![l, r]),
        }
    }

    pub fn or(self, other: Region) -> Self {
        match (self, other) {
            (Region::Union(mut a), Region::Union(b)) => {
                a.extend(b);
                Region::Union(a)
            },
            (Region::Union(mut a), r) => {
                a.push(r);
                Region::Union(a)
            },
            (l, r) => Region::Union(vec![l, r]),
        }
    }

    pub fn complement(self) -> Self {
        match self {
            Region::Complement(inner) => *inner,
            r => Region::Complement(Box::new(r)),
        }
    }

    /// Exact containment test.
    pub fn contains(&self, surfaces: &[Surface], p: &Point3<Real>, direction: &Vector3<Real>) -> bool {
        match self {
            Region::Halfspace { surface, inside } => {
                surfaces[surface.0].is_inside(p, direction) == *inside
            },
            Region::Intersection(parts) => parts.iter().all(|r| r.contains(surfaces, p, direction)),
            Region::Union(parts) => parts.iter().any(|r| r.contains(surfaces, p, direction)),
            Region::Complement(inner) => !inner.contains(surfaces, p, direction),
        }
    }

    /// Every surface referenced by the region, in first-use order.
    pub fn surfaces(&self) -> Vec<SurfaceId> {
        let mut out = Vec::new();
        self.collect_surfaces(&mut out);
        out
    }

    fn collect_surfaces(&self, out: &mut Vec<SurfaceId>) {
        match self {
            Region::Halfspace { surface, .. } => {
                if !out.contains(surface) {
                    out.push(*surface);
                }
            },
            Region::Intersection(parts) | Region::Union(parts) => {
                for part in parts {
                    part.collect_surfaces(out);
                }
            },
            Region::Complement(inner) => inner.collect_surfaces(out),
        }
    }
}
