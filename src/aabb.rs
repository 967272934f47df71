//! Axis-aligned box helpers shared by the search meshes and the tet mesh

use crate::float_types::{Real, parry3d::bounding_volume::Aabb};
use nalgebra::Point3;

/// Smallest box enclosing `points`, or `None` for an empty iterator.
pub fn from_points<'a, I>(points: I) -> Option<Aabb>
where
    I: IntoIterator<Item = &'a Point3<Real>>,
{
    let mut iter = points.into_iter();
    let first = *iter.next()?;
    let (mins, maxs) = iter.fold((first, first), |(mut mins, mut maxs), p| {
        mins.x = mins.x.min(p.x);
        mins.y = mins.y.min(p.y);
        mins.z = mins.z.min(p.z);
        maxs.x = maxs.x.max(p.x);
        maxs.y = maxs.y.max(p.y);
        maxs.z = maxs.z.max(p.z);
        (mins, maxs)
    });
    Some(Aabb::new(mins, maxs))
}

/// Closed containment test, widened by `tol` on every side.
#[inline]
pub fn contains(aabb: &Aabb, p: &Point3<Real>, tol: Real) -> bool {
    p.x >= aabb.mins.x - tol
        && p.x <= aabb.maxs.x + tol
        && p.y >= aabb.mins.y - tol
        && p.y <= aabb.maxs.y + tol
        && p.z >= aabb.mins.z - tol
        && p.z <= aabb.maxs.z + tol
}

#[inline]
pub fn intersects(a: &Aabb, b: &Aabb) -> bool {
    a.maxs.x >= b.mins.x
        && a.mins.x <= b.maxs.x
        && a.maxs.y >= b.mins.y
        && a.mins.y <= b.maxs.y
        && a.maxs.z >= b.mins.z
        && a.mins.z <= b.maxs.z
}

pub fn volume(aabb: &Aabb) -> Real {
    let d = aabb.maxs - aabb.mins;
    d.x.max(0.0) * d.y.max(0.0) * d.z.max(0.0)
}
