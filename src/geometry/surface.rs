//! Surface primitives
//!
//! Every surface is described by a type tag and a parameter vector, the way
//! geometry input lists them. Parameters are checked once in
//! [`SurfaceShape::from_params`]; afterwards the shape is a plain enum with
//! named fields.
//!
//! The sign convention is the usual one for CSG transport codes:
//! [`SurfaceShape::evaluate`] is negative on the *inside* of the surface.

use crate::errors::GeometryError;
use crate::float_types::{Real, tolerance};
use nalgebra::{Point3, Vector3};

/// Surface type tags with their parameter layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceType {
    /// `x0`
    PlaneX,
    /// `y0`
    PlaneY,
    /// `z0`
    PlaneZ,
    /// `a b c d` for the plane `ax + by + cz = d`
    Plane,
    /// `x0 y0 z0 r`
    Sphere,
    /// `y0 z0 r`
    CylinderX,
    /// `x0 z0 r`
    CylinderY,
    /// `x0 y0 r`
    CylinderZ,
    /// `xmin xmax ymin ymax zmin zmax`
    Cuboid,
}

impl SurfaceType {
    pub const fn parameter_count(self) -> usize {
        match self {
            SurfaceType::PlaneX | SurfaceType::PlaneY | SurfaceType::PlaneZ => 1,
            SurfaceType::Plane | SurfaceType::Sphere => 4,
            SurfaceType::CylinderX | SurfaceType::CylinderY | SurfaceType::CylinderZ => 3,
            SurfaceType::Cuboid => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceShape {
    PlaneX(Real),
    PlaneY(Real),
    PlaneZ(Real),
    /// `normal · p - offset`, with a unit normal
    Plane { normal: Vector3<Real>, offset: Real },
    Sphere { centre: Point3<Real>, radius: Real },
    CylinderX { y: Real, z: Real, radius: Real },
    CylinderY { x: Real, z: Real, radius: Real },
    CylinderZ { x: Real, y: Real, radius: Real },
    Cuboid { mins: Point3<Real>, maxs: Point3<Real> },
}

impl SurfaceShape {
    /// Build a shape from a type tag and its parameter vector.
    pub fn from_params(
        name: &str,
        kind: SurfaceType,
        params: &[Real],
    ) -> Result<Self, GeometryError> {
        let expected = kind.parameter_count();
        if params.len() != expected {
            return Err(GeometryError::SurfaceParameters {
                name: name.to_string(),
                expected,
                got: params.len(),
            });
        }
        if params.iter().any(|v| !v.is_finite()) {
            return Err(invalid(name, "non-finite parameter"));
        }

        let positive_radius = |r: Real| {
            if r > 0.0 {
                Ok(r)
            } else {
                Err(invalid(name, "radius must be positive"))
            }
        };

        let shape = match kind {
            SurfaceType::PlaneX => SurfaceShape::PlaneX(params[0]),
            SurfaceType::PlaneY => SurfaceShape::PlaneY(params[0]),
            SurfaceType::PlaneZ => SurfaceShape::PlaneZ(params[0]),
            SurfaceType::Plane => {
                let n = Vector3::new(params[0], params[1], params[2]);
                let len = n.norm();
                if len <= tolerance() {
                    return Err(invalid(name, "plane normal has zero length"));
                }
                SurfaceShape::Plane {
                    normal: n / len,
                    offset: params[3] / len,
                }
            },
            SurfaceType::Sphere => SurfaceShape::Sphere {
                centre: Point3::new(params[0], params[1], params[2]),
                radius: positive_radius(params[3])?,
            },
            SurfaceType::CylinderX => SurfaceShape::CylinderX {
                y: params[0],
                z: params[1],
                radius: positive_radius(params[2])?,
            },
            SurfaceType::CylinderY => SurfaceShape::CylinderY {
                x: params[0],
                z: params[1],
                radius: positive_radius(params[2])?,
            },
            SurfaceType::CylinderZ => SurfaceShape::CylinderZ {
                x: params[0],
                y: params[1],
                radius: positive_radius(params[2])?,
            },
            SurfaceType::Cuboid => {
                let mins = Point3::new(params[0], params[2], params[4]);
                let maxs = Point3::new(params[1], params[3], params[5]);
                if mins.x >= maxs.x || mins.y >= maxs.y || mins.z >= maxs.z {
                    return Err(invalid(name, "cuboid minimum must be below maximum"));
                }
                SurfaceShape::Cuboid { mins, maxs }
            },
        };
        Ok(shape)
    }

    /// Signed distance-like value, negative inside.
    pub fn evaluate(&self, p: &Point3<Real>) -> Real {
        match self {
            SurfaceShape::PlaneX(x0) => p.x - x0,
            SurfaceShape::PlaneY(y0) => p.y - y0,
            SurfaceShape::PlaneZ(z0) => p.z - z0,
            SurfaceShape::Plane { normal, offset } => normal.dot(&p.coords) - offset,
            SurfaceShape::Sphere { centre, radius } => (p - centre).norm() - radius,
            SurfaceShape::CylinderX { y, z, radius } => (p.y - y).hypot(p.z - z) - radius,
            SurfaceShape::CylinderY { x, z, radius } => (p.x - x).hypot(p.z - z) - radius,
            SurfaceShape::CylinderZ { x, y, radius } => (p.x - x).hypot(p.y - y) - radius,
            SurfaceShape::Cuboid { mins, maxs } => {
                let dx = (mins.x - p.x).max(p.x - maxs.x);
                let dy = (mins.y - p.y).max(p.y - maxs.y);
                let dz = (mins.z - p.z).max(p.z - maxs.z);
                dx.max(dy).max(dz)
            },
        }
    }

    /// Outward direction of increasing [`evaluate`](Self::evaluate) at `p`.
    ///
    /// Zero on the axis of a cylinder or at the centre of a sphere.
    pub fn gradient(&self, p: &Point3<Real>) -> Vector3<Real> {
        let radial = |v: Vector3<Real>| {
            let n = v.norm();
            if n > 0.0 { v / n } else { Vector3::zeros() }
        };
        match self {
            SurfaceShape::PlaneX(_) => Vector3::x(),
            SurfaceShape::PlaneY(_) => Vector3::y(),
            SurfaceShape::PlaneZ(_) => Vector3::z(),
            SurfaceShape::Plane { normal, .. } => *normal,
            SurfaceShape::Sphere { centre, .. } => radial(p - centre),
            SurfaceShape::CylinderX { y, z, .. } => radial(Vector3::new(0.0, p.y - y, p.z - z)),
            SurfaceShape::CylinderY { x, z, .. } => radial(Vector3::new(p.x - x, 0.0, p.z - z)),
            SurfaceShape::CylinderZ { x, y, .. } => radial(Vector3::new(p.x - x, p.y - y, 0.0)),
            SurfaceShape::Cuboid { mins, maxs } => {
                // dominant face
                let d = [
                    (mins.x - p.x, -Vector3::x()),
                    (p.x - maxs.x, Vector3::x()),
                    (mins.y - p.y, -Vector3::y()),
                    (p.y - maxs.y, Vector3::y()),
                    (mins.z - p.z, -Vector3::z()),
                    (p.z - maxs.z, Vector3::z()),
                ];
                d.iter()
                    .fold((Real::NEG_INFINITY, Vector3::zeros()), |acc, &(v, n)| {
                        if v > acc.0 { (v, n) } else { acc }
                    })
                    .1
            },
        }
    }

    /// Inside test; points within the tolerance band of the surface count as
    /// inside when `direction` heads into the surface.
    pub fn is_inside(&self, p: &Point3<Real>, direction: &Vector3<Real>) -> bool {
        let f = self.evaluate(p);
        let tol = tolerance();
        if f < -tol {
            true
        } else if f > tol {
            false
        } else {
            self.gradient(p).dot(direction) < 0.0
        }
    }

    /// Distance along the unit `direction` to the nearest crossing, if any.
    pub fn distance(&self, p: &Point3<Real>, direction: &Vector3<Real>) -> Option<Real> {
        let tol = tolerance();
        match self {
            SurfaceShape::PlaneX(x0) => plane_distance(p.x - x0, direction.x),
            SurfaceShape::PlaneY(y0) => plane_distance(p.y - y0, direction.y),
            SurfaceShape::PlaneZ(z0) => plane_distance(p.z - z0, direction.z),
            SurfaceShape::Plane { normal, offset } => {
                plane_distance(normal.dot(&p.coords) - offset, normal.dot(direction))
            },
            SurfaceShape::Sphere { centre, radius } => {
                let oc = p - centre;
                let b = oc.dot(direction);
                let c = oc.norm_squared() - radius * radius;
                smallest_positive_root(direction.norm_squared(), b, c, tol)
            },
            SurfaceShape::CylinderX { y, z, radius } => {
                cylinder_distance(p.y - y, p.z - z, direction.y, direction.z, *radius, tol)
            },
            SurfaceShape::CylinderY { x, z, radius } => {
                cylinder_distance(p.x - x, p.z - z, direction.x, direction.z, *radius, tol)
            },
            SurfaceShape::CylinderZ { x, y, radius } => {
                cylinder_distance(p.x - x, p.y - y, direction.x, direction.y, *radius, tol)
            },
            SurfaceShape::Cuboid { mins, maxs } => {
                let mut best: Option<Real> = None;
                for axis in 0..3 {
                    if direction[axis] == 0.0 {
                        continue;
                    }
                    for bound in [mins[axis], maxs[axis]] {
                        let t = (bound - p[axis]) / direction[axis];
                        if t <= tol {
                            continue;
                        }
                        let q = p + direction * t;
                        let on_face = (0..3).filter(|&a| a != axis).all(|a| {
                            q[a] >= mins[a] - tol && q[a] <= maxs[a] + tol
                        });
                        if on_face && best.is_none_or(|b| t < b) {
                            best = Some(t);
                        }
                    }
                }
                best
            },
        }
    }
}

fn invalid(name: &str, reason: &str) -> GeometryError {
    GeometryError::InvalidSurface {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn plane_distance(f: Real, along: Real) -> Option<Real> {
    if along == 0.0 {
        return None;
    }
    let t = -f / along;
    if t > tolerance() { Some(t) } else { None }
}

/// Smallest root `t > tol` of `a t² + 2 b t + c = 0`.
fn smallest_positive_root(a: Real, b: Real, c: Real, tol: Real) -> Option<Real> {
    if a <= 0.0 {
        return None;
    }
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let t1 = (-b - sq) / a;
    let t2 = (-b + sq) / a;
    if t1 > tol {
        Some(t1)
    } else if t2 > tol {
        Some(t2)
    } else {
        None
    }
}

fn cylinder_distance(u: Real, v: Real, du: Real, dv: Real, radius: Real, tol: Real) -> Option<Real> {
    let a = du * du + dv * dv;
    let b = u * du + v * dv;
    let c = u * u + v * v - radius * radius;
    smallest_positive_root(a, b, c, tol)
}

/// A named surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub name: String,
    pub shape: SurfaceShape,
}

impl Surface {
    pub fn new(name: impl Into<String>, kind: SurfaceType, params: &[Real]) -> Result<Self, GeometryError> {
        let name = name.into();
        let shape = SurfaceShape::from_params(&name, kind, params)?;
        Ok(Self { name, shape })
    }

    #[inline]
    pub fn is_inside(&self, p: &Point3<Real>, direction: &Vector3<Real>) -> bool {
        self.shape.is_inside(p, direction)
    }

    #[inline]
    pub fn distance(&self, p: &Point3<Real>, direction: &Vector3<Real>) -> Option<Real> {
        self.shape.distance(p, direction)
    }
}
