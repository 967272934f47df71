//! Polyhedral volume meshes in owner/neighbour form
//!
//! Every face is a loop of point indices whose right-hand normal points out
//! of its `owner` cell and into its `neighbour` cell. Boundary faces have no
//! neighbour.

use crate::errors::GeometryError;
use crate::float_types::Real;
use crate::geometry::MaterialId;
use nalgebra::{Point3, Vector3};

#[derive(Debug, Clone, PartialEq)]
pub struct PolyMesh {
    pub points: Vec<Point3<Real>>,
    pub faces: Vec<Vec<usize>>,
    pub owner: Vec<usize>,
    pub neighbour: Vec<Option<usize>>,
    /// Material per cell; empty means every cell is unassigned
    pub materials: Vec<Option<MaterialId>>,
}

impl PolyMesh {
    /// Number of cells referenced by the owner and neighbour tables.
    pub fn n_cells(&self) -> usize {
        let owners = self.owner.iter().copied();
        let neighbours = self.neighbour.iter().flatten().copied();
        owners.chain(neighbours).max().map_or(0, |m| m + 1)
    }

    pub fn material(&self, cell: usize) -> Option<MaterialId> {
        self.materials.get(cell).copied().flatten()
    }

    /// Faces bounding `cell`, in face order.
    pub fn cell_faces(&self, cell: usize) -> Vec<usize> {
        (0..self.faces.len())
            .filter(|&f| self.owner[f] == cell || self.neighbour[f] == Some(cell))
            .collect()
    }

    /// Faces of every cell at once, in face order.
    pub fn faces_by_cell(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.n_cells()];
        for f in 0..self.faces.len() {
            out[self.owner[f]].push(f);
            if let Some(n) = self.neighbour[f] {
                out[n].push(f);
            }
        }
        out
    }

    /// Mean of the loop points of `face`.
    pub fn face_centre(&self, face: usize) -> Point3<Real> {
        let loop_ = &self.faces[face];
        let sum = loop_
            .iter()
            .fold(Vector3::zeros(), |acc, &p| acc + self.points[p].coords);
        Point3::from(sum / loop_.len() as Real)
    }

    /// Check table sizes, index ranges and coordinates.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if let Some(bad) = self.points.iter().find(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(GeometryError::InvalidCoordinate(*bad));
        }
        if self.owner.len() != self.faces.len() || self.neighbour.len() != self.faces.len() {
            return Err(GeometryError::MalformedMesh(format!(
                "{} faces but {} owners and {} neighbours",
                self.faces.len(),
                self.owner.len(),
                self.neighbour.len()
            )));
        }
        let n_cells = self.n_cells();
        if !self.materials.is_empty() && self.materials.len() != n_cells {
            return Err(GeometryError::MalformedMesh(format!(
                "{} cells but {} material entries",
                n_cells,
                self.materials.len()
            )));
        }
        for (f, loop_) in self.faces.iter().enumerate() {
            if loop_.len() < 3 {
                return Err(GeometryError::MalformedMesh(format!(
                    "face {} has only {} points",
                    f,
                    loop_.len()
                )));
            }
            if let Some(&p) = loop_.iter().find(|&&p| p >= self.points.len()) {
                return Err(GeometryError::IndexOutOfRange {
                    what: "point",
                    index: p,
                    len: self.points.len(),
                });
            }
            if self.neighbour[f] == Some(self.owner[f]) {
                return Err(GeometryError::MalformedMesh(format!(
                    "face {} has cell {} on both sides",
                    f, self.owner[f]
                )));
            }
        }
        Ok(())
    }

    /// A single box cell.
    pub fn hexahedron(mins: Point3<Real>, maxs: Point3<Real>) -> Self {
        Self::box_grid(mins, maxs, [1, 1, 1])
    }

    /// Structured grid of `nx × ny × nz` box cells. Cell `(i, j, k)` has
    /// index `i + nx * (j + ny * k)`; interior faces are owned by the lower
    /// cell along their axis.
    pub fn box_grid(mins: Point3<Real>, maxs: Point3<Real>, dims: [usize; 3]) -> Self {
        let [nx, ny, nz] = dims.map(|d| d.max(1));
        let step = (maxs - mins).component_div(&Vector3::new(nx as Real, ny as Real, nz as Real));
        let point = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let cell = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);

        let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    points.push(mins + Vector3::new(i as Real, j as Real, k as Real).component_mul(&step));
                }
            }
        }

        let mut mesh = Self {
            points,
            faces: Vec::new(),
            owner: Vec::new(),
            neighbour: Vec::new(),
            materials: vec![None; nx * ny * nz],
        };
        // `plus` is the loop with its normal along +axis at the lower corner (i, j, k)
        let mut push = |plus: Vec<usize>, lower: Option<usize>, upper: Option<usize>| match (lower, upper) {
            (Some(l), u) => {
                mesh.faces.push(plus);
                mesh.owner.push(l);
                mesh.neighbour.push(u);
            },
            (None, Some(u)) => {
                mesh.faces.push(plus.into_iter().rev().collect());
                mesh.owner.push(u);
                mesh.neighbour.push(None);
            },
            (None, None) => {},
        };

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..=nx {
                    let plus = vec![point(i, j, k), point(i, j + 1, k), point(i, j + 1, k + 1), point(i, j, k + 1)];
                    let lower = (i > 0).then(|| cell(i - 1, j, k));
                    let upper = (i < nx).then(|| cell(i, j, k));
                    push(plus, lower, upper);
                }
            }
        }
        for k in 0..nz {
            for j in 0..=ny {
                for i in 0..nx {
                    let plus = vec![point(i, j, k), point(i, j, k + 1), point(i + 1, j, k + 1), point(i + 1, j, k)];
                    let lower = (j > 0).then(|| cell(i, j - 1, k));
                    let upper = (j < ny).then(|| cell(i, j, k));
                    push(plus, lower, upper);
                }
            }
        }
        for k in 0..=nz {
            for j in 0..ny {
                for i in 0..nx {
                    let plus = vec![point(i, j, k), point(i + 1, j, k), point(i + 1, j + 1, k), point(i, j + 1, k)];
                    let lower = (k > 0).then(|| cell(i, j, k - 1));
                    let upper = (k < nz).then(|| cell(i, j, k));
                    push(plus, lower, upper);
                }
            }
        }
        mesh
    }
}
