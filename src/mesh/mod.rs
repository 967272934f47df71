//! Unstructured tetrahedral meshes
//!
//! A [`TetMesh`] is a shared point pool plus a table of [`TetCell`]s, each
//! with four vertex references and four neighbour links. Face `k` of a tet
//! is the face opposite vertex `k` (see [`FACE_VERTICES`]). Every tet belongs
//! to a [`ParentPolyhedron`], the polyhedral cell it was carved out of; the
//! parent carries the material.
//!
//! Meshes are built either by subdividing a polyhedral mesh with
//! [`divider::PolyhedronDivider`] or from a raw tet list with
//! [`TetMesh::from_tets`], and are immutable afterwards.

use crate::aabb;
use crate::config::LocatorConfig;
use crate::errors::GeometryError;
use crate::float_types::{
    Real,
    parry3d::{bounding_volume::Aabb, shape::Tetrahedron},
    tolerance,
};
use crate::geometry::MaterialId;
use crate::search::SearchMesh;
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use log::error;
use nalgebra::Point3;

pub mod divider;
pub mod io;
pub mod polymesh;

pub use divider::PolyhedronDivider;
pub use polymesh::PolyMesh;

/// Vertex slots spanning face `k`, which is the face opposite vertex `k`.
pub const FACE_VERTICES: [[usize; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

/// Index of a [`TetCell`] in its mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TetId(pub usize);

/// What lies across one face of a tet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TetNeighbour {
    Tet(TetId),
    /// The face is on the outer surface of the mesh
    Outside,
    /// Link into parent polyhedron `parent` that has not been resolved yet;
    /// never present in a finished mesh
    Pending { parent: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TetCell {
    pub vertices: [usize; 4],
    pub neighbours: [TetNeighbour; 4],
    pub parent: usize,
    pub bounds: Aabb,
}

impl TetCell {
    /// Unlinked tet over `vertices`; every face starts out as [`TetNeighbour::Outside`].
    pub fn new(vertices: [usize; 4], parent: usize, points: &[Point3<Real>]) -> Result<Self, GeometryError> {
        for &v in &vertices {
            if v >= points.len() {
                return Err(GeometryError::IndexOutOfRange {
                    what: "point",
                    index: v,
                    len: points.len(),
                });
            }
        }
        let bounds = aabb::from_points(vertices.iter().map(|&v| &points[v]))
            .ok_or_else(|| GeometryError::MalformedMesh("tet without vertices".to_string()))?;
        Ok(Self {
            vertices,
            neighbours: [TetNeighbour::Outside; 4],
            parent,
            bounds,
        })
    }

    /// Sorted point indices of face `face`, used to compare faces between tets.
    pub fn face_key(&self, face: usize) -> [usize; 3] {
        let [a, b, c] = FACE_VERTICES[face];
        let mut key = [self.vertices[a], self.vertices[b], self.vertices[c]];
        key.sort_unstable();
        key
    }
}

/// The source polyhedral cell of a group of tets.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentPolyhedron {
    /// Faces of the originating polyhedral mesh bounding this cell
    pub faces: Vec<usize>,
    pub centre: Point3<Real>,
    pub children: Vec<TetId>,
    pub material: Option<MaterialId>,
}

#[derive(Debug)]
pub struct TetMesh {
    points: Vec<Point3<Real>>,
    tets: Vec<TetCell>,
    parents: Vec<ParentPolyhedron>,
    polyhedra: Option<PolyMesh>,
    search: SearchMesh<TetId>,
    bounds: Aabb,
    hop_cap: usize,
}

impl TetMesh {
    /// Final assembly step shared by every constructor: checks coordinates,
    /// computes the bounds and builds the search mesh.
    pub(crate) fn assemble(
        points: Vec<Point3<Real>>,
        tets: Vec<TetCell>,
        parents: Vec<ParentPolyhedron>,
        polyhedra: Option<PolyMesh>,
        config: &LocatorConfig,
    ) -> Result<Self, GeometryError> {
        if let Some(bad) = points.iter().find(|p| !p.coords.iter().all(|c| c.is_finite())) {
            error!("mesh point {} is not finite", bad);
            return Err(GeometryError::InvalidCoordinate(*bad));
        }
        for (t, tet) in tets.iter().enumerate() {
            if tet.parent >= parents.len() {
                return Err(GeometryError::IndexOutOfRange {
                    what: "parent",
                    index: tet.parent,
                    len: parents.len(),
                });
            }
            for n in &tet.neighbours {
                if let TetNeighbour::Tet(other) = n {
                    if other.0 >= tets.len() {
                        error!("tet {} links to missing tet {}", t, other.0);
                        return Err(GeometryError::IndexOutOfRange {
                            what: "tet",
                            index: other.0,
                            len: tets.len(),
                        });
                    }
                }
            }
        }
        for (p, parent) in parents.iter().enumerate() {
            if let Some(child) = parent.children.iter().find(|c| c.0 >= tets.len()) {
                error!("parent {} lists missing tet {}", p, child.0);
                return Err(GeometryError::IndexOutOfRange {
                    what: "tet",
                    index: child.0,
                    len: tets.len(),
                });
            }
        }
        let bounds = aabb::from_points(&points)
            .ok_or_else(|| GeometryError::MalformedMesh("mesh has no points".to_string()))?;
        let search = SearchMesh::from_boxes(
            bounds,
            config.tet_search.dims,
            tets.iter().enumerate().map(|(i, t)| (TetId(i), t.bounds)),
        );
        Ok(Self {
            points,
            tets,
            parents,
            polyhedra,
            search,
            bounds,
            hop_cap: config.hop_cap,
        })
    }

    /// Link a raw tetrahedral list by matching faces with identical vertex
    /// sets. Faces without a partner become [`TetNeighbour::Outside`]; tets are
    /// reoriented to a positive signed volume.
    ///
    /// `parents[t]` names the parent polyhedron of tet `t`. Parents are
    /// created on the fly without a material or originating faces.
    pub fn from_tets(
        points: Vec<Point3<Real>>,
        tets: &[[usize; 4]],
        parents: &[usize],
        config: &LocatorConfig,
    ) -> Result<Self, GeometryError> {
        if parents.len() != tets.len() {
            return Err(GeometryError::MalformedMesh(format!(
                "{} tets but {} parent indices",
                tets.len(),
                parents.len()
            )));
        }

        let mut cells = Vec::with_capacity(tets.len());
        for (t, (&vertices, &parent)) in tets.iter().zip(parents).enumerate() {
            let mut vertices = vertices;
            let mut cell = TetCell::new(vertices, parent, &points)?;
            let volume = signed_volume_of(&points, &vertices);
            if volume.abs() <= tolerance() * tolerance() {
                error!("tet {} is degenerate (volume {})", t, volume);
                return Err(GeometryError::MalformedMesh(format!(
                    "tet {} is degenerate (volume {})",
                    t, volume
                )));
            }
            if volume < 0.0 {
                vertices.swap(0, 1);
                cell.vertices = vertices;
            }
            cells.push(cell);
        }

        let mut open: HashMap<[usize; 3], (usize, usize)> = HashMap::with_capacity(tets.len() * 2);
        for t in 0..cells.len() {
            for face in 0..4 {
                let key = cells[t].face_key(face);
                match open.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert((t, face));
                    },
                    Entry::Occupied(slot) => {
                        let (u, uf) = *slot.get();
                        if cells[u].neighbours[uf] != TetNeighbour::Outside {
                            error!("face {:?} is shared by more than two tets", key);
                            return Err(GeometryError::MalformedMesh(format!(
                                "face {:?} is shared by more than two tets",
                                key
                            )));
                        }
                        cells[u].neighbours[uf] = TetNeighbour::Tet(TetId(t));
                        cells[t].neighbours[face] = TetNeighbour::Tet(TetId(u));
                    },
                }
            }
        }

        let n_parents = parents.iter().max().map_or(0, |&m| m + 1);
        let mut records: Vec<ParentPolyhedron> = (0..n_parents)
            .map(|_| ParentPolyhedron {
                faces: Vec::new(),
                centre: Point3::origin(),
                children: Vec::new(),
                material: None,
            })
            .collect();
        for (t, &parent) in parents.iter().enumerate() {
            records[parent].children.push(TetId(t));
        }
        for record in &mut records {
            let mut sum = nalgebra::Vector3::zeros();
            let mut n = 0usize;
            for child in &record.children {
                for &v in &cells[child.0].vertices {
                    sum += points[v].coords;
                    n += 1;
                }
            }
            if n > 0 {
                record.centre = Point3::from(sum / n as Real);
            }
        }

        Self::assemble(points, cells, records, None, config)
    }

    pub fn points(&self) -> &[Point3<Real>] {
        &self.points
    }

    pub fn tets(&self) -> &[TetCell] {
        &self.tets
    }

    pub fn tet(&self, id: TetId) -> &TetCell {
        &self.tets[id.0]
    }

    pub fn parents(&self) -> &[ParentPolyhedron] {
        &self.parents
    }

    /// The polyhedral mesh this mesh was divided from, if any.
    pub const fn polyhedra(&self) -> Option<&PolyMesh> {
        self.polyhedra.as_ref()
    }

    pub const fn search(&self) -> &SearchMesh<TetId> {
        &self.search
    }

    pub const fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub const fn hop_cap(&self) -> usize {
        self.hop_cap
    }

    pub fn len(&self) -> usize {
        self.tets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tets.is_empty()
    }

    /// Material of the parent polyhedron of `tet`.
    pub fn material(&self, tet: TetId) -> Option<MaterialId> {
        self.parents[self.tets[tet.0].parent].material
    }

    pub fn corners(&self, tet: TetId) -> [Point3<Real>; 4] {
        self.tets[tet.0].vertices.map(|v| self.points[v])
    }

    pub fn signed_volume(&self, tet: TetId) -> Real {
        signed_volume_of(&self.points, &self.tets[tet.0].vertices)
    }

    /// Total volume of the mesh.
    pub fn volume(&self) -> Real {
        (0..self.tets.len()).map(|t| self.signed_volume(TetId(t))).sum()
    }

    pub fn centroid(&self, tet: TetId) -> Point3<Real> {
        let [a, b, c, d] = self.corners(tet);
        Point3::from((a.coords + b.coords + c.coords + d.coords) * 0.25)
    }

    pub fn face_centroid(&self, tet: TetId, face: usize) -> Point3<Real> {
        let cell = &self.tets[tet.0];
        let [a, b, c] = FACE_VERTICES[face].map(|slot| self.points[cell.vertices[slot]]);
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    /// Closed containment test through barycentric volume ratios.
    ///
    /// Points on a face shared by two tets are contained in both; callers
    /// that scan in index order resolve such points to the first one.
    pub fn contains(&self, tet: TetId, p: &Point3<Real>) -> bool {
        let corners = self.corners(tet);
        let total = tet_volume(&corners);
        if total <= 0.0 {
            return false;
        }
        let tol = tolerance();
        (0..4).all(|k| {
            let mut sub = corners;
            sub[k] = *p;
            tet_volume(&sub) / total >= -tol
        })
    }

    /// Linear scan over every tet; the reference answer for the walk.
    pub fn locate_brute_force(&self, p: &Point3<Real>) -> Option<TetId> {
        (0..self.tets.len())
            .map(TetId)
            .find(|&t| aabb::contains(&self.tets[t.0].bounds, p, tolerance()) && self.contains(t, p))
    }

    /// Check the invariants every finished mesh must satisfy: links are
    /// symmetric, linked faces share their three vertices, no link is left
    /// pending and every tet has a positive volume.
    pub fn validate_topology(&self) -> Result<(), GeometryError> {
        for (t, tet) in self.tets.iter().enumerate() {
            let volume = self.signed_volume(TetId(t));
            if volume <= 0.0 {
                error!("tet {} has signed volume {}", t, volume);
                return Err(GeometryError::MalformedMesh(format!(
                    "tet {} has signed volume {}",
                    t, volume
                )));
            }
            for (face, link) in tet.neighbours.iter().enumerate() {
                match *link {
                    TetNeighbour::Outside => {},
                    TetNeighbour::Pending { parent } => {
                        error!("tet {} face {} still pending on parent {}", t, face, parent);
                        return Err(GeometryError::PendingLink { tet: t, face, parent });
                    },
                    TetNeighbour::Tet(other) => {
                        let back = self.tets[other.0]
                            .neighbours
                            .iter()
                            .position(|n| *n == TetNeighbour::Tet(TetId(t)))
                            .ok_or_else(|| {
                                GeometryError::MalformedMesh(format!(
                                    "tet {} face {} links to tet {} which does not link back",
                                    t, face, other.0
                                ))
                            })?;
                        check_shared_face(&self.tets, t, face, other.0, back)?;
                    },
                }
            }
        }
        Ok(())
    }
}

/// Signed volume of the tet over four point indices.
pub(crate) fn signed_volume_of(points: &[Point3<Real>], vertices: &[usize; 4]) -> Real {
    tet_volume(&vertices.map(|v| points[v]))
}

#[inline]
fn tet_volume([a, b, c, d]: &[Point3<Real>; 4]) -> Real {
    Tetrahedron::new(*a, *b, *c, *d).signed_volume()
}

/// Fail with [`GeometryError::TopologyMismatch`] unless face `face` of tet
/// `t` and face `other_face` of tet `other` span the same three points.
pub(crate) fn check_shared_face(
    tets: &[TetCell],
    t: usize,
    face: usize,
    other: usize,
    other_face: usize,
) -> Result<(), GeometryError> {
    if tets[t].face_key(face) == tets[other].face_key(other_face) {
        Ok(())
    } else {
        error!(
            "tet {} face {} and tet {} face {} do not share their vertices",
            t, face, other, other_face
        );
        Err(GeometryError::TopologyMismatch {
            tet: t,
            face,
            other,
            other_face,
        })
    }
}
