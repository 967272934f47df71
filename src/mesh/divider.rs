//! Subdivision of polyhedral cells into tetrahedra
//!
//! Every face loop of a cell is fanned around the face centre and closed off
//! at the cell centre: the perimeter edge `(a, b)` of a face produces the tet
//! `(a, b, face centre, cell centre)`. With the loops oriented so that their
//! normals point into the cell, every such tet has a positive volume, and
//! its faces line up as follows:
//!
//! - face 0 `(b, fc, cc)` and face 1 `(a, fc, cc)` are shared with the next
//!   and previous child of the same polygon;
//! - face 2 `(a, b, cc)` is shared with the child across the edge `(b, a)`
//!   on another face of the same cell;
//! - face 3 `(a, b, fc)` lies on the original face and is shared with a child
//!   of the neighbouring cell, or is on the mesh boundary.
//!
//! Cells are divided in index order. A face-3 link into a cell that has not
//! been divided yet is left [`TetNeighbour::Pending`] and resolved when that
//! cell comes up, so every link only ever looks backwards.

use super::{
    ParentPolyhedron, PolyMesh, TetCell, TetId, TetMesh, TetNeighbour, check_shared_face,
    signed_volume_of,
};
use crate::config::LocatorConfig;
use crate::errors::GeometryError;
use crate::float_types::Real;
use hashbrown::HashMap;
use log::{error, info};
use nalgebra::{Point3, Vector3};

/// Face of the partner across each internally linked face.
const INTERNAL_PARTNER_FACE: [usize; 3] = [1, 0, 2];

#[derive(Debug, Clone)]
pub struct PolyhedronDivider {
    config: LocatorConfig,
}

impl PolyhedronDivider {
    pub fn new(config: &LocatorConfig) -> Self {
        Self { config: *config }
    }

    /// Divide every cell of `poly` and return the fully linked mesh.
    pub fn divide(&self, poly: &PolyMesh) -> Result<TetMesh, GeometryError> {
        poly.validate()?;
        let n_faces = poly.faces.len();
        let n_cells = poly.n_cells();
        let faces_by_cell = poly.faces_by_cell();

        // point pool: original points, then face centres, then cell centres
        let mut points = poly.points.clone();
        let face_base = points.len();
        points.extend((0..n_faces).map(|f| poly.face_centre(f)));
        let cell_base = points.len();
        for (cell, faces) in faces_by_cell.iter().enumerate() {
            if faces.is_empty() {
                return Err(GeometryError::MalformedMesh(format!("cell {} has no faces", cell)));
            }
            let sum = faces
                .iter()
                .fold(Vector3::zeros(), |acc, &f| acc + points[face_base + f].coords);
            points.push(Point3::from(sum / faces.len() as Real));
        }

        let mut tets: Vec<TetCell> = Vec::new();
        let mut parents: Vec<ParentPolyhedron> = Vec::with_capacity(n_cells);
        let mut owner_side: Vec<Vec<TetId>> = vec![Vec::new(); n_faces];
        let mut neighbour_side: Vec<Vec<TetId>> = vec![Vec::new(); n_faces];

        for cell in 0..n_cells {
            let first = tets.len();
            let cc = cell_base + cell;

            for &f in &faces_by_cell[cell] {
                let is_owner = poly.owner[f] == cell;
                let across = if is_owner { poly.neighbour[f] } else { Some(poly.owner[f]) };
                let perimeter: Vec<usize> = if is_owner {
                    poly.faces[f].iter().rev().copied().collect()
                } else {
                    poly.faces[f].clone()
                };
                let fc = face_base + f;
                let start = tets.len();
                let n = perimeter.len();

                for i in 0..n {
                    let vertices = [perimeter[i], perimeter[(i + 1) % n], fc, cc];
                    let volume = signed_volume_of(&points, &vertices);
                    if volume <= 0.0 {
                        error!("cell {} face {} produced a tet with volume {}", cell, f, volume);
                        return Err(GeometryError::DegenerateTet { parent: cell, face: f, volume });
                    }
                    let mut tet = TetCell::new(vertices, cell, &points)?;
                    tet.neighbours[0] = TetNeighbour::Tet(TetId(start + (i + 1) % n));
                    tet.neighbours[1] = TetNeighbour::Tet(TetId(start + (i + n - 1) % n));
                    tet.neighbours[3] = match across {
                        Some(parent) => TetNeighbour::Pending { parent },
                        None => TetNeighbour::Outside,
                    };
                    tets.push(tet);
                }

                let side = if is_owner { &mut owner_side[f] } else { &mut neighbour_side[f] };
                side.extend((start..start + n).map(TetId));
            }

            link_across_edges(&mut tets, cell, first)?;
            for t in first..tets.len() {
                for (face, &partner_face) in INTERNAL_PARTNER_FACE.iter().enumerate() {
                    if let TetNeighbour::Tet(u) = tets[t].neighbours[face] {
                        check_shared_face(&tets, t, face, u.0, partner_face)?;
                    }
                }
            }

            for &f in &faces_by_cell[cell] {
                let (mine, theirs, other) = if poly.owner[f] == cell {
                    (&owner_side[f], &neighbour_side[f], poly.neighbour[f])
                } else {
                    (&neighbour_side[f], &owner_side[f], Some(poly.owner[f]))
                };
                match other {
                    Some(other) if other < cell => link_external(&mut tets, cell, other, f, mine, theirs)?,
                    _ => {},
                }
            }

            parents.push(ParentPolyhedron {
                faces: faces_by_cell[cell].clone(),
                centre: points[cc],
                children: (first..tets.len()).map(TetId).collect(),
                material: poly.material(cell),
            });
        }

        for (t, tet) in tets.iter().enumerate() {
            for (face, link) in tet.neighbours.iter().enumerate() {
                if let TetNeighbour::Pending { parent } = *link {
                    error!("tet {} face {} was never linked to cell {}", t, face, parent);
                    return Err(GeometryError::PendingLink { tet: t, face, parent });
                }
            }
        }

        info!(
            "divided {} polyhedra ({} faces) into {} tets over {} points",
            n_cells,
            n_faces,
            tets.len(),
            points.len()
        );
        TetMesh::assemble(points, tets, parents, Some(poly.clone()), &self.config)
    }
}

/// Link face 2 of every child of `cell` (tets `first..`) to the child that
/// runs along the same perimeter edge in the opposite direction.
fn link_across_edges(tets: &mut [TetCell], cell: usize, first: usize) -> Result<(), GeometryError> {
    let mut edges: HashMap<(usize, usize), usize> = HashMap::with_capacity(tets.len() - first);
    for t in first..tets.len() {
        let [a, b, _, _] = tets[t].vertices;
        if edges.insert((a, b), t).is_some() {
            error!("cell {} walks edge ({}, {}) twice in the same direction", cell, a, b);
            return Err(GeometryError::MalformedMesh(format!(
                "cell {} has inconsistently oriented faces at edge ({}, {})",
                cell, a, b
            )));
        }
    }
    for t in first..tets.len() {
        let [a, b, _, _] = tets[t].vertices;
        let Some(&u) = edges.get(&(b, a)) else {
            error!("cell {} is not closed along edge ({}, {})", cell, a, b);
            return Err(GeometryError::MalformedMesh(format!(
                "cell {} is not closed along edge ({}, {})",
                cell, a, b
            )));
        };
        tets[t].neighbours[2] = TetNeighbour::Tet(TetId(u));
    }
    Ok(())
}

/// Resolve the pending face-3 links between the children of `cell` and the
/// children of the already divided cell `other` on face `face`.
fn link_external(
    tets: &mut [TetCell],
    cell: usize,
    other: usize,
    face: usize,
    mine: &[TetId],
    theirs: &[TetId],
) -> Result<(), GeometryError> {
    for &t in mine {
        let [a, b, _, _] = tets[t.0].vertices;
        let u = theirs
            .iter()
            .copied()
            .find(|u| {
                let v = tets[u.0].vertices;
                v[0] == b && v[1] == a
            })
            .ok_or_else(|| {
                error!("face {} of cell {} has no partner in cell {}", face, cell, other);
                GeometryError::UnmatchedFace { parent: cell, neighbour: other, face }
            })?;
        if tets[u.0].neighbours[3] != (TetNeighbour::Pending { parent: cell }) {
            error!("tet {} of cell {} is already linked on face 3", u.0, other);
            return Err(GeometryError::TopologyMismatch {
                tet: t.0,
                face: 3,
                other: u.0,
                other_face: 3,
            });
        }
        check_shared_face(tets, t.0, 3, u.0, 3)?;
        tets[t.0].neighbours[3] = TetNeighbour::Tet(u);
        tets[u.0].neighbours[3] = TetNeighbour::Tet(t);
    }
    Ok(())
}
