//! Binary persistence of tet-mesh topology
//!
//! Layout (all integers and floats little-endian):
//!
//! ```text
//! magic "CTTM" | version u32
//! points:   u64 count, then x y z f64 per point
//! tets:     u64 count, then per tet 4 × u64 vertex, 4 × i64 neighbour, u64 parent
//! parents:  u64 count, then per parent x y z f64 centre, i64 material,
//!           u64 face count + u64 faces, u64 child count + u64 children
//! polymesh: u8 flag, then (if 1) u64 point count + x y z f64, u64 face count +
//!           per face u64 length + u64 points, u64 owner per face,
//!           i64 neighbour per face, u64 material count + i64 material
//! ```
//!
//! Neighbour references are `>= 0` for a tet, `-1` for the outside and
//! `-(parent + 2)` for a pending link. Optional indices use `-1` for none.
//! Bounding boxes and search meshes are not stored; they are rebuilt on load.

use super::{ParentPolyhedron, PolyMesh, TetCell, TetId, TetMesh, TetNeighbour};
use crate::config::LocatorConfig;
use crate::errors::GeometryError;
use crate::float_types::Real;
use crate::geometry::MaterialId;
use log::{debug, error};
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"CTTM";
const VERSION: u32 = 1;
/// Upper bound on speculative allocations driven by counts read from a file.
const MAX_PREALLOC: usize = 1 << 20;

/// Write `mesh` to `w`.
pub fn write_artifact<W: Write>(mesh: &TetMesh, w: &mut W) -> Result<(), GeometryError> {
    w.write_all(MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;

    write_points(w, mesh.points())?;

    write_len(w, mesh.tets().len())?;
    for tet in mesh.tets() {
        for &v in &tet.vertices {
            write_u64(w, v)?;
        }
        for n in &tet.neighbours {
            w.write_all(&encode_neighbour(*n).to_le_bytes())?;
        }
        write_u64(w, tet.parent)?;
    }

    write_len(w, mesh.parents().len())?;
    for parent in mesh.parents() {
        write_point(w, &parent.centre)?;
        write_optional(w, parent.material.map(|m| m.0))?;
        write_len(w, parent.faces.len())?;
        for &f in &parent.faces {
            write_u64(w, f)?;
        }
        write_len(w, parent.children.len())?;
        for c in &parent.children {
            write_u64(w, c.0)?;
        }
    }

    match mesh.polyhedra() {
        None => w.write_all(&[0u8])?,
        Some(poly) => {
            w.write_all(&[1u8])?;
            write_points(w, &poly.points)?;
            write_len(w, poly.faces.len())?;
            for face in &poly.faces {
                write_len(w, face.len())?;
                for &p in face {
                    write_u64(w, p)?;
                }
            }
            for &o in &poly.owner {
                write_u64(w, o)?;
            }
            for &n in &poly.neighbour {
                write_optional(w, n)?;
            }
            write_len(w, poly.materials.len())?;
            for m in &poly.materials {
                write_optional(w, m.map(|m| m.0))?;
            }
        },
    }
    Ok(())
}

/// Read a mesh written by [`write_artifact`], rebuild its search structures
/// with `config` and validate its topology.
pub fn read_artifact<R: Read>(r: &mut R, config: &LocatorConfig) -> Result<TetMesh, GeometryError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        error!("not a tet-mesh artifact (magic {:?})", magic);
        return Err(GeometryError::InvalidArtifact(format!("bad magic {:?}", magic)));
    }
    let version = read_u32(r)?;
    if version != VERSION {
        return Err(GeometryError::InvalidArtifact(format!(
            "unsupported version {} (expected {})",
            version, VERSION
        )));
    }

    let points = read_points(r)?;

    let n_tets = read_len(r)?;
    let mut raw = Vec::with_capacity(n_tets.min(MAX_PREALLOC));
    for _ in 0..n_tets {
        let mut vertices = [0usize; 4];
        for v in &mut vertices {
            *v = read_len(r)?;
        }
        let mut neighbours = [TetNeighbour::Outside; 4];
        for n in &mut neighbours {
            *n = decode_neighbour(read_i64(r)?)?;
        }
        let parent = read_len(r)?;
        raw.push((vertices, neighbours, parent));
    }
    let mut tets = Vec::with_capacity(raw.len());
    for (vertices, neighbours, parent) in raw {
        let mut tet = TetCell::new(vertices, parent, &points)?;
        tet.neighbours = neighbours;
        tets.push(tet);
    }

    let n_parents = read_len(r)?;
    let mut parents = Vec::with_capacity(n_parents.min(MAX_PREALLOC));
    for _ in 0..n_parents {
        let centre = read_point(r)?;
        let material = read_optional(r)?.map(MaterialId);
        let n_faces = read_len(r)?;
        let faces = (0..n_faces).map(|_| read_len(r)).collect::<Result<Vec<_>, _>>()?;
        let n_children = read_len(r)?;
        let children = (0..n_children)
            .map(|_| read_len(r).map(TetId))
            .collect::<Result<Vec<_>, _>>()?;
        parents.push(ParentPolyhedron { faces, centre, children, material });
    }

    let mut flag = [0u8; 1];
    r.read_exact(&mut flag)?;
    let polyhedra = match flag[0] {
        0 => None,
        1 => {
            let points = read_points(r)?;
            let n_faces = read_len(r)?;
            let mut faces = Vec::with_capacity(n_faces.min(MAX_PREALLOC));
            for _ in 0..n_faces {
                let len = read_len(r)?;
                faces.push((0..len).map(|_| read_len(r)).collect::<Result<Vec<_>, _>>()?);
            }
            let owner = (0..n_faces).map(|_| read_len(r)).collect::<Result<Vec<_>, _>>()?;
            let neighbour = (0..n_faces)
                .map(|_| read_optional(r))
                .collect::<Result<Vec<_>, _>>()?;
            let n_materials = read_len(r)?;
            let materials = (0..n_materials)
                .map(|_| read_optional(r).map(|m| m.map(MaterialId)))
                .collect::<Result<Vec<_>, _>>()?;
            let poly = PolyMesh { points, faces, owner, neighbour, materials };
            poly.validate()?;
            Some(poly)
        },
        other => {
            return Err(GeometryError::InvalidArtifact(format!("bad polymesh flag {}", other)));
        },
    };

    let mesh = TetMesh::assemble(points, tets, parents, polyhedra, config)?;
    mesh.validate_topology()?;
    debug!("loaded tet mesh with {} tets and {} points", mesh.len(), mesh.points().len());
    Ok(mesh)
}

/// Write `mesh` to a file at `path`.
pub fn save(mesh: &TetMesh, path: impl AsRef<Path>) -> Result<(), GeometryError> {
    let mut w = BufWriter::new(File::create(path)?);
    write_artifact(mesh, &mut w)?;
    w.flush()?;
    Ok(())
}

/// Read a mesh from a file at `path`.
pub fn load(path: impl AsRef<Path>, config: &LocatorConfig) -> Result<TetMesh, GeometryError> {
    let mut r = BufReader::new(File::open(path)?);
    read_artifact(&mut r, config)
}

fn encode_neighbour(n: TetNeighbour) -> i64 {
    match n {
        TetNeighbour::Tet(t) => t.0 as i64,
        TetNeighbour::Outside => -1,
        TetNeighbour::Pending { parent } => -(parent as i64) - 2,
    }
}

fn decode_neighbour(v: i64) -> Result<TetNeighbour, GeometryError> {
    Ok(match v {
        v if v >= 0 => TetNeighbour::Tet(TetId(to_index(v as u64)?)),
        -1 => TetNeighbour::Outside,
        v => TetNeighbour::Pending { parent: to_index((-(v + 2)) as u64)? },
    })
}

fn to_index(v: u64) -> Result<usize, GeometryError> {
    usize::try_from(v).map_err(|_| GeometryError::InvalidArtifact(format!("index {} does not fit", v)))
}

fn write_u64<W: Write>(w: &mut W, v: usize) -> Result<(), GeometryError> {
    w.write_all(&(v as u64).to_le_bytes())?;
    Ok(())
}

fn write_len<W: Write>(w: &mut W, len: usize) -> Result<(), GeometryError> {
    write_u64(w, len)
}

fn write_optional<W: Write>(w: &mut W, v: Option<usize>) -> Result<(), GeometryError> {
    let encoded = v.map_or(-1, |v| v as i64);
    w.write_all(&encoded.to_le_bytes())?;
    Ok(())
}

fn write_point<W: Write>(w: &mut W, p: &Point3<Real>) -> Result<(), GeometryError> {
    for c in p.coords.iter() {
        w.write_all(&c.to_le_bytes())?;
    }
    Ok(())
}

fn write_points<W: Write>(w: &mut W, points: &[Point3<Real>]) -> Result<(), GeometryError> {
    write_len(w, points.len())?;
    for p in points {
        write_point(w, p)?;
    }
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, GeometryError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i64<R: Read>(r: &mut R) -> Result<i64, GeometryError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_len<R: Read>(r: &mut R) -> Result<usize, GeometryError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    to_index(u64::from_le_bytes(buf))
}

fn read_optional<R: Read>(r: &mut R) -> Result<Option<usize>, GeometryError> {
    match read_i64(r)? {
        -1 => Ok(None),
        v if v >= 0 => Ok(Some(to_index(v as u64)?)),
        v => Err(GeometryError::InvalidArtifact(format!("bad optional index {}", v))),
    }
}

fn read_point<R: Read>(r: &mut R) -> Result<Point3<Real>, GeometryError> {
    let mut c = [0.0; 3];
    for v in &mut c {
        let mut buf = [0u8; 8];
        r.read_exact(&mut buf)?;
        *v = Real::from_le_bytes(buf);
    }
    Ok(Point3::new(c[0], c[1], c[2]))
}

fn read_points<R: Read>(r: &mut R) -> Result<Vec<Point3<Real>>, GeometryError> {
    let n = read_len(r)?;
    let mut points = Vec::with_capacity(n.min(MAX_PREALLOC));
    for _ in 0..n {
        points.push(read_point(r)?);
    }
    Ok(points)
}
