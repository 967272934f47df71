//! Test support library
//! Provides geometry fixtures and helpers shared by the integration tests.
#![allow(dead_code)]

use csgtrack::{
    GeometryBuilder, GeometryModel, TetMesh,
    config::LocatorConfig,
    float_types::{Real, parry3d::bounding_volume::Aabb},
    geometry::{CellFill, CellId, MaterialId, Region, SurfaceType},
    tracking::{CrossSections, ParticleType},
};
use nalgebra::Point3;

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Quick helper to compare floating-point results with an acceptable tolerance.
pub fn approx_eq(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

pub fn unit_box() -> Aabb {
    Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
}

/// The unit cube split into six tetrahedra around its main diagonal.
pub fn kuhn_cube(config: &LocatorConfig) -> TetMesh {
    let points = (0..8usize)
        .map(|v| Point3::new((v & 1) as Real, ((v >> 1) & 1) as Real, ((v >> 2) & 1) as Real))
        .collect();
    let axes = [1usize, 2, 4];
    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    let tets: Vec<[usize; 4]> = orders
        .iter()
        .map(|o| {
            let a = axes[o[0]];
            [0, a, a + axes[o[1]], 7]
        })
        .collect();
    TetMesh::from_tets(points, &tets, &[0; 6], config).expect("Kuhn cube")
}

/// `n³` probe points spread over `bounds`, offset so that none lies on the
/// diagonal planes of a box subdivision.
pub fn probe_grid(bounds: &Aabb, n: usize) -> Vec<Point3<Real>> {
    let extent = bounds.maxs - bounds.mins;
    let mut points = Vec::with_capacity(n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                points.push(Point3::new(
                    bounds.mins.x + extent.x * (i as Real + 0.3719) / n as Real,
                    bounds.mins.y + extent.y * (j as Real + 0.5813) / n as Real,
                    bounds.mins.z + extent.z * (k as Real + 0.2467) / n as Real,
                ));
            }
        }
    }
    points
}

/// Cross sections that only depend on the material.
pub struct ConstantXs(pub Vec<Real>);

impl CrossSections for ConstantXs {
    fn total_macroscopic_xs(&self, material: MaterialId, _: ParticleType, _: Real, _: usize) -> Real {
        self.0[material.0]
    }
}

/// A cube `[-half, half]³` of one material inside an outside cell.
pub struct BoxModel {
    pub model: GeometryModel,
    pub material: MaterialId,
    pub inside: CellId,
    pub outside: CellId,
}

pub fn box_model(half: Real, domain: Option<u32>) -> BoxModel {
    let mut b = GeometryBuilder::new();
    let root = b.add_universe("root");
    let material = b.add_material("fuel");
    let cube = b
        .add_surface("cube", SurfaceType::Cuboid, &[-half, half, -half, half, -half, half])
        .unwrap();
    let inside = b
        .add_cell(root, "inside", Region::inside(cube), CellFill::Material(material))
        .unwrap();
    let outside = b
        .add_cell(root, "outside", Region::outside(cube), CellFill::Outside)
        .unwrap();
    if let Some(rank) = domain {
        b.set_domain(inside, rank).unwrap();
    }
    let model = b.build(&LocatorConfig::default()).unwrap();
    BoxModel { model, material, inside, outside }
}
