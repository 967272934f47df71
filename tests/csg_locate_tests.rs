mod support;

use csgtrack::{
    CellLocation, GeometryBuilder, GeometryModel, PolyMesh, PolyhedronDivider, SearchMode, TaskContext,
    config::LocatorConfig,
    float_types::{Real, parry3d::bounding_volume::Aabb},
    geometry::{CellFill, CellId, MaterialId, Region, SurfaceType},
};
use nalgebra::{Point3, Vector3};
use support::init_logging;

struct PinModel {
    model: GeometryModel,
    left: CellId,
    right: CellId,
    pin: CellId,
    fuel: CellId,
    clad: CellId,
    outside: CellId,
    fuel_material: MaterialId,
}

/// A world box split at x = 0, with a fuel pin universe inserted at (3, 0, 0).
fn pin_model(search_mesh: bool) -> PinModel {
    let mut b = GeometryBuilder::new();
    let root = b.add_universe("root");
    let pin_u = b.add_universe("pin");

    let water = b.add_material("water");
    let steel = b.add_material("steel");
    let fuel_material = b.add_material("fuel");
    let clad_material = b.add_material("zircaloy");

    let world = b
        .add_surface("world", SurfaceType::Cuboid, &[-10.0, 10.0, -10.0, 10.0, -10.0, 10.0])
        .unwrap();
    let ball = b.add_surface("ball", SurfaceType::Sphere, &[3.0, 0.0, 0.0, 2.0]).unwrap();
    let mid = b.add_surface("mid", SurfaceType::PlaneX, &[0.0]).unwrap();
    let fuel_s = b.add_surface("fuel", SurfaceType::Sphere, &[0.0, 0.0, 0.0, 1.0]).unwrap();

    let body = || Region::inside(world).and(Region::outside(ball));
    let left = b
        .add_cell(root, "left", body().and(Region::inside(mid)), CellFill::Material(water))
        .unwrap();
    let right = b
        .add_cell(root, "right", body().and(Region::outside(mid)), CellFill::Material(steel))
        .unwrap();
    let pin = b
        .add_cell(
            root,
            "pin",
            Region::inside(ball),
            CellFill::Universe { universe: pin_u, translation: Vector3::new(3.0, 0.0, 0.0) },
        )
        .unwrap();
    let outside = b.add_cell(root, "outside", Region::outside(world), CellFill::Outside).unwrap();
    let fuel = b
        .add_cell(pin_u, "fuel", Region::inside(fuel_s), CellFill::Material(fuel_material))
        .unwrap();
    let clad = b
        .add_cell(pin_u, "clad", Region::outside(fuel_s), CellFill::Material(clad_material))
        .unwrap();

    b.link_search_list(left, vec![pin, right]).unwrap();
    b.set_source_list(root, vec![pin, right]).unwrap();
    if search_mesh {
        let bounds = Aabb::new(Point3::new(-10.0, -10.0, -10.0), Point3::new(10.0, 10.0, 10.0));
        b.enable_search_mesh(root, bounds).unwrap();
    }
    let model = b.build(&LocatorConfig::default()).unwrap();
    PinModel { model, left, right, pin, fuel, clad, outside, fuel_material }
}

fn dir() -> Vector3<Real> {
    Vector3::new(0.2, -0.7, 0.4).normalize()
}

fn cell_at(model: &GeometryModel, p: Point3<Real>, ctx: &mut TaskContext) -> Option<CellId> {
    model.locate_cell(&p, &dir(), SearchMode::Transport, ctx).cell()
}

#[test]
fn descends_into_translated_universes() {
    init_logging();
    let m = pin_model(false);
    let mut ctx = TaskContext::new(0, 1);

    match m.model.locate_cell(&Point3::new(3.2, 0.1, 0.0), &dir(), SearchMode::Transport, &mut ctx) {
        CellLocation::Found { cell, region_index, tet } => {
            assert_eq!(cell, m.fuel);
            assert_eq!(region_index, 0);
            assert_eq!(tet, None);
        },
        other => panic!("expected the fuel cell, got {other:?}"),
    }
    assert_eq!(m.model.material_of(m.fuel, None), Some(m.fuel_material));
    assert_eq!(cell_at(&m.model, Point3::new(3.0, 1.5, 0.0), &mut ctx), Some(m.clad));
    assert_eq!(cell_at(&m.model, Point3::new(-5.0, 0.0, 0.0), &mut ctx), Some(m.left));
    assert_eq!(cell_at(&m.model, Point3::new(8.0, 0.0, 0.0), &mut ctx), Some(m.right));
    assert_eq!(cell_at(&m.model, Point3::new(20.0, 0.0, 0.0), &mut ctx), Some(m.outside));
    assert!(m.model.cell(m.outside).is_outside());
    assert_eq!(m.model.cell(m.clad).region_index, 1);
    assert_eq!(m.model.cell(m.pin).region_index, 2);
}

#[test]
fn location_does_not_depend_on_the_path() {
    init_logging();
    let plain = pin_model(false);
    let indexed = pin_model(true);
    let mut rng_ctx = TaskContext::new(99, 7);
    let mut warm = TaskContext::new(0, 1);
    let mut warm_indexed = TaskContext::new(1, 1);
    let mut plot = TaskContext::new(2, 1);
    plot.set_plot_mode(true);

    for _ in 0..3000 {
        let p = Point3::new(
            24.0 * rng_ctx.uniform() - 12.0,
            24.0 * rng_ctx.uniform() - 12.0,
            24.0 * rng_ctx.uniform() - 12.0,
        );
        let mut cold = TaskContext::new(3, 1);
        let reference = cell_at(&plain.model, p, &mut cold);
        assert!(reference.is_some(), "{p} is not defined");
        assert_eq!(cell_at(&plain.model, p, &mut warm), reference, "cached lookup at {p}");
        assert_eq!(cell_at(&indexed.model, p, &mut warm_indexed), reference, "search mesh lookup at {p}");
        assert_eq!(cell_at(&plain.model, p, &mut plot), reference, "plot lookup at {p}");
    }

    let search = indexed.model.universe(indexed.model.root()).search_mesh.as_ref().unwrap();
    assert!(search.total_hits() > 0);
    let stats = search.stats();
    println!("root search mesh: {stats:?}");
    assert!(stats.max_candidates >= 2);
}

#[test]
fn cache_hits_are_counted() {
    let m = pin_model(false);
    let mut ctx = TaskContext::new(0, 1);
    let p = Point3::new(-5.0, 1.0, 1.0);
    cell_at(&m.model, p, &mut ctx);
    assert_eq!(m.model.cell_hit_count(m.left), 0);
    assert_eq!(m.model.universe(m.model.root()).list_hits(), 1);
    cell_at(&m.model, p + Vector3::new(0.5, 0.0, 0.0), &mut ctx);
    cell_at(&m.model, p - Vector3::new(0.5, 0.0, 0.0), &mut ctx);
    assert_eq!(m.model.cell_hit_count(m.left), 2);

    // leaving the cached cell goes through its search list
    assert_eq!(cell_at(&m.model, Point3::new(8.0, 0.0, 0.0), &mut ctx), Some(m.right));
    assert_eq!(m.model.universe(m.model.root()).list_hits(), 2);
}

#[test]
fn source_mode_scans_the_source_list() {
    let m = pin_model(false);
    let mut ctx = TaskContext::new(0, 1);
    let p = Point3::new(-5.0, 0.0, 0.0);
    assert_eq!(m.model.locate_cell(&p, &dir(), SearchMode::Source, &mut ctx), CellLocation::NotFound);
    assert_eq!(
        m.model.locate_cell(&Point3::new(8.0, 0.0, 0.0), &dir(), SearchMode::Source, &mut ctx).cell(),
        Some(m.right)
    );
    // transport lookups keep their own slot and scan the full list
    assert_eq!(cell_at(&m.model, p, &mut ctx), Some(m.left));
    assert_eq!(ctx.cache().cell(m.model.root(), SearchMode::Source), Some(m.right));
    assert_eq!(ctx.cache().cell(m.model.root(), SearchMode::Transport), Some(m.left));
}

#[test]
fn surface_ties_follow_the_direction() {
    let m = pin_model(false);
    let mut ctx = TaskContext::new(0, 1);
    let on_plane = Point3::new(0.0, 5.0, 0.0);
    let towards_left = Vector3::new(-1.0, 0.0, 0.0);
    let towards_right = Vector3::new(1.0, 0.0, 0.0);
    let left = m.model.locate_cell(&on_plane, &towards_left, SearchMode::Transport, &mut ctx);
    let right = m.model.locate_cell(&on_plane, &towards_right, SearchMode::Transport, &mut ctx);
    assert_eq!(left.cell(), Some(m.left));
    assert_eq!(right.cell(), Some(m.right));
}

#[test]
fn overlaps_are_ambiguous_only_in_plot_mode() {
    let mut b = GeometryBuilder::new();
    let root = b.add_universe("root");
    let s1 = b.add_surface("s1", SurfaceType::Sphere, &[0.0, 0.0, 0.0, 1.0]).unwrap();
    let s2 = b.add_surface("s2", SurfaceType::Sphere, &[1.0, 0.0, 0.0, 1.0]).unwrap();
    let a = b.add_cell(root, "a", Region::inside(s1), CellFill::Void).unwrap();
    let c = b.add_cell(root, "b", Region::inside(s2), CellFill::Void).unwrap();
    b.add_cell(
        root,
        "rest",
        Region::inside(s1).or(Region::inside(s2)).complement(),
        CellFill::Outside,
    )
    .unwrap();
    let model = b.build(&LocatorConfig::default()).unwrap();

    let p = Point3::new(0.5, 0.0, 0.0);
    let mut ctx = TaskContext::new(0, 1);
    assert_eq!(cell_at(&model, p, &mut ctx), Some(a));
    ctx.set_plot_mode(true);
    assert_eq!(
        model.locate_cell(&p, &dir(), SearchMode::Transport, &mut ctx),
        CellLocation::Ambiguous { cells: vec![a, c] }
    );
}

#[test]
fn mesh_filled_cells_resolve_tets_and_materials() {
    init_logging();
    let mut b = GeometryBuilder::new();
    let root = b.add_universe("root");
    let water = b.add_material("water");
    let fuel = b.add_material("fuel");

    let mut poly = PolyMesh::box_grid(Point3::origin(), Point3::new(1.0, 1.0, 1.0), [2, 1, 1]);
    poly.materials = vec![Some(fuel), None];
    let mesh = PolyhedronDivider::new(&LocatorConfig::default()).divide(&poly).unwrap();
    let mesh_id = b.add_mesh(mesh);

    let tank = b
        .add_surface("tank", SurfaceType::Cuboid, &[-1.0, 2.0, -1.0, 2.0, -1.0, 2.0])
        .unwrap();
    let vessel = b
        .add_cell(root, "vessel", Region::inside(tank), CellFill::Mesh { mesh: mesh_id, background: Some(water) })
        .unwrap();
    b.add_cell(root, "outside", Region::outside(tank), CellFill::Outside).unwrap();
    let model = b.build(&LocatorConfig::default()).unwrap();
    let mut ctx = TaskContext::new(0, 1);

    let inside_fuel = Point3::new(0.2, 0.4, 0.6);
    let CellLocation::Found { cell, tet, .. } = model.locate_cell(&inside_fuel, &dir(), SearchMode::Transport, &mut ctx)
    else {
        panic!("vessel not found");
    };
    assert_eq!(cell, vessel);
    let tet = tet.expect("point is inside the mesh");
    assert!(model.mesh(mesh_id).contains(tet, &inside_fuel));
    assert_eq!(model.material_of(cell, Some(tet)), Some(fuel));

    // right half of the mesh has no material of its own
    let unassigned = Point3::new(0.8, 0.4, 0.6);
    let CellLocation::Found { tet, .. } = model.locate_cell(&unassigned, &dir(), SearchMode::Transport, &mut ctx)
    else {
        panic!("vessel not found");
    };
    assert_eq!(model.material_of(vessel, tet), Some(water));

    // outside the mesh but inside the vessel
    let CellLocation::Found { tet, .. } =
        model.locate_cell(&Point3::new(1.5, 1.5, 1.5), &dir(), SearchMode::Transport, &mut ctx)
    else {
        panic!("vessel not found");
    };
    assert_eq!(tet, None);
    assert_eq!(model.material_of(vessel, None), Some(water));
}
