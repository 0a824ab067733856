use std::fs;

use nalgebra::Point3;
use occlude::{
    analysis::Analysis,
    geom::{Aabb, Ray, Solid, SolidId},
    intersect::intersect_triangle,
    settings,
    tessellate::{ObjFile, Tessellation},
    Classification, Grid, GridBuilder, PointFilter,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn cube(id: usize, min: [f64; 3], max: [f64; 3]) -> Solid {
    Solid::cuboid(SolidId(id), Point3::from(min), Point3::from(max))
}

fn region(max: f64) -> Aabb {
    Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(max, max, max))
}

/// Parity of crossings against every triangle, no acceleration.
fn brute_force(solids: &[Solid], point: &Point3<f64>) -> Classification {
    let ray = Ray::up(*point);
    solids
        .iter()
        .find(|solid| {
            solid
                .triangles
                .iter()
                .filter(|tri| intersect_triangle(&ray, tri).is_some())
                .count()
                % 2
                == 1
        })
        .map_or(Classification::Free, |solid| Classification::Obstructed(solid.id))
}

#[test]
fn single_box() {
    let solids = vec![cube(0, [2.0, 2.0, 2.0], [4.0, 4.0, 4.0])];
    let grid = Grid::from_solids(1.0, &region(10.0), &solids).unwrap();
    let filter = PointFilter::new(&grid, &solids).unwrap();

    let points = [
        Point3::new(3.0, 3.0, 3.0),
        Point3::new(9.0, 9.0, 9.0),
        Point3::new(3.0, 3.0, 0.0),
    ];
    assert_eq!(
        filter.classify_all(&points),
        vec![
            Classification::Obstructed(SolidId(0)),
            Classification::Free,
            Classification::Free
        ]
    );
    assert_eq!(
        occlude::filter_free(&points, &grid, &solids).unwrap(),
        vec![points[1], points[2]]
    );
}

#[test]
fn two_disjoint_boxes() {
    let solids = vec![
        cube(0, [1.0, 1.0, 1.0], [3.0, 3.0, 3.0]),
        cube(1, [6.0, 6.0, 6.0], [8.0, 8.0, 8.0]),
    ];
    let grid = Grid::from_solids(1.0, &region(10.0), &solids).unwrap();
    let filter = PointFilter::new(&grid, &solids).unwrap();

    assert_eq!(
        filter.classify(&Point3::new(2.2, 1.6, 2.5)),
        Classification::Obstructed(SolidId(0))
    );
    assert_eq!(
        filter.classify(&Point3::new(7.3, 6.4, 7.1)),
        Classification::Obstructed(SolidId(1))
    );
    // between the two, and under the second one
    assert_eq!(filter.classify(&Point3::new(4.5, 4.5, 4.5)), Classification::Free);
    assert_eq!(filter.classify(&Point3::new(7.3, 6.4, 2.0)), Classification::Free);
}

#[test]
fn no_solids_means_everything_is_free() {
    let grid = Grid::from_solids(2.0, &region(10.0), &[]).unwrap();
    let filter = PointFilter::new(&grid, &[]).unwrap();
    let points = [Point3::new(1.0, 2.0, 3.0), Point3::new(11.0, -2.0, 3.0)];
    assert_eq!(filter.filter_free(&points), points.to_vec());
}

#[test]
fn face_centres_are_stable_across_runs() {
    let solids = vec![cube(0, [2.0, 2.0, 2.0], [4.0, 4.0, 4.0])];
    let centres = [
        Point3::new(4.0, 3.0, 3.0),
        Point3::new(2.0, 3.0, 3.0),
        Point3::new(3.0, 4.0, 3.0),
        Point3::new(3.0, 3.0, 4.0),
        Point3::new(3.0, 3.0, 2.0),
    ];

    let first = {
        let grid = Grid::from_solids(1.0, &region(10.0), &solids).unwrap();
        PointFilter::new(&grid, &solids).unwrap().classify_all(&centres)
    };
    for _ in 0..5 {
        let grid = Grid::from_solids(1.0, &region(10.0), &solids).unwrap();
        let filter = PointFilter::new(&grid, &solids).unwrap();
        assert_eq!(filter.classify_all(&centres), first);
        assert_eq!(filter.classify_all_serial(&centres), first);
    }
}

/// `box_a` in the OBJ fixture has its top and bottom quads split along the same
/// diagonal, so a vertical ray from anywhere above that diagonal passes through
/// a shared edge on both faces. Each shared edge counts once per adjacent
/// triangle, the parity comes out even and an interior point reads as free.
/// This is the known shared-edge limit of parity classification.
#[test]
fn shared_diagonal_edges_flip_interior_points() {
    let solids: Vec<Solid> = ObjFile::new("tests/test_data/two_boxes.obj")
        .tessellate()
        .unwrap()
        .into_iter()
        .filter(|solid| solid.id == SolidId(0))
        .collect();
    let grid = Grid::from_solids(1.0, &region(10.0), &solids).unwrap();
    let filter = PointFilter::new(&grid, &solids).unwrap();
    let bvh = filter.bvh(SolidId(0)).unwrap();

    // on the diagonal: inside the box, yet labelled free
    for point in [Point3::new(3.0, 3.0, 3.0), Point3::new(2.5, 2.5, 3.7)] {
        assert_eq!(bvh.count_hits(&Ray::up(point)) % 2, 0, "point {:?}", point);
        assert_eq!(filter.classify(&point), Classification::Free, "point {:?}", point);
    }

    // off the diagonal the same box classifies correctly
    let point = Point3::new(3.2, 2.6, 3.0);
    assert_eq!(bvh.count_hits(&Ray::up(point)), 1);
    assert_eq!(filter.classify(&point), Classification::Obstructed(SolidId(0)));
}

#[test]
fn random_points_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(42);

    // non-overlapping boxes, one per lattice slot of edge 5
    let mut solids = Vec::new();
    for (n, (i, j, k)) in itertools::iproduct!(0..4, 0..4, 0..2).enumerate() {
        if rng.random_range(0.0..1.0) < 0.4 {
            continue;
        }
        let corner = [i as f64 * 5.0, j as f64 * 5.0, k as f64 * 5.0];
        let min = corner.map(|c| c + rng.random_range(0.2..1.5));
        let max = [
            min[0] + rng.random_range(0.5..3.3),
            min[1] + rng.random_range(0.5..3.3),
            min[2] + rng.random_range(0.5..3.3),
        ];
        solids.push(cube(n, min, max));
    }
    assert!(!solids.is_empty());

    let points: Vec<_> = (0..5000)
        .map(|_| {
            Point3::new(
                rng.random_range(-1.0..21.0),
                rng.random_range(-1.0..21.0),
                rng.random_range(-1.0..11.0),
            )
        })
        .collect();

    let bounds = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(20.0, 20.0, 10.0));
    let mut builder = GridBuilder::new(1.3, &bounds).unwrap();
    builder.insert_all(&solids);
    let grid = builder.build();
    let filter = PointFilter::new(&grid, &solids).unwrap();

    let labels = filter.classify_all(&points);
    for (point, label) in points.iter().zip(&labels) {
        assert_eq!(*label, brute_force(&solids, point), "point {:?}", point);
    }
    assert!(labels.iter().any(|l| !l.is_free()));
    assert!(labels.iter().any(|l| l.is_free()));
}

#[test]
fn obj_scene_end_to_end() {
    let solids = ObjFile::new("tests/test_data/two_boxes.obj").tessellate().unwrap();
    let points = occlude::points::load_points("tests/test_data/points.txt").unwrap();

    let mut settings = settings::load_default_config().unwrap();
    settings.progress = false;
    settings.write_labels = true;
    settings.directory = std::env::temp_dir().join(format!("occlude_e2e_{}", std::process::id()));

    let mut analysis = Analysis::from_parts(settings, solids, points);
    let results = analysis.run().unwrap();
    assert_eq!(
        results.labels,
        vec![
            Classification::Obstructed(SolidId(0)),
            Classification::Free,
            Classification::Free,
            Classification::Obstructed(SolidId(1)),
            Classification::Free,
            Classification::Free,
        ]
    );
    assert_eq!(results.summary.num_free, 4);

    analysis.writeup().unwrap();
    let directory = &analysis.settings.directory;
    let free = fs::read_to_string(directory.join("free_points.txt")).unwrap();
    assert_eq!(free.lines().count(), 4);
    assert_eq!(free.lines().next(), Some("9 9 9"));
    let labels = fs::read_to_string(directory.join("labels.txt")).unwrap();
    assert!(labels.starts_with("3.2 2.6 3 obstructed 0\n"));
    assert!(directory.join("summary.json").is_file());

    fs::remove_dir_all(directory).unwrap();
}

#[test]
fn analysis_loads_default_inputs() {
    let mut settings = settings::load_default_config().unwrap();
    settings.progress = false;
    let mut analysis = Analysis::new(settings).unwrap();
    assert_eq!(analysis.solids.len(), 2);
    assert_eq!(analysis.points.len(), 6);
    assert_eq!(analysis.run().unwrap().summary.num_obstructed, 2);
}
