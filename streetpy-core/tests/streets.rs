mod common;

use common::{STEP, grid, node};
use geo::line_string;
use streetpy_core::model::streets::{degree, is_accessible};
use streetpy_core::prelude::*;

#[test]
fn simplify_merges_corners() {
    let table = grid(5);
    let res = simplify(&table, None, Deadend::Keep, None).unwrap();
    assert_eq!(res.len(), 36);
    assert!(!degree(&res).contains_key(&node(5, 0, 0)));

    let directed = StreetTable {
        directed: true,
        ..table
    };
    assert!(simplify(&directed, None, Deadend::Keep, None).is_err());
}

#[test]
fn walk_accessibility_is_bidirectional() {
    let table = grid(3);
    assert!(is_accessible(&table, Mode::Walk).unwrap().iter().all(|a| *a));
    assert!(matches!(
        is_accessible(&table, Mode::Bike),
        Err(Error::MissingColumn(_))
    ));

    let walk = to_single_mode(&table, None, Mode::Walk, &SpeedConfig::default()).unwrap();
    let drive = to_single_mode(&table, None, Mode::Drive, &SpeedConfig::default()).unwrap();
    assert_eq!(walk.len(), drive.len());
    // 4 km/h on foot, 36 km/h by car
    let total = |streets: &ModalStreets| streets.iter().map(|e| e.time).sum::<f64>();
    assert!((total(&walk) / total(&drive) - 9.0).abs() < 1e-6);
}

#[test]
fn conflation_on_grid() {
    let table = grid(3);
    let mut secondary = StreetEdge::new(
        100,
        101,
        line_string![(x: 0.0, y: STEP + 0.000_05), (x: STEP, y: STEP + 0.000_05)],
    );
    secondary.maxspeed = Some(30.0);
    secondary
        .attributes
        .insert("name".to_string(), "Grid avenue".to_string());
    let secondary = StreetTable::new(vec![secondary], vec![], false);

    let config = ConflationConfig {
        columns: vec!["maxspeed".to_string(), "name".to_string()],
        overwrite: true,
        ..ConflationConfig::default()
    };
    let (res, report) = conflate(&table, &secondary, &config).unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.unmatched, table.len() - 1);

    let matched: Vec<&StreetEdge> = res
        .edges
        .iter()
        .filter(|e| e.get("name").is_some())
        .collect();
    assert_eq!(matched.len(), 1);
    assert_eq!((matched[0].source, matched[0].target), (node(3, 1, 0), node(3, 1, 1)));
    assert_eq!(matched[0].maxspeed, Some(30.0));
}

#[test]
fn files_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let table = grid(3);
    let path = dir.path().join("grid.geojson");
    save_streets(&table, &path, "source", "target").unwrap();
    assert_eq!(read_streets(&path, "source", "target", false).unwrap(), table);

    let path = dir.path().join("grid.csv");
    save_streets(&table, &path, "u", "v").unwrap();
    let res = read_streets(&path, "u", "v", false).unwrap();
    assert_eq!(res.modes, table.modes);
    for (a, b) in res.edges.iter().zip(&table.edges) {
        assert_eq!((a.source, a.target), (b.source, b.target));
        assert_eq!(a.maxspeed, b.maxspeed);
        assert_eq!(a.access(Mode::Walk), b.access(Mode::Walk));
    }
}
