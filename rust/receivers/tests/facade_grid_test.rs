// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end runs of the 2D and 3D building facade generators.

mod common;

use approx::assert_relative_eq;
use common::*;
use geo::{EuclideanDistance, Line, Point};
use noisegrid_core::{
    no_progress, GridConfig, ReceiverKind, ReceiverTags, SpatialDatabase, Srid,
};
use noisegrid_receivers::{
    BuildingGridGenerator2d, BuildingGridGenerator3d, GridError, ReceiverGridService,
    SpadeTriangulator,
};
use rustc_hash::FxHashMap;

fn config_2d(json: &str) -> noisegrid_core::BuildingGridConfig2d {
    match config(json) {
        GridConfig::Buildings2d(c) => c,
        other => panic!("unexpected config {other:?}"),
    }
}

fn config_3d(json: &str) -> noisegrid_core::BuildingGridConfig3d {
    match config(json) {
        GridConfig::Buildings3d(c) => c,
        other => panic!("unexpected config {other:?}"),
    }
}

#[test]
fn square_building_gets_evenly_spaced_facade_receivers() {
    let mut db = database(LAMBERT_93, vec![building(42, 0.0, 0.0, 20.0, 20.0, 10.0)], vec![]);
    let cfg = config_2d(
        r#"{"grid_type": "BUILDINGS_2D", "distance_from_wall": 2.0,
            "receiver_distance": 5.0, "calculation_height": 4.0}"#,
    );

    let output = BuildingGridGenerator2d::new(&mut db)
        .generate_receivers(&cfg)
        .unwrap();

    // Beveled outline: 80 + 4 * sqrt(8) = 91.31, cut into ceil(91.31 / 5) pieces
    assert_eq!(output.receiver_count, 19);
    assert_eq!(output.srid, LAMBERT_93);
    assert!(output.triangles.is_none());

    let receivers = db.receivers(&output.receivers).unwrap();
    assert_eq!(receivers.len(), 19);
    let pks: Vec<i64> = receivers.iter().map(|r| r.pk).collect();
    assert_eq!(pks, (1..=19).collect::<Vec<_>>());
    for r in &receivers {
        assert_relative_eq!(r.position.z, 4.0);
        assert_eq!(r.tags, ReceiverTags::Facade { build_pk: 42 });
        // Straight runs sit 2 m out, bevel points between sqrt(2) and 2 m
        let dx = (-r.position.x).max(r.position.x - 20.0).max(0.0);
        let dy = (-r.position.y).max(r.position.y - 20.0).max(0.0);
        let offset = dx.hypot(dy);
        assert!(offset > 1.4 && offset < 2.0 + 1e-6, "bad offset {offset} for {r:?}");
    }
    assert!(db.has_spatial_index(&output.receivers));
}

#[test]
fn geographic_input_is_rejected_before_any_table_is_written() {
    let mut db = database(Srid(4326), vec![building(1, 0.0, 0.0, 20.0, 20.0, 10.0)], vec![]);
    let cfg = config_2d(r#"{"grid_type": "BUILDINGS_2D"}"#);

    let err = BuildingGridGenerator2d::new(&mut db)
        .generate_receivers(&cfg)
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(!db.has_table(&table("RECEIVERS")));
}

#[test]
fn receivers_next_to_a_road_are_removed() {
    // The south offset line runs along y = -2; the road sits 0.5 m south of it
    let roads = vec![road(1, vec![(-10.0, -2.5), (30.0, -2.5)])];
    let mut db = database(LAMBERT_93, vec![building(1, 0.0, 0.0, 20.0, 20.0, 10.0)], roads);
    let cfg = config_2d(
        r#"{"grid_type": "BUILDINGS_2D", "distance_from_wall": 2.0, "receiver_distance": 5.0}"#,
    );

    let output = BuildingGridGenerator2d::new(&mut db)
        .generate_receivers(&cfg)
        .unwrap();

    assert!(output.receiver_count < 19);
    let line = Line::from([(-10.0, -2.5), (30.0, -2.5)]);
    for r in db.receivers(&output.receivers).unwrap() {
        assert!(Point::new(r.position.x, r.position.y).euclidean_distance(&line) >= 1.0);
    }
}

#[test]
fn taller_neighbour_truncates_the_facade_line() {
    let alone = {
        let mut db = database(LAMBERT_93, vec![building(1, 0.0, 0.0, 10.0, 10.0, 6.0)], vec![]);
        let cfg = config_2d(r#"{"grid_type": "BUILDINGS_2D", "receiver_distance": 2.0}"#);
        BuildingGridGenerator2d::new(&mut db)
            .generate_receivers(&cfg)
            .unwrap()
            .receiver_count
    };

    let mut db = database(
        LAMBERT_93,
        vec![
            building(1, 0.0, 0.0, 10.0, 10.0, 6.0),
            building(2, 11.0, 0.0, 10.0, 10.0, 20.0),
        ],
        vec![],
    );
    let cfg = config_2d(r#"{"grid_type": "BUILDINGS_2D", "receiver_distance": 2.0}"#);
    let output = BuildingGridGenerator2d::new(&mut db)
        .generate_receivers(&cfg)
        .unwrap();

    let receivers = db.receivers(&output.receivers).unwrap();
    let on_first = receivers
        .iter()
        .filter(|r| r.tags.building_pk() == Some(1))
        .count();
    assert!(on_first < alone, "{on_first} >= {alone}");
    // The east side of building 1 falls inside building 2's buffer and what
    // is left of its eastern bevels stays west of x = 11
    assert!(receivers
        .iter()
        .filter(|r| r.tags.building_pk() == Some(1))
        .all(|r| r.position.x <= 11.0 + 1e-6));
}

#[test]
fn facade_generation_is_deterministic() {
    let buildings = vec![
        building(1, 0.0, 0.0, 10.0, 10.0, 8.0),
        building(2, 11.0, 3.0, 8.0, 12.0, 12.0),
        building(3, 40.0, 40.0, 15.0, 6.0, 4.0),
    ];
    let run = || {
        let mut db = database(LAMBERT_93, buildings.clone(), vec![]);
        let cfg = config_2d(r#"{"grid_type": "BUILDINGS_2D", "receiver_distance": 3.0}"#);
        let output = BuildingGridGenerator2d::new(&mut db)
            .generate_receivers(&cfg)
            .unwrap();
        db.receivers(&output.receivers).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn stacked_receivers_follow_building_height() {
    let mut db = database(
        LAMBERT_93,
        vec![
            building(7, 0.0, 0.0, 20.0, 20.0, 10.0),
            building(8, 100.0, 100.0, 10.0, 10.0, 1.2),
        ],
        vec![],
    );
    let cfg = config_3d(
        r#"{"grid_type": "BUILDINGS_3D", "distance_from_wall": 2.0,
            "receiver_distance": 5.0, "height_between_levels_3d": 3.0}"#,
    );

    let output = BuildingGridGenerator3d::new(&mut db)
        .generate_receivers(&cfg)
        .unwrap();

    // 19 facade positions times ceil((10 - 1.5) / 3) = 3 levels; the low
    // building gets nothing
    assert_eq!(output.receiver_count, 57);
    let receivers = db.receivers(&output.receivers).unwrap();
    assert_eq!(receivers.len(), 57);

    let mut stacks: FxHashMap<i64, Vec<(u32, f64)>> = FxHashMap::default();
    for r in &receivers {
        assert!(r.position.x.is_finite() && r.position.y.is_finite() && r.position.z.is_finite());
        assert!((1.5..=10.0).contains(&r.position.z));
        let ReceiverTags::Stacked { pk_building, level, stack_id } = r.tags else {
            panic!("unexpected tags {:?}", r.tags);
        };
        assert_eq!(pk_building, 7);
        assert_relative_eq!(r.position.z, 1.5 + level as f64 * 3.0);
        stacks.entry(stack_id).or_default().push((level, r.position.z));
    }
    assert_eq!(stacks.len(), 19);
    assert!(stacks.values().all(|levels| levels.len() == 3));
    assert!(stacks.keys().all(|id| (1..=19).contains(id)));
}

#[test]
fn stacked_receivers_near_roads_are_deleted() {
    let roads = vec![road(1, vec![(-10.0, -2.5), (30.0, -2.5)])];
    let mut db = database(LAMBERT_93, vec![building(7, 0.0, 0.0, 20.0, 20.0, 10.0)], roads);
    let cfg = config_3d(
        r#"{"grid_type": "BUILDINGS_3D", "receiver_distance": 5.0, "height_between_levels_3d": 3.0}"#,
    );

    let output = BuildingGridGenerator3d::new(&mut db)
        .generate_receivers(&cfg)
        .unwrap();

    let receivers = db.receivers(&output.receivers).unwrap();
    assert_eq!(receivers.len(), output.receiver_count);
    assert!(output.receiver_count < 57);
    assert_eq!(output.receiver_count % 3, 0, "whole columns are removed");
    assert!(receivers.iter().all(|r| r.position.y > -1.5));
}

#[test]
fn level_step_too_small_for_the_tallest_building_is_refused() {
    let mut db = database(LAMBERT_93, vec![building(7, 0.0, 0.0, 20.0, 20.0, 30.0)], vec![]);
    let cfg = config_3d(r#"{"grid_type": "BUILDINGS_3D", "height_between_levels_3d": 0.001}"#);

    let err = BuildingGridGenerator3d::new(&mut db)
        .generate_receivers(&cfg)
        .unwrap_err();

    assert!(matches!(err, GridError::Config(_)), "unexpected error {err:?}");
    assert!(!db.has_table(&table("RECEIVERS")));
}

#[test]
fn service_dispatches_on_grid_type() {
    let mut db = database(LAMBERT_93, vec![building(1, 0.0, 0.0, 20.0, 20.0, 10.0)], vec![]);
    let mut engine = SpadeTriangulator::new();
    let cfg = config(r#"{"grid_type": "BUILDINGS_3D", "receiver_distance": 5.0}"#);

    let output = ReceiverGridService::new(&mut db, &mut engine)
        .generate(&cfg, &no_progress)
        .unwrap();

    assert_eq!(output.grid_type, cfg.grid_type());
    let receivers = db.receivers(&output.receivers).unwrap();
    assert!(receivers.iter().all(|r| r.tags.kind() == ReceiverKind::Stacked));
}
