// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delaunay grid generation with the built-in engine and a scripted one.

mod common;

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use common::*;
use nalgebra::Point3;
use noisegrid_core::{
    no_progress, DelaunayGridConfig, Error as CoreError, GridConfig, GridSettings, GridType, InputTables, Receiver,
    ReceiverTags, SpatialDatabase,
};
use noisegrid_receivers::{
    CellGrid, CellIndex, CellTables, DelaunayGridGenerator, GridError, PkCounter,
    SpadeTriangulator, TriangulationEngine, TriangulationSettings,
};

fn delaunay(settings: GridSettings) -> DelaunayGridConfig {
    match settings.into_config(&tables()).unwrap() {
        GridConfig::Delaunay(c) => c,
        other => panic!("unexpected config {other:?}"),
    }
}

fn settings() -> GridSettings {
    GridSettings {
        grid_type: GridType::Delaunay,
        fence_wkt: Some("POLYGON((0 0, 100 0, 100 100, 0 100, 0 0))".into()),
        max_area: 50.0,
        max_cell_dist: 60.0,
        ..GridSettings::default()
    }
}

#[test]
fn spade_engine_meshes_every_cell_around_buildings() {
    let mut db = database(LAMBERT_93, vec![building(1, 20.0, 20.0, 10.0, 10.0, 10.0)], vec![]);
    let mut engine = SpadeTriangulator::new();
    let cfg = delaunay(settings());

    let output = DelaunayGridGenerator::new(&mut db, &mut engine)
        .generate_receivers(&cfg, &no_progress)
        .unwrap();

    let receivers = db.receivers(&output.receivers).unwrap();
    let triangles = db.triangles(output.triangles.as_ref().unwrap()).unwrap();
    assert_eq!(receivers.len(), output.receiver_count);
    assert_eq!(triangles.len(), output.triangle_count);
    assert!(output.triangle_count > 100);

    let mut pks: Vec<i64> = receivers.iter().map(|r| r.pk).collect();
    pks.sort_unstable();
    assert_eq!(pks, (1..=receivers.len() as i64).collect::<Vec<_>>());

    for r in &receivers {
        assert_eq!(r.position.z, 4.0);
        let inside = r.position.x > 20.0 && r.position.x < 30.0
            && r.position.y > 20.0 && r.position.y < 30.0;
        assert!(!inside, "receiver inside the building: {r:?}");
    }

    let mut cells: Vec<i64> = triangles.iter().map(|t| t.cell_id).collect();
    cells.sort_unstable();
    cells.dedup();
    assert_eq!(cells, vec![0, 1, 2, 3]);
    assert!(db.has_spatial_index(&output.receivers));
}

#[test]
fn receivers_keep_clear_of_roads() {
    let roads = vec![road(1, vec![(0.0, 50.5), (100.0, 50.5)])];
    let mut db = database(LAMBERT_93, vec![building(1, 20.0, 20.0, 10.0, 10.0, 10.0)], roads);
    let mut engine = SpadeTriangulator::new();
    let cfg = delaunay(settings());

    let output = DelaunayGridGenerator::new(&mut db, &mut engine)
        .generate_receivers(&cfg, &no_progress)
        .unwrap();

    let receivers = db.receivers(&output.receivers).unwrap();
    assert!(!receivers.is_empty());
    assert!(receivers
        .iter()
        .all(|r| (r.position.y - 50.5).abs() >= cfg.road_width));
}

/// Engine writing one receiver per cell and failing on a chosen cell.
struct ScriptedEngine {
    grid: CellGrid,
    fail_at: Option<CellIndex>,
    /// Write the failing cell into a table that does not exist instead of
    /// reporting a triangulation error.
    fail_in_database: bool,
    dumped: Mutex<Vec<CellIndex>>,
}

impl ScriptedEngine {
    fn new(fail_at: Option<CellIndex>) -> Self {
        Self {
            grid: CellGrid { rows: 1, cols: 3 },
            fail_at,
            fail_in_database: false,
            dumped: Mutex::new(Vec::new()),
        }
    }
}

impl TriangulationEngine for ScriptedEngine {
    fn initialize<D>(
        &mut self,
        _db: &D,
        _tables: &InputTables,
        _settings: &TriangulationSettings,
    ) -> noisegrid_receivers::Result<CellGrid>
    where
        D: SpatialDatabase + ?Sized,
    {
        Ok(self.grid)
    }

    fn generate_cell<D>(
        &self,
        db: &mut D,
        cell: CellIndex,
        output: &CellTables,
        pks: &PkCounter,
    ) -> noisegrid_receivers::Result<()>
    where
        D: SpatialDatabase + ?Sized,
    {
        let mut target = output.receivers.clone();
        if Some(cell) == self.fail_at {
            if !self.fail_in_database {
                return Err(GridError::Triangulation {
                    row: cell.row,
                    col: cell.col,
                    message: "constraint crosses itself".into(),
                });
            }
            target = table("NO_SUCH_RECEIVERS");
        }
        let receiver = Receiver::new(
            pks.next_receiver(),
            Point3::new(cell.col as f64 * 10.0, 0.0, 4.0),
            ReceiverTags::None,
        );
        db.insert_receivers(&target, vec![receiver])?;
        Ok(())
    }

    fn dump_cell(&self, cell: CellIndex, folder: &Path) -> noisegrid_receivers::Result<PathBuf> {
        self.dumped.lock().unwrap().push(cell);
        fs::create_dir_all(folder)?;
        let path = folder.join(format!("cell_{}_{}.txt", cell.row, cell.col));
        fs::write(&path, "scripted failure")?;
        Ok(path)
    }
}

#[test]
fn cells_run_in_order_and_report_progress() {
    let mut db = database(LAMBERT_93, vec![building(1, 20.0, 20.0, 10.0, 10.0, 10.0)], vec![]);
    let mut engine = ScriptedEngine::new(None);
    let cfg = delaunay(settings());
    let seen = RefCell::new(Vec::new());
    let progress = |percent: u32, _message: &str| seen.borrow_mut().push(percent);

    let output = DelaunayGridGenerator::new(&mut db, &mut engine)
        .generate_receivers(&cfg, &progress)
        .unwrap();

    assert_eq!(output.grid_type, GridType::Delaunay);
    assert_eq!(output.receiver_count, 3);
    let xs: Vec<f64> = db
        .receivers(&output.receivers)
        .unwrap()
        .iter()
        .map(|r| r.position.x)
        .collect();
    assert_eq!(xs, vec![0.0, 10.0, 20.0]);
    assert_eq!(seen.into_inner(), vec![0, 33, 66, 100]);
}

#[test]
fn failing_cell_dumps_inputs_and_drops_outputs() {
    let folder = std::env::temp_dir().join(format!("noisegrid-dump-{}", std::process::id()));
    let mut db = database(LAMBERT_93, vec![building(1, 20.0, 20.0, 10.0, 10.0, 10.0)], vec![]);
    let failing = CellIndex { row: 0, col: 1 };
    let mut engine = ScriptedEngine::new(Some(failing));
    let cfg = delaunay(GridSettings {
        error_dump_folder: Some(folder.clone()),
        ..settings()
    });

    let err = DelaunayGridGenerator::new(&mut db, &mut engine)
        .generate_receivers(&cfg, &no_progress)
        .unwrap_err();

    match err {
        GridError::Triangulation { row, col, message } => {
            assert_eq!((row, col), (0, 1));
            assert!(message.contains("constraint crosses itself"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(*engine.dumped.lock().unwrap(), vec![failing]);
    assert!(folder.join("cell_0_1.txt").exists());
    assert!(!db.has_table(&table("RECEIVERS")));
    assert!(!db.has_table(&table("TRIANGLES")));

    let _ = fs::remove_dir_all(&folder);
}

#[test]
fn failure_without_dump_folder_still_cleans_up() {
    let mut db = database(LAMBERT_93, vec![building(1, 20.0, 20.0, 10.0, 10.0, 10.0)], vec![]);
    let mut engine = ScriptedEngine::new(Some(CellIndex { row: 0, col: 0 }));
    let cfg = delaunay(settings());

    let err = DelaunayGridGenerator::new(&mut db, &mut engine)
        .generate_receivers(&cfg, &no_progress)
        .unwrap_err();

    assert!(matches!(err, GridError::Triangulation { row: 0, col: 0, .. }));
    assert!(engine.dumped.lock().unwrap().is_empty());
    assert!(!db.has_table(&table("RECEIVERS")));
}

#[test]
fn database_errors_from_a_cell_propagate_unchanged() {
    let folder = std::env::temp_dir().join(format!("noisegrid-db-dump-{}", std::process::id()));
    let mut db = database(LAMBERT_93, vec![building(1, 20.0, 20.0, 10.0, 10.0, 10.0)], vec![]);
    let failing = CellIndex { row: 0, col: 2 };
    let mut engine = ScriptedEngine {
        fail_in_database: true,
        ..ScriptedEngine::new(Some(failing))
    };
    let cfg = delaunay(GridSettings {
        error_dump_folder: Some(folder.clone()),
        ..settings()
    });

    let err = DelaunayGridGenerator::new(&mut db, &mut engine)
        .generate_receivers(&cfg, &no_progress)
        .unwrap_err();

    assert!(
        matches!(err, GridError::Core(CoreError::TableNotFound(_))),
        "unexpected error {err:?}"
    );
    assert_eq!(*engine.dumped.lock().unwrap(), vec![failing]);
    assert!(!db.has_table(&table("RECEIVERS")));
    assert!(!db.has_table(&table("TRIANGLES")));

    let _ = fs::remove_dir_all(&folder);
}

#[test]
fn cells_share_receivers_along_their_seam() {
    let mut db = database(LAMBERT_93, vec![], vec![]);
    let mut engine = SpadeTriangulator::new();
    let cfg = delaunay(GridSettings {
        fence_wkt: Some("POLYGON((0 0, 100 0, 100 50, 0 50, 0 0))".into()),
        ..settings()
    });

    let output = DelaunayGridGenerator::new(&mut db, &mut engine)
        .generate_receivers(&cfg, &no_progress)
        .unwrap();

    let receivers = db.receivers(&output.receivers).unwrap();
    let mut positions: Vec<(u64, u64)> = receivers
        .iter()
        .map(|r| (r.position.x.to_bits(), r.position.y.to_bits()))
        .collect();
    positions.sort_unstable();
    positions.dedup();
    assert_eq!(positions.len(), receivers.len(), "duplicate receiver positions");

    // The seam corner belongs to triangles of both cells through one key
    let corner = receivers
        .iter()
        .find(|r| r.position.x == 50.0 && r.position.y == 0.0)
        .expect("seam corner receiver");
    let triangles = db.triangles(output.triangles.as_ref().unwrap()).unwrap();
    let mut cells: Vec<i64> = triangles
        .iter()
        .filter(|t| [t.pk_1, t.pk_2, t.pk_3].contains(&corner.pk))
        .map(|t| t.cell_id)
        .collect();
    cells.sort_unstable();
    cells.dedup();
    assert_eq!(cells, vec![0, 1]);
}
