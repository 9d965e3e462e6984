// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delaunay grid generator.
//!
//! Drives a [`TriangulationEngine`] over every cell of the domain grid. A
//! failing cell aborts the whole run: its inputs are dumped when a dump
//! folder is configured, the output tables are dropped and the engine's
//! error is returned as is.

use noisegrid_core::{
    percent, DelaunayGridConfig, FenceSpec, GridType, InputTables, ProgressCallback,
    ReceiverKind, SpatialDatabase,
};
use tracing::{error, info, warn};

use crate::engine::{CellIndex, CellTables, PkCounter, TriangulationEngine, TriangulationSettings};
use crate::error::{GridError, Result};
use crate::fence::resolve_fence;
use crate::output::GridOutput;
use crate::srid::resolve_srid;

pub struct DelaunayGridGenerator<'a, D: ?Sized, E> {
    db: &'a mut D,
    engine: &'a mut E,
}

impl<'a, D, E> DelaunayGridGenerator<'a, D, E>
where
    D: SpatialDatabase + ?Sized,
    E: TriangulationEngine,
{
    pub fn new(db: &'a mut D, engine: &'a mut E) -> Self {
        Self { db, engine }
    }

    pub fn generate_receivers(
        &mut self,
        config: &DelaunayGridConfig,
        progress: ProgressCallback<'_>,
    ) -> Result<GridOutput> {
        info!(
            max_area = config.max_area,
            max_cell_dist = config.max_cell_dist,
            "starting Delaunay grid generation"
        );
        let tables = &config.tables;

        let srid = resolve_srid(&*self.db, tables, config.fence_table.as_ref())?;
        let fence = match &config.fence {
            FenceSpec::BuildingsEnvelope => None,
            spec => Some(resolve_fence(&*self.db, spec, &tables.buildings, srid)?.envelope),
        };

        let settings = TriangulationSettings {
            max_area: config.max_area,
            road_width: config.road_width,
            receiver_height: config.height,
            max_cell_dist: config.max_cell_dist,
            iso_surface_in_buildings: config.iso_surface_in_buildings,
            fence,
            error_dump_folder: config.error_dump_folder.clone(),
        };
        let output = CellTables {
            receivers: tables.receivers.clone(),
            triangles: tables.triangles.clone(),
        };

        self.db.drop_table(&output.receivers)?;
        self.db.drop_table(&output.triangles)?;
        self.db
            .create_receivers_table(&output.receivers, ReceiverKind::Plain, srid)?;
        self.db.create_triangles_table(&output.triangles, srid)?;

        match self.run_cells(tables, &settings, &output, progress) {
            Ok(pks) => {
                self.db.create_spatial_index(&output.receivers)?;
                let (receiver_count, triangle_count) = pks.issued();
                info!(
                    receivers = receiver_count,
                    triangles = triangle_count,
                    table = %output.receivers,
                    "Delaunay grid generation completed"
                );
                Ok(GridOutput {
                    grid_type: GridType::Delaunay,
                    receivers: output.receivers,
                    triangles: Some(output.triangles),
                    srid,
                    receiver_count: receiver_count as usize,
                    triangle_count: triangle_count as usize,
                })
            }
            Err(err) => {
                self.db.drop_table(&output.receivers)?;
                self.db.drop_table(&output.triangles)?;
                Err(err)
            }
        }
    }

    fn run_cells(
        &mut self,
        tables: &InputTables,
        settings: &TriangulationSettings,
        output: &CellTables,
        progress: ProgressCallback<'_>,
    ) -> Result<PkCounter> {
        let grid = self.engine.initialize(&*self.db, tables, settings)?;
        info!(rows = grid.rows, cols = grid.cols, "domain split into cells");

        let pks = PkCounter::new();
        let total = grid.len();
        for (done, cell) in grid.cells().enumerate() {
            progress(percent(done, total), "Triangulating receiver cells");
            if let Err(err) = self.engine.generate_cell(&mut *self.db, cell, output, &pks) {
                return Err(self.fail_cell(cell, err, settings));
            }
        }
        progress(100, "Receiver triangulation complete");
        Ok(pks)
    }

    fn fail_cell(
        &self,
        cell: CellIndex,
        err: GridError,
        settings: &TriangulationSettings,
    ) -> GridError {
        error!(row = cell.row, col = cell.col, error = %err, "triangulation failed");
        if let Some(folder) = &settings.error_dump_folder {
            match self.engine.dump_cell(cell, folder) {
                Ok(path) => info!(path = %path.display(), "wrote failing cell geometries"),
                Err(dump_err) => warn!(error = %dump_err, "could not dump failing cell"),
            }
        }
        err
    }
}
