// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dispatch from a [`GridConfig`] to the matching generator.

use noisegrid_core::{GridConfig, ProgressCallback, SpatialDatabase};
use tracing::info;

use crate::delaunay::DelaunayGridGenerator;
use crate::engine::TriangulationEngine;
use crate::error::Result;
use crate::facade_2d::BuildingGridGenerator2d;
use crate::facade_3d::BuildingGridGenerator3d;
use crate::output::GridOutput;
use crate::regular::RegularGridGenerator;

/// Runs one grid generation per call against a borrowed database.
///
/// The engine is only used for Delaunay grids.
pub struct ReceiverGridService<'a, D: ?Sized, E> {
    db: &'a mut D,
    engine: &'a mut E,
}

impl<'a, D, E> ReceiverGridService<'a, D, E>
where
    D: SpatialDatabase + ?Sized,
    E: TriangulationEngine,
{
    pub fn new(db: &'a mut D, engine: &'a mut E) -> Self {
        Self { db, engine }
    }

    pub fn generate(
        &mut self,
        config: &GridConfig,
        progress: ProgressCallback<'_>,
    ) -> Result<GridOutput> {
        let grid_type = config.grid_type();
        info!(?grid_type, "generating receiver grid");
        progress(0, "Generating receivers");

        let output = match config {
            GridConfig::Regular(c) => RegularGridGenerator::new(&mut *self.db).generate_receivers(c),
            GridConfig::Delaunay(c) => {
                DelaunayGridGenerator::new(&mut *self.db, &mut *self.engine)
                    .generate_receivers(c, progress)
            }
            GridConfig::Buildings2d(c) => {
                BuildingGridGenerator2d::new(&mut *self.db).generate_receivers(c)
            }
            GridConfig::Buildings3d(c) => {
                BuildingGridGenerator3d::new(&mut *self.db).generate_receivers(c)
            }
        }?;

        progress(100, "Receivers generated");
        Ok(output)
    }
}
