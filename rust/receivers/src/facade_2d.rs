// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building facade grid, single height.

use noisegrid_core::{
    BuildingGridConfig2d, GridType, Receiver, ReceiverKind, ReceiverTags, SpatialDatabase,
};
use noisegrid_geometry::split_multiline_at_height;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::exclusion::{source_lines, EXCLUSION_DISTANCE};
use crate::facade::{merge_lines, truncate_lines, OcclusionRelations, ReceiverLine, ReceiverLines};
use crate::output::GridOutput;
use crate::srid::resolve_srid;

pub struct BuildingGridGenerator2d<'a, D: ?Sized> {
    db: &'a mut D,
}

impl<'a, D> BuildingGridGenerator2d<'a, D>
where
    D: SpatialDatabase + ?Sized,
{
    pub fn new(db: &'a mut D) -> Self {
        Self { db }
    }

    pub fn generate_receivers(&mut self, config: &BuildingGridConfig2d) -> Result<GridOutput> {
        info!(
            distance_from_wall = config.distance_from_wall,
            receiver_distance = config.receiver_distance,
            "starting 2D building grid generation"
        );
        let tables = &config.tables;
        let srid = resolve_srid(&*self.db, tables, None)?;

        let buildings = self.db.buildings(&tables.buildings)?;
        let sources = match &tables.sources {
            Some(table) if self.db.has_table(table) => self.db.sources(table)?,
            _ => Vec::new(),
        };

        let lines = ReceiverLines::build(&buildings, config.distance_from_wall);
        let relations = OcclusionRelations::find(&lines, &buildings, config.height);
        let truncated = truncate_lines(&lines, &relations, &buildings, config.distance_from_wall);
        let merged = merge_lines(lines, truncated);

        let roads = source_lines(&sources);
        let receivers = facade_receivers(&merged, config.receiver_distance, config.height)
            .into_iter()
            .filter(|r| !roads.within(r.point_2d(), EXCLUSION_DISTANCE))
            .collect::<Vec<_>>();
        let receivers: Vec<Receiver> = receivers
            .into_iter()
            .zip(1..)
            .map(|(mut r, pk)| {
                r.pk = pk;
                r
            })
            .collect();

        self.db.drop_table(&tables.receivers)?;
        self.db
            .create_receivers_table(&tables.receivers, ReceiverKind::Facade, srid)?;
        let receiver_count = receivers.len();
        self.db.insert_receivers(&tables.receivers, receivers)?;
        self.db.create_spatial_index(&tables.receivers)?;

        info!(
            receivers = receiver_count,
            table = %tables.receivers,
            "2D building grid generation completed"
        );
        Ok(GridOutput {
            grid_type: GridType::Buildings2d,
            receivers: tables.receivers.clone(),
            triangles: None,
            srid,
            receiver_count,
            triangle_count: 0,
        })
    }
}

/// Resamples every line at `spacing` and places the points at `height`.
/// Keys are left at 0 for the caller to number.
fn facade_receivers(lines: &[ReceiverLine], spacing: f64, height: f64) -> Vec<Receiver> {
    let mut dropped = 0usize;
    let receivers: Vec<Receiver> = lines
        .iter()
        .flat_map(|line| {
            split_multiline_at_height(&line.geometry, spacing, height)
                .into_iter()
                .map(move |position| {
                    Receiver::new(
                        0,
                        position,
                        ReceiverTags::Facade {
                            build_pk: line.building_pk,
                        },
                    )
                })
        })
        .filter(|r| {
            let ok = r.has_finite_xy();
            if !ok {
                dropped += 1;
            }
            ok
        })
        .collect();
    if dropped > 0 {
        warn!(dropped, "dropped facade receivers with non-finite coordinates");
    }
    debug!(receivers = receivers.len(), lines = lines.len(), "facade lines resampled");
    receivers
}
