// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Regular grid generator.
//!
//! Receivers sit at the cell centres of a `delta` grid over the fence
//! envelope, all at the calculation height. Receivers outside an explicit
//! fence, under or next to taller buildings, or next to sources are removed.
//! The surviving grid can be meshed into two triangles per grid cell.

use geo::{ConvexHull, Coord, MultiPoint, Point};
use nalgebra::Point3;
use noisegrid_core::{
    GridType, Receiver, ReceiverKind, ReceiverTags, RegularGridConfig, SpatialDatabase, Triangle,
};
use noisegrid_geometry::{grid_size, make_grid_points};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::error::{GridError, Result};
use crate::exclusion::{buildings_taller_than, source_lines, EXCLUSION_DISTANCE};
use crate::fence::resolve_fence;
use crate::output::GridOutput;
use crate::srid::resolve_srid;

/// Largest grid laid out before exclusions.
pub const MAX_GRID_POINTS: usize = 20_000_000;

/// `(row, col)` offsets of the two triangles closing the grid cell whose
/// upper-right corner is the anchor receiver.
const TRIANGLE_PATTERNS: [[(i64, i64); 3]; 2] = [
    [(0, 0), (-1, 0), (-1, -1)],
    [(0, 0), (-1, -1), (0, -1)],
];

pub struct RegularGridGenerator<'a, D: ?Sized> {
    db: &'a mut D,
}

impl<'a, D> RegularGridGenerator<'a, D>
where
    D: SpatialDatabase + ?Sized,
{
    pub fn new(db: &'a mut D) -> Self {
        Self { db }
    }

    pub fn generate_receivers(&mut self, config: &RegularGridConfig) -> Result<GridOutput> {
        info!(delta = config.delta, height = config.height, "starting regular grid generation");
        let tables = &config.tables;

        let srid = resolve_srid(&*self.db, tables, config.fence_table.as_ref())?;
        let fence = resolve_fence(&*self.db, &config.fence, &tables.buildings, srid)?;

        let buildings = self.db.buildings(&tables.buildings)?;
        let sources = match &tables.sources {
            Some(table) if self.db.has_table(table) => self.db.sources(table)?,
            _ => Vec::new(),
        };
        let obstacles = buildings_taller_than(&buildings, config.height);
        let roads = source_lines(&sources);

        match grid_size(fence.envelope, config.delta) {
            Some(size) if size <= MAX_GRID_POINTS => {}
            size => {
                return Err(GridError::Config(format!(
                    "a {} m grid over the fence needs {} points, at most {MAX_GRID_POINTS} are allowed",
                    config.delta,
                    size.map_or_else(|| "too many".to_string(), |n| n.to_string())
                )))
            }
        }
        let grid = make_grid_points(fence.envelope, config.delta);
        let generated = grid.len();
        let receivers: Vec<Receiver> = grid
            .into_iter()
            .zip(1..)
            .filter(|(p, _)| {
                let point = Point::from(p.coord);
                fence.admits(point)
                    && !obstacles.within(point, EXCLUSION_DISTANCE)
                    && !roads.within(point, EXCLUSION_DISTANCE)
            })
            .map(|(p, pk)| {
                Receiver::new(
                    pk,
                    Point3::new(p.coord.x, p.coord.y, config.height),
                    ReceiverTags::Grid {
                        id_col: p.col,
                        id_row: p.row,
                    },
                )
            })
            .collect();
        debug!(generated, kept = receivers.len(), "grid exclusion pass done");

        self.db.drop_table(&tables.receivers)?;
        self.db
            .create_receivers_table(&tables.receivers, ReceiverKind::Grid, srid)?;

        let triangles = if config.create_triangles {
            Some(grid_triangles(&receivers))
        } else {
            None
        };

        let receiver_count = receivers.len();
        self.db.insert_receivers(&tables.receivers, receivers)?;
        self.db.create_spatial_index(&tables.receivers)?;

        let triangle_count = match triangles {
            Some(triangles) => {
                let count = triangles.len();
                self.db.drop_table(&tables.triangles)?;
                self.db.create_triangles_table(&tables.triangles, srid)?;
                self.db
                    .insert_triangles(&tables.triangles, &tables.receivers, triangles)?;
                count
            }
            None => 0,
        };

        info!(
            receivers = receiver_count,
            triangles = triangle_count,
            table = %tables.receivers,
            "regular grid generation completed"
        );
        Ok(GridOutput {
            grid_type: GridType::Regular,
            receivers: tables.receivers.clone(),
            triangles: config.create_triangles.then(|| tables.triangles.clone()),
            srid,
            receiver_count,
            triangle_count,
        })
    }
}

/// Two triangles per grid cell whose four corner receivers all survived.
pub fn grid_triangles(receivers: &[Receiver]) -> Vec<Triangle> {
    let by_cell: FxHashMap<(i64, i64), (i64, Coord<f64>)> = receivers
        .iter()
        .filter_map(|r| match r.tags {
            ReceiverTags::Grid { id_col, id_row } => Some((
                (id_row, id_col),
                (r.pk, Coord { x: r.position.x, y: r.position.y }),
            )),
            _ => None,
        })
        .collect();

    let mut triangles = Vec::new();
    for r in receivers {
        let ReceiverTags::Grid { id_col, id_row } = r.tags else {
            continue;
        };
        for pattern in TRIANGLE_PATTERNS {
            let corners: Option<Vec<(i64, Coord<f64>)>> = pattern
                .iter()
                .map(|(dr, dc)| by_cell.get(&(id_row + dr, id_col + dc)).copied())
                .collect();
            let Some(corners) = corners else {
                continue;
            };
            let hull = MultiPoint::from(corners.iter().map(|(_, c)| Point::from(*c)).collect::<Vec<_>>())
                .convex_hull();
            triangles.push(Triangle {
                pk: triangles.len() as i64 + 1,
                geometry: hull,
                pk_1: corners[0].0,
                pk_2: corners[1].0,
                pk_3: corners[2].0,
                cell_id: 0,
            });
        }
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_receiver(pk: i64, col: i64, row: i64) -> Receiver {
        Receiver::new(
            pk,
            Point3::new(col as f64 * 10.0, row as f64 * 10.0, 4.0),
            ReceiverTags::Grid {
                id_col: col,
                id_row: row,
            },
        )
    }

    #[test]
    fn full_block_gives_two_triangles() {
        let receivers = vec![
            grid_receiver(1, 1, 1),
            grid_receiver(2, 2, 1),
            grid_receiver(3, 1, 2),
            grid_receiver(4, 2, 2),
        ];
        let triangles = grid_triangles(&receivers);
        assert_eq!(triangles.len(), 2);
        assert_eq!(triangles[0].vertex_keys(), [4, 2, 1]);
        assert_eq!(triangles[1].vertex_keys(), [4, 1, 3]);
        assert!(triangles.iter().all(|t| t.cell_id == 0));
        assert_eq!(triangles[0].geometry.exterior().0.len(), 4);
    }

    #[test]
    fn missing_corner_drops_only_the_affected_triangle() {
        let receivers = vec![
            grid_receiver(1, 1, 1),
            grid_receiver(2, 2, 1),
            grid_receiver(4, 2, 2),
        ];
        let triangles = grid_triangles(&receivers);
        assert_eq!(triangles.len(), 1);
        assert_eq!(triangles[0].vertex_keys(), [4, 2, 1]);
    }
}
