// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building facade grid, stacked over several levels.
//!
//! Facade positions come from the same receiver lines as the 2D grid, without
//! occlusion truncation. Each position is repeated at every level up to the
//! owning building's height. Receivers of one vertical column share a stack
//! id so per-level results can be pivoted back into one point.

use nalgebra::Point3;
use noisegrid_core::{
    BuildingGridConfig3d, GridType, Receiver, ReceiverKind, ReceiverTags, SpatialDatabase,
};
use noisegrid_geometry::split_multiline_at_height;
use tracing::{debug, info};

use crate::error::{GridError, Result};
use crate::exclusion::{delete_near_sources, source_lines, EXCLUSION_DISTANCE};
use crate::facade::{ReceiverLine, ReceiverLines};
use crate::output::GridOutput;
use crate::srid::resolve_srid;

/// Height of the lowest receiver level.
pub const MIN_RECEIVER_HEIGHT: f64 = 1.5;

/// Most levels stacked on one facade position.
pub const MAX_LEVELS: usize = 1_000;

fn level_count(building_height: f64, step: f64) -> f64 {
    ((building_height - MIN_RECEIVER_HEIGHT) / step).ceil()
}

/// Receiver heights for a building of height `building_height`.
///
/// `ceil((h - 1.5) / step)` levels starting at 1.5, so every height lies in
/// `[1.5, h)`. Buildings of 1.5 or lower get none. Capped at [`MAX_LEVELS`].
pub fn level_heights(building_height: f64, step: f64) -> Vec<f64> {
    if !building_height.is_finite()
        || building_height <= MIN_RECEIVER_HEIGHT
        || !step.is_finite()
        || step <= 0.0
    {
        return Vec::new();
    }
    let levels = level_count(building_height, step).min(MAX_LEVELS as f64) as usize;
    (0..levels)
        .map(|i| MIN_RECEIVER_HEIGHT + i as f64 * step)
        .collect()
}

pub struct BuildingGridGenerator3d<'a, D: ?Sized> {
    db: &'a mut D,
}

impl<'a, D> BuildingGridGenerator3d<'a, D>
where
    D: SpatialDatabase + ?Sized,
{
    pub fn new(db: &'a mut D) -> Self {
        Self { db }
    }

    pub fn generate_receivers(&mut self, config: &BuildingGridConfig3d) -> Result<GridOutput> {
        info!(
            distance_from_wall = config.distance_from_wall,
            receiver_distance = config.receiver_distance,
            height_between_levels = config.height_between_levels,
            "starting 3D building grid generation"
        );
        let tables = &config.tables;
        let srid = resolve_srid(&*self.db, tables, None)?;

        let buildings = self.db.buildings(&tables.buildings)?;
        let tallest = buildings
            .iter()
            .map(|b| b.height)
            .filter(|h| h.is_finite())
            .fold(MIN_RECEIVER_HEIGHT, f64::max);
        if level_count(tallest, config.height_between_levels) > MAX_LEVELS as f64 {
            return Err(GridError::Config(format!(
                "{} m between levels stacks more than {MAX_LEVELS} levels on a {tallest} m building",
                config.height_between_levels
            )));
        }
        let lines = ReceiverLines::build(&buildings, config.distance_from_wall);
        let heights: Vec<f64> = buildings.iter().map(|b| b.height).collect();
        let receivers = stacked_receivers(lines.lines(), &heights, config);

        self.db.drop_table(&tables.receivers)?;
        self.db
            .create_receivers_table(&tables.receivers, ReceiverKind::Stacked, srid)?;
        let inserted = receivers.len();
        self.db.insert_receivers(&tables.receivers, receivers)?;
        self.db.create_spatial_index(&tables.receivers)?;

        let mut deleted = 0;
        if let Some(sources) = &tables.sources {
            if self.db.has_table(sources) {
                let roads = source_lines(&self.db.sources(sources)?);
                deleted =
                    delete_near_sources(&mut *self.db, &tables.receivers, &roads, EXCLUSION_DISTANCE)?;
            }
        }

        let receiver_count = inserted - deleted;
        info!(
            receivers = receiver_count,
            removed_near_sources = deleted,
            table = %tables.receivers,
            "3D building grid generation completed"
        );
        Ok(GridOutput {
            grid_type: GridType::Buildings3d,
            receivers: tables.receivers.clone(),
            triangles: None,
            srid,
            receiver_count,
            triangle_count: 0,
        })
    }
}

/// One receiver per level per resampled facade position. Keys and stack ids
/// both run from 1 in generation order.
fn stacked_receivers(
    lines: &[ReceiverLine],
    heights: &[f64],
    config: &BuildingGridConfig3d,
) -> Vec<Receiver> {
    let mut receivers = Vec::new();
    let mut pk = 0i64;
    let mut stack_id = 0i64;
    let mut skipped_low = 0usize;

    for line in lines {
        let levels = level_heights(heights[line.building], config.height_between_levels);
        if levels.is_empty() {
            skipped_low += 1;
            continue;
        }
        for position in split_multiline_at_height(&line.geometry, config.receiver_distance, 0.0) {
            if !(position.x.is_finite() && position.y.is_finite()) {
                continue;
            }
            if config.join_by_stack_id {
                stack_id += 1;
            }
            for (level, z) in levels.iter().enumerate() {
                pk += 1;
                if !config.join_by_stack_id {
                    stack_id = pk;
                }
                receivers.push(Receiver::new(
                    pk,
                    Point3::new(position.x, position.y, *z),
                    ReceiverTags::Stacked {
                        pk_building: line.building_pk,
                        level: level as u32,
                        stack_id,
                    },
                ));
            }
        }
    }

    debug!(
        receivers = receivers.len(),
        stacks = stack_id,
        skipped_low_buildings = skipped_low,
        "stacked facade receivers generated"
    );
    receivers
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn levels_start_at_one_and_a_half() {
        let z = level_heights(10.0, 3.0);
        assert_eq!(z.len(), 3);
        assert_relative_eq!(z[0], 1.5);
        assert_relative_eq!(z[1], 4.5);
        assert_relative_eq!(z[2], 7.5);
    }

    #[test]
    fn exact_multiple_does_not_reach_the_roof() {
        let z = level_heights(7.5, 3.0);
        assert_eq!(z.len(), 2);
        assert!(z.iter().all(|&z| (1.5..=7.5).contains(&z)));
    }

    #[test]
    fn low_buildings_get_no_levels() {
        assert!(level_heights(1.5, 2.5).is_empty());
        assert!(level_heights(1.0, 2.5).is_empty());
        assert!(level_heights(f64::NAN, 2.5).is_empty());
        assert_eq!(level_heights(1.6, 2.5), vec![1.5]);
    }

    #[test]
    fn tiny_steps_are_capped() {
        assert_eq!(level_heights(30.0, 1e-12).len(), MAX_LEVELS);
        assert_eq!(level_heights(30.0, f64::MIN_POSITIVE).len(), MAX_LEVELS);
    }
}
