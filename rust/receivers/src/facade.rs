// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Facade receiver lines and their occlusion truncation.
//!
//! The pipeline runs in memory, one explicit value per stage:
//!
//! 1. [`ReceiverLines::build`]: bevel buffer of every footprint, turned into
//!    lines and simplified
//! 2. [`OcclusionRelations::find`]: taller buildings crossing another
//!    building's receiver line
//! 3. [`truncate_lines`]: each affected line minus the combined round-join
//!    buffer of all its occluders
//! 4. [`merge_lines`]: untouched lines plus non-empty truncated lines

use geo::{BoundingRect, Intersects, MultiLineString, Polygon};
use noisegrid_core::{Building, SpatialIndex};
use noisegrid_geometry::{
    boundary_lines, buffer_polygons, buffer_union, difference, simplify_lines, Join,
};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Tolerance of the simplification applied to buffer outlines.
pub const SIMPLIFY_TOLERANCE: f64 = 0.05;

const LINE_INDEX_CELL_SIZE: f64 = 50.0;

/// Receiver line of one building.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverLine {
    pub building_pk: i64,
    /// Position of the building in the input slice.
    pub building: usize,
    pub geometry: MultiLineString<f64>,
}

/// All receiver lines, with a spatial index over them.
#[derive(Debug, Clone)]
pub struct ReceiverLines {
    lines: Vec<ReceiverLine>,
    index: SpatialIndex,
}

impl ReceiverLines {
    /// Offsets every footprint by `distance_from_wall`. Buildings whose
    /// buffer comes out empty get no line.
    pub fn build(buildings: &[Building], distance_from_wall: f64) -> Self {
        let footprints: Vec<Polygon<f64>> = buildings.iter().map(|b| b.footprint.clone()).collect();
        let buffers = buffer_polygons(&footprints, distance_from_wall);

        let lines: Vec<ReceiverLine> = buffers
            .par_iter()
            .zip(buildings.par_iter())
            .enumerate()
            .filter_map(|(i, (buffer, building))| {
                let geometry = simplify_lines(&boundary_lines(buffer), SIMPLIFY_TOLERANCE);
                (!geometry.0.is_empty()).then(|| ReceiverLine {
                    building_pk: building.pk,
                    building: i,
                    geometry,
                })
            })
            .collect();

        let skipped = buildings.len() - lines.len();
        if skipped > 0 {
            warn!(skipped, "buildings without a usable buffer outline");
        }
        debug!(lines = lines.len(), "receiver lines built");

        let index = SpatialIndex::from_geometries(
            &lines.iter().map(|l| l.geometry.clone()).collect::<Vec<_>>(),
            LINE_INDEX_CELL_SIZE,
        );
        Self { lines, index }
    }

    pub fn lines(&self) -> &[ReceiverLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<ReceiverLine> {
        self.lines
    }
}

/// For each receiver line (by position), the buildings occluding it.
#[derive(Debug, Clone, Default)]
pub struct OcclusionRelations {
    by_line: FxHashMap<usize, SmallVec<[usize; 4]>>,
}

impl OcclusionRelations {
    /// Buildings taller than `height` whose footprint intersects another
    /// building's receiver line.
    pub fn find(lines: &ReceiverLines, buildings: &[Building], height: f64) -> Self {
        let mut by_line: FxHashMap<usize, SmallVec<[usize; 4]>> = FxHashMap::default();

        for (b, building) in buildings.iter().enumerate() {
            if building.height.is_nan() || building.height <= height {
                continue;
            }
            let Some(window) = building.footprint.bounding_rect() else {
                continue;
            };
            for l in lines.index.query(window) {
                let line = &lines.lines[l];
                if line.building_pk != building.pk && building.footprint.intersects(&line.geometry) {
                    by_line.entry(l).or_default().push(b);
                }
            }
        }

        debug!(affected_lines = by_line.len(), "occlusion relations found");
        Self { by_line }
    }

    /// Occluders of the line at position `line`.
    pub fn occluders(&self, line: usize) -> &[usize] {
        self.by_line.get(&line).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_line.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_line.len()
    }

    /// Affected line positions, ascending.
    pub fn affected_lines(&self) -> Vec<usize> {
        let mut lines: Vec<usize> = self.by_line.keys().copied().collect();
        lines.sort_unstable();
        lines
    }
}

/// A receiver line after subtraction of its occluders.
#[derive(Debug, Clone, PartialEq)]
pub struct TruncatedLine {
    /// Position of the source line in [`ReceiverLines::lines`].
    pub line: usize,
    pub geometry: MultiLineString<f64>,
}

/// Subtracts from every affected line the buffer of all its occluders at
/// once.
pub fn truncate_lines(
    lines: &ReceiverLines,
    relations: &OcclusionRelations,
    buildings: &[Building],
    distance_from_wall: f64,
) -> Vec<TruncatedLine> {
    relations
        .affected_lines()
        .into_par_iter()
        .map(|l| {
            let occluders: Vec<&Polygon<f64>> = relations
                .occluders(l)
                .iter()
                .map(|&b| &buildings[b].footprint)
                .collect();
            let mask = buffer_union(&occluders, distance_from_wall, Join::Round);
            TruncatedLine {
                line: l,
                geometry: difference(&lines.lines[l].geometry, &mask),
            }
        })
        .collect()
}

/// Lines never truncated, followed by the non-empty truncated ones, in line
/// order.
pub fn merge_lines(lines: ReceiverLines, truncated: Vec<TruncatedLine>) -> Vec<ReceiverLine> {
    let mut replacements: FxHashMap<usize, MultiLineString<f64>> = truncated
        .into_iter()
        .map(|t| (t.line, t.geometry))
        .collect();

    let mut emptied = 0usize;
    let merged: Vec<ReceiverLine> = lines
        .into_lines()
        .into_iter()
        .enumerate()
        .filter_map(|(i, mut line)| {
            if let Some(geometry) = replacements.remove(&i) {
                if geometry.0.is_empty() {
                    emptied += 1;
                    return None;
                }
                line.geometry = geometry;
            }
            Some(line)
        })
        .collect();

    debug!(merged = merged.len(), emptied, "receiver lines merged");
    merged
}
