// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Proximity masks used by the exclusion passes.

use geo::{BoundingRect, Coord, EuclideanDistance, LineString, Point, Polygon, Rect};
use noisegrid_core::{Building, SourceGeometry, SpatialDatabase, SpatialIndex, TableName};
use tracing::debug;

use crate::error::Result;

/// Receivers closer than this to a source (or to a taller building) are
/// removed.
pub const EXCLUSION_DISTANCE: f64 = 1.0;

const MASK_CELL_SIZE: f64 = 50.0;

/// Set of obstacles answering "is there one within `d` of this point".
#[derive(Debug, Clone)]
pub struct ProximityMask<G> {
    items: Vec<G>,
    index: SpatialIndex,
}

impl<G> ProximityMask<G>
where
    G: BoundingRect<f64>,
    G::Output: Into<Option<Rect<f64>>>,
    Point<f64>: EuclideanDistance<f64, G>,
{
    pub fn new(items: Vec<G>) -> Self {
        let index = SpatialIndex::from_geometries(&items, MASK_CELL_SIZE);
        Self { items, index }
    }

    /// Some obstacle lies strictly closer than `distance` (distance zero
    /// when the point is inside a polygon).
    pub fn within(&self, point: Point<f64>, distance: f64) -> bool {
        self.index
            .query_around(point.0, distance)
            .into_iter()
            .any(|id| point.euclidean_distance(&self.items[id]) < distance)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[G] {
        &self.items
    }
}

/// Footprints of buildings taller than `z`.
pub fn buildings_taller_than(buildings: &[Building], z: f64) -> ProximityMask<Polygon<f64>> {
    ProximityMask::new(
        buildings
            .iter()
            .filter(|b| b.height > z)
            .map(|b| b.footprint.clone())
            .collect(),
    )
}

/// Every part of every source line.
pub fn source_lines(sources: &[SourceGeometry]) -> ProximityMask<LineString<f64>> {
    ProximityMask::new(
        sources
            .iter()
            .flat_map(|s| s.geometry.0.iter().cloned())
            .collect(),
    )
}

/// Deletes stored receivers lying closer than `distance` to any source line.
/// Returns the number of deleted receivers.
pub fn delete_near_sources<D>(
    db: &mut D,
    receivers: &TableName,
    sources: &ProximityMask<LineString<f64>>,
    distance: f64,
) -> Result<usize>
where
    D: SpatialDatabase + ?Sized,
{
    let mut doomed: Vec<i64> = Vec::new();
    for line in sources.items() {
        let Some(rect) = line.bounding_rect() else {
            continue;
        };
        let window = Rect::new(
            Coord { x: rect.min().x - distance, y: rect.min().y - distance },
            Coord { x: rect.max().x + distance, y: rect.max().y + distance },
        );
        for receiver in db.receivers_in(receivers, window)? {
            if receiver.point_2d().euclidean_distance(line) < distance {
                doomed.push(receiver.pk);
            }
        }
    }

    doomed.sort_unstable();
    doomed.dedup();
    let deleted = db.delete_receivers(receivers, &doomed)?;
    debug!(deleted, table = %receivers, "removed receivers near sources");
    Ok(deleted)
}
