// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial index for bounding-box candidate lookup.
//!
//! Uses a grid-based spatial hash: every item is registered in each cell its
//! bounding box overlaps, and a window query visits only the cells the window
//! overlaps. Exact geometric predicates are left to the caller.

use geo::{BoundingRect, Coord, Rect};
use rustc_hash::{FxHashMap, FxHashSet};

/// Items spanning more cells than this go to an overflow list that every
/// query scans, instead of flooding the grid.
const MAX_CELLS_PER_ITEM: i64 = 4096;

/// A spatial hash grid over item bounding boxes.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    grid: FxHashMap<(i64, i64), Vec<usize>>,
    oversized: Vec<usize>,
    len: usize,
}

impl SpatialIndex {
    /// Creates an empty index with square cells of side `cell_size`.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            grid: FxHashMap::default(),
            oversized: Vec::new(),
            len: 0,
        }
    }

    /// Builds an index over `items`, keyed by their position in the slice.
    ///
    /// Items without a bounding box (empty geometries) are skipped.
    pub fn from_geometries<G>(items: &[G], cell_size: f64) -> Self
    where
        G: BoundingRect<f64>,
        G::Output: Into<Option<Rect<f64>>>,
    {
        let mut index = Self::new(cell_size);
        for (id, item) in items.iter().enumerate() {
            if let Some(rect) = item.bounding_rect().into() {
                index.insert(id, rect);
            }
        }
        index
    }

    /// Registers item `id` with bounding box `rect`.
    pub fn insert(&mut self, id: usize, rect: Rect<f64>) {
        let (min, max) = match (self.cell_coords(rect.min()), self.cell_coords(rect.max())) {
            (Some(min), Some(max)) => (min, max),
            _ => return,
        };
        self.len += 1;

        let cells = (max.0 - min.0 + 1).saturating_mul(max.1 - min.1 + 1);
        if cells > MAX_CELLS_PER_ITEM {
            self.oversized.push(id);
            return;
        }

        for cx in min.0..=max.0 {
            for cy in min.1..=max.1 {
                self.grid.entry((cx, cy)).or_default().push(id);
            }
        }
    }

    /// Ids of all items whose bounding box may overlap `window`.
    ///
    /// The result is deduplicated and sorted, so iteration order is stable.
    pub fn query(&self, window: Rect<f64>) -> Vec<usize> {
        let mut seen: FxHashSet<usize> = self.oversized.iter().copied().collect();

        if let (Some(min), Some(max)) =
            (self.cell_coords(window.min()), self.cell_coords(window.max()))
        {
            for cx in min.0..=max.0 {
                for cy in min.1..=max.1 {
                    if let Some(ids) = self.grid.get(&(cx, cy)) {
                        seen.extend(ids.iter().copied());
                    }
                }
            }
        }

        let mut result: Vec<usize> = seen.into_iter().collect();
        result.sort_unstable();
        result
    }

    /// Ids of items whose bounding box may lie within `distance` of `point`.
    pub fn query_around(&self, point: Coord<f64>, distance: f64) -> Vec<usize> {
        let d = distance.max(0.0);
        self.query(Rect::new(
            Coord { x: point.x - d, y: point.y - d },
            Coord { x: point.x + d, y: point.y + d },
        ))
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn cell_coords(&self, c: Coord<f64>) -> Option<(i64, i64)> {
        if !c.x.is_finite() || !c.y.is_finite() {
            return None;
        }
        Some((
            (c.x / self.cell_size).floor() as i64,
            (c.y / self.cell_size).floor() as i64,
        ))
    }
}
