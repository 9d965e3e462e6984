// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangulation engine facade used by the Delaunay generator.
//!
//! An engine is configured once, splits the domain into a grid of cells in
//! [`TriangulationEngine::initialize`], then writes the receivers and
//! triangles of one cell per [`TriangulationEngine::generate_cell`] call.
//! Cell calls take `&self`, so engines keep no mutable per-cell state and
//! cells may be processed in any order. The only shared state between cells
//! is the [`PkCounter`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use geo::Rect;
use noisegrid_core::{InputTables, SpatialDatabase, TableName};

use crate::error::Result;

/// Engine parameters of one Delaunay run.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangulationSettings {
    /// Maximum triangle area (m²).
    pub max_area: f64,
    /// No receiver within this distance of a road.
    pub road_width: f64,
    pub receiver_height: f64,
    /// Side length of a domain cell.
    pub max_cell_dist: f64,
    /// Allow receivers and triangles over building footprints.
    pub iso_surface_in_buildings: bool,
    /// Explicit domain. The engine derives one from its inputs when unset.
    pub fence: Option<Rect<f64>>,
    pub error_dump_folder: Option<PathBuf>,
}

/// Dimensions of the cell grid covering the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGrid {
    pub rows: u32,
    pub cols: u32,
}

impl CellGrid {
    pub fn len(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every cell, row by row.
    pub fn cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| CellIndex { row, col }))
    }

    /// `CELL_ID` of a cell.
    pub fn cell_id(&self, cell: CellIndex) -> i64 {
        cell.row as i64 * self.cols as i64 + cell.col as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellIndex {
    pub row: u32,
    pub col: u32,
}

/// Output tables of a Delaunay run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTables {
    pub receivers: TableName,
    pub triangles: TableName,
}

/// Primary-key source shared by every cell of a run.
///
/// Receiver and triangle keys are drawn from separate sequences, both
/// starting at 1. Increments are atomic, so the counter can be shared by
/// cells processed on several threads.
#[derive(Debug, Default)]
pub struct PkCounter {
    receivers: AtomicI64,
    triangles: AtomicI64,
}

impl PkCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn next_receiver(&self) -> i64 {
        self.receivers.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    pub fn next_triangle(&self) -> i64 {
        self.triangles.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Keys handed out so far, as `(receivers, triangles)`.
    pub fn issued(&self) -> (i64, i64) {
        (
            self.receivers.load(Ordering::Relaxed),
            self.triangles.load(Ordering::Relaxed),
        )
    }
}

/// Adaptive mesh generator consumed by [`crate::DelaunayGridGenerator`].
pub trait TriangulationEngine {
    /// Reads the inputs and sizes the cell grid. Called once per run.
    fn initialize<D>(
        &mut self,
        db: &D,
        tables: &InputTables,
        settings: &TriangulationSettings,
    ) -> Result<CellGrid>
    where
        D: SpatialDatabase + ?Sized;

    /// Triangulates one cell and appends its receivers and triangles to the
    /// output tables, drawing keys from `pks`.
    fn generate_cell<D>(
        &self,
        db: &mut D,
        cell: CellIndex,
        output: &CellTables,
        pks: &PkCounter,
    ) -> Result<()>
    where
        D: SpatialDatabase + ?Sized;

    /// Writes the input geometries of `cell` to `folder` for postmortem
    /// inspection. Returns the written file.
    fn dump_cell(&self, cell: CellIndex, folder: &Path) -> Result<PathBuf>;
}
