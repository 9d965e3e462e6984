// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory implementation of [`SpatialDatabase`].
//!
//! Holds every table as typed rows. Used by the CLI after GeoJSON staging
//! and by tests; it enforces the same constraints a real spatial database
//! would (unique keys, triangle foreign keys, column layout per table).

use geo::{BoundingRect, Coord, Rect};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::database::SpatialDatabase;
use crate::error::{Error, Result};
use crate::identifier::TableName;
use crate::model::{Building, Receiver, ReceiverKind, SourceGeometry, Srid, Triangle};
use crate::spatial::SpatialIndex;

/// Cell size of the receiver index, in CRS units.
const INDEX_CELL_SIZE: f64 = 25.0;

#[derive(Debug, Clone)]
enum Rows {
    Buildings(Vec<Building>),
    Sources(Vec<SourceGeometry>),
    Receivers {
        kind: ReceiverKind,
        rows: Vec<Receiver>,
        pks: FxHashSet<i64>,
    },
    Triangles {
        rows: Vec<Triangle>,
        pks: FxHashSet<i64>,
    },
}

impl Rows {
    fn label(&self) -> &'static str {
        match self {
            Rows::Buildings(_) => "buildings",
            Rows::Sources(_) => "sources",
            Rows::Receivers { kind, .. } => kind.as_str(),
            Rows::Triangles { .. } => "triangles",
        }
    }

    fn bounding_rects(&self) -> Vec<Option<Rect<f64>>> {
        match self {
            Rows::Buildings(rows) => rows.iter().map(|b| b.footprint.bounding_rect()).collect(),
            Rows::Sources(rows) => rows.iter().map(|s| s.geometry.bounding_rect()).collect(),
            Rows::Receivers { rows, .. } => rows
                .iter()
                .map(|r| {
                    let c = Coord { x: r.position.x, y: r.position.y };
                    Some(Rect::new(c, c))
                })
                .collect(),
            Rows::Triangles { rows, .. } => {
                rows.iter().map(|t| t.geometry.bounding_rect()).collect()
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Table {
    srid: Srid,
    rows: Rows,
    index: Option<SpatialIndex>,
}

impl Table {
    fn new(srid: Srid, rows: Rows) -> Self {
        Self { srid, rows, index: None }
    }

    fn rebuild_index(&mut self) {
        if self.index.is_none() {
            return;
        }
        let mut index = SpatialIndex::new(INDEX_CELL_SIZE);
        for (id, rect) in self.rows.bounding_rects().into_iter().enumerate() {
            if let Some(rect) = rect {
                index.insert(id, rect);
            }
        }
        self.index = Some(index);
    }
}

/// Table store living in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: FxHashMap<TableName, Table>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Vec<TableName> {
        let mut names: Vec<TableName> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    fn table(&self, name: &TableName) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &TableName) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    fn create(&mut self, name: &TableName, table: Table) -> Result<()> {
        if self.tables.contains_key(name) {
            return Err(Error::TableExists(name.to_string()));
        }
        self.tables.insert(name.clone(), table);
        Ok(())
    }
}

fn kind_error(table: &TableName, expected: &'static str, rows: &Rows) -> Error {
    Error::TableKind {
        table: table.to_string(),
        expected,
        actual: rows.label(),
    }
}

impl SpatialDatabase for MemoryDatabase {
    fn has_table(&self, table: &TableName) -> bool {
        self.tables.contains_key(table)
    }

    fn srid(&self, table: &TableName) -> Result<Srid> {
        Ok(self.table(table)?.srid)
    }

    fn envelope(&self, table: &TableName) -> Result<Option<Rect<f64>>> {
        let rects = self.table(table)?.rows.bounding_rects();
        Ok(rects.into_iter().flatten().reduce(|a, b| {
            Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            )
        }))
    }

    fn drop_table(&mut self, table: &TableName) -> Result<bool> {
        Ok(self.tables.remove(table).is_some())
    }

    fn create_buildings_table(
        &mut self,
        table: &TableName,
        srid: Srid,
        buildings: Vec<Building>,
    ) -> Result<()> {
        let mut pks = FxHashSet::default();
        for b in &buildings {
            if !pks.insert(b.pk) {
                return Err(Error::DuplicateKey { table: table.to_string(), pk: b.pk });
            }
        }
        self.create(table, Table::new(srid, Rows::Buildings(buildings)))
    }

    fn create_sources_table(
        &mut self,
        table: &TableName,
        srid: Srid,
        sources: Vec<SourceGeometry>,
    ) -> Result<()> {
        let mut pks = FxHashSet::default();
        for s in &sources {
            if !pks.insert(s.pk) {
                return Err(Error::DuplicateKey { table: table.to_string(), pk: s.pk });
            }
        }
        self.create(table, Table::new(srid, Rows::Sources(sources)))
    }

    fn buildings(&self, table: &TableName) -> Result<Vec<Building>> {
        match &self.table(table)?.rows {
            Rows::Buildings(rows) => Ok(rows.clone()),
            other => Err(kind_error(table, "buildings", other)),
        }
    }

    fn sources(&self, table: &TableName) -> Result<Vec<SourceGeometry>> {
        match &self.table(table)?.rows {
            Rows::Sources(rows) => Ok(rows.clone()),
            other => Err(kind_error(table, "sources", other)),
        }
    }

    fn create_receivers_table(
        &mut self,
        table: &TableName,
        kind: ReceiverKind,
        srid: Srid,
    ) -> Result<()> {
        let rows = Rows::Receivers {
            kind,
            rows: Vec::new(),
            pks: FxHashSet::default(),
        };
        self.create(table, Table::new(srid, rows))
    }

    fn insert_receivers(&mut self, table: &TableName, receivers: Vec<Receiver>) -> Result<()> {
        let entry = self.table_mut(table)?;
        let (kind, rows, pks) = match &mut entry.rows {
            Rows::Receivers { kind, rows, pks } => (*kind, rows, pks),
            other => return Err(kind_error(table, "receivers", other)),
        };

        // Validate the whole batch before touching the table
        let mut batch_pks = FxHashSet::default();
        for r in &receivers {
            if r.tags.kind() != kind {
                return Err(Error::ReceiverSchema {
                    table: table.to_string(),
                    pk: r.pk,
                    expected: kind.as_str(),
                });
            }
            if pks.contains(&r.pk) || !batch_pks.insert(r.pk) {
                return Err(Error::DuplicateKey { table: table.to_string(), pk: r.pk });
            }
        }

        pks.extend(batch_pks);
        rows.extend(receivers);
        entry.rebuild_index();
        Ok(())
    }

    fn receivers(&self, table: &TableName) -> Result<Vec<Receiver>> {
        match &self.table(table)?.rows {
            Rows::Receivers { rows, .. } => Ok(rows.clone()),
            other => Err(kind_error(table, "receivers", other)),
        }
    }

    fn receivers_in(&self, table: &TableName, window: Rect<f64>) -> Result<Vec<Receiver>> {
        let entry = self.table(table)?;
        let rows = match &entry.rows {
            Rows::Receivers { rows, .. } => rows,
            other => return Err(kind_error(table, "receivers", other)),
        };

        let inside = |r: &Receiver| {
            let (min, max) = (window.min(), window.max());
            r.position.x >= min.x && r.position.x <= max.x && r.position.y >= min.y
                && r.position.y <= max.y
        };

        Ok(match &entry.index {
            Some(index) => index
                .query(window)
                .into_iter()
                .map(|id| &rows[id])
                .filter(|r| inside(r))
                .cloned()
                .collect(),
            None => rows.iter().filter(|r| inside(r)).cloned().collect(),
        })
    }

    fn delete_receivers(&mut self, table: &TableName, keys: &[i64]) -> Result<usize> {
        let entry = self.table_mut(table)?;
        let (rows, pks) = match &mut entry.rows {
            Rows::Receivers { rows, pks, .. } => (rows, pks),
            other => return Err(kind_error(table, "receivers", other)),
        };

        let doomed: FxHashSet<i64> = keys.iter().copied().filter(|pk| pks.contains(pk)).collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        rows.retain(|r| !doomed.contains(&r.pk));
        pks.retain(|pk| !doomed.contains(pk));
        entry.rebuild_index();
        Ok(doomed.len())
    }

    fn create_triangles_table(&mut self, table: &TableName, srid: Srid) -> Result<()> {
        let rows = Rows::Triangles {
            rows: Vec::new(),
            pks: FxHashSet::default(),
        };
        self.create(table, Table::new(srid, rows))
    }

    fn insert_triangles(
        &mut self,
        table: &TableName,
        receivers_table: &TableName,
        triangles: Vec<Triangle>,
    ) -> Result<()> {
        {
            let receiver_pks = match &self.table(receivers_table)?.rows {
                Rows::Receivers { pks, .. } => pks,
                other => return Err(kind_error(receivers_table, "receivers", other)),
            };
            for t in &triangles {
                if let Some(&missing) = t
                    .vertex_keys()
                    .iter()
                    .find(|pk| !receiver_pks.contains(pk))
                {
                    return Err(Error::UnknownReceiver { triangle: t.pk, receiver: missing });
                }
            }
        }

        let entry = self.table_mut(table)?;
        let (rows, pks) = match &mut entry.rows {
            Rows::Triangles { rows, pks } => (rows, pks),
            other => return Err(kind_error(table, "triangles", other)),
        };
        let mut batch_pks = FxHashSet::default();
        for t in &triangles {
            if pks.contains(&t.pk) || !batch_pks.insert(t.pk) {
                return Err(Error::DuplicateKey { table: table.to_string(), pk: t.pk });
            }
        }
        pks.extend(batch_pks);
        rows.extend(triangles);
        entry.rebuild_index();
        Ok(())
    }

    fn triangles(&self, table: &TableName) -> Result<Vec<Triangle>> {
        match &self.table(table)?.rows {
            Rows::Triangles { rows, .. } => Ok(rows.clone()),
            other => Err(kind_error(table, "triangles", other)),
        }
    }

    fn create_spatial_index(&mut self, table: &TableName) -> Result<()> {
        let entry = self.table_mut(table)?;
        entry.index = Some(SpatialIndex::new(INDEX_CELL_SIZE));
        entry.rebuild_index();
        Ok(())
    }

    fn has_spatial_index(&self, table: &TableName) -> bool {
        self.tables.get(table).is_some_and(|t| t.index.is_some())
    }
}
