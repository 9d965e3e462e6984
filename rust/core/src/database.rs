// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed facade over the spatial database.
//!
//! Generators only ever talk to the database through this trait: table
//! reads come back as typed rows, writes go in as typed rows, and every
//! table is addressed by a validated [`TableName`]. Geometry processing
//! happens in the generators, so the facade needs no SQL surface.

use geo::Rect;

use crate::error::Result;
use crate::identifier::TableName;
use crate::model::{Building, Receiver, ReceiverKind, SourceGeometry, Srid, Triangle};

/// Table-oriented access to a spatial database connection.
///
/// All calls are synchronous. One connection is owned per calculation run
/// and must not be shared between simultaneous runs.
pub trait SpatialDatabase {
    fn has_table(&self, table: &TableName) -> bool;

    /// SRID of the table's geometry column. `Srid::UNDEFINED` when unset.
    fn srid(&self, table: &TableName) -> Result<Srid>;

    /// Envelope of every geometry in the table, `None` for an empty table.
    fn envelope(&self, table: &TableName) -> Result<Option<Rect<f64>>>;

    /// `DROP TABLE IF EXISTS`. Returns whether a table was removed.
    fn drop_table(&mut self, table: &TableName) -> Result<bool>;

    fn create_buildings_table(
        &mut self,
        table: &TableName,
        srid: Srid,
        buildings: Vec<Building>,
    ) -> Result<()>;

    fn create_sources_table(
        &mut self,
        table: &TableName,
        srid: Srid,
        sources: Vec<SourceGeometry>,
    ) -> Result<()>;

    fn buildings(&self, table: &TableName) -> Result<Vec<Building>>;

    fn sources(&self, table: &TableName) -> Result<Vec<SourceGeometry>>;

    /// Creates an empty receivers table with the columns of `kind`.
    fn create_receivers_table(
        &mut self,
        table: &TableName,
        kind: ReceiverKind,
        srid: Srid,
    ) -> Result<()>;

    /// Batch insert. Primary keys must be unique within the table.
    fn insert_receivers(&mut self, table: &TableName, receivers: Vec<Receiver>) -> Result<()>;

    fn receivers(&self, table: &TableName) -> Result<Vec<Receiver>>;

    /// Receivers whose position falls inside `window`. Uses the spatial
    /// index when one was created.
    fn receivers_in(&self, table: &TableName, window: Rect<f64>) -> Result<Vec<Receiver>>;

    /// Deletes the receivers with the given keys, returning how many went.
    fn delete_receivers(&mut self, table: &TableName, pks: &[i64]) -> Result<usize>;

    fn create_triangles_table(&mut self, table: &TableName, srid: Srid) -> Result<()>;

    /// Batch insert. Every vertex key must reference a receiver in
    /// `receivers_table`.
    fn insert_triangles(
        &mut self,
        table: &TableName,
        receivers_table: &TableName,
        triangles: Vec<Triangle>,
    ) -> Result<()>;

    fn triangles(&self, table: &TableName) -> Result<Vec<Triangle>>;

    /// `CREATE SPATIAL INDEX ON table(THE_GEOM)`.
    fn create_spatial_index(&mut self, table: &TableName) -> Result<()>;

    fn has_spatial_index(&self, table: &TableName) -> bool;
}
