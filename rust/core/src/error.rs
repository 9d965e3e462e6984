// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the data model and the spatial database facade.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by configuration handling and database access.
#[derive(Error, Debug)]
pub enum Error {
    /// A table or column name failed identifier validation.
    #[error("invalid identifier '{0}': expected [schema.]name made of letters, digits and '_'")]
    InvalidIdentifier(String),

    /// The resolved spatial reference system cannot be used for metric work.
    #[error("invalid SRID: {0}. Please use a metric projection system")]
    InvalidSrid(i32),

    /// A fence was required but no source for it was available.
    #[error("no fence geometry or reference table provided")]
    MissingFence,

    /// The fence WKT could not be parsed.
    #[error("invalid WKT fence: {0}")]
    InvalidWkt(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    /// The table exists but holds a different kind of rows.
    #[error("table {table} holds {actual}, expected {expected}")]
    TableKind {
        table: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("duplicate primary key {pk} in table {table}")]
    DuplicateKey { table: String, pk: i64 },

    /// A triangle references a receiver that is not in the receivers table.
    #[error("triangle {triangle} references unknown receiver {receiver}")]
    UnknownReceiver { triangle: i64, receiver: i64 },

    /// Receiver tags do not match the table's receiver kind.
    #[error("receiver {pk} does not match the {expected} schema of table {table}")]
    ReceiverSchema {
        table: String,
        pk: i64,
        expected: &'static str,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
