// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use noisegrid_core::Srid;
use thiserror::Error;

/// Result type for grid generation.
pub type Result<T> = std::result::Result<T, GridError>;

/// Errors that abort a grid generation run.
#[derive(Error, Debug)]
pub enum GridError {
    /// Configuration and database errors, passed through unchanged.
    #[error(transparent)]
    Core(#[from] noisegrid_core::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// A fence could not be brought into the working SRID.
    #[error("cannot reproject fence from {from} to {to}: {message}")]
    Projection { from: Srid, to: Srid, message: String },

    /// The triangulation engine failed on one domain cell.
    #[error("triangulation failed in cell (row {row}, col {col}): {message}")]
    Triangulation { row: u32, col: u32, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GridError {
    /// Whether the error was raised before any table was touched.
    pub fn is_configuration(&self) -> bool {
        use noisegrid_core::Error as Core;
        matches!(
            self,
            GridError::Config(_)
                | GridError::Projection { .. }
                | GridError::Core(
                    Core::InvalidSrid(_)
                        | Core::InvalidIdentifier(_)
                        | Core::InvalidWkt(_)
                        | Core::InvalidConfig(_)
                        | Core::MissingFence
                )
        )
    }
}
