// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # NoiseGrid Core
//!
//! Shared foundation of the receiver-grid workspace: the row types stored in
//! the spatial database, the grid configuration records, and the
//! [`SpatialDatabase`] facade every generator talks to.
//!
//! ## Overview
//!
//! - **Data model**: [`Building`], [`SourceGeometry`], [`Receiver`],
//!   [`Triangle`] and the [`Srid`] newtype
//! - **Configuration**: [`GridSettings`] deserialized from JSON with
//!   defaults, frozen into a per-generator [`GridConfig`]
//! - **Identifiers**: every table name is a validated [`TableName`]
//! - **Fences**: WKT / EWKT polygon parsing with [nom](https://docs.rs/nom)
//! - **Storage**: the [`SpatialDatabase`] trait and [`MemoryDatabase`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use noisegrid_core::{GridSettings, InputTables};
//!
//! let settings = GridSettings::from_json(r#"{"grid_type": "BUILDINGS_2D"}"#)?;
//! let config = settings.into_config(&InputTables::default())?;
//! assert_eq!(config.tables().receivers.name(), "RECEIVERS");
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod identifier;
pub mod memory;
pub mod model;
pub mod progress;
pub mod spatial;
pub mod wkt;

pub use config::{
    building_grid_config, BuildingGridConfig2d, BuildingGridConfig3d, DelaunayGridConfig,
    FenceSpec, GridConfig, GridSettings, GridType, InputTables, RegularGridConfig,
};
pub use database::SpatialDatabase;
pub use error::{Error, Result};
pub use identifier::TableName;
pub use memory::MemoryDatabase;
pub use model::{
    Building, Receiver, ReceiverKind, ReceiverTags, SourceGeometry, Srid, Triangle,
};
pub use progress::{no_progress, percent, ProgressCallback};
pub use spatial::SpatialIndex;
pub use wkt::{parse_fence, FenceGeometry};

pub use geo;
pub use nalgebra::Point3;
