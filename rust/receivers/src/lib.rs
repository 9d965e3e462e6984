// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # NoiseGrid Receivers
//!
//! Receiver grid generators for traffic-noise propagation. Each generator
//! reads buildings (and optionally road sources) from a [`SpatialDatabase`],
//! places receivers and writes them to a fresh receivers table in the
//! working SRID.
//!
//! ## Generators
//!
//! - [`RegularGridGenerator`]: cell centres of a regular raster over the
//!   fence, optionally meshed into triangles
//! - [`DelaunayGridGenerator`]: per-cell refined triangulation through a
//!   [`TriangulationEngine`] ([`SpadeTriangulator`] is built in)
//! - [`BuildingGridGenerator2d`]: facade receivers at one height, truncated
//!   where taller neighbours stand in front of the facade
//! - [`BuildingGridGenerator3d`]: facade receivers stacked over levels,
//!   tagged with a stack id for [`join_by_stack_id`]
//!
//! [`ReceiverGridService`] picks the generator from a [`GridConfig`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use noisegrid_core::{no_progress, GridSettings, InputTables, MemoryDatabase, TableName};
//! use noisegrid_receivers::{ReceiverGridService, SpadeTriangulator};
//!
//! let mut db = MemoryDatabase::new();
//! // ... stage BUILDINGS and ROADS ...
//! let config = GridSettings::from_json(r#"{"grid_type": "BUILDINGS_2D"}"#)?
//!     .into_config(&InputTables::default().with_sources(TableName::parse("ROADS")?))?;
//! let mut engine = SpadeTriangulator::new();
//! let output = ReceiverGridService::new(&mut db, &mut engine).generate(&config, &no_progress)?;
//! println!("{} receivers in {}", output.receiver_count, output.receivers);
//! ```
//!
//! [`SpatialDatabase`]: noisegrid_core::SpatialDatabase
//! [`GridConfig`]: noisegrid_core::GridConfig

pub mod delaunay;
pub mod engine;
pub mod error;
pub mod exclusion;
pub mod facade;
pub mod facade_2d;
pub mod facade_3d;
pub mod fence;
pub mod output;
pub mod regular;
pub mod service;
pub mod spade_engine;
pub mod srid;
pub mod stack;

pub use delaunay::DelaunayGridGenerator;
pub use engine::{
    CellGrid, CellIndex, CellTables, PkCounter, TriangulationEngine, TriangulationSettings,
};
pub use error::{GridError, Result};
pub use exclusion::{delete_near_sources, ProximityMask, EXCLUSION_DISTANCE};
pub use facade::{
    merge_lines, truncate_lines, OcclusionRelations, ReceiverLine, ReceiverLines, TruncatedLine,
};
pub use facade_2d::BuildingGridGenerator2d;
pub use facade_3d::{level_heights, BuildingGridGenerator3d, MAX_LEVELS, MIN_RECEIVER_HEIGHT};
pub use fence::{resolve_fence, ResolvedFence};
pub use output::GridOutput;
pub use regular::{grid_triangles, RegularGridGenerator, MAX_GRID_POINTS};
pub use service::ReceiverGridService;
pub use spade_engine::SpadeTriangulator;
pub use srid::{ensure_metric, fence_in_srid, resolve_srid};
pub use stack::{
    join_by_stack_id, join_feature_collection, level_property, to_feature_collection, LevelValue,
    StackedColumn,
};
