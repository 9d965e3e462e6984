// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Grid configuration.
//!
//! [`GridSettings`] is what a caller sends (every field optional, defaults
//! filled in by serde). [`GridSettings::into_config`] validates it once and
//! turns it into an immutable per-generator [`GridConfig`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifier::TableName;
use crate::wkt::{parse_fence, FenceGeometry};

/// Receiver grid flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GridType {
    #[default]
    #[serde(rename = "REGULAR", alias = "regular")]
    Regular,
    #[serde(rename = "DELAUNAY", alias = "delaunay")]
    Delaunay,
    #[serde(rename = "BUILDINGS_2D", alias = "buildings_2d")]
    Buildings2d,
    #[serde(rename = "BUILDINGS_3D", alias = "buildings_3d")]
    Buildings3d,
}

impl GridType {
    #[inline]
    pub fn is_building_grid(self) -> bool {
        matches!(self, GridType::Buildings2d | GridType::Buildings3d)
    }
}

fn default_height() -> f64 {
    4.0
}
fn default_max_area() -> f64 {
    2500.0
}
fn default_max_cell_dist() -> f64 {
    600.0
}
fn default_road_width() -> f64 {
    2.0
}
fn default_delta() -> f64 {
    10.0
}
fn default_distance_from_wall() -> f64 {
    2.0
}
fn default_receiver_distance() -> f64 {
    10.0
}
fn default_height_between_levels() -> f64 {
    2.5
}
fn default_true() -> bool {
    true
}

/// User-facing grid settings, merged with system defaults on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSettings {
    #[serde(default)]
    pub grid_type: GridType,
    /// Receiver height for regular, Delaunay and 2D facade grids (meters).
    #[serde(
        default = "default_height",
        alias = "height",
        alias = "receiver_height_2d"
    )]
    pub calculation_height: f64,
    /// Maximum triangle area of the Delaunay mesh (m²).
    #[serde(default = "default_max_area")]
    pub max_area: f64,
    /// Cell size for Delaunay domain decomposition (meters).
    #[serde(default = "default_max_cell_dist")]
    pub max_cell_dist: f64,
    /// Receiver-free buffer around roads in the Delaunay mesh (meters).
    #[serde(default = "default_road_width")]
    pub road_width: f64,
    /// Regular grid spacing (meters).
    #[serde(default = "default_delta")]
    pub delta: f64,
    #[serde(default = "default_distance_from_wall")]
    pub distance_from_wall: f64,
    /// Receiver spacing along a facade line (meters).
    #[serde(default = "default_receiver_distance")]
    pub receiver_distance: f64,
    #[serde(default = "default_height_between_levels")]
    pub height_between_levels_3d: f64,
    #[serde(default = "default_true")]
    pub create_triangles: bool,
    #[serde(default)]
    pub iso_surface_in_buildings: bool,
    /// Pivot 3D facade results into one feature per receiver column.
    #[serde(default = "default_true")]
    pub join_receivers_by_xy_location_3d: bool,
    #[serde(default)]
    pub fence_wkt: Option<String>,
    #[serde(default)]
    pub fence_table: Option<TableName>,
    #[serde(default)]
    pub error_dump_folder: Option<PathBuf>,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            grid_type: GridType::default(),
            calculation_height: default_height(),
            max_area: default_max_area(),
            max_cell_dist: default_max_cell_dist(),
            road_width: default_road_width(),
            delta: default_delta(),
            distance_from_wall: default_distance_from_wall(),
            receiver_distance: default_receiver_distance(),
            height_between_levels_3d: default_height_between_levels(),
            create_triangles: true,
            iso_surface_in_buildings: false,
            join_receivers_by_xy_location_3d: true,
            fence_wkt: None,
            fence_table: None,
            error_dump_folder: None,
        }
    }
}

fn positive(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::InvalidConfig(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

impl GridSettings {
    /// Parse settings from JSON, applying defaults for missing fields.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: GridSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Range checks on every numeric option.
    pub fn validate(&self) -> Result<()> {
        positive("calculation_height", self.calculation_height)?;
        positive("max_area", self.max_area)?;
        positive("max_cell_dist", self.max_cell_dist)?;
        positive("road_width", self.road_width)?;
        positive("delta", self.delta)?;
        positive("distance_from_wall", self.distance_from_wall)?;
        positive("receiver_distance", self.receiver_distance)?;
        positive("height_between_levels_3d", self.height_between_levels_3d)?;
        Ok(())
    }

    /// Fence priority: explicit WKT, then fence table, then buildings envelope.
    pub fn fence(&self) -> Result<FenceSpec> {
        if let Some(wkt) = &self.fence_wkt {
            return Ok(FenceSpec::Wkt(parse_fence(wkt)?));
        }
        if let Some(table) = &self.fence_table {
            return Ok(FenceSpec::TableEnvelope(table.clone()));
        }
        Ok(FenceSpec::BuildingsEnvelope)
    }

    /// Validate and freeze into the configuration of the selected generator.
    pub fn into_config(self, tables: &InputTables) -> Result<GridConfig> {
        self.validate()?;
        let tables = tables.clone();

        Ok(match self.grid_type {
            GridType::Regular => GridConfig::Regular(RegularGridConfig {
                fence: self.fence()?,
                fence_table: self.fence_table.clone(),
                delta: self.delta,
                height: self.calculation_height,
                create_triangles: self.create_triangles,
                tables,
            }),
            GridType::Delaunay => GridConfig::Delaunay(DelaunayGridConfig {
                fence: self.fence()?,
                fence_table: self.fence_table.clone(),
                max_area: self.max_area,
                max_cell_dist: self.max_cell_dist,
                road_width: self.road_width,
                height: self.calculation_height,
                iso_surface_in_buildings: self.iso_surface_in_buildings,
                error_dump_folder: self.error_dump_folder.clone(),
                tables,
            }),
            GridType::Buildings2d => GridConfig::Buildings2d(BuildingGridConfig2d {
                distance_from_wall: self.distance_from_wall,
                receiver_distance: self.receiver_distance,
                height: self.calculation_height,
                tables,
            }),
            GridType::Buildings3d => GridConfig::Buildings3d(BuildingGridConfig3d {
                distance_from_wall: self.distance_from_wall,
                receiver_distance: self.receiver_distance,
                height_between_levels: self.height_between_levels_3d,
                join_by_stack_id: self.join_receivers_by_xy_location_3d,
                tables,
            }),
        })
    }
}

/// Facade-noise calculations need explicit building grid settings.
pub fn building_grid_config(
    settings: Option<&GridSettings>,
    tables: &InputTables,
) -> Result<GridConfig> {
    let settings = settings.ok_or_else(|| {
        Error::InvalidConfig(
            "building grid settings are required for calculating emissions on building facades"
                .to_string(),
        )
    })?;
    if !settings.grid_type.is_building_grid() {
        return Err(Error::InvalidConfig(format!(
            "grid type {:?} is not a building grid",
            settings.grid_type
        )));
    }
    settings.clone().into_config(tables)
}

/// Where the receiver extent comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum FenceSpec {
    /// User-supplied polygon; receivers outside it are removed.
    Wkt(FenceGeometry),
    /// Envelope of a named table.
    TableEnvelope(TableName),
    /// Envelope of the buildings table.
    BuildingsEnvelope,
}

impl FenceSpec {
    /// Whether a true polygon (not just an envelope) bounds the receivers.
    #[inline]
    pub fn is_explicit(&self) -> bool {
        matches!(self, FenceSpec::Wkt(_))
    }
}

fn default_buildings_table() -> TableName {
    TableName::builtin("BUILDINGS")
}
fn default_receivers_table() -> TableName {
    TableName::builtin("RECEIVERS")
}
fn default_triangles_table() -> TableName {
    TableName::builtin("TRIANGLES")
}

/// Names of the tables a generator reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTables {
    #[serde(default = "default_buildings_table")]
    pub buildings: TableName,
    #[serde(default)]
    pub sources: Option<TableName>,
    #[serde(default = "default_receivers_table")]
    pub receivers: TableName,
    #[serde(default = "default_triangles_table")]
    pub triangles: TableName,
}

impl Default for InputTables {
    fn default() -> Self {
        Self {
            buildings: default_buildings_table(),
            sources: None,
            receivers: default_receivers_table(),
            triangles: default_triangles_table(),
        }
    }
}

impl InputTables {
    pub fn with_sources(mut self, sources: TableName) -> Self {
        self.sources = Some(sources);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegularGridConfig {
    pub tables: InputTables,
    pub fence: FenceSpec,
    /// Also consulted for the SRID when buildings and sources carry none.
    pub fence_table: Option<TableName>,
    pub delta: f64,
    pub height: f64,
    pub create_triangles: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelaunayGridConfig {
    pub tables: InputTables,
    pub fence: FenceSpec,
    pub fence_table: Option<TableName>,
    pub max_area: f64,
    pub max_cell_dist: f64,
    pub road_width: f64,
    pub height: f64,
    pub iso_surface_in_buildings: bool,
    pub error_dump_folder: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingGridConfig2d {
    pub tables: InputTables,
    pub distance_from_wall: f64,
    pub receiver_distance: f64,
    /// Receiver height, also the occlusion threshold for neighbours.
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingGridConfig3d {
    pub tables: InputTables,
    pub distance_from_wall: f64,
    pub receiver_distance: f64,
    pub height_between_levels: f64,
    pub join_by_stack_id: bool,
}

/// Frozen configuration of one generator run.
#[derive(Debug, Clone, PartialEq)]
pub enum GridConfig {
    Regular(RegularGridConfig),
    Delaunay(DelaunayGridConfig),
    Buildings2d(BuildingGridConfig2d),
    Buildings3d(BuildingGridConfig3d),
}

impl GridConfig {
    pub fn grid_type(&self) -> GridType {
        match self {
            GridConfig::Regular(_) => GridType::Regular,
            GridConfig::Delaunay(_) => GridType::Delaunay,
            GridConfig::Buildings2d(_) => GridType::Buildings2d,
            GridConfig::Buildings3d(_) => GridType::Buildings3d,
        }
    }

    pub fn tables(&self) -> &InputTables {
        match self {
            GridConfig::Regular(c) => &c.tables,
            GridConfig::Delaunay(c) => &c.tables,
            GridConfig::Buildings2d(c) => &c.tables,
            GridConfig::Buildings3d(c) => &c.tables,
        }
    }

    /// Fence table name, if the configuration names one.
    pub fn fence_table(&self) -> Option<&TableName> {
        match self {
            GridConfig::Regular(c) => c.fence_table.as_ref(),
            GridConfig::Delaunay(c) => c.fence_table.as_ref(),
            _ => None,
        }
    }
}
