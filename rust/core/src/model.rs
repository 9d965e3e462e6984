// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rows stored in the spatial database: buildings, sources, receivers and
//! triangles.

use std::fmt;

use geo::{MultiLineString, Polygon};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Spatial reference system identifier (EPSG code). `0` means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Srid(pub i32);

impl Srid {
    pub const UNDEFINED: Srid = Srid(0);
    pub const WGS84: Srid = Srid(4326);
    pub const WEB_MERCATOR: Srid = Srid(3857);
    /// Deprecated EPSG alias of Web Mercator, still found in old datasets.
    pub const WEB_MERCATOR_LEGACY: Srid = Srid(3785);

    #[inline]
    pub fn is_defined(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Building footprint with its height in meters.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub pk: i64,
    pub footprint: Polygon<f64>,
    pub height: f64,
}

/// Road (or other source) geometry, used only for exclusion buffering.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceGeometry {
    pub pk: i64,
    pub geometry: MultiLineString<f64>,
    /// Height of the source line above ground, if the geometry carried one.
    pub z: Option<f64>,
}

/// Column layout of a receivers table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiverKind {
    /// `(PK, THE_GEOM)` only, as written by the Delaunay generator.
    Plain,
    /// `ID_COL`, `ID_ROW` of the regular grid.
    Grid,
    /// `BUILD_PK` of the 2D facade grid.
    Facade,
    /// `LEVEL`, `PK_BUILDING`, `STACK_ID` of the 3D facade grid.
    Stacked,
}

impl ReceiverKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReceiverKind::Plain => "plain receivers",
            ReceiverKind::Grid => "grid receivers",
            ReceiverKind::Facade => "facade receivers",
            ReceiverKind::Stacked => "stacked facade receivers",
        }
    }
}

/// Generator-specific receiver columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiverTags {
    None,
    Grid { id_col: i64, id_row: i64 },
    Facade { build_pk: i64 },
    Stacked { pk_building: i64, level: u32, stack_id: i64 },
}

impl ReceiverTags {
    pub fn kind(&self) -> ReceiverKind {
        match self {
            ReceiverTags::None => ReceiverKind::Plain,
            ReceiverTags::Grid { .. } => ReceiverKind::Grid,
            ReceiverTags::Facade { .. } => ReceiverKind::Facade,
            ReceiverTags::Stacked { .. } => ReceiverKind::Stacked,
        }
    }

    /// Owning building, for facade receivers.
    pub fn building_pk(&self) -> Option<i64> {
        match *self {
            ReceiverTags::Facade { build_pk } => Some(build_pk),
            ReceiverTags::Stacked { pk_building, .. } => Some(pk_building),
            _ => None,
        }
    }
}

/// Evaluation point for the propagation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    pub pk: i64,
    pub position: Point3<f64>,
    pub tags: ReceiverTags,
}

impl Receiver {
    pub fn new(pk: i64, position: Point3<f64>, tags: ReceiverTags) -> Self {
        Self { pk, position, tags }
    }

    /// Both planar coordinates are finite numbers.
    #[inline]
    pub fn has_finite_xy(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite()
    }

    #[inline]
    pub fn point_2d(&self) -> geo::Point<f64> {
        geo::Point::new(self.position.x, self.position.y)
    }
}

/// Mesh triangle over three receivers, used for downstream contouring.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub pk: i64,
    /// Convex hull of the three receiver points.
    pub geometry: Polygon<f64>,
    pub pk_1: i64,
    pub pk_2: i64,
    pub pk_3: i64,
    pub cell_id: i64,
}

impl Triangle {
    #[inline]
    pub fn vertex_keys(&self) -> [i64; 3] {
        [self.pk_1, self.pk_2, self.pk_3]
    }
}
