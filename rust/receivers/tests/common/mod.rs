// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixtures shared by the generator tests.

#![allow(dead_code)]

use geo::{polygon, LineString, MultiLineString};
use noisegrid_core::{
    Building, GridConfig, GridSettings, InputTables, MemoryDatabase, SourceGeometry,
    SpatialDatabase, Srid, TableName,
};

pub const LAMBERT_93: Srid = Srid(2154);

pub fn table(name: &str) -> TableName {
    TableName::parse(name).unwrap()
}

/// Axis-aligned rectangular building.
pub fn building(pk: i64, x: f64, y: f64, w: f64, h: f64, height: f64) -> Building {
    Building {
        pk,
        footprint: polygon![
            (x: x, y: y),
            (x: x + w, y: y),
            (x: x + w, y: y + h),
            (x: x, y: y + h),
        ],
        height,
    }
}

pub fn road(pk: i64, coords: Vec<(f64, f64)>) -> SourceGeometry {
    SourceGeometry {
        pk,
        geometry: MultiLineString::new(vec![LineString::from(coords)]),
        z: Some(0.05),
    }
}

/// Database with `BUILDINGS` and `ROADS` staged in `srid`.
pub fn database(srid: Srid, buildings: Vec<Building>, roads: Vec<SourceGeometry>) -> MemoryDatabase {
    let mut db = MemoryDatabase::new();
    db.create_buildings_table(&table("BUILDINGS"), srid, buildings)
        .unwrap();
    db.create_sources_table(&table("ROADS"), srid, roads).unwrap();
    db
}

pub fn tables() -> InputTables {
    InputTables::default().with_sources(table("ROADS"))
}

pub fn config(json: &str) -> GridConfig {
    GridSettings::from_json(json)
        .unwrap()
        .into_config(&tables())
        .unwrap()
}
