// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pivoting of stacked facade results.
//!
//! Propagation returns one level per receiver. Receivers sharing a stack id
//! form one vertical column; the pivot turns each column into a single 2D
//! point carrying one `laeq_level_<z>` property per level.

use geo::Coord;
use nalgebra::Point3;
use rustc_hash::FxHashMap;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{GridError, Result};

pub const STACK_ID_PROPERTY: &str = "STACK_ID";
pub const LEVEL_PROPERTY: &str = "LAEQ";

/// Noise level computed at one stacked receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelValue {
    pub stack_id: i64,
    pub position: Point3<f64>,
    pub value: f64,
}

/// One vertical column of receivers.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedColumn {
    pub stack_id: i64,
    /// Planar position of the first level seen.
    pub position: Coord<f64>,
    /// `(z, value)` pairs in input order.
    pub levels: Vec<(f64, f64)>,
}

/// Groups levels by stack id. Columns come out in first-seen order.
pub fn join_by_stack_id<I>(values: I) -> Vec<StackedColumn>
where
    I: IntoIterator<Item = LevelValue>,
{
    let mut slots: FxHashMap<i64, usize> = FxHashMap::default();
    let mut columns: Vec<StackedColumn> = Vec::new();

    for v in values {
        let slot = *slots.entry(v.stack_id).or_insert_with(|| {
            columns.push(StackedColumn {
                stack_id: v.stack_id,
                position: Coord { x: v.position.x, y: v.position.y },
                levels: Vec::new(),
            });
            columns.len() - 1
        });
        columns[slot].levels.push((v.position.z, v.value));
    }

    debug!(columns = columns.len(), "levels joined by stack id");
    columns
}

/// Property name of the level at height `z`, e.g. `laeq_level_4.0`.
pub fn level_property(z: f64) -> String {
    if z.is_finite() && z.fract() == 0.0 && z.abs() < 1e16 {
        format!("laeq_level_{z:.1}")
    } else {
        format!("laeq_level_{z}")
    }
}

impl StackedColumn {
    /// GeoJSON feature with a 2D point geometry.
    pub fn to_feature(&self) -> Value {
        let mut properties = Map::new();
        properties.insert(STACK_ID_PROPERTY.to_owned(), json!(self.stack_id));
        for (z, value) in &self.levels {
            properties.insert(level_property(*z), json!(value));
        }
        json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [self.position.x, self.position.y],
            },
            "properties": properties,
        })
    }
}

pub fn to_feature_collection(columns: &[StackedColumn]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": columns.iter().map(StackedColumn::to_feature).collect::<Vec<_>>(),
    })
}

/// Pivots a FeatureCollection of 3D points carrying `STACK_ID` and `LAEQ`
/// properties.
pub fn join_feature_collection(collection: &Value) -> Result<Value> {
    let features = collection
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| GridError::Config("expected a GeoJSON FeatureCollection".into()))?;

    let mut values = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        values.push(level_value(feature).ok_or_else(|| {
            GridError::Config(format!(
                "feature {i} needs a 3D Point geometry with {STACK_ID_PROPERTY} and \
                 {LEVEL_PROPERTY} properties"
            ))
        })?);
    }
    Ok(to_feature_collection(&join_by_stack_id(values)))
}

fn level_value(feature: &Value) -> Option<LevelValue> {
    let geometry = feature.get("geometry")?;
    if geometry.get("type")?.as_str()? != "Point" {
        return None;
    }
    let coords = geometry.get("coordinates")?.as_array()?;
    let [x, y, z] = [coords.first()?, coords.get(1)?, coords.get(2)?].map(Value::as_f64);
    let properties = feature.get("properties")?;
    Some(LevelValue {
        stack_id: properties.get(STACK_ID_PROPERTY)?.as_i64()?,
        position: Point3::new(x?, y?, z?),
        value: properties.get(LEVEL_PROPERTY)?.as_f64()?,
    })
}
