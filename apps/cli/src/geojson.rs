// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GeoJSON staging and export.
//!
//! Only what the generators need is read: building polygons with a height,
//! road lines, a fence polygon and the collection CRS.

use anyhow::{bail, Context, Result};
use noisegrid_core::geo::{Coord, LineString, MultiLineString, Polygon};
use noisegrid_core::{Building, Receiver, ReceiverTags, SourceGeometry, Srid, Triangle};
use serde_json::{json, Map, Value};

/// Height given to road lines that carry no z.
pub const DEFAULT_SOURCE_HEIGHT: f64 = 0.05;

const HEIGHT_PROPERTIES: [&str; 2] = ["height", "building_height"];

/// SRID declared in the collection's `crs` member.
///
/// Understands `EPSG:<n>`, `urn:ogc:def:crs:EPSG::<n>`, OGC URLs ending in
/// the code and `CRS84`.
pub fn collection_srid(collection: &Value) -> Option<Srid> {
    let name = collection
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?
        .trim();
    if name.to_ascii_uppercase().ends_with("CRS84") {
        return Some(Srid::WGS84);
    }
    let code = name.rsplit(|c| c == ':' || c == '/').next()?;
    code.parse().ok().map(Srid)
}

fn features(collection: &Value) -> Result<&Vec<Value>> {
    collection
        .get("features")
        .and_then(Value::as_array)
        .context("expected a GeoJSON FeatureCollection")
}

fn coord(value: &Value) -> Option<Coord<f64>> {
    let a = value.as_array()?;
    Some(Coord {
        x: a.first()?.as_f64()?,
        y: a.get(1)?.as_f64()?,
    })
}

fn line(value: &Value) -> Option<LineString<f64>> {
    value
        .as_array()?
        .iter()
        .map(coord)
        .collect::<Option<Vec<_>>>()
        .map(LineString::from)
}

fn polygon(value: &Value) -> Option<Polygon<f64>> {
    let mut rings = value.as_array()?.iter().map(line);
    let exterior = rings.next()??;
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}

/// Polygons of a Polygon or MultiPolygon geometry.
fn polygons(geometry: &Value) -> Option<Vec<Polygon<f64>>> {
    let coords = geometry.get("coordinates")?;
    match geometry.get("type")?.as_str()? {
        "Polygon" => Some(vec![polygon(coords)?]),
        "MultiPolygon" => coords.as_array()?.iter().map(polygon).collect(),
        _ => None,
    }
}

/// First z found in a coordinate tree.
fn first_z(value: &Value) -> Option<f64> {
    let a = value.as_array()?;
    match a.first()? {
        Value::Array(_) => a.iter().find_map(first_z),
        _ => a.get(2)?.as_f64(),
    }
}

/// Buildings of a FeatureCollection, one per polygon, keyed 1.. in order.
pub fn read_buildings(collection: &Value) -> Result<Vec<Building>> {
    let mut buildings = Vec::new();
    for (i, feature) in features(collection)?.iter().enumerate() {
        let geometry = feature
            .get("geometry")
            .with_context(|| format!("building feature {i} has no geometry"))?;
        let parts = polygons(geometry)
            .with_context(|| format!("building feature {i} is not a polygon"))?;
        let properties = feature.get("properties");
        let height = HEIGHT_PROPERTIES
            .iter()
            .find_map(|key| properties?.get(*key)?.as_f64())
            .with_context(|| format!("building feature {i} has no height"))?;
        for footprint in parts {
            buildings.push(Building {
                pk: buildings.len() as i64 + 1,
                footprint,
                height,
            });
        }
    }
    Ok(buildings)
}

/// Road lines of a FeatureCollection. Lines without z sit at
/// [`DEFAULT_SOURCE_HEIGHT`].
pub fn read_sources(collection: &Value) -> Result<Vec<SourceGeometry>> {
    let mut sources = Vec::new();
    for (i, feature) in features(collection)?.iter().enumerate() {
        let geometry = feature
            .get("geometry")
            .with_context(|| format!("road feature {i} has no geometry"))?;
        let coords = geometry.get("coordinates").unwrap_or(&Value::Null);
        let lines = match geometry.get("type").and_then(Value::as_str) {
            Some("LineString") => line(coords).map(|l| vec![l]),
            Some("MultiLineString") => coords
                .as_array()
                .and_then(|parts| parts.iter().map(line).collect()),
            _ => None,
        }
        .with_context(|| format!("road feature {i} is not a line"))?;

        sources.push(SourceGeometry {
            pk: i as i64 + 1,
            geometry: MultiLineString::new(lines),
            z: Some(first_z(coords).unwrap_or(DEFAULT_SOURCE_HEIGHT)),
        });
    }
    Ok(sources)
}

/// Fence layer as an EWKT multipolygon in `srid`.
pub fn fence_wkt(collection: &Value, srid: Srid) -> Result<String> {
    let mut parts = Vec::new();
    for (i, feature) in features(collection)?.iter().enumerate() {
        let geometry = feature
            .get("geometry")
            .with_context(|| format!("fence feature {i} has no geometry"))?;
        parts.extend(
            polygons(geometry).with_context(|| format!("fence feature {i} is not a polygon"))?,
        );
    }
    if parts.is_empty() {
        bail!("fence layer has no polygon");
    }

    let ring = |ls: &LineString<f64>| {
        let coords: Vec<String> = ls.coords().map(|c| format!("{} {}", c.x, c.y)).collect();
        format!("({})", coords.join(", "))
    };
    let polygons: Vec<String> = parts
        .iter()
        .map(|p| {
            let rings: Vec<String> = std::iter::once(p.exterior())
                .chain(p.interiors())
                .map(ring)
                .collect();
            format!("({})", rings.join(", "))
        })
        .collect();
    Ok(format!("SRID={};MULTIPOLYGON({})", srid.0, polygons.join(", ")))
}

fn crs_member(srid: Srid) -> Value {
    json!({ "type": "name", "properties": { "name": format!("EPSG:{}", srid.0) } })
}

fn receiver_properties(receiver: &Receiver) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("PK".into(), json!(receiver.pk));
    match receiver.tags {
        ReceiverTags::None => {}
        ReceiverTags::Grid { id_col, id_row } => {
            properties.insert("ID_COL".into(), json!(id_col));
            properties.insert("ID_ROW".into(), json!(id_row));
        }
        ReceiverTags::Facade { build_pk } => {
            properties.insert("BUILD_PK".into(), json!(build_pk));
        }
        ReceiverTags::Stacked { pk_building, level, stack_id } => {
            properties.insert("PK_BUILDING".into(), json!(pk_building));
            properties.insert("LEVEL".into(), json!(level));
            properties.insert("STACK_ID".into(), json!(stack_id));
        }
    }
    properties
}

/// Receivers as 3D points.
pub fn receivers_collection(receivers: &[Receiver], srid: Srid) -> Value {
    let features: Vec<Value> = receivers
        .iter()
        .map(|r| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [r.position.x, r.position.y, r.position.z],
                },
                "properties": receiver_properties(r),
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "crs": crs_member(srid), "features": features })
}

pub fn triangles_collection(triangles: &[Triangle], srid: Srid) -> Value {
    let features: Vec<Value> = triangles
        .iter()
        .map(|t| {
            let ring: Vec<[f64; 2]> = t.geometry.exterior().coords().map(|c| [c.x, c.y]).collect();
            json!({
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [ring] },
                "properties": {
                    "PK": t.pk,
                    "PK_1": t.pk_1,
                    "PK_2": t.pk_2,
                    "PK_3": t.pk_3,
                    "CELL_ID": t.cell_id,
                },
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "crs": crs_member(srid), "features": features })
}

#[cfg(test)]
mod tests {
    use super::*;
    use noisegrid_core::{parse_fence, Point3};

    fn collection(features: Value) -> Value {
        json!({ "type": "FeatureCollection", "features": features })
    }

    #[test]
    fn reads_crs_names() {
        let with = |name: &str| json!({ "crs": { "type": "name", "properties": { "name": name } } });
        assert_eq!(collection_srid(&with("EPSG:2154")), Some(Srid(2154)));
        assert_eq!(collection_srid(&with("urn:ogc:def:crs:EPSG::32631")), Some(Srid(32631)));
        assert_eq!(
            collection_srid(&with("http://www.opengis.net/def/crs/EPSG/0/3812")),
            Some(Srid(3812))
        );
        assert_eq!(collection_srid(&with("urn:ogc:def:crs:OGC:1.3:CRS84")), Some(Srid::WGS84));
        assert_eq!(collection_srid(&json!({})), None);
    }

    #[test]
    fn buildings_take_either_height_property() {
        let layer = collection(json!([
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 0]]]},
             "properties": {"height": 12.5}},
            {"type": "Feature",
             "geometry": {"type": "MultiPolygon", "coordinates": [
                 [[[20, 0], [30, 0], [30, 10], [20, 0]]],
                 [[[40, 0], [50, 0], [50, 10], [40, 0]]]
             ]},
             "properties": {"building_height": 6}}
        ]));
        let buildings = read_buildings(&layer).unwrap();
        assert_eq!(buildings.len(), 3);
        assert_eq!(buildings.iter().map(|b| b.pk).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(buildings[0].height, 12.5);
        assert_eq!(buildings[2].height, 6.0);
    }

    #[test]
    fn building_without_height_is_rejected() {
        let layer = collection(json!([
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 0]]]},
             "properties": {}}
        ]));
        assert!(read_buildings(&layer).is_err());
    }

    #[test]
    fn flat_roads_are_lifted() {
        let layer = collection(json!([
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [10, 0]]}},
            {"type": "Feature",
             "geometry": {"type": "MultiLineString", "coordinates": [[[0, 5, 1.0], [10, 5, 1.0]]]}}
        ]));
        let sources = read_sources(&layer).unwrap();
        assert_eq!(sources[0].z, Some(DEFAULT_SOURCE_HEIGHT));
        assert_eq!(sources[1].z, Some(1.0));
        assert_eq!(sources[1].pk, 2);
    }

    #[test]
    fn fence_layer_round_trips_through_wkt() {
        let layer = collection(json!([
            {"type": "Feature",
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [100, 0], [100, 50], [0, 50], [0, 0]]]}}
        ]));
        let wkt = fence_wkt(&layer, Srid(2154)).unwrap();
        let fence = parse_fence(&wkt).unwrap();
        assert_eq!(fence.srid, Some(Srid(2154)));
        assert_eq!(fence.geometry.0.len(), 1);
        assert_eq!(fence.geometry.0[0].exterior().0.len(), 5);
    }

    #[test]
    fn receivers_export_their_tags() {
        let receivers = vec![Receiver::new(
            3,
            Point3::new(1.0, 2.0, 4.5),
            ReceiverTags::Stacked { pk_building: 9, level: 1, stack_id: 2 },
        )];
        let out = receivers_collection(&receivers, Srid(2154));
        let feature = &out["features"][0];
        assert_eq!(feature["geometry"]["coordinates"], json!([1.0, 2.0, 4.5]));
        assert_eq!(feature["properties"]["PK"], json!(3));
        assert_eq!(feature["properties"]["STACK_ID"], json!(2));
        assert_eq!(out["crs"]["properties"]["name"], json!("EPSG:2154"));
    }
}
