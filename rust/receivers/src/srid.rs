// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Working SRID resolution.
//!
//! Buffering and spacing are done in map units, so every generator first
//! settles on one metric SRID and refuses to run otherwise. Fences given in
//! another system are brought into that SRID with proj4rs.

use geo::{Coord, MapCoords, MultiPolygon};
use noisegrid_core::{Error, FenceGeometry, InputTables, SpatialDatabase, Srid, TableName};
use proj4rs::errors::Result as ProjResult;
use proj4rs::transform::transform;
use proj4rs::Proj;
use tracing::debug;

use crate::error::{GridError, Result};

/// Rejects undefined, geographic and Web Mercator systems.
pub fn ensure_metric(srid: Srid) -> Result<Srid> {
    match srid {
        Srid::UNDEFINED | Srid::WGS84 | Srid::WEB_MERCATOR | Srid::WEB_MERCATOR_LEGACY => {
            Err(Error::InvalidSrid(srid.0).into())
        }
        _ => Ok(srid),
    }
}

/// SRID of the buildings table, falling back to the sources table and then
/// the fence table when unset. Missing optional tables are skipped.
pub fn resolve_srid<D>(
    db: &D,
    tables: &InputTables,
    fence_table: Option<&TableName>,
) -> Result<Srid>
where
    D: SpatialDatabase + ?Sized,
{
    let mut srid = db.srid(&tables.buildings)?;

    let fallbacks = tables.sources.iter().chain(fence_table);
    for table in fallbacks {
        if srid.is_defined() {
            break;
        }
        if db.has_table(table) {
            srid = db.srid(table)?;
        }
    }

    debug!(%srid, buildings = %tables.buildings, "resolved working SRID");
    ensure_metric(srid)
}

/// Fence polygon in the working SRID.
///
/// A fence without an SRID (or tagged with the working one) is used as is.
/// A fence tagged with another EPSG code, typically WGS84 coordinates from a
/// web client, is reprojected.
pub fn fence_in_srid(fence: &FenceGeometry, srid: Srid) -> Result<MultiPolygon<f64>> {
    let from = match fence.srid {
        Some(from) if from.is_defined() && from != srid => from,
        _ => return Ok(fence.geometry.clone()),
    };
    let failed = |message: String| GridError::Projection {
        from,
        to: srid,
        message,
    };

    let source = projection(from).map_err(failed)?;
    let target = projection(srid).map_err(failed)?;
    let geometry = fence
        .geometry
        .try_map_coords(|c| reproject(&source, &target, c))
        .map_err(|e| failed(e.to_string()))?;

    debug!(%from, to = %srid, polygons = geometry.0.len(), "fence reprojected");
    Ok(geometry)
}

fn projection(srid: Srid) -> std::result::Result<Proj, String> {
    let code = u16::try_from(srid.0).map_err(|_| format!("{srid} is not an EPSG code"))?;
    Proj::from_epsg_code(code).map_err(|e| format!("{srid}: {e}"))
}

/// Geographic systems take and return degrees.
fn reproject(source: &Proj, target: &Proj, c: Coord<f64>) -> ProjResult<Coord<f64>> {
    let mut point = if source.is_latlong() {
        (c.x.to_radians(), c.y.to_radians(), 0.0)
    } else {
        (c.x, c.y, 0.0)
    };
    transform(source, target, &mut point)?;
    if target.is_latlong() {
        point = (point.0.to_degrees(), point.1.to_degrees(), point.2);
    }
    Ok(Coord {
        x: point.0,
        y: point.1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use geo::{polygon, BoundingRect, LineString, MultiLineString};
    use noisegrid_core::{parse_fence, Building, MemoryDatabase, SourceGeometry};

    fn building() -> Building {
        Building {
            pk: 1,
            footprint: polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0)],
            height: 10.0,
        }
    }

    fn tables() -> InputTables {
        InputTables::default().with_sources(TableName::parse("ROADS").unwrap())
    }

    #[test]
    fn rejects_non_metric_systems() {
        for code in [0, 4326, 3785, 3857] {
            let err = ensure_metric(Srid(code)).unwrap_err();
            assert!(err.is_configuration(), "{code} should be rejected");
        }
        assert_eq!(ensure_metric(Srid(2154)).unwrap(), Srid(2154));
    }

    #[test]
    fn buildings_take_precedence() {
        let mut db = MemoryDatabase::new();
        let t = tables();
        db.create_buildings_table(&t.buildings, Srid(2154), vec![building()])
            .unwrap();
        db.create_sources_table(t.sources.as_ref().unwrap(), Srid(32631), Vec::new())
            .unwrap();
        assert_eq!(resolve_srid(&db, &t, None).unwrap(), Srid(2154));
    }

    #[test]
    fn falls_back_to_sources_then_fence() {
        let mut db = MemoryDatabase::new();
        let t = tables();
        db.create_buildings_table(&t.buildings, Srid::UNDEFINED, vec![building()])
            .unwrap();
        let road = SourceGeometry {
            pk: 1,
            geometry: MultiLineString::new(vec![LineString::from(vec![(0.0, 0.0), (1.0, 1.0)])]),
            z: None,
        };
        db.create_sources_table(t.sources.as_ref().unwrap(), Srid::UNDEFINED, vec![road])
            .unwrap();
        let fence = TableName::parse("ZONE").unwrap();
        db.create_buildings_table(&fence, Srid(25832), Vec::new())
            .unwrap();

        assert_eq!(resolve_srid(&db, &t, Some(&fence)).unwrap(), Srid(25832));
        assert!(resolve_srid(&db, &t, None).is_err());
    }

    #[test]
    fn wgs84_buildings_are_a_configuration_error() {
        let mut db = MemoryDatabase::new();
        let t = InputTables::default();
        db.create_buildings_table(&t.buildings, Srid::WGS84, vec![building()])
            .unwrap();
        let err = resolve_srid(&db, &t, None).unwrap_err();
        assert!(matches!(err, GridError::Core(Error::InvalidSrid(4326))));
    }

    #[test]
    fn untagged_fence_is_taken_as_is() {
        let plain = parse_fence("POLYGON((0 0,1 0,1 1,0 0))").unwrap();
        assert_eq!(fence_in_srid(&plain, Srid(2154)).unwrap(), plain.geometry);
        let same = parse_fence("SRID=2154;POLYGON((0 0,1 0,1 1,0 0))").unwrap();
        assert_eq!(fence_in_srid(&same, Srid(2154)).unwrap(), same.geometry);
    }

    #[test]
    fn wgs84_fence_lands_on_the_lambert_93_origin() {
        // Lambert-93 projects (3 E, 46.5 N) to its false origin
        let fence =
            parse_fence("SRID=4326;POLYGON((3 46.5,3.01 46.5,3.01 46.51,3 46.51,3 46.5))").unwrap();
        let projected = fence_in_srid(&fence, Srid(2154)).unwrap();
        let origin = projected.0[0].exterior().0[0];
        assert_abs_diff_eq!(origin.x, 700_000.0, epsilon = 0.01);
        assert_abs_diff_eq!(origin.y, 6_600_000.0, epsilon = 0.01);

        let envelope = projected.bounding_rect().unwrap();
        assert!((700.0..800.0).contains(&envelope.width()));
        assert!((1_000.0..1_200.0).contains(&envelope.height()));
    }

    #[test]
    fn unknown_fence_system_is_a_configuration_error() {
        let fence = parse_fence("SRID=999999;POLYGON((0 0,1 0,1 1,0 0))").unwrap();
        let err = fence_in_srid(&fence, Srid(2154)).unwrap_err();
        assert!(matches!(err, GridError::Projection { .. }));
        assert!(err.is_configuration());
    }
}
