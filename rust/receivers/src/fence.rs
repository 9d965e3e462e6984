// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fence resolution: explicit WKT (reprojected when tagged with another
//! SRID), then fence table envelope, then the buildings envelope.

use geo::{BoundingRect, Intersects, MultiPolygon, Point, Rect};
use noisegrid_core::{Error, FenceSpec, SpatialDatabase, Srid, TableName};
use tracing::debug;

use crate::error::Result;
use crate::srid::fence_in_srid;

/// Area receivers may be placed in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFence {
    pub envelope: Rect<f64>,
    /// Only set for an explicit polygon fence; envelopes do not clip.
    pub polygon: Option<MultiPolygon<f64>>,
}

impl ResolvedFence {
    /// Whether a point survives the fence clip.
    pub fn admits(&self, point: Point<f64>) -> bool {
        match &self.polygon {
            Some(polygon) => polygon.intersects(&point),
            None => true,
        }
    }
}

pub fn resolve_fence<D>(
    db: &D,
    spec: &FenceSpec,
    buildings: &TableName,
    srid: Srid,
) -> Result<ResolvedFence>
where
    D: SpatialDatabase + ?Sized,
{
    let fence = match spec {
        FenceSpec::Wkt(fence) => {
            let polygon = fence_in_srid(fence, srid)?;
            let envelope = polygon.bounding_rect().ok_or(Error::MissingFence)?;
            ResolvedFence {
                envelope,
                polygon: Some(polygon),
            }
        }
        FenceSpec::TableEnvelope(table) => ResolvedFence {
            envelope: db.envelope(table)?.ok_or(Error::MissingFence)?,
            polygon: None,
        },
        FenceSpec::BuildingsEnvelope => ResolvedFence {
            envelope: db.envelope(buildings)?.ok_or(Error::MissingFence)?,
            polygon: None,
        },
    };
    debug!(envelope = ?fence.envelope, clipped = fence.polygon.is_some(), "fence resolved");
    Ok(fence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};
    use noisegrid_core::{parse_fence, Building, MemoryDatabase};

    fn db_with_building() -> (MemoryDatabase, TableName) {
        let mut db = MemoryDatabase::new();
        let table = TableName::parse("BUILDINGS").unwrap();
        let building = Building {
            pk: 1,
            footprint: polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 20.0), (x: 0.0, y: 20.0)],
            height: 8.0,
        };
        db.create_buildings_table(&table, Srid(2154), vec![building])
            .unwrap();
        (db, table)
    }

    #[test]
    fn buildings_envelope_is_the_last_resort() {
        let (db, table) = db_with_building();
        let fence = resolve_fence(&db, &FenceSpec::BuildingsEnvelope, &table, Srid(2154)).unwrap();
        assert_eq!(fence.envelope.max(), coord! { x: 10.0, y: 20.0 });
        assert!(fence.admits(Point::new(1000.0, 0.0)));
    }

    #[test]
    fn wkt_fence_clips() {
        let (db, table) = db_with_building();
        let spec = FenceSpec::Wkt(parse_fence("POLYGON((0 0,4 0,4 4,0 4,0 0))").unwrap());
        let fence = resolve_fence(&db, &spec, &table, Srid(2154)).unwrap();
        assert!(fence.admits(Point::new(2.0, 2.0)));
        assert!(!fence.admits(Point::new(5.0, 2.0)));
    }

    #[test]
    fn empty_fence_table_is_missing_fence() {
        let (mut db, table) = db_with_building();
        let zone = TableName::parse("ZONE").unwrap();
        db.create_buildings_table(&zone, Srid(2154), Vec::new())
            .unwrap();
        let err = resolve_fence(&db, &FenceSpec::TableEnvelope(zone), &table, Srid(2154))
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
