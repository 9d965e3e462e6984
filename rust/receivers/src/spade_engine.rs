// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Built-in triangulation engine on top of [spade](https://docs.rs/spade).
//!
//! Each cell is a constrained Delaunay triangulation bounded by the cell
//! rectangle, seeded with the building corners inside the cell (building
//! edges become constraints where they fit) and refined until no triangle
//! exceeds the maximum area. Vertices inside buildings or too close to a
//! road are then dropped together with the triangles using them.
//!
//! Neighbouring cells share their boundary vertices. A vertex that an earlier
//! cell already wrote as a receiver keeps that receiver's key, so every
//! position is written once and triangles on both sides of a seam reference
//! the same receiver.

use std::fs;
use std::path::{Path, PathBuf};

use geo::{
    BoundingRect, Centroid, Contains, Coord, Intersects, LineString, Point, Polygon, Rect,
};
use nalgebra::Point3;
use noisegrid_core::{
    Building, Error as CoreError, InputTables, Receiver, ReceiverTags, SpatialDatabase,
    SpatialIndex, Triangle,
};
use noisegrid_geometry::envelope_of;
use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use spade::handles::FixedVertexHandle;
use spade::{ConstrainedDelaunayTriangulation, Point2, RefinementParameters, Triangulation};
use tracing::{debug, warn};

use crate::engine::{
    CellGrid, CellIndex, CellTables, PkCounter, TriangulationEngine, TriangulationSettings,
};
use crate::error::{GridError, Result};
use crate::exclusion::{source_lines, ProximityMask};

type Cdt = ConstrainedDelaunayTriangulation<Point2<f64>>;

const INDEX_CELL_SIZE: f64 = 50.0;

/// Upper bound on Steiner points added to a single cell.
const MAX_ADDITIONAL_VERTICES: usize = 2_000_000;

/// State read once in [`TriangulationEngine::initialize`].
#[derive(Debug)]
struct Domain {
    settings: TriangulationSettings,
    extent: Rect<f64>,
    grid: CellGrid,
    buildings: Vec<Building>,
    building_index: SpatialIndex,
    roads: ProximityMask<LineString<f64>>,
}

/// Receivers already written on a cell's boundary, keyed by exact position.
type SharedVertices = FxHashMap<(u64, u64), i64>;

fn position_key(c: Coord<f64>) -> (u64, u64) {
    // Folds -0.0 into 0.0
    ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits())
}

/// Mesh of one cell before filtering.
#[derive(Debug, Default)]
struct CellMesh {
    vertices: Vec<Coord<f64>>,
    faces: Vec<[usize; 3]>,
}

/// Constrained Delaunay engine with area refinement.
#[derive(Debug, Default)]
pub struct SpadeTriangulator {
    domain: Option<Domain>,
}

impl SpadeTriangulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn domain(&self) -> Result<&Domain> {
        self.domain
            .as_ref()
            .ok_or_else(|| GridError::Config("triangulation engine used before initialize".into()))
    }
}

impl Domain {
    fn cell_rect(&self, cell: CellIndex) -> Rect<f64> {
        let w = self.extent.width() / self.grid.cols as f64;
        let h = self.extent.height() / self.grid.rows as f64;
        let min = self.extent.min();
        Rect::new(
            Coord {
                x: min.x + cell.col as f64 * w,
                y: min.y + cell.row as f64 * h,
            },
            Coord {
                x: min.x + (cell.col + 1) as f64 * w,
                y: min.y + (cell.row + 1) as f64 * h,
            },
        )
    }

    fn buildings_in(&self, window: Rect<f64>) -> impl Iterator<Item = &Building> + '_ {
        self.building_index
            .query(window)
            .into_iter()
            .map(|id| &self.buildings[id])
            .filter(move |b| b.footprint.intersects(&window))
    }

    fn inside_building(&self, point: Point<f64>) -> bool {
        self.building_index
            .query_around(point.0, 0.0)
            .into_iter()
            .any(|id| self.buildings[id].footprint.contains(&point))
    }

    fn triangulate(&self, cell: CellIndex) -> Result<CellMesh> {
        let bounds = self.cell_rect(cell);
        let fail = |message: String| GridError::Triangulation {
            row: cell.row,
            col: cell.col,
            message,
        };
        let mut cdt = Cdt::new();
        let insert = |cdt: &mut Cdt, c: Coord<f64>| -> Result<FixedVertexHandle> {
            cdt.insert(Point2::new(c.x, c.y))
                .map_err(|e| fail(format!("cannot insert ({}, {}): {e:?}", c.x, c.y)))
        };

        // Cell boundary
        let (min, max) = (bounds.min(), bounds.max());
        let corners = [
            min,
            Coord { x: max.x, y: min.y },
            max,
            Coord { x: min.x, y: max.y },
        ];
        let mut handles = Vec::with_capacity(4);
        for c in corners {
            handles.push(insert(&mut cdt, c)?);
        }
        for i in 0..handles.len() {
            let (a, b) = (handles[i], handles[(i + 1) % handles.len()]);
            if a != b && cdt.can_add_constraint(a, b) {
                cdt.add_constraint(a, b);
            }
        }

        // Building outlines inside the cell
        for building in self.buildings_in(bounds) {
            let ring: Vec<Coord<f64>> = building.footprint.exterior().coords().copied().collect();
            let mut previous: Option<FixedVertexHandle> = None;
            for c in ring {
                if !bounds.intersects(&c) {
                    previous = None;
                    continue;
                }
                let handle = insert(&mut cdt, c)?;
                if let Some(prev) = previous {
                    if prev != handle && cdt.can_add_constraint(prev, handle) {
                        cdt.add_constraint(prev, handle);
                    }
                }
                previous = Some(handle);
            }
        }

        let area = bounds.width() * bounds.height();
        let budget = ((area / self.settings.max_area) * 4.0).ceil() as usize + 1000;
        let result = cdt.refine(
            RefinementParameters::<f64>::new()
                .with_max_allowed_area(self.settings.max_area)
                .exclude_outer_faces(false)
                .with_max_additional_vertices(budget.min(MAX_ADDITIONAL_VERTICES)),
        );
        if !result.refinement_complete {
            warn!(row = cell.row, col = cell.col, "refinement stopped at the vertex budget");
        }

        let vertices = cdt
            .vertices()
            .map(|v| {
                let p = v.position();
                Coord { x: p.x, y: p.y }
            })
            .collect();
        let faces = cdt
            .inner_faces()
            .map(|face| face.vertices().map(|v| v.fix().index()))
            .collect();
        Ok(CellMesh { vertices, faces })
    }

    /// Receivers and triangles of a cell after the exclusion rules.
    fn filter(
        &self,
        mesh: &CellMesh,
        cell_id: i64,
        pks: &PkCounter,
        shared: &SharedVertices,
    ) -> (Vec<Receiver>, Vec<Triangle>) {
        let keep_buildings = self.settings.iso_surface_in_buildings;
        let z = self.settings.receiver_height;

        let mut receivers = Vec::new();
        let keys: Vec<Option<i64>> = mesh
            .vertices
            .iter()
            .map(|c| {
                if let Some(&pk) = shared.get(&position_key(*c)) {
                    return Some(pk);
                }
                let point = Point::from(*c);
                let excluded = !(c.x.is_finite() && c.y.is_finite())
                    || (!keep_buildings && self.inside_building(point))
                    || self.roads.within(point, self.settings.road_width);
                if excluded {
                    return None;
                }
                let pk = pks.next_receiver();
                receivers.push(Receiver::new(pk, Point3::new(c.x, c.y, z), ReceiverTags::None));
                Some(pk)
            })
            .collect();

        let mut triangles = Vec::new();
        for face in &mesh.faces {
            let (Some(k1), Some(k2), Some(k3)) = (keys[face[0]], keys[face[1]], keys[face[2]])
            else {
                continue;
            };
            let ring: Vec<Coord<f64>> = face.iter().map(|&i| mesh.vertices[i]).collect();
            let geometry = Polygon::new(LineString::from(ring), Vec::new());
            if !keep_buildings {
                if let Some(centroid) = geometry.centroid() {
                    if self.inside_building(centroid) {
                        continue;
                    }
                }
            }
            triangles.push(Triangle {
                pk: pks.next_triangle(),
                geometry,
                pk_1: k1,
                pk_2: k2,
                pk_3: k3,
                cell_id,
            });
        }
        (receivers, triangles)
    }
}

fn polygon_json(polygon: &Polygon<f64>) -> Value {
    let ring = |ls: &LineString<f64>| -> Vec<[f64; 2]> { ls.coords().map(|c| [c.x, c.y]).collect() };
    let mut rings = vec![ring(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring));
    json!({ "type": "Polygon", "coordinates": rings })
}

impl TriangulationEngine for SpadeTriangulator {
    fn initialize<D>(
        &mut self,
        db: &D,
        tables: &InputTables,
        settings: &TriangulationSettings,
    ) -> Result<CellGrid>
    where
        D: SpatialDatabase + ?Sized,
    {
        let buildings = db.buildings(&tables.buildings)?;
        let sources = match &tables.sources {
            Some(table) if db.has_table(table) => db.sources(table)?,
            _ => Vec::new(),
        };

        let footprints: Vec<Polygon<f64>> = buildings.iter().map(|b| b.footprint.clone()).collect();
        let roads = source_lines(&sources);
        let extent = match settings.fence {
            Some(fence) => Some(fence),
            None => {
                let a = envelope_of(&footprints);
                let b = envelope_of(roads.items());
                match (a, b) {
                    (Some(a), Some(b)) => envelope_of(&[a, b]),
                    (a, b) => a.or(b),
                }
            }
        }
        .ok_or(CoreError::MissingFence)?;

        let cells = |extent: f64| ((extent / settings.max_cell_dist).ceil() as u32).max(1);
        let grid = CellGrid {
            rows: cells(extent.height()),
            cols: cells(extent.width()),
        };
        debug!(
            rows = grid.rows,
            cols = grid.cols,
            buildings = buildings.len(),
            roads = roads.len(),
            "triangulation domain ready"
        );

        self.domain = Some(Domain {
            settings: settings.clone(),
            extent,
            grid,
            building_index: SpatialIndex::from_geometries(&footprints, INDEX_CELL_SIZE),
            buildings,
            roads,
        });
        Ok(grid)
    }

    fn generate_cell<D>(
        &self,
        db: &mut D,
        cell: CellIndex,
        output: &CellTables,
        pks: &PkCounter,
    ) -> Result<()>
    where
        D: SpatialDatabase + ?Sized,
    {
        let domain = self.domain()?;
        let mesh = domain.triangulate(cell)?;
        let shared: SharedVertices = db
            .receivers_in(&output.receivers, domain.cell_rect(cell))?
            .into_iter()
            .map(|r| (position_key(Coord { x: r.position.x, y: r.position.y }), r.pk))
            .collect();
        let (receivers, triangles) =
            domain.filter(&mesh, domain.grid.cell_id(cell), pks, &shared);
        debug!(
            row = cell.row,
            col = cell.col,
            receivers = receivers.len(),
            boundary_receivers = shared.len(),
            triangles = triangles.len(),
            "cell triangulated"
        );

        db.insert_receivers(&output.receivers, receivers)?;
        db.insert_triangles(&output.triangles, &output.receivers, triangles)?;
        Ok(())
    }

    fn dump_cell(&self, cell: CellIndex, folder: &Path) -> Result<PathBuf> {
        let domain = self.domain()?;
        let bounds = domain.cell_rect(cell);

        let mut features = vec![json!({
            "type": "Feature",
            "geometry": polygon_json(&bounds.to_polygon()),
            "properties": { "role": "cell", "row": cell.row, "col": cell.col },
        })];
        features.extend(domain.buildings_in(bounds).map(|b| {
            json!({
                "type": "Feature",
                "geometry": polygon_json(&b.footprint),
                "properties": { "role": "building", "pk": b.pk, "height": b.height },
            })
        }));
        features.extend(
            domain
                .roads
                .items()
                .iter()
                .filter(|line| line.bounding_rect().is_some_and(|r| r.intersects(&bounds)))
                .map(|line| {
                    let coords: Vec<[f64; 2]> = line.coords().map(|c| [c.x, c.y]).collect();
                    json!({
                        "type": "Feature",
                        "geometry": { "type": "LineString", "coordinates": coords },
                        "properties": { "role": "road" },
                    })
                }),
        );

        fs::create_dir_all(folder)?;
        let path = folder.join(format!("cell_{}_{}.geojson", cell.row, cell.col));
        let collection = json!({ "type": "FeatureCollection", "features": features });
        fs::write(&path, serde_json::to_vec_pretty(&collection)?)?;
        Ok(path)
    }
}
