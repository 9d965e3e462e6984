// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outward polygon buffering with bevel or round joins.
//!
//! The buffer is assembled from simple pieces and merged with a single
//! i_overlay union: the polygon itself, one quad per ring edge extruded along
//! the edge's outward normal, and one join piece at every convex vertex (a
//! bevel triangle or a fan approximating the arc).
//! All pieces are counter-clockwise and holes clockwise, so the non-zero fill
//! rule yields the buffered area.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use rayon::prelude::*;

type Path = Vec<[f64; 2]>;

/// Edges shorter than this contribute no quad.
const MIN_EDGE_LENGTH: f64 = 1e-9;

/// Arc segments per quarter circle of a round join.
const QUARTER_SEGMENTS: f64 = 8.0;

/// Shape of the buffer around convex corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Join {
    /// Straight cut between the two offset edges.
    #[default]
    Bevel,
    /// Circular arc of radius `distance` around the corner.
    Round,
}

/// Signed area of a closed path. Positive means counter-clockwise.
pub fn signed_area(path: &[[f64; 2]]) -> f64 {
    let n = path.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += path[i][0] * path[j][1] - path[j][0] * path[i][1];
    }
    area * 0.5
}

fn oriented(mut path: Path, ccw: bool) -> Path {
    if (signed_area(&path) > 0.0) != ccw {
        path.reverse();
    }
    path
}

/// Ring vertices without the closing duplicate.
fn ring_path(ring: &LineString<f64>) -> Path {
    let mut path: Path = ring.coords().map(|c| [c.x, c.y]).collect();
    if path.len() > 1 && path.first() == path.last() {
        path.pop();
    }
    path.dedup();
    path
}

fn is_finite_polygon(polygon: &Polygon<f64>) -> bool {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(|ring| ring.coords())
        .all(|c| c.x.is_finite() && c.y.is_finite())
}

/// Outward unit normal of edge `a -> b` for a ring whose interior lies on
/// the left.
#[inline]
fn outward_normal(a: [f64; 2], b: [f64; 2]) -> Option<[f64; 2]> {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len = dx.hypot(dy);
    (len > MIN_EDGE_LENGTH).then(|| [dy / len, -dx / len])
}

/// Fan from `center` sweeping counter-clockwise from normal `from` to `to`.
fn round_corner(center: [f64; 2], from: [f64; 2], to: [f64; 2], distance: f64) -> Path {
    let start = from[1].atan2(from[0]);
    let mut sweep = to[1].atan2(to[0]) - start;
    if sweep <= 0.0 {
        sweep += std::f64::consts::TAU;
    }
    let steps = (sweep / std::f64::consts::FRAC_PI_2 * QUARTER_SEGMENTS)
        .ceil()
        .max(1.0) as usize;

    let mut fan = Vec::with_capacity(steps + 2);
    fan.push(center);
    for k in 0..=steps {
        let angle = start + sweep * k as f64 / steps as f64;
        fan.push([
            center[0] + distance * angle.cos(),
            center[1] + distance * angle.sin(),
        ]);
    }
    fan
}

/// Adds the edge quads and convex-corner joins of one ring.
fn ring_pieces(ring: &[[f64; 2]], distance: f64, join: Join, pieces: &mut Vec<Path>) {
    let n = ring.len();
    if n < 2 {
        return;
    }
    let offset = |p: [f64; 2], nrm: [f64; 2]| [p[0] + distance * nrm[0], p[1] + distance * nrm[1]];

    let normals: Vec<Option<[f64; 2]>> = (0..n)
        .map(|i| outward_normal(ring[i], ring[(i + 1) % n]))
        .collect();

    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        if let Some(nrm) = normals[i] {
            pieces.push(oriented(
                vec![a, offset(a, nrm), offset(b, nrm), b],
                true,
            ));
        }

        // Corner at b, between edge i and edge i + 1.
        let next = (i + 1) % n;
        let c = ring[(i + 2) % n];
        let turn = (b[0] - a[0]) * (c[1] - b[1]) - (b[1] - a[1]) * (c[0] - b[0]);
        if let (Some(n1), Some(n2), true) = (normals[i], normals[next], turn > 0.0) {
            let piece = match join {
                Join::Bevel => vec![b, offset(b, n1), offset(b, n2)],
                Join::Round => round_corner(b, n1, n2, distance),
            };
            pieces.push(oriented(piece, true));
        }
    }
}

fn shapes_to_multipolygon(shapes: Vec<Vec<Path>>) -> MultiPolygon<f64> {
    let to_ring = |contour: &Path| -> LineString<f64> {
        contour
            .iter()
            .map(|p| Coord { x: p[0], y: p[1] })
            .collect::<Vec<_>>()
            .into()
    };

    shapes
        .into_iter()
        .filter(|shape| shape.first().is_some_and(|outer| outer.len() >= 3))
        .map(|shape| {
            let exterior = to_ring(&shape[0]);
            let holes = shape[1..]
                .iter()
                .filter(|c| c.len() >= 3)
                .map(to_ring)
                .collect();
            Polygon::new(exterior, holes)
        })
        .collect()
}

/// Buffers the union of `polygons` outward by `distance`.
///
/// A non-positive distance returns the union of the input. Polygons with
/// non-finite coordinates are skipped.
pub fn buffer_union(polygons: &[&Polygon<f64>], distance: f64, join: Join) -> MultiPolygon<f64> {
    let mut pieces: Vec<Path> = Vec::new();

    for polygon in polygons.iter().filter(|p| is_finite_polygon(p)) {
        let exterior = oriented(ring_path(polygon.exterior()), true);
        if exterior.len() < 3 {
            continue;
        }
        let holes: Vec<Path> = polygon
            .interiors()
            .iter()
            .map(|ring| oriented(ring_path(ring), false))
            .filter(|ring| ring.len() >= 3)
            .collect();

        if distance > 0.0 {
            ring_pieces(&exterior, distance, join, &mut pieces);
            for hole in &holes {
                ring_pieces(hole, distance, join, &mut pieces);
            }
        }
        pieces.push(exterior);
        pieces.extend(holes);
    }

    if pieces.is_empty() {
        return MultiPolygon::new(Vec::new());
    }

    let clip: Vec<Path> = Vec::new();
    let shapes = pieces.overlay(&clip, OverlayRule::Union, FillRule::NonZero);
    shapes_to_multipolygon(shapes)
}

/// Buffers a single polygon outward by `distance` with bevel joins.
pub fn buffer_polygon(polygon: &Polygon<f64>, distance: f64) -> MultiPolygon<f64> {
    buffer_union(&[polygon], distance, Join::Bevel)
}

/// Buffers every polygon independently, in parallel. Output order matches
/// input order.
pub fn buffer_polygons(polygons: &[Polygon<f64>], distance: f64) -> Vec<MultiPolygon<f64>> {
    polygons
        .par_iter()
        .map(|polygon| buffer_polygon(polygon, distance))
        .collect()
}
