// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line extraction and line/polygon difference.

use geo::{BooleanOps, EuclideanLength, LineString, MultiLineString, MultiPolygon, Simplify};

/// Parts shorter than this are dropped after a difference.
pub const MIN_PART_LENGTH: f64 = 1e-6;

/// Boundary of a (multi-)polygon as a multi-line: every exterior ring, then
/// its holes.
pub fn boundary_lines(polygons: &MultiPolygon<f64>) -> MultiLineString<f64> {
    polygons
        .iter()
        .flat_map(|polygon| {
            std::iter::once(polygon.exterior().clone()).chain(polygon.interiors().iter().cloned())
        })
        .filter(|ring| ring.0.len() >= 2)
        .collect()
}

/// Removes vertices within `tolerance` of the simplified line
/// (Ramer-Douglas-Peucker). End points are always kept, so closed rings stay
/// closed.
pub fn simplify_lines(lines: &MultiLineString<f64>, tolerance: f64) -> MultiLineString<f64> {
    lines.simplify(&tolerance)
}

/// Parts of `lines` that lie outside `mask`.
///
/// Closed lines cut by the mask are rejoined across their seam, so a ring
/// with one gap stays one line. Zero-length parts are dropped.
pub fn difference(lines: &MultiLineString<f64>, mask: &MultiPolygon<f64>) -> MultiLineString<f64> {
    if mask.0.is_empty() {
        return lines.clone();
    }

    let mut out = Vec::new();
    for line in lines.iter() {
        let clipped = mask.clip(&MultiLineString::new(vec![line.clone()]), true);
        let mut parts: Vec<LineString<f64>> = clipped
            .0
            .into_iter()
            .filter(|part| part.euclidean_length() > MIN_PART_LENGTH)
            .collect();
        if line.is_closed() {
            join_across_seam(line, &mut parts);
        }
        out.extend(parts);
    }
    MultiLineString::new(out)
}

/// Merges the part ending at the ring seam with the part starting there.
fn join_across_seam(ring: &LineString<f64>, parts: &mut Vec<LineString<f64>>) {
    let Some(seam) = ring.0.first().copied() else {
        return;
    };
    let tail = parts.iter().position(|p| p.0.last() == Some(&seam));
    let head = parts.iter().position(|p| p.0.first() == Some(&seam));

    if let (Some(tail), Some(head)) = (tail, head) {
        if tail == head {
            return;
        }
        let head_part = parts[head].clone();
        parts[tail].0.extend(head_part.0.into_iter().skip(1));
        parts.remove(head);
    }
}

/// Total planar length of a multi-line.
pub fn total_length(lines: &MultiLineString<f64>) -> f64 {
    lines.iter().map(|line| line.euclidean_length()).sum()
}
