// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line-to-points resampling.
//!
//! A line of length `L` is cut into `ceil(L / spacing)` equal pieces and a
//! point is emitted at every interior cut. The last piece gets a point at its
//! middle instead of at its end, so a closed ring never receives two points at
//! its seam. Lines shorter than the spacing get exactly one point, at half of
//! their length.
//!
//! Vertices are [`Point3`]. A vertex whose `z` is NaN is treated as 2D: edge
//! lengths then fall back to planar distance.

use geo::{LineString, MultiLineString};
use nalgebra::Point3;

/// Tolerance on accumulated length before a cut is placed, so that rounding
/// in `L / n` never adds a cut at the very end of the line.
const CUT_EPSILON: f64 = 1e-9;

/// Euclidean edge length, 3D when both ends carry `z`.
#[inline]
fn edge_length(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let d3 = nalgebra::distance(a, b);
    if d3.is_nan() {
        (b.x - a.x).hypot(b.y - a.y)
    } else {
        d3
    }
}

#[inline]
fn lerp(a: &Point3<f64>, b: &Point3<f64>, t: f64) -> Point3<f64> {
    Point3::new(
        a.x + t * (b.x - a.x),
        a.y + t * (b.y - a.y),
        a.z + t * (b.z - a.z),
    )
}

/// Lifts a planar line to 3D vertices at height `z`.
///
/// Pass `f64::NAN` to keep the vertices 2D.
pub fn lift_line(line: &LineString<f64>, z: f64) -> Vec<Point3<f64>> {
    line.coords().map(|c| Point3::new(c.x, c.y, z)).collect()
}

/// Splits one line into approximately evenly spaced points.
///
/// Degenerate input (fewer than two vertices, zero length, non-finite
/// spacing) yields no point. Points with a NaN planar coordinate are dropped.
pub fn split_line_to_points(line: &[Point3<f64>], spacing: f64) -> Vec<Point3<f64>> {
    if line.len() < 2 || !spacing.is_finite() || spacing <= 0.0 {
        return Vec::new();
    }

    let edges: Vec<(Point3<f64>, Point3<f64>, f64)> = line
        .windows(2)
        .map(|w| (w[0], w[1], edge_length(&w[0], &w[1])))
        .filter(|(_, _, len)| len.is_finite() && *len > 0.0)
        .collect();
    let total: f64 = edges.iter().map(|(_, _, len)| len).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let points = if total < spacing {
        midpoint(&edges, total / 2.0).into_iter().collect()
    } else {
        let effective = total / (total / spacing).ceil();
        split_evenly(&edges, effective)
    };

    points
        .into_iter()
        .filter(|p| !p.x.is_nan() && !p.y.is_nan())
        .collect()
}

/// Resamples every part of a multi-line and concatenates the results.
pub fn split_lines_to_points(lines: &[Vec<Point3<f64>>], spacing: f64) -> Vec<Point3<f64>> {
    lines
        .iter()
        .flat_map(|line| split_line_to_points(line, spacing))
        .collect()
}

/// Resamples a planar multi-line and places the points at height `z`.
pub fn split_multiline_at_height(
    lines: &MultiLineString<f64>,
    spacing: f64,
    z: f64,
) -> Vec<Point3<f64>> {
    lines
        .iter()
        .flat_map(|line| split_line_to_points(&lift_line(line, z), spacing))
        .collect()
}

/// Point at cumulative length `target` along the edge chain.
fn midpoint(edges: &[(Point3<f64>, Point3<f64>, f64)], target: f64) -> Option<Point3<f64>> {
    let mut walked = 0.0;
    for (a, b, len) in edges {
        if walked + len > target {
            return Some(lerp(a, b, (target - walked) / len));
        }
        walked += len;
    }
    None
}

fn split_evenly(edges: &[(Point3<f64>, Point3<f64>, f64)], effective: f64) -> Vec<Point3<f64>> {
    let half = effective / 2.0;
    let mut points = Vec::new();
    let mut walked = 0.0;
    let mut pending_mid: Option<Point3<f64>> = None;

    for (start, end, len) in edges {
        let mut a = *start;
        let mut remaining = *len;

        while walked + remaining > effective + CUT_EPSILON {
            let t = (effective - walked) / remaining;
            let cut = lerp(&a, end, t);
            points.push(cut);
            a = cut;
            remaining = edge_length(&a, end);
            walked = 0.0;
            pending_mid = None;
        }

        if pending_mid.is_none() && walked + remaining > half && remaining > 0.0 {
            pending_mid = Some(lerp(&a, end, (half - walked) / remaining));
        }
        walked += remaining;
    }

    points.extend(pending_mid);
    points
}
