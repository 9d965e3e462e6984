// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Regular grid points and envelopes.

use geo::{BoundingRect, Coord, Rect};

/// Cell-centre point of a regular grid. Column and row indices start at 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub col: i64,
    pub row: i64,
    pub coord: Coord<f64>,
}

/// Number of cells of size `delta` needed to cover `extent`, at least one.
#[inline]
fn cells(extent: f64, delta: f64) -> i64 {
    ((extent / delta).ceil() as i64).max(1)
}

/// Number of points [`make_grid_points`] would produce, `None` when the
/// inputs are not finite or the count does not fit in `usize`.
pub fn grid_size(envelope: Rect<f64>, delta: f64) -> Option<usize> {
    let (min, max) = (envelope.min(), envelope.max());
    if !delta.is_finite()
        || delta <= 0.0
        || ![min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite())
    {
        return None;
    }
    let count = |extent: f64| -> Option<usize> {
        let n = (extent / delta).ceil().max(1.0);
        (n.is_finite() && n <= usize::MAX as f64).then_some(n as usize)
    };
    count(envelope.width())?.checked_mul(count(envelope.height())?)
}

/// Centres of the `delta`-sized cells covering `envelope`, row by row.
///
/// When `delta` does not divide the extent, the last column and row overhang
/// the envelope. Non-finite input gives no points. Callers bound the size
/// with [`grid_size`] first.
pub fn make_grid_points(envelope: Rect<f64>, delta: f64) -> Vec<GridPoint> {
    let Some(size) = grid_size(envelope, delta) else {
        return Vec::new();
    };

    let min = envelope.min();
    let cols = cells(envelope.width(), delta);
    let rows = cells(envelope.height(), delta);
    let half = delta / 2.0;

    let mut points = Vec::with_capacity(size);
    for row in 1..=rows {
        let y = min.y + half + (row - 1) as f64 * delta;
        for col in 1..=cols {
            let x = min.x + half + (col - 1) as f64 * delta;
            points.push(GridPoint {
                col,
                row,
                coord: Coord { x, y },
            });
        }
    }
    points
}

/// Envelope of every item that has one.
pub fn envelope_of<'a, G, I>(items: I) -> Option<Rect<f64>>
where
    G: BoundingRect<f64> + 'a,
    G::Output: Into<Option<Rect<f64>>>,
    I: IntoIterator<Item = &'a G>,
{
    items
        .into_iter()
        .filter_map(|item| item.bounding_rect().into())
        .reduce(|acc: Rect<f64>, r| {
            Rect::new(
                Coord {
                    x: acc.min().x.min(r.min().x),
                    y: acc.min().y.min(r.min().y),
                },
                Coord {
                    x: acc.max().x.max(r.max().x),
                    y: acc.max().y.max(r.max().y),
                },
            )
        })
}
