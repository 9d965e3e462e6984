// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # NoiseGrid Geometry
//!
//! Geometry primitives behind the receiver grid generators:
//!
//! - **Buffering**: outward bevel-join buffers assembled with
//!   [i_overlay](https://docs.rs/i_overlay)
//! - **Lines**: boundary extraction, simplification and line/polygon
//!   difference on [geo](https://docs.rs/geo) types
//! - **Resampling**: evenly spaced points along 2D or 3D lines
//! - **Grids**: cell-centre points over an envelope
//!
//! Every function is total: degenerate input (NaN coordinates, zero-length
//! lines, empty buffers) produces empty output instead of an error.

pub mod buffer;
pub mod grid_points;
pub mod lines;
pub mod resample;

pub use buffer::{buffer_polygon, buffer_polygons, buffer_union, signed_area, Join};
pub use grid_points::{envelope_of, grid_size, make_grid_points, GridPoint};
pub use lines::{boundary_lines, difference, simplify_lines, total_length, MIN_PART_LENGTH};
pub use resample::{lift_line, split_line_to_points, split_lines_to_points, split_multiline_at_height};
