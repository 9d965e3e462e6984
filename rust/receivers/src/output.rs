// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use noisegrid_core::{GridType, Srid, TableName};
use serde::Serialize;

/// Tables written by one generator run, handed on to propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridOutput {
    pub grid_type: GridType,
    pub receivers: TableName,
    pub triangles: Option<TableName>,
    pub srid: Srid,
    pub receiver_count: usize,
    pub triangle_count: usize,
}
