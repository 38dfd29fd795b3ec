// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - STL import, per-hull export and reports

mod exporter;
mod importer;

pub use exporter::{export_batch_stl, write_report};
pub use importer::{import_stl, WELD_EPSILON};
