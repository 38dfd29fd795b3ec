// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Raw declarations of the native decomposition library

use crate::params::ParameterBlock;
use std::os::raw::{c_char, c_void};

/// Opaque engine interface pointer
pub type RawEngine = *mut c_void;

/// Handle to a native hull allocation, zero when unset
pub type RawHullHandle = isize;

pub type RawProgressCallback = extern "C" fn(
    overall_progress: f64,
    stage_progress: f64,
    stage: *const c_char,
    operation: *const c_char,
);

/// Hull record filled by `GetConvexHull`. The arrays belong to the hull
/// allocation and are valid until `ReleaseConvexHull`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawHullRecord {
    pub points: *const [f64; 3],
    pub n_points: u32,
    pub triangles: *const [u32; 3],
    pub n_triangles: u32,
}

impl Default for RawHullRecord {
    fn default() -> Self {
        Self {
            points: std::ptr::null(),
            n_points: 0,
            triangles: std::ptr::null(),
            n_triangles: 0,
        }
    }
}

#[link(name = "UnityVHACD")]
extern "C" {
    pub fn CreateVHACD(params: *mut ParameterBlock) -> RawEngine;

    /// Blocks until the engine reports ready. `params` is written to: the
    /// engine stores the callback in the first reserved slot.
    pub fn Compute(
        engine: RawEngine,
        points: *const f32,
        point_count: u32,
        triangles: *const u32,
        triangle_count: u32,
        params: *mut ParameterBlock,
        callback: Option<RawProgressCallback>,
    ) -> bool;

    pub fn GetNConvexHulls(engine: RawEngine) -> u32;

    pub fn GetConvexHull(
        handle: *mut RawHullHandle,
        engine: RawEngine,
        index: u32,
        record: *mut RawHullRecord,
    );

    pub fn ReleaseConvexHull(handle: RawHullHandle);

    pub fn ReleaseVHACD(engine: RawEngine);
}
