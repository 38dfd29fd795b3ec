// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Decomposition parameters and their native parameter block

use crate::error::{DecompositionError, Result};
use serde::{Deserialize, Serialize};

/// How the voxelizer decides which voxels are inside the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum FillMode {
    #[default]
    FloodFill = 0,
    SurfaceOnly = 1,
    RaycastFill = 2,
}

/// Decomposition settings, fixed when a session is constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionParameters {
    /// Upper bound on the number of hulls produced
    pub max_convex_hulls: u32,
    /// Voxel budget for the voxelization pass
    pub max_resolution: u32,
    /// Stop splitting once the volume error drops below this percentage
    pub min_volume_percent_error: f64,
    pub max_recursion_depth: u32,
    /// Project hull vertices back onto the source surface
    pub shrink_wrap: bool,
    pub fill_mode: FillMode,
    pub max_vertices_per_hull: u32,
    /// Let the engine run its own worker threads
    pub is_async: bool,
    /// Smallest voxel edge length before recursion stops
    pub min_edge_length: u32,
    pub find_best_plane: bool,
}

impl Default for DecompositionParameters {
    fn default() -> Self {
        Self {
            max_convex_hulls: 64,
            max_resolution: 400_000,
            min_volume_percent_error: 1.0,
            max_recursion_depth: 10,
            shrink_wrap: true,
            fill_mode: FillMode::FloodFill,
            max_vertices_per_hull: 64,
            is_async: true,
            min_edge_length: 2,
            find_best_plane: false,
        }
    }
}

impl DecompositionParameters {
    pub fn with_max_convex_hulls(mut self, max_convex_hulls: u32) -> Self {
        self.max_convex_hulls = max_convex_hulls;
        self
    }

    pub fn with_max_vertices_per_hull(mut self, max_vertices_per_hull: u32) -> Self {
        self.max_vertices_per_hull = max_vertices_per_hull;
        self
    }

    pub fn with_max_resolution(mut self, max_resolution: u32) -> Self {
        self.max_resolution = max_resolution;
        self
    }

    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    /// Check every field against what the engine accepts
    pub fn validate(&self) -> Result<()> {
        if self.max_convex_hulls == 0 {
            return Err(DecompositionError::invalid_parameter(
                "max_convex_hulls",
                "must be at least 1",
            ));
        }
        if self.max_resolution == 0 {
            return Err(DecompositionError::invalid_parameter(
                "max_resolution",
                "must be at least 1",
            ));
        }
        if self.max_vertices_per_hull < 4 {
            return Err(DecompositionError::invalid_parameter(
                "max_vertices_per_hull",
                "a closed hull needs at least 4 vertices",
            ));
        }
        if !self.min_volume_percent_error.is_finite()
            || !(0.0..=100.0).contains(&self.min_volume_percent_error)
        {
            return Err(DecompositionError::invalid_parameter(
                "min_volume_percent_error",
                format!("{} is not a percentage", self.min_volume_percent_error),
            ));
        }
        Ok(())
    }
}

/// Parameter record in the layout the native engine reads.
///
/// Three pointer-sized slots come first; the engine reserves them for its
/// callback, logger and task-runner hooks. They stay zero here.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterBlock {
    pub reserved: [usize; 3],
    pub max_convex_hulls: i32,
    pub max_resolution: i32,
    pub min_volume_percent_error: f64,
    pub max_recursion_depth: i32,
    pub shrink_wrap: bool,
    pub fill_mode: i32,
    pub max_vertices_per_hull: i32,
    pub is_async: bool,
    pub min_edge_length: i32,
    pub find_best_plane: bool,
}

impl ParameterBlock {
    /// Validate `params` and encode them into the fixed-width layout
    pub fn encode(params: &DecompositionParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            reserved: [0; 3],
            max_convex_hulls: to_slot("max_convex_hulls", params.max_convex_hulls)?,
            max_resolution: to_slot("max_resolution", params.max_resolution)?,
            min_volume_percent_error: params.min_volume_percent_error,
            max_recursion_depth: to_slot("max_recursion_depth", params.max_recursion_depth)?,
            shrink_wrap: params.shrink_wrap,
            fill_mode: params.fill_mode as i32,
            max_vertices_per_hull: to_slot("max_vertices_per_hull", params.max_vertices_per_hull)?,
            is_async: params.is_async,
            min_edge_length: to_slot("min_edge_length", params.min_edge_length)?,
            find_best_plane: params.find_best_plane,
        })
    }

    pub fn fill_mode(&self) -> FillMode {
        match self.fill_mode {
            1 => FillMode::SurfaceOnly,
            2 => FillMode::RaycastFill,
            _ => FillMode::FloodFill,
        }
    }

    /// Vertex limit as an unsigned count; `encode` guarantees it is positive
    pub fn vertex_limit(&self) -> u32 {
        self.max_vertices_per_hull.max(0) as u32
    }

    pub fn hull_limit(&self) -> u32 {
        self.max_convex_hulls.max(0) as u32
    }
}

fn to_slot(name: &'static str, value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| DecompositionError::invalid_parameter(name, format!("{value} exceeds i32::MAX")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let params = DecompositionParameters::default();
        assert_eq!(params.max_convex_hulls, 64);
        assert_eq!(params.max_resolution, 400_000);
        assert_eq!(params.min_volume_percent_error, 1.0);
        assert_eq!(params.max_recursion_depth, 10);
        assert!(params.shrink_wrap);
        assert_eq!(params.fill_mode, FillMode::FloodFill);
        assert_eq!(params.max_vertices_per_hull, 64);
        assert!(params.is_async);
        assert_eq!(params.min_edge_length, 2);
        assert!(!params.find_best_plane);
    }

    #[test]
    fn test_encode_copies_fields() {
        let params = DecompositionParameters::default().with_fill_mode(FillMode::RaycastFill);
        let block = ParameterBlock::encode(&params).unwrap();
        assert_eq!(block.reserved, [0; 3]);
        assert_eq!(block.max_convex_hulls, 64);
        assert_eq!(block.max_resolution, 400_000);
        assert_eq!(block.fill_mode, 2);
        assert_eq!(block.fill_mode(), FillMode::RaycastFill);
        assert_eq!(block.vertex_limit(), 64);
    }

    #[test]
    fn test_encode_rejects_invalid_values() {
        let zero_hulls = DecompositionParameters::default().with_max_convex_hulls(0);
        assert!(matches!(
            ParameterBlock::encode(&zero_hulls),
            Err(DecompositionError::InvalidParameter { name: "max_convex_hulls", .. })
        ));

        let too_wide = DecompositionParameters::default().with_max_resolution(u32::MAX);
        assert!(ParameterBlock::encode(&too_wide).is_err());

        let mut nan_error = DecompositionParameters::default();
        nan_error.min_volume_percent_error = f64::NAN;
        assert!(nan_error.validate().is_err());

        let tiny = DecompositionParameters::default().with_max_vertices_per_hull(3);
        assert!(tiny.validate().is_err());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_parameter_block_layout() {
        use std::mem::{offset_of, size_of};

        assert_eq!(offset_of!(ParameterBlock, max_convex_hulls), 24);
        assert_eq!(offset_of!(ParameterBlock, max_resolution), 28);
        assert_eq!(offset_of!(ParameterBlock, min_volume_percent_error), 32);
        assert_eq!(offset_of!(ParameterBlock, max_recursion_depth), 40);
        assert_eq!(offset_of!(ParameterBlock, shrink_wrap), 44);
        assert_eq!(offset_of!(ParameterBlock, fill_mode), 48);
        assert_eq!(offset_of!(ParameterBlock, max_vertices_per_hull), 52);
        assert_eq!(offset_of!(ParameterBlock, is_async), 56);
        assert_eq!(offset_of!(ParameterBlock, min_edge_length), 60);
        assert_eq!(offset_of!(ParameterBlock, find_best_plane), 64);
        assert_eq!(size_of::<ParameterBlock>(), 72);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let params: DecompositionParameters =
            toml::from_str("max_convex_hulls = 8\nfill_mode = \"surface_only\"\n").unwrap();
        assert_eq!(params.max_convex_hulls, 8);
        assert_eq!(params.fill_mode, FillMode::SurfaceOnly);
        assert_eq!(params.max_vertices_per_hull, 64);
    }
}
