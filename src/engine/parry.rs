// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pure-Rust engine backed by parry3d's voxel V-HACD

use super::reduce::fit_hull;
use super::{DecompositionEngine, HullRecord, OwnedHull, ProgressSink};
use crate::error::{DecompositionError, Result};
use crate::marshal::MeshView;
use crate::params::{FillMode, ParameterBlock};
use crate::progress::ProgressEvent;
use parry3d::math::Point;
use parry3d::transformation::vhacd::{VHACDParameters, VHACD};
use parry3d::transformation::voxelization::FillMode as VoxelFillMode;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Coarsest hull downsampling tried while fitting the vertex limit
const MAX_DOWNSAMPLING: u32 = 64;

/// V-HACD backend that runs in-process.
///
/// parry's decomposition has no per-hull vertex cap, so the hull downsampling
/// is doubled until every hull fits `max_vertices_per_hull`. Hulls still too
/// wide at the coarsest downsampling are reduced to their most spread-out
/// vertices. Engine panics are caught and reported as a failed compute.
#[derive(Debug, Clone, Copy)]
pub struct ParryEngine {
    downsampling: u32,
}

impl Default for ParryEngine {
    fn default() -> Self {
        Self { downsampling: 4 }
    }
}

#[derive(Debug, Default)]
pub struct ParryInstance {
    hulls: Vec<OwnedHull>,
}

impl ParryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial hull downsampling, 1 keeps every voxel corner
    pub fn with_downsampling(downsampling: u32) -> Self {
        Self {
            downsampling: downsampling.max(1),
        }
    }
}

fn vhacd_parameters(params: &ParameterBlock) -> VHACDParameters {
    let resolution = (params.max_resolution as f64).cbrt().round().max(8.0) as u32;
    let mut vhacd = VHACDParameters {
        resolution,
        concavity: (params.min_volume_percent_error / 100.0) as f32,
        max_convex_hulls: params.hull_limit(),
        ..VHACDParameters::default()
    };

    match params.fill_mode() {
        FillMode::SurfaceOnly => vhacd.fill_mode = VoxelFillMode::SurfaceOnly,
        FillMode::RaycastFill => debug!("raycast fill is not available, using flood fill"),
        FillMode::FloodFill => {}
    }
    debug!(
        resolution,
        max_recursion_depth = params.max_recursion_depth,
        shrink_wrap = params.shrink_wrap,
        min_edge_length = params.min_edge_length,
        find_best_plane = params.find_best_plane,
        "parameters without a parry equivalent are ignored"
    );
    vhacd
}

impl DecompositionEngine for ParryEngine {
    type Instance = ParryInstance;
    type Hull = OwnedHull;

    fn name(&self) -> &'static str {
        "parry"
    }

    fn create(&self, _params: &ParameterBlock) -> Result<ParryInstance> {
        Ok(ParryInstance::default())
    }

    fn compute(
        &self,
        instance: &mut ParryInstance,
        mesh: MeshView<'_>,
        params: &ParameterBlock,
        progress: &mut ProgressSink<'_>,
    ) -> bool {
        instance.hulls.clear();

        let points: Vec<Point<f32>> = mesh
            .positions
            .chunks_exact(3)
            .map(|c| Point::new(c[0], c[1], c[2]))
            .collect();
        let indices: Vec<[u32; 3]> = mesh.triangles().collect();
        let vhacd_params = vhacd_parameters(params);

        progress(&ProgressEvent::new(0.0, 0.0, "decomposition", "voxelize and split"));
        let decomposition = match panic::catch_unwind(AssertUnwindSafe(|| {
            VHACD::decompose(&vhacd_params, &points, &indices, false)
        })) {
            Ok(decomposition) => decomposition,
            Err(_) => {
                warn!("parry decomposition panicked");
                return false;
            }
        };
        progress(&ProgressEvent::new(0.7, 1.0, "decomposition", "voxelize and split"));

        let limit = params.vertex_limit() as usize;
        let mut downsampling = self.downsampling;
        let hulls = loop {
            let hulls = match panic::catch_unwind(AssertUnwindSafe(|| {
                decomposition.compute_convex_hulls(downsampling)
            })) {
                Ok(hulls) => hulls,
                Err(_) => {
                    warn!(downsampling, "parry hull generation panicked");
                    return false;
                }
            };
            let widest = hulls.iter().map(|(p, _)| p.len()).max().unwrap_or(0);
            if widest <= limit || downsampling >= MAX_DOWNSAMPLING {
                break hulls;
            }
            debug!(widest, limit, downsampling, "hull over vertex limit, coarsening");
            progress(&ProgressEvent::new(
                0.8,
                downsampling as f64 / MAX_DOWNSAMPLING as f64,
                "hull generation",
                "fit vertex limit",
            ));
            downsampling *= 2;
        };

        let mut fitted = Vec::with_capacity(hulls.len());
        for (i, (vertices, triangles)) in hulls.into_iter().enumerate() {
            if triangles.is_empty() {
                continue;
            }
            let Some((vertices, triangles)) = fit_hull(vertices, triangles, limit) else {
                warn!(hull = i, limit, "hull cannot be reduced to the vertex limit");
                return false;
            };
            fitted.push(OwnedHull {
                points: vertices
                    .iter()
                    .map(|p| [p.x as f64, p.y as f64, p.z as f64])
                    .collect(),
                triangles,
            });
        }
        instance.hulls = fitted;
        progress(&ProgressEvent::new(1.0, 1.0, "hull generation", "done"));

        !instance.hulls.is_empty()
    }

    fn hull_count(&self, instance: &ParryInstance) -> u32 {
        instance.hulls.len() as u32
    }

    fn fetch_hull(&self, instance: &ParryInstance, index: u32) -> Result<OwnedHull> {
        instance
            .hulls
            .get(index as usize)
            .cloned()
            .ok_or_else(|| DecompositionError::Engine(format!("no hull stored at {index}")))
    }

    fn hull_record<'h>(&self, hull: &'h OwnedHull) -> HullRecord<'h> {
        hull.record()
    }

    fn release_hull(&self, hull: OwnedHull) {
        drop(hull);
    }

    fn release(&self, instance: ParryInstance) {
        drop(instance);
    }
}
