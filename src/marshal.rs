// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Host mesh to engine buffer marshaling
//!
//! The engine reads vertex positions as packed `f32` triples and triangles as
//! packed `u32` triples through raw pointers. [`RawMeshBuffer`] holds both in
//! boxed slices, so the storage cannot grow or move while a compute call
//! borrows it, and a compute call consumes the buffer so it is freed as soon
//! as the call returns.

use crate::error::{DecompositionError, Result};
use crate::geometry::Mesh;
use nalgebra::Point3;
use tracing::debug;

/// Flat, contiguous copy of a mesh in engine layout
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeshBuffer {
    positions: Box<[f32]>,
    indices: Box<[u32]>,
}

/// Borrowed view handed to an engine for the duration of one compute.
/// Views taken from a [`RawMeshBuffer`] have counts that fit `u32`.
#[derive(Debug, Clone, Copy)]
pub struct MeshView<'a> {
    /// `3 * vertex_count` floats
    pub positions: &'a [f32],
    /// `3 * triangle_count` indices
    pub indices: &'a [u32],
}

impl MeshView<'_> {
    pub fn vertex_count(&self) -> u32 {
        (self.positions.len() / 3) as u32
    }

    pub fn triangle_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    pub fn position(&self, index: u32) -> [f32; 3] {
        let i = index as usize * 3;
        [self.positions[i], self.positions[i + 1], self.positions[i + 2]]
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}

impl RawMeshBuffer {
    /// Marshal a host mesh
    pub fn from_mesh(mesh: &Mesh) -> Result<Self> {
        Self::from_parts(&mesh.positions, &mesh.indices)
    }

    /// Marshal positions plus a flat triangle index list
    pub fn from_parts(positions: &[Point3<f32>], indices: &[u32]) -> Result<Self> {
        if positions.is_empty() || indices.is_empty() {
            return Err(DecompositionError::InvalidMesh(
                "mesh has no vertices or no triangles".into(),
            ));
        }
        if indices.len() % 3 != 0 {
            return Err(DecompositionError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        let vertex_count = count_u32("vertices", positions.len())?;
        count_u32("triangles", indices.len() / 3)?;
        if let Some(bad) = indices.iter().find(|&&i| i >= vertex_count) {
            return Err(DecompositionError::InvalidMesh(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }
        if positions.iter().any(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(DecompositionError::InvalidMesh(
                "vertex positions must be finite".into(),
            ));
        }

        let flat: Box<[f32]> = positions.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
        debug!(
            vertices = positions.len(),
            triangles = indices.len() / 3,
            "marshaled mesh into engine layout"
        );
        Ok(Self {
            positions: flat,
            indices: indices.into(),
        })
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> u32 {
        (self.positions.len() / 3) as u32
    }

    pub fn triangle_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    pub fn view(&self) -> MeshView<'_> {
        MeshView {
            positions: &self.positions,
            indices: &self.indices,
        }
    }
}

/// Engine counts are `u32`; larger meshes cannot be addressed
fn count_u32(what: &str, count: usize) -> Result<u32> {
    u32::try_from(count)
        .map_err(|_| DecompositionError::InvalidMesh(format!("{count} {what} exceed u32")))
}
