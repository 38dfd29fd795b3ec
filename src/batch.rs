// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh batch assembly
//!
//! Turns extracted hulls into independent mesh descriptors. The engine only
//! supplies positions and connectivity, so normals and bounds are derived here.

use crate::error::{DecompositionError, Result};
use crate::geometry::BoundingBox;
use crate::hull::ConvexHull;
use crate::params::DecompositionParameters;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    /// Largest vertex count this format can address
    pub fn max_vertices(self) -> u64 {
        match self {
            Self::U16 => u16::MAX as u64 + 1,
            Self::U32 => u32::MAX as u64 + 1,
        }
    }

    /// Narrowest format able to address `vertex_count` vertices
    pub fn for_vertex_count(vertex_count: u64) -> Self {
        if vertex_count <= Self::U16.max_vertices() {
            Self::U16
        } else {
            Self::U32
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexBuffer {
    fn build(indices: &[u32], vertex_count: usize, format: IndexFormat) -> Result<Self> {
        if vertex_count as u64 > format.max_vertices() {
            return Err(DecompositionError::IndexOverflow {
                vertex_count,
                format,
            });
        }
        Ok(match format {
            IndexFormat::U16 => Self::U16(indices.iter().map(|&i| i as u16).collect()),
            IndexFormat::U32 => Self::U32(indices.to_vec()),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            Self::U16(indices) => indices.len(),
            Self::U32(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> IndexFormat {
        match self {
            Self::U16(_) => IndexFormat::U16,
            Self::U32(_) => IndexFormat::U32,
        }
    }

    /// Widened copy of the indices
    pub fn to_u32(&self) -> Vec<u32> {
        match self {
            Self::U16(indices) => indices.iter().map(|&i| i as u32).collect(),
            Self::U32(indices) => indices.clone(),
        }
    }
}

/// Contiguous range of the index buffer drawn as one part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMesh {
    pub index_start: usize,
    pub index_count: usize,
}

/// One renderable mesh built from one hull
#[derive(Debug, Clone)]
pub struct MeshDescriptor {
    pub positions: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub indices: IndexBuffer,
    pub submeshes: Vec<SubMesh>,
    pub bounds: BoundingBox,
}

impl MeshDescriptor {
    fn from_hull(index: usize, hull: &ConvexHull, format: IndexFormat) -> Result<Self> {
        if hull.triangles.is_empty() || !hull.indices_in_range() {
            return Err(DecompositionError::MalformedHull {
                index,
                reason: format!(
                    "{} triangles do not index {} vertices",
                    hull.triangle_count(),
                    hull.vertex_count()
                ),
            });
        }
        let flat = hull.index_buffer();
        let indices = IndexBuffer::build(&flat, hull.vertex_count(), format)?;

        Ok(Self {
            normals: vertex_normals(&hull.vertices, &hull.triangles),
            bounds: hull.bounding_box(),
            submeshes: vec![SubMesh {
                index_start: 0,
                index_count: indices.len(),
            }],
            positions: hull.vertices.clone(),
            indices,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Area-weighted vertex normals. Vertices touched by no triangle get +Z.
fn vertex_normals(positions: &[Point3<f32>], triangles: &[[u32; 3]]) -> Vec<Vector3<f32>> {
    let mut normals = vec![Vector3::zeros(); positions.len()];
    for &[a, b, c] in triangles {
        let (a, b, c) = (a as usize, b as usize, c as usize);
        // cross product length is twice the area, which is the weight we want
        let face = (positions[b] - positions[a]).cross(&(positions[c] - positions[a]));
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct MeshBatch {
    meshes: Vec<MeshDescriptor>,
}

impl MeshBatch {
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MeshDescriptor> {
        self.meshes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MeshDescriptor> {
        self.meshes.iter()
    }

    pub fn into_meshes(self) -> Vec<MeshDescriptor> {
        self.meshes
    }

    pub fn summary(&self) -> BatchSummary {
        let hulls: Vec<HullSummary> = self
            .meshes
            .iter()
            .enumerate()
            .map(|(index, mesh)| HullSummary {
                index,
                vertex_count: mesh.vertex_count(),
                triangle_count: mesh.triangle_count(),
                min: mesh.bounds.min.coords.into(),
                max: mesh.bounds.max.coords.into(),
                center: mesh.bounds.center().coords.into(),
                bounds_volume: mesh.bounds.volume(),
            })
            .collect();

        BatchSummary {
            hull_count: hulls.len(),
            total_vertices: hulls.iter().map(|h| h.vertex_count).sum(),
            total_triangles: hulls.iter().map(|h| h.triangle_count).sum(),
            index_format: self.meshes.first().map(|mesh| mesh.indices.format()),
            hulls,
        }
    }
}

impl<'a> IntoIterator for &'a MeshBatch {
    type Item = &'a MeshDescriptor;
    type IntoIter = std::slice::Iter<'a, MeshDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.meshes.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HullSummary {
    pub index: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub center: [f32; 3],
    /// Volume of the axis-aligned bounds, not of the hull
    pub bounds_volume: f32,
}

/// Serializable overview of a batch, written by the CLI's `--report`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub hull_count: usize,
    pub total_vertices: usize,
    pub total_triangles: usize,
    pub index_format: Option<IndexFormat>,
    pub hulls: Vec<HullSummary>,
}

#[derive(Debug, Clone, Copy)]
pub struct MeshBatchAssembler {
    format: IndexFormat,
}

impl Default for MeshBatchAssembler {
    fn default() -> Self {
        Self::for_parameters(&DecompositionParameters::default())
    }
}

impl MeshBatchAssembler {
    /// 16-bit indices when `max_vertices_per_hull` fits them, else 32-bit
    pub fn for_parameters(params: &DecompositionParameters) -> Self {
        Self {
            format: IndexFormat::for_vertex_count(params.max_vertices_per_hull as u64),
        }
    }

    pub fn with_index_format(mut self, format: IndexFormat) -> Self {
        self.format = format;
        self
    }

    pub fn index_format(&self) -> IndexFormat {
        self.format
    }

    pub fn assemble(&self, hulls: Vec<ConvexHull>) -> Result<MeshBatch> {
        let meshes = hulls
            .par_iter()
            .enumerate()
            .map(|(index, hull)| MeshDescriptor::from_hull(index, hull, self.format))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            meshes = meshes.len(),
            format = ?self.format,
            "assembled mesh batch"
        );
        Ok(MeshBatch { meshes })
    }
}
