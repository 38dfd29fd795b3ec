// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Host-side triangle mesh

use super::BoundingBox;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Triangle mesh as the host holds it: a position list and a flat index list
/// where every three indices form one triangle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub positions: Vec<Point3<f32>>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count),
            indices: Vec::with_capacity(triangle_count * 3),
        }
    }

    pub fn from_parts(positions: Vec<Point3<f32>>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, position: Point3<f32>) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        index
    }

    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.positions)
    }

    pub fn translate(&mut self, offset: Vector3<f32>) {
        for position in &mut self.positions {
            *position += offset;
        }
    }

    /// Append another mesh; its indices are shifted past ours
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.indices.extend(other.indices.iter().map(|i| i + offset));
    }

    /// Weld vertices that fall in the same `epsilon` cell.
    /// Returns the number of vertices removed.
    pub fn weld_vertices(&mut self, epsilon: f32) -> usize {
        if self.positions.is_empty() || epsilon <= 0.0 {
            return 0;
        }

        let original_count = self.positions.len();
        let mut cells: HashMap<[i64; 3], u32> = HashMap::with_capacity(original_count);
        let mut remap = Vec::with_capacity(original_count);
        let mut welded = Vec::with_capacity(original_count);

        for position in &self.positions {
            let key = [
                (position.x / epsilon).round() as i64,
                (position.y / epsilon).round() as i64,
                (position.z / epsilon).round() as i64,
            ];
            let index = *cells.entry(key).or_insert_with(|| {
                welded.push(*position);
                (welded.len() - 1) as u32
            });
            remap.push(index);
        }

        for index in &mut self.indices {
            *index = remap[*index as usize];
        }
        self.positions = welded;

        original_count - self.positions.len()
    }
}
