// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL importer

use crate::geometry::Mesh;
use anyhow::{bail, Context, Result};
use nalgebra::Point3;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Cell size used to weld coincident STL vertices
pub const WELD_EPSILON: f32 = 1e-6;

/// Read an ASCII or binary STL file into an indexed, welded mesh.
///
/// Connectivity matters to the decomposition, so corners shared by
/// neighbouring facets are merged into one vertex.
pub fn import_stl(path: impl AsRef<Path>) -> Result<Mesh> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open STL file: {:?}", path))?;
    let mut reader = BufReader::new(file);
    let stl = stl_io::read_stl(&mut reader)
        .with_context(|| format!("Failed to read STL file: {:?}", path))?;

    if stl.faces.is_empty() {
        bail!("STL file {:?} contains no facets", path);
    }

    let mut mesh = Mesh::with_capacity(stl.vertices.len(), stl.faces.len());
    for vertex in &stl.vertices {
        mesh.add_vertex(Point3::new(vertex[0], vertex[1], vertex[2]));
    }
    for face in &stl.faces {
        let [a, b, c] = face.vertices;
        mesh.add_triangle(a as u32, b as u32, c as u32);
    }

    let removed = mesh.weld_vertices(WELD_EPSILON);
    debug!(
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        removed,
        "imported STL"
    );
    Ok(mesh)
}
