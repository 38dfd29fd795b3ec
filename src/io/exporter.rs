// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Batch exporters

use crate::batch::{BatchSummary, MeshBatch, MeshDescriptor};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use stl_io::{Normal, Triangle as StlTriangle, Vertex as StlVertex};
use tracing::info;

/// Write one binary STL per hull as `<stem>_<index>.stl` inside `dir`.
///
/// Returns the written paths in hull order.
pub fn export_batch_stl(batch: &MeshBatch, dir: impl AsRef<Path>, stem: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {:?}", dir))?;

    let mut written = Vec::with_capacity(batch.len());
    for (index, mesh) in batch.iter().enumerate() {
        let path = dir.join(format!("{stem}_{index:03}.stl"));
        write_stl(mesh, &path)?;
        written.push(path);
    }

    info!(files = written.len(), dir = ?dir, "exported hull STL files");
    Ok(written)
}

fn write_stl(mesh: &MeshDescriptor, path: &Path) -> Result<()> {
    let indices = mesh.indices.to_u32();
    let triangles: Vec<StlTriangle> = indices
        .chunks_exact(3)
        .map(|tri| {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
            let (p0, p1, p2) = (mesh.positions[a], mesh.positions[b], mesh.positions[c]);

            // Facet normal from the winding, not the smoothed vertex normals
            let normal = (p1 - p0)
                .cross(&(p2 - p0))
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(nalgebra::Vector3::zeros);

            StlTriangle {
                normal: Normal::new([normal.x, normal.y, normal.z]),
                vertices: [
                    StlVertex::new([p0.x, p0.y, p0.z]),
                    StlVertex::new([p1.x, p1.y, p1.z]),
                    StlVertex::new([p2.x, p2.y, p2.z]),
                ],
            }
        })
        .collect();

    let file = File::create(path).with_context(|| format!("Failed to create STL file: {:?}", path))?;
    let mut writer = BufWriter::new(file);
    stl_io::write_stl(&mut writer, triangles.iter()).context("Failed to write STL file")?;
    Ok(())
}

/// Write `summary` as pretty JSON
pub fn write_report(summary: &BatchSummary, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("Failed to write report: {:?}", path))?;
    Ok(())
}
