// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL import, per-hull export and the JSON report

use anyhow::Result;
use nalgebra::Vector3;
use std::fs::File;
use vhacd_bridge::{decompose, io, BatchSummary, ComponentEngine, DecompositionParameters, Primitive};

fn write_cube_stl(path: &std::path::Path) -> Result<()> {
    let mesh = Primitive::cube(Vector3::new(2.0, 2.0, 2.0), false).to_mesh();
    // facet soup, the way STL stores it: every facet repeats its corners
    let triangles: Vec<stl_io::Triangle> = mesh
        .triangles()
        .map(|[a, b, c]| {
            let corner = |i: u32| {
                let p = mesh.positions[i as usize];
                stl_io::Vertex::new([p.x, p.y, p.z])
            };
            stl_io::Triangle {
                normal: stl_io::Normal::new([0.0, 0.0, 0.0]),
                vertices: [corner(a), corner(b), corner(c)],
            }
        })
        .collect();
    let mut file = File::create(path)?;
    stl_io::write_stl(&mut file, triangles.iter())?;
    Ok(())
}

#[test]
fn test_import_welds_facet_corners() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cube.stl");
    write_cube_stl(&path)?;

    let mesh = io::import_stl(&path)?;
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(mesh.vertex_count(), 8);
    Ok(())
}

#[test]
fn test_import_decompose_export() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("cube.stl");
    write_cube_stl(&input)?;

    let mesh = io::import_stl(&input)?;
    let batch = decompose(ComponentEngine::new(), &mesh, DecompositionParameters::default(), None)?
        .expect("cube decomposes");

    let out_dir = dir.path().join("hulls");
    let written = io::export_batch_stl(&batch, &out_dir, "cube")?;
    assert_eq!(written.len(), 1);

    // an exported hull imports back to the same shape
    let hull = io::import_stl(&written[0])?;
    assert_eq!(hull.triangle_count(), 12);
    assert_eq!(hull.vertex_count(), 8);
    let (bounds, expected) = (hull.bounding_box(), mesh.bounding_box());
    assert!((bounds.min - expected.min).amax() < 1e-6);
    assert!((bounds.max - expected.max).amax() < 1e-6);

    let report = dir.path().join("report.json");
    io::write_report(&batch.summary(), &report)?;
    let parsed: BatchSummary = serde_json::from_str(&std::fs::read_to_string(&report)?)?;
    assert_eq!(parsed, batch.summary());
    Ok(())
}
