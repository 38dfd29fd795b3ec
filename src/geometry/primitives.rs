// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric primitives generator

use super::Mesh;
use nalgebra::{Point3, Vector3};
use std::f32::consts::PI;

/// Geometric primitives with shared vertices and outward winding
pub enum Primitive {
    Cube { size: Vector3<f32>, center: bool },
    Sphere { r: f32, fn_: u32 },
}

impl Primitive {
    pub fn cube(size: Vector3<f32>, center: bool) -> Self {
        Self::Cube { size, center }
    }

    pub fn sphere(r: f32, fn_: u32) -> Self {
        let segments = if fn_ >= 3 { fn_ } else { 32 };
        Self::Sphere { r, fn_: segments }
    }

    pub fn to_mesh(&self) -> Mesh {
        match self {
            Self::Cube { size, center } => generate_cube_mesh(*size, *center),
            Self::Sphere { r, fn_ } => generate_sphere_mesh(*r, *fn_),
        }
    }
}

/// 8 vertices, 12 triangles
fn generate_cube_mesh(size: Vector3<f32>, center: bool) -> Mesh {
    let min = if center { -size / 2.0 } else { Vector3::zeros() };
    let max = min + size;

    let mut mesh = Mesh::with_capacity(8, 12);
    for z in [min.z, max.z] {
        mesh.add_vertex(Point3::new(min.x, min.y, z));
        mesh.add_vertex(Point3::new(max.x, min.y, z));
        mesh.add_vertex(Point3::new(max.x, max.y, z));
        mesh.add_vertex(Point3::new(min.x, max.y, z));
    }

    const FACES: [[u32; 3]; 12] = [
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 7, 6],
        [3, 6, 2],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];
    for [a, b, c] in FACES {
        mesh.add_triangle(a, b, c);
    }
    mesh
}

fn generate_sphere_mesh(r: f32, segments: u32) -> Mesh {
    let rings = (segments / 2).max(2);
    let mut mesh = Mesh::new();

    let north = mesh.add_vertex(Point3::new(0.0, 0.0, r));
    for i in 1..rings {
        let phi = PI * i as f32 / rings as f32;
        for j in 0..segments {
            let theta = 2.0 * PI * j as f32 / segments as f32;
            mesh.add_vertex(Point3::new(
                r * phi.sin() * theta.cos(),
                r * phi.sin() * theta.sin(),
                r * phi.cos(),
            ));
        }
    }
    let south = mesh.add_vertex(Point3::new(0.0, 0.0, -r));

    let ring_vertex = |ring: u32, j: u32| 1 + (ring - 1) * segments + (j % segments);

    for j in 0..segments {
        mesh.add_triangle(north, ring_vertex(1, j), ring_vertex(1, j + 1));
    }
    for ring in 1..rings - 1 {
        for j in 0..segments {
            let (u0, u1) = (ring_vertex(ring, j), ring_vertex(ring, j + 1));
            let (l0, l1) = (ring_vertex(ring + 1, j), ring_vertex(ring + 1, j + 1));
            mesh.add_triangle(u0, l0, l1);
            mesh.add_triangle(u0, l1, u1);
        }
    }
    for j in 0..segments {
        mesh.add_triangle(ring_vertex(rings - 1, j), south, ring_vertex(rings - 1, j + 1));
    }
    mesh
}
