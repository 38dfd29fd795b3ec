// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Convex hull extraction
//!
//! Each fetch acquires one transient hull resource from the engine, copies
//! the geometry into a host-owned [`ConvexHull`] and releases the resource
//! before returning. The release sits in a guard's `Drop`, so it also runs
//! when validation of the copied data fails.

use crate::engine::{DecompositionEngine, HullRecord};
use crate::error::{DecompositionError, Result};
use crate::geometry::BoundingBox;
use crate::session::EngineSession;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, debug_span};

/// One convex piece, owned by the host.
///
/// Positions are narrowed from the engine's `f64` to `f32`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvexHull {
    pub vertices: Vec<Point3<f32>>,
    pub triangles: Vec<[u32; 3]>,
}

impl ConvexHull {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Flat index list, `3 * triangle_count` long
    pub fn index_buffer(&self) -> Vec<u32> {
        self.triangles.iter().flatten().copied().collect()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.vertices)
    }

    /// True when every triangle index addresses a vertex
    pub fn indices_in_range(&self) -> bool {
        let count = self.vertices.len();
        self.triangles
            .iter()
            .flatten()
            .all(|&i| (i as usize) < count)
    }

    /// True when indices are in range and every edge borders exactly two triangles
    pub fn is_closed(&self) -> bool {
        if self.triangles.is_empty() || !self.indices_in_range() {
            return false;
        }
        let mut edges: HashMap<(u32, u32), u32> = HashMap::new();
        for &[a, b, c] in &self.triangles {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *edges.entry((u.min(v), u.max(v))).or_insert(0) += 1;
            }
        }
        edges.values().all(|&n| n == 2)
    }

    /// Enclosed volume, computed from the signed tetrahedra to the origin.
    /// `None` when a triangle addresses a missing vertex.
    pub fn volume(&self) -> Option<f32> {
        let mut signed = 0.0f32;
        for &[a, b, c] in &self.triangles {
            let p0 = self.vertices.get(a as usize)?.coords;
            let p1 = self.vertices.get(b as usize)?.coords;
            let p2 = self.vertices.get(c as usize)?.coords;
            signed += p0.dot(&p1.cross(&p2)) / 6.0;
        }
        Some(signed.abs())
    }
}

/// Owns one transient hull resource; releases it on drop
struct HullGuard<'e, E: DecompositionEngine> {
    engine: &'e E,
    hull: Option<E::Hull>,
    index: u32,
}

impl<'e, E: DecompositionEngine> HullGuard<'e, E> {
    fn acquire(engine: &'e E, instance: &E::Instance, index: u32) -> Result<Self> {
        let hull = engine.fetch_hull(instance, index)?;
        debug!(index, "acquired hull resource");
        Ok(Self {
            engine,
            hull: Some(hull),
            index,
        })
    }

    fn record(&self) -> Result<HullRecord<'_>> {
        self.hull
            .as_ref()
            .map(|hull| self.engine.hull_record(hull))
            .ok_or_else(|| DecompositionError::Engine("hull resource already released".into()))
    }
}

impl<E: DecompositionEngine> Drop for HullGuard<'_, E> {
    fn drop(&mut self) {
        if let Some(hull) = self.hull.take() {
            self.engine.release_hull(hull);
            debug!(index = self.index, "released hull resource");
        }
    }
}

/// Reads hulls out of a computed session, one fetch at a time
pub struct HullExtractor<'s, E: DecompositionEngine> {
    session: &'s EngineSession<E>,
}

impl<'s, E: DecompositionEngine> HullExtractor<'s, E> {
    pub(crate) fn new(session: &'s EngineSession<E>) -> Self {
        Self { session }
    }

    pub fn hull_count(&self) -> u32 {
        self.session.hull_count()
    }

    /// Copy hull `index` out of the engine.
    ///
    /// Fails with [`DecompositionError::NoConvexHulls`] unless the compute
    /// succeeded, and with [`DecompositionError::IndexOutOfRange`] for an index
    /// at or past the hull count.
    pub fn fetch(&self, index: usize) -> Result<ConvexHull> {
        if !self.session.state().is_success() {
            return Err(DecompositionError::NoConvexHulls);
        }
        let count = self.session.hull_count();
        if index >= count as usize {
            return Err(DecompositionError::IndexOutOfRange { index, count });
        }

        let _span = debug_span!("extract_hull", index).entered();
        let handle = self.session.lock_handle()?;
        let guard = HullGuard::acquire(handle.engine(), handle.instance()?, index as u32)?;
        let hull = copy_hull(
            guard.record()?,
            index,
            self.session.parameters().max_vertices_per_hull,
        )?;
        drop(guard);

        Ok(hull)
    }

    /// Extract every hull in index order
    pub fn fetch_all(&self) -> Result<Vec<ConvexHull>> {
        if !self.session.state().is_success() {
            return Err(DecompositionError::NoConvexHulls);
        }
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<ConvexHull>> + '_ {
        (0..self.hull_count() as usize).map(move |i| self.fetch(i))
    }
}

fn copy_hull(record: HullRecord<'_>, index: usize, vertex_limit: u32) -> Result<ConvexHull> {
    let vertex_count = record.vertex_count();
    if vertex_count > vertex_limit as usize {
        return Err(DecompositionError::VertexLimitExceeded {
            index,
            vertex_count,
            limit: vertex_limit,
        });
    }
    if record.triangle_count() == 0 {
        return Err(DecompositionError::MalformedHull {
            index,
            reason: "hull has no triangles".into(),
        });
    }
    if let Some(bad) = record
        .triangles
        .iter()
        .flatten()
        .find(|&&i| i as usize >= vertex_count)
    {
        return Err(DecompositionError::MalformedHull {
            index,
            reason: format!("triangle index {bad} out of range for {vertex_count} vertices"),
        });
    }
    if record.points.iter().flatten().any(|c| !c.is_finite()) {
        return Err(DecompositionError::MalformedHull {
            index,
            reason: "non-finite vertex position".into(),
        });
    }

    Ok(ConvexHull {
        vertices: record
            .points
            .iter()
            .map(|&[x, y, z]| Point3::new(x as f32, y as f32, z as f32))
            .collect(),
        triangles: record.triangles.to_vec(),
    })
}
