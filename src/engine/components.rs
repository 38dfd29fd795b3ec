// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Deterministic engine: one exact convex hull per connected component
//!
//! Meshes assembled from convex pieces (the usual collision proxies) come
//! back exactly, which makes this backend a reference for tests and tools.
//! Components past `max_convex_hulls` are folded into the last hull, hulls
//! wider than `max_vertices_per_hull` are reduced to their most spread-out
//! vertices, and a component without volume makes the compute report failure.

use super::reduce::limited_hull;
use super::{DecompositionEngine, HullRecord, OwnedHull, ProgressSink};
use crate::error::{DecompositionError, Result};
use crate::marshal::MeshView;
use crate::params::ParameterBlock;
use crate::progress::ProgressEvent;
use parry3d::math::Point;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Counts engine resources as they are acquired and released
#[derive(Debug, Default)]
pub struct ResourceLedger {
    instances_created: AtomicUsize,
    instances_released: AtomicUsize,
    hulls_fetched: AtomicUsize,
    hulls_released: AtomicUsize,
}

impl ResourceLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn instances_created(&self) -> usize {
        self.instances_created.load(Ordering::SeqCst)
    }

    pub fn instances_released(&self) -> usize {
        self.instances_released.load(Ordering::SeqCst)
    }

    pub fn hulls_fetched(&self) -> usize {
        self.hulls_fetched.load(Ordering::SeqCst)
    }

    pub fn hulls_released(&self) -> usize {
        self.hulls_released.load(Ordering::SeqCst)
    }

    pub fn live_instances(&self) -> usize {
        self.instances_created() - self.instances_released()
    }

    pub fn live_hulls(&self) -> usize {
        self.hulls_fetched() - self.hulls_released()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComponentEngine {
    ledger: Option<Arc<ResourceLedger>>,
    fail_compute: bool,
}

#[derive(Debug, Default)]
pub struct ComponentInstance {
    hulls: Vec<OwnedHull>,
}

impl ComponentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every acquire and release in `ledger`
    pub fn with_ledger(mut self, ledger: Arc<ResourceLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// An engine whose every compute reports failure
    pub fn failing() -> Self {
        Self {
            ledger: None,
            fail_compute: true,
        }
    }

    fn count(&self, counter: impl Fn(&ResourceLedger) -> &AtomicUsize) {
        if let Some(ledger) = &self.ledger {
            counter(ledger).fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl DecompositionEngine for ComponentEngine {
    type Instance = ComponentInstance;
    type Hull = OwnedHull;

    fn name(&self) -> &'static str {
        "components"
    }

    fn create(&self, _params: &ParameterBlock) -> Result<ComponentInstance> {
        self.count(|l| &l.instances_created);
        Ok(ComponentInstance::default())
    }

    fn compute(
        &self,
        instance: &mut ComponentInstance,
        mesh: MeshView<'_>,
        params: &ParameterBlock,
        progress: &mut ProgressSink<'_>,
    ) -> bool {
        instance.hulls.clear();
        if self.fail_compute {
            return false;
        }

        progress(&ProgressEvent::new(0.0, 0.0, "connectivity", "union-find"));
        let mut groups = connected_components(mesh);
        let limit = params.hull_limit().max(1) as usize;
        if groups.len() > limit {
            debug!(components = groups.len(), limit, "folding extra components into last hull");
            let extra: Vec<u32> = groups.drain(limit..).flatten().collect();
            if let Some(last) = groups.last_mut() {
                last.extend(extra);
            }
        }
        progress(&ProgressEvent::new(0.2, 1.0, "connectivity", "union-find"));

        let total = groups.len();
        let vertex_limit = params.vertex_limit() as usize;
        for (i, group) in groups.iter().enumerate() {
            let points: Vec<Point<f32>> = group
                .iter()
                .map(|&v| {
                    let [x, y, z] = mesh.position(v);
                    Point::new(x, y, z)
                })
                .collect();

            let Some((vertices, triangles)) = limited_hull(&points, vertex_limit) else {
                warn!(component = i, "component has no volume, cannot build a hull");
                instance.hulls.clear();
                return false;
            };
            instance.hulls.push(OwnedHull {
                points: vertices
                    .iter()
                    .map(|p| [p.x as f64, p.y as f64, p.z as f64])
                    .collect(),
                triangles,
            });

            let done = (i + 1) as f64 / total as f64;
            progress(&ProgressEvent::new(
                0.2 + 0.8 * done,
                done,
                "hull generation",
                format!("component {i}"),
            ));
        }
        true
    }

    fn hull_count(&self, instance: &ComponentInstance) -> u32 {
        instance.hulls.len() as u32
    }

    fn fetch_hull(&self, instance: &ComponentInstance, index: u32) -> Result<OwnedHull> {
        let hull = instance
            .hulls
            .get(index as usize)
            .cloned()
            .ok_or_else(|| DecompositionError::Engine(format!("no hull stored at {index}")))?;
        self.count(|l| &l.hulls_fetched);
        Ok(hull)
    }

    fn hull_record<'h>(&self, hull: &'h OwnedHull) -> HullRecord<'h> {
        hull.record()
    }

    fn release_hull(&self, hull: OwnedHull) {
        drop(hull);
        self.count(|l| &l.hulls_released);
    }

    fn release(&self, instance: ComponentInstance) {
        drop(instance);
        self.count(|l| &l.instances_released);
    }
}

/// Vertex sets of the mesh's connected components, ordered by the first
/// triangle that touches each component.
fn connected_components(mesh: MeshView<'_>) -> Vec<Vec<u32>> {
    let mut parent: Vec<u32> = (0..mesh.vertex_count()).collect();

    fn find(parent: &mut [u32], mut v: u32) -> u32 {
        while parent[v as usize] != v {
            let grandparent = parent[parent[v as usize] as usize];
            parent[v as usize] = grandparent;
            v = grandparent;
        }
        v
    }

    for [a, b, c] in mesh.triangles() {
        let ra = find(&mut parent, a);
        for other in [b, c] {
            let ro = find(&mut parent, other);
            if ro != ra {
                parent[ro as usize] = ra;
            }
        }
    }

    let mut group_of_root = vec![usize::MAX; parent.len()];
    let mut seen = vec![false; parent.len()];
    let mut groups: Vec<Vec<u32>> = Vec::new();
    for triangle in mesh.triangles() {
        for v in triangle {
            if seen[v as usize] {
                continue;
            }
            seen[v as usize] = true;
            let root = find(&mut parent, v) as usize;
            if group_of_root[root] == usize::MAX {
                group_of_root[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[group_of_root[root]].push(v);
        }
    }
    groups
}
