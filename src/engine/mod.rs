// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Decomposition engine capability interface
//!
//! An engine is an operation table over two kinds of resources: the engine
//! instance created per session, and the transient hull resource created per
//! extraction. Both are released by value, so releasing either twice does not
//! type-check. Sessions and extractors only ever talk to an engine through
//! this trait; which binding sits behind it is up to the implementation.

mod components;
mod parry;
mod reduce;

pub use components::{ComponentEngine, ResourceLedger};
pub use parry::ParryEngine;

use crate::error::Result;
use crate::marshal::MeshView;
use crate::params::ParameterBlock;
use crate::progress::ProgressEvent;

/// Progress sink handed to [`DecompositionEngine::compute`]
pub type ProgressSink<'a> = dyn FnMut(&ProgressEvent) + Send + 'a;

/// Geometry of one hull as the engine stores it: `f64` positions and `u32`
/// index triples. Borrowed from a live hull resource.
#[derive(Debug, Clone, Copy)]
pub struct HullRecord<'h> {
    pub points: &'h [[f64; 3]],
    pub triangles: &'h [[u32; 3]],
}

impl HullRecord<'_> {
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Hull geometry copied out of an engine's result storage. Backends that keep
/// their results in Rust hand one of these out per fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnedHull {
    pub points: Vec<[f64; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl OwnedHull {
    pub fn record(&self) -> HullRecord<'_> {
        HullRecord {
            points: &self.points,
            triangles: &self.triangles,
        }
    }
}

pub trait DecompositionEngine: Send + 'static {
    /// Engine instance owned by one session
    type Instance: Send + 'static;
    /// Transient resource backing one fetched hull
    type Hull;

    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Create an engine instance. Failure here is unrecoverable for the session.
    fn create(&self, params: &ParameterBlock) -> Result<Self::Instance>;

    /// Run the decomposition. Returns `false` when the engine could not
    /// decompose the mesh. `mesh` and `progress` are only borrowed for the
    /// duration of the call.
    fn compute(
        &self,
        instance: &mut Self::Instance,
        mesh: MeshView<'_>,
        params: &ParameterBlock,
        progress: &mut ProgressSink<'_>,
    ) -> bool;

    /// Number of hulls the last successful compute produced
    fn hull_count(&self, instance: &Self::Instance) -> u32;

    /// Acquire the hull resource for `index`, which the caller has range-checked
    fn fetch_hull(&self, instance: &Self::Instance, index: u32) -> Result<Self::Hull>;

    /// Geometry of a fetched hull, valid as long as the resource is
    fn hull_record<'h>(&self, hull: &'h Self::Hull) -> HullRecord<'h>;

    fn release_hull(&self, hull: Self::Hull);

    fn release(&self, instance: Self::Instance);
}
