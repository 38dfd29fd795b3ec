// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! V-HACD bridge
//!
//! Drives a convex decomposition engine through one owning session: the host
//! mesh is marshaled into a pinned buffer, computed synchronously or on a
//! worker thread, and each resulting hull is copied out of a transient engine
//! resource before being assembled into independent meshes.
//!
//! ```
//! use vhacd_bridge::{decompose, ComponentEngine, DecompositionParameters, Primitive};
//! use nalgebra::Vector3;
//!
//! let cube = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), true).to_mesh();
//! let batch = decompose(ComponentEngine::new(), &cube, DecompositionParameters::default(), None)
//!     .unwrap()
//!     .expect("a cube decomposes");
//! assert_eq!(batch.len(), 1);
//! ```

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod hull;
pub mod io;
pub mod marshal;
pub mod params;
pub mod progress;
pub mod session;
mod task;

#[cfg(feature = "native")]
pub mod ffi;

pub use batch::{BatchSummary, IndexFormat, MeshBatch, MeshBatchAssembler, MeshDescriptor};
pub use config::{Backend, BridgeConfig};
pub use engine::{ComponentEngine, DecompositionEngine, ParryEngine};
pub use error::{DecompositionError, Result};
pub use geometry::{Mesh, Primitive};
pub use hull::{ConvexHull, HullExtractor};
pub use marshal::RawMeshBuffer;
pub use params::{DecompositionParameters, FillMode};
pub use progress::{ProgressCallback, ProgressEvent};
pub use session::{ComputeOutcome, EngineSession, SessionState};

#[cfg(feature = "native")]
pub use ffi::NativeEngine;

/// Decompose `mesh` on the calling thread.
///
/// Runs create, compute, extraction and assembly in order. `Ok(None)` means
/// the engine reported that it could not decompose the mesh. The session is
/// released on every path.
pub fn decompose<E: DecompositionEngine>(
    engine: E,
    mesh: &Mesh,
    params: DecompositionParameters,
    callback: Option<ProgressCallback>,
) -> Result<Option<MeshBatch>> {
    let assembler = MeshBatchAssembler::for_parameters(&params);
    let buffer = RawMeshBuffer::from_mesh(mesh)?;
    let mut session = EngineSession::new(engine, params)?;
    let outcome = session.compute(buffer, callback);
    collect(session, outcome, assembler)
}

/// Same as [`decompose`], with the compute running on a worker thread.
/// Extraction and assembly run after the future resumes.
pub async fn decompose_async<E: DecompositionEngine>(
    engine: E,
    mesh: &Mesh,
    params: DecompositionParameters,
    callback: Option<ProgressCallback>,
) -> Result<Option<MeshBatch>> {
    let assembler = MeshBatchAssembler::for_parameters(&params);
    let buffer = RawMeshBuffer::from_mesh(mesh)?;
    let mut session = EngineSession::new(engine, params)?;
    let outcome = session.compute_async(buffer, callback).await;
    collect(session, outcome, assembler)
}

fn collect<E: DecompositionEngine>(
    session: EngineSession<E>,
    outcome: Result<ComputeOutcome>,
    assembler: MeshBatchAssembler,
) -> Result<Option<MeshBatch>> {
    let hulls = match outcome {
        Ok(ComputeOutcome::Success) => session.extractor().fetch_all(),
        Ok(ComputeOutcome::Failure) => {
            session.release();
            return Ok(None);
        }
        Err(err) => Err(err),
    };
    session.release();
    assembler.assemble(hulls?).map(Some)
}
