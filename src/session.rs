// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Engine session: owns one engine instance for its whole lifetime
//!
//! ```text
//! Created --compute--> Computing --> Computed(Success | Failure) --release--> (gone)
//! ```
//!
//! A session accepts exactly one compute call, in either mode. Hull data is
//! only reachable after `Computed(Success)`. Releasing consumes the session,
//! so a released session cannot be computed, queried or released again:
//!
//! ```compile_fail
//! use vhacd_bridge::{ComponentEngine, DecompositionParameters, EngineSession};
//!
//! let session = EngineSession::new(ComponentEngine::new(), DecompositionParameters::default()).unwrap();
//! session.release();
//! session.hull_count();
//! ```

use crate::engine::DecompositionEngine;
use crate::error::{DecompositionError, Result};
use crate::hull::{ConvexHull, HullExtractor};
use crate::marshal::RawMeshBuffer;
use crate::params::{DecompositionParameters, ParameterBlock};
use crate::progress::{ProgressBridge, ProgressCallback};
use crate::task::ComputeTask;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

/// Result of a compute call as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeOutcome {
    Success,
    Failure,
}

impl ComputeOutcome {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Computing,
    Computed(ComputeOutcome),
}

impl SessionState {
    pub fn is_success(self) -> bool {
        self == Self::Computed(ComputeOutcome::Success)
    }
}

/// Engine, its instance and the encoded parameters. The instance is released
/// exactly once, when the last owner drops this handle.
pub(crate) struct EngineHandle<E: DecompositionEngine> {
    engine: E,
    instance: Option<E::Instance>,
    block: Box<ParameterBlock>,
}

impl<E: DecompositionEngine> EngineHandle<E> {
    pub(crate) fn engine(&self) -> &E {
        &self.engine
    }

    pub(crate) fn instance(&self) -> Result<&E::Instance> {
        self.instance
            .as_ref()
            .ok_or_else(|| DecompositionError::Engine("engine instance already released".into()))
    }

    fn hull_count(&self) -> u32 {
        self.instance
            .as_ref()
            .map_or(0, |instance| self.engine.hull_count(instance))
    }

    fn run(&mut self, buffer: &RawMeshBuffer, callback: Option<ProgressCallback>) -> bool {
        let Self {
            engine,
            instance,
            block,
        } = self;
        let Some(instance) = instance.as_mut() else {
            return false;
        };

        let mut bridge = ProgressBridge::new(callback);
        let start = Instant::now();
        let succeeded = engine.compute(instance, buffer.view(), &**block, &mut |event| {
            bridge.emit(event)
        });
        let events = bridge.finish();

        info!(
            backend = engine.name(),
            succeeded,
            events,
            vertices = buffer.vertex_count(),
            triangles = buffer.triangle_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "engine compute returned"
        );
        succeeded
    }
}

impl<E: DecompositionEngine> Drop for EngineHandle<E> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.engine.release(instance);
            debug!(backend = self.engine.name(), "released engine instance");
        }
    }
}

/// Owning handle over one engine instance
pub struct EngineSession<E: DecompositionEngine> {
    params: DecompositionParameters,
    shared: Arc<Mutex<EngineHandle<E>>>,
    state: SessionState,
    hull_count: u32,
}

impl<E: DecompositionEngine> EngineSession<E> {
    /// Encode the parameters and create the engine instance
    pub fn new(engine: E, params: DecompositionParameters) -> Result<Self> {
        let block = Box::new(ParameterBlock::encode(&params)?);
        let instance = engine.create(&block)?;
        info!(
            backend = engine.name(),
            max_convex_hulls = params.max_convex_hulls,
            max_vertices_per_hull = params.max_vertices_per_hull,
            "created engine session"
        );

        Ok(Self {
            params,
            shared: Arc::new(Mutex::new(EngineHandle {
                engine,
                instance: Some(instance),
                block,
            })),
            state: SessionState::Created,
            hull_count: 0,
        })
    }

    pub fn parameters(&self) -> &DecompositionParameters {
        &self.params
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Decompose `buffer` on the calling thread.
    ///
    /// An engine-reported failure is `Ok(ComputeOutcome::Failure)`. The buffer
    /// is freed before this returns, whatever the outcome.
    pub fn compute(
        &mut self,
        buffer: RawMeshBuffer,
        callback: Option<ProgressCallback>,
    ) -> Result<ComputeOutcome> {
        self.begin_compute()?;
        let _span = info_span!("compute", mode = "sync").entered();

        let result = match self.shared.lock() {
            Ok(mut handle) => Ok(handle.run(&buffer, callback)),
            Err(_) => Err(DecompositionError::Poisoned),
        };
        drop(buffer);
        self.finish(result)
    }

    /// Decompose `buffer` on a worker thread and resume once it is done.
    ///
    /// Only the engine call runs on the worker; the outcome is recorded after
    /// resumption. There is no cancellation: dropping the future leaves the
    /// worker running and the session stuck in `Computing`, its result lost.
    pub async fn compute_async(
        &mut self,
        buffer: RawMeshBuffer,
        callback: Option<ProgressCallback>,
    ) -> Result<ComputeOutcome> {
        self.begin_compute()?;

        let shared = Arc::clone(&self.shared);
        let span = info_span!("compute", mode = "async");
        let spawned = ComputeTask::spawn("vhacd-compute", move || {
            let _entered = span.entered();
            let result = match shared.lock() {
                Ok(mut handle) => Ok(handle.run(&buffer, callback)),
                Err(_) => Err(DecompositionError::Poisoned),
            };
            drop(buffer);
            result
        });

        let result = match spawned {
            Ok(task) => task.await.and_then(|result| result),
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    /// Number of hulls; 0 unless the compute succeeded
    pub fn hull_count(&self) -> u32 {
        if self.state.is_success() {
            self.hull_count
        } else {
            0
        }
    }

    pub fn extractor(&self) -> HullExtractor<'_, E> {
        HullExtractor::new(self)
    }

    /// Extract hull `index`, see [`HullExtractor::fetch`]
    pub fn hull(&self, index: usize) -> Result<ConvexHull> {
        self.extractor().fetch(index)
    }

    /// Release the parameter block and the engine instance.
    ///
    /// If an abandoned async compute is still running, the instance is
    /// released when that worker finishes.
    pub fn release(self) {
        let deferred = Arc::strong_count(&self.shared) > 1;
        debug!(deferred, state = ?self.state, "releasing engine session");
    }

    pub(crate) fn lock_handle(&self) -> Result<MutexGuard<'_, EngineHandle<E>>> {
        self.shared.lock().map_err(|_| DecompositionError::Poisoned)
    }

    fn begin_compute(&mut self) -> Result<()> {
        match self.state {
            SessionState::Created => {
                self.state = SessionState::Computing;
                Ok(())
            }
            SessionState::Computing => Err(DecompositionError::ComputeInProgress),
            SessionState::Computed(_) => Err(DecompositionError::AlreadyComputed),
        }
    }

    fn finish(&mut self, result: Result<bool>) -> Result<ComputeOutcome> {
        let succeeded = match result {
            Ok(succeeded) => succeeded,
            Err(err) => {
                self.state = SessionState::Computed(ComputeOutcome::Failure);
                return Err(err);
            }
        };

        if !succeeded {
            warn!("engine reported decomposition failure");
            self.state = SessionState::Computed(ComputeOutcome::Failure);
            return Ok(ComputeOutcome::Failure);
        }

        let count = match self.shared.lock() {
            Ok(handle) => handle.hull_count(),
            Err(_) => {
                self.state = SessionState::Computed(ComputeOutcome::Failure);
                return Err(DecompositionError::Poisoned);
            }
        };
        self.hull_count = count;
        self.state = SessionState::Computed(ComputeOutcome::Success);
        info!(hull_count = count, "decomposition succeeded");
        Ok(ComputeOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ComponentEngine, ResourceLedger};
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    fn cube_buffer() -> RawMeshBuffer {
        let mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        RawMeshBuffer::from_mesh(&mesh).unwrap()
    }

    #[test]
    fn test_fresh_session_has_no_hulls() {
        let session =
            EngineSession::new(ComponentEngine::new(), DecompositionParameters::default()).unwrap();
        assert_eq!(session.state(), SessionState::Created);
        assert_eq!(session.hull_count(), 0);
        assert!(matches!(session.hull(0), Err(DecompositionError::NoConvexHulls)));
    }

    #[test]
    fn test_compute_transitions_to_success() {
        let mut session =
            EngineSession::new(ComponentEngine::new(), DecompositionParameters::default()).unwrap();
        let outcome = session.compute(cube_buffer(), None).unwrap();
        assert_eq!(outcome, ComputeOutcome::Success);
        assert!(session.state().is_success());
        assert_eq!(session.hull_count(), 1);
    }

    #[test]
    fn test_second_compute_is_refused() {
        let mut session =
            EngineSession::new(ComponentEngine::new(), DecompositionParameters::default()).unwrap();
        session.compute(cube_buffer(), None).unwrap();
        let err = session.compute(cube_buffer(), None).unwrap_err();
        assert!(matches!(err, DecompositionError::AlreadyComputed));
        assert!(err.is_usage_error());
        assert_eq!(session.hull_count(), 1);
    }

    #[test]
    fn test_invalid_parameters_fail_construction() {
        let ledger = ResourceLedger::new();
        let engine = ComponentEngine::new().with_ledger(Arc::clone(&ledger));
        let params = DecompositionParameters::default().with_max_convex_hulls(0);
        assert!(EngineSession::new(engine, params).is_err());
        assert_eq!(ledger.instances_created(), 0);
    }

    #[test]
    fn test_release_frees_instance_once() {
        let ledger = ResourceLedger::new();
        let engine = ComponentEngine::new().with_ledger(Arc::clone(&ledger));
        let mut session = EngineSession::new(engine, DecompositionParameters::default()).unwrap();
        session.compute(cube_buffer(), None).unwrap();
        assert_eq!(ledger.live_instances(), 1);

        session.release();
        assert_eq!(ledger.instances_released(), 1);
        assert_eq!(ledger.live_instances(), 0);
    }
}
