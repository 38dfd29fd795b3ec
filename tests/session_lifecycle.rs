// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Session state machine and resource ownership

use nalgebra::Vector3;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vhacd_bridge::engine::{HullRecord, OwnedHull, ProgressSink, ResourceLedger};
use vhacd_bridge::marshal::MeshView;
use vhacd_bridge::params::ParameterBlock;
use vhacd_bridge::{
    ComponentEngine, ComputeOutcome, DecompositionEngine, DecompositionError,
    DecompositionParameters, EngineSession, Primitive, ProgressEvent, RawMeshBuffer, SessionState,
};

fn cube_buffer() -> RawMeshBuffer {
    let mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), true).to_mesh();
    RawMeshBuffer::from_mesh(&mesh).unwrap()
}

fn sphere_buffer() -> RawMeshBuffer {
    let mesh = Primitive::sphere(1.0, 24).to_mesh();
    RawMeshBuffer::from_mesh(&mesh).unwrap()
}

#[test]
fn test_extraction_before_compute_is_refused() {
    let session =
        EngineSession::new(ComponentEngine::new(), DecompositionParameters::default()).unwrap();
    assert_eq!(session.hull_count(), 0);
    for index in [0, 1, usize::MAX] {
        let err = session.hull(index).unwrap_err();
        assert!(matches!(err, DecompositionError::NoConvexHulls));
        assert!(err.is_usage_error());
    }
    session.release();
}

#[test]
fn test_failed_compute_reads_as_no_hulls() {
    let ledger = ResourceLedger::new();
    let engine = ComponentEngine::failing().with_ledger(Arc::clone(&ledger));
    let mut session = EngineSession::new(engine, DecompositionParameters::default()).unwrap();

    let outcome = session.compute(cube_buffer(), None).unwrap();
    assert_eq!(outcome, ComputeOutcome::Failure);
    assert_eq!(
        session.state(),
        SessionState::Computed(ComputeOutcome::Failure)
    );
    assert_eq!(session.hull_count(), 0);
    assert!(matches!(
        session.extractor().fetch_all(),
        Err(DecompositionError::NoConvexHulls)
    ));
    assert_eq!(ledger.hulls_fetched(), 0);

    session.release();
    assert_eq!(ledger.instances_released(), 1);
}

#[test]
fn test_second_compute_leaves_first_result_intact() {
    let mut session =
        EngineSession::new(ComponentEngine::new(), DecompositionParameters::default()).unwrap();
    session.compute(cube_buffer(), None).unwrap();
    let before = session.hull(0).unwrap();

    let err = session.compute(sphere_buffer(), None).unwrap_err();
    assert!(matches!(err, DecompositionError::AlreadyComputed));
    assert_eq!(session.hull_count(), 1);
    assert_eq!(session.hull(0).unwrap(), before);
}

#[test]
fn test_every_fetch_releases_its_hull() {
    let ledger = ResourceLedger::new();
    let engine = ComponentEngine::new().with_ledger(Arc::clone(&ledger));
    let mut session = EngineSession::new(engine, DecompositionParameters::default()).unwrap();
    session.compute(cube_buffer(), None).unwrap();

    for _ in 0..3 {
        session.hull(0).unwrap();
        assert_eq!(ledger.live_hulls(), 0);
    }
    assert_eq!(ledger.hulls_fetched(), 3);
    assert_eq!(ledger.hulls_released(), 3);
}

/// Engine whose single hull references a vertex it does not have
#[derive(Default)]
struct MalformedEngine {
    hulls_fetched: Arc<AtomicUsize>,
    hulls_released: Arc<AtomicUsize>,
}

impl DecompositionEngine for MalformedEngine {
    type Instance = ();
    type Hull = OwnedHull;

    fn name(&self) -> &'static str {
        "malformed"
    }

    fn create(&self, _params: &ParameterBlock) -> vhacd_bridge::Result<()> {
        Ok(())
    }

    fn compute(
        &self,
        _instance: &mut (),
        _mesh: MeshView<'_>,
        _params: &ParameterBlock,
        _progress: &mut ProgressSink<'_>,
    ) -> bool {
        true
    }

    fn hull_count(&self, _instance: &()) -> u32 {
        1
    }

    fn fetch_hull(&self, _instance: &(), _index: u32) -> vhacd_bridge::Result<OwnedHull> {
        self.hulls_fetched.fetch_add(1, Ordering::SeqCst);
        Ok(OwnedHull {
            points: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            triangles: vec![[0, 1, 2], [0, 1, 9]],
        })
    }

    fn hull_record<'h>(&self, hull: &'h OwnedHull) -> HullRecord<'h> {
        hull.record()
    }

    fn release_hull(&self, _hull: OwnedHull) {
        self.hulls_released.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self, _instance: ()) {}
}

#[test]
fn test_hull_is_released_when_copy_fails() {
    let engine = MalformedEngine::default();
    let fetched = Arc::clone(&engine.hulls_fetched);
    let released = Arc::clone(&engine.hulls_released);
    let mut session = EngineSession::new(engine, DecompositionParameters::default()).unwrap();
    assert!(session.compute(cube_buffer(), None).unwrap().is_success());

    let err = session.hull(0).unwrap_err();
    assert!(matches!(err, DecompositionError::MalformedHull { index: 0, .. }));
    assert!(!err.is_usage_error());
    assert_eq!(fetched.load(Ordering::SeqCst), 1);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_curved_hull_fits_vertex_limit() {
    for limit in [64, 8] {
        let ledger = ResourceLedger::new();
        let engine = ComponentEngine::new().with_ledger(Arc::clone(&ledger));
        let params = DecompositionParameters::default().with_max_vertices_per_hull(limit);
        let mut session = EngineSession::new(engine, params).unwrap();
        assert!(session.compute(sphere_buffer(), None).unwrap().is_success());
        assert_eq!(session.hull_count(), 1);

        let hulls = session.extractor().fetch_all().unwrap();
        assert!(hulls[0].vertex_count() <= limit as usize);
        assert!(hulls[0].vertex_count() >= 4);
        assert!(hulls[0].is_closed());
        assert_eq!(ledger.live_hulls(), 0);
    }
}

#[test]
fn test_dropping_a_session_releases_the_instance() {
    let ledger = ResourceLedger::new();
    {
        let engine = ComponentEngine::new().with_ledger(Arc::clone(&ledger));
        let mut session = EngineSession::new(engine, DecompositionParameters::default()).unwrap();
        session.compute(cube_buffer(), None).unwrap();
    }
    assert_eq!(ledger.instances_created(), 1);
    assert_eq!(ledger.instances_released(), 1);
}

#[test]
fn test_progress_is_delivered_during_compute_only() {
    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let mut session =
        EngineSession::new(ComponentEngine::new(), DecompositionParameters::default()).unwrap();

    session
        .compute(
            cube_buffer(),
            Some(Box::new(move |event: &ProgressEvent| {
                sink.lock().unwrap().push(event.clone())
            })),
        )
        .unwrap();

    let seen = events.lock().unwrap().clone();
    assert!(!seen.is_empty());
    assert!(seen
        .iter()
        .all(|e| (0.0..=1.0).contains(&e.overall_progress)));
    assert!((seen.last().unwrap().overall_progress - 1.0).abs() < 1e-9);

    session.hull(0).unwrap();
    session.release();
    assert_eq!(events.lock().unwrap().len(), seen.len());
}
