// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Worker-thread compute

use nalgebra::Vector3;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::task::{Context, Wake, Waker};
use std::thread;
use vhacd_bridge::engine::ResourceLedger;
use vhacd_bridge::{
    decompose, decompose_async, ComponentEngine, ComputeOutcome, DecompositionError,
    DecompositionParameters, EngineSession, Mesh, Primitive, ProgressEvent, RawMeshBuffer,
};

struct NoopWaker;

impl Wake for NoopWaker {
    fn wake(self: Arc<Self>) {}
}

fn two_cubes() -> Mesh {
    let mut mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
    let mut other = mesh.clone();
    other.translate(Vector3::new(0.0, 0.0, 5.0));
    mesh.merge(&other);
    mesh
}

#[test]
fn test_async_compute_matches_sync() {
    let mesh = two_cubes();
    let sync = decompose(ComponentEngine::new(), &mesh, DecompositionParameters::default(), None)
        .unwrap()
        .unwrap();
    let deferred = pollster::block_on(decompose_async(
        ComponentEngine::new(),
        &mesh,
        DecompositionParameters::default(),
        None,
    ))
    .unwrap()
    .unwrap();

    assert_eq!(sync.summary(), deferred.summary());
}

#[test]
fn test_callback_runs_on_the_worker() {
    let caller = thread::current().id();
    let threads = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&threads);

    let mut session =
        EngineSession::new(ComponentEngine::new(), DecompositionParameters::default()).unwrap();
    let buffer = RawMeshBuffer::from_mesh(&two_cubes()).unwrap();
    let outcome = pollster::block_on(session.compute_async(
        buffer,
        Some(Box::new(move |_: &ProgressEvent| {
            sink.lock().unwrap().push(thread::current().id())
        })),
    ))
    .unwrap();

    assert_eq!(outcome, ComputeOutcome::Success);
    let threads = threads.lock().unwrap();
    assert!(!threads.is_empty());
    assert!(threads.iter().all(|id| *id != caller));

    // extraction happens back on the calling thread
    assert_eq!(session.extractor().fetch_all().unwrap().len(), 2);
}

#[test]
fn test_async_failure_is_an_outcome() {
    let mut session =
        EngineSession::new(ComponentEngine::failing(), DecompositionParameters::default()).unwrap();
    let buffer = RawMeshBuffer::from_mesh(&two_cubes()).unwrap();
    let outcome = pollster::block_on(session.compute_async(buffer, None)).unwrap();
    assert_eq!(outcome, ComputeOutcome::Failure);
    assert_eq!(session.hull_count(), 0);
}

#[test]
fn test_async_second_compute_is_refused() {
    let mut session =
        EngineSession::new(ComponentEngine::new(), DecompositionParameters::default()).unwrap();
    let mesh = two_cubes();
    pollster::block_on(session.compute_async(RawMeshBuffer::from_mesh(&mesh).unwrap(), None))
        .unwrap();
    let err = session
        .compute(RawMeshBuffer::from_mesh(&mesh).unwrap(), None)
        .unwrap_err();
    assert!(matches!(err, DecompositionError::AlreadyComputed));
}

#[test]
fn test_abandoned_compute_still_releases() {
    let ledger = ResourceLedger::new();
    let engine = ComponentEngine::new().with_ledger(Arc::clone(&ledger));
    let mut session = EngineSession::new(engine, DecompositionParameters::default()).unwrap();
    let buffer = RawMeshBuffer::from_mesh(&two_cubes()).unwrap();

    // start the worker, then drop the future without awaiting completion
    {
        let future = session.compute_async(buffer, None);
        let mut future = std::pin::pin!(future);
        let waker = Waker::from(Arc::new(NoopWaker));
        let _ = future.as_mut().poll(&mut Context::from_waker(&waker));
    }
    assert!(matches!(
        session.compute(RawMeshBuffer::from_mesh(&two_cubes()).unwrap(), None),
        Err(DecompositionError::ComputeInProgress) | Err(DecompositionError::AlreadyComputed)
    ));
    session.release();

    // the worker owns the last reference and releases on exit
    for _ in 0..200 {
        if ledger.instances_released() == 1 {
            break;
        }
        thread::sleep(std::time::Duration::from_millis(5));
    }
    assert_eq!(ledger.instances_released(), 1);
}
