// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Native V-HACD backend
//!
//! Links the prebuilt decomposition library. Its progress callback carries no
//! user-data pointer, so the active sink lives in a process-wide slot and
//! native computes are serialized behind one gate.

mod bindings;

use crate::engine::{DecompositionEngine, HullRecord, ProgressSink};
use crate::error::{DecompositionError, Result};
use crate::marshal::MeshView;
use crate::params::ParameterBlock;
use crate::progress::ProgressEvent;
use bindings::{RawEngine, RawHullHandle, RawHullRecord};
use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::Mutex;
use tracing::{trace, warn};

static COMPUTE_GATE: Mutex<()> = Mutex::new(());
static PROGRESS_SINK: Mutex<Option<SinkSlot>> = Mutex::new(None);

/// Sink of the compute currently running. Only set while that compute's
/// borrow of the sink is alive.
struct SinkSlot(*mut ProgressSink<'static>);

// SAFETY: the sink is `Send` and every access goes through PROGRESS_SINK.
unsafe impl Send for SinkSlot {}

/// Clears the sink slot when the compute returns or unwinds
struct InstalledSink;

impl InstalledSink {
    fn install(sink: &mut ProgressSink<'_>) -> Self {
        let raw: *mut ProgressSink<'_> = sink;
        // SAFETY: only the lifetime is erased; `Drop` removes the pointer
        // before the borrow it came from ends.
        let raw: *mut ProgressSink<'static> = unsafe { std::mem::transmute(raw) };
        *lock_slot() = Some(SinkSlot(raw));
        Self
    }
}

impl Drop for InstalledSink {
    fn drop(&mut self) {
        *lock_slot() = None;
    }
}

fn lock_slot() -> std::sync::MutexGuard<'static, Option<SinkSlot>> {
    PROGRESS_SINK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lossy(text: *const c_char) -> String {
    if text.is_null() {
        return String::new();
    }
    // SAFETY: the engine passes NUL-terminated stage names
    unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
}

extern "C" fn progress_trampoline(
    overall_progress: f64,
    stage_progress: f64,
    stage: *const c_char,
    operation: *const c_char,
) {
    let slot = lock_slot();
    let Some(&SinkSlot(sink)) = slot.as_ref() else {
        trace!("progress event outside a native compute dropped");
        return;
    };
    let event = ProgressEvent::new(overall_progress, stage_progress, lossy(stage), lossy(operation));
    // SAFETY: the slot is only populated while the sink borrow is live, and
    // holding the slot lock keeps calls from racing each other.
    let sink = unsafe { &mut *sink };
    // unwinding into C is undefined
    if panic::catch_unwind(AssertUnwindSafe(|| sink(&event))).is_err() {
        warn!("progress callback panicked");
    }
}

/// Engine interface owned by one session
pub struct NativeInstance(NonNull<std::os::raw::c_void>);

// SAFETY: the interface is only driven by the session that owns it, behind
// the session's mutex.
unsafe impl Send for NativeInstance {}

impl NativeInstance {
    fn raw(&self) -> RawEngine {
        self.0.as_ptr()
    }
}

/// One hull allocation on the native side
pub struct NativeHull {
    handle: RawHullHandle,
    record: RawHullRecord,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DecompositionEngine for NativeEngine {
    type Instance = NativeInstance;
    type Hull = NativeHull;

    fn name(&self) -> &'static str {
        "native"
    }

    fn create(&self, params: &ParameterBlock) -> Result<NativeInstance> {
        let mut block = *params;
        // SAFETY: `block` is a valid parameter record for the call
        let raw = unsafe { bindings::CreateVHACD(&mut block) };
        NonNull::new(raw)
            .map(NativeInstance)
            .ok_or_else(|| DecompositionError::EngineCreation("CreateVHACD returned null".into()))
    }

    fn compute(
        &self,
        instance: &mut NativeInstance,
        mesh: MeshView<'_>,
        params: &ParameterBlock,
        progress: &mut ProgressSink<'_>,
    ) -> bool {
        let _gate = COMPUTE_GATE
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let _sink = InstalledSink::install(progress);
        let mut block = *params;

        // SAFETY: the mesh slices and `block` outlive the call, which only
        // returns once the engine is done reading them.
        unsafe {
            bindings::Compute(
                instance.raw(),
                mesh.positions.as_ptr(),
                mesh.vertex_count(),
                mesh.indices.as_ptr(),
                mesh.triangle_count(),
                &mut block,
                Some(progress_trampoline),
            )
        }
    }

    fn hull_count(&self, instance: &NativeInstance) -> u32 {
        // SAFETY: live engine interface
        unsafe { bindings::GetNConvexHulls(instance.raw()) }
    }

    fn fetch_hull(&self, instance: &NativeInstance, index: u32) -> Result<NativeHull> {
        let mut handle: RawHullHandle = 0;
        let mut record = RawHullRecord::default();
        // SAFETY: live engine interface and valid out-pointers
        unsafe { bindings::GetConvexHull(&mut handle, instance.raw(), index, &mut record) };
        if handle == 0 {
            return Err(DecompositionError::Engine(format!(
                "GetConvexHull returned no handle for hull {index}"
            )));
        }
        Ok(NativeHull { handle, record })
    }

    fn hull_record<'h>(&self, hull: &'h NativeHull) -> HullRecord<'h> {
        let record = &hull.record;
        // SAFETY: the arrays stay valid until `release_hull` consumes the
        // hull, which cannot happen while `'h` borrows it.
        unsafe {
            HullRecord {
                points: slice_or_empty(record.points, record.n_points),
                triangles: slice_or_empty(record.triangles, record.n_triangles),
            }
        }
    }

    fn release_hull(&self, hull: NativeHull) {
        // SAFETY: each handle is released once, `hull` is consumed here
        unsafe { bindings::ReleaseConvexHull(hull.handle) };
    }

    fn release(&self, instance: NativeInstance) {
        // SAFETY: each interface is released once, `instance` is consumed here
        unsafe { bindings::ReleaseVHACD(instance.raw()) };
    }
}

unsafe fn slice_or_empty<'a, T>(data: *const T, len: u32) -> &'a [T] {
    if data.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(data, len as usize)
    }
}
