// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Progress events reported while an engine computes
//!
//! Events are delivered synchronously from inside a compute call, zero or more
//! times, and never after that call returns. How often and from which thread
//! they arrive is up to the engine.

use tracing::{debug, trace};

/// One progress report from the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Progress of the whole decomposition in `[0, 1]`
    pub overall_progress: f64,
    /// Progress of the current stage in `[0, 1]`
    pub stage_progress: f64,
    pub stage: String,
    pub operation: String,
}

impl ProgressEvent {
    /// Create an event; progress values are clamped into `[0, 1]`
    pub fn new(
        overall_progress: f64,
        stage_progress: f64,
        stage: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            overall_progress: clamp_unit(overall_progress),
            stage_progress: clamp_unit(stage_progress),
            stage: stage.into(),
            operation: operation.into(),
        }
    }

    /// Overall progress as a percentage (0 to 100)
    pub fn percent(&self) -> u32 {
        (self.overall_progress * 100.0).round() as u32
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Host callback receiving progress events
pub type ProgressCallback = Box<dyn FnMut(&ProgressEvent) + Send>;

/// Callback that ignores every event
pub fn noop() -> ProgressCallback {
    Box::new(|_| {})
}

/// Callback that forwards every event to `tracing` at debug level
pub fn log_progress() -> ProgressCallback {
    Box::new(|event| {
        debug!(
            overall = event.overall_progress,
            stage_progress = event.stage_progress,
            stage = %event.stage,
            operation = %event.operation,
            "decomposition progress"
        );
    })
}

/// Wraps the host callback for one compute call.
///
/// A missing callback becomes [`noop`], so the engine always has something
/// valid to call. The bridge is consumed when the compute returns.
pub(crate) struct ProgressBridge {
    callback: ProgressCallback,
    delivered: u64,
}

impl ProgressBridge {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback: callback.unwrap_or_else(noop),
            delivered: 0,
        }
    }

    pub(crate) fn emit(&mut self, event: &ProgressEvent) {
        trace!(
            overall = event.overall_progress,
            stage = %event.stage,
            "progress event"
        );
        self.delivered += 1;
        (self.callback)(event);
    }

    /// Close the bridge and return how many events went through
    pub(crate) fn finish(self) -> u64 {
        self.delivered
    }
}
