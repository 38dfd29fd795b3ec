// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Future that resolves when a worker thread finishes

use crate::error::{DecompositionError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::thread;

struct Slot<T> {
    value: Option<T>,
    finished: bool,
    waker: Option<Waker>,
}

/// Marks the slot finished when the worker ends, by return or by panic
struct Completion<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Completion<T> {
    fn deliver(&self, value: T) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.value = Some(value);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        let waker = match self.slot.lock() {
            Ok(mut slot) => {
                slot.finished = true;
                slot.waker.take()
            }
            Err(poisoned) => {
                let mut slot = poisoned.into_inner();
                slot.finished = true;
                slot.waker.take()
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Runs one closure on a dedicated thread; awaiting it yields the result.
///
/// Dropping the task does not stop the worker, the result is discarded.
pub(crate) struct ComputeTask<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T: Send + 'static> ComputeTask<T> {
    pub(crate) fn spawn<F>(name: &str, work: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Slot {
            value: None,
            finished: false,
            waker: None,
        }));
        let completion = Completion {
            slot: Arc::clone(&slot),
        };

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let value = work();
                completion.deliver(value);
            })?;

        Ok(Self { slot })
    }
}

impl<T> Future for ComputeTask<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(_) => return Poll::Ready(Err(DecompositionError::Poisoned)),
        };
        if let Some(value) = slot.value.take() {
            return Poll::Ready(Ok(value));
        }
        if slot.finished {
            return Poll::Ready(Err(DecompositionError::WorkerLost));
        }
        slot.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_resolves_with_worker_result() {
        let task = ComputeTask::spawn("test-worker", || 40 + 2).unwrap();
        assert_eq!(pollster::block_on(task).unwrap(), 42);
    }

    #[test]
    fn test_panicking_worker_is_reported() {
        let task = ComputeTask::<u32>::spawn("test-worker", || panic!("worker died")).unwrap();
        assert!(matches!(
            pollster::block_on(task),
            Err(DecompositionError::WorkerLost)
        ));
    }

    #[test]
    fn test_worker_runs_on_its_own_thread() {
        let caller = thread::current().id();
        let task = ComputeTask::spawn("test-worker", move || thread::current().id() != caller)
            .unwrap();
        assert!(pollster::block_on(task).unwrap());
    }
}
