// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The typed return-value handle for a spawned `CoroutineJob` (spec §3/§4.5).
//!
//! Collapses the teacher's `JoinHandle<T>`/`TaskRef` split (`kasync::task::JoinHandle`,
//! polled through a vtable) into a plain `Arc<WorkUnit>` + a type-erased result slot:
//! the handle is simply the strong reference that keeps a coroutine's frame alive until
//! its caller has read the result (see `DESIGN.md`, §3's Open-Question resolution on
//! frame lifetimes).

use crate::error::AllocationFailure;
use crate::work_unit::{ResultSlot, WorkUnit};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

enum State<T> {
    Spawned {
        unit: Arc<WorkUnit>,
        slot: ResultSlot,
        _marker: PhantomData<fn() -> T>,
    },
    Failed(AllocationFailure),
}

/// A handle to a spawned coroutine's eventual typed result.
///
/// Dropping a handle does not cancel the coroutine: the scheduler's own queue holds an
/// independent strong reference for as long as the coroutine has not yet been run to
/// completion, so a detached (handle dropped immediately) coroutine still runs to
/// completion — it is simply nobody's job to read its result.
pub struct CoroutineHandle<T> {
    state: State<T>,
}

impl<T: Send + 'static> CoroutineHandle<T> {
    pub(crate) fn spawned(unit: Arc<WorkUnit>, slot: ResultSlot) -> Self {
        Self {
            state: State::Spawned {
                unit,
                slot,
                _marker: PhantomData,
            },
        }
    }

    pub(crate) fn failed(failure: AllocationFailure) -> Self {
        Self {
            state: State::Failed(failure),
        }
    }

    /// The `WorkUnit` backing this handle, or `None` if spawning itself already failed
    /// (spec §7: allocation failure never runs the coroutine body).
    pub(crate) fn unit(&self) -> Option<&Arc<WorkUnit>> {
        match &self.state {
            State::Spawned { unit, .. } => Some(unit),
            State::Failed(_) => None,
        }
    }

    /// Non-blocking read of the result. Returns `None` if the coroutine has not yet
    /// reached completion; never transitions back from `Some` to `None`.
    ///
    /// Intended for use after the scheduler's completion protocol has already woken
    /// whatever was awaiting this handle (see `coroutine/parallel.rs`) — it is not a
    /// general-purpose reactor-driven poll, since nothing here registers a waker.
    pub fn try_take(&self) -> Option<Result<T, AllocationFailure>> {
        match &self.state {
            State::Failed(failure) => Some(Err(*failure)),
            State::Spawned { slot, .. } => {
                let mut guard = slot.lock().unwrap_or_else(|p| p.into_inner());
                guard.take().map(|boxed| Ok(*downcast(boxed)))
            }
        }
    }
}

fn downcast<T: 'static>(boxed: Box<dyn Any + Send>) -> Box<T> {
    boxed
        .downcast::<T>()
        .unwrap_or_else(|_| unreachable!("CoroutineHandle<T> result slot held the wrong type"))
}
