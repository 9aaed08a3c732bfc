// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The bounded, mutex-guarded FIFO described in spec §4.1.
//!
//! The teacher's run queues (`mpsc_queue::MpscQueue`) are lock-free intrusive lists —
//! appropriate for a no_std kernel that cannot allocate or block. The spec explicitly
//! does not require that: §4.1 states plainly "A mutex-guarded FIFO suffices", and §5
//! repeats it for the local queue ("A mutex-guarded FIFO suffices"). A
//! `Mutex<VecDeque<_>>` is therefore the direct, idiomatic realization for a userspace
//! scheduler that already pays for `std::thread`/`Condvar`; see `DESIGN.md`.

use crate::work_unit::WorkUnit;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A FIFO queue of scheduled work, optionally capacity-bounded.
///
/// Used both as a worker's local/shared queue (unbounded) and as the scheduler's
/// function-job recycle pool (bounded) — spec §4.1: "Capacity rejection in `push` is
/// the backpressure mechanism for the recycle pool only; worker queues use an
/// unbounded configuration."
#[derive(Debug)]
pub struct Queue {
    inner: Mutex<VecDeque<Arc<WorkUnit>>>,
    capacity: Option<usize>,
}

impl Queue {
    /// An unbounded queue, as used for worker local/shared queues and tag holding
    /// queues.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity: None,
        }
    }

    /// A queue that rejects pushes once it holds `capacity` units, as used for the
    /// recycle pool.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity: Some(capacity),
        }
    }

    /// Appends `unit` to the tail. Returns `false` (and does not enqueue) when the
    /// queue is at capacity.
    pub fn push(&self, unit: Arc<WorkUnit>) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(capacity) = self.capacity {
            if guard.len() >= capacity {
                return false;
            }
        }
        guard.push_back(unit);
        true
    }

    /// Removes and returns the head of the queue, or `None` if empty.
    pub fn pop(&self) -> Option<Arc<WorkUnit>> {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.pop_front()
    }

    /// Steals at most half of the current contents (rounded up), leaving the rest for
    /// the owning worker. Used by the dispatch loop's work-stealing step
    /// (`worker::try_steal`).
    pub fn steal_half(&self) -> Vec<Arc<WorkUnit>> {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let n = guard.len().div_ceil(2);
        guard.drain(..n).collect()
    }

    /// The current number of queued units, observed under the lock.
    pub fn size(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Drains and destroys every unit currently queued, honoring each unit's
    /// variant-specific destroy policy (spec §4.1). For this realization that policy
    /// is simply "drop it": a `FunctionJob`'s closure is dropped unrun, a
    /// `CoroutineJob`'s suspended future is dropped in place (running destructors of
    /// any not-yet-awaited locals), and its frame allocator is notified via
    /// [`WorkUnit`]'s own `Drop` impl.
    pub fn drain_destroy(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.clear();
    }
}
