// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Idle park/unpark (spec §5): "Idle workers park on a condition variable with a bounded
//! timeout (10-1000us) rather than busy-spinning, and are woken either by the timeout or
//! by an explicit unpark when work becomes available."
//!
//! Kept as its own seam rather than inlined into `Worker`, matching the teacher's
//! `kasync::park::{Park, Parker}` split — a dedicated, independently testable park
//! abstraction instead of calling `Condvar::wait_timeout` directly from the dispatch
//! loop.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A single-waiter park/unpark primitive.
///
/// Unlike `std::thread::park`/`unpark`, tokens do not accumulate: an unpark that races
/// ahead of the next park is still observed (the `woken` flag persists), but multiple
/// unparks before a single park collapse into one wakeup, which is exactly what a
/// worker's dispatch loop needs (spec §4.2: re-check the queues after *any* wake,
/// spurious or not).
pub(crate) trait Park: Send + Sync {
    /// Blocks the calling thread until unparked or `timeout` elapses, whichever comes
    /// first.
    fn park_timeout(&self, timeout: Duration);

    /// Wakes a thread currently (or about to be) blocked in [`park_timeout`](Park::park_timeout).
    fn unpark(&self);
}

/// The default [`Park`] implementation, backed by a `std::sync::Condvar`.
#[derive(Debug, Default)]
pub(crate) struct StdPark {
    woken: Mutex<bool>,
    condvar: Condvar,
}

impl StdPark {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Park for StdPark {
    fn park_timeout(&self, timeout: Duration) {
        let mut guard = self.woken.lock().unwrap_or_else(|p| p.into_inner());
        if *guard {
            // already unparked since the last park; consume the token without blocking.
            *guard = false;
            return;
        }
        let (mut guard, _timed_out) = self
            .condvar
            .wait_timeout(guard, timeout)
            .unwrap_or_else(|p| p.into_inner());
        *guard = false;
    }

    fn unpark(&self) {
        let mut guard = self.woken.lock().unwrap_or_else(|p| p.into_inner());
        *guard = true;
        self.condvar.notify_one();
    }
}
