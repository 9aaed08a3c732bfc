// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Error taxonomy (spec §7).
//!
//! Mirrors the teacher's style of small, manually-`Display`ed error enums
//! (`kasync::error::SpawnError`/`Closed`) rather than reaching for a derive-macro crate
//! like `thiserror` — the teacher never takes that dependency for its own error types,
//! so neither do we.

use std::fmt;

/// The coroutine-frame allocator rejected an allocation (spec §7:
/// `AllocationFailure`).
///
/// Returned from [`FrameAllocator::alloc_frame`](crate::alloc::FrameAllocator::alloc_frame).
/// A coroutine whose frame allocation fails is never run: [`spawn_coroutine`] still
/// returns a handle, but polling it resolves immediately to this error without the
/// coroutine body ever executing (spec §7: "a 'return object on allocation failure'
/// path that produces a handle reporting failure without ever running the coroutine
/// body").
///
/// [`spawn_coroutine`]: crate::coroutine::spawn_coroutine
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AllocationFailure;

impl fmt::Display for AllocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("coroutine frame allocator rejected the allocation")
    }
}

impl std::error::Error for AllocationFailure {}

/// Programming errors the spec classifies as `MisuseViolation` (spec §7): these abort
/// the process with a diagnostic rather than being recoverable, because the completion
/// protocol has no way to unwind partial parent/child state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MisuseViolation {
    /// A `CoroutineJob` was scheduled with a parent that is a `FunctionJob` (or has no
    /// registered coroutine ancestry). Coroutine scheduling requires a coroutine parent
    /// in order to participate in the completion protocol (spec §7).
    CoroutineFromFunctionJob,
    /// [`wait`](crate::scheduler::Scheduler::wait) was called from inside a worker
    /// thread, which would deadlock the calling worker against its own shutdown.
    WaitFromWorker,
}

impl fmt::Display for MisuseViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoroutineFromFunctionJob => f.write_str(
                "attempted to schedule a coroutine job from within a function job; \
                 coroutines may only be scheduled with a coroutine (or root) parent",
            ),
            Self::WaitFromWorker => {
                f.write_str("Scheduler::wait called from inside a worker thread")
            }
        }
    }
}

impl std::error::Error for MisuseViolation {}

impl MisuseViolation {
    /// Logs the diagnostic and aborts the process, per spec §7's documented policy for
    /// `MisuseViolation`.
    #[track_caller]
    pub(crate) fn abort(self) -> ! {
        tracing::error!(error = %self, location = %std::panic::Location::caller(), "misuse violation");
        std::process::abort();
    }
}
