// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The injectable allocator the spec describes as an external collaborator:
//! "the memory pool implementation used for coroutine frame allocation (the core
//! consumes it through an allocator interface)" (spec §1).
//!
//! The teacher's equivalent seam is the nightly-only `core::alloc::Allocator` trait
//! (`kasync::executor::Executor::try_spawn_in<F, A: Allocator>`). That trait is gated
//! behind the `allocator_api` feature and unavailable on stable Rust; since this crate
//! targets a userspace application (a game engine) that cannot require a nightly
//! toolchain, we define our own stable-friendly trait that captures the same intent —
//! "the scheduler asks a pluggable pool whether a coroutine frame may be allocated,
//! and is told if the pool is exhausted" — without needing unstable allocator-shaped
//! APIs. See `DESIGN.md` for this adaptation.
//!
//! The actual heap storage for a coroutine's boxed future still goes through the
//! global allocator (`Box::new`); [`FrameAllocator`] is a accounting/admission seam in
//! front of that, which is exactly the role the spec assigns to "the memory pool" (a
//! pool that hands out and reclaims frame slots, not a general-purpose allocator
//! replacement).

use crate::error::AllocationFailure;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A pluggable admission policy for coroutine frame allocation.
///
/// Every `CoroutineJob` calls
/// [`alloc_frame`](FrameAllocator::alloc_frame) once at creation and
/// [`dealloc_frame`](FrameAllocator::dealloc_frame) exactly once when its frame is
/// destroyed (whether by running to final-suspend, or by being drained unexecuted
/// during shutdown) — this is what makes spec §8 property 4 ("every frame ever
/// allocated is eventually destroyed") independently checkable by a test-only
/// [`FrameAllocator`] that counts.
pub trait FrameAllocator: Send + Sync {
    /// Request permission to allocate one coroutine frame.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationFailure`] when the pool is exhausted. The caller must not
    /// construct or run the coroutine body in that case.
    fn alloc_frame(&self) -> Result<(), AllocationFailure>;

    /// Notify the pool that a previously allocated frame has been destroyed.
    fn dealloc_frame(&self);
}

/// The default [`FrameAllocator`]: never rejects an allocation.
///
/// Appropriate for applications that size their worker thread count and job graph such
/// that coroutine frame count is bounded by construction (the common case for a frame
/// job graph), and don't need the scheduler to enforce a separate pool limit.
#[derive(Debug, Default)]
pub struct UnboundedFrameAllocator {
    live: AtomicUsize,
}

impl UnboundedFrameAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames currently allocated and not yet deallocated. Exposed for
    /// leak-detection in tests (spec §8 property 4).
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl FrameAllocator for UnboundedFrameAllocator {
    fn alloc_frame(&self) -> Result<(), AllocationFailure> {
        self.live.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn dealloc_frame(&self) {
        let prev = self.live.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "dealloc_frame called more often than alloc_frame");
    }
}

/// A [`FrameAllocator`] with a hard cap on concurrently live coroutine frames, useful
/// for exercising the [`AllocationFailure`] path in tests.
#[derive(Debug)]
pub struct BoundedFrameAllocator {
    live: AtomicUsize,
    capacity: usize,
}

impl BoundedFrameAllocator {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            live: AtomicUsize::new(0),
            capacity,
        }
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl FrameAllocator for BoundedFrameAllocator {
    fn alloc_frame(&self) -> Result<(), AllocationFailure> {
        let mut current = self.live.load(Ordering::Acquire);
        loop {
            if current >= self.capacity {
                return Err(AllocationFailure);
            }
            match self.live.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    fn dealloc_frame(&self) {
        let prev = self.live.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "dealloc_frame called more often than alloc_frame");
    }
}
