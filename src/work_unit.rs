// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The uniform schedulable entity described in spec §3: a [`WorkUnit`] is either a
//! `FunctionJob` (a callable run once) or a `CoroutineJob` (a suspended,
//! potentially many-times-resumed future).
//!
//! Ownership is realized with `Arc`/`Weak` rather than the teacher's raw, manually
//! refcounted `NonNull<Header>` + vtable scheme (`kasync::task::{TaskRef, Header,
//! VTable}`). Spec §9's own Design Notes nominate exactly this re-architecture
//! ("Model with indices into an arena or with non-owning references scoped by the
//! guarantee that a unit outlives its children") — `Arc<WorkUnit>` (strong,
//! scheduler-owned) plus `Weak<WorkUnit>` (the non-owning parent back-reference) *is*
//! that model, and it collapses the "self-destruct flag" vs "owning handle" split of
//! spec §4.5 into ordinary reference counting (see `DESIGN.md`).

use crate::alloc::FrameAllocator;
use crate::error::AllocationFailure;
use crate::id::{Placement, ThreadIndex, TypeTag, UnitId};
use crate::scheduler::Scheduler;
use pin_project::pin_project;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

/// The payload a [`WorkUnit`] executes.
pub(crate) enum Body {
    /// A callable, run exactly once by exactly one worker (spec §3: "Single-consumer:
    /// exactly one worker executes it exactly once").
    Function(Mutex<Option<Box<dyn FnOnce() + Send>>>),
    /// A suspended computation that may be resumed (polled) many times before it
    /// completes.
    Coroutine(Coroutine),
}

pub(crate) struct Coroutine {
    future: Mutex<Pin<Box<dyn Future<Output = ()> + Send>>>,
    allocator: Arc<dyn FrameAllocator>,
}

impl Drop for Coroutine {
    fn drop(&mut self) {
        self.allocator.dealloc_frame();
    }
}

/// A scheduled job: either a `FunctionJob` or a `CoroutineJob` (spec §3).
///
/// Always accessed through `Arc<WorkUnit>`; the scheduler's queues hold the owning
/// strong references, a unit's `parent` field holds only a non-owning [`Weak`] one
/// (spec invariant, see module docs).
pub struct WorkUnit {
    seq: u64,
    placement: Mutex<Placement>,
    /// `Mutex`-guarded rather than a plain field: a unit parked under a tag (spec
    /// §4.6) is created with no parent and only gets one assigned later, when some
    /// caller drains the tag (`Scheduler::drain_tag`) — after the `Arc<WorkUnit>` may
    /// already be shared with a `CoroutineHandle`, so it can't be set through `&mut
    /// self`.
    parent: Mutex<Option<Weak<WorkUnit>>>,
    pub(crate) children: AtomicU32,
    pub(crate) body: Body,
    pub(crate) scheduler: Weak<Scheduler>,
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkUnit")
            .field("seq", &self.seq)
            .field("is_function", &self.is_function())
            .field("children", &self.children.load(Ordering::Relaxed))
            .finish()
    }
}

/// Wraps a user future so that its typed output is captured into a type-erased slot
/// when it completes, turning any `Future<Output = T>` into a `Future<Output = ()>`
/// suitable for storage inside [`Body::Coroutine`]. Grounded on the teacher's general
/// use of `pin-project` (`kasync`/`sync` both depend on it) rather than hand-written
/// unsafe pin projection.
#[pin_project]
struct CaptureResult<F> {
    #[pin]
    inner: F,
    slot: ResultSlot,
}

pub(crate) type ResultSlot = Arc<Mutex<Option<Box<dyn Any + Send>>>>;

impl<F> Future for CaptureResult<F>
where
    F: Future,
    F::Output: Send + 'static,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.inner.poll(cx) {
            Poll::Ready(value) => {
                *this.slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(Box::new(value));
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl WorkUnit {
    pub(crate) fn new_function<F>(
        placement: Placement,
        parent: Option<Weak<WorkUnit>>,
        scheduler: Weak<Scheduler>,
        f: F,
    ) -> Arc<WorkUnit>
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(sched) = scheduler.upgrade() {
            sched.unit_created();
        }
        Arc::new(WorkUnit {
            seq: crate::id::next_seq(),
            placement: Mutex::new(placement),
            parent: Mutex::new(parent),
            // "+1 self-count" convention (spec §4.3): a FunctionJob counts itself.
            children: AtomicU32::new(1),
            body: Body::Function(Mutex::new(Some(Box::new(f)))),
            scheduler,
        })
    }

    pub(crate) fn new_coroutine<F>(
        placement: Placement,
        parent: Option<Weak<WorkUnit>>,
        scheduler: Weak<Scheduler>,
        allocator: Arc<dyn FrameAllocator>,
        future: F,
    ) -> Result<(Arc<WorkUnit>, ResultSlot), AllocationFailure>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        allocator.alloc_frame()?;
        if let Some(sched) = scheduler.upgrade() {
            sched.unit_created();
        }
        let slot: ResultSlot = Arc::new(Mutex::new(None));
        let wrapped = CaptureResult {
            inner: future,
            slot: Arc::clone(&slot),
        };
        let unit = Arc::new(WorkUnit {
            seq: crate::id::next_seq(),
            placement: Mutex::new(placement),
            parent: Mutex::new(parent),
            // coroutines do not count themselves; they are driven to completion by
            // polling, not by their own children counter (spec §4.3).
            children: AtomicU32::new(0),
            body: Body::Coroutine(Coroutine {
                future: Mutex::new(Box::pin(wrapped)),
                allocator,
            }),
            scheduler,
        });
        Ok((unit, slot))
    }

    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self.body, Body::Function(_))
    }

    #[must_use]
    pub fn is_coroutine(&self) -> bool {
        matches!(self.body, Body::Coroutine(_))
    }

    #[must_use]
    pub fn placement(&self) -> Placement {
        *self.placement.lock().unwrap_or_else(|p| p.into_inner())
    }

    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.placement().type_tag
    }

    #[must_use]
    pub fn id(&self) -> UnitId {
        self.placement().id
    }

    /// Rewrites the target-thread placement. Used only by the resume-on-thread
    /// awaiter (spec §4.4b: "rewrites the coroutine's `target_thread`").
    pub(crate) fn set_target_thread(&self, thread: Option<ThreadIndex>) {
        self.placement.lock().unwrap_or_else(|p| p.into_inner()).target_thread = thread;
    }

    /// The unit's current parent, if it has one and it is still alive.
    pub(crate) fn parent(&self) -> Option<Arc<WorkUnit>> {
        self.parent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Rewrites this unit's parent back-reference. Used to adopt a tag-parked unit
    /// (created with no parent, spec invariant I5) onto the unit draining its tag
    /// (spec §4.6: "relinked at `schedule(tag)` time with the current caller as
    /// parent").
    pub(crate) fn set_parent(&self, parent: Option<Weak<WorkUnit>>) {
        *self.parent.lock().unwrap_or_else(|p| p.into_inner()) = parent;
    }

    /// Increments the children counter by `delta` (spec §4.3: must happen-before the
    /// child becomes observable to any worker; callers are responsible for that
    /// ordering by calling this before enqueuing the child).
    pub(crate) fn add_children(&self, delta: u32) {
        if delta > 0 {
            self.children.fetch_add(delta, Ordering::AcqRel);
        }
    }

    /// Whether this unit currently has no outstanding children. Used by the
    /// `parallel()`/`await_tag` awaiters to check, on each (re-)poll, whether their
    /// spawned/drained group has actually finished yet (see `coroutine/parallel.rs`'s
    /// module docs for why a poll can be spurious).
    pub(crate) fn children_is_zero(&self) -> bool {
        self.children.load(Ordering::Acquire) == 0
    }

    /// Re-enqueues `self` onto its scheduler according to its current placement. Used
    /// to resume a suspended coroutine once whatever it was awaiting has completed
    /// (spec §4.3/§4.4d: "reschedules the parent").
    pub(crate) fn wake(self: &Arc<Self>) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.place_for_wake(Arc::clone(self));
        } else {
            tracing::trace!("woke a unit whose scheduler has already been torn down");
        }
    }

    /// Runs this unit's body. For a [`FunctionJob`] this invokes the callable exactly
    /// once; for a [`CoroutineJob`] this polls the future exactly once (one
    /// resumption). Returns whether the body reached completion this call (spec §6's
    /// sink `finished` field).
    ///
    /// # Panics
    ///
    /// Never panics itself, but user code panicking inside the body is caught by the
    /// caller (see `worker.rs`), not here.
    pub(crate) fn run_once(self: &Arc<Self>) -> RunOutcome {
        match &self.body {
            Body::Function(slot) => {
                let f = slot
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .take()
                    .expect("FunctionJob run more than once");
                f();
                RunOutcome::FunctionComplete
            }
            Body::Coroutine(coro) => {
                let waker = std::task::Waker::noop();
                let mut cx = Context::from_waker(waker);
                let mut guard = coro.future.lock().unwrap_or_else(|p| p.into_inner());
                match guard.as_mut().poll(&mut cx) {
                    Poll::Ready(()) => RunOutcome::CoroutineComplete,
                    Poll::Pending => RunOutcome::CoroutineSuspended,
                }
            }
        }
    }

    /// Resets a fully-owned, previously-run `FunctionJob` unit for reuse, avoiding a
    /// fresh allocation. Called only from the recycle pool (`scheduler.rs`), and only
    /// when the caller already holds exclusive access (`Arc::get_mut` succeeded), so
    /// every field can be overwritten directly without interior mutability beyond what
    /// the type already carries for other reasons.
    ///
    /// # Panics
    ///
    /// Panics if called on a `CoroutineJob` unit; the recycle pool never holds those.
    pub(crate) fn reset_function<F>(
        &mut self,
        placement: Placement,
        parent: Option<Weak<WorkUnit>>,
        scheduler: Weak<Scheduler>,
        f: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        *self.placement.get_mut().unwrap_or_else(|p| p.into_inner()) = placement;
        *self.parent.get_mut().unwrap_or_else(|p| p.into_inner()) = parent;
        self.children = AtomicU32::new(1);
        if let Some(sched) = scheduler.upgrade() {
            sched.unit_created();
        }
        self.scheduler = scheduler;
        match &mut self.body {
            Body::Function(slot) => {
                *slot.get_mut().unwrap_or_else(|p| p.into_inner()) = Some(Box::new(f));
            }
            Body::Coroutine(_) => unreachable!("recycle pool holds only FunctionJob units"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum RunOutcome {
    FunctionComplete,
    CoroutineComplete,
    CoroutineSuspended,
}
