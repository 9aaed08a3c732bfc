// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The per-thread dispatch loop (spec §4.2), grounded on
//! `kasync::executor::Worker::run`/`tick`/`try_steal`/`steal_one_round`: pop from the
//! local queue; if empty, steal from peers in ascending order starting just past this
//! worker's own index; if nothing was stolen, park until unparked or the idle timeout
//! elapses.
//!
//! Differs from the teacher in exactly the two ways spec §9's Design Notes call out as
//! fixed choices rather than open questions: stealing walks peers in a fixed ascending
//! order (not a randomized start index), and the idle-sleep timeout is a single fixed
//! duration (50us) rather than exponential backoff.

use crate::clock::Instant;
use crate::id::ThreadIndex;
use crate::park::{Park, StdPark};
use crate::queue::Queue;
use crate::scheduler::Scheduler;
use crate::sink::Record;
use crate::work_unit::{RunOutcome, WorkUnit};
use std::cell::RefCell;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

thread_local! {
    static CURRENT_UNIT: RefCell<Option<Arc<WorkUnit>>> = const { RefCell::new(None) };
    static CURRENT_THREAD_INDEX: RefCell<Option<ThreadIndex>> = const { RefCell::new(None) };
}

/// The `WorkUnit` currently executing on this thread, if any. `None` on a non-worker
/// thread, or on a worker thread between units.
///
/// Used by the coroutine awaiters (`coroutine/*.rs`) to find "the coroutine I'm
/// running inside of" without threading an explicit handle through every `.await`.
pub(crate) fn current_unit() -> Option<Arc<WorkUnit>> {
    CURRENT_UNIT.with(|c| c.borrow().clone())
}

/// The index of the worker thread calling this, or `None` off the worker pool.
pub fn current_thread_index() -> Option<ThreadIndex> {
    CURRENT_THREAD_INDEX.with(|c| *c.borrow())
}

/// Per-worker state: a local queue (single-consumer: only this worker ever pops it),
/// a shared queue (multi-consumer: other workers may steal from it), one park/unpark
/// seam, one OS thread (spec §3 `Queue`: "used as both per-thread local queue and
/// per-thread shared queue").
pub(crate) struct WorkerHandle {
    pub(crate) id: ThreadIndex,
    pub(crate) local: Queue,
    pub(crate) shared: Queue,
    park: StdPark,
}

impl WorkerHandle {
    pub(crate) fn new(id: ThreadIndex) -> Self {
        Self {
            id,
            local: Queue::unbounded(),
            shared: Queue::unbounded(),
            park: StdPark::new(),
        }
    }

    pub(crate) fn unpark(&self) {
        self.park.unpark();
    }
}

/// Spawns the OS thread running worker `id`'s dispatch loop.
pub(crate) fn spawn(scheduler: Arc<Scheduler>, id: ThreadIndex) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("jobsys-worker-{id}"))
        .spawn(move || run(scheduler, id))
        .expect("failed to spawn worker thread")
}

fn run(scheduler: Arc<Scheduler>, id: ThreadIndex) {
    CURRENT_THREAD_INDEX.with(|c| *c.borrow_mut() = Some(id));
    let span = tracing::debug_span!("worker main loop", worker = id);
    let _enter = span.enter();
    tracing::trace!("worker started");

    loop {
        // spec §4.2 dispatch order: (a) this worker's local queue, (b) this worker's
        // shared queue, (c) steal from peers' shared queues only, ascending order.
        if let Some(unit) = scheduler.workers[id as usize].local.pop() {
            execute(&scheduler, id, unit);
            continue;
        }
        if let Some(unit) = scheduler.workers[id as usize].shared.pop() {
            execute(&scheduler, id, unit);
            continue;
        }
        if let Some(unit) = try_steal(&scheduler, id) {
            execute(&scheduler, id, unit);
            continue;
        }
        if scheduler.shutting_down.load(Ordering::Acquire) {
            break;
        }
        scheduler.workers[id as usize]
            .park
            .park_timeout(scheduler.config.idle_timeout);
        if scheduler.shutting_down.load(Ordering::Acquire)
            && scheduler.workers[id as usize].local.size() == 0
            && scheduler.workers[id as usize].shared.size() == 0
        {
            break;
        }
    }
    tracing::trace!("worker stopped");
}

/// Ascending-order stealing starting just past `id` (spec §9: fixed, not randomized).
/// Only shared queues are stolen from — a peer's local queue is never touched (spec
/// §4.2c: "attempt to pop from that worker's shared queue only"). Steals half of a
/// victim's shared queue, runs the oldest stolen unit immediately, and requeues the
/// rest onto the stealing worker's own shared queue.
fn try_steal(scheduler: &Arc<Scheduler>, id: ThreadIndex) -> Option<Arc<WorkUnit>> {
    let n = scheduler.workers.len() as ThreadIndex;
    for offset in 1..n {
        let victim = (id + offset) % n;
        let mut stolen = scheduler.workers[victim as usize].shared.steal_half();
        if stolen.is_empty() {
            continue;
        }
        let first = stolen.remove(0);
        for rest in stolen {
            scheduler.workers[id as usize].shared.push(rest);
        }
        return Some(first);
    }
    None
}

/// Runs `unit` exactly once (one function execution, or one coroutine resumption),
/// records it to the configured sink, and drives the completion protocol (spec §4.3)
/// for whatever that run settled.
fn execute(scheduler: &Arc<Scheduler>, id: ThreadIndex, unit: Arc<WorkUnit>) {
    let start = Instant::now();
    let placement = unit.placement();

    CURRENT_UNIT.with(|c| *c.borrow_mut() = Some(Arc::clone(&unit)));
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| unit.run_once()));
    CURRENT_UNIT.with(|c| *c.borrow_mut() = None);

    let end = Instant::now();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(&payload);
            tracing::error!(worker = id, panic = %message, "work unit body panicked");
            // spec §7: panics in a unit body are a MisuseViolation-class failure the
            // completion protocol cannot recover from (partial parent/child state) —
            // terminate the process rather than propagate via a JoinHandle, unlike the
            // teacher's `kasync::task::Stage::poll`.
            std::process::abort();
        }
    };

    let finished = !matches!(outcome, RunOutcome::CoroutineSuspended);
    scheduler.sink.record(Record {
        start_time: start,
        end_time: end,
        worker_index: id,
        type_tag: placement.type_tag,
        id: placement.id,
        finished,
    });

    match outcome {
        RunOutcome::FunctionComplete => {
            // `decrement_and_maybe_complete` only recycles `unit` once it observes
            // the job's own "+1 self-count" reach zero (`on_fully_complete`'s
            // function branch below) — not here, unconditionally, since a
            // `FunctionJob` that scheduled children it hasn't waited on is not yet
            // fully complete and its `Arc` may still be the target of a live `Weak`
            // parent back-reference from one of them.
            decrement_and_maybe_complete(&unit);
        }
        RunOutcome::CoroutineComplete => {
            scheduler.unit_completed();
            if let Some(parent) = unit.parent() {
                decrement_and_maybe_complete(&parent);
            }
        }
        RunOutcome::CoroutineSuspended => {}
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Decrements `unit`'s children counter by one; if that was the last outstanding
/// child, `unit` has reached "all descendants done" (spec §4.3) and is handled
/// according to its own kind.
pub(crate) fn decrement_and_maybe_complete(unit: &Arc<WorkUnit>) {
    let prev = unit.children.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(prev >= 1, "children counter underflowed");
    if prev == 1 {
        on_fully_complete(unit);
    }
}

fn on_fully_complete(unit: &Arc<WorkUnit>) {
    if unit.is_coroutine() {
        // `unit` was suspended awaiting these children (the `Parallel` awaiter, see
        // coroutine/parallel.rs); reschedule it so it can resume past the await.
        unit.wake();
    } else {
        // a FunctionJob's body already ran; reaching zero here means both its body
        // and every child it scheduled are done, i.e. `unit` itself is now complete.
        // Only now is it safe to return `unit` to the recycle pool: any child that
        // held a `Weak` parent back-reference to it has already gone through this
        // same decrement, so none can still be waiting to `upgrade()` it.
        if let Some(scheduler) = unit.scheduler.upgrade() {
            scheduler.unit_completed();
            if let Some(parent) = unit.parent() {
                decrement_and_maybe_complete(&parent);
            }
            scheduler.recycle_function(Arc::clone(unit));
        } else if let Some(parent) = unit.parent() {
            decrement_and_maybe_complete(&parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_unit_is_none_off_the_worker_pool() {
        assert!(current_unit().is_none());
        assert!(current_thread_index().is_none());
    }
}
