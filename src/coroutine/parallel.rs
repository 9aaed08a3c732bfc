// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Await a group of work (spec §4.4a).
//!
//! Realized as plain `async fn`s (`join1`..`join4`, `join_vec`) rather than a single
//! hand-written `Future` combinator, because the tuple case is genuinely
//! heterogeneous (a mix of callables and coroutines with different output types) —
//! the same shape `futures::join!`/`tokio::join!` solve with a macro over concrete
//! arities rather than a type-erased collection.
//!
//! The spawn-then-await step reuses the same "+1 self-count" trick spec §4.3 uses for
//! `FunctionJob`: without it, a child that finishes before every sibling has even been
//! spawned could drive the awaiting coroutine's children counter to zero prematurely,
//! waking it mid-spawn. Bumping the counter by one extra *before* spawning anything and
//! consuming that extra count only after every sibling has been spawned makes a
//! premature zero-crossing impossible — the counter cannot reach zero until both "all
//! children spawned" and "all children finished" are true. See `DESIGN.md`.

use crate::id::{Placement, TagId};
use crate::scheduler::Scheduler;
use crate::work_unit::WorkUnit;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::handle::CoroutineHandle;

/// Wraps a plain callable so it can be passed to [`join1`]..[`join4`] alongside
/// coroutines; bare closures don't implement `Future`, so they must be wrapped
/// explicitly rather than relying on trait-overlap tricks to disambiguate.
pub struct Call<F>(pub F);

/// An element `parallel!`/`join*` can schedule: either a plain callable ([`Call`]) or
/// any coroutine (any `Future`). Void elements ([`Call`]) contribute nothing to the
/// aggregated result; non-void elements (coroutines) contribute their typed output
/// (spec §4.4a).
pub trait ParallelItem: Send + 'static {
    type Output: Send + 'static;
    type Handle;

    fn spawn(self, scheduler: &Arc<Scheduler>) -> Self::Handle;
    fn take(handle: Self::Handle) -> Self::Output;
}

impl<F> ParallelItem for Call<F>
where
    F: FnOnce() + Send + 'static,
{
    type Output = ();
    type Handle = ();

    fn spawn(self, scheduler: &Arc<Scheduler>) -> Self::Handle {
        scheduler.schedule_function(self.0, Placement::default(), TagId::INVALID);
    }

    fn take(_handle: Self::Handle) -> Self::Output {}
}

impl<F> ParallelItem for F
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    type Output = F::Output;
    type Handle = CoroutineHandle<F::Output>;

    fn spawn(self, scheduler: &Arc<Scheduler>) -> Self::Handle {
        scheduler.spawn_coroutine(self, Placement::default())
    }

    fn take(handle: Self::Handle) -> Self::Output {
        handle
            .try_take()
            .unwrap_or_else(|| unreachable!("parallel() child not complete after its group was woken"))
            .unwrap_or_else(|_| panic!("coroutine frame allocation failed for a parallel() child"))
    }
}

fn current_unit() -> Arc<WorkUnit> {
    crate::worker::current_unit().expect("parallel()/join* used outside a coroutine")
}

/// Suspends until `unit`'s children counter reads zero. Re-checked on every
/// (re-)poll rather than assumed true on the first wake after suspension, since a
/// wake can be spurious relative to this particular await (see module docs).
struct WaitForChildren<'a>(&'a Arc<WorkUnit>);

impl Future for WaitForChildren<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.0.children_is_zero() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

async fn await_children(unit: &Arc<WorkUnit>) {
    WaitForChildren(unit).await;
}

/// Awaits a single element, collapsing to a scalar result (spec §4.4a: "a single
/// non-void element becomes a scalar").
pub async fn join1<A: ParallelItem>(a: A) -> A::Output {
    let current = current_unit();
    let scheduler = current
        .scheduler
        .upgrade()
        .expect("scheduler dropped while its own coroutine was still running");
    current.add_children(1);
    let ha = a.spawn(&scheduler);
    crate::worker::decrement_and_maybe_complete(&current);
    await_children(&current).await;
    A::take(ha)
}

/// Awaits two elements concurrently, returning their outputs as a tuple.
pub async fn join2<A: ParallelItem, B: ParallelItem>(a: A, b: B) -> (A::Output, B::Output) {
    let current = current_unit();
    let scheduler = current
        .scheduler
        .upgrade()
        .expect("scheduler dropped while its own coroutine was still running");
    current.add_children(1);
    let ha = a.spawn(&scheduler);
    let hb = b.spawn(&scheduler);
    crate::worker::decrement_and_maybe_complete(&current);
    await_children(&current).await;
    (A::take(ha), B::take(hb))
}

/// Awaits three elements concurrently, returning their outputs as a tuple.
pub async fn join3<A: ParallelItem, B: ParallelItem, C: ParallelItem>(
    a: A,
    b: B,
    c: C,
) -> (A::Output, B::Output, C::Output) {
    let current = current_unit();
    let scheduler = current
        .scheduler
        .upgrade()
        .expect("scheduler dropped while its own coroutine was still running");
    current.add_children(1);
    let ha = a.spawn(&scheduler);
    let hb = b.spawn(&scheduler);
    let hc = c.spawn(&scheduler);
    crate::worker::decrement_and_maybe_complete(&current);
    await_children(&current).await;
    (A::take(ha), B::take(hb), C::take(hc))
}

/// Awaits four elements concurrently, returning their outputs as a tuple.
pub async fn join4<A: ParallelItem, B: ParallelItem, C: ParallelItem, D: ParallelItem>(
    a: A,
    b: B,
    c: C,
    d: D,
) -> (A::Output, B::Output, C::Output, D::Output) {
    let current = current_unit();
    let scheduler = current
        .scheduler
        .upgrade()
        .expect("scheduler dropped while its own coroutine was still running");
    current.add_children(1);
    let ha = a.spawn(&scheduler);
    let hb = b.spawn(&scheduler);
    let hc = c.spawn(&scheduler);
    let hd = d.spawn(&scheduler);
    crate::worker::decrement_and_maybe_complete(&current);
    await_children(&current).await;
    (A::take(ha), B::take(hb), C::take(hc), D::take(hd))
}

/// Awaits a homogeneous vector of elements, returning their outputs in the same order
/// (spec §4.4a: "vectors stay vectors"). An empty vector resolves immediately without
/// suspending (spec §4.4a: "`await_ready`: true only when the total count ... is
/// zero").
pub async fn join_vec<A: ParallelItem>(items: Vec<A>) -> Vec<A::Output> {
    if items.is_empty() {
        return Vec::new();
    }
    let current = current_unit();
    let scheduler = current
        .scheduler
        .upgrade()
        .expect("scheduler dropped while its own coroutine was still running");
    current.add_children(1);
    let handles: Vec<A::Handle> = items.into_iter().map(|it| it.spawn(&scheduler)).collect();
    crate::worker::decrement_and_maybe_complete(&current);
    await_children(&current).await;
    handles.into_iter().map(A::take).collect()
}

/// Dispatches to [`join1`]..[`join4`] by argument count. Wrap plain callables in
/// [`Call`]; bare expressions are treated as coroutines (anything `Future`).
///
/// ```ignore
/// let (sum, label) = parallel!(Call(|| counter.fetch_add(1, Relaxed)), compute_label()).await;
/// ```
#[macro_export]
macro_rules! parallel {
    ($a:expr $(,)?) => {
        $crate::coroutine::parallel::join1($a)
    };
    ($a:expr, $b:expr $(,)?) => {
        $crate::coroutine::parallel::join2($a, $b)
    };
    ($a:expr, $b:expr, $c:expr $(,)?) => {
        $crate::coroutine::parallel::join3($a, $b, $c)
    };
    ($a:expr, $b:expr, $c:expr, $d:expr $(,)?) => {
        $crate::coroutine::parallel::join4($a, $b, $c, $d)
    };
}
