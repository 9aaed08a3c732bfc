// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Await a tag (spec §4.4c).
//!
//! `await_ready` is true (resolves to `0` without suspending) when the tag is invalid
//! (`TagId::INVALID`, or any negative id normalized to it, spec §4.6). Otherwise
//! `await_suspend` drains the tag (`Scheduler::drain_tag`): every unit parked under it
//! (scheduled earlier via `Scheduler::schedule_function`/`spawn_coroutine` with this
//! tag, spec §4.6 `park`) is adopted as a child of the *awaiting coroutine* and
//! dispatched to a worker, and the coroutine suspends on the ordinary completion
//! protocol (spec §4.3) until every one of them has finished — unless the drain was
//! empty, in which case it resolves immediately without suspending. `await_resume`
//! returns how many units were drained.

use crate::id::TagId;
use crate::work_unit::WorkUnit;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

enum State {
    Init,
    Waiting { unit: Arc<WorkUnit>, drained: usize },
}

/// Future returned by [`await_tag`]. See module docs.
pub struct AwaitTag {
    tag: TagId,
    state: State,
}

impl AwaitTag {
    pub(crate) fn new(tag: TagId) -> Self {
        Self {
            tag,
            state: State::Init,
        }
    }
}

impl Future for AwaitTag {
    type Output = usize;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<usize> {
        let this = self.get_mut();
        loop {
            match &this.state {
                State::Init => {
                    if !this.tag.is_valid() {
                        return Poll::Ready(0);
                    }
                    let current = crate::worker::current_unit()
                        .expect("await_tag() used outside a coroutine");
                    let scheduler = current
                        .scheduler
                        .upgrade()
                        .expect("scheduler dropped while its own coroutine was still running");
                    let drained = scheduler.drain_tag(this.tag, Some(&current));
                    if drained == 0 {
                        return Poll::Ready(0);
                    }
                    this.state = State::Waiting {
                        unit: current,
                        drained,
                    };
                }
                State::Waiting { unit, drained } => {
                    return if unit.children_is_zero() {
                        Poll::Ready(*drained)
                    } else {
                        Poll::Pending
                    };
                }
            }
        }
    }
}

/// Suspends the calling coroutine until every unit currently parked under `tag` has
/// completed.
///
/// Drains the tag, adopts the drained units as children of the calling coroutine,
/// dispatches them, and resolves to how many were drained once all of them have
/// finished. Resolves immediately to `0` without suspending if `tag` is invalid or
/// holds nothing. Must be called from inside a coroutine (except the invalid-tag fast
/// path, which never touches the current-unit thread-local).
pub fn await_tag(tag: TagId) -> AwaitTag {
    AwaitTag::new(tag)
}
