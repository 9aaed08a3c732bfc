// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Resume on a specific worker thread (spec §4.4b).
//!
//! `await_ready` is true only when the calling coroutine is already running on the
//! requested thread (no-op fast path); otherwise `await_suspend` rewrites the
//! coroutine's `target_thread` placement and reschedules it immediately — unlike
//! [`await_tag`](super::await_tag), there is nothing to wait on besides the
//! rescheduling itself, so the very next time this unit runs it is guaranteed to be on
//! the requested worker (spec §4.2: a unit with a `target_thread` set is always placed
//! there, never round-robined or stolen away from it before running).

use crate::id::ThreadIndex;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

enum State {
    Init,
    Rescheduled,
}

/// Future returned by [`resume_on`]. See module docs.
pub struct ResumeOn {
    target: ThreadIndex,
    state: State,
}

impl ResumeOn {
    pub(crate) fn new(target: ThreadIndex) -> Self {
        Self {
            target,
            state: State::Init,
        }
    }
}

impl Future for ResumeOn {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        match self.state {
            State::Init => {
                let current = crate::worker::current_unit()
                    .expect("resume_on() used outside a coroutine");
                if crate::worker::current_thread_index() == Some(self.target) {
                    return Poll::Ready(());
                }
                current.set_target_thread(Some(self.target));
                self.state = State::Rescheduled;
                current.wake();
                Poll::Pending
            }
            State::Rescheduled => Poll::Ready(()),
        }
    }
}

/// Suspends the calling coroutine and resumes it on worker thread `target`.
///
/// A no-op if already running there. Must be called from inside a coroutine.
pub fn resume_on(target: ThreadIndex) -> ResumeOn {
    ResumeOn::new(target)
}
