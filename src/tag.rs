// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Tag-deferred scheduling (spec §4.6): a unit scheduled with a [`TagId`]
//! (`Scheduler::schedule_function`/`spawn_coroutine` with `tag` set) is parked here,
//! parentless (spec invariant I5), until some caller drains the tag with
//! `Scheduler::drain_tag` (the primitive backing both the public `schedule_tag` and
//! the `await_tag` awaiter, spec §4.4c) — which adopts every parked unit as a child of
//! the draining caller's current unit and dispatches them to run.

use crate::id::TagId;
use crate::work_unit::WorkUnit;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A registry of named holding lists, keyed by [`TagId`].
///
/// A tag's entry is created lazily on first park and removed entirely once drained
/// (spec §4.6: "draining a tag that holds nothing is a no-op returning 0"; we reclaim
/// the now-empty entry rather than let caller-chosen tag ids accumulate forever).
#[derive(Debug, Default)]
pub(crate) struct TagRegistry {
    tags: Mutex<HashMap<TagId, Vec<Arc<WorkUnit>>>>,
}

impl TagRegistry {
    pub(crate) fn new() -> Self {
        Self {
            tags: Mutex::new(HashMap::new()),
        }
    }

    /// Parks `unit` under `tag`. Invalid tags are rejected by the caller before this
    /// is reached (spec §4.4c: "`await_ready`: true when the tag is invalid").
    pub(crate) fn park(&self, tag: TagId, unit: Arc<WorkUnit>) {
        let mut guard = self.tags.lock().unwrap_or_else(|p| p.into_inner());
        guard.entry(tag).or_default().push(unit);
    }

    /// Removes and returns every unit parked under `tag`.
    pub(crate) fn drain(&self, tag: TagId) -> Vec<Arc<WorkUnit>> {
        let mut guard = self.tags.lock().unwrap_or_else(|p| p.into_inner());
        guard.remove(&tag).unwrap_or_default()
    }

    /// Destroys every unit currently parked under any tag (used during
    /// [`Scheduler::terminate`](crate::scheduler::Scheduler::terminate)).
    pub(crate) fn drain_destroy_all(&self) {
        let mut guard = self.tags.lock().unwrap_or_else(|p| p.into_inner());
        guard.clear();
    }
}
