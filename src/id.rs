// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Opaque identifiers carried by scheduled work for observability and tag-deferred
//! scheduling. None of these types affect scheduling decisions themselves (besides
//! [`TagId`], which is a registry key) — they exist purely so callers and the [`Sink`]
//! can correlate executed units with the domain code that produced them.
//!
//! [`Sink`]: crate::sink::Sink

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Index of a worker thread inside a [`Scheduler`](crate::scheduler::Scheduler).
///
/// Workers are numbered `0..thread_count()`, stable for the lifetime of the scheduler.
pub type ThreadIndex = u32;

/// Caller-supplied, opaque classification carried alongside a work unit.
///
/// Never interpreted by the scheduler; round-tripped to the [`Sink`](crate::sink::Sink)
/// for observability only.
pub type TypeTag = i32;

/// Caller-supplied, opaque identifier carried alongside a work unit.
///
/// Never interpreted by the scheduler; round-tripped to the [`Sink`](crate::sink::Sink)
/// for observability only.
pub type UnitId = u64;

/// A tag under which work can be parked for later bulk scheduling (see
/// [`TagRegistry`](crate::tag::TagRegistry)).
///
/// Negative ids (including the default, [`TagId::INVALID`]) are never valid registry
/// keys: awaiting an invalid tag resolves immediately with zero drained units (spec
/// §4.4c: "`await_ready`: true when the tag is invalid").
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TagId(i64);

impl TagId {
    /// The sentinel "no tag" value.
    pub const INVALID: TagId = TagId(-1);

    /// Construct a tag id. Values `< 0` are normalized to [`TagId::INVALID`].
    #[must_use]
    pub fn new(id: i64) -> Self {
        if id < 0 { Self::INVALID } else { Self(id) }
    }

    /// Whether this id names a real, schedulable tag.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl Default for TagId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl From<i64> for TagId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

/// Placement and observability metadata attached to a work unit at schedule time.
///
/// All fields default to "unspecified" (spec §6: "Worker placement options ... All
/// default to unspecified").
#[derive(Clone, Copy, Debug, Default)]
pub struct Placement {
    /// The worker this unit must run on, or `None` meaning "any" (round-robin placed).
    pub target_thread: Option<ThreadIndex>,
    /// Opaque classification, forwarded to the [`Sink`](crate::sink::Sink).
    pub type_tag: TypeTag,
    /// Opaque id, forwarded to the [`Sink`](crate::sink::Sink).
    pub id: UnitId,
}

/// Process-wide monotonically increasing unit sequence number, used only to give
/// [`WorkUnit`](crate::work_unit::WorkUnit)s a stable `Debug` identity; it has no
/// scheduling meaning.
static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_seq() -> u64 {
    NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Per-process counter of live [`Scheduler`](crate::scheduler::Scheduler) instances,
/// used to assign stable thread names across repeated `init`/`terminate` cycles in
/// tests.
pub(crate) static SCHEDULER_GENERATION: AtomicU32 = AtomicU32::new(0);
