// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The observability sink (spec §6): "a sink receives, per executed unit,
//! `(start_time, end_time, worker_index, type, id, finished)`."
//!
//! This is the spec's one explicit external-collaborator interface that the scheduler
//! must actively call into (as opposed to merely consuming, like the frame allocator).
//! The scheduler additionally emits `tracing` spans/events for its own ambient logging
//! (see `worker.rs`); the two are independent — a host application that cares about
//! structured per-unit timing wires up a [`Sink`], one that just wants logs installs a
//! `tracing` subscriber. Neither is required by the other.

use crate::clock::Instant;
use crate::id::{ThreadIndex, TypeTag, UnitId};

/// One executed-unit timing record, as described in spec §6.
#[derive(Copy, Clone, Debug)]
pub struct Record {
    pub start_time: Instant,
    pub end_time: Instant,
    pub worker_index: ThreadIndex,
    pub type_tag: TypeTag,
    pub id: UnitId,
    /// Whether this execution ran the unit to completion (`true` for a `FunctionJob`
    /// that returned, or a `CoroutineJob` that reached final-suspend) or merely to its
    /// next suspension point (`false` for a `CoroutineJob` that yielded/awaited).
    pub finished: bool,
}

/// Receives one [`Record`] per executed unit. The scheduler guarantees at-most-one
/// record per execution, ordered per-worker (spec §6).
///
/// Implementations must be cheap and non-blocking: they run on the worker thread that
/// just executed the unit, in the hot path of the dispatch loop.
pub trait Sink: Send + Sync {
    fn record(&self, record: Record);
}

/// A [`Sink`] that discards every record. The default when no sink is configured.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSink;

impl Sink for NoopSink {
    #[inline]
    fn record(&self, _record: Record) {}
}

/// A [`Sink`] that forwards every record as a `tracing` event at `TRACE` level.
///
/// Useful during development when a host application hasn't wired up its own sink yet
/// but still wants per-unit timing visible in its `tracing` subscriber output.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn record(&self, record: Record) {
        let micros = record.end_time.duration_since(record.start_time).as_micros();
        tracing::trace!(
            worker = record.worker_index,
            type_tag = record.type_tag,
            id = record.id,
            finished = record.finished,
            duration_us = micros,
            "unit executed",
        );
    }
}
