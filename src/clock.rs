// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A thin timestamp source used only to stamp [`Sink`](crate::sink::Sink) records.
//!
//! The spec treats "timing/clock utilities" as an external collaborator (§1 Out of
//! scope); this module is the minimal seam the scheduler needs internally to produce
//! `start_time`/`end_time` pairs without hard-coding `std::time::Instant` at every call
//! site, matching the indirection the teacher applies for its own (far more elaborate,
//! no_std-compatible) `kasync::time::Clock`.

use std::time::Instant as StdInstant;

/// A point in time, opaque to callers besides being orderable and subtractable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Instant(StdInstant);

impl Instant {
    /// The current time, as seen by the process-wide clock.
    #[must_use]
    pub fn now() -> Self {
        Self(StdInstant::now())
    }

    /// Elapsed wall-clock time since `earlier`.
    #[must_use]
    pub fn duration_since(&self, earlier: Instant) -> std::time::Duration {
        self.0.duration_since(earlier.0)
    }
}
