// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A multi-threaded job and coroutine scheduler for latency-sensitive, frame-based
//! workloads (game engines and similar): worker threads each own a run queue, idle
//! workers steal from peers in ascending order, and a parent/child completion
//! protocol lets a job graph's root learn when every descendant has finished.
//!
//! Two kinds of work share one [`Scheduler`]:
//! - a [`Scheduler::schedule_function`] job runs once, like a thread-pool task;
//! - a [`Scheduler::spawn_coroutine`] job is an `async fn` that can suspend with the
//!   awaiters in [`coroutine`] — [`coroutine::parallel`]'s `join*`/`parallel!` to fan
//!   out and join, [`coroutine::resume_on`] to hop to a specific worker, and
//!   [`coroutine::await_tag`] to suspend until some other part of the program drains a
//!   [`TagId`].
//!
//! ```ignore
//! use jobsys::{Config, Scheduler, Placement, TagId};
//!
//! let scheduler = Scheduler::new(Config::new().worker_count(4));
//! scheduler.schedule_function(|| println!("hello from a worker"), Placement::default(), TagId::INVALID);
//! scheduler.wait();
//! scheduler.terminate();
//! ```

mod alloc;
mod clock;
pub mod coroutine;
mod error;
mod id;
mod park;
mod queue;
mod scheduler;
mod sink;
mod tag;
mod work_unit;
mod worker;

pub use alloc::{BoundedFrameAllocator, FrameAllocator, UnboundedFrameAllocator};
pub use clock::Instant;
pub use error::{AllocationFailure, MisuseViolation};
pub use id::{Placement, TagId, ThreadIndex, TypeTag, UnitId};
pub use scheduler::{Config, Scheduler};
pub use sink::{NoopSink, Record, Sink, TracingSink};
pub use work_unit::WorkUnit;
pub use worker::current_thread_index;
