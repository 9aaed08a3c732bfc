// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Coroutine integration (spec §4.4/§4.5): the scheduling-side awaiters a Rust
//! `async fn` running as a `CoroutineJob` body can `.await`.
//!
//! There is no bespoke "final awaiter" type here (spec §4.4d): in Rust, a future
//! resolving to `Poll::Ready` already *is* the final suspension point the C++ source
//! inserts a distinct coroutine-machinery awaiter for. The equivalent glue is the
//! completion hook `worker.rs` runs immediately after a `CoroutineJob`'s future
//! resolves — see that module's `execute` function. This is a deliberate,
//! Rust-native simplification of spec §4.4d, recorded in `DESIGN.md`.

pub mod await_tag;
pub mod handle;
pub mod parallel;
pub mod resume_on;

pub use await_tag::{await_tag, AwaitTag};
pub use handle::CoroutineHandle;
pub use parallel::{join1, join2, join3, join4, join_vec, Call, ParallelItem};
pub use resume_on::{resume_on, ResumeOn};
