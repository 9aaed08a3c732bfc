// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! End-to-end scenarios over the public API (spec §8): fan-out/join, nested coroutine
//! fan-out, thread migration, tag-deferred gather, recycle-pool reuse, capacity
//! rejection, allocation failure, and shutdown mid-flight.

use jobsys::coroutine::{await_tag, join2, join3, join_vec, resume_on};
use jobsys::{BoundedFrameAllocator, Config, Placement, Scheduler, TagId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn scheduler(workers: u32) -> Arc<Scheduler> {
    Scheduler::new(Config::new().worker_count(workers as usize))
}

#[test]
fn function_jobs_run_and_wait_drains_them() {
    let sched = scheduler(4);
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..200 {
        let counter = Arc::clone(&counter);
        sched.schedule_function(
            move || {
                counter.fetch_add(1, Ordering::Relaxed);
            },
            Placement::default(),
            TagId::INVALID,
        );
    }
    sched.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 200);
    sched.terminate();
}

#[test]
fn function_job_can_fan_out_children_before_completing() {
    let sched = scheduler(4);
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let sched2 = Arc::clone(&sched);
        let counter2 = Arc::clone(&counter);
        sched.schedule_function(
            move || {
                for _ in 0..10 {
                    let counter3 = Arc::clone(&counter2);
                    sched2.schedule_function(
                        move || {
                            counter3.fetch_add(1, Ordering::Relaxed);
                        },
                        Placement::default(),
                        TagId::INVALID,
                    );
                }
            },
            Placement::default(),
            TagId::INVALID,
        );
    }
    sched.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 10);
    sched.terminate();
}

#[test]
fn coroutine_join_fans_out_and_collects_results() {
    let sched = scheduler(4);
    let result = Arc::new(std::sync::Mutex::new(None));
    {
        let result = Arc::clone(&result);
        sched.spawn_coroutine(
            async move {
                let (a, b, c) = join3(
                    async { 1 + 1 },
                    async { 2 + 2 },
                    async { 3 + 3 },
                )
                .await;
                *result.lock().unwrap() = Some(a + b + c);
            },
            Placement::default(),
        );
    }
    sched.wait();
    assert_eq!(*result.lock().unwrap(), Some(12));
    sched.terminate();
}

#[test]
fn nested_coroutine_fan_out_completes() {
    let sched = scheduler(4);
    let result = Arc::new(std::sync::Mutex::new(None));
    {
        let result = Arc::clone(&result);
        sched.spawn_coroutine(
            async move {
                let values = join_vec(
                    (0..8)
                        .map(|i| async move {
                            let (x, y) = join2(
                                async move { i },
                                async move { i * 10 },
                            )
                            .await;
                            x + y
                        })
                        .collect::<Vec<_>>(),
                )
                .await;
                *result.lock().unwrap() = Some(values.iter().sum::<i32>());
            },
            Placement::default(),
        );
    }
    sched.wait();
    let expected: i32 = (0..8).map(|i| i + i * 10).sum();
    assert_eq!(*result.lock().unwrap(), Some(expected));
    sched.terminate();
}

#[test]
fn resume_on_migrates_to_the_requested_worker() {
    let sched = scheduler(4);
    let observed = Arc::new(std::sync::Mutex::new(None));
    {
        let observed = Arc::clone(&observed);
        sched.spawn_coroutine(
            async move {
                resume_on(2).await;
                *observed.lock().unwrap() = jobsys::current_thread_index();
            },
            Placement::default(),
        );
    }
    sched.wait();
    assert_eq!(*observed.lock().unwrap(), Some(2));
    sched.terminate();
}

#[test]
fn await_tag_gathers_jobs_parked_under_it() {
    let sched = scheduler(4);
    let tag = TagId::new(7);
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let counter2 = Arc::clone(&counter);
        sched.schedule_function(
            move || {
                counter2.fetch_add(1, Ordering::Relaxed);
            },
            Placement::default(),
            tag,
        );
    }
    let resolved = Arc::new(std::sync::Mutex::new(None));
    {
        let resolved = Arc::clone(&resolved);
        sched.spawn_coroutine(
            async move {
                let n = await_tag(tag).await;
                *resolved.lock().unwrap() = Some(n);
            },
            Placement::default(),
        );
    }
    sched.wait();
    assert_eq!(*resolved.lock().unwrap(), Some(5));
    assert_eq!(counter.load(Ordering::Relaxed), 5);
    sched.terminate();
}

#[test]
fn schedule_tag_drains_parked_jobs_without_a_waiting_coroutine() {
    let sched = scheduler(4);
    let tag = TagId::new(9);
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let counter2 = Arc::clone(&counter);
        sched.schedule_function(
            move || {
                counter2.fetch_add(1, Ordering::Relaxed);
            },
            Placement::default(),
            tag,
        );
    }
    // give the workers a moment to ensure the jobs are parked, not yet running.
    std::thread::sleep(Duration::from_millis(20));
    let drained = sched.schedule_tag(tag);
    assert_eq!(drained, 3);
    sched.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 3);
    sched.terminate();
}

#[test]
fn await_tag_on_an_invalid_tag_resolves_immediately_to_zero() {
    let sched = scheduler(2);
    let result = Arc::new(std::sync::Mutex::new(None));
    {
        let result = Arc::clone(&result);
        sched.spawn_coroutine(
            async move {
                let n = await_tag(TagId::default()).await;
                *result.lock().unwrap() = Some(n);
            },
            Placement::default(),
        );
    }
    sched.wait();
    assert_eq!(*result.lock().unwrap(), Some(0));
    sched.terminate();
}

#[test]
fn recycle_pool_reuses_function_job_units_across_waves() {
    let sched = scheduler(2);
    for _wave in 0..3 {
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            sched.schedule_function(
                move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                },
                Placement::default(),
                TagId::INVALID,
            );
        }
        sched.wait();
        assert_eq!(counter.load(Ordering::Relaxed), 50);
    }
    sched.terminate();
}

#[test]
fn bounded_allocator_reports_failure_without_running_the_body() {
    let allocator = Arc::new(BoundedFrameAllocator::new(0));
    let sched = scheduler(2);
    let ran = Arc::new(AtomicUsize::new(0));
    let handle = {
        let ran = Arc::clone(&ran);
        sched.spawn_coroutine_in(
            async move {
                ran.fetch_add(1, Ordering::Relaxed);
            },
            Placement::default(),
            TagId::INVALID,
            allocator,
        )
    };
    assert!(matches!(handle.try_take(), Some(Err(_))));
    assert_eq!(ran.load(Ordering::Relaxed), 0);
    sched.terminate();
}

#[test]
fn terminate_joins_workers_and_can_run_with_nothing_outstanding() {
    let sched = scheduler(3);
    sched.wait();
    sched.terminate();
}

#[test]
fn placement_honors_explicit_target_thread() {
    let sched = scheduler(4);
    let observed = Arc::new(std::sync::Mutex::new(None));
    {
        let observed = Arc::clone(&observed);
        sched.schedule_function(
            move || {
                *observed.lock().unwrap() = jobsys::current_thread_index();
            },
            Placement {
                target_thread: Some(1),
                ..Placement::default()
            },
            TagId::INVALID,
        );
    }
    sched.wait();
    assert_eq!(*observed.lock().unwrap(), Some(1));
    sched.terminate();
}
