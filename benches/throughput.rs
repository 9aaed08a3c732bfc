// Copyright 2026 Jobsys Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Throughput of scheduling and draining a flat batch of no-op function jobs, and of a
//! coroutine fan-out/join of the same width, across a couple of worker counts.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use jobsys::coroutine::join_vec;
use jobsys::{Config, Placement, Scheduler, TagId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BATCH: usize = 10_000;

fn bench_function_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("function_fan_out");
    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            let sched = Scheduler::new(Config::new().worker_count(workers));
            b.iter(|| {
                let counter = Arc::new(AtomicUsize::new(0));
                for _ in 0..BATCH {
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
            });
            sched.terminate();
        });
    }
    group.finish();
}

fn bench_coroutine_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("coroutine_join");
    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            let sched = Scheduler::new(Config::new().worker_count(workers));
            b.iter(|| {
                sched.spawn_coroutine(
                    async move {
                        let items = (0..BATCH).map(|i| async move { i }).collect::<Vec<_>>();
                        let _: Vec<usize> = join_vec(items).await;
                    },
                    Placement::default(),
                );
                sched.wait();
            });
            sched.terminate();
        });
    }
    group.finish();
}

criterion_group!(benches, bench_function_fan_out, bench_coroutine_join);
criterion_main!(benches);
