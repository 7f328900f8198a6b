//! Scheduler throughput benchmarks: push/pop and reschedule-churn cost,
//! since `schedule`/`get` sit on the hot path of every fetch cycle.

use chrono::Duration as ChronoDuration;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chubindex::services::scheduler::{Scheduler, SystemClock};

fn bench_schedule_then_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_schedule_then_get");

    for size in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut scheduler = Scheduler::with_clock(ChronoDuration::seconds(3600), SystemClock);
                for i in 0..size {
                    scheduler.schedule(format!("repo-{i}"), Some(ChronoDuration::seconds(-1)));
                }
                let got = black_box(scheduler.get(size));
                assert_eq!(got.len(), size);
            });
        });
    }

    group.finish();
}

/// Repeated rescheduling of the same id is the notification-storm case:
/// every call must tombstone the previous entry rather than growing the
/// heap unbounded.
fn bench_reschedule_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_reschedule_churn");

    for churn in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(churn as u64));
        group.bench_with_input(BenchmarkId::from_parameter(churn), &churn, |b, &churn| {
            b.iter(|| {
                let mut scheduler = Scheduler::with_clock(ChronoDuration::seconds(3600), SystemClock);
                for _ in 0..churn {
                    black_box(scheduler.schedule("hot-repo", Some(ChronoDuration::seconds(30))));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_schedule_then_get, bench_reschedule_churn);
criterion_main!(benches);
