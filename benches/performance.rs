//! Performance benchmarks for parameter streams.

use cernml_utils::streams::EventQueue;
use cernml_utils::{subscribe_param, ReplayClient, Scripted, StreamConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::thread;
use std::time::Duration;

/// Raw ring-buffer throughput at different bounds
fn bench_queue_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push_pop");

    for maxlen in [1usize, 16, 1024] {
        group.bench_with_input(BenchmarkId::new("maxlen", maxlen), &maxlen, |b, &maxlen| {
            let mut queue = EventQueue::new(Some(maxlen));
            b.iter(|| {
                for i in 0..1000u32 {
                    black_box(queue.push(Ok(i)));
                }
                while let Ok(event) = queue.pop_oldest() {
                    black_box(event.ok());
                }
            });
        });
    }

    group.finish();
}

/// Emit then pop on one thread, through the full stream stack
fn bench_stream_emit_pop(c: &mut Criterion) {
    let client = ReplayClient::<u64>::new(vec![]);
    let stream = subscribe_param(
        &client,
        "bench",
        StreamConfig {
            maxlen: None,
            ..Default::default()
        },
    )
    .unwrap();
    let replay = client.last_handle().unwrap();
    let active = stream.monitor();

    c.bench_function("stream_emit_pop", |b| {
        b.iter(|| {
            replay.emit(Scripted::Value(42));
            black_box(active.pop_if_ready().unwrap());
        });
    });
}

/// Handoff from a producer thread to a blocked consumer
fn bench_stream_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_handoff");
    group.sample_size(20);

    for batch in [100u64, 1000] {
        group.bench_with_input(BenchmarkId::new("items", batch), &batch, |b, &batch| {
            let client = ReplayClient::<u64>::new(vec![]);
            let stream = subscribe_param(
                &client,
                "bench",
                StreamConfig {
                    maxlen: None,
                    ..Default::default()
                },
            )
            .unwrap();
            let replay = client.last_handle().unwrap();
            let active = stream.monitor();

            b.iter(|| {
                thread::scope(|s| {
                    s.spawn(|| {
                        for i in 0..batch {
                            replay.emit(Scripted::Value(i));
                        }
                    });
                    for _ in 0..batch {
                        black_box(active.pop_or_wait(Some(Duration::from_secs(5))).unwrap());
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_queue_push_pop, bench_stream_emit_pop, bench_stream_handoff);
criterion_main!(benches);
