//! Ingestion throughput benchmarks.
//!
//! Measures the per-entry cost of the logger pipeline at a full buffer (so
//! every append also evicts), with and without context enrichment, and the
//! cost of copying the buffer out for analysis.
//!
//! Run with: `cargo bench --bench ingestion_benchmarks`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Map, Value};

use wyn_log::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct BenchPlayer;

impl ContextProvider for BenchPlayer {
    fn name(&self) -> &str {
        "player"
    }

    fn state(&self) -> Result<Map<String, Value>, CaptureError> {
        let mut state = Map::new();
        state.insert("x".to_owned(), json!(100.0));
        state.insert("y".to_owned(), json!(240.0));
        state.insert("health".to_owned(), json!(3));
        Ok(state)
    }
}

fn full_logger(registry: Option<Arc<ContextRegistry>>) -> Logger {
    let config = LoggerConfig {
        sampling: SamplingPolicy::keep_all(),
        sampling_seed: Some(0),
        ..Default::default()
    };
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let logger = match registry {
        Some(registry) => Logger::with_registry(config, clock, registry),
        None => Logger::new(config, clock),
    };
    for i in 0..logger.capacity() {
        logger.info("WARMUP", Payload::new().with("i", i));
    }
    logger
}

// ---------------------------------------------------------------------------

fn bench_log_without_context(c: &mut Criterion) {
    let logger = full_logger(None);
    c.bench_function("log_at_capacity_no_context", |b| {
        b.iter(|| {
            black_box(logger.error(
                "PHYSICS_UPDATE_ERROR",
                Payload::new().subsystem("physics").message("step failed"),
            ));
        });
    });
}

fn bench_log_with_context(c: &mut Criterion) {
    let registry = Arc::new(ContextRegistry::new());
    registry.register(Arc::new(BenchPlayer));
    let logger = full_logger(Some(registry));
    c.bench_function("log_at_capacity_with_context", |b| {
        b.iter(|| {
            black_box(logger.warn(
                "PLAYER_FALL_OUT_OF_BOUNDS",
                Payload::new().subsystem("player"),
            ));
        });
    });
}

fn bench_snapshot_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_snapshot");
    for capacity in [500usize, 2000, 8000] {
        let buffer = RingBuffer::new(capacity);
        for i in 0..capacity {
            buffer.push(Arc::new(i));
        }
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &buffer, |b, buffer| {
            b.iter(|| black_box(buffer.snapshot().len()));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_log_without_context,
    bench_log_with_context,
    bench_snapshot_copy,
);
criterion_main!(benches);
