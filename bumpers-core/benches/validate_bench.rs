//! Benchmarks for the validation hot path
//!
//! Compares event log backends and the cost of checkpointing.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bumpers_core::checks::{ActionWhitelist, ContentFilter, PatternCheck};
use bumpers_core::{
    EventLog, FailStrategy, InMemoryEventLog, NullEventLog, Session, ValidationContext,
    ValidationEngine, ValidationPoint,
};

fn engine_with_checks(log: Arc<dyn EventLog>) -> ValidationEngine {
    let mut engine = ValidationEngine::new(log);
    engine
        .register(
            ActionWhitelist::new(["search", "summarize", "translate"]),
            ValidationPoint::PreAction,
        )
        .register(
            ContentFilter::new(["password", "ssn", "credit card"]).with_max_length(4096),
            ValidationPoint::PreOutput,
        )
        .register(
            PatternCheck::new([r"\b\d{3}-\d{2}-\d{4}\b", r"(?i)api[_-]?key"]).unwrap(),
            ValidationPoint::PreOutput,
        );
    engine
}

fn bench_validate_pre_action(c: &mut Criterion) {
    let mut engine = engine_with_checks(Arc::new(NullEventLog));
    let ctx = ValidationContext::new()
        .with("action", "search")
        .with("action_input", "flights to Oslo");

    c.bench_function("validate_pre_action", |b| {
        b.iter(|| {
            let results = engine.validate(ValidationPoint::PreAction, &ctx).unwrap();
            black_box(results)
        })
    });
}

fn bench_validate_pre_output(c: &mut Criterion) {
    let mut engine = engine_with_checks(Arc::new(NullEventLog));
    let ctx = ValidationContext::new()
        .with("output", "The cheapest flight leaves at 07:40 and costs 1200 NOK.")
        .with("action_input", "flights to Oslo");

    c.bench_function("validate_pre_output", |b| {
        b.iter(|| {
            let results = engine.validate(ValidationPoint::PreOutput, &ctx).unwrap();
            black_box(results)
        })
    });
}

// =============================================================================
// Event log backends
// =============================================================================

fn bench_log_backends(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_backend");
    let ctx = ValidationContext::new().with("action", "search");

    group.bench_function(BenchmarkId::new("null", "pre_action"), |b| {
        let mut engine = engine_with_checks(Arc::new(NullEventLog));
        b.iter(|| black_box(engine.validate(ValidationPoint::PreAction, &ctx).unwrap()))
    });

    group.bench_function(BenchmarkId::new("memory", "pre_action"), |b| {
        let log = Arc::new(InMemoryEventLog::new());
        let mut engine = engine_with_checks(log.clone());
        b.iter(|| {
            if log.len() > 10_000 {
                log.clear();
            }
            black_box(engine.validate(ValidationPoint::PreAction, &ctx).unwrap())
        })
    });

    group.bench_function(BenchmarkId::new("file", "pre_action"), |b| {
        let dir = tempfile::tempdir().unwrap();
        let log = bumpers_core::FileEventLog::new(dir.path().join("bench.jsonl")).unwrap();
        let mut engine = engine_with_checks(Arc::new(log));
        b.iter(|| black_box(engine.validate(ValidationPoint::PreAction, &ctx).unwrap()))
    });

    group.finish();
}

fn bench_session_checkpointing(c: &mut Criterion) {
    c.bench_function("session_validate_with_checkpoint", |b| {
        let mut session = Session::new(Arc::new(NullEventLog));
        session.register(
            ActionWhitelist::new(["search"]).with_fail_strategy(FailStrategy::SelfCorrect),
            ValidationPoint::PreAction,
        );
        session.start_run("Benchmark request").unwrap();

        b.iter(|| {
            let mut ctx = ValidationContext::new()
                .with("action", "search")
                .with("action_input", "query");
            black_box(session.validate(ValidationPoint::PreAction, &mut ctx).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_validate_pre_action,
    bench_validate_pre_output,
    bench_log_backends,
    bench_session_checkpointing,
);
criterion_main!(benches);
