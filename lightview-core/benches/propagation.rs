//! Benchmarks for write propagation and expression evaluation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use lightview_core::{Effect, Runtime, Signal, SignalOptions, StateOptions, Value};

// =============================================================================
// Signal fan-out
// =============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_fan_out");

    for subscribers in [1usize, 10, 100] {
        let rt = Runtime::new();
        let source = Signal::new(0);
        let effects: Vec<Effect> = (0..subscribers)
            .map(|_| {
                let source = source.clone();
                rt.effect(move || {
                    black_box(source.get());
                })
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                let mut n = 0;
                b.iter(|| {
                    n += 1;
                    source.set(n);
                });
            },
        );
        drop(effects);
    }

    group.finish();
}

// =============================================================================
// State writes
// =============================================================================

fn bench_state_write(c: &mut Criterion) {
    let rt = Runtime::new();
    let doc = rt
        .state(
            Value::from_json(&json!({ "user": { "name": "Ada", "age": 36 } })),
            StateOptions::default(),
        )
        .unwrap();
    let Value::State(user) = doc.get("user") else {
        panic!("expected a nested state");
    };
    let reader = user.clone();
    let _effect = rt.effect(move || {
        black_box(reader.get("age"));
    });

    c.bench_function("state_nested_write", |b| {
        let mut n = 0;
        b.iter(|| {
            n += 1;
            user.set("age", n).unwrap();
        });
    });
}

// =============================================================================
// Expressions
// =============================================================================

fn bench_expressions(c: &mut Criterion) {
    let mut group = c.benchmark_group("expressions");
    let rt = Runtime::new();
    rt.signal(3, SignalOptions::named("count")).unwrap();
    rt.state(
        Value::from_json(&json!({ "items": (0..50).map(|v| json!({ "v": v })).collect::<Vec<_>>() })),
        StateOptions::named("cart"),
    )
    .unwrap();

    for (name, source) in [
        ("call", "$/add($/count, 1)"),
        ("infix", "$/count * 2 + 1"),
        ("explosion", "$/sum($/cart/items...v)"),
        ("lazy_filter", "count(filter($/cart/items, gt(_.v, 25)))"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(rt.resolve_expression(source, &Value::Undefined).unwrap()));
        });
    }

    group.bench_function("recompute", |b| {
        let count = rt.get_signal("count", Default::default()).unwrap();
        let doubled = rt.parse_expression("$/mul($/count, 2)", Value::Undefined);
        let mut n = 0;
        b.iter(|| {
            n += 1;
            count.set(n);
            black_box(doubled.get_untracked());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_state_write, bench_expressions);
criterion_main!(benches);
