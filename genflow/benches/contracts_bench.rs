//! Benchmarks for output validation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use genflow::contracts::strip_code_fence;
use genflow::pipeline::angle_set_shape;
use genflow::testing::{angle_json, angle_set};

fn shape_benchmark(c: &mut Criterion) {
    let shape = angle_set_shape();
    let valid = angle_set(5);
    let mut invalid = angle_set(5);
    invalid["angles"][4]["journey"] = serde_json::Value::Null;

    c.bench_function("angle_shape_valid", |b| {
        b.iter(|| shape.validate(black_box(&valid)))
    });
    c.bench_function("angle_shape_invalid", |b| {
        b.iter(|| shape.validate(black_box(&invalid)))
    });
}

fn fence_benchmark(c: &mut Criterion) {
    let fenced = format!("```json\n{}\n```", angle_json(5));
    let plain = angle_json(5);

    c.bench_function("strip_fenced", |b| b.iter(|| strip_code_fence(black_box(&fenced)).len()));
    c.bench_function("strip_plain", |b| b.iter(|| strip_code_fence(black_box(&plain)).len()));
}

criterion_group!(benches, shape_benchmark, fence_benchmark);
criterion_main!(benches);
