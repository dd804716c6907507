//! Benchmarks for preview decimation and layer building

use annotations::{decimate, ShapeFactory, StylePatch};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shared_types::{DataPoint, ShapeKind};

fn freehand(n: usize) -> Vec<DataPoint> {
    (0..n)
        .map(|i| {
            let t = i as f64 * 0.01;
            DataPoint::new(t.cos() * t, t.sin() * t)
        })
        .collect()
}

fn bench_decimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("decimate");

    for n in [1_000usize, 10_000, 100_000] {
        let points = freehand(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &points, |b, points| {
            b.iter(|| decimate(black_box(points), 1000));
        });
    }

    group.finish();
}

fn bench_renderable(c: &mut Criterion) {
    let mut group = c.benchmark_group("renderable");
    let mut factory = ShapeFactory::new();
    let polygon = factory.create_shape("bench", &StylePatch::empty(ShapeKind::Polygon));
    let points = decimate(&freehand(5_000), 1000);

    group.bench_function("polygon_1000", |b| {
        b.iter(|| polygon.to_renderable(black_box(&points)));
    });

    group.bench_function("factory_cache_hit", |b| {
        let patch = StylePatch::empty(ShapeKind::Polyline);
        b.iter(|| factory.create_shape(black_box("bench"), &patch));
    });

    group.finish();
}

criterion_group!(benches, bench_decimate, bench_renderable);
criterion_main!(benches);
