use criterion::{black_box, criterion_group, criterion_main, Criterion};

use scan_timing_core::{BoundingBox, GridAccumulator, GridGeometry};

const POINTS: u64 = 1_000_000;

// 走査線ごとに西から東へ読み進める1km x 1.25kmのタイル
fn survey() -> Vec<(f64, f64)> {
    (0..POINTS)
        .map(|i| {
            let line = (i / 10_000) as f64;
            let along = (i % 10_000) as f64 * 0.1;
            (along, line * 12.5)
        })
        .collect()
}

fn record_points(points: &[(f64, f64)], cell_count: usize) -> u64 {
    let bbox = BoundingBox::new(0, 0, 1000, 1250);
    let geometry = GridGeometry::from_box(&bbox, cell_count, cell_count, 1).unwrap();
    let mut accumulator = GridAccumulator::new(geometry, bbox);

    for (time, &(x, y)) in (1..).zip(points) {
        accumulator.record_point(x, y, time);
    }

    accumulator.recorded()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let points = survey();

    let mut group = c.benchmark_group("record_points");
    group.sample_size(10);

    for cell_count in [100, 500] {
        group.bench_function(format!("{cell_count}x{cell_count}"), |b| {
            b.iter(|| record_points(black_box(&points), cell_count))
        });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
