//! Performance benchmarks for tile and split_axis.
//!
//! Backward of tile walks every replica slice, so its cost grows with the
//! replica count rather than the input size alone.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::ArrayD;
use teselar::{backward, split_axis, tile, TensorData, Variable};

fn input(rows: usize, cols: usize) -> Variable<ArrayD<f32>> {
    let values = (0..rows * cols).map(|v| v as f64 * 0.01).collect();
    Variable::from_f64_vec(&[rows, cols], values, true).unwrap()
}

/// Benchmark tile forward for growing replica counts
fn bench_tile_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("TileForward");
    let x = input(32, 32);

    for reps in [1usize, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements((32 * 32 * reps * reps) as u64));
        group.bench_with_input(BenchmarkId::new("square", reps), reps, |b, &reps| {
            b.iter(|| black_box(tile(&x, [reps, reps]).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark tile backward, which sums one slice per replica
fn bench_tile_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("TileBackward");

    for reps in [1usize, 2, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::new("square", reps), reps, |b, &reps| {
            b.iter(|| {
                let x = input(32, 32);
                let y = tile(&x, [reps, reps]).unwrap();
                backward(&y, None).unwrap();
                black_box(x.grad())
            });
        });
    }
    group.finish();
}

/// Benchmark split_axis forward + backward
fn bench_split_axis(c: &mut Criterion) {
    let mut group = c.benchmark_group("SplitAxis");

    for sections in [2usize, 8, 32].iter() {
        group.bench_with_input(BenchmarkId::new("sections", sections), sections, |b, &sections| {
            b.iter(|| {
                let x = input(64, 64);
                let ys = split_axis(&x, sections, 1).unwrap();
                backward(&ys[0], None).unwrap();
                black_box(x.grad().map(|g| g.len()))
            });
        });
    }
    group.finish();
}

/// Benchmark the raw backend tile without graph bookkeeping
fn bench_backend_tile(c: &mut Criterion) {
    let x = input(64, 64).into_data();
    c.bench_function("backend_tile_4x4", |b| {
        b.iter(|| black_box(TensorData::tile(&x, &[4, 4]).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_tile_forward,
    bench_tile_backward,
    bench_split_axis,
    bench_backend_tile,
);
criterion_main!(benches);
