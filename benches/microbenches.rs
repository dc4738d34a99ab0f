//! Criterion microbenches for the anchorkit clustering core.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - the corner-anchored overlap metric (single row)
//! - a full clustering run over a synthetic corpus

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use anchorkit::anchors::{cluster, init_centroids, overlap, BoxShape, ClusterOptions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn synthetic_corpus(count: usize, seed: u64) -> Vec<BoxShape> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            BoxShape::new(
                rng.random_range(5.0..300.0),
                rng.random_range(5.0..300.0),
            )
        })
        .collect()
}

/// Benchmark one distance-row computation against five centroids.
fn bench_overlap_row(c: &mut Criterion) {
    let centroids = synthetic_corpus(5, 1);
    let x = BoxShape::new(64.0, 128.0);

    let mut group = c.benchmark_group("overlap");
    group.throughput(Throughput::Elements(centroids.len() as u64));

    group.bench_function("overlap_row_k5", |b| {
        b.iter(|| black_box(overlap(black_box(x), black_box(&centroids))))
    });

    group.finish();
}

/// Benchmark a full clustering run on a 1000-box corpus.
fn bench_cluster_run(c: &mut Criterion) {
    let corpus = synthetic_corpus(1000, 2);
    let mut rng = StdRng::seed_from_u64(3);
    let initial = init_centroids(&corpus, 5, &mut rng).expect("init centroids");

    let mut group = c.benchmark_group("cluster");
    group.throughput(Throughput::Elements(corpus.len() as u64));

    group.bench_function("cluster_1000x5", |b| {
        b.iter(|| {
            let outcome = cluster(
                black_box(&corpus),
                black_box(initial.clone()),
                &ClusterOptions::default(),
            )
            .expect("cluster");
            black_box(outcome)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_overlap_row, bench_cluster_run);
criterion_main!(benches);
