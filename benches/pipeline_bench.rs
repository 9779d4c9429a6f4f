use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use corate::builder::ItemKnnBuilder;
use corate::core::Rating;
use corate::index::{build_index, build_index_par};
use corate::neighbors::NeighborAggregator;
use corate::similarity::{compute_similarities_with, SimilarityParams};
use rand::prelude::*;
use std::hint::black_box;
use std::time::Duration;

fn make_ratings(n_users: u64, n_items: u64, density: f64, seed: u64) -> Vec<Rating> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::new();
    for user in 0..n_users {
        for item in 0..n_items {
            if rng.random_bool(density) {
                out.push(Rating::new(user, item, rng.random_range(1..=5) as f64));
            }
        }
    }
    out
}

pub fn criterion_benchmark(c: &mut Criterion) {
    {
        // sequential and parallel runs must agree before timing anything
        let ratings = make_ratings(300, 120, 0.05, 7);
        let seq = ItemKnnBuilder::new()
            .with_parallel(false)
            .build(ratings.clone())
            .unwrap();
        let par = ItemKnnBuilder::new().build(ratings).unwrap();
        assert_eq!(seq.pairs(), par.pairs(), "parallel pass must match sequential");
    }

    let mut group = c.benchmark_group("item_knn");
    group.warm_up_time(Duration::from_millis(300));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    for &(users, items) in &[(1_000u64, 200u64), (5_000, 500), (10_000, 1_000)] {
        let label = format!("{users}u_{items}i");

        group.bench_function(BenchmarkId::new("build_index", &label), |b| {
            b.iter_batched(
                || make_ratings(users, items, 0.02, 42),
                |ratings| black_box(build_index(ratings)),
                BatchSize::LargeInput,
            )
        });

        group.bench_function(BenchmarkId::new("build_index_par", &label), |b| {
            b.iter_batched(
                || make_ratings(users, items, 0.02, 42),
                |ratings| black_box(build_index_par(&ratings)),
                BatchSize::LargeInput,
            )
        });

        let index = build_index(make_ratings(users, items, 0.02, 42));
        for parallel in [false, true] {
            let params = SimilarityParams {
                parallel,
                ..SimilarityParams::default()
            };
            let name = if parallel { "similarity_par" } else { "similarity_seq" };
            group.bench_function(BenchmarkId::new(name, &label), |b| {
                b.iter(|| black_box(compute_similarities_with(&index, &params).unwrap()))
            });
        }

        let (pairs, _) = compute_similarities_with(&index, &SimilarityParams::default()).unwrap();
        for parallel in [false, true] {
            let agg = NeighborAggregator::default().with_parallel(parallel);
            let name = if parallel { "aggregate_par" } else { "aggregate_seq" };
            group.bench_function(BenchmarkId::new(name, &label), |b| {
                b.iter(|| black_box(agg.aggregate(&pairs)))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
