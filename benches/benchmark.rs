// Performance benchmarks for distance calculation and matrix building
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use phonodist::{build_distance_matrix, DistanceEngine, FeatureSystem};
use rand::prelude::*;
use std::sync::Arc;

fn random_pairs(system: &FeatureSystem, count: usize) -> Vec<(String, String)> {
    let mut rng = StdRng::seed_from_u64(7);
    let symbols = system.symbols();
    (0..count)
        .map(|_| {
            let a = &symbols[rng.random_range(0..symbols.len())];
            let b = &symbols[rng.random_range(0..symbols.len())];
            (a.clone(), b.clone())
        })
        .collect()
}

fn benchmark_pair_distance(c: &mut Criterion) {
    let system = Arc::new(FeatureSystem::bundled().unwrap());
    let pairs = random_pairs(&system, 256);
    let mut group = c.benchmark_group("pair_distance");

    for method in ["hamming", "jaccard", "euclidean", "cosine", "kmeans"] {
        group.bench_with_input(BenchmarkId::new("uncached", method), &method, |b, &method| {
            let engine = DistanceEngine::standalone(system.clone());
            engine.config().set("cache_size", 0).unwrap();
            b.iter(|| {
                for (x, y) in &pairs {
                    black_box(engine.calculate_distance(x, y, Some(method), None).unwrap());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("cached", method), &method, |b, &method| {
            let engine = DistanceEngine::standalone(system.clone());
            b.iter(|| {
                for (x, y) in &pairs {
                    black_box(engine.calculate_distance(x, y, Some(method), None).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn benchmark_matrix(c: &mut Criterion) {
    let system = Arc::new(FeatureSystem::bundled().unwrap());
    let mut group = c.benchmark_group("distance_matrix");
    group.sample_size(20);

    for size in [10, 30, system.len()] {
        let symbols: Vec<&str> = system.symbols().iter().take(size).map(|s| s.as_str()).collect();
        group.bench_with_input(BenchmarkId::new("hamming", size), &symbols, |b, symbols| {
            let engine = DistanceEngine::standalone(system.clone());
            engine.config().set("cache_size", 0).unwrap();
            b.iter(|| {
                black_box(build_distance_matrix(&engine, Some(&symbols[..]), Some("hamming"), None).unwrap())
            });
        });
    }

    group.finish();
}

fn benchmark_kmeans_training(c: &mut Criterion) {
    let system = Arc::new(FeatureSystem::bundled().unwrap());
    c.bench_function("kmeans_train", |b| {
        b.iter(|| {
            let engine = DistanceEngine::standalone(system.clone());
            black_box(engine.model().unwrap())
        });
    });
}

criterion_group!(benches, benchmark_pair_distance, benchmark_matrix, benchmark_kmeans_training);
criterion_main!(benches);
