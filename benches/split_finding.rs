//! Split finding benchmarks.
//!
//! Measures the single-pass gain ratio scan over sorted entries, the hot
//! loop of tree growth, across node sizes and duplicate densities.

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use foresters::forest::SplitFinder;

/// Feature values and labels for a node of `size` instances over `distinct`
/// distinct feature values.
fn node_entries(size: usize, distinct: usize, seed: u64) -> Vec<(f32, u32)> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..size)
        .map(|_| {
            let value = rng.gen_range(0..distinct) as f32 * 0.25;
            let label = u32::from(value > distinct as f32 * 0.125);
            (value, label)
        })
        .collect()
}

fn bench_find_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split/find");

    for &size in &[100usize, 1_000, 10_000] {
        let entries = node_entries(size, size, 7);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &entries, |b, entries| {
            b.iter_batched(
                || {
                    let mut finder = SplitFinder::new(2);
                    for &(value, label) in entries {
                        finder.add_instance(value, label, 1.0);
                    }
                    (finder, Xoshiro256PlusPlus::seed_from_u64(13))
                },
                |(mut finder, mut rng)| black_box(finder.find_split(&mut rng)),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Bootstrap samples repeat instances, landing on the dedup merge path.
fn bench_dedup_accumulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("split/dedup_add");

    for &distinct in &[10usize, 100, 1_000] {
        let entries = node_entries(10_000, distinct, 11);
        group.throughput(Throughput::Elements(entries.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(distinct),
            &entries,
            |b, entries| {
                b.iter_batched(
                    || SplitFinder::new(2),
                    |mut finder| {
                        for &(value, label) in entries {
                            finder.add_instance_dedup(value, label, 1.0);
                        }
                        black_box(finder.len())
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_find_split, bench_dedup_accumulation);
criterion_main!(benches);
