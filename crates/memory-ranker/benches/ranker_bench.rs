use criterion::{criterion_group, criterion_main, Criterion};

use memory_core::config::RankerConfig;
use memory_core::model::{MemoryRecord, MemoryType, Scope};
use memory_ranker::rank;

fn fixture(n: usize) -> Vec<(MemoryRecord, f32)> {
    (0..n)
        .map(|i| {
            let mut m = MemoryRecord::new(format!("memory {i}"), MemoryType::Fact, Scope::Permanent);
            m.access_count = (i % 50) as u64;
            (m, 0.5 + (i as f32 % 50.0) / 100.0)
        })
        .collect()
}

fn bench_rank_1k(c: &mut Criterion) {
    let weights = RankerConfig::default();
    c.bench_function("rank_1000_candidates", |b| {
        b.iter_batched(
            || fixture(1000),
            |pairs| rank(pairs, Some("project-a"), &weights),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_rank_10k(c: &mut Criterion) {
    let weights = RankerConfig::default();
    c.bench_function("rank_10000_candidates", |b| {
        b.iter_batched(
            || fixture(10_000),
            |pairs| rank(pairs, None, &weights),
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_rank_1k, bench_rank_10k);
criterion_main!(benches);
