use criterion::{criterion_group, criterion_main, Criterion};

use memory_format::format_with_budget;

fn fixture(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("memory number {i}: some recalled fact with a bit of prose to pack"))
        .collect()
}

fn bench_format_1k(c: &mut Criterion) {
    let texts = fixture(1000);
    c.bench_function("format_1000_candidates_budget_2000", |b| {
        b.iter(|| format_with_budget(&texts, 2000));
    });
}

fn bench_format_10k(c: &mut Criterion) {
    let texts = fixture(10_000);
    c.bench_function("format_10000_candidates_budget_4000", |b| {
        b.iter(|| format_with_budget(&texts, 4000));
    });
}

criterion_group!(benches, bench_format_1k, bench_format_10k);
criterion_main!(benches);
