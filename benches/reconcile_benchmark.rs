//! Benchmarks for the shard pipeline's CPU-bound stages.
//!
//! Run with: cargo bench
//!
//! Measures:
//! - Partitioning a large corpus into shards
//! - Reconciling a shard against previous output and failure counters
//! - Hostname extraction

use ahash::AHashSet;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dnsprune::partition::partition;
use dnsprune::{extract_domain, Counts, Reconciler};

/// Generate a sorted synthetic corpus.
fn generate_rules(count: usize) -> Vec<String> {
    let mut rules: Vec<String> = (0..count)
        .map(|i| format!("||host{}.example{}.com^", i, i % 97))
        .collect();
    rules.sort();
    rules
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    for size in [10_000, 100_000, 1_000_000] {
        let rules = generate_rules(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &rules, |b, rules| {
            b.iter(|| black_box(partition(black_box(rules), 16)))
        });
    }

    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    let reconciler = Reconciler::new(4);

    for size in [1_000, 10_000, 100_000] {
        let source = generate_rules(size);
        // 90% resolve, previous output holds 80%, a third have history
        let valid: AHashSet<String> = source
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 10 != 0)
            .map(|(_, r)| r.clone())
            .collect();
        let previous: AHashSet<String> = source
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 5 != 0)
            .map(|(_, r)| r.clone())
            .collect();
        let counters: Counts = source
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 == 0)
            .map(|(i, r)| (r.clone(), (i % 4) as u32))
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                black_box(reconciler.reconcile(
                    black_box(&source),
                    black_box(&valid),
                    black_box(&previous),
                    black_box(&counters),
                ))
            })
        });
    }

    group.finish();
}

fn bench_extract_domain(c: &mut Criterion) {
    let rules = [
        "||ads.example.com^",
        "||*.tracker.net^$third-party",
        "|pixel.cdn.example.org^",
        "plain-host.example.io",
    ];

    c.bench_function("extract_domain", |b| {
        b.iter(|| {
            for rule in &rules {
                black_box(extract_domain(black_box(rule)));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_partition,
    bench_reconcile,
    bench_extract_domain
);
criterion_main!(benches);
