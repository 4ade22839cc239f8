// SPDX-License-Identifier: PMPL-1.0-or-later
//! Performance benchmarks for typed key-value repositories

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Runtime;

use kvrepo::{Context, KvRepository, Observable};
use kvrepo_store::InMemoryConnection;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    id: u64,
    owner: String,
    balance: i64,
    tags: Vec<String>,
}

impl Observable for Account {}

fn account(i: u64) -> Account {
    Account {
        id: i,
        owner: format!("owner-{}", i),
        balance: (i as i64) * 100,
        tags: vec!["retail".to_string(), "eu".to_string()],
    }
}

fn repository() -> KvRepository<Account, InMemoryConnection> {
    KvRepository::new(Arc::new(InMemoryConnection::new()), "account:")
}

// ============================================================================
// Single-Key Benchmarks
// ============================================================================

fn bench_set(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let repo = repository();
    let ctx = Context::background();
    let value = account(1);

    let mut group = c.benchmark_group("single");

    group.bench_function("set", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(repo.set(&ctx, "bench", &value).await.unwrap())
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let repo = repository();
    let ctx = Context::background();

    rt.block_on(async {
        for i in 0..1000 {
            repo.set(&ctx, &format!("acct-{}", i), &account(i)).await.unwrap();
        }
    });

    let mut group = c.benchmark_group("single");

    group.bench_function("get_hit", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(repo.get(&ctx, "acct-500").await.unwrap())
        });
    });

    group.bench_function("get_miss", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(repo.get(&ctx, "absent").await.is_err())
        });
    });

    group.finish();
}

// ============================================================================
// Batch Benchmarks
// ============================================================================

fn bench_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let ctx = Context::background();

    let mut group = c.benchmark_group("batch");

    for size in [10u64, 100, 1000] {
        let repo = repository();
        let entries: HashMap<String, Account> =
            (0..size).map(|i| (format!("acct-{}", i), account(i))).collect();
        let keys: Vec<String> = entries.keys().cloned().collect();

        group.throughput(Throughput::Elements(size));

        group.bench_with_input(BenchmarkId::new("mset", size), &entries, |b, entries| {
            b.to_async(&rt).iter(|| async {
                black_box(repo.mset(&ctx, entries).await.unwrap())
            });
        });

        group.bench_with_input(BenchmarkId::new("mget", size), &keys, |b, keys| {
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            b.to_async(&rt).iter(|| async {
                black_box(repo.mget(&ctx, &refs).await.unwrap())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Counter Benchmarks
// ============================================================================

fn bench_increment(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let repo: KvRepository<i64, _> = KvRepository::new(Arc::new(InMemoryConnection::new()), "hits:");
    let ctx = Context::background();

    let mut group = c.benchmark_group("counter");

    group.bench_function("increment", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(repo.increment(&ctx, "page", 1).await.unwrap())
        });
    });

    group.bench_function("increment_concurrent_10", |b| {
        b.to_async(&rt).iter(|| async {
            let calls = (0..10).map(|_| repo.increment(&ctx, "page", 1));
            black_box(futures::future::join_all(calls).await)
        });
    });

    group.finish();
}

// ============================================================================
// Pattern Benchmarks
// ============================================================================

fn bench_patterns(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let repo = repository();
    let ctx = Context::background();

    rt.block_on(async {
        for i in 0..1000 {
            repo.set(&ctx, &format!("acct-{}", i), &account(i)).await.unwrap();
        }
    });

    let mut group = c.benchmark_group("pattern");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("keys_all", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(repo.keys(&ctx, "*").await.unwrap())
        });
    });

    group.bench_function("scan_full_cursor_loop", |b| {
        b.to_async(&rt).iter(|| async {
            let mut cursor = 0;
            let mut seen = 0;
            loop {
                let (page, next) = repo.scan(&ctx, cursor, "acct-*", 100).await.unwrap();
                seen += page.len();
                if next == 0 {
                    break;
                }
                cursor = next;
            }
            black_box(seen)
        });
    });

    group.finish();
}

criterion_group!(single_benches, bench_set, bench_get);

criterion_group!(batch_benches, bench_batch);

criterion_group!(counter_benches, bench_increment);

criterion_group!(pattern_benches, bench_patterns);

criterion_main!(single_benches, batch_benches, counter_benches, pattern_benches);
