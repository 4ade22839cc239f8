// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metrics-collecting wrapper for kvrepo connections.
//
// Wraps any `KvConnection` and transparently collects command counts, latency
// sums, byte transfer totals and failures. Useful for profiling, dashboards,
// and for asserting in tests that an operation issued no store command.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{KeyTtl, KvConnection};
use crate::context::Context;
use crate::error::StoreError;
use crate::options::ConnectionOptions;

/// Accumulated statistics for a connection.
///
/// All counters are monotonically increasing for the lifetime of the
/// [`MetricsConnection`] that owns them, until [`MetricsConnection::reset_stats`].
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    /// Keys read via `get` and `mget`.
    pub get_count: u64,
    /// Keys written via `set` and `mset`.
    pub set_count: u64,
    /// `del` calls.
    pub delete_count: u64,
    /// `keys` and `scan` calls.
    pub scan_count: u64,
    /// Every other command (`exists`, TTL commands, `incr_by`, `ping`).
    pub other_count: u64,
    /// Commands that returned an error other than [`StoreError::Nil`].
    pub error_count: u64,
    /// Cumulative wall-clock latency of all read calls, in milliseconds.
    pub get_latency_sum_ms: f64,
    /// Cumulative wall-clock latency of all write calls, in milliseconds.
    pub set_latency_sum_ms: f64,
    /// Total value bytes read across `get` and `mget`.
    pub total_bytes_read: u64,
    /// Total value bytes written across `set` and `mset`.
    pub total_bytes_written: u64,
}

impl ConnectionStats {
    /// Total operations observed.
    ///
    /// This is not a round-trip count: `mget` and `mset` contribute one per
    /// key, like `get_count` and `set_count` do.
    pub fn commands(&self) -> u64 {
        self.get_count + self.set_count + self.delete_count + self.scan_count + self.other_count
    }
}

fn ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// A connection wrapper that collects command metrics.
///
/// Delegates every command to an inner connection while measuring wall-clock
/// latency and counting invocations. Statistics are available via
/// [`MetricsConnection::stats`].
///
/// # Example
///
/// ```rust
/// use kvrepo_store::{Context, InMemoryConnection, KvConnection, MetricsConnection};
///
/// # tokio_test::block_on(async {
/// let metered = MetricsConnection::new(InMemoryConnection::new());
/// let ctx = Context::background();
///
/// metered.set(&ctx, "key", b"value", None).await.unwrap();
/// metered.get(&ctx, "key").await.unwrap();
///
/// let stats = metered.stats().await;
/// assert_eq!(stats.set_count, 1);
/// assert_eq!(stats.get_count, 1);
/// # });
/// ```
pub struct MetricsConnection<C: KvConnection> {
    inner: C,
    stats: Arc<RwLock<ConnectionStats>>,
}

impl<C: KvConnection> MetricsConnection<C> {
    /// Wrap `inner` with metrics collection.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            stats: Arc::new(RwLock::new(ConnectionStats::default())),
        }
    }

    /// Return a snapshot of the current statistics.
    pub async fn stats(&self) -> ConnectionStats {
        self.stats.read().await.clone()
    }

    /// Reset all statistics to zero.
    pub async fn reset_stats(&self) {
        let mut s = self.stats.write().await;
        *s = ConnectionStats::default();
    }

    /// Return a reference to the inner connection.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn record_other<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        let mut s = self.stats.write().await;
        s.other_count += 1;
        if result.is_err() {
            s.error_count += 1;
        }
        result
    }
}

fn is_failure<T>(result: &Result<T, StoreError>) -> bool {
    matches!(result, Err(e) if !e.is_nil())
}

#[async_trait]
impl<C: KvConnection> KvConnection for MetricsConnection<C> {
    async fn open(options: &ConnectionOptions) -> Result<Self, StoreError>
    where
        Self: Sized,
    {
        C::open(options).await.map(Self::new)
    }

    async fn ping(&self, ctx: &Context) -> Result<(), StoreError> {
        let result = self.inner.ping(ctx).await;
        self.record_other(result).await
    }

    async fn get(&self, ctx: &Context, key: &str) -> Result<Vec<u8>, StoreError> {
        let start = Instant::now();
        let result = self.inner.get(ctx, key).await;
        let elapsed = start.elapsed();

        let mut s = self.stats.write().await;
        s.get_count += 1;
        s.get_latency_sum_ms += ms(elapsed);
        if let Ok(ref val) = result {
            s.total_bytes_read += val.len() as u64;
        }
        if is_failure(&result) {
            s.error_count += 1;
        }

        result
    }

    async fn set(
        &self,
        ctx: &Context,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self.inner.set(ctx, key, value, ttl).await;
        let elapsed = start.elapsed();

        let mut s = self.stats.write().await;
        s.set_count += 1;
        s.set_latency_sum_ms += ms(elapsed);
        if result.is_ok() {
            s.total_bytes_written += value.len() as u64;
        } else {
            s.error_count += 1;
        }

        result
    }

    async fn del(&self, ctx: &Context, keys: &[String]) -> Result<u64, StoreError> {
        let mut s = self.stats.write().await;
        s.delete_count += 1;
        drop(s); // Release lock before the potentially slow operation.
        let result = self.inner.del(ctx, keys).await;
        if result.is_err() {
            self.stats.write().await.error_count += 1;
        }
        result
    }

    async fn exists(&self, ctx: &Context, keys: &[String]) -> Result<u64, StoreError> {
        let result = self.inner.exists(ctx, keys).await;
        self.record_other(result).await
    }

    async fn mget(&self, ctx: &Context, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        let start = Instant::now();
        let result = self.inner.mget(ctx, keys).await;
        let elapsed = start.elapsed();

        let mut s = self.stats.write().await;
        s.get_count += keys.len() as u64;
        s.get_latency_sum_ms += ms(elapsed);
        match result {
            Ok(ref vals) => {
                let bytes: u64 = vals
                    .iter()
                    .filter_map(|v| v.as_ref())
                    .map(|v| v.len() as u64)
                    .sum();
                s.total_bytes_read += bytes;
            }
            Err(_) => s.error_count += 1,
        }

        result
    }

    async fn mset(&self, ctx: &Context, entries: &[(String, Vec<u8>)]) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self.inner.mset(ctx, entries).await;
        let elapsed = start.elapsed();

        let mut s = self.stats.write().await;
        s.set_count += entries.len() as u64;
        s.set_latency_sum_ms += ms(elapsed);
        if result.is_ok() {
            let bytes: u64 = entries.iter().map(|(_, v)| v.len() as u64).sum();
            s.total_bytes_written += bytes;
        } else {
            s.error_count += 1;
        }

        result
    }

    async fn expire(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let result = self.inner.expire(ctx, key, ttl).await;
        self.record_other(result).await
    }

    async fn ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl, StoreError> {
        let result = self.inner.ttl(ctx, key).await;
        self.record_other(result).await
    }

    async fn persist(&self, ctx: &Context, key: &str) -> Result<bool, StoreError> {
        let result = self.inner.persist(ctx, key).await;
        self.record_other(result).await
    }

    async fn incr_by(&self, ctx: &Context, key: &str, delta: i64) -> Result<i64, StoreError> {
        let result = self.inner.incr_by(ctx, key, delta).await;
        self.record_other(result).await
    }

    async fn keys(&self, ctx: &Context, pattern: &str) -> Result<Vec<String>, StoreError> {
        let result = self.inner.keys(ctx, pattern).await;

        let mut s = self.stats.write().await;
        s.scan_count += 1;
        if result.is_err() {
            s.error_count += 1;
        }

        result
    }

    async fn scan(
        &self,
        ctx: &Context,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(Vec<String>, u64), StoreError> {
        let result = self.inner.scan(ctx, cursor, pattern, count).await;

        let mut s = self.stats.write().await;
        s.scan_count += 1;
        if result.is_err() {
            s.error_count += 1;
        }

        result
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.inner.close().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
