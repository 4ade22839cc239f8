// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory connection for kvrepo.
//
// Emulates the store's command semantics over a `HashMap` in a tokio
// `RwLock`: lazy per-key expiry on the tokio clock (so tests can pause and
// advance time), INCRBY on decimal strings, glob KEYS and cursor SCAN.
// Intended for testing, development and embedding without a server.
//
// Scan cursors are insertion sequence numbers. Every key gets a sequence
// number when it is created, and keeps it across overwrites, so a scan that
// walks sequence numbers in order returns every key that exists for the whole
// iteration exactly once.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::backend::{KeyTtl, KvConnection};
use crate::context::Context;
use crate::error::StoreError;
use crate::options::ConnectionOptions;
use crate::pattern::KeyPattern;

/// Default SCAN work hint when the caller passes zero.
const DEFAULT_SCAN_COUNT: usize = 10;

const NOT_AN_INTEGER: &str = "ERR value is not an integer or out of range";
const OVERFLOW: &str = "ERR increment or decrement would overflow";

/// Absolute expiry for a relative `ttl`, rejected like the store rejects an
/// expire time it cannot represent.
fn expiry_after(now: Instant, ttl: Duration, command: &str) -> Result<Instant, StoreError> {
    now.checked_add(ttl).ok_or_else(|| {
        StoreError::Response(format!("ERR invalid expire time in '{}' command", command))
    })
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
    seq: u64,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
    /// Sequence number -> key, for cursor scans.
    order: BTreeMap<u64, String>,
    last_seq: u64,
}

impl Keyspace {
    fn live(&self, key: &str, now: Instant) -> Option<&Entry> {
        self.entries.get(key).filter(|e| e.is_live(now))
    }

    fn live_mut(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        self.purge_if_expired(key, now);
        self.entries.get_mut(key)
    }

    fn purge_if_expired(&mut self, key: &str, now: Instant) {
        let expired = self.entries.get(key).is_some_and(|e| !e.is_live(now));
        if expired {
            self.remove(key);
        }
    }

    fn insert(&mut self, key: &str, value: Vec<u8>, expires_at: Option<Instant>, now: Instant) {
        self.purge_if_expired(key, now);
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = value;
            entry.expires_at = expires_at;
            return;
        }

        self.last_seq += 1;
        let seq = self.last_seq;
        self.order.insert(seq, key.to_string());
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                seq,
            },
        );
    }

    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    /// Drop every expired entry.
    fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let order = &mut self.order;
        self.entries.retain(|_, entry| {
            let live = entry.is_live(now);
            if !live {
                order.remove(&entry.seq);
            }
            live
        });
        before - self.entries.len()
    }
}

/// An in-memory connection with Redis-style command semantics.
///
/// All data lives in process memory and is lost on drop. Clones share the
/// same keyspace (and the same open/closed state), which mirrors several
/// repositories sharing one live connection.
///
/// # Example
///
/// ```rust
/// use kvrepo_store::{Context, InMemoryConnection, KvConnection};
///
/// # tokio_test::block_on(async {
/// let conn = InMemoryConnection::new();
/// let ctx = Context::background();
/// conn.set(&ctx, "hello", b"world", None).await.unwrap();
/// assert_eq!(conn.get(&ctx, "hello").await.unwrap(), b"world".to_vec());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryConnection {
    data: Arc<RwLock<Keyspace>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryConnection {
    /// Create a new, empty keyspace.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(Keyspace::default())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of live (unexpired) keys. Expired entries are evicted first.
    pub async fn len(&self) -> usize {
        let mut ks = self.data.write().await;
        ks.evict_expired(Instant::now());
        ks.entries.len()
    }

    /// True if there are no live keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether [`KvConnection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvConnection for InMemoryConnection {
    async fn open(options: &ConnectionOptions) -> Result<Self, StoreError>
    where
        Self: Sized,
    {
        debug!(database = options.database, "opened in-memory connection");
        Ok(Self::new())
    }

    async fn ping(&self, ctx: &Context) -> Result<(), StoreError> {
        ctx.run(async { self.check_open() }).await
    }

    async fn get(&self, ctx: &Context, key: &str) -> Result<Vec<u8>, StoreError> {
        ctx.run(async {
            self.check_open()?;
            let ks = self.data.read().await;
            ks.live(key, Instant::now())
                .map(|e| e.value.clone())
                .ok_or(StoreError::Nil)
        })
        .await
    }

    async fn set(
        &self,
        ctx: &Context,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        ctx.run(async {
            self.check_open()?;
            let now = Instant::now();
            let expires_at = match ttl.filter(|d| !d.is_zero()) {
                Some(d) => Some(expiry_after(now, d, "set")?),
                None => None,
            };
            let mut ks = self.data.write().await;
            ks.insert(key, value.to_vec(), expires_at, now);
            Ok(())
        })
        .await
    }

    async fn del(&self, ctx: &Context, keys: &[String]) -> Result<u64, StoreError> {
        ctx.run(async {
            self.check_open()?;
            let now = Instant::now();
            let mut ks = self.data.write().await;
            let mut removed = 0;
            for key in keys {
                if let Some(entry) = ks.remove(key) {
                    if entry.is_live(now) {
                        removed += 1;
                    }
                }
            }
            Ok(removed)
        })
        .await
    }

    async fn exists(&self, ctx: &Context, keys: &[String]) -> Result<u64, StoreError> {
        ctx.run(async {
            self.check_open()?;
            let now = Instant::now();
            let ks = self.data.read().await;
            Ok(keys.iter().filter(|k| ks.live(k, now).is_some()).count() as u64)
        })
        .await
    }

    async fn mget(&self, ctx: &Context, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        ctx.run(async {
            self.check_open()?;
            let now = Instant::now();
            let ks = self.data.read().await;
            Ok(keys
                .iter()
                .map(|k| ks.live(k, now).map(|e| e.value.clone()))
                .collect())
        })
        .await
    }

    async fn mset(&self, ctx: &Context, entries: &[(String, Vec<u8>)]) -> Result<(), StoreError> {
        ctx.run(async {
            self.check_open()?;
            let now = Instant::now();
            // One write guard for the whole batch: readers never see half of it.
            let mut ks = self.data.write().await;
            for (key, value) in entries {
                ks.insert(key, value.clone(), None, now);
            }
            Ok(())
        })
        .await
    }

    async fn expire(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        ctx.run(async {
            self.check_open()?;
            let now = Instant::now();
            let expires_at = if ttl.is_zero() {
                None
            } else {
                Some(expiry_after(now, ttl, "pexpire")?)
            };
            let mut ks = self.data.write().await;
            let Some(entry) = ks.live_mut(key, now) else {
                return Ok(false);
            };
            match expires_at {
                Some(at) => entry.expires_at = Some(at),
                None => {
                    ks.remove(key);
                }
            }
            Ok(true)
        })
        .await
    }

    async fn ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl, StoreError> {
        ctx.run(async {
            self.check_open()?;
            let now = Instant::now();
            let ks = self.data.read().await;
            Ok(match ks.live(key, now) {
                None => KeyTtl::Missing,
                Some(entry) => match entry.expires_at {
                    None => KeyTtl::Persistent,
                    Some(at) => KeyTtl::Expiring(at.saturating_duration_since(now)),
                },
            })
        })
        .await
    }

    async fn persist(&self, ctx: &Context, key: &str) -> Result<bool, StoreError> {
        ctx.run(async {
            self.check_open()?;
            let mut ks = self.data.write().await;
            match ks.live_mut(key, Instant::now()) {
                Some(entry) if entry.expires_at.is_some() => {
                    entry.expires_at = None;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
        .await
    }

    async fn incr_by(&self, ctx: &Context, key: &str, delta: i64) -> Result<i64, StoreError> {
        ctx.run(async {
            self.check_open()?;
            let now = Instant::now();
            let mut ks = self.data.write().await;

            let (current, expires_at) = match ks.live_mut(key, now) {
                None => (0, None),
                Some(entry) => {
                    let current = std::str::from_utf8(&entry.value)
                        .ok()
                        .and_then(|s| s.parse::<i64>().ok())
                        .ok_or_else(|| StoreError::Response(NOT_AN_INTEGER.to_string()))?;
                    (current, entry.expires_at)
                }
            };

            let next = current
                .checked_add(delta)
                .ok_or_else(|| StoreError::Response(OVERFLOW.to_string()))?;
            // INCRBY keeps an existing expiry.
            ks.insert(key, next.to_string().into_bytes(), expires_at, now);
            Ok(next)
        })
        .await
    }

    async fn keys(&self, ctx: &Context, pattern: &str) -> Result<Vec<String>, StoreError> {
        ctx.run(async {
            self.check_open()?;
            let matcher = KeyPattern::new(pattern)?;
            let now = Instant::now();
            let mut ks = self.data.write().await;
            let evicted = ks.evict_expired(now);
            if evicted > 0 {
                debug!(evicted, "evicted expired keys");
            }
            Ok(ks
                .order
                .values()
                .filter(|k| matcher.is_match(k))
                .cloned()
                .collect())
        })
        .await
    }

    async fn scan(
        &self,
        ctx: &Context,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(Vec<String>, u64), StoreError> {
        ctx.run(async {
            self.check_open()?;
            let matcher = KeyPattern::new(pattern)?;
            let budget = if count == 0 { DEFAULT_SCAN_COUNT } else { count };
            let now = Instant::now();
            let mut ks = self.data.write().await;

            let mut matched = Vec::new();
            let mut expired = Vec::new();
            let mut last = None;
            for (seq, key) in ks.order.range(cursor.saturating_add(1)..).take(budget) {
                last = Some(*seq);
                if ks.live(key, now).is_none() {
                    expired.push(key.clone());
                } else if matcher.is_match(key) {
                    matched.push(key.clone());
                }
            }
            // Examined slots that have expired are reclaimed as the cursor passes.
            for key in &expired {
                ks.remove(key);
            }

            let next = match last {
                Some(seq) if ks.order.range(seq + 1..).next().is_some() => seq,
                _ => 0,
            };
            Ok((matched, next))
        })
        .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("closed in-memory connection");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
