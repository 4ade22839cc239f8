// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core connection trait for kvrepo.
//
// Defines the `KvConnection` trait: the narrow, byte-oriented command set of a
// Redis-style key-value store. Repositories never talk to a client library
// directly; they go through this trait, which lets the live Redis connection,
// the in-memory connection and the metrics wrapper stand in for each other.
// Connections are expected to be thread-safe (`Send + Sync`), safe for
// concurrent use by many repositories, and fully asynchronous.

use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::StoreError;
use crate::options::ConnectionOptions;

/// Remaining lifetime of a key, as reported by the store.
///
/// The store encodes "no expiry" and "no such key" as the negative sentinels
/// `-1` and `-2`; this enum names them. [`KeyTtl::as_raw_secs`] and
/// [`KeyTtl::as_raw_millis`] give the sentinel form back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key expires after this much time.
    Expiring(Duration),
    /// The key exists and never expires (`-1`).
    Persistent,
    /// The key does not exist (`-2`).
    Missing,
}

impl KeyTtl {
    /// Raw sentinel for a key without expiry.
    pub const PERSISTENT: i64 = -1;
    /// Raw sentinel for an absent key.
    pub const MISSING: i64 = -2;

    /// Decode a `PTTL` reply.
    pub fn from_raw_millis(millis: i64) -> Self {
        match millis {
            Self::PERSISTENT => KeyTtl::Persistent,
            m if m < 0 => KeyTtl::Missing,
            m => KeyTtl::Expiring(Duration::from_millis(m as u64)),
        }
    }

    /// `PTTL`-style value: milliseconds, or a negative sentinel.
    pub fn as_raw_millis(&self) -> i64 {
        match self {
            KeyTtl::Expiring(d) => d.as_millis().min(i64::MAX as u128) as i64,
            KeyTtl::Persistent => Self::PERSISTENT,
            KeyTtl::Missing => Self::MISSING,
        }
    }

    /// `TTL`-style value: seconds rounded to nearest, or a negative sentinel.
    pub fn as_raw_secs(&self) -> i64 {
        match self {
            KeyTtl::Expiring(_) => (self.as_raw_millis() + 500) / 1000,
            KeyTtl::Persistent => Self::PERSISTENT,
            KeyTtl::Missing => Self::MISSING,
        }
    }

    /// Remaining time, if the key expires.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            KeyTtl::Expiring(d) => Some(*d),
            _ => None,
        }
    }

    /// True if the key exists and has no expiry.
    pub fn is_persistent(&self) -> bool {
        matches!(self, KeyTtl::Persistent)
    }

    /// True if the key does not exist.
    pub fn is_missing(&self) -> bool {
        matches!(self, KeyTtl::Missing)
    }
}

/// Convert a TTL to whole milliseconds for `PX` / `PEXPIRE`.
///
/// A non-zero TTL shorter than a millisecond rounds up to one so it is not
/// mistaken for "no expiry".
pub fn ttl_millis(ttl: Duration) -> u64 {
    let millis = ttl.as_millis().min(u64::MAX as u128) as u64;
    if millis == 0 && !ttl.is_zero() {
        1
    } else {
        millis
    }
}

/// A shared connection to a Redis-style key-value store.
///
/// Keys are strings and values are opaque bytes. Every command takes a
/// [`Context`] and must fail with [`StoreError::Cancelled`] or
/// [`StoreError::DeadlineExceeded`] once that context is done.
///
/// Multi-key commands (`del`, `mget`, `mset`) are single store calls; they
/// carry exactly the atomicity the store gives its native multi-key command.
#[async_trait]
pub trait KvConnection: Send + Sync + 'static {
    /// Open a connection from resolved options.
    async fn open(options: &ConnectionOptions) -> Result<Self, StoreError>
    where
        Self: Sized;

    /// Liveness probe (`PING`).
    async fn ping(&self, ctx: &Context) -> Result<(), StoreError>;

    /// Read a value (`GET`). An absent key is [`StoreError::Nil`].
    async fn get(&self, ctx: &Context, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write a value (`SET`), replacing any previous value and expiry.
    ///
    /// `None` or a zero TTL stores the key without expiry.
    async fn set(
        &self,
        ctx: &Context,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// Delete keys (`DEL`), returning how many existed.
    async fn del(&self, ctx: &Context, keys: &[String]) -> Result<u64, StoreError>;

    /// Count how many of `keys` exist (`EXISTS`).
    async fn exists(&self, ctx: &Context, keys: &[String]) -> Result<u64, StoreError>;

    /// Read many values in one call (`MGET`).
    ///
    /// The result has one slot per key, `None` where the key is absent.
    async fn mget(&self, ctx: &Context, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError>;

    /// Write many values in one atomic call (`MSET`), without expiry.
    async fn mset(&self, ctx: &Context, entries: &[(String, Vec<u8>)]) -> Result<(), StoreError>;

    /// Set a key's expiry (`PEXPIRE`). Returns `false` if the key is absent.
    ///
    /// A zero TTL expires the key immediately.
    async fn expire(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remaining lifetime of a key (`PTTL`).
    async fn ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl, StoreError>;

    /// Remove a key's expiry (`PERSIST`).
    ///
    /// Returns `false` if the key is absent or already has no expiry.
    async fn persist(&self, ctx: &Context, key: &str) -> Result<bool, StoreError>;

    /// Atomically add `delta` to an integer value (`INCRBY`).
    ///
    /// An absent key counts as zero. A non-integer value or an overflow is a
    /// [`StoreError::Response`].
    async fn incr_by(&self, ctx: &Context, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// All keys matching a glob pattern (`KEYS`). Unordered.
    async fn keys(&self, ctx: &Context, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// One step of a cursor scan (`SCAN cursor MATCH pattern COUNT count`).
    ///
    /// Cursor `0` starts a scan; a returned cursor of `0` ends it. `count` is
    /// a hint for how much work to do, not a result size.
    async fn scan(
        &self,
        ctx: &Context,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(Vec<String>, u64), StoreError>;

    /// Release the connection. Calling it again is a no-op.
    async fn close(&self) -> Result<(), StoreError>;

    /// A human-readable name for this connection, used in logging and metrics.
    fn name(&self) -> &str;
}
