// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed, namespaced key-value repository.
//
// A `KvRepository<T, C>` stores values of one type as JSON under
// `prefix + key` on a shared connection. Reads decode back into `T`, writes
// run the value's `Observable` hooks, and every store failure is translated
// into a `PersistenceError`. Several repositories with different prefixes can
// share one connection without seeing each other's keys.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvrepo_store::{pattern, Context, KeyTtl, KvConnection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::contract::{
    AdvancedKeyValueRepository, BasicKeyValueRepository, BatchKeyValueRepository, Condition,
    EntityInfo, ExecResult, QueryOptions, Repository, TransactionFn, TtlKeyValueRepository,
};
use crate::error::{translate, PersistenceError, Result};
use crate::hooks::Observable;

/// A value type a repository can store.
///
/// Implemented for every `Serialize + DeserializeOwned + Observable` type that
/// can cross threads.
pub trait Storable: Serialize + DeserializeOwned + Observable + Send + Sync + 'static {}

impl<T> Storable for T where T: Serialize + DeserializeOwned + Observable + Send + Sync + 'static {}

/// A typed repository over a key-value connection.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use kvrepo::{Context, KvRepository, Observable};
/// use kvrepo_store::InMemoryConnection;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct User { name: String }
///
/// impl Observable for User {}
///
/// # tokio_test::block_on(async {
/// let conn = Arc::new(InMemoryConnection::new());
/// let users: KvRepository<User, _> = KvRepository::new(conn, "users:");
/// let ctx = Context::background();
///
/// users.set(&ctx, "1", &User { name: "Alice".into() }).await.unwrap();
/// assert_eq!(users.get(&ctx, "1").await.unwrap().name, "Alice");
/// assert!(users.get(&ctx, "2").await.unwrap_err().is_not_found());
/// # });
/// ```
pub struct KvRepository<T, C: KvConnection> {
    conn: Arc<C>,
    prefix: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C: KvConnection> Clone for KvRepository<T, C> {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            prefix: self.prefix.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, C: KvConnection> std::fmt::Debug for KvRepository<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvRepository")
            .field("connection", &self.conn.name())
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl<T: Storable, C: KvConnection> KvRepository<T, C> {
    /// Bind `T` and `prefix` to a shared connection.
    pub fn new(conn: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
            _marker: PhantomData,
        }
    }

    /// The key prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The shared connection.
    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn full_pattern(&self, pattern: &str) -> String {
        format!("{}{}", pattern::escape(&self.prefix), pattern)
    }

    fn strip_prefix(&self, mut keys: Vec<String>) -> Vec<String> {
        if !self.prefix.is_empty() {
            for key in keys.iter_mut() {
                if let Some(rest) = key.strip_prefix(self.prefix.as_str()) {
                    *key = rest.to_string();
                }
            }
        }
        keys
    }

    fn encode(&self, key: &str, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|err| {
            PersistenceError::serialization(format!("failed to serialize value for key '{}'", key), err)
        })
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|err| {
            PersistenceError::serialization(format!("failed to deserialize value for key '{}'", key), err)
        })
    }

    fn run_after_read(&self, ctx: &Context, key: &str, value: &mut T) {
        if let Err(err) = value.after_read(ctx) {
            warn!(prefix = %self.prefix, key = %key, error = %err, "after_read hook failed");
        }
    }

    // ----- single key -----

    /// Read and decode the value at `key`.
    ///
    /// Fails with NotFound if the key is absent and Serialization if the
    /// stored bytes do not decode as `T`.
    pub async fn get(&self, ctx: &Context, key: &str) -> Result<T> {
        let bytes = self.conn.get(ctx, &self.full_key(key)).await.map_err(|err| {
            let err = translate(err);
            if err.is_not_found() {
                PersistenceError::not_found(format!("key not found: {}", key))
            } else {
                err
            }
        })?;

        let mut value = self.decode(key, &bytes)?;
        self.run_after_read(ctx, key, &mut value);
        Ok(value)
    }

    /// Store `value` at `key` without expiry.
    pub async fn set(&self, ctx: &Context, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(ctx, key, value, Duration::ZERO).await
    }

    /// Store `value` at `key`, expiring after `ttl` (zero means never).
    pub async fn set_with_ttl(&self, ctx: &Context, key: &str, value: &T, ttl: Duration) -> Result<()> {
        value.before_write(ctx).map_err(|err| {
            PersistenceError::validation(format!("before_write hook rejected key '{}'", key), err)
        })?;

        let bytes = self.encode(key, value)?;
        let ttl = Some(ttl).filter(|d| !d.is_zero());
        self.conn.set(ctx, &self.full_key(key), &bytes, ttl).await?;

        if let Err(err) = value.after_write(ctx) {
            warn!(prefix = %self.prefix, key = %key, error = %err, "after_write hook failed");
        }
        Ok(())
    }

    /// Delete `key`, running the delete hooks against its current value.
    ///
    /// Deleting an absent key succeeds. If the current value cannot be read
    /// for any other reason the key is still deleted, without hooks. The
    /// read and the delete are separate store calls.
    pub async fn delete_key(&self, ctx: &Context, key: &str) -> Result<()> {
        let current = match self.get(ctx, key).await {
            Ok(value) => Some(value),
            Err(err) if err.is_not_found() => return Ok(()),
            Err(_) => None,
        };

        if let Some(value) = &current {
            value.before_delete(ctx).map_err(|err| {
                PersistenceError::validation(format!("before_delete hook rejected key '{}'", key), err)
            })?;
        }

        self.conn.del(ctx, &[self.full_key(key)]).await?;

        if let Some(value) = &current {
            if let Err(err) = value.after_delete(ctx) {
                warn!(prefix = %self.prefix, key = %key, error = %err, "after_delete hook failed");
            }
        }
        Ok(())
    }

    /// Whether `key` exists.
    pub async fn key_exists(&self, ctx: &Context, key: &str) -> Result<bool> {
        let found = self.conn.exists(ctx, &[self.full_key(key)]).await?;
        Ok(found > 0)
    }

    // ----- batch -----

    /// Read many keys in one call. Absent keys are left out of the map.
    pub async fn mget(&self, ctx: &Context, keys: &[&str]) -> Result<HashMap<String, T>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let full_keys: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
        let values = self.conn.mget(ctx, &full_keys).await?;

        let mut out = HashMap::with_capacity(keys.len());
        for (key, bytes) in keys.iter().zip(values) {
            if let Some(bytes) = bytes {
                let mut value = self.decode(key, &bytes)?;
                self.run_after_read(ctx, key, &mut value);
                out.insert((*key).to_string(), value);
            }
        }
        Ok(out)
    }

    /// Write many values in one atomic call, without expiry or hooks.
    ///
    /// Every value is encoded before anything is written.
    pub async fn mset(&self, ctx: &Context, pairs: &HashMap<String, T>) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        let entries = pairs
            .iter()
            .map(|(key, value)| -> Result<(String, Vec<u8>)> {
                Ok((self.full_key(key), self.encode(key, value)?))
            })
            .collect::<Result<Vec<_>>>()?;

        self.conn.mset(ctx, &entries).await?;
        Ok(())
    }

    /// Delete many keys in one call, returning how many existed.
    pub async fn mdelete(&self, ctx: &Context, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let full_keys: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
        Ok(self.conn.del(ctx, &full_keys).await?)
    }

    // ----- ttl -----

    /// Set the expiry of `key`. An absent key is not an error.
    pub async fn expire(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<()> {
        self.conn.expire(ctx, &self.full_key(key), ttl).await?;
        Ok(())
    }

    /// Remaining lifetime of `key`: [`KeyTtl::Persistent`] if it never
    /// expires, [`KeyTtl::Missing`] if it does not exist.
    pub async fn ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl> {
        Ok(self.conn.ttl(ctx, &self.full_key(key)).await?)
    }

    /// Alias of [`KvRepository::ttl`].
    pub async fn get_ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl> {
        self.ttl(ctx, key).await
    }

    /// Set the expiry of an existing key; NotFound if it is absent.
    pub async fn set_ttl(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<()> {
        if self.conn.expire(ctx, &self.full_key(key), ttl).await? {
            Ok(())
        } else {
            Err(PersistenceError::not_found(format!("key not found: {}", key)))
        }
    }

    /// Make `key` persistent; NotFound if it is absent.
    pub async fn remove_ttl(&self, ctx: &Context, key: &str) -> Result<()> {
        let full_key = self.full_key(key);
        if self.conn.persist(ctx, &full_key).await? {
            return Ok(());
        }
        // PERSIST also answers "no" for a key that never had an expiry.
        if self.conn.exists(ctx, &[full_key]).await? > 0 {
            Ok(())
        } else {
            Err(PersistenceError::not_found(format!("key not found: {}", key)))
        }
    }

    // ----- counters -----

    /// Atomically add `delta` to the integer at `key` (absent counts as zero).
    pub async fn increment(&self, ctx: &Context, key: &str, delta: i64) -> Result<i64> {
        Ok(self.conn.incr_by(ctx, &self.full_key(key), delta).await?)
    }

    /// Atomically subtract `delta` from the integer at `key`.
    pub async fn decrement(&self, ctx: &Context, key: &str, delta: i64) -> Result<i64> {
        let negated = delta
            .checked_neg()
            .ok_or_else(|| PersistenceError::database(format!("decrement by {} overflows", delta)))?;
        self.increment(ctx, key, negated).await
    }

    // ----- patterns -----

    /// All keys in this repository matching `pattern`, prefix stripped.
    ///
    /// Walks the whole keyspace in one call; use [`KvRepository::scan`] for
    /// large keyspaces.
    pub async fn keys(&self, ctx: &Context, pattern: &str) -> Result<Vec<String>> {
        let keys = self.conn.keys(ctx, &self.full_pattern(pattern)).await?;
        Ok(self.strip_prefix(keys))
    }

    /// One step of a cursor scan over this repository's keys.
    ///
    /// Start at cursor `0` and call again with the returned cursor until it
    /// is `0`. `count` is a hint; a step may return more or fewer keys.
    pub async fn scan(
        &self,
        ctx: &Context,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(Vec<String>, u64)> {
        let (keys, next) = self
            .conn
            .scan(ctx, cursor, &self.full_pattern(pattern), count)
            .await?;
        Ok((self.strip_prefix(keys), next))
    }
}

fn unsupported(operation: &str, instead: Option<&str>) -> PersistenceError {
    let message = match instead {
        Some(replacement) => format!(
            "{} is not supported by key-value repositories; use {} instead",
            operation, replacement
        ),
        None => format!("{} is not supported by key-value repositories", operation),
    };
    PersistenceError::unsupported(message)
}

#[async_trait]
impl<T: Storable, C: KvConnection> Repository<T> for KvRepository<T, C> {
    async fn create(&self, _ctx: &Context, _entity: &T) -> Result<()> {
        Err(unsupported("create", Some("set")))
    }

    async fn create_batch(&self, _ctx: &Context, _entities: &[T]) -> Result<()> {
        Err(unsupported("create_batch", Some("mset")))
    }

    async fn find_by_id(&self, _ctx: &Context, _id: &str) -> Result<T> {
        Err(unsupported("find_by_id", Some("get")))
    }

    async fn find_all(&self, _ctx: &Context, _opts: &QueryOptions) -> Result<Vec<T>> {
        Err(unsupported("find_all", None))
    }

    async fn update(&self, _ctx: &Context, _entity: &T) -> Result<()> {
        Err(unsupported("update", Some("set")))
    }

    async fn update_partial(
        &self,
        _ctx: &Context,
        _id: &str,
        _updates: &HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        Err(unsupported("update_partial", None))
    }

    async fn delete(&self, _ctx: &Context, _id: &str) -> Result<()> {
        Err(unsupported("delete", Some("delete_key")))
    }

    async fn delete_by_condition(&self, _ctx: &Context, _condition: &Condition) -> Result<u64> {
        Err(unsupported("delete_by_condition", None))
    }

    async fn query(&self, _ctx: &Context, _opts: &QueryOptions) -> Result<Vec<T>> {
        Err(unsupported("query", None))
    }

    async fn query_one(&self, _ctx: &Context, _opts: &QueryOptions) -> Result<T> {
        Err(unsupported("query_one", None))
    }

    async fn count(&self, _ctx: &Context, _opts: &QueryOptions) -> Result<u64> {
        Err(unsupported("count", None))
    }

    async fn exists(&self, _ctx: &Context, _opts: &QueryOptions) -> Result<bool> {
        Err(unsupported("exists", Some("key_exists")))
    }

    async fn transaction(&self, _ctx: &Context, _body: TransactionFn<T>) -> Result<()> {
        Err(unsupported("transaction", None))
    }

    async fn raw_query(&self, _ctx: &Context, _query: &str, _args: &[serde_json::Value]) -> Result<Vec<T>> {
        Err(unsupported("raw_query", None))
    }

    async fn raw_exec(&self, _ctx: &Context, _query: &str, _args: &[serde_json::Value]) -> Result<ExecResult> {
        Err(unsupported("raw_exec", None))
    }

    fn get_entity_info(&self) -> Result<EntityInfo> {
        Ok(EntityInfo {
            name: std::any::type_name::<T>().to_string(),
            table_name: self.prefix.clone(),
            primary_key: vec!["key".to_string()],
            fields: Vec::new(),
            indexes: Vec::new(),
            relations: Vec::new(),
        })
    }

    /// The provider owns the connection; there is nothing to release here.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: Storable, C: KvConnection> BasicKeyValueRepository<T> for KvRepository<T, C> {
    async fn get(&self, ctx: &Context, key: &str) -> Result<T> {
        KvRepository::get(self, ctx, key).await
    }

    async fn set(&self, ctx: &Context, key: &str, value: &T) -> Result<()> {
        KvRepository::set(self, ctx, key, value).await
    }

    async fn delete_key(&self, ctx: &Context, key: &str) -> Result<()> {
        KvRepository::delete_key(self, ctx, key).await
    }

    async fn key_exists(&self, ctx: &Context, key: &str) -> Result<bool> {
        KvRepository::key_exists(self, ctx, key).await
    }
}

#[async_trait]
impl<T: Storable, C: KvConnection> BatchKeyValueRepository<T> for KvRepository<T, C> {
    async fn mget(&self, ctx: &Context, keys: &[&str]) -> Result<HashMap<String, T>> {
        KvRepository::mget(self, ctx, keys).await
    }

    async fn mset(&self, ctx: &Context, pairs: &HashMap<String, T>) -> Result<()> {
        KvRepository::mset(self, ctx, pairs).await
    }

    async fn mdelete(&self, ctx: &Context, keys: &[&str]) -> Result<u64> {
        KvRepository::mdelete(self, ctx, keys).await
    }
}

#[async_trait]
impl<T: Storable, C: KvConnection> TtlKeyValueRepository<T> for KvRepository<T, C> {
    async fn set_with_ttl(&self, ctx: &Context, key: &str, value: &T, ttl: Duration) -> Result<()> {
        KvRepository::set_with_ttl(self, ctx, key, value, ttl).await
    }

    async fn expire(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<()> {
        KvRepository::expire(self, ctx, key, ttl).await
    }

    async fn ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl> {
        KvRepository::ttl(self, ctx, key).await
    }

    async fn get_ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl> {
        KvRepository::get_ttl(self, ctx, key).await
    }

    async fn set_ttl(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<()> {
        KvRepository::set_ttl(self, ctx, key, ttl).await
    }

    async fn remove_ttl(&self, ctx: &Context, key: &str) -> Result<()> {
        KvRepository::remove_ttl(self, ctx, key).await
    }
}

#[async_trait]
impl<T: Storable, C: KvConnection> AdvancedKeyValueRepository<T> for KvRepository<T, C> {
    async fn increment(&self, ctx: &Context, key: &str, delta: i64) -> Result<i64> {
        KvRepository::increment(self, ctx, key, delta).await
    }

    async fn decrement(&self, ctx: &Context, key: &str, delta: i64) -> Result<i64> {
        KvRepository::decrement(self, ctx, key, delta).await
    }

    async fn keys(&self, ctx: &Context, pattern: &str) -> Result<Vec<String>> {
        KvRepository::keys(self, ctx, pattern).await
    }

    async fn scan(
        &self,
        ctx: &Context,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(Vec<String>, u64)> {
        KvRepository::scan(self, ctx, cursor, pattern, count).await
    }
}
