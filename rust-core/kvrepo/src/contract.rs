// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistence interface contracts.
//
// `Repository<T>` is the broad, relational-style persistence contract shared
// with other kinds of provider. The key-value traits below it describe what a
// key-value store actually offers, layered from basic get/set up to TTL,
// batch, counter and pattern operations.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use kvrepo_store::{Context, KeyTtl};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A capability a provider may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Per-key expiry.
    Ttl,
    /// Store-atomic counters.
    AtomicOps,
    /// Publish/subscribe messaging.
    PubSub,
    /// Append-only streams.
    Streaming,
    /// Multi-command transactions.
    Transactions,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Feature::Ttl => "ttl",
            Feature::AtomicOps => "atomic_ops",
            Feature::PubSub => "pub_sub",
            Feature::Streaming => "streaming",
            Feature::Transactions => "transactions",
        };
        f.write_str(s)
    }
}

/// The family of database behind a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseType {
    Sql,
    Document,
    KeyValue,
    Graph,
}

/// Descriptive information about a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub version: String,
    pub database_type: DatabaseType,
    pub features: Vec<Feature>,
}

/// A field of a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
}

/// An index over entity fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

/// A relation from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationInfo {
    pub name: String,
    pub target: String,
    pub foreign_key: String,
}

/// Metadata describing how a repository stores its entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub name: String,
    pub table_name: String,
    pub primary_key: Vec<String>,
    pub fields: Vec<FieldInfo>,
    pub indexes: Vec<IndexInfo>,
    pub relations: Vec<RelationInfo>,
}

/// Comparison operator in a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Like,
}

/// A field predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: serde_json::Value,
}

impl Condition {
    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::Eq,
            value: value.into(),
        }
    }
}

/// Sort key for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Filter, order and page options for query-style operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub conditions: Vec<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Outcome of a raw statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// Body of a transaction, run against a transaction-scoped repository.
pub type TransactionFn<T> =
    Box<dyn for<'a> FnOnce(&'a dyn Repository<T>) -> BoxFuture<'a, Result<()>> + Send>;

/// The broad persistence contract.
///
/// Providers whose store cannot express an operation still implement it and
/// fail with [`crate::ErrorKind::Unsupported`].
#[async_trait]
pub trait Repository<T: Send + Sync + 'static>: Send + Sync {
    async fn create(&self, ctx: &Context, entity: &T) -> Result<()>;
    async fn create_batch(&self, ctx: &Context, entities: &[T]) -> Result<()>;
    async fn find_by_id(&self, ctx: &Context, id: &str) -> Result<T>;
    async fn find_all(&self, ctx: &Context, opts: &QueryOptions) -> Result<Vec<T>>;
    async fn update(&self, ctx: &Context, entity: &T) -> Result<()>;
    async fn update_partial(
        &self,
        ctx: &Context,
        id: &str,
        updates: &HashMap<String, serde_json::Value>,
    ) -> Result<()>;
    async fn delete(&self, ctx: &Context, id: &str) -> Result<()>;
    async fn delete_by_condition(&self, ctx: &Context, condition: &Condition) -> Result<u64>;
    async fn query(&self, ctx: &Context, opts: &QueryOptions) -> Result<Vec<T>>;
    async fn query_one(&self, ctx: &Context, opts: &QueryOptions) -> Result<T>;
    async fn count(&self, ctx: &Context, opts: &QueryOptions) -> Result<u64>;
    async fn exists(&self, ctx: &Context, opts: &QueryOptions) -> Result<bool>;
    async fn transaction(&self, ctx: &Context, body: TransactionFn<T>) -> Result<()>;
    async fn raw_query(&self, ctx: &Context, query: &str, args: &[serde_json::Value]) -> Result<Vec<T>>;
    async fn raw_exec(&self, ctx: &Context, query: &str, args: &[serde_json::Value]) -> Result<ExecResult>;

    /// Metadata about the stored entity type.
    fn get_entity_info(&self) -> Result<EntityInfo>;

    /// Release repository-held resources.
    fn close(&self) -> Result<()>;
}

/// Single-key reads and writes.
#[async_trait]
pub trait BasicKeyValueRepository<T: Send + Sync + 'static>: Send + Sync {
    async fn get(&self, ctx: &Context, key: &str) -> Result<T>;
    async fn set(&self, ctx: &Context, key: &str, value: &T) -> Result<()>;
    async fn delete_key(&self, ctx: &Context, key: &str) -> Result<()>;
    async fn key_exists(&self, ctx: &Context, key: &str) -> Result<bool>;
}

/// Multi-key operations, each a single store call.
#[async_trait]
pub trait BatchKeyValueRepository<T: Send + Sync + 'static>: BasicKeyValueRepository<T> {
    async fn mget(&self, ctx: &Context, keys: &[&str]) -> Result<HashMap<String, T>>;
    async fn mset(&self, ctx: &Context, pairs: &HashMap<String, T>) -> Result<()>;
    async fn mdelete(&self, ctx: &Context, keys: &[&str]) -> Result<u64>;
}

/// Per-key expiry.
#[async_trait]
pub trait TtlKeyValueRepository<T: Send + Sync + 'static>: BasicKeyValueRepository<T> {
    async fn set_with_ttl(&self, ctx: &Context, key: &str, value: &T, ttl: Duration) -> Result<()>;
    async fn expire(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<()>;
    async fn ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl>;
    async fn get_ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl>;
    async fn set_ttl(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<()>;
    async fn remove_ttl(&self, ctx: &Context, key: &str) -> Result<()>;
}

/// The full key-value surface: batch, TTL, counters and key patterns.
#[async_trait]
pub trait AdvancedKeyValueRepository<T: Send + Sync + 'static>:
    BatchKeyValueRepository<T> + TtlKeyValueRepository<T>
{
    async fn increment(&self, ctx: &Context, key: &str, delta: i64) -> Result<i64>;
    async fn decrement(&self, ctx: &Context, key: &str, delta: i64) -> Result<i64>;
    async fn keys(&self, ctx: &Context, pattern: &str) -> Result<Vec<String>>;
    async fn scan(&self, ctx: &Context, cursor: u64, pattern: &str, count: usize)
        -> Result<(Vec<String>, u64)>;
}
