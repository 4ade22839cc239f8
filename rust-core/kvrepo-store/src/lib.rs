// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kvrepo Store Connection Seam
//
// This crate provides the byte-level connection interface that kvrepo
// repositories are built on. The core `KvConnection` trait is the narrow
// Redis-style command set (GET/SET/DEL/EXISTS/MGET/MSET, expiry, INCRBY,
// KEYS/SCAN), letting a live Redis server, an in-memory keyspace and a
// metering wrapper stand in for one another.
//
// # Modules
//
// - [`backend`] -- The `KvConnection` trait and the `KeyTtl` reply type.
// - [`context`] -- Per-call deadlines and cancellation.
// - [`error`] -- The `StoreError` enum covering raw store failures.
// - [`memory`] -- An in-memory keyspace with expiry, for tests and
//   ephemeral workloads.
// - [`metrics`] -- A transparent wrapper that collects command statistics.
// - [`options`] -- Resolved connection parameters.
// - [`pattern`] -- Glob matching and escaping for key patterns.
//
// # Example
//
// ```rust
// use kvrepo_store::{Context, InMemoryConnection, KvConnection, MetricsConnection};
//
// # tokio_test::block_on(async {
// let conn = MetricsConnection::new(InMemoryConnection::new());
// let ctx = Context::background();
//
// conn.set(&ctx, "user:1", b"alice", None).await.unwrap();
// assert_eq!(conn.get(&ctx, "user:1").await.unwrap(), b"alice");
// assert_eq!(conn.stats().await.commands(), 2);
// # });
// ```

pub mod backend;
pub mod context;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod options;
pub mod pattern;

// Live store connection, feature-gated to keep the default build lean.
#[cfg(feature = "redis-backend")]
pub mod redis_backend;

pub use backend::{ttl_millis, KeyTtl, KvConnection};
pub use context::Context;
pub use error::StoreError;
pub use memory::InMemoryConnection;
pub use metrics::{ConnectionStats, MetricsConnection};
pub use options::ConnectionOptions;
pub use pattern::KeyPattern;

#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisConnection;
