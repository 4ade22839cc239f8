// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// kvrepo: Typed Key-Value Repositories
//
// This crate exposes a uniform, compile-time-typed persistence API over a
// Redis-style key-value store. A `Provider` owns one connection; each
// `KvRepository<T, _>` it hands out stores `T` as JSON under its own key
// prefix and offers get/set, batch, TTL, counter and pattern operations. All
// failures surface as a `PersistenceError` with a kind from a closed set.
//
// # Modules
//
// - [`config`] -- `Config`, the loosely typed options bag, URL parsing.
// - [`contract`] -- The persistence traits and their metadata types.
// - [`error`] -- `PersistenceError`, `ErrorKind` and the store error translator.
// - [`hooks`] -- The `Observable` lifecycle-hook trait.
// - [`provider`] -- `Provider`, owner of the shared connection.
// - [`repository`] -- `KvRepository`, the typed namespaced repository.
//
// # Example
//
// ```rust
// use std::collections::HashMap;
// use kvrepo::{Config, Context, Observable, Provider};
// use kvrepo_store::InMemoryConnection;
// use serde::{Deserialize, Serialize};
//
// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
// struct Session { user: String }
//
// impl Observable for Session {}
//
// # tokio_test::block_on(async {
// let provider: Provider<InMemoryConnection> = Provider::connect(Config::default()).await.unwrap();
// let sessions = provider.repository::<Session>("session:");
// let ctx = Context::background();
//
// sessions.mset(&ctx, &HashMap::from([
//     ("a".to_string(), Session { user: "alice".into() }),
//     ("b".to_string(), Session { user: "bob".into() }),
// ])).await.unwrap();
//
// let found = sessions.mget(&ctx, &["a", "b", "c"]).await.unwrap();
// assert_eq!(found.len(), 2);
// # });
// ```

pub mod config;
pub mod contract;
pub mod error;
pub mod hooks;
pub mod provider;
pub mod repository;

pub use config::{parse_duration, Config, OptionValue};
pub use contract::{
    AdvancedKeyValueRepository, BasicKeyValueRepository, BatchKeyValueRepository, Condition,
    DatabaseType, EntityInfo, ExecResult, Feature, ProviderInfo, QueryOptions, Repository,
    TransactionFn, TtlKeyValueRepository,
};
pub use error::{translate, translate_result, ErrorKind, PersistenceError, Result};
pub use hooks::Observable;
pub use provider::{Provider, DEFAULT_PING_TIMEOUT};
pub use repository::{KvRepository, Storable};

// Store-level types every caller needs.
pub use kvrepo_store::{Context, KeyTtl};

/// A provider backed by a live Redis server.
#[cfg(feature = "redis-backend")]
pub type RedisProvider = Provider<kvrepo_store::RedisConnection>;
