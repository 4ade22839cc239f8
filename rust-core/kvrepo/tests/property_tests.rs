// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for typed repositories

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use kvrepo::{translate, Context, ErrorKind, KvRepository, Observable, PersistenceError};
use kvrepo_store::{InMemoryConnection, StoreError};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    age: u32,
    score: i64,
    tags: Vec<String>,
    nickname: Option<String>,
}

impl Observable for Profile {}

/// Generate arbitrary keys, including glob metacharacters
fn arb_key() -> impl Strategy<Value = String> {
    "[a-z0-9:_*?\\[\\]-]{1,16}"
}

/// Generate arbitrary prefixes
fn arb_prefix() -> impl Strategy<Value = String> {
    "[a-z]{1,6}:"
}

fn arb_profile() -> impl Strategy<Value = Profile> {
    (
        "\\PC{0,24}",
        any::<u32>(),
        any::<i64>(),
        prop::collection::vec("[a-z]{1,8}", 0..5),
        prop::option::of("[A-Za-z ]{1,12}"),
    )
        .prop_map(|(name, age, score, tags, nickname)| Profile {
            name,
            age,
            score,
            tags,
            nickname,
        })
}

proptest! {
    #[test]
    fn test_set_then_get_returns_equal_value(key in arb_key(), profile in arb_profile()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let repo: KvRepository<Profile, _> =
                KvRepository::new(Arc::new(InMemoryConnection::new()), "profiles:");
            let ctx = Context::background();

            repo.set(&ctx, &key, &profile).await.unwrap();
            let back = repo.get(&ctx, &key).await.unwrap();

            prop_assert_eq!(back, profile);
            Ok(())
        })?;
    }

    #[test]
    fn test_never_written_key_is_not_found(written in arb_key(), probe in arb_key()) {
        prop_assume!(written != probe);
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let repo: KvRepository<u32, _> =
                KvRepository::new(Arc::new(InMemoryConnection::new()), "n:");
            let ctx = Context::background();

            repo.set(&ctx, &written, &1).await.unwrap();
            let err = repo.get(&ctx, &probe).await.unwrap_err();

            prop_assert_eq!(err.kind(), ErrorKind::NotFound);
            Ok(())
        })?;
    }

    #[test]
    fn test_mdelete_returns_existing_count(
        present in prop::collection::btree_set("[a-z]{1,6}", 0..10),
        absent in prop::collection::btree_set("[0-9]{1,6}", 0..10),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let repo: KvRepository<u8, _> =
                KvRepository::new(Arc::new(InMemoryConnection::new()), "m:");
            let ctx = Context::background();

            for key in &present {
                repo.set(&ctx, key, &0).await.unwrap();
            }

            let keys: Vec<&str> = present.iter().chain(absent.iter()).map(String::as_str).collect();
            let removed = repo.mdelete(&ctx, &keys).await.unwrap();

            prop_assert_eq!(removed, present.len() as u64);
            Ok(())
        })?;
    }

    #[test]
    fn test_prefixes_never_see_each_other(
        first in arb_prefix(),
        second in arb_prefix(),
        keys in prop::collection::btree_set(arb_key(), 1..8),
    ) {
        // One prefix extending the other would legitimately overlap.
        prop_assume!(!first.starts_with(&second) && !second.starts_with(&first));
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let conn = Arc::new(InMemoryConnection::new());
            let a: KvRepository<String, _> = KvRepository::new(Arc::clone(&conn), first.clone());
            let b: KvRepository<String, _> = KvRepository::new(Arc::clone(&conn), second.clone());
            let ctx = Context::background();

            for key in &keys {
                a.set(&ctx, key, &"a".to_string()).await.unwrap();
            }

            prop_assert!(b.keys(&ctx, "*").await.unwrap().is_empty());
            let (scanned, _) = b.scan(&ctx, 0, "*", 1000).await.unwrap();
            prop_assert!(scanned.is_empty());
            for key in &keys {
                prop_assert!(b.get(&ctx, key).await.unwrap_err().is_not_found());
            }

            let listed: BTreeSet<String> = a.keys(&ctx, "*").await.unwrap().into_iter().collect();
            prop_assert_eq!(listed, keys.clone());
            Ok(())
        })?;
    }

    #[test]
    fn test_mset_then_mget_returns_all(
        entries in prop::collection::hash_map("[a-z]{1,8}", any::<i32>(), 0..12),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let repo: KvRepository<i32, _> =
                KvRepository::new(Arc::new(InMemoryConnection::new()), "b:");
            let ctx = Context::background();

            repo.mset(&ctx, &entries).await.unwrap();
            let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
            let found: HashMap<String, i32> = repo.mget(&ctx, &keys).await.unwrap();

            prop_assert_eq!(found, entries);
            Ok(())
        })?;
    }

    #[test]
    fn test_increments_sum(deltas in prop::collection::vec(-1000i64..1000, 1..20)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let repo: KvRepository<i64, _> =
                KvRepository::new(Arc::new(InMemoryConnection::new()), "");
            let ctx = Context::background();

            let mut last = 0;
            for delta in &deltas {
                last = repo.increment(&ctx, "counter", *delta).await.unwrap();
            }

            prop_assert_eq!(last, deltas.iter().sum::<i64>());
            Ok(())
        })?;
    }

    #[test]
    fn test_translation_is_idempotent(message in "[a-zA-Z ]{0,20}", pick in 0usize..4) {
        let raw = match pick {
            0 => StoreError::Nil,
            1 => StoreError::Response(message.clone()),
            2 => StoreError::Connection(message.clone()),
            _ => StoreError::other(PersistenceError::validation("hook", message.clone())),
        };

        let once = translate(raw);
        let kind = once.kind();
        let twice = translate(StoreError::other(once));

        prop_assert_eq!(twice.kind(), kind);
    }
}
