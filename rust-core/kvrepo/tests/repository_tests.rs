// SPDX-License-Identifier: PMPL-1.0-or-later
//! End-to-end repository behaviour over the in-memory connection.
//!
//! Covers the user-visible scenarios: CRUD round trips, TTL expiry on a paused
//! clock, counters, batches, prefix isolation, full scan coverage, and
//! deadline/cancellation propagation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use kvrepo::{
    AdvancedKeyValueRepository, Config, Context, ErrorKind, KeyTtl, KvRepository, Observable,
    Provider,
};
use kvrepo_store::{InMemoryConnection, KvConnection};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    name: String,
    email: Option<String>,
    tags: Vec<String>,
}

impl Observable for User {}

fn alice() -> User {
    User {
        name: "Alice".to_string(),
        email: Some("alice@example.com".to_string()),
        tags: vec!["admin".to_string()],
    }
}

fn bob() -> User {
    User {
        name: "Bob".to_string(),
        email: None,
        tags: Vec::new(),
    }
}

async fn provider() -> Provider<InMemoryConnection> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();

    Provider::connect(Config::default()).await.unwrap()
}

#[tokio::test]
async fn test_set_exists_delete_scenario() {
    let p = provider().await;
    let users = p.repository::<User>("");
    let ctx = Context::background();

    users.set(&ctx, "user:1", &alice()).await.unwrap();
    assert!(users.key_exists(&ctx, "user:1").await.unwrap());

    users.delete_key(&ctx, "user:1").await.unwrap();
    assert!(!users.key_exists(&ctx, "user:1").await.unwrap());
}

#[tokio::test]
async fn test_round_trip_preserves_every_field() {
    let p = provider().await;
    let users = p.repository::<User>("users:");
    let ctx = Context::background();

    users.set(&ctx, "1", &alice()).await.unwrap();
    users.set(&ctx, "2", &bob()).await.unwrap();

    assert_eq!(users.get(&ctx, "1").await.unwrap(), alice());
    assert_eq!(users.get(&ctx, "2").await.unwrap(), bob());
}

#[tokio::test]
async fn test_get_missing_or_deleted_is_not_found() {
    let p = provider().await;
    let users = p.repository::<User>("users:");
    let ctx = Context::background();

    let err = users.get(&ctx, "never").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("never"));

    users.set(&ctx, "gone", &bob()).await.unwrap();
    users.delete_key(&ctx, "gone").await.unwrap();
    assert_eq!(users.get(&ctx, "gone").await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_twice_is_ok() {
    let p = provider().await;
    let users = p.repository::<User>("users:");
    let ctx = Context::background();

    users.set(&ctx, "1", &alice()).await.unwrap();
    users.delete_key(&ctx, "1").await.unwrap();
    users.delete_key(&ctx, "1").await.unwrap();
    users.delete_key(&ctx, "never-existed").await.unwrap();
}

#[tokio::test]
async fn test_counter_scenario() {
    let p = provider().await;
    let counters = p.repository::<i64>("stats:");
    let ctx = Context::background();

    assert_eq!(counters.increment(&ctx, "views", 1).await.unwrap(), 1);
    assert_eq!(counters.increment(&ctx, "views", 5).await.unwrap(), 6);
    assert_eq!(counters.decrement(&ctx, "views", 2).await.unwrap(), 4);

    // Counters are stored as decimal strings and decode as JSON numbers.
    assert_eq!(counters.get(&ctx, "views").await.unwrap(), 4);
}

#[tokio::test]
async fn test_increment_non_integer_is_database_error() {
    let p = provider().await;
    let ctx = Context::background();
    let users = p.repository::<User>("u:");
    let counters = p.repository::<i64>("u:");

    users.set(&ctx, "1", &alice()).await.unwrap();
    let err = counters.increment(&ctx, "1", 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
}

#[tokio::test]
async fn test_concurrent_increments_are_atomic() {
    let p = provider().await;
    let counters = p.repository::<i64>("c:");

    let mut handles = Vec::new();
    for _ in 0..20 {
        let repo = counters.clone();
        handles.push(tokio::spawn(async move {
            let ctx = Context::background();
            for _ in 0..10 {
                repo.increment(&ctx, "hits", 1).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let ctx = Context::background();
    assert_eq!(counters.get(&ctx, "hits").await.unwrap(), 200);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_expiry_scenario() {
    let p = provider().await;
    let sessions = p.repository::<String>("session:");
    let ctx = Context::background();

    sessions
        .set_with_ttl(&ctx, "s", &"token".to_string(), Duration::from_secs(5))
        .await
        .unwrap();

    let remaining = sessions.ttl(&ctx, "s").await.unwrap().remaining().unwrap();
    assert!(remaining > Duration::ZERO);
    assert!(remaining <= Duration::from_secs(5));

    tokio::time::advance(Duration::from_secs(6)).await;

    assert_eq!(sessions.get(&ctx, "s").await.unwrap_err().kind(), ErrorKind::NotFound);
    assert!(!sessions.key_exists(&ctx, "s").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_ttl_sentinels() {
    let p = provider().await;
    let repo = p.repository::<String>("t:");
    let ctx = Context::background();

    assert_eq!(repo.ttl(&ctx, "absent").await.unwrap(), KeyTtl::Missing);
    assert_eq!(repo.get_ttl(&ctx, "absent").await.unwrap().as_raw_secs(), -2);

    repo.set(&ctx, "forever", &"v".to_string()).await.unwrap();
    assert_eq!(repo.ttl(&ctx, "forever").await.unwrap(), KeyTtl::Persistent);
    assert_eq!(repo.ttl(&ctx, "forever").await.unwrap().as_raw_secs(), -1);
}

#[tokio::test(start_paused = true)]
async fn test_remove_ttl_then_ttl_is_persistent() {
    let p = provider().await;
    let repo = p.repository::<String>("t:");
    let ctx = Context::background();

    repo.set_with_ttl(&ctx, "k", &"v".to_string(), Duration::from_secs(30))
        .await
        .unwrap();
    repo.remove_ttl(&ctx, "k").await.unwrap();
    assert_eq!(repo.ttl(&ctx, "k").await.unwrap(), KeyTtl::Persistent);

    // Already persistent: still fine, still persistent.
    repo.remove_ttl(&ctx, "k").await.unwrap();
    assert_eq!(repo.ttl(&ctx, "k").await.unwrap(), KeyTtl::Persistent);

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(repo.get(&ctx, "k").await.unwrap(), "v");
}

#[tokio::test(start_paused = true)]
async fn test_ttl_on_absent_keys() {
    let p = provider().await;
    let repo = p.repository::<String>("t:");
    let ctx = Context::background();

    let err = repo.set_ttl(&ctx, "nope", Duration::from_secs(1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = repo.remove_ttl(&ctx, "nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // The lower-level primitive does not check.
    repo.expire(&ctx, "nope", Duration::from_secs(1)).await.unwrap();
    assert!(!repo.key_exists(&ctx, "nope").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_set_ttl_refreshes_expiry() {
    let p = provider().await;
    let repo = p.repository::<String>("t:");
    let ctx = Context::background();

    repo.set_with_ttl(&ctx, "k", &"v".to_string(), Duration::from_secs(2))
        .await
        .unwrap();
    repo.set_ttl(&ctx, "k", Duration::from_secs(10)).await.unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(repo.get(&ctx, "k").await.unwrap(), "v");

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(repo.get(&ctx, "k").await.unwrap_err().is_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_plain_set_clears_previous_ttl() {
    let p = provider().await;
    let repo = p.repository::<String>("t:");
    let ctx = Context::background();

    repo.set_with_ttl(&ctx, "k", &"old".to_string(), Duration::from_secs(1))
        .await
        .unwrap();
    repo.set(&ctx, "k", &"new".to_string()).await.unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(repo.get(&ctx, "k").await.unwrap(), "new");
}

#[tokio::test]
async fn test_mset_mget_scenario() {
    let p = provider().await;
    let users = p.repository::<User>("users:");
    let ctx = Context::background();

    let pairs = HashMap::from([("a".to_string(), alice()), ("b".to_string(), bob())]);
    users.mset(&ctx, &pairs).await.unwrap();

    let found = users.mget(&ctx, &["a", "b", "c"]).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["a"], alice());
    assert_eq!(found["b"], bob());
    assert!(!found.contains_key("c"));
}

#[tokio::test]
async fn test_mdelete_counts_only_existing_keys() {
    let p = provider().await;
    let repo = p.repository::<u32>("n:");
    let ctx = Context::background();

    for (i, key) in ["a", "b", "c"].iter().enumerate() {
        repo.set(&ctx, key, &(i as u32)).await.unwrap();
    }

    let removed = repo.mdelete(&ctx, &["a", "b", "c", "x", "y"]).await.unwrap();
    assert_eq!(removed, 3);
    assert!(repo.keys(&ctx, "*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_prefix_isolation() {
    let conn = Arc::new(InMemoryConnection::new());
    let ctx = Context::background();
    let users: KvRepository<User, _> = KvRepository::new(Arc::clone(&conn), "users:");
    let admins: KvRepository<User, _> = KvRepository::new(Arc::clone(&conn), "admins:");

    users.set(&ctx, "1", &alice()).await.unwrap();
    admins.set(&ctx, "2", &bob()).await.unwrap();

    assert_eq!(users.keys(&ctx, "*").await.unwrap(), vec!["1".to_string()]);
    assert_eq!(admins.keys(&ctx, "*").await.unwrap(), vec!["2".to_string()]);

    let (scanned, cursor) = users.scan(&ctx, 0, "*", 100).await.unwrap();
    assert_eq!(scanned, vec!["1".to_string()]);
    assert_eq!(cursor, 0);

    assert!(users.get(&ctx, "2").await.unwrap_err().is_not_found());
    assert!(admins.get(&ctx, "1").await.unwrap_err().is_not_found());
    assert!(!admins.key_exists(&ctx, "1").await.unwrap());
}

#[tokio::test]
async fn test_keys_pattern_and_prefix_stripping() {
    let p = provider().await;
    let repo = p.repository::<u8>("cache:");
    let ctx = Context::background();

    for key in ["user:1", "user:2", "user:10", "order:1"] {
        repo.set(&ctx, key, &1).await.unwrap();
    }

    let mut users = repo.keys(&ctx, "user:*").await.unwrap();
    users.sort();
    assert_eq!(users, vec!["user:1", "user:10", "user:2"]);

    let mut single = repo.keys(&ctx, "user:?").await.unwrap();
    single.sort();
    assert_eq!(single, vec!["user:1", "user:2"]);
}

#[tokio::test]
async fn test_scan_loop_covers_every_key_once() {
    let p = provider().await;
    let repo = p.repository::<u32>("items:");
    let other = p.repository::<u32>("other:");
    let ctx = Context::background();

    for i in 0..57u32 {
        repo.set(&ctx, &format!("item-{}", i), &i).await.unwrap();
        other.set(&ctx, &format!("item-{}", i), &i).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor = 0;
    let mut rounds = 0;
    loop {
        let (keys, next) = repo.scan(&ctx, cursor, "item-*", 10).await.unwrap();
        seen.extend(keys);
        rounds += 1;
        if next == 0 {
            break;
        }
        cursor = next;
    }

    assert!(rounds > 1, "count should bound each step");
    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(seen.len(), 57);
    assert_eq!(unique.len(), 57);
    assert!(seen.iter().all(|k| k.starts_with("item-")));
}

#[tokio::test(start_paused = true)]
async fn test_expired_deadline_fails_with_database_kind() {
    let p = provider().await;
    let repo = p.repository::<String>("d:");
    let ctx = Context::background().with_timeout(Duration::from_millis(50));

    tokio::time::advance(Duration::from_millis(100)).await;

    let err = repo.get(&ctx, "k").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    assert!(err.is_deadline_exceeded());

    let err = repo.set(&ctx, "k", &"v".to_string()).await.unwrap_err();
    assert!(err.is_deadline_exceeded());
}

#[tokio::test]
async fn test_cancelled_context_fails_with_database_kind() {
    let p = provider().await;
    let repo = p.repository::<String>("d:");
    let token = CancellationToken::new();
    let ctx = Context::with_cancellation(token.clone());

    repo.set(&ctx, "k", &"v".to_string()).await.unwrap();
    token.cancel();

    let err = repo.get(&ctx, "k").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    assert!(err.is_cancelled());

    // The delete itself reaches the store and fails there.
    let err = repo.delete_key(&ctx, "k").await.unwrap_err();
    assert!(err.is_cancelled());

    let fresh = Context::background();
    assert_eq!(repo.get(&fresh, "k").await.unwrap(), "v");
}

#[tokio::test]
async fn test_repository_usable_through_trait_object() {
    let p = provider().await;
    let repo: Box<dyn AdvancedKeyValueRepository<String>> = Box::new(p.repository::<String>("dyn:"));
    let ctx = Context::background();

    repo.set(&ctx, "k", &"v".to_string()).await.unwrap();
    assert_eq!(repo.get(&ctx, "k").await.unwrap(), "v");
    assert_eq!(repo.increment(&ctx, "n", 3).await.unwrap(), 3);
    assert_eq!(repo.mdelete(&ctx, &["k", "n"]).await.unwrap(), 2);
}

#[tokio::test]
async fn test_hash_tag_keys_match_literally() {
    let p = provider().await;
    let carts = p.repository::<u32>("cart:");
    let ctx = Context::background();

    carts.set(&ctx, "{42}:items", &3).await.unwrap();
    carts.set(&ctx, "42:items", &1).await.unwrap();

    assert_eq!(carts.keys(&ctx, "{42}:*").await.unwrap(), vec!["{42}:items".to_string()]);
    let (found, _) = carts.scan(&ctx, 0, "{4?}:items", 100).await.unwrap();
    assert_eq!(found, vec!["{42}:items".to_string()]);
}

#[tokio::test]
async fn test_raw_writes_visible_to_repository() {
    let p = provider().await;
    let ctx = Context::background();
    let repo = p.repository::<User>("users:");

    let bytes = serde_json::to_vec(&alice()).unwrap();
    p.connection().set(&ctx, "users:raw", &bytes, None).await.unwrap();

    assert_eq!(repo.get(&ctx, "raw").await.unwrap(), alice());
}
