// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Redis connection for kvrepo.
//
// Wraps a multiplexed `redis::aio::ConnectionManager`, which reconnects on its
// own and is cheap to clone per command. Every command is issued as a raw
// `redis::cmd` inside `Context::run`, so deadlines and cancellation abort the
// wait for a reply. `close` drops the manager; the socket goes once commands
// already in flight finish with their clones.
//
// Only available when the `redis-backend` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backend::{ttl_millis, KeyTtl, KvConnection};
use crate::context::Context;
use crate::error::StoreError;
use crate::options::ConnectionOptions;

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            StoreError::Connection(err.to_string())
        } else if err.kind() == redis::ErrorKind::TypeError {
            StoreError::other(err)
        } else {
            StoreError::Response(err.to_string())
        }
    }
}

/// A live connection to a Redis server.
///
/// # Example
///
/// ```rust,no_run
/// use kvrepo_store::{ConnectionOptions, Context, KvConnection, RedisConnection};
///
/// # tokio_test::block_on(async {
/// let conn = RedisConnection::open(&ConnectionOptions::default()).await.unwrap();
/// conn.set(&Context::background(), "greeting", b"hello", None).await.unwrap();
/// # });
/// ```
pub struct RedisConnection {
    /// `None` once closed.
    manager: RwLock<Option<ConnectionManager>>,
    name: String,
}

impl RedisConnection {
    /// Connect through an already-configured client.
    ///
    /// Retry and timeout tuning is taken from `options`; the address and
    /// credentials come from `client`.
    pub async fn with_client(client: Client, options: &ConnectionOptions) -> Result<Self, StoreError> {
        let mut config = ConnectionManagerConfig::new();
        if let Some(retries) = options.max_retries {
            config = config.set_number_of_retries(retries);
        }
        if let Some(timeout) = options.dial_timeout {
            config = config.set_connection_timeout(timeout);
        }
        if let Some(timeout) = options.response_timeout() {
            config = config.set_response_timeout(timeout);
        }
        if options.pool_size.is_some() || options.min_idle_conns.is_some() {
            // The manager multiplexes one connection; pool sizing has no effect.
            debug!(
                pool_size = ?options.pool_size,
                min_idle_conns = ?options.min_idle_conns,
                "pool sizing ignored by multiplexed connection"
            );
        }

        let manager = ConnectionManager::new_with_config(client, config).await?;

        info!(addr = %options.addr(), db = options.database, "connected to redis");

        Ok(Self {
            manager: RwLock::new(Some(manager)),
            name: format!("redis://{}/{}", options.addr(), options.database),
        })
    }

    /// Whether [`KvConnection::close`] has been called.
    pub async fn is_closed(&self) -> bool {
        self.manager.read().await.is_none()
    }

    async fn conn(&self) -> Result<ConnectionManager, StoreError> {
        self.manager.read().await.clone().ok_or(StoreError::Closed)
    }
}

fn connection_info(options: &ConnectionOptions) -> ConnectionInfo {
    let addr = if options.tls {
        ConnectionAddr::TcpTls {
            host: options.host.clone(),
            port: options.port,
            insecure: false,
            tls_params: None,
        }
    } else {
        ConnectionAddr::Tcp(options.host.clone(), options.port)
    };

    ConnectionInfo {
        addr,
        redis: RedisConnectionInfo {
            db: options.database,
            username: options.username.clone(),
            password: options.password.clone(),
            ..Default::default()
        },
    }
}

#[async_trait]
impl KvConnection for RedisConnection {
    async fn open(options: &ConnectionOptions) -> Result<Self, StoreError>
    where
        Self: Sized,
    {
        if options.tls {
            // Errs only when a process-wide provider is already installed.
            let _ = rustls::crypto::ring::default_provider().install_default();
        }
        let client = Client::open(connection_info(options))?;
        Self::with_client(client, options).await
    }

    async fn ping(&self, ctx: &Context) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        ctx.run(async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn get(&self, ctx: &Context, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut conn = self.conn().await?;
        ctx.run(async move {
            let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            value.ok_or(StoreError::Nil)
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
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl.filter(|d| !d.is_zero()) {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        ctx.run(async move {
            let _: () = cmd.query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn del(&self, ctx: &Context, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        ctx.run(async move {
            let removed: u64 = redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
            Ok(removed)
        })
        .await
    }

    async fn exists(&self, ctx: &Context, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        ctx.run(async move {
            let found: u64 = redis::cmd("EXISTS").arg(keys).query_async(&mut conn).await?;
            Ok(found)
        })
        .await
    }

    async fn mget(&self, ctx: &Context, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        ctx.run(async move {
            let values: Vec<Option<Vec<u8>>> =
                redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
            Ok(values)
        })
        .await
    }

    async fn mset(&self, ctx: &Context, entries: &[(String, Vec<u8>)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("MSET");
        for (key, value) in entries {
            cmd.arg(key).arg(value);
        }
        ctx.run(async move {
            let _: () = cmd.query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn expire(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        ctx.run(async move {
            let applied: bool = redis::cmd("PEXPIRE")
                .arg(key)
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await?;
            Ok(applied)
        })
        .await
    }

    async fn ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl, StoreError> {
        let mut conn = self.conn().await?;
        ctx.run(async move {
            let millis: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
            Ok(KeyTtl::from_raw_millis(millis))
        })
        .await
    }

    async fn persist(&self, ctx: &Context, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        ctx.run(async move {
            let cleared: bool = redis::cmd("PERSIST").arg(key).query_async(&mut conn).await?;
            Ok(cleared)
        })
        .await
    }

    async fn incr_by(&self, ctx: &Context, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        ctx.run(async move {
            let value: i64 = redis::cmd("INCRBY")
                .arg(key)
                .arg(delta)
                .query_async(&mut conn)
                .await?;
            Ok(value)
        })
        .await
    }

    async fn keys(&self, ctx: &Context, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;
        ctx.run(async move {
            let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
            Ok(keys)
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
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor).arg("MATCH").arg(pattern);
        if count > 0 {
            cmd.arg("COUNT").arg(count);
        }
        ctx.run(async move {
            let (next, keys): (u64, Vec<String>) = cmd.query_async(&mut conn).await?;
            Ok((keys, next))
        })
        .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.manager.write().await.take().is_some() {
            debug!(name = %self.name, "closed redis connection");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
