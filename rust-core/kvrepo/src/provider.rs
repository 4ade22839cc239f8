// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Store provider: owns one connection and hands out repositories over it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kvrepo_store::{ConnectionOptions, Context, KeyTtl, KvConnection};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::contract::{DatabaseType, Feature, ProviderInfo};
use crate::error::{ErrorKind, PersistenceError, Result};
use crate::repository::{KvRepository, Storable};

/// Bound on the connect-time and health-check ping.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

const FEATURES: [Feature; 5] = [
    Feature::Ttl,
    Feature::AtomicOps,
    Feature::PubSub,
    Feature::Streaming,
    Feature::Transactions,
];

/// Owns a single store connection plus the configuration used to build it.
///
/// Repositories obtained from a provider share its connection. Closing the
/// provider closes that connection for all of them.
///
/// # Example
///
/// ```rust
/// use kvrepo::{Config, Context, Provider};
/// use kvrepo_store::InMemoryConnection;
///
/// # tokio_test::block_on(async {
/// let provider: Provider<InMemoryConnection> = Provider::connect(Config::default()).await.unwrap();
/// let counters = provider.repository::<i64>("counters:");
///
/// let ctx = Context::background();
/// assert_eq!(counters.increment(&ctx, "hits", 1).await.unwrap(), 1);
///
/// provider.close().await.unwrap();
/// # });
/// ```
pub struct Provider<C: KvConnection> {
    conn: Arc<C>,
    config: Config,
    options: ConnectionOptions,
    ping_timeout: Duration,
    closed: AtomicBool,
}

impl<C: KvConnection> Provider<C> {
    /// Resolve `config`, open a connection and verify it with a bounded ping.
    ///
    /// An invalid URL or database index fails before any connection attempt.
    /// Malformed tuning options are ignored.
    #[instrument(skip(config), fields(backend = std::any::type_name::<C>()))]
    pub async fn connect(config: Config) -> Result<Self> {
        let options = config.resolve()?;
        debug!(addr = %options.addr(), db = options.database, tls = options.tls, "opening connection");

        let conn = C::open(&options).await.map_err(|err| {
            PersistenceError::with_cause(ErrorKind::Database, "failed to connect to store", err)
        })?;

        Self::probe_new(Arc::new(conn), config, options).await
    }

    /// Wrap an already opened connection, verifying it with a bounded ping.
    #[instrument(skip(conn, config), fields(connection = conn.name()))]
    pub async fn from_connection(conn: Arc<C>, config: Config) -> Result<Self> {
        let options = config.resolve()?;
        Self::probe_new(conn, config, options).await
    }

    async fn probe_new(conn: Arc<C>, config: Config, options: ConnectionOptions) -> Result<Self> {
        let provider = Self {
            conn,
            config,
            options,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            closed: AtomicBool::new(false),
        };

        if let Err(err) = provider.ping("failed to connect to store").await {
            if let Err(close_err) = provider.conn.close().await {
                warn!(error = %close_err, "failed to close connection after failed ping");
            }
            return Err(err);
        }

        info!(connection = %provider.conn.name(), "provider connected");
        Ok(provider)
    }

    async fn ping(&self, failure: &str) -> Result<()> {
        let ctx = Context::background().with_timeout(self.ping_timeout);
        self.conn
            .ping(&ctx)
            .await
            .map_err(|err| PersistenceError::with_cause(ErrorKind::Database, failure, err))
    }

    /// Replace the stored configuration. Does not reconnect or validate.
    pub fn configure(&mut self, config: Config) {
        self.config = config;
    }

    /// Change the bound on health-check pings.
    pub fn set_ping_timeout(&mut self, timeout: Duration) {
        self.ping_timeout = timeout;
    }

    /// The current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The options the connection was opened with.
    pub fn connection_options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// The shared connection.
    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    /// Ping the store within the ping timeout.
    #[instrument(skip(self), fields(connection = self.conn.name()))]
    pub async fn health(&self) -> Result<()> {
        if self.is_closed() {
            return Err(PersistenceError::database("provider is closed"));
        }
        self.ping("health check failed").await
    }

    /// Close the connection. Later calls are no-ops.
    #[instrument(skip(self), fields(connection = self.conn.name()))]
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.conn.close().await?;
        info!("provider closed");
        Ok(())
    }

    /// Whether [`Provider::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Capabilities of the store.
    pub fn supported_features(&self) -> Vec<Feature> {
        FEATURES.to_vec()
    }

    /// Name, version, database type and features of this provider.
    pub fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.conn.name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database_type: DatabaseType::KeyValue,
            features: self.supported_features(),
        }
    }

    /// A repository of `T` whose keys all start with `prefix`.
    pub fn repository<T: Storable>(&self, prefix: impl Into<String>) -> KvRepository<T, C> {
        KvRepository::new(Arc::clone(&self.conn), prefix)
    }

    /// A repository of `T` over the unprefixed keyspace.
    pub fn default_repository<T: Storable>(&self) -> KvRepository<T, C> {
        self.repository("")
    }

    // ----- raw key-value surface -----

    /// Store raw bytes at `key`, expiring after `ttl` (zero means never).
    pub async fn set(&self, ctx: &Context, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let ttl = Some(ttl).filter(|d| !d.is_zero());
        Ok(self.conn.set(ctx, key, value, ttl).await?)
    }

    /// Raw bytes at `key`; NotFound if absent.
    pub async fn get(&self, ctx: &Context, key: &str) -> Result<Vec<u8>> {
        Ok(self.conn.get(ctx, key).await?)
    }

    /// Remove `key`. Removing an absent key succeeds.
    pub async fn delete(&self, ctx: &Context, key: &str) -> Result<()> {
        self.conn.del(ctx, &[key.to_string()]).await?;
        Ok(())
    }

    /// Whether `key` exists.
    pub async fn exists(&self, ctx: &Context, key: &str) -> Result<bool> {
        Ok(self.conn.exists(ctx, &[key.to_string()]).await? > 0)
    }

    /// All keys matching a glob pattern.
    pub async fn keys(&self, ctx: &Context, pattern: &str) -> Result<Vec<String>> {
        Ok(self.conn.keys(ctx, pattern).await?)
    }

    /// Set the expiry of `key`. An absent key is not an error.
    pub async fn expire(&self, ctx: &Context, key: &str, ttl: Duration) -> Result<()> {
        self.conn.expire(ctx, key, ttl).await?;
        Ok(())
    }

    /// Remaining lifetime of `key`.
    pub async fn ttl(&self, ctx: &Context, key: &str) -> Result<KeyTtl> {
        Ok(self.conn.ttl(ctx, key).await?)
    }
}

impl<C: KvConnection> std::fmt::Debug for Provider<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("connection", &self.conn.name())
            .field("options", &self.options)
            .field("closed", &self.is_closed())
            .finish()
    }
}
