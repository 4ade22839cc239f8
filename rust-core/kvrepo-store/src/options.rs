// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resolved connection parameters handed to `KvConnection::open`.

use std::fmt;
use std::time::Duration;

/// Default store host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default store port.
pub const DEFAULT_PORT: u16 = 6379;

/// Fully resolved parameters for opening a connection.
///
/// Produced by the configuration layer after URL parsing, defaulting and
/// options-bag tuning. `None` tuning fields mean "use the client default".
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Store host name or address.
    pub host: String,
    /// Store TCP port.
    pub port: u16,
    /// ACL user name.
    pub username: Option<String>,
    /// Password (never printed by `Debug`).
    pub password: Option<String>,
    /// Logical database index.
    pub database: i64,
    /// Connect over TLS (`rediss://`).
    pub tls: bool,
    /// Upper bound on pooled connections.
    pub pool_size: Option<usize>,
    /// Connections kept open while idle.
    pub min_idle_conns: Option<usize>,
    /// Reconnect attempts before a command fails.
    pub max_retries: Option<usize>,
    /// Timeout for establishing a connection.
    pub dial_timeout: Option<Duration>,
    /// Timeout for reading a reply.
    pub read_timeout: Option<Duration>,
    /// Timeout for writing a command.
    pub write_timeout: Option<Duration>,
    /// Timeout for waiting on a pooled connection.
    pub pool_timeout: Option<Duration>,
}

impl ConnectionOptions {
    /// `host:port` form of the address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The timeout applied to a full command round trip: the larger of the
    /// read and write timeouts, when either is set.
    pub fn response_timeout(&self) -> Option<Duration> {
        match (self.read_timeout, self.write_timeout) {
            (Some(r), Some(w)) => Some(r.max(w)),
            (r, w) => r.or(w),
        }
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            database: 0,
            tls: false,
            pool_size: None,
            min_idle_conns: None,
            max_retries: None,
            dial_timeout: None,
            read_timeout: None,
            write_timeout: None,
            pool_timeout: None,
        }
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("tls", &self.tls)
            .field("pool_size", &self.pool_size)
            .field("min_idle_conns", &self.min_idle_conns)
            .field("max_retries", &self.max_retries)
            .field("dial_timeout", &self.dial_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("pool_timeout", &self.pool_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ConnectionOptions::default();
        assert_eq!(opts.addr(), "localhost:6379");
        assert_eq!(opts.database, 0);
        assert!(!opts.tls);
        assert!(opts.response_timeout().is_none());
    }

    #[test]
    fn test_debug_redacts_password() {
        let opts = ConnectionOptions {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let printed = format!("{:?}", opts);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_response_timeout_takes_larger() {
        let opts = ConnectionOptions {
            read_timeout: Some(Duration::from_secs(3)),
            write_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        assert_eq!(opts.response_timeout(), Some(Duration::from_secs(5)));

        let opts = ConnectionOptions {
            write_timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        assert_eq!(opts.response_timeout(), Some(Duration::from_secs(2)));
    }
}
