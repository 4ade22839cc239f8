// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Provider configuration and its resolution into connection options.
//
// A `Config` names the store either by URL or by discrete host/port fields,
// and carries a loosely typed options bag keyed by store name. Resolution is
// strict about the address (a bad URL or database index is fatal) and lenient
// about tuning (a malformed knob is logged and skipped).

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use kvrepo_store::options::{DEFAULT_HOST, DEFAULT_PORT};
use kvrepo_store::ConnectionOptions;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{PersistenceError, Result};

/// Options-bag key holding Redis tuning knobs.
pub const REDIS_OPTIONS_KEY: &str = "redis";

/// A loosely typed options-bag value.
///
/// Deserializes from any JSON-like input; variants are tried in order, so a
/// `{"secs": .., "nanos": ..}` object becomes a native [`Duration`] rather
/// than a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<OptionValue>),
    Duration(Duration),
    Map(HashMap<String, OptionValue>),
}

impl OptionValue {
    /// Build a map value from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<OptionValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        OptionValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    fn as_duration(&self) -> Option<Duration> {
        match self {
            OptionValue::Duration(d) => Some(*d),
            OptionValue::Str(s) => parse_duration(s).ok(),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v.into())
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

impl From<Duration> for OptionValue {
    fn from(v: Duration) -> Self {
        OptionValue::Duration(v)
    }
}

impl From<Vec<OptionValue>> for OptionValue {
    fn from(v: Vec<OptionValue>) -> Self {
        OptionValue::List(v)
    }
}

impl From<HashMap<String, OptionValue>> for OptionValue {
    fn from(v: HashMap<String, OptionValue>) -> Self {
        OptionValue::Map(v)
    }
}

/// Provider configuration.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use kvrepo::Config;
///
/// let config = Config::from_url("redis://:secret@cache.internal:6380/2")
///     .redis_option("max_retries", 5)
///     .redis_option("dial_timeout", "250ms");
///
/// let opts = config.resolve().unwrap();
/// assert_eq!(opts.addr(), "cache.internal:6380");
/// assert_eq!(opts.database, 2);
/// assert_eq!(opts.password.as_deref(), Some("secret"));
/// assert_eq!(opts.dial_timeout, Some(Duration::from_millis(250)));
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `redis://[user[:pass]@]host[:port][/db]`; when non-empty, the discrete
    /// address fields are ignored.
    pub connection_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Database index as a decimal string.
    pub database: String,
    /// Pool size when non-zero.
    pub max_open_conns: usize,
    /// Minimum idle connections when non-zero.
    pub max_idle_conns: usize,
    /// Store-specific tuning, keyed by store name.
    pub options: HashMap<String, OptionValue>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_url: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            database: "0".to_string(),
            max_open_conns: 0,
            max_idle_conns: 0,
            options: HashMap::new(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("connection_url", &self.connection_url.as_deref().map(redact_url))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("max_open_conns", &self.max_open_conns)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("options", &self.options)
            .finish()
    }
}

fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            // Only fails for URLs that cannot carry credentials at all.
            let _ = url.set_password(Some("redacted"));
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => "<unparseable>".to_string(),
    }
}

impl Config {
    /// A configuration addressed by URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            connection_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Set one knob in the `"redis"` options map, creating the map if needed.
    ///
    /// A non-map value already stored under `"redis"` is replaced.
    pub fn redis_option(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        let entry = self
            .options
            .entry(REDIS_OPTIONS_KEY.to_string())
            .or_insert_with(|| OptionValue::Map(HashMap::new()));
        if !matches!(entry, OptionValue::Map(_)) {
            *entry = OptionValue::Map(HashMap::new());
        }
        if let OptionValue::Map(map) = entry {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Resolve into connection options.
    ///
    /// Fails with a Database-kind error for an unparseable URL or a
    /// non-numeric database index. Pool sizing from `max_open_conns` /
    /// `max_idle_conns` is applied first, then the `"redis"` options map.
    pub fn resolve(&self) -> Result<ConnectionOptions> {
        let mut opts = match self.connection_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => parse_connection_url(url)?,
            _ => self.discrete_options()?,
        };

        if self.max_open_conns > 0 {
            opts.pool_size = Some(self.max_open_conns);
        }
        if self.max_idle_conns > 0 {
            opts.min_idle_conns = Some(self.max_idle_conns);
        }

        match self.options.get(REDIS_OPTIONS_KEY) {
            Some(OptionValue::Map(knobs)) => apply_redis_options(&mut opts, knobs),
            Some(other) => debug!(value = ?other, "ignoring non-map redis options"),
            None => {}
        }

        Ok(opts)
    }

    fn discrete_options(&self) -> Result<ConnectionOptions> {
        let host = if self.host.is_empty() {
            DEFAULT_HOST.to_string()
        } else {
            self.host.clone()
        };
        let port = if self.port == 0 { DEFAULT_PORT } else { self.port };

        let database = match self.database.trim() {
            "" => 0,
            db => db.parse::<i64>().map_err(|_| {
                PersistenceError::database(format!("invalid database number: {}", self.database))
            })?,
        };

        Ok(ConnectionOptions {
            host,
            port,
            username: self.username.clone().filter(|u| !u.is_empty()),
            password: self.password.clone().filter(|p| !p.is_empty()),
            database,
            ..Default::default()
        })
    }
}

/// Parse `redis://[user[:pass]@]host[:port][/db]`.
///
/// `rediss://` selects TLS. A URL without a scheme is read as `redis://`. A
/// lone userinfo component is taken as the password.
pub fn parse_connection_url(raw: &str) -> Result<ConnectionOptions> {
    let normalized = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("redis://{}", raw)
    };

    let invalid = |reason: &str| {
        PersistenceError::database(format!("invalid connection url '{}': {}", redact_url(&normalized), reason))
    };

    let url = Url::parse(&normalized).map_err(|e| invalid(&e.to_string()))?;

    let tls = match url.scheme() {
        "redis" => false,
        "rediss" => true,
        other => return Err(invalid(&format!("unsupported scheme '{}'", other))),
    };

    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => return Err(invalid("missing host")),
    };

    // Userinfo comes back percent-encoded.
    let decode = |part: &str, what: &str| -> Result<String> {
        percent_decode_str(part)
            .decode_utf8()
            .map(|decoded| decoded.into_owned())
            .map_err(|_| invalid(&format!("{} is not valid UTF-8", what)))
    };

    let (username, password) = match (url.username(), url.password()) {
        ("", None) => (None, None),
        (user, None) => (None, Some(decode(user, "password")?)),
        ("", Some(pass)) => (None, Some(decode(pass, "password")?)),
        (user, Some(pass)) => (Some(decode(user, "username")?), Some(decode(pass, "password")?)),
    };

    let database = match url.path().trim_start_matches('/') {
        "" => 0,
        db => db
            .parse::<i64>()
            .map_err(|_| invalid(&format!("invalid database number '{}'", db)))?,
    };

    Ok(ConnectionOptions {
        host,
        port: url.port().unwrap_or(DEFAULT_PORT),
        username,
        password,
        database,
        tls,
        ..Default::default()
    })
}

/// Apply the knobs of the `"redis"` options map. Malformed entries are skipped.
fn apply_redis_options(opts: &mut ConnectionOptions, knobs: &HashMap<String, OptionValue>) {
    for (key, value) in knobs {
        let applied = match key.as_str() {
            "max_retries" => value
                .as_int()
                .and_then(|n| usize::try_from(n).ok())
                .map(|n| opts.max_retries = Some(n)),
            "pool_size" => value
                .as_int()
                .filter(|n| *n > 0)
                .and_then(|n| usize::try_from(n).ok())
                .map(|n| opts.pool_size = Some(n)),
            "min_idle_conns" => value
                .as_int()
                .and_then(|n| usize::try_from(n).ok())
                .map(|n| opts.min_idle_conns = Some(n)),
            "dial_timeout" => value.as_duration().map(|d| opts.dial_timeout = Some(d)),
            "read_timeout" => value.as_duration().map(|d| opts.read_timeout = Some(d)),
            "write_timeout" => value.as_duration().map(|d| opts.write_timeout = Some(d)),
            "pool_timeout" => value.as_duration().map(|d| opts.pool_timeout = Some(d)),
            _ => {
                debug!(key = %key, "ignoring unknown redis option");
                continue;
            }
        };

        if applied.is_none() {
            debug!(key = %key, value = ?value, "ignoring malformed redis option");
        }
    }
}

/// Parse a duration string such as `"300ms"`, `"1.5h"` or `"2h45m"`.
///
/// Each component is a decimal number followed by a unit: `ns`, `us`
/// (or `µs`), `ms`, `s`, `m`, `h`. A bare `"0"` is zero. Negative durations
/// are rejected.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let s = input.trim();
    let s = s.strip_prefix('+').unwrap_or(s);

    if s.is_empty() {
        return Err("duration cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err(format!("negative duration '{}'", input));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total: u128 = 0;
    let mut rest = s;

    while !rest.is_empty() {
        let num_end = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        let (number, tail) = rest.split_at(num_end);
        let unit_end = tail.find(is_number).unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "" => return Err(format!("missing unit in duration '{}'", input)),
            other => return Err(format!("unknown unit '{}' in duration '{}'", other, input)),
        };

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
            return Err(format!("invalid number in duration '{}'", input));
        }

        let overflow = || format!("duration '{}' out of range", input);
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;

        // Fractional digits beyond nanosecond precision are truncated.
        let mut place = scale;
        for digit in frac.chars().filter_map(|c| c.to_digit(10)) {
            place /= 10;
            if place == 0 {
                break;
            }
            nanos += u128::from(digit) * place;
        }

        total = total.checked_add(nanos).ok_or_else(overflow)?;
        rest = next;
    }

    let secs = u64::try_from(total / 1_000_000_000).map_err(|_| format!("duration '{}' out of range", input))?;
    Ok(Duration::new(secs, (total % 1_000_000_000) as u32))
}
