// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw store error types for the kvrepo connection seam.
//
// These are the errors a connection reports as-is: the key-not-found sentinel,
// error replies from the store, transport failures and context expiry. The
// repository layer translates them into its persistence taxonomy.

use thiserror::Error;

/// Errors reported by a [`crate::KvConnection`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store replied with "no value" for a single-key read.
    #[error("key not found")]
    Nil,

    /// The store replied with an error (e.g. `WRONGTYPE`, non-integer INCRBY).
    #[error("store error reply: {0}")]
    Response(String),

    /// The connection could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// An I/O error occurred below the connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed by its owner.
    #[error("connection is closed")]
    Closed,

    /// The context's deadline passed before the command completed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The context was cancelled before the command completed.
    #[error("context cancelled")]
    Cancelled,

    /// An invalid glob pattern was supplied to KEYS or SCAN.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Any other error, carried opaquely.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap an arbitrary error.
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        StoreError::Other(err.into())
    }

    /// True for the "no value" sentinel.
    pub fn is_nil(&self) -> bool {
        matches!(self, StoreError::Nil)
    }

    /// True when the command was aborted by its context.
    pub fn is_context_done(&self) -> bool {
        matches!(self, StoreError::DeadlineExceeded | StoreError::Cancelled)
    }
}
