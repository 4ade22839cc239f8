// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistence error taxonomy and the store error translator.
//
// Every error a repository or provider returns carries one of a closed set of
// kinds, so callers branch on `kind()` rather than on message text. Raw store
// failures are funnelled through `translate`; encode/decode and hook failures
// are raised where they happen.

use std::error::Error as StdError;
use std::fmt;

use kvrepo_store::StoreError;
use thiserror::Error;

/// Boxed error carried as the cause of a [`PersistenceError`].
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The closed set of persistence error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The key or entity does not exist.
    NotFound,
    /// A value could not be encoded or decoded.
    Serialization,
    /// A before-hook rejected the operation.
    Validation,
    /// The store failed, timed out, or the call was cancelled.
    Database,
    /// The operation is not offered by a key-value repository.
    Unsupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::Serialization => "serialization error",
            ErrorKind::Validation => "validation error",
            ErrorKind::Database => "database error",
            ErrorKind::Unsupported => "unsupported operation",
        };
        f.write_str(s)
    }
}

/// An error returned by a provider or repository.
#[derive(Debug, Error)]
#[error("{}", render(.kind, .message, .cause))]
pub struct PersistenceError {
    kind: ErrorKind,
    message: Option<String>,
    #[source]
    cause: Option<BoxError>,
}

fn render(kind: &ErrorKind, message: &Option<String>, cause: &Option<BoxError>) -> String {
    let mut out = kind.to_string();
    if let Some(message) = message {
        out.push_str(": ");
        out.push_str(message);
    }
    if let Some(cause) = cause {
        out.push_str(": ");
        out.push_str(&cause.to_string());
    }
    out
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PersistenceError>;

impl PersistenceError {
    /// An error of `kind` with a message and no cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            cause: None,
        }
    }

    /// An error of `kind` wrapping `cause`.
    pub fn with_cause(kind: ErrorKind, message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
            cause: Some(cause.into()),
        }
    }

    /// A NotFound error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// A Serialization error.
    pub fn serialization(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::with_cause(ErrorKind::Serialization, message, cause)
    }

    /// A Validation error.
    pub fn validation(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::with_cause(ErrorKind::Validation, message, cause)
    }

    /// A Database error with a message only.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// An Unsupported error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    /// The error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The error's message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// True for [`ErrorKind::NotFound`].
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// True when the underlying store call was cancelled through its context.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.store_cause(), Some(StoreError::Cancelled))
    }

    /// True when the underlying store call ran past its context deadline.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.store_cause(), Some(StoreError::DeadlineExceeded))
    }

    fn store_cause(&self) -> Option<&StoreError> {
        self.cause.as_ref()?.downcast_ref::<StoreError>()
    }
}

/// Translate a raw store error into the persistence taxonomy.
///
/// The not-found sentinel becomes [`ErrorKind::NotFound`]; an error that is
/// already a [`PersistenceError`] comes back unchanged; everything else is
/// [`ErrorKind::Database`] with the original kept as the cause.
pub fn translate(err: StoreError) -> PersistenceError {
    match err {
        StoreError::Nil => PersistenceError::not_found("key not found"),
        StoreError::Other(boxed) => match boxed.downcast::<PersistenceError>() {
            Ok(translated) => *translated,
            Err(other) => database_cause(StoreError::Other(other)),
        },
        other => database_cause(other),
    }
}

/// [`translate`] applied to the error side of a result.
pub fn translate_result<T>(result: std::result::Result<T, StoreError>) -> Result<T> {
    result.map_err(translate)
}

fn database_cause(err: StoreError) -> PersistenceError {
    PersistenceError {
        kind: ErrorKind::Database,
        message: None,
        cause: Some(Box::new(err)),
    }
}

impl From<StoreError> for PersistenceError {
    fn from(err: StoreError) -> Self {
        translate(err)
    }
}
