// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lifecycle hooks for stored values.

use std::collections::{BTreeMap, HashMap};

use kvrepo_store::Context;

/// Optional lifecycle callbacks run by a repository around its operations.
///
/// Every method has a no-op default, so most value types opt in with an empty
/// impl. Before-hooks can veto: a `before_write` or `before_delete` error
/// aborts the operation with a Validation error. After-hooks cannot: their
/// errors are logged and dropped.
///
/// ```rust
/// use kvrepo::{Context, Observable};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     name: String,
/// }
///
/// impl Observable for User {
///     fn before_write(&self, _ctx: &Context) -> anyhow::Result<()> {
///         anyhow::ensure!(!self.name.is_empty(), "name must not be empty");
///         Ok(())
///     }
/// }
/// ```
pub trait Observable {
    /// Runs before a single-key write. An error aborts the write.
    fn before_write(&self, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after a successful single-key write.
    fn after_write(&self, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after a value is decoded; may adjust the value handed back.
    fn after_read(&mut self, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs against the current value before it is deleted. An error keeps
    /// the key.
    fn before_delete(&self, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after the key has been deleted.
    fn after_delete(&self, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }
}

macro_rules! observable_noop {
    ($($ty:ty),* $(,)?) => {
        $(impl Observable for $ty {})*
    };
}

observable_noop!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, String,
    serde_json::Value,
);

impl<T> Observable for Vec<T> {}

impl<T> Observable for Option<T> {}

impl<K, V> Observable for HashMap<K, V> {}

impl<K, V> Observable for BTreeMap<K, V> {}
