// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Glob patterns for KEYS and SCAN MATCH.
//
// Store keys are flat strings, so `*` must cross `/` and `:` alike. Patterns
// are compiled with `globset` with literal separators off and backslash
// escapes on, which covers `*`, `?`, `[...]`, `[!...]` and `\x`. Braces are
// literal in store globs (hash tags such as `user:{42}`), so they are escaped
// before globset can read them as alternation.

use globset::{GlobBuilder, GlobMatcher};

use crate::error::StoreError;

/// Characters with glob meaning that [`escape`] neutralises.
const META: &[char] = &['*', '?', '[', ']', '\\', '{', '}'];

/// A compiled key pattern.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    matcher: GlobMatcher,
}

impl KeyPattern {
    /// Compile `pattern`.
    pub fn new(pattern: &str) -> Result<Self, StoreError> {
        let glob = GlobBuilder::new(&literal_braces(pattern))
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|e| StoreError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            raw: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// Whether `key` matches.
    pub fn is_match(&self, key: &str) -> bool {
        self.matcher.is_match(key)
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Escape `{` and `}` outside character classes, leaving existing escapes and
/// class members alone.
fn literal_braces(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push(c);
                if let Some(&neg) = chars.peek().filter(|n| **n == '!' || **n == '^') {
                    out.push(neg);
                    chars.next();
                }
                // A leading `]` is a class member, not the end.
                if chars.peek() == Some(&']') {
                    out.push(']');
                    chars.next();
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            '{' | '}' if !in_class => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Escape every glob metacharacter in `literal` so it only matches itself.
///
/// Used for namespace prefixes, which are literal text prepended to a
/// caller's pattern.
pub fn escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
