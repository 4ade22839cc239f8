// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Fuzz target for glob key patterns.
// Run with: cargo +nightly fuzz run fuzz_key_pattern
//
// The first line of input is a literal prefix, the rest a pattern. An
// escaped prefix must always match itself.

#![no_main]

use kvrepo_store::pattern::escape;
use kvrepo_store::KeyPattern;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if input.len() > 1024 {
        return;
    }

    let (prefix, pattern) = input.split_once('\n').unwrap_or((input, "*"));

    if let Ok(compiled) = KeyPattern::new(&format!("{}*", escape(prefix))) {
        assert!(compiled.is_match(prefix));
    }
    if let Ok(compiled) = KeyPattern::new(pattern) {
        let _ = compiled.is_match(prefix);
    }
});
