// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Fuzz target for connection URL and duration parsing.
// Run with: cargo +nightly fuzz run fuzz_connection_url
//
// Both parsers take operator-supplied text and must reject anything
// malformed with an error, never a panic or an overflow.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if input.len() <= 4096 {
            let _ = kvrepo::config::parse_connection_url(input);
            let _ = kvrepo::parse_duration(input);
        }
    }
});
