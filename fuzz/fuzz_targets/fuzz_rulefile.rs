//! Fuzz target for the rule-file reader.
//!
//! Goal: The reader should **never panic** on any input.
//! It may return rule errors, but panics are unacceptable.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_rulefile
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        for parsed in promguard_parser::parse_rules(text) {
            if let Ok(rule) = parsed {
                // Selector extraction on parsed rules must not panic.
                let _ = rule.expr.selectors();
                let _ = rule.disable_directives();
            }
        }
    }
});
