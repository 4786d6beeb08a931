//! Fuzz target for PromQL expression parsing.
//!
//! Goal: The parser should **never panic** on any input.
//! It may return errors, but panics are unacceptable.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_promql_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Expressions come from UTF-8 rule files.
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(expr) = promguard_parser::parse_expr(text) {
            // Extraction and canonical rendering must not panic either,
            // and every extracted fragment must reparse.
            for selector in promguard_parser::extract_selectors(&expr, text, 1) {
                let fragment = selector.fragment();
                let _ = promguard_parser::parse_expr(&fragment);
            }
        }
    }
});
