//! Fuzz target for the class-file parser
//!
//! Tests parser robustness against malformed class-file data.

#![no_main]

use codedna_core::ClassFileParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let parser = ClassFileParser::new();

    // Try to parse arbitrary data - should not panic
    let _ = parser.parse(data);
});
