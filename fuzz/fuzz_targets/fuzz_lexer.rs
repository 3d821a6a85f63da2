#![no_main]

use std::collections::BTreeMap;

use dynamo_core::parser::lexer::Lexer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The lexer contract is UTF-8 source text.
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // A small placeholder environment so the expansion and cycle-detection
    // paths are exercised too.
    let mut config = BTreeMap::new();
    config.insert("A".to_string(), "driver {% B %} { }".to_string());
    config.insert("B".to_string(), "{% A %}".to_string());
    config.insert("C".to_string(), "u8 value".to_string());

    // Errors are expected on arbitrary input; panics are not.
    for token in Lexer::new(source, &config) {
        if token.is_err() {
            break;
        }
    }
});
