#![no_main]

use std::collections::BTreeMap;

use dynamo_core::parser::lexer;
use dynamo_core::parser::{Parser, SymbolTable};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    let config = BTreeMap::new();
    let Ok(tokens) = lexer::tokenize(source, &config) else {
        return;
    };

    // Errors are expected on arbitrary input; panics are not.  The parser
    // must also fuse cleanly after the first error.
    let mut parser = Parser::new(tokens, SymbolTable::new());
    while let Some(result) = parser.next() {
        if result.is_err() {
            assert!(parser.next().is_none(), "parser must fuse after an error");
            break;
        }
    }
});
