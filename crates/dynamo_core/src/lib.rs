//! `dynamo_core` — the compiler library for the dynamo hardware-driver DSL.
//!
//! A specification file names a set of drivers; each driver contributes DSL
//! source text describing a polymorphic unit with template parameters,
//! single inheritance, and embedded blocks of target-language code.  The
//! compiler resolves driver dependencies, lexes and parses each driver into
//! an AST, and hands the nodes to a caller-supplied [`parser::ast::Visitor`]
//! (a code generator or a pretty-printer).
//!
//! # Crate layout
//!
//! - [`error`] — Compiler error types and `DynamoResult` alias.
//! - [`parser`] — Front end: lexer, AST model, and parser.
//! - [`specs`] — Specification-file reader (TOML).
//! - [`compiler`] — Dependency-ordered compilation driver.
//! - [`visitors`] — AST pretty-printer and C code generator.

/// Dependency-ordered compilation driver.
pub mod compiler;
/// Compiler error types and [`DynamoResult`] alias.
pub mod error;
/// DSL front end: lexer, AST model, and parser.
pub mod parser;
/// Specification-file reader.
pub mod specs;
/// Emitter visitors: AST pretty-printer and C code generator.
pub mod visitors;

pub use compiler::Compiler;
pub use error::{DynamoError, DynamoResult};
pub use specs::SpecsFile;
