//! Dependency-ordered compilation driver.
//!
//! [`Compiler::compile`] walks the specification's driver map and compiles
//! each driver after its dependencies, each at most once.  One symbol table
//! is threaded through every per-driver parser run, so a later driver may
//! reference a driver compiled earlier by name.  The collected AST nodes
//! form one flat list in compilation order and are handed to the caller's
//! visitor at the end.

use std::collections::BTreeSet;

use log::debug;

use crate::error::{DynamoError, DynamoResult};
use crate::parser::ast::{Node, Visitor};
use crate::parser::lexer::Lexer;
use crate::parser::{Parser, SymbolTable};
use crate::specs::{DriverEntry, SpecsFile};

// ─────────────────────────────────────────────────────────────────────────────
// Compiler
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable state shared across one compilation run.
struct CompileState<'src> {
    /// Drivers that have finished compiling.
    compiled: BTreeSet<String>,
    /// Drivers whose dependency chains are currently being walked.  A name
    /// re-entering this set means the dependency graph has a cycle.
    in_progress: BTreeSet<String>,
    /// The symbol table threaded between parser runs.
    symbols: SymbolTable<'src>,
    /// Collected nodes, in compilation order.
    nodes: Vec<Node<'src>>,
}

/// The compilation driver.
///
/// Owns the specification (and with it every source buffer and placeholder
/// environment), so all AST nodes borrow from the compiler and live until
/// it is dropped.
///
/// # Example
///
/// ```
/// use dynamo_core::compiler::Compiler;
/// use dynamo_core::specs::{DriverEntry, SpecsFile};
///
/// let specs = SpecsFile::from_entries([(
///     "blink".to_string(),
///     DriverEntry { source: "driver Blink { }".to_string(), ..Default::default() },
/// )]);
/// let compiler = Compiler::new(specs);
/// let nodes = compiler.compile_to_nodes().unwrap();
/// assert_eq!(nodes.len(), 1);
/// ```
pub struct Compiler {
    specs: SpecsFile,
}

impl Compiler {
    /// Create a compiler for the given specification.
    pub fn new(specs: SpecsFile) -> Self {
        Self { specs }
    }

    /// Compile every driver in the specification and feed the collected
    /// nodes to `visitor` in compilation order.
    pub fn compile(&self, visitor: &mut dyn Visitor) -> DynamoResult<()> {
        let nodes = self.compile_to_nodes()?;
        for node in &nodes {
            node.accept(visitor);
        }
        Ok(())
    }

    /// Compile every driver in the specification and return the flat node
    /// list.
    pub fn compile_to_nodes(&self) -> DynamoResult<Vec<Node<'_>>> {
        let mut state = CompileState {
            compiled: BTreeSet::new(),
            in_progress: BTreeSet::new(),
            symbols: SymbolTable::new(),
            nodes: Vec::new(),
        };

        for name in self.specs.drivers().keys() {
            self.process_driver(name, &mut state)?;
        }

        Ok(state.nodes)
    }

    /// Compile one driver: dependencies first (recursively), then the
    /// driver's own source.  Already-compiled drivers are skipped.
    fn process_driver<'src>(
        &'src self,
        name: &str,
        state: &mut CompileState<'src>,
    ) -> DynamoResult<()> {
        if state.compiled.contains(name) {
            return Ok(());
        }

        let Some(entry) = self.specs.drivers().get(name) else {
            return Err(DynamoError::MissingDependency(name.to_string()));
        };

        if !state.in_progress.insert(name.to_string()) {
            return Err(DynamoError::DependencyCycle(name.to_string()));
        }

        for dependency in &entry.depends {
            self.process_driver(dependency, state)?;
        }

        debug!("compiling driver \"{name}\"");
        self.compile_unit(entry, state)?;

        state.in_progress.remove(name);
        state.compiled.insert(name.to_string());
        Ok(())
    }

    /// Lex and parse one driver's source.  The shared symbol table is
    /// handed to a fresh parser and reclaimed — updated — afterwards, so
    /// this unit sees every earlier driver and later units see this one.
    fn compile_unit<'src>(
        &'src self,
        entry: &'src DriverEntry,
        state: &mut CompileState<'src>,
    ) -> DynamoResult<()> {
        let mut tokens = Vec::new();
        for token in Lexer::new(&entry.source, &entry.config) {
            tokens.push(token?);
        }

        let mut parser = Parser::new(tokens, std::mem::take(&mut state.symbols));
        let mut result = Ok(());
        for node in parser.by_ref() {
            match node {
                Ok(node) => state.nodes.push(node),
                Err(error) => {
                    result = Err(error.into());
                    break;
                }
            }
        }
        state.symbols = parser.into_symbols();

        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
