//! Pretty-printer that renders the AST back into DSL-shaped text.

use crate::parser::ast::{
    BuiltinType, Driver, Function, NamedType, RawCodeBlock, Variable, Visitor,
};
use crate::parser::lexer::{Token, TokenKind};

const INDENT: &str = "    ";

/// Renders visited nodes into an internal buffer; retrieve it with
/// [`AstPrinter::output`] after the traversal.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use dynamo_core::parser::lexer;
/// use dynamo_core::parser::{Parser, SymbolTable};
/// use dynamo_core::visitors::AstPrinter;
///
/// let config = BTreeMap::new();
/// let tokens = lexer::tokenize("driver Empty { }", &config).unwrap();
/// let nodes: Vec<_> = Parser::new(tokens, SymbolTable::new())
///     .collect::<Result<_, _>>()
///     .unwrap();
///
/// let mut printer = AstPrinter::new();
/// for node in &nodes {
///     node.accept(&mut printer);
/// }
/// assert!(printer.output().starts_with("driver Empty {"));
/// ```
#[derive(Debug, Default)]
pub struct AstPrinter {
    out: String,
    indent: usize,
}

impl AstPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text rendered so far.
    pub fn output(&self) -> &str {
        &self.out
    }

    /// Consume the printer and return the rendered text.
    pub fn into_output(self) -> String {
        self.out
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    /// A template argument literal, re-quoted to match its token kind.
    fn write_template_argument(&mut self, value: &Token<'_>) {
        match value.kind {
            TokenKind::StringLiteral => {
                self.out.push('"');
                self.out.push_str(value.text);
                self.out.push('"');
            }
            TokenKind::CharacterLiteral => {
                self.out.push('\'');
                self.out.push_str(value.text);
                self.out.push('\'');
            }
            TokenKind::NumericLiteral => self.out.push_str(value.text),
            _ => {}
        }
    }
}

impl Visitor for AstPrinter {
    fn visit_driver(&mut self, node: &Driver<'_>) {
        self.write_indent();
        self.out.push_str("driver ");
        self.out.push_str(&node.name);

        if node.template_parameters.is_empty() {
            self.out.push(' ');
        } else {
            self.out.push('<');
            for (i, parameter) in node.template_parameters.iter().enumerate() {
                self.visit_variable(parameter);
                if i != node.template_parameters.len() - 1 {
                    self.out.push_str(", ");
                }
            }
            self.out.push_str("> ");
        }

        if let Some(base) = &node.inheritance {
            self.out.push_str(": ");
            self.out.push_str(&base.name);
            if base.template_arguments.is_empty() {
                self.out.push(' ');
            } else {
                self.out.push('<');
                for (i, value) in base.template_arguments.iter().enumerate() {
                    self.write_template_argument(value);
                    if i != base.template_arguments.len() - 1 {
                        self.out.push_str(", ");
                    }
                }
                self.out.push_str("> ");
            }
        }

        self.out.push_str("{\n\n");
        self.indent += 1;
        for function in &node.functions {
            self.visit_function(function);
        }
        self.indent -= 1;
        self.write_indent();
        self.out.push_str("}\n\n");
    }

    fn visit_function(&mut self, node: &Function<'_>) {
        self.write_indent();
        self.out.push_str("fn ");
        self.out.push_str(node.name);
        self.out.push('(');
        for (i, parameter) in node.parameters.iter().enumerate() {
            self.visit_variable(parameter);
            if i != node.parameters.len() - 1 {
                self.out.push_str(", ");
            }
        }
        self.out.push_str(") {\n");

        self.indent += 1;
        for statement in &node.body {
            statement.accept(self);
        }
        self.indent -= 1;
        self.write_indent();
        self.out.push_str("}\n\n");
    }

    fn visit_variable(&mut self, node: &Variable<'_>) {
        self.visit_named_type(&node.ty);
        self.out.push_str(node.name);
    }

    fn visit_builtin_type(&mut self, node: &BuiltinType) {
        self.out.push_str(&format!("(0x{:02X}) ", node.size));
    }

    fn visit_named_type(&mut self, node: &NamedType<'_>) {
        self.out.push_str(&node.name);
        self.out.push(' ');
        node.inner.accept(self);
    }

    fn visit_raw_code_block(&mut self, node: &RawCodeBlock<'_>) {
        self.write_indent();
        self.out.push_str(node.code);
        self.out.push('\n');
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
