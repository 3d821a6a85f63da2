//! Parser for the dynamo driver DSL.
//!
//! The parser is a pull iterator over a token buffer: each call to
//! [`Iterator::next`] yields one top-level AST node or the error that ended
//! the stream.  It is constructed with an initial symbol table (possibly
//! carrying drivers from earlier compilation units) and exposes the updated
//! table through [`Parser::into_symbols`] once the stream ends, so the
//! compilation driver can thread it into the next unit's parser.
//!
//! User-defined type names are resolved against the symbol table as they
//! are encountered; a templated driver reference is instantiated on the
//! spot by deep-cloning the master definition and binding the argument
//! literals to the clone.

use std::collections::BTreeMap;

use log::debug;
use smallvec::SmallVec;
use thiserror::Error;

use super::ast::{self, Node};
use super::lexer::{template, Token, TokenKind};

// ─────────────────────────────────────────────────────────────────────────────
// Public types
// ─────────────────────────────────────────────────────────────────────────────

/// Mapping from qualified driver name (`net::i2c`) to the master driver
/// definition produced on first parse.  Later compilation units see every
/// driver registered by earlier ones.
pub type SymbolTable<'src> = BTreeMap<String, ast::Driver<'src>>;

/// All errors the parser can yield.  The first error ends the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A token did not match any grammar alternative at this position.
    #[error("unexpected token")]
    UnexpectedToken,

    /// The token stream ended while more tokens were expected.
    #[error("end of input")]
    EndOfInput,

    /// A user-defined type name is not in the symbol table.
    #[error("unknown type")]
    UnknownType,

    /// A template instantiation bound the wrong number of arguments.
    #[error("invalid template parameter count")]
    InvalidTemplateParameterCount,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

/// Pull parser for one compilation unit.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use dynamo_core::parser::lexer;
/// use dynamo_core::parser::{Parser, SymbolTable};
///
/// let config = BTreeMap::new();
/// let tokens = lexer::tokenize("driver Empty { }", &config).unwrap();
/// let mut parser = Parser::new(tokens, SymbolTable::new());
/// let nodes: Result<Vec<_>, _> = parser.by_ref().collect();
/// assert_eq!(nodes.unwrap().len(), 1);
/// assert!(parser.into_symbols().contains_key("Empty"));
/// ```
pub struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
    symbols: SymbolTable<'src>,
    /// Enclosing namespace names, outermost first.  Pushed when a
    /// `namespace X {` header is consumed, popped on the matching `}` —
    /// both happen inside a single `next` call, so an error can never
    /// leave the stack unbalanced across yields.
    namespaces: SmallVec<[&'src str; 4]>,
    /// Set after the first error; the iterator is fused.
    failed: bool,
}

impl<'src> Parser<'src> {
    /// Create a parser over `tokens`, seeded with `symbols`.
    ///
    /// Comment tokens are discarded on intake; the grammar never refers to
    /// them.
    pub fn new(tokens: Vec<Token<'src>>, symbols: SymbolTable<'src>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .filter(|t| t.kind != TokenKind::Comment)
                .collect(),
            pos: 0,
            symbols,
            namespaces: SmallVec::new(),
            failed: false,
        }
    }

    /// Consume the parser and return the updated symbol table.
    pub fn into_symbols(self) -> SymbolTable<'src> {
        self.symbols
    }

    /// The symbol table in its current state.
    pub fn symbols(&self) -> &SymbolTable<'src> {
        &self.symbols
    }

    // ── Token cursor ────────────────────────────────────────────────────────

    /// Returns `true` when the cursor is past the last token or on the
    /// end-of-input sentinel.
    fn at_end(&self) -> bool {
        match self.tokens.get(self.pos) {
            Some(token) => token.kind == TokenKind::EndOfInput,
            None => true,
        }
    }

    /// Attempt to consume the exact sequence of token templates starting
    /// at the cursor.  A template with an empty lexeme matches any lexeme
    /// of the right kind.  On full match the cursor advances past the
    /// sequence; on any mismatch nothing is consumed.
    fn match_sequence(&mut self, templates: &[Token<'static>]) -> bool {
        let mut cursor = self.pos;
        for template in templates {
            match self.tokens.get(cursor) {
                Some(token) if token.matches(template) => cursor += 1,
                _ => return false,
            }
        }
        self.pos = cursor;
        true
    }

    /// Consume the current token if it is a literal (numeric, string, or
    /// character).
    fn match_literal(&mut self) -> Option<Token<'src>> {
        let token = *self.tokens.get(self.pos)?;
        match token.kind {
            TokenKind::NumericLiteral | TokenKind::StringLiteral | TokenKind::CharacterLiteral => {
                self.pos += 1;
                Some(token)
            }
            _ => None,
        }
    }

    /// The lexeme of the token `offset` positions behind the cursor.
    fn lexeme(&self, offset: usize) -> &'src str {
        self.tokens[self.pos - offset].text
    }

    /// The error for a failed expectation at the cursor: [`ParseError::EndOfInput`]
    /// when the stream ran out, [`ParseError::UnexpectedToken`] otherwise.
    fn unexpected(&self) -> ParseError {
        if self.at_end() {
            ParseError::EndOfInput
        } else {
            ParseError::UnexpectedToken
        }
    }

    // ── Name qualification ──────────────────────────────────────────────────

    /// Qualify `name` with the current namespace stack (`a::b::name`).
    fn qualified_name(&self, name: &str) -> String {
        if self.namespaces.is_empty() {
            name.to_string()
        } else {
            let mut qualified = self.namespaces.join("::");
            qualified.push_str("::");
            qualified.push_str(name);
            qualified
        }
    }

    /// Resolve a user type name: first verbatim, then prefixed with the
    /// current namespace.  Returns a deep clone of the master definition.
    fn resolve_driver(&self, path: &str) -> Result<ast::Driver<'src>, ParseError> {
        if let Some(driver) = self.symbols.get(path) {
            return Ok(driver.clone());
        }
        if !self.namespaces.is_empty() {
            if let Some(driver) = self.symbols.get(&self.qualified_name(path)) {
                return Ok(driver.clone());
            }
        }
        Err(ParseError::UnknownType)
    }

    // ── Grammar productions ─────────────────────────────────────────────────

    /// Parse a driver definition.  The `driver Identifier` prefix has
    /// already been consumed.
    fn parse_driver(&mut self) -> Result<ast::Driver<'src>, ParseError> {
        let name = self.qualified_name(self.lexeme(1));

        let mut template_parameters = Vec::new();
        if self.match_sequence(&[template::LESS]) {
            template_parameters = self.parse_parameter_list(&template::GREATER)?;
        }

        let mut inheritance = None;
        if self.match_sequence(&[template::COLON]) {
            let ty = self.parse_type(false)?;
            let Node::Driver(base) = *ty.inner else {
                unreachable!("a type reference that excludes builtins always wraps a driver");
            };
            inheritance = Some(Box::new(base));
        }

        if !self.match_sequence(&[template::OPEN_BRACE]) {
            return Err(self.unexpected());
        }

        let mut functions = Vec::new();
        while !self.match_sequence(&[template::CLOSE_BRACE]) {
            if self.match_sequence(&[
                template::KEYWORD_FN,
                template::IDENTIFIER,
                template::OPEN_PAREN,
            ]) {
                functions.push(self.parse_function()?);
            } else {
                return Err(self.unexpected());
            }
        }

        let driver = ast::Driver {
            name: name.clone(),
            inheritance,
            template_parameters,
            template_arguments: Vec::new(),
            functions,
        };

        debug!("registered driver {name}");
        self.symbols.insert(name, driver.clone());

        Ok(driver)
    }

    /// Parse a function.  The `fn Identifier (` prefix has already been
    /// consumed.
    fn parse_function(&mut self) -> Result<ast::Function<'src>, ParseError> {
        let name = self.lexeme(2);

        let parameters = self.parse_parameter_list(&template::CLOSE_PAREN)?;

        if !self.match_sequence(&[template::OPEN_BRACE]) {
            return Err(self.unexpected());
        }

        // The body admits only raw code blocks on the current language
        // surface; anything else is rejected.
        let mut body = Vec::new();
        while !self.match_sequence(&[template::CLOSE_BRACE]) {
            if self.match_sequence(&[template::RAW_CODE_BLOCK]) {
                body.push(Node::RawCodeBlock(ast::RawCodeBlock {
                    code: self.lexeme(1).trim(),
                }));
            } else {
                return Err(self.unexpected());
            }
        }

        Ok(ast::Function {
            name,
            parameters,
            body,
        })
    }

    /// Parse a comma-separated `type name` list up to the closing token
    /// (`)` for function parameters, `>` for template parameters).  The
    /// opening token has already been consumed.
    fn parse_parameter_list(
        &mut self,
        close: &'static Token<'static>,
    ) -> Result<Vec<ast::Variable<'src>>, ParseError> {
        let mut parameters = Vec::new();
        while !self.match_sequence(std::slice::from_ref(close)) {
            let ty = self.parse_type(true)?;

            if !self.match_sequence(&[template::IDENTIFIER]) {
                return Err(self.unexpected());
            }
            let name = self.lexeme(1);
            parameters.push(ast::Variable { name, ty });

            if self.match_sequence(&[template::COMMA]) {
                continue;
            }
            if self.match_sequence(std::slice::from_ref(close)) {
                break;
            }
            return Err(self.unexpected());
        }
        Ok(parameters)
    }

    /// Parse a type reference: a builtin type name (when allowed — the
    /// inheritance position excludes them), or a possibly-qualified user
    /// type with optional template arguments.
    ///
    /// A user type resolves to a deep clone of the master driver; when
    /// `< literal, … >` follows, the argument literals are bound to the
    /// clone after an arity check.  The master in the symbol table is
    /// never touched.
    fn parse_type(&mut self, allow_builtin: bool) -> Result<ast::NamedType<'src>, ParseError> {
        if allow_builtin && self.match_sequence(&[template::BUILTIN_TYPE]) {
            let name = self.lexeme(1);
            return Ok(ast::NamedType {
                name: name.to_string(),
                inner: Box::new(Node::BuiltinType(ast::BuiltinType::decode(name))),
            });
        }

        if self.match_sequence(&[template::IDENTIFIER]) {
            let mut path = self.lexeme(1).to_string();
            while self.match_sequence(&[template::COLON, template::COLON, template::IDENTIFIER]) {
                path.push_str("::");
                path.push_str(self.lexeme(1));
            }

            let mut driver = self.resolve_driver(&path)?;

            if self.match_sequence(&[template::LESS]) {
                let arguments = self.parse_template_arguments()?;
                if arguments.len() != driver.template_parameters.len() {
                    return Err(ParseError::InvalidTemplateParameterCount);
                }
                driver.template_arguments = arguments;
            }

            let name = driver.name.clone();
            return Ok(ast::NamedType {
                name,
                inner: Box::new(Node::Driver(driver)),
            });
        }

        Err(self.unexpected())
    }

    /// Parse the literals of a template argument list.  The opening `<`
    /// has already been consumed.
    fn parse_template_arguments(&mut self) -> Result<Vec<Token<'src>>, ParseError> {
        let mut arguments = Vec::new();
        loop {
            let Some(literal) = self.match_literal() else {
                return Err(self.unexpected());
            };
            arguments.push(literal);

            if self.match_sequence(&[template::COMMA]) {
                continue;
            }
            if self.match_sequence(&[template::GREATER]) {
                break;
            }
            return Err(self.unexpected());
        }
        Ok(arguments)
    }
}

impl<'src> Iterator for Parser<'src> {
    type Item = Result<Node<'src>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if self.at_end() {
                if !self.namespaces.is_empty() {
                    // Source ended inside an open `namespace { … }`.
                    self.failed = true;
                    return Some(Err(ParseError::EndOfInput));
                }
                return None;
            }

            // `namespace X {` opens a scope; a bare `}` closes the innermost
            // one.  Neither yields a node of its own.
            if self.match_sequence(&[
                template::KEYWORD_NAMESPACE,
                template::IDENTIFIER,
                template::OPEN_BRACE,
            ]) {
                let name = self.lexeme(2);
                self.namespaces.push(name);
                continue;
            }
            if !self.namespaces.is_empty() && self.match_sequence(&[template::CLOSE_BRACE]) {
                self.namespaces.pop();
                continue;
            }

            if self.match_sequence(&[template::KEYWORD_DRIVER, template::IDENTIFIER]) {
                let result = self.parse_driver();
                if result.is_err() {
                    self.failed = true;
                }
                return Some(result.map(Node::Driver));
            }

            self.failed = true;
            return Some(Err(ParseError::UnexpectedToken));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{BuiltinCategory, BuiltinType};
    use crate::parser::lexer;

    /// Lex and parse one unit, returning every yielded item plus the
    /// updated symbol table.
    fn parse_unit<'a>(
        source: &'a str,
        config: &'a BTreeMap<String, String>,
        symbols: SymbolTable<'a>,
    ) -> (Vec<Result<Node<'a>, ParseError>>, SymbolTable<'a>) {
        let tokens = lexer::tokenize(source, config).expect("lexing must succeed");
        let mut parser = Parser::new(tokens, symbols);
        let items: Vec<_> = parser.by_ref().collect();
        (items, parser.into_symbols())
    }

    fn parse_ok<'a>(
        source: &'a str,
        config: &'a BTreeMap<String, String>,
    ) -> (Vec<Node<'a>>, SymbolTable<'a>) {
        let (items, symbols) = parse_unit(source, config, SymbolTable::new());
        let nodes = items
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .expect("parsing must succeed");
        (nodes, symbols)
    }

    fn first_error(source: &str) -> ParseError {
        let config = BTreeMap::new();
        let (items, _) = parse_unit(source, &config, SymbolTable::new());
        items
            .into_iter()
            .find_map(Result::err)
            .expect("expected a parse error")
    }

    fn as_driver<'a, 'src>(node: &'a Node<'src>) -> &'a ast::Driver<'src> {
        match node {
            Node::Driver(driver) => driver,
            other => panic!("expected a driver node, got {other:?}"),
        }
    }

    // ── Empty driver ──────────────────────────────────────────────────────

    #[test]
    fn parse_empty_driver() {
        let config = BTreeMap::new();
        let (nodes, symbols) = parse_ok("driver Empty { }", &config);

        assert_eq!(nodes.len(), 1);
        let driver = as_driver(&nodes[0]);
        assert_eq!(driver.name, "Empty");
        assert!(driver.inheritance.is_none());
        assert!(driver.template_parameters.is_empty());
        assert!(driver.functions.is_empty());
        assert!(symbols.contains_key("Empty"));
    }

    // ── Functions ─────────────────────────────────────────────────────────

    #[test]
    fn parse_function_with_parameter_and_body() {
        let config = BTreeMap::new();
        let (nodes, _) = parse_ok("driver D { fn f(u32 x) { [[ code; ]] } }", &config);

        let driver = as_driver(&nodes[0]);
        assert_eq!(driver.functions.len(), 1);
        let function = &driver.functions[0];
        assert_eq!(function.name, "f");

        assert_eq!(function.parameters.len(), 1);
        let parameter = &function.parameters[0];
        assert_eq!(parameter.name, "x");
        assert_eq!(parameter.ty.name, "u32");
        assert_eq!(
            *parameter.ty.inner,
            Node::BuiltinType(BuiltinType {
                category: BuiltinCategory::Unsigned,
                size: 4,
            })
        );

        assert_eq!(function.body.len(), 1);
        match &function.body[0] {
            Node::RawCodeBlock(block) => assert_eq!(block.code, "code;"),
            other => panic!("expected a raw code block, got {other:?}"),
        }
    }

    #[test]
    fn parse_function_with_multiple_parameters() {
        let config = BTreeMap::new();
        let (nodes, _) = parse_ok("driver D { fn f(u8 a, i16 b, bool c) { } }", &config);
        let function = &as_driver(&nodes[0]).functions[0];
        let names: Vec<_> = function.parameters.iter().map(|p| p.name).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn parse_rejects_non_raw_block_body() {
        assert_eq!(
            first_error("driver D { fn f() { driver } }"),
            ParseError::UnexpectedToken
        );
    }

    // ── Templates ─────────────────────────────────────────────────────────

    #[test]
    fn parse_template_parameters_on_master() {
        let config = BTreeMap::new();
        let (nodes, symbols) = parse_ok("driver I2C<u8 Address> { }", &config);

        let driver = as_driver(&nodes[0]);
        assert_eq!(driver.template_parameters.len(), 1);
        assert_eq!(driver.template_parameters[0].name, "Address");
        assert!(driver.template_arguments.is_empty());
        assert!(symbols.contains_key("I2C"));
    }

    #[test]
    fn parse_inheritance_binds_template_arguments() {
        let config = BTreeMap::new();
        let (nodes, symbols) =
            parse_ok("driver I2C<u8 Address> { } driver Dev : I2C<0x42> { }", &config);

        assert_eq!(nodes.len(), 2);
        let dev = as_driver(&nodes[1]);
        let base = dev.inheritance.as_ref().expect("Dev must inherit");
        assert_eq!(base.name, "I2C");
        assert_eq!(base.template_arguments.len(), 1);
        assert_eq!(base.template_arguments[0].kind, TokenKind::NumericLiteral);
        assert_eq!(base.template_arguments[0].text, "0x42");

        // The master definition in the symbol table is untouched.
        assert!(symbols["I2C"].template_arguments.is_empty());
    }

    #[test]
    fn parse_template_argument_count_mismatch() {
        assert_eq!(
            first_error("driver I2C<u8 Address> { } driver D : I2C<0x1, 0x2> { }"),
            ParseError::InvalidTemplateParameterCount
        );
    }

    #[test]
    fn parse_template_arguments_accept_all_literal_kinds() {
        let config = BTreeMap::new();
        let source = r#"driver M<u8 a, string b, char c> { } driver D : M<1, "two", 'c'> { }"#;
        let (nodes, _) = parse_ok(source, &config);
        let base = as_driver(&nodes[1]).inheritance.as_ref().unwrap();
        let kinds: Vec<_> = base.template_arguments.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [
                TokenKind::NumericLiteral,
                TokenKind::StringLiteral,
                TokenKind::CharacterLiteral,
            ]
        );
    }

    #[test]
    fn parse_type_reference_without_arguments_keeps_empty_argument_list() {
        let config = BTreeMap::new();
        let (nodes, _) = parse_ok("driver Base { } driver D : Base { }", &config);
        let base = as_driver(&nodes[1]).inheritance.as_ref().unwrap();
        assert!(base.template_arguments.is_empty());
    }

    #[test]
    fn parse_templated_parameter_type() {
        let config = BTreeMap::new();
        let (nodes, _) = parse_ok(
            "driver Bus<u8 Speed> { } driver D { fn f(Bus<0x10> b) { } }",
            &config,
        );
        let parameter = &as_driver(&nodes[1]).functions[0].parameters[0];
        assert_eq!(parameter.ty.name, "Bus");
        match parameter.ty.inner.as_ref() {
            Node::Driver(bus) => {
                assert_eq!(bus.template_arguments.len(), 1);
                assert_eq!(bus.template_arguments[0].text, "0x10");
            }
            other => panic!("expected a driver type, got {other:?}"),
        }
    }

    // ── Inheritance rules ─────────────────────────────────────────────────

    #[test]
    fn parse_inheritance_of_unknown_type() {
        assert_eq!(
            first_error("driver D : NotDeclared { }"),
            ParseError::UnknownType
        );
    }

    #[test]
    fn parse_inheritance_disallows_builtin_types() {
        assert_eq!(first_error("driver D : u8 { }"), ParseError::UnexpectedToken);
    }

    // ── Namespaces ────────────────────────────────────────────────────────

    #[test]
    fn parse_namespace_qualifies_driver_names() {
        let config = BTreeMap::new();
        let (nodes, symbols) = parse_ok("namespace hw { driver I2C { } }", &config);
        assert_eq!(as_driver(&nodes[0]).name, "hw::I2C");
        assert!(symbols.contains_key("hw::I2C"));
    }

    #[test]
    fn parse_nested_namespaces() {
        let config = BTreeMap::new();
        let (_, symbols) = parse_ok("namespace a { namespace b { driver X { } } }", &config);
        assert!(symbols.contains_key("a::b::X"));
    }

    #[test]
    fn parse_resolves_bare_name_in_same_namespace() {
        let config = BTreeMap::new();
        let (nodes, _) = parse_ok("namespace hw { driver A { } driver B : A { } }", &config);
        let base = as_driver(&nodes[1]).inheritance.as_ref().unwrap();
        assert_eq!(base.name, "hw::A");
    }

    #[test]
    fn parse_resolves_qualified_name_across_namespaces() {
        let config = BTreeMap::new();
        let (nodes, _) = parse_ok(
            "namespace hw { driver A { } } driver B : hw::A { }",
            &config,
        );
        let base = as_driver(&nodes[1]).inheritance.as_ref().unwrap();
        assert_eq!(base.name, "hw::A");
    }

    #[test]
    fn parse_unclosed_namespace_is_premature_end() {
        assert_eq!(
            first_error("namespace hw { driver A { }"),
            ParseError::EndOfInput
        );
    }

    // ── Error handling ────────────────────────────────────────────────────

    #[test]
    fn parse_struct_keyword_is_rejected() {
        // `struct` is lexed as a keyword but no grammar rule accepts it.
        assert_eq!(first_error("struct S { }"), ParseError::UnexpectedToken);
    }

    #[test]
    fn parse_stray_close_brace_at_top_level() {
        assert_eq!(first_error("}"), ParseError::UnexpectedToken);
    }

    #[test]
    fn parse_truncated_driver_is_premature_end() {
        assert_eq!(first_error("driver D {"), ParseError::EndOfInput);
    }

    #[test]
    fn parser_fuses_after_error() {
        let config = BTreeMap::new();
        let tokens = lexer::tokenize("driver D : Missing { } driver E { }", &config).unwrap();
        let mut parser = Parser::new(tokens, SymbolTable::new());
        assert_eq!(parser.next(), Some(Err(ParseError::UnknownType)));
        assert_eq!(parser.next(), None);
    }

    #[test]
    fn parse_comments_are_skipped() {
        let config = BTreeMap::new();
        let (nodes, _) = parse_ok(
            "// header\ndriver D { /* inner */ fn f() { [[x;]] } }",
            &config,
        );
        assert_eq!(as_driver(&nodes[0]).functions.len(), 1);
    }

    // ── Symbol table threading ────────────────────────────────────────────

    #[test]
    fn parse_symbols_thread_across_units() {
        let config = BTreeMap::new();

        let (_, symbols) = parse_ok("driver Base<u8 A> { }", &config);

        // A second unit, parsed with the first unit's table, can reference
        // `Base` by name.
        let tokens = lexer::tokenize("driver Dev : Base<0x01> { }", &config).unwrap();
        let mut parser = Parser::new(tokens, symbols);
        let nodes: Result<Vec<_>, _> = parser.by_ref().collect();
        let nodes = nodes.unwrap();

        let base = as_driver(&nodes[0]).inheritance.as_ref().unwrap();
        assert_eq!(base.name, "Base");
        assert_eq!(base.template_arguments[0].text, "0x01");

        let symbols = parser.into_symbols();
        assert!(symbols.contains_key("Base"));
        assert!(symbols.contains_key("Dev"));
    }
}
