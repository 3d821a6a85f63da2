//! AST model for the dynamo driver DSL.
//!
//! The node set is closed and small, so nodes are a tagged [`Node`] enum
//! rather than trait objects: [`Node::accept`] dispatches by `match`, and a
//! deep clone is a structural [`Clone`] (every owned child lives in a `Box`
//! or `Vec`).  Name and lexeme fields borrow from the compilation's source
//! buffers; the one exception is qualified driver names (`a::b::X`), which
//! are joined strings and therefore owned.

use super::lexer::Token;

// ─────────────────────────────────────────────────────────────────────────────
// Visitor
// ─────────────────────────────────────────────────────────────────────────────

/// A caller-provided sink for AST traversal, one operation per variant.
///
/// Visitors receive read-only references and drive recursion themselves,
/// either through [`Node::accept`] for enum-typed children or by calling
/// the matching `visit_*` operation directly for concretely-typed ones.
pub trait Visitor {
    fn visit_driver(&mut self, node: &Driver<'_>);
    fn visit_function(&mut self, node: &Function<'_>);
    fn visit_variable(&mut self, node: &Variable<'_>);
    fn visit_builtin_type(&mut self, node: &BuiltinType);
    fn visit_named_type(&mut self, node: &NamedType<'_>);
    fn visit_raw_code_block(&mut self, node: &RawCodeBlock<'_>);
}

// ─────────────────────────────────────────────────────────────────────────────
// Node
// ─────────────────────────────────────────────────────────────────────────────

/// Any AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<'src> {
    Driver(Driver<'src>),
    Function(Function<'src>),
    Variable(Variable<'src>),
    BuiltinType(BuiltinType),
    NamedType(NamedType<'src>),
    RawCodeBlock(RawCodeBlock<'src>),
}

impl<'src> Node<'src> {
    /// Dispatch to the visitor operation matching this node's variant.
    pub fn accept(&self, visitor: &mut dyn Visitor) {
        match self {
            Node::Driver(node) => visitor.visit_driver(node),
            Node::Function(node) => visitor.visit_function(node),
            Node::Variable(node) => visitor.visit_variable(node),
            Node::BuiltinType(node) => visitor.visit_builtin_type(node),
            Node::NamedType(node) => visitor.visit_named_type(node),
            Node::RawCodeBlock(node) => visitor.visit_raw_code_block(node),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builtin types
// ─────────────────────────────────────────────────────────────────────────────

/// The numeric category of a builtin type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCategory {
    Unsigned,
    Signed,
    FloatingPoint,
    Boolean,
}

/// A builtin type: category plus size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinType {
    pub category: BuiltinCategory,
    /// Size in bytes; `0` for the unsized builtins (`string`, `bytes`,
    /// `void`).
    pub size: usize,
}

impl BuiltinType {
    /// Decode a builtin type name from the lexer's builtin table.
    ///
    /// The table is the only source of these names, so an unrecognised
    /// shape is a programmer error and aborts the process.
    pub fn decode(name: &str) -> Self {
        let category = match name {
            "bool" => BuiltinCategory::Boolean,
            "char" | "string" | "bytes" | "void" => BuiltinCategory::Unsigned,
            _ if name.starts_with('u') => BuiltinCategory::Unsigned,
            _ if name.starts_with('i') => BuiltinCategory::Signed,
            _ if name.starts_with('f') => BuiltinCategory::FloatingPoint,
            _ => unreachable!("not a builtin type name: {name}"),
        };

        let size = match name {
            "bool" | "char" => 1,
            "string" | "bytes" | "void" => 0,
            _ if name.ends_with('8') => 1,
            _ if name.ends_with("16") => 2,
            _ if name.ends_with("32") => 4,
            _ if name.ends_with("64") => 8,
            _ => unreachable!("not a builtin type name: {name}"),
        };

        Self { category, size }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Types and variables
// ─────────────────────────────────────────────────────────────────────────────

/// A resolved type reference: the type's name plus the node it refers to —
/// a [`BuiltinType`], or a [`Driver`] clone for user-defined types.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedType<'src> {
    /// Resolved type name; qualified for user-defined types.
    pub name: String,
    /// The referenced type node.
    pub inner: Box<Node<'src>>,
}

/// A named, typed binding — a function parameter or template parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable<'src> {
    pub name: &'src str,
    pub ty: NamedType<'src>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Functions and drivers
// ─────────────────────────────────────────────────────────────────────────────

/// A driver function: name, ordered parameters, ordered body statements.
///
/// The body holds arbitrary nodes for future extension, but the grammar
/// only ever produces [`RawCodeBlock`] statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Function<'src> {
    pub name: &'src str,
    pub parameters: Vec<Variable<'src>>,
    pub body: Vec<Node<'src>>,
}

/// A driver definition.
///
/// The inheritance link owns a deep clone of the referenced driver, so
/// binding template arguments on an inheritor never mutates the master
/// definition in the symbol table.  When `template_arguments` is populated
/// by instantiation it has the same length as `template_parameters`.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver<'src> {
    /// Qualified name (`net::i2c`).
    pub name: String,
    pub inheritance: Option<Box<Driver<'src>>>,
    pub template_parameters: Vec<Variable<'src>>,
    /// Literal tokens bound at a use site; empty on master definitions.
    pub template_arguments: Vec<Token<'src>>,
    pub functions: Vec<Function<'src>>,
}

/// Opaque target-language text copied verbatim into emitter output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCodeBlock<'src> {
    pub code: &'src str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
