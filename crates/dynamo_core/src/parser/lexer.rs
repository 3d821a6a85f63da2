//! Lexer for the dynamo driver DSL.
//!
//! See [`Lexer`] for the main entry point.  The lexer is a pull iterator:
//! each call to [`Iterator::next`] consumes one token from an advancing
//! window over the source text.  Placeholder tokens (`{% name %}`) are
//! expanded in place by re-lexing the configured replacement text, so the
//! consumer never observes them.

use std::collections::BTreeMap;

use log::trace;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Token model
// ─────────────────────────────────────────────────────────────────────────────

/// The syntactic category of a DSL token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An identifier that is not a keyword or builtin type name.
    Identifier,
    /// `driver`, `fn`, `namespace`, or `struct`.
    Keyword,
    /// One of the builtin type names (`u8` … `void`).
    BuiltinType,
    /// `<`, `>`, `:`, or `->`.
    Operator,
    /// `{% name %}` — replaced at lex time by configuration text.
    Placeholder,
    /// String literal enclosed in `"`.
    StringLiteral,
    /// Character literal enclosed in `'`.
    CharacterLiteral,
    /// Hex (`0x…`), binary (`0b…`), octal (`0o…`), or decimal literal.
    NumericLiteral,
    /// Opaque target-language text enclosed in `[[ … ]]`.
    RawCodeBlock,
    /// `{`, `}`, `(`, `)`, `[`, `]`, `;`, or `,`.
    Separator,
    /// `// …` or `/* … */`, delimiters included in the lexeme.
    Comment,
    /// End of input.  Never yielded by the lexer iterator; used by the
    /// parser as its stream terminator sentinel.
    EndOfInput,
}

/// A single lexical token.
///
/// The lexeme is a borrowed view into the source window the token was
/// scanned from — either the driver's source buffer or one of the
/// placeholder replacement strings.  Both outlive the compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    /// The syntactic category.
    pub kind: TokenKind,
    /// The lexeme text.
    pub text: &'src str,
}

impl<'src> Token<'src> {
    /// Create a new token.
    pub const fn new(kind: TokenKind, text: &'src str) -> Self {
        Self { kind, text }
    }

    /// Returns `true` when this token matches `template`.
    ///
    /// The kind must be equal; the lexeme must be equal unless the template
    /// carries an empty lexeme, which acts as a wildcard.
    pub fn matches(&self, template: &Token<'_>) -> bool {
        self.kind == template.kind && (template.text.is_empty() || self.text == template.text)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token templates
// ─────────────────────────────────────────────────────────────────────────────

/// Wildcard and literal token templates for [`Token::matches`].
pub mod template {
    use super::{Token, TokenKind};

    pub const KEYWORD_DRIVER: Token<'static> = Token::new(TokenKind::Keyword, "driver");
    pub const KEYWORD_FN: Token<'static> = Token::new(TokenKind::Keyword, "fn");
    pub const KEYWORD_NAMESPACE: Token<'static> = Token::new(TokenKind::Keyword, "namespace");

    pub const IDENTIFIER: Token<'static> = Token::new(TokenKind::Identifier, "");
    pub const BUILTIN_TYPE: Token<'static> = Token::new(TokenKind::BuiltinType, "");
    pub const RAW_CODE_BLOCK: Token<'static> = Token::new(TokenKind::RawCodeBlock, "");
    pub const NUMERIC_LITERAL: Token<'static> = Token::new(TokenKind::NumericLiteral, "");
    pub const STRING_LITERAL: Token<'static> = Token::new(TokenKind::StringLiteral, "");
    pub const CHARACTER_LITERAL: Token<'static> = Token::new(TokenKind::CharacterLiteral, "");

    pub const OPEN_BRACE: Token<'static> = Token::new(TokenKind::Separator, "{");
    pub const CLOSE_BRACE: Token<'static> = Token::new(TokenKind::Separator, "}");
    pub const OPEN_PAREN: Token<'static> = Token::new(TokenKind::Separator, "(");
    pub const CLOSE_PAREN: Token<'static> = Token::new(TokenKind::Separator, ")");
    pub const COMMA: Token<'static> = Token::new(TokenKind::Separator, ",");

    pub const COLON: Token<'static> = Token::new(TokenKind::Operator, ":");
    pub const LESS: Token<'static> = Token::new(TokenKind::Operator, "<");
    pub const GREATER: Token<'static> = Token::new(TokenKind::Operator, ">");
}

// ─────────────────────────────────────────────────────────────────────────────
// LexError
// ─────────────────────────────────────────────────────────────────────────────

/// All errors the lexer can yield.  The first error ends the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LexError {
    /// A string-like literal ran to the end of the source.
    #[error("unterminated string literal")]
    UnterminatedStringLiteral,

    /// `/* …` without a closing `*/`.
    #[error("unterminated comment")]
    UnterminatedComment,

    /// Reserved for future use.
    #[error("invalid character")]
    InvalidCharacter,

    /// Reserved for future use.
    #[error("invalid numeric literal")]
    InvalidNumericLiteral,

    /// No lexer rule matched the input.
    #[error("unknown token")]
    UnknownToken,

    /// A placeholder name is not in the environment, or its expansion
    /// re-enters a placeholder that is still being expanded.
    #[error("unknown placeholder")]
    UnknownPlaceholder,
}

// ─────────────────────────────────────────────────────────────────────────────
// Rule tables
// ─────────────────────────────────────────────────────────────────────────────

const KEYWORDS: [&str; 4] = ["driver", "fn", "namespace", "struct"];

const BUILTIN_TYPES: [&str; 15] = [
    "u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64", "f32", "f64", "bool", "char", "string",
    "bytes", "void",
];

/// `(begin, end, kind)` for every delimited token shape.  `[[` and `{%`
/// must be tried before the `[` and `{` separators; the rule order below
/// guarantees that.
const DELIMITED: [(&str, &str, TokenKind); 4] = [
    ("\"", "\"", TokenKind::StringLiteral),
    ("'", "'", TokenKind::CharacterLiteral),
    ("[[", "]]", TokenKind::RawCodeBlock),
    ("{%", "%}", TokenKind::Placeholder),
];

const SEPARATORS: [char; 8] = ['{', '}', '(', ')', '[', ']', ';', ','];

/// Multi-character operators first so `->` is not consumed as `-`.
const OPERATORS: [&str; 4] = ["->", "<", ">", ":"];

/// Returns `true` when the word ending at byte `len` is not immediately
/// followed by an alphanumeric character, so keywords and builtin type
/// names never swallow the head of an identifier.
fn word_boundary(rest: &str, len: usize) -> bool {
    match rest[len..].chars().next() {
        Some(c) => !c.is_ascii_alphanumeric(),
        None => true,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Single-token scanner
// ─────────────────────────────────────────────────────────────────────────────

/// Scan one token from the front of `rest` and return it together with the
/// number of bytes consumed.  `rest` must be non-empty with no leading
/// whitespace.  Rules are tried in fixed priority order; the first match
/// wins.
fn scan_token(rest: &str) -> Result<(Token<'_>, usize), LexError> {
    // ── Comments ─────────────────────────────────────────────────────────
    if rest.starts_with("//") {
        let len = rest.find('\n').unwrap_or(rest.len());
        return Ok((Token::new(TokenKind::Comment, &rest[..len]), len));
    }
    if rest.starts_with("/*") {
        match rest[2..].find("*/") {
            Some(i) => {
                let len = 2 + i + 2;
                return Ok((Token::new(TokenKind::Comment, &rest[..len]), len));
            }
            None => return Err(LexError::UnterminatedComment),
        }
    }

    // ── Keywords ─────────────────────────────────────────────────────────
    for keyword in KEYWORDS {
        if rest.starts_with(keyword) && word_boundary(rest, keyword.len()) {
            return Ok((Token::new(TokenKind::Keyword, &rest[..keyword.len()]), keyword.len()));
        }
    }

    // ── Builtin types ────────────────────────────────────────────────────
    for name in BUILTIN_TYPES {
        if rest.starts_with(name) && word_boundary(rest, name.len()) {
            return Ok((Token::new(TokenKind::BuiltinType, &rest[..name.len()]), name.len()));
        }
    }

    // ── Delimited tokens (strings, chars, raw code, placeholders) ────────
    for (begin, end, kind) in DELIMITED {
        if rest.starts_with(begin) {
            return match rest[begin.len()..].find(end) {
                Some(i) => {
                    let content = &rest[begin.len()..begin.len() + i];
                    Ok((Token::new(kind, content), begin.len() + i + end.len()))
                }
                None => Err(LexError::UnterminatedStringLiteral),
            };
        }
    }

    // ── Numeric literals ─────────────────────────────────────────────────
    if let Some(result) = scan_numeric(rest) {
        return Ok(result);
    }

    // ── Separators ───────────────────────────────────────────────────────
    let first = rest.chars().next().expect("scan_token called on empty input");
    if SEPARATORS.contains(&first) {
        let len = first.len_utf8();
        return Ok((Token::new(TokenKind::Separator, &rest[..len]), len));
    }

    // ── Operators ────────────────────────────────────────────────────────
    for op in OPERATORS {
        if rest.starts_with(op) {
            return Ok((Token::new(TokenKind::Operator, &rest[..op.len()]), op.len()));
        }
    }

    // ── Identifiers ──────────────────────────────────────────────────────
    if first.is_ascii_alphabetic() {
        let len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        return Ok((Token::new(TokenKind::Identifier, &rest[..len]), len));
    }

    Err(LexError::UnknownToken)
}

/// Scan a numeric literal: `0x` hex, `0b` binary, `0o` octal, otherwise
/// decimal.  The lexeme includes the prefix.
fn scan_numeric(rest: &str) -> Option<(Token<'_>, usize)> {
    let digits = |pred: fn(char) -> bool| {
        let len = 2 + rest[2..].find(|c: char| !pred(c)).unwrap_or(rest.len() - 2);
        Some((Token::new(TokenKind::NumericLiteral, &rest[..len]), len))
    };

    if rest.starts_with("0x") {
        return digits(|c| c.is_ascii_hexdigit());
    }
    if rest.starts_with("0b") {
        return digits(|c| c == '0' || c == '1');
    }
    if rest.starts_with("0o") {
        return digits(|c| ('0'..='7').contains(&c));
    }
    if rest.chars().next()?.is_ascii_digit() {
        let len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        return Some((Token::new(TokenKind::NumericLiteral, &rest[..len]), len));
    }

    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Lexer
// ─────────────────────────────────────────────────────────────────────────────

/// One source window being lexed: the driver's source buffer at the bottom
/// of the stack, one frame per placeholder expansion above it.
struct Frame<'src> {
    /// Unconsumed remainder of this window.
    rest: &'src str,
    /// Name of the placeholder whose replacement text this frame lexes;
    /// `None` for the root source window.  A placeholder whose name is
    /// still on the stack must not be expanded again — that is a cycle.
    placeholder: Option<&'src str>,
}

/// Pull lexer for one compilation unit.
///
/// Yields `Result<Token, LexError>` items.  The stream ends cleanly when
/// the source is exhausted; it ends after a single `Err` item on the first
/// unrecoverable condition.  Placeholder tokens are expanded recursively
/// before being yielded, so the consumer only ever sees concrete tokens.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use dynamo_core::parser::lexer::{Lexer, TokenKind};
///
/// let config = BTreeMap::new();
/// let kinds: Vec<_> = Lexer::new("driver Empty { }", &config)
///     .map(|t| t.unwrap().kind)
///     .collect();
/// assert_eq!(
///     kinds,
///     [TokenKind::Keyword, TokenKind::Identifier, TokenKind::Separator, TokenKind::Separator],
/// );
/// ```
pub struct Lexer<'src> {
    /// Placeholder environment, read-only for the whole lex run.
    placeholders: &'src BTreeMap<String, String>,
    /// Stack of active source windows, innermost expansion last.
    frames: Vec<Frame<'src>>,
    /// Set after the final token or the first error.
    finished: bool,
}

impl<'src> Lexer<'src> {
    /// Create a lexer over `source` with the given placeholder environment.
    pub fn new(source: &'src str, placeholders: &'src BTreeMap<String, String>) -> Self {
        Self {
            placeholders,
            frames: vec![Frame {
                rest: source,
                placeholder: None,
            }],
            finished: false,
        }
    }

    /// Returns `true` when the named placeholder is currently being
    /// expanded somewhere on the frame stack.
    fn expansion_in_progress(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.placeholder == Some(name))
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Token<'src>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            // Trim the current window; pop exhausted frames.  Popping a
            // frame releases its placeholder name for re-expansion.
            let rest = {
                let frame = self.frames.last_mut()?;
                frame.rest = frame.rest.trim_start();
                if frame.rest.is_empty() {
                    self.frames.pop();
                    if self.frames.is_empty() {
                        self.finished = true;
                        return None;
                    }
                    continue;
                }
                frame.rest
            };

            let (token, len) = match scan_token(rest) {
                Ok(scanned) => scanned,
                Err(error) => {
                    self.finished = true;
                    return Some(Err(error));
                }
            };

            let frame = self.frames.last_mut().expect("frame checked non-empty above");
            frame.rest = &rest[len..];

            if token.kind == TokenKind::Placeholder {
                let name = token.text.trim();
                trace!("expanding placeholder {{% {name} %}}");

                if self.expansion_in_progress(name) {
                    // Cycle: the replacement text of `name` re-entered
                    // itself before finishing.
                    self.finished = true;
                    return Some(Err(LexError::UnknownPlaceholder));
                }
                let Some(replacement) = self.placeholders.get(name) else {
                    self.finished = true;
                    return Some(Err(LexError::UnknownPlaceholder));
                };
                self.frames.push(Frame {
                    rest: replacement.as_str(),
                    placeholder: Some(name),
                });
                continue;
            }

            return Some(Ok(token));
        }
    }
}

/// Lex an entire compilation unit into a token buffer.
pub fn tokenize<'src>(
    source: &'src str,
    placeholders: &'src BTreeMap<String, String>,
) -> Result<Vec<Token<'src>>, LexError> {
    Lexer::new(source, placeholders).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
