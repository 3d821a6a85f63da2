//! Error types for the dynamo compiler.

use thiserror::Error;

use crate::parser::lexer::LexError;
use crate::parser::ParseError;
use crate::specs::SpecError;

/// All errors that can be produced by a compilation run.
#[derive(Debug, Error)]
pub enum DynamoError {
    /// The lexer rejected a compilation unit.
    #[error("lexer error: {0}")]
    Lex(#[from] LexError),

    /// The parser rejected a compilation unit.
    #[error("parser error: {0}")]
    Parse(#[from] ParseError),

    /// A driver names a dependency that the specification does not define.
    #[error("dependency \"{0}\" does not exist")]
    MissingDependency(String),

    /// The dependency graph contains a cycle through the named driver.
    #[error("dependency cycle involving \"{0}\"")]
    DependencyCycle(String),

    /// The specification file could not be read or was malformed.
    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// Convenient `Result` alias for fallible compiler operations.
pub type DynamoResult<T> = Result<T, DynamoError>;
