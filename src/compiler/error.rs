//! # Compiler Error Definitions
//!
//! This module centralizes the error types that can occur while tokenizing,
//! parsing, or generating code for a translation unit.
//!
//! It leverages the `thiserror` crate to simplify error reporting and provide
//! clear, descriptive messages to the user.

use thiserror::Error;

/// The primary error enumeration for the compiler.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Wrapper for standard I/O errors (reading stdin, writing stdout).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A malformed token: an unterminated literal, a stray character, or a
    /// numeric literal whose suffix doesn't parse.
    #[error("lexical error at byte {position}: {message}")]
    LexError { position: usize, message: String },

    /// A token did not fit the grammar at the point it was encountered.
    #[error("syntax error at byte {position}: {message}")]
    SyntaxError { position: usize, message: String },

    /// A well-formed construct that fails a typing or scoping rule: a
    /// redeclaration with a conflicting type, an undeclared identifier, an
    /// operand of the wrong kind for its operator, and so on.
    #[error("semantic error: {message}")]
    SemanticError { message: String },

    /// A reference to a name with no matching declaration in scope.
    #[error("undeclared identifier: {name}")]
    UndeclaredIdentifier { name: String },

    /// An internal invariant the code generator or parser relies on was
    /// violated; this indicates a bug in the compiler itself rather than a
    /// problem with the input program.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl CompileError {
    /// Constructs a `LexError` at the lexer's current byte offset.
    pub fn lexer(position: usize, message: impl Into<String>) -> Self {
        Self::LexError {
            position,
            message: message.into(),
        }
    }

    /// Constructs a `SyntaxError` at the parser's current byte offset.
    pub fn parser(position: usize, message: impl Into<String>) -> Self {
        Self::SyntaxError {
            position,
            message: message.into(),
        }
    }

    /// Constructs a general `SemanticError` for declarator/type-checking
    /// failures.
    pub fn semantic(message: impl Into<String>) -> Self {
        Self::SemanticError {
            message: message.into(),
        }
    }

    /// Constructs an `UndeclaredIdentifier` error.
    pub fn undeclared(name: impl Into<String>) -> Self {
        Self::UndeclaredIdentifier { name: name.into() }
    }

    /// Constructs an `Internal` error for a violated compiler invariant.
    pub fn ice(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
