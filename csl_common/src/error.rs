//! Error handling utilities for the CSL compiler

use crate::span::Position;
use thiserror::Error;

/// The main error type for the CSL compiler
///
/// Each variant maps onto one stage of the pipeline. Every error terminates
/// the current compilation; no recovery is attempted.
#[derive(Error, Debug, Clone)]
pub enum CslError {
    /// File-level failure: missing include file, block comment left open
    #[error("read error: {message}")]
    Read { message: String },

    /// Lexer or parser disagreement with the grammar
    #[error("syntax error at offset {}: {message}", .pos.offset)]
    Syntax { message: String, pos: Position },

    /// Malformed numeric literal
    #[error("cannot parse literal '{literal}'")]
    Literal { literal: String },

    /// Translation-level failure: undefined symbol, type mismatch, ...
    #[error("compile error: {message}")]
    Compile { message: String },

    /// I/O failure while reading source or writing output
    #[error("I/O error: {message}")]
    Io { message: String },
}

/// Result type alias for CSL compiler operations
pub type CslResult<T> = Result<T, CslError>;

impl CslError {
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read { message: message.into() }
    }

    pub fn syntax(message: impl Into<String>, pos: Position) -> Self {
        Self::Syntax { message: message.into(), pos }
    }

    pub fn literal(literal: impl Into<String>) -> Self {
        Self::Literal { literal: literal.into() }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile { message: message.into() }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io { message: message.into() }
    }
}

impl From<std::io::Error> for CslError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}
