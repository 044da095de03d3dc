//! Token definitions for the CSL language

use crate::keyword::{CtrlKeyword, DefKeyword, Separator};
use crate::op::Operator;
use crate::value::{ValType, Value};
use csl_common::{Span, Spanned};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token classes in the CSL language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Immediate value
    Val(Value),
    /// Variable or function name
    Name(String),
    /// Operator (including the logical keywords `and`/`or`/`xor`/`not`)
    Op(Operator),
    /// Type keyword (`int`, `float`, ...)
    Type(ValType),
    /// Definition keyword (`def`, `class`)
    Def(DefKeyword),
    /// Control keyword (`if`, `else`, ...)
    Ctrl(CtrlKeyword),
    /// Separator (`{` `}` `,` `:`)
    Sep(Separator),
    /// End of statement (`;`)
    Eol,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Classify an identifier, cross-checking the keyword tables in
    /// priority order: control -> definition -> type -> logical operator.
    /// Anything else is a name.
    pub fn from_ident(ident: &str) -> TokenKind {
        if let Some(kwd) = CtrlKeyword::from_name(ident) {
            TokenKind::Ctrl(kwd)
        } else if let Some(kwd) = DefKeyword::from_name(ident) {
            TokenKind::Def(kwd)
        } else if let Some(ty) = ValType::from_name(ident) {
            TokenKind::Type(ty)
        } else if let Some(op) = Operator::from_symbol(ident) {
            // only the logical keywords are reachable from identifier text
            TokenKind::Op(op)
        } else {
            TokenKind::Name(ident.to_string())
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Val(v) => write!(f, "{}", v),
            TokenKind::Name(n) => write!(f, "{}", n),
            TokenKind::Op(op) => write!(f, "{}", op),
            TokenKind::Type(ty) => write!(f, "{}", ty),
            TokenKind::Def(kwd) => write!(f, "{}", kwd),
            TokenKind::Ctrl(kwd) => write!(f, "{}", kwd),
            TokenKind::Sep(sep) => write!(f, "{}", sep),
            TokenKind::Eol => write!(f, ";"),
            TokenKind::Eof => write!(f, "EOF"),
        }
    }
}

/// A token with source location information
pub type Token = Spanned<TokenKind>;

/// Token utility trait
pub trait TokenUtils {
    fn new(kind: TokenKind, span: Span) -> Self;
    fn is_value(&self) -> bool;
    fn is_operator(&self) -> bool;
    fn is_eof(&self) -> bool;
}

impl TokenUtils for Token {
    fn new(kind: TokenKind, span: Span) -> Self {
        Spanned::new(kind, span)
    }

    fn is_value(&self) -> bool {
        matches!(self.value, TokenKind::Val(_))
    }

    fn is_operator(&self) -> bool {
        matches!(self.value, TokenKind::Op(_))
    }

    fn is_eof(&self) -> bool {
        matches!(self.value, TokenKind::Eof)
    }
}
