//! Keyword and separator tables

use serde::{Deserialize, Serialize};
use std::fmt;

/// Control keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CtrlKeyword {
    If,
    Else,
    For,
    While,
    Return,
    Break,
    Continue,
}

impl CtrlKeyword {
    pub fn from_name(name: &str) -> Option<CtrlKeyword> {
        use CtrlKeyword::*;
        Some(match name {
            "if" => If,
            "else" => Else,
            "for" => For,
            "while" => While,
            "return" => Return,
            "break" => Break,
            "continue" => Continue,
            _ => return None,
        })
    }
}

impl fmt::Display for CtrlKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CtrlKeyword::If => "if",
            CtrlKeyword::Else => "else",
            CtrlKeyword::For => "for",
            CtrlKeyword::While => "while",
            CtrlKeyword::Return => "return",
            CtrlKeyword::Break => "break",
            CtrlKeyword::Continue => "continue",
        };
        write!(f, "{}", name)
    }
}

/// Definition keywords. `class` is recognized but not supported by the
/// parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefKeyword {
    Def,
    Class,
}

impl DefKeyword {
    pub fn from_name(name: &str) -> Option<DefKeyword> {
        match name {
            "def" => Some(DefKeyword::Def),
            "class" => Some(DefKeyword::Class),
            _ => None,
        }
    }
}

impl fmt::Display for DefKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefKeyword::Def => write!(f, "def"),
            DefKeyword::Class => write!(f, "class"),
        }
    }
}

/// Separators: braces, comma and the type-annotation colon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Separator {
    LBrace,
    RBrace,
    Comma,
    Colon,
}

impl Separator {
    pub fn from_symbol(sym: &str) -> Option<Separator> {
        match sym {
            "{" => Some(Separator::LBrace),
            "}" => Some(Separator::RBrace),
            "," => Some(Separator::Comma),
            ":" => Some(Separator::Colon),
            _ => None,
        }
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            Separator::LBrace => "{",
            Separator::RBrace => "}",
            Separator::Comma => ",",
            Separator::Colon => ":",
        };
        write!(f, "{}", sym)
    }
}
