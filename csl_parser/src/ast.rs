//! Abstract Syntax Tree definitions for the CSL language

use csl_lexer::{CtrlKeyword, Operator, ValType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declaration sub-tags, used with [`AstKind::Decl`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclKind {
    /// Function declaration head
    FuncDecl,
    /// Variable declaration statement
    VarDecl,
    /// Array declaration (reserved)
    ArrayDecl,
    /// One declared element within a variable declaration
    DeclElem,
}

/// Node tags of the syntax tree, with their payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AstKind {
    /// Reserved
    None,
    /// Immediate value
    Val(Value),
    /// Variable or function name
    Name(String),
    /// Function call; the callee is the first child
    Call,
    /// Operator application
    Op(Operator),
    /// Control statement (`if`/`while`/`for`/...)
    Ctrl(CtrlKeyword),
    /// Type name
    Type(ValType),
    /// Expression wrapper (reserved)
    Expr,
    /// Declaration, discriminated by [`DeclKind`]
    Decl(DeclKind),
    /// Function node: declaration head plus optional body
    Func,
    /// Compound statement
    Block,
    /// Initializer list
    List,
    /// Compilation unit root
    Root,
}

/// A node of the syntax tree: a tag with an ordered child sequence
///
/// The tree is immutable once parsed; the translator only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    pub kind: AstKind,
    pub children: Vec<Ast>,
}

impl Ast {
    pub fn new(kind: AstKind) -> Self {
        Self { kind, children: Vec::new() }
    }

    pub fn with_children(kind: AstKind, children: Vec<Ast>) -> Self {
        Self { kind, children }
    }

    /// Add a child
    pub fn push(&mut self, child: Ast) {
        self.children.push(child);
    }

    /// The payload of a name node
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            AstKind::Name(name) => Some(name),
            _ => None,
        }
    }

    /// The payload of an operator node
    pub fn op(&self) -> Option<Operator> {
        match self.kind {
            AstKind::Op(op) => Some(op),
            _ => None,
        }
    }

    /// The payload of a type node
    pub fn val_type(&self) -> Option<ValType> {
        match self.kind {
            AstKind::Type(ty) => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AstKind::Val(v) => write!(f, "{}", v)?,
            AstKind::Name(n) => write!(f, "{}", n)?,
            AstKind::Op(op) => write!(f, "{}", op)?,
            AstKind::Ctrl(k) => write!(f, "{}", k)?,
            AstKind::Type(t) => write!(f, "{}", t)?,
            kind => write!(f, "{:?}", kind)?,
        }
        if !self.children.is_empty() {
            write!(f, "{{")?;
            for child in &self.children {
                write!(f, "{}", child)?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}
