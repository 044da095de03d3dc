//! Value types and immediate values

use csl_common::{CslError, CslResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The CSL value types, ordered by promotion rank
///
/// The derived `Ord` gives the implicit-promotion order used everywhere:
/// `VOID < BOOL < CHAR < INT < FLOAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValType {
    Void,
    Bool,
    Char,
    Int,
    Float,
}

impl ValType {
    /// Parse a type name as it appears in source
    pub fn from_name(name: &str) -> Option<ValType> {
        match name {
            "void" => Some(ValType::Void),
            "bool" => Some(ValType::Bool),
            "char" => Some(ValType::Char),
            "int" => Some(ValType::Int),
            "float" => Some(ValType::Float),
            _ => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, ValType::Bool | ValType::Char | ValType::Int)
    }

    /// Bit width of the machine representation
    pub fn bit_width(self) -> u32 {
        match self {
            ValType::Void => 0,
            ValType::Bool => 1,
            ValType::Char => 8,
            ValType::Int => 32,
            ValType::Float => 32,
        }
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValType::Void => "void",
            ValType::Bool => "bool",
            ValType::Char => "char",
            ValType::Int => "int",
            ValType::Float => "float",
        };
        write!(f, "{}", name)
    }
}

/// An immediate value: the payload of a VAL token and the unit of
/// compile-time evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Void,
    Bool(bool),
    Char(i8),
    Int(i64),
    Float(f64),
}

impl Value {
    /// Parse a numeric literal. The literal is floating if it contains a
    /// `.` or an exponent, integral otherwise.
    pub fn parse(text: &str) -> CslResult<Value> {
        if text.contains('.') || text.contains('e') || text.contains('E') {
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| CslError::literal(text))
        } else {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| CslError::literal(text))
        }
    }

    pub fn ty(&self) -> ValType {
        match self {
            Value::Void => ValType::Void,
            Value::Bool(_) => ValType::Bool,
            Value::Char(_) => ValType::Char,
            Value::Int(_) => ValType::Int,
            Value::Float(_) => ValType::Float,
        }
    }

    /// The zero value of a type
    pub fn zero(ty: ValType) -> Value {
        match ty {
            ValType::Void => Value::Void,
            ValType::Bool => Value::Bool(false),
            ValType::Char => Value::Char(0),
            ValType::Int => Value::Int(0),
            ValType::Float => Value::Float(0.0),
        }
    }

    /// The unit value of a type (the increment applied by `++`/`--`)
    pub fn one(ty: ValType) -> Value {
        match ty {
            ValType::Void => Value::Void,
            ValType::Bool => Value::Bool(true),
            ValType::Char => Value::Char(1),
            ValType::Int => Value::Int(1),
            ValType::Float => Value::Float(1.0),
        }
    }

    /// Integral view of the payload. Floats truncate toward zero.
    pub fn as_i64(&self) -> i64 {
        match *self {
            Value::Void => 0,
            Value::Bool(b) => b as i64,
            Value::Char(c) => c as i64,
            Value::Int(i) => i,
            Value::Float(f) => f as i64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Void => 0.0,
            Value::Bool(b) => b as i64 as f64,
            Value::Char(c) => c as f64,
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
        }
    }

    /// Truth value: non-zero payloads are true
    pub fn truthy(&self) -> bool {
        match *self {
            Value::Void => false,
            Value::Bool(b) => b,
            Value::Char(c) => c != 0,
            Value::Int(i) => i != 0,
            Value::Float(f) => f != 0.0,
        }
    }

    /// Compile-time conversion mirroring the emitted cast instructions.
    /// Conversion to bool tests against zero; integral narrowing wraps.
    pub fn cast(self, to: ValType) -> CslResult<Value> {
        if self.ty() == ValType::Void || to == ValType::Void {
            return Err(CslError::compile(format!(
                "cannot convert {} to {}",
                self.ty(),
                to
            )));
        }
        Ok(match to {
            ValType::Void => unreachable!(),
            ValType::Bool => Value::Bool(self.truthy()),
            ValType::Char => Value::Char(self.as_i64() as i8),
            ValType::Int => Value::Int(self.as_i64()),
            ValType::Float => Value::Float(self.as_f64()),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{}", c),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(Value::parse("42").unwrap(), Value::Int(42));
        assert_eq!(Value::parse("0").unwrap(), Value::Int(0));
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(Value::parse("3.5").unwrap(), Value::Float(3.5));
        assert_eq!(Value::parse(".5").unwrap(), Value::Float(0.5));
        assert_eq!(Value::parse("1e3").unwrap(), Value::Float(1000.0));
        assert_eq!(Value::parse("2.5e-1").unwrap(), Value::Float(0.25));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(Value::parse("1.2.3").is_err());
        assert!(Value::parse("99999999999999999999999").is_err());
    }

    #[test]
    fn test_promotion_order() {
        assert!(ValType::Void < ValType::Bool);
        assert!(ValType::Bool < ValType::Char);
        assert!(ValType::Char < ValType::Int);
        assert!(ValType::Int < ValType::Float);
    }

    #[test]
    fn test_cast() {
        assert_eq!(Value::Float(3.9).cast(ValType::Int).unwrap(), Value::Int(3));
        assert_eq!(Value::Int(2).cast(ValType::Bool).unwrap(), Value::Bool(true));
        assert_eq!(Value::Int(0).cast(ValType::Bool).unwrap(), Value::Bool(false));
        assert_eq!(Value::Int(257).cast(ValType::Char).unwrap(), Value::Char(1));
        assert!(Value::Void.cast(ValType::Int).is_err());
    }
}
