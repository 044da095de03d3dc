//! Compile-time evaluation of pure value operations
//!
//! Used for global initializers, array shapes, and constant folding inside
//! the translator. The result type of a binary arithmetic operation is the
//! larger operand type lifted to at least `char`; comparisons and logical
//! operations always produce `bool`. Division is C-style: integers
//! truncate toward zero, a float operand forces floating division.

use csl_common::{CslError, CslResult};
use csl_lexer::{Operator, ValType, Value};

/// Evaluate an operator over constant operands. `rhs` is `None` for unary
/// operators.
pub fn eval_op(op: Operator, lhs: Value, rhs: Option<Value>) -> CslResult<Value> {
    if lhs.ty() == ValType::Void || rhs.is_some_and(|r| r.ty() == ValType::Void) {
        return Err(CslError::compile("need value type"));
    }
    if op.is_assignment() {
        return Err(CslError::compile("cannot evaluate assignment"));
    }

    match (op, rhs) {
        (Operator::Plus, None) => Ok(lhs),
        (Operator::Minus, None) => {
            let ty = lhs.ty().max(ValType::Char);
            match ty {
                ValType::Float => Ok(Value::Float(-lhs.as_f64())),
                _ => Value::Int(-lhs.as_i64()).cast(ty),
            }
        }
        (Operator::Not, None) => Ok(Value::Bool(!lhs.truthy())),

        (Operator::And, Some(r)) => Ok(Value::Bool(lhs.truthy() && r.truthy())),
        (Operator::Or, Some(r)) => Ok(Value::Bool(lhs.truthy() || r.truthy())),
        (Operator::Xor, Some(r)) => Ok(Value::Bool(lhs.truthy() ^ r.truthy())),

        (op, Some(r)) if op.is_comparison() => eval_comparison(op, lhs, r),
        (op, Some(r)) => eval_arith(op, lhs, r),
        (op, None) => Err(CslError::compile(format!("unrecognized operator: {}", op))),
    }
}

fn eval_comparison(op: Operator, lhs: Value, rhs: Value) -> CslResult<Value> {
    let result = if lhs.ty() == ValType::Float || rhs.ty() == ValType::Float {
        let (a, b) = (lhs.as_f64(), rhs.as_f64());
        match op {
            Operator::Eq => a == b,
            Operator::Ne => a != b,
            Operator::Lt => a < b,
            Operator::Le => a <= b,
            Operator::Gt => a > b,
            Operator::Ge => a >= b,
            _ => return Err(CslError::compile(format!("unrecognized operator: {}", op))),
        }
    } else {
        let (a, b) = (lhs.as_i64(), rhs.as_i64());
        match op {
            Operator::Eq => a == b,
            Operator::Ne => a != b,
            Operator::Lt => a < b,
            Operator::Le => a <= b,
            Operator::Gt => a > b,
            Operator::Ge => a >= b,
            _ => return Err(CslError::compile(format!("unrecognized operator: {}", op))),
        }
    };
    Ok(Value::Bool(result))
}

fn eval_arith(op: Operator, lhs: Value, rhs: Value) -> CslResult<Value> {
    let ty = lhs.ty().max(rhs.ty()).max(ValType::Char);

    if ty == ValType::Float {
        let (a, b) = (lhs.as_f64(), rhs.as_f64());
        let result = match op {
            Operator::Add => a + b,
            Operator::Sub => a - b,
            Operator::Mul => a * b,
            Operator::Div => {
                if b == 0.0 {
                    return Err(CslError::compile("division by zero in constant expression"));
                }
                a / b
            }
            Operator::Rem => {
                if b == 0.0 {
                    return Err(CslError::compile("division by zero in constant expression"));
                }
                a % b
            }
            Operator::Pow => a.powf(b),
            _ => return Err(CslError::compile(format!("unrecognized operator: {}", op))),
        };
        return Ok(Value::Float(result));
    }

    let (a, b) = (lhs.as_i64(), rhs.as_i64());
    let result = match op {
        Operator::Add => a.wrapping_add(b),
        Operator::Sub => a.wrapping_sub(b),
        Operator::Mul => a.wrapping_mul(b),
        // C-style truncating division
        Operator::Div => {
            if b == 0 {
                return Err(CslError::compile("division by zero in constant expression"));
            }
            a.wrapping_div(b)
        }
        Operator::Rem => {
            if b == 0 {
                return Err(CslError::compile("division by zero in constant expression"));
            }
            a.wrapping_rem(b)
        }
        Operator::Pow => {
            let exp = u32::try_from(b).map_err(|_| {
                CslError::compile("negative exponent in constant integer expression")
            })?;
            a.wrapping_pow(exp)
        }
        _ => return Err(CslError::compile(format!("unrecognized operator: {}", op))),
    };
    Value::Int(result).cast(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(eval_op(Operator::Add, int(3), Some(int(4))).unwrap(), int(7));
        assert_eq!(eval_op(Operator::Mul, int(4), Some(int(2))).unwrap(), int(8));
        assert_eq!(eval_op(Operator::Sub, int(1), Some(int(5))).unwrap(), int(-4));
    }

    #[test]
    fn test_c_style_division() {
        assert_eq!(eval_op(Operator::Div, int(7), Some(int(2))).unwrap(), int(3));
        assert_eq!(eval_op(Operator::Div, int(-7), Some(int(2))).unwrap(), int(-3));
        assert_eq!(eval_op(Operator::Rem, int(-7), Some(int(2))).unwrap(), int(-1));
        assert_eq!(
            eval_op(Operator::Div, Value::Float(7.0), Some(int(2))).unwrap(),
            Value::Float(3.5)
        );
    }

    #[test]
    fn test_division_by_zero_fails() {
        assert!(eval_op(Operator::Div, int(1), Some(int(0))).is_err());
        assert!(eval_op(Operator::Rem, int(1), Some(int(0))).is_err());
    }

    #[test]
    fn test_promotion() {
        // bool arithmetic lifts to char
        let v = eval_op(Operator::Add, Value::Bool(true), Some(Value::Bool(true))).unwrap();
        assert_eq!(v, Value::Char(2));
        // int + float promotes to float
        let v = eval_op(Operator::Add, int(1), Some(Value::Float(0.5))).unwrap();
        assert_eq!(v, Value::Float(1.5));
    }

    #[test]
    fn test_comparisons_produce_bool() {
        assert_eq!(eval_op(Operator::Lt, int(1), Some(int(2))).unwrap(), Value::Bool(true));
        assert_eq!(
            eval_op(Operator::Eq, Value::Float(1.0), Some(int(1))).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(eval_op(Operator::Ge, int(1), Some(int(2))).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_logic_produces_bool() {
        assert_eq!(eval_op(Operator::And, int(3), Some(int(2))).unwrap(), Value::Bool(true));
        assert_eq!(eval_op(Operator::Or, int(0), Some(int(0))).unwrap(), Value::Bool(false));
        assert_eq!(eval_op(Operator::Xor, int(3), Some(int(5))).unwrap(), Value::Bool(false));
        assert_eq!(eval_op(Operator::Not, int(3), None).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(eval_op(Operator::Minus, int(3), None).unwrap(), int(-3));
        assert_eq!(
            eval_op(Operator::Minus, Value::Float(2.5), None).unwrap(),
            Value::Float(-2.5)
        );
        // negating a bool lifts to char
        assert_eq!(
            eval_op(Operator::Minus, Value::Bool(true), None).unwrap(),
            Value::Char(-1)
        );
    }

    #[test]
    fn test_pow() {
        assert_eq!(eval_op(Operator::Pow, int(2), Some(int(10))).unwrap(), int(1024));
        assert!(eval_op(Operator::Pow, int(2), Some(int(-1))).is_err());
    }

    #[test]
    fn test_void_operand_fails() {
        assert!(eval_op(Operator::Add, Value::Void, Some(int(1))).is_err());
        assert!(eval_op(Operator::Add, int(1), Some(Value::Void)).is_err());
    }

    #[test]
    fn test_assignment_fails() {
        assert!(eval_op(Operator::Asn, int(1), Some(int(2))).is_err());
        assert!(eval_op(Operator::AddAsn, int(1), Some(int(2))).is_err());
        assert!(eval_op(Operator::Inc, int(1), None).is_err());
    }
}
