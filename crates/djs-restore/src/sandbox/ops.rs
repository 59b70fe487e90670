//! JavaScript operator semantics, shared by the constant evaluator and
//! the fragment executor.

use djs_core::ast::{BinaryOp, LogicalOp, UnaryOp};

use super::{EvalError, Value};

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(match op {
        BinaryOp::Add => match (left, right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Value::Str(format!("{}{}", left.to_js_string(), right.to_js_string()))
            }
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                Value::Str(format!("{}{}", left.to_js_string(), right.to_js_string()))
            }
            _ => Value::Num(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => Value::Num(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Num(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Num(left.to_number() / right.to_number()),
        BinaryOp::Mod => {
            let (a, b) = (left.to_number(), right.to_number());
            // JS % keeps the dividend's sign, same as Rust's rem.
            Value::Num(a % b)
        }
        BinaryOp::Exp => Value::Num(left.to_number().powf(right.to_number())),
        BinaryOp::LShift => Value::Num((left.to_int32() << (right.to_uint32() & 31)) as f64),
        BinaryOp::RShift => Value::Num((left.to_int32() >> (right.to_uint32() & 31)) as f64),
        BinaryOp::ZeroFillRShift => {
            Value::Num((left.to_uint32() >> (right.to_uint32() & 31)) as f64)
        }
        BinaryOp::BitOr => Value::Num((left.to_int32() | right.to_int32()) as f64),
        BinaryOp::BitXor => Value::Num((left.to_int32() ^ right.to_int32()) as f64),
        BinaryOp::BitAnd => Value::Num((left.to_int32() & right.to_int32()) as f64),
        BinaryOp::EqEq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::EqEqEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::NotEqEq => Value::Bool(!left.strict_eq(right)),
        BinaryOp::Lt => compare(left, right, |o| o == std::cmp::Ordering::Less),
        BinaryOp::LtEq => compare(left, right, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Gt => compare(left, right, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::GtEq => compare(left, right, |o| o != std::cmp::Ordering::Less),
        BinaryOp::In => match right {
            Value::Object(object) => {
                let key = left.to_js_string();
                Value::Bool(object.borrow().iter().any(|(k, _)| *k == key))
            }
            Value::Array(array) => {
                let index = left.to_number();
                Value::Bool(index >= 0.0 && (index as usize) < array.borrow().len())
            }
            _ => {
                return Err(EvalError::Type(format!(
                    "cannot use 'in' on {}",
                    right.type_of()
                )))
            }
        },
        BinaryOp::InstanceOf => {
            return Err(EvalError::Unsupported("instanceof".to_string()));
        }
    })
}

fn compare(left: &Value, right: &Value, pick: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Value::Bool(pick(a.cmp(b)));
    }
    let (a, b) = (left.to_number(), right.to_number());
    match a.partial_cmp(&b) {
        Some(ordering) => Value::Bool(pick(ordering)),
        None => Value::Bool(false), // NaN compares false
    }
}

pub fn unary(op: UnaryOp, arg: &Value) -> Result<Value, EvalError> {
    Ok(match op {
        UnaryOp::Minus => Value::Num(-arg.to_number()),
        UnaryOp::Plus => Value::Num(arg.to_number()),
        UnaryOp::Not => Value::Bool(!arg.is_truthy()),
        UnaryOp::BitNot => Value::Num(!arg.to_int32() as f64),
        UnaryOp::TypeOf => Value::Str(arg.type_of().to_string()),
        UnaryOp::Void => Value::Undefined,
        UnaryOp::Delete => {
            return Err(EvalError::Unsupported("delete on a value".to_string()));
        }
    })
}

/// Short-circuit decision for a logical operator: `Some(value)` when the
/// left operand decides the result, `None` when the right side must run.
pub fn logical_short_circuit(op: LogicalOp, left: &Value) -> Option<Value> {
    match op {
        LogicalOp::And if !left.is_truthy() => Some(left.clone()),
        LogicalOp::Or if left.is_truthy() => Some(left.clone()),
        LogicalOp::NullishCoalescing if !matches!(left, Value::Undefined | Value::Null) => {
            Some(left.clone())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_concatenates_when_either_side_is_a_string() {
        let got = binary(BinaryOp::Add, &Value::Str("a".into()), &Value::Num(1.0)).unwrap();
        assert_eq!(got.to_js_string(), "a1");
        let got = binary(BinaryOp::Add, &Value::Num(1.0), &Value::Num(2.0)).unwrap();
        assert_eq!(got.to_number(), 3.0);
    }

    #[test]
    fn shifts_operate_on_int32() {
        let got = binary(BinaryOp::LShift, &Value::Num(1.0), &Value::Num(33.0)).unwrap();
        assert_eq!(got.to_number(), 2.0); // shift count masked to 1
        let got = binary(
            BinaryOp::ZeroFillRShift,
            &Value::Num(-1.0),
            &Value::Num(0.0),
        )
        .unwrap();
        assert_eq!(got.to_number(), 4294967295.0);
    }

    #[test]
    fn string_comparison_is_lexicographic() {
        let got = binary(
            BinaryOp::Lt,
            &Value::Str("apple".into()),
            &Value::Str("banana".into()),
        )
        .unwrap();
        assert!(got.is_truthy());
    }

    #[test]
    fn typeof_matches_js() {
        assert_eq!(
            unary(UnaryOp::TypeOf, &Value::Undefined)
                .unwrap()
                .to_js_string(),
            "undefined"
        );
        assert_eq!(
            unary(UnaryOp::TypeOf, &Value::Null).unwrap().to_js_string(),
            "object"
        );
    }
}
