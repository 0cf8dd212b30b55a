use std::fmt;

use crate::node::{CmpOp, Operator, UnaryOp};

/// A literal value carried by a `Node::Value` or `Node::ValueVector`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric view used by the folding passes; `Int` widens to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Truth value under the surface language's rules.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// Applies a binary arithmetic operator to two literals. Returns `None`
    /// when the operator does not apply (the expression is left unfolded).
    pub fn apply_binary(op: Operator, left: &Value, right: &Value) -> Option<Value> {
        use Value::*;
        match op {
            Operator::And => return Some(if left.is_truthy() { right.clone() } else { left.clone() }),
            Operator::Or => return Some(if left.is_truthy() { left.clone() } else { right.clone() }),
            _ => {}
        }
        if let (Int(a), Int(b)) = (left, right) {
            let r = match op {
                Operator::Add => a.checked_add(*b)?,
                Operator::Sub => a.checked_sub(*b)?,
                Operator::Mult => a.checked_mul(*b)?,
                Operator::Div => {
                    if *b != 0 && a % b == 0 {
                        a / b
                    } else {
                        return float_binary(op, *a as f64, *b as f64);
                    }
                }
                Operator::FloorDiv => {
                    if *b == 0 {
                        return None;
                    }
                    a.div_euclid(*b)
                }
                Operator::Mod => {
                    if *b == 0 {
                        return None;
                    }
                    a.rem_euclid(*b)
                }
                Operator::Pow => {
                    if *b < 0 {
                        return float_binary(op, *a as f64, *b as f64);
                    }
                    a.checked_pow(u32::try_from(*b).ok()?)?
                }
                Operator::And | Operator::Or => unreachable!(),
            };
            return Some(Int(r));
        }
        if let (Str(a), Str(b)) = (left, right) {
            if op == Operator::Add {
                return Some(Str(format!("{a}{b}")));
            }
            return None;
        }
        float_binary(op, left.as_f64()?, right.as_f64()?)
    }

    /// Applies a comparison operator to two literals.
    pub fn apply_compare(op: CmpOp, left: &Value, right: &Value) -> Option<Value> {
        use Value::*;
        let result = match (left, right) {
            (Str(a), Str(b)) => match op {
                CmpOp::Eq => a == b,
                CmpOp::NotEq => a != b,
                CmpOp::Lt => a < b,
                CmpOp::LtE => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::GtE => a >= b,
            },
            (Bool(a), Bool(b)) => match op {
                CmpOp::Eq => a == b,
                CmpOp::NotEq => a != b,
                _ => return None,
            },
            (Nil, Nil) => match op {
                CmpOp::Eq => true,
                CmpOp::NotEq => false,
                _ => return None,
            },
            _ => {
                let (a, b) = (left.as_f64()?, right.as_f64()?);
                match op {
                    CmpOp::Eq => a == b,
                    CmpOp::NotEq => a != b,
                    CmpOp::Lt => a < b,
                    CmpOp::LtE => a <= b,
                    CmpOp::Gt => a > b,
                    CmpOp::GtE => a >= b,
                }
            }
        };
        Some(Bool(result))
    }

    /// Applies a unary operator to a literal.
    pub fn apply_unary(op: UnaryOp, operand: &Value) -> Option<Value> {
        use Value::*;
        match (op, operand) {
            (UnaryOp::Not, v) => Some(Bool(!v.is_truthy())),
            (UnaryOp::USub, Int(i)) => Some(Int(i.checked_neg()?)),
            (UnaryOp::USub, Float(f)) => Some(Float(-f)),
            (UnaryOp::UAdd, v) if v.is_numeric() => Some(v.clone()),
            _ => None,
        }
    }
}

fn float_binary(op: Operator, a: f64, b: f64) -> Option<Value> {
    let r = match op {
        Operator::Add => a + b,
        Operator::Sub => a - b,
        Operator::Mult => a * b,
        Operator::Div => {
            if b == 0.0 {
                return None;
            }
            a / b
        }
        Operator::FloorDiv => {
            if b == 0.0 {
                return None;
            }
            (a / b).floor()
        }
        Operator::Mod => {
            if b == 0.0 {
                return None;
            }
            a.rem_euclid(b)
        }
        Operator::Pow => a.powf(b),
        Operator::And | Operator::Or => return None,
    };
    Some(Value::Float(r))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("None"),
            Value::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Value {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Value {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_stays_integral() {
        let r = Value::apply_binary(Operator::Mult, &Value::Int(6), &Value::Int(7));
        assert_eq!(r, Some(Value::Int(42)));
        let r = Value::apply_binary(Operator::Div, &Value::Int(7), &Value::Int(2));
        assert_eq!(r, Some(Value::Float(3.5)));
        let r = Value::apply_binary(Operator::Div, &Value::Int(8), &Value::Int(2));
        assert_eq!(r, Some(Value::Int(4)));
    }

    #[test]
    fn division_by_zero_is_left_unfolded() {
        assert_eq!(
            Value::apply_binary(Operator::Div, &Value::Int(1), &Value::Int(0)),
            None
        );
        assert_eq!(
            Value::apply_binary(Operator::Mod, &Value::Float(1.0), &Value::Float(0.0)),
            None
        );
    }

    #[test]
    fn mixed_comparison_widens() {
        let r = Value::apply_compare(CmpOp::Lt, &Value::Int(1), &Value::Float(1.5));
        assert_eq!(r, Some(Value::Bool(true)));
    }

    #[test]
    fn rendering_matches_surface_syntax() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(2.25).to_string(), "2.25");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Nil.to_string(), "None");
        assert_eq!(Value::Str("a".into()).to_string(), "\"a\"");
    }
}
