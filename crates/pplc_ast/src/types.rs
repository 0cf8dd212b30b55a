//! The abstract type lattice consulted by the rewrite passes.
//!
//! Types exist to enable safe rewrites (static `map`/`zip` expansion needs
//! sequence sizes, broadcasting needs element counts); they are never
//! reported to the user.

use crate::node::{Name, Operator, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum TypeInfo {
    Integer,
    Float,
    Boolean,
    String,
    Sequence {
        elem: Box<TypeInfo>,
        size: Option<usize>,
    },
    Distribution {
        family: Name,
    },
    Unknown,
}

impl TypeInfo {
    pub fn sequence(elem: TypeInfo, size: Option<usize>) -> TypeInfo {
        TypeInfo::Sequence {
            elem: Box::new(elem),
            size,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeInfo::Integer | TypeInfo::Float | TypeInfo::Boolean)
    }

    /// Statically known element count, when this is a sequence type.
    pub fn size(&self) -> Option<usize> {
        match self {
            TypeInfo::Sequence { size, .. } => *size,
            _ => None,
        }
    }
}

/// Least upper bound of two types; numeric types widen, everything else
/// meets at `Unknown`.
pub fn union(left: &TypeInfo, right: &TypeInfo) -> TypeInfo {
    use TypeInfo::*;
    match (left, right) {
        (a, b) if a == b => a.clone(),
        (Integer, Float) | (Float, Integer) => Float,
        (Boolean, Integer) | (Integer, Boolean) => Integer,
        (Boolean, Float) | (Float, Boolean) => Float,
        (
            Sequence { elem: a, size: n },
            Sequence { elem: b, size: m },
        ) => TypeInfo::sequence(union(a, b), if n == m { *n } else { None }),
        _ => Unknown,
    }
}

/// Result type of a binary operator; scalar ⊕ sequence broadcasts.
pub fn binary(op: Operator, left: &TypeInfo, right: &TypeInfo) -> TypeInfo {
    use TypeInfo::*;
    match (left, right) {
        (Sequence { elem, size }, scalar) if scalar.is_numeric() => {
            TypeInfo::sequence(binary(op, elem, scalar), *size)
        }
        (scalar, Sequence { elem, size }) if scalar.is_numeric() => {
            TypeInfo::sequence(binary(op, scalar, elem), *size)
        }
        (Sequence { elem: a, size: n }, Sequence { elem: b, size: m }) => {
            TypeInfo::sequence(binary(op, a, b), if n == m { *n } else { None })
        }
        _ => match op {
            Operator::Div | Operator::Pow => {
                if left.is_numeric() && right.is_numeric() {
                    Float
                } else {
                    Unknown
                }
            }
            Operator::And | Operator::Or => union(left, right),
            _ => {
                if left.is_numeric() && right.is_numeric() {
                    union(left, right)
                } else if matches!((left, right), (String, String)) && op == Operator::Add {
                    String
                } else {
                    Unknown
                }
            }
        },
    }
}

pub fn unary(op: UnaryOp, operand: &TypeInfo) -> TypeInfo {
    match op {
        UnaryOp::Not => TypeInfo::Boolean,
        UnaryOp::UAdd | UnaryOp::USub => operand.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_widening() {
        assert_eq!(union(&TypeInfo::Integer, &TypeInfo::Float), TypeInfo::Float);
        assert_eq!(union(&TypeInfo::Integer, &TypeInfo::Integer), TypeInfo::Integer);
        assert_eq!(union(&TypeInfo::Integer, &TypeInfo::String), TypeInfo::Unknown);
    }

    #[test]
    fn scalar_sequence_broadcast_keeps_size() {
        let seq = TypeInfo::sequence(TypeInfo::Integer, Some(3));
        let result = binary(Operator::Mult, &TypeInfo::Float, &seq);
        assert_eq!(result, TypeInfo::sequence(TypeInfo::Float, Some(3)));
    }

    #[test]
    fn mismatched_sizes_are_forgotten() {
        let a = TypeInfo::sequence(TypeInfo::Float, Some(3));
        let b = TypeInfo::sequence(TypeInfo::Float, Some(4));
        assert_eq!(binary(Operator::Add, &a, &b).size(), None);
    }
}
