//! The type inferencer consulted by the rewrite passes.
//!
//! Inference exists solely to enable safe rewrites: `zip`/`map` expansion
//! over non-literal sequences needs element counts, broadcasting needs
//! sizes. Resolution of symbols is delegated to the calling pass.

use pplc_ast::types::{self, TypeInfo};
use pplc_ast::{Node, Value};

/// Symbols are resolved through the calling pass's environment.
pub struct TypeInferencer<'a> {
    resolver: &'a dyn Fn(&str) -> Option<Node>,
}

const MAX_DEPTH: usize = 32;

impl<'a> TypeInferencer<'a> {
    pub fn new(resolver: &'a dyn Fn(&str) -> Option<Node>) -> Self {
        Self { resolver }
    }

    pub fn infer(&self, node: &Node) -> TypeInfo {
        self.infer_at(node, 0)
    }

    fn infer_at(&self, node: &Node, depth: usize) -> TypeInfo {
        if depth > MAX_DEPTH {
            return TypeInfo::Unknown;
        }
        match node {
            Node::Value(value) => match value {
                Value::Nil => TypeInfo::Unknown,
                Value::Bool(_) => TypeInfo::Boolean,
                Value::Int(_) => TypeInfo::Integer,
                Value::Float(_) => TypeInfo::Float,
                Value::Str(_) => TypeInfo::String,
            },
            Node::ValueVector(values) => {
                let elem = values
                    .iter()
                    .map(|v| self.infer_at(&Node::Value(v.clone()), depth + 1))
                    .reduce(|a, b| types::union(&a, &b))
                    .unwrap_or(TypeInfo::Unknown);
                TypeInfo::sequence(elem, Some(values.len()))
            }
            Node::Vector(items) => {
                let elem = items
                    .iter()
                    .map(|item| self.infer_at(item, depth + 1))
                    .reduce(|a, b| types::union(&a, &b))
                    .unwrap_or(TypeInfo::Unknown);
                TypeInfo::sequence(elem, Some(items.len()))
            }
            Node::Symbol(s) => match (self.resolver)(&s.name) {
                Some(binding) => self.infer_at(&binding, depth + 1),
                None => TypeInfo::Unknown,
            },
            Node::BinOp(b) => types::binary(
                b.op,
                &self.infer_at(&b.left, depth + 1),
                &self.infer_at(&b.right, depth + 1),
            ),
            Node::Unary(u) => types::unary(u.op, &self.infer_at(&u.operand, depth + 1)),
            Node::Compare(_) => TypeInfo::Boolean,
            Node::If(i) => {
                let then = self.infer_at(&i.then, depth + 1);
                match &i.orelse {
                    Some(orelse) => types::union(&then, &self.infer_at(orelse, depth + 1)),
                    None => TypeInfo::Unknown,
                }
            }
            Node::Subscript(s) => {
                let base = self.infer_at(&s.base, depth + 1);
                match base {
                    TypeInfo::Sequence { elem, size } => {
                        if s.column {
                            // column of a matrix: one element per row
                            match *elem {
                                TypeInfo::Sequence { elem: cell, .. } => {
                                    TypeInfo::sequence(*cell, size)
                                }
                                _ => TypeInfo::Unknown,
                            }
                        } else {
                            *elem
                        }
                    }
                    _ => TypeInfo::Unknown,
                }
            }
            Node::Sample(s) => {
                let drawn = match s.dist.as_ref() {
                    Node::Dist(d) => pplc_ast::dist::lookup(&d.family)
                        .map(|family| family.result_type())
                        .unwrap_or(TypeInfo::Unknown),
                    _ => TypeInfo::Unknown,
                };
                match &s.size {
                    Some(size) => {
                        let n = size.as_int().and_then(|i| usize::try_from(i).ok());
                        TypeInfo::sequence(drawn, n)
                    }
                    None => drawn,
                }
            }
            Node::Observe(o) => self.infer_at(&o.value, depth + 1),
            Node::Dist(d) => TypeInfo::Distribution {
                family: d.family.clone(),
            },
            Node::Call(c) => self.infer_call(c, depth),
            Node::Let(l) => self.infer_at(&l.body, depth + 1),
            Node::Body(b) => match b.items.last() {
                Some(last) => self.infer_at(last, depth + 1),
                None => TypeInfo::Unknown,
            },
            Node::Return(r) => self.infer_at(&r.value, depth + 1),
            Node::Def(_) | Node::Function(_) => TypeInfo::Unknown,
        }
    }

    fn infer_call(&self, call: &pplc_ast::Call, depth: usize) -> TypeInfo {
        let Some(name) = call.function_name() else {
            return TypeInfo::Unknown;
        };
        let arg = |i: usize| call.args.get(i);
        match name {
            "len" => TypeInfo::Integer,
            "zeros" | "ones" => {
                let size = arg(0)
                    .and_then(Node::as_int)
                    .and_then(|i| usize::try_from(i).ok());
                TypeInfo::sequence(TypeInfo::Float, size)
            }
            "range" => {
                let size = arg(0)
                    .and_then(Node::as_int)
                    .and_then(|i| usize::try_from(i).ok());
                TypeInfo::sequence(TypeInfo::Integer, size)
            }
            "sum" => match arg(0).map(|a| self.infer_at(a, depth + 1)) {
                Some(TypeInfo::Sequence { elem, .. }) => *elem,
                _ => TypeInfo::Unknown,
            },
            "first" | "second" => match arg(0).map(|a| self.infer_at(a, depth + 1)) {
                Some(TypeInfo::Sequence { elem, .. }) => *elem,
                _ => TypeInfo::Unknown,
            },
            "rest" => match arg(0).map(|a| self.infer_at(a, depth + 1)) {
                Some(TypeInfo::Sequence { elem, size }) => {
                    TypeInfo::sequence(*elem, size.map(|n| n.saturating_sub(1)))
                }
                _ => TypeInfo::Unknown,
            },
            "sqrt" | "exp" | "log" | "abs" => TypeInfo::Float,
            _ => TypeInfo::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pplc_ast::{Operator, Subscript};

    fn no_resolver(_: &str) -> Option<Node> {
        None
    }

    #[test]
    fn literal_vector_has_size() {
        let resolver = no_resolver;
        let ti = TypeInferencer::new(&resolver);
        let node = Node::ValueVector(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(ti.infer(&node), TypeInfo::sequence(TypeInfo::Integer, Some(3)));
    }

    #[test]
    fn symbols_resolve_through_the_environment() {
        let resolver = |name: &str| {
            (name == "v").then(|| Node::ValueVector(vec![Value::Float(1.0), Value::Float(2.0)]))
        };
        let ti = TypeInferencer::new(&resolver);
        assert_eq!(
            ti.infer(&Node::symbol("v")).size(),
            Some(2),
            "binding size should be visible through the symbol"
        );
    }

    #[test]
    fn broadcast_types_carry_sizes() {
        let resolver = no_resolver;
        let ti = TypeInferencer::new(&resolver);
        let node = Node::binop(
            Node::symbol("x"),
            Operator::Mult,
            Node::ValueVector(vec![Value::Float(1.0); 4]),
        );
        // unknown * sequence loses the element type but this stays a scalar op
        assert_eq!(ti.infer(&node).size(), None);
        let node = Node::binop(
            Node::value(2.0),
            Operator::Mult,
            Node::ValueVector(vec![Value::Float(1.0); 4]),
        );
        assert_eq!(ti.infer(&node).size(), Some(4));
    }

    #[test]
    fn column_subscript_counts_rows() {
        let resolver = |name: &str| {
            (name == "data").then(|| {
                Node::Vector(vec![
                    Node::ValueVector(vec![Value::Float(1.0), Value::Float(2.1)]),
                    Node::ValueVector(vec![Value::Float(2.0), Value::Float(3.9)]),
                ])
            })
        };
        let ti = TypeInferencer::new(&resolver);
        let node = Node::Subscript(Subscript {
            base: Box::new(Node::symbol("data")),
            index: Box::new(Node::value(0)),
            column: true,
        });
        assert_eq!(ti.infer(&node), TypeInfo::sequence(TypeInfo::Float, Some(2)));
    }

    #[test]
    fn first_and_second_have_the_element_type() {
        let resolver = |name: &str| {
            (name == "v").then(|| Node::ValueVector(vec![Value::Float(1.0), Value::Float(2.0)]))
        };
        let ti = TypeInferencer::new(&resolver);
        for name in ["first", "second"] {
            let call = Node::Call(pplc_ast::Call {
                function: Box::new(Node::symbol(name)),
                args: vec![Node::symbol("v")],
                keywords: vec![],
            });
            assert_eq!(ti.infer(&call), TypeInfo::Float);
        }
    }

    #[test]
    fn sample_type_comes_from_the_family_table() {
        let resolver = no_resolver;
        let ti = TypeInferencer::new(&resolver);
        let node = Node::Sample(pplc_ast::Sample {
            dist: Box::new(Node::Dist(pplc_ast::Dist {
                family: "categorical".into(),
                args: vec![Node::ValueVector(vec![Value::Float(0.5), Value::Float(0.5)])],
            })),
            size: None,
        });
        assert_eq!(ti.infer(&node), TypeInfo::Integer);
    }
}
