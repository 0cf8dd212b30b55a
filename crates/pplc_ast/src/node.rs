use crate::error::{CompileError, Result};
use crate::value::Value;

pub type Name = String;

/// Binary operator tokens (boolean connectives share the table since the
/// simplifier treats them uniformly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    And,
    Or,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mult => "*",
            Operator::Div => "/",
            Operator::FloorDiv => "//",
            Operator::Mod => "%",
            Operator::Pow => "**",
            Operator::And => "and",
            Operator::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    UAdd,
    USub,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Not => "not ",
            UnaryOp::UAdd => "+",
            UnaryOp::USub => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
        }
    }
}

/// The AST of both surface languages and every pass in between.
#[derive(Debug, Clone, PartialEq, is_macro::Is)]
pub enum Node {
    #[is(name = "value_node")]
    Value(Value),
    ValueVector(Vec<Value>),
    Vector(Vec<Node>),
    #[is(name = "symbol_node")]
    Symbol(Symbol),
    #[is(name = "def_node")]
    Def(Def),
    #[is(name = "let_")]
    Let(Let),
    Body(Body),
    #[is(name = "return_")]
    Return(Return),
    #[is(name = "if_")]
    If(If),
    Call(Call),
    Function(Function),
    #[is(name = "subscript_node")]
    Subscript(Subscript),
    Sample(Sample),
    Observe(Observe),
    Dist(Dist),
    BinOp(BinOp),
    Unary(Unary),
    #[is(name = "compare_node")]
    Compare(Compare),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: Name,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Def {
    pub name: Name,
    pub value: Box<Node>,
    /// Defined at module level (as opposed to inside an inlined scope).
    pub global: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Let {
    pub target: Name,
    pub source: Box<Node>,
    pub body: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub items: Vec<Node>,
}

impl Body {
    pub fn last_is_return(&self) -> bool {
        matches!(self.items.last(), Some(Node::Return(_)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub value: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub test: Box<Node>,
    pub then: Box<Node>,
    pub orelse: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub function: Box<Node>,
    pub args: Vec<Node>,
    pub keywords: Vec<(Name, Node)>,
}

impl Call {
    pub fn arg_count(&self) -> usize {
        self.args.len() + self.keywords.len()
    }

    /// Name of the callee when it is a plain symbol.
    pub fn function_name(&self) -> Option<&str> {
        match self.function.as_ref() {
            Node::Symbol(s) => Some(&s.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<Name>,
    pub params: Vec<Name>,
    pub vararg: Option<Name>,
    pub defaults: Vec<(Name, Node)>,
    pub body: Box<Node>,
}

impl Function {
    /// Reorders a call's positional and keyword arguments against the
    /// parameter list. Missing parameters take their declared default;
    /// surplus positional arguments are collected by the vararg.
    pub fn order_arguments(&self, args: Vec<Node>, keywords: Vec<(Name, Node)>) -> Result<Vec<Node>> {
        let display_name = self.name.as_deref().unwrap_or("<anonymous>");
        let mut slots: Vec<Option<Node>> = vec![None; self.params.len()];
        let mut rest = Vec::new();
        for (i, arg) in args.into_iter().enumerate() {
            if i < slots.len() {
                slots[i] = Some(arg);
            } else if self.vararg.is_some() {
                rest.push(arg);
            } else {
                return Err(CompileError::arity(
                    display_name,
                    format!("expected at most {} positional argument(s)", self.params.len()),
                ));
            }
        }
        for (key, value) in keywords {
            match self.params.iter().position(|p| *p == key) {
                Some(slot) if slots[slot].is_none() => slots[slot] = Some(value),
                Some(_) => {
                    return Err(CompileError::arity(
                        display_name,
                        format!("duplicate argument for parameter `{key}`"),
                    ));
                }
                None => {
                    return Err(CompileError::arity(
                        display_name,
                        format!("unexpected keyword argument `{key}`"),
                    ));
                }
            }
        }
        let mut ordered = Vec::with_capacity(slots.len() + 1);
        for (slot, param) in slots.into_iter().zip(&self.params) {
            match slot {
                Some(node) => ordered.push(node),
                None => match self.defaults.iter().find(|(name, _)| name == param) {
                    Some((_, default)) => ordered.push(default.clone()),
                    None => {
                        return Err(CompileError::arity(
                            display_name,
                            format!("missing argument for parameter `{param}`"),
                        ));
                    }
                },
            }
        }
        if self.vararg.is_some() {
            ordered.push(make_vector(rest));
        }
        Ok(ordered)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscript {
    pub base: Box<Node>,
    pub index: Box<Node>,
    /// `base[:, index]` selects a column of a matrix literal.
    pub column: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub dist: Box<Node>,
    pub size: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observe {
    pub dist: Box<Node>,
    pub value: Box<Node>,
}

/// A call to a known distribution constructor, tagged by the raw simplifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Dist {
    pub family: Name,
    pub args: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinOp {
    pub left: Box<Node>,
    pub op: Operator,
    pub right: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unary {
    pub op: UnaryOp,
    pub operand: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Compare {
    pub left: Box<Node>,
    pub op: CmpOp,
    pub right: Box<Node>,
}

impl Node {
    pub fn symbol(name: impl Into<Name>) -> Node {
        Node::Symbol(Symbol { name: name.into() })
    }

    pub fn value(value: impl Into<Value>) -> Node {
        Node::Value(value.into())
    }

    pub fn def(name: impl Into<Name>, value: Node) -> Node {
        Node::Def(Def {
            name: name.into(),
            value: Box::new(value),
            global: false,
        })
    }

    pub fn binop(left: Node, op: Operator, right: Node) -> Node {
        Node::BinOp(BinOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn compare(left: Node, op: CmpOp, right: Node) -> Node {
        Node::Compare(Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn subscript(base: Node, index: Node) -> Node {
        Node::Subscript(Subscript {
            base: Box::new(base),
            index: Box::new(index),
            column: false,
        })
    }

    pub fn symbol_name(&self) -> Option<&str> {
        match self {
            Node::Symbol(s) => Some(&s.name),
            _ => None,
        }
    }

    /// Literal integer payload, when this node is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Node::Value(v) => v.as_int(),
            _ => None,
        }
    }

    /// Statically known element count of a vector node.
    pub fn vector_len(&self) -> Option<usize> {
        match self {
            Node::ValueVector(items) => Some(items.len()),
            Node::Vector(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Element `i` of a statically known vector node.
    pub fn vector_item(&self, index: usize) -> Option<Node> {
        match self {
            Node::ValueVector(items) => items.get(index).cloned().map(Node::Value),
            Node::Vector(items) => items.get(index).cloned(),
            _ => None,
        }
    }

    /// Elements of a statically known vector node.
    pub fn vector_items(&self) -> Option<Vec<Node>> {
        match self {
            Node::ValueVector(items) => Some(items.iter().cloned().map(Node::Value).collect()),
            Node::Vector(items) => Some(items.clone()),
            _ => None,
        }
    }

    /// Whether the subtree introduces randomness (contains a `sample` or an
    /// `observe`). Pure subtrees may be duplicated or inlined freely; ones
    /// that fail this test may not.
    pub fn contains_stochastic(&self) -> bool {
        match self {
            Node::Sample(_) | Node::Observe(_) => true,
            Node::Value(_) | Node::ValueVector(_) | Node::Symbol(_) => false,
            Node::Vector(items) => items.iter().any(Node::contains_stochastic),
            Node::Def(d) => d.value.contains_stochastic(),
            Node::Let(l) => l.source.contains_stochastic() || l.body.contains_stochastic(),
            Node::Body(b) => b.items.iter().any(Node::contains_stochastic),
            Node::Return(r) => r.value.contains_stochastic(),
            Node::If(i) => {
                i.test.contains_stochastic()
                    || i.then.contains_stochastic()
                    || i.orelse.as_ref().is_some_and(|e| e.contains_stochastic())
            }
            Node::Call(c) => {
                c.function.contains_stochastic()
                    || c.args.iter().any(Node::contains_stochastic)
                    || c.keywords.iter().any(|(_, n)| n.contains_stochastic())
            }
            Node::Function(f) => f.body.contains_stochastic(),
            Node::Subscript(s) => s.base.contains_stochastic() || s.index.contains_stochastic(),
            Node::Dist(d) => d.args.iter().any(Node::contains_stochastic),
            Node::BinOp(b) => b.left.contains_stochastic() || b.right.contains_stochastic(),
            Node::Unary(u) => u.operand.contains_stochastic(),
            Node::Compare(c) => c.left.contains_stochastic() || c.right.contains_stochastic(),
        }
    }
}

/// Builds a `Body` from a list of items, flattening nested bodies and
/// collapsing the single-item case to the item itself.
pub fn make_body(items: Vec<Node>) -> Node {
    let mut flat = Vec::with_capacity(items.len());
    flatten_into(items, &mut flat);
    match flat.len() {
        0 => Node::Value(Value::Nil),
        1 => flat.into_iter().next().unwrap(),
        _ => Node::Body(Body { items: flat }),
    }
}

fn flatten_into(items: Vec<Node>, out: &mut Vec<Node>) {
    for item in items {
        match item {
            Node::Body(body) => flatten_into(body.items, out),
            other => out.push(other),
        }
    }
}

/// Builds a vector node, demoting to `ValueVector` when every element is a
/// literal.
pub fn make_vector(items: Vec<Node>) -> Node {
    if items.iter().all(|n| n.is_value_node()) {
        let values = items
            .into_iter()
            .map(|n| match n {
                Node::Value(v) => v,
                _ => unreachable!(),
            })
            .collect();
        Node::ValueVector(values)
    } else {
        Node::Vector(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_body_flattens_and_collapses() {
        let body = make_body(vec![
            Node::value(1),
            Node::Body(Body {
                items: vec![Node::value(2), Node::value(3)],
            }),
        ]);
        match body {
            Node::Body(b) => assert_eq!(b.items.len(), 3),
            other => panic!("expected body, got {other:?}"),
        }
        assert_eq!(make_body(vec![Node::value(1)]), Node::value(1));
    }

    #[test]
    fn make_vector_demotes_literals() {
        assert!(make_vector(vec![Node::value(1), Node::value(2)]).is_value_vector());
        assert!(make_vector(vec![Node::value(1), Node::symbol("x")]).is_vector());
    }

    #[test]
    fn order_arguments_applies_keywords_and_defaults() {
        let f = Function {
            name: Some("f".into()),
            params: vec!["a".into(), "b".into(), "c".into()],
            vararg: None,
            defaults: vec![("c".into(), Node::value(3))],
            body: Box::new(Node::value(Value::Nil)),
        };
        let ordered = f
            .order_arguments(vec![Node::value(1)], vec![("b".into(), Node::value(2))])
            .unwrap();
        assert_eq!(ordered, vec![Node::value(1), Node::value(2), Node::value(3)]);
    }

    #[test]
    fn order_arguments_rejects_unknown_keyword() {
        let f = Function {
            name: Some("f".into()),
            params: vec!["a".into()],
            vararg: None,
            defaults: vec![],
            body: Box::new(Node::value(Value::Nil)),
        };
        let err = f
            .order_arguments(vec![], vec![("z".into(), Node::value(1))])
            .unwrap_err();
        assert!(err.to_string().contains("keyword"));
    }

    #[test]
    fn vararg_collects_surplus_positionals() {
        let f = Function {
            name: Some("f".into()),
            params: vec!["a".into()],
            vararg: Some("rest".into()),
            defaults: vec![],
            body: Box::new(Node::value(Value::Nil)),
        };
        let ordered = f
            .order_arguments(vec![Node::value(1), Node::value(2), Node::value(3)], vec![])
            .unwrap();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[1], Node::ValueVector(vec![Value::Int(2), Value::Int(3)]));
    }

    #[test]
    fn stochastic_detection_sees_through_nesting() {
        let sample = Node::Sample(Sample {
            dist: Box::new(Node::Dist(Dist {
                family: "normal".into(),
                args: vec![Node::value(0), Node::value(1)],
            })),
            size: None,
        });
        let wrapped = Node::binop(Node::value(1), Operator::Add, sample);
        assert!(wrapped.contains_stochastic());
        assert!(!Node::symbol("x").contains_stochastic());
    }
}
