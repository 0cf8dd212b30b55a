//! Rendering of AST nodes to canonical source fragments.
//!
//! The graph carries each distribution, guard and observation expression as
//! a string in this mini-grammar; parenthesisation follows a fixed
//! precedence table so identical inputs render byte-identically.

use std::fmt;

use crate::node::*;

mod precedence {
    pub const TEST: u8 = 0;
    pub const OR: u8 = 1;
    pub const AND: u8 = 2;
    pub const NOT: u8 = 3;
    pub const CMP: u8 = 4;
    pub const ARITH: u8 = 5;
    pub const TERM: u8 = 6;
    pub const FACTOR: u8 = 7;
    pub const POWER: u8 = 8;
    pub const ATOM: u8 = 9;
}

struct Unparser<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
}

impl Unparser<'_, '_> {
    fn p(&mut self, s: &str) -> fmt::Result {
        self.f.write_str(s)
    }

    fn p_if(&mut self, cond: bool, s: &str) -> fmt::Result {
        if cond {
            self.f.write_str(s)?;
        }
        Ok(())
    }

    fn p_delim(&mut self, first: &mut bool, s: &str) -> fmt::Result {
        self.p_if(!std::mem::take(first), s)
    }

    fn unparse_seq(&mut self, items: &[Node], level: u8) -> fmt::Result {
        let mut first = true;
        for item in items {
            self.p_delim(&mut first, ", ")?;
            self.unparse(item, level)?;
        }
        Ok(())
    }

    fn unparse(&mut self, node: &Node, level: u8) -> fmt::Result {
        use precedence::*;
        match node {
            Node::Value(value) => write!(self.f, "{value}"),
            Node::ValueVector(values) => {
                self.p("[")?;
                let mut first = true;
                for value in values {
                    self.p_delim(&mut first, ", ")?;
                    write!(self.f, "{value}")?;
                }
                self.p("]")
            }
            Node::Vector(items) => {
                self.p("[")?;
                self.unparse_seq(items, TEST)?;
                self.p("]")
            }
            Node::Symbol(symbol) => self.p(&symbol.name),
            Node::BinOp(bin_op) => {
                let (op, prec) = match bin_op.op {
                    Operator::Or => (" or ", OR),
                    Operator::And => (" and ", AND),
                    Operator::Add => (" + ", ARITH),
                    Operator::Sub => (" - ", ARITH),
                    Operator::Mult => (" * ", TERM),
                    Operator::Div => (" / ", TERM),
                    Operator::FloorDiv => (" // ", TERM),
                    Operator::Mod => (" % ", TERM),
                    Operator::Pow => (" ** ", POWER),
                };
                let right_associative = matches!(bin_op.op, Operator::Pow);
                let group = level > prec;
                self.p_if(group, "(")?;
                self.unparse(&bin_op.left, prec + u8::from(right_associative))?;
                self.p(op)?;
                self.unparse(&bin_op.right, prec + u8::from(!right_associative))?;
                self.p_if(group, ")")
            }
            Node::Unary(unary) => {
                let prec = if unary.op == UnaryOp::Not { NOT } else { FACTOR };
                let group = level > prec;
                self.p_if(group, "(")?;
                self.p(unary.op.as_str())?;
                self.unparse(&unary.operand, prec)?;
                self.p_if(group, ")")
            }
            Node::Compare(compare) => {
                let group = level > CMP;
                self.p_if(group, "(")?;
                self.unparse(&compare.left, CMP + 1)?;
                self.p(" ")?;
                self.p(compare.op.as_str())?;
                self.p(" ")?;
                self.unparse(&compare.right, CMP + 1)?;
                self.p_if(group, ")")
            }
            Node::If(if_) => {
                let group = level > TEST;
                self.p_if(group, "(")?;
                self.unparse(&if_.then, TEST + 1)?;
                self.p(" if ")?;
                self.unparse(&if_.test, TEST + 1)?;
                self.p(" else ")?;
                match &if_.orelse {
                    Some(orelse) => self.unparse(orelse, TEST)?,
                    None => self.p("None")?,
                }
                self.p_if(group, ")")
            }
            Node::Call(call) => {
                self.unparse(&call.function, ATOM)?;
                self.p("(")?;
                let mut first = true;
                for arg in &call.args {
                    self.p_delim(&mut first, ", ")?;
                    self.unparse(arg, TEST)?;
                }
                for (name, value) in &call.keywords {
                    self.p_delim(&mut first, ", ")?;
                    self.p(name)?;
                    self.p("=")?;
                    self.unparse(value, TEST)?;
                }
                self.p(")")
            }
            Node::Dist(dist) => {
                self.p(&dist.family)?;
                self.p("(")?;
                self.unparse_seq(&dist.args, TEST)?;
                self.p(")")
            }
            Node::Sample(sample) => {
                self.p("sample(")?;
                self.unparse(&sample.dist, TEST)?;
                if let Some(size) = &sample.size {
                    self.p(", ")?;
                    self.unparse(size, TEST)?;
                }
                self.p(")")
            }
            Node::Observe(observe) => {
                self.p("observe(")?;
                self.unparse(&observe.dist, TEST)?;
                self.p(", ")?;
                self.unparse(&observe.value, TEST)?;
                self.p(")")
            }
            Node::Subscript(subscript) => {
                self.unparse(&subscript.base, ATOM)?;
                self.p(if subscript.column { "[:, " } else { "[" })?;
                self.unparse(&subscript.index, TEST)?;
                self.p("]")
            }
            Node::Def(def) => {
                self.p(&def.name)?;
                self.p(" = ")?;
                self.unparse(&def.value, TEST)
            }
            Node::Let(let_) => {
                self.p("let ")?;
                self.p(&let_.target)?;
                self.p(" = ")?;
                self.unparse(&let_.source, TEST)?;
                self.p(" in ")?;
                self.unparse(&let_.body, TEST)
            }
            Node::Return(ret) => {
                self.p("return ")?;
                self.unparse(&ret.value, TEST)
            }
            Node::Body(body) => {
                let mut first = true;
                for item in &body.items {
                    self.p_delim(&mut first, "\n")?;
                    self.unparse(item, TEST)?;
                }
                Ok(())
            }
            Node::Function(function) => {
                self.p("def ")?;
                if let Some(name) = &function.name {
                    self.p(name)?;
                }
                self.p("(")?;
                let mut first = true;
                for param in &function.params {
                    self.p_delim(&mut first, ", ")?;
                    self.p(param)?;
                }
                if let Some(vararg) = &function.vararg {
                    self.p_delim(&mut first, ", ")?;
                    self.p("*")?;
                    self.p(vararg)?;
                }
                self.p("): ")?;
                self.unparse(&function.body, TEST)
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Unparser { f }.unparse(self, precedence::TEST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn binop(left: Node, op: Operator, right: Node) -> Node {
        Node::binop(left, op, right)
    }

    #[test]
    fn arithmetic_parenthesisation() {
        let n = binop(
            binop(Node::symbol("a"), Operator::Add, Node::symbol("b")),
            Operator::Mult,
            Node::symbol("c"),
        );
        assert_eq!(n.to_string(), "(a + b) * c");

        let n = binop(
            Node::symbol("a"),
            Operator::Add,
            binop(Node::symbol("b"), Operator::Mult, Node::symbol("c")),
        );
        assert_eq!(n.to_string(), "a + b * c");
    }

    #[test]
    fn power_is_right_associative() {
        let n = binop(
            Node::symbol("a"),
            Operator::Pow,
            binop(Node::symbol("b"), Operator::Pow, Node::symbol("c")),
        );
        assert_eq!(n.to_string(), "a ** b ** c");
        let n = binop(
            binop(Node::symbol("a"), Operator::Pow, Node::symbol("b")),
            Operator::Pow,
            Node::symbol("c"),
        );
        assert_eq!(n.to_string(), "(a ** b) ** c");
    }

    #[test]
    fn subtraction_groups_right_operand() {
        let n = binop(
            Node::symbol("a"),
            Operator::Sub,
            binop(Node::symbol("b"), Operator::Sub, Node::symbol("c")),
        );
        assert_eq!(n.to_string(), "a - (b - c)");
    }

    #[test]
    fn sample_and_observe_forms() {
        let dist = Node::Dist(Dist {
            family: "normal".into(),
            args: vec![Node::value(0), Node::value(1)],
        });
        let sample = Node::Sample(Sample {
            dist: Box::new(dist.clone()),
            size: None,
        });
        assert_eq!(sample.to_string(), "sample(normal(0, 1))");
        let observe = Node::Observe(Observe {
            dist: Box::new(dist),
            value: Box::new(Node::value(0.5)),
        });
        assert_eq!(observe.to_string(), "observe(normal(0, 1), 0.5)");
    }

    #[test]
    fn conditional_expression() {
        let n = Node::If(If {
            test: Box::new(Node::compare(Node::symbol("x"), CmpOp::Gt, Node::value(0))),
            then: Box::new(Node::symbol("a")),
            orelse: Some(Box::new(Node::symbol("b"))),
        });
        assert_eq!(n.to_string(), "a if x > 0 else b");
    }

    #[test]
    fn column_subscript() {
        let n = Node::Subscript(Subscript {
            base: Box::new(Node::symbol("data")),
            index: Box::new(Node::value(1)),
            column: true,
        });
        assert_eq!(n.to_string(), "data[:, 1]");
    }

    #[test]
    fn value_vector_rendering() {
        let n = Node::ValueVector(vec![Value::Float(0.3), Value::Float(0.7)]);
        assert_eq!(n.to_string(), "[0.3, 0.7]");
    }
}
