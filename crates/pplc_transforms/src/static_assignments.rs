//! The static-assignment pass.
//!
//! Nested `Let`/`Body` structure is flattened into one sequence of `Def`s in
//! dependency order. Non-trivial sub-expressions of distributions and
//! observations are hoisted into temporaries so the graph generator only
//! ever sees a symbol in those positions. `If` branches are flattened per
//! branch and survive as conditional statements; samples and observes that
//! occur inside larger expressions are hoisted into their own definitions.

use pplc_ast::{
    make_body, Def, Dist, If, Node, Observe, Result, Return, Sample, Subscript, Value,
};

pub struct StaticAssignments {
    counter: usize,
}

impl StaticAssignments {
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    pub fn run(&mut self, node: Node) -> Result<Node> {
        let mut out = Vec::new();
        let value = self.flatten(node, &mut out)?;
        if !matches!(value, Node::Value(Value::Nil)) {
            out.push(value);
        }
        Ok(make_body(out))
    }

    fn fresh(&mut self) -> String {
        self.counter += 1;
        format!("_t{}", self.counter)
    }

    /// Flattens `node`, emitting definitions into `out`; the returned node
    /// is the residual expression value.
    fn flatten(&mut self, node: Node, out: &mut Vec<Node>) -> Result<Node> {
        match node {
            Node::Body(body) => {
                let mut last = Node::Value(Value::Nil);
                let count = body.items.len();
                for (i, item) in body.items.into_iter().enumerate() {
                    let value = self.flatten(item, out)?;
                    if i + 1 == count {
                        last = value;
                    } else if !is_trivial(&value) {
                        out.push(value);
                    }
                }
                Ok(last)
            }
            Node::Def(def) => {
                if def.value.is_function() {
                    out.push(Node::Def(def));
                    return Ok(Node::Value(Value::Nil));
                }
                let value = self.flatten(*def.value, out)?;
                out.push(Node::Def(Def {
                    name: def.name,
                    value: Box::new(value),
                    global: def.global,
                }));
                Ok(Node::Value(Value::Nil))
            }
            Node::Let(let_) => {
                let source = self.flatten(*let_.source, out)?;
                out.push(Node::Def(Def {
                    name: let_.target,
                    value: Box::new(source),
                    global: false,
                }));
                self.flatten(*let_.body, out)
            }
            Node::If(if_) => {
                let test = self.flatten_operand(*if_.test, out)?;
                let mut then_out = Vec::new();
                let then_value = self.flatten(*if_.then, &mut then_out)?;
                let mut else_out = Vec::new();
                let else_value = match if_.orelse {
                    Some(orelse) => Some(self.flatten(*orelse, &mut else_out)?),
                    None => None,
                };
                let then = rebuild_branch(then_out, then_value);
                let orelse = else_value.map(|value| rebuild_branch(else_out, value));
                Ok(Node::If(If {
                    test: Box::new(test),
                    then: Box::new(then),
                    orelse: orelse.map(Box::new),
                }))
            }
            Node::Sample(sample) => {
                let dist = self.flatten_dist(*sample.dist, out)?;
                let size = match sample.size {
                    Some(size) => Some(Box::new(self.flatten(*size, out)?)),
                    None => None,
                };
                Ok(Node::Sample(Sample {
                    dist: Box::new(dist),
                    size,
                }))
            }
            Node::Observe(observe) => {
                let dist = self.flatten_dist(*observe.dist, out)?;
                let value = self.flatten(*observe.value, out)?;
                let value = self.hoist_if_costly(value, out);
                Ok(Node::Observe(Observe {
                    dist: Box::new(dist),
                    value: Box::new(value),
                }))
            }
            Node::Dist(dist) => self.flatten_dist(Node::Dist(dist), out),
            Node::Return(ret) => {
                let value = self.flatten(*ret.value, out)?;
                Ok(Node::Return(Return {
                    value: Box::new(value),
                }))
            }
            Node::Vector(items) => {
                let items = items
                    .into_iter()
                    .map(|item| {
                        let value = self.flatten(item, out)?;
                        Ok(self.hoist_stochastic(value, out))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Node::Vector(items))
            }
            Node::Call(mut call) => {
                call.function = Box::new(self.flatten(*call.function, out)?);
                call.args = call
                    .args
                    .into_iter()
                    .map(|arg| {
                        let value = self.flatten(arg, out)?;
                        Ok(self.hoist_stochastic(value, out))
                    })
                    .collect::<Result<Vec<_>>>()?;
                call.keywords = call
                    .keywords
                    .into_iter()
                    .map(|(name, value)| {
                        let value = self.flatten(value, out)?;
                        Ok((name, self.hoist_stochastic(value, out)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Node::Call(call))
            }
            Node::BinOp(mut bin_op) => {
                let left = self.flatten(*bin_op.left, out)?;
                bin_op.left = Box::new(self.hoist_stochastic(left, out));
                let right = self.flatten(*bin_op.right, out)?;
                bin_op.right = Box::new(self.hoist_stochastic(right, out));
                Ok(Node::BinOp(bin_op))
            }
            Node::Unary(mut unary) => {
                let operand = self.flatten(*unary.operand, out)?;
                unary.operand = Box::new(self.hoist_stochastic(operand, out));
                Ok(Node::Unary(unary))
            }
            Node::Compare(mut compare) => {
                let left = self.flatten(*compare.left, out)?;
                compare.left = Box::new(self.hoist_stochastic(left, out));
                let right = self.flatten(*compare.right, out)?;
                compare.right = Box::new(self.hoist_stochastic(right, out));
                Ok(Node::Compare(compare))
            }
            Node::Subscript(subscript) => {
                let base = self.flatten(*subscript.base, out)?;
                let index = self.flatten(*subscript.index, out)?;
                Ok(Node::Subscript(Subscript {
                    base: Box::new(self.hoist_stochastic(base, out)),
                    index: Box::new(self.hoist_stochastic(index, out)),
                    column: subscript.column,
                }))
            }
            leaf => Ok(leaf),
        }
    }

    /// Distribution arguments become symbols; anything costlier is hoisted.
    fn flatten_dist(&mut self, node: Node, out: &mut Vec<Node>) -> Result<Node> {
        match node {
            Node::Dist(dist) => {
                let args = dist
                    .args
                    .into_iter()
                    .map(|arg| {
                        let value = self.flatten(arg, out)?;
                        Ok(self.hoist_if_costly(value, out))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Node::Dist(Dist {
                    family: dist.family,
                    args,
                }))
            }
            other => self.flatten(other, out),
        }
    }

    /// Hoists anything that is not a literal or a symbol.
    fn hoist_if_costly(&mut self, node: Node, out: &mut Vec<Node>) -> Node {
        if matches!(
            node,
            Node::Value(_) | Node::ValueVector(_) | Node::Symbol(_)
        ) {
            return node;
        }
        self.hoist(node, out)
    }

    /// Hoists sample/observe expressions embedded in larger expressions so
    /// each random draw has its own definition.
    fn hoist_stochastic(&mut self, node: Node, out: &mut Vec<Node>) -> Node {
        if matches!(node, Node::Sample(_) | Node::Observe(_)) {
            return self.hoist(node, out);
        }
        node
    }

    fn hoist(&mut self, node: Node, out: &mut Vec<Node>) -> Node {
        let name = self.fresh();
        out.push(Node::Def(Def {
            name: name.clone(),
            value: Box::new(node),
            global: false,
        }));
        Node::symbol(name)
    }

    fn flatten_operand(&mut self, node: Node, out: &mut Vec<Node>) -> Result<Node> {
        let value = self.flatten(node, out)?;
        Ok(self.hoist_stochastic(value, out))
    }
}

impl Default for StaticAssignments {
    fn default() -> Self {
        Self::new()
    }
}

fn rebuild_branch(out: Vec<Node>, value: Node) -> Node {
    let mut items = out;
    if !matches!(value, Node::Value(Value::Nil)) || items.is_empty() {
        items.push(value);
    }
    make_body(items)
}

fn is_trivial(node: &Node) -> bool {
    matches!(
        node,
        Node::Value(_) | Node::ValueVector(_) | Node::Symbol(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pplc_ast::{Let, Operator};

    fn run(node: Node) -> Node {
        StaticAssignments::new().run(node).unwrap()
    }

    fn dist(family: &str, args: Vec<Node>) -> Node {
        Node::Dist(Dist {
            family: family.to_owned(),
            args,
        })
    }

    #[test]
    fn nested_lets_become_flat_defs() {
        let node = Node::Let(Let {
            target: "x__L1".into(),
            source: Box::new(Node::value(1)),
            body: Box::new(Node::Let(Let {
                target: "y__L1L2".into(),
                source: Box::new(Node::binop(
                    Node::symbol("x__L1"),
                    Operator::Add,
                    Node::value(1),
                )),
                body: Box::new(Node::symbol("y__L1L2")),
            })),
        });
        let result = run(node);
        let Node::Body(body) = result else {
            panic!("expected body");
        };
        assert!(body.items[0].is_def_node());
        assert!(body.items[1].is_def_node());
        assert_eq!(body.items[2], Node::symbol("y__L1L2"));
    }

    #[test]
    fn distribution_arguments_are_hoisted() {
        let node = Node::Sample(Sample {
            dist: Box::new(dist(
                "normal",
                vec![
                    Node::binop(Node::symbol("a"), Operator::Mult, Node::symbol("b")),
                    Node::value(1),
                ],
            )),
            size: None,
        });
        let result = run(node);
        let Node::Body(body) = result else {
            panic!("expected body, got {result:?}");
        };
        let Node::Def(temp) = &body.items[0] else {
            panic!("expected hoisted def");
        };
        assert_eq!(temp.name, "_t1");
        let Node::Sample(sample) = &body.items[1] else {
            panic!("expected sample");
        };
        let Node::Dist(d) = sample.dist.as_ref() else {
            panic!("expected dist");
        };
        assert_eq!(d.args[0], Node::symbol("_t1"));
    }

    #[test]
    fn embedded_samples_are_given_definitions() {
        let node = Node::def(
            "y",
            Node::binop(
                Node::Sample(Sample {
                    dist: Box::new(dist("normal", vec![Node::value(0), Node::value(1)])),
                    size: None,
                }),
                Operator::Add,
                Node::value(1),
            ),
        );
        let result = run(node);
        let Node::Body(body) = result else {
            panic!("expected body");
        };
        let Node::Def(temp) = &body.items[0] else {
            panic!("expected hoisted sample def");
        };
        assert!(temp.value.is_sample());
        let Node::Def(y) = &body.items[1] else {
            panic!("expected y def");
        };
        assert!(y.value.is_bin_op());
    }

    #[test]
    fn if_branches_flatten_independently() {
        let node = Node::If(If {
            test: Box::new(Node::symbol("c")),
            then: Box::new(Node::Let(Let {
                target: "t__L1".into(),
                source: Box::new(Node::value(1)),
                body: Box::new(Node::symbol("t__L1")),
            })),
            orelse: Some(Box::new(Node::value(2))),
        });
        let result = run(node);
        let Node::If(if_) = result else {
            panic!("expected if, got {result:?}");
        };
        let Node::Body(then) = if_.then.as_ref() else {
            panic!("expected then body, got {:?}", if_.then);
        };
        assert!(then.items[0].is_def_node());
        assert_eq!(then.items[1], Node::symbol("t__L1"));
        assert_eq!(if_.orelse.unwrap().as_ref(), &Node::value(2));
    }

    #[test]
    fn observed_values_are_hoisted_when_costly() {
        let node = Node::Observe(Observe {
            dist: Box::new(dist("normal", vec![Node::symbol("m"), Node::value(1)])),
            value: Box::new(Node::subscript(Node::symbol("data"), Node::value(0))),
        });
        let result = run(node);
        let Node::Body(body) = result else {
            panic!("expected body");
        };
        let Node::Def(temp) = &body.items[0] else {
            panic!("expected hoisted def");
        };
        assert!(temp.value.is_subscript_node());
        let Node::Observe(observe) = &body.items[1] else {
            panic!("expected observe");
        };
        assert_eq!(observe.value.as_ref(), &Node::symbol("_t1"));
    }
}
