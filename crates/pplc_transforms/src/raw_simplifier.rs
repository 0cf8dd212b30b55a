//! Canonicalisation of the raw parser output.
//!
//! Resolves free symbols against the caller-supplied namespace (tagging
//! calls to known distribution constructors as `Dist` nodes), flattens
//! trivial constructs and folds literal arithmetic. The pass runs once
//! directly after parsing and once more after inlining.

use rustc_hash::FxHashMap;

use pplc_ast::fold::{self, Fold};
use pplc_ast::{
    dist, make_body, make_vector, BinOp, Call, Compare, CompileError, Dist, Let, Node, Result,
    Symbol, Unary, Value,
};

pub struct RawSimplifier {
    namespace: FxHashMap<String, String>,
}

impl RawSimplifier {
    pub fn new(namespace: &FxHashMap<String, String>) -> Self {
        Self {
            namespace: namespace.clone(),
        }
    }

    pub fn run(&mut self, node: Node) -> Result<Node> {
        self.fold_node(node)
    }

    /// Builds a `Dist` node from a call to a distribution constructor,
    /// reordering keyword arguments against the family's parameter list.
    fn make_dist(&self, family: &'static dist::Family, call: Call) -> Result<Node> {
        let mut slots: Vec<Option<Node>> = vec![None; family.arity()];
        if call.args.len() > family.arity() {
            return Err(CompileError::arity(
                family.name,
                format!(
                    "expected {} argument(s), found {}",
                    family.arity(),
                    call.arg_count()
                ),
            ));
        }
        for (slot, arg) in slots.iter_mut().zip(call.args) {
            *slot = Some(arg);
        }
        for (key, value) in call.keywords {
            match family.params.iter().position(|p| *p == key) {
                Some(i) if slots[i].is_none() => slots[i] = Some(value),
                Some(_) => {
                    return Err(CompileError::arity(
                        family.name,
                        format!("duplicate argument for parameter `{key}`"),
                    ));
                }
                None => {
                    return Err(CompileError::arity(
                        family.name,
                        format!("unexpected keyword argument `{key}`"),
                    ));
                }
            }
        }
        let args = slots
            .into_iter()
            .zip(family.params)
            .map(|(slot, param)| {
                slot.ok_or_else(|| {
                    CompileError::arity(
                        family.name,
                        format!("missing argument for parameter `{param}`"),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Node::Dist(Dist {
            family: family.name.to_owned(),
            args,
        }))
    }
}

impl Fold for RawSimplifier {
    fn fold_symbol(&mut self, symbol: Symbol) -> Result<Node> {
        match self.namespace.get(&symbol.name) {
            Some(target) if *target != symbol.name => Ok(Node::symbol(target.clone())),
            _ => Ok(Node::Symbol(symbol)),
        }
    }

    fn fold_call(&mut self, call: Call) -> Result<Node> {
        let folded = fold::fold_call(self, call)?;
        let Node::Call(call) = folded else {
            return Ok(folded);
        };
        if let Some(family) = call.function_name().and_then(dist::lookup) {
            return self.make_dist(family, call);
        }
        Ok(Node::Call(call))
    }

    fn fold_let(&mut self, let_: Let) -> Result<Node> {
        if let_.target == "_" {
            let source = self.fold_node(*let_.source)?;
            let body = self.fold_node(*let_.body)?;
            Ok(make_body(vec![source, body]))
        } else {
            fold::fold_let(self, let_)
        }
    }

    fn fold_vector(&mut self, items: Vec<Node>) -> Result<Node> {
        let items = items
            .into_iter()
            .map(|item| self.fold_node(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(make_vector(items))
    }

    fn fold_bin_op(&mut self, bin_op: BinOp) -> Result<Node> {
        let folded = fold::fold_bin_op(self, bin_op)?;
        let Node::BinOp(b) = &folded else {
            return Ok(folded);
        };
        if let (Node::Value(left), Node::Value(right)) = (b.left.as_ref(), b.right.as_ref()) {
            if let Some(value) = Value::apply_binary(b.op, left, right) {
                return Ok(Node::Value(value));
            }
        }
        Ok(folded)
    }

    fn fold_unary(&mut self, unary: Unary) -> Result<Node> {
        let folded = fold::fold_unary(self, unary)?;
        let Node::Unary(u) = &folded else {
            return Ok(folded);
        };
        if let Node::Value(operand) = u.operand.as_ref() {
            if let Some(value) = Value::apply_unary(u.op, operand) {
                return Ok(Node::Value(value));
            }
        }
        Ok(folded)
    }

    fn fold_compare(&mut self, compare: Compare) -> Result<Node> {
        let folded = fold::fold_compare(self, compare)?;
        let Node::Compare(c) = &folded else {
            return Ok(folded);
        };
        if let (Node::Value(left), Node::Value(right)) = (c.left.as_ref(), c.right.as_ref()) {
            if let Some(value) = Value::apply_compare(c.op, left, right) {
                return Ok(Node::Value(value));
            }
        }
        Ok(folded)
    }
}
