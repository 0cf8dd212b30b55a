//! The algebraic simplifier.
//!
//! Constant folding, identity rewrites, literal `if` reduction, subscript
//! and length folding, scalar/vector broadcasting and the vectorised
//! `sample`/`observe` unrolling. The pass is run to a fixpoint: each round
//! is compared structurally with its input and the loop stops when nothing
//! changes, which also makes the pass idempotent by construction.

use rustc_hash::{FxHashMap, FxHashSet};

use pplc_ast::fold::{self, Fold};
use pplc_ast::{
    dist, make_body, make_vector, BinOp, Call, Compare, CompileError, Def, Dist, If, Name, Node,
    Observe, Operator, Result, Sample, Subscript, Symbol, Unary, Value,
};

const MAX_ROUNDS: usize = 64;

pub struct Simplifier {
    bindings: FxHashMap<Name, Node>,
}

impl Simplifier {
    pub fn new() -> Self {
        Self {
            bindings: FxHashMap::default(),
        }
    }

    pub fn run(&mut self, node: Node) -> Result<Node> {
        let mut current = node;
        for round in 0..MAX_ROUNDS {
            self.bindings.clear();
            let next = self.fold_node(current.clone())?;
            if next == current {
                log::debug!("simplifier reached a fixpoint after {round} round(s)");
                return Ok(prune_dead_defs(next));
            }
            current = next;
        }
        log::debug!("simplifier stopped at the round limit");
        Ok(prune_dead_defs(current))
    }

    /// Elements of a statically known vector, looking through one level of
    /// definition. Callers must check element purity before duplicating.
    fn vector_view(&self, node: &Node) -> Option<Vec<Node>> {
        match node {
            Node::ValueVector(_) | Node::Vector(_) => node.vector_items(),
            Node::Symbol(s) => match self.bindings.get(&s.name) {
                Some(binding @ (Node::ValueVector(_) | Node::Vector(_))) => binding.vector_items(),
                _ => None,
            },
            _ => None,
        }
    }

    /// Like [`Self::vector_view`], but only when every element may be
    /// duplicated (no sample or observe inside).
    fn pure_vector_view(&self, node: &Node) -> Option<Vec<Node>> {
        let items = self.vector_view(node)?;
        items
            .iter()
            .all(|item| !item.contains_stochastic())
            .then_some(items)
    }
}

impl Default for Simplifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Fold for Simplifier {
    fn fold_def(&mut self, def: Def) -> Result<Node> {
        let value = self.fold_node(*def.value)?;
        self.bindings.insert(def.name.clone(), value.clone());
        Ok(Node::Def(Def {
            name: def.name,
            value: Box::new(value),
            global: def.global,
        }))
    }

    fn fold_symbol(&mut self, symbol: Symbol) -> Result<Node> {
        // scalar constants propagate; everything else stays a reference
        match self.bindings.get(&symbol.name) {
            Some(Node::Value(value)) => Ok(Node::Value(value.clone())),
            _ => Ok(Node::Symbol(symbol)),
        }
    }

    fn fold_vector(&mut self, items: Vec<Node>) -> Result<Node> {
        let items = items
            .into_iter()
            .map(|item| self.fold_node(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(make_vector(items))
    }

    fn fold_if(&mut self, if_: If) -> Result<Node> {
        let test = self.fold_node(*if_.test)?;
        if let Node::Value(value) = &test {
            return if value.is_truthy() {
                self.fold_node(*if_.then)
            } else {
                match if_.orelse {
                    Some(orelse) => self.fold_node(*orelse),
                    None => Ok(Node::Value(Value::Nil)),
                }
            };
        }
        // branch-local definitions must not leak into the other branch or
        // past the conditional
        let snapshot = self.bindings.clone();
        let then = self.fold_node(*if_.then)?;
        self.bindings = snapshot.clone();
        let orelse = match if_.orelse {
            Some(orelse) => Some(Box::new(self.fold_node(*orelse)?)),
            None => None,
        };
        self.bindings = snapshot;
        let mut assigned = FxHashSet::default();
        collect_def_names(&then, &mut assigned);
        if let Some(orelse) = &orelse {
            collect_def_names(orelse, &mut assigned);
        }
        for name in assigned {
            self.bindings.remove(&name);
        }
        Ok(Node::If(If {
            test: Box::new(test),
            then: Box::new(then),
            orelse,
        }))
    }

    fn fold_bin_op(&mut self, bin_op: BinOp) -> Result<Node> {
        let folded = fold::fold_bin_op(self, bin_op)?;
        let Node::BinOp(b) = folded else {
            return Ok(folded);
        };
        if let (Node::Value(left), Node::Value(right)) = (b.left.as_ref(), b.right.as_ref()) {
            if let Some(value) = Value::apply_binary(b.op, left, right) {
                return Ok(Node::Value(value));
            }
        }
        // boolean short-circuits on a literal left operand
        if let Node::Value(left) = b.left.as_ref() {
            match b.op {
                Operator::And => {
                    return Ok(if left.is_truthy() {
                        *b.right
                    } else {
                        Node::Value(left.clone())
                    });
                }
                Operator::Or => {
                    return Ok(if left.is_truthy() {
                        Node::Value(left.clone())
                    } else {
                        *b.right
                    });
                }
                _ => {}
            }
        }
        // arithmetic identities
        if let Node::Value(right) = b.right.as_ref() {
            let neutral = match (b.op, right) {
                (Operator::Add | Operator::Sub, v) => v.as_f64() == Some(0.0),
                (Operator::Mult | Operator::Div, v) => v.as_f64() == Some(1.0),
                _ => false,
            };
            if neutral {
                return Ok(*b.left);
            }
        }
        if let Node::Value(left) = b.left.as_ref() {
            let neutral = match (b.op, left) {
                (Operator::Add, v) => v.as_f64() == Some(0.0),
                (Operator::Mult, v) => v.as_f64() == Some(1.0),
                _ => false,
            };
            if neutral {
                return Ok(*b.right);
            }
        }
        // broadcasting over statically known vectors
        let left_view = self.pure_vector_view(&b.left);
        let right_view = self.pure_vector_view(&b.right);
        match (left_view, right_view) {
            (Some(left), Some(right)) if left.len() == right.len() => {
                let items = left
                    .into_iter()
                    .zip(right)
                    .map(|(l, r)| Node::binop(l, b.op, r))
                    .collect();
                return Ok(make_vector(items));
            }
            (Some(left), None)
                if !b.right.contains_stochastic() && self.vector_view(&b.right).is_none() =>
            {
                let items = left
                    .into_iter()
                    .map(|l| Node::binop(l, b.op, b.right.as_ref().clone()))
                    .collect();
                return Ok(make_vector(items));
            }
            (None, Some(right))
                if !b.left.contains_stochastic() && self.vector_view(&b.left).is_none() =>
            {
                let items = right
                    .into_iter()
                    .map(|r| Node::binop(b.left.as_ref().clone(), b.op, r))
                    .collect();
                return Ok(make_vector(items));
            }
            _ => {}
        }
        Ok(Node::BinOp(b))
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

    fn fold_subscript(&mut self, subscript: Subscript) -> Result<Node> {
        let folded = fold::fold_subscript(self, subscript)?;
        let Node::Subscript(s) = folded else {
            return Ok(folded);
        };
        let index = s.index.as_int().and_then(|i| usize::try_from(i).ok());
        if let Some(index) = index {
            if s.column {
                // column of a statically known matrix
                if let Some(rows) = self.vector_view(&s.base) {
                    let column: Option<Vec<Node>> = rows
                        .iter()
                        .map(|row| {
                            self.vector_view(row)
                                .and_then(|items| items.get(index).cloned())
                        })
                        .collect();
                    if let Some(column) = column {
                        if column.iter().all(|item| !item.contains_stochastic()) {
                            return Ok(make_vector(column));
                        }
                    }
                }
            } else if let Some(items) = self.vector_view(&s.base) {
                if let Some(element) = items.get(index) {
                    if !element.contains_stochastic() {
                        return Ok(element.clone());
                    }
                }
            }
        }
        Ok(Node::Subscript(s))
    }

    fn fold_call(&mut self, call: Call) -> Result<Node> {
        let folded = fold::fold_call(self, call)?;
        let Node::Call(call) = folded else {
            return Ok(folded);
        };
        let arg = |i: usize| call.args.get(i);
        match (call.function_name(), call.args.len()) {
            (Some("len"), 1) => {
                if let Some(items) = self.vector_view(&call.args[0]) {
                    return Ok(Node::value(items.len() as i64));
                }
            }
            (Some("zeros"), 1) | (Some("ones"), 1) => {
                if let Some(n) = arg(0).and_then(Node::as_int) {
                    if n >= 0 {
                        let fill = if call.function_name() == Some("zeros") {
                            0.0
                        } else {
                            1.0
                        };
                        return Ok(Node::ValueVector(vec![Value::Float(fill); n as usize]));
                    }
                }
            }
            (Some("range"), 1) => {
                if let Some(n) = arg(0).and_then(Node::as_int) {
                    if n >= 0 {
                        return Ok(Node::ValueVector((0..n).map(Value::Int).collect()));
                    }
                }
            }
            (Some("sum"), 1) => {
                if let Some(items) = self.vector_view(&call.args[0]) {
                    let values: Option<Vec<&Value>> = items
                        .iter()
                        .map(|item| match item {
                            Node::Value(v) if v.is_numeric() => Some(v),
                            _ => None,
                        })
                        .collect();
                    if let Some(values) = values {
                        let mut acc = Value::Int(0);
                        for value in values {
                            match Value::apply_binary(Operator::Add, &acc, value) {
                                Some(next) => acc = next,
                                None => return Ok(Node::Call(call)),
                            }
                        }
                        return Ok(Node::Value(acc));
                    }
                }
            }
            (Some(name @ ("first" | "second")), 1) => {
                let index = if name == "first" { 0 } else { 1 };
                if let Some(items) = self.vector_view(&call.args[0]) {
                    if let Some(element) = items.get(index) {
                        if !element.contains_stochastic() {
                            return Ok(element.clone());
                        }
                    }
                }
            }
            (Some("rest"), 1) => {
                if let Some(items) = self.pure_vector_view(&call.args[0]) {
                    if !items.is_empty() {
                        return Ok(make_vector(items[1..].to_vec()));
                    }
                }
            }
            (Some(name @ ("sqrt" | "exp" | "log" | "abs")), 1) => {
                if let Some(x) = arg(0).and_then(|a| match a {
                    Node::Value(v) => v.as_f64(),
                    _ => None,
                }) {
                    let result = match name {
                        "sqrt" => x.sqrt(),
                        "exp" => x.exp(),
                        "log" => x.ln(),
                        _ => x.abs(),
                    };
                    if result.is_finite() {
                        return Ok(Node::value(result));
                    }
                }
            }
            _ => {}
        }
        Ok(Node::Call(call))
    }

    fn fold_sample(&mut self, sample: Sample) -> Result<Node> {
        let folded = fold::fold_sample(self, sample)?;
        let Node::Sample(sample) = folded else {
            return Ok(folded);
        };
        if let Some(size) = &sample.size {
            match size.as_ref() {
                Node::Value(Value::Int(n)) => {
                    let n = *n;
                    if n < 0 {
                        return Err(CompileError::static_value(
                            "sample size must not be negative",
                        ));
                    }
                    let dist = sample.dist;
                    if n == 1 {
                        return Ok(Node::Sample(Sample { dist, size: None }));
                    }
                    let draws = (0..n)
                        .map(|_| {
                            Node::Sample(Sample {
                                dist: dist.clone(),
                                size: None,
                            })
                        })
                        .collect();
                    return Ok(Node::Vector(draws));
                }
                Node::Value(_) => {
                    return Err(CompileError::static_value(
                        "sample size must be an integer literal",
                    ));
                }
                _ => return Ok(Node::Sample(sample)),
            }
        }
        // element-wise unrolling of vector arguments for scalar families
        if let Node::Dist(d) = sample.dist.as_ref() {
            if let Some(unrolled) = self.unroll_dist(d)? {
                let draws = unrolled
                    .into_iter()
                    .map(|dist| {
                        Node::Sample(Sample {
                            dist: Box::new(Node::Dist(dist)),
                            size: None,
                        })
                    })
                    .collect();
                return Ok(Node::Vector(draws));
            }
        }
        Ok(Node::Sample(sample))
    }

    fn fold_observe(&mut self, observe: Observe) -> Result<Node> {
        let folded = fold::fold_observe(self, observe)?;
        let Node::Observe(observe) = folded else {
            return Ok(folded);
        };
        if let Node::Dist(d) = observe.dist.as_ref() {
            if let Some(unrolled) = self.unroll_dist(d)? {
                let Some(values) = self.pure_vector_view(&observe.value) else {
                    return Ok(Node::Observe(observe));
                };
                if values.len() != unrolled.len() {
                    return Err(CompileError::graph(format!(
                        "observed {} value(s) against {} element-wise distribution(s)",
                        values.len(),
                        unrolled.len()
                    )));
                }
                let observes = unrolled
                    .into_iter()
                    .zip(values)
                    .map(|(dist, value)| {
                        Node::Observe(Observe {
                            dist: Box::new(Node::Dist(dist)),
                            value: Box::new(value),
                        })
                    })
                    .collect();
                return Ok(make_body(observes));
            }
        }
        Ok(Node::Observe(observe))
    }
}

impl Simplifier {
    /// Element-wise distributions for a scalar-parameter family whose
    /// arguments are statically known vectors of one length; `None` when
    /// the distribution is already scalar (or cannot be unrolled).
    fn unroll_dist(&self, d: &Dist) -> Result<Option<Vec<Dist>>> {
        let Some(family) = dist::lookup(&d.family) else {
            return Ok(None);
        };
        if family.vector_params {
            return Ok(None);
        }
        let views: Vec<Option<Vec<Node>>> = d
            .args
            .iter()
            .map(|arg| self.pure_vector_view(arg))
            .collect();
        let mut length = None;
        for view in views.iter().flatten() {
            match length {
                None => length = Some(view.len()),
                Some(n) if n == view.len() => {}
                Some(_) => return Ok(None),
            }
        }
        let Some(length) = length else {
            return Ok(None);
        };
        // scalar arguments broadcast across elements; they must be safe to
        // duplicate
        for (arg, view) in d.args.iter().zip(&views) {
            if view.is_none() && arg.contains_stochastic() {
                return Ok(None);
            }
        }
        let dists = (0..length)
            .map(|i| Dist {
                family: d.family.clone(),
                args: d
                    .args
                    .iter()
                    .zip(&views)
                    .map(|(arg, view)| match view {
                        Some(items) => items[i].clone(),
                        None => arg.clone(),
                    })
                    .collect(),
            })
            .collect();
        Ok(Some(dists))
    }
}

/// Removes pure definitions whose names are never referenced. Folding and
/// unrolling leave behind hoisted temporaries (and sometimes the original
/// data binding); they carry no semantics once their uses are gone.
/// Stochastic definitions always survive, as do retained function
/// definitions.
fn prune_dead_defs(mut node: Node) -> Node {
    loop {
        let mut used = FxHashSet::default();
        collect_symbol_uses(&node, &mut used);
        let mut removed = false;
        node = remove_dead_defs(node, &used, &mut removed);
        if !removed {
            return node;
        }
    }
}

fn collect_symbol_uses(node: &Node, out: &mut FxHashSet<Name>) {
    match node {
        Node::Symbol(s) => {
            out.insert(s.name.clone());
        }
        // retained function definitions are never called again; their
        // bodies do not keep other definitions alive
        Node::Function(_) => {}
        _ => for_each_child(node, &mut |child| collect_symbol_uses(child, out)),
    }
}

fn remove_dead_defs(node: Node, used: &FxHashSet<Name>, removed: &mut bool) -> Node {
    match node {
        Node::Body(body) => {
            let items = body
                .items
                .into_iter()
                .filter_map(|item| match item {
                    Node::Def(d)
                        if !used.contains(&d.name)
                            && !d.value.contains_stochastic()
                            && !d.value.is_function() =>
                    {
                        *removed = true;
                        None
                    }
                    other => Some(remove_dead_defs(other, used, removed)),
                })
                .collect();
            make_body(items)
        }
        Node::If(if_) => Node::If(pplc_ast::If {
            test: if_.test,
            then: Box::new(remove_dead_defs(*if_.then, used, removed)),
            orelse: if_
                .orelse
                .map(|orelse| Box::new(remove_dead_defs(*orelse, used, removed))),
        }),
        other => other,
    }
}

fn for_each_child(node: &Node, f: &mut impl FnMut(&Node)) {
    match node {
        Node::Value(_) | Node::ValueVector(_) | Node::Symbol(_) => {}
        Node::Vector(items) => items.iter().for_each(f),
        Node::Def(d) => f(&d.value),
        Node::Let(l) => {
            f(&l.source);
            f(&l.body);
        }
        Node::Body(b) => b.items.iter().for_each(f),
        Node::Return(r) => f(&r.value),
        Node::If(i) => {
            f(&i.test);
            f(&i.then);
            if let Some(orelse) = &i.orelse {
                f(orelse);
            }
        }
        Node::Call(c) => {
            f(&c.function);
            c.args.iter().for_each(&mut *f);
            c.keywords.iter().for_each(|(_, value)| f(value));
        }
        Node::Function(func) => f(&func.body),
        Node::Subscript(s) => {
            f(&s.base);
            f(&s.index);
        }
        Node::Sample(s) => {
            f(&s.dist);
            if let Some(size) = &s.size {
                f(size);
            }
        }
        Node::Observe(o) => {
            f(&o.dist);
            f(&o.value);
        }
        Node::Dist(d) => d.args.iter().for_each(f),
        Node::BinOp(b) => {
            f(&b.left);
            f(&b.right);
        }
        Node::Unary(u) => f(&u.operand),
        Node::Compare(c) => {
            f(&c.left);
            f(&c.right);
        }
    }
}

fn collect_def_names(node: &Node, out: &mut FxHashSet<Name>) {
    match node {
        Node::Def(d) => {
            out.insert(d.name.clone());
            collect_def_names(&d.value, out);
        }
        Node::Body(b) => {
            for item in &b.items {
                collect_def_names(item, out);
            }
        }
        Node::If(i) => {
            collect_def_names(&i.then, out);
            if let Some(orelse) = &i.orelse {
                collect_def_names(orelse, out);
            }
        }
        Node::Let(l) => {
            collect_def_names(&l.source, out);
            collect_def_names(&l.body, out);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pplc_ast::Body;

    fn simplify(node: Node) -> Node {
        Simplifier::new().run(node).unwrap()
    }

    fn normal(args: Vec<Node>) -> Node {
        Node::Dist(Dist {
            family: "normal".into(),
            args,
        })
    }

    #[test]
    fn constants_propagate_through_definitions() {
        let node = make_body(vec![
            Node::def("n", Node::value(3)),
            Node::binop(Node::symbol("n"), Operator::Mult, Node::value(2)),
        ]);
        // the definition is propagated away entirely
        assert_eq!(simplify(node), Node::value(6));
    }

    #[test]
    fn literal_conditionals_reduce() {
        let node = Node::If(If {
            test: Box::new(Node::compare(Node::value(1), pplc_ast::CmpOp::Lt, Node::value(2))),
            then: Box::new(Node::symbol("a")),
            orelse: Some(Box::new(Node::symbol("b"))),
        });
        assert_eq!(simplify(node), Node::symbol("a"));
    }

    #[test]
    fn branch_definitions_do_not_leak() {
        // x = 1; if c: x = 2; x
        let node = make_body(vec![
            Node::def("x", Node::value(1)),
            Node::If(If {
                test: Box::new(Node::symbol("c")),
                then: Box::new(Node::def("x", Node::value(2))),
                orelse: None,
            }),
            Node::symbol("x"),
        ]);
        let Node::Body(body) = simplify(node) else {
            panic!("expected body");
        };
        assert_eq!(
            body.items.last(),
            Some(&Node::symbol("x")),
            "a conditionally reassigned name must not constant-fold"
        );
    }

    #[test]
    fn subscripts_into_literal_vectors_reduce() {
        let node = Node::subscript(
            Node::ValueVector(vec![Value::Int(10), Value::Int(20)]),
            Node::value(1),
        );
        assert_eq!(simplify(node), Node::value(20));
    }

    #[test]
    fn column_extraction_from_literal_matrix() {
        let matrix = Node::Vector(vec![
            Node::ValueVector(vec![Value::Float(1.0), Value::Float(2.1)]),
            Node::ValueVector(vec![Value::Float(2.0), Value::Float(3.9)]),
        ]);
        let node = Node::Subscript(Subscript {
            base: Box::new(matrix),
            index: Box::new(Node::value(0)),
            column: true,
        });
        assert_eq!(
            simplify(node),
            Node::ValueVector(vec![Value::Float(1.0), Value::Float(2.0)])
        );
    }

    #[test]
    fn scalar_vector_broadcast_is_symbolic() {
        // slope * [1.0, 2.0] + 1.0
        let node = Node::binop(
            Node::binop(
                Node::symbol("slope"),
                Operator::Mult,
                Node::ValueVector(vec![Value::Float(1.0), Value::Float(2.0)]),
            ),
            Operator::Add,
            Node::value(1.0),
        );
        let result = simplify(node);
        let Node::Vector(items) = result else {
            panic!("expected broadcast vector, got {result:?}");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].to_string(),
            "slope * 1.0 + 1.0",
            "element-wise expression expected"
        );
    }

    #[test]
    fn builtins_fold_on_literals() {
        let len = Node::Call(Call {
            function: Box::new(Node::symbol("len")),
            args: vec![Node::ValueVector(vec![Value::Int(1), Value::Int(2)])],
            keywords: vec![],
        });
        assert_eq!(simplify(len), Node::value(2));
        let ones = Node::Call(Call {
            function: Box::new(Node::symbol("ones")),
            args: vec![Node::value(3)],
            keywords: vec![],
        });
        assert_eq!(
            simplify(ones),
            Node::ValueVector(vec![Value::Float(1.0); 3])
        );
    }

    #[test]
    fn first_and_second_extract_elements() {
        let call = |name: &str, arg: Node| {
            Node::Call(Call {
                function: Box::new(Node::symbol(name)),
                args: vec![arg],
                keywords: vec![],
            })
        };
        let vv = Node::ValueVector(vec![Value::Int(10), Value::Int(20)]);
        assert_eq!(simplify(call("first", vv.clone())), Node::value(10));
        assert_eq!(simplify(call("second", vv)), Node::value(20));

        // resolves through a definition too
        let node = make_body(vec![
            Node::def("v", Node::ValueVector(vec![Value::Float(0.5), Value::Float(1.5)])),
            call("second", Node::symbol("v")),
        ]);
        assert_eq!(simplify(node), Node::value(1.5));

        // elements that sample are never extracted
        let draws = Node::Vector(vec![
            Node::Sample(Sample {
                dist: Box::new(Node::Dist(Dist {
                    family: "normal".into(),
                    args: vec![Node::value(0), Node::value(1)],
                })),
                size: None,
            }),
            Node::value(2),
        ]);
        let node = make_body(vec![
            Node::def("d", draws),
            call("first", Node::symbol("d")),
        ]);
        let Node::Body(body) = simplify(node) else {
            panic!("expected body");
        };
        assert!(body.items.last().unwrap().is_call());
    }

    #[test]
    fn sample_size_unrolls() {
        let node = Node::Sample(Sample {
            dist: Box::new(Node::Dist(Dist {
                family: "categorical".into(),
                args: vec![Node::symbol("pi")],
            })),
            size: Some(Box::new(Node::value(3))),
        });
        let Node::Vector(draws) = simplify(node) else {
            panic!("expected unrolled vector");
        };
        assert_eq!(draws.len(), 3);
        assert!(draws.iter().all(Node::is_sample));
    }

    #[test]
    fn vector_arguments_unroll_scalar_families() {
        let node = Node::Sample(Sample {
            dist: Box::new(normal(vec![
                Node::ValueVector(vec![Value::Float(0.0), Value::Float(0.0)]),
                Node::ValueVector(vec![Value::Float(2.0), Value::Float(2.0)]),
            ])),
            size: None,
        });
        let Node::Vector(draws) = simplify(node) else {
            panic!("expected unrolled vector");
        };
        assert_eq!(draws.len(), 2);
    }

    #[test]
    fn vector_parameter_families_stay_whole() {
        let node = Node::Sample(Sample {
            dist: Box::new(Node::Dist(Dist {
                family: "categorical".into(),
                args: vec![Node::ValueVector(vec![
                    Value::Float(0.5),
                    Value::Float(0.5),
                ])],
            })),
            size: None,
        });
        assert!(simplify(node).is_sample());
    }

    #[test]
    fn observe_against_vectors_unrolls_elementwise() {
        let node = Node::Observe(Observe {
            dist: Box::new(normal(vec![
                Node::Vector(vec![
                    Node::binop(Node::symbol("m"), Operator::Mult, Node::value(1.0)),
                    Node::binop(Node::symbol("m"), Operator::Mult, Node::value(2.0)),
                ]),
                Node::ValueVector(vec![Value::Float(1.0), Value::Float(1.0)]),
            ])),
            value: Box::new(Node::ValueVector(vec![
                Value::Float(2.1),
                Value::Float(3.9),
            ])),
        });
        let Node::Body(Body { items }) = simplify(node) else {
            panic!("expected body of observes");
        };
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(Node::is_observe));
    }

    #[test]
    fn observe_length_mismatch_is_an_error() {
        let node = Node::Observe(Observe {
            dist: Box::new(normal(vec![
                Node::ValueVector(vec![Value::Float(0.0), Value::Float(0.0)]),
                Node::value(1.0),
            ])),
            value: Box::new(Node::ValueVector(vec![
                Value::Float(1.0),
                Value::Float(2.0),
                Value::Float(3.0),
            ])),
        });
        let err = Simplifier::new().run(node).unwrap_err();
        assert!(matches!(err, CompileError::Graph { .. }));
    }

    #[test]
    fn applying_twice_equals_applying_once() {
        let node = make_body(vec![
            Node::def("n", Node::value(2)),
            Node::def(
                "v",
                Node::binop(
                    Node::symbol("n"),
                    Operator::Mult,
                    Node::ValueVector(vec![Value::Float(1.0), Value::Float(2.0)]),
                ),
            ),
            Node::subscript(Node::symbol("v"), Node::value(0)),
        ]);
        let once = Simplifier::new().run(node).unwrap();
        let twice = Simplifier::new().run(once.clone()).unwrap();
        assert_eq!(once, twice);
    }
}
