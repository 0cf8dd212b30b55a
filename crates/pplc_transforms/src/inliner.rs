//! The function inliner.
//!
//! Every call to a user-defined function is replaced by a renamed copy of
//! the function's body; `map` and `zip` over statically known sequences are
//! expanded element-wise first. Hygiene comes from a per-call suffix minted
//! from a monotonic counter, so compilation is reproducible.

use pplc_ast::fold::{self, Fold};
use pplc_ast::types::TypeInfo;
use pplc_ast::{
    make_body, make_vector, Call, CompileError, Def, Function, Let, Node, Result, Symbol,
};

use crate::scope::ScopeStack;
use crate::type_inference::TypeInferencer;

const MAX_INLINE_DEPTH: usize = 64;

pub struct FunctionInliner {
    scopes: ScopeStack,
    let_counter: usize,
    tmp_counter: usize,
    depth: usize,
}

impl FunctionInliner {
    pub fn new() -> Self {
        Self {
            scopes: ScopeStack::new(),
            let_counter: 0,
            tmp_counter: 0,
            depth: 0,
        }
    }

    pub fn run(&mut self, node: Node) -> Result<Node> {
        self.fold_node(node)
    }

    fn next_tmp(&mut self) -> String {
        self.tmp_counter += 1;
        format!("__{}", self.tmp_counter)
    }

    fn scoped<T>(&mut self, suffix: String, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.enter(suffix);
        let result = f(self);
        self.scopes.exit();
        result
    }

    fn get_type(&self, node: &Node) -> TypeInfo {
        let resolver = |name: &str| self.scopes.resolve(name).cloned();
        TypeInferencer::new(&resolver).infer(node)
    }

    /// The user function a call refers to, if any.
    fn callee(&self, function: &Node) -> Option<Function> {
        match function {
            Node::Symbol(s) => match self.scopes.resolve(&s.name) {
                Some(Node::Function(f)) => Some(f.clone()),
                _ => None,
            },
            Node::Function(f) => Some(f.clone()),
            _ => None,
        }
    }

    fn call_generic(&mut self, call: Call) -> Result<Node> {
        match self.callee(&call.function) {
            Some(function) => self.inline(function, call),
            None => fold::fold_call(self, call),
        }
    }

    fn inline(&mut self, function: Function, call: Call) -> Result<Node> {
        if self.depth >= MAX_INLINE_DEPTH {
            return Err(CompileError::static_value(format!(
                "function `{}` exceeds the inline depth limit (recursive functions cannot \
                 be compiled to a graph)",
                function.name.as_deref().unwrap_or("<anonymous>")
            )));
        }
        let args = call
            .args
            .into_iter()
            .map(|arg| self.fold_node(arg))
            .collect::<Result<Vec<_>>>()?;
        let keywords = call
            .keywords
            .into_iter()
            .map(|(name, value)| Ok((name, self.fold_node(value)?)))
            .collect::<Result<Vec<_>>>()?;
        let mut params = function.params.clone();
        if let Some(vararg) = &function.vararg {
            params.push(vararg.clone());
        }
        let ordered = function.order_arguments(args, keywords)?;
        let tmp = self.next_tmp();
        let mut prelude = Vec::new();
        for (param, arg) in params.iter().zip(&ordered) {
            if param != "_" && !arg.is_symbol_node() {
                prelude.push(Node::Def(Def {
                    name: format!("{param}{tmp}"),
                    value: Box::new(arg.clone()),
                    global: false,
                }));
            } else if param == "_" && !arg.is_symbol_node() {
                // evaluated for its effects only
                prelude.push(arg.clone());
            }
        }
        let result = self.scoped(tmp.clone(), |this| {
            for (param, arg) in params.iter().zip(&ordered) {
                if param != "_" {
                    if arg.is_symbol_node() {
                        this.scopes.define(param.clone(), arg.clone());
                    } else {
                        this.scopes
                            .define(param.clone(), Node::symbol(format!("{param}{tmp}")));
                    }
                }
            }
            this.depth += 1;
            let result = this.fold_node(function.body.as_ref().clone());
            this.depth -= 1;
            result
        })?;
        match result {
            Node::Return(ret) => {
                prelude.push(*ret.value);
                Ok(make_body(prelude))
            }
            Node::Body(mut body) if body.last_is_return() => {
                let Some(Node::Return(ret)) = body.items.pop() else {
                    unreachable!("last_is_return checked above");
                };
                prelude.extend(body.items);
                prelude.push(*ret.value);
                Ok(make_body(prelude))
            }
            other => {
                prelude.push(other);
                Ok(make_body(prelude))
            }
        }
    }

    /// `map(f, v₁, …, vₖ)` over statically known vectors becomes a vector
    /// of calls, which are then inlined in turn. Functions that sample or
    /// observe are never expanded this way.
    fn expand_map(&mut self, call: Call) -> Result<Node> {
        if call.arg_count() <= 1 {
            return Ok(Node::Vector(Vec::new()));
        }
        let func = &call.args[0];
        let seq_args = &call.args[1..];
        let expandable = matches!(func, Node::Symbol(_) | Node::Function(_))
            && self
                .callee(func)
                .is_none_or(|f| !f.body.contains_stochastic());
        if expandable && seq_args.iter().all(|arg| arg.vector_len().is_some()) {
            let length = seq_args
                .iter()
                .filter_map(Node::vector_len)
                .min()
                .unwrap_or(0);
            let calls = (0..length)
                .map(|i| {
                    Node::Call(Call {
                        function: Box::new(func.clone()),
                        args: seq_args
                            .iter()
                            .map(|arg| arg.vector_item(i).expect("length checked above"))
                            .collect(),
                        keywords: Vec::new(),
                    })
                })
                .collect();
            return self.fold_node(make_vector(calls));
        }
        self.call_generic(call)
    }

    /// `zip(v₁, …, vₖ)` becomes a vector of element vectors when every
    /// argument is a static vector or has a statically known size.
    fn expand_zip(&mut self, call: Call) -> Result<Node> {
        if call.arg_count() <= 1 {
            return self.call_generic(call);
        }
        let seq_args = &call.args;
        if seq_args.iter().all(|arg| arg.vector_len().is_some()) {
            let length = seq_args
                .iter()
                .filter_map(Node::vector_len)
                .min()
                .unwrap_or(0);
            let rows = (0..length)
                .map(|i| {
                    make_vector(
                        seq_args
                            .iter()
                            .map(|arg| arg.vector_item(i).expect("length checked above"))
                            .collect(),
                    )
                })
                .collect();
            return self.fold_node(make_vector(rows));
        }
        let sizes: Vec<Option<usize>> = seq_args
            .iter()
            .map(|arg| self.get_type(arg).size())
            .collect();
        if sizes.iter().all(Option::is_some) {
            let length = sizes.into_iter().flatten().min().unwrap_or(0);
            let rows = (0..length)
                .map(|i| {
                    make_vector(
                        seq_args
                            .iter()
                            .map(|arg| Node::subscript(arg.clone(), Node::value(i as i64)))
                            .collect(),
                    )
                })
                .collect();
            return self.fold_node(make_vector(rows));
        }
        self.call_generic(call)
    }
}

impl Default for FunctionInliner {
    fn default() -> Self {
        Self::new()
    }
}

impl Fold for FunctionInliner {
    fn fold_call(&mut self, call: Call) -> Result<Node> {
        match call.function_name() {
            Some("map") => self.expand_map(call),
            Some("zip") => self.expand_zip(call),
            _ => self.call_generic(call),
        }
    }

    fn fold_def(&mut self, def: Def) -> Result<Node> {
        if def.value.is_function() {
            if def.global {
                self.scopes
                    .define_global(def.name.clone(), def.value.as_ref().clone());
            } else {
                self.scopes.define(def.name.clone(), def.value.as_ref().clone());
            }
            // retained for reference; never re-expanded unless called
            return Ok(Node::Def(def));
        }
        if !def.global {
            let suffix = self.scopes.suffix().to_owned();
            if !suffix.is_empty() {
                let value = self.fold_node(*def.value)?;
                let name = format!("{}{}", def.name, suffix);
                self.scopes.define(def.name, Node::symbol(name.clone()));
                return Ok(Node::Def(Def {
                    name,
                    value: Box::new(value),
                    global: false,
                }));
            }
            return fold::fold_def(self, def);
        }
        let value = self.fold_node(*def.value)?;
        if matches!(value, Node::Value(_) | Node::ValueVector(_) | Node::Vector(_)) {
            self.scopes.define_global(def.name.clone(), value.clone());
        }
        Ok(Node::Def(Def {
            name: def.name,
            value: Box::new(value),
            global: true,
        }))
    }

    fn fold_let(&mut self, let_: Let) -> Result<Node> {
        self.let_counter += 1;
        if let_.target == "_" {
            return fold::fold_let(self, let_);
        }
        let current = self.scopes.suffix();
        let base = if current.is_empty() { "__" } else { current };
        let suffix = format!("{base}L{}", self.let_counter);
        let source = self.fold_node(*let_.source)?;
        let target = format!("{}{suffix}", let_.target);
        let body = self.scoped(suffix, |this| {
            this.scopes
                .define(let_.target.clone(), Node::symbol(target.clone()));
            this.fold_node(*let_.body)
        })?;
        Ok(Node::Let(Let {
            target,
            source: Box::new(source),
            body: Box::new(body),
        }))
    }

    fn fold_symbol(&mut self, symbol: Symbol) -> Result<Node> {
        match self.scopes.resolve(&symbol.name) {
            Some(Node::Symbol(replacement)) => Ok(Node::Symbol(replacement.clone())),
            _ => Ok(Node::Symbol(symbol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pplc_ast::{Operator, Return};

    fn function(name: &str, params: &[&str], body: Node) -> Node {
        Node::Def(Def {
            name: name.to_owned(),
            value: Box::new(Node::Function(Function {
                name: Some(name.to_owned()),
                params: params.iter().map(|p| (*p).to_owned()).collect(),
                vararg: None,
                defaults: vec![],
                body: Box::new(Node::Return(Return {
                    value: Box::new(body),
                })),
            })),
            global: true,
        })
    }

    fn call(name: &str, args: Vec<Node>) -> Node {
        Node::Call(Call {
            function: Box::new(Node::symbol(name)),
            args,
            keywords: vec![],
        })
    }

    #[test]
    fn calls_are_replaced_by_bodies() {
        let program = make_body(vec![
            function(
                "f",
                &["x"],
                Node::binop(Node::symbol("x"), Operator::Add, Node::value(1)),
            ),
            Node::def("r", call("f", vec![Node::symbol("a")])),
        ]);
        let result = FunctionInliner::new().run(program).unwrap();
        let Node::Body(body) = result else {
            panic!("expected body");
        };
        // the function def is retained, the call is gone
        assert!(body.items[0].is_def_node());
        let Node::Def(r) = &body.items[1] else {
            panic!("expected def");
        };
        assert_eq!(
            r.value.as_ref(),
            &Node::binop(Node::symbol("a"), Operator::Add, Node::value(1))
        );
    }

    #[test]
    fn non_symbol_arguments_get_hygienic_temporaries() {
        let program = make_body(vec![
            function(
                "f",
                &["x"],
                Node::binop(Node::symbol("x"), Operator::Add, Node::value(1)),
            ),
            Node::def(
                "r",
                call(
                    "f",
                    vec![Node::binop(Node::symbol("a"), Operator::Mult, Node::value(2))],
                ),
            ),
        ]);
        let result = FunctionInliner::new().run(program).unwrap();
        let Node::Body(body) = result else {
            panic!("expected body");
        };
        let Node::Def(r) = &body.items[1] else {
            panic!("expected def");
        };
        let Node::Body(inlined) = r.value.as_ref() else {
            panic!("expected inlined body, got {:?}", r.value);
        };
        let Node::Def(temp) = &inlined.items[0] else {
            panic!("expected temporary def");
        };
        assert_eq!(temp.name, "x__1");
        assert_eq!(
            inlined.items[1],
            Node::binop(Node::symbol("x__1"), Operator::Add, Node::value(1))
        );
    }

    #[test]
    fn two_calls_use_distinct_suffixes() {
        let double = |name: &str| {
            call(
                "f",
                vec![Node::binop(
                    Node::symbol(name),
                    Operator::Add,
                    Node::value(0),
                )],
            )
        };
        let program = make_body(vec![
            function(
                "f",
                &["x"],
                Node::binop(Node::symbol("x"), Operator::Add, Node::value(1)),
            ),
            Node::def("r1", double("a")),
            Node::def("r2", double("b")),
        ]);
        let result = FunctionInliner::new().run(program).unwrap();
        let rendered = result.to_string();
        assert!(rendered.contains("x__1"));
        assert!(rendered.contains("x__2"));
    }

    #[test]
    fn map_over_static_vectors_expands() {
        let program = make_body(vec![
            function(
                "inc",
                &["x"],
                Node::binop(Node::symbol("x"), Operator::Add, Node::value(1)),
            ),
            Node::def(
                "r",
                call(
                    "map",
                    vec![
                        Node::symbol("inc"),
                        Node::ValueVector(vec![1.into(), 2.into(), 3.into()]),
                    ],
                ),
            ),
        ]);
        let result = FunctionInliner::new().run(program).unwrap();
        let Node::Body(body) = result else {
            panic!("expected body");
        };
        let Node::Def(r) = &body.items[1] else {
            panic!("expected def");
        };
        let Node::Vector(items) = r.value.as_ref() else {
            panic!("expected expanded vector, got {:?}", r.value);
        };
        assert_eq!(items.len(), 3);
        // literal arguments land in hygienic temporaries; constant
        // propagation collapses them later in the pipeline
        let Node::Body(first) = &items[0] else {
            panic!("expected inlined body, got {:?}", items[0]);
        };
        assert!(matches!(
            first.items.as_slice(),
            [Node::Def(_), Node::BinOp(_)]
        ));
    }

    #[test]
    fn map_over_sampling_functions_is_left_alone() {
        let sample_body = Node::Sample(pplc_ast::Sample {
            dist: Box::new(Node::Dist(pplc_ast::Dist {
                family: "normal".into(),
                args: vec![Node::symbol("x"), Node::value(1)],
            })),
            size: None,
        });
        let program = make_body(vec![
            function("draw", &["x"], sample_body),
            Node::def(
                "r",
                call(
                    "map",
                    vec![
                        Node::symbol("draw"),
                        Node::ValueVector(vec![1.into(), 2.into()]),
                    ],
                ),
            ),
        ]);
        let result = FunctionInliner::new().run(program).unwrap();
        let Node::Body(body) = result else {
            panic!("expected body");
        };
        let Node::Def(r) = &body.items[1] else {
            panic!("expected def");
        };
        assert!(r.value.is_call(), "map must survive: {:?}", r.value);
    }

    #[test]
    fn zip_of_static_vectors_expands() {
        let program = Node::def(
            "r",
            call(
                "zip",
                vec![
                    Node::ValueVector(vec![1.into(), 2.into()]),
                    Node::ValueVector(vec![10.into(), 20.into(), 30.into()]),
                ],
            ),
        );
        let result = FunctionInliner::new().run(program).unwrap();
        let Node::Def(r) = result else {
            panic!("expected def");
        };
        let Node::Vector(rows) = r.value.as_ref() else {
            panic!("expected vector, got {:?}", r.value);
        };
        // zipped up to the shorter length
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], Node::ValueVector(vec![1.into(), 10.into()]));
    }

    #[test]
    fn let_targets_are_renamed_hygienically() {
        let program = Node::Let(Let {
            target: "x".into(),
            source: Box::new(Node::value(1)),
            body: Box::new(Node::binop(Node::symbol("x"), Operator::Add, Node::symbol("y"))),
        });
        let result = FunctionInliner::new().run(program).unwrap();
        let Node::Let(l) = result else {
            panic!("expected let");
        };
        assert_eq!(l.target, "x__L1");
        assert_eq!(
            l.body.as_ref(),
            &Node::binop(Node::symbol("x__L1"), Operator::Add, Node::symbol("y"))
        );
    }

    #[test]
    fn recursion_is_reported_not_diverged() {
        let program = make_body(vec![
            function("f", &["x"], call("f", vec![Node::symbol("x")])),
            Node::def("r", call("f", vec![Node::value(1)])),
        ]);
        let err = FunctionInliner::new().run(program).unwrap_err();
        assert!(matches!(err, CompileError::Static { .. }));
    }
}
