//! The graph generator.
//!
//! Walks the residual (flat) AST and accumulates vertices, data nodes,
//! condition nodes and arcs. An environment maps every defined name to its
//! resolved expression (vertex symbols for random draws, vectors of vertex
//! symbols for unrolled draws, plain expressions for computed
//! intermediates), so distribution fragments are rendered fully resolved
//! and parent sets fall out of their free names.

use std::collections::BTreeSet;

use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use pplc_ast::symbols::free_symbols;
use pplc_ast::{
    dist, CompileError, Dist, If, Name, Node, Observe, Result, Sample, Subscript, Value,
};

use crate::graph::{ConditionNode, DataNode, Graph, Vertex, VertexFlags};

/// Function names the runtime library is expected to provide; they may
/// survive into code fragments without counting as unresolved symbols.
const BUILTINS: &[&str] = &[
    "len", "zeros", "ones", "range", "sum", "first", "second", "rest", "sqrt", "exp", "log",
    "abs",
];

pub struct GraphGenerator {
    externals: FxHashSet<Name>,
    base: Option<String>,
    vertices: Vec<Vertex>,
    data: Vec<DataNode>,
    conditionals: Vec<ConditionNode>,
    arcs: BTreeSet<(Name, Name)>,
    names: FxHashSet<Name>,
    env: FxHashMap<Name, Node>,
    /// Names assigned on only one side of a conditional; referencing one is
    /// a branch-mismatch error.
    partial: FxHashSet<Name>,
    cond_stack: Vec<(Name, bool)>,
    cond_cache: FxHashMap<String, Name>,
    /// Literal payloads of data nodes, kept for static length queries.
    data_exprs: FxHashMap<Name, Node>,
    name_counter: usize,
}

impl GraphGenerator {
    pub fn new(externals: impl IntoIterator<Item = Name>, base: Option<String>) -> Self {
        let mut external_names: FxHashSet<Name> =
            externals.into_iter().collect();
        external_names.extend(BUILTINS.iter().map(|b| (*b).to_owned()));
        Self {
            externals: external_names,
            base,
            vertices: Vec::new(),
            data: Vec::new(),
            conditionals: Vec::new(),
            arcs: BTreeSet::new(),
            names: FxHashSet::default(),
            env: FxHashMap::default(),
            partial: FxHashSet::default(),
            cond_stack: Vec::new(),
            cond_cache: FxHashMap::default(),
            data_exprs: FxHashMap::default(),
            name_counter: 0,
        }
    }

    pub fn generate(mut self, node: Node) -> Result<Graph> {
        let result = self.visit(node, None)?;
        let result = match result {
            Node::Value(Value::Nil) => None,
            node => Some(node.to_string()),
        };
        log::debug!(
            "generated graph: {} vertex(es), {} arc(s), {} data node(s), {} condition(s)",
            self.vertices.len(),
            self.arcs.len(),
            self.data.len(),
            self.conditionals.len()
        );
        let graph = Graph {
            vertices: self.vertices,
            data: self.data,
            conditionals: self.conditionals,
            arcs: self.arcs,
            result,
            base: self.base,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Visits a statement-position node; `hint` is the surface name a
    /// resulting vertex should carry if possible.
    fn visit(&mut self, node: Node, hint: Option<&str>) -> Result<Node> {
        match node {
            Node::Body(body) => {
                let mut last = Node::Value(Value::Nil);
                for item in body.items {
                    last = self.visit(item, None)?;
                }
                Ok(last)
            }
            Node::Def(def) => {
                if def.value.is_function() {
                    return Ok(Node::Value(Value::Nil));
                }
                let name = def.name;
                let value = self.visit(*def.value, Some(&name))?;
                self.bind(name, value.clone());
                Ok(value)
            }
            Node::Return(ret) => self.visit(*ret.value, hint),
            Node::Sample(sample) => self.visit_sample(sample, hint),
            Node::Observe(observe) => self.visit_observe(observe, hint),
            Node::If(if_) => self.visit_if(if_, hint),
            Node::Vector(items) if items.iter().any(Node::contains_stochastic) => {
                let mut resolved = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let element_hint = hint.map(|h| format!("{h}_{i}"));
                    resolved.push(self.visit(item, element_hint.as_deref())?);
                }
                Ok(Node::Vector(resolved))
            }
            expr => {
                let resolved = self.resolve(&expr)?;
                // a definition of a literal vector becomes a data node
                if let Some(hint) = hint {
                    if is_literal_vector(&resolved) {
                        let name = self.alloc_named(hint);
                        self.data.push(DataNode {
                            name: name.clone(),
                            code: resolved.to_string(),
                        });
                        self.names.insert(name.clone());
                        self.data_exprs.insert(name.clone(), resolved);
                        return Ok(Node::symbol(name));
                    }
                }
                Ok(resolved)
            }
        }
    }

    fn bind(&mut self, name: Name, value: Node) {
        self.partial.remove(&name);
        self.env.insert(name, value);
    }

    fn visit_sample(&mut self, sample: Sample, hint: Option<&str>) -> Result<Node> {
        let size = match sample.size.as_deref() {
            Some(node) => match self.resolve(node)? {
                Node::Value(Value::Int(n)) => usize::try_from(n).ok(),
                resolved => {
                    return Err(CompileError::static_value(format!(
                        "sample size must be a statically known integer, found `{resolved}`"
                    )));
                }
            },
            None => None,
        };
        let name = self.make_vertex(&sample.dist, hint, None, size)?;
        Ok(Node::symbol(name))
    }

    fn visit_observe(&mut self, observe: Observe, hint: Option<&str>) -> Result<Node> {
        let value = self.resolve(&observe.value)?;
        if value.contains_stochastic() {
            return Err(CompileError::graph(
                "observed values must not sample or observe",
            ));
        }
        let sample_size = self.static_len(&value);
        let name = self.make_vertex(&observe.dist, hint, Some(value), sample_size)?;
        Ok(Node::symbol(name))
    }

    /// Statically known length of an observed value, looking through data
    /// node references.
    fn static_len(&self, node: &Node) -> Option<usize> {
        match node {
            Node::Symbol(s) => self.data_exprs.get(&s.name).and_then(Node::vector_len),
            _ => node.vector_len(),
        }
    }

    fn visit_if(&mut self, if_: If, hint: Option<&str>) -> Result<Node> {
        let stochastic = if_.then.contains_stochastic()
            || if_.orelse.as_ref().is_some_and(|e| e.contains_stochastic());
        if !stochastic {
            let resolved = If {
                test: Box::new(self.resolve(&if_.test)?),
                then: Box::new(self.resolve(&if_.then)?),
                orelse: match &if_.orelse {
                    Some(orelse) => Some(Box::new(self.resolve(orelse)?)),
                    None => None,
                },
            };
            return Ok(Node::If(resolved));
        }

        let test = self.resolve(&if_.test)?;
        let cond_name = self.condition_node(test)?;

        let before = self.env.clone();
        self.cond_stack.push((cond_name.clone(), true));
        let then_value = self.visit(*if_.then, hint)?;
        self.cond_stack.pop();
        let then_env = std::mem::replace(&mut self.env, before.clone());

        self.cond_stack.push((cond_name.clone(), false));
        let else_value = match if_.orelse {
            Some(orelse) => Some(self.visit(*orelse, hint)?),
            None => None,
        };
        self.cond_stack.pop();
        let else_env = std::mem::replace(&mut self.env, before.clone());

        self.merge_branch_envs(&cond_name, &before, then_env, else_env);

        let cond_symbol = Node::symbol(cond_name);
        match (then_value, else_value) {
            (Node::Value(Value::Nil), None | Some(Node::Value(Value::Nil))) => {
                Ok(Node::Value(Value::Nil))
            }
            (then_value, else_value) => Ok(Node::If(If {
                test: Box::new(cond_symbol),
                then: Box::new(then_value),
                orelse: else_value.map(Box::new),
            })),
        }
    }

    /// Merges the branch environments: names assigned on both sides become
    /// conditional expressions over the lifted condition; names assigned on
    /// one side only fall back to their prior binding, or are poisoned so a
    /// later reference reports the asymmetry.
    fn merge_branch_envs(
        &mut self,
        cond_name: &str,
        before: &FxHashMap<Name, Node>,
        then_env: FxHashMap<Name, Node>,
        else_env: FxHashMap<Name, Node>,
    ) {
        let changed = |env: &FxHashMap<Name, Node>| -> FxHashMap<Name, Node> {
            env.iter()
                .filter(|(name, value)| before.get(*name) != Some(value))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        };
        let mut then_delta = changed(&then_env);
        let mut else_delta = changed(&else_env);
        let keys: BTreeSet<Name> = then_delta
            .keys()
            .chain(else_delta.keys())
            .cloned()
            .collect();
        for key in keys {
            let cond_symbol = Node::symbol(cond_name.to_owned());
            let then_value = then_delta.remove(&key);
            let else_value = else_delta.remove(&key);
            let pair = match (then_value, else_value) {
                (Some(then_value), Some(else_value)) => Some((then_value, else_value)),
                (Some(then_value), None) => before
                    .get(&key)
                    .map(|prior| (then_value, prior.clone())),
                (None, Some(else_value)) => before
                    .get(&key)
                    .map(|prior| (prior.clone(), else_value)),
                (None, None) => continue,
            };
            match pair {
                Some((then_value, else_value)) => {
                    let merged = Node::If(If {
                        test: Box::new(cond_symbol),
                        then: Box::new(then_value),
                        orelse: Some(Box::new(else_value)),
                    });
                    self.env.insert(key, merged);
                }
                None => {
                    self.env.remove(&key);
                    self.partial.insert(key);
                }
            }
        }
    }

    /// Lifts a condition expression into a condition node, reusing the node
    /// when the same expression was lifted before.
    fn condition_node(&mut self, test: Node) -> Result<Name> {
        let expression = test.to_string();
        if let Some(existing) = self.cond_cache.get(&expression) {
            return Ok(existing.clone());
        }
        let bit_index = self.conditionals.len();
        let name = self.alloc_named(&format!("cond_{bit_index}"));
        let parents: BTreeSet<Name> = free_symbols(&test)
            .into_iter()
            .filter(|name| self.names.contains(name))
            .collect();
        log::trace!("condition node {name} (bit {bit_index}): {expression}");
        self.conditionals.push(ConditionNode {
            name: name.clone(),
            expr: test,
            expression: expression.clone(),
            parents,
            bit_index,
        });
        self.names.insert(name.clone());
        self.cond_cache.insert(expression, name.clone());
        Ok(name)
    }

    fn make_vertex(
        &mut self,
        dist_node: &Node,
        hint: Option<&str>,
        observation: Option<Node>,
        sample_size: Option<usize>,
    ) -> Result<Name> {
        let resolved = self.resolve(dist_node)?;
        let Node::Dist(Dist { family, args }) = resolved else {
            return Err(CompileError::graph(format!(
                "expected a distribution, found `{resolved}`"
            )));
        };
        let family_info = dist::lookup(&family).ok_or_else(|| {
            CompileError::internal(format!("unknown distribution family `{family}`"))
        })?;
        let observed = observation.is_some();
        let name = match hint {
            Some(hint) => self.alloc_named(hint),
            None => self.alloc_prefixed(if observed { "y" } else { "x" }),
        };
        let expr = Node::Dist(Dist {
            family: family.clone(),
            args,
        });
        let mut parents: BTreeSet<Name> = free_symbols(&expr)
            .into_iter()
            .filter(|parent| self.names.contains(parent))
            .collect();
        parents.extend(self.cond_stack.iter().map(|(cond, _)| cond.clone()));
        let mut flags = if observed {
            VertexFlags::OBSERVED
        } else {
            VertexFlags::SAMPLED
        };
        flags |= if family_info.is_continuous() {
            VertexFlags::CONTINUOUS
        } else {
            VertexFlags::DISCRETE
        };
        if !self.cond_stack.is_empty() {
            flags |= VertexFlags::CONDITIONAL;
        }
        let condition = (!self.cond_stack.is_empty()).then(|| {
            self.cond_stack
                .iter()
                .map(|(cond, polarity)| {
                    if *polarity {
                        cond.clone()
                    } else {
                        format!("not {cond}")
                    }
                })
                .join(" and ")
        });
        log::trace!("vertex {name} ~ {expr}");
        for parent in &parents {
            self.arcs.insert((parent.clone(), name.clone()));
        }
        self.names.insert(name.clone());
        self.vertices.push(Vertex {
            name: name.clone(),
            distribution: expr.to_string(),
            expr,
            family,
            parents,
            flags,
            observation: observation.map(|value| value.to_string()),
            sample_size,
            condition,
            cond_ancestors: self.cond_stack.clone(),
        });
        Ok(name)
    }

    /// Resolves an expression against the environment: symbols become their
    /// bound (already resolved) expressions, statically decidable
    /// subscripts reduce, and stray samples get vertices of their own.
    fn resolve(&mut self, node: &Node) -> Result<Node> {
        match node {
            Node::Value(_) | Node::ValueVector(_) => Ok(node.clone()),
            Node::Symbol(s) => self.resolve_symbol(&s.name),
            Node::Vector(items) => Ok(Node::Vector(
                items
                    .iter()
                    .map(|item| self.resolve(item))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Node::Subscript(s) => {
                let base = self.resolve(&s.base)?;
                let index = self.resolve(&s.index)?;
                if !s.column {
                    if let Some(i) = index.as_int().and_then(|i| usize::try_from(i).ok()) {
                        if let Some(element) = base.vector_item(i) {
                            return Ok(element);
                        }
                    }
                }
                Ok(Node::Subscript(Subscript {
                    base: Box::new(base),
                    index: Box::new(index),
                    column: s.column,
                }))
            }
            Node::Sample(sample) => {
                let name = self.make_vertex(&sample.dist, None, None, None)?;
                Ok(Node::symbol(name))
            }
            Node::Observe(observe) => self.visit_observe(observe.clone(), None),
            Node::Dist(d) => Ok(Node::Dist(Dist {
                family: d.family.clone(),
                args: d
                    .args
                    .iter()
                    .map(|arg| self.resolve(arg))
                    .collect::<Result<Vec<_>>>()?,
            })),
            Node::Call(c) => Ok(Node::Call(pplc_ast::Call {
                function: Box::new(self.resolve(&c.function)?),
                args: c
                    .args
                    .iter()
                    .map(|arg| self.resolve(arg))
                    .collect::<Result<Vec<_>>>()?,
                keywords: c
                    .keywords
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), self.resolve(value)?)))
                    .collect::<Result<Vec<_>>>()?,
            })),
            Node::If(i) => Ok(Node::If(If {
                test: Box::new(self.resolve(&i.test)?),
                then: Box::new(self.resolve(&i.then)?),
                orelse: match &i.orelse {
                    Some(orelse) => Some(Box::new(self.resolve(orelse)?)),
                    None => None,
                },
            })),
            Node::BinOp(b) => Ok(Node::binop(
                self.resolve(&b.left)?,
                b.op,
                self.resolve(&b.right)?,
            )),
            Node::Unary(u) => Ok(Node::Unary(pplc_ast::Unary {
                op: u.op,
                operand: Box::new(self.resolve(&u.operand)?),
            })),
            Node::Compare(c) => Ok(Node::compare(
                self.resolve(&c.left)?,
                c.op,
                self.resolve(&c.right)?,
            )),
            Node::Def(_) | Node::Let(_) | Node::Body(_) | Node::Return(_) | Node::Function(_) => {
                Err(CompileError::internal(format!(
                    "statement in expression position after static assignment: `{node}`"
                )))
            }
        }
    }

    fn resolve_symbol(&mut self, name: &str) -> Result<Node> {
        if let Some(bound) = self.env.get(name) {
            return Ok(bound.clone());
        }
        if self.partial.contains(name) {
            return Err(CompileError::graph(format!(
                "`{name}` is not assigned in both branches of its conditional"
            )));
        }
        if self.names.contains(name) || self.externals.contains(name) {
            return Ok(Node::symbol(name.to_owned()));
        }
        Err(CompileError::resolution(name))
    }

    fn alloc_named(&mut self, base: &str) -> Name {
        if !base.is_empty() && !self.names.contains(base) {
            return base.to_owned();
        }
        let mut k = 0usize;
        loop {
            k += 1;
            let candidate = format!("{base}_{k}");
            if !self.names.contains(&candidate) {
                return candidate;
            }
        }
    }

    fn alloc_prefixed(&mut self, prefix: &str) -> Name {
        loop {
            self.name_counter += 1;
            let candidate = format!("{prefix}{}", self.name_counter);
            if !self.names.contains(&candidate) {
                return candidate;
            }
        }
    }
}

fn is_literal_vector(node: &Node) -> bool {
    match node {
        Node::ValueVector(_) => true,
        Node::Vector(items) => items.iter().all(is_literal),
        _ => false,
    }
}

fn is_literal(node: &Node) -> bool {
    match node {
        Node::Value(_) | Node::ValueVector(_) => true,
        Node::Vector(items) => items.iter().all(is_literal),
        _ => false,
    }
}
