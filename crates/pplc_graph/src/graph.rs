//! The directed graphical model produced by compilation.
//!
//! Vertices, data nodes and condition nodes are held by value and keyed by
//! their unique names; arcs are (parent name, child name) pairs. The graph
//! is immutable once the generator returns it, and `validate` re-checks the
//! structural invariants (disjoint names, acyclicity, arc/free-name
//! agreement) before it is handed to the caller.

use std::collections::BTreeSet;
use std::fmt;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use pplc_ast::symbols::free_symbols;
use pplc_ast::{CompileError, Name, Node, Result};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VertexFlags: u8 {
        const SAMPLED     = 1 << 0;
        const OBSERVED    = 1 << 1;
        const CONTINUOUS  = 1 << 2;
        const DISCRETE    = 1 << 3;
        const CONDITIONAL = 1 << 4;
    }
}

/// One random variable of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub name: Name,
    /// The resolved distribution sub-AST; rendered once into
    /// [`Vertex::distribution`].
    pub expr: Node,
    pub distribution: String,
    pub family: Name,
    pub parents: BTreeSet<Name>,
    pub flags: VertexFlags,
    pub observation: Option<String>,
    pub sample_size: Option<usize>,
    /// Guard fragment (conjunction of condition polarities) under which
    /// this vertex is active.
    pub condition: Option<String>,
    pub cond_ancestors: Vec<(Name, bool)>,
}

impl Vertex {
    pub fn is_sampled(&self) -> bool {
        self.flags.contains(VertexFlags::SAMPLED)
    }

    pub fn is_observed(&self) -> bool {
        self.flags.contains(VertexFlags::OBSERVED)
    }

    pub fn is_continuous(&self) -> bool {
        self.flags.contains(VertexFlags::CONTINUOUS)
    }

    pub fn is_discrete(&self) -> bool {
        self.flags.contains(VertexFlags::DISCRETE)
    }

    pub fn is_conditional(&self) -> bool {
        self.flags.contains(VertexFlags::CONDITIONAL)
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {}: {}", self.name, self.distribution)?;
        if let Some(observation) = &self.observation {
            write!(f, " <- {observation}")?;
        }
        if let Some(condition) = &self.condition {
            write!(f, " if {condition}")?;
        }
        Ok(())
    }
}

/// An observed constant that is not treated as random.
#[derive(Debug, Clone, PartialEq)]
pub struct DataNode {
    pub name: Name,
    pub code: String,
}

/// The boolean guard of a lifted `if`, with a bit index assigned on first
/// appearance for downstream state tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode {
    pub name: Name,
    pub expr: Node,
    pub expression: String,
    pub parents: BTreeSet<Name>,
    pub bit_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub vertices: Vec<Vertex>,
    pub data: Vec<DataNode>,
    pub conditionals: Vec<ConditionNode>,
    pub arcs: BTreeSet<(Name, Name)>,
    /// Canonicalised result (query) expression of the model.
    pub result: Option<String>,
    /// Informational model-base name passed through compile options.
    pub base: Option<String>,
}

impl Graph {
    pub fn vertex(&self, name: &str) -> Option<&Vertex> {
        self.vertices.iter().find(|v| v.name == name)
    }

    pub fn condition(&self, name: &str) -> Option<&ConditionNode> {
        self.conditionals.iter().find(|c| c.name == name)
    }

    pub fn vertex_names(&self) -> Vec<&str> {
        self.vertices.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn arc_names(&self) -> Vec<(&str, &str)> {
        self.arcs
            .iter()
            .map(|(u, v)| (u.as_str(), v.as_str()))
            .collect()
    }

    /// Names of sampled variables.
    pub fn sampled_names(&self) -> Vec<&str> {
        self.vertices
            .iter()
            .filter(|v| v.is_sampled())
            .map(|v| v.name.as_str())
            .collect()
    }

    /// Sampled continuous variables inside conditionals.
    pub fn if_names(&self) -> Vec<&str> {
        self.vertices
            .iter()
            .filter(|v| v.is_conditional() && v.is_sampled() && v.is_continuous())
            .map(|v| v.name.as_str())
            .collect()
    }

    /// Sampled continuous variables outside conditionals.
    pub fn continuous_names(&self) -> Vec<&str> {
        self.vertices
            .iter()
            .filter(|v| v.is_continuous() && !v.is_conditional() && v.is_sampled())
            .map(|v| v.name.as_str())
            .collect()
    }

    /// Sampled discrete variables.
    pub fn discrete_names(&self) -> Vec<&str> {
        self.vertices
            .iter()
            .filter(|v| v.is_discrete() && v.is_sampled())
            .map(|v| v.name.as_str())
            .collect()
    }

    pub fn condition_names(&self) -> Vec<&str> {
        self.conditionals.iter().map(|c| c.name.as_str()).collect()
    }

    /// Re-checks the structural invariants of the finished graph.
    pub fn validate(&self) -> Result<()> {
        self.check_disjoint_names()?;
        self.check_arc_agreement()?;
        self.check_acyclic()
    }

    fn all_names(&self) -> impl Iterator<Item = &Name> {
        self.vertices
            .iter()
            .map(|v| &v.name)
            .chain(self.data.iter().map(|d| &d.name))
            .chain(self.conditionals.iter().map(|c| &c.name))
    }

    fn check_disjoint_names(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for name in self.all_names() {
            if !seen.insert(name) {
                return Err(CompileError::internal(format!(
                    "graph node name `{name}` is not unique"
                )));
            }
        }
        Ok(())
    }

    fn check_arc_agreement(&self) -> Result<()> {
        let names: BTreeSet<&Name> = self.all_names().collect();
        for vertex in &self.vertices {
            let mut expected: BTreeSet<Name> = free_symbols(&vertex.expr)
                .into_iter()
                .filter(|name| names.contains(name))
                .collect();
            expected.extend(
                vertex
                    .cond_ancestors
                    .iter()
                    .map(|(name, _)| name.clone()),
            );
            if expected != vertex.parents {
                return Err(CompileError::internal(format!(
                    "parents of `{}` disagree with the free names of its expression",
                    vertex.name
                )));
            }
            for parent in &vertex.parents {
                if !self.arcs.contains(&(parent.clone(), vertex.name.clone())) {
                    return Err(CompileError::internal(format!(
                        "missing arc ({parent}, {})",
                        vertex.name
                    )));
                }
            }
        }
        for (u, v) in &self.arcs {
            if !names.contains(u) || self.vertex(v).is_none() {
                return Err(CompileError::internal(format!(
                    "arc ({u}, {v}) references an unknown node"
                )));
            }
        }
        Ok(())
    }

    /// Kahn's algorithm over arcs plus condition-node dependencies.
    fn check_acyclic(&self) -> Result<()> {
        let mut in_degree: FxHashMap<&str, usize> = FxHashMap::default();
        let mut edges: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for name in self.all_names() {
            in_degree.entry(name.as_str()).or_insert(0);
        }
        let mut pairs: Vec<(&str, &str)> = self
            .arcs
            .iter()
            .map(|(u, v)| (u.as_str(), v.as_str()))
            .collect();
        for cond in &self.conditionals {
            for parent in &cond.parents {
                pairs.push((parent.as_str(), cond.name.as_str()));
            }
        }
        for (from, to) in pairs {
            edges.entry(from).or_default().push(to);
            *in_degree.entry(to).or_insert(0) += 1;
        }
        let mut queue: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut visited = 0usize;
        while let Some(node) = queue.pop() {
            visited += 1;
            if let Some(children) = edges.get(node) {
                for &child in children {
                    let degree = in_degree
                        .get_mut(child)
                        .expect("all nodes seeded into the degree map");
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push(child);
                    }
                }
            }
        }
        if visited != in_degree.len() {
            return Err(CompileError::graph(
                "the dependency graph contains a cycle",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "#Vertices: {}, #Arcs: {}",
            self.vertices.len(),
            self.arcs.len()
        )?;
        writeln!(f, "Vertices V:")?;
        for vertex in &self.vertices {
            writeln!(f, "{vertex}")?;
        }
        writeln!(f, "Arcs A:")?;
        if self.arcs.is_empty() {
            writeln!(f, "  -")?;
        } else {
            let arcs: Vec<String> = self
                .arcs
                .iter()
                .map(|(u, v)| format!("({u}, {v})"))
                .collect();
            writeln!(f, "  {}", arcs.join(", "))?;
        }
        writeln!(f, "Conditions C:")?;
        if self.conditionals.is_empty() {
            writeln!(f, "  -")?;
        } else {
            for cond in &self.conditionals {
                writeln!(f, "  {}[{}]: {}", cond.name, cond.bit_index, cond.expression)?;
            }
        }
        writeln!(f, "Data D:")?;
        if self.data.is_empty() {
            writeln!(f, "  -")?;
        } else {
            for data in &self.data {
                writeln!(f, "  {}: {}", data.name, data.code)?;
            }
        }
        if let Some(result) = &self.result {
            writeln!(f, "Result:")?;
            writeln!(f, "  {result}")?;
        }
        Ok(())
    }
}
