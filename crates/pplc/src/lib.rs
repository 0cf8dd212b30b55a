//! pplc: a compiler for probabilistic programs into graphical models.
//!
//! Source text in a Python-like or Lisp-like surface syntax is parsed to a
//! shared AST, rewritten until only straight-line definitions remain, and
//! lowered to a directed graphical model: random-variable vertices,
//! observed data nodes, lifted condition nodes and dependency arcs.
//!
//! ```
//! use pplc::{compile, CompileOptions};
//!
//! let graph = compile(
//!     "x = sample(normal(0.0, 1.0))\nobserve(normal(x, 1.0), 0.5)\nx\n",
//!     &CompileOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(graph.vertices.len(), 2);
//! ```

use rustc_hash::FxHashMap;

pub use pplc_ast::{dist, CompileError, Location, Result};
pub use pplc_graph::{ConditionNode, DataNode, Graph, Vertex, VertexFlags};
pub use pplc_parser::Language;

use pplc_graph::GraphGenerator;
use pplc_transforms::{
    FunctionInliner, RawSimplifier, Simplifier, StaticAssignments, SymbolSimplifier,
};

/// Options for [`compile`].
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Surface language; auto-detected from the source when absent.
    pub language: Option<Language>,
    /// Mapping from surface names to target names, merged over the
    /// distribution library's defaults. Targets that name a distribution
    /// family turn calls into distribution constructors; other targets are
    /// treated as external references.
    pub namespace: FxHashMap<String, String>,
    /// Name of an abstract model base mentioned in generated code's
    /// preamble; informational only, carried through to the graph.
    pub base: Option<String>,
}

impl CompileOptions {
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_namespace_entry(
        mut self,
        surface: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.namespace.insert(surface.into(), target.into());
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }
}

/// Compiles a probabilistic program into its graphical model.
///
/// The pipeline runs the raw simplifier, the function inliner, the raw
/// simplifier again, the static-assignment pass, the algebraic simplifier
/// to a fixpoint and the symbol simplifier, then generates and validates
/// the graph. Identical inputs produce identical graphs, including
/// generated names.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Graph> {
    let language = match options.language {
        Some(language) => language,
        None => pplc_parser::detect_language(source).ok_or_else(|| {
            CompileError::parse("cannot detect the source language of an empty input", None)
        })?,
    };
    let ast = pplc_parser::parse(source, language)?;

    let mut namespace = dist::default_namespace();
    namespace.extend(
        options
            .namespace
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    let mut raw = RawSimplifier::new(&namespace);
    let ast = raw.run(ast)?;
    log::debug!("raw simplification done");
    let ast = FunctionInliner::new().run(ast)?;
    let ast = raw.run(ast)?;
    log::debug!("inlining done");
    let ast = StaticAssignments::new().run(ast)?;
    log::debug!("static assignment done");
    let ast = Simplifier::new().run(ast)?;
    let ast = SymbolSimplifier::new().run(ast)?;
    log::debug!("simplification done");

    GraphGenerator::new(namespace.into_values(), options.base.clone()).generate(ast)
}
