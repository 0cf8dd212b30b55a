//! The AST rewrite pipeline of the pplc compiler.
//!
//! Passes run in a fixed order (raw simplification, inlining, raw
//! simplification again, static assignment, algebraic simplification to a
//! fixpoint, symbol canonicalisation); each pass is a pure function from
//! AST to AST apart from the monotonic counters used to mint fresh names.

mod inliner;
mod raw_simplifier;
mod scope;
mod simplifier;
mod static_assignments;
mod symbol_simplifier;
mod type_inference;

pub use inliner::FunctionInliner;
pub use raw_simplifier::RawSimplifier;
pub use scope::ScopeStack;
pub use simplifier::Simplifier;
pub use static_assignments::StaticAssignments;
pub use symbol_simplifier::SymbolSimplifier;
pub use type_inference::TypeInferencer;
