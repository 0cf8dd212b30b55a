//! The inliner's scoped environment.
//!
//! A stack of scopes, each carrying the hygiene suffix minted when it was
//! entered and a map from surface names to their replacement nodes.
//! Resolution searches inner to outer.

use rustc_hash::FxHashMap;

use pplc_ast::{Name, Node};

#[derive(Debug)]
struct Scope {
    suffix: String,
    bindings: FxHashMap<Name, Node>,
}

#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                suffix: String::new(),
                bindings: FxHashMap::default(),
            }],
        }
    }

    /// Suffix of the innermost scope; empty at module level.
    pub fn suffix(&self) -> &str {
        &self.scopes.last().expect("scope stack is never empty").suffix
    }

    pub fn define(&mut self, name: impl Into<Name>, node: Node) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .bindings
            .insert(name.into(), node);
    }

    pub fn define_global(&mut self, name: impl Into<Name>, node: Node) {
        self.scopes[0].bindings.insert(name.into(), node);
    }

    pub fn resolve(&self, name: &str) -> Option<&Node> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name))
    }

    pub fn enter(&mut self, suffix: String) {
        self.scopes.push(Scope {
            suffix,
            bindings: FxHashMap::default(),
        });
    }

    pub fn exit(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot exit the module scope");
        self.scopes.pop();
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}
