//! Canonicalisation of generated symbol names.
//!
//! The inliner and the let rewrite mint hygienic names like `x__3` or
//! `mu__L1`; once the program is flat those suffixes carry no information.
//! Each suffixed definition is renamed back to its base name when that is
//! still free, or to `base_<k>` otherwise, in definition order, so output
//! names are short, stable and reproducible.

use rustc_hash::{FxHashMap, FxHashSet};

use pplc_ast::fold::{self, Fold};
use pplc_ast::{Def, Let, Name, Node, Result, Symbol};

const MARKER: &str = "__";

pub struct SymbolSimplifier;

impl SymbolSimplifier {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, node: Node) -> Result<Node> {
        let mut defined = Vec::new();
        let mut used = FxHashSet::default();
        collect_names(&node, &mut defined, &mut used);

        let mut rename = FxHashMap::default();
        let mut taken: FxHashSet<Name> = used
            .into_iter()
            .filter(|name| !has_suffix(name))
            .collect();
        for name in defined {
            if !has_suffix(&name) || rename.contains_key(&name) {
                continue;
            }
            let base = base_of(&name);
            let mut candidate = base.to_owned();
            let mut k = 0;
            while candidate.is_empty() || taken.contains(&candidate) {
                k += 1;
                candidate = format!("{base}_{k}");
            }
            taken.insert(candidate.clone());
            rename.insert(name, candidate);
        }
        log::debug!("canonicalising {} generated name(s)", rename.len());
        Renamer { rename }.fold_node(node)
    }
}

impl Default for SymbolSimplifier {
    fn default() -> Self {
        Self::new()
    }
}

fn has_suffix(name: &str) -> bool {
    name.contains(MARKER)
}

fn base_of(name: &str) -> &str {
    match name.find(MARKER) {
        Some(i) => &name[..i],
        None => name,
    }
}

/// Records definition targets in order, and every name that occurs at all.
fn collect_names(node: &Node, defined: &mut Vec<Name>, used: &mut FxHashSet<Name>) {
    match node {
        Node::Def(d) => {
            defined.push(d.name.clone());
            used.insert(d.name.clone());
            collect_names(&d.value, defined, used);
        }
        Node::Let(l) => {
            defined.push(l.target.clone());
            used.insert(l.target.clone());
            collect_names(&l.source, defined, used);
            collect_names(&l.body, defined, used);
        }
        Node::Symbol(s) => {
            used.insert(s.name.clone());
        }
        Node::Vector(items) | Node::Body(pplc_ast::Body { items }) => {
            for item in items {
                collect_names(item, defined, used);
            }
        }
        Node::Return(r) => collect_names(&r.value, defined, used),
        Node::If(i) => {
            collect_names(&i.test, defined, used);
            collect_names(&i.then, defined, used);
            if let Some(orelse) = &i.orelse {
                collect_names(orelse, defined, used);
            }
        }
        Node::Call(c) => {
            collect_names(&c.function, defined, used);
            for arg in &c.args {
                collect_names(arg, defined, used);
            }
            for (_, value) in &c.keywords {
                collect_names(value, defined, used);
            }
        }
        Node::Function(f) => collect_names(&f.body, defined, used),
        Node::Subscript(s) => {
            collect_names(&s.base, defined, used);
            collect_names(&s.index, defined, used);
        }
        Node::Sample(s) => {
            collect_names(&s.dist, defined, used);
            if let Some(size) = &s.size {
                collect_names(size, defined, used);
            }
        }
        Node::Observe(o) => {
            collect_names(&o.dist, defined, used);
            collect_names(&o.value, defined, used);
        }
        Node::Dist(d) => {
            for arg in &d.args {
                collect_names(arg, defined, used);
            }
        }
        Node::BinOp(b) => {
            collect_names(&b.left, defined, used);
            collect_names(&b.right, defined, used);
        }
        Node::Unary(u) => collect_names(&u.operand, defined, used),
        Node::Compare(c) => {
            collect_names(&c.left, defined, used);
            collect_names(&c.right, defined, used);
        }
        Node::Value(_) | Node::ValueVector(_) => {}
    }
}

struct Renamer {
    rename: FxHashMap<Name, Name>,
}

impl Renamer {
    fn renamed(&self, name: &str) -> Option<Name> {
        self.rename.get(name).cloned()
    }
}

impl Fold for Renamer {
    fn fold_symbol(&mut self, symbol: Symbol) -> Result<Node> {
        match self.renamed(&symbol.name) {
            Some(name) => Ok(Node::symbol(name)),
            None => Ok(Node::Symbol(symbol)),
        }
    }

    fn fold_def(&mut self, def: Def) -> Result<Node> {
        let folded = fold::fold_def(self, def)?;
        let Node::Def(mut def) = folded else {
            return Ok(folded);
        };
        if let Some(name) = self.renamed(&def.name) {
            def.name = name;
        }
        Ok(Node::Def(def))
    }

    fn fold_let(&mut self, let_: Let) -> Result<Node> {
        let folded = fold::fold_let(self, let_)?;
        let Node::Let(mut let_) = folded else {
            return Ok(folded);
        };
        if let Some(name) = self.renamed(&let_.target) {
            let_.target = name;
        }
        Ok(Node::Let(let_))
    }
}
