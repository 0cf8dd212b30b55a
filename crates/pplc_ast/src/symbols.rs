//! Free-symbol analysis.
//!
//! The graph generator derives parent sets and arcs from the free symbols
//! of distribution and guard expressions, and validation re-checks the
//! agreement afterwards.

use rustc_hash::FxHashSet;

use crate::node::{Name, Node};

/// The set of symbol names that occur free in `node`.
///
/// `Def`s bind their name for the remainder of the enclosing `Body`;
/// `Let` binds its target in the body only; `Function` parameters bind
/// inside the function body.
pub fn free_symbols(node: &Node) -> FxHashSet<Name> {
    let mut free = FxHashSet::default();
    let bound = FxHashSet::default();
    collect(node, &bound, &mut free);
    free
}

fn collect(node: &Node, bound: &FxHashSet<Name>, free: &mut FxHashSet<Name>) {
    match node {
        Node::Value(_) | Node::ValueVector(_) => {}
        Node::Symbol(s) => {
            if !bound.contains(&s.name) {
                free.insert(s.name.clone());
            }
        }
        Node::Vector(items) => {
            for item in items {
                collect(item, bound, free);
            }
        }
        Node::Def(d) => collect(&d.value, bound, free),
        Node::Let(l) => {
            collect(&l.source, bound, free);
            let mut inner = bound.clone();
            inner.insert(l.target.clone());
            collect(&l.body, &inner, free);
        }
        Node::Body(b) => {
            let mut inner = bound.clone();
            for item in b.items.iter() {
                collect(item, &inner, free);
                if let Node::Def(d) = item {
                    inner.insert(d.name.clone());
                }
            }
        }
        Node::Return(r) => collect(&r.value, bound, free),
        Node::If(i) => {
            collect(&i.test, bound, free);
            collect(&i.then, bound, free);
            if let Some(orelse) = &i.orelse {
                collect(orelse, bound, free);
            }
        }
        Node::Call(c) => {
            collect(&c.function, bound, free);
            for arg in &c.args {
                collect(arg, bound, free);
            }
            for (_, value) in &c.keywords {
                collect(value, bound, free);
            }
        }
        Node::Function(f) => {
            for (_, default) in &f.defaults {
                collect(default, bound, free);
            }
            let mut inner = bound.clone();
            inner.extend(f.params.iter().cloned());
            if let Some(vararg) = &f.vararg {
                inner.insert(vararg.clone());
            }
            if let Some(name) = &f.name {
                inner.insert(name.clone());
            }
            collect(&f.body, &inner, free);
        }
        Node::Subscript(s) => {
            collect(&s.base, bound, free);
            collect(&s.index, bound, free);
        }
        Node::Sample(s) => {
            collect(&s.dist, bound, free);
            if let Some(size) = &s.size {
                collect(size, bound, free);
            }
        }
        Node::Observe(o) => {
            collect(&o.dist, bound, free);
            collect(&o.value, bound, free);
        }
        Node::Dist(d) => {
            for arg in &d.args {
                collect(arg, bound, free);
            }
        }
        Node::BinOp(b) => {
            collect(&b.left, bound, free);
            collect(&b.right, bound, free);
        }
        Node::Unary(u) => collect(&u.operand, bound, free),
        Node::Compare(c) => {
            collect(&c.left, bound, free);
            collect(&c.right, bound, free);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Body, Let, Operator};

    #[test]
    fn let_target_is_bound_in_body_only() {
        let node = Node::Let(Let {
            target: "x".into(),
            source: Box::new(Node::symbol("x")),
            body: Box::new(Node::binop(Node::symbol("x"), Operator::Add, Node::symbol("y"))),
        });
        let free = free_symbols(&node);
        assert!(free.contains("x"), "source occurrence is free");
        assert!(free.contains("y"));
    }

    #[test]
    fn defs_bind_later_body_items() {
        let node = Node::Body(Body {
            items: vec![
                Node::def("a", Node::symbol("b")),
                Node::binop(Node::symbol("a"), Operator::Add, Node::symbol("c")),
            ],
        });
        let free = free_symbols(&node);
        assert_eq!(
            {
                let mut v: Vec<_> = free.into_iter().collect();
                v.sort();
                v
            },
            vec!["b".to_owned(), "c".to_owned()]
        );
    }

    #[test]
    fn function_parameters_are_bound() {
        let f = Node::Function(crate::node::Function {
            name: Some("f".into()),
            params: vec!["x".into()],
            vararg: None,
            defaults: vec![],
            body: Box::new(Node::binop(Node::symbol("x"), Operator::Add, Node::symbol("k"))),
        });
        let free = free_symbols(&f);
        assert!(!free.contains("x"));
        assert!(free.contains("k"));
    }
}
