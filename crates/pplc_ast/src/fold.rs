//! Structural transformation of AST nodes.
//!
//! A pass implements [`Fold`] and overrides the node kinds it rewrites; the
//! free functions perform the default depth-first, left-to-right recursion
//! so overrides can delegate back to the generic shape.

use crate::error::Result;
use crate::node::*;
use crate::value::Value;

pub trait Fold {
    fn fold_node(&mut self, node: Node) -> Result<Node> {
        fold_node(self, node)
    }

    fn fold_value(&mut self, value: Value) -> Result<Node> {
        Ok(Node::Value(value))
    }

    fn fold_value_vector(&mut self, values: Vec<Value>) -> Result<Node> {
        Ok(Node::ValueVector(values))
    }

    fn fold_vector(&mut self, items: Vec<Node>) -> Result<Node> {
        fold_vector(self, items)
    }

    fn fold_symbol(&mut self, symbol: Symbol) -> Result<Node> {
        Ok(Node::Symbol(symbol))
    }

    fn fold_def(&mut self, def: Def) -> Result<Node> {
        fold_def(self, def)
    }

    fn fold_let(&mut self, let_: Let) -> Result<Node> {
        fold_let(self, let_)
    }

    fn fold_body(&mut self, body: Body) -> Result<Node> {
        fold_body(self, body)
    }

    fn fold_return(&mut self, ret: Return) -> Result<Node> {
        fold_return(self, ret)
    }

    fn fold_if(&mut self, if_: If) -> Result<Node> {
        fold_if(self, if_)
    }

    fn fold_call(&mut self, call: Call) -> Result<Node> {
        fold_call(self, call)
    }

    fn fold_function(&mut self, function: Function) -> Result<Node> {
        fold_function(self, function)
    }

    fn fold_subscript(&mut self, subscript: Subscript) -> Result<Node> {
        fold_subscript(self, subscript)
    }

    fn fold_sample(&mut self, sample: Sample) -> Result<Node> {
        fold_sample(self, sample)
    }

    fn fold_observe(&mut self, observe: Observe) -> Result<Node> {
        fold_observe(self, observe)
    }

    fn fold_dist(&mut self, dist: Dist) -> Result<Node> {
        fold_dist(self, dist)
    }

    fn fold_bin_op(&mut self, bin_op: BinOp) -> Result<Node> {
        fold_bin_op(self, bin_op)
    }

    fn fold_unary(&mut self, unary: Unary) -> Result<Node> {
        fold_unary(self, unary)
    }

    fn fold_compare(&mut self, compare: Compare) -> Result<Node> {
        fold_compare(self, compare)
    }
}

pub fn fold_node<F: Fold + ?Sized>(folder: &mut F, node: Node) -> Result<Node> {
    match node {
        Node::Value(value) => folder.fold_value(value),
        Node::ValueVector(values) => folder.fold_value_vector(values),
        Node::Vector(items) => folder.fold_vector(items),
        Node::Symbol(symbol) => folder.fold_symbol(symbol),
        Node::Def(def) => folder.fold_def(def),
        Node::Let(let_) => folder.fold_let(let_),
        Node::Body(body) => folder.fold_body(body),
        Node::Return(ret) => folder.fold_return(ret),
        Node::If(if_) => folder.fold_if(if_),
        Node::Call(call) => folder.fold_call(call),
        Node::Function(function) => folder.fold_function(function),
        Node::Subscript(subscript) => folder.fold_subscript(subscript),
        Node::Sample(sample) => folder.fold_sample(sample),
        Node::Observe(observe) => folder.fold_observe(observe),
        Node::Dist(dist) => folder.fold_dist(dist),
        Node::BinOp(bin_op) => folder.fold_bin_op(bin_op),
        Node::Unary(unary) => folder.fold_unary(unary),
        Node::Compare(compare) => folder.fold_compare(compare),
    }
}

fn fold_boxed<F: Fold + ?Sized>(folder: &mut F, node: Box<Node>) -> Result<Box<Node>> {
    folder.fold_node(*node).map(Box::new)
}

pub fn fold_vector<F: Fold + ?Sized>(folder: &mut F, items: Vec<Node>) -> Result<Node> {
    let items = items
        .into_iter()
        .map(|item| folder.fold_node(item))
        .collect::<Result<Vec<_>>>()?;
    Ok(Node::Vector(items))
}

pub fn fold_def<F: Fold + ?Sized>(folder: &mut F, def: Def) -> Result<Node> {
    Ok(Node::Def(Def {
        name: def.name,
        value: fold_boxed(folder, def.value)?,
        global: def.global,
    }))
}

pub fn fold_let<F: Fold + ?Sized>(folder: &mut F, let_: Let) -> Result<Node> {
    Ok(Node::Let(Let {
        target: let_.target,
        source: fold_boxed(folder, let_.source)?,
        body: fold_boxed(folder, let_.body)?,
    }))
}

pub fn fold_body<F: Fold + ?Sized>(folder: &mut F, body: Body) -> Result<Node> {
    let items = body
        .items
        .into_iter()
        .map(|item| folder.fold_node(item))
        .collect::<Result<Vec<_>>>()?;
    Ok(make_body(items))
}

pub fn fold_return<F: Fold + ?Sized>(folder: &mut F, ret: Return) -> Result<Node> {
    Ok(Node::Return(Return {
        value: fold_boxed(folder, ret.value)?,
    }))
}

pub fn fold_if<F: Fold + ?Sized>(folder: &mut F, if_: If) -> Result<Node> {
    Ok(Node::If(If {
        test: fold_boxed(folder, if_.test)?,
        then: fold_boxed(folder, if_.then)?,
        orelse: match if_.orelse {
            Some(orelse) => Some(fold_boxed(folder, orelse)?),
            None => None,
        },
    }))
}

pub fn fold_call<F: Fold + ?Sized>(folder: &mut F, call: Call) -> Result<Node> {
    Ok(Node::Call(Call {
        function: fold_boxed(folder, call.function)?,
        args: call
            .args
            .into_iter()
            .map(|arg| folder.fold_node(arg))
            .collect::<Result<Vec<_>>>()?,
        keywords: call
            .keywords
            .into_iter()
            .map(|(name, value)| Ok((name, folder.fold_node(value)?)))
            .collect::<Result<Vec<_>>>()?,
    }))
}

pub fn fold_function<F: Fold + ?Sized>(folder: &mut F, function: Function) -> Result<Node> {
    Ok(Node::Function(Function {
        name: function.name,
        params: function.params,
        vararg: function.vararg,
        defaults: function
            .defaults
            .into_iter()
            .map(|(name, value)| Ok((name, folder.fold_node(value)?)))
            .collect::<Result<Vec<_>>>()?,
        body: fold_boxed(folder, function.body)?,
    }))
}

pub fn fold_subscript<F: Fold + ?Sized>(folder: &mut F, subscript: Subscript) -> Result<Node> {
    Ok(Node::Subscript(Subscript {
        base: fold_boxed(folder, subscript.base)?,
        index: fold_boxed(folder, subscript.index)?,
        column: subscript.column,
    }))
}

pub fn fold_sample<F: Fold + ?Sized>(folder: &mut F, sample: Sample) -> Result<Node> {
    Ok(Node::Sample(Sample {
        dist: fold_boxed(folder, sample.dist)?,
        size: match sample.size {
            Some(size) => Some(fold_boxed(folder, size)?),
            None => None,
        },
    }))
}

pub fn fold_observe<F: Fold + ?Sized>(folder: &mut F, observe: Observe) -> Result<Node> {
    Ok(Node::Observe(Observe {
        dist: fold_boxed(folder, observe.dist)?,
        value: fold_boxed(folder, observe.value)?,
    }))
}

pub fn fold_dist<F: Fold + ?Sized>(folder: &mut F, dist: Dist) -> Result<Node> {
    Ok(Node::Dist(Dist {
        family: dist.family,
        args: dist
            .args
            .into_iter()
            .map(|arg| folder.fold_node(arg))
            .collect::<Result<Vec<_>>>()?,
    }))
}

pub fn fold_bin_op<F: Fold + ?Sized>(folder: &mut F, bin_op: BinOp) -> Result<Node> {
    Ok(Node::BinOp(BinOp {
        left: fold_boxed(folder, bin_op.left)?,
        op: bin_op.op,
        right: fold_boxed(folder, bin_op.right)?,
    }))
}

pub fn fold_unary<F: Fold + ?Sized>(folder: &mut F, unary: Unary) -> Result<Node> {
    Ok(Node::Unary(Unary {
        op: unary.op,
        operand: fold_boxed(folder, unary.operand)?,
    }))
}

pub fn fold_compare<F: Fold + ?Sized>(folder: &mut F, compare: Compare) -> Result<Node> {
    Ok(Node::Compare(Compare {
        left: fold_boxed(folder, compare.left)?,
        op: compare.op,
        right: fold_boxed(folder, compare.right)?,
    }))
}
