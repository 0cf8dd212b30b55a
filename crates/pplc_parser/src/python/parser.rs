//! Recursive-descent parser for the Python-like surface syntax.

use pplc_ast::{
    make_body, make_vector, Call, CmpOp, CompileError, Function, If, Node, Observe, Operator,
    Result, Return, Sample, Subscript, Unary, UnaryOp, Value,
};

use super::lexer::{lex, Spanned, Tok};

pub fn parse(source: &str) -> Result<Node> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.parse_module()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Function nesting depth; zero means module level.
    depth: usize,
}

impl Parser {
    fn current(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Tok {
        &self.current().tok
    }

    fn bump(&mut self) -> Spanned {
        let spanned = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        spanned
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<()> {
        if self.peek() == &tok {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> CompileError {
        CompileError::parse(
            format!("expected {what}, found {:?}", self.peek()),
            Some(self.current().location),
        )
    }

    fn parse_module(&mut self) -> Result<Node> {
        let mut items = Vec::new();
        while self.peek() != &Tok::EndOfFile {
            items.push(self.statement()?);
        }
        Ok(make_body(items))
    }

    fn statement(&mut self) -> Result<Node> {
        match self.peek() {
            Tok::If => self.if_statement(),
            Tok::Def => self.function_def(),
            Tok::Return => {
                self.bump();
                let value = if self.peek() == &Tok::Newline {
                    Node::Value(Value::Nil)
                } else {
                    self.expression()?
                };
                self.expect(Tok::Newline, "end of line")?;
                Ok(Node::Return(Return {
                    value: Box::new(value),
                }))
            }
            _ => {
                let expr = self.expression()?;
                if self.eat(&Tok::Assign) {
                    let name = match &expr {
                        Node::Symbol(s) => s.name.clone(),
                        _ => return Err(self.unexpected("an assignable name on the left of `=`")),
                    };
                    let value = self.expression()?;
                    self.expect(Tok::Newline, "end of line")?;
                    Ok(Node::Def(pplc_ast::Def {
                        name,
                        value: Box::new(value),
                        global: self.depth == 0,
                    }))
                } else {
                    self.expect(Tok::Newline, "end of line")?;
                    Ok(expr)
                }
            }
        }
    }

    fn if_statement(&mut self) -> Result<Node> {
        self.bump(); // `if` / `elif`
        let test = self.expression()?;
        let then = self.block()?;
        let orelse = match self.peek() {
            Tok::Elif => Some(self.if_statement()?),
            Tok::Else => {
                self.bump();
                Some(self.block()?)
            }
            _ => None,
        };
        Ok(Node::If(If {
            test: Box::new(test),
            then: Box::new(then),
            orelse: orelse.map(Box::new),
        }))
    }

    fn function_def(&mut self) -> Result<Node> {
        self.bump(); // `def`
        let name = self.name("a function name")?;
        self.expect(Tok::LParen, "`(`")?;
        let mut params = Vec::new();
        let mut vararg = None;
        let mut defaults = Vec::new();
        while self.peek() != &Tok::RParen {
            if self.eat(&Tok::Star) {
                vararg = Some(self.name("a parameter name")?);
            } else {
                let param = self.name("a parameter name")?;
                if self.eat(&Tok::Assign) {
                    defaults.push((param.clone(), self.expression()?));
                }
                params.push(param);
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen, "`)`")?;
        self.depth += 1;
        let body = self.block();
        self.depth -= 1;
        let body = ensure_return(body?);
        Ok(Node::Def(pplc_ast::Def {
            name: name.clone(),
            value: Box::new(Node::Function(Function {
                name: Some(name),
                params,
                vararg,
                defaults,
                body: Box::new(body),
            })),
            global: self.depth == 0,
        }))
    }

    fn block(&mut self) -> Result<Node> {
        self.expect(Tok::Colon, "`:`")?;
        if self.eat(&Tok::Newline) {
            self.expect(Tok::Indent, "an indented block")?;
            let mut items = Vec::new();
            while self.peek() != &Tok::Dedent && self.peek() != &Tok::EndOfFile {
                items.push(self.statement()?);
            }
            self.expect(Tok::Dedent, "end of block")?;
            Ok(make_body(items))
        } else {
            // single-line suite: `if x: y = 1`
            self.statement()
        }
    }

    fn name(&mut self, what: &str) -> Result<String> {
        match self.peek().clone() {
            Tok::Name(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expression(&mut self) -> Result<Node> {
        let value = self.or_expr()?;
        if self.eat(&Tok::If) {
            let test = self.or_expr()?;
            self.expect(Tok::Else, "`else`")?;
            let orelse = self.expression()?;
            Ok(Node::If(If {
                test: Box::new(test),
                then: Box::new(value),
                orelse: Some(Box::new(orelse)),
            }))
        } else {
            Ok(value)
        }
    }

    fn or_expr(&mut self) -> Result<Node> {
        let mut left = self.and_expr()?;
        while self.eat(&Tok::Or) {
            let right = self.and_expr()?;
            left = Node::binop(left, Operator::Or, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Node> {
        let mut left = self.not_expr()?;
        while self.eat(&Tok::And) {
            let right = self.not_expr()?;
            left = Node::binop(left, Operator::And, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Node> {
        if self.eat(&Tok::Not) {
            let operand = self.not_expr()?;
            Ok(Node::Unary(Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            }))
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> Result<Node> {
        let left = self.arith()?;
        let op = match self.peek() {
            Tok::EqEq => CmpOp::Eq,
            Tok::NotEq => CmpOp::NotEq,
            Tok::Lt => CmpOp::Lt,
            Tok::LtE => CmpOp::LtE,
            Tok::Gt => CmpOp::Gt,
            Tok::GtE => CmpOp::GtE,
            _ => return Ok(left),
        };
        self.bump();
        let right = self.arith()?;
        Ok(Node::compare(left, op, right))
    }

    fn arith(&mut self) -> Result<Node> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => Operator::Add,
                Tok::Minus => Operator::Sub,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.term()?;
            left = Node::binop(left, op, right);
        }
    }

    fn term(&mut self) -> Result<Node> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Star => Operator::Mult,
                Tok::Slash => Operator::Div,
                Tok::DoubleSlash => Operator::FloorDiv,
                Tok::Percent => Operator::Mod,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.factor()?;
            left = Node::binop(left, op, right);
        }
    }

    fn factor(&mut self) -> Result<Node> {
        match self.peek() {
            Tok::Minus => {
                self.bump();
                let operand = self.factor()?;
                // fold a negated literal directly
                match operand {
                    Node::Value(Value::Int(i)) => Ok(Node::value(-i)),
                    Node::Value(Value::Float(f)) => Ok(Node::value(-f)),
                    operand => Ok(Node::Unary(Unary {
                        op: UnaryOp::USub,
                        operand: Box::new(operand),
                    })),
                }
            }
            Tok::Plus => {
                self.bump();
                self.factor()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.postfix()?;
        if self.eat(&Tok::DoubleStar) {
            let exponent = self.factor()?;
            Ok(Node::binop(base, Operator::Pow, exponent))
        } else {
            Ok(base)
        }
    }

    fn postfix(&mut self) -> Result<Node> {
        let mut node = self.atom()?;
        loop {
            if self.eat(&Tok::LParen) {
                node = self.finish_call(node)?;
            } else if self.eat(&Tok::LBracket) {
                node = self.finish_subscript(node)?;
            } else {
                return Ok(node);
            }
        }
    }

    fn finish_call(&mut self, function: Node) -> Result<Node> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while self.peek() != &Tok::RParen {
            // `name = expr` is a keyword argument
            if let Tok::Name(name) = self.peek().clone() {
                if self.tokens.get(self.pos + 1).map(|s| &s.tok) == Some(&Tok::Assign) {
                    self.bump();
                    self.bump();
                    keywords.push((name, self.expression()?));
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                    continue;
                }
            }
            if !keywords.is_empty() {
                return Err(CompileError::parse(
                    "positional argument follows keyword argument",
                    Some(self.current().location),
                ));
            }
            args.push(self.expression()?);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen, "`)`")?;
        self.primitive_call(function, args, keywords)
    }

    /// Converts the `sample`/`observe` primitives at parse time; everything
    /// else stays a `Call`.
    fn primitive_call(
        &self,
        function: Node,
        mut args: Vec<Node>,
        keywords: Vec<(String, Node)>,
    ) -> Result<Node> {
        match function.symbol_name() {
            Some("sample") if keywords.is_empty() => match args.len() {
                1 => Ok(Node::Sample(Sample {
                    dist: Box::new(args.remove(0)),
                    size: None,
                })),
                2 => {
                    let size = args.remove(1);
                    Ok(Node::Sample(Sample {
                        dist: Box::new(args.remove(0)),
                        size: Some(Box::new(size)),
                    }))
                }
                n => Err(CompileError::arity(
                    "sample",
                    format!("expected 1 or 2 arguments, found {n}"),
                )),
            },
            Some("observe") if keywords.is_empty() => {
                if args.len() == 2 {
                    let value = args.remove(1);
                    Ok(Node::Observe(Observe {
                        dist: Box::new(args.remove(0)),
                        value: Box::new(value),
                    }))
                } else {
                    Err(CompileError::arity(
                        "observe",
                        format!("expected 2 arguments, found {}", args.len()),
                    ))
                }
            }
            _ => Ok(Node::Call(Call {
                function: Box::new(function),
                args,
                keywords,
            })),
        }
    }

    fn finish_subscript(&mut self, base: Node) -> Result<Node> {
        // `x[:, k]` selects a column of a matrix literal
        if self.eat(&Tok::Colon) {
            self.expect(Tok::Comma, "`,` in column subscript")?;
            let index = self.expression()?;
            self.expect(Tok::RBracket, "`]`")?;
            return Ok(Node::Subscript(Subscript {
                base: Box::new(base),
                index: Box::new(index),
                column: true,
            }));
        }
        let index = self.expression()?;
        self.expect(Tok::RBracket, "`]`")?;
        Ok(Node::subscript(base, index))
    }

    fn atom(&mut self) -> Result<Node> {
        let spanned = self.bump();
        match spanned.tok {
            Tok::Int(i) => Ok(Node::value(i)),
            Tok::Float(f) => Ok(Node::value(f)),
            Tok::Str(s) => Ok(Node::value(Value::Str(s))),
            Tok::True => Ok(Node::value(true)),
            Tok::False => Ok(Node::value(false)),
            Tok::None => Ok(Node::Value(Value::Nil)),
            Tok::Name(name) => Ok(Node::symbol(name)),
            Tok::LParen => {
                let inner = self.expression()?;
                self.expect(Tok::RParen, "`)`")?;
                Ok(inner)
            }
            Tok::LBracket => {
                let mut items = Vec::new();
                while self.peek() != &Tok::RBracket {
                    items.push(self.expression()?);
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                self.expect(Tok::RBracket, "`]`")?;
                Ok(make_vector(items))
            }
            tok => Err(CompileError::parse(
                format!("unexpected token {tok:?}"),
                Some(spanned.location),
            )),
        }
    }
}

/// Functions return their trailing expression implicitly.
fn ensure_return(body: Node) -> Node {
    match body {
        Node::Body(mut b) => {
            if b.last_is_return() {
                return Node::Body(b);
            }
            match b.items.pop() {
                Some(last) if is_expression(&last) => {
                    b.items.push(Node::Return(Return {
                        value: Box::new(last),
                    }));
                }
                Some(last) => {
                    b.items.push(last);
                    b.items.push(Node::Return(Return {
                        value: Box::new(Node::Value(Value::Nil)),
                    }));
                }
                None => b.items.push(Node::Return(Return {
                    value: Box::new(Node::Value(Value::Nil)),
                })),
            }
            Node::Body(b)
        }
        Node::Return(r) => Node::Return(r),
        last if is_expression(&last) => Node::Return(Return {
            value: Box::new(last),
        }),
        last => make_body(vec![
            last,
            Node::Return(Return {
                value: Box::new(Node::Value(Value::Nil)),
            }),
        ]),
    }
}

fn is_expression(node: &Node) -> bool {
    !matches!(node, Node::Def(_) | Node::If(_) | Node::Return(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_and_call() {
        let ast = parse("x = sample(normal(0, 1))\n").unwrap();
        match ast {
            Node::Def(d) => {
                assert_eq!(d.name, "x");
                assert!(d.global);
                assert!(d.value.is_sample());
            }
            other => panic!("expected def, got {other:?}"),
        }
    }

    #[test]
    fn observe_primitive() {
        let ast = parse("observe(normal(m, 1), 0.5)\n").unwrap();
        assert!(ast.is_observe());
    }

    #[test]
    fn if_else_blocks() {
        let source = "\
if x > 0:
    y = sample(normal(1, 1))
else:
    y = sample(normal(-1, 1))
";
        let ast = parse(source).unwrap();
        match ast {
            Node::If(i) => {
                assert!(i.then.is_def_node());
                assert!(i.orelse.unwrap().is_def_node());
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn function_def_returns_implicitly() {
        let source = "\
def f(x):
    x + 1
";
        let ast = parse(source).unwrap();
        match ast {
            Node::Def(d) => match d.value.as_ref() {
                Node::Function(f) => assert!(matches!(f.body.as_ref(), Node::Return(_))),
                other => panic!("expected function, got {other:?}"),
            },
            other => panic!("expected def, got {other:?}"),
        }
    }

    #[test]
    fn column_subscript_and_list() {
        let ast = parse("z = data[:, 0]\n").unwrap();
        match ast {
            Node::Def(d) => match d.value.as_ref() {
                Node::Subscript(s) => assert!(s.column),
                other => panic!("expected subscript, got {other:?}"),
            },
            other => panic!("expected def, got {other:?}"),
        }
        let ast = parse("v = [1.0, 2.0, 3.0]\n").unwrap();
        match ast {
            Node::Def(d) => assert!(d.value.is_value_vector()),
            other => panic!("expected def, got {other:?}"),
        }
    }

    #[test]
    fn keyword_arguments() {
        let ast = parse("x = sample(normal(loc=0, scale=10))\n").unwrap();
        match ast {
            Node::Def(d) => match d.value.as_ref() {
                Node::Sample(s) => match s.dist.as_ref() {
                    Node::Call(c) => assert_eq!(c.keywords.len(), 2),
                    other => panic!("expected call, got {other:?}"),
                },
                other => panic!("expected sample, got {other:?}"),
            },
            other => panic!("expected def, got {other:?}"),
        }
    }

    #[test]
    fn conditional_expression() {
        let ast = parse("y = a if t else b\n").unwrap();
        match ast {
            Node::Def(d) => assert!(d.value.is_if_()),
            other => panic!("expected def, got {other:?}"),
        }
    }

    #[test]
    fn chained_comparisons_are_rejected() {
        assert!(parse("x = 1 < y < 2\n").is_err());
    }
}
