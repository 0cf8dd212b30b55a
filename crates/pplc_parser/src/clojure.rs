//! The Lisp-like (FOPPL-style) front-end.
//!
//! Source is read into s-expressions and lowered form by form. The bounded
//! `loop n init f args…` form is unrolled statically during lowering; its
//! count may be a literal or a name previously bound to a literal.

use rustc_hash::FxHashMap;

use pplc_ast::{
    make_body, make_vector, Call, CmpOp, CompileError, Function, If, Let, Location, Node, Observe,
    Operator, Result, Return, Sample, Unary, UnaryOp, Value,
};

pub fn parse(source: &str) -> Result<Node> {
    let tokens = lex(source)?;
    let mut reader = Reader { tokens, pos: 0 };
    let mut forms = Vec::new();
    while !reader.at_end() {
        forms.push(reader.read()?);
    }
    let mut lowering = Lowering {
        value_bindings: FxHashMap::default(),
    };
    let items = forms
        .into_iter()
        .map(|form| lowering.lower(&form))
        .collect::<Result<Vec<_>>>()?;
    Ok(make_body(items))
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Symbol(String),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Nil,
}

#[derive(Debug, Clone)]
struct Spanned {
    tok: Tok,
    location: Location,
}

fn lex(source: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut row = 1u32;
    let mut column = 1u32;
    macro_rules! bump {
        () => {{
            let c = chars.next();
            if c == Some('\n') {
                row += 1;
                column = 1;
            } else if c.is_some() {
                column += 1;
            }
            c
        }};
    }
    while let Some(&c) = chars.peek() {
        let location = Location::new(row, column);
        match c {
            ' ' | '\t' | '\n' | '\r' | ',' => {
                bump!();
            }
            ';' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    bump!();
                }
            }
            '(' => {
                bump!();
                tokens.push(Spanned { tok: Tok::LParen, location });
            }
            ')' => {
                bump!();
                tokens.push(Spanned { tok: Tok::RParen, location });
            }
            '[' => {
                bump!();
                tokens.push(Spanned { tok: Tok::LBracket, location });
            }
            ']' => {
                bump!();
                tokens.push(Spanned { tok: Tok::RBracket, location });
            }
            '"' => {
                bump!();
                let mut text = String::new();
                loop {
                    match bump!() {
                        None => return Err(CompileError::parse("unterminated string", Some(location))),
                        Some('"') => break,
                        Some('\\') => match bump!() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(c) => text.push(c),
                            None => {
                                return Err(CompileError::parse("unterminated string", Some(location)));
                            }
                        },
                        Some(c) => text.push(c),
                    }
                }
                tokens.push(Spanned { tok: Tok::Str(text), location });
            }
            _ => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || "()[];,\"".contains(c) {
                        break;
                    }
                    text.push(c);
                    bump!();
                }
                tokens.push(Spanned {
                    tok: classify_atom(&text, location)?,
                    location,
                });
            }
        }
    }
    Ok(tokens)
}

fn classify_atom(text: &str, location: Location) -> Result<Tok> {
    match text {
        "true" => return Ok(Tok::Bool(true)),
        "false" => return Ok(Tok::Bool(false)),
        "nil" => return Ok(Tok::Nil),
        _ => {}
    }
    let numeric = text
        .strip_prefix('-')
        .unwrap_or(text)
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit());
    if numeric {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Tok::Int(i));
        }
        if let Ok(f) = text.parse::<f64>() {
            return Ok(Tok::Float(f));
        }
        return Err(CompileError::parse(
            format!("invalid number `{text}`"),
            Some(location),
        ));
    }
    Ok(Tok::Symbol(text.to_owned()))
}

#[derive(Debug, Clone)]
enum Sexp {
    Atom(Spanned),
    List(Vec<Sexp>, Location),
    Vector(Vec<Sexp>, Location),
}

impl Sexp {
    fn location(&self) -> Location {
        match self {
            Sexp::Atom(spanned) => spanned.location,
            Sexp::List(_, location) | Sexp::Vector(_, location) => *location,
        }
    }

    fn symbol_name(&self) -> Option<&str> {
        match self {
            Sexp::Atom(Spanned {
                tok: Tok::Symbol(name),
                ..
            }) => Some(name),
            _ => None,
        }
    }
}

struct Reader {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Reader {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn read(&mut self) -> Result<Sexp> {
        let spanned = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| CompileError::parse("unexpected end of input", None))?;
        self.pos += 1;
        match spanned.tok {
            Tok::LParen => {
                let items = self.read_until(&Tok::RParen, spanned.location)?;
                Ok(Sexp::List(items, spanned.location))
            }
            Tok::LBracket => {
                let items = self.read_until(&Tok::RBracket, spanned.location)?;
                Ok(Sexp::Vector(items, spanned.location))
            }
            Tok::RParen | Tok::RBracket => Err(CompileError::parse(
                "unbalanced closing delimiter",
                Some(spanned.location),
            )),
            _ => Ok(Sexp::Atom(spanned)),
        }
    }

    fn read_until(&mut self, close: &Tok, open_location: Location) -> Result<Vec<Sexp>> {
        let mut items = Vec::new();
        loop {
            let next = self
                .tokens
                .get(self.pos)
                .ok_or_else(|| CompileError::parse("unclosed delimiter", Some(open_location)))?;
            if &next.tok == close {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.read()?);
        }
    }
}

struct Lowering {
    /// Literal integer bindings visible so far, consulted by `loop` counts.
    value_bindings: FxHashMap<String, i64>,
}

impl Lowering {
    fn lower(&mut self, sexp: &Sexp) -> Result<Node> {
        match sexp {
            Sexp::Atom(spanned) => Ok(match &spanned.tok {
                Tok::Int(i) => Node::value(*i),
                Tok::Float(f) => Node::value(*f),
                Tok::Str(s) => Node::value(Value::Str(s.clone())),
                Tok::Bool(b) => Node::value(*b),
                Tok::Nil => Node::Value(Value::Nil),
                Tok::Symbol(name) => Node::symbol(name.clone()),
                _ => {
                    return Err(CompileError::parse(
                        "unexpected delimiter",
                        Some(spanned.location),
                    ));
                }
            }),
            Sexp::Vector(items, _) => {
                let items = items
                    .iter()
                    .map(|item| self.lower(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(make_vector(items))
            }
            Sexp::List(items, location) => self.lower_form(items, *location),
        }
    }

    fn lower_form(&mut self, items: &[Sexp], location: Location) -> Result<Node> {
        let Some(head) = items.first() else {
            return Err(CompileError::parse("empty form", Some(location)));
        };
        let args = &items[1..];
        match head.symbol_name() {
            Some("def") => self.lower_def(args, location),
            Some("defn") => self.lower_defn(args, location),
            Some("fn") => self.lower_fn(None, args, location),
            Some("let") => self.lower_let(args, location),
            Some("if") => self.lower_if(args, location),
            Some("sample") => self.lower_sample(args, location),
            Some("observe") => self.lower_observe(args, location),
            Some("loop") => self.lower_loop(args, location),
            Some("vector") => {
                let items = self.lower_all(args)?;
                Ok(make_vector(items))
            }
            Some("nth") | Some("get") => {
                let [base, index] = self.exact::<2>(args, location, "an indexed collection and an index")?;
                Ok(Node::subscript(base, index))
            }
            Some("first") => {
                let [base] = self.exact::<1>(args, location, "a collection")?;
                Ok(Node::subscript(base, Node::value(0)))
            }
            Some("second") => {
                let [base] = self.exact::<1>(args, location, "a collection")?;
                Ok(Node::subscript(base, Node::value(1)))
            }
            Some("count") => {
                let [base] = self.exact::<1>(args, location, "a collection")?;
                Ok(Node::Call(Call {
                    function: Box::new(Node::symbol("len")),
                    args: vec![base],
                    keywords: vec![],
                }))
            }
            Some("not") => {
                let [operand] = self.exact::<1>(args, location, "one operand")?;
                Ok(Node::Unary(Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                }))
            }
            Some("and") => self.lower_variadic(Operator::And, args, location),
            Some("or") => self.lower_variadic(Operator::Or, args, location),
            Some("+") => self.lower_variadic(Operator::Add, args, location),
            Some("*") => self.lower_variadic(Operator::Mult, args, location),
            Some("-") => {
                if args.len() == 1 {
                    let operand = self.lower(&args[0])?;
                    Ok(Node::Unary(Unary {
                        op: UnaryOp::USub,
                        operand: Box::new(operand),
                    }))
                } else {
                    self.lower_variadic(Operator::Sub, args, location)
                }
            }
            Some("/") => {
                if args.len() == 1 {
                    let operand = self.lower(&args[0])?;
                    Ok(Node::binop(Node::value(1), Operator::Div, operand))
                } else {
                    self.lower_variadic(Operator::Div, args, location)
                }
            }
            Some("mod") => self.lower_variadic(Operator::Mod, args, location),
            Some("pow") => self.lower_variadic(Operator::Pow, args, location),
            Some("=") | Some("==") => self.lower_compare(CmpOp::Eq, args, location),
            Some("not=") | Some("!=") => self.lower_compare(CmpOp::NotEq, args, location),
            Some("<") => self.lower_compare(CmpOp::Lt, args, location),
            Some("<=") => self.lower_compare(CmpOp::LtE, args, location),
            Some(">") => self.lower_compare(CmpOp::Gt, args, location),
            Some(">=") => self.lower_compare(CmpOp::GtE, args, location),
            _ => {
                let function = self.lower(head)?;
                let args = self.lower_all(args)?;
                Ok(Node::Call(Call {
                    function: Box::new(function),
                    args,
                    keywords: vec![],
                }))
            }
        }
    }

    fn lower_all(&mut self, items: &[Sexp]) -> Result<Vec<Node>> {
        items.iter().map(|item| self.lower(item)).collect()
    }

    fn exact<const N: usize>(
        &mut self,
        args: &[Sexp],
        location: Location,
        what: &str,
    ) -> Result<[Node; N]> {
        if args.len() != N {
            return Err(CompileError::parse(
                format!("expected {what} ({N} argument(s), found {})", args.len()),
                Some(location),
            ));
        }
        let lowered = self.lower_all(args)?;
        Ok(lowered.try_into().expect("length checked above"))
    }

    fn lower_variadic(&mut self, op: Operator, args: &[Sexp], location: Location) -> Result<Node> {
        if args.is_empty() {
            return Err(CompileError::parse(
                format!("`{}` needs at least one operand", op.as_str().trim()),
                Some(location),
            ));
        }
        let mut nodes = self.lower_all(args)?.into_iter();
        let mut result = nodes.next().expect("non-empty checked above");
        for node in nodes {
            result = Node::binop(result, op, node);
        }
        Ok(result)
    }

    fn lower_compare(&mut self, op: CmpOp, args: &[Sexp], location: Location) -> Result<Node> {
        let [left, right] = self.exact::<2>(args, location, "two operands")?;
        Ok(Node::compare(left, op, right))
    }

    fn lower_def(&mut self, args: &[Sexp], location: Location) -> Result<Node> {
        let [name_form, value_form] = match args {
            [a, b] => [a, b],
            _ => {
                return Err(CompileError::parse(
                    "`def` expects a name and a value",
                    Some(location),
                ));
            }
        };
        let name = name_form
            .symbol_name()
            .ok_or_else(|| CompileError::parse("`def` target must be a name", Some(location)))?
            .to_owned();
        let value = self.lower(value_form)?;
        if let Some(i) = value.as_int() {
            self.value_bindings.insert(name.clone(), i);
        }
        Ok(Node::Def(pplc_ast::Def {
            name,
            value: Box::new(value),
            global: true,
        }))
    }

    fn lower_defn(&mut self, args: &[Sexp], location: Location) -> Result<Node> {
        let Some((name_form, rest)) = args.split_first() else {
            return Err(CompileError::parse(
                "`defn` expects a name, parameters and a body",
                Some(location),
            ));
        };
        let name = name_form
            .symbol_name()
            .ok_or_else(|| CompileError::parse("`defn` name must be a symbol", Some(location)))?
            .to_owned();
        let function = self.lower_fn(Some(name.clone()), rest, location)?;
        Ok(Node::Def(pplc_ast::Def {
            name,
            value: Box::new(function),
            global: true,
        }))
    }

    fn lower_fn(&mut self, name: Option<String>, args: &[Sexp], location: Location) -> Result<Node> {
        let Some((params_form, body_forms)) = args.split_first() else {
            return Err(CompileError::parse(
                "function form expects a parameter vector and a body",
                Some(location),
            ));
        };
        let Sexp::Vector(param_items, _) = params_form else {
            return Err(CompileError::parse(
                "function parameters must be a vector",
                Some(location),
            ));
        };
        let mut params = Vec::new();
        let mut vararg = None;
        let mut iter = param_items.iter();
        while let Some(item) = iter.next() {
            let Some(param) = item.symbol_name() else {
                return Err(CompileError::parse(
                    "function parameters must be names",
                    Some(item.location()),
                ));
            };
            if param == "&" {
                let rest = iter.next().and_then(Sexp::symbol_name).ok_or_else(|| {
                    CompileError::parse("`&` must be followed by a rest parameter", Some(location))
                })?;
                vararg = Some(rest.to_owned());
                break;
            }
            params.push(param.to_owned());
        }
        if body_forms.is_empty() {
            return Err(CompileError::parse("function body is empty", Some(location)));
        }
        let body = ensure_return(make_body(self.lower_all(body_forms)?));
        Ok(Node::Function(Function {
            name,
            params,
            vararg,
            defaults: vec![],
            body: Box::new(body),
        }))
    }

    fn lower_let(&mut self, args: &[Sexp], location: Location) -> Result<Node> {
        let Some((bindings_form, body_forms)) = args.split_first() else {
            return Err(CompileError::parse(
                "`let` expects a binding vector and a body",
                Some(location),
            ));
        };
        let Sexp::Vector(binding_items, _) = bindings_form else {
            return Err(CompileError::parse(
                "`let` bindings must be a vector",
                Some(location),
            ));
        };
        if binding_items.len() % 2 != 0 {
            return Err(CompileError::parse(
                "`let` bindings must come in pairs",
                Some(location),
            ));
        }
        let mut pairs = Vec::new();
        for chunk in binding_items.chunks(2) {
            let target = chunk[0]
                .symbol_name()
                .ok_or_else(|| {
                    CompileError::parse("`let` targets must be names", Some(chunk[0].location()))
                })?
                .to_owned();
            let source = self.lower(&chunk[1])?;
            if let Some(i) = source.as_int() {
                self.value_bindings.insert(target.clone(), i);
            }
            pairs.push((target, source));
        }
        if body_forms.is_empty() {
            return Err(CompileError::parse("`let` body is empty", Some(location)));
        }
        let mut body = make_body(self.lower_all(body_forms)?);
        for (target, source) in pairs.into_iter().rev() {
            body = Node::Let(Let {
                target,
                source: Box::new(source),
                body: Box::new(body),
            });
        }
        Ok(body)
    }

    fn lower_if(&mut self, args: &[Sexp], location: Location) -> Result<Node> {
        let (test, then, orelse) = match args {
            [test, then] => (test, then, None),
            [test, then, orelse] => (test, then, Some(orelse)),
            _ => {
                return Err(CompileError::parse(
                    "`if` expects a test, a consequent and an optional alternative",
                    Some(location),
                ));
            }
        };
        Ok(Node::If(If {
            test: Box::new(self.lower(test)?),
            then: Box::new(self.lower(then)?),
            orelse: match orelse {
                Some(orelse) => Some(Box::new(self.lower(orelse)?)),
                None => None,
            },
        }))
    }

    fn lower_sample(&mut self, args: &[Sexp], location: Location) -> Result<Node> {
        match args {
            [dist] => Ok(Node::Sample(Sample {
                dist: Box::new(self.lower(dist)?),
                size: None,
            })),
            [dist, size] => Ok(Node::Sample(Sample {
                dist: Box::new(self.lower(dist)?),
                size: Some(Box::new(self.lower(size)?)),
            })),
            _ => Err(CompileError::parse(
                "`sample` expects a distribution and an optional size",
                Some(location),
            )),
        }
    }

    fn lower_observe(&mut self, args: &[Sexp], location: Location) -> Result<Node> {
        let [dist, value] = match args {
            [dist, value] => [dist, value],
            _ => {
                return Err(CompileError::parse(
                    "`observe` expects a distribution and an observed value",
                    Some(location),
                ));
            }
        };
        Ok(Node::Observe(Observe {
            dist: Box::new(self.lower(dist)?),
            value: Box::new(self.lower(value)?),
        }))
    }

    /// `(loop n init f args…)` unrolls to `f(n-1, … f(1, f(0, init, args…),
    /// args…) …)` before any later pass runs.
    fn lower_loop(&mut self, args: &[Sexp], location: Location) -> Result<Node> {
        let Some((count_form, rest)) = args.split_first() else {
            return Err(CompileError::parse(
                "`loop` expects a count, an initial value and a function",
                Some(location),
            ));
        };
        let count = match count_form {
            Sexp::Atom(Spanned {
                tok: Tok::Int(i), ..
            }) => *i,
            _ => match count_form
                .symbol_name()
                .and_then(|name| self.value_bindings.get(name))
            {
                Some(i) => *i,
                None => {
                    return Err(CompileError::static_value(
                        "`loop` requires an integer value as first argument",
                    ));
                }
            },
        };
        if count < 0 {
            return Err(CompileError::static_value(
                "`loop` count must not be negative",
            ));
        }
        let Some((init_form, fn_and_args)) = rest.split_first() else {
            return Err(CompileError::parse(
                "`loop` expects an initial value",
                Some(location),
            ));
        };
        let Some((fn_form, extra_forms)) = fn_and_args.split_first() else {
            return Err(CompileError::parse(
                "`loop` expects a function to iterate",
                Some(location),
            ));
        };
        let function = self.lower(fn_form)?;
        let extra = self.lower_all(extra_forms)?;
        let mut result = self.lower(init_form)?;
        for i in 0..count {
            let mut call_args = vec![Node::value(i), result];
            call_args.extend(extra.iter().cloned());
            result = Node::Call(Call {
                function: Box::new(function.clone()),
                args: call_args,
                keywords: vec![],
            });
        }
        Ok(result)
    }
}

/// Function bodies return their final expression.
fn ensure_return(body: Node) -> Node {
    match body {
        Node::Body(mut b) => {
            if b.last_is_return() {
                return Node::Body(b);
            }
            let last = b.items.pop().unwrap_or(Node::Value(Value::Nil));
            b.items.push(Node::Return(Return {
                value: Box::new(last),
            }));
            Node::Body(b)
        }
        Node::Return(r) => Node::Return(r),
        last => Node::Return(Return {
            value: Box::new(last),
        }),
    }
}
