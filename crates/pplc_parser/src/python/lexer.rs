//! Tokenizer for the Python-like surface syntax.
//!
//! Indentation is significant outside brackets: the lexer keeps an indent
//! stack and emits `Indent`/`Dedent` tokens, with implicit line joining
//! inside parentheses and brackets.

use pplc_ast::{CompileError, Location, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),

    Def,
    Return,
    If,
    Elif,
    Else,
    And,
    Or,
    Not,
    True,
    False,
    None,

    Assign,
    EqEq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,

    Newline,
    Indent,
    Dedent,
    EndOfFile,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub(crate) tok: Tok,
    pub(crate) location: Location,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    row: u32,
    column: u32,
    paren_depth: usize,
    indents: Vec<u32>,
    tokens: Vec<Spanned>,
}

pub(crate) fn lex(source: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        row: 1,
        column: 1,
        paren_depth: 0,
        indents: vec![0],
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer<'_> {
    fn location(&self) -> Location {
        Location::new(self.row, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.row += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn push(&mut self, tok: Tok, location: Location) {
        self.tokens.push(Spanned { tok, location });
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::parse(message, Some(self.location()))
    }

    fn run(&mut self) -> Result<()> {
        loop {
            if !self.lex_line_start()? {
                break;
            }
            self.lex_logical_line()?;
        }
        // close any pending indentation at end of input
        while self.indents.len() > 1 {
            self.indents.pop();
            let location = self.location();
            self.push(Tok::Dedent, location);
        }
        let location = self.location();
        self.push(Tok::EndOfFile, location);
        Ok(())
    }

    /// Consumes indentation and blank/comment lines; returns `false` at end
    /// of input.
    fn lex_line_start(&mut self) -> Result<bool> {
        loop {
            let mut width = 0u32;
            loop {
                match self.peek() {
                    Some(' ') => {
                        self.bump();
                        width += 1;
                    }
                    Some('\t') => {
                        self.bump();
                        width = (width / 8 + 1) * 8;
                    }
                    _ => break,
                }
            }
            match self.peek() {
                Option::None => return Ok(false),
                Some('\n') => {
                    self.bump();
                    continue;
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    continue;
                }
                Some(_) => {
                    self.handle_indent(width)?;
                    return Ok(true);
                }
            }
        }
    }

    fn handle_indent(&mut self, width: u32) -> Result<()> {
        let current = *self.indents.last().unwrap_or(&0);
        let location = self.location();
        if width > current {
            self.indents.push(width);
            self.push(Tok::Indent, location);
        } else if width < current {
            while *self.indents.last().unwrap_or(&0) > width {
                self.indents.pop();
                self.push(Tok::Dedent, location);
            }
            if *self.indents.last().unwrap_or(&0) != width {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(())
    }

    fn lex_logical_line(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Option::None => {
                    let location = self.location();
                    self.push(Tok::Newline, location);
                    return Ok(());
                }
                Some('\n') => {
                    self.bump();
                    if self.paren_depth == 0 {
                        let location = self.location();
                        self.push(Tok::Newline, location);
                        return Ok(());
                    }
                }
                Some(' ') | Some('\t') => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(c) if c.is_ascii_digit() => self.lex_number()?,
                Some(c) if c.is_ascii_alphabetic() || c == '_' => self.lex_name(),
                Some('\'') | Some('"') => self.lex_string()?,
                Some(_) => self.lex_operator()?,
            }
        }
    }

    fn lex_number(&mut self) -> Result<()> {
        let location = self.location();
        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' && !is_float {
                is_float = true;
                text.push(c);
                self.bump();
            } else if (c == 'e' || c == 'E') && !text.is_empty() {
                is_float = true;
                text.push(c);
                self.bump();
                if let Some(sign) = self.peek() {
                    if sign == '+' || sign == '-' {
                        text.push(sign);
                        self.bump();
                    }
                }
            } else {
                break;
            }
        }
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| CompileError::parse(format!("invalid number `{text}`"), Some(location)))?;
            self.push(Tok::Float(value), location);
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| CompileError::parse(format!("invalid number `{text}`"), Some(location)))?;
            self.push(Tok::Int(value), location);
        }
        Ok(())
    }

    fn lex_name(&mut self) {
        let location = self.location();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let tok = match text.as_str() {
            "def" => Tok::Def,
            "return" => Tok::Return,
            "if" => Tok::If,
            "elif" => Tok::Elif,
            "else" => Tok::Else,
            "and" => Tok::And,
            "or" => Tok::Or,
            "not" => Tok::Not,
            "True" => Tok::True,
            "False" => Tok::False,
            "None" => Tok::None,
            _ => Tok::Name(text),
        };
        self.push(tok, location);
    }

    fn lex_string(&mut self) -> Result<()> {
        let location = self.location();
        let quote = self.bump().unwrap_or('"');
        let mut text = String::new();
        loop {
            match self.bump() {
                Option::None => {
                    return Err(CompileError::parse("unterminated string literal", Some(location)));
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('\\') => text.push('\\'),
                    Some(c) if c == quote => text.push(c),
                    Some(c) => {
                        text.push('\\');
                        text.push(c);
                    }
                    Option::None => {
                        return Err(CompileError::parse("unterminated string literal", Some(location)));
                    }
                },
                Some('\n') => {
                    return Err(CompileError::parse("unterminated string literal", Some(location)));
                }
                Some(c) => text.push(c),
            }
        }
        self.push(Tok::Str(text), location);
        Ok(())
    }

    fn lex_operator(&mut self) -> Result<()> {
        let location = self.location();
        let c = self.bump().unwrap_or('\0');
        let tok = match c {
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Tok::EqEq
                } else {
                    Tok::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Tok::NotEq
                } else {
                    return Err(CompileError::parse("unexpected character `!`", Some(location)));
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Tok::LtE
                } else {
                    Tok::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Tok::GtE
                } else {
                    Tok::Gt
                }
            }
            '+' => Tok::Plus,
            '-' => Tok::Minus,
            '*' => {
                if self.peek() == Some('*') {
                    self.bump();
                    Tok::DoubleStar
                } else {
                    Tok::Star
                }
            }
            '/' => {
                if self.peek() == Some('/') {
                    self.bump();
                    Tok::DoubleSlash
                } else {
                    Tok::Slash
                }
            }
            '%' => Tok::Percent,
            '(' => {
                self.paren_depth += 1;
                Tok::LParen
            }
            ')' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                Tok::RParen
            }
            '[' => {
                self.paren_depth += 1;
                Tok::LBracket
            }
            ']' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                Tok::RBracket
            }
            ',' => Tok::Comma,
            ':' => Tok::Colon,
            other => {
                return Err(CompileError::parse(
                    format!("unexpected character `{other}`"),
                    Some(location),
                ));
            }
        };
        self.push(tok, location);
        Ok(())
    }
}
