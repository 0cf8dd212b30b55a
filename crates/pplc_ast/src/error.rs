use std::fmt;

use thiserror::Error;

/// A position in the source text, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub row: u32,
    pub column: u32,
}

impl Location {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// Structured compilation diagnostics. All variants are fatal; the compiler
/// never catches its own errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("parse error{}: {message}", fmt_location(.location))]
    Parse {
        message: String,
        location: Option<Location>,
    },

    #[error("unresolved symbol `{name}`")]
    Resolution { name: String },

    #[error("invalid arguments for `{function}`: {message}")]
    Arity { function: String, message: String },

    #[error("static value required: {message}")]
    Static { message: String },

    #[error("invalid graph: {message}")]
    Graph { message: String },

    #[error("internal invariant violated: {message}")]
    Internal { message: String },
}

fn fmt_location(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!(" at {loc}"),
        None => String::new(),
    }
}

impl CompileError {
    pub fn parse(message: impl Into<String>, location: Option<Location>) -> Self {
        CompileError::Parse {
            message: message.into(),
            location,
        }
    }

    pub fn resolution(name: impl Into<String>) -> Self {
        CompileError::Resolution { name: name.into() }
    }

    pub fn arity(function: impl Into<String>, message: impl Into<String>) -> Self {
        CompileError::Arity {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn static_value(message: impl Into<String>) -> Self {
        CompileError::Static {
            message: message.into(),
        }
    }

    pub fn graph(message: impl Into<String>) -> Self {
        CompileError::Graph {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
