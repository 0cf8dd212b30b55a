//! Surface-syntax front-ends for the pplc compiler.
//!
//! Two front-ends share one output vocabulary: a Python-like syntax
//! (indentation, assignments, `def`) and a Lisp-like syntax (s-expressions
//! with a statically unrolled bounded `loop`). Language auto-detection scans
//! the first significant character of the source.

pub mod clojure;
pub mod python;

use pplc_ast::{CompileError, Node, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    Clojure,
}

/// Guesses the surface language from the first significant character:
/// `(` or `;` read as Lisp-like, `#`, letters and `_` as Python-like.
pub fn detect_language(source: &str) -> Option<Language> {
    for c in source.chars() {
        if c == '#' {
            return Some(Language::Python);
        } else if c == ';' || c == '(' {
            return Some(Language::Clojure);
        } else if c.is_ascii_alphabetic() || c == '_' {
            return Some(Language::Python);
        } else if c > ' ' {
            return Some(Language::Python);
        }
    }
    None
}

/// Parses `source` with the given front-end into the raw AST.
pub fn parse(source: &str, language: Language) -> Result<Node> {
    log::debug!("parsing {language:?} source ({} bytes)", source.len());
    match language {
        Language::Python => python::parse(source),
        Language::Clojure => clojure::parse(source),
    }
}

/// Auto-detecting variant of [`parse`].
pub fn parse_auto(source: &str) -> Result<Node> {
    let language = detect_language(source)
        .ok_or_else(|| CompileError::parse("cannot detect source language of empty input", None))?;
    parse(source, language)
}
