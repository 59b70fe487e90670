//! The syntax tree the restoration passes operate on.
//!
//! This is a deliberately small ES subset: the four obfuscator families
//! emit nothing beyond it, and keeping the tree closed lets the detectors
//! and the sandbox stay total. Trees are plain owned data; `Box` breaks
//! recursion, there are no back edges.

mod build;
mod expr;
mod ops;
mod stmt;
pub mod visit;

pub use build::format_number;
pub use expr::*;
pub use ops::*;
pub use stmt::*;
pub use visit::{transform_program, transform_until_stable, ExprRewrite, StmtRewrite, Transform};

use crate::span::Span;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Program {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self {
            body,
            span: Span::DUMMY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: Span::DUMMY,
        }
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_displays_its_name() {
        assert_eq!(Ident::new("_0x4d2a").to_string(), "_0x4d2a");
        assert_eq!(format!("{}", Ident::new("v0")), "v0");
    }
}
