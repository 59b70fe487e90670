//! Tree and scope substrate for the `djs` deobfuscation toolkit.
//!
//! This crate owns the JavaScript syntax tree the restoration passes work
//! on, the mutating traversal that lets a pass rewrite the tree it is
//! walking, the lexical scope index, and the shared diagnostics/error
//! plumbing. Parsing and printing live in `djs-frontend`; the passes
//! themselves live in `djs-restore`.

#[macro_use]
pub mod macros;

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod scope;
pub mod span;

// Re-export commonly used items for convenience
pub use tracing;

pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
