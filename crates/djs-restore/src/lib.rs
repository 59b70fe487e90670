//! Restoration passes for obfuscated JavaScript.
//!
//! The crate takes a parsed [`djs_core::ast::Program`] and rewrites it back
//! toward readable source: a generic simplifier, a constant evaluator, a
//! sandboxed fragment executor, structural detectors for the known
//! obfuscator signatures, and control-flow recovery for the four
//! flattening encodings. [`pipeline::deobfuscate`] composes them into
//! per-family recipes.

pub mod const_eval;
pub mod detect;
pub mod flow;
pub mod pipeline;
pub mod rename;
pub mod sandbox;
pub mod simplify;

mod walk;

pub use pipeline::{deobfuscate, Options, Recipe};
