//! Sandboxed fragment executor.
//!
//! A tree-walking interpreter over the core AST. The caller decides which
//! fragments get loaded (extracted string tables, decrypt functions,
//! rotation bootstraps) and which expressions get evaluated; nothing else
//! is reachable. There is no host capability surface: no filesystem, no
//! network, no clock, no randomness. Every evaluation step burns fuel and
//! exhaustion is an ordinary error, so a hostile fragment can spin but
//! not hang the pipeline.

mod builtins;
mod interp;
mod ops;
mod value;

pub use ops::{binary, logical_short_circuit, unary};
pub use value::{Closure, ClosureBody, Env, JsRegex, Value};

use djs_core::ast::{Expr, Stmt};
use thiserror::Error;

/// Default fuel budget, generous enough for a rotation loop over a large
/// string table while still bounding runaway fragments.
pub const DEFAULT_BUDGET: u64 = 2_000_000;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("evaluation budget exhausted")]
    Budget,
    #[error("{0} is not defined")]
    Reference(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("unsupported in sandbox: {0}")]
    Unsupported(String),
    #[error("uncaught: {0}")]
    Thrown(Value),
}

impl EvalError {
    /// Whether a `try` statement in interpreted code may catch this.
    /// Budget exhaustion and unsupported constructs always abort.
    pub fn is_catchable(&self) -> bool {
        matches!(
            self,
            EvalError::Thrown(_) | EvalError::Type(_) | EvalError::Reference(_)
        )
    }

    fn as_caught_value(&self) -> Value {
        match self {
            EvalError::Thrown(value) => value.clone(),
            other => Value::Str(other.to_string()),
        }
    }
}

/// One executor session: a global environment plus a fuel budget.
pub struct Sandbox {
    interp: interp::Interp,
    global: Env,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_BUDGET)
    }

    pub fn with_budget(fuel: u64) -> Self {
        Self {
            interp: interp::Interp::new(fuel),
            global: Env::root(),
        }
    }

    /// Execute a fragment in the global scope for its side effects
    /// (declarations land in the session).
    pub fn load(&mut self, stmts: &[Stmt]) -> Result<(), EvalError> {
        self.interp.exec_block(stmts, &self.global).map(|_| ())
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        self.interp.eval(expr, &self.global)
    }

    /// Execute a single statement in the global scope.
    pub fn exec(&mut self, stmt: &Stmt) -> Result<(), EvalError> {
        self.interp
            .exec_block(std::slice::from_ref(stmt), &self.global)
            .map(|_| ())
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.global.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.global.declare(name, value);
    }

    pub fn fuel_remaining(&self) -> u64 {
        self.interp.fuel_remaining()
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}
