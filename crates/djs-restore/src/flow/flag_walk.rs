//! The for/if-else flag walker.
//!
//! ```text
//! var _0x1f = 1, _0x33 = 0;
//! for (;;) {
//!     if (_0x1f === 1) {
//!         a();
//!         _0x1f = _0x33 > 2 ? 4 : 2;
//!     } else if (_0x1f === 2) { ... } else ...
//! }
//! ```
//!
//! The control state is arbitrary expressions over flag variables, so a
//! literal walk is not enough: the flags live in the sandbox and every
//! test is evaluated there. At a data-dependent branch the walker
//! snapshots the flags, walks both futures, and emits a real `if`.

use djs_core::ast::{Expr, ForInit, IfStmt, Program, Stmt, VarDecl};
use djs_core::diagnostics::Diagnostic;
use djs_core::tracing::debug;

use crate::const_eval;
use crate::sandbox::{EvalError, Sandbox, Value};
use crate::walk::for_each_stmt_list;

const MAX_STEPS: usize = 4096;

/// Unflatten every for/if-else loop; returns how many were rebuilt.
pub fn restore(program: &mut Program, diagnostics: &mut Vec<Diagnostic>) -> usize {
    let mut restored = 0;
    for_each_stmt_list(program, &mut |stmts| {
        let mut i = 0;
        while i < stmts.len() {
            let Some(plan) = match_loop(stmts, i) else {
                i += 1;
                continue;
            };
            match decode(&plan) {
                Ok(body) => {
                    debug!(flags = ?plan.names, "unflattened for/if-else loop");
                    let emitted = body.len();
                    let first = i - plan.leading_decls;
                    stmts.splice(first..=i, body);
                    restored += 1;
                    i = first + emitted;
                }
                Err(err) => {
                    diagnostics.push(
                        Diagnostic::warning(format!("flag walk failed: {err}"))
                            .with_code("flatten"),
                    );
                    i += 1;
                }
            }
        }
    });
    restored
}

struct Plan {
    /// Flag variable names, all loaded into the sandbox.
    names: Vec<String>,
    decl: VarDecl,
    /// 1 when the flag declaration is the sibling before the loop,
    /// 0 when it sits in the `for` init.
    leading_decls: usize,
    test: Option<Expr>,
    update: Option<Expr>,
    body_if: IfStmt,
}

fn match_loop(stmts: &[Stmt], at: usize) -> Option<Plan> {
    let Stmt::For(for_stmt) = &stmts[at] else {
        return None;
    };
    let [Stmt::If(body_if)] = for_stmt.body.block_stmts() else {
        return None;
    };
    let body_if = body_if.clone();
    let (decl, leading_decls) = match &for_stmt.init {
        Some(ForInit::VarDecl(decl)) => (decl.clone(), 0),
        Some(ForInit::Expr(_)) => return None,
        None => match at.checked_sub(1).map(|p| &stmts[p]) {
            Some(Stmt::VarDecl(decl)) => (decl.clone(), 1),
            _ => return None,
        },
    };
    // Every flag must be computable up front or the sandbox session
    // cannot be seeded.
    if !decl
        .decls
        .iter()
        .all(|d| d.init.as_ref().is_some_and(const_eval::can_evaluate))
    {
        return None;
    }
    let names = decl.decls.iter().map(|d| d.name.name.clone()).collect();
    Some(Plan {
        names,
        decl,
        leading_decls,
        test: for_stmt.test.clone(),
        update: for_stmt.update.clone(),
        body_if,
    })
}

fn decode(plan: &Plan) -> Result<Vec<Stmt>, EvalError> {
    let mut sandbox = Sandbox::new();
    sandbox.load(std::slice::from_ref(&Stmt::VarDecl(plan.decl.clone())))?;
    let mut walker = Walker {
        sandbox,
        plan,
        steps: 0,
    };
    walker.wander()
}

enum Flow {
    Continue,
    Stop,
}

struct Walker<'a> {
    sandbox: Sandbox,
    plan: &'a Plan,
    steps: usize,
}

impl Walker<'_> {
    fn wander(&mut self) -> Result<Vec<Stmt>, EvalError> {
        let mut out = Vec::new();
        loop {
            self.steps += 1;
            if self.steps > MAX_STEPS {
                return Err(EvalError::Budget);
            }
            if let Some(test) = &self.plan.test {
                if !self.sandbox.eval(test)?.is_truthy() {
                    break;
                }
            }
            let body_if = self.plan.body_if.clone();
            match self.step_if(&body_if, &mut out)? {
                Flow::Stop => return Ok(out),
                Flow::Continue => {
                    if let Some(update) = &self.plan.update {
                        self.sandbox.eval(update)?;
                    }
                }
            }
        }
        Ok(out)
    }

    /// Evaluate the test and descend into the taken arm (or the next
    /// `else if` link).
    fn step_if(&mut self, if_stmt: &IfStmt, out: &mut Vec<Stmt>) -> Result<Flow, EvalError> {
        let taken = if self.sandbox.eval(&if_stmt.test)?.is_truthy() {
            if_stmt.consequent.as_ref()
        } else {
            match &if_stmt.alternate {
                Some(alternate) => alternate.as_ref(),
                None => return Ok(Flow::Continue),
            }
        };
        match taken {
            Stmt::If(nested) => {
                let nested = nested.clone();
                self.step_if(&nested, out)
            }
            Stmt::Block(block) => {
                let stmts = block.stmts.clone();
                self.run_branch(&stmts, out)
            }
            other => {
                let single = other.clone();
                self.run_branch(std::slice::from_ref(&single), out)
            }
        }
    }

    fn run_branch(&mut self, stmts: &[Stmt], out: &mut Vec<Stmt>) -> Result<Flow, EvalError> {
        for stmt in stmts {
            // A two-armed flag assignment is a real branch: fork the
            // session and walk both futures.
            if let Stmt::If(inner) = stmt {
                let arms = flag_assign(&inner.consequent, &self.plan.names).zip(
                    inner
                        .alternate
                        .as_ref()
                        .and_then(|alt| flag_assign(alt, &self.plan.names)),
                );
                if let Some((left, right)) = arms {
                    let (left, right) = (left.clone(), right.clone());
                    return self.fork(inner.test.clone(), &left, &right, out);
                }
                out.push(stmt.clone());
                continue;
            }
            match stmt.as_expr() {
                Some(assign @ Expr::Assign(a)) if self.is_flag(&a.target) => {
                    if let Expr::Cond(cond) = a.value.as_ref() {
                        let target = a.target.as_ref().clone();
                        let left = Expr::assign(target.clone(), cond.consequent.as_ref().clone());
                        let right = Expr::assign(target, cond.alternate.as_ref().clone());
                        return self.fork(cond.test.as_ref().clone(), &left, &right, out);
                    }
                    self.sandbox.eval(assign)?;
                }
                Some(update @ Expr::Update(u)) if self.is_flag(&u.arg) => {
                    self.sandbox.eval(update)?;
                }
                _ => match stmt {
                    Stmt::Return(_) => {
                        out.push(stmt.clone());
                        return Ok(Flow::Stop);
                    }
                    Stmt::Break(_) => return Ok(Flow::Stop),
                    Stmt::Continue(_) => return Ok(Flow::Continue),
                    _ => out.push(stmt.clone()),
                },
            }
        }
        Ok(Flow::Continue)
    }

    /// Emit `if (test) { ...left future... } else { ...right future... }`.
    fn fork(
        &mut self,
        test: Expr,
        left: &Expr,
        right: &Expr,
        out: &mut Vec<Stmt>,
    ) -> Result<Flow, EvalError> {
        let snapshot = self.snapshot();
        self.sandbox.eval(left)?;
        let taken = self.wander()?;
        self.restore_snapshot(snapshot);
        self.sandbox.eval(right)?;
        let other = self.wander()?;
        out.push(Stmt::if_else(test, taken, Some(other)));
        Ok(Flow::Stop)
    }

    fn is_flag(&self, expr: &Expr) -> bool {
        matches!(expr.ident_name(), Some(name) if self.plan.names.iter().any(|n| n == name))
    }

    fn snapshot(&self) -> Vec<(String, Value)> {
        self.plan
            .names
            .iter()
            .map(|name| {
                let value = self.sandbox.get(name).unwrap_or(Value::Undefined);
                (name.clone(), value)
            })
            .collect()
    }

    fn restore_snapshot(&mut self, snapshot: Vec<(String, Value)>) {
        for (name, value) in snapshot {
            self.sandbox.set(&name, value);
        }
    }
}

/// A branch that is exactly one plain assignment to a flag variable,
/// possibly block-wrapped; yields the assignment expression.
fn flag_assign<'a>(branch: &'a Stmt, names: &[String]) -> Option<&'a Expr> {
    let stmt = match branch {
        Stmt::Block(block) => match block.stmts.as_slice() {
            [stmt] => stmt,
            _ => return None,
        },
        other => other,
    };
    match stmt.as_expr()? {
        assign @ Expr::Assign(a) if a.op.is_plain() => {
            let target = a.target.ident_name()?;
            names.iter().any(|n| n == target).then_some(assign)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::{parse, print};

    #[test]
    fn flag_chain_linearizes() {
        let source = "\
var _0x1f = 1;
for (; _0x1f !== 0;) {
    if (_0x1f === 1) {
        a();
        _0x1f = 2;
    } else if (_0x1f === 2) {
        b();
        _0x1f = 0;
    }
}
after();
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 1);
        assert!(diagnostics.is_empty());
        assert_eq!(print(&program).unwrap(), "a();\nb();\nafter();\n");
    }

    #[test]
    fn conditional_flag_forks_into_if_else() {
        let source = "\
var _0x1f = 1;
for (; _0x1f !== 0;) {
    if (_0x1f === 1) {
        _0x1f = x ? 2 : 3;
    } else if (_0x1f === 2) {
        pos();
        _0x1f = 0;
    } else if (_0x1f === 3) {
        neg();
        _0x1f = 0;
    }
}
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 1);
        assert_eq!(
            print(&program).unwrap(),
            "if (x) {\n    pos();\n} else {\n    neg();\n}\n"
        );
    }

    #[test]
    fn unbraced_loop_body_matches() {
        let source = "\
var _0x1f = 1;
for (; _0x1f !== 0;) if (_0x1f === 1) {
    a();
    _0x1f = 0;
}
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 1);
        assert!(diagnostics.is_empty());
        assert_eq!(print(&program).unwrap(), "a();\n");
    }

    #[test]
    fn stuck_flags_report_and_keep_the_loop() {
        let source = "\
var _0x1f = 1;
for (; _0x1f !== 0;) {
    if (_0x1f === 1) {
        a();
    }
}
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 0);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(program.body.len(), 2);
    }
}
