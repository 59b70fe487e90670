//! The for/switch control walker.
//!
//! ```text
//! for (var _0x4d = 5;;) {
//!     switch (_0x4d) {
//!         case 5: a(); _0x4d = cond ? 3 : 9; continue;
//!         case 3: b(); return x;
//!         case 9: c(); _0x4d = 0; continue;
//!     }
//! }
//! ```
//!
//! Unlike the while/switch form there is no order array: the next case is
//! named by assignments to the control variable. The walk follows those
//! literal values, forking into an `if`/`else` when a branch point
//! (two-armed assignment or conditional value) is reached.

use djs_core::ast::{Expr, ForInit, Program, Stmt, SwitchCase};
use djs_core::diagnostics::Diagnostic;
use djs_core::tracing::debug;

use crate::detect::shape;
use crate::walk::for_each_stmt_list;

const MAX_STEPS: usize = 4096;

/// Unflatten every for/switch loop; returns how many were rebuilt.
pub fn restore(program: &mut Program, diagnostics: &mut Vec<Diagnostic>) -> usize {
    let mut restored = 0;
    for_each_stmt_list(program, &mut |stmts| {
        let mut i = 0;
        while i < stmts.len() {
            let Some((control, start, cases)) = match_loop(&stmts[i]) else {
                i += 1;
                continue;
            };
            let mut walker = Walker {
                control: &control,
                cases: &cases,
                steps: 0,
            };
            match walker.walk(start) {
                Ok(body) => {
                    debug!(control = %control, "unflattened for/switch loop");
                    let emitted = body.len();
                    stmts.splice(i..=i, body);
                    restored += 1;
                    i += emitted;
                }
                Err(diag) => {
                    diagnostics.push(diag);
                    i += 1;
                }
            }
        }
    });
    restored
}

fn match_loop(stmt: &Stmt) -> Option<(String, f64, Vec<SwitchCase>)> {
    let Stmt::For(for_stmt) = stmt else {
        return None;
    };
    let Some(ForInit::VarDecl(init)) = &for_stmt.init else {
        return None;
    };
    let [declarator] = init.decls.as_slice() else {
        return None;
    };
    let start = declarator.init.as_ref()?.as_num_lit()?;
    let control = declarator.name.name.clone();

    let [Stmt::Switch(switch)] = for_stmt.body.block_stmts() else {
        return None;
    };
    if switch.discriminant.ident_name() != Some(&control) {
        return None;
    }
    // The entry value must name a case, otherwise this is not a dispatch.
    find_case(&switch.cases, start)?;
    Some((control, start, switch.cases.clone()))
}

fn find_case(cases: &[SwitchCase], control: f64) -> Option<&SwitchCase> {
    cases
        .iter()
        .find(|case| case.test.as_ref().and_then(Expr::as_num_lit) == Some(control))
}

struct Walker<'a> {
    control: &'a str,
    cases: &'a [SwitchCase],
    steps: usize,
}

impl Walker<'_> {
    fn walk(&mut self, mut control: f64) -> Result<Vec<Stmt>, Diagnostic> {
        let mut out = Vec::new();
        // Walking stops at a case body that names no successor: the real
        // loop would spin on a missing case until something returns, and
        // the encoders use an out-of-range value as the exit.
        while let Some(case) = find_case(self.cases, control) {
            self.steps += 1;
            if self.steps > MAX_STEPS {
                return Err(Diagnostic::warning(format!(
                    "control walk over `{}` exceeded {MAX_STEPS} steps",
                    self.control
                ))
                .with_code("flatten"));
            }
            let mut next = None;
            for stmt in &case.body {
                match stmt {
                    Stmt::Break(_) | Stmt::Continue(_) => {}
                    Stmt::Return(_) => {
                        out.push(stmt.clone());
                        return Ok(out);
                    }
                    Stmt::If(if_stmt) => {
                        let fork = branch_value(&if_stmt.consequent, self.control).zip(
                            if_stmt
                                .alternate
                                .as_ref()
                                .and_then(|alt| branch_value(alt, self.control)),
                        );
                        match fork {
                            Some((left, right)) => {
                                let taken = self.walk(left)?;
                                let other = self.walk(right)?;
                                out.push(Stmt::if_else(if_stmt.test.clone(), taken, Some(other)));
                                return Ok(out);
                            }
                            None => out.push(stmt.clone()),
                        }
                    }
                    _ => match shape::assignment_to(stmt, self.control) {
                        Some(Expr::Num(num)) => next = Some(num.value),
                        Some(Expr::Cond(cond)) => {
                            let (Some(left), Some(right)) = (
                                cond.consequent.as_num_lit(),
                                cond.alternate.as_num_lit(),
                            ) else {
                                out.push(stmt.clone());
                                continue;
                            };
                            let taken = self.walk(left)?;
                            let other = self.walk(right)?;
                            out.push(Stmt::if_else(cond.test.as_ref().clone(), taken, Some(other)));
                            return Ok(out);
                        }
                        _ => out.push(stmt.clone()),
                    },
                }
            }
            match next {
                Some(value) => control = value,
                None => break,
            }
        }
        Ok(out)
    }
}

/// A branch that is exactly `control = <number>;`, possibly block-wrapped.
fn branch_value(branch: &Stmt, control: &str) -> Option<f64> {
    let stmt = match branch {
        Stmt::Block(block) => match block.stmts.as_slice() {
            [stmt] => stmt,
            _ => return None,
        },
        other => other,
    };
    shape::assignment_to(stmt, control)?.as_num_lit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::{parse, print};

    #[test]
    fn literal_assignments_order_the_cases() {
        let source = "\
for (var _0x4d = 5;;) {
    switch (_0x4d) {
        case 3:
            b();
            _0x4d = 0;
            continue;
        case 5:
            a();
            _0x4d = 3;
            continue;
    }
}
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 1);
        assert!(diagnostics.is_empty());
        assert_eq!(print(&program).unwrap(), "a();\nb();\n");
    }

    #[test]
    fn conditional_successor_forks_into_if_else() {
        let source = "\
function go(x) {
    for (var _0x4d = 1;;) {
        switch (_0x4d) {
            case 1:
                _0x4d = x > 0 ? 2 : 3;
                continue;
            case 2:
                pos();
                _0x4d = 4;
                continue;
            case 3:
                neg();
                _0x4d = 4;
                continue;
            case 4:
                done();
                return;
        }
    }
}
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 1);
        assert_eq!(
            print(&program).unwrap(),
            "function go(x) {\n    if (x > 0) {\n        pos();\n        done();\n        return;\n    } else {\n        neg();\n        done();\n        return;\n    }\n}\n"
        );
    }

    #[test]
    fn unbraced_switch_body_matches() {
        let source = "\
for (var _0x4d = 1;;) switch (_0x4d) {
    case 1:
        a();
        _0x4d = 0;
        continue;
}
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 1);
        assert!(diagnostics.is_empty());
        assert_eq!(print(&program).unwrap(), "a();\n");
    }

    #[test]
    fn cyclic_dispatch_reports_and_keeps_the_loop() {
        let source = "\
for (var _0x4d = 1;;) {
    switch (_0x4d) {
        case 1:
            a();
            _0x4d = 2;
            continue;
        case 2:
            b();
            _0x4d = 1;
            continue;
    }
}
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 0);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(program.body.len(), 1);
    }
}
