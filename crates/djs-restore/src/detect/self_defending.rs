//! Self-defending and anti-debug scaffolding.
//!
//! Three constructs, usually emitted together:
//!
//! * the formatting guard: `var g = (function () { var c = true; return
//!   function (ctx, fn) {...}; })();` plus one activation, either
//!   `var h = g(this, function () {...}); h();` or `g(this, ...)();`
//! * the debugger hammer: a function whose body is an inner function
//!   calling itself with an update expression, wrapped in a try
//! * the interval loop: an IIFE that re-arms the hammer via `setInterval`
//!
//! A guard whose activation cannot be found is reported and kept; tearing
//! out half of it would change what runs.

use djs_core::ast::{
    transform_program, Expr, ExprRewrite, Program, Stmt, Transform, UpdateExpr,
};
use djs_core::diagnostics::Diagnostic;
use djs_core::tracing::debug;

use super::shape;
use crate::walk::for_each_stmt_list;

/// Strip all three constructs; returns how many were removed.
pub fn remove(program: &mut Program, diagnostics: &mut Vec<Diagnostic>) -> usize {
    let mut removed = remove_guards(program, diagnostics);
    let hammer_names = remove_debug_hammers(program);
    removed += hammer_names.len();
    removed += remove_interval_loops(program, &hammer_names);
    removed
}

fn remove_guards(program: &mut Program, diagnostics: &mut Vec<Diagnostic>) -> usize {
    let mut guards = Vec::new();
    for_each_stmt_list(program, &mut |stmts| {
        for stmt in stmts.iter() {
            if let Some((name, Some(init))) = shape::single_decl(stmt) {
                if is_guard_factory(init) {
                    guards.push((name.name.clone(), stmt.clone()));
                }
            }
        }
    });

    let mut removed = 0;
    for (name, decl) in guards {
        match find_activation(program, &name) {
            Some(mut stmts) => {
                debug!(guard = %name, "removed self-defending guard");
                stmts.push(decl);
                remove_stmts(program, stmts);
                removed += 1;
            }
            None => diagnostics.push(
                Diagnostic::warning(format!(
                    "self-defending guard `{name}` has no recognizable activation, keeping it"
                ))
                .with_code("self-defending"),
            ),
        }
    }
    removed
}

/// `(function () { var c = true; return function (..) {..}; })()`
fn is_guard_factory(init: &Expr) -> bool {
    let Expr::Call(call) = init else {
        return false;
    };
    if !call.args.is_empty() {
        return false;
    }
    let Expr::Function(func) = call.callee.as_ref() else {
        return false;
    };
    let [first, second] = func.function.body.stmts.as_slice() else {
        return false;
    };
    let first_is_flag = matches!(
        shape::single_decl(first),
        Some((_, Some(Expr::Bool(b)))) if b.value
    );
    let second_is_closure = matches!(
        second,
        Stmt::Return(ret) if matches!(ret.arg.as_ref(), Some(Expr::Function(_)))
    );
    first_is_flag && second_is_closure
}

/// The statements that invoke the guard, cloned for removal by equality.
fn find_activation(program: &mut Program, guard: &str) -> Option<Vec<Stmt>> {
    let mut found = None;
    for_each_stmt_list(program, &mut |stmts| {
        if found.is_some() {
            return;
        }
        for (i, stmt) in stmts.iter().enumerate() {
            // `g(this, function () {...})();` in one statement.
            if let Some(Expr::Call(outer)) = stmt.as_expr() {
                if let Expr::Call(inner) = outer.callee.as_ref() {
                    if inner.callee.ident_name() == Some(guard) {
                        found = Some(vec![stmt.clone()]);
                        return;
                    }
                }
            }
            // `var h = g(this, ...);` followed by `h();` somewhere below.
            let Some((handle, Some(init))) = shape::single_decl(stmt) else {
                continue;
            };
            if shape::call_to(init, guard).is_none() {
                continue;
            }
            let call = stmts[i + 1..].iter().find(|later| {
                matches!(later.as_expr(), Some(expr) if shape::call_to(expr, &handle.name).is_some())
            });
            if let Some(call) = call {
                found = Some(vec![stmt.clone(), call.clone()]);
                return;
            }
        }
    });
    found
}

/// Remove the debugger hammers and report their names:
///
/// ```text
/// function outer(ret) {
///     function probe(counter) {
///         if (...) {...} else {...}
///         probe(++counter);
///     }
///     try { ... } catch (e) {}
/// }
/// ```
fn remove_debug_hammers(program: &mut Program) -> Vec<String> {
    let mut names = Vec::new();
    for_each_stmt_list(program, &mut |stmts| {
        let mut i = 0;
        while i < stmts.len() {
            if is_debug_hammer(&stmts[i]) {
                let Stmt::Func(decl) = &stmts[i] else {
                    unreachable!("matched shape is a function declaration");
                };
                debug!(name = %decl.name, "removed debugger hammer");
                names.push(decl.name.name.clone());
                stmts.remove(i);
            } else {
                i += 1;
            }
        }
    });
    names
}

fn is_debug_hammer(stmt: &Stmt) -> bool {
    let Stmt::Func(outer) = stmt else {
        return false;
    };
    let [Stmt::Func(inner), Stmt::Try(_)] = outer.function.body.stmts.as_slice() else {
        return false;
    };
    let [Stmt::If(_), recurse] = inner.function.body.stmts.as_slice() else {
        return false;
    };
    // The inner function re-arms itself with an update-expression arg.
    match recurse.as_expr() {
        Some(expr) => matches!(
            shape::call_to(expr, &inner.name.name),
            Some([Expr::Update(UpdateExpr { .. })])
        ),
        None => false,
    }
}

fn remove_interval_loops(program: &mut Program, hammer_names: &[String]) -> usize {
    let mut removed = 0;
    for_each_stmt_list(program, &mut |stmts| {
        stmts.retain(|stmt| {
            let is_loop = match stmt.as_expr() {
                Some(Expr::Call(call)) => match call.callee.as_ref() {
                    Expr::Function(func) => {
                        body_rearms(&func.function.body.stmts, hammer_names)
                    }
                    _ => false,
                },
                _ => false,
            };
            if is_loop {
                debug!("removed setInterval re-arm loop");
                removed += 1;
            }
            !is_loop
        });
    });
    removed
}

/// An IIFE body that keeps the hammer alive: it calls `setInterval` and,
/// when hammers were found by name, mentions one of them.
fn body_rearms(body: &[Stmt], hammer_names: &[String]) -> bool {
    let mut probe = Probe {
        interval: false,
        named: hammer_names.is_empty(),
        names: hammer_names,
    };
    let mut scratch = Program::new(body.to_vec());
    transform_program(&mut scratch, &mut probe);
    probe.interval && probe.named
}

struct Probe<'a> {
    interval: bool,
    named: bool,
    names: &'a [String],
}

impl Transform for Probe<'_> {
    fn enter_expr(&mut self, expr: &mut Expr) -> ExprRewrite {
        match expr {
            Expr::Call(call) => {
                let callee_name = match call.callee.as_ref() {
                    Expr::Member(member) => member.property.static_name(),
                    callee => callee.ident_name(),
                };
                if callee_name == Some("setInterval") {
                    self.interval = true;
                }
            }
            Expr::Ident(ident) => {
                if self.names.iter().any(|n| *n == ident.name) {
                    self.named = true;
                }
            }
            _ => {}
        }
        ExprRewrite::Keep
    }
}

fn remove_stmts(program: &mut Program, mut pending: Vec<Stmt>) {
    for_each_stmt_list(program, &mut |stmts| {
        stmts.retain(|stmt| match pending.iter().position(|p| p == stmt) {
            Some(at) => {
                pending.remove(at);
                false
            }
            None => true,
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::parse;

    const GUARD: &str = "\
var _0x5b = (function () {
    var _0x2f = true;
    return function (_0x4a, _0x1d) {
        var _0x3c = _0x2f ? function () {
            if (_0x1d) {
                var _0x55 = _0x1d.apply(_0x4a, arguments);
                _0x1d = null;
                return _0x55;
            }
        } : function () {};
        _0x2f = false;
        return _0x3c;
    };
})();
";

    #[test]
    fn guard_with_handle_activation_is_removed() {
        let source = format!(
            "{GUARD}var _0x12 = _0x5b(this, function () {{ return 'dev'; }});\n_0x12();\nkeep();"
        );
        let mut program = parse(&source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(remove(&mut program, &mut diagnostics), 1);
        assert!(diagnostics.is_empty());
        assert_eq!(program.body.len(), 1);
    }

    #[test]
    fn guard_with_inline_activation_is_removed() {
        let source = format!("{GUARD}_0x5b(this, function () {{ return 'dev'; }})();\nkeep();");
        let mut program = parse(&source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(remove(&mut program, &mut diagnostics), 1);
        assert_eq!(program.body.len(), 1);
    }

    #[test]
    fn unactivated_guard_is_kept_and_reported() {
        let source = format!("{GUARD}keep();");
        let mut program = parse(&source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(remove(&mut program, &mut diagnostics), 0);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn hammer_and_interval_loop_are_removed_together() {
        let source = "\
function _0x3f(_0x4e) {
    function _0x21(_0x3d) {
        if (typeof _0x3d === 'string') {
            return function (_0x2a) {}.constructor('while (true) {}').apply('counter');
        } else {
            ('' + _0x3d / _0x3d).length !== 1 || _0x3d % 20 === 0 ? function () {
                return true;
            }.constructor('debu' + 'gger').call('action') : function () {
                return false;
            }.constructor('debu' + 'gger').apply('stateObject');
        }
        _0x21(++_0x3d);
    }
    try {
        if (_0x4e) {
            return _0x21;
        } else {
            _0x21(0);
        }
    } catch (_0x1e) {}
}
(function () {
    setInterval(function () {
        _0x3f();
    }, 4000);
})();
keep();
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(remove(&mut program, &mut diagnostics), 2);
        assert!(diagnostics.is_empty());
        assert_eq!(program.body.len(), 1);
    }
}
