//! The while/switch dispatcher.
//!
//! ```text
//! var _0x30 = '2|0|1'.split('|'), _0x31 = 0;
//! while (true) {
//!     switch (_0x30[_0x31++]) {
//!         case '0': b(); continue;
//!         case '1': c(); continue;
//!         case '2': a(); continue;
//!     }
//!     break;
//! }
//! ```
//!
//! The order array spells out the real sequence: case bodies are
//! concatenated in its order and the machinery (loop, order array, index
//! counter) is deleted.

use djs_core::ast::{Expr, MemberProp, Program, Stmt, SwitchCase, UpdateOp};
use djs_core::diagnostics::Diagnostic;
use djs_core::tracing::debug;

use crate::const_eval;
use crate::sandbox::{Sandbox, Value};
use crate::walk::for_each_stmt_list;

/// Unflatten every while/switch loop; returns how many were rebuilt.
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
                    debug!(order = plan.order.len(), "unflattened while/switch loop");
                    let emitted = body.len();
                    stmts.splice(i..=i, body);
                    remove_machinery(stmts, &plan.array_name, &plan.index_name);
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

struct Plan {
    array_name: String,
    index_name: String,
    order: Vec<String>,
    start: usize,
    cases: Vec<SwitchCase>,
}

fn match_loop(stmts: &[Stmt], at: usize) -> Option<Plan> {
    let Stmt::While(while_stmt) = &stmts[at] else {
        return None;
    };
    if !const_eval::evaluate(&while_stmt.test).is_some_and(|v| v.is_truthy()) {
        return None;
    }
    let [Stmt::Switch(switch), Stmt::Break(_)] = while_stmt.body.block_stmts() else {
        return None;
    };
    // `order[index++]`
    let Expr::Member(member) = &switch.discriminant else {
        return None;
    };
    let array_name = member.object.ident_name()?.to_string();
    let MemberProp::Computed(prop) = &member.property else {
        return None;
    };
    let Expr::Update(update) = prop.as_ref() else {
        return None;
    };
    if update.op != UpdateOp::Incr || update.prefix {
        return None;
    }
    let index_name = update.arg.ident_name()?.to_string();

    let order = Sandbox::new()
        .eval(declarator_init(&stmts[..at], &array_name)?)
        .ok()
        .and_then(|value| match value {
            Value::Array(items) => {
                Some(items.borrow().iter().map(Value::to_js_string).collect())
            }
            _ => None,
        })?;
    let start = const_eval::evaluate(declarator_init(&stmts[..at], &index_name)?)?.to_number();
    if start < 0.0 || start.fract() != 0.0 {
        return None;
    }
    Some(Plan {
        array_name,
        index_name,
        order,
        start: start as usize,
        cases: switch.cases.clone(),
    })
}

fn declarator_init<'a>(stmts: &'a [Stmt], name: &str) -> Option<&'a Expr> {
    stmts.iter().find_map(|stmt| match stmt {
        Stmt::VarDecl(decl) => decl
            .decls
            .iter()
            .find(|d| d.name.name == name)
            .and_then(|d| d.init.as_ref()),
        _ => None,
    })
}

fn decode(plan: &Plan) -> Result<Vec<Stmt>, Diagnostic> {
    let mut out = Vec::new();
    for key in &plan.order[plan.start.min(plan.order.len())..] {
        let case = plan
            .cases
            .iter()
            .find(|case| {
                case.test
                    .as_ref()
                    .and_then(const_eval::evaluate)
                    .is_some_and(|v| v.to_js_string() == *key)
            })
            .ok_or_else(|| {
                Diagnostic::warning(format!(
                    "dispatch order references case `{key}` which does not exist"
                ))
                .with_code("flatten")
            })?;
        for stmt in &case.body {
            match stmt {
                Stmt::Continue(_) => {}
                // A break falls out of the loop; nothing later runs.
                Stmt::Break(_) => return Ok(out),
                _ => out.push(stmt.clone()),
            }
        }
        if matches!(out.last(), Some(Stmt::Return(_))) {
            break;
        }
    }
    Ok(out)
}

/// Drop the order-array and index declarators from this list.
fn remove_machinery(stmts: &mut Vec<Stmt>, array_name: &str, index_name: &str) {
    for stmt in stmts.iter_mut() {
        if let Stmt::VarDecl(decl) = stmt {
            decl.decls
                .retain(|d| d.name.name != array_name && d.name.name != index_name);
        }
    }
    stmts.retain(|stmt| match stmt {
        Stmt::VarDecl(decl) => !decl.decls.is_empty(),
        _ => true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::{parse, print};

    #[test]
    fn order_array_drives_the_sequence() {
        let source = "\
function go() {
    var _0x30 = '2|0|1'.split('|'), _0x31 = 0;
    while (true) {
        switch (_0x30[_0x31++]) {
            case '0':
                b();
                continue;
            case '1':
                c();
                continue;
            case '2':
                a();
                continue;
        }
        break;
    }
}
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 1);
        assert!(diagnostics.is_empty());
        assert_eq!(
            print(&program).unwrap(),
            "function go() {\n    a();\n    b();\n    c();\n}\n"
        );
    }

    #[test]
    fn missing_case_reports_and_keeps_the_loop() {
        let source = "\
var _0x30 = '0|9'.split('|'), _0x31 = 0;
while (true) {
    switch (_0x30[_0x31++]) {
        case '0':
            a();
            continue;
    }
    break;
}
";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 0);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(program.body.len(), 2);
    }
}
