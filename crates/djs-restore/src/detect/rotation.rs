//! The table-rotation bootstrap.
//!
//! All three families shuffle the string table at startup until a
//! checksum expression matches. The statement is extracted whole and run
//! in the sandbox so the loaded table ends up in decrypted order.

use djs_core::ast::{Expr, Program, Stmt};
use djs_core::tracing::debug;

use crate::walk::for_each_stmt_list;

/// Commercial shape: `(function (t, n) { var u; while (true) {...} })(table, 0x123);`
pub fn extract_commercial(program: &mut Program, table_name: &str) -> Option<Stmt> {
    extract(program, "commercial", |call| {
        let [arg0, arg1] = call.args.as_slice() else {
            return false;
        };
        if arg0.ident_name() != Some(table_name) || !matches!(arg1, Expr::Num(_)) {
            return false;
        }
        let Expr::Function(func) = call.callee.as_ref() else {
            return false;
        };
        matches!(
            func.function.body.stmts.as_slice(),
            [Stmt::VarDecl(_), Stmt::While(_)]
        )
    })
}

/// Packer v6 shape: a plain call `shuffle(array, 0x1, 0x2);`.
pub fn extract_packer_v6(program: &mut Program, array_name: &str) -> Option<Stmt> {
    extract(program, "packer-v6", |call| {
        let [arg0, arg1, arg2] = call.args.as_slice() else {
            return false;
        };
        arg0.ident_name() == Some(array_name)
            && matches!(arg1, Expr::Num(_))
            && matches!(arg2, Expr::Num(_))
    })
}

/// Packer v7 shape: `(function (a, b, t, c) { ...; ...; ...; return r; })(0x1, 0x2, table, 0x3);`
pub fn extract_packer_v7(program: &mut Program, table_name: &str) -> Option<Stmt> {
    extract(program, "packer-v7", |call| {
        let [arg0, arg1, arg2, arg3] = call.args.as_slice() else {
            return false;
        };
        if !matches!(arg0, Expr::Num(_))
            || !matches!(arg1, Expr::Num(_))
            || arg2.ident_name() != Some(table_name)
            || !matches!(arg3, Expr::Num(_))
        {
            return false;
        }
        let Expr::Function(func) = call.callee.as_ref() else {
            return false;
        };
        matches!(
            func.function.body.stmts.as_slice(),
            [Stmt::Expr(_), Stmt::Expr(_), Stmt::Expr(_), Stmt::Return(_)]
        )
    })
}

fn extract(
    program: &mut Program,
    family: &str,
    matches_call: impl Fn(&djs_core::ast::CallExpr) -> bool,
) -> Option<Stmt> {
    let mut found = None;
    for_each_stmt_list(program, &mut |stmts| {
        if found.is_some() {
            return;
        }
        let at = stmts.iter().position(|stmt| match stmt.as_expr() {
            Some(Expr::Call(call)) => matches_call(call),
            _ => false,
        });
        if let Some(at) = at {
            debug!(family, "extracted rotation bootstrap");
            found = Some(stmts.remove(at));
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::parse;

    #[test]
    fn commercial_rotation_matches_by_table_name() {
        let source = "\
(function (t, n) {
    var u = parseInt;
    while (true) {
        t.push(t.shift());
        n--;
        if (!n) break;
    }
})(_0x59e3, 0x5);
after();
";
        let mut program = parse(source).unwrap();
        assert!(extract_commercial(&mut program, "_0x59e3").is_some());
        assert_eq!(program.body.len(), 1);
        // Wrong table name: no match.
        let mut program = parse(source).unwrap();
        assert!(extract_commercial(&mut program, "_0xother").is_none());
    }

    #[test]
    fn v6_rotation_is_a_bare_call() {
        let mut program = parse("shuffle(_0xb1d0, 0x15, 0xc3);").unwrap();
        assert!(extract_packer_v6(&mut program, "_0xb1d0").is_some());
        assert!(program.body.is_empty());
    }
}
