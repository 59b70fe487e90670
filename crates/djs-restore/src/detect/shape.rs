//! Small shape predicates shared by the detectors.

use djs_core::ast::{Expr, Function, Ident, Stmt};

/// The function body is exactly `return f(...)`; yields the callee name.
pub fn single_return_call(function: &Function) -> Option<&str> {
    match function.body.stmts.as_slice() {
        [stmt] => return_call_name(stmt),
        _ => None,
    }
}

/// `return f(...)` — the callee identifier name.
pub fn return_call_name(stmt: &Stmt) -> Option<&str> {
    match stmt {
        Stmt::Return(ret) => match ret.arg.as_ref()? {
            Expr::Call(call) => call.callee.ident_name(),
            _ => None,
        },
        _ => None,
    }
}

/// An array literal made only of string literals.
pub fn str_array_elements(expr: &Expr) -> Option<Vec<String>> {
    match expr {
        Expr::Array(array) => array
            .elements
            .iter()
            .map(|e| e.as_ref()?.as_str_lit().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// `name = <value>;` — the assigned value.
pub fn assignment_to<'a>(stmt: &'a Stmt, name: &str) -> Option<&'a Expr> {
    let (target, value) = any_assignment(stmt)?;
    (target == name).then_some(value)
}

/// A plain assignment statement to an identifier.
pub fn any_assignment(stmt: &Stmt) -> Option<(&str, &Expr)> {
    match stmt.as_expr()? {
        Expr::Assign(assign) if assign.op.is_plain() => {
            Some((assign.target.ident_name()?, &assign.value))
        }
        _ => None,
    }
}

/// A declaration statement with exactly one declarator.
pub fn single_decl(stmt: &Stmt) -> Option<(&Ident, Option<&Expr>)> {
    match stmt {
        Stmt::VarDecl(decl) => match decl.decls.as_slice() {
            [declarator] => Some((&declarator.name, declarator.init.as_ref())),
            _ => None,
        },
        _ => None,
    }
}

/// A call with the given identifier callee; yields the arguments.
pub fn call_to<'a>(expr: &'a Expr, name: &str) -> Option<&'a [Expr]> {
    match expr {
        Expr::Call(call) if call.callee.ident_name() == Some(name) => Some(&call.args),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::parse;

    #[test]
    fn shapes_match_parsed_statements() {
        let program =
            parse("function p() { return target(1); }\nvar a = ['x', 'y'];\nf = g;").unwrap();
        let Stmt::Func(decl) = &program.body[0] else {
            panic!("expected function");
        };
        assert_eq!(single_return_call(&decl.function), Some("target"));

        let (name, init) = single_decl(&program.body[1]).unwrap();
        assert_eq!(name.name, "a");
        assert_eq!(
            str_array_elements(init.unwrap()),
            Some(vec!["x".to_string(), "y".to_string()])
        );

        assert!(assignment_to(&program.body[2], "f").is_some());
        assert!(assignment_to(&program.body[2], "g").is_none());
    }
}
