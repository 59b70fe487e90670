//! The decrypt function and its proxy chains.

use djs_core::ast::{Expr, MemberProp, Program, Stmt};
use djs_core::tracing::debug;

use super::shape;
use crate::walk::for_each_stmt_list;

/// Extracted decrypt fragments: names callable at decrypt sites plus the
/// declarations the sandbox must load.
#[derive(Default)]
pub struct Decrypt {
    pub names: Vec<String>,
    pub decls: Vec<Stmt>,
}

/// The commercial three-statement shape:
///
/// ```text
/// function d(i, k) {
///     var table = t();
///     d = function (i2, k2) { ... };
///     return d(i, k);
/// }
/// ```
pub fn extract_callers(program: &mut Program, table_name: &str) -> Decrypt {
    let mut out = Decrypt::default();
    for_each_stmt_list(program, &mut |stmts| {
        let mut i = 0;
        while i < stmts.len() {
            if is_commercial_decrypt(&stmts[i], table_name) {
                let decl = stmts.remove(i);
                let Stmt::Func(func) = &decl else {
                    unreachable!("matched shape is a function declaration");
                };
                debug!(name = %func.name, "extracted decrypt function");
                out.names.push(func.name.name.clone());
                out.decls.push(decl);
            } else {
                i += 1;
            }
        }
    });
    out
}

/// The packer six-statement shape, as a function declaration or a
/// `var d = function (...) {...}` declarator.
pub fn extract_packer(program: &mut Program, array_name: &str) -> Decrypt {
    let mut out = Decrypt::default();
    for_each_stmt_list(program, &mut |stmts| {
        let mut i = 0;
        while i < stmts.len() {
            match packer_decrypt_name(&stmts[i], array_name) {
                Some(name) => {
                    debug!(name, "extracted packer decrypt function");
                    out.names.push(name.to_string());
                    out.decls.push(stmts.remove(i));
                }
                None => i += 1,
            }
        }
    });
    out
}

fn is_commercial_decrypt(stmt: &Stmt, table_name: &str) -> bool {
    let Stmt::Func(decl) = stmt else {
        return false;
    };
    let [first, second, third] = decl.function.body.stmts.as_slice() else {
        return false;
    };
    let Some((_, Some(init))) = shape::single_decl(first) else {
        return false;
    };
    if shape::call_to(init, table_name).is_none() {
        return false;
    }
    shape::assignment_to(second, &decl.name.name).is_some()
        && shape::return_call_name(third) == Some(decl.name.name.as_str())
}

fn packer_decrypt_name<'a>(stmt: &'a Stmt, array_name: &str) -> Option<&'a str> {
    match stmt {
        Stmt::Func(decl) => {
            packer_body_matches(&decl.function.body.stmts, array_name)
                .then_some(decl.name.name.as_str())
        }
        _ => {
            let (name, Some(Expr::Function(func))) = shape::single_decl(stmt)? else {
                return None;
            };
            packer_body_matches(&func.function.body.stmts, array_name)
                .then_some(name.name.as_str())
        }
    }
}

fn packer_body_matches(stmts: &[Stmt], array_name: &str) -> bool {
    let [s0, s1, s2, s3, s4, s5] = stmts else {
        return false;
    };
    if !matches!(s0, Stmt::Expr(_))
        || !matches!(s2, Stmt::If(_))
        || !matches!(s3, Stmt::VarDecl(_))
        || !matches!(s4, Stmt::If(_))
        || !matches!(s5, Stmt::Return(_))
    {
        return false;
    }
    // The second statement indexes the string array.
    let Stmt::VarDecl(decl) = s1 else {
        return false;
    };
    let Some(Expr::Member(member)) = decl.decls.first().and_then(|d| d.init.as_ref()) else {
        return false;
    };
    matches!(&member.property, MemberProp::Computed(_))
        && member.object.ident_name() == Some(array_name)
}

/// Follow alias chains to a known decrypt name: one-line forwarding
/// functions (`function p(a, b) { return d(a, b); }`) and variable
/// aliases (`var p = d;`). Runs to a fixed point so chains of any depth
/// resolve; every hop is removed and returned for sandbox loading.
pub fn extract_proxies(program: &mut Program, names: &mut Vec<String>) -> Vec<Stmt> {
    let mut decls = Vec::new();
    loop {
        let mut grew = false;
        for_each_stmt_list(program, &mut |stmts| {
            let mut i = 0;
            while i < stmts.len() {
                match proxy_target(&stmts[i]) {
                    Some((alias, target)) if names.iter().any(|n| n == target) => {
                        let alias = alias.to_string();
                        debug!(alias = %alias, target, "extracted decrypt proxy");
                        decls.push(stmts.remove(i));
                        names.push(alias);
                        grew = true;
                    }
                    _ => i += 1,
                }
            }
        });
        if !grew {
            return decls;
        }
    }
}

/// `(alias, forwarded-to)` for the two proxy shapes.
fn proxy_target(stmt: &Stmt) -> Option<(&str, &str)> {
    match stmt {
        Stmt::Func(decl) => {
            let target = shape::single_return_call(&decl.function)?;
            Some((&decl.name.name, target))
        }
        _ => {
            let (name, Some(Expr::Ident(target))) = shape::single_decl(stmt)? else {
                return None;
            };
            Some((&name.name, &target.name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::parse;

    #[test]
    fn commercial_shape_is_extracted_by_table_name() {
        let mut program = parse(
            "function _0x1c(i, k) {\n\
                 var t = _0x59e3();\n\
                 _0x1c = function (a, b) { return t[a]; };\n\
                 return _0x1c(i, k);\n\
             }\n\
             other();",
        )
        .unwrap();
        let decrypt = extract_callers(&mut program, "_0x59e3");
        assert_eq!(decrypt.names, vec!["_0x1c"]);
        assert_eq!(program.body.len(), 1);
    }

    #[test]
    fn proxy_chains_resolve_transitively() {
        let mut program = parse(
            "function hop(a, b) { return _0x1c(a, b); }\n\
             function hop2(a, b) { return hop(a, b); }\n\
             var alias = hop2;\n\
             keep();",
        )
        .unwrap();
        let mut names = vec!["_0x1c".to_string()];
        let decls = extract_proxies(&mut program, &mut names);
        assert_eq!(decls.len(), 3);
        assert_eq!(names, vec!["_0x1c", "hop", "hop2", "alias"]);
        assert_eq!(program.body.len(), 1);
    }

    #[test]
    fn unrelated_forwarders_stay() {
        let mut program = parse("function log(m) { return print(m); }").unwrap();
        let mut names = vec!["_0x1c".to_string()];
        assert!(extract_proxies(&mut program, &mut names).is_empty());
        assert_eq!(program.body.len(), 1);
    }
}
