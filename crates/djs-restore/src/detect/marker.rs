//! Packer version markers.
//!
//! jsjiami builds carry their version string in the data they ship: v6
//! embeds `'jsjiami.com.v6'` as element zero of the string array (or as a
//! standalone variable the array references), v7 as a standalone marker
//! variable next to the table function. The marker pins the recipe and
//! the declaration must travel with the table into the sandbox, because
//! the decrypt checksum covers it.

use djs_core::ast::{Expr, Program, Stmt};
use djs_core::tracing::debug;

use crate::walk::for_each_stmt_list;

pub const V6_MARKER: &str = "jsjiami.com.v6";
pub const V7_MARKER: &str = "jsjiami.com.v7";

pub struct V6Table {
    pub array_name: String,
    pub decls: Vec<Stmt>,
}

/// Locate the v6 string array through its marker and remove it. In the
/// standalone-variable form the marker's later reassignments (constant
/// violations the packer uses as tamper bait) are removed as well.
pub fn extract_v6(program: &mut Program) -> Option<V6Table> {
    let mut found: Option<(String, Option<String>, Stmt)> = None;
    for_each_stmt_list(program, &mut |stmts| {
        if found.is_some() {
            return;
        }
        for (i, stmt) in stmts.iter().enumerate() {
            let Stmt::VarDecl(decl) = stmt else { continue };
            // Marker inline as element zero of the array.
            if let Some(declarator) = decl
                .decls
                .iter()
                .find(|d| first_element_str(d.init.as_ref()) == Some(V6_MARKER))
            {
                let array_name = declarator.name.name.clone();
                found = Some((array_name, None, stmts.remove(i)));
                return;
            }
            // Marker as a standalone variable the array references.
            let marker = decl.decls.iter().find_map(|d| {
                (d.init.as_ref()?.as_str_lit()? == V6_MARKER).then(|| d.name.name.clone())
            });
            if let Some(marker) = marker {
                let array = decl.decls.iter().find_map(|d| {
                    (first_element_ident(d.init.as_ref()) == Some(marker.as_str()))
                        .then(|| d.name.name.clone())
                });
                if let Some(array_name) = array {
                    found = Some((array_name, Some(marker), stmts.remove(i)));
                    return;
                }
            }
        }
    });

    let (array_name, marker, decl) = found?;
    if let Some(marker) = &marker {
        remove_writes_to(program, marker);
    }
    debug!(array = %array_name, "extracted v6 marker table");
    Some(V6Table {
        array_name,
        decls: vec![decl],
    })
}

/// Collect v7 marker declarations (`var version = 'jsjiami.com.v7';`).
pub fn extract_v7(program: &mut Program) -> Vec<Stmt> {
    let mut decls = Vec::new();
    for_each_stmt_list(program, &mut |stmts| {
        let mut i = 0;
        while i < stmts.len() {
            let is_marker = match &stmts[i] {
                Stmt::VarDecl(decl) => decl
                    .decls
                    .iter()
                    .any(|d| d.init.as_ref().and_then(|e| e.as_str_lit()) == Some(V7_MARKER)),
                _ => false,
            };
            if is_marker {
                debug!("extracted v7 marker declaration");
                decls.push(stmts.remove(i));
            } else {
                i += 1;
            }
        }
    });
    decls
}

fn first_element_str(init: Option<&Expr>) -> Option<&str> {
    match init? {
        Expr::Array(array) => array.elements.first()?.as_ref()?.as_str_lit(),
        _ => None,
    }
}

fn first_element_ident(init: Option<&Expr>) -> Option<&str> {
    match init? {
        Expr::Array(array) => array.elements.first()?.as_ref()?.ident_name(),
        _ => None,
    }
}

/// Drop every statement that assigns to or updates `name`.
fn remove_writes_to(program: &mut Program, name: &str) {
    for_each_stmt_list(program, &mut |stmts| {
        stmts.retain(|stmt| match stmt.as_expr() {
            Some(Expr::Assign(assign)) => assign.target.ident_name() != Some(name),
            Some(Expr::Update(update)) => update.arg.ident_name() != Some(name),
            _ => true,
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::parse;

    #[test]
    fn inline_marker_names_the_array() {
        let mut program =
            parse("var _0xb1d0 = ['jsjiami.com.v6', 'aGk=', 'd28='];\nrest();").unwrap();
        let table = extract_v6(&mut program).unwrap();
        assert_eq!(table.array_name, "_0xb1d0");
        assert_eq!(program.body.len(), 1);
    }

    #[test]
    fn standalone_marker_drops_tamper_writes() {
        let mut program = parse(
            "var version = 'jsjiami.com.v6', _0xb1d0 = [version, 'aGk='];\n\
             rest();\n\
             version = 'tampered';",
        )
        .unwrap();
        let table = extract_v6(&mut program).unwrap();
        assert_eq!(table.array_name, "_0xb1d0");
        // Both the declaration and the tamper write are gone.
        assert_eq!(program.body.len(), 1);
    }

    #[test]
    fn v7_marker_is_collected() {
        let mut program = parse("var v = 'jsjiami.com.v7';\nrest();").unwrap();
        assert_eq!(extract_v7(&mut program).len(), 1);
        assert_eq!(program.body.len(), 1);
        assert!(extract_v7(&mut program).is_empty());
    }
}
