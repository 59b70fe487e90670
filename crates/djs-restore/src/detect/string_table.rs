//! The string-table function.
//!
//! Both the commercial obfuscator and the v7 packer emit the same
//! memoizing accessor:
//!
//! ```text
//! function t() {
//!     var a = ['...', '...'];
//!     t = function () { return a; };
//!     return t();
//! }
//! ```
//!
//! The v7 variant may reference the marker variable inside the array, so
//! the first statement is only required to be a declaration.

use djs_core::ast::{Expr, Program, Stmt};
use djs_core::tracing::debug;

use super::shape;
use crate::walk::for_each_stmt_list;

pub struct StringTable {
    pub name: String,
    pub decl: Stmt,
}

/// Find the table accessor, remove it from the tree, and hand back the
/// extracted declaration for sandbox execution.
pub fn extract(program: &mut Program) -> Option<StringTable> {
    let mut found: Option<StringTable> = None;
    for_each_stmt_list(program, &mut |stmts| {
        if found.is_some() {
            return;
        }
        if let Some(at) = stmts.iter().position(is_table_accessor) {
            let decl = stmts.remove(at);
            let Stmt::Func(func) = &decl else {
                unreachable!("matched shape is a function declaration");
            };
            debug!(name = %func.name, "extracted string-table accessor");
            found = Some(StringTable {
                name: func.name.name.clone(),
                decl,
            });
        }
    });
    found
}

fn is_table_accessor(stmt: &Stmt) -> bool {
    let Stmt::Func(decl) = stmt else {
        return false;
    };
    if !decl.function.params.is_empty() {
        return false;
    }
    let [first, second, third] = decl.function.body.stmts.as_slice() else {
        return false;
    };
    let Some((_, init)) = shape::single_decl(first) else {
        return false;
    };
    // Strict commercial shape carries the array inline; the packer
    // variant may splice the marker in, so any initializer passes.
    if init.is_none() {
        return false;
    }
    let Some(rewrite) = shape::assignment_to(second, &decl.name.name) else {
        return false;
    };
    if !matches!(rewrite, Expr::Function(_)) {
        return false;
    }
    shape::return_call_name(third) == Some(decl.name.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::parse;

    const TABLE: &str = "\
function _0x59e3() {
    var _0x434c = ['a', 'b', 'c'];
    _0x59e3 = function () { return _0x434c; };
    return _0x59e3();
}
use(_0x59e3);
";

    #[test]
    fn extracts_and_removes_the_accessor() {
        let mut program = parse(TABLE).unwrap();
        let table = extract(&mut program).unwrap();
        assert_eq!(table.name, "_0x59e3");
        assert_eq!(program.body.len(), 1); // only the use() call remains
        assert!(extract(&mut program).is_none());
    }

    #[test]
    fn ordinary_functions_do_not_match() {
        let mut program = parse("function f() { var a = [1]; return a; }").unwrap();
        assert!(extract(&mut program).is_none());
        assert_eq!(program.body.len(), 1);
    }
}
