//! The logical/sequence encoding.
//!
//! Statements are packed into `&&`/`||` chains over sequence expressions:
//!
//! ```text
//! cond === 1 && (a(), b(), flag) && rest;
//! ```
//!
//! The chain is first re-associated to the right so the head is always
//! `test op (seq)`; the head then unpacks into an `if`/`else` whose
//! branches are the continuation and the sequence body. The last element
//! of the sequence is the chain's truthiness sentinel and is dropped.

use djs_core::ast::{
    transform_program, Expr, ExprStmt, LogicalExpr, LogicalOp, Program, Stmt, StmtRewrite,
    Transform,
};
use djs_core::diagnostics::Diagnostic;
use djs_core::tracing::debug;

/// Unpack every encoded statement; returns how many were rewritten.
pub fn restore(program: &mut Program, diagnostics: &mut Vec<Diagnostic>) -> usize {
    let mut unpack = Unpack {
        diagnostics,
        rewritten: 0,
    };
    transform_program(program, &mut unpack);
    unpack.rewritten
}

struct Unpack<'a> {
    diagnostics: &'a mut Vec<Diagnostic>,
    rewritten: usize,
}

impl Transform for Unpack<'_> {
    fn enter_stmt(&mut self, stmt: &mut Stmt) -> StmtRewrite {
        let Stmt::Expr(ExprStmt { expr: Expr::Logical(logical), .. }) = stmt else {
            return StmtRewrite::Keep;
        };
        let op = logical.op;
        if op == LogicalOp::NullishCoalescing {
            return StmtRewrite::Keep;
        }
        rotate(logical);

        // Head must now be `test op (sequence)`.
        let Expr::Logical(head) = logical.left.as_ref() else {
            return StmtRewrite::Keep;
        };
        if head.op != op || !matches!(head.left.as_ref(), Expr::Binary(_)) {
            self.diagnostics.push(
                Diagnostic::warning("logical chain head is not a test over a sequence")
                    .with_code("flatten")
                    .with_span(logical.span),
            );
            return StmtRewrite::Keep;
        }
        let Expr::Seq(seq) = head.right.as_ref() else {
            self.diagnostics.push(
                Diagnostic::warning("logical chain head is not a test over a sequence")
                    .with_code("flatten")
                    .with_span(logical.span),
            );
            return StmtRewrite::Keep;
        };

        let packed: Vec<Stmt> = seq.exprs[..seq.exprs.len().saturating_sub(1)]
            .iter()
            .cloned()
            .map(Stmt::expr_stmt)
            .collect();
        let rest = vec![Stmt::expr_stmt(logical.right.as_ref().clone())];
        let test = head.left.as_ref().clone();
        debug!(op = op.as_str(), "unpacked logical/sequence statement");
        self.rewritten += 1;
        match op {
            LogicalOp::And => {
                StmtRewrite::Replace(vec![Stmt::if_else(test, rest, Some(packed))])
            }
            LogicalOp::Or => {
                StmtRewrite::Replace(vec![Stmt::if_else(test, packed, Some(rest))])
            }
            LogicalOp::NullishCoalescing => unreachable!("filtered above"),
        }
    }
}

/// Re-associate `((X op Y) op Z)` to `X op (Y op Z)` until the head of
/// the chain is the leftmost link.
fn rotate(logical: &mut LogicalExpr) {
    loop {
        let rotate_now = match logical.left.as_ref() {
            Expr::Logical(left) if left.op == logical.op => {
                matches!(left.left.as_ref(), Expr::Logical(inner) if inner.op == logical.op)
            }
            _ => false,
        };
        if !rotate_now {
            return;
        }
        let Expr::Logical(left) = std::mem::replace(&mut *logical.left, Expr::null()) else {
            unreachable!("checked above");
        };
        let old_right = std::mem::replace(&mut *logical.right, Expr::null());
        logical.left = left.left;
        logical.right = Box::new(Expr::Logical(LogicalExpr {
            op: logical.op,
            left: left.right,
            right: Box::new(old_right),
            span: logical.span,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::{parse, print};

    #[test]
    fn and_chain_unpacks_into_if_else() {
        let source = "x === 1 && (a(), b(), f) && done();";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 1);
        assert!(diagnostics.is_empty());
        assert_eq!(
            print(&program).unwrap(),
            "if (x === 1) {\n    done();\n} else {\n    a();\n    b();\n}\n"
        );
    }

    #[test]
    fn or_chain_swaps_the_branches() {
        let source = "x === 1 || (a(), f) || done();";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 1);
        assert_eq!(
            print(&program).unwrap(),
            "if (x === 1) {\n    a();\n} else {\n    done();\n}\n"
        );
    }

    #[test]
    fn unrecognized_chain_is_reported_and_kept() {
        let source = "(a && b) && c;";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 0);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(program.body.len(), 1);
    }
}
