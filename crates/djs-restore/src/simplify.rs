//! The generic cleanup pass: canonical literal rendering, constant
//! folding, dead-branch pruning, sequence flattening. Every rule is
//! idempotent; [`simplify`] runs the set to a fixed point.

use djs_core::ast::{
    Expr, ExprStmt, IfStmt, Program, ReturnStmt, Stmt, StmtRewrite, Transform, UnaryOp,
};
use djs_core::ast::{transform_until_stable, ExprRewrite};

use crate::const_eval::{can_evaluate, evaluate, is_meaningful, value_to_expr};

const MAX_PASSES: usize = 32;

/// Run the cleanup rules to a fixed point.
pub fn simplify(program: &mut Program) {
    transform_until_stable(program, &mut Simplify, MAX_PASSES);
}

/// Desugar statement-position `&&`/`||`/`?:` into `if` statements.
/// Separate from [`simplify`] because only some recipes want it.
pub fn statementize(program: &mut Program) {
    transform_until_stable(program, &mut Statementize, MAX_PASSES);
}

struct Simplify;

impl Transform for Simplify {
    fn enter_stmt(&mut self, stmt: &mut Stmt) -> StmtRewrite {
        match stmt {
            Stmt::Empty(_) => return StmtRewrite::Remove,
            // Bare bodies get block-wrapped up front so later rules only
            // ever deal with statement lists.
            Stmt::If(s) => {
                block_wrap(&mut s.consequent);
                if let Some(alternate) = &mut s.alternate {
                    if !matches!(alternate.as_ref(), Stmt::If(_)) {
                        block_wrap(alternate);
                    }
                }
            }
            Stmt::While(s) => block_wrap(&mut s.body),
            Stmt::DoWhile(s) => block_wrap(&mut s.body),
            Stmt::For(s) => block_wrap(&mut s.body),
            // Comma chains in discard position become siblings; the
            // replacement is re-visited so nested chains unroll fully.
            Stmt::Expr(expr_stmt) => {
                if let Expr::Seq(seq) = &expr_stmt.expr {
                    return StmtRewrite::Replace(
                        seq.exprs.iter().cloned().map(Stmt::expr_stmt).collect(),
                    );
                }
            }
            Stmt::Return(ret) => {
                if let Some(Expr::Seq(seq)) = &ret.arg {
                    let mut out: Vec<Stmt> = seq
                        .exprs
                        .iter()
                        .take(seq.exprs.len() - 1)
                        .cloned()
                        .map(Stmt::expr_stmt)
                        .collect();
                    out.push(Stmt::Return(ReturnStmt {
                        arg: seq.exprs.last().cloned(),
                        span: ret.span,
                    }));
                    return StmtRewrite::Replace(out);
                }
            }
            _ => {}
        }
        StmtRewrite::Keep
    }

    fn exit_stmt(&mut self, stmt: &mut Stmt) -> StmtRewrite {
        match stmt {
            Stmt::If(s) => exit_if(s),
            // A statement with no call, assignment, or update does
            // nothing; string literals stay because they may be
            // directives.
            Stmt::Expr(expr_stmt) => {
                if !is_meaningful(&expr_stmt.expr) && !matches!(expr_stmt.expr, Expr::Str(_)) {
                    StmtRewrite::Remove
                } else {
                    StmtRewrite::Keep
                }
            }
            _ => StmtRewrite::Keep,
        }
    }

    fn exit_expr(&mut self, expr: &mut Expr) -> ExprRewrite {
        match expr {
            // Literal renderings are canonicalized in place: the raw
            // hint is what the printer emits.
            Expr::Str(s) => {
                let canonical = canonical_str_raw(&s.value);
                if s.raw.as_deref() != Some(canonical.as_str()) {
                    s.raw = Some(canonical);
                }
                ExprRewrite::Keep
            }
            Expr::Num(n) => {
                n.raw = None;
                ExprRewrite::Keep
            }
            Expr::Template(tpl) => {
                for quasi in &mut tpl.quasis {
                    let canonical = template_raw(&quasi.cooked);
                    if quasi.raw != canonical {
                        quasi.raw = canonical;
                    }
                }
                // A template with no live substitutions is a string.
                fold(expr)
            }
            // Constant test picks the branch even when the branches
            // themselves are not constant.
            Expr::Cond(cond) if can_evaluate(&cond.test) => {
                let test = evaluate(&cond.test);
                let taken = match test {
                    Some(value) if value.is_truthy() => (*cond.consequent).clone(),
                    Some(_) => (*cond.alternate).clone(),
                    None => return ExprRewrite::Keep,
                };
                ExprRewrite::Replace(taken)
            }
            Expr::Unary(_) | Expr::Binary(_) | Expr::Logical(_) | Expr::Cond(_) => {
                fold(expr)
            }
            _ => ExprRewrite::Keep,
        }
    }
}

/// Fold a constant operator subtree back to a literal. The equality
/// check stops `-1` (already a unary minus over a literal) from being
/// rewritten to itself forever.
fn fold(expr: &Expr) -> ExprRewrite {
    if !can_evaluate(expr) {
        return ExprRewrite::Keep;
    }
    let Some(value) = evaluate(expr) else {
        return ExprRewrite::Keep;
    };
    match value_to_expr(&value) {
        Some(folded) if folded != *expr => ExprRewrite::Replace(folded),
        _ => ExprRewrite::Keep,
    }
}

fn exit_if(s: &mut IfStmt) -> StmtRewrite {
    // Constant test: keep only the taken branch.
    if can_evaluate(&s.test) {
        if let Some(test) = evaluate(&s.test) {
            if test.is_truthy() {
                let taken = std::mem::replace(&mut *s.consequent, Stmt::block(vec![]));
                return StmtRewrite::Replace(vec![taken]);
            }
            return match s.alternate.take() {
                Some(alternate) => StmtRewrite::Replace(vec![*alternate]),
                None => StmtRewrite::Remove,
            };
        }
    }

    let cons_empty = is_empty_block(&s.consequent);
    let alt_empty = s.alternate.as_deref().map(is_empty_block).unwrap_or(true);
    match (cons_empty, alt_empty) {
        (true, true) => {
            // Both branches gone; only the test may still matter.
            if is_meaningful(&s.test) {
                StmtRewrite::Replace(vec![Stmt::expr_stmt(s.test.clone())])
            } else {
                StmtRewrite::Remove
            }
        }
        (true, false) => {
            let alternate = s.alternate.take().expect("non-empty alternate");
            StmtRewrite::Replace(vec![Stmt::If(IfStmt {
                test: Expr::unary(UnaryOp::Not, s.test.clone()),
                consequent: alternate,
                alternate: None,
                span: s.span,
            })])
        }
        (false, true) => {
            if s.alternate.take().is_some() {
                StmtRewrite::Replace(vec![Stmt::If(IfStmt {
                    test: s.test.clone(),
                    consequent: s.consequent.clone(),
                    alternate: None,
                    span: s.span,
                })])
            } else {
                StmtRewrite::Keep
            }
        }
        (false, false) => StmtRewrite::Keep,
    }
}

fn block_wrap(slot: &mut Box<Stmt>) {
    if !matches!(slot.as_ref(), Stmt::Block(_)) {
        let inner = std::mem::replace(&mut **slot, Stmt::block(vec![]));
        **slot = Stmt::block(vec![inner]);
    }
}

fn is_empty_block(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Block(block) => block.stmts.iter().all(|s| matches!(s, Stmt::Empty(_))),
        Stmt::Empty(_) => true,
        _ => false,
    }
}

/// Canonical quoting: prefer `"`, switch to `'` only when it needs fewer
/// escapes, and always escape the chosen quote, backslashes, and control
/// characters.
fn canonical_str_raw(value: &str) -> String {
    let doubles = value.matches('"').count();
    let singles = value.matches('\'').count();
    let quote = if doubles > singles { '\'' } else { '"' };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Re-derive a template element's raw text from its cooked value so
/// decoded escapes print as plain characters.
fn template_raw(cooked: &str) -> String {
    let mut out = String::with_capacity(cooked.len());
    let mut chars = cooked.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

struct Statementize;

impl Transform for Statementize {
    fn enter_stmt(&mut self, stmt: &mut Stmt) -> StmtRewrite {
        let Stmt::Expr(ExprStmt { expr, .. }) = stmt else {
            return StmtRewrite::Keep;
        };
        match expr {
            Expr::Logical(logical) => {
                let right = Stmt::expr_stmt((*logical.right).clone());
                let test = match logical.op {
                    djs_core::ast::LogicalOp::And => (*logical.left).clone(),
                    djs_core::ast::LogicalOp::Or => {
                        Expr::unary(UnaryOp::Not, (*logical.left).clone())
                    }
                    djs_core::ast::LogicalOp::NullishCoalescing => return StmtRewrite::Keep,
                };
                StmtRewrite::Replace(vec![Stmt::if_else(test, vec![right], None)])
            }
            Expr::Cond(cond) => StmtRewrite::Replace(vec![Stmt::if_else(
                (*cond.test).clone(),
                vec![Stmt::expr_stmt((*cond.consequent).clone())],
                Some(vec![Stmt::expr_stmt((*cond.alternate).clone())]),
            )]),
            _ => StmtRewrite::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::{parse, print};
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> String {
        let mut program = parse(source).unwrap();
        simplify(&mut program);
        print(&program).unwrap()
    }

    #[test]
    fn hex_escapes_requote_canonically() {
        assert_eq!(run("var a = '\\x48\\x65\\x6c\\x6c\\x6f';"), "var a = \"Hello\";\n");
    }

    #[test]
    fn prefers_single_quotes_when_cheaper() {
        assert_eq!(run("var a = 'say \\x22hi\\x22';"), "var a = 'say \"hi\"';\n");
    }

    #[test]
    fn constant_arithmetic_folds() {
        assert_eq!(run("var x = 0x10 + 2 * 3;"), "var x = 22;\n");
        assert_eq!(run("var s = 'a' + 'b' + 'c';"), "var s = \"abc\";\n");
    }

    #[test]
    fn negative_literals_reach_a_fixed_point() {
        // -1 folds to itself; the pass must not loop or mark changes.
        let mut program = parse("var x = -1;").unwrap();
        simplify(&mut program);
        let once = print(&program).unwrap();
        simplify(&mut program);
        assert_eq!(print(&program).unwrap(), once);
    }

    #[test]
    fn constant_if_keeps_the_taken_branch() {
        assert_eq!(run("if (1) { a(); } else { b(); }"), "{\n    a();\n}\n");
        assert_eq!(run("if (0) { a(); }"), "");
    }

    #[test]
    fn empty_if_with_else_inverts() {
        assert_eq!(run("if (x()) {} else { b(); }"), "if (!x()) {\n    b();\n}\n");
    }

    #[test]
    fn if_with_no_side_effects_anywhere_disappears() {
        assert_eq!(run("if (a > 1) {}"), "");
        assert_eq!(run("if (f()) {}"), "f();\n");
    }

    #[test]
    fn sequences_unroll_in_statement_position() {
        assert_eq!(run("a(), b(), c();"), "a();\nb();\nc();\n");
        assert_eq!(
            run("function f() { return a(), b(); }"),
            "function f() {\n    a();\n    return b();\n}\n"
        );
    }

    #[test]
    fn meaningless_statements_are_dropped() {
        assert_eq!(run("x + 1;\nf();"), "f();\n");
        // Directive prologues survive (re-quoted like any string).
        assert_eq!(run("'use strict';\nf();"), "\"use strict\";\nf();\n");
    }

    #[test]
    fn statementize_desugars_guards() {
        let mut program = parse("a && b();\nc || d();").unwrap();
        statementize(&mut program);
        let out = print(&program).unwrap();
        assert_eq!(out, "if (a) {\n    b();\n}\nif (!c) {\n    d();\n}\n");
    }
}
