//! Mutating depth-first traversal.
//!
//! A pass implements [`Transform`] and is driven by [`transform_program`].
//! Visiting a statement may keep it, replace it with any number of
//! statements (which also covers inserting siblings before a kept node),
//! or remove it; the driver splices the result into the enclosing list so
//! the traversal always walks the tree it just produced.
//!
//! Re-visit semantics: replacements returned from `enter_*` are visited
//! again from the top (the pass sees its own output), replacements from
//! `exit_*` are spliced and stepped over. A pass that needs its exit
//! rewrites re-examined runs under [`transform_until_stable`].

use super::expr::*;
use super::stmt::*;
use super::Program;

pub enum StmtRewrite {
    Keep,
    /// Replace the statement with zero or more statements. In a slot that
    /// holds exactly one statement (a loop body, an `if` branch) multiple
    /// replacements are wrapped in a block.
    Replace(Vec<Stmt>),
    Remove,
}

pub enum ExprRewrite {
    Keep,
    Replace(Expr),
}

#[allow(unused_variables)]
pub trait Transform {
    fn enter_stmt(&mut self, stmt: &mut Stmt) -> StmtRewrite {
        StmtRewrite::Keep
    }
    fn exit_stmt(&mut self, stmt: &mut Stmt) -> StmtRewrite {
        StmtRewrite::Keep
    }
    fn enter_expr(&mut self, expr: &mut Expr) -> ExprRewrite {
        ExprRewrite::Keep
    }
    fn exit_expr(&mut self, expr: &mut Expr) -> ExprRewrite {
        ExprRewrite::Keep
    }
}

/// Run one traversal; returns true if anything was rewritten.
pub fn transform_program(program: &mut Program, t: &mut impl Transform) -> bool {
    let mut walker = Walker {
        t,
        changed: false,
    };
    walker.stmt_list(&mut program.body);
    walker.changed
}

/// Re-run a pass until it stops changing the tree (or the iteration cap is
/// reached; the cap only guards against a non-converging pass).
pub fn transform_until_stable(program: &mut Program, t: &mut impl Transform, max_iters: usize) {
    for _ in 0..max_iters {
        if !transform_program(program, t) {
            break;
        }
    }
}

struct Walker<'a, T: Transform> {
    t: &'a mut T,
    changed: bool,
}

enum StmtFlow {
    Keep,
    Replace(Vec<Stmt>),
    Remove,
}

impl<'a, T: Transform> Walker<'a, T> {
    fn stmt_list(&mut self, stmts: &mut Vec<Stmt>) {
        let mut i = 0;
        while i < stmts.len() {
            match self.stmt(&mut stmts[i]) {
                StmtFlow::Keep => i += 1,
                StmtFlow::Remove => {
                    stmts.remove(i);
                }
                StmtFlow::Replace(replacement) => {
                    // Splice and continue at the same index so the
                    // replacement statements are themselves visited.
                    stmts.splice(i..=i, replacement);
                }
            }
        }
    }

    fn stmt(&mut self, stmt: &mut Stmt) -> StmtFlow {
        loop {
            match self.t.enter_stmt(stmt) {
                StmtRewrite::Keep => break,
                StmtRewrite::Remove => {
                    self.changed = true;
                    return StmtFlow::Remove;
                }
                StmtRewrite::Replace(mut replacement) => {
                    self.changed = true;
                    if replacement.len() == 1 {
                        *stmt = replacement.pop().unwrap();
                        continue;
                    }
                    return StmtFlow::Replace(replacement);
                }
            }
        }

        self.stmt_children(stmt);

        match self.t.exit_stmt(stmt) {
            StmtRewrite::Keep => StmtFlow::Keep,
            StmtRewrite::Remove => {
                self.changed = true;
                StmtFlow::Remove
            }
            StmtRewrite::Replace(mut replacement) => {
                self.changed = true;
                if replacement.len() == 1 {
                    *stmt = replacement.pop().unwrap();
                    StmtFlow::Keep
                } else {
                    StmtFlow::Replace(replacement)
                }
            }
        }
    }

    fn stmt_children(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Expr(s) => self.expr(&mut s.expr),
            Stmt::VarDecl(decl) => self.var_decl(decl),
            Stmt::Func(decl) => self.stmt_list(&mut decl.function.body.stmts),
            Stmt::Return(s) => {
                if let Some(arg) = &mut s.arg {
                    self.expr(arg);
                }
            }
            Stmt::If(s) => {
                self.expr(&mut s.test);
                self.stmt_slot(&mut s.consequent);
                let remove_alt = match &mut s.alternate {
                    Some(alt) => self.opt_stmt_slot(alt),
                    None => false,
                };
                if remove_alt {
                    s.alternate = None;
                }
            }
            Stmt::Block(block) => self.stmt_list(&mut block.stmts),
            Stmt::While(s) => {
                self.expr(&mut s.test);
                self.stmt_slot(&mut s.body);
            }
            Stmt::DoWhile(s) => {
                self.stmt_slot(&mut s.body);
                self.expr(&mut s.test);
            }
            Stmt::For(s) => {
                match &mut s.init {
                    Some(ForInit::VarDecl(decl)) => self.var_decl(decl),
                    Some(ForInit::Expr(expr)) => self.expr(expr),
                    None => {}
                }
                if let Some(test) = &mut s.test {
                    self.expr(test);
                }
                if let Some(update) = &mut s.update {
                    self.expr(update);
                }
                self.stmt_slot(&mut s.body);
            }
            Stmt::Switch(s) => {
                self.expr(&mut s.discriminant);
                for case in &mut s.cases {
                    if let Some(test) = &mut case.test {
                        self.expr(test);
                    }
                    self.stmt_list(&mut case.body);
                }
            }
            Stmt::Try(s) => {
                self.stmt_list(&mut s.block.stmts);
                if let Some(handler) = &mut s.handler {
                    self.stmt_list(&mut handler.body.stmts);
                }
                if let Some(finalizer) = &mut s.finalizer {
                    self.stmt_list(&mut finalizer.stmts);
                }
            }
            Stmt::Throw(s) => self.expr(&mut s.arg),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) | Stmt::Debugger(_) => {}
        }
    }

    fn var_decl(&mut self, decl: &mut VarDecl) {
        for declarator in &mut decl.decls {
            if let Some(init) = &mut declarator.init {
                self.expr(init);
            }
        }
    }

    /// Visit a slot that must hold exactly one statement.
    fn stmt_slot(&mut self, slot: &mut Box<Stmt>) {
        loop {
            match self.stmt(slot) {
                StmtFlow::Keep => return,
                StmtFlow::Remove => {
                    **slot = Stmt::Empty(EmptyStmt {
                        span: crate::span::Span::DUMMY,
                    });
                    return;
                }
                StmtFlow::Replace(replacement) => {
                    **slot = Stmt::Block(Block::new(replacement));
                    // fall through: visit the freshly built block
                }
            }
        }
    }

    /// Like `stmt_slot` but removal is legal (an `if` alternate); returns
    /// true when the slot should be dropped by the caller.
    fn opt_stmt_slot(&mut self, slot: &mut Box<Stmt>) -> bool {
        loop {
            match self.stmt(slot) {
                StmtFlow::Keep => return false,
                StmtFlow::Remove => return true,
                StmtFlow::Replace(replacement) => {
                    **slot = Stmt::Block(Block::new(replacement));
                }
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        loop {
            match self.t.enter_expr(expr) {
                ExprRewrite::Keep => break,
                ExprRewrite::Replace(replacement) => {
                    self.changed = true;
                    *expr = replacement;
                }
            }
        }

        self.expr_children(expr);

        if let ExprRewrite::Replace(replacement) = self.t.exit_expr(expr) {
            self.changed = true;
            *expr = replacement;
        }
    }

    fn expr_children(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Str(_)
            | Expr::Num(_)
            | Expr::Bool(_)
            | Expr::Null(_)
            | Expr::Regex(_)
            | Expr::Ident(_)
            | Expr::This(_) => {}
            Expr::Template(tpl) => {
                for e in &mut tpl.exprs {
                    self.expr(e);
                }
            }
            Expr::Array(array) => {
                for element in array.elements.iter_mut().flatten() {
                    self.expr(element);
                }
            }
            Expr::Object(object) => {
                for prop in &mut object.props {
                    self.expr(&mut prop.value);
                }
            }
            Expr::Function(func) => self.stmt_list(&mut func.function.body.stmts),
            Expr::Arrow(arrow) => match &mut arrow.body {
                ArrowBody::Expr(e) => self.expr(e),
                ArrowBody::Block(block) => self.stmt_list(&mut block.stmts),
            },
            Expr::Unary(e) => self.expr(&mut e.arg),
            Expr::Update(e) => self.expr(&mut e.arg),
            Expr::Binary(e) => {
                self.expr(&mut e.left);
                self.expr(&mut e.right);
            }
            Expr::Logical(e) => {
                self.expr(&mut e.left);
                self.expr(&mut e.right);
            }
            Expr::Assign(e) => {
                self.expr(&mut e.target);
                self.expr(&mut e.value);
            }
            Expr::Cond(e) => {
                self.expr(&mut e.test);
                self.expr(&mut e.consequent);
                self.expr(&mut e.alternate);
            }
            Expr::Call(e) => {
                self.expr(&mut e.callee);
                for arg in &mut e.args {
                    self.expr(arg);
                }
            }
            Expr::New(e) => {
                self.expr(&mut e.callee);
                for arg in &mut e.args {
                    self.expr(arg);
                }
            }
            Expr::Member(e) => {
                self.expr(&mut e.object);
                if let MemberProp::Computed(prop) = &mut e.property {
                    self.expr(prop);
                }
            }
            Expr::Seq(e) => {
                for sub in &mut e.exprs {
                    self.expr(sub);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DropEmpty;
    impl Transform for DropEmpty {
        fn enter_stmt(&mut self, stmt: &mut Stmt) -> StmtRewrite {
            match stmt {
                Stmt::Empty(_) => StmtRewrite::Remove,
                _ => StmtRewrite::Keep,
            }
        }
    }

    struct SplitSeqStmts;
    impl Transform for SplitSeqStmts {
        fn enter_stmt(&mut self, stmt: &mut Stmt) -> StmtRewrite {
            if let Stmt::Expr(expr_stmt) = stmt {
                if let Expr::Seq(seq) = &expr_stmt.expr {
                    return StmtRewrite::Replace(
                        seq.exprs.iter().cloned().map(Stmt::expr_stmt).collect(),
                    );
                }
            }
            StmtRewrite::Keep
        }
    }

    fn seq_stmt(names: &[&str]) -> Stmt {
        Stmt::expr_stmt(Expr::Seq(SeqExpr {
            exprs: names.iter().map(|n| Expr::ident(*n)).collect(),
            span: crate::span::Span::DUMMY,
        }))
    }

    #[test]
    fn removal_splices_the_list() {
        let mut program = Program::new(vec![
            Stmt::Empty(EmptyStmt {
                span: crate::span::Span::DUMMY,
            }),
            Stmt::expr_stmt(Expr::ident("a")),
            Stmt::Empty(EmptyStmt {
                span: crate::span::Span::DUMMY,
            }),
        ]);
        assert!(transform_program(&mut program, &mut DropEmpty));
        assert_eq!(program.body.len(), 1);
        assert!(!transform_program(&mut program, &mut DropEmpty));
    }

    #[test]
    fn replacement_statements_are_revisited() {
        // A sequence of sequences flattens in a single traversal because
        // enter replacements are spliced and walked again.
        let mut program = Program::new(vec![Stmt::expr_stmt(Expr::Seq(SeqExpr {
            exprs: vec![
                Expr::Seq(SeqExpr {
                    exprs: vec![Expr::ident("a"), Expr::ident("b")],
                    span: crate::span::Span::DUMMY,
                }),
                Expr::ident("c"),
            ],
            span: crate::span::Span::DUMMY,
        }))]);
        transform_program(&mut program, &mut SplitSeqStmts);
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn multi_replacement_in_single_slot_wraps_in_block() {
        let mut program = Program::new(vec![Stmt::While(WhileStmt {
            test: Expr::bool(true),
            body: Box::new(seq_stmt(&["a", "b"])),
            span: crate::span::Span::DUMMY,
        })]);
        transform_program(&mut program, &mut SplitSeqStmts);
        match &program.body[0] {
            Stmt::While(while_stmt) => match while_stmt.body.as_ref() {
                Stmt::Block(block) => assert_eq!(block.stmts.len(), 2),
                other => panic!("expected block body, got {other:?}"),
            },
            other => panic!("expected while, got {other:?}"),
        }
    }
}
