//! Statement-list traversal for passes that match shapes across sibling
//! statements (a declaration here, its uses two statements later). The
//! expression-level [`Transform`] driver hides list context, so those
//! passes get handed every statement list in the tree instead.
//!
//! [`Transform`]: djs_core::ast::Transform

use djs_core::ast::{
    transform_program, ArrowBody, Expr, ExprRewrite, ForInit, Program, Stmt, Transform,
};

pub(crate) fn for_each_stmt_list<F>(program: &mut Program, f: &mut F)
where
    F: FnMut(&mut Vec<Stmt>),
{
    stmt_list(&mut program.body, f);
}

/// Number of expression-position occurrences of the identifier `name`.
/// Declaration slots (declarator names, parameters) are not counted.
pub(crate) fn count_ident(program: &mut Program, name: &str) -> usize {
    struct Counter<'a> {
        name: &'a str,
        count: usize,
    }
    impl Transform for Counter<'_> {
        fn enter_expr(&mut self, expr: &mut Expr) -> ExprRewrite {
            if expr.ident_name() == Some(self.name) {
                self.count += 1;
            }
            ExprRewrite::Keep
        }
    }
    let mut counter = Counter { name, count: 0 };
    transform_program(program, &mut counter);
    counter.count
}

fn stmt_list<F>(stmts: &mut Vec<Stmt>, f: &mut F)
where
    F: FnMut(&mut Vec<Stmt>),
{
    f(stmts);
    for stmt in stmts.iter_mut() {
        in_stmt(stmt, f);
    }
}

fn in_stmt<F>(stmt: &mut Stmt, f: &mut F)
where
    F: FnMut(&mut Vec<Stmt>),
{
    match stmt {
        Stmt::Expr(s) => in_expr(&mut s.expr, f),
        Stmt::VarDecl(decl) => {
            for declarator in &mut decl.decls {
                if let Some(init) = &mut declarator.init {
                    in_expr(init, f);
                }
            }
        }
        Stmt::Func(decl) => stmt_list(&mut decl.function.body.stmts, f),
        Stmt::Return(s) => {
            if let Some(arg) = &mut s.arg {
                in_expr(arg, f);
            }
        }
        Stmt::If(s) => {
            in_expr(&mut s.test, f);
            in_stmt(&mut s.consequent, f);
            if let Some(alternate) = &mut s.alternate {
                in_stmt(alternate, f);
            }
        }
        Stmt::Block(block) => stmt_list(&mut block.stmts, f),
        Stmt::While(s) => {
            in_expr(&mut s.test, f);
            in_stmt(&mut s.body, f);
        }
        Stmt::DoWhile(s) => {
            in_stmt(&mut s.body, f);
            in_expr(&mut s.test, f);
        }
        Stmt::For(s) => {
            match &mut s.init {
                Some(ForInit::VarDecl(decl)) => {
                    for declarator in &mut decl.decls {
                        if let Some(init) = &mut declarator.init {
                            in_expr(init, f);
                        }
                    }
                }
                Some(ForInit::Expr(expr)) => in_expr(expr, f),
                None => {}
            }
            if let Some(test) = &mut s.test {
                in_expr(test, f);
            }
            if let Some(update) = &mut s.update {
                in_expr(update, f);
            }
            in_stmt(&mut s.body, f);
        }
        Stmt::Switch(s) => {
            in_expr(&mut s.discriminant, f);
            for case in &mut s.cases {
                if let Some(test) = &mut case.test {
                    in_expr(test, f);
                }
                stmt_list(&mut case.body, f);
            }
        }
        Stmt::Try(s) => {
            stmt_list(&mut s.block.stmts, f);
            if let Some(handler) = &mut s.handler {
                stmt_list(&mut handler.body.stmts, f);
            }
            if let Some(finalizer) = &mut s.finalizer {
                stmt_list(&mut finalizer.stmts, f);
            }
        }
        Stmt::Throw(s) => in_expr(&mut s.arg, f),
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) | Stmt::Debugger(_) => {}
    }
}

fn in_expr<F>(expr: &mut Expr, f: &mut F)
where
    F: FnMut(&mut Vec<Stmt>),
{
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
                in_expr(e, f);
            }
        }
        Expr::Array(array) => {
            for element in array.elements.iter_mut().flatten() {
                in_expr(element, f);
            }
        }
        Expr::Object(object) => {
            for prop in &mut object.props {
                in_expr(&mut prop.value, f);
            }
        }
        Expr::Function(func) => stmt_list(&mut func.function.body.stmts, f),
        Expr::Arrow(arrow) => match &mut arrow.body {
            ArrowBody::Expr(e) => in_expr(e, f),
            ArrowBody::Block(block) => stmt_list(&mut block.stmts, f),
        },
        Expr::Unary(e) => in_expr(&mut e.arg, f),
        Expr::Update(e) => in_expr(&mut e.arg, f),
        Expr::Binary(e) => {
            in_expr(&mut e.left, f);
            in_expr(&mut e.right, f);
        }
        Expr::Logical(e) => {
            in_expr(&mut e.left, f);
            in_expr(&mut e.right, f);
        }
        Expr::Assign(e) => {
            in_expr(&mut e.target, f);
            in_expr(&mut e.value, f);
        }
        Expr::Cond(e) => {
            in_expr(&mut e.test, f);
            in_expr(&mut e.consequent, f);
            in_expr(&mut e.alternate, f);
        }
        Expr::Call(e) => {
            in_expr(&mut e.callee, f);
            for arg in &mut e.args {
                in_expr(arg, f);
            }
        }
        Expr::New(e) => {
            in_expr(&mut e.callee, f);
            for arg in &mut e.args {
                in_expr(arg, f);
            }
        }
        Expr::Member(e) => {
            in_expr(&mut e.object, f);
            if let djs_core::ast::MemberProp::Computed(prop) = &mut e.property {
                in_expr(prop, f);
            }
        }
        Expr::Seq(e) => {
            for sub in &mut e.exprs {
                in_expr(sub, f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_core::ast::{Block, FunctionExpr, Function, Program};
    use djs_core::span::Span;

    #[test]
    fn visits_lists_inside_function_expressions() {
        let inner = Stmt::expr_stmt(Expr::ident("inner"));
        let func = Expr::Function(FunctionExpr {
            name: None,
            function: Function {
                params: vec![],
                body: Block::new(vec![inner]),
                span: Span::DUMMY,
            },
        });
        let mut program = Program::new(vec![Stmt::expr_stmt(func)]);
        let mut seen = 0;
        for_each_stmt_list(&mut program, &mut |_| seen += 1);
        assert_eq!(seen, 2); // program body + function body
    }
}
