//! Raising from the restoration subset back into swc and printing.
//!
//! Layout decisions (indentation, parenthesization, semicolons) belong to
//! the swc code generator. The only formatting the subset carries is the
//! raw-text hint on string and number literals: a literal whose hint is
//! intact prints with its original spelling, a literal the passes rebuilt
//! prints canonically.

use djs_core::ast::*;
use djs_core::Result;
use swc_common::{sync::Lrc, SourceMap, DUMMY_SP};
use swc_ecma_ast as js;
use swc_ecma_codegen::text_writer::JsWriter;
use swc_ecma_codegen::Emitter;

/// Print a program with default (non-minified) settings.
pub fn print(program: &Program) -> Result<String> {
    JsPrinter::new().print(program)
}

pub struct JsPrinter {
    minify: bool,
}

impl JsPrinter {
    pub fn new() -> Self {
        Self { minify: false }
    }

    pub fn minified() -> Self {
        Self { minify: true }
    }

    pub fn print(&self, program: &Program) -> Result<String> {
        let script = js::Script {
            span: DUMMY_SP,
            body: program.body.iter().map(raise_stmt).collect(),
            shebang: None,
        };

        let source_map = Lrc::new(SourceMap::default());
        let mut config = swc_ecma_codegen::Config::default();
        config.minify = self.minify;

        let mut buf = Vec::new();
        {
            let mut emitter = Emitter {
                cfg: config,
                cm: source_map.clone(),
                comments: None,
                wr: JsWriter::new(source_map, "\n", &mut buf, None),
            };
            emitter.emit_script(&script)?;
        }
        Ok(String::from_utf8(buf).expect("codegen emits utf-8"))
    }
}

impl Default for JsPrinter {
    fn default() -> Self {
        Self::new()
    }
}

fn raise_ident(ident: &Ident) -> js::Ident {
    js::Ident::new(ident.name.as_str().into(), DUMMY_SP)
}

fn raise_stmt(stmt: &Stmt) -> js::Stmt {
    match stmt {
        Stmt::Expr(s) => js::Stmt::Expr(js::ExprStmt {
            span: DUMMY_SP,
            expr: Box::new(raise_expr(&s.expr)),
        }),
        Stmt::VarDecl(decl) => js::Stmt::Decl(js::Decl::Var(Box::new(raise_var_decl(decl)))),
        Stmt::Func(decl) => js::Stmt::Decl(js::Decl::Fn(js::FnDecl {
            ident: raise_ident(&decl.name),
            declare: false,
            function: Box::new(raise_function(&decl.function)),
        })),
        Stmt::Return(s) => js::Stmt::Return(js::ReturnStmt {
            span: DUMMY_SP,
            arg: s.arg.as_ref().map(|arg| Box::new(raise_expr(arg))),
        }),
        Stmt::If(s) => js::Stmt::If(js::IfStmt {
            span: DUMMY_SP,
            test: Box::new(raise_expr(&s.test)),
            cons: Box::new(raise_stmt(&s.consequent)),
            alt: s.alternate.as_ref().map(|alt| Box::new(raise_stmt(alt))),
        }),
        Stmt::Block(block) => js::Stmt::Block(raise_block(block)),
        Stmt::While(s) => js::Stmt::While(js::WhileStmt {
            span: DUMMY_SP,
            test: Box::new(raise_expr(&s.test)),
            body: Box::new(raise_stmt(&s.body)),
        }),
        Stmt::DoWhile(s) => js::Stmt::DoWhile(js::DoWhileStmt {
            span: DUMMY_SP,
            test: Box::new(raise_expr(&s.test)),
            body: Box::new(raise_stmt(&s.body)),
        }),
        Stmt::For(s) => js::Stmt::For(js::ForStmt {
            span: DUMMY_SP,
            init: s.init.as_ref().map(|init| match init {
                ForInit::VarDecl(decl) => {
                    js::VarDeclOrExpr::VarDecl(Box::new(raise_var_decl(decl)))
                }
                ForInit::Expr(expr) => js::VarDeclOrExpr::Expr(Box::new(raise_expr(expr))),
            }),
            test: s.test.as_ref().map(|test| Box::new(raise_expr(test))),
            update: s.update.as_ref().map(|update| Box::new(raise_expr(update))),
            body: Box::new(raise_stmt(&s.body)),
        }),
        Stmt::Switch(s) => js::Stmt::Switch(js::SwitchStmt {
            span: DUMMY_SP,
            discriminant: Box::new(raise_expr(&s.discriminant)),
            cases: s
                .cases
                .iter()
                .map(|case| js::SwitchCase {
                    span: DUMMY_SP,
                    test: case.test.as_ref().map(|test| Box::new(raise_expr(test))),
                    cons: case.body.iter().map(raise_stmt).collect(),
                })
                .collect(),
        }),
        Stmt::Break(_) => js::Stmt::Break(js::BreakStmt {
            span: DUMMY_SP,
            label: None,
        }),
        Stmt::Continue(_) => js::Stmt::Continue(js::ContinueStmt {
            span: DUMMY_SP,
            label: None,
        }),
        Stmt::Empty(_) => js::Stmt::Empty(js::EmptyStmt { span: DUMMY_SP }),
        Stmt::Try(s) => js::Stmt::Try(Box::new(js::TryStmt {
            span: DUMMY_SP,
            block: raise_block(&s.block),
            handler: s.handler.as_ref().map(|handler| js::CatchClause {
                span: DUMMY_SP,
                param: handler.param.as_ref().map(|param| {
                    js::Pat::Ident(js::BindingIdent {
                        id: raise_ident(param),
                        type_ann: None,
                    })
                }),
                body: raise_block(&handler.body),
            }),
            finalizer: s.finalizer.as_ref().map(raise_block),
        })),
        Stmt::Throw(s) => js::Stmt::Throw(js::ThrowStmt {
            span: DUMMY_SP,
            arg: Box::new(raise_expr(&s.arg)),
        }),
        Stmt::Debugger(_) => js::Stmt::Debugger(js::DebuggerStmt { span: DUMMY_SP }),
    }
}

fn raise_block(block: &Block) -> js::BlockStmt {
    js::BlockStmt {
        span: DUMMY_SP,
        stmts: block.stmts.iter().map(raise_stmt).collect(),
    }
}

fn raise_var_decl(decl: &VarDecl) -> js::VarDecl {
    js::VarDecl {
        span: DUMMY_SP,
        kind: match decl.kind {
            VarKind::Var => js::VarDeclKind::Var,
            VarKind::Let => js::VarDeclKind::Let,
            VarKind::Const => js::VarDeclKind::Const,
        },
        declare: false,
        decls: decl
            .decls
            .iter()
            .map(|declarator| js::VarDeclarator {
                span: DUMMY_SP,
                name: js::Pat::Ident(js::BindingIdent {
                    id: raise_ident(&declarator.name),
                    type_ann: None,
                }),
                init: declarator.init.as_ref().map(|init| Box::new(raise_expr(init))),
                definite: false,
            })
            .collect(),
    }
}

fn raise_function(function: &Function) -> js::Function {
    js::Function {
        params: function
            .params
            .iter()
            .map(|param| js::Param {
                span: DUMMY_SP,
                decorators: Vec::new(),
                pat: js::Pat::Ident(js::BindingIdent {
                    id: raise_ident(param),
                    type_ann: None,
                }),
            })
            .collect(),
        decorators: Vec::new(),
        span: DUMMY_SP,
        body: Some(raise_block(&function.body)),
        is_generator: false,
        is_async: false,
        type_params: None,
        return_type: None,
    }
}

fn raise_expr(expr: &Expr) -> js::Expr {
    match expr {
        Expr::Str(s) => js::Expr::Lit(js::Lit::Str(raise_str(s))),
        Expr::Num(n) => js::Expr::Lit(js::Lit::Num(raise_num(n))),
        Expr::Bool(b) => js::Expr::Lit(js::Lit::Bool(js::Bool {
            span: DUMMY_SP,
            value: b.value,
        })),
        Expr::Null(_) => js::Expr::Lit(js::Lit::Null(js::Null { span: DUMMY_SP })),
        Expr::Regex(regex) => js::Expr::Lit(js::Lit::Regex(js::Regex {
            span: DUMMY_SP,
            exp: regex.pattern.clone().into(),
            flags: regex.flags.clone().into(),
        })),
        Expr::Template(tpl) => {
            let last = tpl.quasis.len().saturating_sub(1);
            js::Expr::Tpl(js::Tpl {
                span: DUMMY_SP,
                exprs: tpl.exprs.iter().map(|e| Box::new(raise_expr(e))).collect(),
                quasis: tpl
                    .quasis
                    .iter()
                    .enumerate()
                    .map(|(i, quasi)| js::TplElement {
                        span: DUMMY_SP,
                        tail: i == last,
                        cooked: Some(quasi.cooked.clone().into()),
                        raw: quasi.raw.clone().into(),
                    })
                    .collect(),
            })
        }
        Expr::Ident(ident) => js::Expr::Ident(raise_ident(ident)),
        Expr::Array(array) => js::Expr::Array(js::ArrayLit {
            span: DUMMY_SP,
            elems: array
                .elements
                .iter()
                .map(|element| {
                    element.as_ref().map(|e| js::ExprOrSpread {
                        spread: None,
                        expr: Box::new(raise_expr(e)),
                    })
                })
                .collect(),
        }),
        Expr::Object(object) => js::Expr::Object(js::ObjectLit {
            span: DUMMY_SP,
            props: object
                .props
                .iter()
                .map(|prop| {
                    js::PropOrSpread::Prop(Box::new(js::Prop::KeyValue(js::KeyValueProp {
                        key: raise_prop_key(&prop.key),
                        value: Box::new(raise_expr(&prop.value)),
                    })))
                })
                .collect(),
        }),
        Expr::Function(func) => js::Expr::Fn(js::FnExpr {
            ident: func.name.as_ref().map(raise_ident),
            function: Box::new(raise_function(&func.function)),
        }),
        Expr::Arrow(arrow) => js::Expr::Arrow(js::ArrowExpr {
            span: DUMMY_SP,
            params: arrow
                .params
                .iter()
                .map(|param| {
                    js::Pat::Ident(js::BindingIdent {
                        id: raise_ident(param),
                        type_ann: None,
                    })
                })
                .collect(),
            body: Box::new(match &arrow.body {
                ArrowBody::Expr(e) => js::BlockStmtOrExpr::Expr(Box::new(raise_expr(e))),
                ArrowBody::Block(block) => js::BlockStmtOrExpr::BlockStmt(raise_block(block)),
            }),
            is_async: false,
            is_generator: false,
            type_params: None,
            return_type: None,
        }),
        Expr::Unary(e) => js::Expr::Unary(js::UnaryExpr {
            span: DUMMY_SP,
            op: match e.op {
                UnaryOp::Minus => js::UnaryOp::Minus,
                UnaryOp::Plus => js::UnaryOp::Plus,
                UnaryOp::Not => js::UnaryOp::Bang,
                UnaryOp::BitNot => js::UnaryOp::Tilde,
                UnaryOp::TypeOf => js::UnaryOp::TypeOf,
                UnaryOp::Void => js::UnaryOp::Void,
                UnaryOp::Delete => js::UnaryOp::Delete,
            },
            arg: Box::new(raise_expr(&e.arg)),
        }),
        Expr::Update(e) => js::Expr::Update(js::UpdateExpr {
            span: DUMMY_SP,
            op: match e.op {
                UpdateOp::Incr => js::UpdateOp::PlusPlus,
                UpdateOp::Decr => js::UpdateOp::MinusMinus,
            },
            prefix: e.prefix,
            arg: Box::new(raise_expr(&e.arg)),
        }),
        Expr::Binary(e) => js::Expr::Bin(js::BinExpr {
            span: DUMMY_SP,
            op: raise_binary_op(e.op),
            left: Box::new(raise_expr(&e.left)),
            right: Box::new(raise_expr(&e.right)),
        }),
        Expr::Logical(e) => js::Expr::Bin(js::BinExpr {
            span: DUMMY_SP,
            op: match e.op {
                LogicalOp::And => js::BinaryOp::LogicalAnd,
                LogicalOp::Or => js::BinaryOp::LogicalOr,
                LogicalOp::NullishCoalescing => js::BinaryOp::NullishCoalescing,
            },
            left: Box::new(raise_expr(&e.left)),
            right: Box::new(raise_expr(&e.right)),
        }),
        Expr::Assign(e) => js::Expr::Assign(js::AssignExpr {
            span: DUMMY_SP,
            op: raise_assign_op(e.op),
            left: js::PatOrExpr::Expr(Box::new(raise_expr(&e.target))),
            right: Box::new(raise_expr(&e.value)),
        }),
        Expr::Cond(e) => js::Expr::Cond(js::CondExpr {
            span: DUMMY_SP,
            test: Box::new(raise_expr(&e.test)),
            cons: Box::new(raise_expr(&e.consequent)),
            alt: Box::new(raise_expr(&e.alternate)),
        }),
        Expr::Call(e) => js::Expr::Call(js::CallExpr {
            span: DUMMY_SP,
            callee: js::Callee::Expr(Box::new(raise_expr(&e.callee))),
            args: raise_args(&e.args),
            type_args: None,
        }),
        Expr::New(e) => js::Expr::New(js::NewExpr {
            span: DUMMY_SP,
            callee: Box::new(raise_expr(&e.callee)),
            args: Some(raise_args(&e.args)),
            type_args: None,
        }),
        Expr::Member(e) => js::Expr::Member(js::MemberExpr {
            span: DUMMY_SP,
            obj: Box::new(raise_expr(&e.object)),
            prop: match &e.property {
                MemberProp::Ident(ident) => js::MemberProp::Ident(raise_ident(ident)),
                MemberProp::Computed(prop) => js::MemberProp::Computed(js::ComputedPropName {
                    span: DUMMY_SP,
                    expr: Box::new(raise_expr(prop)),
                }),
            },
        }),
        Expr::Seq(e) => js::Expr::Seq(js::SeqExpr {
            span: DUMMY_SP,
            exprs: e.exprs.iter().map(|sub| Box::new(raise_expr(sub))).collect(),
        }),
        Expr::This(_) => js::Expr::This(js::ThisExpr { span: DUMMY_SP }),
    }
}

fn raise_args(args: &[Expr]) -> Vec<js::ExprOrSpread> {
    args.iter()
        .map(|arg| js::ExprOrSpread {
            spread: None,
            expr: Box::new(raise_expr(arg)),
        })
        .collect()
}

fn raise_str(s: &StrLit) -> js::Str {
    js::Str {
        span: DUMMY_SP,
        value: s.value.clone().into(),
        raw: s.raw.clone().map(Into::into),
    }
}

fn raise_num(n: &NumLit) -> js::Number {
    js::Number {
        span: DUMMY_SP,
        value: n.value,
        raw: n.raw.clone().map(Into::into),
    }
}

fn raise_prop_key(key: &PropKey) -> js::PropName {
    match key {
        PropKey::Ident(ident) => js::PropName::Ident(raise_ident(ident)),
        PropKey::Str(s) => js::PropName::Str(raise_str(s)),
        PropKey::Num(n) => js::PropName::Num(raise_num(n)),
    }
}

fn raise_binary_op(op: BinaryOp) -> js::BinaryOp {
    match op {
        BinaryOp::EqEq => js::BinaryOp::EqEq,
        BinaryOp::NotEq => js::BinaryOp::NotEq,
        BinaryOp::EqEqEq => js::BinaryOp::EqEqEq,
        BinaryOp::NotEqEq => js::BinaryOp::NotEqEq,
        BinaryOp::Lt => js::BinaryOp::Lt,
        BinaryOp::LtEq => js::BinaryOp::LtEq,
        BinaryOp::Gt => js::BinaryOp::Gt,
        BinaryOp::GtEq => js::BinaryOp::GtEq,
        BinaryOp::LShift => js::BinaryOp::LShift,
        BinaryOp::RShift => js::BinaryOp::RShift,
        BinaryOp::ZeroFillRShift => js::BinaryOp::ZeroFillRShift,
        BinaryOp::Add => js::BinaryOp::Add,
        BinaryOp::Sub => js::BinaryOp::Sub,
        BinaryOp::Mul => js::BinaryOp::Mul,
        BinaryOp::Div => js::BinaryOp::Div,
        BinaryOp::Mod => js::BinaryOp::Mod,
        BinaryOp::BitOr => js::BinaryOp::BitOr,
        BinaryOp::BitXor => js::BinaryOp::BitXor,
        BinaryOp::BitAnd => js::BinaryOp::BitAnd,
        BinaryOp::In => js::BinaryOp::In,
        BinaryOp::InstanceOf => js::BinaryOp::InstanceOf,
        BinaryOp::Exp => js::BinaryOp::Exp,
    }
}

fn raise_assign_op(op: AssignOp) -> js::AssignOp {
    match op {
        AssignOp::Assign => js::AssignOp::Assign,
        AssignOp::Compound(BinaryOp::Add) => js::AssignOp::AddAssign,
        AssignOp::Compound(BinaryOp::Sub) => js::AssignOp::SubAssign,
        AssignOp::Compound(BinaryOp::Mul) => js::AssignOp::MulAssign,
        AssignOp::Compound(BinaryOp::Div) => js::AssignOp::DivAssign,
        AssignOp::Compound(BinaryOp::Mod) => js::AssignOp::ModAssign,
        AssignOp::Compound(BinaryOp::LShift) => js::AssignOp::LShiftAssign,
        AssignOp::Compound(BinaryOp::RShift) => js::AssignOp::RShiftAssign,
        AssignOp::Compound(BinaryOp::ZeroFillRShift) => js::AssignOp::ZeroFillRShiftAssign,
        AssignOp::Compound(BinaryOp::BitOr) => js::AssignOp::BitOrAssign,
        AssignOp::Compound(BinaryOp::BitXor) => js::AssignOp::BitXorAssign,
        AssignOp::Compound(BinaryOp::BitAnd) => js::AssignOp::BitAndAssign,
        AssignOp::Compound(BinaryOp::Exp) => js::AssignOp::ExpAssign,
        // Comparison operators never appear in compound assignment; the
        // parser cannot produce them.
        AssignOp::Compound(_) => js::AssignOp::Assign,
    }
}
