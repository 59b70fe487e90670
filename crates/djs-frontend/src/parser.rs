//! Lowering from the swc tree into the restoration subset.

use djs_core::ast::*;
use djs_core::span::Span;
use djs_core::{Error, Result};
use swc_common::input::StringInput;
use swc_common::{sync::Lrc, FileName, SourceMap};
use swc_ecma_ast as js;
use swc_ecma_ast::EsVersion;
use swc_ecma_parser::lexer::Lexer;
use swc_ecma_parser::{EsConfig, Parser, Syntax};

/// Parse JavaScript source in script mode. Parse errors and constructs
/// outside the modeled subset are both hard errors; the passes downstream
/// assume a closed tree.
pub fn parse(source: &str) -> Result<Program> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        FileName::Custom("<input>".into()).into(),
        source.to_string(),
    );
    let syntax = Syntax::Es(EsConfig::default());
    let lexer = Lexer::new(syntax, EsVersion::EsNext, StringInput::from(&*fm), None);
    let mut parser = Parser::new_from(lexer);

    let script = parser
        .parse_script()
        .map_err(|err| Error::Parse(format!("{err:?}")))?;
    let errors = parser.take_errors();
    if let Some(err) = errors.first() {
        return Err(Error::Parse(format!("{err:?}")));
    }

    let body = script
        .body
        .iter()
        .map(lower_stmt)
        .collect::<Result<Vec<_>>>()?;
    Ok(Program {
        body,
        span: span(script.span),
    })
}

fn span(s: swc_common::Span) -> Span {
    Span {
        lo: s.lo.0,
        hi: s.hi.0,
    }
}

fn unsupported<T>(at: swc_common::Span, what: &str) -> Result<T> {
    Err(Error::Unsupported(span(at), what.to_string()))
}

fn lower_stmt(stmt: &js::Stmt) -> Result<Stmt> {
    Ok(match stmt {
        js::Stmt::Block(block) => Stmt::Block(lower_block(block)?),
        js::Stmt::Empty(s) => Stmt::Empty(EmptyStmt { span: span(s.span) }),
        js::Stmt::Debugger(s) => Stmt::Debugger(DebuggerStmt { span: span(s.span) }),
        js::Stmt::Return(s) => Stmt::Return(ReturnStmt {
            arg: s.arg.as_deref().map(lower_expr).transpose()?,
            span: span(s.span),
        }),
        js::Stmt::Break(s) => {
            if s.label.is_some() {
                return unsupported(s.span, "labeled break");
            }
            Stmt::Break(BreakStmt { span: span(s.span) })
        }
        js::Stmt::Continue(s) => {
            if s.label.is_some() {
                return unsupported(s.span, "labeled continue");
            }
            Stmt::Continue(ContinueStmt { span: span(s.span) })
        }
        js::Stmt::If(s) => Stmt::If(IfStmt {
            test: lower_expr(&s.test)?,
            consequent: Box::new(lower_stmt(&s.cons)?),
            alternate: s
                .alt
                .as_deref()
                .map(|alt| lower_stmt(alt).map(Box::new))
                .transpose()?,
            span: span(s.span),
        }),
        js::Stmt::Switch(s) => Stmt::Switch(SwitchStmt {
            discriminant: lower_expr(&s.discriminant)?,
            cases: s
                .cases
                .iter()
                .map(|case| {
                    Ok(SwitchCase {
                        test: case.test.as_deref().map(lower_expr).transpose()?,
                        body: case.cons.iter().map(lower_stmt).collect::<Result<_>>()?,
                        span: span(case.span),
                    })
                })
                .collect::<Result<_>>()?,
            span: span(s.span),
        }),
        js::Stmt::Throw(s) => Stmt::Throw(ThrowStmt {
            arg: lower_expr(&s.arg)?,
            span: span(s.span),
        }),
        js::Stmt::Try(s) => Stmt::Try(TryStmt {
            block: lower_block(&s.block)?,
            handler: s
                .handler
                .as_ref()
                .map(|handler| {
                    let param = match &handler.param {
                        None => None,
                        Some(js::Pat::Ident(binding)) => Some(lower_ident(&binding.id)),
                        Some(other) => {
                            return unsupported(handler.span, &format!("catch pattern {other:?}"))
                        }
                    };
                    Ok(CatchClause {
                        param,
                        body: lower_block(&handler.body)?,
                        span: span(handler.span),
                    })
                })
                .transpose()?,
            finalizer: s.finalizer.as_ref().map(lower_block).transpose()?,
            span: span(s.span),
        }),
        js::Stmt::While(s) => Stmt::While(WhileStmt {
            test: lower_expr(&s.test)?,
            body: Box::new(lower_stmt(&s.body)?),
            span: span(s.span),
        }),
        js::Stmt::DoWhile(s) => Stmt::DoWhile(DoWhileStmt {
            body: Box::new(lower_stmt(&s.body)?),
            test: lower_expr(&s.test)?,
            span: span(s.span),
        }),
        js::Stmt::For(s) => Stmt::For(ForStmt {
            init: s
                .init
                .as_ref()
                .map(|init| -> Result<ForInit> {
                    match init {
                    js::VarDeclOrExpr::VarDecl(decl) => {
                        Ok(ForInit::VarDecl(lower_var_decl(decl)?))
                    }
                    js::VarDeclOrExpr::Expr(expr) => Ok(ForInit::Expr(lower_expr(expr)?)),
                    }
                })
                .transpose()?,
            test: s.test.as_deref().map(lower_expr).transpose()?,
            update: s.update.as_deref().map(lower_expr).transpose()?,
            body: Box::new(lower_stmt(&s.body)?),
            span: span(s.span),
        }),
        js::Stmt::ForIn(s) => return unsupported(s.span, "for-in statement"),
        js::Stmt::ForOf(s) => return unsupported(s.span, "for-of statement"),
        js::Stmt::Labeled(s) => return unsupported(s.span, "labeled statement"),
        js::Stmt::With(s) => return unsupported(s.span, "with statement"),
        js::Stmt::Decl(decl) => match decl {
            js::Decl::Var(var) => Stmt::VarDecl(lower_var_decl(var)?),
            js::Decl::Fn(func) => Stmt::Func(FuncDecl {
                name: lower_ident(&func.ident),
                function: lower_function(&func.function)?,
            }),
            other => return unsupported(swc_common::DUMMY_SP, &format!("declaration {other:?}")),
        },
        js::Stmt::Expr(s) => Stmt::Expr(ExprStmt {
            expr: lower_expr(&s.expr)?,
            span: span(s.span),
        }),
    })
}

fn lower_block(block: &js::BlockStmt) -> Result<Block> {
    Ok(Block {
        stmts: block.stmts.iter().map(lower_stmt).collect::<Result<_>>()?,
        span: span(block.span),
    })
}

fn lower_var_decl(decl: &js::VarDecl) -> Result<VarDecl> {
    let kind = match decl.kind {
        js::VarDeclKind::Var => VarKind::Var,
        js::VarDeclKind::Let => VarKind::Let,
        js::VarDeclKind::Const => VarKind::Const,
    };
    Ok(VarDecl {
        kind,
        decls: decl
            .decls
            .iter()
            .map(|declarator| {
                let name = match &declarator.name {
                    js::Pat::Ident(binding) => lower_ident(&binding.id),
                    other => {
                        return unsupported(decl.span, &format!("destructuring pattern {other:?}"))
                    }
                };
                Ok(VarDeclarator {
                    name,
                    init: declarator.init.as_deref().map(lower_expr).transpose()?,
                    span: span(declarator.span),
                })
            })
            .collect::<Result<_>>()?,
        span: span(decl.span),
    })
}

fn lower_function(function: &js::Function) -> Result<Function> {
    if function.is_async || function.is_generator {
        return unsupported(function.span, "async or generator function");
    }
    let params = function
        .params
        .iter()
        .map(|param| lower_param(&param.pat))
        .collect::<Result<_>>()?;
    let body = match &function.body {
        Some(body) => lower_block(body)?,
        None => return unsupported(function.span, "function without a body"),
    };
    Ok(Function {
        params,
        body,
        span: span(function.span),
    })
}

fn lower_param(pat: &js::Pat) -> Result<Ident> {
    match pat {
        js::Pat::Ident(binding) => Ok(lower_ident(&binding.id)),
        other => unsupported(swc_common::DUMMY_SP, &format!("parameter pattern {other:?}")),
    }
}

fn lower_ident(ident: &js::Ident) -> Ident {
    Ident {
        name: ident.sym.to_string(),
        span: span(ident.span),
    }
}

fn lower_expr(expr: &js::Expr) -> Result<Expr> {
    Ok(match expr {
        js::Expr::Paren(e) => lower_expr(&e.expr)?,
        js::Expr::This(e) => Expr::This(ThisExpr { span: span(e.span) }),
        js::Expr::Ident(ident) => Expr::Ident(lower_ident(ident)),
        js::Expr::Lit(lit) => lower_lit(lit)?,
        js::Expr::Tpl(tpl) => Expr::Template(TemplateLit {
            quasis: tpl
                .quasis
                .iter()
                .map(|quasi| TemplateElement {
                    cooked: quasi
                        .cooked
                        .as_ref()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| quasi.raw.to_string()),
                    raw: quasi.raw.to_string(),
                })
                .collect(),
            exprs: tpl
                .exprs
                .iter()
                .map(|e| lower_expr(e))
                .collect::<Result<_>>()?,
            span: span(tpl.span),
        }),
        js::Expr::Array(array) => Expr::Array(ArrayLit {
            elements: array
                .elems
                .iter()
                .map(|element| match element {
                    None => Ok(None),
                    Some(js::ExprOrSpread { spread: Some(_), .. }) => {
                        unsupported(array.span, "spread element")
                    }
                    Some(js::ExprOrSpread { expr, .. }) => lower_expr(expr).map(Some),
                })
                .collect::<Result<_>>()?,
            span: span(array.span),
        }),
        js::Expr::Object(object) => Expr::Object(ObjectLit {
            props: object
                .props
                .iter()
                .map(|prop| lower_prop(prop, object.span))
                .collect::<Result<_>>()?,
            span: span(object.span),
        }),
        js::Expr::Fn(func) => Expr::Function(FunctionExpr {
            name: func.ident.as_ref().map(lower_ident),
            function: lower_function(&func.function)?,
        }),
        js::Expr::Arrow(arrow) => {
            if arrow.is_async || arrow.is_generator {
                return unsupported(arrow.span, "async or generator arrow");
            }
            Expr::Arrow(ArrowExpr {
                params: arrow.params.iter().map(lower_param).collect::<Result<_>>()?,
                body: match arrow.body.as_ref() {
                    js::BlockStmtOrExpr::BlockStmt(block) => ArrowBody::Block(lower_block(block)?),
                    js::BlockStmtOrExpr::Expr(e) => ArrowBody::Expr(Box::new(lower_expr(e)?)),
                },
                span: span(arrow.span),
            })
        }
        js::Expr::Unary(e) => Expr::Unary(UnaryExpr {
            op: match e.op {
                js::UnaryOp::Minus => UnaryOp::Minus,
                js::UnaryOp::Plus => UnaryOp::Plus,
                js::UnaryOp::Bang => UnaryOp::Not,
                js::UnaryOp::Tilde => UnaryOp::BitNot,
                js::UnaryOp::TypeOf => UnaryOp::TypeOf,
                js::UnaryOp::Void => UnaryOp::Void,
                js::UnaryOp::Delete => UnaryOp::Delete,
            },
            arg: Box::new(lower_expr(&e.arg)?),
            span: span(e.span),
        }),
        js::Expr::Update(e) => Expr::Update(UpdateExpr {
            op: match e.op {
                js::UpdateOp::PlusPlus => UpdateOp::Incr,
                js::UpdateOp::MinusMinus => UpdateOp::Decr,
            },
            prefix: e.prefix,
            arg: Box::new(lower_expr(&e.arg)?),
            span: span(e.span),
        }),
        js::Expr::Bin(e) => {
            let left = Box::new(lower_expr(&e.left)?);
            let right = Box::new(lower_expr(&e.right)?);
            let at = span(e.span);
            match lower_logical_op(e.op) {
                Some(op) => Expr::Logical(LogicalExpr {
                    op,
                    left,
                    right,
                    span: at,
                }),
                None => Expr::Binary(BinaryExpr {
                    op: lower_binary_op(e.op, e.span)?,
                    left,
                    right,
                    span: at,
                }),
            }
        }
        js::Expr::Assign(e) => Expr::Assign(AssignExpr {
            op: lower_assign_op(e.op, e.span)?,
            target: Box::new(lower_assign_target(&e.left, e.span)?),
            value: Box::new(lower_expr(&e.right)?),
            span: span(e.span),
        }),
        js::Expr::Cond(e) => Expr::Cond(CondExpr {
            test: Box::new(lower_expr(&e.test)?),
            consequent: Box::new(lower_expr(&e.cons)?),
            alternate: Box::new(lower_expr(&e.alt)?),
            span: span(e.span),
        }),
        js::Expr::Call(e) => {
            let callee = match &e.callee {
                js::Callee::Expr(callee) => lower_expr(callee)?,
                other => return unsupported(e.span, &format!("callee {other:?}")),
            };
            Expr::Call(CallExpr {
                callee: Box::new(callee),
                args: lower_args(&e.args, e.span)?,
                span: span(e.span),
            })
        }
        js::Expr::New(e) => Expr::New(NewExpr {
            callee: Box::new(lower_expr(&e.callee)?),
            args: match &e.args {
                Some(args) => lower_args(args, e.span)?,
                None => Vec::new(),
            },
            span: span(e.span),
        }),
        js::Expr::Member(e) => Expr::Member(MemberExpr {
            object: Box::new(lower_expr(&e.obj)?),
            property: match &e.prop {
                js::MemberProp::Ident(ident) => MemberProp::Ident(lower_ident(ident)),
                js::MemberProp::Computed(computed) => {
                    MemberProp::Computed(Box::new(lower_expr(&computed.expr)?))
                }
                js::MemberProp::PrivateName(_) => {
                    return unsupported(e.span, "private member access")
                }
            },
            span: span(e.span),
        }),
        js::Expr::Seq(e) => Expr::Seq(SeqExpr {
            exprs: e
                .exprs
                .iter()
                .map(|sub| lower_expr(sub))
                .collect::<Result<_>>()?,
            span: span(e.span),
        }),
        other => {
            return unsupported(
                swc_common::DUMMY_SP,
                &format!("expression {}", expr_kind(other)),
            )
        }
    })
}

fn lower_args(args: &[js::ExprOrSpread], at: swc_common::Span) -> Result<Vec<Expr>> {
    args.iter()
        .map(|arg| {
            if arg.spread.is_some() {
                return unsupported(at, "spread argument");
            }
            lower_expr(&arg.expr)
        })
        .collect()
}

fn lower_assign_target(left: &js::PatOrExpr, at: swc_common::Span) -> Result<Expr> {
    match left {
        js::PatOrExpr::Expr(expr) => lower_expr(expr),
        js::PatOrExpr::Pat(pat) => match pat.as_ref() {
            js::Pat::Ident(binding) => Ok(Expr::Ident(lower_ident(&binding.id))),
            js::Pat::Expr(expr) => lower_expr(expr),
            other => unsupported(at, &format!("assignment pattern {other:?}")),
        },
    }
}

fn lower_prop(prop: &js::PropOrSpread, at: swc_common::Span) -> Result<Property> {
    let prop = match prop {
        js::PropOrSpread::Prop(prop) => prop.as_ref(),
        js::PropOrSpread::Spread(_) => return unsupported(at, "object spread"),
    };
    match prop {
        js::Prop::KeyValue(kv) => Ok(Property {
            key: lower_prop_key(&kv.key, at)?,
            value: lower_expr(&kv.value)?,
            span: Span::DUMMY,
        }),
        js::Prop::Shorthand(ident) => Ok(Property {
            key: PropKey::Ident(lower_ident(ident)),
            value: Expr::Ident(lower_ident(ident)),
            span: span(ident.span),
        }),
        js::Prop::Method(method) => Ok(Property {
            key: lower_prop_key(&method.key, at)?,
            value: Expr::Function(FunctionExpr {
                name: None,
                function: lower_function(&method.function)?,
            }),
            span: Span::DUMMY,
        }),
        other => unsupported(at, &format!("object property {other:?}")),
    }
}

fn lower_prop_key(key: &js::PropName, at: swc_common::Span) -> Result<PropKey> {
    match key {
        js::PropName::Ident(ident) => Ok(PropKey::Ident(lower_ident(ident))),
        js::PropName::Str(s) => Ok(PropKey::Str(StrLit {
            value: s.value.to_string(),
            raw: s.raw.as_ref().map(|r| r.to_string()),
            span: span(s.span),
        })),
        js::PropName::Num(n) => Ok(PropKey::Num(NumLit {
            value: n.value,
            raw: n.raw.as_ref().map(|r| r.to_string()),
            span: span(n.span),
        })),
        other => unsupported(at, &format!("property key {other:?}")),
    }
}

fn lower_lit(lit: &js::Lit) -> Result<Expr> {
    Ok(match lit {
        js::Lit::Str(s) => Expr::Str(StrLit {
            value: s.value.to_string(),
            raw: s.raw.as_ref().map(|r| r.to_string()),
            span: span(s.span),
        }),
        js::Lit::Num(n) => Expr::Num(NumLit {
            value: n.value,
            raw: n.raw.as_ref().map(|r| r.to_string()),
            span: span(n.span),
        }),
        js::Lit::Bool(b) => Expr::Bool(BoolLit {
            value: b.value,
            span: span(b.span),
        }),
        js::Lit::Null(n) => Expr::Null(NullLit { span: span(n.span) }),
        js::Lit::Regex(regex) => Expr::Regex(RegexLit {
            pattern: regex.exp.to_string(),
            flags: regex.flags.to_string(),
            span: span(regex.span),
        }),
        other => return unsupported(swc_common::DUMMY_SP, &format!("literal {other:?}")),
    })
}

fn lower_logical_op(op: js::BinaryOp) -> Option<LogicalOp> {
    match op {
        js::BinaryOp::LogicalAnd => Some(LogicalOp::And),
        js::BinaryOp::LogicalOr => Some(LogicalOp::Or),
        js::BinaryOp::NullishCoalescing => Some(LogicalOp::NullishCoalescing),
        _ => None,
    }
}

fn lower_binary_op(op: js::BinaryOp, at: swc_common::Span) -> Result<BinaryOp> {
    Ok(match op {
        js::BinaryOp::EqEq => BinaryOp::EqEq,
        js::BinaryOp::NotEq => BinaryOp::NotEq,
        js::BinaryOp::EqEqEq => BinaryOp::EqEqEq,
        js::BinaryOp::NotEqEq => BinaryOp::NotEqEq,
        js::BinaryOp::Lt => BinaryOp::Lt,
        js::BinaryOp::LtEq => BinaryOp::LtEq,
        js::BinaryOp::Gt => BinaryOp::Gt,
        js::BinaryOp::GtEq => BinaryOp::GtEq,
        js::BinaryOp::LShift => BinaryOp::LShift,
        js::BinaryOp::RShift => BinaryOp::RShift,
        js::BinaryOp::ZeroFillRShift => BinaryOp::ZeroFillRShift,
        js::BinaryOp::Add => BinaryOp::Add,
        js::BinaryOp::Sub => BinaryOp::Sub,
        js::BinaryOp::Mul => BinaryOp::Mul,
        js::BinaryOp::Div => BinaryOp::Div,
        js::BinaryOp::Mod => BinaryOp::Mod,
        js::BinaryOp::BitOr => BinaryOp::BitOr,
        js::BinaryOp::BitXor => BinaryOp::BitXor,
        js::BinaryOp::BitAnd => BinaryOp::BitAnd,
        js::BinaryOp::In => BinaryOp::In,
        js::BinaryOp::InstanceOf => BinaryOp::InstanceOf,
        js::BinaryOp::Exp => BinaryOp::Exp,
        other => return unsupported(at, &format!("binary operator {other:?}")),
    })
}

fn lower_assign_op(op: js::AssignOp, at: swc_common::Span) -> Result<AssignOp> {
    Ok(match op {
        js::AssignOp::Assign => AssignOp::Assign,
        js::AssignOp::AddAssign => AssignOp::Compound(BinaryOp::Add),
        js::AssignOp::SubAssign => AssignOp::Compound(BinaryOp::Sub),
        js::AssignOp::MulAssign => AssignOp::Compound(BinaryOp::Mul),
        js::AssignOp::DivAssign => AssignOp::Compound(BinaryOp::Div),
        js::AssignOp::ModAssign => AssignOp::Compound(BinaryOp::Mod),
        js::AssignOp::LShiftAssign => AssignOp::Compound(BinaryOp::LShift),
        js::AssignOp::RShiftAssign => AssignOp::Compound(BinaryOp::RShift),
        js::AssignOp::ZeroFillRShiftAssign => AssignOp::Compound(BinaryOp::ZeroFillRShift),
        js::AssignOp::BitOrAssign => AssignOp::Compound(BinaryOp::BitOr),
        js::AssignOp::BitXorAssign => AssignOp::Compound(BinaryOp::BitXor),
        js::AssignOp::BitAndAssign => AssignOp::Compound(BinaryOp::BitAnd),
        js::AssignOp::ExpAssign => AssignOp::Compound(BinaryOp::Exp),
        other => return unsupported(at, &format!("assignment operator {other:?}")),
    })
}

fn expr_kind(expr: &js::Expr) -> &'static str {
    match expr {
        js::Expr::Class(_) => "class expression",
        js::Expr::Yield(_) => "yield",
        js::Expr::Await(_) => "await",
        js::Expr::TaggedTpl(_) => "tagged template",
        js::Expr::SuperProp(_) => "super property",
        js::Expr::MetaProp(_) => "meta property",
        js::Expr::OptChain(_) => "optional chaining",
        js::Expr::PrivateName(_) => "private name",
        _ => "unrecognized expression",
    }
}
