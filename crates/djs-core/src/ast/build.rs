//! Construction helpers for nodes the restoration passes synthesize.

use super::*;
use crate::span::Span;

/// Format a number the way JS string conversion does for the common cases
/// (integral values without a trailing `.0`).
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl Expr {
    pub fn str(value: impl Into<String>) -> Expr {
        Expr::Str(StrLit {
            value: value.into(),
            raw: None,
            span: Span::DUMMY,
        })
    }

    pub fn num(value: f64) -> Expr {
        Expr::Num(NumLit {
            value,
            raw: None,
            span: Span::DUMMY,
        })
    }

    pub fn bool(value: bool) -> Expr {
        Expr::Bool(BoolLit {
            value,
            span: Span::DUMMY,
        })
    }

    pub fn null() -> Expr {
        Expr::Null(NullLit { span: Span::DUMMY })
    }

    pub fn ident(name: impl Into<String>) -> Expr {
        Expr::Ident(Ident::new(name))
    }

    pub fn unary(op: UnaryOp, arg: Expr) -> Expr {
        Expr::Unary(UnaryExpr {
            op,
            arg: Box::new(arg),
            span: Span::DUMMY,
        })
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: Span::DUMMY,
        })
    }

    pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
        Expr::Logical(LogicalExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: Span::DUMMY,
        })
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call(CallExpr {
            callee: Box::new(callee),
            args,
            span: Span::DUMMY,
        })
    }

    pub fn array(elements: Vec<Expr>) -> Expr {
        Expr::Array(ArrayLit {
            elements: elements.into_iter().map(Some).collect(),
            span: Span::DUMMY,
        })
    }

    pub fn object(props: Vec<(String, Expr)>) -> Expr {
        Expr::Object(ObjectLit {
            props: props
                .into_iter()
                .map(|(key, value)| Property {
                    key: PropKey::Str(StrLit {
                        value: key,
                        raw: None,
                        span: Span::DUMMY,
                    }),
                    value,
                    span: Span::DUMMY,
                })
                .collect(),
            span: Span::DUMMY,
        })
    }

    pub fn assign(target: Expr, value: Expr) -> Expr {
        Expr::Assign(AssignExpr {
            op: AssignOp::Assign,
            target: Box::new(target),
            value: Box::new(value),
            span: Span::DUMMY,
        })
    }
}

impl Stmt {
    pub fn expr_stmt(expr: Expr) -> Stmt {
        Stmt::Expr(ExprStmt {
            expr,
            span: Span::DUMMY,
        })
    }

    pub fn block(stmts: Vec<Stmt>) -> Stmt {
        Stmt::Block(Block::new(stmts))
    }

    /// `if (test) { consequent } else { alternate }` with block-wrapped
    /// branches, the shape every restoration pass emits.
    pub fn if_else(test: Expr, consequent: Vec<Stmt>, alternate: Option<Vec<Stmt>>) -> Stmt {
        Stmt::If(IfStmt {
            test,
            consequent: Box::new(Stmt::block(consequent)),
            alternate: alternate.map(|stmts| Box::new(Stmt::block(stmts))),
            span: Span::DUMMY,
        })
    }
}
