use super::{AssignOp, BinaryOp, Ident, LogicalOp, UnaryOp, UpdateOp};
use crate::span::Span;
use serde::{Deserialize, Serialize};

use super::stmt::Block;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Str(StrLit),
    Num(NumLit),
    Bool(BoolLit),
    Null(NullLit),
    Regex(RegexLit),
    Template(TemplateLit),
    Ident(Ident),
    Array(ArrayLit),
    Object(ObjectLit),
    Function(FunctionExpr),
    Arrow(ArrowExpr),
    Unary(UnaryExpr),
    Update(UpdateExpr),
    Binary(BinaryExpr),
    Logical(LogicalExpr),
    Assign(AssignExpr),
    Cond(CondExpr),
    Call(CallExpr),
    New(NewExpr),
    Member(MemberExpr),
    Seq(SeqExpr),
    This(ThisExpr),
}

/// String literal. `raw` is the raw-text rendering hint: when present the
/// printer re-emits it verbatim instead of choosing quoting itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrLit {
    pub value: String,
    pub raw: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumLit {
    pub value: f64,
    /// Raw-text hint (e.g. a hexadecimal spelling); stripped by the
    /// simplifier so folded numbers print canonically.
    pub raw: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolLit {
    pub value: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullLit {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexLit {
    pub pattern: String,
    pub flags: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLit {
    pub quasis: Vec<TemplateElement>,
    pub exprs: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateElement {
    pub cooked: String,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayLit {
    /// `None` entries are elisions (`[1, , 3]`).
    pub elements: Vec<Option<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLit {
    pub props: Vec<Property>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: PropKey,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropKey {
    Ident(Ident),
    Str(StrLit),
    Num(NumLit),
}

impl PropKey {
    /// The property name as the string JS would use for lookup.
    pub fn name(&self) -> String {
        match self {
            PropKey::Ident(ident) => ident.name.clone(),
            PropKey::Str(s) => s.value.clone(),
            PropKey::Num(n) => super::build::format_number(n.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub params: Vec<Ident>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpr {
    pub name: Option<Ident>,
    pub function: Function,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowExpr {
    pub params: Vec<Ident>,
    pub body: ArrowBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub arg: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateExpr {
    pub op: UpdateOp,
    pub prefix: bool,
    pub arg: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalExpr {
    pub op: LogicalOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignExpr {
    pub op: AssignOp,
    /// Identifier or member expression.
    pub target: Box<Expr>,
    pub value: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondExpr {
    pub test: Box<Expr>,
    pub consequent: Box<Expr>,
    pub alternate: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpr {
    pub object: Box<Expr>,
    pub property: MemberProp,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberProp {
    Ident(Ident),
    Computed(Box<Expr>),
}

impl MemberProp {
    /// Static property name, if the access is non-computed or computed
    /// with a string literal.
    pub fn static_name(&self) -> Option<&str> {
        match self {
            MemberProp::Ident(ident) => Some(&ident.name),
            MemberProp::Computed(expr) => match expr.as_ref() {
                Expr::Str(s) => Some(&s.value),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqExpr {
    pub exprs: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThisExpr {
    pub span: Span,
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Str(x) => x.span,
            Expr::Num(x) => x.span,
            Expr::Bool(x) => x.span,
            Expr::Null(x) => x.span,
            Expr::Regex(x) => x.span,
            Expr::Template(x) => x.span,
            Expr::Ident(x) => x.span,
            Expr::Array(x) => x.span,
            Expr::Object(x) => x.span,
            Expr::Function(x) => x.function.span,
            Expr::Arrow(x) => x.span,
            Expr::Unary(x) => x.span,
            Expr::Update(x) => x.span,
            Expr::Binary(x) => x.span,
            Expr::Logical(x) => x.span,
            Expr::Assign(x) => x.span,
            Expr::Cond(x) => x.span,
            Expr::Call(x) => x.span,
            Expr::New(x) => x.span,
            Expr::Member(x) => x.span,
            Expr::Seq(x) => x.span,
            Expr::This(x) => x.span,
        }
    }

    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            Expr::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    pub fn ident_name(&self) -> Option<&str> {
        self.as_ident().map(|i| i.name.as_str())
    }

    pub fn as_str_lit(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(&s.value),
            _ => None,
        }
    }

    pub fn as_num_lit(&self) -> Option<f64> {
        match self {
            Expr::Num(n) => Some(n.value),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::Str(_) | Expr::Num(_) | Expr::Bool(_) | Expr::Null(_) | Expr::Regex(_)
        )
    }
}
