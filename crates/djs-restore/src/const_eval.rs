//! Constant evaluation over pure expression subtrees.
//!
//! The simplifier only folds what this module approves: a subtree is
//! evaluable when it is built from literals and operators alone, so
//! folding can never observe or change program state. Operator semantics
//! are shared with the fragment executor so a folded value and a
//! sandbox-computed value never disagree.

use djs_core::ast::{Expr, UnaryOp};

use crate::sandbox::{self, Value};

/// Whether the subtree can be folded without running the program. Any
/// identifier, member access, call, assignment, or update poisons it.
pub fn can_evaluate(expr: &Expr) -> bool {
    match expr {
        Expr::Str(_) | Expr::Num(_) | Expr::Bool(_) | Expr::Null(_) => true,
        Expr::Template(tpl) => tpl.exprs.iter().all(can_evaluate),
        Expr::Array(array) => array
            .elements
            .iter()
            .all(|e| e.as_ref().is_some_and(can_evaluate)),
        Expr::Object(object) => object.props.iter().all(|p| can_evaluate(&p.value)),
        Expr::Unary(e) => e.op != UnaryOp::Delete && can_evaluate(&e.arg),
        Expr::Binary(e) => can_evaluate(&e.left) && can_evaluate(&e.right),
        Expr::Logical(e) => can_evaluate(&e.left) && can_evaluate(&e.right),
        Expr::Cond(e) => {
            can_evaluate(&e.test) && can_evaluate(&e.consequent) && can_evaluate(&e.alternate)
        }
        Expr::Seq(e) => e.exprs.iter().all(can_evaluate),
        Expr::Regex(_)
        | Expr::Ident(_)
        | Expr::Function(_)
        | Expr::Arrow(_)
        | Expr::Update(_)
        | Expr::Assign(_)
        | Expr::Call(_)
        | Expr::New(_)
        | Expr::Member(_)
        | Expr::This(_) => false,
    }
}

/// Whether dropping the expression could change program behavior: true
/// when it contains a call, construction, assignment, or update anywhere.
pub fn is_meaningful(expr: &Expr) -> bool {
    match expr {
        Expr::Call(_) | Expr::New(_) | Expr::Assign(_) | Expr::Update(_) => true,
        Expr::Str(_)
        | Expr::Num(_)
        | Expr::Bool(_)
        | Expr::Null(_)
        | Expr::Regex(_)
        | Expr::Ident(_)
        | Expr::This(_)
        // A function value in discard position runs nothing.
        | Expr::Function(_)
        | Expr::Arrow(_) => false,
        Expr::Template(tpl) => tpl.exprs.iter().any(is_meaningful),
        Expr::Array(array) => array.elements.iter().flatten().any(is_meaningful),
        Expr::Object(object) => object.props.iter().any(|p| is_meaningful(&p.value)),
        Expr::Unary(e) => is_meaningful(&e.arg),
        Expr::Binary(e) => is_meaningful(&e.left) || is_meaningful(&e.right),
        Expr::Logical(e) => is_meaningful(&e.left) || is_meaningful(&e.right),
        Expr::Cond(e) => {
            is_meaningful(&e.test) || is_meaningful(&e.consequent) || is_meaningful(&e.alternate)
        }
        Expr::Member(e) => {
            is_meaningful(&e.object)
                || match &e.property {
                    djs_core::ast::MemberProp::Computed(prop) => is_meaningful(prop),
                    djs_core::ast::MemberProp::Ident(_) => false,
                }
        }
        Expr::Seq(e) => e.exprs.iter().any(is_meaningful),
    }
}

/// Fold an evaluable subtree. `None` when the subtree is poisoned or the
/// operation has no constant result (`in` on a number, say).
pub fn evaluate(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Str(s) => Some(Value::Str(s.value.clone())),
        Expr::Num(n) => Some(Value::Num(n.value)),
        Expr::Bool(b) => Some(Value::Bool(b.value)),
        Expr::Null(_) => Some(Value::Null),
        Expr::Template(tpl) => {
            let mut out = String::new();
            for (i, quasi) in tpl.quasis.iter().enumerate() {
                out.push_str(&quasi.cooked);
                if let Some(sub) = tpl.exprs.get(i) {
                    out.push_str(&evaluate(sub)?.to_js_string());
                }
            }
            Some(Value::Str(out))
        }
        Expr::Array(array) => {
            let values: Option<Vec<Value>> = array
                .elements
                .iter()
                .map(|e| e.as_ref().and_then(evaluate))
                .collect();
            Some(Value::array(values?))
        }
        Expr::Object(object) => {
            let props: Option<Vec<(String, Value)>> = object
                .props
                .iter()
                .map(|p| evaluate(&p.value).map(|v| (p.key.name(), v)))
                .collect();
            Some(Value::object(props?))
        }
        Expr::Unary(e) => sandbox::unary(e.op, &evaluate(&e.arg)?).ok(),
        Expr::Binary(e) => sandbox::binary(e.op, &evaluate(&e.left)?, &evaluate(&e.right)?).ok(),
        Expr::Logical(e) => {
            let left = evaluate(&e.left)?;
            match sandbox::logical_short_circuit(e.op, &left) {
                Some(value) => Some(value),
                None => evaluate(&e.right),
            }
        }
        Expr::Cond(e) => {
            if evaluate(&e.test)?.is_truthy() {
                evaluate(&e.consequent)
            } else {
                evaluate(&e.alternate)
            }
        }
        Expr::Seq(e) => {
            let mut result = None;
            for sub in &e.exprs {
                result = Some(evaluate(sub)?);
            }
            result
        }
        _ => None,
    }
}

/// Render a computed value back into source form. Functions and regexes
/// have no literal rendering here.
pub fn value_to_expr(value: &Value) -> Option<Expr> {
    Some(match value {
        Value::Undefined => Expr::ident("undefined"),
        Value::Null => Expr::null(),
        Value::Bool(b) => Expr::bool(*b),
        Value::Num(n) => num_to_expr(*n),
        Value::Str(s) => Expr::str(s.clone()),
        Value::Array(array) => {
            let elements: Option<Vec<Expr>> = array.borrow().iter().map(value_to_expr).collect();
            Expr::array(elements?)
        }
        Value::Object(object) => {
            let props: Option<Vec<(String, Expr)>> = object
                .borrow()
                .iter()
                .map(|(k, v)| value_to_expr(v).map(|e| (k.clone(), e)))
                .collect();
            Expr::object(props?)
        }
        Value::Function(_) | Value::Regex(_) => return None,
    })
}

/// Numbers with no literal spelling become the global identifiers JS
/// itself uses; negatives become unary minus over a positive literal.
pub fn num_to_expr(n: f64) -> Expr {
    if n.is_nan() {
        return Expr::ident("NaN");
    }
    if n.is_infinite() {
        let inf = Expr::ident("Infinity");
        return if n < 0.0 {
            Expr::unary(UnaryOp::Minus, inf)
        } else {
            inf
        };
    }
    if n < 0.0 || (n == 0.0 && n.is_sign_negative()) {
        Expr::unary(UnaryOp::Minus, Expr::num(-n))
    } else {
        Expr::num(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_core::ast::BinaryOp;

    #[test]
    fn literals_fold_and_identifiers_poison() {
        let concat = Expr::binary(BinaryOp::Add, Expr::str("he"), Expr::str("llo"));
        assert!(can_evaluate(&concat));
        assert_eq!(evaluate(&concat).unwrap().to_js_string(), "hello");

        let tainted = Expr::binary(BinaryOp::Add, Expr::str("he"), Expr::ident("x"));
        assert!(!can_evaluate(&tainted));
        assert_eq!(evaluate(&tainted), None);
    }

    #[test]
    fn logical_folding_short_circuits() {
        let or = Expr::logical(
            djs_core::ast::LogicalOp::Or,
            Expr::str("kept"),
            Expr::ident("never"),
        );
        // The right side is poisoned but unreachable.
        assert_eq!(evaluate(&or).unwrap().to_js_string(), "kept");
    }

    #[test]
    fn negative_numbers_render_as_unary_minus() {
        let expr = value_to_expr(&Value::Num(-3.0)).unwrap();
        match expr {
            Expr::Unary(unary) => {
                assert_eq!(unary.op, UnaryOp::Minus);
                assert_eq!(unary.arg.as_num_lit(), Some(3.0));
            }
            other => panic!("expected unary minus, got {other:?}"),
        }
    }

    #[test]
    fn calls_are_meaningful_and_literals_are_not() {
        assert!(is_meaningful(&Expr::call(Expr::ident("f"), vec![])));
        assert!(!is_meaningful(&Expr::binary(
            BinaryOp::Add,
            Expr::ident("a"),
            Expr::ident("b")
        )));
    }
}
