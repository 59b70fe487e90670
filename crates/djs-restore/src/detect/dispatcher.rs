//! Operator-dispatcher objects.
//!
//! The commercial obfuscator routes expressions through lookup objects
//! whose keys are five-letter nonsense strings:
//!
//! ```text
//! var _0x21 = {
//!     'AzTvH': function (a, b) { return a + b; },
//!     'kWqPe': function (f, x) { return f(x); },
//!     'GdJrT': 'target'
//! };
//! ... _0x21['AzTvH'](c, d) ... _0x21['GdJrT'] ...
//! ```
//!
//! Each function prop is a one-expression template: the call site is
//! rebuilt from the template's node kind and the site's own arguments.
//! Value props inline as literals. A site whose template cannot be
//! classified is reported and left alone.

use std::collections::HashMap;

use djs_core::ast::{
    transform_program, BinaryOp, CallExpr, Expr, ExprRewrite, LogicalOp, Program, Stmt, Transform,
};
use djs_core::diagnostics::Diagnostic;
use djs_core::tracing::debug;

use super::shape;
use crate::walk::for_each_stmt_list;

#[derive(Clone)]
enum Template {
    Value(Expr),
    Binary(BinaryOp),
    Logical(LogicalOp),
    Call,
    Opaque,
}

/// Inline every dispatcher site, then drop the dispatcher declarations
/// that no longer have any references. Returns the number of rewritten
/// sites.
pub fn restore(program: &mut Program, diagnostics: &mut Vec<Diagnostic>) -> usize {
    let tables = collect(program);
    if tables.is_empty() {
        return 0;
    }

    let mut rewrite = Rewrite {
        tables: &tables,
        diagnostics,
        rewritten: 0,
    };
    transform_program(program, &mut rewrite);
    let rewritten = rewrite.rewritten;

    for name in tables.keys() {
        let uses = crate::walk::count_ident(program, name);
        if uses == 0 {
            remove_decl(program, name);
        } else {
            diagnostics.push(Diagnostic::warning(format!(
                "dispatcher `{name}` still referenced {uses} time(s), keeping its declaration"
            )));
        }
    }
    rewritten
}

fn collect(program: &mut Program) -> HashMap<String, HashMap<String, Template>> {
    let mut tables = HashMap::new();
    for_each_stmt_list(program, &mut |stmts| {
        for stmt in stmts.iter() {
            let Some((name, Some(Expr::Object(object)))) = shape::single_decl(stmt) else {
                continue;
            };
            if object.props.is_empty() {
                continue;
            }
            let keys_match = object.props.iter().all(|p| is_dispatcher_key(&p.key.name()));
            if !keys_match {
                continue;
            }
            let props = object
                .props
                .iter()
                .map(|p| (p.key.name(), classify(&p.value)))
                .collect();
            debug!(name = %name.name, "registered dispatcher object");
            tables.insert(name.name.clone(), props);
        }
    });
    tables
}

/// Five ASCII letters, either case.
fn is_dispatcher_key(key: &str) -> bool {
    key.len() == 5 && key.chars().all(|c| c.is_ascii_alphabetic())
}

fn classify(value: &Expr) -> Template {
    if value.is_literal() {
        return Template::Value(value.clone());
    }
    let Expr::Function(func) = value else {
        return Template::Opaque;
    };
    let [Stmt::Return(ret)] = func.function.body.stmts.as_slice() else {
        return Template::Opaque;
    };
    match ret.arg.as_ref() {
        Some(Expr::Binary(binary)) => Template::Binary(binary.op),
        Some(Expr::Logical(logical)) => Template::Logical(logical.op),
        Some(Expr::Call(_)) => Template::Call,
        _ => Template::Opaque,
    }
}

struct Rewrite<'a> {
    tables: &'a HashMap<String, HashMap<String, Template>>,
    diagnostics: &'a mut Vec<Diagnostic>,
    rewritten: usize,
}

impl Rewrite<'_> {
    fn template(&self, object: &Expr, key: &str) -> Option<Template> {
        self.tables.get(object.ident_name()?)?.get(key).cloned()
    }

    fn warn(&mut self, span: djs_core::span::Span, message: String) {
        self.diagnostics.push(
            Diagnostic::warning(message)
                .with_code("dispatcher")
                .with_span(span),
        );
    }
}

impl Transform for Rewrite<'_> {
    // Call sites must rewrite before the walk reaches the callee member,
    // otherwise the member-read arm destroys the callee first.
    fn enter_expr(&mut self, expr: &mut Expr) -> ExprRewrite {
        let span = expr.span();
        match expr {
            Expr::Call(call) => {
                let Expr::Member(member) = call.callee.as_ref() else {
                    return ExprRewrite::Keep;
                };
                let Some(key) = member.property.static_name() else {
                    return ExprRewrite::Keep;
                };
                let key = key.to_string();
                match self.template(&member.object, &key) {
                    Some(Template::Binary(op)) => {
                        let [left, right] = call.args.as_slice() else {
                            let n = call.args.len();
                            self.warn(span, format!("dispatcher op `{key}` called with {n} args, expected 2"));
                            return ExprRewrite::Keep;
                        };
                        self.rewritten += 1;
                        ExprRewrite::Replace(Expr::binary(op, left.clone(), right.clone()))
                    }
                    Some(Template::Logical(op)) => {
                        let [left, right] = call.args.as_slice() else {
                            let n = call.args.len();
                            self.warn(span, format!("dispatcher op `{key}` called with {n} args, expected 2"));
                            return ExprRewrite::Keep;
                        };
                        self.rewritten += 1;
                        ExprRewrite::Replace(Expr::logical(op, left.clone(), right.clone()))
                    }
                    Some(Template::Call) => {
                        let Some((callee, rest)) = call.args.split_first() else {
                            self.warn(span, format!("dispatcher forwarder `{key}` called with no callee"));
                            return ExprRewrite::Keep;
                        };
                        self.rewritten += 1;
                        ExprRewrite::Replace(Expr::Call(CallExpr {
                            callee: Box::new(callee.clone()),
                            args: rest.to_vec(),
                            span: call.span,
                        }))
                    }
                    Some(Template::Value(_)) => {
                        self.warn(span, format!("dispatcher value prop `{key}` used as a call"));
                        ExprRewrite::Keep
                    }
                    Some(Template::Opaque) => {
                        self.warn(span, format!("dispatcher prop `{key}` has an unrecognized template"));
                        ExprRewrite::Keep
                    }
                    None => ExprRewrite::Keep,
                }
            }
            Expr::Member(member) => {
                let Some(key) = member.property.static_name() else {
                    return ExprRewrite::Keep;
                };
                let key = key.to_string();
                match self.template(&member.object, &key) {
                    Some(Template::Value(value)) => {
                        self.rewritten += 1;
                        ExprRewrite::Replace(value)
                    }
                    Some(_) => {
                        self.warn(span, format!("dispatcher function prop `{key}` read without a call"));
                        ExprRewrite::Keep
                    }
                    None => ExprRewrite::Keep,
                }
            }
            _ => ExprRewrite::Keep,
        }
    }
}

fn remove_decl(program: &mut Program, name: &str) {
    for_each_stmt_list(program, &mut |stmts| {
        stmts.retain(|stmt| match shape::single_decl(stmt) {
            Some((ident, _)) => ident.name != name,
            None => true,
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::{parse, print};

    #[test]
    fn call_sites_rebuild_from_templates() {
        let mut program = parse(
            "var _0x21 = {\n\
                 'AzTvH': function (a, b) { return a + b; },\n\
                 'kWqPe': function (f, x) { return f(x); },\n\
                 'GdJrT': 'hello'\n\
             };\n\
             use(_0x21['AzTvH'](c, d), _0x21['kWqPe'](g, e), _0x21['GdJrT']);",
        )
        .unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 3);
        assert!(diagnostics.is_empty());
        assert_eq!(print(&program).unwrap(), "use(c + d, g(e), 'hello');\n");
    }

    #[test]
    fn escaping_dispatcher_is_kept_and_reported() {
        let mut program = parse(
            "var _0x21 = { 'AzTvH': function (a, b) { return a < b; } };\n\
             if (_0x21['AzTvH'](x, y)) leak(_0x21);",
        )
        .unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 1);
        assert_eq!(diagnostics.len(), 1);
        // The object escapes through leak(); its declaration survives.
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn six_letter_keys_are_not_dispatchers() {
        let source = "var cfg = { 'option': 1 };\nuse(cfg['option']);";
        let mut program = parse(source).unwrap();
        let mut diagnostics = Vec::new();
        assert_eq!(restore(&mut program, &mut diagnostics), 0);
        assert_eq!(program.body.len(), 2);
    }
}
