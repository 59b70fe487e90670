//! Split object literals.
//!
//! The obfuscator breaks object literals into an empty declaration plus a
//! run of property assignments:
//!
//! ```text
//! var o = {};
//! o.host = 'example.com';
//! o.port = 8080;
//! connect(o);          // => connect({ host: 'example.com', port: 8080 });
//! ```
//!
//! The rebuild is only safe when the variable has exactly one use besides
//! the property writes, so the literal can move there without changing
//! evaluation order. Anything else is left alone.

use djs_core::ast::{
    transform_program, Expr, ExprRewrite, ObjectLit, Program, PropKey, Property, Stmt, StrLit,
    Transform,
};
use djs_core::span::Span;
use djs_core::tracing::debug;

use super::shape;
use crate::walk::{count_ident, for_each_stmt_list};

const MAX_PASSES: usize = 32;

/// Reassemble split literals; returns how many objects were rebuilt.
pub fn restore(program: &mut Program) -> usize {
    let mut rebuilt = 0;
    for _ in 0..MAX_PASSES {
        if !restore_one(program) {
            break;
        }
        rebuilt += 1;
    }
    rebuilt
}

struct Candidate {
    name: String,
    /// Declaration plus property assignments, removed by equality.
    stmts: Vec<Stmt>,
    props: Vec<(String, Expr)>,
}

fn restore_one(program: &mut Program) -> bool {
    for candidate in find_candidates(program) {
        // Every property write mentions the name once; exactly one
        // further use may exist, the one that receives the literal.
        if count_ident(program, &candidate.name) != candidate.props.len() + 1 {
            continue;
        }
        debug!(name = %candidate.name, props = candidate.props.len(), "rebuilt split object literal");
        remove_stmts(program, candidate.stmts);
        let literal = Expr::Object(ObjectLit {
            props: candidate
                .props
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
        });
        let mut replace = ReplaceIdent {
            name: candidate.name,
            replacement: Some(literal),
        };
        transform_program(program, &mut replace);
        return true;
    }
    false
}

fn find_candidates(program: &mut Program) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for_each_stmt_list(program, &mut |stmts| {
        for (i, stmt) in stmts.iter().enumerate() {
            let Some((name, Some(Expr::Object(seed)))) = shape::single_decl(stmt) else {
                continue;
            };
            let name = name.name.clone();
            let mut props: Vec<(String, Expr)> = seed
                .props
                .iter()
                .map(|p| (p.key.name(), p.value.clone()))
                .collect();
            let mut taken = vec![stmt.clone()];
            for follower in &stmts[i + 1..] {
                let Some((key, value)) = property_write(follower, &name) else {
                    break;
                };
                props.push((key.to_string(), value.clone()));
                taken.push(follower.clone());
            }
            // An empty declaration with no writes is not a split literal.
            if taken.len() > 1 {
                candidates.push(Candidate {
                    name,
                    stmts: taken,
                    props,
                });
            }
        }
    });
    candidates
}

/// `name.key = value;` with a static key.
fn property_write<'a>(stmt: &'a Stmt, name: &str) -> Option<(&'a str, &'a Expr)> {
    let Expr::Assign(assign) = stmt.as_expr()? else {
        return None;
    };
    if !assign.op.is_plain() {
        return None;
    }
    let Expr::Member(member) = assign.target.as_ref() else {
        return None;
    };
    if member.object.ident_name() != Some(name) {
        return None;
    }
    Some((member.property.static_name()?, &assign.value))
}

fn remove_stmts(program: &mut Program, mut pending: Vec<Stmt>) {
    for_each_stmt_list(program, &mut |stmts| {
        stmts.retain(|stmt| match pending.iter().position(|p| p == stmt) {
            Some(at) => {
                pending.remove(at);
                false
            }
            None => true,
        });
    });
}

struct ReplaceIdent {
    name: String,
    replacement: Option<Expr>,
}

impl Transform for ReplaceIdent {
    fn enter_expr(&mut self, expr: &mut Expr) -> ExprRewrite {
        if expr.ident_name() == Some(&self.name) {
            if let Some(literal) = self.replacement.take() {
                return ExprRewrite::Replace(literal);
            }
        }
        ExprRewrite::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::{parse, print};

    #[test]
    fn single_use_object_is_rebuilt() {
        let mut program = parse(
            "var o = {};\n\
             o.host = 'example.com';\n\
             o.port = 8080;\n\
             connect(o);",
        )
        .unwrap();
        assert_eq!(restore(&mut program), 1);
        assert_eq!(
            print(&program).unwrap(),
            "connect({\n    \"host\": 'example.com',\n    \"port\": 8080\n});\n"
        );
    }

    #[test]
    fn multiple_uses_block_the_rebuild() {
        let source = "var o = {};\no.a = 1;\nf(o);\ng(o);";
        let mut program = parse(source).unwrap();
        assert_eq!(restore(&mut program), 0);
        assert_eq!(program.body.len(), 4);
    }

    #[test]
    fn self_referencing_write_blocks_the_rebuild() {
        let source = "var o = {};\no.a = 1;\no.b = o.a;\nf(o);";
        let mut program = parse(source).unwrap();
        // o.b's value mentions o, so the use count is off by one.
        assert_eq!(restore(&mut program), 0);
    }
}
