//! Positional renaming of mangled bindings.
//!
//! Obfuscated identifiers (`_0x4f2a`, `__Ox1b3c`) become positional names
//! with a per-category counter: `v0, v1, ...` for variables, `f0, ...` for
//! functions, `p0, ...` for parameters. Numbering follows the crawl's
//! deterministic scope order, so the same input always renames the same
//! way.

use std::collections::HashSet;

use djs_core::ast::Program;
use djs_core::scope::{RenameCategory, RenamePlan, ScopeIndex};
use djs_core::tracing::debug;

/// Rename mangled bindings in place. With `hexadecimal_only` set (the
/// default) only names containing `_0x` or `__Ox` are touched; without it
/// every binding gets a positional name.
pub fn rename_mangled(program: &mut Program, hexadecimal_only: bool) {
    let index = ScopeIndex::crawl(program);

    // Fresh-name checks run against the full set of binding names rather
    // than per-scope liveness: positional names never collide with each
    // other (one counter per category) so only pre-existing names matter.
    let mut taken: HashSet<String> = index
        .scopes()
        .flat_map(|(_, scope)| scope.bindings().iter().map(|b| b.name.clone()))
        .collect();

    let mut plan = RenamePlan::default();
    let mut counters = [0usize; 3];
    let mut renamed = 0usize;

    for (scope_id, scope) in index.scopes() {
        for binding in scope.bindings() {
            if hexadecimal_only && !is_mangled(&binding.name) {
                continue;
            }
            let category = binding.kind.category();
            let fresh = loop {
                let candidate = positional_name(category, &mut counters);
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            taken.insert(fresh.clone());
            plan.insert(scope_id, &binding.name, &fresh);
            renamed += 1;
        }
    }

    if plan.is_empty() {
        return;
    }
    debug!(renamed, "renaming mangled bindings");
    index.apply_renames(program, &plan);
}

fn is_mangled(name: &str) -> bool {
    name.contains("_0x") || name.contains("__Ox")
}

fn positional_name(category: RenameCategory, counters: &mut [usize; 3]) -> String {
    let (prefix, slot) = match category {
        RenameCategory::Variable => ("v", 0),
        RenameCategory::Function => ("f", 1),
        RenameCategory::Parameter => ("p", 2),
    };
    let n = counters[slot];
    counters[slot] += 1;
    format!("{prefix}{n}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::{parse, print};
    use pretty_assertions::assert_eq;

    #[test]
    fn mangled_names_get_positional_replacements() {
        let mut program = parse(
            "function _0x12ab(_0x34cd) { var _0x56ef = _0x34cd + 1; return _0x56ef; }\n\
             _0x12ab(1);",
        )
        .unwrap();
        rename_mangled(&mut program, true);
        assert_eq!(
            print(&program).unwrap(),
            "function f0(p0) {\n    var v0 = p0 + 1;\n    return v0;\n}\nf0(1);\n"
        );
    }

    #[test]
    fn plain_names_survive_in_hexadecimal_only_mode() {
        let mut program = parse("var keep = 1; var _0xdead = keep;").unwrap();
        rename_mangled(&mut program, true);
        assert_eq!(
            print(&program).unwrap(),
            "var keep = 1;\nvar v0 = keep;\n"
        );
    }

    #[test]
    fn counters_skip_names_already_in_use() {
        let mut program = parse("var v0 = 1; var _0xa = 2; var _0xb = 3;").unwrap();
        rename_mangled(&mut program, true);
        assert_eq!(
            print(&program).unwrap(),
            "var v0 = 1;\nvar v1 = 2;\nvar v2 = 3;\n"
        );
    }

    #[test]
    fn full_rename_covers_every_binding() {
        let mut program = parse("function go(n) { return n; }").unwrap();
        rename_mangled(&mut program, false);
        assert_eq!(
            print(&program).unwrap(),
            "function f0(p0) {\n    return p0;\n}\n"
        );
    }
}
