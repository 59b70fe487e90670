//! Recipe orchestration.
//!
//! A recipe is a fixed composition of passes for one obfuscator family.
//! Every stage is best-effort: detectors that find nothing extract
//! nothing, executor failures leave the call form intact, and everything
//! worth telling the caller lands in the returned diagnostics.

use djs_core::ast::{transform_program, Expr, ExprRewrite, Program, Stmt, Transform};
use djs_core::diagnostics::Diagnostic;
use djs_core::tracing::debug;

use crate::const_eval;
use crate::detect::{decrypt, dispatcher, marker, objects, rotation, self_defending, string_table};
use crate::flow::{control_walk, flag_walk, logical_seq, switch_dispatch};
use crate::sandbox::Sandbox;
use crate::{rename, simplify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipe {
    /// Simplifier only; no family-specific passes.
    Generic,
    /// obfuscator.io output (commercial obfuscator).
    ObfuscatorIo,
    /// jsjiami.com v6 packer output.
    JsjiamiV6,
    /// jsjiami.com v7 packer output.
    JsjiamiV7,
    /// for/switch control-flow flattening only.
    FlattenSwitch,
    /// while/switch dispatch flattening only.
    FlattenWhileSwitch,
    /// Statement-position logical/sequence chains only.
    FlattenLogicalSequence,
    /// for/if-else flag flattening only.
    FlattenIfElse,
}

impl Recipe {
    pub const ALL: [Recipe; 8] = [
        Recipe::Generic,
        Recipe::ObfuscatorIo,
        Recipe::JsjiamiV6,
        Recipe::JsjiamiV7,
        Recipe::FlattenSwitch,
        Recipe::FlattenWhileSwitch,
        Recipe::FlattenLogicalSequence,
        Recipe::FlattenIfElse,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Recipe::Generic => "generic",
            Recipe::ObfuscatorIo => "obfuscator-io",
            Recipe::JsjiamiV6 => "jsjiami-v6",
            Recipe::JsjiamiV7 => "jsjiami-v7",
            Recipe::FlattenSwitch => "flatten-switch",
            Recipe::FlattenWhileSwitch => "flatten-while-switch",
            Recipe::FlattenLogicalSequence => "flatten-logical-sequence",
            Recipe::FlattenIfElse => "flatten-if-else",
        }
    }

    pub fn from_name(name: &str) -> Option<Recipe> {
        match name {
            "generic" => Some(Recipe::Generic),
            "obfuscator-io" | "commercial-obfuscator" => Some(Recipe::ObfuscatorIo),
            "jsjiami-v6" | "packer-v6" => Some(Recipe::JsjiamiV6),
            "jsjiami-v7" | "packer-v7" => Some(Recipe::JsjiamiV7),
            "flatten-switch" => Some(Recipe::FlattenSwitch),
            "flatten-while-switch" => Some(Recipe::FlattenWhileSwitch),
            "flatten-logical-sequence" => Some(Recipe::FlattenLogicalSequence),
            "flatten-if-else" => Some(Recipe::FlattenIfElse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    /// Rename mangled identifiers to positional names at the end.
    pub rename: bool,
    /// Restrict renaming to `_0x`/`__Ox` identifiers.
    pub hexadecimal_only: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rename: false,
            hexadecimal_only: true,
        }
    }
}

/// Run one recipe over the tree. Always returns; the tree holds the
/// best-effort result and the diagnostics whatever could not be restored.
pub fn deobfuscate(program: &mut Program, recipe: Recipe, options: &Options) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    debug!(recipe = recipe.name(), "starting recipe");
    simplify::simplify(program);
    match recipe {
        Recipe::Generic => {}
        Recipe::ObfuscatorIo => {
            dismantle_commercial(program, &mut diagnostics);
            simplify::simplify(program);
            objects::restore(program);
            dispatcher::restore(program, &mut diagnostics);
            simplify::simplify(program);
            self_defending::remove(program, &mut diagnostics);
            switch_dispatch::restore(program, &mut diagnostics);
            simplify::statementize(program);
            simplify::simplify(program);
        }
        Recipe::JsjiamiV6 => {
            dismantle_packer_v6(program, &mut diagnostics);
            simplify::simplify(program);
            dispatcher::restore(program, &mut diagnostics);
            simplify::simplify(program);
            self_defending::remove(program, &mut diagnostics);
            switch_dispatch::restore(program, &mut diagnostics);
            simplify::simplify(program);
        }
        Recipe::JsjiamiV7 => {
            dismantle_packer_v7(program, &mut diagnostics);
            simplify::simplify(program);
            dispatcher::restore(program, &mut diagnostics);
            simplify::simplify(program);
            self_defending::remove(program, &mut diagnostics);
            switch_dispatch::restore(program, &mut diagnostics);
            simplify::simplify(program);
        }
        Recipe::FlattenSwitch => {
            control_walk::restore(program, &mut diagnostics);
            simplify::simplify(program);
        }
        Recipe::FlattenWhileSwitch => {
            switch_dispatch::restore(program, &mut diagnostics);
            simplify::simplify(program);
        }
        Recipe::FlattenLogicalSequence => {
            logical_seq::restore(program, &mut diagnostics);
            simplify::simplify(program);
        }
        Recipe::FlattenIfElse => {
            flag_walk::restore(program, &mut diagnostics);
            simplify::simplify(program);
        }
    }
    if options.rename {
        rename::rename_mangled(program, options.hexadecimal_only);
    }
    diagnostics
}

/// String table, decrypt functions, proxies, and rotation of the
/// commercial obfuscator; decrypt call sites are folded to literals.
fn dismantle_commercial(program: &mut Program, diagnostics: &mut Vec<Diagnostic>) {
    let Some(table) = string_table::extract(program) else {
        return;
    };
    let mut decrypt = decrypt::extract_callers(program, &table.name);
    let proxies = decrypt::extract_proxies(program, &mut decrypt.names);
    let bootstrap = rotation::extract_commercial(program, &table.name);

    let mut fragments = vec![table.decl];
    fragments.extend(decrypt.decls);
    fragments.extend(proxies);
    run_fragments(program, fragments, bootstrap, &decrypt.names, diagnostics);
}

fn dismantle_packer_v6(program: &mut Program, diagnostics: &mut Vec<Diagnostic>) {
    let Some(table) = marker::extract_v6(program) else {
        return;
    };
    let mut decrypt = decrypt::extract_packer(program, &table.array_name);
    let proxies = decrypt::extract_proxies(program, &mut decrypt.names);
    let bootstrap = rotation::extract_packer_v6(program, &table.array_name);

    let mut fragments = table.decls;
    fragments.extend(decrypt.decls);
    fragments.extend(proxies);
    run_fragments(program, fragments, bootstrap, &decrypt.names, diagnostics);
}

fn dismantle_packer_v7(program: &mut Program, diagnostics: &mut Vec<Diagnostic>) {
    let markers = marker::extract_v7(program);
    let Some(table) = string_table::extract(program) else {
        // Markers came out of the tree; losing them is harmless, they
        // only feed the decrypt checksum.
        return;
    };
    let mut decrypt = decrypt::extract_callers(program, &table.name);
    let proxies = decrypt::extract_proxies(program, &mut decrypt.names);
    let bootstrap = rotation::extract_packer_v7(program, &table.name);

    let mut fragments = markers;
    fragments.push(table.decl);
    fragments.extend(decrypt.decls);
    fragments.extend(proxies);
    run_fragments(program, fragments, bootstrap, &decrypt.names, diagnostics);
}

/// Load the extracted declarations into a fresh sandbox, run the rotation
/// bootstrap, and fold every resolvable decrypt call site.
fn run_fragments(
    program: &mut Program,
    fragments: Vec<Stmt>,
    bootstrap: Option<Stmt>,
    names: &[String],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut sandbox = Sandbox::new();
    if let Err(err) = sandbox.load(&fragments) {
        diagnostics.push(
            Diagnostic::error(format!("loading extracted declarations failed: {err}"))
                .with_code("sandbox"),
        );
        return;
    }
    if let Some(bootstrap) = bootstrap {
        if let Err(err) = sandbox.exec(&bootstrap) {
            diagnostics.push(
                Diagnostic::warning(format!("table rotation failed: {err}")).with_code("sandbox"),
            );
        }
    }
    let mut resolve = ResolveCalls {
        sandbox: &mut sandbox,
        names,
        diagnostics,
        resolved: 0,
    };
    transform_program(program, &mut resolve);
    debug!(resolved = resolve.resolved, "folded decrypt call sites");
}

struct ResolveCalls<'a> {
    sandbox: &'a mut Sandbox,
    names: &'a [String],
    diagnostics: &'a mut Vec<Diagnostic>,
    resolved: usize,
}

impl Transform for ResolveCalls<'_> {
    // exit so nested decrypt calls fold innermost-first.
    fn exit_expr(&mut self, expr: &mut Expr) -> ExprRewrite {
        let Expr::Call(call) = expr else {
            return ExprRewrite::Keep;
        };
        let Some(callee) = call.callee.ident_name() else {
            return ExprRewrite::Keep;
        };
        if !self.names.iter().any(|n| n == callee) {
            return ExprRewrite::Keep;
        }
        if !call.args.iter().all(const_eval::can_evaluate) {
            return ExprRewrite::Keep;
        }
        let span = call.span;
        match self.sandbox.eval(expr) {
            Ok(value) => match const_eval::value_to_expr(&value) {
                Some(literal) => {
                    self.resolved += 1;
                    ExprRewrite::Replace(literal)
                }
                None => {
                    self.diagnostics.push(
                        Diagnostic::warning("decrypt call produced a non-literal value")
                            .with_code("sandbox")
                            .with_span(span),
                    );
                    ExprRewrite::Keep
                }
            },
            Err(err) => {
                self.diagnostics.push(
                    Diagnostic::warning(format!("decrypt call failed: {err}"))
                        .with_code("sandbox")
                        .with_span(span),
                );
                ExprRewrite::Keep
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djs_frontend::{parse, print};

    #[test]
    fn recipe_names_round_trip() {
        for recipe in Recipe::ALL {
            assert_eq!(Recipe::from_name(recipe.name()), Some(recipe));
        }
        assert_eq!(
            Recipe::from_name("commercial-obfuscator"),
            Some(Recipe::ObfuscatorIo)
        );
        assert_eq!(Recipe::from_name("packer-v7"), Some(Recipe::JsjiamiV7));
        assert_eq!(Recipe::from_name("nope"), None);
    }

    #[test]
    fn commercial_recipe_folds_decrypt_calls() {
        let source = "\
function _0x59e3() {
    var _0x434c = ['first', 'second'];
    _0x59e3 = function () {
        return _0x434c;
    };
    return _0x59e3();
}
function _0x1c(_0x2a) {
    var _0x3b = _0x59e3();
    _0x1c = function (_0x4d) {
        return _0x3b[_0x4d];
    };
    return _0x1c(_0x2a);
}
log(_0x1c(1), _0x1c(0));
";
        let mut program = parse(source).unwrap();
        let diagnostics = deobfuscate(&mut program, Recipe::ObfuscatorIo, &Options::default());
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(print(&program).unwrap(), "log(\"second\", \"first\");\n");
    }

    #[test]
    fn clean_input_is_untouched_beyond_requoting() {
        let source = "function add(a, b) {\n    return a + b;\n}\nadd(1, 2);\n";
        let mut program = parse(source).unwrap();
        let diagnostics = deobfuscate(&mut program, Recipe::ObfuscatorIo, &Options::default());
        assert!(diagnostics.is_empty());
        assert_eq!(print(&program).unwrap(), source);
    }
}
