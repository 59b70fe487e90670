//! Parse and print boundary between source text and the restoration tree.
//!
//! Parsing runs swc in script mode and lowers the swc tree into the closed
//! subset `djs-core` models; anything outside the subset is a hard
//! [`djs_core::Error::Unsupported`]. Printing raises the core tree back
//! into swc nodes and lets the swc code generator handle layout, quoting,
//! and parenthesization.

mod parser;
mod printer;

pub use parser::parse;
pub use printer::{print, JsPrinter};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(source: &str) -> String {
        let program = parse(source).unwrap();
        print(&program).unwrap()
    }

    #[test]
    fn parse_then_print_preserves_structure() {
        let out = roundtrip("var a = 1 + 2;\nfunction f(x) { return x * a; }\nf(3);");
        assert!(out.contains("var a = 1 + 2"));
        assert!(out.contains("function f(x)"));
        assert!(out.contains("return x * a"));
    }

    #[test]
    fn string_raw_text_survives_until_cleared() {
        let program = parse("var s = '\\x48\\x69';").unwrap();
        let out = print(&program).unwrap();
        // Untouched literals keep their original spelling.
        assert!(out.contains("'\\x48\\x69'"), "got: {out}");
    }

    #[test]
    fn cleared_raw_prints_canonically() {
        let mut program = parse("var s = '\\x48\\x69';").unwrap();
        if let djs_core::ast::Stmt::VarDecl(decl) = &mut program.body[0] {
            if let Some(djs_core::ast::Expr::Str(s)) = &mut decl.decls[0].init {
                s.raw = None;
            }
        }
        let out = print(&program).unwrap();
        assert!(out.contains("\"Hi\""), "got: {out}");
    }

    #[test]
    fn hex_numbers_keep_raw_until_cleared() {
        let out = roundtrip("var n = 0x1f4;");
        assert!(out.contains("0x1f4"), "got: {out}");
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(parse("var = ;").is_err());
    }

    #[test]
    fn module_syntax_is_out_of_subset() {
        assert!(parse("export default 1;").is_err());
    }

    #[test]
    fn printer_emits_computed_and_static_members() {
        let out = roundtrip("a['b']['c'] = a.d;");
        assert_eq!(out.trim(), "a['b']['c'] = a.d;");
    }
}
