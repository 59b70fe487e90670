//! Lexical scope index.
//!
//! The index is rebuilt from scratch with [`ScopeIndex::crawl`] whenever a
//! pass needs scope information after structural mutation; nothing here is
//! incrementally maintained. Scope ids are assigned in pre-order during
//! the crawl, and every walk in this module visits the tree in exactly the
//! same order, so a later walk resolves identifiers to the same scopes the
//! crawl did.

use crate::ast::*;
use crate::span::Span;

pub type ScopeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Param,
    Catch,
}

impl BindingKind {
    /// The rename category: plain variables, functions, parameters.
    pub fn category(&self) -> RenameCategory {
        match self {
            BindingKind::Var | BindingKind::Let | BindingKind::Const | BindingKind::Catch => {
                RenameCategory::Variable
            }
            BindingKind::Function => RenameCategory::Function,
            BindingKind::Param => RenameCategory::Parameter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameCategory {
    Variable,
    Function,
    Parameter,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    pub span: Span,
    /// Read sites (excluding the declaration itself).
    pub reads: usize,
    /// Write sites beyond the initializing declaration.
    pub writes: usize,
}

impl Binding {
    pub fn is_constant(&self) -> bool {
        self.writes == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Function,
    Block,
    Catch,
}

#[derive(Debug)]
pub struct ScopeData {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    bindings: Vec<Binding>,
}

impl ScopeData {
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    fn binding_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.bindings.iter_mut().find(|b| b.name == name)
    }
}

#[derive(Debug)]
pub struct ScopeIndex {
    scopes: Vec<ScopeData>,
}

impl ScopeIndex {
    /// Build the index for the current shape of the tree.
    pub fn crawl(program: &Program) -> ScopeIndex {
        let mut index = ScopeIndex { scopes: Vec::new() };

        // Phase 1: create scopes and declarations.
        {
            let mut declare = DeclarePhase { index: &mut index };
            let mut driver = ScopeWalk::new(&mut declare);
            driver.program(program);
        }
        // Phase 2: resolve reads and writes against the complete tables.
        {
            let mut resolve = ResolvePhase { index: &mut index };
            let mut driver = ScopeWalk::new(&mut resolve);
            driver.program(program);
        }
        index
    }

    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &ScopeData)> {
        self.scopes.iter().enumerate()
    }

    pub fn scope(&self, id: ScopeId) -> &ScopeData {
        &self.scopes[id]
    }

    /// Resolve `name` from `scope` outward.
    pub fn lookup(&self, mut scope: ScopeId, name: &str) -> Option<(ScopeId, &Binding)> {
        loop {
            if let Some(binding) = self.scopes[scope].binding(name) {
                return Some((scope, binding));
            }
            scope = self.scopes[scope].parent?;
        }
    }

    /// True when `name` is bound in `scope`, any enclosing scope, or any
    /// scope nested below `scope` — i.e. renaming something to `name`
    /// could collide or change what an existing reference resolves to.
    pub fn is_name_taken(&self, scope: ScopeId, name: &str) -> bool {
        if self.lookup(scope, name).is_some() {
            return true;
        }
        self.scopes
            .iter()
            .enumerate()
            .any(|(id, data)| self.is_descendant(id, scope) && data.binding(name).is_some())
    }

    fn is_descendant(&self, mut id: ScopeId, ancestor: ScopeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.scopes[id].parent {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    /// Atomically rename one binding: its declaration and every read and
    /// write site. Fails if `old` is not bound in `scope` or if `new`
    /// is live anywhere it could collide; the tree is untouched on error.
    pub fn rename(
        &self,
        program: &mut Program,
        scope: ScopeId,
        old: &str,
        new: &str,
    ) -> crate::Result<()> {
        ensure!(
            self.scopes[scope].binding(old).is_some(),
            "no binding named `{old}` in scope {scope}"
        );
        if self.is_name_taken(scope, new) {
            bail!("cannot rename `{old}` to `{new}`: name already in use");
        }
        let mut plan = RenamePlan::default();
        plan.insert(scope, old, new);
        self.apply_renames(program, &plan);
        Ok(())
    }

    /// Apply a batch of renames in one walk. The caller guarantees the new
    /// names are fresh (see [`ScopeIndex::is_name_taken`]); the positional
    /// renamer guarantees it by construction with per-category counters.
    pub fn apply_renames(&self, program: &mut Program, plan: &RenamePlan) {
        let mut apply = ApplyPhase { index: self, plan };
        let mut driver = ScopeWalk::new(&mut apply);
        driver.program_mut(program);
    }
}

#[derive(Debug, Default)]
pub struct RenamePlan {
    renames: std::collections::HashMap<(ScopeId, String), String>,
}

impl RenamePlan {
    pub fn insert(&mut self, scope: ScopeId, old: &str, new: &str) {
        self.renames
            .insert((scope, old.to_string()), new.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    fn get(&self, scope: ScopeId, name: &str) -> Option<&str> {
        self.renames
            .get(&(scope, name.to_string()))
            .map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum IdentUse {
    Read,
    Write,
    ReadWrite,
}

/// Callbacks invoked by the shared scope walk. Mutable access to idents is
/// only exercised by the rename phase; the analysis phases leave them be.
trait ScopePhase {
    fn open_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>, next_id: ScopeId);
    fn declare(&mut self, scope_stack: &[ScopeId], ident: &mut Ident, kind: BindingKind);
    fn reference(&mut self, scope_stack: &[ScopeId], ident: &mut Ident, usage: IdentUse);
}

struct DeclarePhase<'a> {
    index: &'a mut ScopeIndex,
}

impl ScopePhase for DeclarePhase<'_> {
    fn open_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>, next_id: ScopeId) {
        debug_assert_eq!(next_id, self.index.scopes.len());
        self.index.scopes.push(ScopeData {
            parent,
            kind,
            bindings: Vec::new(),
        });
    }

    fn declare(&mut self, scope_stack: &[ScopeId], ident: &mut Ident, kind: BindingKind) {
        let target = hoist_target(self.index, scope_stack, kind);
        let scope = &mut self.index.scopes[target];
        if let Some(existing) = scope.binding_mut(&ident.name) {
            // Redeclaration (`var` twice, function overriding var): keep
            // the first slot, upgrade the kind if a function wins.
            if kind == BindingKind::Function {
                existing.kind = kind;
            }
            return;
        }
        scope.bindings.push(Binding {
            name: ident.name.clone(),
            kind,
            span: ident.span,
            reads: 0,
            writes: 0,
        });
    }

    fn reference(&mut self, _: &[ScopeId], _: &mut Ident, _: IdentUse) {}
}

struct ResolvePhase<'a> {
    index: &'a mut ScopeIndex,
}

impl ScopePhase for ResolvePhase<'_> {
    fn open_scope(&mut self, _: ScopeKind, _: Option<ScopeId>, _: ScopeId) {}

    fn declare(&mut self, _: &[ScopeId], _: &mut Ident, _: BindingKind) {}

    fn reference(&mut self, scope_stack: &[ScopeId], ident: &mut Ident, usage: IdentUse) {
        let current = *scope_stack.last().unwrap();
        let Some((scope, _)) = self.index.lookup(current, &ident.name) else {
            return; // global / free identifier
        };
        let name = ident.name.clone();
        let binding = self.index.scopes[scope].binding_mut(&name).unwrap();
        match usage {
            IdentUse::Read => binding.reads += 1,
            IdentUse::Write => binding.writes += 1,
            IdentUse::ReadWrite => {
                binding.reads += 1;
                binding.writes += 1;
            }
        }
    }
}

struct ApplyPhase<'a> {
    index: &'a ScopeIndex,
    plan: &'a RenamePlan,
}

impl ApplyPhase<'_> {
    fn rewrite(&self, scope_stack: &[ScopeId], ident: &mut Ident, declared_in: Option<ScopeId>) {
        let scope = match declared_in {
            Some(scope) => scope,
            None => {
                let current = *scope_stack.last().unwrap();
                match self.index.lookup(current, &ident.name) {
                    Some((scope, _)) => scope,
                    None => return,
                }
            }
        };
        if let Some(new) = self.plan.get(scope, &ident.name) {
            ident.name = new.to_string();
        }
    }
}

impl ScopePhase for ApplyPhase<'_> {
    fn open_scope(&mut self, _: ScopeKind, _: Option<ScopeId>, _: ScopeId) {}

    fn declare(&mut self, scope_stack: &[ScopeId], ident: &mut Ident, kind: BindingKind) {
        let target = hoist_target(self.index, scope_stack, kind);
        self.rewrite(scope_stack, ident, Some(target));
    }

    fn reference(&mut self, scope_stack: &[ScopeId], ident: &mut Ident, _: IdentUse) {
        self.rewrite(scope_stack, ident, None);
    }
}

fn hoist_target(index: &ScopeIndex, scope_stack: &[ScopeId], kind: BindingKind) -> ScopeId {
    let current = *scope_stack.last().unwrap();
    match kind {
        BindingKind::Var | BindingKind::Function => {
            let mut id = current;
            loop {
                match index.scopes[id].kind {
                    ScopeKind::Program | ScopeKind::Function => return id,
                    _ => id = index.scopes[id].parent.expect("block scope without parent"),
                }
            }
        }
        _ => current,
    }
}

/// Shared walk: visits scopes, declarations, and identifier references in
/// a fixed pre-order.
struct ScopeWalk<'a, P: ScopePhase> {
    phase: &'a mut P,
    stack: Vec<ScopeId>,
    next_id: ScopeId,
}

impl<'a, P: ScopePhase> ScopeWalk<'a, P> {
    fn new(phase: &'a mut P) -> Self {
        Self {
            phase,
            stack: Vec::new(),
            next_id: 0,
        }
    }

    fn program(&mut self, program: &Program) {
        // The analysis phases never write through the `&mut Ident`s the
        // shared walk hands out; cloning the body keeps a single walk
        // implementation without unsafe.
        let mut body = program.body.clone();
        self.open(ScopeKind::Program);
        self.hoisted_decls(&mut body);
        self.stmt_list(&mut body);
        self.close();
    }

    fn program_mut(&mut self, program: &mut Program) {
        self.open(ScopeKind::Program);
        self.hoisted_decls(&mut program.body);
        self.stmt_list(&mut program.body);
        self.close();
    }

    fn open(&mut self, kind: ScopeKind) {
        let parent = self.stack.last().copied();
        let id = self.next_id;
        self.next_id += 1;
        self.phase.open_scope(kind, parent, id);
        self.stack.push(id);
    }

    fn close(&mut self) {
        self.stack.pop();
    }

    /// Function declarations are hoisted: declare them before walking the
    /// statements of the scope body so forward references resolve.
    fn hoisted_decls(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts.iter_mut() {
            if let Stmt::Func(decl) = stmt {
                self.phase
                    .declare(&self.stack, &mut decl.name, BindingKind::Function);
            }
        }
    }

    fn stmt_list(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Expr(s) => self.expr(&mut s.expr),
            Stmt::VarDecl(decl) => self.var_decl(decl),
            Stmt::Func(decl) => {
                // Name already declared by `hoisted_decls`.
                self.function(&mut decl.function);
            }
            Stmt::Return(s) => {
                if let Some(arg) = &mut s.arg {
                    self.expr(arg);
                }
            }
            Stmt::If(s) => {
                self.expr(&mut s.test);
                self.stmt(&mut s.consequent);
                if let Some(alt) = &mut s.alternate {
                    self.stmt(alt);
                }
            }
            Stmt::Block(block) => {
                self.open(ScopeKind::Block);
                self.hoisted_decls(&mut block.stmts);
                self.stmt_list(&mut block.stmts);
                self.close();
            }
            Stmt::While(s) => {
                self.expr(&mut s.test);
                self.stmt(&mut s.body);
            }
            Stmt::DoWhile(s) => {
                self.stmt(&mut s.body);
                self.expr(&mut s.test);
            }
            Stmt::For(s) => {
                self.open(ScopeKind::Block);
                match &mut s.init {
                    Some(ForInit::VarDecl(decl)) => self.var_decl(decl),
                    Some(ForInit::Expr(expr)) => self.expr(expr),
                    None => {}
                }
                if let Some(test) = &mut s.test {
                    self.expr(test);
                }
                if let Some(update) = &mut s.update {
                    self.expr(update);
                }
                self.stmt(&mut s.body);
                self.close();
            }
            Stmt::Switch(s) => {
                self.expr(&mut s.discriminant);
                self.open(ScopeKind::Block);
                for case in &mut s.cases {
                    if let Some(test) = &mut case.test {
                        self.expr(test);
                    }
                    self.stmt_list(&mut case.body);
                }
                self.close();
            }
            Stmt::Try(s) => {
                self.open(ScopeKind::Block);
                self.hoisted_decls(&mut s.block.stmts);
                self.stmt_list(&mut s.block.stmts);
                self.close();
                if let Some(handler) = &mut s.handler {
                    self.open(ScopeKind::Catch);
                    if let Some(param) = &mut handler.param {
                        self.phase.declare(&self.stack, param, BindingKind::Catch);
                    }
                    self.hoisted_decls(&mut handler.body.stmts);
                    self.stmt_list(&mut handler.body.stmts);
                    self.close();
                }
                if let Some(finalizer) = &mut s.finalizer {
                    self.open(ScopeKind::Block);
                    self.hoisted_decls(&mut finalizer.stmts);
                    self.stmt_list(&mut finalizer.stmts);
                    self.close();
                }
            }
            Stmt::Throw(s) => self.expr(&mut s.arg),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty(_) | Stmt::Debugger(_) => {}
        }
    }

    fn var_decl(&mut self, decl: &mut VarDecl) {
        let kind = match decl.kind {
            VarKind::Var => BindingKind::Var,
            VarKind::Let => BindingKind::Let,
            VarKind::Const => BindingKind::Const,
        };
        for declarator in &mut decl.decls {
            self.phase.declare(&self.stack, &mut declarator.name, kind);
            if let Some(init) = &mut declarator.init {
                self.expr(init);
            }
        }
    }

    fn function(&mut self, function: &mut Function) {
        self.open(ScopeKind::Function);
        for param in &mut function.params {
            self.phase.declare(&self.stack, param, BindingKind::Param);
        }
        self.hoisted_decls(&mut function.body.stmts);
        self.stmt_list(&mut function.body.stmts);
        self.close();
    }

    fn expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Ident(ident) => self.phase.reference(&self.stack, ident, IdentUse::Read),
            Expr::Str(_) | Expr::Num(_) | Expr::Bool(_) | Expr::Null(_) | Expr::Regex(_)
            | Expr::This(_) => {}
            Expr::Template(tpl) => {
                for e in &mut tpl.exprs {
                    self.expr(e);
                }
            }
            Expr::Array(array) => {
                for element in array.elements.iter_mut().flatten() {
                    self.expr(element);
                }
            }
            Expr::Object(object) => {
                for prop in &mut object.props {
                    self.expr(&mut prop.value);
                }
            }
            Expr::Function(func) => {
                self.open(ScopeKind::Function);
                if let Some(name) = &mut func.name {
                    self.phase.declare(&self.stack, name, BindingKind::Function);
                }
                for param in &mut func.function.params {
                    self.phase.declare(&self.stack, param, BindingKind::Param);
                }
                self.hoisted_decls(&mut func.function.body.stmts);
                self.stmt_list(&mut func.function.body.stmts);
                self.close();
            }
            Expr::Arrow(arrow) => {
                self.open(ScopeKind::Function);
                for param in &mut arrow.params {
                    self.phase.declare(&self.stack, param, BindingKind::Param);
                }
                match &mut arrow.body {
                    ArrowBody::Expr(e) => self.expr(e),
                    ArrowBody::Block(block) => {
                        self.hoisted_decls(&mut block.stmts);
                        self.stmt_list(&mut block.stmts);
                    }
                }
                self.close();
            }
            Expr::Unary(e) => self.expr(&mut e.arg),
            Expr::Update(e) => {
                if let Expr::Ident(ident) = e.arg.as_mut() {
                    self.phase
                        .reference(&self.stack, ident, IdentUse::ReadWrite);
                } else {
                    self.expr(&mut e.arg);
                }
            }
            Expr::Binary(e) => {
                self.expr(&mut e.left);
                self.expr(&mut e.right);
            }
            Expr::Logical(e) => {
                self.expr(&mut e.left);
                self.expr(&mut e.right);
            }
            Expr::Assign(e) => {
                match e.target.as_mut() {
                    Expr::Ident(ident) => {
                        let usage = if e.op.is_plain() {
                            IdentUse::Write
                        } else {
                            IdentUse::ReadWrite
                        };
                        self.phase.reference(&self.stack, ident, usage);
                    }
                    other => self.expr(other),
                }
                self.expr(&mut e.value);
            }
            Expr::Cond(e) => {
                self.expr(&mut e.test);
                self.expr(&mut e.consequent);
                self.expr(&mut e.alternate);
            }
            Expr::Call(e) => {
                self.expr(&mut e.callee);
                for arg in &mut e.args {
                    self.expr(arg);
                }
            }
            Expr::New(e) => {
                self.expr(&mut e.callee);
                for arg in &mut e.args {
                    self.expr(arg);
                }
            }
            Expr::Member(e) => {
                self.expr(&mut e.object);
                if let MemberProp::Computed(prop) = &mut e.property {
                    self.expr(prop);
                }
            }
            Expr::Seq(e) => {
                for sub in &mut e.exprs {
                    self.expr(sub);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func_with_var(var_name: &str) -> Program {
        // function f(p) { var NAME = p; return NAME; }
        Program::new(vec![Stmt::Func(FuncDecl {
            name: Ident::new("f"),
            function: Function {
                params: vec![Ident::new("p")],
                body: Block::new(vec![
                    Stmt::VarDecl(VarDecl {
                        kind: VarKind::Var,
                        decls: vec![VarDeclarator {
                            name: Ident::new(var_name),
                            init: Some(Expr::ident("p")),
                            span: Span::DUMMY,
                        }],
                        span: Span::DUMMY,
                    }),
                    Stmt::Return(ReturnStmt {
                        arg: Some(Expr::ident(var_name)),
                        span: Span::DUMMY,
                    }),
                ]),
                span: Span::DUMMY,
            },
        })])
    }

    #[test]
    fn crawl_builds_nested_scopes_and_counts_uses() {
        let program = func_with_var("_0x1a");
        let index = ScopeIndex::crawl(&program);

        let (root_id, root) = index.scopes().next().unwrap();
        assert_eq!(root_id, 0);
        assert_eq!(root.kind, ScopeKind::Program);
        assert!(root.binding("f").is_some());

        let (_, func_scope) = index
            .scopes()
            .find(|(_, s)| s.kind == ScopeKind::Function)
            .unwrap();
        let p = func_scope.binding("p").unwrap();
        assert_eq!(p.kind, BindingKind::Param);
        assert_eq!(p.reads, 1);
        let v = func_scope.binding("_0x1a").unwrap();
        assert_eq!(v.reads, 1);
        assert!(v.is_constant());
    }

    #[test]
    fn rename_rewrites_declaration_and_references() {
        let mut program = func_with_var("_0x1a");
        let index = ScopeIndex::crawl(&program);
        let (scope_id, _) = index
            .scopes()
            .find(|(_, s)| s.kind == ScopeKind::Function)
            .unwrap();
        index.rename(&mut program, scope_id, "_0x1a", "v0").unwrap();

        let rebuilt = ScopeIndex::crawl(&program);
        let (_, func_scope) = rebuilt
            .scopes()
            .find(|(_, s)| s.kind == ScopeKind::Function)
            .unwrap();
        assert!(func_scope.binding("_0x1a").is_none());
        let v0 = func_scope.binding("v0").unwrap();
        assert_eq!(v0.reads, 1);
    }

    #[test]
    fn rename_into_live_name_is_rejected() {
        let mut program = func_with_var("_0x1a");
        let index = ScopeIndex::crawl(&program);
        let (scope_id, _) = index
            .scopes()
            .find(|(_, s)| s.kind == ScopeKind::Function)
            .unwrap();
        assert!(index.rename(&mut program, scope_id, "_0x1a", "p").is_err());
        // Enclosing names are live too.
        assert!(index.rename(&mut program, scope_id, "_0x1a", "f").is_err());
    }

    #[test]
    fn writes_disable_the_constant_flag() {
        // var x = 1; x = 2;
        let program = Program::new(vec![
            Stmt::VarDecl(VarDecl {
                kind: VarKind::Var,
                decls: vec![VarDeclarator {
                    name: Ident::new("x"),
                    init: Some(Expr::num(1.0)),
                    span: Span::DUMMY,
                }],
                span: Span::DUMMY,
            }),
            Stmt::expr_stmt(Expr::assign(Expr::ident("x"), Expr::num(2.0))),
        ]);
        let index = ScopeIndex::crawl(&program);
        let binding = index.scope(0).binding("x").unwrap();
        assert_eq!(binding.writes, 1);
        assert!(!binding.is_constant());
    }
}
