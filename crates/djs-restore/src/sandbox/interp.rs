//! The tree-walking evaluator.

use std::rc::Rc;

use djs_core::ast::*;

use super::value::{Closure, ClosureBody, Env, JsRegex, Value};
use super::{builtins, ops, EvalError};

/// Statement completion.
pub(super) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub(super) struct Interp {
    fuel: u64,
}

impl Interp {
    pub fn new(fuel: u64) -> Self {
        Self { fuel }
    }

    pub fn fuel_remaining(&self) -> u64 {
        self.fuel
    }

    fn step(&mut self) -> Result<(), EvalError> {
        if self.fuel == 0 {
            return Err(EvalError::Budget);
        }
        self.fuel -= 1;
        Ok(())
    }

    /// Execute a statement list with function declarations hoisted.
    pub fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> Result<Flow, EvalError> {
        for stmt in stmts {
            if let Stmt::Func(decl) = stmt {
                let closure = Closure::from_parts(
                    Some(decl.name.name.clone()),
                    decl.function.params.clone(),
                    ClosureBody::Block(decl.function.body.clone()),
                    env.clone(),
                );
                env.declare(&decl.name.name, Value::Function(Rc::new(closure)));
            }
        }
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow, EvalError> {
        self.step()?;
        match stmt {
            Stmt::Expr(s) => {
                self.eval(&s.expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::VarDecl(decl) => {
                for declarator in &decl.decls {
                    let value = match &declarator.init {
                        Some(init) => self.eval(init, env)?,
                        None => Value::Undefined,
                    };
                    env.declare(&declarator.name.name, value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Func(_) => Ok(Flow::Normal), // hoisted by exec_block
            Stmt::Return(s) => {
                let value = match &s.arg {
                    Some(arg) => self.eval(arg, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If(s) => {
                if self.eval(&s.test, env)?.is_truthy() {
                    self.exec_stmt(&s.consequent, env)
                } else if let Some(alt) = &s.alternate {
                    self.exec_stmt(alt, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Block(block) => self.exec_block(&block.stmts, &env.child()),
            Stmt::While(s) => {
                loop {
                    self.step()?;
                    if !self.eval(&s.test, env)?.is_truthy() {
                        break;
                    }
                    match self.exec_stmt(&s.body, env)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile(s) => {
                loop {
                    self.step()?;
                    match self.exec_stmt(&s.body, env)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    if !self.eval(&s.test, env)?.is_truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For(s) => {
                let scope = env.child();
                match &s.init {
                    Some(ForInit::VarDecl(decl)) => {
                        self.exec_stmt(&Stmt::VarDecl(decl.clone()), &scope)?;
                    }
                    Some(ForInit::Expr(expr)) => {
                        self.eval(expr, &scope)?;
                    }
                    None => {}
                }
                loop {
                    self.step()?;
                    if let Some(test) = &s.test {
                        if !self.eval(test, &scope)?.is_truthy() {
                            break;
                        }
                    }
                    match self.exec_stmt(&s.body, &scope)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                    if let Some(update) = &s.update {
                        self.eval(update, &scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Switch(s) => self.exec_switch(s, env),
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
            Stmt::Empty(_) | Stmt::Debugger(_) => Ok(Flow::Normal),
            Stmt::Try(s) => {
                let result = self.exec_block(&s.block.stmts, &env.child());
                let flow = match result {
                    Ok(flow) => flow,
                    Err(err) if err.is_catchable() => match &s.handler {
                        Some(handler) => {
                            let scope = env.child();
                            if let Some(param) = &handler.param {
                                scope.declare(&param.name, err.as_caught_value());
                            }
                            self.exec_block(&handler.body.stmts, &scope)?
                        }
                        None => return Err(err),
                    },
                    Err(err) => return Err(err),
                };
                if let Some(finalizer) = &s.finalizer {
                    self.exec_block(&finalizer.stmts, &env.child())?;
                }
                Ok(flow)
            }
            Stmt::Throw(s) => {
                let value = self.eval(&s.arg, env)?;
                Err(EvalError::Thrown(value))
            }
        }
    }

    fn exec_switch(&mut self, s: &SwitchStmt, env: &Env) -> Result<Flow, EvalError> {
        let discriminant = self.eval(&s.discriminant, env)?;
        let scope = env.child();

        let mut start = None;
        for (i, case) in s.cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval(test, &scope)?.strict_eq(&discriminant) {
                    start = Some(i);
                    break;
                }
            }
        }
        // No match: fall back to default.
        let start = match start.or_else(|| s.cases.iter().position(|c| c.test.is_none())) {
            Some(i) => i,
            None => return Ok(Flow::Normal),
        };

        for case in &s.cases[start..] {
            match self.exec_block(&case.body, &scope)? {
                Flow::Normal => {} // fall through
                Flow::Break => return Ok(Flow::Normal),
                flow @ (Flow::Continue | Flow::Return(_)) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    pub fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Value, EvalError> {
        self.step()?;
        match expr {
            Expr::Str(s) => Ok(Value::Str(s.value.clone())),
            Expr::Num(n) => Ok(Value::Num(n.value)),
            Expr::Bool(b) => Ok(Value::Bool(b.value)),
            Expr::Null(_) => Ok(Value::Null),
            Expr::Regex(regex) => Ok(Value::Regex(Rc::new(JsRegex {
                source: regex.pattern.clone(),
                flags: regex.flags.clone(),
            }))),
            Expr::Template(tpl) => {
                let mut out = String::new();
                for (i, quasi) in tpl.quasis.iter().enumerate() {
                    out.push_str(&quasi.cooked);
                    if let Some(sub) = tpl.exprs.get(i) {
                        out.push_str(&self.eval(sub, env)?.to_js_string());
                    }
                }
                Ok(Value::Str(out))
            }
            Expr::Ident(ident) => match ident.name.as_str() {
                "undefined" => Ok(Value::Undefined),
                "NaN" => Ok(Value::Num(f64::NAN)),
                "Infinity" => Ok(Value::Num(f64::INFINITY)),
                name => env
                    .get(name)
                    .ok_or_else(|| EvalError::Reference(name.to_string())),
            },
            Expr::Array(array) => {
                let mut values = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    values.push(match element {
                        Some(e) => self.eval(e, env)?,
                        None => Value::Undefined,
                    });
                }
                Ok(Value::array(values))
            }
            Expr::Object(object) => {
                let mut props = Vec::with_capacity(object.props.len());
                for prop in &object.props {
                    props.push((prop.key.name(), self.eval(&prop.value, env)?));
                }
                Ok(Value::object(props))
            }
            Expr::Function(func) => {
                let closure = Closure::from_parts(
                    func.name.as_ref().map(|n| n.name.clone()),
                    func.function.params.clone(),
                    ClosureBody::Block(func.function.body.clone()),
                    env.clone(),
                );
                Ok(Value::Function(Rc::new(closure)))
            }
            Expr::Arrow(arrow) => Ok(Value::Function(Rc::new(Closure::from((arrow, env.clone()))))),
            Expr::Unary(e) => {
                if e.op == UnaryOp::TypeOf {
                    // typeof on an unresolved name is "undefined", not an error.
                    if let Expr::Ident(ident) = e.arg.as_ref() {
                        if env.get(&ident.name).is_none() {
                            return Ok(Value::Str("undefined".to_string()));
                        }
                    }
                }
                let arg = self.eval(&e.arg, env)?;
                ops::unary(e.op, &arg)
            }
            Expr::Update(e) => {
                let old = self.eval(&e.arg, env)?.to_number();
                let new = match e.op {
                    UpdateOp::Incr => old + 1.0,
                    UpdateOp::Decr => old - 1.0,
                };
                self.assign_to(&e.arg, Value::Num(new), env)?;
                Ok(Value::Num(if e.prefix { new } else { old }))
            }
            Expr::Binary(e) => {
                let left = self.eval(&e.left, env)?;
                let right = self.eval(&e.right, env)?;
                ops::binary(e.op, &left, &right)
            }
            Expr::Logical(e) => {
                let left = self.eval(&e.left, env)?;
                match ops::logical_short_circuit(e.op, &left) {
                    Some(value) => Ok(value),
                    None => self.eval(&e.right, env),
                }
            }
            Expr::Assign(e) => {
                let value = match e.op {
                    AssignOp::Assign => self.eval(&e.value, env)?,
                    AssignOp::Compound(op) => {
                        let current = self.eval(&e.target, env)?;
                        let rhs = self.eval(&e.value, env)?;
                        ops::binary(op, &current, &rhs)?
                    }
                };
                self.assign_to(&e.target, value.clone(), env)?;
                Ok(value)
            }
            Expr::Cond(e) => {
                if self.eval(&e.test, env)?.is_truthy() {
                    self.eval(&e.consequent, env)
                } else {
                    self.eval(&e.alternate, env)
                }
            }
            Expr::Call(e) => self.eval_call(e, env),
            Expr::New(_) => Err(EvalError::Unsupported("new expression".to_string())),
            Expr::Member(e) => {
                let object = self.eval(&e.object, env)?;
                let key = self.member_key(&e.property, env)?;
                builtins::get_property(&object, &key)
            }
            Expr::Seq(e) => {
                let mut last = Value::Undefined;
                for sub in &e.exprs {
                    last = self.eval(sub, env)?;
                }
                Ok(last)
            }
            Expr::This(_) => Ok(Value::Undefined),
        }
    }

    fn member_key(&mut self, prop: &MemberProp, env: &Env) -> Result<String, EvalError> {
        match prop {
            MemberProp::Ident(ident) => Ok(ident.name.clone()),
            MemberProp::Computed(expr) => Ok(self.eval(expr, env)?.to_js_string()),
        }
    }

    fn eval_call(&mut self, e: &CallExpr, env: &Env) -> Result<Value, EvalError> {
        // Method call: obj.method(...) / obj["method"](...)
        if let Expr::Member(member) = e.callee.as_ref() {
            // Namespace builtins (String.fromCharCode, Math.max, ...) are
            // matched by name when the identifier is not a binding.
            if let Expr::Ident(ns) = member.object.as_ref() {
                if env.get(&ns.name).is_none() {
                    let method = self.member_key(&member.property, env)?;
                    let args = self.eval_args(&e.args, env)?;
                    return builtins::namespace_call(self, &ns.name, &method, args);
                }
            }
            let object = self.eval(&member.object, env)?;
            let method = self.member_key(&member.property, env)?;
            // A stored function property is an ordinary call.
            if let Value::Object(props) = &object {
                let found = props
                    .borrow()
                    .iter()
                    .find(|(k, _)| *k == method)
                    .map(|(_, v)| v.clone());
                if let Some(Value::Function(closure)) = found {
                    let args = self.eval_args(&e.args, env)?;
                    return self.call_closure(&closure, args);
                }
            }
            let args = self.eval_args(&e.args, env)?;
            return builtins::method_call(self, &object, &method, args);
        }

        // Free call: a binding if one exists, a global builtin otherwise.
        if let Expr::Ident(ident) = e.callee.as_ref() {
            if env.get(&ident.name).is_none() {
                let args = self.eval_args(&e.args, env)?;
                return builtins::global_call(&ident.name, args);
            }
        }
        let callee = self.eval(&e.callee, env)?;
        let args = self.eval_args(&e.args, env)?;
        self.call_value(&callee, args)
    }

    fn eval_args(&mut self, args: &[Expr], env: &Env) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|arg| self.eval(arg, env)).collect()
    }

    pub(super) fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, EvalError> {
        match callee {
            Value::Function(closure) => self.call_closure(closure, args),
            other => Err(EvalError::Type(format!("{} is not a function", other.type_of()))),
        }
    }

    pub(super) fn call_closure(
        &mut self,
        closure: &Rc<Closure>,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        self.step()?;
        let scope = closure.env.child();
        let mut args = args.into_iter();
        for param in &closure.params {
            scope.declare(param, args.next().unwrap_or(Value::Undefined));
        }
        // Named function expressions can recurse through their own name.
        if let Some(name) = &closure.name {
            if scope.get(name).is_none() {
                scope.declare(name, Value::Function(closure.clone()));
            }
        }
        match &closure.body {
            ClosureBody::Expr(expr) => self.eval(expr, &scope),
            ClosureBody::Block(block) => match self.exec_block(&block.stmts, &scope)? {
                Flow::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    fn assign_to(&mut self, target: &Expr, value: Value, env: &Env) -> Result<(), EvalError> {
        match target {
            Expr::Ident(ident) => {
                env.set(&ident.name, value);
                Ok(())
            }
            Expr::Member(member) => {
                let object = self.eval(&member.object, env)?;
                let key = self.member_key(&member.property, env)?;
                builtins::set_property(&object, &key, value)
            }
            _ => Err(EvalError::Type("invalid assignment target".to_string())),
        }
    }
}
