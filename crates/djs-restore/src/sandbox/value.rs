//! Runtime values for the fragment executor.
//!
//! Arrays and objects are shared mutable cells because the obfuscator
//! bootstrap fragments mutate the string table in place (rotation) and
//! every call site must observe the mutated table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use djs_core::ast::{format_number, ArrowBody, Block, Expr};

#[derive(Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    /// Insertion-ordered so a rebuilt object literal keeps source order.
    Object(Rc<RefCell<Vec<(String, Value)>>>),
    Function(Rc<Closure>),
    Regex(Rc<JsRegex>),
}

/// A regex literal as a runtime value; compiled lazily at the use site.
#[derive(PartialEq)]
pub struct JsRegex {
    pub source: String,
    pub flags: String,
}

impl JsRegex {
    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }
}

#[derive(PartialEq)]
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: ClosureBody,
    pub env: Env,
}

#[derive(Clone, PartialEq)]
pub enum ClosureBody {
    Block(Block),
    /// Arrow with an expression body.
    Expr(Expr),
}

impl Closure {
    pub fn from_parts(
        name: Option<String>,
        params: Vec<djs_core::ast::Ident>,
        body: ClosureBody,
        env: Env,
    ) -> Self {
        Self {
            name,
            params: params.into_iter().map(|p| p.name).collect(),
            body,
            env,
        }
    }
}

impl From<(&djs_core::ast::ArrowExpr, Env)> for Closure {
    fn from((arrow, env): (&djs_core::ast::ArrowExpr, Env)) -> Self {
        let body = match &arrow.body {
            ArrowBody::Expr(e) => ClosureBody::Expr((**e).clone()),
            ArrowBody::Block(block) => ClosureBody::Block(block.clone()),
        };
        Closure::from_parts(None, arrow.params.clone(), body, env)
    }
}

impl Value {
    pub fn array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn object(props: Vec<(String, Value)>) -> Value {
        Value::Object(Rc::new(RefCell::new(props)))
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) | Value::Object(_) | Value::Regex(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Regex(_) => true,
        }
    }

    /// JS ToNumber.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Num(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else if let Some(hex) = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    i64::from_str_radix(hex, 16)
                        .map(|n| n as f64)
                        .unwrap_or(f64::NAN)
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Array(array) => {
                // ToPrimitive via join, like JS.
                let array = array.borrow();
                match array.len() {
                    0 => 0.0,
                    1 => array[0].to_number(),
                    _ => f64::NAN,
                }
            }
            Value::Object(_) | Value::Function(_) | Value::Regex(_) => f64::NAN,
        }
    }

    /// JS ToString.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Array(array) => array
                .borrow()
                .iter()
                .map(|v| match v {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(_) => "function".to_string(),
            Value::Regex(regex) => format!("/{}/{}", regex.source, regex.flags),
        }
    }

    pub fn to_int32(&self) -> i32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        n as i64 as i32
    }

    pub fn to_uint32(&self) -> u32 {
        self.to_int32() as u32
    }

    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Regex(a), Value::Regex(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Num(_), Value::Num(_))
            | (Value::Str(_), Value::Str(_))
            | (Value::Bool(_), Value::Bool(_)) => self.strict_eq(other),
            (Value::Num(a), Value::Str(_)) => *a == other.to_number(),
            (Value::Str(_), Value::Num(b)) => self.to_number() == *b,
            (Value::Bool(_), _) => Value::Num(self.to_number()).loose_eq(other),
            (_, Value::Bool(_)) => self.loose_eq(&Value::Num(other.to_number())),
            (Value::Str(a), Value::Array(_)) => *a == other.to_js_string(),
            (Value::Array(_), Value::Str(b)) => self.to_js_string() == *b,
            (Value::Num(a), Value::Array(_)) => *a == other.to_number(),
            (Value::Array(_), Value::Num(b)) => self.to_number() == *b,
            _ => self.strict_eq(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(array) => f.debug_list().entries(array.borrow().iter()).finish(),
            Value::Object(object) => {
                let object = object.borrow();
                let mut map = f.debug_map();
                for (key, value) in object.iter() {
                    map.entry(key, value);
                }
                map.finish()
            }
            Value::Function(closure) => {
                write!(f, "[function {}]", closure.name.as_deref().unwrap_or(""))
            }
            Value::Regex(regex) => write!(f, "/{}/{}", regex.source, regex.flags),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

/// Environment chain. Cloning an `Env` shares the frame, which is what
/// closure capture needs.
#[derive(Clone, PartialEq)]
pub struct Env(Rc<RefCell<EnvData>>);

#[derive(PartialEq)]
struct EnvData {
    vars: HashMap<String, Value>,
    parent: Option<Env>,
}

impl Env {
    pub fn root() -> Env {
        Env(Rc::new(RefCell::new(EnvData {
            vars: HashMap::new(),
            parent: None,
        })))
    }

    pub fn child(&self) -> Env {
        Env(Rc::new(RefCell::new(EnvData {
            vars: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    pub fn declare(&self, name: &str, value: Value) {
        self.0.borrow_mut().vars.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let data = self.0.borrow();
        if let Some(value) = data.vars.get(name) {
            return Some(value.clone());
        }
        data.parent.as_ref().and_then(|parent| parent.get(name))
    }

    /// Assign to the nearest frame that declares `name`; an undeclared
    /// assignment lands on the root frame, matching sloppy-mode JS.
    pub fn set(&self, name: &str, value: Value) {
        let mut frame = self.clone();
        loop {
            let next = {
                let mut data = frame.0.borrow_mut();
                if data.vars.contains_key(name) {
                    data.vars.insert(name.to_string(), value);
                    return;
                }
                match &data.parent {
                    Some(parent) => parent.clone(),
                    None => {
                        data.vars.insert(name.to_string(), value);
                        return;
                    }
                }
            };
            frame = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_number_follows_js_coercion() {
        assert_eq!(Value::Str("  12 ".into()).to_number(), 12.0);
        assert_eq!(Value::Str("0x1f".into()).to_number(), 31.0);
        assert!(Value::Str("nope".into()).to_number().is_nan());
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
    }

    #[test]
    fn loose_eq_coerces_across_types() {
        assert!(Value::Num(1.0).loose_eq(&Value::Str("1".into())));
        assert!(Value::Bool(false).loose_eq(&Value::Num(0.0)));
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.loose_eq(&Value::Num(0.0)));
    }

    #[test]
    fn array_to_string_joins_with_commas() {
        let array = Value::array(vec![
            Value::Num(1.0),
            Value::Str("a".into()),
            Value::Undefined,
        ]);
        assert_eq!(array.to_js_string(), "1,a,");
    }

    #[test]
    fn env_set_walks_to_the_declaring_frame() {
        let root = Env::root();
        root.declare("x", Value::Num(1.0));
        let inner = root.child();
        inner.set("x", Value::Num(2.0));
        assert_eq!(root.get("x").unwrap().to_number(), 2.0);
    }
}
