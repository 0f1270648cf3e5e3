//! Runtime values produced and consumed by executing plugin code.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::ArrowBody;
use crate::capability::Token;
use crate::error::RuntimeError;
use crate::interp::Env;

/// Insertion-ordered object map.
pub type ObjectMap = IndexMap<String, Value>;

/// Boxed future returned by native functions.
pub type ValueFuture = Pin<Box<dyn Future<Output = Result<Value, RuntimeError>> + Send>>;

/// A value in the plugin script runtime.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    Object(Arc<ObjectMap>),
    /// Script closure: arrow function plus its captured environment.
    Function(Arc<Closure>),
    /// Host-provided async function.
    Native(NativeFunction),
    /// Opaque capability token injected by the resolver.
    Token(Token),
}

/// An arrow function bundled with the environment it closed over.
pub struct Closure {
    pub params: Vec<String>,
    pub body: ArrowBody,
    pub env: Env,
    pub is_async: bool,
}

/// Async function implemented by the host.
#[derive(Clone)]
pub struct NativeFunction {
    name: String,
    func: Arc<dyn Fn(Vec<Value>) -> ValueFuture + Send + Sync>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(Vec<Value>) -> ValueFuture + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(&self, args: Vec<Value>) -> ValueFuture {
        (self.func)(args)
    }
}

impl Value {
    /// Build an object value from key/value pairs, keeping insertion order.
    pub fn object(entries: impl IntoIterator<Item = (String, Value)>) -> Value {
        Value::Object(Arc::new(entries.into_iter().collect()))
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(name),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectMap> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Token(_) => "token",
        }
    }

    /// Convert a data-shaped value to JSON. Functions and tokens have no
    /// JSON representation and fail with a type error.
    pub fn to_json(&self) -> Result<serde_json::Value, RuntimeError> {
        match self {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .ok_or_else(|| {
                    RuntimeError::Type(format!("number {} has no JSON representation", n))
                }),
            Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Array(items) => Ok(serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, value) in map.iter() {
                    out.insert(key.clone(), value.to_json()?);
                }
                Ok(serde_json::Value::Object(out))
            }
            other => Err(RuntimeError::Type(format!(
                "cannot represent a {} as JSON",
                other.type_name()
            ))),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::object(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| b.get(key) == Some(value))
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(&a.func, &b.func),
            (Value::Token(a), Value::Token(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Object(map) => {
                let mut debug = f.debug_map();
                for (key, value) in map.iter() {
                    debug.entry(key, value);
                }
                debug.finish()
            }
            Value::Function(closure) => {
                write!(f, "Function(<{} params>)", closure.params.len())
            }
            Value::Native(native) => write!(f, "Native({})", native.name),
            Value::Token(token) => write!(f, "Token({})", token),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Function(_) => write!(f, "[function]"),
            Value::Native(native) => write!(f, "[native {}]", native.name),
            Value::Token(token) => write!(f, "[token {}]", token),
        }
    }
}
