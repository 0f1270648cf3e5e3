//! Async tree-walking interpreter for generated function bodies.
//!
//! Execution is single-threaded and cooperatively suspends at awaited
//! calls; rewritten import bindings therefore resolve strictly in source
//! order. The injected import function is bound as a native async function
//! under the transpiler's [`IMPORT_FUNCTION_NAME`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::ast::{ArrowBody, BinaryOp, Expr, IfStmt, Stmt, UnaryOp};
use crate::error::{RuntimeError, RuntimeResult};
use crate::parser::{parse_expression_source, parse_program};
use crate::statement::ImportStatement;
use crate::transpiler::IMPORT_FUNCTION_NAME;
use crate::value::{Closure, NativeFunction, ObjectMap, Value};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Scope-chained variable environment.
///
/// Bindings are added as statements execute; closures capture the
/// environment itself, so a closure created early in a scope sees bindings
/// declared later, as long as it runs after them.
#[derive(Clone)]
pub struct Env(Arc<EnvInner>);

struct EnvInner {
    vars: Mutex<HashMap<String, Value>>,
    parent: Option<Env>,
}

impl Env {
    pub fn new() -> Self {
        Self(Arc::new(EnvInner {
            vars: Mutex::new(HashMap::new()),
            parent: None,
        }))
    }

    pub fn child(&self) -> Self {
        Self(Arc::new(EnvInner {
            vars: Mutex::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.lock().insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let mut env = self.clone();
        loop {
            if let Some(value) = env.lock().get(name).cloned() {
                return Some(value);
            }
            let parent = env.0.parent.clone()?;
            env = parent;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.0.vars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

/// Statement outcome: fall through or return a value from the body.
enum Flow {
    Normal,
    Return(Value),
}

/// The injected import function the generated body calls for every
/// rewritten import binding.
#[async_trait]
pub trait ImportFunction: Send + Sync {
    /// Resolve one import. Implementations surface their own failures to
    /// the host before returning an error.
    async fn import(&self, statement: ImportStatement) -> RuntimeResult<Value>;
}

/// Tree-walking evaluator. Stateless; construct once and reuse.
#[derive(Debug, Default)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }

    /// Execute a transpiled function body with the import function injected.
    /// Returns the value of the body's `return` statement, `Null` if the
    /// body falls through.
    pub async fn execute_module_body(
        &self,
        body: &str,
        import: Arc<dyn ImportFunction>,
    ) -> RuntimeResult<Value> {
        let program = parse_program(body)?;
        let env = self.root_env();
        env.define(IMPORT_FUNCTION_NAME, import_function_value(import));
        for item in &program.items {
            if let Flow::Return(value) = self.eval_stmt(&item.stmt, &env).await? {
                return Ok(value);
            }
        }
        Ok(Value::Null)
    }

    /// Evaluate the whole source text as one expression (legacy path; no
    /// import resolution).
    pub async fn evaluate_expression(&self, source: &str) -> RuntimeResult<Value> {
        let expr = parse_expression_source(source)?;
        let env = self.root_env();
        self.eval_expr(&expr, &env).await
    }

    /// Call a callable value with the given arguments.
    pub async fn call(&self, callee: &Value, args: Vec<Value>) -> RuntimeResult<Value> {
        self.call_value(callee, args).await
    }

    fn root_env(&self) -> Env {
        let env = Env::new();
        env.define("undefined", Value::Null);
        env.define("console", console_object());
        env
    }

    fn eval_stmt<'a>(&'a self, stmt: &'a Stmt, env: &'a Env) -> BoxFuture<'a, RuntimeResult<Flow>> {
        Box::pin(async move {
            match stmt {
                Stmt::Declaration(decl) => {
                    let value = self.eval_expr(&decl.init, env).await?;
                    env.define(decl.name.clone(), value);
                    Ok(Flow::Normal)
                }
                Stmt::Return(expr) => {
                    let value = match expr {
                        Some(expr) => self.eval_expr(expr, env).await?,
                        None => Value::Null,
                    };
                    Ok(Flow::Return(value))
                }
                Stmt::If(if_stmt) => self.eval_if(if_stmt, env).await,
                Stmt::Expr(expr) => {
                    self.eval_expr(expr, env).await?;
                    Ok(Flow::Normal)
                }
                Stmt::Import(decl) => Err(RuntimeError::UnrewrittenImport {
                    module: decl.module.clone(),
                }),
                Stmt::ExportNamed(_) | Stmt::ExportDecl { .. } | Stmt::ExportDefault { .. } => {
                    Err(RuntimeError::Unsupported(
                        "export statements cannot be executed directly".to_string(),
                    ))
                }
            }
        })
    }

    async fn eval_if(&self, if_stmt: &IfStmt, env: &Env) -> RuntimeResult<Flow> {
        let cond = self.eval_expr(&if_stmt.cond, env).await?;
        let branch = if cond.truthy() {
            Some(&if_stmt.then_branch)
        } else {
            if_stmt.else_branch.as_ref()
        };
        match branch {
            Some(stmts) => {
                let scope = env.child();
                self.eval_block(stmts, &scope).await
            }
            None => Ok(Flow::Normal),
        }
    }

    async fn eval_block(&self, stmts: &[Stmt], env: &Env) -> RuntimeResult<Flow> {
        for stmt in stmts {
            if let Flow::Return(value) = self.eval_stmt(stmt, env).await? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_expr<'a>(&'a self, expr: &'a Expr, env: &'a Env) -> BoxFuture<'a, RuntimeResult<Value>> {
        Box::pin(async move {
            match expr {
                Expr::Null => Ok(Value::Null),
                Expr::Bool(b) => Ok(Value::Bool(*b)),
                Expr::Number(n) => Ok(Value::Number(*n)),
                Expr::Str(s) => Ok(Value::Str(s.clone())),
                Expr::Ident(name) => env
                    .get(name)
                    .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone())),
                Expr::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.eval_expr(item, env).await?);
                    }
                    Ok(Value::Array(out))
                }
                Expr::Object(entries) => {
                    let mut map = ObjectMap::with_capacity(entries.len());
                    for (key, value) in entries {
                        let value = self.eval_expr(value, env).await?;
                        map.insert(key.as_str().to_string(), value);
                    }
                    Ok(Value::Object(Arc::new(map)))
                }
                Expr::Arrow(arrow) => Ok(Value::Function(Arc::new(Closure {
                    params: arrow.params.clone(),
                    body: arrow.body.clone(),
                    env: env.clone(),
                    is_async: arrow.is_async,
                }))),
                Expr::Member { object, property } => {
                    let object = self.eval_expr(object, env).await?;
                    member_of(&object, property)
                }
                Expr::Index { object, index } => {
                    let object = self.eval_expr(object, env).await?;
                    let index = self.eval_expr(index, env).await?;
                    index_of(&object, &index)
                }
                Expr::Call { callee, args } => {
                    let callee = self.eval_expr(callee, env).await?;
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval_expr(arg, env).await?);
                    }
                    self.call_value(&callee, values).await
                }
                // evaluation is eager; the awaited call has already
                // suspended by the time the value is produced
                Expr::Await(inner) => self.eval_expr(inner, env).await,
                Expr::Unary { op, operand } => {
                    let value = self.eval_expr(operand, env).await?;
                    match op {
                        UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                        UnaryOp::Neg => match value {
                            Value::Number(n) => Ok(Value::Number(-n)),
                            other => Err(RuntimeError::Type(format!(
                                "cannot negate a {}",
                                other.type_name()
                            ))),
                        },
                    }
                }
                Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, env).await,
                Expr::Conditional {
                    cond,
                    then,
                    otherwise,
                } => {
                    if self.eval_expr(cond, env).await?.truthy() {
                        self.eval_expr(then, env).await
                    } else {
                        self.eval_expr(otherwise, env).await
                    }
                }
            }
        })
    }

    async fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        env: &Env,
    ) -> RuntimeResult<Value> {
        match op {
            BinaryOp::And => {
                let left = self.eval_expr(left, env).await?;
                if !left.truthy() {
                    return Ok(left);
                }
                self.eval_expr(right, env).await
            }
            BinaryOp::Or => {
                let left = self.eval_expr(left, env).await?;
                if left.truthy() {
                    return Ok(left);
                }
                self.eval_expr(right, env).await
            }
            _ => {
                let left = self.eval_expr(left, env).await?;
                let right = self.eval_expr(right, env).await?;
                apply_binary(op, left, right)
            }
        }
    }

    fn call_value<'a>(&'a self, callee: &'a Value, args: Vec<Value>) -> BoxFuture<'a, RuntimeResult<Value>> {
        Box::pin(async move {
            match callee {
                Value::Function(closure) => {
                    let scope = closure.env.child();
                    for (i, param) in closure.params.iter().enumerate() {
                        let value = args.get(i).cloned().unwrap_or(Value::Null);
                        scope.define(param.clone(), value);
                    }
                    match &closure.body {
                        ArrowBody::Expr(expr) => self.eval_expr(expr, &scope).await,
                        ArrowBody::Block(stmts) => match self.eval_block(stmts, &scope).await? {
                            Flow::Return(value) => Ok(value),
                            Flow::Normal => Ok(Value::Null),
                        },
                    }
                }
                Value::Native(native) => native.invoke(args).await,
                other => Err(RuntimeError::NotCallable(other.type_name())),
            }
        })
    }
}

fn member_of(value: &Value, property: &str) -> RuntimeResult<Value> {
    match value {
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        other => Err(RuntimeError::NotAnObject {
            property: property.to_string(),
            kind: other.type_name(),
        }),
    }
}

fn index_of(value: &Value, index: &Value) -> RuntimeResult<Value> {
    match (value, index) {
        (Value::Array(items), Value::Number(n)) => {
            if *n >= 0.0 && n.fract() == 0.0 {
                Ok(items.get(*n as usize).cloned().unwrap_or(Value::Null))
            } else {
                Ok(Value::Null)
            }
        }
        (Value::Object(map), Value::Str(key)) => {
            Ok(map.get(key.as_str()).cloned().unwrap_or(Value::Null))
        }
        (value, index) => Err(RuntimeError::Type(format!(
            "cannot index a {} with a {}",
            value.type_name(),
            index.type_name()
        ))),
    }
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> RuntimeResult<Value> {
    use BinaryOp::*;
    match op {
        Add => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Ok(Value::Str(format!("{}{}", left, right)))
            }
            _ => Err(RuntimeError::Type(format!(
                "cannot add a {} and a {}",
                left.type_name(),
                right.type_name()
            ))),
        },
        Sub | Mul | Div | Mod => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(match op {
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            })),
            _ => Err(RuntimeError::Type(format!(
                "arithmetic requires numbers, got {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },
        Eq => Ok(Value::Bool(left == right)),
        NotEq => Ok(Value::Bool(left != right)),
        Lt | Le | Gt | Ge => {
            let ordering = match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let ordering = ordering.ok_or_else(|| {
                RuntimeError::Type(format!(
                    "cannot compare a {} with a {}",
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            let result = match op {
                Lt => ordering.is_lt(),
                Le => ordering.is_le(),
                Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        And | Or => unreachable!("short-circuit operators are evaluated lazily"),
    }
}

fn import_function_value(import: Arc<dyn ImportFunction>) -> Value {
    Value::Native(NativeFunction::new(IMPORT_FUNCTION_NAME, move |args| {
        let import = Arc::clone(&import);
        Box::pin(async move {
            let payload = args.into_iter().next().ok_or_else(|| {
                RuntimeError::Type("import function expects one argument".to_string())
            })?;
            let json = payload.to_json()?;
            let statement: ImportStatement = serde_json::from_value(json)
                .map_err(|e| RuntimeError::Type(format!("invalid import payload: {}", e)))?;
            import.import(statement).await
        })
    }))
}

fn console_object() -> Value {
    Value::object([
        ("log".to_string(), console_native("console.log", emit_info)),
        ("info".to_string(), console_native("console.info", emit_info)),
        ("warn".to_string(), console_native("console.warn", emit_warn)),
        ("error".to_string(), console_native("console.error", emit_error)),
    ])
}

fn emit_info(message: String) {
    info!("{}", message);
}

fn emit_warn(message: String) {
    warn!("{}", message);
}

fn emit_error(message: String) {
    error!("{}", message);
}

fn console_native(name: &str, emit: fn(String)) -> Value {
    Value::Native(NativeFunction::new(name, move |args| {
        Box::pin(async move {
            let message = args
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            emit(message);
            Ok(Value::Null)
        })
    }))
}
