//! Integration tests for the transpile-then-execute pipeline.
//!
//! These tests cover:
//! - Behavioral equivalence between transpiled units and plain expressions
//! - Import rewriting feeding the injected import function in source order
//! - Export accumulation into the returned exports object

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scriptforge_runtime::{
    ImportFunction, ImportStatement, Interpreter, RuntimeResult, Transpiler, Value,
};

/// Import function that serves canned module members and records the order
/// in which it was consulted.
struct RecordingImports {
    calls: Mutex<Vec<ImportStatement>>,
}

impl RecordingImports {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn modules(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.module.clone())
            .collect()
    }
}

#[async_trait]
impl ImportFunction for RecordingImports {
    async fn import(&self, statement: ImportStatement) -> RuntimeResult<Value> {
        let value = Value::Str(format!("<{}>", statement.token_key()));
        self.calls.lock().unwrap().push(statement);
        Ok(value)
    }
}

async fn load(source: &str) -> Value {
    let code = Transpiler::new().transpile(source, true).unwrap();
    Interpreter::new()
        .execute_module_body(&code, RecordingImports::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_expression_unit_round_trips_through_transpilation() {
    let interp = Interpreter::new();
    let direct = interp
        .evaluate_expression("({ id: 'x', count: 1 + 2 })")
        .await
        .unwrap();

    let exports = load("export default { id: 'x', count: 1 + 2 };").await;
    assert_eq!(exports.member("default"), Some(&direct));
}

#[tokio::test]
async fn test_imports_are_resolved_in_source_order() {
    let imports = RecordingImports::new();
    let source = "import { A } from 'first';\nimport { B } from 'second';\nexport default A + B;";
    let code = Transpiler::new().transpile(source, true).unwrap();
    let exports = Interpreter::new()
        .execute_module_body(&code, imports.clone())
        .await
        .unwrap();

    assert_eq!(imports.modules(), vec!["first", "second"]);
    assert_eq!(
        exports.member("default"),
        Some(&Value::Str("<first:A><second:B>".to_string()))
    );
}

#[tokio::test]
async fn test_later_statements_reference_earlier_imports() {
    let source = "import { greet } from 'lib';\nconst message = greet + '!';\nexport default message;";
    let exports = load(source).await;
    assert_eq!(
        exports.member("default"),
        Some(&Value::Str("<lib:greet>!".to_string()))
    );
}

#[tokio::test]
async fn test_named_exports_land_in_exports_object() {
    let source = "export const a = 1;\nconst b = 2;\nexport { b as doubled };\nexport default a;";
    let exports = load(source).await;
    assert_eq!(exports.member("a"), Some(&Value::Number(1.0)));
    assert_eq!(exports.member("doubled"), Some(&Value::Number(2.0)));
    assert_eq!(exports.member("default"), Some(&Value::Number(1.0)));
}

#[tokio::test]
async fn test_aliased_import_binds_alias() {
    let source = "import { Service as svc } from 'pkg';\nexport default svc;";
    let exports = load(source).await;
    assert_eq!(
        exports.member("default"),
        Some(&Value::Str("<pkg:Service>".to_string()))
    );
}

#[tokio::test]
async fn test_plugin_shaped_unit_produces_descriptor_object() {
    let source = r#"
import { ICommandPalette } from '@host/apputils';

const plugin = {
  id: 'hello:plugin',
  autoStart: true,
  requires: ['@host/apputils:ICommandPalette'],
  activate: (palette) => palette,
};

export default plugin;
"#;
    let exports = load(source).await;
    let plugin = exports.member("default").unwrap();
    assert_eq!(plugin.member("id"), Some(&Value::Str("hello:plugin".to_string())));
    assert_eq!(plugin.member("autoStart"), Some(&Value::Bool(true)));
    assert!(plugin.member("activate").unwrap().is_callable());
}

#[tokio::test]
async fn test_activation_callable_survives_execution() {
    let source = "export default { id: 'x', activate: (t) => t };";
    let exports = load(source).await;
    let activate = exports
        .member("default")
        .and_then(|p| p.member("activate"))
        .cloned()
        .unwrap();
    let interp = Interpreter::new();
    let passed = Value::Str("dependency".to_string());
    let result = interp.call(&activate, vec![passed.clone()]).await.unwrap();
    assert_eq!(result, passed);
}
