//! Plugin descriptors and dependency translation.

use scriptforge_runtime::{CapabilityTable, Interpreter, RuntimeResult, Token, Value};
use tracing::warn;

use crate::error::LoadError;

/// A dependency entry as produced by the plugin: either a capability token
/// that passes straight through, or a name to look up in the capability
/// table. Classified once at construction so no later step has to sniff
/// value types.
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyRef {
    Token(Token),
    Name(String),
}

impl DependencyRef {
    pub fn from_value(value: &Value) -> Result<Self, LoadError> {
        match value {
            Value::Token(token) => Ok(DependencyRef::Token(token.clone())),
            Value::Str(name) => Ok(DependencyRef::Name(name.clone())),
            other => Err(LoadError::InvalidDescriptor(format!(
                "dependency entries must be tokens or strings, got a {}",
                other.type_name()
            ))),
        }
    }

    /// Translate to a token, looking names up in the table.
    pub fn translate(&self, table: &CapabilityTable) -> Option<Token> {
        match self {
            DependencyRef::Token(token) => Some(token.clone()),
            DependencyRef::Name(name) => table.token(name).cloned(),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            DependencyRef::Token(token) => token.name(),
            DependencyRef::Name(name) => name,
        }
    }
}

/// The normalized result of executing a loaded unit.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    /// Unique plugin id.
    pub id: String,

    /// Whether the host should activate the plugin immediately.
    pub auto_start: bool,

    /// Fully resolved required dependencies, in declaration order.
    pub requires: Vec<Token>,

    /// Resolved optional dependencies; entries that failed to resolve have
    /// been dropped.
    pub optional: Vec<Token>,

    /// Callable invoked by the host with the resolved dependencies.
    pub activate: Value,
}

impl PluginDescriptor {
    /// Validate and translate a produced value into a descriptor.
    ///
    /// `requires` must resolve completely; a missing required dependency is
    /// fatal. `optional` resolves best-effort with a warning per miss.
    pub fn from_value(value: &Value, table: &CapabilityTable) -> Result<Self, LoadError> {
        let object = value.as_object().ok_or_else(|| {
            LoadError::InvalidDescriptor(format!(
                "plugin must be an object, got a {}",
                value.type_name()
            ))
        })?;

        let id = match object.get("id") {
            Some(Value::Str(id)) if !id.is_empty() => id.clone(),
            Some(other) => {
                return Err(LoadError::InvalidDescriptor(format!(
                    "plugin id must be a non-empty string, got a {}",
                    other.type_name()
                )));
            }
            None => {
                return Err(LoadError::InvalidDescriptor(
                    "plugin id is missing".to_string(),
                ));
            }
        };

        let auto_start = match object.get("autoStart") {
            Some(Value::Bool(b)) => *b,
            None => false,
            Some(other) => {
                return Err(LoadError::InvalidDescriptor(format!(
                    "autoStart must be a boolean, got a {}",
                    other.type_name()
                )));
            }
        };

        let activate = match object.get("activate") {
            Some(value) if value.is_callable() => value.clone(),
            Some(other) => {
                return Err(LoadError::InvalidDescriptor(format!(
                    "activate must be a function, got a {}",
                    other.type_name()
                )));
            }
            None => {
                return Err(LoadError::InvalidDescriptor(
                    "activate function is missing".to_string(),
                ));
            }
        };

        let requires = dependency_refs(object.get("requires"))?
            .into_iter()
            .map(|entry| {
                entry.translate(table).ok_or_else(|| {
                    LoadError::RequiredTokenMissing(entry.display_name().to_string())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let optional = dependency_refs(object.get("optional"))?
            .into_iter()
            .filter_map(|entry| {
                let token = entry.translate(table);
                if token.is_none() {
                    warn!(
                        token = %entry.display_name(),
                        "optional token not found in the capability table; dropping"
                    );
                }
                token
            })
            .collect();

        Ok(Self {
            id,
            auto_start,
            requires,
            optional,
            activate,
        })
    }
}

fn dependency_refs(value: Option<&Value>) -> Result<Vec<DependencyRef>, LoadError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(entries)) => entries.iter().map(DependencyRef::from_value).collect(),
        Some(other) => Err(LoadError::InvalidDescriptor(format!(
            "dependency lists must be arrays, got a {}",
            other.type_name()
        ))),
    }
}

/// One level of indirection: a callable result is invoked once with no
/// arguments to obtain the descriptor value. Anything else is already the
/// final value — awaitables collapse during evaluation.
pub async fn normalize(interpreter: &Interpreter, value: Value) -> RuntimeResult<Value> {
    if value.is_callable() {
        interpreter.call(&value, Vec::new()).await
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(key: &str) -> (CapabilityTable, Token) {
        let mut table = CapabilityTable::new();
        let token = Token::new(key);
        table.register_token(key, token.clone());
        (table, token)
    }

    fn activate_stub() -> Value {
        Value::Native(scriptforge_runtime::NativeFunction::new("activate", |_| {
            Box::pin(async { Ok(Value::Null) })
        }))
    }

    #[test]
    fn test_descriptor_translates_required_names() {
        let (table, token) = table_with("pkg:Token");
        let value = Value::object([
            ("id".to_string(), Value::Str("x".to_string())),
            ("autoStart".to_string(), Value::Bool(true)),
            (
                "requires".to_string(),
                Value::Array(vec![Value::Str("pkg:Token".to_string())]),
            ),
            ("activate".to_string(), activate_stub()),
        ]);

        let descriptor = PluginDescriptor::from_value(&value, &table).unwrap();
        assert_eq!(descriptor.id, "x");
        assert!(descriptor.auto_start);
        assert_eq!(descriptor.requires, vec![token]);
        assert!(descriptor.optional.is_empty());
    }

    #[test]
    fn test_token_entries_pass_through() {
        let table = CapabilityTable::new();
        let token = Token::new("pkg:Direct");
        let value = Value::object([
            ("id".to_string(), Value::Str("x".to_string())),
            (
                "requires".to_string(),
                Value::Array(vec![Value::Token(token.clone())]),
            ),
            ("activate".to_string(), activate_stub()),
        ]);

        let descriptor = PluginDescriptor::from_value(&value, &table).unwrap();
        assert_eq!(descriptor.requires, vec![token]);
    }

    #[test]
    fn test_missing_required_token_is_fatal() {
        let table = CapabilityTable::new();
        let value = Value::object([
            ("id".to_string(), Value::Str("x".to_string())),
            (
                "requires".to_string(),
                Value::Array(vec![Value::Str("pkg:Missing".to_string())]),
            ),
            ("activate".to_string(), activate_stub()),
        ]);

        let err = PluginDescriptor::from_value(&value, &table).unwrap_err();
        assert!(matches!(err, LoadError::RequiredTokenMissing(name) if name == "pkg:Missing"));
    }

    #[test]
    fn test_missing_optional_token_is_dropped() {
        let (table, token) = table_with("pkg:Present");
        let value = Value::object([
            ("id".to_string(), Value::Str("x".to_string())),
            (
                "optional".to_string(),
                Value::Array(vec![
                    Value::Str("pkg:Present".to_string()),
                    Value::Str("pkg:Absent".to_string()),
                ]),
            ),
            ("activate".to_string(), activate_stub()),
        ]);

        let descriptor = PluginDescriptor::from_value(&value, &table).unwrap();
        assert_eq!(descriptor.optional, vec![token]);
    }

    #[test]
    fn test_invalid_shapes_are_rejected() {
        let table = CapabilityTable::new();
        assert!(matches!(
            PluginDescriptor::from_value(&Value::Number(1.0), &table),
            Err(LoadError::InvalidDescriptor(_))
        ));

        let missing_activate = Value::object([("id".to_string(), Value::Str("x".to_string()))]);
        assert!(matches!(
            PluginDescriptor::from_value(&missing_activate, &table),
            Err(LoadError::InvalidDescriptor(_))
        ));
    }

    #[tokio::test]
    async fn test_normalize_invokes_factories_once() {
        let interpreter = Interpreter::new();
        let factory = interpreter
            .evaluate_expression("() => ({ id: 'made' })")
            .await
            .unwrap();
        let value = normalize(&interpreter, factory).await.unwrap();
        assert_eq!(value.member("id"), Some(&Value::Str("made".to_string())));

        let plain = Value::Str("already".to_string());
        let value = normalize(&interpreter, plain.clone()).await.unwrap();
        assert_eq!(value, plain);
    }
}
