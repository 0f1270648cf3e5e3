//! Capability tokens and the per-load capability table.
//!
//! A token is an opaque, host-issued identifier for a service a plugin may
//! depend on. Equality is identity: two tokens with the same display name
//! registered by different hosts never compare equal.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::value::Value;

/// Opaque capability token.
#[derive(Debug, Clone, Eq)]
pub struct Token {
    name: Arc<str>,
    id: Uuid,
}

impl Token {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().into(),
            id: Uuid::new_v4(),
        }
    }

    /// Human-readable token name, conventionally `"module:name"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::hash::Hash for Token {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Snapshot of the host's service registry for one load session.
///
/// Maps `"module:name"` strings to capability tokens and module specifiers
/// to pre-loaded module objects. Both maps keep insertion order. Built once
/// per load; read-only while a load is in flight.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    tokens: IndexMap<String, Token>,
    modules: IndexMap<String, Value>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_token(&mut self, key: impl Into<String>, token: Token) {
        self.tokens.insert(key.into(), token);
    }

    /// Register a token under its own name.
    pub fn register_named_token(&mut self, token: Token) {
        self.tokens.insert(token.name().to_string(), token);
    }

    pub fn token(&self, key: &str) -> Option<&Token> {
        self.tokens.get(key)
    }

    pub fn register_module(&mut self, specifier: impl Into<String>, module: Value) {
        self.modules.insert(specifier.into(), module);
    }

    pub fn module(&self, specifier: &str) -> Option<&Value> {
        self.modules.get(specifier)
    }

    pub fn tokens(&self) -> impl Iterator<Item = (&str, &Token)> {
        self.tokens.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}
