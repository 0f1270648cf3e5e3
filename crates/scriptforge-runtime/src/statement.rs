//! Import statement records.
//!
//! One `ImportStatement` is extracted per imported binding and serialized
//! into the generated code as the argument of the injected import function.
//! The serialized form uses camelCase keys because it is embedded verbatim
//! in script source and read back by the resolver at execution time.

use serde::{Deserialize, Serialize};

/// A single imported value, as written in the source unit.
///
/// Immutable once constructed. The constructors enforce that a default
/// import is never an unpacked (named) import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatement {
    /// The imported name as it appears in the source module.
    pub name: String,

    /// Local rebinding, when the source uses `name as alias`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// The module specifier string.
    pub module: String,

    /// True for named imports (`import { name } from ...`), false for
    /// default and namespace imports that bind the whole module.
    pub unpack: bool,

    /// Compile-time-only import. Resolved like any other, but a missing
    /// runtime counterpart is not worth a diagnostic.
    pub is_type_only: bool,

    /// Whole-module default binding (`import name from ...`).
    #[serde(default)]
    pub is_default: bool,
}

impl ImportStatement {
    /// `import name from 'module'`
    pub fn default_import(
        name: impl Into<String>,
        module: impl Into<String>,
        is_type_only: bool,
    ) -> Self {
        Self {
            name: name.into(),
            alias: None,
            module: module.into(),
            unpack: false,
            is_type_only,
            is_default: true,
        }
    }

    /// `import * as name from 'module'`
    pub fn namespace(
        name: impl Into<String>,
        module: impl Into<String>,
        is_type_only: bool,
    ) -> Self {
        Self {
            name: name.into(),
            alias: None,
            module: module.into(),
            unpack: false,
            is_type_only,
            is_default: false,
        }
    }

    /// `import { name } from 'module'` or `import { name as alias } from 'module'`
    pub fn named(
        name: impl Into<String>,
        alias: Option<String>,
        module: impl Into<String>,
        is_type_only: bool,
    ) -> Self {
        Self {
            name: name.into(),
            alias,
            module: module.into(),
            unpack: true,
            is_type_only,
            is_default: false,
        }
    }

    /// The identifier the rewritten binding statement declares.
    pub fn binding_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// The `"module:name"` key used for capability token lookup.
    pub fn token_key(&self) -> String {
        format!("{}:{}", self.module, self.name)
    }

    /// Whether the specifier is a path-relative local import.
    pub fn is_relative(&self) -> bool {
        self.module.starts_with('.')
    }

    /// Render the statement back as import syntax, for diagnostics.
    pub fn to_import_snippet(&self) -> String {
        let mut tokens = vec!["import".to_string()];
        if self.is_type_only {
            tokens.push("type".to_string());
        }
        if self.is_default {
            tokens.push(self.name.clone());
        } else if self.unpack {
            let inner = match &self.alias {
                Some(alias) => format!("{} as {}", self.name, alias),
                None => self.name.clone(),
            };
            tokens.push(format!("{{ {} }}", inner));
        } else {
            tokens.push(format!("* as {}", self.name));
        }
        tokens.push("from".to_string());
        tokens.push(format!("'{}'", self.module));
        tokens.join(" ")
    }
}
