//! One full plugin load cycle.
//!
//! `load` transpiles a source unit, executes the generated body with the
//! import resolver injected, normalizes the produced value into a plugin
//! descriptor and translates its dependency names into capability tokens.
//! `load_file` is the narrower form the local-file resolution tier uses
//! recursively: no default-export enforcement, no descriptor
//! normalization.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use scriptforge_runtime::{
    CapabilityTable, ImportFunction, Interpreter, RuntimeError, TranspileError, Transpiler, Value,
};
use tracing::{debug, info, warn};

use crate::descriptor::{normalize, PluginDescriptor};
use crate::error::{LoadError, LoadingError};
use crate::host::HostContext;
use crate::resolver::{ImportResolver, ModuleSourceLoader};

/// Starter source for a new plugin file.
pub const PLUGIN_TEMPLATE: &str = r#"import { ICommandRegistry } from '@host/commands';

/**
 * This is an example hello world plugin.
 */
const plugin = {
  id: 'hello-world:plugin',
  autoStart: true,
  requires: ['@host/commands:ICommandRegistry'],
  activate: (commands) => {
    console.log('Hello World!');
  },
};

export default plugin;
"#;

/// A loaded plugin together with its provenance, kept for user-facing
/// diagnostics.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub plugin: PluginDescriptor,

    /// The final generated code text that actually ran.
    pub code: String,

    /// Whether structural rewriting succeeded or the loader fell back to
    /// legacy whole-expression evaluation.
    pub transpiled: bool,

    /// Configuration schema discovered near the unit's base path, if any.
    pub schema: Option<serde_json::Value>,
}

/// Orchestrates load cycles for one load session.
///
/// The capability table is a snapshot taken at construction; the host
/// builds a fresh loader per load session so registry changes made while a
/// load is in flight never affect it.
pub struct PluginLoader {
    this: Weak<PluginLoader>,
    table: CapabilityTable,
    host: HostContext,
    transpiler: Transpiler,
    interpreter: Interpreter,
}

impl PluginLoader {
    pub fn new(table: CapabilityTable, host: HostContext) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            table,
            host,
            transpiler: Transpiler::new(),
            interpreter: Interpreter::new(),
        })
    }

    pub fn capability_table(&self) -> &CapabilityTable {
        &self.table
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Load a plugin from module source text. `base_path` is the path of
    /// the unit itself, used to resolve its relative imports and to
    /// discover an associated configuration schema.
    pub async fn load(
        &self,
        source: &str,
        base_path: Option<&Path>,
    ) -> Result<LoadResult, LoadError> {
        let (code, transpiled) = match self.transpiler.transpile(source, true) {
            Ok(code) => (code, true),
            Err(TranspileError::NoDefaultExport) => {
                debug!("no default export found; falling back to legacy expression evaluation");
                (source.to_string(), false)
            }
            Err(error) => return Err(LoadError::Transpile(error)),
        };

        let produced = if transpiled {
            let resolver = self.resolver(base_path.map(Path::to_path_buf));
            self.interpreter.execute_module_body(&code, resolver).await
        } else {
            self.interpreter.evaluate_expression(&code).await
        };
        let produced = match produced {
            Ok(value) => value,
            Err(cause) => return Err(self.loading_error(code, transpiled, cause)),
        };

        let plugin_value = if transpiled {
            produced.member("default").cloned().unwrap_or(Value::Null)
        } else {
            produced
        };

        let plugin_value = match normalize(&self.interpreter, plugin_value).await {
            Ok(value) => value,
            Err(cause) => return Err(self.loading_error(code, transpiled, cause)),
        };

        let plugin = PluginDescriptor::from_value(&plugin_value, &self.table)?;
        let schema = self.discover_schema(base_path).await;

        info!(plugin = %plugin.id, transpiled, "loaded plugin");
        Ok(LoadResult {
            plugin,
            code,
            transpiled,
            schema,
        })
    }

    /// Load a module source unit and return its exports object. Used
    /// recursively by the local-file resolution tier.
    pub async fn load_file(
        &self,
        source: &str,
        base_path: Option<&Path>,
    ) -> Result<Value, LoadError> {
        let code = self
            .transpiler
            .transpile(source, false)
            .map_err(LoadError::Transpile)?;
        let resolver = self.resolver(base_path.map(Path::to_path_buf));
        match self.interpreter.execute_module_body(&code, resolver).await {
            Ok(exports) => Ok(exports),
            Err(cause) => Err(self.loading_error(code, true, cause)),
        }
    }

    /// Fresh resolver for one execution, carrying the unit's base path and
    /// this loader for recursive local-file loads.
    fn resolver(&self, base_path: Option<PathBuf>) -> Arc<dyn ImportFunction> {
        let loader = self
            .this
            .upgrade()
            .expect("PluginLoader is always accessed through its Arc");
        Arc::new(ImportResolver::new(
            self.table.clone(),
            self.host.clone(),
            base_path,
            loader,
        ))
    }

    /// Wrap an execution failure with the generated code for diagnostics.
    /// Import failures were already surfaced by the resolver and are not
    /// reported again.
    fn loading_error(&self, code: String, transpiled: bool, cause: RuntimeError) -> LoadError {
        let error = LoadingError {
            code,
            transpiled,
            cause,
        };
        if !matches!(error.cause, RuntimeError::Import(_)) {
            self.host.reporter.loading_failed(&error);
        }
        LoadError::Loading(error)
    }

    /// Probe a small fixed set of candidate paths near the unit's base
    /// path for a configuration schema. Never an error: the schema is
    /// supplementary data.
    async fn discover_schema(&self, base_path: Option<&Path>) -> Option<serde_json::Value> {
        let base = base_path?;
        let files = self.host.files.as_ref()?;
        let stem = base.file_stem()?.to_str()?;
        let dir = base.parent().unwrap_or_else(|| Path::new(""));

        let candidates = [
            dir.join(format!("{}.schema.json", stem)),
            dir.join("schema").join(format!("{}.json", stem)),
        ];
        for candidate in candidates {
            let text = match files.read(&candidate).await {
                Ok(text) => text,
                Err(_) => continue,
            };
            match serde_json::from_str(&text) {
                Ok(schema) => {
                    debug!(path = %candidate.display(), "discovered configuration schema");
                    return Some(schema);
                }
                Err(error) => {
                    warn!(
                        path = %candidate.display(),
                        "ignoring malformed configuration schema: {}",
                        error
                    );
                }
            }
        }
        None
    }
}

#[async_trait]
impl ModuleSourceLoader for PluginLoader {
    async fn load_module_source(
        &self,
        source: &str,
        base_path: Option<PathBuf>,
    ) -> Result<Value, LoadError> {
        self.load_file(source, base_path.as_deref()).await
    }
}
