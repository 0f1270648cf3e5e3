//! Host collaborator traits injected into the resolver and loader.
//!
//! The loader and resolver never talk to the filesystem, the network, the
//! settings store or the user directly; every outward-facing concern is an
//! injected trait object so hosts can substitute their own surfaces.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use scriptforge_runtime::{ImportStatement, Value};
use tokio::sync::RwLock;
use tracing::error;

use crate::error::{HostError, LoadingError, ResolveError};
use crate::policy::{CdnPolicy, PolicyDecision};

/// File collaborator used by the local-file resolution tier and by schema
/// discovery. Absence of an instance makes relative imports fail with a
/// descriptive error rather than silently skipping the tier.
#[async_trait]
pub trait FileAccess: Send + Sync {
    /// List entry names in a directory.
    async fn list(&self, dir: &Path) -> Result<Vec<String>, HostError>;

    /// Read a file as text.
    async fn read(&self, path: &Path) -> Result<String, HostError>;
}

/// Network-capable module loader used only by the network tier.
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    /// Fetch a module object by specifier.
    async fn fetch(&self, specifier: &str) -> Result<Value, HostError>;
}

/// Modal consent dialogs. Used only for CDN policy decisions.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Ask the user to pick a CDN policy for the given module.
    async fn choose_policy(&self, module: &str) -> PolicyDecision;

    /// Ask the user for an integrity string for the given module.
    /// `None` aborts the resolution.
    async fn request_integrity(&self, module: &str) -> Option<String>;
}

/// Persists the CDN policy and the trusted-package map; scoped to exactly
/// those two keys.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn cdn_policy(&self) -> CdnPolicy;

    async fn set_cdn_policy(&self, policy: CdnPolicy) -> Result<(), HostError>;

    async fn trusted_package(&self, module: &str) -> Option<String>;

    async fn set_trusted_package(&self, module: &str, integrity: &str) -> Result<(), HostError>;
}

/// Presents formatted errors to the user. Invoked exactly once per terminal
/// failure.
pub trait ErrorReporter: Send + Sync {
    /// One import could not be resolved.
    fn import_failed(&self, statement: &ImportStatement, error: &ResolveError);

    /// Executing the generated code failed for a reason other than an
    /// already-reported import.
    fn loading_failed(&self, error: &LoadingError);
}

/// Bundle of collaborator instances injected into one loader.
#[derive(Clone)]
pub struct HostContext {
    /// File collaborator; `None` disables the local-file tier.
    pub files: Option<Arc<dyn FileAccess>>,
    pub fetcher: Arc<dyn ModuleFetcher>,
    pub prompt: Arc<dyn UserPrompt>,
    pub config: Arc<dyn ConfigStore>,
    pub reporter: Arc<dyn ErrorReporter>,
}

/// File access over the local filesystem.
#[derive(Debug, Default)]
pub struct LocalFileAccess;

impl LocalFileAccess {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileAccess for LocalFileAccess {
    async fn list(&self, dir: &Path) -> Result<Vec<String>, HostError> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(entries)
    }

    async fn read(&self, path: &Path) -> Result<String, HostError> {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

/// Module fetcher backed by a fixed specifier map. Useful for tests and for
/// hosts that pre-bundle every remote module.
#[derive(Debug, Default)]
pub struct StaticModuleFetcher {
    modules: HashMap<String, Value>,
}

impl StaticModuleFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, specifier: impl Into<String>, module: Value) -> Self {
        self.modules.insert(specifier.into(), module);
        self
    }
}

#[async_trait]
impl ModuleFetcher for StaticModuleFetcher {
    async fn fetch(&self, specifier: &str) -> Result<Value, HostError> {
        self.modules
            .get(specifier)
            .cloned()
            .ok_or_else(|| HostError::other(format!("module {} is not available", specifier)))
    }
}

/// Prompt for headless hosts: never consents to anything.
#[derive(Debug, Default)]
pub struct NonInteractivePrompt;

#[async_trait]
impl UserPrompt for NonInteractivePrompt {
    async fn choose_policy(&self, _module: &str) -> PolicyDecision {
        PolicyDecision::Abort
    }

    async fn request_integrity(&self, _module: &str) -> Option<String> {
        None
    }
}

struct ConfigState {
    policy: CdnPolicy,
    trusted: HashMap<String, String>,
}

/// In-memory configuration store.
pub struct InMemoryConfigStore {
    state: RwLock<ConfigState>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::with_policy(CdnPolicy::default())
    }

    pub fn with_policy(policy: CdnPolicy) -> Self {
        Self {
            state: RwLock::new(ConfigState {
                policy,
                trusted: HashMap::new(),
            }),
        }
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn cdn_policy(&self) -> CdnPolicy {
        self.state.read().await.policy
    }

    async fn set_cdn_policy(&self, policy: CdnPolicy) -> Result<(), HostError> {
        self.state.write().await.policy = policy;
        Ok(())
    }

    async fn trusted_package(&self, module: &str) -> Option<String> {
        self.state.read().await.trusted.get(module).cloned()
    }

    async fn set_trusted_package(&self, module: &str, integrity: &str) -> Result<(), HostError> {
        self.state
            .write()
            .await
            .trusted
            .insert(module.to_string(), integrity.to_string());
        Ok(())
    }
}

/// Error reporter that routes diagnostics to structured logging.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn import_failed(&self, statement: &ImportStatement, error: &ResolveError) {
        error!(
            import = %statement.to_import_snippet(),
            module = %statement.module,
            "import in plugin code failed: {}",
            error
        );
    }

    fn loading_failed(&self, error: &LoadingError) {
        error!(
            transpiled = error.transpiled,
            "plugin loading failed: {}\nfinal code:\n{}",
            error.cause,
            error.code
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_config_round_trip() {
        let store = InMemoryConfigStore::new();
        assert_eq!(store.cdn_policy().await, CdnPolicy::AwaitingDecision);

        store.set_cdn_policy(CdnPolicy::Never).await.unwrap();
        assert_eq!(store.cdn_policy().await, CdnPolicy::Never);

        assert_eq!(store.trusted_package("pkg").await, None);
        store.set_trusted_package("pkg", "sha384-abc").await.unwrap();
        assert_eq!(
            store.trusted_package("pkg").await,
            Some("sha384-abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_static_fetcher_serves_registered_modules() {
        let module = Value::object([("member".to_string(), Value::Number(1.0))]);
        let fetcher = StaticModuleFetcher::new().with_module("pkg", module.clone());
        assert_eq!(fetcher.fetch("pkg").await.unwrap(), module);
        assert!(fetcher.fetch("other").await.is_err());
    }

    #[tokio::test]
    async fn test_local_file_access_lists_and_reads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mod.ts"), "export const x = 1;").unwrap();

        let files = LocalFileAccess::new();
        let entries = files.list(dir.path()).await.unwrap();
        assert!(entries.contains(&"mod.ts".to_string()));

        let text = files.read(&dir.path().join("mod.ts")).await.unwrap();
        assert_eq!(text, "export const x = 1;");
    }
}
