//! Layered, consent-gated import resolution.
//!
//! Resolution order, first match wins:
//!
//! 1. Token tier: `"module:name"` in the capability table's token map
//! 2. Known-module tier: the in-process module registry
//! 3. Local-file tier: relative specifiers resolved against the importing
//!    unit's own path, loaded recursively through the plugin loader
//! 4. Network tier: anything else, gated by the CDN consent policy
//!
//! Every failure is reported to the host's error surface exactly once
//! before being re-thrown; nested local loads do not cause a diagnostic
//! storm in their ancestors.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use scriptforge_runtime::{
    CapabilityTable, ImportFunction, ImportStatement, RuntimeError, RuntimeResult, Value,
};
use tracing::{debug, warn};

use crate::error::{LoadError, ResolveError};
use crate::host::HostContext;
use crate::policy::CdnPolicy;

/// Sibling extensions tried, in order, by the local-file tier.
const CANDIDATE_EXTENSIONS: [&str; 2] = ["ts", "js"];

/// Loads a module source unit recursively; implemented by the plugin
/// loader and injected back into the resolver for the local-file tier.
#[async_trait]
pub trait ModuleSourceLoader: Send + Sync {
    /// Transpile and execute a module source unit, returning its exports
    /// object. `base_path` is the path of the unit itself, used to resolve
    /// its own relative imports.
    async fn load_module_source(
        &self,
        source: &str,
        base_path: Option<PathBuf>,
    ) -> Result<Value, LoadError>;
}

/// Resolves one import statement at a time for a single load session.
pub struct ImportResolver {
    table: CapabilityTable,
    host: HostContext,
    base_path: Option<PathBuf>,
    loader: Arc<dyn ModuleSourceLoader>,
}

impl ImportResolver {
    pub fn new(
        table: CapabilityTable,
        host: HostContext,
        base_path: Option<PathBuf>,
        loader: Arc<dyn ModuleSourceLoader>,
    ) -> Self {
        Self {
            table,
            host,
            base_path,
            loader,
        }
    }

    /// Resolve an import to a capability token, a module object, or a
    /// single module member, per the statement's shape.
    pub async fn resolve(&self, statement: &ImportStatement) -> Result<Value, ResolveError> {
        match self.resolve_inner(statement).await {
            Ok(value) => Ok(value),
            Err(error) => {
                if !error.already_surfaced() {
                    self.host.reporter.import_failed(statement, &error);
                }
                Err(error)
            }
        }
    }

    async fn resolve_inner(&self, statement: &ImportStatement) -> Result<Value, ResolveError> {
        if let Some(token) = self.resolve_token(statement) {
            return Ok(token);
        }
        if let Some(value) = self.resolve_known_module(statement) {
            return Ok(value);
        }
        if let Some(value) = self.resolve_local_file(statement).await? {
            return Ok(value);
        }

        self.cdn_consent(statement).await?;
        self.resolve_remote(statement).await
    }

    /// Token tier: lets executed code import a capability token with the
    /// same syntax it would use to import a library export.
    fn resolve_token(&self, statement: &ImportStatement) -> Option<Value> {
        let key = statement.token_key();
        let token = self.table.token(&key)?;
        debug!(token = %key, "import resolved from the token map");
        Some(Value::Token(token.clone()))
    }

    fn resolve_known_module(&self, statement: &ImportStatement) -> Option<Value> {
        let module = self.table.module(&statement.module)?;
        if statement.is_default {
            // `default` member if present; otherwise the module object
            // itself, when it has anything in it at all
            if let Some(member) = module.member("default") {
                return Some(member.clone());
            }
            let non_empty = module.as_object().map(|m| !m.is_empty()).unwrap_or(false);
            if non_empty {
                return Some(module.clone());
            }
            return Some(Value::Null);
        }
        if !statement.unpack {
            return Some(module.clone());
        }
        Some(extract_named_member(module, statement))
    }

    async fn resolve_local_file(
        &self,
        statement: &ImportStatement,
    ) -> Result<Option<Value>, ResolveError> {
        if !statement.is_relative() {
            return Ok(None);
        }
        let module = statement.module.clone();
        let files = self
            .host
            .files
            .as_ref()
            .ok_or_else(|| ResolveError::FileAccessUnavailable {
                module: module.clone(),
            })?;
        let base = self
            .base_path
            .as_ref()
            .ok_or_else(|| ResolveError::BasePathMissing {
                module: module.clone(),
            })?;

        let dir = base.parent().unwrap_or_else(|| Path::new(""));
        let target = dir.join(&statement.module);
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.to_path_buf());
        let stem = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ResolveError::LocalFileNotFound {
                module: module.clone(),
                dir: parent.display().to_string(),
            })?;

        let entries = files.list(&parent).await?;
        let found = CANDIDATE_EXTENSIONS.iter().find_map(|ext| {
            let candidate = format!("{}.{}", stem, ext);
            entries.contains(&candidate).then(|| parent.join(candidate))
        });
        let path = found.ok_or_else(|| ResolveError::LocalFileNotFound {
            module: module.clone(),
            dir: parent.display().to_string(),
        })?;

        debug!(path = %path.display(), "resolving local import");
        let source = files.read(&path).await?;
        let exports = self
            .loader
            .load_module_source(&source, Some(path))
            .await
            .map_err(|error| ResolveError::NestedLoad {
                module: module.clone(),
                source: Box::new(error),
            })?;

        let value = if statement.is_default {
            exports.member("default").cloned().unwrap_or(Value::Null)
        } else if statement.unpack {
            extract_named_member(&exports, statement)
        } else {
            exports
        };
        Ok(Some(value))
    }

    /// Evaluate the CDN policy, prompting and persisting as needed, until
    /// the import is either allowed or refused.
    async fn cdn_consent(&self, statement: &ImportStatement) -> Result<(), ResolveError> {
        let module = &statement.module;
        loop {
            match self.host.config.cdn_policy().await {
                CdnPolicy::AlwaysInsecure => return Ok(()),
                CdnPolicy::Never => {
                    warn!(
                        module = %module,
                        "not loading the module: it is not a known token or module \
                         and the CDN policy is set to `never`"
                    );
                    return Err(ResolveError::CdnForbidden {
                        module: module.clone(),
                    });
                }
                CdnPolicy::OnlyTrustedPackages => {
                    if self.host.config.trusted_package(module).await.is_some() {
                        return Ok(());
                    }
                    match self.host.prompt.request_integrity(module).await {
                        Some(integrity) => {
                            self.host
                                .config
                                .set_trusted_package(module, &integrity)
                                .await?;
                        }
                        None => {
                            return Err(ResolveError::ConsentAborted {
                                module: module.clone(),
                            });
                        }
                    }
                }
                CdnPolicy::AwaitingDecision => {
                    let decision = self.host.prompt.choose_policy(module).await;
                    match decision.policy() {
                        Some(policy) => self.host.config.set_cdn_policy(policy).await?,
                        None => {
                            return Err(ResolveError::ConsentAborted {
                                module: module.clone(),
                            });
                        }
                    }
                }
            }
        }
    }

    async fn resolve_remote(&self, statement: &ImportStatement) -> Result<Value, ResolveError> {
        let module = self
            .host
            .fetcher
            .fetch(&statement.module)
            .await
            .map_err(|error| ResolveError::Fetch {
                module: statement.module.clone(),
                message: error.to_string(),
            })?;
        debug!(module = %statement.module, "import resolved from the network tier");
        if statement.unpack {
            Ok(module
                .member(&statement.name)
                .cloned()
                .unwrap_or(Value::Null))
        } else {
            Ok(module)
        }
    }
}

/// Named-member extraction shared by the known-module and local-file
/// tiers. A missing member on a non-type-only import earns a hint that the
/// import may need to be marked type-only.
fn extract_named_member(module: &Value, statement: &ImportStatement) -> Value {
    match module.member(&statement.name) {
        Some(member) => member.clone(),
        None => {
            if !statement.is_type_only {
                let suggestion = ImportStatement {
                    is_type_only: true,
                    ..statement.clone()
                };
                warn!(
                    "module {} does not have a member {}; if it is a type import, \
                     use `{}` to avoid this warning",
                    statement.module,
                    statement.name,
                    suggestion.to_import_snippet()
                );
            }
            Value::Null
        }
    }
}

#[async_trait]
impl ImportFunction for ImportResolver {
    async fn import(&self, statement: ImportStatement) -> RuntimeResult<Value> {
        self.resolve(&statement)
            .await
            .map_err(|error| RuntimeError::Import(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::host::{
        ConfigStore, ErrorReporter, InMemoryConfigStore, ModuleFetcher, UserPrompt,
    };
    use crate::policy::PolicyDecision;
    use scriptforge_runtime::Token;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        module: Value,
    }

    impl CountingFetcher {
        fn new(module: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                module,
            })
        }
    }

    #[async_trait]
    impl ModuleFetcher for CountingFetcher {
        async fn fetch(&self, _specifier: &str) -> Result<Value, HostError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.module.clone())
        }
    }

    struct ScriptedPrompt {
        decision: PolicyDecision,
        integrity: Option<String>,
    }

    #[async_trait]
    impl UserPrompt for ScriptedPrompt {
        async fn choose_policy(&self, _module: &str) -> PolicyDecision {
            self.decision
        }

        async fn request_integrity(&self, _module: &str) -> Option<String> {
            self.integrity.clone()
        }
    }

    struct CountingReporter {
        imports: AtomicUsize,
    }

    impl ErrorReporter for CountingReporter {
        fn import_failed(&self, _statement: &ImportStatement, _error: &ResolveError) {
            self.imports.fetch_add(1, Ordering::SeqCst);
        }

        fn loading_failed(&self, _error: &crate::error::LoadingError) {}
    }

    struct UnusedLoader;

    #[async_trait]
    impl ModuleSourceLoader for UnusedLoader {
        async fn load_module_source(
            &self,
            _source: &str,
            _base_path: Option<PathBuf>,
        ) -> Result<Value, LoadError> {
            Err(LoadError::InvalidDescriptor(
                "local loading is not wired in this test".to_string(),
            ))
        }
    }

    struct Fixture {
        table: CapabilityTable,
        fetcher: Arc<CountingFetcher>,
        config: Arc<InMemoryConfigStore>,
        reporter: Arc<CountingReporter>,
        prompt: ScriptedPrompt,
        base_path: Option<PathBuf>,
        files: Option<Arc<dyn crate::host::FileAccess>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                table: CapabilityTable::new(),
                fetcher: CountingFetcher::new(Value::object([(
                    "member".to_string(),
                    Value::Str("fetched".to_string()),
                )])),
                config: Arc::new(InMemoryConfigStore::new()),
                reporter: Arc::new(CountingReporter {
                    imports: AtomicUsize::new(0),
                }),
                prompt: ScriptedPrompt {
                    decision: PolicyDecision::Abort,
                    integrity: None,
                },
                base_path: None,
                files: None,
            }
        }

        fn resolver(self) -> (ImportResolver, Arc<CountingFetcher>, Arc<InMemoryConfigStore>, Arc<CountingReporter>) {
            let fetcher = Arc::clone(&self.fetcher);
            let config = Arc::clone(&self.config);
            let reporter = Arc::clone(&self.reporter);
            let host = HostContext {
                files: self.files,
                fetcher: self.fetcher,
                prompt: Arc::new(self.prompt),
                config: self.config,
                reporter: self.reporter,
            };
            (
                ImportResolver::new(self.table, host, self.base_path, Arc::new(UnusedLoader)),
                fetcher,
                config,
                reporter,
            )
        }
    }

    #[tokio::test]
    async fn test_token_tier_short_circuits() {
        let mut fixture = Fixture::new();
        let token = Token::new("pkg:Service");
        fixture.table.register_token("pkg:Service", token.clone());
        // a module with the same specifier must never be consulted
        fixture
            .table
            .register_module("pkg", Value::object([("Service".to_string(), Value::Number(9.0))]));
        let (resolver, fetcher, _, _) = fixture.resolver();

        let statement = ImportStatement::named("Service", None, "pkg", false);
        let value = resolver.resolve(&statement).await.unwrap();
        assert_eq!(value, Value::Token(token));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_known_module_member() {
        let mut fixture = Fixture::new();
        fixture.table.register_module(
            "pkg",
            Value::object([("Service".to_string(), Value::Str("svc".to_string()))]),
        );
        let (resolver, fetcher, _, _) = fixture.resolver();

        let statement = ImportStatement::named("Service", None, "pkg", false);
        let value = resolver.resolve(&statement).await.unwrap();
        assert_eq!(value, Value::Str("svc".to_string()));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_known_module_missing_member_is_null_not_error() {
        let mut fixture = Fixture::new();
        fixture
            .table
            .register_module("pkg", Value::object([("Other".to_string(), Value::Number(1.0))]));
        let (resolver, _, _, reporter) = fixture.resolver();

        let statement = ImportStatement::named("Missing", None, "pkg", true);
        let value = resolver.resolve(&statement).await.unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(reporter.imports.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_default_import_falls_back_to_module_object() {
        let mut fixture = Fixture::new();
        let module = Value::object([("Service".to_string(), Value::Number(1.0))]);
        fixture.table.register_module("pkg", module.clone());
        let (resolver, _, _, _) = fixture.resolver();

        let statement = ImportStatement::default_import("lib", "pkg", false);
        assert_eq!(resolver.resolve(&statement).await.unwrap(), module);
    }

    #[tokio::test]
    async fn test_default_import_prefers_default_member() {
        let mut fixture = Fixture::new();
        fixture.table.register_module(
            "pkg",
            Value::object([("default".to_string(), Value::Str("d".to_string()))]),
        );
        let (resolver, _, _, _) = fixture.resolver();

        let statement = ImportStatement::default_import("lib", "pkg", false);
        assert_eq!(
            resolver.resolve(&statement).await.unwrap(),
            Value::Str("d".to_string())
        );
    }

    #[tokio::test]
    async fn test_namespace_import_returns_whole_module() {
        let mut fixture = Fixture::new();
        let module = Value::object([("a".to_string(), Value::Number(1.0))]);
        fixture.table.register_module("pkg", module.clone());
        let (resolver, _, _, _) = fixture.resolver();

        let statement = ImportStatement::namespace("pkg", "pkg", false);
        assert_eq!(resolver.resolve(&statement).await.unwrap(), module);
    }

    #[tokio::test]
    async fn test_relative_import_without_file_access() {
        let (resolver, _, _, reporter) = Fixture::new().resolver();
        let statement = ImportStatement::named("Foo", None, "./local", false);
        let err = resolver.resolve(&statement).await.unwrap_err();
        assert!(matches!(err, ResolveError::FileAccessUnavailable { .. }));
        assert_eq!(reporter.imports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_relative_import_without_base_path() {
        let mut fixture = Fixture::new();
        fixture.files = Some(Arc::new(crate::host::LocalFileAccess::new()));
        let (resolver, _, _, _) = fixture.resolver();

        let statement = ImportStatement::named("Foo", None, "./local", false);
        let err = resolver.resolve(&statement).await.unwrap_err();
        assert!(matches!(err, ResolveError::BasePathMissing { .. }));
        assert!(err.to_string().contains("base path was not provided"));
    }

    #[tokio::test]
    async fn test_never_policy_refuses_without_network_call() {
        let mut fixture = Fixture::new();
        fixture.config = Arc::new(InMemoryConfigStore::with_policy(CdnPolicy::Never));
        let (resolver, fetcher, _, reporter) = fixture.resolver();

        let statement = ImportStatement::named("member", None, "remote-pkg", false);
        let err = resolver.resolve(&statement).await.unwrap_err();
        assert!(matches!(err, ResolveError::CdnForbidden { .. }));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(reporter.imports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_always_insecure_fetches_member() {
        let mut fixture = Fixture::new();
        fixture.config = Arc::new(InMemoryConfigStore::with_policy(CdnPolicy::AlwaysInsecure));
        let (resolver, fetcher, _, _) = fixture.resolver();

        let statement = ImportStatement::named("member", None, "remote-pkg", false);
        let value = resolver.resolve(&statement).await.unwrap();
        assert_eq!(value, Value::Str("fetched".to_string()));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_awaiting_decision_persists_choice_then_resolves() {
        let mut fixture = Fixture::new();
        fixture.prompt = ScriptedPrompt {
            decision: PolicyDecision::AlwaysInsecure,
            integrity: None,
        };
        let (resolver, fetcher, config, _) = fixture.resolver();

        let statement = ImportStatement::namespace("remote", "remote-pkg", false);
        resolver.resolve(&statement).await.unwrap();
        assert_eq!(config.cdn_policy().await, CdnPolicy::AlwaysInsecure);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abort_fails_without_persisting_policy() {
        let (resolver, fetcher, config, reporter) = Fixture::new().resolver();

        let statement = ImportStatement::namespace("remote", "remote-pkg", false);
        let err = resolver.resolve(&statement).await.unwrap_err();
        assert!(matches!(err, ResolveError::ConsentAborted { .. }));
        assert_eq!(config.cdn_policy().await, CdnPolicy::AwaitingDecision);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(reporter.imports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_only_trusted_packages_prompts_and_persists_integrity() {
        let mut fixture = Fixture::new();
        fixture.config = Arc::new(InMemoryConfigStore::with_policy(
            CdnPolicy::OnlyTrustedPackages,
        ));
        fixture.prompt = ScriptedPrompt {
            decision: PolicyDecision::Abort,
            integrity: Some("sha384-abc".to_string()),
        };
        let (resolver, fetcher, config, _) = fixture.resolver();

        let statement = ImportStatement::namespace("remote", "remote-pkg", false);
        resolver.resolve(&statement).await.unwrap();
        assert_eq!(
            config.trusted_package("remote-pkg").await,
            Some("sha384-abc".to_string())
        );
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_only_trusted_packages_abort_keeps_allowlist_clean() {
        let mut fixture = Fixture::new();
        fixture.config = Arc::new(InMemoryConfigStore::with_policy(
            CdnPolicy::OnlyTrustedPackages,
        ));
        let (resolver, fetcher, config, _) = fixture.resolver();

        let statement = ImportStatement::namespace("remote", "remote-pkg", false);
        let err = resolver.resolve(&statement).await.unwrap_err();
        assert!(matches!(err, ResolveError::ConsentAborted { .. }));
        assert_eq!(config.trusted_package("remote-pkg").await, None);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }
}
