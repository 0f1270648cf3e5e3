//! # scriptforge-plugin-api
//!
//! Plugin loading API for Scriptforge.
//!
//! This crate provides:
//! - The import resolver with its layered, consent-gated tiers
//! - The plugin loader orchestrating one full load cycle
//! - The CDN consent policy model
//! - Host collaborator traits (files, module fetching, prompts, config,
//!   error reporting) and default implementations
//!
//! ## Load cycle
//!
//! ```text
//! source text -> Transpiler -> executable body -> Interpreter
//!                                   ^ imports resolved per statement
//!                                   |
//!                            ImportResolver
//!                   token map / module registry / local file / network
//! ```
//!
//! The host builds a [`CapabilityTable`] snapshot and a [`HostContext`]
//! per load session, constructs a [`PluginLoader`], and receives a
//! [`LoadResult`] with a normalized [`PluginDescriptor`].
//!
//! [`CapabilityTable`]: scriptforge_runtime::CapabilityTable

pub mod descriptor;
pub mod error;
pub mod host;
pub mod loader;
pub mod policy;
pub mod resolver;

pub use descriptor::{normalize, DependencyRef, PluginDescriptor};
pub use error::{HostError, LoadError, LoadingError, ResolveError};
pub use host::{
    ConfigStore, ErrorReporter, FileAccess, HostContext, InMemoryConfigStore, LocalFileAccess,
    ModuleFetcher, NonInteractivePrompt, StaticModuleFetcher, TracingReporter, UserPrompt,
};
pub use loader::{LoadResult, PluginLoader, PLUGIN_TEMPLATE};
pub use policy::{CdnPolicy, PolicyDecision};
pub use resolver::{ImportResolver, ModuleSourceLoader};
