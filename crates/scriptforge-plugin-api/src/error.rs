//! Error types for plugin loading and import resolution.

use scriptforge_runtime::{RuntimeError, TranspileError};
use thiserror::Error;

/// Errors surfaced by host collaborators (files, network, config store).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl HostError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Errors raised while resolving a single import statement.
///
/// Each failing import is reported to the host's error surface exactly once
/// before the error propagates.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot resolve import of local module {module}: file access is not available")]
    FileAccessUnavailable { module: String },

    #[error("cannot resolve import of local module {module}: the base path was not provided")]
    BasePathMissing { module: String },

    #[error("local module {module} was not found in {dir}")]
    LocalFileNotFound { module: String, dir: String },

    #[error("module {module} requires execution of code from CDN but it is not allowed")]
    CdnForbidden { module: String },

    #[error("user aborted execution when asked for consent about {module}")]
    ConsentAborted { module: String },

    #[error("failed to fetch module {module}: {message}")]
    Fetch { module: String, message: String },

    #[error("could not resolve the module {module}")]
    NotFound { module: String },

    /// A recursively loaded local module failed. If the nested failure was
    /// itself an import failure it has already been reported.
    #[error("loading local module {module} failed: {source}")]
    NestedLoad {
        module: String,
        #[source]
        source: Box<LoadError>,
    },

    #[error(transparent)]
    Host(#[from] HostError),
}

impl ResolveError {
    /// Whether this failure was already presented to the user by a nested
    /// resolution, so ancestors must not report it again.
    pub fn already_surfaced(&self) -> bool {
        match self {
            ResolveError::NestedLoad { source, .. } => matches!(
                source.as_ref(),
                LoadError::Loading(LoadingError {
                    cause: RuntimeError::Import(_),
                    ..
                })
            ),
            _ => false,
        }
    }
}

/// An exception raised while executing generated code, wrapped together
/// with the code that actually ran. Diagnostics must show the generated
/// text, not the original source, because bugs frequently originate in the
/// rewriting step itself.
#[derive(Debug, Error)]
#[error("plugin loading failed: {cause}")]
pub struct LoadingError {
    /// The final generated code text.
    pub code: String,
    /// Whether structural rewriting succeeded or the loader fell back to
    /// legacy whole-expression evaluation.
    pub transpiled: bool,
    #[source]
    pub cause: RuntimeError,
}

/// Errors raised by one full load cycle.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Malformed source unit; propagates as-is.
    #[error(transparent)]
    Transpile(TranspileError),

    #[error(transparent)]
    Loading(#[from] LoadingError),

    #[error("required token `{0}` not found in the capability table")]
    RequiredTokenMissing(String),

    #[error("plugin did not produce a valid descriptor: {0}")]
    InvalidDescriptor(String),
}
