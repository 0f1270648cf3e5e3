//! Error types for the Scriptforge runtime.

use thiserror::Error;

/// A structural error in plugin source, with the position it was found at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Errors produced while rewriting module source into a function body.
#[derive(Debug, Error)]
pub enum TranspileError {
    /// The unit has no `export default` statement. Recoverable: the loader
    /// falls back to legacy whole-expression evaluation.
    #[error("default export not found")]
    NoDefaultExport,

    /// Malformed source unit. Propagates to the caller as-is.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An import record could not be serialized into the generated code.
    #[error("failed to serialize import statement: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised while executing generated code.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The generated body itself failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("value of type {0} is not callable")]
    NotCallable(&'static str),

    #[error("cannot read member `{property}` of {kind}")]
    NotAnObject {
        property: String,
        kind: &'static str,
    },

    #[error("type error: {0}")]
    Type(String),

    /// An import declaration survived transpilation (unsupported shape) and
    /// was reached during execution.
    #[error("import of `{module}` was not rewritten before execution")]
    UnrewrittenImport { module: String },

    /// Import resolution failed. The resolver has already surfaced this
    /// failure to the host's error reporter.
    #[error("import failed: {0}")]
    Import(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
