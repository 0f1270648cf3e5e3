//! # scriptforge-runtime
//!
//! Script transpilation and execution runtime for Scriptforge plugins.
//!
//! This crate provides:
//! - A lexer and parser for the plugin script subset
//! - The transpiler that rewrites import/export declarations into a
//!   self-contained async function body
//! - An async tree-walking interpreter that executes generated bodies
//! - Capability tokens and the per-load capability table
//!
//! ## Rewriting model
//!
//! Every import declaration becomes one binding per imported name:
//!
//! ```text
//! import { ICommandPalette } from '@host/apputils';
//! // becomes
//! const ICommandPalette = await _PLUGIN_IMPORT({...});
//! ```
//!
//! Exports accumulate into an object returned at the end of the body, so
//! the output runs with no native module loader. Resolution of each import
//! is delegated to the injected [`ImportFunction`], which lets the caller
//! substitute arbitrary strategies, including ones that require user
//! interaction or network I/O mid-import.

pub mod ast;
pub mod capability;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod statement;
pub mod transpiler;
pub mod value;

pub use capability::{CapabilityTable, Token};
pub use error::{ParseError, RuntimeError, RuntimeResult, TranspileError};
pub use interp::{Env, ImportFunction, Interpreter};
pub use statement::ImportStatement;
pub use transpiler::{Transpiler, IMPORT_FUNCTION_NAME};
pub use value::{NativeFunction, ObjectMap, Value};
