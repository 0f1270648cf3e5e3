//! Rewrites module source into the body of an async function.
//!
//! Import declarations become awaited calls to the injected import function
//! and exports accumulate into a synthesized trailing `return { ... }`
//! statement, so the output has no dependency on a native module loader.
//! Statements that need no rewriting are spliced back verbatim.

use tracing::warn;

use crate::ast::{ImportDecl, Span, Stmt};
use crate::error::TranspileError;
use crate::parser::parse_program;
use crate::statement::ImportStatement;

/// Name of the injected import function parameter in generated bodies.
pub const IMPORT_FUNCTION_NAME: &str = "_PLUGIN_IMPORT";

/// Rewrites one source unit at a time. Stateless; construct once and reuse.
#[derive(Debug, Default)]
pub struct Transpiler;

impl Transpiler {
    pub fn new() -> Self {
        Self
    }

    /// Transpile a module source unit into a directly executable function
    /// body. With `require_default_export`, a unit without a default export
    /// fails with [`TranspileError::NoDefaultExport`] instead of emitting a
    /// return statement.
    pub fn transpile(
        &self,
        source: &str,
        require_default_export: bool,
    ) -> Result<String, TranspileError> {
        let program = parse_program(source)?;

        let mut out = String::new();
        // exported name -> local expression text, in declaration order
        let mut exports: Vec<(String, String)> = Vec::new();
        let mut default_export: Option<String> = None;

        for item in &program.items {
            match &item.stmt {
                Stmt::Import(decl) => {
                    let records = collect_imports(decl);
                    if records.is_empty() {
                        warn!(
                            module = %decl.module,
                            "unsupported import shape left unrewritten: {}",
                            slice(source, item.span)
                        );
                        out.push_str(slice(source, item.span));
                        out.push('\n');
                        continue;
                    }
                    for record in records {
                        let payload = serde_json::to_string(&record)?;
                        out.push_str(&format!(
                            "const {} = await {}({});\n",
                            record.binding_name(),
                            IMPORT_FUNCTION_NAME,
                            payload
                        ));
                    }
                }
                Stmt::ExportNamed(decl) => {
                    if decl.module.is_some() {
                        warn!(
                            "re-export is not supported and was dropped: {}",
                            slice(source, item.span)
                        );
                        continue;
                    }
                    for specifier in &decl.specifiers {
                        let exported = specifier
                            .alias
                            .clone()
                            .unwrap_or_else(|| specifier.name.clone());
                        exports.push((exported, specifier.name.clone()));
                    }
                }
                Stmt::ExportDecl { decl, decl_span } => {
                    exports.push((decl.name.clone(), decl.name.clone()));
                    out.push_str(slice(source, *decl_span));
                    out.push_str(";\n");
                }
                Stmt::ExportDefault { expr_span, .. } => {
                    default_export = Some(slice(source, *expr_span).to_string());
                }
                _ => {
                    out.push_str(slice(source, item.span));
                    out.push('\n');
                }
            }
        }

        if require_default_export && default_export.is_none() {
            return Err(TranspileError::NoDefaultExport);
        }

        out.push_str("return {");
        let mut first = true;
        for (exported, local) in &exports {
            if !first {
                out.push(',');
            }
            first = false;
            out.push_str(&format!(" {}: {}", object_key(exported), local));
        }
        if let Some(expr) = &default_export {
            if !first {
                out.push(',');
            }
            out.push_str(&format!(" default: ({})", expr));
        }
        out.push_str(" };\n");

        Ok(out)
    }
}

/// Extract one [`ImportStatement`] record per imported binding, in source
/// order: default binding first, then namespace, then named bindings.
pub fn collect_imports(decl: &ImportDecl) -> Vec<ImportStatement> {
    let mut records = Vec::new();
    if let Some(name) = &decl.default {
        records.push(ImportStatement::default_import(
            name.clone(),
            decl.module.clone(),
            decl.type_only,
        ));
    }
    if let Some(name) = &decl.namespace {
        records.push(ImportStatement::namespace(
            name.clone(),
            decl.module.clone(),
            decl.type_only,
        ));
    }
    for specifier in &decl.named {
        records.push(ImportStatement::named(
            specifier.name.clone(),
            specifier.alias.clone(),
            decl.module.clone(),
            decl.type_only || specifier.type_only,
        ));
    }
    records
}

fn slice(source: &str, span: Span) -> &str {
    &source[span.start..span.end]
}

fn object_key(name: &str) -> String {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first == '_' || first == '$' || first.is_alphabetic())
                && chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
        }
        None => false,
    };
    if valid {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}
