//! # Template Compiler
//!
//! Compiles component templates into render modules.
//!
//! ## Pipeline
//!
//! 1. **Parse**: raw markup becomes a syntax tree with 1-based locations.
//!    Legacy API versions tolerate HTML quirks with a warning.
//! 2. **Build**: directives are resolved, `{...}` expressions bound, custom
//!    elements looked up through the [`TagResolver`], keys assigned in
//!    pre-order.
//! 3. **Validate**: rules that need parent context (slots, scoped slots).
//! 4. **Analyze**: subtrees are classified static, mixed or dynamic; hoistable
//!    ones go into a content-addressed fragment table.
//! 5. **Transform**: one transformer per IR node kind produces statements.
//! 6. **Emit**: statements, hoisted declarations and metadata become
//!    JavaScript.
//!
//! A failure in any stage aborts the compilation with a [`CompileFailure`];
//! no partial output is returned. Warnings never abort.

#[cfg(feature = "napi")]
use napi_derive::napi;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod expression;
pub mod fragment_table;
pub mod ir;
pub mod parse;
pub mod resolver;
pub mod static_analysis;
pub mod transform;
pub mod validate;
pub mod visitor;

#[cfg(test)]
mod lowering_tests;
#[cfg(test)]
mod parse_tests;

pub use codegen::RenderModule;
pub use config::{ApiVersion, CompilerConfig, RenderMode};
pub use diagnostics::{CompileFailure, CompilerError, CompilerWarning, ErrorCategory};
pub use resolver::{NamespaceResolver, TagResolver, TagTable};

use builder::build_ir;
use codegen::emit;
use diagnostics::Diagnostics;
use parse::{parse_template, ParseOptions};
use static_analysis::analyze;
use transform::transform;
use validate::validate_ir;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub module: RenderModule,
    pub warnings: Vec<CompilerWarning>,
}

impl CompileOutput {
    pub fn code(&self) -> &str {
        &self.module.code
    }
}

/// One template of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateJob {
    pub source: String,
    #[serde(default)]
    pub config: CompilerConfig,
}

fn fail(mut diag: Diagnostics, error: CompilerError) -> CompileFailure {
    let _ = diag.push_error(error);
    diag.into_failure()
}

pub fn compile(
    source: &str,
    config: &CompilerConfig,
    resolver: &dyn TagResolver,
) -> Result<CompileOutput, CompileFailure> {
    let file = config.file_name();
    let mut diag = Diagnostics::new(&file, config.collect_all_errors);

    let options = ParseOptions {
        file: &file,
        legacy_quirks: config.legacy_quirks(),
    };
    let parsed = match parse_template(source, &options) {
        Ok(parsed) => parsed,
        Err(error) => return Err(fail(diag, error)),
    };
    diag.extend_warnings(parsed.warnings);
    log::debug!("{}: parsed root <{}>", file, parsed.root.name);

    let tree = match build_ir(&parsed.root, config, resolver, &mut diag) {
        Ok(tree) if !diag.has_errors() => tree,
        _ => return Err(diag.into_failure()),
    };
    if validate_ir(&tree, &mut diag).is_err() || diag.has_errors() {
        return Err(diag.into_failure());
    }
    log::debug!("{}: {} IR node(s) validated", file, tree.len());

    let analysis = analyze(&tree, config);
    let mut output = match transform(&tree, &analysis, config, &file) {
        Ok(output) => output,
        Err(error) => return Err(fail(diag, error)),
    };
    diag.extend_warnings(std::mem::take(&mut output.warnings));

    let module = match emit(output, &analysis, config, &file) {
        Ok(module) => module,
        Err(error) => return Err(fail(diag, error)),
    };
    log::debug!(
        "{}: compiled with {} fragment(s), api version {}",
        file,
        module.fragments.len(),
        module.metadata.api_version
    );
    Ok(CompileOutput {
        module,
        warnings: diag.into_warnings(),
    })
}

/// Compiles independent templates in parallel. Results keep the job order.
pub fn compile_batch(
    jobs: &[TemplateJob],
    resolver: &(dyn TagResolver + Sync),
) -> Vec<Result<CompileOutput, CompileFailure>> {
    log::debug!("compiling batch of {} template(s)", jobs.len());
    jobs.par_iter()
        .map(|job| compile(&job.source, &job.config, resolver))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn compile_template_native(
    source: String,
    config_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let config = match config_json {
        Some(json) => {
            CompilerConfig::from_json(&json).map_err(|e| napi::Error::from_reason(e.to_string()))?
        }
        None => CompilerConfig::default(),
    };
    let result = match compile(&source, &config, &NamespaceResolver) {
        Ok(output) => serde_json::json!({ "success": true, "output": output }),
        Err(failure) => serde_json::json!({
            "success": false,
            "errors": failure.errors,
            "warnings": failure.warnings,
        }),
    };
    Ok(result)
}
