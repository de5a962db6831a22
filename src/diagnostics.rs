//! Diagnostics for the template compiler.
//!
//! Every user-facing failure is a [`CompilerError`] carrying a stable code, a
//! category, a message and a source location. Warnings never abort a
//! compilation and travel in a separate list.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const PARSE_MISSING_ROOT: &str = "TPL-PARSE-001";
pub const PARSE_CONTENT_OUTSIDE_ROOT: &str = "TPL-PARSE-002";
pub const PARSE_MALFORMED_TAG: &str = "TPL-PARSE-003";
pub const PARSE_UNCLOSED_ELEMENT: &str = "TPL-PARSE-004";
pub const PARSE_MISMATCHED_CLOSING_TAG: &str = "TPL-PARSE-005";
pub const PARSE_INVALID_ATTRIBUTE: &str = "TPL-PARSE-006";
pub const PARSE_AMBIGUOUS_ATTRIBUTE_VALUE: &str = "TPL-PARSE-007";
pub const PARSE_SELF_CLOSING_NON_VOID: &str = "TPL-PARSE-008";
pub const PARSE_UNCLOSED_EXPRESSION: &str = "TPL-PARSE-009";

pub const VAL_ROOT_ATTRIBUTE: &str = "TPL-VAL-001";
pub const VAL_TEMPLATE_WITHOUT_DIRECTIVE: &str = "TPL-VAL-002";
pub const VAL_UNKNOWN_DIRECTIVE: &str = "TPL-VAL-003";
pub const VAL_MULTIPLE_CONTROL_DIRECTIVES: &str = "TPL-VAL-004";
pub const VAL_ELSE_WITHOUT_IF: &str = "TPL-VAL-005";
pub const VAL_DIRECTIVE_VALUE: &str = "TPL-VAL-006";
pub const VAL_FOR_EACH_MISSING_ITEM: &str = "TPL-VAL-007";
pub const VAL_FOR_ITEM_WITHOUT_EACH: &str = "TPL-VAL-008";
pub const VAL_INVALID_IDENTIFIER: &str = "TPL-VAL-009";
pub const VAL_DYNAMIC_SLOT_NAME: &str = "TPL-VAL-010";
pub const VAL_SLOT_BIND_REQUIRES_LIGHT_DOM: &str = "TPL-VAL-011";
pub const VAL_SLOT_DATA_PLACEMENT: &str = "TPL-VAL-012";
pub const VAL_UNKNOWN_COMPONENT: &str = "TPL-VAL-013";
pub const VAL_MISSING_LWC_IS: &str = "TPL-VAL-014";
pub const VAL_LWC_IS_PLACEMENT: &str = "TPL-VAL-015";
pub const VAL_FORBIDDEN_TAG: &str = "TPL-VAL-016";
pub const VAL_FORBIDDEN_ATTRIBUTE: &str = "TPL-VAL-017";
pub const VAL_ATTRIBUTE_CASE: &str = "TPL-VAL-018";
pub const VAL_INVALID_TABINDEX: &str = "TPL-VAL-019";
pub const VAL_LISTENER_NOT_EXPRESSION: &str = "TPL-VAL-020";
pub const VAL_INVALID_EXPRESSION: &str = "TPL-VAL-021";
pub const VAL_DISALLOWED_EXPRESSION: &str = "TPL-VAL-022";
pub const VAL_SCOPED_SLOT_PLACEMENT: &str = "TPL-VAL-023";
pub const VAL_DUPLICATE_SLOT: &str = "TPL-VAL-024";
pub const VAL_MIXED_SLOT_CONTENT: &str = "TPL-VAL-025";

pub const CFG_DYNAMIC_COMPONENTS_DISABLED: &str = "TPL-CFG-001";
pub const CFG_DYNAMIC_DIRECTIVE_DISABLED: &str = "TPL-CFG-002";
pub const CFG_INVALID_CONFIG: &str = "TPL-CFG-003";

pub const INT_UNEXPECTED_NODE: &str = "TPL-INT-001";
pub const INT_MISSING_KEY: &str = "TPL-INT-002";

pub const W_HTML_QUIRK: &str = "TPL-WARN-001";
pub const W_DEPRECATED_DIRECTIVE: &str = "TPL-WARN-002";
pub const W_MISSING_LOOP_KEY: &str = "TPL-WARN-003";
pub const W_KEY_OUTSIDE_ITERATION: &str = "TPL-WARN-004";

// ═══════════════════════════════════════════════════════════════════════════════
// HINTS
// ═══════════════════════════════════════════════════════════════════════════════

fn get_hint(code: &str) -> Option<&'static str> {
    match code {
        PARSE_MISSING_ROOT => Some("Wrap the markup in a single root <template> element."),
        PARSE_AMBIGUOUS_ATTRIBUTE_VALUE => {
            Some("Remove the quotes to bind an expression, or escape the brace to keep a string.")
        }
        PARSE_SELF_CLOSING_NON_VOID => Some("Use an explicit closing tag."),
        VAL_MULTIPLE_CONTROL_DIRECTIVES => {
            Some("Move one of the directives to a wrapping <template> element.")
        }
        VAL_ELSE_WITHOUT_IF => {
            Some("lwc:elseif and lwc:else must immediately follow a sibling with lwc:if or lwc:elseif.")
        }
        VAL_DISALLOWED_EXPRESSION => Some(
            "Template expressions may only use member access, literals, !, &&, ||, ??, ?: and +.",
        ),
        VAL_SLOT_BIND_REQUIRES_LIGHT_DOM => {
            Some("Add lwc:render-mode=\"light\" to the root template.")
        }
        CFG_DYNAMIC_COMPONENTS_DISABLED => Some("Set enableDynamicComponents to true."),
        CFG_DYNAMIC_DIRECTIVE_DISABLED => Some("Set experimentalDynamicDirective to true."),
        INT_UNEXPECTED_NODE | INT_MISSING_KEY => Some("This is a compiler defect, not a template error."),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// 1-based position in the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        SourceLocation { line, column }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
    pub file: String,
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Parse,
    Validation,
    Configuration,
    Internal,
}

impl ErrorCategory {
    fn of(code: &str) -> Self {
        if code.starts_with("TPL-PARSE") {
            ErrorCategory::Parse
        } else if code.starts_with("TPL-CFG") {
            ErrorCategory::Configuration
        } else if code.starts_with("TPL-INT") {
            ErrorCategory::Internal
        } else {
            ErrorCategory::Validation
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message} ({location})")]
pub struct CompilerError {
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    pub location: ErrorLocation,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_hints(code, message, file, line, column, vec![])
    }

    pub fn with_hints(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        mut hints: Vec<String>,
    ) -> Self {
        if let Some(hint) = get_hint(code) {
            hints.push(hint.to_string());
        }
        CompilerError {
            code: code.to_string(),
            category: ErrorCategory::of(code),
            message: message.to_string(),
            location: ErrorLocation {
                line,
                column,
                file: file.to_string(),
            },
            hints,
        }
    }

    pub fn at(code: &str, message: &str, file: &str, location: SourceLocation) -> Self {
        Self::new(code, message, file, location.line, location.column)
    }

    /// An unreachable compiler state. Logged apart from user-facing errors.
    pub fn internal(code: &str, message: &str, file: &str, location: SourceLocation) -> Self {
        log::error!(
            target: "template_compiler::internal",
            "[{}] {} at {}:{}:{}",
            code,
            message,
            file,
            location.line,
            location.column
        );
        Self::at(code, message, file, location)
    }

    pub fn is_internal(&self) -> bool {
        self.category == ErrorCategory::Internal
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerWarning {
    pub code: String,
    pub message: String,
    pub location: ErrorLocation,
}

impl CompilerWarning {
    pub fn at(code: &str, message: &str, file: &str, location: SourceLocation) -> Self {
        log::warn!(
            "[{}] {} at {}:{}:{}",
            code,
            message,
            file,
            location.line,
            location.column
        );
        CompilerWarning {
            code: code.to_string(),
            message: message.to_string(),
            location: ErrorLocation {
                line: location.line,
                column: location.column,
                file: file.to_string(),
            },
        }
    }
}

/// Structured failure of one compilation. No partial output survives it.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("template compilation failed with {} error(s)", .errors.len())]
pub struct CompileFailure {
    pub errors: Vec<CompilerError>,
    pub warnings: Vec<CompilerWarning>,
}

impl CompileFailure {
    pub fn first(&self) -> Option<&CompilerError> {
        self.errors.first()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Marker returned when the collector decides the current pass must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort;

pub type Step<T> = Result<T, Abort>;

/// Gathers errors and warnings for one compilation unit.
///
/// In fail-fast mode the first error aborts the pass. In collect-all mode
/// errors accumulate and the pass keeps going so one run reports everything.
#[derive(Debug)]
pub struct Diagnostics {
    file: String,
    collect_all: bool,
    errors: Vec<CompilerError>,
    warnings: Vec<CompilerWarning>,
}

impl Diagnostics {
    pub fn new(file: &str, collect_all: bool) -> Self {
        Diagnostics {
            file: file.to_string(),
            collect_all,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn error(&mut self, code: &str, message: &str, location: SourceLocation) -> Step<()> {
        let error = CompilerError::at(code, message, &self.file, location);
        self.push_error(error)
    }

    pub fn push_error(&mut self, error: CompilerError) -> Step<()> {
        log::debug!("template error: {}", error);
        self.errors.push(error);
        if self.collect_all {
            Ok(())
        } else {
            Err(Abort)
        }
    }

    pub fn warn(&mut self, code: &str, message: &str, location: SourceLocation) {
        let warning = CompilerWarning::at(code, message, &self.file, location);
        self.warnings.push(warning);
    }

    pub fn extend_warnings(&mut self, warnings: Vec<CompilerWarning>) {
        self.warnings.extend(warnings);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[CompilerError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[CompilerWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<CompilerWarning> {
        self.warnings
    }

    pub fn into_failure(self) -> CompileFailure {
        CompileFailure {
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}
