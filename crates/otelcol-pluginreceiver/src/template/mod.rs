//! Text template engine for plugin definitions
//!
//! Plugin templates use the `{{ }}` action syntax of Go's `text/template`.
//! The engine here implements the subset plugin authors rely on:
//!
//! - `{{ .field.chain }}`, `{{ $ }}`, `{{ $var := ... }}` and `{{ $var = ... }}`
//! - `{{- ` and ` -}}` trim markers and `{{/* comments */}}`
//! - `if` / `else if` / `else`, `with` / `else`, `range` / `else` with
//!   `break` and `continue`
//! - `define`, `template` and `block`
//! - pipelines joined with `|`, parenthesized sub-pipelines
//! - builtins: `and or not eq ne lt le gt ge len index print printf println`
//!
//! Bindings are YAML values. A key missing from a mapping evaluates to null,
//! which is false in conditions and prints as `<no value>`. Reading a field
//! of a null value fails execution.
//!
//! ```text
//! source ──► lexer ──► parser ──► Tree ──► executor(bindings) ──► String
//!              └──── TemplateError::Syntax ───┘          └── ::Execution
//! ```

mod exec;
mod funcs;
mod lexer;
mod parse;

use serde_yaml::Value;
use thiserror::Error;

/// Failure to parse or execute a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The template source is malformed
    #[error("template: {name}:{line}: {message}")]
    Syntax {
        name: String,
        line: usize,
        message: String,
    },

    /// The template parsed but failed against its bindings
    #[error("template: {name}:{line}: executing {name:?}: {message}")]
    Execution {
        name: String,
        line: usize,
        message: String,
    },
}

impl TemplateError {
    pub(crate) fn syntax(name: &str, line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            name: name.to_string(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn execution(name: &str, line: usize, message: impl Into<String>) -> Self {
        Self::Execution {
            name: name.to_string(),
            line,
            message: message.into(),
        }
    }

    /// Whether the error came from parsing rather than execution
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }

    /// Line of the template the error refers to
    pub fn line(&self) -> usize {
        match self {
            Self::Syntax { line, .. } | Self::Execution { line, .. } => *line,
        }
    }
}

/// Renders a template source against a set of bindings
pub trait TemplateEngine: Send + Sync {
    fn execute(&self, name: &str, source: &str, bindings: &Value) -> Result<String, TemplateError>;
}

/// Engine for Go `text/template` syntax
#[derive(Debug, Default, Clone, Copy)]
pub struct GoTemplateEngine;

impl TemplateEngine for GoTemplateEngine {
    fn execute(&self, name: &str, source: &str, bindings: &Value) -> Result<String, TemplateError> {
        Template::parse(name, source)?.execute(bindings)
    }
}

/// A parsed template, reusable across executions
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    tree: parse::Tree,
}

impl Template {
    /// Parse `source`; `name` appears in error messages
    pub fn parse(name: &str, source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            name: name.to_string(),
            tree: parse::parse(name, source)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute against `bindings`, which become `.` and `$`
    pub fn execute(&self, bindings: &Value) -> Result<String, TemplateError> {
        exec::execute(&self.name, &self.tree, bindings)
    }
}
