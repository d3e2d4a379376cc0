// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for treeplate.
//!
//! This module defines [`TreeplateError`], the main error enum, and
//! [`SourceContext`] for rich syntax error reporting.
//!
//! # Error Categories
//!
//! - **Startup errors**: the template root cannot be walked, holds no
//!   matching files, or a file fails to read or compile
//! - **Request errors**: the requested template is unknown, or executing it
//!   against the data payload fails
//! - **Output errors**: the destination writer fails
//!
//! Syntax errors carry a [`SourceContext`] so the message shows the offending
//! line with a caret under the error column.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Source context for syntax error messages.
///
/// Captures a snippet of source code around an error location,
/// enabling messages with line numbers and a visual indicator.
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// All lines from the source file.
    pub lines: Vec<String>,
    /// The line number where the error occurred (1-indexed).
    pub error_line: usize,
    /// The column number where the error occurred (1-indexed).
    pub error_column: usize,
    /// First line number of the snippet (1-indexed).
    pub snippet_start: usize,
    /// Last line number of the snippet (1-indexed).
    pub snippet_end: usize,
}

impl SourceContext {
    /// Creates a source context from source code and error location.
    ///
    /// Captures 2 lines before and after the error line.
    pub fn from_source(source: &str, line: usize, column: usize) -> Self {
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
        let snippet_start = line.saturating_sub(2).max(1);
        let snippet_end = (line + 2).min(lines.len());

        Self {
            lines,
            error_line: line,
            error_column: column,
            snippet_start,
            snippet_end,
        }
    }

    /// Formats the source snippet with line numbers and error indicator.
    ///
    /// Returns a string like:
    /// ```text
    ///    4 | <ul>
    ///    5 |   {{range .Items}
    ///      |   ^
    ///    6 | </ul>
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut result = String::new();

        for line_num in self.snippet_start..=self.snippet_end {
            let Some(line) = self.lines.get(line_num - 1) else {
                break;
            };

            result.push_str(&format!("{:4} | {}\n", line_num, line));

            if line_num == self.error_line {
                result.push_str(&format!(
                    "     | {}^\n",
                    " ".repeat(self.error_column.saturating_sub(1))
                ));
            }
        }

        result
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_snippet())
    }
}

/// Helper struct for displaying optional source context.
pub struct OptSourceContextDisplay<'a>(pub &'a Option<SourceContext>);

impl fmt::Display for OptSourceContextDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ctx) => write!(f, "\n{}", ctx),
            None => Ok(()),
        }
    }
}

/// Helper trait for formatting optional source context.
pub trait AsDisplay<'a> {
    /// Wraps self for Display formatting.
    fn as_display(&'a self) -> OptSourceContextDisplay<'a>;
}

impl<'a> AsDisplay<'a> for Option<SourceContext> {
    fn as_display(&'a self) -> OptSourceContextDisplay<'a> {
        OptSourceContextDisplay(self)
    }
}

/// The main error type for treeplate operations.
#[derive(Error, Debug)]
pub enum TreeplateError {
    /// The template root could not be walked.
    #[error("cannot load templates from {}: {source}", root.display())]
    Discovery {
        /// The template root directory.
        root: PathBuf,
        /// The underlying walk error.
        source: io::Error,
    },

    /// The template root holds no file with the configured suffix.
    #[error("no {suffix:?} templates were found in {}", root.display())]
    NoTemplates {
        /// The template root directory.
        root: PathBuf,
        /// The filename suffix filter.
        suffix: String,
    },

    /// A template file could not be read.
    #[error("cannot read template {}: {source}", path.display())]
    Read {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Template source is not valid template syntax.
    #[error("syntax error in {name}: {message} at line {line}, column {column}{}", source_context.as_display())]
    Syntax {
        /// Name of the template being compiled.
        name: String,
        /// Description of the problem.
        message: String,
        /// Line number where the error occurred (1-indexed).
        line: usize,
        /// Column number where the error occurred (1-indexed).
        column: usize,
        /// Source snippet around the error.
        source_context: Option<SourceContext>,
    },

    /// A template calls a function that is neither a builtin nor a helper.
    #[error("function {function:?} not defined in {name} at line {line}, column {column}")]
    UndefinedFunction {
        /// Name of the template being compiled.
        name: String,
        /// The unknown function name.
        function: String,
        /// Line number of the call (1-indexed).
        line: usize,
        /// Column number of the call (1-indexed).
        column: usize,
    },

    /// The requested template is not part of the current template set.
    #[error("template {0:?} not found")]
    NotFound(String),

    /// Executing a template against its data failed.
    #[error("error executing template {name}: {message}")]
    Execution {
        /// The template being executed when the error occurred.
        name: String,
        /// Error message.
        message: String,
    },

    /// Writing rendered output failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The data payload could not be converted to a template value.
    #[error("invalid template data: {0}")]
    Data(#[from] serde_json::Error),
}

impl TreeplateError {
    /// Returns true for [`TreeplateError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, TreeplateError::NotFound(_))
    }

    /// Name of the template a compile error belongs to, if this is one.
    pub fn template_name(&self) -> Option<&str> {
        match self {
            TreeplateError::Syntax { name, .. } | TreeplateError::UndefinedFunction { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }
}

/// Convenience type alias for Results with [`TreeplateError`].
pub type Result<T> = std::result::Result<T, TreeplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_points_at_error_column() {
        let source = "line one\n<p>{{ .Title </p>\nline three";
        let ctx = SourceContext::from_source(source, 2, 4);
        let snippet = ctx.format_snippet();

        assert!(snippet.contains("   1 | line one"));
        assert!(snippet.contains("   2 | <p>{{ .Title </p>"));
        assert!(snippet.contains("     |    ^"));
        assert!(snippet.contains("   3 | line three"));
    }

    #[test]
    fn syntax_error_message_includes_snippet() {
        let err = TreeplateError::Syntax {
            name: "home.html".to_string(),
            message: "unexpected {{end}}".to_string(),
            line: 1,
            column: 1,
            source_context: Some(SourceContext::from_source("{{end}}", 1, 1)),
        };
        let message = err.to_string();

        assert!(message.starts_with("syntax error in home.html: unexpected {{end}} at line 1, column 1"));
        assert!(message.contains("   1 | {{end}}"));
        assert_eq!(err.template_name(), Some("home.html"));
    }

    #[test]
    fn not_found_is_distinct() {
        let err = TreeplateError::NotFound("missing.html".to_string());
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "template \"missing.html\" not found");
        assert_eq!(err.template_name(), None);
    }
}
