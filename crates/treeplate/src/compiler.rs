// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compilation of template sources.
//!
//! A [`TemplateCompiler`] turns the text of one source file into the
//! [`Template`]s it declares: the file's own template plus every
//! `{{define}}`d or `{{block}}` template inside it. [`ActionCompiler`] is the
//! implementation used by default.

use crate::ast::{Node, Operand, Pipeline};
use crate::error::{Result, TreeplateError};
use crate::funcs::Helpers;
use crate::parser;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// A compiled, named template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: String,
    origin: PathBuf,
    body: Vec<Node>,
}

impl Template {
    /// Creates a template from a parsed body.
    pub fn new(name: impl Into<String>, origin: impl Into<PathBuf>, body: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            origin: origin.into(),
            body,
        }
    }

    /// The name the template is addressed by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source file the template was compiled from.
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// The parsed body.
    pub fn body(&self) -> &[Node] {
        &self.body
    }
}

/// Compiles one source file into templates.
pub trait TemplateCompiler: Send + Sync + Debug {
    /// Compiles `source`, read from `origin`, as the template `name`.
    ///
    /// Returns the file's own template first, followed by any templates it
    /// defines.
    fn compile(
        &self,
        name: &str,
        origin: &Path,
        source: &str,
        helpers: &Helpers,
    ) -> Result<Vec<Template>>;
}

/// The `{{ action }}` template compiler.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionCompiler;

impl ActionCompiler {
    /// Creates a compiler.
    pub fn new() -> Self {
        Self
    }
}

impl TemplateCompiler for ActionCompiler {
    fn compile(
        &self,
        name: &str,
        origin: &Path,
        source: &str,
        helpers: &Helpers,
    ) -> Result<Vec<Template>> {
        let parsed = parser::parse(name, source)?;

        check_functions(name, &parsed.main, helpers)?;
        for definition in &parsed.definitions {
            check_functions(name, &definition.body, helpers)?;
        }

        let mut templates = Vec::with_capacity(parsed.definitions.len() + 1);
        templates.push(Template::new(name, origin, parsed.main));
        templates.extend(
            parsed
                .definitions
                .into_iter()
                .map(|definition| Template::new(definition.name, origin, definition.body)),
        );
        Ok(templates)
    }
}

fn check_functions(name: &str, nodes: &[Node], helpers: &Helpers) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Output { pipeline, .. } => check_pipeline(name, pipeline, helpers)?,
            Node::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    check_pipeline(name, condition, helpers)?;
                    check_functions(name, body, helpers)?;
                }
                if let Some(otherwise) = otherwise {
                    check_functions(name, otherwise, helpers)?;
                }
            }
            Node::Range {
                pipeline,
                body,
                otherwise,
                ..
            }
            | Node::With {
                pipeline,
                body,
                otherwise,
            } => {
                check_pipeline(name, pipeline, helpers)?;
                check_functions(name, body, helpers)?;
                if let Some(otherwise) = otherwise {
                    check_functions(name, otherwise, helpers)?;
                }
            }
            Node::Call { pipeline, .. } => {
                if let Some(pipeline) = pipeline {
                    check_pipeline(name, pipeline, helpers)?;
                }
            }
        }
    }
    Ok(())
}

fn check_pipeline(name: &str, pipeline: &Pipeline, helpers: &Helpers) -> Result<()> {
    for command in &pipeline.commands {
        for operand in &command.operands {
            match operand {
                Operand::Function(function) if !helpers.contains(function) => {
                    return Err(TreeplateError::UndefinedFunction {
                        name: name.to_string(),
                        function: function.clone(),
                        line: command.pos.line,
                        column: command.pos.column,
                    });
                }
                Operand::Nested(inner) => check_pipeline(name, inner, helpers)?,
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Result<Vec<Template>> {
        ActionCompiler.compile("page.html", Path::new("/t/page.html"), source, &Helpers::new())
    }

    #[test]
    fn file_template_comes_first() {
        let templates =
            compile(r#"{{define "head"}}<title>{{.}}</title>{{end}}<html>{{template "head" .T}}</html>"#)
                .unwrap();

        let names: Vec<_> = templates.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["page.html", "head"]);
        assert!(templates
            .iter()
            .all(|t| t.origin() == Path::new("/t/page.html")));
    }

    #[test]
    fn unknown_function_is_rejected() {
        let err = compile("<p>\n{{ .Name | shout }}</p>").unwrap_err();
        match err {
            TreeplateError::UndefinedFunction {
                name,
                function,
                line,
                ..
            } => {
                assert_eq!(name, "page.html");
                assert_eq!(function, "shout");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn functions_inside_blocks_are_checked() {
        assert!(compile("{{if .A}}{{range .B}}{{(missing .)}}{{end}}{{end}}").is_err());
        assert!(compile("{{with .A}}{{len .}}{{end}}").is_ok());
    }

    #[test]
    fn registered_helpers_are_accepted() {
        let helpers = Helpers::new().with("shout", |args| {
            Ok(serde_json::Value::String(
                crate::funcs::printable(&args[0]).to_uppercase(),
            ))
        });
        let result = ActionCompiler.compile(
            "page.html",
            Path::new("/t/page.html"),
            "{{ .Name | shout }}",
            &helpers,
        );
        assert!(result.is_ok());
    }
}
