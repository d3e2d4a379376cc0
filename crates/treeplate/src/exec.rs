// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template execution.
//!
//! Walks a compiled body against a JSON data value and appends the output to
//! a string buffer. Pipeline output is HTML-escaped; text nodes and the
//! output of called templates are not.

use crate::ast::{Command, Node, Operand, Pipeline, Pos};
use crate::error::{Result, TreeplateError};
use crate::funcs::{printable, truthy, type_name};
use crate::set::TemplateSet;
use serde_json::Value;

/// Maximum nesting of `{{template}}` calls.
pub const MAX_DEPTH: usize = 256;

/// Appends `value` to `out`, escaping HTML special characters.
pub fn escape_html(value: &str, out: &mut String) {
    let mut latest = 0;

    for (i, ch) in value.char_indices() {
        let escaped = match ch {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&#34;",
            '\'' => "&#39;",
            _ => continue,
        };

        out.push_str(&value[latest..i]);
        out.push_str(escaped);
        latest = i + ch.len_utf8();
    }

    out.push_str(&value[latest..]);
}

pub(crate) struct Exec<'a> {
    set: &'a TemplateSet,
    root: &'a Value,
    out: String,
}

impl<'a> Exec<'a> {
    pub(crate) fn new(set: &'a TemplateSet, root: &'a Value) -> Self {
        Self {
            set,
            root,
            out: String::with_capacity(256),
        }
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }

    /// Runs the template `name` with `dot` as its data.
    pub(crate) fn call(&mut self, name: &str, dot: &Value, depth: usize) -> Result<()> {
        let set = self.set;
        let template = set
            .get(name)
            .ok_or_else(|| TreeplateError::NotFound(name.to_string()))?;
        self.walk(template.name(), template.body(), dot, depth)
    }

    fn walk(&mut self, name: &str, nodes: &[Node], dot: &Value, depth: usize) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Output { pipeline, .. } => {
                    let value = self.pipeline(name, pipeline, dot)?;
                    escape_html(&printable(&value), &mut self.out);
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = false;
                    for (condition, body) in branches {
                        if truthy(&self.pipeline(name, condition, dot)?) {
                            self.walk(name, body, dot, depth)?;
                            taken = true;
                            break;
                        }
                    }
                    if let (false, Some(body)) = (taken, otherwise) {
                        self.walk(name, body, dot, depth)?;
                    }
                }
                Node::Range {
                    pipeline,
                    body,
                    otherwise,
                    pos,
                } => {
                    let items = match self.pipeline(name, pipeline, dot)? {
                        Value::Array(items) => items,
                        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
                        Value::Null => Vec::new(),
                        other => {
                            return Err(failure(
                                name,
                                *pos,
                                format!("range can't iterate over {}", type_name(&other)),
                            ))
                        }
                    };
                    if items.is_empty() {
                        if let Some(otherwise) = otherwise {
                            self.walk(name, otherwise, dot, depth)?;
                        }
                    }
                    for item in &items {
                        self.walk(name, body, item, depth)?;
                    }
                }
                Node::With {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let value = self.pipeline(name, pipeline, dot)?;
                    if truthy(&value) {
                        self.walk(name, body, &value, depth)?;
                    } else if let Some(otherwise) = otherwise {
                        self.walk(name, otherwise, dot, depth)?;
                    }
                }
                Node::Call {
                    name: callee,
                    pipeline,
                    pos,
                } => {
                    if depth >= MAX_DEPTH {
                        return Err(failure(
                            name,
                            *pos,
                            format!("exceeded maximum template depth ({})", MAX_DEPTH),
                        ));
                    }
                    let data = match pipeline {
                        Some(pipeline) => self.pipeline(name, pipeline, dot)?,
                        None => Value::Null,
                    };
                    if self.set.get(callee).is_none() {
                        return Err(failure(
                            name,
                            *pos,
                            format!("no such template {:?}", callee),
                        ));
                    }
                    self.call(callee, &data, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn pipeline(&self, name: &str, pipeline: &Pipeline, dot: &Value) -> Result<Value> {
        let mut piped: Option<Value> = None;
        for command in &pipeline.commands {
            piped = Some(self.command(name, command, dot, piped.take())?);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn command(
        &self,
        name: &str,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value> {
        let Some((first, rest)) = command.operands.split_first() else {
            return Ok(Value::Null);
        };

        match first {
            Operand::Function(function) => {
                let mut args = rest
                    .iter()
                    .map(|operand| self.operand(name, operand, dot, command.pos))
                    .collect::<Result<Vec<_>>>()?;
                args.extend(piped);
                self.invoke(name, function, &args, command.pos)
            }
            operand => self.operand(name, operand, dot, command.pos),
        }
    }

    fn operand(&self, name: &str, operand: &Operand, dot: &Value, pos: Pos) -> Result<Value> {
        match operand {
            Operand::Field(path) => lookup(dot, path).map_err(|m| failure(name, pos, m)),
            Operand::Root(path) => lookup(self.root, path).map_err(|m| failure(name, pos, m)),
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Function(function) => self.invoke(name, function, &[], pos),
            Operand::Nested(pipeline) => self.pipeline(name, pipeline, dot),
        }
    }

    fn invoke(&self, name: &str, function: &str, args: &[Value], pos: Pos) -> Result<Value> {
        let func = self
            .set
            .helpers()
            .get(function)
            .ok_or_else(|| failure(name, pos, format!("function {:?} not defined", function)))?;
        func(args).map_err(|message| failure(name, pos, format!("{}: {}", function, message)))
    }
}

fn lookup(value: &Value, path: &[String]) -> std::result::Result<Value, String> {
    let mut current = value;
    for key in path {
        current = match current {
            Value::Object(map) => match map.get(key) {
                Some(next) => next,
                None => return Ok(Value::Null),
            },
            Value::Null => return Ok(Value::Null),
            other => {
                return Err(format!(
                    "can't evaluate field {} in type {}",
                    key,
                    type_name(other)
                ))
            }
        };
    }
    Ok(current.clone())
}

fn failure(name: &str, pos: Pos, message: impl Into<String>) -> TreeplateError {
    TreeplateError::Execution {
        name: name.to_string(),
        message: format!("line {}, column {}: {}", pos.line, pos.column, message.into()),
    }
}
