// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Syntax tree for compiled templates.
//!
//! A template body is a list of [`Node`]s. Actions (`{{ ... }}`) evaluate a
//! [`Pipeline`]: one or more [`Command`]s joined by `|`, where each command
//! is a list of [`Operand`]s.

use serde_json::Value;

/// Position of an action in its source, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    /// Line number.
    pub line: usize,
    /// Column number.
    pub column: usize,
}

/// A node of a template body.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text, emitted verbatim.
    Text(String),
    /// `{{pipeline}}`: evaluated and emitted HTML-escaped.
    Output {
        /// The pipeline to evaluate.
        pipeline: Pipeline,
        /// Where the action starts.
        pos: Pos,
    },
    /// `{{if}}` with optional `{{else if}}` chain and `{{else}}`.
    If {
        /// Condition, then-branch pairs in source order.
        branches: Vec<(Pipeline, Vec<Node>)>,
        /// Nodes rendered when no condition holds.
        otherwise: Option<Vec<Node>>,
    },
    /// `{{range}}`: the body runs once per element with `.` bound to it.
    Range {
        /// The collection to iterate.
        pipeline: Pipeline,
        /// Nodes rendered per element.
        body: Vec<Node>,
        /// Nodes rendered when the collection is empty.
        otherwise: Option<Vec<Node>>,
        /// Where the action starts.
        pos: Pos,
    },
    /// `{{with}}`: the body runs with `.` bound to a truthy value.
    With {
        /// The value to bind.
        pipeline: Pipeline,
        /// Nodes rendered when the value is truthy.
        body: Vec<Node>,
        /// Nodes rendered otherwise.
        otherwise: Option<Vec<Node>>,
    },
    /// `{{template "name" pipeline}}`: runs another template of the set.
    Call {
        /// Name of the called template.
        name: String,
        /// Data for the called template; `None` passes null.
        pipeline: Option<Pipeline>,
        /// Where the action starts.
        pos: Pos,
    },
}

/// Commands joined by `|`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// The commands in evaluation order.
    pub commands: Vec<Command>,
}

/// One command of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// First operand is the function for calls; otherwise exactly one operand.
    pub operands: Vec<Operand>,
    /// Where the command starts.
    pub pos: Pos,
}

/// An argument or value inside a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `.` or `.A.B`: fields looked up from the current data.
    Field(Vec<String>),
    /// `$` or `$.A.B`: fields looked up from the root data.
    Root(Vec<String>),
    /// A string, number, boolean or nil literal.
    Literal(Value),
    /// A function name.
    Function(String),
    /// A parenthesised pipeline.
    Nested(Box<Pipeline>),
}

/// A template definition found while parsing one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    /// Template name.
    pub name: String,
    /// Template body.
    pub body: Vec<Node>,
}
