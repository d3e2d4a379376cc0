// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template parser.
//!
//! Parsing runs in two passes. The pest grammar in `template.pest` splits the
//! source into text and actions and parses each action's pipeline. The tree
//! builder then applies `{{-`/`-}}` trimming and assembles the flat action
//! stream into nested [`Node`]s, collecting `{{define}}` and `{{block}}`
//! bodies as separate [`Definition`]s.

use crate::ast::{Command, Definition, Node, Operand, Pipeline, Pos};
use crate::error::{Result, SourceContext, TreeplateError};
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use serde_json::Value;

#[derive(Parser)]
#[grammar = "template.pest"]
struct TemplateGrammar;

/// Result of parsing one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFile {
    /// Body of the file itself, outside any `{{define}}`.
    pub main: Vec<Node>,
    /// Templates defined with `{{define}}` or `{{block}}`, in source order.
    pub definitions: Vec<Definition>,
}

/// A syntax problem found after the grammar accepted the input.
struct Issue {
    message: String,
    pos: Pos,
}

impl Issue {
    fn new(message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

type IssueResult<T> = std::result::Result<T, Issue>;

enum Directive {
    If(Pipeline),
    ElseIf(Pipeline),
    Else,
    End,
    Range(Pipeline),
    With(Pipeline),
    Define(String),
    Template(String, Option<Pipeline>),
    Block(String, Option<Pipeline>),
    Output(Pipeline),
}

enum Item {
    Text(String),
    Action { directive: Directive, pos: Pos },
}

/// Parses `source` as the template `name`.
///
/// # Errors
///
/// Returns [`TreeplateError::Syntax`] with the offending position and a
/// source snippet.
pub fn parse(name: &str, source: &str) -> Result<ParsedFile> {
    let mut pairs = TemplateGrammar::parse(Rule::document, source)
        .map_err(|err| syntax_from_pest(name, source, err))?;
    let Some(document) = pairs.next() else {
        return Ok(ParsedFile::default());
    };

    let items = tokenize(document).map_err(|issue| syntax(name, source, issue))?;
    build_tree(items).map_err(|issue| syntax(name, source, issue))
}

fn syntax(name: &str, source: &str, issue: Issue) -> TreeplateError {
    TreeplateError::Syntax {
        name: name.to_string(),
        message: issue.message,
        line: issue.pos.line,
        column: issue.pos.column,
        source_context: Some(SourceContext::from_source(
            source,
            issue.pos.line,
            issue.pos.column,
        )),
    }
}

fn syntax_from_pest(name: &str, source: &str, err: pest::error::Error<Rule>) -> TreeplateError {
    let (line, column) = match err.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    let err = err.renamed_rules(describe_rule);
    syntax(
        name,
        source,
        Issue::new(err.variant.message().into_owned(), Pos { line, column }),
    )
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::open => "\"{{\"".to_string(),
        Rule::close => "\"}}\"".to_string(),
        Rule::pipeline | Rule::command => "a value".to_string(),
        Rule::string_lit => "a quoted name".to_string(),
        Rule::EOI => "end of input".to_string(),
        other => format!("{:?}", other).replace('_', " "),
    }
}

fn pos_of(pair: &Pair<'_, Rule>) -> Pos {
    let (line, column) = pair.line_col();
    Pos { line, column }
}

/// Flattens the document into text and actions, applying trim markers.
fn tokenize(document: Pair<'_, Rule>) -> IssueResult<Vec<Item>> {
    let mut items = Vec::new();
    let mut trim_next = false;

    for pair in document.into_inner() {
        match pair.as_rule() {
            Rule::text => {
                let text = if trim_next {
                    pair.as_str().trim_start()
                } else {
                    pair.as_str()
                };
                trim_next = false;
                if !text.is_empty() {
                    items.push(Item::Text(text.to_string()));
                }
            }
            Rule::comment | Rule::action => {
                let pos = pos_of(&pair);
                let mut trim_left = false;
                let mut trim_right = false;
                let mut directive = None;

                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::open => trim_left = inner.into_inner().next().is_some(),
                        Rule::close => trim_right = inner.into_inner().next().is_some(),
                        Rule::comment_body => {}
                        _ => directive = Some(build_directive(inner)?),
                    }
                }

                if trim_left {
                    if let Some(Item::Text(text)) = items.last_mut() {
                        let len = text.trim_end().len();
                        text.truncate(len);
                        if text.is_empty() {
                            items.pop();
                        }
                    }
                }
                trim_next = trim_right;

                if let Some(directive) = directive {
                    items.push(Item::Action { directive, pos });
                }
            }
            _ => {}
        }
    }

    Ok(items)
}

fn build_directive(pair: Pair<'_, Rule>) -> IssueResult<Directive> {
    let rule = pair.as_rule();
    if rule == Rule::pipeline {
        return Ok(Directive::Output(build_pipeline(pair)?));
    }

    let mut name = None;
    let mut pipeline = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string_lit => name = Some(build_string(inner)?),
            Rule::pipeline => pipeline = Some(build_pipeline(inner)?),
            _ => {}
        }
    }

    let directive = match (rule, name, pipeline) {
        (Rule::if_action, _, Some(p)) => Directive::If(p),
        (Rule::else_if_action, _, Some(p)) => Directive::ElseIf(p),
        (Rule::else_action, _, _) => Directive::Else,
        (Rule::end_action, _, _) => Directive::End,
        (Rule::range_action, _, Some(p)) => Directive::Range(p),
        (Rule::with_action, _, Some(p)) => Directive::With(p),
        (Rule::define_action, Some(n), _) => Directive::Define(n),
        (Rule::template_action, Some(n), p) => Directive::Template(n, p),
        (Rule::block_action, Some(n), p) => Directive::Block(n, p),
        (other, _, _) => {
            return Err(Issue::new(
                format!("malformed {:?}", other).replace('_', " "),
                Pos::default(),
            ))
        }
    };
    Ok(directive)
}

fn build_pipeline(pair: Pair<'_, Rule>) -> IssueResult<Pipeline> {
    let mut commands = Vec::new();

    for (i, command) in pair.into_inner().enumerate() {
        let pos = pos_of(&command);
        let operands = command
            .into_inner()
            .map(build_operand)
            .collect::<IssueResult<Vec<_>>>()?;

        if !matches!(operands.first(), Some(Operand::Function(_))) {
            if operands.len() > 1 {
                return Err(Issue::new("can't give argument to non-function", pos));
            }
            if i > 0 {
                return Err(Issue::new("can't pipe into a non-function", pos));
            }
        }

        commands.push(Command { operands, pos });
    }

    Ok(Pipeline { commands })
}

fn build_operand(pair: Pair<'_, Rule>) -> IssueResult<Operand> {
    let pos = pos_of(&pair);
    let operand = match pair.as_rule() {
        Rule::field => Operand::Field(split_fields(pair.as_str())),
        Rule::dot => Operand::Field(Vec::new()),
        Rule::root => Operand::Root(
            pair.into_inner()
                .next()
                .map(|field| split_fields(field.as_str()))
                .unwrap_or_default(),
        ),
        Rule::string_lit => Operand::Literal(Value::String(build_string(pair)?)),
        Rule::number => Operand::Literal(parse_number(pair.as_str(), pos)?),
        Rule::boolean => Operand::Literal(Value::Bool(pair.as_str() == "true")),
        Rule::nil => Operand::Literal(Value::Null),
        Rule::function => Operand::Function(pair.as_str().to_string()),
        Rule::nested => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or_else(|| Issue::new("empty parenthesised pipeline", pos))?;
            Operand::Nested(Box::new(build_pipeline(inner)?))
        }
        other => return Err(Issue::new(format!("unexpected {:?}", other), pos)),
    };
    Ok(operand)
}

fn split_fields(chain: &str) -> Vec<String> {
    chain
        .split('.')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(text: &str, pos: Pos) -> IssueResult<Value> {
    if text.contains('.') {
        text.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| Issue::new(format!("invalid number {}", text), pos))
    } else {
        text.parse::<i64>()
            .map(Value::from)
            .map_err(|_| Issue::new(format!("number {} out of range", text), pos))
    }
}

fn build_string(pair: Pair<'_, Rule>) -> IssueResult<String> {
    let pos = pos_of(&pair);
    let Some(literal) = pair.into_inner().next() else {
        return Ok(String::new());
    };
    let Some(inner) = literal.clone().into_inner().next() else {
        return Ok(String::new());
    };

    match literal.as_rule() {
        Rule::raw => Ok(inner.as_str().to_string()),
        _ => unescape(inner.as_str()).ok_or_else(|| {
            Issue::new(format!("invalid escape in string \"{}\"", inner.as_str()), pos)
        }),
    }
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}

enum FrameKind {
    Root,
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        /// Condition of the branch being collected; `None` inside `{{else}}`.
        condition: Option<Pipeline>,
    },
    Range {
        pipeline: Pipeline,
        /// Loop body, set once `{{else}}` is seen.
        body: Option<Vec<Node>>,
    },
    With {
        pipeline: Pipeline,
        body: Option<Vec<Node>>,
    },
    Define {
        name: String,
    },
    Block {
        name: String,
        pipeline: Option<Pipeline>,
    },
}

impl FrameKind {
    fn keyword(&self) -> &'static str {
        match self {
            FrameKind::Root => "template",
            FrameKind::If { .. } => "{{if}}",
            FrameKind::Range { .. } => "{{range}}",
            FrameKind::With { .. } => "{{with}}",
            FrameKind::Define { .. } => "{{define}}",
            FrameKind::Block { .. } => "{{block}}",
        }
    }
}

struct Frame {
    kind: FrameKind,
    nodes: Vec<Node>,
    pos: Pos,
}

impl Frame {
    fn new(kind: FrameKind, pos: Pos) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            pos,
        }
    }
}

fn build_tree(items: Vec<Item>) -> IssueResult<ParsedFile> {
    let mut definitions: Vec<Definition> = Vec::new();
    let mut stack = vec![Frame::new(FrameKind::Root, Pos::default())];

    for item in items {
        let (directive, pos) = match item {
            Item::Text(text) => {
                current(&mut stack).nodes.push(Node::Text(text));
                continue;
            }
            Item::Action { directive, pos } => (directive, pos),
        };

        match directive {
            Directive::Output(pipeline) => {
                current(&mut stack).nodes.push(Node::Output { pipeline, pos });
            }
            Directive::Template(name, pipeline) => {
                current(&mut stack).nodes.push(Node::Call {
                    name,
                    pipeline,
                    pos,
                });
            }
            Directive::If(pipeline) => stack.push(Frame::new(
                FrameKind::If {
                    branches: Vec::new(),
                    condition: Some(pipeline),
                },
                pos,
            )),
            Directive::Range(pipeline) => stack.push(Frame::new(
                FrameKind::Range {
                    pipeline,
                    body: None,
                },
                pos,
            )),
            Directive::With(pipeline) => stack.push(Frame::new(
                FrameKind::With {
                    pipeline,
                    body: None,
                },
                pos,
            )),
            Directive::Block(name, pipeline) => {
                stack.push(Frame::new(FrameKind::Block { name, pipeline }, pos))
            }
            Directive::Define(name) => {
                if stack.len() > 1 {
                    return Err(Issue::new("{{define}} must be at the top level", pos));
                }
                if definitions.iter().any(|d| d.name == name) {
                    return Err(Issue::new(format!("template {:?} defined twice", name), pos));
                }
                stack.push(Frame::new(FrameKind::Define { name }, pos));
            }
            Directive::ElseIf(pipeline) => {
                let frame = current(&mut stack);
                match &mut frame.kind {
                    FrameKind::If {
                        branches,
                        condition,
                    } => {
                        let Some(previous) = condition.take() else {
                            return Err(Issue::new("{{else if}} after {{else}}", pos));
                        };
                        branches.push((previous, std::mem::take(&mut frame.nodes)));
                        *condition = Some(pipeline);
                    }
                    other => {
                        return Err(Issue::new(
                            format!("unexpected {{{{else if}}}} in {}", other.keyword()),
                            pos,
                        ))
                    }
                }
            }
            Directive::Else => {
                let frame = current(&mut stack);
                match &mut frame.kind {
                    FrameKind::If {
                        branches,
                        condition,
                    } => {
                        let Some(previous) = condition.take() else {
                            return Err(Issue::new("duplicate {{else}} in {{if}}", pos));
                        };
                        branches.push((previous, std::mem::take(&mut frame.nodes)));
                    }
                    FrameKind::Range { body, .. } | FrameKind::With { body, .. } => {
                        if body.is_some() {
                            return Err(Issue::new("duplicate {{else}}", pos));
                        }
                        *body = Some(std::mem::take(&mut frame.nodes));
                    }
                    other => {
                        return Err(Issue::new(
                            format!("unexpected {{{{else}}}} in {}", other.keyword()),
                            pos,
                        ))
                    }
                }
            }
            Directive::End => {
                if stack.len() == 1 {
                    return Err(Issue::new("unexpected {{end}}", pos));
                }
                let Some(frame) = stack.pop() else {
                    return Err(Issue::new("unexpected {{end}}", pos));
                };
                close_frame(frame, &mut stack, &mut definitions);
            }
        }
    }

    if stack.len() > 1 {
        let frame = current(&mut stack);
        return Err(Issue::new(
            format!("unclosed {}", frame.kind.keyword()),
            frame.pos,
        ));
    }

    let main = stack.pop().map(|frame| frame.nodes).unwrap_or_default();
    Ok(ParsedFile { main, definitions })
}

fn current(stack: &mut [Frame]) -> &mut Frame {
    // The root frame is never popped while items remain.
    let last = stack.len() - 1;
    &mut stack[last]
}

fn close_frame(frame: Frame, stack: &mut [Frame], definitions: &mut Vec<Definition>) {
    let nodes = frame.nodes;
    let node = match frame.kind {
        FrameKind::If {
            mut branches,
            condition,
        } => {
            let otherwise = match condition {
                Some(condition) => {
                    branches.push((condition, nodes));
                    None
                }
                None => Some(nodes),
            };
            Node::If {
                branches,
                otherwise,
            }
        }
        FrameKind::Range { pipeline, body } => {
            let (body, otherwise) = split_else(body, nodes);
            Node::Range {
                pipeline,
                body,
                otherwise,
                pos: frame.pos,
            }
        }
        FrameKind::With { pipeline, body } => {
            let (body, otherwise) = split_else(body, nodes);
            Node::With {
                pipeline,
                body,
                otherwise,
            }
        }
        FrameKind::Define { name } => {
            definitions.push(Definition { name, body: nodes });
            return;
        }
        FrameKind::Block { name, pipeline } => {
            definitions.push(Definition {
                name: name.clone(),
                body: nodes,
            });
            Node::Call {
                name,
                pipeline,
                pos: frame.pos,
            }
        }
        FrameKind::Root => return,
    };
    current(stack).nodes.push(node);
}

fn split_else(body: Option<Vec<Node>>, nodes: Vec<Node>) -> (Vec<Node>, Option<Vec<Node>>) {
    match body {
        Some(body) => (body, Some(nodes)),
        None => (nodes, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(path: &[&str]) -> Operand {
        Operand::Field(path.iter().map(|s| s.to_string()).collect())
    }

    fn output_operands(node: &Node) -> &[Operand] {
        match node {
            Node::Output { pipeline, .. } => &pipeline.commands[0].operands,
            other => panic!("expected output, got {:?}", other),
        }
    }

    #[test]
    fn parses_text_and_fields() {
        let parsed = parse("home.html", "<html>{{.Title}}</html>").unwrap();

        assert_eq!(parsed.main.len(), 3);
        assert_eq!(parsed.main[0], Node::Text("<html>".to_string()));
        assert_eq!(output_operands(&parsed.main[1]), &[field(&["Title"])]);
        assert_eq!(parsed.main[2], Node::Text("</html>".to_string()));
        assert!(parsed.definitions.is_empty());
    }

    #[test]
    fn parses_operands() {
        let parsed = parse("t", r#"{{ printf "a\"b" .A.B $ $.C 3 -2.5 true nil `raw\n` . }}"#).unwrap();
        let operands = output_operands(&parsed.main[0]);

        assert_eq!(
            operands,
            &[
                Operand::Function("printf".to_string()),
                Operand::Literal(Value::String("a\"b".to_string())),
                field(&["A", "B"]),
                Operand::Root(Vec::new()),
                Operand::Root(vec!["C".to_string()]),
                Operand::Literal(Value::from(3)),
                Operand::Literal(serde_json::json!(-2.5)),
                Operand::Literal(Value::Bool(true)),
                Operand::Literal(Value::Null),
                Operand::Literal(Value::String("raw\\n".to_string())),
                field(&[]),
            ]
        );
    }

    #[test]
    fn parses_pipes_and_parentheses() {
        let parsed = parse("t", "{{ .Name | upper | printf (len .Items) }}").unwrap();
        let Node::Output { pipeline, .. } = &parsed.main[0] else {
            panic!("expected output");
        };

        assert_eq!(pipeline.commands.len(), 3);
        assert!(matches!(
            &pipeline.commands[2].operands[1],
            Operand::Nested(inner) if inner.commands[0].operands[0] == Operand::Function("len".to_string())
        ));
    }

    #[test]
    fn comments_are_dropped() {
        let parsed = parse("t", "a{{/* note */}}b").unwrap();
        assert_eq!(
            parsed.main,
            vec![Node::Text("a".to_string()), Node::Text("b".to_string())]
        );
    }

    #[test]
    fn trim_markers_strip_adjacent_whitespace() {
        let parsed = parse("t", "<p>  \n  {{- .A -}}  \n  </p>").unwrap();

        assert_eq!(parsed.main[0], Node::Text("<p>".to_string()));
        assert_eq!(output_operands(&parsed.main[1]), &[field(&["A"])]);
        assert_eq!(parsed.main[2], Node::Text("</p>".to_string()));
    }

    #[test]
    fn minus_without_space_is_a_number() {
        let parsed = parse("t", "{{-3}}").unwrap();
        assert_eq!(
            output_operands(&parsed.main[0]),
            &[Operand::Literal(Value::from(-3))]
        );
    }

    #[test]
    fn builds_if_else_chains() {
        let parsed = parse("t", "{{if .A}}a{{else if .B}}b{{else}}c{{end}}").unwrap();

        let Node::If {
            branches,
            otherwise,
        } = &parsed.main[0]
        else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].1, vec![Node::Text("a".to_string())]);
        assert_eq!(branches[1].1, vec![Node::Text("b".to_string())]);
        assert_eq!(otherwise.as_deref(), Some(&[Node::Text("c".to_string())][..]));
    }

    #[test]
    fn builds_range_with_else() {
        let parsed = parse("t", "{{range .Items}}<li>{{.}}</li>{{else}}none{{end}}").unwrap();

        let Node::Range {
            body, otherwise, ..
        } = &parsed.main[0]
        else {
            panic!("expected range");
        };
        assert_eq!(body.len(), 3);
        assert_eq!(otherwise.as_deref(), Some(&[Node::Text("none".to_string())][..]));
    }

    #[test]
    fn collects_definitions_and_blocks() {
        let source = r#"{{define "nav"}}<nav/>{{end}}<main>{{block "body" .}}default{{end}}</main>"#;
        let parsed = parse("page.html", source).unwrap();

        let names: Vec<_> = parsed.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["nav", "body"]);
        assert!(matches!(&parsed.main[1], Node::Call { name, pipeline: Some(_), .. } if name == "body"));
    }

    #[test]
    fn reports_stray_end() {
        let err = parse("t", "a\n{{end}}").unwrap_err();
        match err {
            TreeplateError::Syntax {
                message,
                line,
                column,
                ..
            } => {
                assert_eq!(message, "unexpected {{end}}");
                assert_eq!((line, column), (2, 1));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn reports_unclosed_blocks() {
        let err = parse("t", "{{if .A}}\n{{range .B}}x{{end}}").unwrap_err();
        assert!(err.to_string().contains("unclosed {{if}}"));
    }

    #[test]
    fn reports_unterminated_actions() {
        let err = parse("broken.html", "<p>{{ .Title </p>").unwrap_err();
        assert!(matches!(err, TreeplateError::Syntax { ref name, .. } if name == "broken.html"));
    }

    #[test]
    fn rejects_arguments_to_non_functions() {
        assert!(parse("t", "{{ .A .B }}").is_err());
        assert!(parse("t", "{{ .A | .B }}").is_err());
    }

    #[test]
    fn rejects_nested_define() {
        let err = parse("t", r#"{{if .A}}{{define "x"}}{{end}}{{end}}"#).unwrap_err();
        assert!(err.to_string().contains("{{define}} must be at the top level"));
    }

    #[test]
    fn rejects_misplaced_else() {
        assert!(parse("t", "{{else}}").is_err());
        assert!(parse("t", "{{range .A}}{{else if .B}}{{end}}").is_err());
        assert!(parse("t", "{{if .A}}{{else}}{{else}}{{end}}").is_err());
    }
}
