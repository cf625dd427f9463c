//! Minimal strict template language used by the document layouts.
//!
//! Supported tags:
//! - `{{path}}`: HTML-escaped scalar lookup (`full_name`, `this`, `this.company`)
//! - `{{#each path}}…{{/each}}`: repeat the body for every list element
//! - `{{#if path}}…{{else}}…{{/if}}`: branch on a non-empty value
//! - `{{! comment }}`
//!
//! Every path must resolve. A missing field is a `RenderError::UnresolvedPlaceholder`,
//! never the literal placeholder text.

use serde_json::Value;

use crate::render::RenderError;
use crate::schema::{FieldKind, FieldSpec, Schema};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var(String),
    Each { path: String, body: Vec<Node> },
    If {
        path: String,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// A parsed template, ready to render any number of documents.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

enum Tag<'a> {
    Var(&'a str),
    Open { block: &'a str, path: &'a str },
    Else,
    Close(&'a str),
    Comment,
}

fn classify(raw: &str) -> Tag<'_> {
    let tag = raw.trim();
    if tag.starts_with('!') {
        Tag::Comment
    } else if let Some(rest) = tag.strip_prefix('#') {
        let mut parts = rest.trim().splitn(2, char::is_whitespace);
        let block = parts.next().unwrap_or_default();
        let path = parts.next().unwrap_or_default().trim();
        Tag::Open { block, path }
    } else if let Some(rest) = tag.strip_prefix('/') {
        Tag::Close(rest.trim())
    } else if tag == "else" {
        Tag::Else
    } else {
        Tag::Var(tag)
    }
}

/// Open block on the parse stack: its kind, path, and the node lists being filled.
struct Frame {
    block: String,
    path: String,
    then: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl Frame {
    fn current(&mut self) -> &mut Vec<Node> {
        match self.otherwise.as_mut() {
            Some(nodes) => nodes,
            None => &mut self.then,
        }
    }
}

impl Template {
    pub fn parse(name: &str, source: &str) -> Result<Self, RenderError> {
        let syntax = |message: String| RenderError::Syntax {
            template: name.to_string(),
            message,
        };

        let mut root: Vec<Node> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            let (text, after) = rest.split_at(start);
            let end = after
                .find("}}")
                .ok_or_else(|| syntax("unterminated '{{' tag".to_string()))?;
            let raw = &after[2..end];
            rest = &after[end + 2..];

            let target = match stack.last_mut() {
                Some(frame) => frame.current(),
                None => &mut root,
            };
            if !text.is_empty() {
                target.push(Node::Text(text.to_string()));
            }

            match classify(raw) {
                Tag::Comment => {}
                Tag::Var("") => return Err(syntax("empty placeholder '{{}}'".to_string())),
                Tag::Var(path) => target.push(Node::Var(path.to_string())),
                Tag::Open { block, path } => {
                    if block != "each" && block != "if" {
                        return Err(syntax(format!("unknown block helper '#{block}'")));
                    }
                    if path.is_empty() {
                        return Err(syntax(format!("'#{block}' requires a field path")));
                    }
                    stack.push(Frame {
                        block: block.to_string(),
                        path: path.to_string(),
                        then: Vec::new(),
                        otherwise: None,
                    });
                }
                Tag::Else => match stack.last_mut() {
                    Some(frame) if frame.block == "if" && frame.otherwise.is_none() => {
                        frame.otherwise = Some(Vec::new());
                    }
                    _ => return Err(syntax("'else' outside of an '#if' block".to_string())),
                },
                Tag::Close(block) => {
                    let frame = stack
                        .pop()
                        .ok_or_else(|| syntax(format!("'/{block}' without an open block")))?;
                    if frame.block != block {
                        return Err(syntax(format!(
                            "'/{block}' closes '#{}' block",
                            frame.block
                        )));
                    }
                    let node = if frame.block == "each" {
                        Node::Each {
                            path: frame.path,
                            body: frame.then,
                        }
                    } else {
                        Node::If {
                            path: frame.path,
                            then: frame.then,
                            otherwise: frame.otherwise.unwrap_or_default(),
                        }
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.current().push(node),
                        None => root.push(node),
                    }
                }
            }
        }

        if let Some(frame) = stack.last() {
            return Err(syntax(format!("'#{}' block is never closed", frame.block)));
        }
        if !rest.is_empty() {
            root.push(Node::Text(rest.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            nodes: root,
        })
    }

    /// Substitutes every placeholder from `data`. Fails on the first unresolved path.
    pub fn render(&self, data: &Value) -> Result<String, RenderError> {
        let mut out = String::new();
        let mut scopes = vec![data];
        self.render_nodes(&self.nodes, &mut scopes, &mut out)?;
        Ok(out)
    }

    fn render_nodes<'v>(
        &self,
        nodes: &[Node],
        scopes: &mut Vec<&'v Value>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Var(path) => {
                    let value = self.resolve(path, scopes)?;
                    out.push_str(&escape_html(&self.scalar(path, value)?));
                }
                Node::Each { path, body } => {
                    let items = self
                        .resolve(path, scopes)?
                        .as_array()
                        .ok_or_else(|| RenderError::NotAList {
                            template: self.name.clone(),
                            placeholder: path.clone(),
                        })?;
                    for item in items {
                        scopes.push(item);
                        let rendered = self.render_nodes(body, scopes, out);
                        scopes.pop();
                        rendered?;
                    }
                }
                Node::If {
                    path,
                    then,
                    otherwise,
                } => {
                    let branch = if is_truthy(self.resolve(path, scopes)?) {
                        then
                    } else {
                        otherwise
                    };
                    self.render_nodes(branch, scopes, out)?;
                }
            }
        }
        Ok(())
    }

    /// `this` is the innermost scope; other names are looked up innermost-first.
    fn resolve<'v>(&self, path: &str, scopes: &[&'v Value]) -> Result<&'v Value, RenderError> {
        let unresolved = || RenderError::UnresolvedPlaceholder {
            template: self.name.clone(),
            placeholder: path.to_string(),
        };

        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();

        let mut value = if head == "this" {
            *scopes.last().ok_or_else(unresolved)?
        } else {
            scopes
                .iter()
                .rev()
                .find_map(|scope| scope.get(head))
                .ok_or_else(unresolved)?
        };

        for segment in segments {
            value = value.get(segment).ok_or_else(unresolved)?;
        }
        Ok(value)
    }

    fn scalar(&self, path: &str, value: &Value) -> Result<String, RenderError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Array(_) | Value::Object(_) => Err(RenderError::NotAScalar {
                template: self.name.clone(),
                placeholder: path.to_string(),
            }),
        }
    }

    /// Checks every placeholder against `schema` without any document data, so
    /// template/schema drift is caught before the first run.
    pub fn verify_against(&self, schema: &Schema) -> Result<(), RenderError> {
        let mut scopes = vec![Scope::Record(schema.fields)];
        self.verify_nodes(&self.nodes, &mut scopes)
    }

    fn verify_nodes(&self, nodes: &[Node], scopes: &mut Vec<Scope>) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(_) => {}
                Node::Var(path) => match self.resolve_kind(path, scopes)? {
                    Scope::Text => {}
                    _ => {
                        return Err(RenderError::NotAScalar {
                            template: self.name.clone(),
                            placeholder: path.clone(),
                        })
                    }
                },
                Node::Each { path, body } => match self.resolve_kind(path, scopes)? {
                    Scope::List(item) => {
                        scopes.push(Scope::of(item));
                        let checked = self.verify_nodes(body, scopes);
                        scopes.pop();
                        checked?;
                    }
                    _ => {
                        return Err(RenderError::NotAList {
                            template: self.name.clone(),
                            placeholder: path.clone(),
                        })
                    }
                },
                Node::If {
                    path,
                    then,
                    otherwise,
                } => {
                    self.resolve_kind(path, scopes)?;
                    self.verify_nodes(then, scopes)?;
                    self.verify_nodes(otherwise, scopes)?;
                }
            }
        }
        Ok(())
    }

    fn resolve_kind(&self, path: &str, scopes: &[Scope]) -> Result<Scope, RenderError> {
        let unresolved = || RenderError::UnresolvedPlaceholder {
            template: self.name.clone(),
            placeholder: path.to_string(),
        };

        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();

        let mut scope = if head == "this" {
            *scopes.last().ok_or_else(unresolved)?
        } else {
            scopes
                .iter()
                .rev()
                .find_map(|scope| scope.child(head))
                .ok_or_else(unresolved)?
        };

        for segment in segments {
            scope = scope.child(segment).ok_or_else(unresolved)?;
        }
        Ok(scope)
    }
}

/// Schema-level shape of a value, used by `verify_against`.
#[derive(Clone, Copy)]
enum Scope {
    Text,
    Record(&'static [FieldSpec]),
    List(&'static FieldKind),
}

impl Scope {
    fn of(kind: &'static FieldKind) -> Self {
        match kind {
            FieldKind::Text { .. } => Scope::Text,
            FieldKind::Record(fields) => Scope::Record(fields),
            FieldKind::List { item, .. } => Scope::List(item),
        }
    }

    fn child(&self, name: &str) -> Option<Scope> {
        match self {
            Scope::Record(fields) => fields
                .iter()
                .find(|f| f.name == name)
                .map(|f| Scope::of(&f.kind)),
            _ => None,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Number(_) | Value::Object(_) => true,
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{COVER_LETTER_SCHEMA, CV_SCHEMA};

    fn render(source: &str, data: Value) -> Result<String, RenderError> {
        Template::parse("test", source)?.render(&data)
    }

    #[test]
    fn test_substitutes_and_escapes() {
        let html = render("<h1>{{ full_name }}</h1>", json!({"full_name": "Tom & <Jerry>"}));
        assert_eq!(html.unwrap(), "<h1>Tom &amp; &lt;Jerry&gt;</h1>");
    }

    #[test]
    fn test_unknown_field_is_an_error_not_literal_text() {
        let err = render("<p>{{nickname}}</p>", json!({"full_name": "Ada"})).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnresolvedPlaceholder { ref placeholder, .. } if placeholder == "nickname"
        ));
    }

    #[test]
    fn test_each_over_records_and_strings() {
        let source = "{{#each experience}}<b>{{company}}</b>{{#each responsibilities}}<i>{{this}}</i>{{/each}}{{/each}}";
        let data = json!({
            "experience": [
                {"company": "A", "responsibilities": ["x", "y"]},
                {"company": "B", "responsibilities": ["z"]}
            ]
        });
        assert_eq!(
            render(source, data).unwrap(),
            "<b>A</b><i>x</i><i>y</i><b>B</b><i>z</i>"
        );
    }

    #[test]
    fn test_each_falls_back_to_outer_scope() {
        let source = "{{#each items}}{{this}}-{{suffix}};{{/each}}";
        let data = json!({"items": ["a", "b"], "suffix": "s"});
        assert_eq!(render(source, data).unwrap(), "a-s;b-s;");
    }

    #[test]
    fn test_if_else_on_empty_list() {
        let source = "{{#if certifications}}certs{{else}}none{{/if}}";
        assert_eq!(render(source, json!({"certifications": []})).unwrap(), "none");
        assert_eq!(render(source, json!({"certifications": ["AWS"]})).unwrap(), "certs");
    }

    #[test]
    fn test_if_on_missing_field_fails() {
        let err = render("{{#if awards}}x{{/if}}", json!({})).unwrap_err();
        assert!(matches!(err, RenderError::UnresolvedPlaceholder { .. }));
    }

    #[test]
    fn test_list_used_as_scalar_fails() {
        let err = render("{{experience}}", json!({"experience": []})).unwrap_err();
        assert!(matches!(err, RenderError::NotAScalar { .. }));
    }

    #[test]
    fn test_each_over_scalar_fails() {
        let err = render("{{#each full_name}}x{{/each}}", json!({"full_name": "Ada"})).unwrap_err();
        assert!(matches!(err, RenderError::NotAList { .. }));
    }

    #[test]
    fn test_comments_are_dropped() {
        assert_eq!(render("a{{! note }}b", json!({})).unwrap(), "ab");
    }

    #[test]
    fn test_syntax_errors() {
        for source in [
            "{{#each items}}never closed",
            "{{/each}}",
            "{{#each items}}{{/if}}",
            "{{unterminated",
            "{{#loop items}}{{/loop}}",
            "{{else}}",
            "{{}}",
        ] {
            let err = Template::parse("bad", source).unwrap_err();
            assert!(
                matches!(err, RenderError::Syntax { .. }),
                "expected syntax error for {source:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_verify_accepts_schema_fields() {
        let template = Template::parse(
            "cv",
            "{{full_name}}{{#each experience}}{{job_title}}{{#each responsibilities}}{{this}}{{/each}}{{/each}}{{#if certifications}}{{#each certifications}}{{this}}{{/each}}{{/if}}",
        )
        .unwrap();
        assert!(template.verify_against(&CV_SCHEMA).is_ok());
    }

    #[test]
    fn test_verify_rejects_unknown_field() {
        let template =
            Template::parse("cv", "{{#each experience}}{{salary}}{{/each}}").unwrap();
        let err = template.verify_against(&CV_SCHEMA).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnresolvedPlaceholder { ref placeholder, .. } if placeholder == "salary"
        ));
    }

    #[test]
    fn test_verify_rejects_list_as_scalar() {
        let template = Template::parse("cl", "{{paragraphs}}").unwrap();
        assert!(matches!(
            template.verify_against(&COVER_LETTER_SCHEMA),
            Err(RenderError::NotAScalar { .. })
        ));
    }
}
