//! Publish target routing
//!
//! The pubsub target can depend on the event, e.g.
//! `https://pubsub.example.org/jira/{project}/{action}`. Templates are parsed
//! once at startup into literal and placeholder segments; only a fixed set of
//! event fields may be referenced, and substituted values are percent-encoded
//! so an odd summary or user name can never reshape the URL.

use crate::event::Event;
use crate::{BridgeError, Result};
use reqwest::Url;
use std::fmt;

/// Event fields that may appear in a route template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteField {
    Key,
    Project,
    Action,
    Author,
    AuthorUid,
}

impl RouteField {
    const ALL: [RouteField; 5] = [
        RouteField::Key,
        RouteField::Project,
        RouteField::Action,
        RouteField::Author,
        RouteField::AuthorUid,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RouteField::Key => "key",
            RouteField::Project => "project",
            RouteField::Action => "action",
            RouteField::Author => "author",
            RouteField::AuthorUid => "author_uid",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    fn value(self, event: &Event) -> &str {
        match self {
            RouteField::Key => &event.key,
            RouteField::Project => &event.project,
            RouteField::Action => event.kind(),
            RouteField::Author => &event.author,
            RouteField::AuthorUid => &event.author_uid,
        }
    }

    /// Stand-in value used to check the template shape at parse time
    fn sample(self) -> &'static str {
        match self {
            RouteField::Key => "PROJ-1",
            RouteField::Project => "PROJ",
            RouteField::Action => "status",
            RouteField::Author => "Jane Doe",
            RouteField::AuthorUid => "jdoe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(RouteField),
}

/// A parsed, validated route template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    /// Parse and validate a template
    ///
    /// Fails on unbalanced braces, unknown placeholders, or when the template
    /// does not yield an absolute http(s) URL.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        if c == '{' {
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(BridgeError::Config(format!(
                            "Unclosed placeholder in route template: {}",
                            raw
                        )));
                    }
                    let field = RouteField::from_name(name.trim()).ok_or_else(|| {
                        BridgeError::Config(format!(
                            "Unknown placeholder {{{}}} in route template (allowed: {})",
                            name,
                            RouteField::ALL.map(RouteField::name).join(", ")
                        ))
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' => {
                    return Err(BridgeError::Config(format!(
                        "Unbalanced '}}' in route template: {}",
                        raw
                    )));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let template = Self {
            raw: raw.to_string(),
            segments,
        };
        template.check_shape()?;
        Ok(template)
    }

    /// Render with sample values and make sure the result is a usable URL
    /// whose host does not depend on event data
    fn check_shape(&self) -> Result<()> {
        let sample = self.fill(|field| Ok(field.sample().to_string()))?;
        let url = Url::parse(&sample).map_err(|e| {
            BridgeError::Config(format!("Route template {} is not a valid URL: {}", self.raw, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BridgeError::Config(format!(
                "Route template {} must use http or https",
                self.raw
            )));
        }

        let authority_end = self
            .raw
            .find("://")
            .map(|i| i + 3)
            .and_then(|start| self.raw[start..].find('/').map(|j| start + j))
            .unwrap_or(self.raw.len());
        if self.raw[..authority_end].contains('{') {
            return Err(BridgeError::Config(format!(
                "Route template {} may only use placeholders in the path or query",
                self.raw
            )));
        }
        Ok(())
    }

    fn fill(&self, mut value: impl FnMut(RouteField) -> Result<String>) -> Result<String> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Field(f) => out.push_str(&urlencoding::encode(&value(*f)?)),
            }
        }
        Ok(out)
    }

    /// Placeholders used by this template, in order
    pub fn fields(&self) -> Vec<RouteField> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(f) => Some(*f),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Build the target URL for `event`
    pub fn render(&self, event: &Event) -> Result<Url> {
        let target = self.fill(|field| {
            let value = field.value(event);
            if value.is_empty() {
                Err(BridgeError::Routing(format!(
                    "Event {} has an empty {{{}}}",
                    event.key,
                    field.name()
                )))
            } else {
                Ok(value.to_string())
            }
        })?;

        Url::parse(&target)
            .map_err(|e| BridgeError::Routing(format!("Invalid target {}: {}", target, e)))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
