//! Selector micro-syntax: `.<verb>("<value>")[.instance(<signed-int>)]`.
//!
//! A selector names nodes by exactly one attribute. The optional instance suffix picks
//! one node out of the match set; negative values count from the end. An optional
//! `new UiSelector()` prefix and a trailing `;` are tolerated so selectors copied from
//! UiAutomator snippets parse unchanged.

use std::{fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Whole-selector grammar. Group 1 is the verb, 2 the raw value, 3 the optional instance.
static SELECTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*(?:(?:new\s+)?UiSelector\(\s*\))?\s*\.([A-Za-z_][A-Za-z0-9_]*)\(\s*"((?:[^"\\]|\\.)*)"\s*\)\s*(?:\.instance\(\s*([+-]?\d+)\s*\))?\s*;?\s*$"#,
    )
    .expect("selector grammar compiles")
});

/// Errors produced when a selector string cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// Nothing but whitespace.
    #[error("empty selector")]
    Empty,
    /// The verb is not one of `text`, `description`, `resourceId`, `className`.
    #[error("unknown selector verb `{0}`")]
    UnknownVerb(String),
    /// The string does not follow the selector grammar (including more than one verb).
    #[error("malformed selector `{0}`")]
    Malformed(String),
    /// The quoted value is empty.
    #[error("selector value is empty in `{0}`")]
    EmptyValue(String),
    /// The instance index does not fit in an `i32`.
    #[error("instance index out of range in `{0}`")]
    BadInstance(String),
}

/// Attribute a selector matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    /// Visible text (platform lookup).
    Text,
    /// Content description (full traversal, exact).
    Description,
    /// View resource id (platform lookup).
    ResourceId,
    /// Widget class name (full traversal, exact).
    ClassName,
}

impl SelectorKind {
    /// Verb as written in the selector syntax.
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Description => "description",
            Self::ResourceId => "resourceId",
            Self::ClassName => "className",
        }
    }

    /// Resolve a verb. Matching is exact (verbs are case-sensitive).
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "text" => Some(Self::Text),
            "description" => Some(Self::Description),
            "resourceId" => Some(Self::ResourceId),
            "className" => Some(Self::ClassName),
            _ => None,
        }
    }

    /// True when the tree provider offers a direct lookup for this attribute.
    pub const fn has_direct_lookup(self) -> bool {
        matches!(self, Self::Text | Self::ResourceId)
    }
}

/// A parsed selector: one attribute predicate plus an instance index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    /// Attribute matched.
    pub kind: SelectorKind,
    /// Value compared against the attribute.
    pub value: String,
    /// Position in the match set; negative counts from the end.
    pub instance: i32,
}

impl Selector {
    /// Build a selector with instance 0.
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            instance: 0,
        }
    }

    /// Shorthand for `.text(value)`.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::Text, value)
    }

    /// Shorthand for `.description(value)`.
    pub fn description(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::Description, value)
    }

    /// Shorthand for `.resourceId(value)`.
    pub fn resource_id(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::ResourceId, value)
    }

    /// Shorthand for `.className(value)`.
    pub fn class_name(value: impl Into<String>) -> Self {
        Self::new(SelectorKind::ClassName, value)
    }

    /// Replace the instance index.
    #[must_use]
    pub fn instance(mut self, index: i32) -> Self {
        self.instance = index;
        self
    }

    /// Parse the selector syntax.
    pub fn parse(code: &str) -> Result<Self, SelectorError> {
        if code.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let Some(caps) = SELECTOR_RE.captures(code) else {
            return Err(SelectorError::Malformed(code.trim().to_string()));
        };
        let verb = &caps[1];
        let kind = SelectorKind::from_verb(verb)
            .ok_or_else(|| SelectorError::UnknownVerb(verb.to_string()))?;
        let value = unescape(&caps[2]);
        if value.is_empty() {
            return Err(SelectorError::EmptyValue(code.trim().to_string()));
        }
        let instance = match caps.get(3) {
            Some(m) => m
                .as_str()
                .parse::<i32>()
                .map_err(|_| SelectorError::BadInstance(code.trim().to_string()))?,
            None => 0,
        };
        Ok(Self {
            kind,
            value,
            instance,
        })
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}(\"{}\")", self.kind.verb(), escape(&self.value))?;
        if self.instance != 0 {
            write!(f, ".instance({})", self.instance)?;
        }
        Ok(())
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
