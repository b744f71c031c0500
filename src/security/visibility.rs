//! Visibility expressions: boolean formulas over authorization tokens.
//!
//! The grammar follows the column-visibility convention used by cell-level
//! secured stores: tokens combined with `&` and `|`, grouped with parentheses,
//! optionally negated with `!`, and quoted with `"` when they contain
//! characters outside `[A-Za-z0-9_-.:/]`. Mixing `&` and `|` at the same
//! nesting level is rejected so that every accepted expression has exactly one
//! reading. The empty expression is satisfied by every authorization set.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::Authorizations;
use crate::error::{GraphError, Result};

/// Parsed node of a visibility expression.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    Token(String),
    Not(Box<Node>),
    And(Vec<Node>),
    Or(Vec<Node>),
}

impl Node {
    fn evaluate(&self, auths: &Authorizations) -> bool {
        match self {
            Node::Token(token) => auths.contains(token),
            Node::Not(inner) => !inner.evaluate(auths),
            Node::And(children) => children.iter().all(|c| c.evaluate(auths)),
            Node::Or(children) => children.iter().any(|c| c.evaluate(auths)),
        }
    }

    fn mentions(&self, token: &str) -> bool {
        match self {
            Node::Token(t) => t == token,
            Node::Not(inner) => inner.mentions(token),
            Node::And(children) | Node::Or(children) => children.iter().any(|c| c.mentions(token)),
        }
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Node::Token(t) => out.push(t),
            Node::Not(inner) => inner.collect_tokens(out),
            Node::And(children) | Node::Or(children) => {
                for child in children {
                    child.collect_tokens(out);
                }
            }
        }
    }
}

/// A string-encoded visibility expression gating read access.
///
/// Construction validates the expression; evaluation afterwards is pure and
/// total.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Visibility {
    expression: String,
    root: Option<Node>,
}

impl Visibility {
    /// Parses `expression`, failing with [`GraphError::InvalidVisibility`] on
    /// malformed input.
    pub fn parse(expression: impl Into<String>) -> Result<Self> {
        let expression = expression.into();
        let root = Parser::new(&expression).parse()?;
        Ok(Self { expression, root })
    }

    /// The empty visibility, readable by everyone.
    pub fn empty() -> Self {
        Self {
            expression: String::new(),
            root: None,
        }
    }

    /// Returns the expression exactly as supplied.
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// Whether this is the empty (public) visibility.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Evaluates the expression against `auths`.
    pub fn is_visible_to(&self, auths: &Authorizations) -> bool {
        match &self.root {
            None => true,
            Some(node) => node.evaluate(auths),
        }
    }

    /// Whether `token` appears anywhere in the expression.
    ///
    /// This is a syntactic check used by audit tooling; it says nothing about
    /// whether a given authorization set can read the element.
    pub fn has_authorization(&self, token: &str) -> bool {
        self.root.as_ref().is_some_and(|node| node.mentions(token))
    }

    /// Every token referenced by the expression, in order of appearance.
    pub fn tokens(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(node) = &self.root {
            node.collect_tokens(&mut out);
        }
        out
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Visibility {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for Visibility {}

impl Hash for Visibility {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.expression.hash(state);
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl TryFrom<String> for Visibility {
    type Error = GraphError;

    fn try_from(value: String) -> Result<Self> {
        Visibility::parse(value)
    }
}

impl TryFrom<&str> for Visibility {
    type Error = GraphError;

    fn try_from(value: &str) -> Result<Self> {
        Visibility::parse(value)
    }
}

impl From<Visibility> for String {
    fn from(value: Visibility) -> Self {
        value.expression
    }
}

impl std::str::FromStr for Visibility {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        Visibility::parse(s)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    And,
    Or,
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Option<Node>> {
        self.skip_ws();
        if self.pos == self.bytes.len() {
            return Ok(None);
        }
        let node = self.parse_expr()?;
        self.skip_ws();
        if self.pos != self.bytes.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(Some(node))
    }

    fn parse_expr(&mut self) -> Result<Node> {
        let first = self.parse_term()?;
        let mut op: Option<Op> = None;
        let mut children = vec![first];
        loop {
            self.skip_ws();
            let next = match self.peek() {
                Some(b'&') => Op::And,
                Some(b'|') => Op::Or,
                _ => break,
            };
            match op {
                None => op = Some(next),
                Some(existing) if existing != next => {
                    return Err(self.error("cannot mix '&' and '|' without parentheses"));
                }
                Some(_) => {}
            }
            self.pos += 1;
            children.push(self.parse_term()?);
        }
        Ok(match op {
            None => children.pop().unwrap_or(Node::And(Vec::new())),
            Some(Op::And) => Node::And(children),
            Some(Op::Or) => Node::Or(children),
        })
    }

    fn parse_term(&mut self) -> Result<Node> {
        self.skip_ws();
        match self.peek() {
            Some(b'!') => {
                self.pos += 1;
                Ok(Node::Not(Box::new(self.parse_term()?)))
            }
            Some(b'(') => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.skip_ws();
                if self.peek() != Some(b')') {
                    return Err(self.error("missing ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(b'"') => self.parse_quoted().map(Node::Token),
            Some(c) if is_token_byte(c) => {
                let start = self.pos;
                while self.peek().is_some_and(is_token_byte) {
                    self.pos += 1;
                }
                Ok(Node::Token(self.src[start..self.pos].to_owned()))
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn parse_quoted(&mut self) -> Result<String> {
        self.pos += 1;
        let mut out = String::new();
        let mut chars = self.src[self.pos..].char_indices();
        while let Some((offset, ch)) = chars.next() {
            match ch {
                '"' => {
                    self.pos += offset + 1;
                    if out.is_empty() {
                        return Err(self.error("empty quoted token"));
                    }
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, escaped @ ('"' | '\\'))) => out.push(escaped),
                    _ => return Err(self.error("invalid escape in quoted token")),
                },
                other => out.push(other),
            }
        }
        Err(self.error("unterminated quoted token"))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, reason: &str) -> GraphError {
        GraphError::InvalidVisibility(format!("{reason} at {} in '{}'", self.pos, self.src))
    }
}

fn is_token_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'-' | b'.' | b':' | b'/')
}
