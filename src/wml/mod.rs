//! WML document model.
//!
//! Lobby traffic is a small tag/attribute markup:
//!
//! ```text
//! [whisper]
//! sender="alice"
//! receiver="bob"
//! message="hello ""there"""
//! [/whisper]
//! ```
//!
//! A [`Data`] is an ordered list of attributes followed by an ordered list of
//! child [`Tag`]s. Attribute order is irrelevant for lookup but is kept so
//! that serialisation is deterministic; child order is meaningful.

mod parser;

use std::fmt;

use thiserror::Error;

pub use parser::parse;

/// Errors produced while parsing or reading WML.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WmlError {
    /// The payload was not UTF-8 text.
    #[error("document is not valid UTF-8")]
    InvalidUtf8,

    /// Generic syntax error.
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A quoted value ran to the end of the document.
    #[error("unterminated string starting on line {line}")]
    UnterminatedString { line: usize },

    /// A closing tag did not match the innermost open tag.
    #[error("closing tag [/{found}] on line {line} does not match [{expected}]")]
    MismatchedClose {
        line: usize,
        expected: String,
        found: String,
    },

    /// A closing tag appeared with no open tag.
    #[error("closing tag [/{name}] on line {line} has no opening tag")]
    UnexpectedClose { line: usize, name: String },

    /// The document ended with a tag still open.
    #[error("tag [{0}] is never closed")]
    UnclosedTag(String),

    /// An attribute path did not resolve.
    #[error("missing attribute: {0}")]
    Missing(String),

    /// The document is not exactly one tag.
    #[error("document does not hold exactly one tag")]
    NotSingleTag,
}

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    fn write_into(&self, out: &mut String) {
        match self {
            Value::Str(s) => {
                out.push('"');
                out.push_str(&escape(s));
                out.push('"');
            }
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Bool(true) => out.push_str("yes"),
            Value::Bool(false) => out.push_str("no"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(true) => write!(f, "yes"),
            Value::Bool(false) => write!(f, "no"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Body of a tag, or a whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Data {
    attrs: Vec<(String, Value)>,
    children: Vec<Tag>,
}

impl Data {
    /// Create an empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Data::set`].
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder form of [`Data::push_child`].
    pub fn with_child(mut self, tag: Tag) -> Self {
        self.push_child(tag);
        self
    }

    /// Set an attribute, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key, value)),
        }
    }

    /// Append a child tag.
    pub fn push_child(&mut self, tag: Tag) {
        self.children.push(tag);
    }

    /// Get an attribute by key.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Tag> {
        self.children.iter().find(|t| t.name == name)
    }

    /// All children, in order.
    pub fn children(&self) -> &[Tag] {
        &self.children
    }

    /// True when there are neither attributes nor children.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.children.is_empty()
    }

    /// Body of the first child named `name`.
    pub fn read_data(&self, name: &str) -> Result<&Data, WmlError> {
        self.child(name)
            .map(|t| &t.data)
            .ok_or_else(|| WmlError::Missing(name.to_string()))
    }

    /// Read an attribute by dotted path.
    ///
    /// Every segment but the last names a child tag (first match wins); the
    /// last names the attribute. Non-string scalars are rendered as text.
    pub fn read_string(&self, path: &str) -> Result<String, WmlError> {
        let mut segments: Vec<&str> = path.split('.').collect();
        let key = segments
            .pop()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| WmlError::Missing(path.to_string()))?;

        let mut data = self;
        for segment in segments {
            data = data
                .read_data(segment)
                .map_err(|_| WmlError::Missing(path.to_string()))?;
        }

        data.attr(key)
            .map(|v| v.to_string())
            .ok_or_else(|| WmlError::Missing(path.to_string()))
    }

    /// Unwrap a document holding exactly one tag and nothing else.
    pub fn into_tag(mut self) -> Result<Tag, WmlError> {
        if !self.attrs.is_empty() || self.children.len() != 1 {
            return Err(WmlError::NotSingleTag);
        }
        self.children.pop().ok_or(WmlError::NotSingleTag)
    }

    /// Serialise to WML text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    /// Serialise to WML bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_text().into_bytes()
    }

    fn write_into(&self, out: &mut String) {
        for (key, value) in &self.attrs {
            out.push_str(key);
            out.push('=');
            value.write_into(out);
            out.push('\n');
        }
        for child in &self.children {
            child.write_into(out);
        }
    }
}

/// A named tag with a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub data: Data,
}

impl Tag {
    /// Create a tag with an empty body.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Data::new(),
        }
    }

    /// Create a tag with the given body.
    pub fn with_data(name: impl Into<String>, data: Data) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Wrap this tag as the only element of a document.
    pub fn into_document(self) -> Data {
        Data::new().with_child(self)
    }

    fn write_into(&self, out: &mut String) {
        out.push('[');
        out.push_str(&self.name);
        out.push_str("]\n");
        self.data.write_into(out);
        out.push_str("[/");
        out.push_str(&self.name);
        out.push_str("]\n");
    }
}

/// Double every quote so the text can sit inside a quoted value.
pub fn escape(text: &str) -> String {
    text.replace('"', "\"\"")
}

/// Inverse of [`escape`].
pub fn unescape(text: &str) -> String {
    text.replace("\"\"", "\"")
}
