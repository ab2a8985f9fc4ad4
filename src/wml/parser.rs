//! WML text parser.

use super::{Data, Tag, WmlError};

/// Parse a WML document.
///
/// Every attribute is read as a string; typed interpretation is left to the
/// readers on [`Data`].
pub fn parse(bytes: &[u8]) -> Result<Data, WmlError> {
    let text = std::str::from_utf8(bytes).map_err(|_| WmlError::InvalidUtf8)?;
    Parser::new(text).run()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    root: Data,
    open: Vec<Tag>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            root: Data::new(),
            open: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Data, WmlError> {
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some('#') => self.skip_line(),
                Some('[') => self.tag()?,
                Some(_) => self.attribute()?,
            }
        }

        if let Some(tag) = self.open.pop() {
            return Err(WmlError::UnclosedTag(tag.name));
        }
        Ok(self.root)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t') | Some('\r')) {
            self.bump();
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    fn syntax(&self, message: impl Into<String>) -> WmlError {
        WmlError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    fn current(&mut self) -> &mut Data {
        match self.open.last_mut() {
            Some(tag) => &mut tag.data,
            None => &mut self.root,
        }
    }

    fn tag(&mut self) -> Result<(), WmlError> {
        let line = self.line;
        self.bump();
        let start = self.pos;
        loop {
            match self.peek() {
                Some(']') => break,
                Some('\n') | None => return Err(self.syntax("unterminated tag name")),
                Some(_) => {
                    self.bump();
                }
            }
        }
        let raw = self.src[start..self.pos].trim().to_string();
        self.bump();

        if let Some(name) = raw.strip_prefix('/') {
            let tag = self.open.pop().ok_or_else(|| WmlError::UnexpectedClose {
                line,
                name: name.to_string(),
            })?;
            if tag.name != name {
                return Err(WmlError::MismatchedClose {
                    line,
                    expected: tag.name,
                    found: name.to_string(),
                });
            }
            self.current().push_child(tag);
        } else {
            if !is_identifier(&raw) {
                return Err(self.syntax(format!("invalid tag name '{raw}'")));
            }
            self.open.push(Tag::new(raw));
        }
        Ok(())
    }

    fn attribute(&mut self) -> Result<(), WmlError> {
        let start = self.pos;
        loop {
            match self.peek() {
                Some('=') => break,
                Some('\n') | None => return Err(self.syntax("expected '='")),
                Some(_) => {
                    self.bump();
                }
            }
        }
        let key = self.src[start..self.pos].trim().to_string();
        if !is_identifier(&key) {
            return Err(self.syntax(format!("invalid attribute name '{key}'")));
        }
        self.bump();
        self.skip_inline_whitespace();

        // Translation marker.
        if self.peek() == Some('_') {
            let rest = self.src[self.pos + 1..].trim_start_matches([' ', '\t']);
            if rest.starts_with('"') {
                self.bump();
                self.skip_inline_whitespace();
            }
        }

        let value = if self.peek() == Some('"') {
            let value = self.quoted()?;
            self.skip_inline_whitespace();
            match self.peek() {
                None | Some('\n') => {}
                Some('#') => self.skip_line(),
                Some(c) => return Err(self.syntax(format!("unexpected '{c}' after value"))),
            }
            value
        } else {
            let start = self.pos;
            while !matches!(self.peek(), Some('\n') | None) {
                self.bump();
            }
            self.src[start..self.pos].trim().to_string()
        };

        self.current().set(key, value);
        Ok(())
    }

    fn quoted(&mut self) -> Result<String, WmlError> {
        let line = self.line;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(WmlError::UnterminatedString { line }),
                Some('"') if self.peek() == Some('"') => {
                    self.bump();
                    value.push('"');
                }
                Some('"') => return Ok(value),
                Some(c) => value.push(c),
            }
        }
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
