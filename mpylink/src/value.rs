//! Parser for the small literal grammar a device emits via
//! `print(repr(x))`: integers, quoted strings, `b'...'` byte strings,
//! and tuples/lists of the same. This is deliberately not a general
//! expression evaluator — only the closed grammar MicroPython's `repr`
//! produces for the primitive types this crate's helpers return.

use std::fmt;

/// A parsed device literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `None`.
    None,
    /// A Python-style boolean literal.
    Bool(bool),
    /// An integer literal, possibly negative.
    Int(i64),
    /// A `'...'`-quoted text literal.
    Str(String),
    /// A `b'...'`-quoted byte-string literal.
    Bytes(Vec<u8>),
    /// A `(...)` tuple.
    Tuple(Vec<Value>),
    /// A `[...]` list.
    List(Vec<Value>),
}

/// Error parsing a device literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not parse device literal at offset {offset}: {message}")]
pub struct ParseError {
    offset: usize,
    message: String,
}

impl Value {
    /// Parses `input` as a single literal, requiring the whole string
    /// (minus a trailing newline) to be consumed.
    pub fn parse(input: &str) -> Result<Value, ParseError> {
        let trimmed = input.trim_end_matches(['\r', '\n']);
        let mut parser = Parser {
            bytes: trimmed.as_bytes(),
            pos: 0,
        };
        let value = parser.parse_value()?;
        parser.skip_ws();
        if parser.pos != parser.bytes.len() {
            return Err(parser.err("trailing input after value"));
        }
        Ok(value)
    }

    /// Returns the inner integer, if this is an [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the inner bytes, if this is [`Value::Bytes`] or
    /// [`Value::Str`] (encoded as UTF-8).
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Str(s) => Some(s.into_bytes()),
            _ => None,
        }
    }

    /// Returns the inner tuple/list elements.
    pub fn into_sequence(self) -> Option<Vec<Value>> {
        match self {
            Value::Tuple(v) | Value::List(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "{b:?}"),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), ParseError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(format!("expected '{}'", byte as char)))
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some(b'(') => self.parse_sequence(b'(', b')').map(Value::Tuple),
            Some(b'[') => self.parse_sequence(b'[', b']').map(Value::List),
            Some(b'\'') | Some(b'"') => self.parse_str().map(Value::Str),
            Some(b'b') if self.bytes.get(self.pos + 1) == Some(&b'\'') => {
                self.pos += 1;
                self.parse_str().map(|s| Value::Bytes(s.into_bytes()))
            }
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_int(),
            Some(_) => self.parse_keyword(),
            None => Err(self.err("unexpected end of input")),
        }
    }

    fn parse_keyword(&mut self) -> Result<Value, ParseError> {
        for (kw, value) in [
            ("None", Value::None),
            ("True", Value::Bool(true)),
            ("False", Value::Bool(false)),
        ] {
            if self.bytes[self.pos..].starts_with(kw.as_bytes()) {
                self.pos += kw.len();
                return Ok(value);
            }
        }
        Err(self.err("unrecognized literal"))
    }

    fn parse_int(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::Int)
            .ok_or_else(|| self.err("invalid integer literal"))
    }

    fn parse_str(&mut self) -> Result<String, ParseError> {
        let quote = self.peek().ok_or_else(|| self.err("expected quote"))?;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated string literal")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.err("dangling escape"))?;
                    self.pos += 1;
                    out.push(match escaped {
                        b'n' => '\n',
                        b'r' => '\r',
                        b't' => '\t',
                        b'\\' => '\\',
                        b'\'' => '\'',
                        b'"' => '"',
                        other => other as char,
                    });
                }
                Some(c) => {
                    self.pos += 1;
                    out.push(c as char);
                }
            }
        }
    }

    fn parse_sequence(&mut self, open: u8, close: u8) -> Result<Vec<Value>, ParseError> {
        self.expect(open)?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some(close) {
                        self.pos += 1;
                        break;
                    }
                }
                Some(c) if c == close => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.err("expected ',' or closing bracket")),
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integers() {
        assert_eq!(Value::parse("42").unwrap(), Value::Int(42));
        assert_eq!(Value::parse("-7\n").unwrap(), Value::Int(-7));
    }

    #[test]
    fn parses_byte_string_literals() {
        assert_eq!(
            Value::parse("b'hi\\n'").unwrap(),
            Value::Bytes(b"hi\n".to_vec())
        );
    }

    #[test]
    fn parses_nested_tuples() {
        let parsed = Value::parse("('lib', 12, [('a.py', 4, None)])").unwrap();
        let top = parsed.into_sequence().unwrap();
        assert_eq!(top[0], Value::Str("lib".into()));
        assert_eq!(top[1], Value::Int(12));
        let children = top[2].clone().into_sequence().unwrap();
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(Value::parse("42 garbage").is_err());
    }
}
