// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! JSON text codec
//!
//! The parser reports failure as `None` instead of an error. Numbers with a
//! decimal point decode as `Float64`, other numbers as `Int64` (falling back
//! to `Float64` when the literal does not fit or uses an exponent).

use std::fmt::Write as _;

#[cfg(feature = "profiling")]
use tracing::info_span;

use super::MAX_DEPTH;
use crate::error::{FormatError, Result};
use crate::value::{Value, ValueMap};

/// Encode a value as JSON text. `pretty` adds a newline and one tab per
/// nesting level.
pub fn encode(value: &Value, pretty: bool) -> String {
    #[cfg(feature = "profiling")]
    let _span = info_span!("json_encode", pretty).entered();

    let mut writer = JsonWriter {
        out: String::with_capacity(256),
        pretty,
        indent: 0,
    };
    writer.write_value(value);
    writer.out
}

/// Encode a map as the root object, without wrapping it in a [`Value`]
pub fn encode_map(map: &ValueMap, pretty: bool) -> String {
    #[cfg(feature = "profiling")]
    let _span = info_span!("json_encode", pretty, entries = map.len()).entered();

    let mut writer = JsonWriter {
        out: String::with_capacity(256),
        pretty,
        indent: 0,
    };
    writer.write_map(map);
    writer.out
}

/// Parse JSON text. Returns `None` on any structural failure, including
/// trailing content after the root value.
pub fn decode(text: &str) -> Option<Value> {
    #[cfg(feature = "profiling")]
    let _span = info_span!("json_decode", len = text.len()).entered();

    let mut parser = Parser {
        chars: text.char_indices().peekable(),
        text,
    };
    let value = parser.parse_value(0)?;
    parser.skip_whitespace();
    if parser.chars.peek().is_some() {
        return None;
    }
    Some(value)
}

/// Parse JSON text whose root must be an object
pub fn decode_table(text: &str) -> Result<ValueMap> {
    match decode(text) {
        Some(Value::Map(map)) => Ok(map),
        Some(_) => Err(FormatError::NotATable.into()),
        None => Err(FormatError::MalformedJson.into()),
    }
}

struct JsonWriter {
    out: String,
    pretty: bool,
    indent: usize,
}

impl JsonWriter {
    fn newline(&mut self) {
        if self.pretty {
            self.out.push('\n');
            for _ in 0..self.indent {
                self.out.push('\t');
            }
        }
    }

    fn write_value(&mut self, value: &Value) {
        match value {
            Value::Null => self.out.push_str("null"),
            Value::Bool(v) => self.out.push_str(if *v { "true" } else { "false" }),
            Value::Int32(v) => {
                let _ = write!(self.out, "{v}");
            }
            Value::Int64(v) => {
                let _ = write!(self.out, "{v}");
            }
            Value::Float32(v) if v.is_finite() => {
                let _ = write!(self.out, "{v}");
            }
            Value::Float64(v) if v.is_finite() => {
                let _ = write!(self.out, "{v}");
            }
            Value::Float32(_) | Value::Float64(_) => self.out.push_str("null"),
            Value::Char(c) => {
                let mut buf = [0u8; 4];
                self.write_string(c.encode_utf8(&mut buf));
            }
            Value::String(s) => self.write_string(s),
            Value::Bytes(bytes) => {
                let items: Vec<Value> = bytes.iter().map(|b| Value::Int32(*b as i32)).collect();
                self.write_list(&items);
            }
            Value::List(items) => self.write_list(items),
            Value::Map(map) => self.write_map(map),
        }
    }

    fn write_list(&mut self, items: &[Value]) {
        self.out.push('[');
        if items.is_empty() {
            self.out.push(']');
            return;
        }
        self.indent += 1;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.newline();
            self.write_value(item);
        }
        self.indent -= 1;
        self.newline();
        self.out.push(']');
    }

    fn write_map(&mut self, map: &ValueMap) {
        self.out.push('{');
        if map.is_empty() {
            self.out.push('}');
            return;
        }
        self.indent += 1;
        for (i, (key, item)) in map.iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.newline();
            self.write_string(key);
            self.out.push(':');
            if self.pretty {
                self.out.push(' ');
            }
            self.write_value(item);
        }
        self.indent -= 1;
        self.newline();
        self.out.push('}');
    }

    fn write_string(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\u{8}' => self.out.push_str("\\b"),
                '\u{c}' => self.out.push_str("\\f"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                ' '..='~' => self.out.push(c),
                other => {
                    let mut units = [0u16; 2];
                    for unit in other.encode_utf16(&mut units) {
                        let _ = write!(self.out, "\\u{unit:04x}");
                    }
                }
            }
        }
        self.out.push('"');
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    text: &'a str,
}

impl<'a> Parser<'a> {
    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.peek().map(|&(_, c)| c)
    }

    fn expect(&mut self, expected: char) -> Option<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.chars.next();
                Some(())
            }
            _ => None,
        }
    }

    fn parse_value(&mut self, depth: usize) -> Option<Value> {
        if depth > MAX_DEPTH {
            return None;
        }
        match self.peek()? {
            '{' => self.parse_object(depth).map(Value::Map),
            '[' => self.parse_array(depth).map(Value::List),
            '"' => self.parse_string().map(Value::String),
            '-' | '0'..='9' => self.parse_number(),
            _ => match self.parse_word()? {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                "null" => Some(Value::Null),
                _ => None,
            },
        }
    }

    fn parse_object(&mut self, depth: usize) -> Option<ValueMap> {
        self.expect('{')?;
        let mut map = ValueMap::new();
        if self.peek()? == '}' {
            self.chars.next();
            return Some(map);
        }
        loop {
            if self.peek()? != '"' {
                return None;
            }
            let key = self.parse_string()?;
            self.expect(':')?;
            let value = self.parse_value(depth + 1)?;
            map.insert(key, value);
            match self.peek()? {
                ',' => {
                    self.chars.next();
                }
                '}' => {
                    self.chars.next();
                    return Some(map);
                }
                _ => return None,
            }
        }
    }

    fn parse_array(&mut self, depth: usize) -> Option<Vec<Value>> {
        self.expect('[')?;
        let mut items = Vec::new();
        if self.peek()? == ']' {
            self.chars.next();
            return Some(items);
        }
        loop {
            items.push(self.parse_value(depth + 1)?);
            match self.peek()? {
                ',' => {
                    self.chars.next();
                }
                ']' => {
                    self.chars.next();
                    return Some(items);
                }
                _ => return None,
            }
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        // opening quote
        self.chars.next();
        let mut out = String::new();
        loop {
            let (_, c) = self.chars.next()?;
            match c {
                '"' => return Some(out),
                '\\' => {
                    let (_, escaped) = self.chars.next()?;
                    match escaped {
                        '"' | '\\' | '/' => out.push(escaped),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'u' => out.push(self.parse_unicode_escape()?),
                        _ => return None,
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn read_hex4(&mut self) -> Option<u16> {
        let mut code = 0u16;
        for _ in 0..4 {
            let (_, c) = self.chars.next()?;
            code = code * 16 + c.to_digit(16)? as u16;
        }
        Some(code)
    }

    fn parse_unicode_escape(&mut self) -> Option<char> {
        let high = self.read_hex4()?;
        if !(0xD800..0xDC00).contains(&high) {
            return Some(char::from_u32(high as u32).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        // surrogate pair: expect a following \uXXXX low half
        let mut lookahead = self.chars.clone();
        if let (Some((_, '\\')), Some((_, 'u'))) = (lookahead.next(), lookahead.next()) {
            self.chars = lookahead;
            let low = self.read_hex4()?;
            let decoded = char::decode_utf16([high, low]).next()?;
            return Some(decoded.unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        Some(char::REPLACEMENT_CHARACTER)
    }

    fn parse_word(&mut self) -> Option<&'a str> {
        let (start, _) = *self.chars.peek()?;
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_whitespace() || matches!(c, ',' | ':' | ']' | '}' | '[' | '{' | '"') {
                break;
            }
            end = i + c.len_utf8();
            self.chars.next();
        }
        self.text.get(start..end)
    }

    fn parse_number(&mut self) -> Option<Value> {
        let literal = self.parse_word()?;
        if !is_json_number(literal) {
            return None;
        }
        if literal.contains('.') {
            return literal.parse::<f64>().ok().map(Value::Float64);
        }
        match literal.parse::<i64>() {
            Ok(v) => Some(Value::Int64(v)),
            Err(_) => literal.parse::<f64>().ok().map(Value::Float64),
        }
    }
}

/// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
fn is_json_number(literal: &str) -> bool {
    fn digits(bytes: &[u8], mut i: usize) -> usize {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    }

    let bytes = literal.as_bytes();
    let mut i = usize::from(bytes.first() == Some(&b'-'));
    match bytes.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => i = digits(bytes, i + 1),
        _ => return false,
    }
    if bytes.get(i) == Some(&b'.') {
        let end = digits(bytes, i + 1);
        if end == i + 1 {
            return false;
        }
        i = end;
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let end = digits(bytes, i);
        if end == i {
            return false;
        }
        i = end;
    }
    i == bytes.len()
}
