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

//! Binary codec
//!
//! Layout: 10-byte magic id, `00`, version byte, `00`, then one tagged value.
//! Numbers are little-endian. Strings carry a 7-bit varint byte length
//! followed by UTF-8. Lists and maps carry an `i32` count; map entries are
//! a raw string key followed by a tagged value.

use std::io::Write;

#[cfg(feature = "profiling")]
use tracing::info_span;

use super::MAX_DEPTH;
use crate::error::{FormatError, Result};
use crate::value::{Value, ValueMap};

/// File format id
pub const MAGIC: [u8; 10] = [0xEB, 0x54, 0x55, 0x42, 0x49, 0x4E, 0x0D, 0x0A, 0x1A, 0x0A];

/// Format version written after the magic id
pub const VERSION: u8 = 0x01;

/// Type tag written before every value
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Null = 0x00,
    Bool = 0x10,
    Char = 0x20,
    Int32 = 0x30,
    Int64 = 0x40,
    Single = 0x50,
    Double = 0x60,
    String = 0x70,
    ByteArray = 0x80,
    List = 0x90,
    Dictionary = 0xA0,
}

impl TypeTag {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Char(_) => TypeTag::Char,
            Value::Int32(_) => TypeTag::Int32,
            Value::Int64(_) => TypeTag::Int64,
            Value::Float32(_) => TypeTag::Single,
            Value::Float64(_) => TypeTag::Double,
            Value::String(_) => TypeTag::String,
            Value::Bytes(_) => TypeTag::ByteArray,
            Value::List(_) => TypeTag::List,
            Value::Map(_) => TypeTag::Dictionary,
        }
    }

    pub fn from_byte(byte: u8) -> std::result::Result<Self, FormatError> {
        Ok(match byte {
            0x00 => TypeTag::Null,
            0x10 => TypeTag::Bool,
            0x20 => TypeTag::Char,
            0x30 => TypeTag::Int32,
            0x40 => TypeTag::Int64,
            0x50 => TypeTag::Single,
            0x60 => TypeTag::Double,
            0x70 => TypeTag::String,
            0x80 => TypeTag::ByteArray,
            0x90 => TypeTag::List,
            0xA0 => TypeTag::Dictionary,
            other => return Err(FormatError::UnsupportedTypeTag(other)),
        })
    }
}

/// Encode a value with the file header
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    encode_to(value, &mut out)?;
    Ok(out)
}

/// Encode a value with the file header into any writer
pub fn encode_to<W: Write>(value: &Value, writer: W) -> Result<()> {
    #[cfg(feature = "profiling")]
    let _span = info_span!("binary_encode").entered();

    let mut writer = BinaryWriter::with_header(writer)?;
    writer.write_value(value, 0)?;
    writer.out.flush()?;
    Ok(())
}

/// Encode a map as the root value, without wrapping it in a [`Value`]
pub fn encode_map(map: &ValueMap) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    encode_map_to(map, &mut out)?;
    Ok(out)
}

pub fn encode_map_to<W: Write>(map: &ValueMap, writer: W) -> Result<()> {
    #[cfg(feature = "profiling")]
    let _span = info_span!("binary_encode", entries = map.len()).entered();

    let mut writer = BinaryWriter::with_header(writer)?;
    writer.out.write_all(&[TypeTag::Dictionary as u8])?;
    writer.write_map(map, 0)?;
    writer.out.flush()?;
    Ok(())
}

/// Decode a value, checking the file header first.
///
/// Any structural problem aborts the decode; no partial value is returned.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    #[cfg(feature = "profiling")]
    let _span = info_span!("binary_decode", len = bytes.len()).entered();

    let mut reader = BinaryReader { bytes, pos: 0 };
    reader.read_header()?;
    Ok(reader.read_value(0)?)
}

struct BinaryWriter<W> {
    out: W,
}

impl<W: Write> BinaryWriter<W> {
    fn with_header(mut out: W) -> Result<Self> {
        out.write_all(&MAGIC)?;
        out.write_all(&[0x00, VERSION, 0x00])?;
        Ok(Self { out })
    }

    fn write_value(&mut self, value: &Value, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(FormatError::NestingTooDeep.into());
        }
        self.out.write_all(&[TypeTag::of(value) as u8])?;
        match value {
            Value::Null => {}
            Value::Bool(v) => self.out.write_all(&[*v as u8])?,
            Value::Char(c) => {
                let mut buf = [0u8; 4];
                self.out.write_all(c.encode_utf8(&mut buf).as_bytes())?;
            }
            Value::Int32(v) => self.out.write_all(&v.to_le_bytes())?,
            Value::Int64(v) => self.out.write_all(&v.to_le_bytes())?,
            Value::Float32(v) => self.out.write_all(&v.to_le_bytes())?,
            Value::Float64(v) => self.out.write_all(&v.to_le_bytes())?,
            Value::String(s) => self.write_str(s)?,
            Value::Bytes(bytes) => {
                self.write_count(bytes.len())?;
                self.out.write_all(bytes)?;
            }
            Value::List(items) => {
                self.write_count(items.len())?;
                for item in items {
                    self.write_value(item, depth + 1)?;
                }
            }
            Value::Map(map) => self.write_map(map, depth)?,
        }
        Ok(())
    }

    fn write_map(&mut self, map: &ValueMap, depth: usize) -> Result<()> {
        self.write_count(map.len())?;
        for (key, item) in map.iter() {
            self.write_str(key)?;
            self.write_value(item, depth + 1)?;
        }
        Ok(())
    }

    fn write_count(&mut self, len: usize) -> Result<()> {
        let count = i32::try_from(len).map_err(|_| FormatError::InvalidLength(len as i64))?;
        self.out.write_all(&count.to_le_bytes())?;
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> Result<()> {
        let mut len = s.len();
        if len > i32::MAX as usize {
            return Err(FormatError::InvalidLength(len as i64).into());
        }
        // 7-bit varint, low groups first
        while len >= 0x80 {
            self.out.write_all(&[(len as u8 & 0x7F) | 0x80])?;
            len >>= 7;
        }
        self.out.write_all(&[len as u8])?;
        self.out.write_all(s.as_bytes())?;
        Ok(())
    }
}

type ReadResult<T> = std::result::Result<T, FormatError>;

struct BinaryReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    fn take(&mut self, n: usize) -> ReadResult<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(FormatError::UnexpectedEof)?;
        let slice = self.bytes.get(self.pos..end).ok_or(FormatError::UnexpectedEof)?;
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> ReadResult<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn read_u8(&mut self) -> ReadResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_header(&mut self) -> ReadResult<()> {
        let magic = self.bytes.get(..MAGIC.len()).ok_or(FormatError::MagicMismatch)?;
        if magic != MAGIC {
            return Err(FormatError::MagicMismatch);
        }
        self.pos = MAGIC.len();
        let [_, version, _] = self.take_array::<3>()?;
        if version != VERSION {
            return Err(FormatError::VersionMismatch {
                expected: VERSION,
                found: version,
            });
        }
        Ok(())
    }

    fn read_count(&mut self) -> ReadResult<usize> {
        let count = i32::from_le_bytes(self.take_array()?);
        if count < 0 {
            return Err(FormatError::InvalidLength(count as i64));
        }
        Ok(count as usize)
    }

    fn read_str(&mut self) -> ReadResult<String> {
        let mut len: u32 = 0;
        let mut shift = 0;
        loop {
            if shift > 28 {
                return Err(FormatError::InvalidLength(len as i64));
            }
            let byte = self.read_u8()?;
            len |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let raw = self.take(len as usize)?;
        String::from_utf8(raw.to_vec()).map_err(|_| FormatError::InvalidUtf8)
    }

    fn read_char(&mut self) -> ReadResult<char> {
        let lead = self.read_u8()?;
        let width = match lead {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(FormatError::InvalidChar(lead as u32)),
        };
        let rest = self.take(width - 1)?;
        let mut buf = [0u8; 4];
        buf[0] = lead;
        buf[1..width].copy_from_slice(rest);
        std::str::from_utf8(&buf[..width])
            .ok()
            .and_then(|s| s.chars().next())
            .ok_or(FormatError::InvalidUtf8)
    }

    fn read_value(&mut self, depth: usize) -> ReadResult<Value> {
        if depth > MAX_DEPTH {
            return Err(FormatError::NestingTooDeep);
        }
        let tag = TypeTag::from_byte(self.read_u8()?)?;
        Ok(match tag {
            TypeTag::Null => Value::Null,
            TypeTag::Bool => Value::Bool(self.read_u8()? != 0),
            TypeTag::Char => Value::Char(self.read_char()?),
            TypeTag::Int32 => Value::Int32(i32::from_le_bytes(self.take_array()?)),
            TypeTag::Int64 => Value::Int64(i64::from_le_bytes(self.take_array()?)),
            TypeTag::Single => Value::Float32(f32::from_le_bytes(self.take_array()?)),
            TypeTag::Double => Value::Float64(f64::from_le_bytes(self.take_array()?)),
            TypeTag::String => Value::String(self.read_str()?),
            TypeTag::ByteArray => {
                let len = self.read_count()?;
                Value::Bytes(self.take(len)?.to_vec())
            }
            TypeTag::List => {
                let count = self.read_count()?;
                // Every element is at least one tag byte
                let mut items = Vec::with_capacity(count.min(self.bytes.len() - self.pos));
                for _ in 0..count {
                    items.push(self.read_value(depth + 1)?);
                }
                Value::List(items)
            }
            TypeTag::Dictionary => {
                let count = self.read_count()?;
                let mut map = ValueMap::with_capacity(count.min(self.bytes.len() - self.pos));
                for _ in 0..count {
                    let key = self.read_str()?;
                    if map.contains_key(&key) {
                        return Err(FormatError::DuplicateKey(key));
                    }
                    let item = self.read_value(depth + 1)?;
                    map.insert(key, item);
                }
                Value::Map(map)
            }
        })
    }
}
