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

//! Wire formats for [`Value`](crate::value::Value) trees

pub mod binary;
pub mod json;

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, Result};

/// Deepest container nesting either codec accepts
pub const MAX_DEPTH: usize = 128;

/// Encoded representation of a save table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    #[default]
    Binary,
    Json,
}

/// Byte encoding of JSON text on disk
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// Little-endian UTF-16 with a byte order mark
    Utf16,
}

const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

impl TextEncoding {
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf16 => {
                let mut out = Vec::with_capacity(2 + text.len() * 2);
                out.extend_from_slice(&UTF16_LE_BOM);
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
                out
            }
        }
    }

    /// Decode text, detecting the encoding from a byte order mark
    pub fn decode(bytes: &[u8]) -> Result<String> {
        if let Some(rest) = bytes.strip_prefix(&UTF16_LE_BOM) {
            if rest.len() % 2 != 0 {
                return Err(FormatError::UnexpectedEof.into());
            }
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            return String::from_utf16(&units).map_err(|_| FormatError::InvalidUtf8.into());
        }
        let bytes = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| FormatError::InvalidUtf8.into())
    }
}
