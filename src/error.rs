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

//! Error types

use std::fmt;

/// Save/load error type
#[derive(Debug, Clone, PartialEq)]
pub enum SaveError {
    /// Structural failure in encoded data (fatal, aborts the whole operation)
    Format(FormatError),

    /// No converter (and no reference fallback) exists for a runtime type
    UnsupportedType(String),

    /// A field's declared shape cannot be mapped onto the value model
    UnsupportedField {
        component: &'static str,
        field: &'static str,
        reason: String,
    },

    /// A stored value has the wrong shape for the field it is restored into
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Stored enum name matches no variant
    InvalidEnum { enum_name: &'static str, value: String },

    /// A required entry point argument was empty
    MissingArgument(&'static str),

    /// Object handle is not alive in the scene
    ObjectNotFound,

    /// Component type not present on an object
    ComponentNotFound(String),

    /// Asset registration rejected (duplicate asset, empty id, ...)
    AssetRegistration(String),

    /// No asset (or no prefab) registered under an identity
    AssetNotFound(String),

    /// Hierarchy operation error (cycle, self-parenting)
    HierarchyError(String),

    /// Background encode failed
    EncodeFailed(String),

    /// IO error (file operations, etc.)
    IoError(String),

    /// Configuration could not be read or parsed
    ConfigError(String),
}

/// Structural errors raised by the codecs
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// The 10-byte magic id does not match
    MagicMismatch,
    /// The version byte differs from the compiled-in version
    VersionMismatch { expected: u8, found: u8 },
    /// Unknown binary type tag
    UnsupportedTypeTag(u8),
    /// Input ended in the middle of a value
    UnexpectedEof,
    /// A string payload was not valid UTF-8
    InvalidUtf8,
    /// A char payload was not a valid scalar value
    InvalidChar(u32),
    /// Negative or oversized length prefix
    InvalidLength(i64),
    /// JSON text could not be parsed
    MalformedJson,
    /// Top-level document is not a map
    NotATable,
    /// Containers nested beyond the decoder limit
    NestingTooDeep,
    /// A binary dictionary repeats a key
    DuplicateKey(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::MagicMismatch => write!(f, "File format ID does not match"),
            FormatError::VersionMismatch { expected, found } => {
                write!(f, "File format version does not match: expected {expected:#04x}, found {found:#04x}")
            }
            FormatError::UnsupportedTypeTag(tag) => {
                write!(f, "The type header {tag:02X} is not supported")
            }
            FormatError::UnexpectedEof => write!(f, "Unexpected end of input"),
            FormatError::InvalidUtf8 => write!(f, "String payload is not valid UTF-8"),
            FormatError::InvalidChar(code) => write!(f, "Invalid char code point {code:#x}"),
            FormatError::InvalidLength(len) => write!(f, "Invalid length prefix {len}"),
            FormatError::MalformedJson => write!(f, "Malformed JSON document"),
            FormatError::NotATable => write!(f, "Top-level value is not a map"),
            FormatError::NestingTooDeep => write!(f, "Containers nested too deeply"),
            FormatError::DuplicateKey(key) => write!(f, "Dictionary key '{key}' appears more than once"),
        }
    }
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::Format(err) => write!(f, "Format error: {err}"),
            SaveError::UnsupportedType(name) => write!(f, "Unsupported type: {name}"),
            SaveError::UnsupportedField { component, field, reason } => {
                write!(f, "Unsupported field {component}::{field}: {reason}")
            }
            SaveError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {expected}, found {found}")
            }
            SaveError::InvalidEnum { enum_name, value } => {
                write!(f, "'{value}' is not a variant of {enum_name}")
            }
            SaveError::MissingArgument(name) => write!(f, "Missing argument: {name}"),
            SaveError::ObjectNotFound => write!(f, "Object not found"),
            SaveError::ComponentNotFound(name) => write!(f, "Component not found: {name}"),
            SaveError::AssetRegistration(msg) => write!(f, "Asset registration error: {msg}"),
            SaveError::AssetNotFound(id) => write!(f, "No asset registered as '{id}'"),
            SaveError::HierarchyError(msg) => write!(f, "Hierarchy error: {msg}"),
            SaveError::EncodeFailed(msg) => write!(f, "Encode failed: {msg}"),
            SaveError::IoError(msg) => write!(f, "IO error: {msg}"),
            SaveError::ConfigError(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for SaveError {}

impl From<std::io::Error> for SaveError {
    fn from(err: std::io::Error) -> Self {
        SaveError::IoError(err.to_string())
    }
}

impl From<FormatError> for SaveError {
    fn from(err: FormatError) -> Self {
        SaveError::Format(err)
    }
}

impl SaveError {
    /// True for errors that must abort a whole save/load pass.
    pub fn is_structural(&self) -> bool {
        matches!(self, SaveError::Format(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SaveError>;
