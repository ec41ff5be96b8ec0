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

//! Save and logging configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::codec::{DataFormat, TextEncoding};
use crate::error::{Result, SaveError};

/// Save pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// Wire format for file storage
    pub format: DataFormat,
    /// Indent JSON output with tabs
    pub pretty_print: bool,
    /// Byte encoding of JSON files
    pub text_encoding: TextEncoding,
    /// Write the `.meta` sibling alongside the data
    pub write_metadata: bool,
    /// Batch size divisor: a save walks `max(1, objects / batch_divisor)`
    /// objects per step
    pub batch_divisor: usize,
    pub scene_name: String,
    pub scene_index: i32,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            format: DataFormat::Binary,
            pretty_print: false,
            text_encoding: TextEncoding::Utf8,
            write_metadata: false,
            batch_divisor: 5,
            scene_name: String::new(),
            scene_index: 0,
        }
    }
}

impl SaveConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SaveError::ConfigError(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| SaveError::ConfigError(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Objects walked per step for `count` tracked objects
    pub fn batch_size(&self, count: usize) -> usize {
        (count / self.batch_divisor.max(1)).max(1)
    }
}

/// Log output configuration, used by `logging::init_logging`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. `"info"` or `"archetype_save=debug"`
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
    /// Write to a daily rolling file in this directory instead of stdout
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
            file_prefix: "archetype_save.log".to_string(),
        }
    }
}
