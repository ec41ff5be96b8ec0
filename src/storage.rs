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

//! Storage back-ends for save tables.
//!
//! Every back-end writes the table and, on request, a second independently
//! encoded metadata table. File back-ends put the metadata next to the data
//! file with the extension changed to `.meta`.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::codec::{binary, json, DataFormat, TextEncoding};
use crate::config::SaveConfig;
use crate::error::{FormatError, Result, SaveError};
use crate::value::{Value, ValueMap};

/// Writes save tables
pub trait DataSerializer: Send + Sync {
    fn serialize(&self, data: &ValueMap) -> Result<()>;

    fn serialize_with_metadata(&self, data: &ValueMap, metadata: &ValueMap) -> Result<()>;
}

/// Reads save tables. `Ok(None)` means nothing has been saved yet.
pub trait DataDeserializer: Send + Sync {
    fn deserialize(&self) -> Result<Option<ValueMap>>;

    fn custom_metadata(&self) -> Result<Option<ValueMap>>;
}

/// A back-end that both writes and reads
pub trait Storage: DataSerializer + DataDeserializer {}

impl<T: DataSerializer + DataDeserializer> Storage for T {}

/// Open a file back-end in the configured format
pub fn file_storage(path: impl Into<PathBuf>, config: &SaveConfig) -> Result<Box<dyn Storage>> {
    Ok(match config.format {
        DataFormat::Binary => Box::new(BinaryFile::new(path)?),
        DataFormat::Json => Box::new(
            JsonFile::new(path)?
                .pretty(config.pretty_print)
                .encoding(config.text_encoding),
        ),
    })
}

fn meta_path(path: &Path) -> PathBuf {
    path.with_extension("meta")
}

fn checked_path(path: PathBuf) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(SaveError::MissingArgument("path"));
    }
    Ok(path)
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn into_table(value: Value) -> Result<ValueMap> {
    value.into_map().ok_or_else(|| FormatError::NotATable.into())
}

/// Binary file back-end
#[derive(Clone, Debug)]
pub struct BinaryFile {
    path: PathBuf,
    meta_path: PathBuf,
}

impl BinaryFile {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = checked_path(path.into())?;
        Ok(Self {
            meta_path: meta_path(&path),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    fn read(path: &Path) -> Result<Option<ValueMap>> {
        match read_if_exists(path)? {
            Some(bytes) => binary::decode(&bytes).and_then(into_table).map(Some),
            None => Ok(None),
        }
    }
}

impl DataSerializer for BinaryFile {
    fn serialize(&self, data: &ValueMap) -> Result<()> {
        let bytes = binary::encode_map(data)?;
        fs::write(&self.path, bytes)?;
        debug!(path = %self.path.display(), "binary save written");
        Ok(())
    }

    fn serialize_with_metadata(&self, data: &ValueMap, metadata: &ValueMap) -> Result<()> {
        // Encode both before touching disk so a failure leaves no half-written pair
        let bytes = binary::encode_map(data)?;
        let meta = binary::encode_map(metadata)?;
        fs::write(&self.path, bytes)?;
        fs::write(&self.meta_path, meta)?;
        debug!(path = %self.path.display(), "binary save and metadata written");
        Ok(())
    }
}

impl DataDeserializer for BinaryFile {
    fn deserialize(&self) -> Result<Option<ValueMap>> {
        Self::read(&self.path)
    }

    fn custom_metadata(&self) -> Result<Option<ValueMap>> {
        Self::read(&self.meta_path)
    }
}

/// JSON file back-end
#[derive(Clone, Debug)]
pub struct JsonFile {
    path: PathBuf,
    meta_path: PathBuf,
    pretty: bool,
    encoding: TextEncoding,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = checked_path(path.into())?;
        Ok(Self {
            meta_path: meta_path(&path),
            path,
            pretty: false,
            encoding: TextEncoding::Utf8,
        })
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    fn render(&self, table: &ValueMap) -> Vec<u8> {
        self.encoding.encode(&json::encode_map(table, self.pretty))
    }

    fn read(path: &Path) -> Result<Option<ValueMap>> {
        match read_if_exists(path)? {
            Some(bytes) => json::decode_table(&TextEncoding::decode(&bytes)?).map(Some),
            None => Ok(None),
        }
    }
}

impl DataSerializer for JsonFile {
    fn serialize(&self, data: &ValueMap) -> Result<()> {
        fs::write(&self.path, self.render(data))?;
        debug!(path = %self.path.display(), "json save written");
        Ok(())
    }

    fn serialize_with_metadata(&self, data: &ValueMap, metadata: &ValueMap) -> Result<()> {
        let text = self.render(data);
        let meta = self.render(metadata);
        fs::write(&self.path, text)?;
        fs::write(&self.meta_path, meta)?;
        debug!(path = %self.path.display(), "json save and metadata written");
        Ok(())
    }
}

impl DataDeserializer for JsonFile {
    fn deserialize(&self) -> Result<Option<ValueMap>> {
        Self::read(&self.path)
    }

    fn custom_metadata(&self) -> Result<Option<ValueMap>> {
        Self::read(&self.meta_path)
    }
}

/// Shared in-memory key/value store holding JSON text, for platforms
/// without a writable file system.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<AHashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back-end that saves under `key` (metadata under `key + ".meta"`)
    pub fn slot(&self, key: impl Into<String>) -> Result<MemorySlot> {
        let key = key.into();
        if key.is_empty() {
            return Err(SaveError::MissingArgument("key"));
        }
        Ok(MemorySlot {
            store: self.clone(),
            meta_key: format!("{key}.meta"),
            key,
            pretty: false,
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, text: impl Into<String>) {
        self.entries.lock().insert(key.into(), text.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// One key of a [`MemoryStore`]
#[derive(Clone, Debug)]
pub struct MemorySlot {
    store: MemoryStore,
    key: String,
    meta_key: String,
    pretty: bool,
}

impl MemorySlot {
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn read(&self, key: &str) -> Result<Option<ValueMap>> {
        match self.store.get(key) {
            Some(text) => json::decode_table(&text).map(Some),
            None => Ok(None),
        }
    }
}

impl DataSerializer for MemorySlot {
    fn serialize(&self, data: &ValueMap) -> Result<()> {
        let text = json::encode_map(data, self.pretty);
        self.store.set(self.key.as_str(), text);
        Ok(())
    }

    fn serialize_with_metadata(&self, data: &ValueMap, metadata: &ValueMap) -> Result<()> {
        let text = json::encode_map(data, self.pretty);
        let meta = json::encode_map(metadata, self.pretty);
        let mut entries = self.store.entries.lock();
        entries.insert(self.key.clone(), text);
        entries.insert(self.meta_key.clone(), meta);
        Ok(())
    }
}

impl DataDeserializer for MemorySlot {
    fn deserialize(&self) -> Result<Option<ValueMap>> {
        self.read(&self.key)
    }

    fn custom_metadata(&self) -> Result<Option<ValueMap>> {
        self.read(&self.meta_key)
    }
}

/// List save files in a directory with the given extension, sorted by name
pub fn list_saves(directory: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !directory.exists() {
        return Ok(Vec::new());
    }
    let mut saves = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            saves.push(path);
        }
    }
    saves.sort();
    Ok(saves)
}

/// Delete a save file and its metadata sibling, if present
pub fn delete_save(path: &Path) -> Result<()> {
    fs::remove_file(path)?;
    match fs::remove_file(meta_path(path)) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("archetype_save_{}.{ext}", uuid::Uuid::new_v4().simple()))
    }

    fn table() -> ValueMap {
        let mut data = ValueMap::new();
        data.insert("gold", 10);
        data.insert("name", "hero");
        data
    }

    fn meta() -> ValueMap {
        let mut meta = ValueMap::new();
        meta.insert("slot", 2);
        meta
    }

    #[test]
    fn test_binary_file_round_trip() {
        let path = temp_file("sav");
        let storage = BinaryFile::new(&path).unwrap();
        assert!(storage.deserialize().unwrap().is_none());

        storage.serialize_with_metadata(&table(), &meta()).unwrap();
        assert_eq!(storage.meta_path(), path.with_extension("meta"));
        assert_eq!(storage.deserialize().unwrap(), Some(table()));
        assert_eq!(storage.custom_metadata().unwrap(), Some(meta()));

        delete_save(&path).unwrap();
        assert!(!path.exists());
        assert!(!storage.meta_path().exists());
    }

    #[test]
    fn test_json_file_utf16() {
        let path = temp_file("json");
        let storage = JsonFile::new(&path).unwrap().pretty(true).encoding(TextEncoding::Utf16);
        storage.serialize(&table()).unwrap();

        let raw = fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &[0xFF, 0xFE]);

        let loaded = storage.deserialize().unwrap().unwrap();
        assert_eq!(loaded.get("gold"), Some(&Value::Int64(10)));
        assert_eq!(loaded.get("name"), Some(&Value::String("hero".into())));
        assert!(storage.custom_metadata().unwrap().is_none());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_storage_follows_config() {
        let path = temp_file("json");
        let config = SaveConfig {
            format: DataFormat::Json,
            ..Default::default()
        };
        let storage = file_storage(&path, &config).unwrap();
        storage.serialize(&table()).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("{\"gold\":10"));
        assert_eq!(
            storage.deserialize().unwrap().unwrap().get("name"),
            Some(&Value::String("hero".into()))
        );
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_structural() {
        let path = temp_file("sav");
        fs::write(&path, b"not a save").unwrap();
        let err = BinaryFile::new(&path).unwrap().deserialize().unwrap_err();
        assert!(err.is_structural());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_empty_path_rejected() {
        assert_eq!(BinaryFile::new("").unwrap_err(), SaveError::MissingArgument("path"));
        assert!(JsonFile::new(PathBuf::new()).is_err());
        assert!(MemoryStore::new().slot("").is_err());
    }

    #[test]
    fn test_memory_store_keys() {
        let store = MemoryStore::new();
        let slot = store.slot("save1").unwrap();
        slot.serialize_with_metadata(&table(), &meta()).unwrap();

        assert!(store.contains("save1"));
        assert!(store.contains("save1.meta"));
        assert_eq!(store.len(), 2);
        assert_eq!(
            slot.custom_metadata().unwrap().unwrap().get("slot"),
            Some(&Value::Int64(2))
        );

        let other = store.slot("save2").unwrap();
        assert!(other.deserialize().unwrap().is_none());
    }

    #[test]
    fn test_list_saves() {
        let dir = std::env::temp_dir().join(format!("archetype_save_dir_{}", uuid::Uuid::new_v4().simple()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["b.sav", "a.sav", "a.meta"] {
            fs::write(dir.join(name), b"").unwrap();
        }
        let saves = list_saves(&dir, "sav").unwrap();
        assert_eq!(saves, vec![dir.join("a.sav"), dir.join("b.sav")]);
        fs::remove_dir_all(&dir).unwrap();
    }
}
