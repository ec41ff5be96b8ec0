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

//! Generic value model shared by converters and codecs.
//!
//! [`Value`] is the only type that crosses a codec boundary. Values own their
//! children, so a tree can never contain itself; object-to-object edges are
//! expressed as identity strings instead of nested values.

use ahash::AHashMap;

/// Dynamic value storage for save data
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Char(char),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(ValueMap),
}

impl Value {
    /// Name of the variant, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Float32(_) => "Single",
            Value::Float64(_) => "Double",
            Value::Char(_) => "Char",
            Value::String(_) => "String",
            Value::Bytes(_) => "ByteArray",
            Value::List(_) => "List",
            Value::Map(_) => "Dictionary",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    // Lenient numeric coercions. Text round-trips widen Int32 to Int64 and
    // Single to Double (or even to Int64), so loaders read through these.

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            Value::Float32(v) => float_to_i64(f64::from(*v)),
            Value::Float64(v) => float_to_i64(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Char(c) => Some(i64::from(u32::from(*c))),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_i32(&self) -> Option<i32> {
        self.to_i64().and_then(|v| i32::try_from(v).ok())
    }

    pub fn to_u8(&self) -> Option<u8> {
        self.to_i64().and_then(|v| u8::try_from(v).ok())
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            other => other.to_f64().map(|v| v as f32),
        }
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int32(v) => Some(*v != 0),
            Value::Int64(v) => Some(*v != 0),
            Value::Float32(v) => Some(*v != 0.0),
            Value::Float64(v) => Some(*v != 0.0),
            Value::String(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if s.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn to_char(&self) -> Option<char> {
        match self {
            Value::Char(c) => Some(*c),
            Value::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            }
            other => other
                .to_i64()
                .and_then(|v| u32::try_from(v).ok())
                .and_then(char::from_u32),
        }
    }

    /// String form used for enum names and textual fields
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Char(c) => Some(c.to_string()),
            Value::Bool(v) => Some(v.to_string()),
            Value::Int32(v) => Some(v.to_string()),
            Value::Int64(v) => Some(v.to_string()),
            Value::Float32(v) => Some(v.to_string()),
            Value::Float64(v) => Some(v.to_string()),
            _ => None,
        }
    }
}

fn float_to_i64(v: f64) -> Option<i64> {
    if !v.is_finite() {
        return None;
    }
    let rounded = v.round_ties_even();
    if rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
        None
    } else {
        Some(rounded as i64)
    }
}

macro_rules! impl_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    char => Char,
    String => String,
    Vec<Value> => List,
    ValueMap => Map,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Insertion-ordered string-keyed map.
///
/// Keys are unique; re-inserting a key replaces the value in place and keeps
/// the original position so encoders see a stable order.
#[derive(Clone, Debug, Default)]
pub struct ValueMap {
    entries: Vec<(String, Value)>,
    index: AHashMap<String, usize>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: AHashMap::with_capacity(capacity),
        }
    }

    /// Insert a value, returning the previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some(&slot) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.entries[slot].1, value));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self.index.get(key) {
            Some(&slot) => Some(&mut self.entries[slot].1),
            None => None,
        }
    }

    /// Nested map under `key`, if present and a map
    pub fn get_map(&self, key: &str) -> Option<&ValueMap> {
        self.get(key).and_then(Value::as_map)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Remove a key, preserving the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let slot = self.index.remove(key)?;
        let (_, value) = self.entries.remove(slot);
        for (_, idx) in self.index.iter_mut() {
            if *idx > slot {
                *idx -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl IntoIterator for ValueMap {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for ValueMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

// Interop with serde_json, used for config-adjacent tooling and tests.

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Value::Null => Json::Null,
            Value::Bool(v) => Json::Bool(*v),
            Value::Int32(v) => Json::from(*v),
            Value::Int64(v) => Json::from(*v),
            Value::Float32(v) => serde_json::Number::from_f64(f64::from(*v)).map_or(Json::Null, Json::Number),
            Value::Float64(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Value::Char(c) => Json::String(c.to_string()),
            Value::String(s) => Json::String(s.clone()),
            Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            Value::List(items) => Json::Array(items.iter().map(Json::from).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), Json::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => Value::Null,
            Json::Bool(v) => Value::Bool(v),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int64(i),
                None => n.as_f64().map_or(Value::Null, Value::Float64),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(obj) => Value::Map(obj.into_iter().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_insertion_order() {
        let mut map = ValueMap::new();
        map.insert("zeta", 1);
        map.insert("alpha", 2);
        map.insert("mid", 3);
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut map = ValueMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        let old = map.insert("a", 10);
        assert_eq!(old, Some(Value::Int32(1)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&Value::Int32(10)));
    }

    #[test]
    fn test_remove_reindexes() {
        let mut map: ValueMap = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
        assert_eq!(map.remove("a"), Some(Value::Int32(1)));
        assert_eq!(map.get("c"), Some(&Value::Int32(3)));
        assert_eq!(map.len(), 2);
        assert!(map.remove("missing").is_none());
    }

    #[test]
    fn test_numeric_width_preserved() {
        assert_ne!(Value::Int32(1), Value::Int64(1));
        assert_ne!(Value::Float32(1.5), Value::Float64(1.5));
    }

    #[test]
    fn test_lenient_coercion() {
        assert_eq!(Value::Int64(42).to_i32(), Some(42));
        assert_eq!(Value::Int64(i64::MAX).to_i32(), None);
        assert_eq!(Value::Float64(2.5).to_f32(), Some(2.5));
        assert_eq!(Value::Int64(3).to_f32(), Some(3.0));
        assert_eq!(Value::Float64(2.5).to_i32(), Some(2));
        assert_eq!(Value::String("TRUE".into()).to_bool(), Some(true));
        assert_eq!(Value::String("x".into()).to_char(), Some('x'));
        assert_eq!(Value::Null.to_i64(), None);
    }

    #[test]
    fn test_serde_json_interop() {
        let mut map = ValueMap::new();
        map.insert("gold", 10);
        map.insert("name", "hero");
        let json = serde_json::Value::from(&Value::Map(map));
        assert_eq!(json["gold"], serde_json::json!(10));
        let back = Value::from(json);
        assert_eq!(back.as_map().and_then(|m| m.get("gold")), Some(&Value::Int64(10)));
    }
}
