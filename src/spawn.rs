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

//! Runtime spawn records
//!
//! A record ties an instance spawned at runtime to the prefab it came from.
//! Saved as `{prefab, id, instance}`: the prefab's asset id, the instance's
//! identity, and the instance's object map.

use crate::entity::ObjectHandle;
use crate::value::{Value, ValueMap};

pub const PREFAB_KEY: &str = "prefab";
pub const ID_KEY: &str = "id";
pub const INSTANCE_KEY: &str = "instance";

/// Live instance spawned from a registered prefab
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSpawnRecord {
    pub prefab: String,
    pub instance: ObjectHandle,
}

impl RuntimeSpawnRecord {
    pub fn new(prefab: impl Into<String>, instance: ObjectHandle) -> Self {
        Self {
            prefab: prefab.into(),
            instance,
        }
    }

    pub fn to_value(&self, id: &str, instance: ValueMap) -> Value {
        let mut map = ValueMap::with_capacity(3);
        map.insert(PREFAB_KEY, self.prefab.as_str());
        map.insert(ID_KEY, id);
        map.insert(INSTANCE_KEY, instance);
        Value::Map(map)
    }
}

/// A record read back from a save table
#[derive(Clone, Debug, PartialEq)]
pub struct SavedSpawn<'a> {
    pub prefab: &'a str,
    /// Empty when the save predates instance identities
    pub id: &'a str,
    pub instance: &'a ValueMap,
}

impl<'a> SavedSpawn<'a> {
    /// Parse one entry; `None` if the prefab or instance map is missing
    pub fn parse(value: &'a Value) -> Option<Self> {
        let map = value.as_map()?;
        Some(Self {
            prefab: map.get(PREFAB_KEY)?.as_str()?,
            id: map.get(ID_KEY).and_then(Value::as_str).unwrap_or_default(),
            instance: map.get_map(INSTANCE_KEY)?,
        })
    }
}
