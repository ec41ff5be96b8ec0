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

//! Asset registry
//!
//! Assets live outside the tracked object graph but can be referenced from
//! saved data by identity. Templates (prefabs) are assets whose payload is a
//! game object blueprint.

use ahash::AHashMap;
use std::any::Any;
use std::sync::Arc;

use crate::error::{Result, SaveError};
use crate::identity::generate_id;
use crate::scene::GameObject;

/// Handle to a registered asset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetHandle(u64);

impl AssetHandle {
    pub fn index(&self) -> u64 {
        self.0
    }
}

/// Game object blueprint used to spawn runtime instances
#[derive(Clone, Debug)]
pub struct Prefab {
    blueprint: GameObject,
}

impl Prefab {
    /// Wrap a blueprint. Its identity is cleared; every instance gets its own.
    pub fn new(mut blueprint: GameObject) -> Self {
        blueprint.identity_mut().clear();
        Self { blueprint }
    }

    pub fn blueprint(&self) -> &GameObject {
        &self.blueprint
    }

    /// Clone the blueprint into a fresh instance with a new identity
    pub fn instantiate(&self) -> GameObject {
        let mut instance = self.blueprint.clone();
        instance.identity_mut().regenerate();
        instance
    }

    /// Clone the blueprint, keeping a previously saved identity
    pub fn instantiate_with_identity(&self, id: &str) -> GameObject {
        let mut instance = self.blueprint.clone();
        if id.is_empty() {
            instance.identity_mut().regenerate();
        } else {
            instance.identity_mut().set(id);
        }
        instance
    }
}

/// Registered asset payload
#[derive(Clone)]
pub enum Asset {
    Prefab(Arc<Prefab>),
    Data(Arc<dyn Any + Send + Sync>),
}

impl Asset {
    pub fn data<T: Any + Send + Sync>(value: T) -> Self {
        Asset::Data(Arc::new(value))
    }

    pub fn prefab(blueprint: GameObject) -> Self {
        Asset::Prefab(Arc::new(Prefab::new(blueprint)))
    }

    fn same_payload(&self, other: &Asset) -> bool {
        match (self, other) {
            (Asset::Prefab(a), Asset::Prefab(b)) => Arc::ptr_eq(a, b),
            (Asset::Data(a), Asset::Data(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::Prefab(prefab) => f.debug_tuple("Prefab").field(&prefab.blueprint.name).finish(),
            Asset::Data(_) => f.write_str("Data(..)"),
        }
    }
}

struct AssetEntry {
    id: String,
    asset: Asset,
}

/// Identity ↔ asset table
#[derive(Default)]
pub struct AssetRegistry {
    entries: Vec<AssetEntry>,
    by_id: AHashMap<String, AssetHandle>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset under an identity.
    ///
    /// Rejects empty identities, identities already in use, and the same
    /// payload registered twice.
    pub fn register(&mut self, id: impl Into<String>, asset: Asset) -> Result<AssetHandle> {
        let id = id.into();
        if id.is_empty() {
            return Err(SaveError::AssetRegistration(
                "asset identity is empty".to_owned(),
            ));
        }
        if self.by_id.contains_key(&id) {
            return Err(SaveError::AssetRegistration(format!(
                "identity '{id}' is already registered"
            )));
        }
        if let Some(existing) = self.entries.iter().find(|e| e.asset.same_payload(&asset)) {
            return Err(SaveError::AssetRegistration(format!(
                "asset is already registered as '{}'",
                existing.id
            )));
        }

        let handle = AssetHandle(self.entries.len() as u64);
        self.by_id.insert(id.clone(), handle);
        self.entries.push(AssetEntry { id, asset });
        Ok(handle)
    }

    /// Register under a freshly generated identity
    pub fn register_generated(&mut self, asset: Asset) -> Result<(String, AssetHandle)> {
        let id = generate_id();
        let handle = self.register(id.clone(), asset)?;
        Ok((id, handle))
    }

    pub fn register_prefab(&mut self, id: impl Into<String>, blueprint: GameObject) -> Result<AssetHandle> {
        self.register(id, Asset::prefab(blueprint))
    }

    /// Identity → handle
    pub fn resolve(&self, id: &str) -> Option<AssetHandle> {
        self.by_id.get(id).copied()
    }

    /// Handle → identity
    pub fn id_of(&self, handle: AssetHandle) -> Option<&str> {
        self.entry(handle).map(|e| e.id.as_str())
    }

    pub fn get(&self, handle: AssetHandle) -> Option<&Asset> {
        self.entry(handle).map(|e| &e.asset)
    }

    /// Typed payload of a data asset
    pub fn get_data<T: Any + Send + Sync>(&self, handle: AssetHandle) -> Option<Arc<T>> {
        match self.get(handle)? {
            Asset::Data(data) => data.clone().downcast::<T>().ok(),
            Asset::Prefab(_) => None,
        }
    }

    pub fn prefab(&self, handle: AssetHandle) -> Option<&Arc<Prefab>> {
        match self.get(handle)? {
            Asset::Prefab(prefab) => Some(prefab),
            Asset::Data(_) => None,
        }
    }

    pub fn prefab_by_id(&self, id: &str) -> Option<&Arc<Prefab>> {
        self.prefab(self.resolve(id)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetHandle, &str)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| (AssetHandle(i as u64), e.id.as_str()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_id.clear();
    }

    fn entry(&self, handle: AssetHandle) -> Option<&AssetEntry> {
        usize::try_from(handle.0).ok().and_then(|i| self.entries.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityState;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = AssetRegistry::new();
        let h = registry.register("sword", Asset::data(42u32)).unwrap();
        assert_eq!(registry.resolve("sword"), Some(h));
        assert_eq!(registry.id_of(h), Some("sword"));
        assert_eq!(registry.get_data::<u32>(h).as_deref(), Some(&42));
        assert!(registry.get_data::<String>(h).is_none());
        assert!(registry.resolve("shield").is_none());
    }

    #[test]
    fn test_register_validation() {
        let mut registry = AssetRegistry::new();
        assert!(registry.register("", Asset::data(1u8)).is_err());

        let shared = Asset::data(String::from("mesh"));
        registry.register("a", shared.clone()).unwrap();
        assert!(matches!(
            registry.register("a", Asset::data(2u8)),
            Err(SaveError::AssetRegistration(_))
        ));
        assert!(registry.register("b", shared).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_prefab_instances_get_fresh_identities() {
        let mut registry = AssetRegistry::new();
        let h = registry
            .register_prefab("ball", GameObject::new("Ball").with_identity("template"))
            .unwrap();
        let prefab = registry.prefab(h).unwrap();
        assert_eq!(prefab.blueprint().identity().state(), IdentityState::Unassigned);

        let a = prefab.instantiate();
        let b = prefab.instantiate();
        assert_ne!(a.identity().id(), b.identity().id());
        assert_eq!(a.name, "Ball");

        let restored = prefab.instantiate_with_identity("saved-id");
        assert_eq!(restored.identity().id(), Some("saved-id"));
    }
}
