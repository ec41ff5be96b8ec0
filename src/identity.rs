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

//! Stable object identities and the identity → handle lookup table.

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::entity::ObjectHandle;
use crate::scene::Scene;

/// Generate a fresh globally unique identity string
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Lifecycle state of an object's identity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityState {
    /// No identity yet, one is generated on first need
    Unassigned,
    /// Identity assigned
    Assigned,
    /// Identity parked in the cache during a duplicate / instancing operation
    Cached,
}

/// Per-object unique identifier
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UniqueId {
    id: Option<String>,
    cached: Option<String>,
}

impl UniqueId {
    /// Unassigned identifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier with a known identity
    pub fn with_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            id: (!id.is_empty()).then_some(id),
            cached: None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn state(&self) -> IdentityState {
        match (&self.id, &self.cached) {
            (_, Some(_)) => IdentityState::Cached,
            (Some(_), None) => IdentityState::Assigned,
            (None, None) => IdentityState::Unassigned,
        }
    }

    /// Return the identity, generating one first if unassigned.
    ///
    /// A cached identity is restored before a new one is generated.
    pub fn ensure(&mut self) -> &str {
        if self.id.is_none() {
            self.restore();
        }
        self.id.get_or_insert_with(generate_id)
    }

    /// Generate a new identity unconditionally
    pub fn generate(&mut self) -> &str {
        self.id.insert(generate_id())
    }

    /// Replace the identity with a fresh one, dropping any cached identity
    pub fn regenerate(&mut self) -> &str {
        self.cached = None;
        self.generate()
    }

    /// Assign a specific identity
    pub fn set(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.id = (!id.is_empty()).then_some(id);
    }

    pub fn clear(&mut self) {
        self.id = None;
    }

    /// Park the current identity. A second call keeps the first cached value.
    pub fn cache(&mut self) {
        if self.cached.is_none() {
            self.cached = Some(self.id.clone().unwrap_or_default());
        }
    }

    /// Restore from the cache if no identity is assigned, else generate one.
    ///
    /// Leaves an already assigned identity untouched.
    pub fn restore(&mut self) -> &str {
        if self.id.is_none() {
            let restored = self.cached.take().filter(|id| !id.is_empty());
            match restored {
                Some(id) => self.id = Some(id),
                None => {
                    let id = generate_id();
                    debug!(id = %id, "no identity to restore, generated a new one");
                    self.id = Some(id);
                }
            }
        } else {
            self.cached = None;
        }
        self.id.get_or_insert_with(generate_id)
    }
}

/// Session-scoped identity ↔ live handle table
#[derive(Debug, Default)]
pub struct IdentityTable {
    by_id: AHashMap<String, ObjectHandle>,
    by_handle: AHashMap<ObjectHandle, String>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the table from every live object in the scene.
    ///
    /// Objects without an identity are skipped. An identity seen twice is
    /// regenerated on the later object so the live set stays unique.
    pub fn rebuild(&mut self, scene: &mut Scene) {
        self.clear();
        let handles: Vec<ObjectHandle> = scene.handles().collect();
        for handle in handles {
            let Some(object) = scene.get_mut(handle) else {
                continue;
            };
            let Some(id) = object.identity().id().map(str::to_owned) else {
                continue;
            };
            if self.by_id.contains_key(&id) {
                let fresh = object.identity_mut().regenerate().to_owned();
                warn!(duplicate = %id, replacement = %fresh, "duplicate identity in scene, regenerated");
                self.insert(fresh, handle);
            } else {
                self.insert(id, handle);
            }
        }
        debug!(entries = self.by_id.len(), "identity table rebuilt");
    }

    /// Insert or replace a mapping. Any previous mapping of either side is dropped.
    pub fn insert(&mut self, id: impl Into<String>, handle: ObjectHandle) {
        let id = id.into();
        if let Some(old_id) = self.by_handle.remove(&handle) {
            self.by_id.remove(&old_id);
        }
        if let Some(old_handle) = self.by_id.insert(id.clone(), handle) {
            if old_handle != handle {
                self.by_handle.remove(&old_handle);
            }
        }
        self.by_handle.insert(handle, id);
    }

    /// Remove a handle, returning its identity
    pub fn remove_handle(&mut self, handle: ObjectHandle) -> Option<String> {
        let id = self.by_handle.remove(&handle)?;
        self.by_id.remove(&id);
        Some(id)
    }

    /// Identity → live handle
    pub fn resolve(&self, id: &str) -> Option<ObjectHandle> {
        self.by_id.get(id).copied()
    }

    /// Live handle → identity
    pub fn identity_of(&self, handle: ObjectHandle) -> Option<&str> {
        self.by_handle.get(&handle).map(String::as_str)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_handle.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::GameObject;

    #[test]
    fn test_state_machine() {
        let mut uid = UniqueId::new();
        assert_eq!(uid.state(), IdentityState::Unassigned);

        let first = uid.ensure().to_owned();
        assert_eq!(uid.state(), IdentityState::Assigned);
        assert_eq!(uid.ensure(), first);

        uid.cache();
        uid.clear();
        assert_eq!(uid.state(), IdentityState::Cached);
        assert_eq!(uid.restore(), first);
        assert_eq!(uid.state(), IdentityState::Assigned);
    }

    #[test]
    fn test_regenerate_changes_id() {
        let mut uid = UniqueId::with_id("a1");
        uid.cache();
        let fresh = uid.regenerate().to_owned();
        assert_ne!(fresh, "a1");
        assert_eq!(uid.state(), IdentityState::Assigned);
    }

    #[test]
    fn test_restore_without_cache_generates() {
        let mut uid = UniqueId::new();
        let id = uid.restore().to_owned();
        assert_eq!(id.len(), 36);
        assert_eq!(uid.id(), Some(id.as_str()));
    }

    #[test]
    fn test_empty_id_is_unassigned() {
        assert_eq!(UniqueId::with_id("").state(), IdentityState::Unassigned);
    }

    #[test]
    fn test_table_insert_and_remove() {
        let mut scene = Scene::new("test");
        let a = scene.spawn(GameObject::new("a"));
        let b = scene.spawn(GameObject::new("b"));

        let mut table = IdentityTable::new();
        table.insert("a1", a);
        table.insert("b1", b);
        assert_eq!(table.resolve("a1"), Some(a));
        assert_eq!(table.identity_of(b), Some("b1"));

        // re-keying a handle drops its old identity
        table.insert("a2", a);
        assert_eq!(table.resolve("a1"), None);
        assert_eq!(table.len(), 2);

        assert_eq!(table.remove_handle(b), Some("b1".to_owned()));
        assert!(!table.contains_id("b1"));
    }

    #[test]
    fn test_rebuild_regenerates_duplicates() {
        let mut scene = Scene::new("test");
        let a = scene.spawn(GameObject::new("a").with_identity("dup"));
        let b = scene.spawn(GameObject::new("b").with_identity("dup"));
        scene.spawn(GameObject::new("untracked"));

        let mut table = IdentityTable::new();
        table.rebuild(&mut scene);
        assert_eq!(table.len(), 2);
        let id_a = table.identity_of(a).unwrap().to_owned();
        let id_b = table.identity_of(b).unwrap().to_owned();
        assert_ne!(id_a, id_b);
        assert_eq!(scene.get(b).unwrap().identity().id(), Some(id_b.as_str()));
    }
}
