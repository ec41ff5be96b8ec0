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

//! Scene: live game object storage

use slotmap::SlotMap;
use smallvec::SmallVec;
use std::any::TypeId;

use crate::builtin::transform::Transform;
use crate::component::Component;
use crate::entity::{short_type_name, ObjectHandle, SceneEvent};
use crate::error::{Result, SaveError};
use crate::identity::UniqueId;

/// A named object carrying at most one component per concrete type.
///
/// Every object starts with a [`Transform`].
#[derive(Clone, Debug)]
pub struct GameObject {
    pub name: String,
    pub tag: String,
    pub layer: i32,
    active_self: bool,
    identity: UniqueId,
    components: SmallVec<[Box<dyn Component>; 4]>,
}

impl GameObject {
    pub fn new(name: impl Into<String>) -> Self {
        let mut components: SmallVec<[Box<dyn Component>; 4]> = SmallVec::new();
        components.push(Box::new(Transform::default()));
        Self {
            name: name.into(),
            tag: "Untagged".to_owned(),
            layer: 0,
            active_self: true,
            identity: UniqueId::new(),
            components,
        }
    }

    /// Builder: attach a component (replacing one of the same type)
    pub fn with<C: Component>(mut self, component: C) -> Self {
        self.insert(component);
        self
    }

    /// Builder: assign an identity
    pub fn with_identity(mut self, id: impl Into<String>) -> Self {
        self.identity.set(id);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn is_active(&self) -> bool {
        self.active_self
    }

    pub fn set_active(&mut self, active: bool) {
        self.active_self = active;
    }

    pub fn identity(&self) -> &UniqueId {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut UniqueId {
        &mut self.identity
    }

    /// Insert a component, returning the one it replaced
    pub fn insert<C: Component>(&mut self, component: C) -> Option<Box<dyn Component>> {
        self.insert_boxed(Box::new(component))
    }

    pub fn insert_boxed(&mut self, component: Box<dyn Component>) -> Option<Box<dyn Component>> {
        let type_id = component.component_type_id();
        match self.position(type_id) {
            Some(index) => Some(std::mem::replace(&mut self.components[index], component)),
            None => {
                self.components.push(component);
                None
            }
        }
    }

    /// Remove a component. The transform cannot be removed.
    pub fn remove<C: Component>(&mut self) -> Result<Box<dyn Component>> {
        let type_id = TypeId::of::<C>();
        if type_id == TypeId::of::<Transform>() {
            return Err(SaveError::HierarchyError(
                "the transform cannot be removed".to_owned(),
            ));
        }
        let index = self
            .position(type_id)
            .ok_or_else(|| SaveError::ComponentNotFound(std::any::type_name::<C>().to_owned()))?;
        Ok(self.components.remove(index))
    }

    pub fn get<C: Component>(&self) -> Option<&C> {
        self.get_dyn(TypeId::of::<C>())?.downcast_ref::<C>()
    }

    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.get_dyn_mut(TypeId::of::<C>())?.downcast_mut::<C>()
    }

    pub fn has<C: Component>(&self) -> bool {
        self.position(TypeId::of::<C>()).is_some()
    }

    pub fn get_dyn(&self, type_id: TypeId) -> Option<&(dyn Component + 'static)> {
        self.position(type_id).map(|i| &*self.components[i])
    }

    pub fn get_dyn_mut(&mut self, type_id: TypeId) -> Option<&mut (dyn Component + 'static)> {
        let index = self.position(type_id)?;
        Some(&mut *self.components[index])
    }

    /// Find a component by its simple type name (`Player`, not `game::Player`)
    pub fn component_by_name(&self, short_name: &str) -> Option<&(dyn Component + 'static)> {
        self.components
            .iter()
            .find(|c| short_type_name(c.type_name()) == short_name)
            .map(|c| &**c)
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.get::<Transform>()
    }

    pub fn transform_mut(&mut self) -> Option<&mut Transform> {
        self.get_mut::<Transform>()
    }

    /// Components in attach order
    pub fn components(&self) -> impl Iterator<Item = &(dyn Component + 'static)> {
        self.components.iter().map(|c| &**c)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    fn position(&self, type_id: TypeId) -> Option<usize> {
        self.components
            .iter()
            .position(|c| c.component_type_id() == type_id)
    }
}

/// Live object set of one scene
pub struct Scene {
    name: String,
    index: i32,
    objects: SlotMap<ObjectHandle, GameObject>,
    events: Vec<SceneEvent>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: 0,
            objects: SlotMap::with_key(),
            events: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: i32) -> Self {
        self.index = index;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    /// Add an object to the scene
    pub fn spawn(&mut self, object: GameObject) -> ObjectHandle {
        let handle = self.objects.insert(object);
        self.events.push(SceneEvent::Spawned(handle));
        handle
    }

    /// Remove a single object. Children keep a dangling parent handle; use
    /// [`Scene::despawn_recursive`] to take the subtree with it.
    pub fn despawn(&mut self, handle: ObjectHandle) -> Result<GameObject> {
        let object = self
            .objects
            .remove(handle)
            .ok_or(SaveError::ObjectNotFound)?;
        self.events.push(SceneEvent::Despawned(handle));
        Ok(object)
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.objects.contains_key(handle)
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&GameObject> {
        self.objects.get(handle)
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut GameObject> {
        self.objects.get_mut(handle)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.objects.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &GameObject)> {
        self.objects.iter()
    }

    /// First live object with the given name
    pub fn find_by_name(&self, name: &str) -> Option<ObjectHandle> {
        self.objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(handle, _)| handle)
    }

    /// Take the pending lifecycle events
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Remove every object without recording events
    pub fn clear(&mut self) {
        self.objects.clear();
        self.events.clear();
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Gold(i32);
    impl Component for Gold {}

    #[test]
    fn test_object_components() {
        let mut obj = GameObject::new("chest").with(Gold(5));
        assert!(obj.transform().is_some());
        assert_eq!(obj.get::<Gold>(), Some(&Gold(5)));

        let old = obj.insert(Gold(9)).unwrap();
        assert_eq!(old.downcast_ref::<Gold>(), Some(&Gold(5)));
        assert_eq!(obj.component_count(), 2);
        assert!(obj.component_by_name("Gold").is_some());

        obj.remove::<Gold>().unwrap();
        assert!(!obj.has::<Gold>());
        assert!(obj.remove::<Transform>().is_err());
    }

    #[test]
    fn test_spawn_despawn_events() {
        let mut scene = Scene::new("level");
        let a = scene.spawn(GameObject::new("a"));
        assert!(scene.contains(a));
        scene.despawn(a).unwrap();
        assert!(!scene.contains(a));
        assert!(matches!(scene.despawn(a), Err(SaveError::ObjectNotFound)));

        let events = scene.drain_events();
        assert_eq!(events, vec![SceneEvent::Spawned(a), SceneEvent::Despawned(a)]);
        assert!(scene.drain_events().is_empty());
    }

    #[test]
    fn test_find_by_name() {
        let mut scene = Scene::default();
        scene.spawn(GameObject::new("a"));
        let b = scene.spawn(GameObject::new("b"));
        assert_eq!(scene.find_by_name("b"), Some(b));
        assert_eq!(scene.find_by_name("c"), None);
    }
}
