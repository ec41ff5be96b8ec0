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

//! Object serialization
//!
//! A tracked object is written as a map with its `name`, `tag`, `layer` and
//! `activeSelf`, followed by one entry per included component keyed by the
//! component's full type name.

use ahash::AHashMap;
use std::any::TypeId;
use std::sync::Arc;

#[cfg(feature = "profiling")]
use tracing::info_span;
use tracing::{debug, trace, warn};

use crate::component::Component;
use crate::convert::{ConvertContext, ConverterRegistry};
use crate::entity::ObjectHandle;
use crate::error::Result;
use crate::reflection::{FieldTable, FieldTableBuilder};
use crate::scene::GameObject;
use crate::value::{Value, ValueMap};

/// Serializer for one component type
pub trait ComponentSerializer: Send + Sync {
    /// Type handled
    fn component_type(&self) -> TypeId;

    /// Full type name, used as the key in the object map
    fn type_name(&self) -> &'static str;

    fn serialize(&self, component: &dyn Component, ctx: &ConvertContext<'_>) -> Result<ValueMap>;

    /// Restore from `data`. Keys missing from `data` leave state untouched.
    fn deserialize(&self, component: &mut dyn Component, data: &ValueMap, ctx: &ConvertContext<'_>) -> Result<()>;
}

/// Converters plus the component serializers built on top of them.
///
/// Constructed once, shared by the save manager for the whole session.
#[derive(Clone)]
pub struct SaveRegistry {
    converters: ConverterRegistry,
    serializers: AHashMap<TypeId, Arc<dyn ComponentSerializer>>,
}

impl SaveRegistry {
    /// Default converters, no component serializers
    pub fn new() -> Self {
        Self {
            converters: ConverterRegistry::with_defaults(),
            serializers: AHashMap::new(),
        }
    }

    /// Default converters plus the built-in component serializers
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        crate::builtin::register_builtins(&mut registry)?;
        Ok(registry)
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn converters_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.converters
    }

    /// Build and register a field table for `C`
    pub fn register_fields<C, F>(&mut self, describe: F) -> Result<()>
    where
        C: Component,
        F: FnOnce(FieldTableBuilder<'_, C>) -> FieldTableBuilder<'_, C>,
    {
        let table: FieldTable<C> = describe(FieldTableBuilder::new(&self.converters)).build()?;
        debug!(component = std::any::type_name::<C>(), fields = table.len(), "field table registered");
        self.register_serializer(Arc::new(table));
        Ok(())
    }

    /// Register a hand-written serializer. The first registration for a type wins.
    pub fn register_serializer(&mut self, serializer: Arc<dyn ComponentSerializer>) -> bool {
        let type_id = serializer.component_type();
        if self.serializers.contains_key(&type_id) {
            return false;
        }
        self.serializers.insert(type_id, serializer);
        true
    }

    pub fn serializer_for(&self, type_id: TypeId) -> Option<&Arc<dyn ComponentSerializer>> {
        self.serializers.get(&type_id)
    }

    pub fn is_serializable(&self, type_id: TypeId) -> bool {
        self.serializers.contains_key(&type_id)
    }

    pub fn serializer_count(&self) -> usize {
        self.serializers.len()
    }
}

impl Default for SaveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One component slot of a tracked object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentEntry {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub include: bool,
}

/// An object registered for saving, with the components that get written
#[derive(Clone, Debug)]
pub struct TrackedObject {
    handle: ObjectHandle,
    /// Write every listed component regardless of its include flag
    pub store_all_components: bool,
    components: Vec<ComponentEntry>,
    runtime_instance: bool,
}

impl TrackedObject {
    /// Track every serializable component currently on `object`
    pub fn from_object(handle: ObjectHandle, object: &GameObject, registry: &SaveRegistry) -> Self {
        let mut tracked = Self {
            handle,
            store_all_components: true,
            components: Vec::new(),
            runtime_instance: false,
        };
        tracked.refresh(object, registry);
        tracked
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    pub fn is_runtime_instance(&self) -> bool {
        self.runtime_instance
    }

    pub(crate) fn mark_runtime_instance(&mut self) {
        self.runtime_instance = true;
    }

    pub fn components(&self) -> &[ComponentEntry] {
        &self.components
    }

    /// Sync the list with the object: new serializable components are added
    /// (included), components no longer present are dropped.
    pub fn refresh(&mut self, object: &GameObject, registry: &SaveRegistry) {
        self.components
            .retain(|entry| object.get_dyn(entry.type_id).is_some());
        for component in object.components() {
            let type_id = component.component_type_id();
            if !registry.is_serializable(type_id) {
                continue;
            }
            if self.components.iter().all(|e| e.type_id != type_id) {
                self.components.push(ComponentEntry {
                    type_id,
                    type_name: component.type_name(),
                    include: true,
                });
            }
        }
    }

    /// Set the include flag of component `C`. Returns false if not listed.
    pub fn set_included<C: Component>(&mut self, include: bool) -> bool {
        self.set_included_by_id(TypeId::of::<C>(), include)
    }

    pub fn set_included_by_id(&mut self, type_id: TypeId, include: bool) -> bool {
        match self.components.iter_mut().find(|e| e.type_id == type_id) {
            Some(entry) => {
                entry.include = include;
                true
            }
            None => false,
        }
    }

    fn writes(&self, entry: &ComponentEntry) -> bool {
        self.store_all_components || entry.include
    }
}

/// Write an object into its save map
pub fn serialize_object(
    object: &GameObject,
    tracked: &TrackedObject,
    registry: &SaveRegistry,
    ctx: &ConvertContext<'_>,
) -> Result<ValueMap> {
    #[cfg(feature = "profiling")]
    let _span = info_span!("serialize_object", name = %object.name).entered();

    let mut data = ValueMap::with_capacity(4 + tracked.components.len());
    data.insert("name", object.name.as_str());
    data.insert("tag", object.tag.as_str());
    data.insert("layer", object.layer);
    data.insert("activeSelf", object.is_active());

    for entry in &tracked.components {
        if !tracked.writes(entry) {
            continue;
        }
        let Some(component) = object.get_dyn(entry.type_id) else {
            trace!(component = entry.type_name, "listed component missing, skipped");
            continue;
        };
        let Some(serializer) = registry.serializer_for(entry.type_id) else {
            continue;
        };
        let component_data = serializer.serialize(component, ctx)?;
        data.insert(serializer.type_name(), Value::Map(component_data));
        component.on_serialized();
    }
    Ok(data)
}

/// Restore an object from its save map.
///
/// Listed components with data are restored first, each followed by its
/// `on_deserialized` hook, then the object's own properties. A component
/// whose serializer fails is logged and skipped; the rest still load.
pub fn deserialize_object(
    object: &mut GameObject,
    tracked: &TrackedObject,
    data: &ValueMap,
    registry: &SaveRegistry,
    ctx: &ConvertContext<'_>,
) -> Result<()> {
    #[cfg(feature = "profiling")]
    let _span = info_span!("deserialize_object", name = %object.name).entered();

    for entry in &tracked.components {
        let Some(serializer) = registry.serializer_for(entry.type_id) else {
            continue;
        };
        let Some(component_data) = data.get_map(serializer.type_name()) else {
            continue;
        };
        let Some(component) = object.get_dyn_mut(entry.type_id) else {
            continue;
        };
        match serializer.deserialize(&mut *component, component_data, ctx) {
            Ok(()) => component.on_deserialized(),
            Err(err) => warn!(
                component = serializer.type_name(),
                error = %err,
                "component could not be restored, skipped"
            ),
        }
    }

    if let Some(name) = data.get("name").and_then(Value::to_text) {
        object.name = name;
    }
    if let Some(tag) = data.get("tag").and_then(Value::to_text) {
        object.tag = tag;
    }
    if let Some(layer) = data.get("layer").and_then(Value::to_i32) {
        object.layer = layer;
    }
    if let Some(active) = data.get("activeSelf").and_then(Value::to_bool) {
        object.set_active(active);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetRegistry;
    use crate::identity::IdentityTable;
    use crate::scene::Scene;

    #[derive(Clone, Debug, Default)]
    struct Wallet {
        gold: i32,
        restored: u32,
    }
    impl Component for Wallet {
        fn on_deserialized(&mut self) {
            self.restored += 1;
        }
    }

    #[derive(Clone, Debug, Default)]
    struct Secret {
        code: i32,
    }
    impl Component for Secret {}

    fn registry() -> SaveRegistry {
        let mut registry = SaveRegistry::new();
        registry
            .register_fields::<Wallet, _>(|f| f.field("gold", |w: &Wallet| &w.gold, |w: &mut Wallet| &mut w.gold))
            .unwrap();
        registry
            .register_fields::<Secret, _>(|f| f.field("code", |s: &Secret| &s.code, |s: &mut Secret| &mut s.code))
            .unwrap();
        registry
    }

    #[test]
    fn test_envelope_layout() {
        let registry = registry();
        let mut scene = Scene::new("s");
        let h = scene.spawn(GameObject::new("chest").with(Wallet { gold: 3, restored: 0 }));
        let tracked = TrackedObject::from_object(h, scene.get(h).unwrap(), &registry);

        let ids = IdentityTable::new();
        let assets = AssetRegistry::new();
        let ctx = ConvertContext::new(&ids, &assets);
        let data = serialize_object(scene.get(h).unwrap(), &tracked, &registry, &ctx).unwrap();

        let keys: Vec<&str> = data.keys().collect();
        assert_eq!(&keys[..4], &["name", "tag", "layer", "activeSelf"]);
        let wallet = data.get_map(std::any::type_name::<Wallet>()).unwrap();
        assert_eq!(wallet.get("gold"), Some(&Value::Int32(3)));
    }

    #[test]
    fn test_include_flags() {
        let registry = registry();
        let mut scene = Scene::new("s");
        let h = scene.spawn(
            GameObject::new("vault")
                .with(Wallet::default())
                .with(Secret { code: 1234 }),
        );
        let mut tracked = TrackedObject::from_object(h, scene.get(h).unwrap(), &registry);
        assert_eq!(tracked.components().len(), 2);
        assert!(tracked.set_included::<Secret>(false));

        let ids = IdentityTable::new();
        let assets = AssetRegistry::new();
        let ctx = ConvertContext::new(&ids, &assets);

        let all = serialize_object(scene.get(h).unwrap(), &tracked, &registry, &ctx).unwrap();
        assert!(all.contains_key(std::any::type_name::<Secret>()));

        tracked.store_all_components = false;
        let some = serialize_object(scene.get(h).unwrap(), &tracked, &registry, &ctx).unwrap();
        assert!(!some.contains_key(std::any::type_name::<Secret>()));
        assert!(some.contains_key(std::any::type_name::<Wallet>()));
    }

    #[test]
    fn test_deserialize_restores_and_notifies() {
        let registry = registry();
        let mut scene = Scene::new("s");
        let h = scene.spawn(GameObject::new("chest").with(Wallet::default()));
        let tracked = TrackedObject::from_object(h, scene.get(h).unwrap(), &registry);

        let mut wallet = ValueMap::new();
        wallet.insert("gold", Value::Int64(50));
        let mut data = ValueMap::new();
        data.insert("name", "renamed");
        data.insert("activeSelf", false);
        data.insert(std::any::type_name::<Wallet>(), wallet);

        let ids = IdentityTable::new();
        let assets = AssetRegistry::new();
        let ctx = ConvertContext::new(&ids, &assets);
        let object = scene.get_mut(h).unwrap();
        deserialize_object(object, &tracked, &data, &registry, &ctx).unwrap();

        assert_eq!(object.name, "renamed");
        assert!(!object.is_active());
        assert_eq!(object.tag, "Untagged");
        let wallet = object.get::<Wallet>().unwrap();
        assert_eq!(wallet.gold, 50);
        assert_eq!(wallet.restored, 1);
    }

    #[derive(Clone, Debug, Default)]
    struct Brittle {
        restored: u32,
    }
    impl Component for Brittle {
        fn on_deserialized(&mut self) {
            self.restored += 1;
        }
    }

    struct BrittleSerializer;

    impl ComponentSerializer for BrittleSerializer {
        fn component_type(&self) -> TypeId {
            TypeId::of::<Brittle>()
        }

        fn type_name(&self) -> &'static str {
            std::any::type_name::<Brittle>()
        }

        fn serialize(&self, _component: &dyn Component, _ctx: &ConvertContext<'_>) -> Result<ValueMap> {
            Ok(ValueMap::new())
        }

        fn deserialize(&self, _component: &mut dyn Component, _data: &ValueMap, _ctx: &ConvertContext<'_>) -> Result<()> {
            Err(crate::error::SaveError::UnsupportedType("Brittle".to_owned()))
        }
    }

    #[test]
    fn test_failing_component_does_not_block_others() {
        let mut registry = registry();
        assert!(registry.register_serializer(Arc::new(BrittleSerializer)));
        let mut scene = Scene::new("s");
        let h = scene.spawn(GameObject::new("Hero").with(Brittle::default()).with(Wallet::default()));
        let tracked = TrackedObject::from_object(h, scene.get(h).unwrap(), &registry);

        let mut wallet = ValueMap::new();
        wallet.insert("gold", 77);
        let mut data = ValueMap::new();
        data.insert("name", "Restored");
        data.insert("layer", 4);
        data.insert(std::any::type_name::<Brittle>(), ValueMap::new());
        data.insert(std::any::type_name::<Wallet>(), wallet);

        let ids = IdentityTable::new();
        let assets = AssetRegistry::new();
        let ctx = ConvertContext::new(&ids, &assets);
        let object = scene.get_mut(h).unwrap();
        deserialize_object(object, &tracked, &data, &registry, &ctx).unwrap();

        assert_eq!(object.name, "Restored");
        assert_eq!(object.layer, 4);
        assert_eq!(object.get::<Wallet>().unwrap().gold, 77);
        assert_eq!(object.get::<Brittle>().unwrap().restored, 0);
    }

    #[test]
    fn test_refresh_drops_removed_components() {
        let registry = registry();
        let mut scene = Scene::new("s");
        let h = scene.spawn(GameObject::new("x").with(Secret::default()));
        let mut tracked = TrackedObject::from_object(h, scene.get(h).unwrap(), &registry);

        let object = scene.get_mut(h).unwrap();
        object.remove::<Secret>().unwrap();
        object.insert(Wallet::default());
        tracked.refresh(object, &registry);

        let names: Vec<_> = tracked.components().iter().map(|e| e.type_id).collect();
        assert_eq!(names, vec![TypeId::of::<Wallet>()]);
    }
}
