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

//! Object, asset and component references.
//!
//! References are written as identity strings, so object graphs never nest.
//! Unresolved identities read back as empty references instead of errors.

use std::any::Any;
use std::marker::PhantomData;

use super::{mismatch, ConvertContext, Resolved, TypeConverter, ValueConvert};
use crate::assets::AssetHandle;
use crate::component::Component;
use crate::entity::{short_type_name, ObjectHandle};
use crate::error::{Result, SaveError};
use crate::scene::Scene;
use crate::value::{Value, ValueMap};

/// Reference to a live object or to an asset standing in for one (a prefab)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    #[default]
    None,
    Live(ObjectHandle),
    Asset(AssetHandle),
}

impl ObjectRef {
    pub fn live(&self) -> Option<ObjectHandle> {
        match self {
            ObjectRef::Live(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn asset(&self) -> Option<AssetHandle> {
        match self {
            ObjectRef::Asset(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ObjectRef::None)
    }
}

impl From<ObjectHandle> for ObjectRef {
    fn from(handle: ObjectHandle) -> Self {
        ObjectRef::Live(handle)
    }
}

/// Reference to an external asset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AssetRef(pub Option<AssetHandle>);

/// Types that hold a handle to a trackable object
pub trait ObjectReference: Send + Sync + 'static {
    fn to_object_ref(&self) -> ObjectRef;

    fn from_object_ref(reference: ObjectRef) -> Self;
}

impl ObjectReference for ObjectRef {
    fn to_object_ref(&self) -> ObjectRef {
        *self
    }

    fn from_object_ref(reference: ObjectRef) -> Self {
        reference
    }
}

impl ObjectReference for Option<ObjectHandle> {
    fn to_object_ref(&self) -> ObjectRef {
        self.map_or(ObjectRef::None, ObjectRef::Live)
    }

    fn from_object_ref(reference: ObjectRef) -> Self {
        reference.live()
    }
}

/// Types that hold a handle to an external asset
pub trait AssetReference: Send + Sync + 'static {
    fn to_asset(&self) -> Option<AssetHandle>;

    fn from_asset(handle: Option<AssetHandle>) -> Self;
}

impl AssetReference for AssetRef {
    fn to_asset(&self) -> Option<AssetHandle> {
        self.0
    }

    fn from_asset(handle: Option<AssetHandle>) -> Self {
        AssetRef(handle)
    }
}

impl AssetReference for Option<AssetHandle> {
    fn to_asset(&self) -> Option<AssetHandle> {
        *self
    }

    fn from_asset(handle: Option<AssetHandle>) -> Self {
        handle
    }
}

fn identity_arg(data: &Value) -> Option<&str> {
    data.as_str().filter(|s| !s.is_empty())
}

pub(crate) struct ObjectRefConverter<T>(PhantomData<fn() -> T>);

impl<T> ObjectRefConverter<T> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: ObjectReference> TypeConverter for ObjectRefConverter<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn convert_from(&self, value: &dyn Any, ctx: &ConvertContext<'_>) -> Result<Value> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| SaveError::UnsupportedType(self.type_name().to_owned()))?;
        let id = match value.to_object_ref() {
            ObjectRef::Live(handle) => ctx.identity_of(handle),
            ObjectRef::Asset(handle) => ctx.asset_id(handle),
            ObjectRef::None => None,
        };
        Ok(id.map_or(Value::Null, Value::from))
    }

    fn convert_to(&self, data: &Value, ctx: &ConvertContext<'_>) -> Result<Box<dyn Any>> {
        let reference = match identity_arg(data).and_then(|id| ctx.resolve(id)) {
            Some(Resolved::Object(handle)) => ObjectRef::Live(handle),
            Some(Resolved::Asset(handle)) => ObjectRef::Asset(handle),
            None => ObjectRef::None,
        };
        Ok(Box::new(T::from_object_ref(reference)))
    }
}

pub(crate) struct AssetRefConverter<T>(PhantomData<fn() -> T>);

impl<T> AssetRefConverter<T> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: AssetReference> TypeConverter for AssetRefConverter<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn convert_from(&self, value: &dyn Any, ctx: &ConvertContext<'_>) -> Result<Value> {
        let value = value
            .downcast_ref::<T>()
            .ok_or_else(|| SaveError::UnsupportedType(self.type_name().to_owned()))?;
        let id = value.to_asset().and_then(|handle| ctx.asset_id(handle));
        Ok(id.map_or(Value::Null, Value::from))
    }

    fn convert_to(&self, data: &Value, ctx: &ConvertContext<'_>) -> Result<Box<dyn Any>> {
        let handle = identity_arg(data).and_then(|id| ctx.assets().resolve(id));
        Ok(Box::new(T::from_asset(handle)))
    }
}

/// Reference to one component of a tracked object, written as `{id, type}`
/// where `type` is the component's simple type name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentRef {
    pub target: Option<ObjectHandle>,
    pub component: String,
}

impl ComponentRef {
    pub fn new<C: Component>(target: ObjectHandle) -> Self {
        Self {
            target: Some(target),
            component: short_type_name(std::any::type_name::<C>()).to_owned(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.target.is_none()
    }

    /// Look the component up in a scene
    pub fn get<'s>(&self, scene: &'s Scene) -> Option<&'s dyn Component> {
        scene.get(self.target?)?.component_by_name(&self.component)
    }
}

impl ValueConvert for ComponentRef {
    fn to_value(&self, ctx: &ConvertContext<'_>) -> Result<Value> {
        let Some(id) = self.target.and_then(|h| ctx.identity_of(h)) else {
            return Ok(Value::Null);
        };
        let mut map = ValueMap::with_capacity(2);
        map.insert("id", id);
        map.insert("type", self.component.as_str());
        Ok(Value::Map(map))
    }

    fn from_value(value: &Value, ctx: &ConvertContext<'_>) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Map(map) => map,
            other => return Err(mismatch::<Self>(other)),
        };
        let target = map
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| ctx.identities().resolve(id));
        match target {
            Some(handle) => Ok(Self {
                target: Some(handle),
                component: map
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            }),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Asset, AssetRegistry};
    use crate::convert::ConverterRegistry;
    use crate::identity::IdentityTable;
    use crate::scene::GameObject;

    #[derive(Clone)]
    struct Door;
    impl Component for Door {}

    #[test]
    fn test_object_reference_round_trip() {
        let mut scene = Scene::new("refs");
        let a = scene.spawn(GameObject::new("a"));
        let mut ids = IdentityTable::new();
        ids.insert("a1", a);
        let assets = AssetRegistry::new();
        let ctx = ConvertContext::new(&ids, &assets);
        let registry = ConverterRegistry::with_defaults();

        let v = registry.convert_from(&Some(a), &ctx).unwrap();
        assert_eq!(v, Value::String("a1".into()));
        let back: Option<ObjectHandle> = registry.convert_to(&v, &ctx).unwrap();
        assert_eq!(back, Some(a));
    }

    #[test]
    fn test_dangling_reference_is_none() {
        let ids = IdentityTable::new();
        let assets = AssetRegistry::new();
        let ctx = ConvertContext::new(&ids, &assets);
        let registry = ConverterRegistry::with_defaults();

        let back: ObjectRef = registry
            .convert_to(&Value::String("nowhere".into()), &ctx)
            .unwrap();
        assert!(back.is_none());
        let back: Option<ObjectHandle> = registry.convert_to(&Value::Null, &ctx).unwrap();
        assert_eq!(back, None);
    }

    #[test]
    fn test_object_reference_falls_back_to_assets() {
        let ids = IdentityTable::new();
        let mut assets = AssetRegistry::new();
        let prefab = assets.register_prefab("crate-prefab", GameObject::new("Crate")).unwrap();
        let ctx = ConvertContext::new(&ids, &assets);
        let registry = ConverterRegistry::with_defaults();

        let v = registry.convert_from(&ObjectRef::Asset(prefab), &ctx).unwrap();
        assert_eq!(v, Value::String("crate-prefab".into()));
        let back: ObjectRef = registry.convert_to(&v, &ctx).unwrap();
        assert_eq!(back, ObjectRef::Asset(prefab));
    }

    #[test]
    fn test_untracked_object_writes_null() {
        let mut scene = Scene::new("refs");
        let a = scene.spawn(GameObject::new("a"));
        let ids = IdentityTable::new();
        let assets = AssetRegistry::new();
        let ctx = ConvertContext::new(&ids, &assets);
        let registry = ConverterRegistry::with_defaults();
        assert_eq!(registry.convert_from(&ObjectRef::Live(a), &ctx).unwrap(), Value::Null);
    }

    #[test]
    fn test_asset_reference() {
        let ids = IdentityTable::new();
        let mut assets = AssetRegistry::new();
        let h = assets.register("music", Asset::data(vec![1u8, 2, 3])).unwrap();
        let ctx = ConvertContext::new(&ids, &assets);
        let registry = ConverterRegistry::with_defaults();

        let v = registry.convert_from(&AssetRef(Some(h)), &ctx).unwrap();
        assert_eq!(v, Value::String("music".into()));
        let back: AssetRef = registry.convert_to(&v, &ctx).unwrap();
        assert_eq!(back, AssetRef(Some(h)));
        let missing: AssetRef = registry.convert_to(&Value::String("x".into()), &ctx).unwrap();
        assert_eq!(missing, AssetRef(None));
    }

    #[test]
    fn test_component_reference() {
        let mut scene = Scene::new("refs");
        let door = scene.spawn(GameObject::new("door").with(Door));
        let mut ids = IdentityTable::new();
        ids.insert("door-1", door);
        let assets = AssetRegistry::new();
        let ctx = ConvertContext::new(&ids, &assets);

        let reference = ComponentRef::new::<Door>(door);
        let v = reference.to_value(&ctx).unwrap();
        let map = v.as_map().unwrap();
        assert_eq!(map.get("id"), Some(&Value::String("door-1".into())));
        assert_eq!(map.get("type"), Some(&Value::String("Door".into())));

        let back = ComponentRef::from_value(&v, &ctx).unwrap();
        assert_eq!(back, reference);
        assert!(back.get(&scene).is_some());

        let empty = IdentityTable::new();
        let ctx = ConvertContext::new(&empty, &assets);
        assert!(ComponentRef::from_value(&v, &ctx).unwrap().is_none());
    }
}
