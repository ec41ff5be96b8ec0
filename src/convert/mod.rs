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

//! Type converter registry
//!
//! Maps a runtime type to a converter between native values and [`Value`].
//! Lookup order: exact type, then the object reference fallback, then the
//! asset reference fallback.

pub mod enums;
pub mod math;
pub mod primitive;
pub mod reference;

use ahash::AHashMap;
use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::assets::{AssetHandle, AssetRegistry};
use crate::entity::ObjectHandle;
use crate::error::{Result, SaveError};
use crate::identity::IdentityTable;
use crate::value::Value;

pub use enums::SaveEnum;
pub use math::{Color, Color32, Rect};
pub use reference::{AssetRef, AssetReference, ComponentRef, ObjectRef, ObjectReference};

/// Lookup tables a conversion may consult to turn handles into identities
/// and back.
#[derive(Clone, Copy)]
pub struct ConvertContext<'a> {
    identities: &'a IdentityTable,
    assets: &'a AssetRegistry,
}

/// Result of resolving an identity string
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved {
    Object(ObjectHandle),
    Asset(AssetHandle),
}

impl<'a> ConvertContext<'a> {
    pub fn new(identities: &'a IdentityTable, assets: &'a AssetRegistry) -> Self {
        Self { identities, assets }
    }

    pub fn identities(&self) -> &'a IdentityTable {
        self.identities
    }

    pub fn assets(&self) -> &'a AssetRegistry {
        self.assets
    }

    /// Live objects first, then the asset table
    pub fn resolve(&self, id: &str) -> Option<Resolved> {
        self.identities
            .resolve(id)
            .map(Resolved::Object)
            .or_else(|| self.assets.resolve(id).map(Resolved::Asset))
    }

    pub fn identity_of(&self, handle: ObjectHandle) -> Option<&'a str> {
        self.identities.identity_of(handle)
    }

    pub fn asset_id(&self, handle: AssetHandle) -> Option<&'a str> {
        self.assets.id_of(handle)
    }
}

/// Type-erased converter stored in the registry
pub trait TypeConverter: Send + Sync {
    /// Name of the native type handled
    fn type_name(&self) -> &'static str;

    /// Native value → [`Value`]
    fn convert_from(&self, value: &dyn Any, ctx: &ConvertContext<'_>) -> Result<Value>;

    /// [`Value`] → boxed native value
    fn convert_to(&self, data: &Value, ctx: &ConvertContext<'_>) -> Result<Box<dyn Any>>;
}

/// Typed conversion, implemented by every type with a direct converter
pub trait ValueConvert: Sized + Send + Sync + 'static {
    fn to_value(&self, ctx: &ConvertContext<'_>) -> Result<Value>;

    fn from_value(value: &Value, ctx: &ConvertContext<'_>) -> Result<Self>;
}

/// Mismatch error for a stored value that cannot become `T`
pub(crate) fn mismatch<T>(found: &Value) -> SaveError {
    SaveError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        found: found.type_name(),
    }
}

fn downcast_input<T: 'static>(value: &dyn Any) -> Result<&T> {
    value
        .downcast_ref::<T>()
        .ok_or_else(|| SaveError::UnsupportedType(std::any::type_name::<T>().to_owned()))
}

/// Adapter from [`ValueConvert`] to [`TypeConverter`]
pub struct Typed<T>(PhantomData<fn() -> T>);

impl<T> Typed<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ValueConvert> TypeConverter for Typed<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn convert_from(&self, value: &dyn Any, ctx: &ConvertContext<'_>) -> Result<Value> {
        downcast_input::<T>(value)?.to_value(ctx)
    }

    fn convert_to(&self, data: &Value, ctx: &ConvertContext<'_>) -> Result<Box<dyn Any>> {
        Ok(Box::new(T::from_value(data, ctx)?))
    }
}

/// Entry of the startup converter list: a type plus how to build its converter
#[derive(Clone, Copy)]
pub struct ConverterDescriptor {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub factory: fn() -> Arc<dyn TypeConverter>,
}

fn make_typed<T: ValueConvert>() -> Arc<dyn TypeConverter> {
    Arc::new(Typed::<T>::new())
}

impl ConverterDescriptor {
    pub fn of<T: ValueConvert>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            factory: make_typed::<T>,
        }
    }
}

/// Built-in converters: primitives, byte arrays, math types, component references
pub fn default_descriptors() -> Vec<ConverterDescriptor> {
    vec![
        ConverterDescriptor::of::<bool>(),
        ConverterDescriptor::of::<i32>(),
        ConverterDescriptor::of::<i64>(),
        ConverterDescriptor::of::<u8>(),
        ConverterDescriptor::of::<u32>(),
        ConverterDescriptor::of::<f32>(),
        ConverterDescriptor::of::<f64>(),
        ConverterDescriptor::of::<char>(),
        ConverterDescriptor::of::<String>(),
        ConverterDescriptor::of::<Vec<u8>>(),
        ConverterDescriptor::of::<Value>(),
        ConverterDescriptor::of::<glam::Vec2>(),
        ConverterDescriptor::of::<glam::Vec3>(),
        ConverterDescriptor::of::<glam::Vec4>(),
        ConverterDescriptor::of::<glam::Quat>(),
        ConverterDescriptor::of::<Color>(),
        ConverterDescriptor::of::<Color32>(),
        ConverterDescriptor::of::<Rect>(),
        ConverterDescriptor::of::<ComponentRef>(),
    ]
}

/// Which table satisfied a lookup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConverterKind {
    Exact,
    ObjectReference,
    AssetReference,
}

/// Registry of converters keyed by type
#[derive(Default, Clone)]
pub struct ConverterRegistry {
    exact: AHashMap<TypeId, Arc<dyn TypeConverter>>,
    object_refs: AHashMap<TypeId, Arc<dyn TypeConverter>>,
    asset_refs: AHashMap<TypeId, Arc<dyn TypeConverter>>,
}

impl ConverterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in converters and reference classifications
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_descriptors(default_descriptors());
        registry.register_object_reference::<ObjectRef>();
        registry.register_object_reference::<Option<ObjectHandle>>();
        registry.register_asset_reference::<AssetRef>();
        registry.register_asset_reference::<Option<AssetHandle>>();
        registry
    }

    /// Register a typed converter. The first registration for a type wins.
    pub fn register<T: ValueConvert>(&mut self) -> bool {
        self.register_converter(TypeId::of::<T>(), make_typed::<T>())
    }

    /// Register a type-erased converter. The first registration for a type wins.
    pub fn register_converter(&mut self, type_id: TypeId, converter: Arc<dyn TypeConverter>) -> bool {
        if self.exact.contains_key(&type_id) {
            return false;
        }
        self.exact.insert(type_id, converter);
        true
    }

    /// Walk a descriptor list, returning how many were newly registered
    pub fn register_descriptors<I>(&mut self, descriptors: I) -> usize
    where
        I: IntoIterator<Item = ConverterDescriptor>,
    {
        descriptors
            .into_iter()
            .filter(|d| self.register_converter(d.type_id, (d.factory)()))
            .count()
    }

    /// Register an enum that serializes by variant name
    pub fn register_enum<T: SaveEnum>(&mut self) -> bool {
        self.register_converter(TypeId::of::<T>(), Arc::new(enums::EnumConverter::<T>::new()))
    }

    /// Classify a type as a handle to a trackable object
    pub fn register_object_reference<T: ObjectReference>(&mut self) {
        self.object_refs
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(reference::ObjectRefConverter::<T>::new()));
    }

    /// Classify a type as a handle to an external asset
    pub fn register_asset_reference<T: AssetReference>(&mut self) {
        self.asset_refs
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(reference::AssetRefConverter::<T>::new()));
    }

    /// Find the converter for a type
    pub fn lookup(&self, type_id: TypeId, type_name: &str) -> Result<Arc<dyn TypeConverter>> {
        self.lookup_with_kind(type_id)
            .map(|(converter, _)| converter)
            .ok_or_else(|| SaveError::UnsupportedType(type_name.to_owned()))
    }

    pub fn lookup_type<T: 'static>(&self) -> Result<Arc<dyn TypeConverter>> {
        self.lookup(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Which table would serve a type, if any
    pub fn kind_of(&self, type_id: TypeId) -> Option<ConverterKind> {
        self.lookup_with_kind(type_id).map(|(_, kind)| kind)
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.lookup_with_kind(type_id).is_some()
    }

    fn lookup_with_kind(&self, type_id: TypeId) -> Option<(Arc<dyn TypeConverter>, ConverterKind)> {
        if let Some(c) = self.exact.get(&type_id) {
            return Some((c.clone(), ConverterKind::Exact));
        }
        if let Some(c) = self.object_refs.get(&type_id) {
            return Some((c.clone(), ConverterKind::ObjectReference));
        }
        self.asset_refs
            .get(&type_id)
            .map(|c| (c.clone(), ConverterKind::AssetReference))
    }

    /// Convert a native value through whichever converter serves its type
    pub fn convert_from<T: 'static>(&self, value: &T, ctx: &ConvertContext<'_>) -> Result<Value> {
        self.lookup_type::<T>()?.convert_from(value, ctx)
    }

    /// Convert a value back into a native `T`
    pub fn convert_to<T: 'static>(&self, data: &Value, ctx: &ConvertContext<'_>) -> Result<T> {
        let boxed = self.lookup_type::<T>()?.convert_to(data, ctx)?;
        boxed
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| SaveError::UnsupportedType(std::any::type_name::<T>().to_owned()))
    }

    /// Number of exact converters
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}
