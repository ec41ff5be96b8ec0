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

//! Field tables: explicit registration of the fields of a component that
//! take part in saving.
//!
//! Each field is a scalar, a `Vec` of a convertible element, or a
//! `String`-keyed `HashMap` of a convertible element. Converters are resolved
//! when the table is built, so an unsupported field fails at registration
//! rather than during a save.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::component::Component;
use crate::convert::{ConvertContext, ConverterRegistry, TypeConverter};
use crate::error::{Result, SaveError};
use crate::serialization::ComponentSerializer;
use crate::value::{Value, ValueMap};

/// Declared shape of a field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldShape {
    Scalar,
    Sequence,
    Map,
}

type ReadFn<C> =
    Box<dyn Fn(&C, &dyn TypeConverter, &ConvertContext<'_>) -> Result<Value> + Send + Sync>;
type WriteFn<C> =
    Box<dyn Fn(&mut C, &Value, &dyn TypeConverter, &ConvertContext<'_>) -> Result<()> + Send + Sync>;

struct FieldEntry<C> {
    name: &'static str,
    shape: FieldShape,
    converter: Arc<dyn TypeConverter>,
    read: ReadFn<C>,
    write: WriteFn<C>,
}

/// Description of one registered field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub shape: FieldShape,
    pub element_type: &'static str,
}

/// Builder for a [`FieldTable`]
pub struct FieldTableBuilder<'r, C> {
    registry: &'r ConverterRegistry,
    fields: Vec<FieldEntry<C>>,
    error: Option<SaveError>,
}

impl<'r, C: Component> FieldTableBuilder<'r, C> {
    pub fn new(registry: &'r ConverterRegistry) -> Self {
        Self {
            registry,
            fields: Vec::new(),
            error: None,
        }
    }

    /// Scalar field
    pub fn field<T, G, M>(mut self, name: &'static str, get: G, get_mut: M) -> Self
    where
        T: 'static,
        G: Fn(&C) -> &T + Send + Sync + 'static,
        M: Fn(&mut C) -> &mut T + Send + Sync + 'static,
    {
        let Some(converter) = self.converter_for::<T>(name) else {
            return self;
        };
        let read: ReadFn<C> = Box::new(move |c, conv, ctx| conv.convert_from(get(c), ctx));
        let write: WriteFn<C> = Box::new(move |c, value, conv, ctx| {
            *get_mut(c) = downcast_owned::<T>(conv.convert_to(value, ctx)?)?;
            Ok(())
        });
        self.push(name, FieldShape::Scalar, converter, read, write)
    }

    /// Ordered sequence field
    pub fn list<T, G, M>(mut self, name: &'static str, get: G, get_mut: M) -> Self
    where
        T: 'static,
        G: Fn(&C) -> &Vec<T> + Send + Sync + 'static,
        M: Fn(&mut C) -> &mut Vec<T> + Send + Sync + 'static,
    {
        let Some(converter) = self.converter_for::<T>(name) else {
            return self;
        };
        let read: ReadFn<C> = Box::new(move |c, conv, ctx| {
            let items = get(c)
                .iter()
                .map(|item| element_from(conv, item, ctx))
                .collect();
            Ok(Value::List(items))
        });
        let write: WriteFn<C> = Box::new(move |c, value, conv, ctx| {
            let items = value.as_list().ok_or_else(|| SaveError::TypeMismatch {
                expected: "List",
                found: value.type_name(),
            })?;
            *get_mut(c) = items
                .iter()
                .filter_map(|item| element_to::<T>(conv, item, ctx))
                .collect();
            Ok(())
        });
        self.push(name, FieldShape::Sequence, converter, read, write)
    }

    /// String-keyed map field. Any other key type fails the build.
    pub fn map<K, T, S, G, M>(mut self, name: &'static str, get: G, get_mut: M) -> Self
    where
        K: 'static,
        T: 'static,
        S: BuildHasher + Default + 'static,
        G: Fn(&C) -> &HashMap<K, T, S> + Send + Sync + 'static,
        M: Fn(&mut C) -> &mut HashMap<K, T, S> + Send + Sync + 'static,
    {
        if TypeId::of::<K>() != TypeId::of::<String>() {
            self.fail(SaveError::UnsupportedField {
                component: std::any::type_name::<C>(),
                field: name,
                reason: format!(
                    "map keys must be String, found {}",
                    std::any::type_name::<K>()
                ),
            });
            return self;
        }
        let Some(converter) = self.converter_for::<T>(name) else {
            return self;
        };
        let read: ReadFn<C> = Box::new(move |c, conv, ctx| {
            let map = string_keyed::<K, T, S>(get(c))?;
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = ValueMap::with_capacity(keys.len());
            for key in keys {
                out.insert(key.as_str(), element_from(conv, &map[key], ctx));
            }
            Ok(Value::Map(out))
        });
        let write: WriteFn<C> = Box::new(move |c, value, conv, ctx| {
            let entries = value.as_map().ok_or_else(|| SaveError::TypeMismatch {
                expected: "Dictionary",
                found: value.type_name(),
            })?;
            let mut restored: HashMap<String, T, S> = HashMap::default();
            for (key, item) in entries.iter() {
                if let Some(v) = element_to::<T>(conv, item, ctx) {
                    restored.insert(key.to_owned(), v);
                }
            }
            let target = string_keyed_mut::<K, T, S>(get_mut(c))?;
            *target = restored;
            Ok(())
        });
        self.push(name, FieldShape::Map, converter, read, write)
    }

    /// Finish the table, failing on the first unsupported field
    pub fn build(self) -> Result<FieldTable<C>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(FieldTable {
            type_name: std::any::type_name::<C>(),
            fields: self.fields,
        })
    }

    fn converter_for<T: 'static>(&mut self, field: &'static str) -> Option<Arc<dyn TypeConverter>> {
        if self.error.is_some() {
            return None;
        }
        match self.registry.lookup_type::<T>() {
            Ok(converter) => Some(converter),
            Err(_) => {
                self.fail(SaveError::UnsupportedField {
                    component: std::any::type_name::<C>(),
                    field,
                    reason: format!("no converter for {}", std::any::type_name::<T>()),
                });
                None
            }
        }
    }

    fn push(
        mut self,
        name: &'static str,
        shape: FieldShape,
        converter: Arc<dyn TypeConverter>,
        read: ReadFn<C>,
        write: WriteFn<C>,
    ) -> Self {
        if self.fields.iter().any(|f| f.name == name) {
            self.fail(SaveError::UnsupportedField {
                component: std::any::type_name::<C>(),
                field: name,
                reason: "field registered twice".to_owned(),
            });
            return self;
        }
        self.fields.push(FieldEntry {
            name,
            shape,
            converter,
            read,
            write,
        });
        self
    }

    fn fail(&mut self, err: SaveError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

fn downcast_owned<T: 'static>(boxed: Box<dyn Any>) -> Result<T> {
    boxed
        .downcast::<T>()
        .map(|b| *b)
        .map_err(|_| SaveError::UnsupportedType(std::any::type_name::<T>().to_owned()))
}

// Element failures inside sequences and maps degrade instead of aborting.
fn element_from<T: 'static>(conv: &dyn TypeConverter, item: &T, ctx: &ConvertContext<'_>) -> Value {
    conv.convert_from(item, ctx).unwrap_or_else(|err| {
        debug!(element = conv.type_name(), error = %err, "element written as null");
        Value::Null
    })
}

fn element_to<T: 'static>(conv: &dyn TypeConverter, item: &Value, ctx: &ConvertContext<'_>) -> Option<T> {
    match conv.convert_to(item, ctx).and_then(downcast_owned::<T>) {
        Ok(v) => Some(v),
        Err(err) => {
            debug!(element = conv.type_name(), error = %err, "element skipped");
            None
        }
    }
}

fn string_keyed<K: 'static, T: 'static, S: 'static>(map: &HashMap<K, T, S>) -> Result<&HashMap<String, T, S>> {
    (map as &dyn Any)
        .downcast_ref::<HashMap<String, T, S>>()
        .ok_or_else(|| SaveError::UnsupportedType(std::any::type_name::<K>().to_owned()))
}

fn string_keyed_mut<K: 'static, T: 'static, S: 'static>(
    map: &mut HashMap<K, T, S>,
) -> Result<&mut HashMap<String, T, S>> {
    (map as &mut dyn Any)
        .downcast_mut::<HashMap<String, T, S>>()
        .ok_or_else(|| SaveError::UnsupportedType(std::any::type_name::<K>().to_owned()))
}

/// Registered save fields of component type `C`
pub struct FieldTable<C> {
    type_name: &'static str,
    fields: Vec<FieldEntry<C>>,
}

impl<C: Component> FieldTable<C> {
    pub fn builder(registry: &ConverterRegistry) -> FieldTableBuilder<'_, C> {
        FieldTableBuilder::new(registry)
    }

    pub fn fields(&self) -> impl Iterator<Item = FieldInfo> + '_ {
        self.fields.iter().map(|f| FieldInfo {
            name: f.name,
            shape: f.shape,
            element_type: f.converter.type_name(),
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Write every registered field into a map, in registration order.
    ///
    /// A failing top-level field aborts with its error.
    pub fn write_fields(&self, component: &C, ctx: &ConvertContext<'_>) -> Result<ValueMap> {
        let mut out = ValueMap::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = (field.read)(component, &*field.converter, ctx)?;
            out.insert(field.name, value);
        }
        Ok(out)
    }

    /// Restore the fields present in `data`. Absent keys keep their current
    /// value; a value that cannot be restored is logged and skipped.
    ///
    /// Returns the number of fields restored.
    pub fn read_fields(&self, component: &mut C, data: &ValueMap, ctx: &ConvertContext<'_>) -> usize {
        let mut restored = 0;
        for field in &self.fields {
            let Some(value) = data.get(field.name) else {
                continue;
            };
            match (field.write)(component, value, &*field.converter, ctx) {
                Ok(()) => restored += 1,
                Err(err) => warn!(
                    component = self.type_name,
                    field = field.name,
                    error = %err,
                    "field not restored"
                ),
            }
        }
        restored
    }
}

impl<C: Component> ComponentSerializer for FieldTable<C> {
    fn component_type(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn serialize(&self, component: &dyn Component, ctx: &ConvertContext<'_>) -> Result<ValueMap> {
        let component = component
            .downcast_ref::<C>()
            .ok_or_else(|| SaveError::ComponentNotFound(self.type_name.to_owned()))?;
        self.write_fields(component, ctx)
    }

    fn deserialize(&self, component: &mut dyn Component, data: &ValueMap, ctx: &ConvertContext<'_>) -> Result<()> {
        let component = component
            .downcast_mut::<C>()
            .ok_or_else(|| SaveError::ComponentNotFound(self.type_name.to_owned()))?;
        self.read_fields(component, data, ctx);
        Ok(())
    }
}
