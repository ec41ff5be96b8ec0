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

//! Local transform with its parent link, and its serializer.

use glam::{Quat, Vec3};
use std::any::TypeId;
use tracing::warn;

use crate::component::Component;
use crate::convert::{ConvertContext, ValueConvert};
use crate::entity::ObjectHandle;
use crate::error::{Result, SaveError};
use crate::serialization::ComponentSerializer;
use crate::value::{Value, ValueMap};

/// Local transform component
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    pub local_position: Vec3,
    pub local_rotation: Quat,
    pub local_scale: Vec3,
    pub parent: Option<ObjectHandle>,
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(local_position: Vec3) -> Self {
        Self {
            local_position,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, local_rotation: Quat) -> Self {
        self.local_rotation = local_rotation;
        self
    }

    pub fn with_scale(mut self, local_scale: Vec3) -> Self {
        self.local_scale = local_scale;
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            local_position: Vec3::ZERO,
            local_rotation: Quat::IDENTITY,
            local_scale: Vec3::ONE,
            parent: None,
        }
    }
}

impl Component for Transform {}

/// Writes local position/rotation/scale and the parent's identity
pub struct TransformSerializer;

impl ComponentSerializer for TransformSerializer {
    fn component_type(&self) -> TypeId {
        TypeId::of::<Transform>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Transform>()
    }

    fn serialize(&self, component: &dyn Component, ctx: &ConvertContext<'_>) -> Result<ValueMap> {
        let transform = component
            .downcast_ref::<Transform>()
            .ok_or_else(|| SaveError::ComponentNotFound(self.type_name().to_owned()))?;

        let mut data = ValueMap::with_capacity(4);
        data.insert("localPosition", transform.local_position.to_value(ctx)?);
        data.insert("localRotation", transform.local_rotation.to_value(ctx)?);
        data.insert("localScale", transform.local_scale.to_value(ctx)?);

        let parent = match transform.parent {
            None => Value::Null,
            Some(parent) => match ctx.identity_of(parent) {
                Some(id) => Value::from(id),
                None => {
                    warn!(
                        "saving a transform whose parent has no unique identifier; \
                         position and rotation may be wrong after loading"
                    );
                    Value::Null
                }
            },
        };
        data.insert("parent", parent);
        Ok(data)
    }

    fn deserialize(&self, component: &mut dyn Component, data: &ValueMap, ctx: &ConvertContext<'_>) -> Result<()> {
        let transform = component
            .downcast_mut::<Transform>()
            .ok_or_else(|| SaveError::ComponentNotFound(self.type_name().to_owned()))?;

        if let Some(parent) = data.get("parent") {
            transform.parent = parent
                .as_str()
                .and_then(|id| ctx.identities().resolve(id));
        }
        restore(data, "localRotation", &mut transform.local_rotation, ctx);
        restore(data, "localPosition", &mut transform.local_position, ctx);
        restore(data, "localScale", &mut transform.local_scale, ctx);
        Ok(())
    }
}

fn restore<T: ValueConvert>(data: &ValueMap, key: &str, target: &mut T, ctx: &ConvertContext<'_>) {
    let Some(v) = data.get(key) else {
        return;
    };
    match T::from_value(v, ctx) {
        Ok(value) => *target = value,
        Err(err) => warn!(field = key, error = %err, "transform field could not be restored, skipped"),
    }
}
