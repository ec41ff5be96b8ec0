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

//! Rigidbody and capsule collider.

use glam::{Quat, Vec3};
use std::any::TypeId;
use tracing::warn;

use crate::component::Component;
use crate::convert::{ConvertContext, SaveEnum, ValueConvert};
use crate::error::{Result, SaveError};
use crate::save_enum;
use crate::serialization::{ComponentSerializer, SaveRegistry};
use crate::value::{Value, ValueMap};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RigidbodyConstraints {
    #[default]
    None,
    FreezePosition,
    FreezeRotation,
    FreezeAll,
}
save_enum!(RigidbodyConstraints {
    None,
    FreezePosition,
    FreezeRotation,
    FreezeAll
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CollisionDetectionMode {
    #[default]
    Discrete,
    Continuous,
    ContinuousDynamic,
}
save_enum!(CollisionDetectionMode {
    Discrete,
    Continuous,
    ContinuousDynamic
});

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RigidbodyInterpolation {
    #[default]
    None,
    Interpolate,
    Extrapolate,
}
save_enum!(RigidbodyInterpolation {
    None,
    Interpolate,
    Extrapolate
});

/// Rigid body state
#[derive(Clone, Debug, PartialEq)]
pub struct Rigidbody {
    pub is_kinematic: bool,
    pub freeze_rotation: bool,
    pub use_gravity: bool,
    pub detect_collisions: bool,
    pub drag: f32,
    pub angular_drag: f32,
    pub mass: f32,
    pub rotation: Quat,
    pub max_angular_velocity: f32,
    pub constraints: RigidbodyConstraints,
    pub collision_detection_mode: CollisionDetectionMode,
    pub interpolation: RigidbodyInterpolation,
    pub solver_iteration_count: i32,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub inertia_tensor: Vec3,
    pub inertia_tensor_rotation: Quat,
}

impl Default for Rigidbody {
    fn default() -> Self {
        Self {
            is_kinematic: false,
            freeze_rotation: false,
            use_gravity: true,
            detect_collisions: true,
            drag: 0.0,
            angular_drag: 0.05,
            mass: 1.0,
            rotation: Quat::IDENTITY,
            max_angular_velocity: 7.0,
            constraints: RigidbodyConstraints::default(),
            collision_detection_mode: CollisionDetectionMode::default(),
            interpolation: RigidbodyInterpolation::default(),
            solver_iteration_count: 6,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            inertia_tensor: Vec3::ONE,
            inertia_tensor_rotation: Quat::IDENTITY,
        }
    }
}

impl Component for Rigidbody {}

fn read_enum<E: SaveEnum>(data: &ValueMap, key: &str, target: &mut E) {
    let Some(v) = data.get(key) else {
        return;
    };
    let name = v.to_text().unwrap_or_default();
    match E::from_variant_name(&name) {
        Some(variant) => *target = variant,
        None => warn!(
            field = key,
            value = %name,
            enum_name = std::any::type_name::<E>(),
            "unknown enum variant, field skipped"
        ),
    }
}

fn read<T: ValueConvert>(data: &ValueMap, key: &str, target: &mut T, ctx: &ConvertContext<'_>) {
    let Some(v) = data.get(key) else {
        return;
    };
    match T::from_value(v, ctx) {
        Ok(value) => *target = value,
        Err(err) => warn!(field = key, error = %err, "rigidbody field could not be restored, skipped"),
    }
}

/// Rigidbody serializer
///
/// Motion state (velocities and inertia) only applies to non-kinematic
/// bodies, so the body stays kinematic while fields are restored and takes
/// its saved `isKinematic` last.
pub struct RigidbodySerializer;

impl ComponentSerializer for RigidbodySerializer {
    fn component_type(&self) -> TypeId {
        TypeId::of::<Rigidbody>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Rigidbody>()
    }

    fn serialize(&self, component: &dyn Component, ctx: &ConvertContext<'_>) -> Result<ValueMap> {
        let body = component
            .downcast_ref::<Rigidbody>()
            .ok_or_else(|| SaveError::ComponentNotFound(self.type_name().to_owned()))?;

        let mut data = ValueMap::with_capacity(17);
        data.insert("isKinematic", body.is_kinematic);
        data.insert("freezeRotation", body.freeze_rotation);
        data.insert("useGravity", body.use_gravity);
        data.insert("detectCollisions", body.detect_collisions);
        data.insert("drag", body.drag);
        data.insert("angularDrag", body.angular_drag);
        data.insert("mass", body.mass);
        data.insert("rotation", body.rotation.to_value(ctx)?);
        data.insert("maxAngularVelocity", body.max_angular_velocity);
        data.insert("constraints", body.constraints.variant_name());
        data.insert("collisionDetectionMode", body.collision_detection_mode.variant_name());
        data.insert("interpolation", body.interpolation.variant_name());
        data.insert("solverIterationCount", body.solver_iteration_count);
        data.insert("velocity", body.velocity.to_value(ctx)?);
        data.insert("angularVelocity", body.angular_velocity.to_value(ctx)?);
        data.insert("inertiaTensor", body.inertia_tensor.to_value(ctx)?);
        data.insert("inertiaTensorRotation", body.inertia_tensor_rotation.to_value(ctx)?);
        Ok(data)
    }

    fn deserialize(&self, component: &mut dyn Component, data: &ValueMap, ctx: &ConvertContext<'_>) -> Result<()> {
        let body = component
            .downcast_mut::<Rigidbody>()
            .ok_or_else(|| SaveError::ComponentNotFound(self.type_name().to_owned()))?;

        let kinematic = data
            .get("isKinematic")
            .and_then(Value::to_bool)
            .unwrap_or(body.is_kinematic);
        body.is_kinematic = true;

        read(data, "freezeRotation", &mut body.freeze_rotation, ctx);
        read(data, "useGravity", &mut body.use_gravity, ctx);
        read(data, "detectCollisions", &mut body.detect_collisions, ctx);
        read(data, "drag", &mut body.drag, ctx);
        read(data, "angularDrag", &mut body.angular_drag, ctx);
        read(data, "mass", &mut body.mass, ctx);
        read(data, "rotation", &mut body.rotation, ctx);
        read(data, "maxAngularVelocity", &mut body.max_angular_velocity, ctx);
        read_enum(data, "constraints", &mut body.constraints);
        read_enum(data, "collisionDetectionMode", &mut body.collision_detection_mode);
        read_enum(data, "interpolation", &mut body.interpolation);
        read(data, "solverIterationCount", &mut body.solver_iteration_count, ctx);

        if !kinematic {
            read(data, "velocity", &mut body.velocity, ctx);
            read(data, "angularVelocity", &mut body.angular_velocity, ctx);
            read(data, "inertiaTensor", &mut body.inertia_tensor, ctx);
            read(data, "inertiaTensorRotation", &mut body.inertia_tensor_rotation, ctx);
        }

        body.is_kinematic = kinematic;
        Ok(())
    }
}

/// Capsule collider
#[derive(Clone, Debug, PartialEq)]
pub struct CapsuleCollider {
    pub enabled: bool,
    pub is_trigger: bool,
    pub center: Vec3,
    pub radius: f32,
    pub height: f32,
    /// Axis index: 0 = x, 1 = y, 2 = z
    pub direction: i32,
}

impl Default for CapsuleCollider {
    fn default() -> Self {
        Self {
            enabled: true,
            is_trigger: false,
            center: Vec3::ZERO,
            radius: 0.5,
            height: 2.0,
            direction: 1,
        }
    }
}

impl Component for CapsuleCollider {}

pub(crate) fn register(registry: &mut SaveRegistry) -> Result<()> {
    registry.register_serializer(std::sync::Arc::new(RigidbodySerializer));

    let converters = registry.converters_mut();
    converters.register_enum::<RigidbodyConstraints>();
    converters.register_enum::<CollisionDetectionMode>();
    converters.register_enum::<RigidbodyInterpolation>();

    registry.register_fields::<CapsuleCollider, _>(|f| {
        f.field("enabled", |c: &CapsuleCollider| &c.enabled, |c: &mut CapsuleCollider| &mut c.enabled)
            .field(
                "isTrigger",
                |c: &CapsuleCollider| &c.is_trigger,
                |c: &mut CapsuleCollider| &mut c.is_trigger,
            )
            .field("center", |c: &CapsuleCollider| &c.center, |c: &mut CapsuleCollider| &mut c.center)
            .field("radius", |c: &CapsuleCollider| &c.radius, |c: &mut CapsuleCollider| &mut c.radius)
            .field("height", |c: &CapsuleCollider| &c.height, |c: &mut CapsuleCollider| &mut c.height)
            .field(
                "direction",
                |c: &CapsuleCollider| &c.direction,
                |c: &mut CapsuleCollider| &mut c.direction,
            )
    })
}
