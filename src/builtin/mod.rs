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

// Built-in components and their serializers

pub mod physics;
pub mod render;
pub mod transform;

use std::sync::Arc;

use crate::error::Result;
use crate::serialization::SaveRegistry;

pub use physics::{
    CapsuleCollider, CollisionDetectionMode, Rigidbody, RigidbodyConstraints, RigidbodyInterpolation,
    RigidbodySerializer,
};
pub use render::{Camera, Light, LightRenderMode, LightShadows, LightType};
pub use transform::{Transform, TransformSerializer};

/// Register serializers for every built-in component
pub fn register_builtins(registry: &mut SaveRegistry) -> Result<()> {
    registry.register_serializer(Arc::new(TransformSerializer));
    render::register(registry)?;
    physics::register(registry)?;
    Ok(())
}
