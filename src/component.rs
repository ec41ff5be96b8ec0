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

//! Component traits
//!
//! Components are data attached to game objects. At most one component of
//! each concrete type lives on an object.

use std::any::{Any, TypeId};

/// Type-erasure plumbing, implemented automatically for every `Component + Clone`.
pub trait ComponentBase: Any + Send + Sync {
    /// Full type name, used as the component key in saved data
    fn type_name(&self) -> &'static str;

    /// Concrete type id
    fn component_type_id(&self) -> TypeId;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Clone into a new box (used when instancing templates)
    fn clone_component(&self) -> Box<dyn Component>;
}

impl<T: Component + Clone> ComponentBase for T {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn component_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }
}

/// Component trait
///
/// Both hooks are optional. `on_serialized` runs after the component was
/// written into a save table, `on_deserialized` after every saved field of
/// the component has been restored.
pub trait Component: ComponentBase {
    fn on_serialized(&self) {}

    fn on_deserialized(&mut self) {}
}

impl<'a> dyn Component + 'a {
    /// Downcast to a concrete component type
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutable downcast to a concrete component type
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Check the concrete type
    pub fn is<T: Component>(&self) -> bool {
        self.component_type_id() == TypeId::of::<T>()
    }
}

impl Clone for Box<dyn Component> {
    fn clone(&self) -> Self {
        self.clone_component()
    }
}

impl std::fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Component").field(&self.type_name()).finish()
    }
}
