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

//! Object handles and scene lifecycle events.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a live game object, backed by slotmap's generational keys.
    pub struct ObjectHandle;
}

/// Object lifecycle events recorded by the scene
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneEvent {
    /// Object was spawned into the scene
    Spawned(ObjectHandle),

    /// Object was removed from the scene
    Despawned(ObjectHandle),
}

impl SceneEvent {
    /// Get the object involved in this event
    pub fn handle(&self) -> ObjectHandle {
        match self {
            SceneEvent::Spawned(handle) | SceneEvent::Despawned(handle) => *handle,
        }
    }
}

/// Strip the module path (and generic arguments) from a full type name.
///
/// `my_game::player::Inventory<u32>` becomes `Inventory`.
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("game::player::Player"), "Player");
        assert_eq!(short_type_name("Player"), "Player");
        assert_eq!(
            short_type_name("alloc::vec::Vec<game::Item>"),
            "Vec"
        );
    }

    #[test]
    fn test_event_handle() {
        let mut map: SlotMap<ObjectHandle, ()> = SlotMap::with_key();
        let h = map.insert(());
        assert_eq!(SceneEvent::Spawned(h).handle(), h);
        assert_eq!(SceneEvent::Despawned(h).handle(), h);
    }
}
