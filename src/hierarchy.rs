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

//! Parent/child relationships.
//!
//! The parent link lives on each object's [`Transform`]; children are derived
//! by scanning, so restoring a transform from saved data never leaves a
//! stale child list behind.

use ahash::AHashSet;
use tracing::warn;

use crate::builtin::transform::Transform;
use crate::entity::ObjectHandle;
use crate::error::{Result, SaveError};
use crate::scene::{GameObject, Scene};

impl Scene {
    /// Get parent of object
    pub fn parent_of(&self, handle: ObjectHandle) -> Option<ObjectHandle> {
        self.get(handle)?.transform()?.parent
    }

    /// Get direct children of object, in storage order
    pub fn children_of(&self, handle: ObjectHandle) -> Vec<ObjectHandle> {
        self.iter()
            .filter(|(_, object)| object.transform().and_then(|t| t.parent) == Some(handle))
            .map(|(child, _)| child)
            .collect()
    }

    /// Attach `child` under `parent`, or detach it with `None`.
    ///
    /// Fails on self-parenting and on links that would close a cycle.
    pub fn set_parent(&mut self, child: ObjectHandle, parent: Option<ObjectHandle>) -> Result<()> {
        if let Some(parent) = parent {
            if parent == child {
                return Err(SaveError::HierarchyError(
                    "an object cannot be its own parent".to_owned(),
                ));
            }
            if !self.contains(parent) {
                return Err(SaveError::ObjectNotFound);
            }
            if self.ancestors(parent).contains(&child) {
                return Err(SaveError::HierarchyError(
                    "parenting would create a cycle".to_owned(),
                ));
            }
        }

        let transform = self
            .get_mut(child)
            .ok_or(SaveError::ObjectNotFound)?
            .transform_mut()
            .ok_or_else(|| SaveError::ComponentNotFound("Transform".to_owned()))?;
        transform.parent = parent;
        Ok(())
    }

    /// Ancestors from the direct parent up to the root.
    ///
    /// Stops at the first repeated handle so corrupt links cannot loop.
    pub fn ancestors(&self, handle: ObjectHandle) -> Vec<ObjectHandle> {
        let mut seen = AHashSet::new();
        let mut out = Vec::new();
        let mut current = self.parent_of(handle);
        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            out.push(parent);
            current = self.parent_of(parent);
        }
        out
    }

    /// All descendants, depth-first, excluding `handle` itself
    pub fn descendants(&self, handle: ObjectHandle) -> Vec<ObjectHandle> {
        let mut seen = AHashSet::new();
        seen.insert(handle);
        let mut out = Vec::new();
        let mut stack = self.children_of(handle);
        stack.reverse();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next);
            let mut children = self.children_of(next);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Clear the parent link of `handle` if it closes a cycle. Returns true
    /// when a link was dropped.
    pub fn detach_if_cyclic(&mut self, handle: ObjectHandle) -> bool {
        if !self.ancestors(handle).contains(&handle) {
            return false;
        }
        let Some(object) = self.get_mut(handle) else {
            return false;
        };
        warn!(name = %object.name, "parent link closes a cycle, detached");
        if let Some(transform) = object.transform_mut() {
            transform.parent = None;
        }
        true
    }

    /// Remove an object and its whole subtree, returning the removed handles
    pub fn despawn_recursive(&mut self, handle: ObjectHandle) -> Result<Vec<(ObjectHandle, GameObject)>> {
        if !self.contains(handle) {
            return Err(SaveError::ObjectNotFound);
        }
        let mut doomed = self.descendants(handle);
        doomed.insert(0, handle);

        let mut removed = Vec::with_capacity(doomed.len());
        for target in doomed {
            let object = self.despawn(target)?;
            removed.push((target, object));
        }
        Ok(removed)
    }
}

/// Parent handle of a standalone object (outside any scene)
pub fn parent_of_object(object: &GameObject) -> Option<ObjectHandle> {
    object.get::<Transform>().and_then(|t| t.parent)
}
