//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use archetype_save::prelude::*;
//! ```

pub use crate::assets::{Asset, AssetHandle, AssetRegistry, Prefab};
pub use crate::builtin::{Camera, CapsuleCollider, Light, Rigidbody, Transform};
pub use crate::codec::{DataFormat, TextEncoding};
pub use crate::component::Component;
pub use crate::config::{LogConfig, SaveConfig};
pub use crate::convert::{
    AssetRef, Color, Color32, ComponentRef, ObjectRef, Rect, SaveEnum, ValueConvert,
};
pub use crate::entity::ObjectHandle;
pub use crate::error::{Result, SaveError};
pub use crate::manager::{BuildStatus, LoadReport, SaveManager};
pub use crate::save_enum;
pub use crate::scene::{GameObject, Scene};
pub use crate::serialization::{ComponentSerializer, SaveRegistry};
pub use crate::storage::{BinaryFile, DataDeserializer, DataSerializer, JsonFile, MemoryStore};
pub use crate::value::{Value, ValueMap};
