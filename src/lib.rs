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

//! Archetype Save - object-graph persistence for scene-graph game engines
//!
//! Snapshots tracked game objects into a generic value tree, writes it with
//! a compact binary codec or a JSON codec, and restores object graphs
//! (cross-object references included) from it.

pub mod assets;
pub mod builtin;
pub mod codec;
pub mod component;
pub mod config;
pub mod convert;
pub mod entity;
pub mod error;
pub mod hierarchy;
pub mod identity;
#[cfg(feature = "profiling")]
pub mod logging;
pub mod manager;
pub mod prelude;
pub mod reflection;
pub mod scene;
pub mod serialization;
pub mod spawn;
pub mod storage;
pub mod value;
pub mod worker;

pub use assets::*;
pub use component::*;
pub use config::*;
pub use entity::*;
pub use error::*;
pub use identity::*;
pub use manager::*;
pub use reflection::*;
pub use scene::*;
pub use serialization::*;
pub use value::*;
