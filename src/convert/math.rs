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

//! Vector, quaternion, color and rect converters. Each becomes a map with
//! one `Single` (or byte-valued `Int32`) entry per component.

use glam::{Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::{mismatch, ConvertContext, ValueConvert};
use crate::error::{Result, SaveError};
use crate::value::{Value, ValueMap};

/// Linear RGBA color
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// 8-bit RGBA color
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color32 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Axis-aligned rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

fn float_map(entries: &[(&str, f32)]) -> Value {
    let mut map = ValueMap::with_capacity(entries.len());
    for (key, v) in entries {
        map.insert(*key, Value::Float32(*v));
    }
    Value::Map(map)
}

fn float_field<T>(map: &ValueMap, key: &str) -> Result<f32> {
    let value = map.get(key).ok_or_else(|| SaveError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        found: "map without a component key",
    })?;
    value.to_f32().ok_or_else(|| mismatch::<T>(value))
}

fn byte_field<T>(map: &ValueMap, key: &str) -> Result<u8> {
    let value = map.get(key).ok_or_else(|| SaveError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        found: "map without a component key",
    })?;
    value.to_u8().ok_or_else(|| mismatch::<T>(value))
}

fn as_map<'v, T>(value: &'v Value) -> Result<&'v ValueMap> {
    value.as_map().ok_or_else(|| mismatch::<T>(value))
}

impl ValueConvert for Vec2 {
    fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
        Ok(float_map(&[("x", self.x), ("y", self.y)]))
    }

    fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
        let map = as_map::<Self>(value)?;
        Ok(Vec2::new(
            float_field::<Self>(map, "x")?,
            float_field::<Self>(map, "y")?,
        ))
    }
}

impl ValueConvert for Vec3 {
    fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
        Ok(float_map(&[("x", self.x), ("y", self.y), ("z", self.z)]))
    }

    fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
        let map = as_map::<Self>(value)?;
        Ok(Vec3::new(
            float_field::<Self>(map, "x")?,
            float_field::<Self>(map, "y")?,
            float_field::<Self>(map, "z")?,
        ))
    }
}

impl ValueConvert for Vec4 {
    fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
        Ok(float_map(&[
            ("x", self.x),
            ("y", self.y),
            ("z", self.z),
            ("w", self.w),
        ]))
    }

    fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
        let map = as_map::<Self>(value)?;
        Ok(Vec4::new(
            float_field::<Self>(map, "x")?,
            float_field::<Self>(map, "y")?,
            float_field::<Self>(map, "z")?,
            float_field::<Self>(map, "w")?,
        ))
    }
}

impl ValueConvert for Quat {
    fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
        Ok(float_map(&[
            ("x", self.x),
            ("y", self.y),
            ("z", self.z),
            ("w", self.w),
        ]))
    }

    /// Components are taken as stored, without renormalizing.
    fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
        let map = as_map::<Self>(value)?;
        Ok(Quat::from_xyzw(
            float_field::<Self>(map, "x")?,
            float_field::<Self>(map, "y")?,
            float_field::<Self>(map, "z")?,
            float_field::<Self>(map, "w")?,
        ))
    }
}

impl ValueConvert for Color {
    fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
        Ok(float_map(&[
            ("r", self.r),
            ("g", self.g),
            ("b", self.b),
            ("a", self.a),
        ]))
    }

    fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
        let map = as_map::<Self>(value)?;
        Ok(Color::new(
            float_field::<Self>(map, "r")?,
            float_field::<Self>(map, "g")?,
            float_field::<Self>(map, "b")?,
            float_field::<Self>(map, "a")?,
        ))
    }
}

impl ValueConvert for Color32 {
    fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
        let mut map = ValueMap::with_capacity(4);
        map.insert("r", i32::from(self.r));
        map.insert("g", i32::from(self.g));
        map.insert("b", i32::from(self.b));
        map.insert("a", i32::from(self.a));
        Ok(Value::Map(map))
    }

    fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
        let map = as_map::<Self>(value)?;
        Ok(Color32::new(
            byte_field::<Self>(map, "r")?,
            byte_field::<Self>(map, "g")?,
            byte_field::<Self>(map, "b")?,
            byte_field::<Self>(map, "a")?,
        ))
    }
}

impl ValueConvert for Rect {
    fn to_value(&self, _ctx: &ConvertContext<'_>) -> Result<Value> {
        Ok(float_map(&[
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
        ]))
    }

    fn from_value(value: &Value, _ctx: &ConvertContext<'_>) -> Result<Self> {
        let map = as_map::<Self>(value)?;
        Ok(Rect::new(
            float_field::<Self>(map, "x")?,
            float_field::<Self>(map, "y")?,
            float_field::<Self>(map, "width")?,
            float_field::<Self>(map, "height")?,
        ))
    }
}
