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

//! Camera and light components, saved through field tables.

use crate::component::Component;
use crate::convert::Color;
use crate::error::Result;
use crate::save_enum;
use crate::serialization::SaveRegistry;

/// Camera component
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub enabled: bool,
    pub orthographic: bool,
    pub orthographic_size: f32,
    pub field_of_view: f32,
    pub near_clip_plane: f32,
    pub far_clip_plane: f32,
    pub depth: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            enabled: true,
            orthographic: false,
            orthographic_size: 5.0,
            field_of_view: 60.0,
            near_clip_plane: 0.3,
            far_clip_plane: 1000.0,
            depth: 0.0,
        }
    }
}

impl Component for Camera {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LightType {
    Spot,
    #[default]
    Directional,
    Point,
    Area,
}
save_enum!(LightType { Spot, Directional, Point, Area });

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LightRenderMode {
    #[default]
    Auto,
    ForcePixel,
    ForceVertex,
}
save_enum!(LightRenderMode { Auto, ForcePixel, ForceVertex });

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LightShadows {
    #[default]
    None,
    Hard,
    Soft,
}
save_enum!(LightShadows { None, Hard, Soft });

/// Light component
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub light_type: LightType,
    pub render_mode: LightRenderMode,
    pub intensity: f32,
    pub range: f32,
    pub color: Color,
    pub spot_angle: f32,
    pub shadows: LightShadows,
    pub shadow_strength: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_type: LightType::default(),
            render_mode: LightRenderMode::default(),
            intensity: 1.0,
            range: 10.0,
            color: Color::WHITE,
            spot_angle: 30.0,
            shadows: LightShadows::default(),
            shadow_strength: 1.0,
        }
    }
}

impl Component for Light {}

pub(crate) fn register(registry: &mut SaveRegistry) -> Result<()> {
    registry.register_fields::<Camera, _>(|f| {
        f.field("enabled", |c: &Camera| &c.enabled, |c: &mut Camera| &mut c.enabled)
            .field("orthographic", |c: &Camera| &c.orthographic, |c: &mut Camera| &mut c.orthographic)
            .field(
                "orthographicSize",
                |c: &Camera| &c.orthographic_size,
                |c: &mut Camera| &mut c.orthographic_size,
            )
            .field("fieldOfView", |c: &Camera| &c.field_of_view, |c: &mut Camera| &mut c.field_of_view)
            .field(
                "nearClipPlane",
                |c: &Camera| &c.near_clip_plane,
                |c: &mut Camera| &mut c.near_clip_plane,
            )
            .field("farClipPlane", |c: &Camera| &c.far_clip_plane, |c: &mut Camera| &mut c.far_clip_plane)
            .field("depth", |c: &Camera| &c.depth, |c: &mut Camera| &mut c.depth)
    })?;

    let converters = registry.converters_mut();
    converters.register_enum::<LightType>();
    converters.register_enum::<LightRenderMode>();
    converters.register_enum::<LightShadows>();

    registry.register_fields::<Light, _>(|f| {
        f.field("type", |l: &Light| &l.light_type, |l: &mut Light| &mut l.light_type)
            .field("renderMode", |l: &Light| &l.render_mode, |l: &mut Light| &mut l.render_mode)
            .field("intensity", |l: &Light| &l.intensity, |l: &mut Light| &mut l.intensity)
            .field("range", |l: &Light| &l.range, |l: &mut Light| &mut l.range)
            .field("color", |l: &Light| &l.color, |l: &mut Light| &mut l.color)
            .field("spotAngle", |l: &Light| &l.spot_angle, |l: &mut Light| &mut l.spot_angle)
            .field("shadows", |l: &Light| &l.shadows, |l: &mut Light| &mut l.shadows)
            .field(
                "shadowStrength",
                |l: &Light| &l.shadow_strength,
                |l: &mut Light| &mut l.shadow_strength,
            )
    })
}
