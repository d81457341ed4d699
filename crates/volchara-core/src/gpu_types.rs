//! Data layouts shared with the shaders.
//!
//! Every struct here is `#[repr(C)]` and padded to match GLSL std430/std140
//! rules, so it can be copied to the GPU as raw bytes.

use crate::constants::{MAX_DIRECTIONAL_LIGHTS, UNTEXTURED};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Per-draw push constants.
///
/// Layout (112 bytes): model @0, texture index @64, color @80, brightness @96.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PushConstants {
    pub model: [[f32; 4]; 4],
    /// Index into the texture array, or [`UNTEXTURED`].
    pub texture_index: u32,
    pub _pad0: [u32; 3],
    pub color: [f32; 4],
    pub brightness: f32,
    pub _pad1: [f32; 3],
}

impl PushConstants {
    pub fn new(model: Mat4, texture_index: Option<u32>, color: Vec4, brightness: f32) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            texture_index: texture_index.unwrap_or(UNTEXTURED),
            _pad0: [0; 3],
            color: color.to_array(),
            brightness,
            _pad1: [0.0; 3],
        }
    }

    /// Texture index, `None` for untextured draws.
    pub const fn texture(&self) -> Option<u32> {
        if self.texture_index == UNTEXTURED {
            None
        } else {
            Some(self.texture_index)
        }
    }
}

/// Per-frame camera matrices (uniform buffer, set 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CameraUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl CameraUniforms {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
        }
    }
}

/// One directional light as stored in the lighting buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DirectionalLightData {
    /// xyz: direction the light travels, w unused.
    pub direction: [f32; 4],
    /// rgb: color, a: brightness.
    pub color: [f32; 4],
}

impl DirectionalLightData {
    pub fn new(direction: Vec3, color: Vec3, brightness: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero().extend(0.0).to_array(),
            color: color.extend(brightness).to_array(),
        }
    }
}

/// Scene lighting (storage buffer, set 2).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightingData {
    /// rgb: ambient color, a: ambient brightness.
    pub ambient: [f32; 4],
    pub light_count: u32,
    pub _pad: [u32; 3],
    pub lights: [DirectionalLightData; MAX_DIRECTIONAL_LIGHTS],
}

impl Default for LightingData {
    fn default() -> Self {
        Self {
            ambient: [1.0, 1.0, 1.0, 1.0],
            light_count: 0,
            _pad: [0; 3],
            lights: [DirectionalLightData::default(); MAX_DIRECTIONAL_LIGHTS],
        }
    }
}

impl LightingData {
    /// Build from an ambient term and a list of lights.
    ///
    /// Lights beyond [`MAX_DIRECTIONAL_LIGHTS`] are dropped; the second
    /// value reports how many were.
    pub fn new(
        ambient_color: Vec3,
        ambient_brightness: f32,
        lights: impl IntoIterator<Item = DirectionalLightData>,
    ) -> (Self, usize) {
        let mut data = Self {
            ambient: ambient_color.extend(ambient_brightness).to_array(),
            ..Self::default()
        };
        let mut dropped = 0;
        for light in lights {
            let slot = data.light_count as usize;
            if slot < MAX_DIRECTIONAL_LIGHTS {
                data.lights[slot] = light;
                data.light_count += 1;
            } else {
                dropped += 1;
            }
        }
        (data, dropped)
    }
}
