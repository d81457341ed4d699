//! Core types and math for the Volchara engine.
//!
//! This crate provides the GPU-agnostic building blocks used throughout the engine:
//! - Vertex format and mesh deduplication
//! - Transforms with local/world movement helpers
//! - Bit-exact layouts shared with the shaders (push constants, uniforms, lighting)
//! - Simple primitive generators
//! - Common error types

pub mod error;
pub mod gpu_types;
pub mod math;
pub mod primitives;
pub mod vertex;

pub use error::{Error, Result};
pub use gpu_types::{CameraUniforms, DirectionalLightData, LightingData, PushConstants};
pub use math::{Space, Transform};
pub use vertex::{MeshData, Vertex};

/// Engine-wide constants
pub mod constants {
    /// Number of frames the CPU may record ahead of the GPU
    pub const FRAMES_IN_FLIGHT: usize = 2;
    /// Default capacity of each fixed-size GPU buffer (8 MiB)
    pub const DEFAULT_BUFFER_CAPACITY: u64 = 8 * 1024 * 1024;
    /// Size of the bindless texture array
    pub const MAX_TEXTURES: u32 = 64;
    /// Directional lights stored in the lighting buffer
    pub const MAX_DIRECTIONAL_LIGHTS: usize = 16;
    /// Default frame-rate cap
    pub const DEFAULT_TARGET_FPS: u32 = 60;
    /// Texture index pushed for objects without a texture
    pub const UNTEXTURED: u32 = u32::MAX;
}
