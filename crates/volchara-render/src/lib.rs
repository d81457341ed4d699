//! Rasterized scene rendering for the Volchara engine.
//!
//! This crate provides:
//! - Scene objects with per-frame callbacks, stored in a generational arena
//! - Geometry packing and draw-list construction
//! - Camera and fly-camera controller
//! - GPU resource pool and bindless texture array
//! - The frame scheduler and its Vulkan backend
//! - [`Engine`], the facade applications drive

pub mod bindings;
pub mod camera;
pub mod config;
pub mod draw;
pub mod engine;
pub mod error;
pub mod object;
pub mod recorder;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod scheduler;
pub mod textures;

pub use camera::{Camera, FlyCamera};
pub use config::{EngineConfig, FRAGMENT_SHADER, VERTEX_SHADER};
pub use draw::{build_draw_list, pack_geometry, DrawCall, PackedGeometry};
pub use engine::Engine;
pub use error::{RenderError, Result};
pub use object::{FrameCallback, FrameInput, Object, ObjectId, ObjectKind};
pub use renderer::Renderer;
pub use resources::{ResourceLimits, ResourcePool};
pub use scene::{FrameUpdate, Scene, SceneChanges, SceneCommands};
pub use scheduler::{FrameBackend, FrameOutcome, FramePacer, FrameScheduler};
pub use textures::TextureArray;
