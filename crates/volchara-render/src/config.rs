//! Engine configuration.

use std::path::PathBuf;

use volchara_core::constants::DEFAULT_TARGET_FPS;

use crate::camera::FlyCamera;
use crate::resources::ResourceLimits;

/// Compiled vertex shader looked up in [`EngineConfig::shader_dir`].
pub const VERTEX_SHADER: &str = "base.vert.spv";
/// Compiled fragment shader looked up in [`EngineConfig::shader_dir`].
pub const FRAGMENT_SHADER: &str = "base.frag.spv";

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Application name reported to the Vulkan driver.
    pub app_name: String,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Force FIFO presentation.
    pub vsync: bool,
    /// Frame-rate cap (None for unlimited).
    pub target_fps: Option<u32>,
    /// Capacities of the scene buffers and texture array.
    pub limits: ResourceLimits,
    /// Directory holding [`VERTEX_SHADER`] and [`FRAGMENT_SHADER`].
    pub shader_dir: PathBuf,
    pub clear_color: [f32; 4],
    /// Camera controller driven from keyboard and mouse.
    pub fly_camera: Option<FlyCamera>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "Volchara".to_string(),
            validation: cfg!(debug_assertions),
            vsync: false,
            target_fps: Some(DEFAULT_TARGET_FPS),
            limits: ResourceLimits::default(),
            shader_dir: PathBuf::from("shaders"),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            fly_camera: None,
        }
    }
}

impl EngineConfig {
    /// Create a new config with the given application name.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Enable or disable vsync.
    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Set the target FPS. `None` disables pacing.
    #[must_use]
    pub fn with_target_fps(mut self, fps: Option<u32>) -> Self {
        self.target_fps = fps;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    #[must_use]
    pub fn with_fly_camera(mut self, controller: FlyCamera) -> Self {
        self.fly_camera = Some(controller);
        self
    }
}
