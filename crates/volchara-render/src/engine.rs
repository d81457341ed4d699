//! The engine facade used by applications.

use std::path::Path;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use volchara_input::InputState;

use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::error::{RenderError, Result};
use crate::object::{Object, ObjectId};
use crate::renderer::Renderer;
use crate::scene::Scene;
use crate::scheduler::{FrameOutcome, FrameScheduler};

/// Scene, frame scheduler and renderer bundled together.
pub struct Engine {
    scene: Scene,
    scheduler: FrameScheduler,
    renderer: Renderer,
}

impl Engine {
    /// Initialize the GPU for `window` and create an empty scene.
    ///
    /// Fails if no device can run the engine or the shaders are missing.
    pub fn new<W>(window: &W, width: u32, height: u32, config: EngineConfig) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let renderer = Renderer::new(window, width, height, &config)?;
        let mut scene = Scene::new();
        scene.set_fly_camera(config.fly_camera);

        Ok(Self {
            scene,
            scheduler: FrameScheduler::new(config.target_fps),
            renderer,
        })
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.scene.camera
    }

    pub fn add_object(&mut self, object: Object) -> ObjectId {
        self.scene.add(object)
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Result<Object> {
        self.scene.remove(id).ok_or(RenderError::UnknownObject(id))
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.scene.get_mut(id)
    }

    pub fn set_ambient_light(&mut self, color: glam::Vec3, brightness: f32) {
        self.scene.set_ambient_light(color, brightness);
    }

    /// Decode an image file and upload it as a texture.
    pub fn load_texture(&mut self, path: impl AsRef<Path>) -> Result<u32> {
        let path = path.as_ref();
        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        let index = self.renderer.load_texture(width, height, rgba.as_raw())?;
        tracing::info!("Texture {} loaded from {}", index, path.display());
        Ok(index)
    }

    /// Upload tightly packed RGBA8 texels as a texture.
    pub fn load_texture_rgba(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<u32> {
        self.renderer.load_texture(width, height, rgba)
    }

    pub fn texture_count(&self) -> u32 {
        self.renderer.texture_count()
    }

    /// Run one tick of the frame loop.
    ///
    /// A failed upload (for example geometry over capacity) returns the
    /// error and leaves the pending changes in the scene, so the next call
    /// retries them; it keeps failing until the scene fits again.
    pub fn frame(&mut self, input: &InputState) -> Result<FrameOutcome> {
        self.scheduler
            .tick(&mut self.renderer, &mut self.scene, input)
    }

    /// The drawable surface changed size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.set_desired_extent(width, height);
        self.scheduler.request_resize();
    }

    pub fn frame_count(&self) -> u64 {
        self.scheduler.frame_count()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.renderer.wait_idle()
    }
}
