//! Vulkan implementation of the frame backend.

use std::mem::{offset_of, size_of};

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{error, info, warn};
use volchara_core::constants::FRAMES_IN_FLIGHT;
use volchara_core::{PushConstants, Vertex};
use volchara_gpu::{
    create_render_pass, find_depth_format, load_spirv, plan_swapchain, submit_command_buffer,
    AcquireOutcome, BlockingTransfer, FrameSlots, GpuContext, GpuContextBuilder, GpuError,
    GraphicsPipeline, GraphicsPipelineConfig, PresentOutcome, Swapchain,
};

use crate::bindings::SceneBindings;
use crate::config::{EngineConfig, FRAGMENT_SHADER, VERTEX_SHADER};
use crate::draw::{build_draw_list, pack_geometry};
use crate::error::Result;
use crate::recorder::{record_frame, FrameTargets};
use crate::resources::ResourcePool;
use crate::scene::{Scene, SceneChanges};
use crate::scheduler::FrameBackend;

/// Vertex buffer layout: one interleaved binding of [`Vertex`].
#[allow(clippy::cast_possible_truncation)]
pub fn vertex_input() -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    let binding = vk::VertexInputBindingDescription {
        binding: 0,
        stride: size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    };
    let attribute = |location, format, offset: usize| vk::VertexInputAttributeDescription {
        location,
        binding: 0,
        format,
        offset: offset as u32,
    };
    let attributes = vec![
        attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
        attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
        attribute(2, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, color)),
        attribute(3, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, tex_coord)),
    ];
    (vec![binding], attributes)
}

/// Push constant range shared by both shader stages.
#[allow(clippy::cast_possible_truncation)]
pub fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        offset: 0,
        size: size_of::<PushConstants>() as u32,
    }
}

/// Owns every GPU object the engine draws with.
///
/// Field order matters only for the context, which must outlive the rest;
/// everything else is released explicitly in [`Drop`].
pub struct Renderer {
    frames: FrameSlots,
    transfer: BlockingTransfer,
    swapchain: Option<Swapchain>,
    render_pass: vk::RenderPass,
    pipeline: GraphicsPipeline,
    bindings: SceneBindings,
    resources: Option<ResourcePool>,
    /// Slot most recently waited on by the scheduler.
    active_slot: usize,
    desired_extent: vk::Extent2D,
    vsync: bool,
    clear_color: [f32; 4],
    ctx: GpuContext,
}

impl Renderer {
    /// Initialize Vulkan for `window` at `width`x`height` pixels.
    pub fn new<W>(window: &W, width: u32, height: u32, config: &EngineConfig) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let ctx = GpuContextBuilder::new()
            .app_name(config.app_name.clone())
            .validation(config.validation)
            .build(window)?;
        info!("GPU: {}", ctx.capabilities().summary());

        let device = ctx.device();
        let graphics_family = ctx.queue_families().graphics;
        let desired_extent = vk::Extent2D { width, height };

        // SAFETY: the context is fully initialized and outlives these objects
        let transfer =
            unsafe { BlockingTransfer::new(ctx.device_arc(), graphics_family, ctx.graphics_queue())? };
        let frames = unsafe { FrameSlots::new(device, graphics_family, FRAMES_IN_FLIGHT)? };

        let plan = plan_swapchain(&ctx.surface_support()?, desired_extent, config.vsync)?;
        let depth_format = unsafe { find_depth_format(ctx.instance(), ctx.physical_device())? };
        let render_pass =
            unsafe { create_render_pass(device, plan.surface_format.format, depth_format)? };
        let swapchain =
            unsafe { Swapchain::new(&ctx, plan, depth_format, render_pass, &transfer)? };

        let bindings = unsafe {
            SceneBindings::new(
                device,
                config.limits.max_textures,
                ctx.capabilities().max_sampler_anisotropy,
            )?
        };

        let (vertex_bindings, vertex_attributes) = vertex_input();
        let pipeline_config = GraphicsPipelineConfig {
            vertex_shader: load_spirv(&config.shader_dir.join(VERTEX_SHADER))?,
            fragment_shader: load_spirv(&config.shader_dir.join(FRAGMENT_SHADER))?,
            vertex_bindings,
            vertex_attributes,
            ..Default::default()
        };
        let pipeline = unsafe {
            GraphicsPipeline::new(
                device,
                &pipeline_config,
                render_pass,
                &bindings.layouts(),
                &[push_constant_range()],
            )?
        };

        let resources = ResourcePool::new(&mut ctx.allocator().lock(), config.limits)?;
        unsafe { resources.bind(device, &bindings) };

        Ok(Self {
            frames,
            transfer,
            swapchain: Some(swapchain),
            render_pass,
            pipeline,
            bindings,
            resources: Some(resources),
            active_slot: 0,
            desired_extent,
            vsync: config.vsync,
            clear_color: config.clear_color,
            ctx,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    fn swapchain(&self) -> Result<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Swapchain released".to_string()).into())
    }

    fn resources(&self) -> Result<&ResourcePool> {
        self.resources
            .as_ref()
            .ok_or_else(|| GpuError::InvalidState("Resources released".to_string()).into())
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain
            .as_ref()
            .map_or(self.desired_extent, Swapchain::extent)
    }

    /// Width over height of the swapchain.
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.extent();
        extent.width as f32 / extent.height.max(1) as f32
    }

    /// Size to use the next time the swapchain is rebuilt.
    pub fn set_desired_extent(&mut self, width: u32, height: u32) {
        self.desired_extent = vk::Extent2D { width, height };
    }

    pub fn texture_count(&self) -> u32 {
        self.resources.as_ref().map_or(0, ResourcePool::texture_count)
    }

    /// Upload RGBA8 texels and return the texture's array index.
    pub fn load_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<u32> {
        let Some(resources) = self.resources.as_mut() else {
            return Err(GpuError::InvalidState("Resources released".to_string()).into());
        };
        // SAFETY: the new image is unused by the GPU and no allocator lock is held
        unsafe {
            resources.load_texture(
                self.ctx.device(),
                self.ctx.allocator(),
                &self.transfer,
                &self.bindings,
                width,
                height,
                rgba,
            )
        }
    }

    pub fn wait_idle(&self) -> Result<()> {
        Ok(self.ctx.wait_idle()?)
    }
}

impl FrameBackend for Renderer {
    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        unsafe { self.frames.get(slot).wait(self.ctx.device())? };
        self.active_slot = slot;
        Ok(())
    }

    fn sync_scene(&mut self, scene: &Scene, changes: SceneChanges) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        // The active slot is already retired; the others may still read the
        // buffers being overwritten.
        unsafe { self.frames.wait_others(self.ctx.device(), self.active_slot)? };

        if changes.contains(SceneChanges::GEOMETRY) {
            let geometry = pack_geometry(scene);
            let resources = self.resources.as_mut().ok_or_else(|| {
                GpuError::InvalidState("Resources released".to_string())
            })?;
            unsafe { resources.upload_geometry(&self.transfer, &geometry)? };
        }

        if changes.contains(SceneChanges::LIGHTING) {
            let (lighting, dropped) = scene.lighting();
            if dropped > 0 {
                warn!("{dropped} directional lights exceed the lighting buffer and are ignored");
            }
            unsafe {
                self.resources()?
                    .write_storage(&self.transfer, bytemuck::bytes_of(&lighting))?;
            }
        }
        Ok(())
    }

    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let semaphore = self.frames.get(slot).image_available;
        Ok(unsafe { self.swapchain()?.acquire(semaphore)? })
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        unsafe { self.frames.get(slot).reset(self.ctx.device())? };
        Ok(())
    }

    fn record(&mut self, slot: usize, image_index: u32, scene: &Scene) -> Result<()> {
        let resources = self.resources()?;
        let uploaded = resources.index_count();
        let draws: Vec<_> = build_draw_list(scene, resources.texture_count())?
            .into_iter()
            .filter(|draw| draw.first_index + draw.index_count <= uploaded)
            .collect();

        let swapchain = self.swapchain()?;
        let descriptor_sets = self.bindings.sets(slot);
        let targets = FrameTargets {
            render_pass: self.render_pass,
            framebuffer: swapchain.framebuffer(image_index)?,
            extent: swapchain.extent(),
            pipeline: self.pipeline.pipeline,
            pipeline_layout: self.pipeline.layout,
            vertex_buffer: resources.vertex_buffer(),
            index_buffer: resources.index_buffer(),
            descriptor_sets: &descriptor_sets,
            clear_color: self.clear_color,
        };

        let cmd = self.frames.get(slot).command_buffer;
        unsafe { record_frame(self.ctx.device(), cmd, &targets, &draws) }
    }

    fn update_uniforms(&mut self, slot: usize, scene: &Scene) -> Result<()> {
        let uniforms = scene.camera.uniforms(self.aspect_ratio());
        self.resources()?.write_uniforms(slot, &uniforms)
    }

    fn submit(&mut self, slot: usize) -> Result<()> {
        let frame = self.frames.get(slot);
        unsafe {
            submit_command_buffer(
                self.ctx.device(),
                self.ctx.graphics_queue(),
                frame.command_buffer,
                frame.image_available,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                frame.render_finished,
                frame.in_flight,
            )?;
        }
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        let wait = self.frames.get(slot).render_finished;
        Ok(unsafe {
            self.swapchain()?
                .present(self.ctx.present_queue(), image_index, wait)?
        })
    }

    fn recreate_swapchain(&mut self) -> Result<()> {
        let Some(swapchain) = self.swapchain.as_mut() else {
            return Err(GpuError::InvalidState("Swapchain released".to_string()).into());
        };
        let rebuilt = unsafe {
            swapchain.recreate(
                &self.ctx,
                self.desired_extent,
                self.vsync,
                self.render_pass,
                &self.transfer,
            )?
        };
        if !rebuilt {
            info!("Surface is zero-sized, keeping the current swapchain");
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.wait_idle() {
            error!("Failed to wait for device idle during shutdown: {e}");
        }

        let device = self.ctx.device();
        if let Some(resources) = self.resources.take() {
            if let Err(e) = resources.destroy(&mut self.ctx.allocator().lock()) {
                error!("Failed to free scene resources: {e}");
            }
        }
        // SAFETY: the device is idle and nothing below is referenced anymore
        unsafe {
            self.pipeline.destroy(device);
            self.bindings.destroy(device);
        }
        if let Some(swapchain) = self.swapchain.take() {
            if let Err(e) = unsafe { swapchain.destroy(&self.ctx) } {
                error!("Failed to destroy swapchain: {e}");
            }
        }
        unsafe {
            device.destroy_render_pass(self.render_pass, None);
            self.frames.destroy(device);
            self.transfer.destroy();
        }
        info!("Renderer shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_interface() {
        let (bindings, attributes) = vertex_input();
        assert_eq!(bindings[0].stride, 44);
        let offsets: Vec<u32> = attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 36]);
        assert_eq!(attributes[3].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn push_constants_fit_the_guaranteed_minimum() {
        let range = push_constant_range();
        assert_eq!(range.size, 112);
        assert!(range.size <= 128);
    }
}
