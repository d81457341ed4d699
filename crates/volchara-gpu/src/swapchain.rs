//! Swapchain management.
//!
//! The swapchain, its image views, the depth image and the framebuffers are
//! one group: they are created together and rebuilt together whenever the
//! surface goes stale.

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::GpuImage;
use crate::render_pass::depth_aspect;
use crate::surface::SurfaceSupport;
use crate::transfer::TransferExecutor;
use ash::vk;
use gpu_allocator::MemoryLocation;

/// Parameters for a swapchain, derived from what the surface supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainPlan {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainPlan {
    /// A minimized window reports a zero extent; no swapchain can be built
    /// for it.
    pub fn is_zero_sized(&self) -> bool {
        self.extent.width == 0 || self.extent.height == 0
    }
}

/// Pick format, present mode, extent and image count for a surface.
pub fn plan_swapchain(
    support: &SurfaceSupport,
    desired: vk::Extent2D,
    vsync: bool,
) -> Result<SwapchainPlan> {
    let surface_format = select_surface_format(&support.formats)?;
    let present_mode = select_present_mode(&support.present_modes, vsync);
    let caps = &support.capabilities;

    Ok(SwapchainPlan {
        surface_format,
        present_mode,
        extent: calculate_extent(caps, desired),
        image_count: calculate_image_count(caps),
        pre_transform: caps.current_transform,
    })
}

/// Prefer 8-bit BGRA sRGB, otherwise take whatever comes first.
fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
        .ok_or_else(|| GpuError::SwapchainCreation("Surface reports no formats".to_string()))
}

/// FIFO is always available and is the only vsync mode.
fn select_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync && available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

fn calculate_extent(caps: &vk::SurfaceCapabilitiesKHR, desired: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: desired
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: desired
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

fn calculate_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = caps.min_image_count + 1;
    // max_image_count == 0 means no upper bound
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

/// Result of acquiring the next swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired. A suboptimal image is still usable this frame.
    Acquired { index: u32, suboptimal: bool },
    /// Nothing was acquired; the swapchain must be rebuilt.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presented (or dropped) on a swapchain that no longer matches the surface.
    Stale,
}

/// Swapchain wrapper owning everything sized to the drawable surface.
pub struct Swapchain {
    loader: ash::khr::swapchain::Device,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    depth: GpuImage,
    framebuffers: Vec<vk::Framebuffer>,
    plan: SwapchainPlan,
}

impl Swapchain {
    /// Create the swapchain group for `plan`.
    ///
    /// # Safety
    /// `render_pass` must be compatible with the plan's colour format and
    /// `depth_format`.
    pub unsafe fn new(
        ctx: &GpuContext,
        plan: SwapchainPlan,
        depth_format: vk::Format,
        render_pass: vk::RenderPass,
        transfer: &dyn TransferExecutor,
    ) -> Result<Self> {
        let loader = ash::khr::swapchain::Device::new(ctx.instance(), ctx.device());
        unsafe {
            Self::create(
                ctx,
                loader,
                plan,
                vk::SwapchainKHR::null(),
                depth_format,
                render_pass,
                transfer,
            )
        }
    }

    unsafe fn create(
        ctx: &GpuContext,
        loader: ash::khr::swapchain::Device,
        plan: SwapchainPlan,
        old: vk::SwapchainKHR,
        depth_format: vk::Format,
        render_pass: vk::RenderPass,
        transfer: &dyn TransferExecutor,
    ) -> Result<Self> {
        let device = ctx.device();
        let families = ctx.queue_families();
        let family_indices = [families.graphics, families.present];

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(ctx.surface().surface)
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(plan.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(plan.present_mode)
            .clipped(true)
            .old_swapchain(old);
        create_info = if families.graphics == families.present {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        };

        let handle = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;
        let images = unsafe { loader.get_swapchain_images(handle)? };

        let views = images
            .iter()
            .map(|&image| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(plan.surface_format.format)
                    .components(vk::ComponentMapping::default())
                    .subresource_range(
                        vk::ImageSubresourceRange::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .base_mip_level(0)
                            .level_count(1)
                            .base_array_layer(0)
                            .layer_count(1),
                    );
                unsafe { device.create_image_view(&view_info, None) }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let aspect = depth_aspect(depth_format);
        let depth_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(depth_format)
            .extent(vk::Extent3D {
                width: plan.extent.width,
                height: plan.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let depth =
            ctx.allocator()
                .lock()
                .create_image(&depth_info, aspect, MemoryLocation::GpuOnly, "depth")?;
        unsafe {
            transfer.transition_image_layout(
                depth.image,
                aspect,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            )?;
        }

        let framebuffers = views
            .iter()
            .map(|&view| {
                let attachments = [view, depth.view];
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass)
                    .attachments(&attachments)
                    .width(plan.extent.width)
                    .height(plan.extent.height)
                    .layers(1);
                unsafe { device.create_framebuffer(&framebuffer_info, None) }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::info!(
            "Swapchain ready: {}x{}, {} images, {:?}, {:?}",
            plan.extent.width,
            plan.extent.height,
            images.len(),
            plan.surface_format.format,
            plan.present_mode
        );

        Ok(Self {
            loader,
            handle,
            images,
            views,
            depth,
            framebuffers,
            plan,
        })
    }

    /// Rebuild the whole group for the surface's current state.
    ///
    /// Waits for the device to go idle first. The old swapchain is handed to
    /// the driver as `old_swapchain` and torn down once the new group exists.
    /// Returns `false` without touching anything when the surface has a zero
    /// extent.
    ///
    /// # Safety
    /// `render_pass` must be the pass the swapchain was created with.
    pub unsafe fn recreate(
        &mut self,
        ctx: &GpuContext,
        desired: vk::Extent2D,
        vsync: bool,
        render_pass: vk::RenderPass,
        transfer: &dyn TransferExecutor,
    ) -> Result<bool> {
        ctx.wait_idle()?;

        let plan = plan_swapchain(&ctx.surface_support()?, desired, vsync)?;
        if plan.is_zero_sized() {
            tracing::debug!("Surface has zero extent, deferring swapchain recreation");
            return Ok(false);
        }
        if plan.surface_format != self.plan.surface_format {
            return Err(GpuError::SwapchainCreation(format!(
                "Surface format changed from {:?} to {:?}",
                self.plan.surface_format.format, plan.surface_format.format
            )));
        }

        let new = unsafe {
            Self::create(
                ctx,
                self.loader.clone(),
                plan,
                self.handle,
                self.depth.format,
                render_pass,
                transfer,
            )?
        };
        let old = std::mem::replace(self, new);
        unsafe { old.destroy(ctx)? };
        Ok(true)
    }

    /// Acquire the next image, signalling `semaphore` when it is ready.
    ///
    /// # Safety
    /// The semaphore must be unsignaled with no pending signal operation.
    pub unsafe fn acquire(&self, semaphore: vk::Semaphore) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
        };
        match result {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Acquired { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Queue image `index` for presentation once `wait` is signaled.
    ///
    /// # Safety
    /// `index` must have been acquired from this swapchain.
    pub unsafe fn present(
        &self,
        queue: vk::Queue,
        index: u32,
        wait: vk::Semaphore,
    ) -> Result<PresentOutcome> {
        let wait_semaphores = [wait];
        let swapchains = [self.handle];
        let indices = [index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.plan.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.plan.surface_format.format
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn framebuffer(&self, index: u32) -> Result<vk::Framebuffer> {
        self.framebuffers
            .get(index as usize)
            .copied()
            .ok_or_else(|| GpuError::InvalidState(format!("No framebuffer for image {index}")))
    }

    /// Destroy the group.
    ///
    /// # Safety
    /// No submitted work may still reference it.
    pub unsafe fn destroy(self, ctx: &GpuContext) -> Result<()> {
        let device = ctx.device();
        unsafe {
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            for &view in &self.views {
                device.destroy_image_view(view, None);
            }
        }
        ctx.allocator().lock().free_image(self.depth)?;
        unsafe { self.loader.destroy_swapchain(self.handle, None) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support(current: vk::Extent2D, min_images: u32, max_images: u32) -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: min_images,
                max_image_count: max_images,
                current_extent: current,
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    const WINDOW: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    #[test]
    fn prefers_srgb_and_mailbox() {
        let plan = plan_swapchain(&support(WINDOW, 2, 3), WINDOW, false).unwrap();
        assert_eq!(plan.surface_format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(plan.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(plan.extent, WINDOW);
    }

    #[test]
    fn vsync_forces_fifo() {
        let plan = plan_swapchain(&support(WINDOW, 2, 3), WINDOW, true).unwrap();
        assert_eq!(plan.present_mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn falls_back_to_first_format_and_fifo() {
        let mut s = support(WINDOW, 2, 3);
        s.formats.truncate(1);
        s.present_modes = vec![vk::PresentModeKHR::FIFO];
        let plan = plan_swapchain(&s, WINDOW, false).unwrap();
        assert_eq!(plan.surface_format.format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(plan.present_mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn no_formats_is_an_error() {
        let mut s = support(WINDOW, 2, 3);
        s.formats.clear();
        assert!(matches!(
            plan_swapchain(&s, WINDOW, false),
            Err(GpuError::SwapchainCreation(_))
        ));
    }

    #[test]
    fn sentinel_extent_clamps_desired_size() {
        let sentinel = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        let huge = vk::Extent2D {
            width: 10_000,
            height: 300,
        };
        let plan = plan_swapchain(&support(sentinel, 2, 3), huge, false).unwrap();
        assert_eq!(
            plan.extent,
            vk::Extent2D {
                width: 4096,
                height: 300
            }
        );
    }

    #[test]
    fn image_count_stays_in_bounds() {
        let capped = plan_swapchain(&support(WINDOW, 3, 3), WINDOW, false).unwrap();
        assert_eq!(capped.image_count, 3);

        let unbounded = plan_swapchain(&support(WINDOW, 2, 0), WINDOW, false).unwrap();
        assert_eq!(unbounded.image_count, 3);

        for (min, max) in [(1, 2), (2, 8), (4, 4), (2, 0)] {
            let plan = plan_swapchain(&support(WINDOW, min, max), WINDOW, false).unwrap();
            assert!(plan.image_count >= min);
            assert!(max == 0 || plan.image_count <= max);
        }
    }

    #[test]
    fn planning_is_idempotent() {
        let s = support(WINDOW, 2, 3);
        let first = plan_swapchain(&s, WINDOW, false).unwrap();
        let second = plan_swapchain(&s, first.extent, false).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_extent_detected() {
        let zero = vk::Extent2D {
            width: 0,
            height: 0,
        };
        let plan = plan_swapchain(&support(zero, 2, 3), zero, false).unwrap();
        assert!(plan.is_zero_sized());
        assert!(!plan_swapchain(&support(WINDOW, 2, 3), WINDOW, false)
            .unwrap()
            .is_zero_sized());
    }
}
