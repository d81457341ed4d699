//! Vulkan abstraction layer for the Volchara engine.
//!
//! This crate provides:
//! - Vulkan instance, debug messenger and device management
//! - GPU capability detection and device selection
//! - Memory allocation via gpu-allocator and staged uploads
//! - Command buffer, synchronization and transfer helpers
//! - Surface, swapchain, render pass, descriptor and pipeline handling

pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod staging;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod transfer;

pub use capabilities::{DeviceFeatures, GpuCapabilities, GpuVendor};
pub use command::{submit_command_buffer, CommandPool};
pub use context::{GpuContext, GpuContextBuilder, QueueFamilies};
pub use descriptors::{
    write_sampled_image, write_sampler, write_storage_buffer, write_uniform_buffer,
    DescriptorPool, DescriptorSetLayoutBuilder,
};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use pipeline::{create_sampler, load_spirv, GraphicsPipeline, GraphicsPipelineConfig};
pub use render_pass::{create_render_pass, find_depth_format};
pub use staging::StagingBuffer;
pub use surface::{Surface, SurfaceSupport};
pub use swapchain::{plan_swapchain, AcquireOutcome, PresentOutcome, Swapchain, SwapchainPlan};
pub use sync::{FrameSlot, FrameSlots};
pub use transfer::{BlockingTransfer, TransferExecutor};
