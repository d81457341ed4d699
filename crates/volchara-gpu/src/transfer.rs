//! Device-side copies and image layout transitions.
//!
//! [`TransferExecutor`] is the seam for upload strategies. The provided
//! [`BlockingTransfer`] records each operation into its own one-shot command
//! buffer and waits for the queue to drain, so the destination is readable
//! as soon as the call returns.

use crate::command::{execute_single_time_commands, CommandPool};
use crate::error::{GpuError, Result};
use ash::vk;
use std::sync::Arc;

/// Executes copy and layout-transition commands on the GPU.
pub trait TransferExecutor {
    /// Copy `size` bytes from the start of `src` to `dst_offset` in `dst`.
    ///
    /// # Safety
    /// Both buffers must be valid, not in use by pending GPU work, and
    /// large enough for the copy.
    unsafe fn copy_buffer(
        &self,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: u64,
        dst_offset: u64,
    ) -> Result<()>;

    /// Copy tightly packed texels from `src` into mip 0 of `dst`, which must
    /// be in `TRANSFER_DST_OPTIMAL`.
    ///
    /// # Safety
    /// Handles must be valid and `src` must hold the full extent.
    unsafe fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        extent: vk::Extent3D,
    ) -> Result<()>;

    /// Move `image` from `old` to `new` layout.
    ///
    /// # Safety
    /// The image must be valid and currently in `old`.
    unsafe fn transition_image_layout(
        &self,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> Result<()>;
}

/// Access and stage masks for a layout transition barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Barrier masks for the supported layout transitions.
///
/// Only the three transitions the engine performs are mapped; anything else
/// is an error.
pub fn layout_transition_masks(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> Result<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            })
        }
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            })
        }
        _ => Err(GpuError::UnsupportedTransition { old, new }),
    }
}

/// Synchronous transfer executor: one submission per operation, followed by
/// a queue wait.
pub struct BlockingTransfer {
    device: Arc<ash::Device>,
    pool: CommandPool,
    queue: vk::Queue,
}

impl BlockingTransfer {
    /// # Safety
    /// The device must be valid and `queue` must belong to `queue_family`.
    pub unsafe fn new(device: Arc<ash::Device>, queue_family: u32, queue: vk::Queue) -> Result<Self> {
        let pool =
            unsafe { CommandPool::new(&device, queue_family, vk::CommandPoolCreateFlags::TRANSIENT)? };
        Ok(Self {
            device,
            pool,
            queue,
        })
    }

    /// # Safety
    /// No transfer may be executing.
    pub unsafe fn destroy(&self) {
        unsafe { self.pool.destroy(&self.device) };
    }
}

impl TransferExecutor for BlockingTransfer {
    unsafe fn copy_buffer(
        &self,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: u64,
        dst_offset: u64,
    ) -> Result<()> {
        let region = vk::BufferCopy::default()
            .src_offset(0)
            .dst_offset(dst_offset)
            .size(size);
        unsafe {
            execute_single_time_commands(&self.device, &self.pool, self.queue, |cmd| {
                self.device.cmd_copy_buffer(cmd, src, dst, &[region]);
            })
        }
    }

    unsafe fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        extent: vk::Extent3D,
    ) -> Result<()> {
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_offset(vk::Offset3D::default())
            .image_extent(extent);
        unsafe {
            execute_single_time_commands(&self.device, &self.pool, self.queue, |cmd| {
                self.device.cmd_copy_buffer_to_image(
                    cmd,
                    src,
                    dst,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            })
        }
    }

    unsafe fn transition_image_layout(
        &self,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> Result<()> {
        let masks = layout_transition_masks(old, new)?;
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access);
        unsafe {
            execute_single_time_commands(&self.device, &self.pool, self.queue, |cmd| {
                self.device.cmd_pipeline_barrier(
                    cmd,
                    masks.src_stage,
                    masks.dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_upload_transitions_are_supported() {
        let to_dst = layout_transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_dst.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_dst.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let to_read = layout_transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_read.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_read.dst_access, vk::AccessFlags::SHADER_READ);
    }

    #[test]
    fn depth_transition_targets_fragment_tests() {
        let masks = layout_transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .unwrap();
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
    }

    #[test]
    fn other_transitions_are_rejected() {
        let result = layout_transition_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        assert!(matches!(
            result,
            Err(GpuError::UnsupportedTransition {
                old: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                new: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            })
        ));
    }
}
