//! Per-frame command buffer recording.

use ash::vk;
use volchara_core::PushConstants;
use volchara_gpu::GpuError;

use crate::draw::DrawCall;
use crate::error::Result;

/// Everything a frame's command buffer references.
pub struct FrameTargets<'a> {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub descriptor_sets: &'a [vk::DescriptorSet],
    pub clear_color: [f32; 4],
}

/// Viewport covering `extent` with +Y up.
///
/// The origin sits on the bottom edge and the height is negative, which
/// flips Vulkan's downward Y axis.
#[allow(clippy::cast_precision_loss)]
pub fn flipped_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: extent.height as f32,
        width: extent.width as f32,
        height: -(extent.height as f32),
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Clear values for the colour and depth attachments.
///
/// Depth clears to 0.0, the far plane under reversed-Z.
pub fn clear_values(color: [f32; 4]) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 0.0,
                stencil: 0,
            },
        },
    ]
}

/// Record one frame into `cmd`.
///
/// # Safety
/// `cmd` must be resettable and not pending, and every handle in `targets`
/// must be valid.
pub unsafe fn record_frame(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    targets: &FrameTargets<'_>,
    draws: &[DrawCall],
) -> Result<()> {
    unsafe {
        device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty()).map_err(GpuError::from)?;
        device.begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::default()).map_err(GpuError::from)?;
    }

    let clear_values = clear_values(targets.clear_color);
    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: targets.extent,
    };
    let render_pass_info = vk::RenderPassBeginInfo::default()
        .render_pass(targets.render_pass)
        .framebuffer(targets.framebuffer)
        .render_area(render_area)
        .clear_values(&clear_values);

    unsafe {
        device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
        device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, targets.pipeline);

        if !draws.is_empty() {
            device.cmd_bind_vertex_buffers(cmd, 0, &[targets.vertex_buffer], &[0]);
            device.cmd_bind_index_buffer(cmd, targets.index_buffer, 0, vk::IndexType::UINT32);
        }

        device.cmd_set_viewport(cmd, 0, &[flipped_viewport(targets.extent)]);
        device.cmd_set_scissor(cmd, 0, &[render_area]);

        device.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            targets.pipeline_layout,
            0,
            targets.descriptor_sets,
            &[],
        );

        for draw in draws {
            device.cmd_push_constants(
                cmd,
                targets.pipeline_layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of::<PushConstants>(&draw.push_constants),
            );
            device.cmd_draw_indexed(cmd, draw.index_count, 1, draw.first_index, 0, 0);
        }

        device.cmd_end_render_pass(cmd);
        device.end_command_buffer(cmd).map_err(GpuError::from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_is_flipped() {
        let viewport = flipped_viewport(vk::Extent2D {
            width: 800,
            height: 600,
        });
        assert_eq!(viewport.y, 600.0);
        assert_eq!(viewport.height, -600.0);
        assert_eq!(viewport.width, 800.0);
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));
    }

    #[test]
    fn depth_clears_to_far_plane() {
        let values = clear_values([0.1, 0.2, 0.3, 1.0]);
        let depth = unsafe { values[1].depth_stencil };
        assert_eq!(depth.depth, 0.0);
        let color = unsafe { values[0].color.float32 };
        assert_eq!(color, [0.1, 0.2, 0.3, 1.0]);
    }
}
