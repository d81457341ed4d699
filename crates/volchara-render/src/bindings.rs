//! Descriptor layouts and sets shared by every draw.
//!
//! - set 0: camera uniforms, one set per frame slot
//! - set 1: sampler (binding 0) and the bindless texture array (binding 1)
//! - set 2: lighting storage buffer

use ash::vk;
use volchara_core::constants::FRAMES_IN_FLIGHT;
use volchara_gpu::{
    create_sampler, write_sampled_image, write_sampler, write_storage_buffer,
    write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder, GpuBuffer, GpuError,
};

pub const UNIFORM_SET: u32 = 0;
pub const TEXTURE_SET: u32 = 1;
pub const STORAGE_SET: u32 = 2;

const SAMPLER_BINDING: u32 = 0;
const TEXTURE_ARRAY_BINDING: u32 = 1;

/// Pool sizes for one uniform set per slot, one texture set and one
/// storage set.
#[allow(clippy::cast_possible_truncation)]
pub fn pool_sizes(max_textures: u32) -> [vk::DescriptorPoolSize; 4] {
    [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: FRAMES_IN_FLIGHT as u32,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::SAMPLER,
            descriptor_count: 1,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::SAMPLED_IMAGE,
            descriptor_count: max_textures,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: 1,
        },
    ]
}

/// Descriptor layouts, pool, sets and the texture sampler.
pub struct SceneBindings {
    uniform_layout: vk::DescriptorSetLayout,
    texture_layout: vk::DescriptorSetLayout,
    storage_layout: vk::DescriptorSetLayout,
    pool: DescriptorPool,
    uniform_sets: Vec<vk::DescriptorSet>,
    texture_set: vk::DescriptorSet,
    storage_set: vk::DescriptorSet,
    sampler: vk::Sampler,
}

impl SceneBindings {
    /// # Safety
    /// The device must be valid with descriptor indexing enabled.
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn new(
        device: &ash::Device,
        max_textures: u32,
        max_anisotropy: f32,
    ) -> Result<Self, GpuError> {
        let uniform_layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
                .build(device)?
        };
        let texture_layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .sampler(SAMPLER_BINDING, vk::ShaderStageFlags::FRAGMENT)
                .bindless_sampled_images(
                    TEXTURE_ARRAY_BINDING,
                    max_textures,
                    vk::ShaderStageFlags::FRAGMENT,
                )
                .build(device)?
        };
        let storage_layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .storage_buffer(
                    0,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                )
                .build(device)?
        };

        let pool = unsafe {
            DescriptorPool::new(
                device,
                FRAMES_IN_FLIGHT as u32 + 2,
                &pool_sizes(max_textures),
            )?
        };

        let uniform_sets =
            unsafe { pool.allocate(device, &[uniform_layout; FRAMES_IN_FLIGHT])? };
        let texture_set = unsafe { pool.allocate_variable(device, texture_layout, max_textures)? };
        let storage_set = unsafe { pool.allocate(device, &[storage_layout])? }
            .into_iter()
            .next()
            .ok_or_else(|| GpuError::InvalidState("No storage set allocated".to_string()))?;

        let sampler = unsafe { create_sampler(device, max_anisotropy)? };
        unsafe { write_sampler(device, texture_set, SAMPLER_BINDING, sampler) };

        Ok(Self {
            uniform_layout,
            texture_layout,
            storage_layout,
            pool,
            uniform_sets,
            texture_set,
            storage_set,
            sampler,
        })
    }

    /// Layouts in set order, for the pipeline layout.
    pub fn layouts(&self) -> [vk::DescriptorSetLayout; 3] {
        [self.uniform_layout, self.texture_layout, self.storage_layout]
    }

    /// Sets to bind for frame slot `slot`, in set order.
    pub fn sets(&self, slot: usize) -> [vk::DescriptorSet; 3] {
        [
            self.uniform_sets[slot % self.uniform_sets.len()],
            self.texture_set,
            self.storage_set,
        ]
    }

    /// Point each slot's uniform set at its buffer.
    ///
    /// # Safety
    /// The device and buffers must be valid.
    pub unsafe fn bind_uniform_buffers(&self, device: &ash::Device, buffers: &[GpuBuffer]) {
        for (&set, buffer) in self.uniform_sets.iter().zip(buffers) {
            unsafe { write_uniform_buffer(device, set, 0, buffer.buffer, buffer.size()) };
        }
    }

    /// # Safety
    /// The device and buffer must be valid.
    pub unsafe fn bind_storage_buffer(&self, device: &ash::Device, buffer: &GpuBuffer) {
        unsafe { write_storage_buffer(device, self.storage_set, 0, buffer.buffer, buffer.size()) };
    }

    /// Write element `index` of the texture array.
    ///
    /// The binding is update-after-bind, so this is valid while earlier
    /// frames that do not use `index` are still executing.
    ///
    /// # Safety
    /// The view must be valid and its image in `SHADER_READ_ONLY_OPTIMAL`.
    pub unsafe fn write_texture(&self, device: &ash::Device, index: u32, view: vk::ImageView) {
        unsafe { write_sampled_image(device, self.texture_set, TEXTURE_ARRAY_BINDING, index, view) };
    }

    /// # Safety
    /// No set may be in use by the GPU.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_sampler(self.sampler, None);
            self.pool.destroy(device);
            device.destroy_descriptor_set_layout(self.uniform_layout, None);
            device.destroy_descriptor_set_layout(self.texture_layout, None);
            device.destroy_descriptor_set_layout(self.storage_layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_covers_every_set() {
        let sizes = pool_sizes(64);
        let count = |ty| {
            sizes
                .iter()
                .filter(|size| size.ty == ty)
                .map(|size| size.descriptor_count)
                .sum::<u32>()
        };
        assert_eq!(count(vk::DescriptorType::UNIFORM_BUFFER), FRAMES_IN_FLIGHT as u32);
        assert_eq!(count(vk::DescriptorType::SAMPLED_IMAGE), 64);
        assert_eq!(count(vk::DescriptorType::SAMPLER), 1);
        assert_eq!(count(vk::DescriptorType::STORAGE_BUFFER), 1);
    }
}
