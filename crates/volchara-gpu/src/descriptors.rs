//! Descriptor set management.

use crate::error::{GpuError, Result};
use ash::vk;

/// Descriptor set layout builder.
pub struct DescriptorSetLayoutBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
    binding_flags: Vec<vk::DescriptorBindingFlags>,
}

impl<'a> DescriptorSetLayoutBuilder<'a> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            binding_flags: Vec::new(),
        }
    }

    /// Add a binding with explicit binding flags.
    pub fn binding_with_flags(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        count: u32,
        stage_flags: vk::ShaderStageFlags,
        flags: vk::DescriptorBindingFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(stage_flags),
        );
        self.binding_flags.push(flags);
        self
    }

    /// Add a binding.
    pub fn binding(
        self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        count: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.binding_with_flags(
            binding,
            descriptor_type,
            count,
            stage_flags,
            vk::DescriptorBindingFlags::empty(),
        )
    }

    pub fn uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::UNIFORM_BUFFER, 1, stage_flags)
    }

    pub fn storage_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::STORAGE_BUFFER, 1, stage_flags)
    }

    pub fn sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::SAMPLER, 1, stage_flags)
    }

    /// Add a variable-length, partially bound array of sampled images that
    /// can be written while the set is bound.
    ///
    /// Must be the last binding of the layout.
    pub fn bindless_sampled_images(
        self,
        binding: u32,
        max_count: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        self.binding_with_flags(
            binding,
            vk::DescriptorType::SAMPLED_IMAGE,
            max_count,
            stage_flags,
            BINDLESS_FLAGS,
        )
    }

    fn needs_update_after_bind_pool(&self) -> bool {
        self.binding_flags
            .iter()
            .any(|f| f.contains(vk::DescriptorBindingFlags::UPDATE_AFTER_BIND))
    }

    /// Build the descriptor set layout.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build(self, device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
        let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default()
            .binding_flags(&self.binding_flags);
        let layout_flags = if self.needs_update_after_bind_pool() {
            vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL
        } else {
            vk::DescriptorSetLayoutCreateFlags::empty()
        };
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(layout_flags)
            .bindings(&self.bindings)
            .push_next(&mut flags_info);

        Ok(unsafe { device.create_descriptor_set_layout(&layout_info, None)? })
    }
}

impl Default for DescriptorSetLayoutBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Flags for the bindless texture array binding.
pub const BINDLESS_FLAGS: vk::DescriptorBindingFlags = vk::DescriptorBindingFlags::from_raw(
    vk::DescriptorBindingFlags::PARTIALLY_BOUND.as_raw()
        | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND.as_raw()
        | vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT.as_raw(),
);

/// Descriptor pool for allocating descriptor sets.
///
/// Created update-after-bind capable so bindless sets can come from it.
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes)
            .flags(
                vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET
                    | vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND,
            );

        let pool = unsafe { device.create_descriptor_pool(&create_info, None)? };
        Ok(Self { pool })
    }

    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Allocate one set per layout.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate(
        &self,
        device: &ash::Device,
        layouts: &[vk::DescriptorSetLayout],
    ) -> Result<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        Ok(unsafe { device.allocate_descriptor_sets(&alloc_info)? })
    }

    /// Allocate one set whose last binding is variable-length with
    /// `count` descriptors.
    ///
    /// # Safety
    /// The device must be valid and the layout's last binding must have been
    /// declared with `VARIABLE_DESCRIPTOR_COUNT`.
    pub unsafe fn allocate_variable(
        &self,
        device: &ash::Device,
        layout: vk::DescriptorSetLayout,
        count: u32,
    ) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        let counts = [count];
        let mut variable_info =
            vk::DescriptorSetVariableDescriptorCountAllocateInfo::default().descriptor_counts(&counts);
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts)
            .push_next(&mut variable_info);

        unsafe { device.allocate_descriptor_sets(&alloc_info)? }
            .into_iter()
            .next()
            .ok_or_else(|| GpuError::InvalidState("No descriptor set allocated".to_string()))
    }

    /// # Safety
    /// The device must be valid and the pool must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe { device.destroy_descriptor_pool(self.pool, None) };
    }
}

/// Write a uniform buffer descriptor.
///
/// # Safety
/// Device and buffer must be valid.
pub unsafe fn write_uniform_buffer(
    device: &ash::Device,
    dst_set: vk::DescriptorSet,
    binding: u32,
    buffer: vk::Buffer,
    range: u64,
) {
    unsafe {
        write_buffer(
            device,
            dst_set,
            binding,
            vk::DescriptorType::UNIFORM_BUFFER,
            buffer,
            range,
        );
    }
}

/// Write a storage buffer descriptor.
///
/// # Safety
/// Device and buffer must be valid.
pub unsafe fn write_storage_buffer(
    device: &ash::Device,
    dst_set: vk::DescriptorSet,
    binding: u32,
    buffer: vk::Buffer,
    range: u64,
) {
    unsafe {
        write_buffer(
            device,
            dst_set,
            binding,
            vk::DescriptorType::STORAGE_BUFFER,
            buffer,
            range,
        );
    }
}

unsafe fn write_buffer(
    device: &ash::Device,
    dst_set: vk::DescriptorSet,
    binding: u32,
    descriptor_type: vk::DescriptorType,
    buffer: vk::Buffer,
    range: u64,
) {
    let buffer_info = vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(0)
        .range(range);

    let write = vk::WriteDescriptorSet::default()
        .dst_set(dst_set)
        .dst_binding(binding)
        .descriptor_type(descriptor_type)
        .buffer_info(std::slice::from_ref(&buffer_info));

    unsafe { device.update_descriptor_sets(&[write], &[]) };
}

/// Write a standalone sampler descriptor.
///
/// # Safety
/// Device and sampler must be valid.
pub unsafe fn write_sampler(
    device: &ash::Device,
    dst_set: vk::DescriptorSet,
    binding: u32,
    sampler: vk::Sampler,
) {
    let image_info = vk::DescriptorImageInfo::default().sampler(sampler);

    let write = vk::WriteDescriptorSet::default()
        .dst_set(dst_set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::SAMPLER)
        .image_info(std::slice::from_ref(&image_info));

    unsafe { device.update_descriptor_sets(&[write], &[]) };
}

/// Write one element of a sampled image array.
///
/// # Safety
/// Device and view must be valid and the image must be in
/// `SHADER_READ_ONLY_OPTIMAL`.
pub unsafe fn write_sampled_image(
    device: &ash::Device,
    dst_set: vk::DescriptorSet,
    binding: u32,
    array_element: u32,
    view: vk::ImageView,
) {
    let image_info = vk::DescriptorImageInfo::default()
        .image_view(view)
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

    let write = vk::WriteDescriptorSet::default()
        .dst_set(dst_set)
        .dst_binding(binding)
        .dst_array_element(array_element)
        .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
        .image_info(std::slice::from_ref(&image_info));

    unsafe { device.update_descriptor_sets(&[write], &[]) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindless_binding_requests_update_after_bind_pool() {
        let plain = DescriptorSetLayoutBuilder::new().uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        assert!(!plain.needs_update_after_bind_pool());

        let bindless = DescriptorSetLayoutBuilder::new()
            .sampler(0, vk::ShaderStageFlags::FRAGMENT)
            .bindless_sampled_images(1, 64, vk::ShaderStageFlags::FRAGMENT);
        assert!(bindless.needs_update_after_bind_pool());
        assert_eq!(bindless.bindings.len(), bindless.binding_flags.len());
        assert_eq!(bindless.bindings[1].descriptor_count, 64);
        assert!(bindless.binding_flags[1].contains(vk::DescriptorBindingFlags::PARTIALLY_BOUND));
        assert!(bindless.binding_flags[0].is_empty());
    }
}
