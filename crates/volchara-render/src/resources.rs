//! GPU-side buffers and textures for the scene.

use ash::vk;
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;
use volchara_core::constants::{DEFAULT_BUFFER_CAPACITY, FRAMES_IN_FLIGHT, MAX_TEXTURES};
use volchara_core::CameraUniforms;
use volchara_gpu::{GpuAllocator, GpuBuffer, GpuError, StagingBuffer, TransferExecutor};

use crate::bindings::SceneBindings;
use crate::draw::PackedGeometry;
use crate::error::Result;
use crate::textures::TextureArray;

/// Fixed capacities of the scene resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub vertex_bytes: u64,
    pub index_bytes: u64,
    pub storage_bytes: u64,
    pub staging_bytes: u64,
    pub max_textures: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            vertex_bytes: DEFAULT_BUFFER_CAPACITY,
            index_bytes: DEFAULT_BUFFER_CAPACITY,
            storage_bytes: DEFAULT_BUFFER_CAPACITY,
            staging_bytes: DEFAULT_BUFFER_CAPACITY,
            max_textures: MAX_TEXTURES,
        }
    }
}

/// Check packed geometry against buffer capacities before touching them.
pub fn check_geometry_fits(geometry: &PackedGeometry, limits: &ResourceLimits) -> Result<()> {
    let checks = [
        ("vertex buffer", geometry.vertex_bytes().len() as u64, limits.vertex_bytes),
        ("index buffer", geometry.index_bytes().len() as u64, limits.index_bytes),
    ];
    for (resource, requested, capacity) in checks {
        if requested > capacity {
            return Err(GpuError::CapacityExceeded {
                resource: resource.to_string(),
                requested,
                capacity,
            }
            .into());
        }
    }
    Ok(())
}

/// Vertex, index, uniform and storage buffers plus the texture array.
///
/// Device-local buffers are filled through the shared staging buffer; the
/// per-slot uniform buffers are host-visible and written in place.
pub struct ResourcePool {
    limits: ResourceLimits,
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    storage_buffer: GpuBuffer,
    uniform_buffers: Vec<GpuBuffer>,
    staging: StagingBuffer,
    textures: TextureArray,
    index_count: u32,
}

impl ResourcePool {
    pub fn new(allocator: &mut GpuAllocator, limits: ResourceLimits) -> Result<Self> {
        let vertex_buffer = allocator.create_buffer(
            limits.vertex_bytes,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            "vertex buffer",
        )?;
        let index_buffer = allocator.create_buffer(
            limits.index_bytes,
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            "index buffer",
        )?;
        let storage_buffer = allocator.create_buffer(
            limits.storage_bytes,
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            "storage buffer",
        )?;

        let mut uniform_buffers = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for slot in 0..FRAMES_IN_FLIGHT {
            uniform_buffers.push(allocator.create_buffer(
                std::mem::size_of::<CameraUniforms>() as u64,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                MemoryLocation::CpuToGpu,
                &format!("camera uniforms {slot}"),
            )?);
        }

        let staging = StagingBuffer::new(allocator, limits.staging_bytes)?;

        Ok(Self {
            limits,
            vertex_buffer,
            index_buffer,
            storage_buffer,
            uniform_buffers,
            staging,
            textures: TextureArray::new(limits.max_textures),
            index_count: 0,
        })
    }

    /// Point the descriptor sets at the pool's buffers.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn bind(&self, device: &ash::Device, bindings: &SceneBindings) {
        unsafe {
            bindings.bind_uniform_buffers(device, &self.uniform_buffers);
            bindings.bind_storage_buffer(device, &self.storage_buffer);
        }
    }

    /// Replace the scene geometry.
    ///
    /// Oversized geometry is rejected before anything is written, leaving
    /// the previous upload intact.
    ///
    /// # Safety
    /// The vertex and index buffers must not be in use by the GPU.
    pub unsafe fn upload_geometry(
        &mut self,
        transfer: &dyn TransferExecutor,
        geometry: &PackedGeometry,
    ) -> Result<()> {
        check_geometry_fits(geometry, &self.limits)?;

        unsafe {
            self.staging
                .upload_to_buffer(transfer, &self.vertex_buffer, geometry.vertex_bytes())?;
            self.staging
                .upload_to_buffer(transfer, &self.index_buffer, geometry.index_bytes())?;
        }
        self.index_count = u32::try_from(geometry.indices.len()).unwrap_or(u32::MAX);

        tracing::debug!(
            "Uploaded {} vertices, {} indices",
            geometry.vertices.len(),
            geometry.indices.len()
        );
        Ok(())
    }

    /// Write the camera matrices for frame slot `slot`.
    pub fn write_uniforms(&self, slot: usize, uniforms: &CameraUniforms) -> Result<()> {
        let buffer = self.uniform_buffers.get(slot).ok_or_else(|| {
            GpuError::InvalidState(format!("No uniform buffer for frame slot {slot}"))
        })?;
        buffer.write_pod(0, uniforms)?;
        Ok(())
    }

    /// Overwrite the start of the storage buffer.
    ///
    /// # Safety
    /// The storage buffer must not be in use by the GPU.
    pub unsafe fn write_storage(&self, transfer: &dyn TransferExecutor, bytes: &[u8]) -> Result<()> {
        unsafe {
            self.staging
                .upload_to_buffer(transfer, &self.storage_buffer, bytes)?;
        }
        Ok(())
    }

    /// Upload RGBA8 texels as a new texture and return its array index.
    ///
    /// Exactly one element of the texture array descriptor is written.
    ///
    /// # Safety
    /// The device must be valid and the allocator lock must not be held.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn load_texture(
        &mut self,
        device: &ash::Device,
        allocator: &Mutex<GpuAllocator>,
        transfer: &dyn TransferExecutor,
        bindings: &SceneBindings,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<u32> {
        let index = self.textures.next_index()?;
        if width == 0 || height == 0 {
            return Err(GpuError::InvalidState(format!(
                "Texture has zero size ({width}x{height})"
            ))
            .into());
        }

        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(vk::Format::R8G8B8A8_SRGB)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = allocator.lock().create_image(
            &create_info,
            vk::ImageAspectFlags::COLOR,
            MemoryLocation::GpuOnly,
            &format!("texture {index}"),
        )?;

        if let Err(e) = unsafe { self.staging.upload_to_image(allocator, transfer, &image, rgba) } {
            allocator.lock().free_image(image)?;
            return Err(e.into());
        }

        unsafe { bindings.write_texture(device, index, image.view) };
        self.textures.push(image)?;

        tracing::debug!("Loaded texture {index} ({width}x{height})");
        Ok(index)
    }

    pub fn texture_count(&self) -> u32 {
        self.textures.len()
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.buffer
    }

    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.buffer
    }

    /// Indices in the last geometry upload.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Free every buffer and texture.
    pub fn destroy(mut self, allocator: &mut GpuAllocator) -> Result<()> {
        for texture in self.textures.drain() {
            allocator.free_image(texture)?;
        }
        for buffer in self.uniform_buffers.drain(..) {
            allocator.free_buffer(buffer)?;
        }
        allocator.free_buffer(self.vertex_buffer)?;
        allocator.free_buffer(self.index_buffer)?;
        allocator.free_buffer(self.storage_buffer)?;
        self.staging.destroy(allocator)?;
        Ok(())
    }
}
