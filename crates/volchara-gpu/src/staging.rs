//! Shared staging buffer for host-to-device uploads.
//!
//! Uploads are serialized by the buffer's mutex. When both are needed the
//! staging lock is taken before the allocator lock.

use crate::error::{GpuError, Result};
use crate::memory::{GpuAllocator, GpuBuffer, GpuImage};
use crate::transfer::TransferExecutor;
use ash::vk;
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;

/// Host-visible, host-coherent buffer reused for every transient upload.
pub struct StagingBuffer {
    buffer: Mutex<GpuBuffer>,
    capacity: u64,
}

impl StagingBuffer {
    pub fn new(allocator: &mut GpuAllocator, capacity: u64) -> Result<Self> {
        let buffer = allocator.create_buffer(
            capacity,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "staging",
        )?;
        Ok(Self {
            buffer: Mutex::new(buffer),
            capacity,
        })
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Write `data` to the start of `dst`.
    ///
    /// Mappable destinations are written directly. Anything else goes through
    /// the staging buffer in capacity-sized chunks, each followed by a device
    /// copy. Data larger than `dst` is rejected before anything is written.
    ///
    /// # Safety
    /// `dst` must not be read by pending GPU work.
    pub unsafe fn upload_to_buffer(
        &self,
        transfer: &dyn TransferExecutor,
        dst: &GpuBuffer,
        data: &[u8],
    ) -> Result<()> {
        dst.check_range(0, data.len() as u64)?;

        if dst.is_mappable() {
            return dst.write_bytes(0, data);
        }

        let staging = self.buffer.lock();
        let chunk_size = usize::try_from(self.capacity).unwrap_or(usize::MAX);
        for (i, chunk) in data.chunks(chunk_size).enumerate() {
            staging.write_bytes(0, chunk)?;
            unsafe {
                transfer.copy_buffer(
                    staging.buffer,
                    dst.buffer,
                    chunk.len() as u64,
                    (i * chunk_size) as u64,
                )?;
            }
        }
        Ok(())
    }

    /// Fill `dst` with RGBA8 texels and leave it in `SHADER_READ_ONLY_OPTIMAL`.
    ///
    /// Textures larger than the shared buffer get a temporary staging buffer
    /// that is freed before returning.
    ///
    /// # Safety
    /// `dst` must be freshly created (layout `UNDEFINED`) and unused by the GPU.
    pub unsafe fn upload_to_image(
        &self,
        allocator: &Mutex<GpuAllocator>,
        transfer: &dyn TransferExecutor,
        dst: &GpuImage,
        texels: &[u8],
    ) -> Result<()> {
        let expected = dst.rgba8_size();
        if texels.len() as u64 != expected {
            return Err(GpuError::InvalidState(format!(
                "Texel data is {} bytes, image needs {expected}",
                texels.len()
            )));
        }

        let staging = self.buffer.lock();
        let temporary = if expected > self.capacity {
            tracing::debug!("Texture exceeds shared staging buffer, using a temporary one");
            Some(allocator.lock().create_buffer(
                expected,
                vk::BufferUsageFlags::TRANSFER_SRC,
                MemoryLocation::CpuToGpu,
                "staging (texture)",
            )?)
        } else {
            None
        };
        let source: &GpuBuffer = temporary.as_ref().unwrap_or(&*staging);

        let result = source.write_bytes(0, texels).and_then(|()| unsafe {
            transfer.transition_image_layout(
                dst.image,
                dst.aspect,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            )?;
            transfer.copy_buffer_to_image(source.buffer, dst.image, dst.extent)?;
            transfer.transition_image_layout(
                dst.image,
                dst.aspect,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )
        });

        if let Some(buffer) = temporary {
            allocator.lock().free_buffer(buffer)?;
        }
        result
    }

    /// Release the buffer.
    pub fn destroy(self, allocator: &mut GpuAllocator) -> Result<()> {
        allocator.free_buffer(self.buffer.into_inner())
    }
}
