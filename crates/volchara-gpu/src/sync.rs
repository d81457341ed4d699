//! Synchronization primitives and per-frame slots.

use crate::command::CommandPool;
use crate::error::Result;
use ash::vk;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    Ok(unsafe { device.create_semaphore(&create_info, None)? })
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    Ok(unsafe { device.create_fence(&create_info, None)? })
}

/// Indices of the slots other than `slot` in a ring of `count`.
pub fn other_slots(count: usize, slot: usize) -> impl Iterator<Item = usize> {
    let own = slot % count.max(1);
    (0..count).filter(move |&index| index != own)
}

/// Resources owned by one frame in flight.
///
/// The fence starts signaled so the first wait on a fresh slot returns
/// immediately.
pub struct FrameSlot {
    /// Signaled when the acquired swapchain image is ready
    pub image_available: vk::Semaphore,
    /// Signaled when this slot's rendering is complete
    pub render_finished: vk::Semaphore,
    /// Signaled when the GPU has retired this slot's command buffer
    pub in_flight: vk::Fence,
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSlot {
    /// Block until the slot's previous submission has retired.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        unsafe { device.wait_for_fences(&[self.in_flight], true, u64::MAX)? };
        Ok(())
    }

    /// Return the fence to unsignaled ahead of a new submission.
    ///
    /// # Safety
    /// The device must be valid and the fence must not be pending.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        unsafe { device.reset_fences(&[self.in_flight])? };
        Ok(())
    }
}

/// Fixed ring of frame slots sharing one command pool.
pub struct FrameSlots {
    pool: CommandPool,
    slots: Vec<FrameSlot>,
}

impl FrameSlots {
    /// Create `count` slots with resettable command buffers.
    ///
    /// # Safety
    /// The device must be valid and the queue family must exist.
    pub unsafe fn new(device: &ash::Device, queue_family: u32, count: usize) -> Result<Self> {
        let pool = unsafe {
            CommandPool::new(
                device,
                queue_family,
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )?
        };
        let command_buffers = unsafe { pool.allocate_primary(device, count as u32)? };

        let mut slots = Vec::with_capacity(count);
        for command_buffer in command_buffers {
            slots.push(unsafe {
                FrameSlot {
                    image_available: create_semaphore(device)?,
                    render_finished: create_semaphore(device)?,
                    in_flight: create_fence(device, true)?,
                    command_buffer,
                }
            });
        }

        Ok(Self { pool, slots })
    }

    #[inline]
    pub fn get(&self, index: usize) -> &FrameSlot {
        &self.slots[index % self.slots.len()]
    }

    /// Block until every slot except `slot` has retired its submission.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait_others(&self, device: &ash::Device, slot: usize) -> Result<()> {
        let fences: Vec<vk::Fence> = other_slots(self.slots.len(), slot)
            .map(|index| self.slots[index].in_flight)
            .collect();
        if !fences.is_empty() {
            unsafe { device.wait_for_fences(&fences, true, u64::MAX)? };
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Destroy all resources.
    ///
    /// # Safety
    /// The device must be valid and no slot may be in flight.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for slot in &self.slots {
            unsafe {
                device.destroy_semaphore(slot.image_available, None);
                device.destroy_semaphore(slot.render_finished, None);
                device.destroy_fence(slot.in_flight, None);
            }
        }
        unsafe { self.pool.destroy(device) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_slots_skip_own() {
        assert_eq!(other_slots(2, 0).collect::<Vec<_>>(), vec![1]);
        assert_eq!(other_slots(2, 1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(other_slots(3, 4).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn single_slot_has_no_others() {
        assert_eq!(other_slots(1, 0).count(), 0);
        assert_eq!(other_slots(0, 0).count(), 0);
    }
}
