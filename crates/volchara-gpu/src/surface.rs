//! Window surface creation and capability queries.

use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Presentation surface and its extension loader.
pub struct Surface {
    pub surface: vk::SurfaceKHR,
    pub loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Create a surface for a window.
    ///
    /// # Safety
    /// The instance must have been created with the extensions reported by
    /// `ash_window::enumerate_required_extensions` for this display, and the
    /// window must outlive the surface.
    pub unsafe fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<Self> {
        let surface = unsafe { ash_window::create_surface(entry, instance, display, window, None) }
            .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;
        let loader = ash::khr::surface::Instance::new(entry, instance);
        Ok(Self { surface, loader })
    }

    /// Whether `queue_family` on `physical_device` can present to this surface.
    ///
    /// # Safety
    /// The physical device must belong to the surface's instance.
    pub unsafe fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        Ok(unsafe {
            self.loader.get_physical_device_surface_support(
                physical_device,
                queue_family,
                self.surface,
            )?
        })
    }

    /// Query the surface's current capabilities, formats and present modes.
    ///
    /// # Safety
    /// The physical device must belong to the surface's instance.
    pub unsafe fn support(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceSupport> {
        unsafe {
            Ok(SurfaceSupport {
                capabilities: self
                    .loader
                    .get_physical_device_surface_capabilities(physical_device, self.surface)?,
                formats: self
                    .loader
                    .get_physical_device_surface_formats(physical_device, self.surface)?,
                present_modes: self
                    .loader
                    .get_physical_device_surface_present_modes(physical_device, self.surface)?,
            })
        }
    }

    /// # Safety
    /// No swapchain may still reference the surface.
    pub unsafe fn destroy(&self) {
        unsafe { self.loader.destroy_surface(self.surface, None) };
    }
}

/// Snapshot of what a surface supports on one physical device.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// A device is usable for presentation when it offers at least one
    /// format and one present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_support_is_inadequate() {
        let mut support = SurfaceSupport::default();
        assert!(!support.is_adequate());

        support.formats.push(vk::SurfaceFormatKHR::default());
        assert!(!support.is_adequate());

        support.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(support.is_adequate());
    }
}
