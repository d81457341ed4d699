//! GPU context management.

use crate::capabilities::{DeviceFeatures, GpuCapabilities};
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, DebugMessenger};
use crate::memory::GpuAllocator;
use crate::surface::{Surface, SurfaceSupport};
use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;
use std::sync::Arc;
use volchara_core::PushConstants;

/// Queue families used by the engine. They are often the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

/// Pick queue families, preferring one family that can both draw and present.
pub fn choose_queue_families(
    families: &[vk::QueueFamilyProperties],
    can_present: impl Fn(u32) -> bool,
) -> Option<QueueFamilies> {
    let graphics: Vec<u32> = families
        .iter()
        .enumerate()
        .filter(|(_, f)| f.queue_count > 0 && f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|(i, _)| i as u32)
        .collect();

    if let Some(&both) = graphics.iter().find(|&&i| can_present(i)) {
        return Some(QueueFamilies {
            graphics: both,
            present: both,
        });
    }

    let present = (0..families.len() as u32).find(|&i| can_present(i))?;
    graphics.first().map(|&graphics| QueueFamilies { graphics, present })
}

/// Owner of the Vulkan instance, surface, device, queues and allocator.
///
/// Everything else in the engine borrows from it. Dropping it waits for the
/// device to go idle before tearing down.
pub struct GpuContext {
    // Entry must outlive the instance
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    surface: Surface,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    capabilities: GpuCapabilities,
    allocator: Mutex<GpuAllocator>,
    queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl GpuContext {
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Shared device handle for objects that outlive a borrow.
    pub fn device_arc(&self) -> Arc<ash::Device> {
        Arc::clone(&self.device)
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Current surface capabilities, formats and present modes.
    pub fn surface_support(&self) -> Result<SurfaceSupport> {
        unsafe { self.surface.support(self.physical_device) }
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::warn!("device_wait_idle failed during shutdown: {e}");
            }

            // Allocator must release its memory before the device goes away
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.surface.destroy();
            if let Some(messenger) = &self.debug_messenger {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Volchara".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the context for presenting to `window`.
    ///
    /// Fails with [`GpuError::NoSuitableDevice`] listing, per device, what it
    /// lacks when no device can run the engine.
    pub fn build<W>(self, window: &W) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("No display handle: {e}")))?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("No window handle: {e}")))?
            .as_raw();

        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Loading(format!("Failed to load Vulkan: {e}")))?;

        let instance =
            unsafe { create_instance(&entry, &self.app_name, display, self.enable_validation)? };

        // From here on partially built state must be torn down by hand
        let debug_messenger = if self.enable_validation {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };
        let cleanup_instance = |surface: Option<&Surface>| unsafe {
            if let Some(surface) = surface {
                surface.destroy();
            }
            if let Some(messenger) = &debug_messenger {
                messenger.destroy();
            }
            instance.destroy_instance(None);
        };

        let surface = match unsafe { Surface::new(&entry, &instance, display, window_handle) } {
            Ok(surface) => surface,
            Err(e) => {
                cleanup_instance(None);
                return Err(e);
            }
        };

        let selected = unsafe { select_physical_device(&instance, &surface) };
        let (physical_device, capabilities, queue_families) = match selected {
            Ok(selected) => selected,
            Err(e) => {
                cleanup_instance(Some(&surface));
                return Err(e);
            }
        };
        tracing::info!("Selected GPU: {}", capabilities.summary());

        let created =
            unsafe { create_device(&instance, physical_device, &capabilities, queue_families) };
        let device = match created {
            Ok(device) => Arc::new(device),
            Err(e) => {
                cleanup_instance(Some(&surface));
                return Err(e);
            }
        };

        let allocator =
            match unsafe { GpuAllocator::new(&instance, Arc::clone(&device), physical_device) } {
                Ok(allocator) => allocator,
                Err(e) => {
                    unsafe { device.destroy_device(None) };
                    cleanup_instance(Some(&surface));
                    return Err(e);
                }
            };

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };

        Ok(GpuContext {
            entry,
            instance,
            debug_messenger,
            surface,
            physical_device,
            device,
            capabilities,
            allocator: Mutex::new(allocator),
            queue_families,
            graphics_queue,
            present_queue,
        })
    }
}

/// Pick the highest scoring device that meets every requirement.
///
/// # Safety
/// The instance and surface must be valid.
unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface: &Surface,
) -> Result<(vk::PhysicalDevice, GpuCapabilities, QueueFamilies)> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        return Err(GpuError::NoSuitableDevice(
            "no Vulkan devices found".to_string(),
        ));
    }

    let push_constants_size = std::mem::size_of::<PushConstants>() as u32;
    let mut rejections = Vec::new();
    let mut best: Option<(vk::PhysicalDevice, GpuCapabilities, QueueFamilies)> = None;

    for device in devices {
        let caps = unsafe { GpuCapabilities::query(instance, device) };
        let mut unmet = caps.unmet_requirements(push_constants_size);

        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let queue_families = choose_queue_families(&families, |i| {
            unsafe { surface.supports_present(device, i) }.unwrap_or(false)
        });
        if queue_families.is_none() {
            unmet.push("graphics and present queues".to_string());
        }

        match unsafe { surface.support(device) } {
            Ok(support) if support.is_adequate() => {}
            _ => unmet.push("surface formats and present modes".to_string()),
        }

        tracing::debug!("Candidate GPU: {} (unmet: {:?})", caps.summary(), unmet);

        match queue_families {
            Some(queue_families) if unmet.is_empty() => {
                if best.as_ref().map_or(true, |(_, b, _)| caps.score() > b.score()) {
                    best = Some((device, caps, queue_families));
                }
            }
            _ => rejections.push(format!("{}: missing {}", caps.device_name, unmet.join(", "))),
        }
    }

    best.ok_or_else(|| GpuError::NoSuitableDevice(rejections.join("; ")))
}

const PORTABILITY_SUBSET: &CStr = c"VK_KHR_portability_subset";

/// Create the logical device with the descriptor indexing features enabled.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    capabilities: &GpuCapabilities,
    queue_families: QueueFamilies,
) -> Result<ash::Device> {
    let queue_priority = [1.0_f32];
    let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_families.graphics)
        .queue_priorities(&queue_priority)];
    if queue_families.present != queue_families.graphics {
        queue_create_infos.push(
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_families.present)
                .queue_priorities(&queue_priority),
        );
    }

    let mut extensions: Vec<&CStr> = vec![ash::khr::swapchain::NAME];
    // Portability drivers (MoltenVK) require the subset extension when offered
    if capabilities.supports_extension(PORTABILITY_SUBSET) {
        extensions.push(PORTABILITY_SUBSET);
    }
    let extension_names: Vec<*const std::ffi::c_char> =
        extensions.iter().map(|ext| ext.as_ptr()).collect();

    let required = DeviceFeatures::REQUIRED;
    let mut vulkan_1_2_features = vk::PhysicalDeviceVulkan12Features::default()
        .descriptor_indexing(true)
        .descriptor_binding_partially_bound(required.descriptor_binding_partially_bound)
        .descriptor_binding_sampled_image_update_after_bind(
            required.descriptor_binding_sampled_image_update_after_bind,
        )
        .descriptor_binding_variable_descriptor_count(
            required.descriptor_binding_variable_descriptor_count,
        )
        .runtime_descriptor_array(required.runtime_descriptor_array);
    let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(required.sampler_anisotropy);
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .features(features)
        .push_next(&mut vulkan_1_2_features);

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features2);

    Ok(unsafe { instance.create_device(physical_device, &device_create_info, None)? })
}
