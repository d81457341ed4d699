//! GPU capability detection.

use ash::vk;
use std::collections::HashSet;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Optional device features the renderer depends on.
///
/// The texture array needs the descriptor indexing subset; the sampler
/// needs anisotropic filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFeatures {
    pub sampler_anisotropy: bool,
    pub descriptor_binding_partially_bound: bool,
    pub descriptor_binding_sampled_image_update_after_bind: bool,
    pub descriptor_binding_variable_descriptor_count: bool,
    pub runtime_descriptor_array: bool,
}

impl DeviceFeatures {
    /// Every feature the engine enables.
    pub const REQUIRED: Self = Self {
        sampler_anisotropy: true,
        descriptor_binding_partially_bound: true,
        descriptor_binding_sampled_image_update_after_bind: true,
        descriptor_binding_variable_descriptor_count: true,
        runtime_descriptor_array: true,
    };

    /// Names of the features in `required` that `self` lacks.
    pub fn missing(&self, required: &Self) -> Vec<&'static str> {
        let checks = [
            (
                required.sampler_anisotropy,
                self.sampler_anisotropy,
                "samplerAnisotropy",
            ),
            (
                required.descriptor_binding_partially_bound,
                self.descriptor_binding_partially_bound,
                "descriptorBindingPartiallyBound",
            ),
            (
                required.descriptor_binding_sampled_image_update_after_bind,
                self.descriptor_binding_sampled_image_update_after_bind,
                "descriptorBindingSampledImageUpdateAfterBind",
            ),
            (
                required.descriptor_binding_variable_descriptor_count,
                self.descriptor_binding_variable_descriptor_count,
                "descriptorBindingVariableDescriptorCount",
            ),
            (
                required.runtime_descriptor_array,
                self.runtime_descriptor_array,
                "runtimeDescriptorArray",
            ),
        ];
        checks
            .into_iter()
            .filter(|&(needed, present, _)| needed && !present)
            .map(|(_, _, name)| name)
            .collect()
    }
}

/// Detected GPU capabilities.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    /// GPU vendor
    pub vendor: GpuVendor,
    /// Device name
    pub device_name: String,
    pub device_type: vk::PhysicalDeviceType,
    /// Vulkan API version
    pub api_version: u32,
    /// Device-local memory in MB
    pub device_local_memory_mb: u64,
    /// Largest push constant block the device accepts
    pub max_push_constants_size: u32,
    pub max_sampler_anisotropy: f32,
    pub features: DeviceFeatures,
    pub available_extensions: HashSet<String>,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device) }
            .unwrap_or_default();
        let available_extensions: HashSet<String> = extensions
            .iter()
            .filter_map(|ext| {
                unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }
                    .to_str()
                    .ok()
                    .map(String::from)
            })
            .collect();

        let mut indexing = vk::PhysicalDeviceVulkan12Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut indexing);
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        let base = features2.features;

        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let device_local_memory_mb: u64 = memory_properties
            .memory_heaps
            .iter()
            .take(memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum();

        Self {
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_name,
            device_type: properties.device_type,
            api_version: properties.api_version,
            device_local_memory_mb,
            max_push_constants_size: properties.limits.max_push_constants_size,
            max_sampler_anisotropy: properties.limits.max_sampler_anisotropy,
            features: DeviceFeatures {
                sampler_anisotropy: base.sampler_anisotropy == vk::TRUE,
                descriptor_binding_partially_bound: indexing.descriptor_binding_partially_bound
                    == vk::TRUE,
                descriptor_binding_sampled_image_update_after_bind: indexing
                    .descriptor_binding_sampled_image_update_after_bind
                    == vk::TRUE,
                descriptor_binding_variable_descriptor_count: indexing
                    .descriptor_binding_variable_descriptor_count
                    == vk::TRUE,
                runtime_descriptor_array: indexing.runtime_descriptor_array == vk::TRUE,
            },
            available_extensions,
        }
    }

    pub fn supports_extension(&self, name: &CStr) -> bool {
        name.to_str()
            .is_ok_and(|name| self.available_extensions.contains(name))
    }

    /// Everything that prevents this device from running the engine.
    ///
    /// An empty list means the device is usable.
    pub fn unmet_requirements(&self, push_constants_size: u32) -> Vec<String> {
        let mut unmet = Vec::new();

        let major = vk::api_version_major(self.api_version);
        let minor = vk::api_version_minor(self.api_version);
        if major < 1 || (major == 1 && minor < 2) {
            unmet.push(format!("Vulkan 1.2 (device reports {major}.{minor})"));
        }

        if !self.supports_extension(ash::khr::swapchain::NAME) {
            unmet.push("VK_KHR_swapchain".to_string());
        }

        unmet.extend(
            self.features
                .missing(&DeviceFeatures::REQUIRED)
                .into_iter()
                .map(String::from),
        );

        if self.max_push_constants_size < push_constants_size {
            unmet.push(format!(
                "{push_constants_size} bytes of push constants (device allows {})",
                self.max_push_constants_size
            ));
        }

        unmet
    }

    /// Preference score among suitable devices; discrete GPUs win.
    pub fn score(&self) -> u64 {
        let type_score = match self.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
            _ => 0,
        };
        type_score + self.device_local_memory_mb / 1024
    }

    /// Get a human-readable summary of capabilities.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}) - Vulkan {}.{}.{} - {} MB VRAM",
            self.device_name,
            self.vendor,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.device_local_memory_mb,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capable_device() -> GpuCapabilities {
        GpuCapabilities {
            vendor: GpuVendor::Amd,
            device_name: "Test GPU".to_string(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::make_api_version(0, 1, 3, 0),
            device_local_memory_mb: 8192,
            max_push_constants_size: 128,
            max_sampler_anisotropy: 16.0,
            features: DeviceFeatures::REQUIRED,
            available_extensions: ["VK_KHR_swapchain".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
    }

    #[test]
    fn capable_device_has_no_unmet_requirements() {
        assert!(capable_device().unmet_requirements(112).is_empty());
    }

    #[test]
    fn missing_features_are_named() {
        let mut caps = capable_device();
        caps.features.descriptor_binding_partially_bound = false;
        caps.features.sampler_anisotropy = false;

        let unmet = caps.unmet_requirements(112);
        assert_eq!(
            unmet,
            vec!["samplerAnisotropy", "descriptorBindingPartiallyBound"]
        );
    }

    #[test]
    fn old_api_and_missing_swapchain_reported() {
        let mut caps = capable_device();
        caps.api_version = vk::make_api_version(0, 1, 1, 0);
        caps.available_extensions.clear();

        let unmet = caps.unmet_requirements(112);
        assert_eq!(unmet.len(), 2);
        assert!(unmet[0].starts_with("Vulkan 1.2"));
        assert_eq!(unmet[1], "VK_KHR_swapchain");
    }

    #[test]
    fn push_constant_limit_checked() {
        let mut caps = capable_device();
        caps.max_push_constants_size = 64;
        assert_eq!(caps.unmet_requirements(112).len(), 1);
    }

    #[test]
    fn discrete_preferred_over_integrated() {
        let discrete = capable_device();
        let mut integrated = capable_device();
        integrated.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;
        assert!(discrete.score() > integrated.score());
    }
}
