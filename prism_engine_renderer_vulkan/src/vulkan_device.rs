/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Creation enumerates every physical device into an `AdapterInfo`, lets the
/// engine pick the adapter and the ray tracing path, then creates a device
/// with one queue able to run graphics, compute and presentation.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use prism_engine::prism::device::{
    Buffer, BufferDesc, CommandList, ComputePipeline, ComputePipelineDesc, DescriptorHeap, DescriptorHeapDesc,
    Fence, GraphicsDevice, RaytracingBackend, RaytracingPath, RaytracingPipeline, RaytracingPipelineDesc,
    Swapchain, SwapchainDesc, Texture, TextureDesc, MAX_ROOT_ARGUMENTS,
};
use prism_engine::prism::{
    select_adapter, select_raytracing_path, AdapterInfo, Error, RendererConfig, Result,
};
use prism_engine::{engine_bail, engine_debug, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;
use std::sync::Arc;
use winit::window::Window;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::{vulkan_command_list, VulkanCommandList};
use crate::vulkan_context::{vk_err, GpuContext, GpuContextParts, NativeRaytracingLoaders, RaytracingProperties, LOG_SOURCE};
use crate::vulkan_descriptor_heap::{create_resource_set_layout, create_sampler_set_layout, VulkanDescriptorHeap};
use crate::vulkan_fence::{vulkan_fence, VulkanFence};
use crate::vulkan_format::adapter_kind_from_vk;
use crate::vulkan_pipeline::{VulkanComputePipeline, VulkanRaytracingPipeline};
use crate::vulkan_raytracing::{EmulatedRaytracing, NativeRaytracing};
use crate::vulkan_swapchain::{vulkan_swapchain, VulkanSwapchain};
use crate::vulkan_texture::VulkanTexture;

/// Device extensions of the native ray tracing path
const NATIVE_RAYTRACING_EXTENSIONS: [&CStr; 3] = [
    ash::khr::acceleration_structure::NAME,
    ash::khr::ray_tracing_pipeline::NAME,
    ash::khr::deferred_host_operations::NAME,
];

/// Bytes of the root table push constant range
const ROOT_TABLE_SIZE: u32 = MAX_ROOT_ARGUMENTS * 8;

fn init_error(what: &str, e: impl std::fmt::Debug) -> Error {
    engine_error!(LOG_SOURCE, "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

/// A physical device and what it can do
struct Candidate {
    physical_device: vk::PhysicalDevice,
    info: AdapterInfo,
    queue_family: Option<u32>,
}

/// Feature set shared by both ray tracing paths
fn supports_emulation_features(
    features: &vk::PhysicalDeviceFeatures,
    v12: &vk::PhysicalDeviceVulkan12Features,
    v13: &vk::PhysicalDeviceVulkan13Features,
) -> bool {
    features.shader_int64 == vk::TRUE
        && v12.timeline_semaphore == vk::TRUE
        && v12.buffer_device_address == vk::TRUE
        && v12.descriptor_indexing == vk::TRUE
        && v12.runtime_descriptor_array == vk::TRUE
        && v12.descriptor_binding_partially_bound == vk::TRUE
        && v12.descriptor_binding_uniform_buffer_update_after_bind == vk::TRUE
        && v12.descriptor_binding_storage_buffer_update_after_bind == vk::TRUE
        && v12.descriptor_binding_sampled_image_update_after_bind == vk::TRUE
        && v12.descriptor_binding_storage_image_update_after_bind == vk::TRUE
        && v13.synchronization2 == vk::TRUE
}

unsafe fn has_extensions(instance: &ash::Instance, physical_device: vk::PhysicalDevice, wanted: &[&CStr]) -> bool {
    let Ok(available) = instance.enumerate_device_extension_properties(physical_device) else {
        return false;
    };
    wanted.iter().all(|name| {
        available
            .iter()
            .any(|ext| ext.extension_name_as_c_str().map(|n| n == *name).unwrap_or(false))
    })
}

/// Describe a physical device
unsafe fn probe_adapter(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> Candidate {
    let properties = instance.get_physical_device_properties(physical_device);
    let name = properties
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "Unknown adapter".to_string());

    let memory = instance.get_physical_device_memory_properties(physical_device);
    let dedicated_memory = memory.memory_heaps[..memory.memory_heap_count as usize]
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum();

    let queue_family = instance
        .get_physical_device_queue_family_properties(physical_device)
        .iter()
        .enumerate()
        .find(|(index, family)| {
            family.queue_flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
                && surface_loader
                    .get_physical_device_surface_support(physical_device, *index as u32, surface)
                    .unwrap_or(false)
        })
        .map(|(index, _)| index as u32);

    let mut v12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut v13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut v12).push_next(&mut v13);
    instance.get_physical_device_features2(physical_device, &mut features2);
    let features = features2.features;

    let supports_compute_emulation = properties.api_version >= vk::API_VERSION_1_3
        && queue_family.is_some()
        && supports_emulation_features(&features, &v12, &v13);

    let supports_native_raytracing = supports_compute_emulation
        && has_extensions(instance, physical_device, &NATIVE_RAYTRACING_EXTENSIONS)
        && {
            let mut acceleration = vk::PhysicalDeviceAccelerationStructureFeaturesKHR::default();
            let mut pipeline = vk::PhysicalDeviceRayTracingPipelineFeaturesKHR::default();
            let mut features2 = vk::PhysicalDeviceFeatures2::default()
                .push_next(&mut acceleration)
                .push_next(&mut pipeline);
            instance.get_physical_device_features2(physical_device, &mut features2);
            acceleration.acceleration_structure == vk::TRUE && pipeline.ray_tracing_pipeline == vk::TRUE
        };

    Candidate {
        physical_device,
        info: AdapterInfo {
            name,
            vendor_id: properties.vendor_id,
            device_id: properties.device_id,
            kind: adapter_kind_from_vk(properties.device_type),
            dedicated_memory,
            supports_native_raytracing,
            supports_compute_emulation,
        },
        queue_family,
    }
}

unsafe fn raytracing_properties(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> RaytracingProperties {
    let mut pipeline = vk::PhysicalDeviceRayTracingPipelinePropertiesKHR::default();
    let mut acceleration = vk::PhysicalDeviceAccelerationStructurePropertiesKHR::default();
    let mut properties2 = vk::PhysicalDeviceProperties2::default()
        .push_next(&mut pipeline)
        .push_next(&mut acceleration);
    instance.get_physical_device_properties2(physical_device, &mut properties2);
    RaytracingProperties {
        shader_group_handle_size: pipeline.shader_group_handle_size,
        shader_group_base_alignment: pipeline.shader_group_base_alignment,
        max_recursion_depth: pipeline.max_ray_recursion_depth,
        min_scratch_offset_alignment: acceleration.min_acceleration_structure_scratch_offset_alignment,
    }
}

/// Vulkan graphics device
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
    adapter: AdapterInfo,
    raytracing: Arc<dyn RaytracingBackend>,
}

impl VulkanGraphicsDevice {
    /// Create the device for `window`
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when Vulkan cannot be loaded, no adapter can ray
    /// trace, or the requested ray tracing path is unavailable.
    pub fn new(window: &Window, config: &RendererConfig) -> Result<Self> {
        config.validate()?;
        let enable_validation = cfg!(feature = "vulkan-validation") && config.enable_validation;
        if config.enable_validation && !enable_validation {
            engine_warn!(LOG_SOURCE, "Validation requested but the vulkan-validation feature is disabled");
        }

        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_error("Failed to load Vulkan", e))?;

            // Instance
            let app_info = vk::ApplicationInfo::default()
                .application_name(c"Prism")
                .application_version(vk::make_api_version(0, 0, 1, 0))
                .engine_name(c"Prism")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window
                .display_handle()
                .map_err(|e| init_error("Failed to get display handle", e))?;
            let window_handle = window
                .window_handle()
                .map_err(|e| init_error("Failed to get window handle", e))?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_error("Failed to get required extensions", e))?
                .to_vec();
            let layer_names = if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error("Failed to create instance", e))?;

            let (debug_utils_loader, debug_messenger) = if enable_validation {
                Self::create_debug_messenger(&entry, &instance)
            } else {
                (None, None)
            };

            // Adapters, probed against a temporary surface for present support
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_error("Failed to create surface", e))?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| init_error("Failed to enumerate physical devices", e))?;
            let candidates: Vec<Candidate> = physical_devices
                .into_iter()
                .map(|pd| probe_adapter(&instance, &surface_loader, surface, pd))
                .collect();
            surface_loader.destroy_surface(surface, None);

            for candidate in &candidates {
                engine_info!(LOG_SOURCE, "Adapter '{}' ({:?}, {} MiB): native={} emulated={}",
                    candidate.info.name, candidate.info.kind, candidate.info.dedicated_memory >> 20,
                    candidate.info.supports_native_raytracing, candidate.info.supports_compute_emulation);
            }

            let infos: Vec<AdapterInfo> = candidates.iter().map(|c| c.info.clone()).collect();
            let selected = select_adapter(&infos, config.preferred_adapter.as_deref())?;
            let candidate = &candidates[selected];
            let path = select_raytracing_path(&candidate.info, config.raytracing_path)?;
            let Some(queue_family) = candidate.queue_family else {
                engine_bail!(LOG_SOURCE, "Adapter '{}' has no graphics+compute queue that can present", candidate.info.name);
            };
            let physical_device = candidate.physical_device;
            let native = path == RaytracingPath::Native;
            engine_info!(LOG_SOURCE, "Using '{}' with {:?} ray tracing", candidate.info.name, path);

            // Logical device
            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)];

            let mut device_extension_names = vec![ash::khr::swapchain::NAME.as_ptr()];
            if native {
                device_extension_names.extend(NATIVE_RAYTRACING_EXTENSIONS.iter().map(|name| name.as_ptr()));
            }

            let mut v12 = vk::PhysicalDeviceVulkan12Features::default()
                .timeline_semaphore(true)
                .buffer_device_address(true)
                .descriptor_indexing(true)
                .runtime_descriptor_array(true)
                .descriptor_binding_partially_bound(true)
                .descriptor_binding_uniform_buffer_update_after_bind(true)
                .descriptor_binding_storage_buffer_update_after_bind(true)
                .descriptor_binding_sampled_image_update_after_bind(true)
                .descriptor_binding_storage_image_update_after_bind(true);
            let mut v13 = vk::PhysicalDeviceVulkan13Features::default().synchronization2(true);
            let mut acceleration_features =
                vk::PhysicalDeviceAccelerationStructureFeaturesKHR::default().acceleration_structure(true);
            let mut pipeline_features =
                vk::PhysicalDeviceRayTracingPipelineFeaturesKHR::default().ray_tracing_pipeline(true);
            let mut features2 = vk::PhysicalDeviceFeatures2::default()
                .features(vk::PhysicalDeviceFeatures::default().shader_int64(true))
                .push_next(&mut v12)
                .push_next(&mut v13);
            if native {
                features2 = features2.push_next(&mut acceleration_features).push_next(&mut pipeline_features);
            }

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .push_next(&mut features2);
            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_error("Failed to create device", e))?;
            let queue = device.get_device_queue(queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: true,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_error("Failed to create allocator", e))?;

            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| vk_err("Failed to create upload command pool", e))?;

            // Universal pipeline layout
            let resource_set_layout = create_resource_set_layout(&device, config.cbv_srv_uav_heap_capacity)?;
            let sampler_set_layout = create_sampler_set_layout(&device, config.sampler_heap_capacity)?;
            let mut root_table_stages = vk::ShaderStageFlags::COMPUTE;
            if native {
                root_table_stages |= vk::ShaderStageFlags::RAYGEN_KHR
                    | vk::ShaderStageFlags::MISS_KHR
                    | vk::ShaderStageFlags::CLOSEST_HIT_KHR
                    | vk::ShaderStageFlags::ANY_HIT_KHR;
            }
            let set_layouts = [resource_set_layout, sampler_set_layout];
            let push_constant_ranges = [vk::PushConstantRange::default()
                .stage_flags(root_table_stages)
                .offset(0)
                .size(ROOT_TABLE_SIZE)];
            let layout_info = vk::PipelineLayoutCreateInfo::default()
                .set_layouts(&set_layouts)
                .push_constant_ranges(&push_constant_ranges);
            let pipeline_layout = device
                .create_pipeline_layout(&layout_info, None)
                .map_err(|e| vk_err("Failed to create pipeline layout", e))?;

            let native_raytracing = native.then(|| {
                let properties = raytracing_properties(&instance, physical_device);
                engine_debug!(LOG_SOURCE, "Ray tracing properties: {:?}", properties);
                NativeRaytracingLoaders {
                    acceleration_structure: ash::khr::acceleration_structure::Device::new(&instance, &device),
                    ray_tracing_pipeline: ash::khr::ray_tracing_pipeline::Device::new(&instance, &device),
                    properties,
                }
            });

            let ctx = Arc::new(GpuContext::new(GpuContextParts {
                entry,
                instance,
                physical_device,
                device,
                allocator,
                queue,
                queue_family,
                upload_command_pool,
                resource_set_layout,
                sampler_set_layout,
                pipeline_layout,
                root_table_stages,
                resource_heap_capacity: config.cbv_srv_uav_heap_capacity,
                sampler_heap_capacity: config.sampler_heap_capacity,
                native_raytracing,
                debug_utils_loader,
                debug_messenger,
            }));

            let raytracing: Arc<dyn RaytracingBackend> = if native {
                Arc::new(NativeRaytracing::new(ctx.clone())?)
            } else {
                Arc::new(EmulatedRaytracing::new(ctx.clone()))
            };

            Ok(Self {
                ctx,
                adapter: candidate.info.clone(),
                raytracing,
            })
        }
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> (Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>) {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        crate::debug::init_validation();
        match loader.create_debug_utils_messenger(&crate::debug::messenger_create_info(), None) {
            Ok(messenger) => (Some(loader), Some(messenger)),
            Err(e) => {
                engine_warn!(LOG_SOURCE, "Failed to create debug messenger: {:?}", e);
                (None, None)
            }
        }
    }

    #[cfg(not(feature = "vulkan-validation"))]
    unsafe fn create_debug_messenger(
        _entry: &ash::Entry,
        _instance: &ash::Instance,
    ) -> (Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>) {
        (None, None)
    }

    /// Active ray tracing path
    pub fn path(&self) -> RaytracingPath {
        self.raytracing.path()
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter
    }

    fn raytracing(&self) -> Arc<dyn RaytracingBackend> {
        self.raytracing.clone()
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::new(self.ctx.clone(), desc)?))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(VulkanTexture::new(self.ctx.clone(), desc)?))
    }

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Arc<dyn DescriptorHeap>> {
        Ok(Arc::new(VulkanDescriptorHeap::new(self.ctx.clone(), desc)?))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::new(self.ctx.clone())?))
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>> {
        Ok(Arc::new(VulkanFence::new(self.ctx.clone(), initial_value)?))
    }

    fn create_swapchain(&self, window: &Window, desc: &SwapchainDesc) -> Result<Box<dyn Swapchain>> {
        Ok(Box::new(VulkanSwapchain::new(self.ctx.clone(), window, desc)?))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<dyn ComputePipeline>> {
        Ok(Arc::new(VulkanComputePipeline::new(self.ctx.clone(), desc)?))
    }

    fn create_raytracing_pipeline(&self, desc: &RaytracingPipelineDesc) -> Result<Arc<dyn RaytracingPipeline>> {
        let pipeline = match self.raytracing.path() {
            RaytracingPath::Native => VulkanRaytracingPipeline::new_native(self.ctx.clone(), desc)?,
            RaytracingPath::ComputeEmulated => VulkanRaytracingPipeline::new_emulated(self.ctx.clone(), desc)?,
        };
        Ok(Arc::new(pipeline))
    }

    fn execute_command_lists(&self, lists: &[&dyn CommandList], present: Option<&dyn Swapchain>) -> Result<()> {
        let mut buffer_infos = Vec::with_capacity(lists.len());
        for list in lists {
            if list.is_recording() {
                engine_bail!(LOG_SOURCE, "Cannot submit a command list that is still recording");
            }
            let command_buffer = vulkan_command_list(*list)?.command_buffer();
            buffer_infos.push(vk::CommandBufferSubmitInfo::default().command_buffer(command_buffer));
        }

        let mut wait_infos = Vec::new();
        let mut signal_infos = Vec::new();
        if let Some(swapchain) = present {
            let (acquire, render_finished) = vulkan_swapchain(swapchain)?.sync_info();
            wait_infos.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(acquire)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            );
            signal_infos.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(render_finished)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            );
        }

        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&buffer_infos)
            .signal_semaphore_infos(&signal_infos);
        let queue = self.ctx.queue()?;
        unsafe {
            self.ctx
                .device
                .queue_submit2(*queue, &[submit], vk::Fence::null())
                .map_err(|e| vk_err("Failed to submit command lists", e))
        }
    }

    fn signal(&self, fence: &dyn Fence, value: u64) -> Result<()> {
        let semaphore = vulkan_fence(fence)?.semaphore;
        let signal_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(semaphore)
            .value(value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let submit = vk::SubmitInfo2::default().signal_semaphore_infos(&signal_infos);
        let queue = self.ctx.queue()?;
        unsafe {
            self.ctx
                .device
                .queue_submit2(*queue, &[submit], vk::Fence::null())
                .map_err(|e| vk_err("Failed to signal fence", e))
        }
    }

    fn wait_idle(&self) -> Result<()> {
        let queue = self.ctx.queue()?;
        unsafe {
            self.ctx
                .device
                .queue_wait_idle(*queue)
                .map_err(|e| vk_err("Failed to wait for queue idle", e))
        }
    }
}
