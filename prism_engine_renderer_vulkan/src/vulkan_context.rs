/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Contains everything a resource needs after creation:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - The single queue, behind a mutex (vkQueue* calls need external sync)
/// - The universal pipeline layout and the bindless set layouts
/// - Ray tracing extension loaders when the native path is active

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_debug, engine_err, engine_error, engine_warn};
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

use crate::vulkan_format::error_from_vk;
use crate::vulkan_raytracing::BottomLevelBounds;

/// Log source of the Vulkan backend
pub(crate) const LOG_SOURCE: &str = "prism::vulkan";

/// Limits of the native ray tracing implementation
#[derive(Debug, Clone, Copy)]
pub struct RaytracingProperties {
    pub shader_group_handle_size: u32,
    pub shader_group_base_alignment: u32,
    pub max_recursion_depth: u32,
    pub min_scratch_offset_alignment: u32,
}

/// Extension loaders of the native ray tracing path
pub(crate) struct NativeRaytracingLoaders {
    pub acceleration_structure: ash::khr::acceleration_structure::Device,
    pub ray_tracing_pipeline: ash::khr::ray_tracing_pipeline::Device,
    pub properties: RaytracingProperties,
}

/// Shared GPU context for all Vulkan resources.
///
/// Every resource holds an `Arc<GpuContext>`, so the device and instance are
/// destroyed only after the last resource is gone.
pub struct GpuContext {
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,

    /// Wrapped in ManuallyDrop to free every memory block BEFORE the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    queue: Mutex<vk::Queue>,
    pub(crate) queue_family: u32,

    /// Reusable command pool for one-shot operations
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    upload_command_pool: Mutex<vk::CommandPool>,

    /// Set 0: bindless CBV/SRV/UAV heap
    pub(crate) resource_set_layout: vk::DescriptorSetLayout,
    /// Set 1: sampler heap
    pub(crate) sampler_set_layout: vk::DescriptorSetLayout,
    /// Shared by every compute and ray tracing pipeline
    pub(crate) pipeline_layout: vk::PipelineLayout,
    /// Stages the root table push constants are visible to
    pub(crate) root_table_stages: vk::ShaderStageFlags,
    /// Descriptor counts baked into the set layouts
    pub(crate) resource_heap_capacity: u32,
    pub(crate) sampler_heap_capacity: u32,

    pub(crate) native_raytracing: Option<NativeRaytracingLoaders>,
    /// Bounds of the emulated bottom-level structures, pruned as their buffers drop
    pub(crate) bottom_level_bounds: Mutex<BottomLevelBounds>,

    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

/// Everything needed to assemble a `GpuContext`
pub(crate) struct GpuContextParts {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub allocator: Allocator,
    pub queue: vk::Queue,
    pub queue_family: u32,
    pub upload_command_pool: vk::CommandPool,
    pub resource_set_layout: vk::DescriptorSetLayout,
    pub sampler_set_layout: vk::DescriptorSetLayout,
    pub pipeline_layout: vk::PipelineLayout,
    pub root_table_stages: vk::ShaderStageFlags,
    pub resource_heap_capacity: u32,
    pub sampler_heap_capacity: u32,
    pub native_raytracing: Option<NativeRaytracingLoaders>,
    pub debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

/// Lock a mutex, turning poisoning into a backend error
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| engine_err!(LOG_SOURCE, "{} mutex poisoned", what))
}

/// Log a failed Vulkan call and convert its result code
pub(crate) fn vk_err(what: &str, result: vk::Result) -> Error {
    engine_error!(LOG_SOURCE, "{}: {:?}", what, result);
    error_from_vk(result, what)
}

impl GpuContext {
    pub(crate) fn new(parts: GpuContextParts) -> Self {
        Self {
            entry: parts.entry,
            instance: parts.instance,
            physical_device: parts.physical_device,
            device: parts.device,
            allocator: ManuallyDrop::new(Mutex::new(parts.allocator)),
            queue: Mutex::new(parts.queue),
            queue_family: parts.queue_family,
            upload_command_pool: Mutex::new(parts.upload_command_pool),
            resource_set_layout: parts.resource_set_layout,
            sampler_set_layout: parts.sampler_set_layout,
            pipeline_layout: parts.pipeline_layout,
            root_table_stages: parts.root_table_stages,
            resource_heap_capacity: parts.resource_heap_capacity,
            sampler_heap_capacity: parts.sampler_heap_capacity,
            native_raytracing: parts.native_raytracing,
            bottom_level_bounds: Mutex::new(BottomLevelBounds::default()),
            debug_utils_loader: parts.debug_utils_loader,
            debug_messenger: parts.debug_messenger,
        }
    }

    /// Lock the queue for a submission or present
    pub(crate) fn queue(&self) -> Result<MutexGuard<'_, vk::Queue>> {
        lock(&self.queue, "Queue")
    }

    pub(crate) fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        lock(&self.allocator, "Allocator")
    }

    /// Native ray tracing loaders, or an error on the emulated path
    pub(crate) fn native_raytracing(&self) -> Result<&NativeRaytracingLoaders> {
        self.native_raytracing
            .as_ref()
            .ok_or_else(|| engine_err!(LOG_SOURCE, "Native ray tracing is not enabled on this device"))
    }

    /// Device address of a buffer created with SHADER_DEVICE_ADDRESS usage
    pub(crate) fn buffer_address(&self, buffer: vk::Buffer) -> u64 {
        let info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
        unsafe { self.device.get_buffer_device_address(&info) }
    }

    /// Record commands into a temporary command buffer, submit them and wait
    ///
    /// Used for work that must be finished before a resource is handed out,
    /// such as the initial layout transition of a texture.
    pub(crate) fn submit_one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let pool = lock(&self.upload_command_pool, "Upload command pool")?;
        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| vk_err("Failed to allocate one-shot command buffer", e))?[0];

            let result = self.record_and_wait(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn record_and_wait<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| vk_err("Failed to begin one-shot command buffer", e))?;
        record(&self.device, command_buffer);
        self.device
            .end_command_buffer(command_buffer)
            .map_err(|e| vk_err("Failed to end one-shot command buffer", e))?;

        let fence = self
            .device
            .create_fence(&vk::FenceCreateInfo::default(), None)
            .map_err(|e| vk_err("Failed to create one-shot fence", e))?;

        let buffer_infos = [vk::CommandBufferSubmitInfo::default().command_buffer(command_buffer)];
        let submit = vk::SubmitInfo2::default().command_buffer_infos(&buffer_infos);
        let submitted = self.queue().and_then(|queue| {
            self.device
                .queue_submit2(*queue, &[submit], fence)
                .map_err(|e| vk_err("Failed to submit one-shot command buffer", e))
        });
        let waited = submitted.and_then(|_| {
            self.device
                .wait_for_fences(&[fence], true, u64::MAX)
                .map_err(|e| vk_err("Failed to wait for one-shot fence", e))
        });
        self.device.destroy_fence(fence, None);
        waited
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                engine_warn!(LOG_SOURCE, "device_wait_idle failed during shutdown: {:?}", e);
            }

            // 1. Objects owned by the context
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.destroy_descriptor_set_layout(self.resource_set_layout, None);
            self.device.destroy_descriptor_set_layout(self.sampler_set_layout, None);
            if let Ok(pool) = self.upload_command_pool.get_mut() {
                self.device.destroy_command_pool(*pool, None);
            }

            // 2. Free VkDeviceMemory blocks BEFORE destroying the device
            ManuallyDrop::drop(&mut self.allocator);

            // 3. Stop forwarding validation messages, then destroy the messenger
            #[cfg(feature = "vulkan-validation")]
            crate::debug::shutdown_validation();
            if let (Some(debug_utils), Some(messenger)) =
                (&self.debug_utils_loader, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            // 4. Device and instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        engine_debug!(LOG_SOURCE, "Vulkan device destroyed");
    }
}
