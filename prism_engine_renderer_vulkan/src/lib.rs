/*!
# Prism Engine - Vulkan Backend

Vulkan implementation of the `prism_engine` device traits, using Ash for the
Vulkan bindings and gpu-allocator for memory management.

Ray tracing runs natively through VK_KHR_acceleration_structure and
VK_KHR_ray_tracing_pipeline when the adapter supports them, and falls back to
CPU-built acceleration structures traced by compute shaders otherwise.

## Example

```no_run
use prism_engine::prism::RendererConfig;
use prism_engine_renderer_vulkan::prism::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> prism_engine::prism::Result<()> {
let device = VulkanGraphicsDevice::new(window, &RendererConfig::default())?;
# Ok(())
# }
```
*/

mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_descriptor_heap;
mod vulkan_command_list;
mod vulkan_fence;
mod vulkan_swapchain;
mod vulkan_pipeline;
mod vulkan_raytracing;
mod vulkan_device;

#[cfg(feature = "vulkan-validation")]
mod debug;

/// Vulkan backend namespace
pub mod prism {
    pub use crate::vulkan_device::VulkanGraphicsDevice;
    pub use crate::vulkan_context::{GpuContext, RaytracingProperties};
    pub use crate::vulkan_buffer::VulkanBuffer;
    pub use crate::vulkan_texture::VulkanTexture;
    pub use crate::vulkan_descriptor_heap::VulkanDescriptorHeap;
    pub use crate::vulkan_command_list::VulkanCommandList;
    pub use crate::vulkan_fence::VulkanFence;
    pub use crate::vulkan_swapchain::VulkanSwapchain;
    pub use crate::vulkan_pipeline::{VulkanComputePipeline, VulkanRaytracingPipeline};
    pub use crate::vulkan_raytracing::{
        EmulatedRaytracing, NativeRaytracing, EMULATION_EXTENT_SLOT, EMULATION_GROUP_SIZE,
        EMULATION_HIT_GROUP_SLOT, EMULATION_MISS_SLOT, EMULATION_RAY_GENERATION_SLOT,
    };

    // Validation statistics (only with the vulkan-validation feature)
    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
}
