/// VulkanFence - Fence trait on top of a timeline semaphore

use ash::vk;
use prism_engine::prism::device::Fence;
use prism_engine::prism::{Error, Result};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{vk_err, GpuContext};

pub struct VulkanFence {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl VulkanFence {
    pub fn new(ctx: Arc<GpuContext>, initial_value: u64) -> Result<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
        let semaphore = unsafe {
            ctx.device
                .create_semaphore(&create_info, None)
                .map_err(|e| vk_err("Failed to create timeline semaphore", e))?
        };
        Ok(Self { ctx, semaphore })
    }
}

impl Fence for VulkanFence {
    fn completed_value(&self) -> Result<u64> {
        unsafe {
            self.ctx
                .device
                .get_semaphore_counter_value(self.semaphore)
                .map_err(|e| vk_err("Failed to read timeline semaphore", e))
        }
    }

    fn wait(&self, value: u64) -> Result<()> {
        if self.completed_value()? >= value {
            return Ok(());
        }
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        unsafe {
            self.ctx
                .device
                .wait_semaphores(&wait_info, u64::MAX)
                .map_err(|e| vk_err("Failed to wait for timeline semaphore", e))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Downcast an engine fence to a Vulkan fence
pub(crate) fn vulkan_fence(fence: &dyn Fence) -> Result<&VulkanFence> {
    fence
        .as_any()
        .downcast_ref::<VulkanFence>()
        .ok_or_else(|| Error::InvalidResource("Fence was not created by the Vulkan device".to_string()))
}
