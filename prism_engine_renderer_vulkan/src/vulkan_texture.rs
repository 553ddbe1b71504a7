/// VulkanTexture - Vulkan implementation of the Texture trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use prism_engine::prism::device::{Texture, TextureDesc, TextureFormat, TextureInfo, TextureUsage};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_trace, engine_warn};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{vk_err, GpuContext, LOG_SOURCE};
use crate::vulkan_format::{aspect_mask, resource_state_to_layout, texture_format_to_vk, texture_usage_to_vk};

/// Vulkan 2D texture with a single mip level
///
/// Owned textures hold their image and memory. Swapchain back buffers only
/// own their view; the image belongs to the swapchain.
pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    owns_image: bool,
    info: TextureInfo,
    name: String,
}

pub(crate) fn full_subresource_range(format: TextureFormat) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect_mask(format),
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn create_view(ctx: &GpuContext, image: vk::Image, format: TextureFormat) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(texture_format_to_vk(format))
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(full_subresource_range(format));
    unsafe {
        ctx.device
            .create_image_view(&create_info, None)
            .map_err(|e| vk_err("Failed to create image view", e))
    }
}

impl VulkanTexture {
    /// Create a texture and move it into `desc.initial_state`
    ///
    /// The initial layout transition is submitted and waited for before
    /// returning.
    pub fn new(ctx: Arc<GpuContext>, desc: &TextureDesc) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "Texture '{}' has invalid size {}x{}",
                desc.name, desc.width, desc.height
            )));
        }

        unsafe {
            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(texture_format_to_vk(desc.format))
                .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);
            let image = ctx
                .device
                .create_image(&image_info, None)
                .map_err(|e| vk_err(&format!("Failed to create image '{}'", desc.name), e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = ctx.allocator().and_then(|mut allocator| {
                allocator
                    .allocate(&AllocationCreateDesc {
                        name: &desc.name,
                        requirements,
                        location: MemoryLocation::GpuOnly,
                        linear: false,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| {
                        engine_warn!(LOG_SOURCE, "Failed to allocate texture '{}': {:?}", desc.name, e);
                        Error::OutOfMemory
                    })
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            let mut texture = Self {
                ctx: ctx.clone(),
                image,
                view: vk::ImageView::null(),
                allocation: None,
                owns_image: true,
                info: TextureInfo {
                    width: desc.width,
                    height: desc.height,
                    format: desc.format,
                    usage: desc.usage,
                },
                name: desc.name.clone(),
            };
            let (memory, offset) = (allocation.memory(), allocation.offset());
            texture.allocation = Some(allocation);
            ctx.device
                .bind_image_memory(image, memory, offset)
                .map_err(|e| vk_err("Failed to bind image memory", e))?;
            texture.view = create_view(&ctx, image, desc.format)?;

            let layout = resource_state_to_layout(desc.initial_state);
            let range = full_subresource_range(desc.format);
            ctx.submit_one_shot(|device, cb| {
                let barrier = vk::ImageMemoryBarrier2::default()
                    .src_stage_mask(vk::PipelineStageFlags2::NONE)
                    .src_access_mask(vk::AccessFlags2::NONE)
                    .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
                    .dst_access_mask(vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE)
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(layout)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(range);
                let barriers = [barrier];
                let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
                device.cmd_pipeline_barrier2(cb, &dependency);
            })?;

            engine_trace!(LOG_SOURCE, "Created texture '{}' {}x{} {:?} in {:?}",
                desc.name, desc.width, desc.height, desc.format, desc.initial_state);
            Ok(texture)
        }
    }

    /// Wrap a swapchain image
    pub(crate) fn from_swapchain_image(
        ctx: Arc<GpuContext>,
        image: vk::Image,
        format: TextureFormat,
        width: u32,
        height: u32,
        index: usize,
    ) -> Result<Self> {
        let view = create_view(&ctx, image, format)?;
        Ok(Self {
            ctx,
            image,
            view,
            allocation: None,
            owns_image: false,
            info: TextureInfo {
                width,
                height,
                format,
                usage: TextureUsage::TRANSFER_DST | TextureUsage::RENDER_TARGET,
            },
            name: format!("back_buffer_{}", index),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Texture for VulkanTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }
            if self.owns_image {
                self.ctx.device.destroy_image(self.image, None);
            }
        }
        if let Some(allocation) = self.allocation.take() {
            match self.ctx.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        engine_warn!(LOG_SOURCE, "Failed to free texture '{}': {:?}", self.name, e);
                    }
                }
                Err(_) => engine_warn!(LOG_SOURCE, "Leaking memory of texture '{}'", self.name),
            }
        }
    }
}

/// Downcast an engine texture to a Vulkan texture
pub(crate) fn vulkan_texture(texture: &dyn Texture) -> Result<&VulkanTexture> {
    texture
        .as_any()
        .downcast_ref::<VulkanTexture>()
        .ok_or_else(|| Error::InvalidResource("Texture was not created by the Vulkan device".to_string()))
}
