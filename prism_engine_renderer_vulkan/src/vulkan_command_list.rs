/// VulkanCommandList - Vulkan implementation of the CommandList trait
///
/// Root arguments live in a 16 x u64 table that is pushed as push constants
/// of the universal pipeline layout right before every dispatch.

use ash::vk;
use prism_engine::prism::device::{
    BarrierResource, Buffer, CommandList, ComputePipeline, DescriptorHeap, DescriptorHeapKind,
    ResourceBarrier, RootArgument, Texture, MAX_ROOT_ARGUMENTS,
};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_error};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_buffer::vulkan_buffer;
use crate::vulkan_context::{vk_err, GpuContext, LOG_SOURCE};
use crate::vulkan_descriptor_heap::vulkan_heap;
use crate::vulkan_format::{old_layout, resource_state_to_access, resource_state_to_layout};
use crate::vulkan_pipeline::VulkanComputePipeline;
use crate::vulkan_texture::{full_subresource_range, vulkan_texture};

/// Vulkan command list: one command pool and one primary command buffer
pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    is_recording: bool,
    root_table: [u64; MAX_ROOT_ARGUMENTS as usize],
    /// Buffers referenced by recorded commands, released on the next `begin`
    retained: Vec<Arc<dyn Buffer>>,
}

impl VulkanCommandList {
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = ctx
                .device
                .create_command_pool(&pool_info, None)
                .map_err(|e| vk_err("Failed to create command pool", e))?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = match ctx.device.allocate_command_buffers(&alloc_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(vk_err("Failed to allocate command buffer", e));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer,
                is_recording: false,
                root_table: [0; MAX_ROOT_ARGUMENTS as usize],
                retained: Vec::new(),
            })
        }
    }

    /// Get the underlying Vulkan command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub(crate) fn ensure_recording(&self, operation: &str) -> Result<()> {
        if !self.is_recording {
            engine_bail!(LOG_SOURCE, "{}: command list is not recording", operation);
        }
        Ok(())
    }

    /// Keep a buffer alive until the list is reset
    pub(crate) fn retain(&mut self, buffer: Arc<dyn Buffer>) {
        self.retained.push(buffer);
    }

    pub(crate) fn root_table(&self) -> &[u64; MAX_ROOT_ARGUMENTS as usize] {
        &self.root_table
    }

    /// Bind the descriptor sets of the shader-visible heaps
    ///
    /// The resource heap goes to set 0 and the sampler heap to set 1, for
    /// compute and, when available, ray tracing pipelines.
    pub(crate) fn bind_descriptor_heaps(&mut self, heaps: &[&dyn DescriptorHeap]) -> Result<()> {
        self.ensure_recording("bind_descriptor_heaps")?;

        let mut sets = [vk::DescriptorSet::null(); 2];
        for heap in heaps {
            let first_set = match heap.desc().kind {
                DescriptorHeapKind::CbvSrvUav => 0,
                DescriptorHeapKind::Sampler => 1,
                other => {
                    return Err(Error::InvalidResource(format!("{:?} heaps are not shader-visible", other)));
                }
            };
            sets[first_set] = vulkan_heap(*heap)?
                .descriptor_set()
                .ok_or_else(|| Error::InvalidResource("Heap has no descriptor set".to_string()))?;
        }

        let mut bind_points = vec![vk::PipelineBindPoint::COMPUTE];
        if self.ctx.native_raytracing.is_some() {
            bind_points.push(vk::PipelineBindPoint::RAY_TRACING_KHR);
        }
        for bind_point in bind_points {
            for (index, &set) in sets.iter().enumerate() {
                if set == vk::DescriptorSet::null() {
                    continue;
                }
                unsafe {
                    self.ctx.device.cmd_bind_descriptor_sets(
                        self.command_buffer,
                        bind_point,
                        self.ctx.pipeline_layout,
                        index as u32,
                        &[set],
                        &[],
                    );
                }
            }
        }
        Ok(())
    }

    pub(crate) fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) -> Result<()> {
        self.ensure_recording("bind_pipeline")?;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(self.command_buffer, bind_point, pipeline);
        }
        Ok(())
    }

    /// Write a raw value into the root table
    pub(crate) fn set_root_value(&mut self, slot: u32, value: u64) -> Result<()> {
        self.ensure_recording("set_root_value")?;
        if slot >= MAX_ROOT_ARGUMENTS {
            engine_error!(LOG_SOURCE, "Root argument slot {} out of range", slot);
            return Err(Error::InvalidResource(format!("Root argument slot {} out of range", slot)));
        }
        self.root_table[slot as usize] = value;
        Ok(())
    }

    /// Push the whole root table
    pub(crate) fn push_root_table(&mut self) {
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                self.ctx.pipeline_layout,
                self.ctx.root_table_stages,
                0,
                bytemuck::cast_slice(&self.root_table),
            );
        }
    }

    fn buffer_barrier<'a>(
        buffer: &'a dyn Buffer,
        src_access: vk::AccessFlags2,
        dst_access: vk::AccessFlags2,
    ) -> Result<vk::BufferMemoryBarrier2<'a>> {
        Ok(vk::BufferMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .src_access_mask(src_access)
            .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(vulkan_buffer(buffer)?.buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE))
    }

    fn image_barrier<'a>(
        texture: &'a dyn Texture,
        src_access: vk::AccessFlags2,
        dst_access: vk::AccessFlags2,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> Result<vk::ImageMemoryBarrier2<'a>> {
        Ok(vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .src_access_mask(src_access)
            .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .dst_access_mask(dst_access)
            .old_layout(old)
            .new_layout(new)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(vulkan_texture(texture)?.image)
            .subresource_range(full_subresource_range(texture.info().format)))
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            engine_bail!(LOG_SOURCE, "Command list already recording");
        }
        unsafe {
            self.ctx
                .device
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| vk_err("Failed to reset command pool", e))?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| vk_err("Failed to begin command buffer", e))?;
        }
        self.retained.clear();
        self.root_table = [0; MAX_ROOT_ARGUMENTS as usize];
        self.is_recording = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_recording("end")?;
        self.is_recording = false;
        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| vk_err("Failed to end command buffer", e))
        }
    }

    fn is_recording(&self) -> bool {
        self.is_recording
    }

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier<'_>]) -> Result<()> {
        self.ensure_recording("resource_barrier")?;

        let mut buffer_barriers = Vec::new();
        let mut image_barriers = Vec::new();
        for barrier in barriers {
            match *barrier {
                ResourceBarrier::Transition { resource: BarrierResource::Buffer(buffer), before, after } => {
                    buffer_barriers.push(Self::buffer_barrier(
                        buffer,
                        resource_state_to_access(before),
                        resource_state_to_access(after),
                    )?);
                }
                ResourceBarrier::Transition { resource: BarrierResource::Texture(texture), before, after } => {
                    image_barriers.push(Self::image_barrier(
                        texture,
                        resource_state_to_access(before),
                        resource_state_to_access(after),
                        old_layout(before),
                        resource_state_to_layout(after),
                    )?);
                }
                ResourceBarrier::UnorderedAccess { resource: BarrierResource::Buffer(buffer) } => {
                    buffer_barriers.push(Self::buffer_barrier(
                        buffer,
                        vk::AccessFlags2::MEMORY_WRITE,
                        vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
                    )?);
                }
                ResourceBarrier::UnorderedAccess { resource: BarrierResource::Texture(texture) } => {
                    image_barriers.push(Self::image_barrier(
                        texture,
                        vk::AccessFlags2::MEMORY_WRITE,
                        vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
                        vk::ImageLayout::GENERAL,
                        vk::ImageLayout::GENERAL,
                    )?);
                }
            }
        }

        let dependency = vk::DependencyInfo::default()
            .buffer_memory_barriers(&buffer_barriers)
            .image_memory_barriers(&image_barriers);
        unsafe {
            self.ctx.device.cmd_pipeline_barrier2(self.command_buffer, &dependency);
        }
        Ok(())
    }

    fn copy_buffer(&mut self, dst: &dyn Buffer, src: &dyn Buffer) -> Result<()> {
        if dst.size() != src.size() {
            return Err(Error::InvalidResource(format!(
                "copy_buffer: '{}' is {} bytes but '{}' is {} bytes",
                src.desc().name, src.size(), dst.desc().name, dst.size()
            )));
        }
        self.copy_buffer_region(dst, 0, src, 0, src.size())
    }

    fn copy_buffer_region(
        &mut self,
        dst: &dyn Buffer,
        dst_offset: u64,
        src: &dyn Buffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.ensure_recording("copy_buffer_region")?;
        if src_offset + size > src.size() || dst_offset + size > dst.size() {
            return Err(Error::InvalidResource(format!(
                "copy_buffer_region: {} bytes from '{}'+{} to '{}'+{} out of bounds",
                size, src.desc().name, src_offset, dst.desc().name, dst_offset
            )));
        }
        let region = vk::BufferCopy { src_offset, dst_offset, size };
        unsafe {
            self.ctx.device.cmd_copy_buffer(
                self.command_buffer,
                vulkan_buffer(src)?.buffer,
                vulkan_buffer(dst)?.buffer,
                &[region],
            );
        }
        Ok(())
    }

    fn copy_texture(&mut self, dst: &dyn Texture, src: &dyn Texture) -> Result<()> {
        self.ensure_recording("copy_texture")?;
        let (src_info, dst_info) = (src.info(), dst.info());
        if (src_info.width, src_info.height) != (dst_info.width, dst_info.height) {
            return Err(Error::InvalidResource(format!(
                "copy_texture: {}x{} into {}x{}",
                src_info.width, src_info.height, dst_info.width, dst_info.height
            )));
        }

        let src_image = vulkan_texture(src)?.image;
        let dst_image = vulkan_texture(dst)?.image;
        let subresource = |format| vk::ImageSubresourceLayers {
            aspect_mask: crate::vulkan_format::aspect_mask(format),
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };

        unsafe {
            if src_info.format == dst_info.format {
                let region = vk::ImageCopy {
                    src_subresource: subresource(src_info.format),
                    src_offset: vk::Offset3D::default(),
                    dst_subresource: subresource(dst_info.format),
                    dst_offset: vk::Offset3D::default(),
                    extent: vk::Extent3D { width: src_info.width, height: src_info.height, depth: 1 },
                };
                self.ctx.device.cmd_copy_image(
                    self.command_buffer,
                    src_image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    dst_image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            } else {
                // A same-size blit converts between formats (e.g. RGBA to BGRA)
                let corner = vk::Offset3D { x: src_info.width as i32, y: src_info.height as i32, z: 1 };
                let region = vk::ImageBlit {
                    src_subresource: subresource(src_info.format),
                    src_offsets: [vk::Offset3D::default(), corner],
                    dst_subresource: subresource(dst_info.format),
                    dst_offsets: [vk::Offset3D::default(), corner],
                };
                self.ctx.device.cmd_blit_image(
                    self.command_buffer,
                    src_image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    dst_image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                    vk::Filter::NEAREST,
                );
            }
        }
        Ok(())
    }

    fn copy_buffer_to_texture(&mut self, dst: &dyn Texture, src: &dyn Buffer) -> Result<()> {
        self.ensure_recording("copy_buffer_to_texture")?;
        let info = dst.info();
        if src.size() < info.byte_size() {
            return Err(Error::InvalidResource(format!(
                "copy_buffer_to_texture: '{}' holds {} bytes, texture needs {}",
                src.desc().name, src.size(), info.byte_size()
            )));
        }
        let region = texture_region(info.width, info.height, info.format);
        unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                vulkan_buffer(src)?.buffer,
                vulkan_texture(dst)?.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }

    fn copy_texture_to_buffer(&mut self, dst: &dyn Buffer, src: &dyn Texture) -> Result<()> {
        self.ensure_recording("copy_texture_to_buffer")?;
        let info = src.info();
        if dst.size() < info.byte_size() {
            return Err(Error::InvalidResource(format!(
                "copy_texture_to_buffer: '{}' holds {} bytes, texture needs {}",
                dst.desc().name, dst.size(), info.byte_size()
            )));
        }
        let region = texture_region(info.width, info.height, info.format);
        unsafe {
            self.ctx.device.cmd_copy_image_to_buffer(
                self.command_buffer,
                vulkan_texture(src)?.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vulkan_buffer(dst)?.buffer,
                &[region],
            );
        }
        Ok(())
    }

    fn set_compute_pipeline(&mut self, pipeline: &dyn ComputePipeline) -> Result<()> {
        let vk_pipeline = pipeline
            .as_any()
            .downcast_ref::<VulkanComputePipeline>()
            .ok_or_else(|| Error::InvalidResource(format!("Pipeline '{}' is not a Vulkan pipeline", pipeline.name())))?;
        self.bind_pipeline(vk::PipelineBindPoint::COMPUTE, vk_pipeline.pipeline)
    }

    fn set_compute_root_argument(&mut self, slot: u32, argument: RootArgument) -> Result<()> {
        self.set_root_value(slot, argument.raw())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.ensure_recording("dispatch")?;
        self.push_root_table();
        unsafe {
            self.ctx.device.cmd_dispatch(self.command_buffer, x, y, z);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its command buffer
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Tightly packed copy region covering a whole texture
fn texture_region(width: u32, height: u32, format: prism_engine::prism::device::TextureFormat) -> vk::BufferImageCopy {
    vk::BufferImageCopy {
        buffer_offset: 0,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: crate::vulkan_format::aspect_mask(format),
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D::default(),
        image_extent: vk::Extent3D { width, height, depth: 1 },
    }
}

/// Downcast an engine command list to a Vulkan command list
pub(crate) fn vulkan_command_list(cmd: &dyn CommandList) -> Result<&VulkanCommandList> {
    cmd.as_any()
        .downcast_ref::<VulkanCommandList>()
        .ok_or_else(|| Error::InvalidResource("Command list was not created by the Vulkan device".to_string()))
}

pub(crate) fn vulkan_command_list_mut(cmd: &mut dyn CommandList) -> Result<&mut VulkanCommandList> {
    cmd.as_any_mut()
        .downcast_mut::<VulkanCommandList>()
        .ok_or_else(|| Error::InvalidResource("Command list was not created by the Vulkan device".to_string()))
}
