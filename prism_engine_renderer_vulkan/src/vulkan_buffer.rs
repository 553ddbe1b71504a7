/// VulkanBuffer - Vulkan implementation of the Buffer trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use prism_engine::prism::device::{
    AccelerationStructureKind, Buffer, BufferDesc, BufferUsage,
};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_err, engine_trace, engine_warn};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::{lock, vk_err, GpuContext, LOG_SOURCE};
use crate::vulkan_format::{buffer_usage_to_vk, memory_location_to_vk};

/// Base alignment of shader tables, scratch memory and acceleration structures
const RAYTRACING_BUFFER_ALIGNMENT: u64 = 256;

/// Vulkan buffer backed by a gpu-allocator allocation
///
/// CPU-visible buffers stay mapped for their whole lifetime. On the native ray
/// tracing path, acceleration structure storage also owns the
/// `VkAccelerationStructureKHR` living in it.
pub struct VulkanBuffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    desc: BufferDesc,
    /// Address reported to the engine (structure address for native structures)
    address: u64,
    pub(crate) acceleration_structure: Option<vk::AccelerationStructureKHR>,
}

impl VulkanBuffer {
    /// Create a buffer
    ///
    /// # Errors
    ///
    /// `InvalidResource` for zero-sized buffers, `OutOfMemory` when allocation fails.
    pub fn new(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        if desc.size == 0 {
            return Err(Error::InvalidResource(format!("Buffer '{}' has zero size", desc.name)));
        }

        let native = ctx.native_raytracing.is_some();
        let usage = buffer_usage_to_vk(desc.usage, native);

        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| vk_err(&format!("Failed to create buffer '{}'", desc.name), e))?;

            let mut requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let raytracing_usage = BufferUsage::SCRATCH
                | BufferUsage::SHADER_TABLE
                | BufferUsage::ACCELERATION_STRUCTURE_STORAGE;
            if desc.usage.intersects(raytracing_usage) {
                requirements.alignment = requirements.alignment.max(RAYTRACING_BUFFER_ALIGNMENT);
            }

            let allocation = ctx.allocator().and_then(|mut allocator| {
                allocator
                    .allocate(&AllocationCreateDesc {
                        name: &desc.name,
                        requirements,
                        location: memory_location_to_vk(desc.location),
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| {
                        engine_warn!(LOG_SOURCE, "Failed to allocate {} bytes for '{}': {:?}", desc.size, desc.name, e);
                        Error::OutOfMemory
                    })
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            // From here on, Drop releases whatever was created
            let mut created = Self {
                ctx: ctx.clone(),
                buffer,
                allocation: None,
                desc: desc.clone(),
                address: 0,
                acceleration_structure: None,
            };
            let (memory, offset) = (allocation.memory(), allocation.offset());
            created.allocation = Some(allocation);
            ctx.device
                .bind_buffer_memory(buffer, memory, offset)
                .map_err(|e| vk_err("Failed to bind buffer memory", e))?;
            created.address = ctx.buffer_address(buffer);

            if let (Some(kind), Some(native)) = (desc.acceleration_structure, ctx.native_raytracing.as_ref()) {
                let ty = match kind {
                    AccelerationStructureKind::BottomLevel => vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL,
                    AccelerationStructureKind::TopLevel => vk::AccelerationStructureTypeKHR::TOP_LEVEL,
                };
                let as_info = vk::AccelerationStructureCreateInfoKHR::default()
                    .buffer(buffer)
                    .offset(0)
                    .size(desc.size)
                    .ty(ty);
                let handle = native
                    .acceleration_structure
                    .create_acceleration_structure(&as_info, None)
                    .map_err(|e| vk_err("Failed to create acceleration structure", e))?;
                created.acceleration_structure = Some(handle);

                let address_info = vk::AccelerationStructureDeviceAddressInfoKHR::default()
                    .acceleration_structure(handle);
                created.address = native
                    .acceleration_structure
                    .get_acceleration_structure_device_address(&address_info);
            }

            engine_trace!(LOG_SOURCE, "Created buffer '{}' ({} bytes, {:?})", desc.name, desc.size, desc.location);
            Ok(created)
        }
    }

    /// Mapped bytes `[offset, offset + len)`, checked against the buffer bounds
    fn mapped_range(&self, offset: u64, len: usize, op: &str) -> Result<*mut u8> {
        if !self.desc.location.is_cpu_visible() {
            engine_bail!(LOG_SOURCE, "Cannot {} device-local buffer '{}'", op, self.desc.name);
        }
        let end = offset.checked_add(len as u64);
        if end.map_or(true, |end| end > self.desc.size) {
            return Err(Error::InvalidResource(format!(
                "{} of {} bytes at offset {} exceeds buffer '{}' ({} bytes)",
                op, len, offset, self.desc.name, self.desc.size
            )));
        }
        let base = self
            .allocation
            .as_ref()
            .and_then(|a| a.mapped_ptr())
            .ok_or_else(|| engine_err!(LOG_SOURCE, "Buffer '{}' is not mapped", self.desc.name))?;
        Ok(unsafe { (base.as_ptr() as *mut u8).add(offset as usize) })
    }
}

impl Buffer for VulkanBuffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn gpu_address(&self) -> u64 {
        self.address
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let dst = self.mapped_range(offset, data.len(), "write")?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let src = self.mapped_range(offset, out.len(), "read")?;
        unsafe {
            std::ptr::copy_nonoverlapping(src as *const u8, out.as_mut_ptr(), out.len());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if self.desc.acceleration_structure == Some(AccelerationStructureKind::BottomLevel) {
            if let Ok(mut bounds) = lock(&self.ctx.bottom_level_bounds, "Bottom-level bounds") {
                bounds.forget_storage(self.buffer);
            }
        }
        unsafe {
            if let (Some(handle), Some(native)) = (self.acceleration_structure, self.ctx.native_raytracing.as_ref()) {
                native.acceleration_structure.destroy_acceleration_structure(handle, None);
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            match self.ctx.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        engine_warn!(LOG_SOURCE, "Failed to free buffer '{}': {:?}", self.desc.name, e);
                    }
                }
                Err(_) => engine_warn!(LOG_SOURCE, "Leaking memory of buffer '{}'", self.desc.name),
            }
        }
    }
}

/// Downcast an engine buffer to a Vulkan buffer
pub(crate) fn vulkan_buffer(buffer: &dyn Buffer) -> Result<&VulkanBuffer> {
    buffer
        .as_any()
        .downcast_ref::<VulkanBuffer>()
        .ok_or_else(|| Error::InvalidResource(format!("Buffer '{}' was not created by the Vulkan device", buffer.desc().name)))
}
