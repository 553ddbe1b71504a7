/// Conversions between engine enums and Vulkan enums
///
/// Pure functions, tested without a GPU.

use ash::vk;
use prism_engine::prism::device::{
    AddressMode, BufferUsage, BuildFlags, Filter, MemoryLocation, ResourceState, TextureFormat,
    TextureUsage,
};
use prism_engine::prism::{AdapterKind, Error};

pub fn texture_format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::D32_FLOAT => vk::Format::D32_SFLOAT,
    }
}

/// Engine format of a Vulkan format, None when the engine has no equivalent
pub fn vk_to_texture_format(format: vk::Format) -> Option<TextureFormat> {
    match format {
        vk::Format::R8G8B8A8_UNORM => Some(TextureFormat::R8G8B8A8_UNORM),
        vk::Format::B8G8R8A8_UNORM => Some(TextureFormat::B8G8R8A8_UNORM),
        vk::Format::R32G32B32A32_SFLOAT => Some(TextureFormat::R32G32B32A32_SFLOAT),
        vk::Format::D32_SFLOAT => Some(TextureFormat::D32_FLOAT),
        _ => None,
    }
}

pub fn aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    match format {
        TextureFormat::D32_FLOAT => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Vulkan usage of a buffer
///
/// Every buffer is addressable from shaders. On the emulated ray tracing path
/// acceleration structures and shader tables are plain storage buffers.
pub fn buffer_usage_to_vk(usage: BufferUsage, native_raytracing: bool) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;

    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::CONSTANT) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.intersects(BufferUsage::STORAGE | BufferUsage::SCRATCH) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }

    if native_raytracing {
        if usage.contains(BufferUsage::ACCELERATION_STRUCTURE_INPUT) {
            flags |= vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR;
        }
        if usage.contains(BufferUsage::ACCELERATION_STRUCTURE_STORAGE) {
            flags |= vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR;
        }
        if usage.contains(BufferUsage::SHADER_TABLE) {
            flags |= vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR;
        }
    } else {
        if usage.intersects(BufferUsage::ACCELERATION_STRUCTURE_INPUT | BufferUsage::SHADER_TABLE) {
            flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
        }
        if usage.contains(BufferUsage::ACCELERATION_STRUCTURE_STORAGE) {
            // Filled by copies from a host-built staging buffer
            flags |= vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST;
        }
    }

    flags
}

pub fn memory_location_to_vk(location: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match location {
        MemoryLocation::Default => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::Upload => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryLocation::Readback => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

pub fn texture_usage_to_vk(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(TextureUsage::RENDER_TARGET) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    flags
}

/// Image layout a texture has in a given state
pub fn resource_state_to_layout(state: ResourceState) -> vk::ImageLayout {
    match state {
        ResourceState::Common
        | ResourceState::GenericRead
        | ResourceState::UnorderedAccess
        | ResourceState::AccelerationStructure => vk::ImageLayout::GENERAL,
        ResourceState::CopySource => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ResourceState::CopyDest => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ResourceState::ShaderResource => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ResourceState::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ResourceState::Present => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

/// Layout to transition a texture out of
///
/// Back buffers leave `Present` with their contents discarded: they are
/// either freshly acquired or fully overwritten every frame.
pub fn old_layout(state: ResourceState) -> vk::ImageLayout {
    match state {
        ResourceState::Present => vk::ImageLayout::UNDEFINED,
        other => resource_state_to_layout(other),
    }
}

/// Memory accesses performed on a resource in a given state
///
/// Acceleration structures map to generic memory access so that the same
/// barriers are valid with and without the ray tracing extensions.
pub fn resource_state_to_access(state: ResourceState) -> vk::AccessFlags2 {
    match state {
        ResourceState::Common | ResourceState::AccelerationStructure => {
            vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE
        }
        ResourceState::CopySource => vk::AccessFlags2::TRANSFER_READ,
        ResourceState::CopyDest => vk::AccessFlags2::TRANSFER_WRITE,
        ResourceState::GenericRead => vk::AccessFlags2::MEMORY_READ,
        ResourceState::UnorderedAccess => {
            vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE
        }
        ResourceState::ShaderResource => vk::AccessFlags2::SHADER_SAMPLED_READ | vk::AccessFlags2::SHADER_STORAGE_READ,
        ResourceState::RenderTarget => {
            vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
        }
        ResourceState::Present => vk::AccessFlags2::NONE,
    }
}

pub fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn mipmap_mode_to_vk(filter: Filter) -> vk::SamplerMipmapMode {
    match filter {
        Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Wrap => vk::SamplerAddressMode::REPEAT,
        AddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
    }
}

pub fn build_flags_to_vk(flags: BuildFlags) -> vk::BuildAccelerationStructureFlagsKHR {
    let mut vk_flags = vk::BuildAccelerationStructureFlagsKHR::empty();
    if flags.contains(BuildFlags::PREFER_FAST_TRACE) {
        vk_flags |= vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE;
    }
    if flags.contains(BuildFlags::PREFER_FAST_BUILD) {
        vk_flags |= vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_BUILD;
    }
    if flags.contains(BuildFlags::ALLOW_UPDATE) {
        vk_flags |= vk::BuildAccelerationStructureFlagsKHR::ALLOW_UPDATE;
    }
    vk_flags
}

pub fn adapter_kind_from_vk(device_type: vk::PhysicalDeviceType) -> AdapterKind {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => AdapterKind::Discrete,
        vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterKind::Integrated,
        vk::PhysicalDeviceType::VIRTUAL_GPU => AdapterKind::Virtual,
        vk::PhysicalDeviceType::CPU => AdapterKind::Cpu,
        _ => AdapterKind::Other,
    }
}

/// Engine error for a failed Vulkan call
pub fn error_from_vk(result: vk::Result, what: &str) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => Error::OutOfMemory,
        vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost,
        other => Error::BackendError(format!("{}: {:?}", what, other)),
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
