//! Unit tests for Vulkan conversion functions
//!
//! Pure mappings between engine enums and Vulkan enums; no GPU required.

use super::*;

// ============================================================================
// TEXTURE FORMATS
// ============================================================================

#[test]
fn test_texture_formats_map_both_ways() {
    let formats = [
        TextureFormat::R8G8B8A8_UNORM,
        TextureFormat::B8G8R8A8_UNORM,
        TextureFormat::R32G32B32A32_SFLOAT,
        TextureFormat::D32_FLOAT,
    ];
    for format in formats {
        assert_eq!(vk_to_texture_format(texture_format_to_vk(format)), Some(format));
    }
}

#[test]
fn test_srgb_surface_formats_have_no_engine_equivalent() {
    assert_eq!(vk_to_texture_format(vk::Format::B8G8R8A8_SRGB), None);
    assert_eq!(vk_to_texture_format(vk::Format::R8G8B8A8_SRGB), None);
}

#[test]
fn test_depth_format_uses_depth_aspect() {
    assert_eq!(aspect_mask(TextureFormat::D32_FLOAT), vk::ImageAspectFlags::DEPTH);
    assert_eq!(aspect_mask(TextureFormat::R32G32B32A32_SFLOAT), vk::ImageAspectFlags::COLOR);
}

// ============================================================================
// BUFFER USAGE
// ============================================================================

#[test]
fn test_every_buffer_is_addressable() {
    let flags = buffer_usage_to_vk(BufferUsage::empty(), false);
    assert_eq!(flags, vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS);
}

#[test]
fn test_geometry_buffers_are_readable_as_storage() {
    let flags = buffer_usage_to_vk(BufferUsage::VERTEX | BufferUsage::INDEX, true);
    assert!(flags.contains(vk::BufferUsageFlags::VERTEX_BUFFER));
    assert!(flags.contains(vk::BufferUsageFlags::INDEX_BUFFER));
    assert!(flags.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
}

#[test]
fn test_native_raytracing_usage() {
    let usage = BufferUsage::ACCELERATION_STRUCTURE_INPUT
        | BufferUsage::ACCELERATION_STRUCTURE_STORAGE
        | BufferUsage::SHADER_TABLE;
    let flags = buffer_usage_to_vk(usage, true);
    assert!(flags.contains(vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR));
    assert!(flags.contains(vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR));
    assert!(flags.contains(vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR));
}

#[test]
fn test_emulated_raytracing_usage_avoids_extension_flags() {
    let usage = BufferUsage::ACCELERATION_STRUCTURE_INPUT
        | BufferUsage::ACCELERATION_STRUCTURE_STORAGE
        | BufferUsage::SHADER_TABLE;
    let flags = buffer_usage_to_vk(usage, false);
    assert!(!flags.contains(vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR));
    assert!(!flags.contains(vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR));
    assert!(flags.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
    // Structures are uploaded by copy
    assert!(flags.contains(vk::BufferUsageFlags::TRANSFER_DST));
}

#[test]
fn test_memory_locations() {
    assert_eq!(memory_location_to_vk(MemoryLocation::Default), gpu_allocator::MemoryLocation::GpuOnly);
    assert_eq!(memory_location_to_vk(MemoryLocation::Upload), gpu_allocator::MemoryLocation::CpuToGpu);
    assert_eq!(memory_location_to_vk(MemoryLocation::Readback), gpu_allocator::MemoryLocation::GpuToCpu);
}

#[test]
fn test_texture_usage() {
    let flags = texture_usage_to_vk(TextureUsage::STORAGE | TextureUsage::TRANSFER_SRC);
    assert_eq!(flags, vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_SRC);
    assert_eq!(texture_usage_to_vk(TextureUsage::RENDER_TARGET), vk::ImageUsageFlags::COLOR_ATTACHMENT);
}

// ============================================================================
// RESOURCE STATES
// ============================================================================

#[test]
fn test_copy_states_use_transfer_layouts() {
    assert_eq!(resource_state_to_layout(ResourceState::CopySource), vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    assert_eq!(resource_state_to_layout(ResourceState::CopyDest), vk::ImageLayout::TRANSFER_DST_OPTIMAL);
    assert_eq!(resource_state_to_access(ResourceState::CopyDest), vk::AccessFlags2::TRANSFER_WRITE);
}

#[test]
fn test_unordered_access_is_general() {
    assert_eq!(resource_state_to_layout(ResourceState::UnorderedAccess), vk::ImageLayout::GENERAL);
    let access = resource_state_to_access(ResourceState::UnorderedAccess);
    assert!(access.contains(vk::AccessFlags2::SHADER_STORAGE_WRITE));
}

#[test]
fn test_leaving_present_discards_contents() {
    assert_eq!(old_layout(ResourceState::Present), vk::ImageLayout::UNDEFINED);
    assert_eq!(resource_state_to_layout(ResourceState::Present), vk::ImageLayout::PRESENT_SRC_KHR);
    assert_eq!(old_layout(ResourceState::CopyDest), vk::ImageLayout::TRANSFER_DST_OPTIMAL);
}

#[test]
fn test_acceleration_structure_state_is_extension_free() {
    let access = resource_state_to_access(ResourceState::AccelerationStructure);
    assert_eq!(access, vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE);
}

// ============================================================================
// SAMPLERS, BUILD FLAGS, ADAPTERS, ERRORS
// ============================================================================

#[test]
fn test_sampler_modes() {
    assert_eq!(filter_to_vk(Filter::Nearest), vk::Filter::NEAREST);
    assert_eq!(mipmap_mode_to_vk(Filter::Linear), vk::SamplerMipmapMode::LINEAR);
    assert_eq!(address_mode_to_vk(AddressMode::Wrap), vk::SamplerAddressMode::REPEAT);
    assert_eq!(address_mode_to_vk(AddressMode::Mirror), vk::SamplerAddressMode::MIRRORED_REPEAT);
    assert_eq!(address_mode_to_vk(AddressMode::Clamp), vk::SamplerAddressMode::CLAMP_TO_EDGE);
}

#[test]
fn test_build_flags() {
    let flags = build_flags_to_vk(BuildFlags::PREFER_FAST_TRACE | BuildFlags::ALLOW_UPDATE);
    assert_eq!(
        flags,
        vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE
            | vk::BuildAccelerationStructureFlagsKHR::ALLOW_UPDATE
    );
    assert!(build_flags_to_vk(BuildFlags::empty()).is_empty());
}

#[test]
fn test_adapter_kinds() {
    assert_eq!(adapter_kind_from_vk(vk::PhysicalDeviceType::DISCRETE_GPU), AdapterKind::Discrete);
    assert_eq!(adapter_kind_from_vk(vk::PhysicalDeviceType::INTEGRATED_GPU), AdapterKind::Integrated);
    assert_eq!(adapter_kind_from_vk(vk::PhysicalDeviceType::CPU), AdapterKind::Cpu);
    assert_eq!(adapter_kind_from_vk(vk::PhysicalDeviceType::OTHER), AdapterKind::Other);
}

#[test]
fn test_error_mapping() {
    assert!(matches!(error_from_vk(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, "alloc"), Error::OutOfMemory));
    assert!(matches!(error_from_vk(vk::Result::ERROR_DEVICE_LOST, "submit"), Error::DeviceLost));
    match error_from_vk(vk::Result::ERROR_INITIALIZATION_FAILED, "create") {
        Error::BackendError(msg) => assert!(msg.starts_with("create")),
        other => panic!("unexpected error {:?}", other),
    }
}
