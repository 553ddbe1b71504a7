/// Ray tracing backends of the Vulkan device
///
/// `NativeRaytracing` drives VK_KHR_acceleration_structure and
/// VK_KHR_ray_tracing_pipeline. `EmulatedRaytracing` builds acceleration
/// structures on the CPU, uploads them with a copy, and traces rays with the
/// pipeline's emulation compute shader.

use ash::vk;
use prism_engine::prism::acceleration::bvh::{
    bottom_level_size, encode_bottom_level, encode_top_level, read_positions, top_level_size,
};
use prism_engine::prism::acceleration::{Aabb, WrappedPointer};
use prism_engine::prism::device::{
    AccelerationStructureBuild, AccelerationStructureInputs, Buffer, BufferDesc, BufferUsage, CommandList,
    DescriptorHeap, DispatchRaysDesc, MemoryLocation, PrebuildInfo, RaytracingBackend, RaytracingPath,
    RaytracingPipeline, TriangleGeometry, MAX_ROOT_ARGUMENTS,
};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_error, engine_trace};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::vulkan_buffer::{vulkan_buffer, VulkanBuffer};
use crate::vulkan_command_list::vulkan_command_list_mut;
use crate::vulkan_context::{lock, GpuContext, LOG_SOURCE};
use crate::vulkan_format::build_flags_to_vk;
use crate::vulkan_pipeline::{vulkan_raytracing_pipeline, EMULATION_RESERVED_SLOTS};

/// Thread group edge of the emulation compute shader
pub const EMULATION_GROUP_SIZE: u32 = 8;

/// Root slots written by an emulated dispatch
pub const EMULATION_RAY_GENERATION_SLOT: u32 = MAX_ROOT_ARGUMENTS - EMULATION_RESERVED_SLOTS;
pub const EMULATION_MISS_SLOT: u32 = EMULATION_RAY_GENERATION_SLOT + 1;
pub const EMULATION_HIT_GROUP_SLOT: u32 = EMULATION_RAY_GENERATION_SLOT + 2;
/// Packed `width | height << 32`
pub const EMULATION_EXTENT_SLOT: u32 = EMULATION_RAY_GENERATION_SLOT + 3;

fn bind_descriptor_heaps(cmd: &mut dyn CommandList, heaps: &[&dyn DescriptorHeap]) -> Result<()> {
    vulkan_command_list_mut(cmd)?.bind_descriptor_heaps(heaps)
}

fn set_top_level(cmd: &mut dyn CommandList, slot: u32, tlas: WrappedPointer) -> Result<()> {
    vulkan_command_list_mut(cmd)?.set_root_value(slot, tlas.encode())
}

// ============================================================================
// Native path
// ============================================================================

pub struct NativeRaytracing {
    ctx: Arc<GpuContext>,
}

/// Geometry descriptions and build ranges of a build
struct NativeGeometry {
    geometries: Vec<vk::AccelerationStructureGeometryKHR<'static>>,
    ranges: Vec<vk::AccelerationStructureBuildRangeInfoKHR>,
    primitive_counts: Vec<u32>,
    ty: vk::AccelerationStructureTypeKHR,
    flags: vk::BuildAccelerationStructureFlagsKHR,
}

fn triangles(geometry: &TriangleGeometry<'_>) -> vk::AccelerationStructureGeometryKHR<'static> {
    let triangles = vk::AccelerationStructureGeometryTrianglesDataKHR::default()
        .vertex_format(vk::Format::R32G32B32_SFLOAT)
        .vertex_data(vk::DeviceOrHostAddressConstKHR {
            device_address: geometry.vertex_buffer.gpu_address() + geometry.vertex_offset,
        })
        .vertex_stride(geometry.vertex_stride)
        .max_vertex(geometry.vertex_count.saturating_sub(1))
        .index_type(vk::IndexType::UINT32)
        .index_data(vk::DeviceOrHostAddressConstKHR {
            device_address: geometry.index_buffer.gpu_address() + geometry.index_offset,
        });
    let flags = if geometry.opaque {
        vk::GeometryFlagsKHR::OPAQUE
    } else {
        vk::GeometryFlagsKHR::empty()
    };
    vk::AccelerationStructureGeometryKHR::default()
        .geometry_type(vk::GeometryTypeKHR::TRIANGLES)
        .geometry(vk::AccelerationStructureGeometryDataKHR { triangles })
        .flags(flags)
}

impl NativeGeometry {
    fn new(inputs: &AccelerationStructureInputs<'_>) -> Self {
        match *inputs {
            AccelerationStructureInputs::Triangles { geometry, flags } => {
                let counts: Vec<u32> = geometry.iter().map(TriangleGeometry::triangle_count).collect();
                Self {
                    geometries: geometry.iter().map(triangles).collect(),
                    ranges: counts
                        .iter()
                        .map(|&count| vk::AccelerationStructureBuildRangeInfoKHR::default().primitive_count(count))
                        .collect(),
                    primitive_counts: counts,
                    ty: vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL,
                    flags: build_flags_to_vk(flags),
                }
            }
            AccelerationStructureInputs::Instances { instance_buffer, instances, flags } => {
                let data = vk::AccelerationStructureGeometryInstancesDataKHR::default()
                    .array_of_pointers(false)
                    .data(vk::DeviceOrHostAddressConstKHR { device_address: instance_buffer.gpu_address() });
                let geometry = vk::AccelerationStructureGeometryKHR::default()
                    .geometry_type(vk::GeometryTypeKHR::INSTANCES)
                    .geometry(vk::AccelerationStructureGeometryDataKHR { instances: data });
                let count = instances.len() as u32;
                Self {
                    geometries: vec![geometry],
                    ranges: vec![vk::AccelerationStructureBuildRangeInfoKHR::default().primitive_count(count)],
                    primitive_counts: vec![count],
                    ty: vk::AccelerationStructureTypeKHR::TOP_LEVEL,
                    flags: build_flags_to_vk(flags),
                }
            }
        }
    }

    fn build_info(&self) -> vk::AccelerationStructureBuildGeometryInfoKHR<'_> {
        vk::AccelerationStructureBuildGeometryInfoKHR::default()
            .ty(self.ty)
            .flags(self.flags)
            .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
            .geometries(&self.geometries)
    }
}

impl NativeRaytracing {
    pub fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        ctx.native_raytracing()?;
        Ok(Self { ctx })
    }
}

impl RaytracingBackend for NativeRaytracing {
    fn path(&self) -> RaytracingPath {
        RaytracingPath::Native
    }

    fn prebuild_info(&self, inputs: &AccelerationStructureInputs<'_>) -> Result<PrebuildInfo> {
        if inputs.primitive_count() == 0 {
            return Ok(PrebuildInfo::default());
        }
        let loaders = self.ctx.native_raytracing()?;
        let geometry = NativeGeometry::new(inputs);
        let mut sizes = vk::AccelerationStructureBuildSizesInfoKHR::default();
        unsafe {
            loaders.acceleration_structure.get_acceleration_structure_build_sizes(
                vk::AccelerationStructureBuildTypeKHR::DEVICE,
                &geometry.build_info(),
                &geometry.primitive_counts,
                &mut sizes,
            );
        }
        Ok(PrebuildInfo {
            result_size: sizes.acceleration_structure_size,
            scratch_size: sizes.build_scratch_size,
        })
    }

    fn set_descriptor_heaps(&self, cmd: &mut dyn CommandList, heaps: &[&dyn DescriptorHeap]) -> Result<()> {
        bind_descriptor_heaps(cmd, heaps)
    }

    fn build_acceleration_structure(
        &self,
        cmd: &mut dyn CommandList,
        build: &AccelerationStructureBuild<'_>,
    ) -> Result<()> {
        let loaders = self.ctx.native_raytracing()?;
        let list = vulkan_command_list_mut(cmd)?;
        list.ensure_recording("build_acceleration_structure")?;

        let destination = vulkan_buffer(build.destination)?;
        let Some(structure) = destination.acceleration_structure else {
            engine_bail!(LOG_SOURCE, "Buffer '{}' holds no acceleration structure", build.destination.desc().name);
        };
        let scratch_address = build.scratch.gpu_address();
        let alignment = loaders.properties.min_scratch_offset_alignment.max(1) as u64;
        if scratch_address % alignment != 0 {
            engine_bail!(LOG_SOURCE, "Scratch address {:#x} is not aligned to {}", scratch_address, alignment);
        }

        let geometry = NativeGeometry::new(&build.inputs);
        let info = geometry
            .build_info()
            .dst_acceleration_structure(structure)
            .scratch_data(vk::DeviceOrHostAddressKHR { device_address: scratch_address });
        unsafe {
            loaders.acceleration_structure.cmd_build_acceleration_structures(
                list.command_buffer(),
                &[info],
                &[geometry.ranges.as_slice()],
            );
        }
        engine_trace!(LOG_SOURCE, "Recorded native build of '{}' ({} primitives)",
            build.destination.desc().name, build.inputs.primitive_count());
        Ok(())
    }

    fn set_top_level_acceleration_structure(
        &self,
        cmd: &mut dyn CommandList,
        slot: u32,
        tlas: WrappedPointer,
    ) -> Result<()> {
        set_top_level(cmd, slot, tlas)
    }

    fn set_raytracing_pipeline(&self, cmd: &mut dyn CommandList, pipeline: &dyn RaytracingPipeline) -> Result<()> {
        let Some(native) = vulkan_raytracing_pipeline(pipeline)?.native else {
            engine_bail!(LOG_SOURCE, "Pipeline '{}' was not built for native ray tracing", pipeline.name());
        };
        vulkan_command_list_mut(cmd)?.bind_pipeline(vk::PipelineBindPoint::RAY_TRACING_KHR, native)
    }

    fn dispatch_rays(&self, cmd: &mut dyn CommandList, desc: &DispatchRaysDesc<'_>) -> Result<()> {
        let loaders = self.ctx.native_raytracing()?;
        let list = vulkan_command_list_mut(cmd)?;
        list.ensure_recording("dispatch_rays")?;
        list.push_root_table();

        let region = |buffer: &dyn Buffer, size: u64, stride: u64| vk::StridedDeviceAddressRegionKHR {
            device_address: buffer.gpu_address(),
            stride,
            size,
        };
        let ray_generation = region(desc.ray_generation.buffer, desc.ray_generation.size, desc.ray_generation.size);
        let miss = region(desc.miss.buffer, desc.miss.size, desc.miss.stride);
        let hit_group = region(desc.hit_group.buffer, desc.hit_group.size, desc.hit_group.stride);
        let callable = vk::StridedDeviceAddressRegionKHR::default();

        unsafe {
            loaders.ray_tracing_pipeline.cmd_trace_rays(
                list.command_buffer(),
                &ray_generation,
                &miss,
                &hit_group,
                &callable,
                desc.width,
                desc.height,
                desc.depth,
            );
        }
        Ok(())
    }
}

// ============================================================================
// Compute-emulated path
// ============================================================================

pub struct EmulatedRaytracing {
    ctx: Arc<GpuContext>,
}

/// Object-space bounds of the emulated bottom-level structures
///
/// Keyed by encoded pointer. Each entry remembers the buffer holding the
/// structure, and dropping that buffer forgets its bounds.
#[derive(Default)]
pub(crate) struct BottomLevelBounds {
    entries: FxHashMap<u64, (vk::Buffer, Aabb)>,
}

impl BottomLevelBounds {
    /// Record the bounds of the structure built into `storage`
    ///
    /// A rebuild into the same storage replaces the previous entry.
    pub fn insert(&mut self, pointer: u64, storage: vk::Buffer, bounds: Aabb) {
        self.forget_storage(storage);
        self.entries.insert(pointer, (storage, bounds));
    }

    pub fn get(&self, pointer: u64) -> Option<Aabb> {
        self.entries.get(&pointer).map(|&(_, bounds)| bounds)
    }

    /// Drop every entry stored in `storage`, returning how many were removed
    pub fn forget_storage(&mut self, storage: vk::Buffer) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (buffer, _)| *buffer != storage);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Dispatch extent as read by the emulation shader
pub fn pack_extent(width: u32, height: u32) -> u64 {
    width as u64 | ((height as u64) << 32)
}

/// Concatenate the meshes of a bottom-level build, rebasing their indices
fn merge_geometry(geometry: &[TriangleGeometry<'_>]) -> (Vec<glam::Vec3>, Vec<u32>) {
    let mut positions = Vec::new();
    let mut indices = Vec::new();
    for mesh in geometry {
        let base = positions.len() as u32;
        positions.extend(read_positions(mesh.cpu_vertices, mesh.vertex_stride as usize));
        indices.extend(mesh.cpu_indices.iter().map(|&i| i + base));
    }
    (positions, indices)
}

impl EmulatedRaytracing {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx }
    }

    /// Serialize the structure of `build` on the CPU
    fn encode(&self, build: &AccelerationStructureBuild<'_>) -> Result<Vec<u8>> {
        match build.inputs {
            AccelerationStructureInputs::Triangles { geometry, .. } => {
                let storage = vulkan_buffer(build.destination)?.buffer;
                let (positions, indices) = merge_geometry(geometry);
                let (bytes, bounds) = encode_bottom_level(&positions, &indices);
                let mut known = lock(&self.ctx.bottom_level_bounds, "Bottom-level bounds")?;
                known.insert(build.destination_pointer.encode(), storage, bounds);
                engine_trace!(LOG_SOURCE, "Tracking bounds of {} bottom-level structures", known.len());
                Ok(bytes)
            }
            AccelerationStructureInputs::Instances { instances, .. } => {
                let known = lock(&self.ctx.bottom_level_bounds, "Bottom-level bounds")?;
                let bounds = instances
                    .iter()
                    .map(|instance| {
                        known.get(instance.acceleration_structure).ok_or_else(|| {
                            engine_error!(LOG_SOURCE, "Instance {} references unknown structure {:#x}",
                                instance.instance_id(), instance.acceleration_structure);
                            Error::InvalidResource(format!(
                                "Unknown bottom-level structure {:#x}",
                                instance.acceleration_structure
                            ))
                        })
                    })
                    .collect::<Result<Vec<Aabb>>>()?;
                Ok(encode_top_level(instances, &bounds))
            }
        }
    }
}

impl RaytracingBackend for EmulatedRaytracing {
    fn path(&self) -> RaytracingPath {
        RaytracingPath::ComputeEmulated
    }

    fn prebuild_info(&self, inputs: &AccelerationStructureInputs<'_>) -> Result<PrebuildInfo> {
        let result_size = match inputs {
            AccelerationStructureInputs::Triangles { .. } => bottom_level_size(inputs.primitive_count()),
            AccelerationStructureInputs::Instances { .. } => top_level_size(inputs.primitive_count()),
        };
        Ok(PrebuildInfo { result_size, scratch_size: 0 })
    }

    fn set_descriptor_heaps(&self, cmd: &mut dyn CommandList, heaps: &[&dyn DescriptorHeap]) -> Result<()> {
        bind_descriptor_heaps(cmd, heaps)
    }

    fn build_acceleration_structure(
        &self,
        cmd: &mut dyn CommandList,
        build: &AccelerationStructureBuild<'_>,
    ) -> Result<()> {
        vulkan_command_list_mut(cmd)?.ensure_recording("build_acceleration_structure")?;

        let bytes = self.encode(build)?;
        let size = bytes.len() as u64;
        if size > build.destination.size() {
            engine_bail!(LOG_SOURCE, "Encoded structure ({} bytes) does not fit '{}' ({} bytes)",
                size, build.destination.desc().name, build.destination.size());
        }

        let staging = VulkanBuffer::new(
            self.ctx.clone(),
            &BufferDesc::new(
                format!("{} staging", build.destination.desc().name),
                size,
                MemoryLocation::Upload,
                BufferUsage::TRANSFER_SRC,
            ),
        )?;
        staging.write(0, &bytes)?;

        cmd.copy_buffer_region(build.destination, 0, &staging, 0, size)?;
        vulkan_command_list_mut(cmd)?.retain(Arc::new(staging));

        engine_trace!(LOG_SOURCE, "Recorded emulated build of '{}' ({} bytes)",
            build.destination.desc().name, size);
        Ok(())
    }

    fn set_top_level_acceleration_structure(
        &self,
        cmd: &mut dyn CommandList,
        slot: u32,
        tlas: WrappedPointer,
    ) -> Result<()> {
        set_top_level(cmd, slot, tlas)
    }

    fn set_raytracing_pipeline(&self, cmd: &mut dyn CommandList, pipeline: &dyn RaytracingPipeline) -> Result<()> {
        let vk_pipeline = vulkan_raytracing_pipeline(pipeline)?;
        let Some(emulation) = vk_pipeline.emulation else {
            engine_bail!(LOG_SOURCE, "Pipeline '{}' has no emulation compute pipeline", pipeline.name());
        };
        if vk_pipeline.root_argument_count + EMULATION_RESERVED_SLOTS > MAX_ROOT_ARGUMENTS {
            engine_bail!(LOG_SOURCE, "Pipeline '{}' leaves no room for the emulated dispatch slots", pipeline.name());
        }
        vulkan_command_list_mut(cmd)?.bind_pipeline(vk::PipelineBindPoint::COMPUTE, emulation)
    }

    fn dispatch_rays(&self, cmd: &mut dyn CommandList, desc: &DispatchRaysDesc<'_>) -> Result<()> {
        let slots = [
            (EMULATION_RAY_GENERATION_SLOT, desc.ray_generation.buffer.gpu_address()),
            (EMULATION_MISS_SLOT, desc.miss.buffer.gpu_address()),
            (EMULATION_HIT_GROUP_SLOT, desc.hit_group.buffer.gpu_address()),
            (EMULATION_EXTENT_SLOT, pack_extent(desc.width, desc.height)),
        ];
        let list = vulkan_command_list_mut(cmd)?;
        for (slot, value) in slots {
            list.set_root_value(slot, value)?;
        }

        cmd.dispatch(
            desc.width.div_ceil(EMULATION_GROUP_SIZE),
            desc.height.div_ceil(EMULATION_GROUP_SIZE),
            desc.depth,
        )
    }
}

#[cfg(test)]
#[path = "vulkan_raytracing_tests.rs"]
mod tests;
