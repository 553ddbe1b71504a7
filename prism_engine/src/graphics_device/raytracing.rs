/// Ray tracing capability interface
///
/// Two variants implement `RaytracingBackend`: the native hardware path and
/// the compute-emulated fallback. The device selects one at startup and every
/// acceleration structure build and ray dispatch goes through it.

use bitflags::bitflags;
use crate::acceleration::{InstanceDesc, WrappedPointer};
use crate::error::Result;
use crate::graphics_device::{Buffer, CommandList, DescriptorHeap, RaytracingPipeline};

/// Acceleration structure level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccelerationStructureKind {
    BottomLevel,
    TopLevel,
}

/// Which implementation of the capability interface is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RaytracingPath {
    /// Hardware acceleration structures and ray tracing pipelines
    Native,
    /// Acceleration structures built on the CPU, rays traced by a compute shader
    ComputeEmulated,
}

/// Vertex position format of triangle geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum VertexFormat {
    R32G32B32_SFLOAT,
}

/// Index format of triangle geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    U32,
}

bitflags! {
    /// Acceleration structure build flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BuildFlags: u32 {
        const PREFER_FAST_TRACE = 1 << 0;
        const PREFER_FAST_BUILD = 1 << 1;
        const ALLOW_UPDATE = 1 << 2;
    }
}

/// Triangle geometry of one mesh
///
/// GPU fields reference the shared vertex and index buffers. The `cpu_*`
/// slices mirror the same data for backends that build on the host.
#[derive(Clone, Copy)]
pub struct TriangleGeometry<'a> {
    pub vertex_buffer: &'a dyn Buffer,
    /// Byte offset of the mesh's first vertex
    pub vertex_offset: u64,
    pub vertex_count: u32,
    pub vertex_stride: u64,
    pub vertex_format: VertexFormat,
    pub index_buffer: &'a dyn Buffer,
    /// Byte offset of the mesh's first index
    pub index_offset: u64,
    pub index_count: u32,
    pub index_format: IndexFormat,
    /// Opaque geometry never invokes any-hit shaders
    pub opaque: bool,
    /// Vertex bytes of this mesh; position is the first attribute
    pub cpu_vertices: &'a [u8],
    /// Indices of this mesh, local to its first vertex
    pub cpu_indices: &'a [u32],
}

impl<'a> TriangleGeometry<'a> {
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

/// Inputs of an acceleration structure build
#[derive(Clone, Copy)]
pub enum AccelerationStructureInputs<'a> {
    /// Bottom level: triangle geometry
    Triangles {
        geometry: &'a [TriangleGeometry<'a>],
        flags: BuildFlags,
    },
    /// Top level: instances stored in `instance_buffer`, mirrored in `instances`
    Instances {
        instance_buffer: &'a dyn Buffer,
        instances: &'a [InstanceDesc],
        flags: BuildFlags,
    },
}

impl<'a> AccelerationStructureInputs<'a> {
    pub fn kind(&self) -> AccelerationStructureKind {
        match self {
            AccelerationStructureInputs::Triangles { .. } => AccelerationStructureKind::BottomLevel,
            AccelerationStructureInputs::Instances { .. } => AccelerationStructureKind::TopLevel,
        }
    }

    /// Triangles for bottom level, instances for top level
    pub fn primitive_count(&self) -> u64 {
        match self {
            AccelerationStructureInputs::Triangles { geometry, .. } => {
                geometry.iter().map(|g| g.triangle_count() as u64).sum()
            }
            AccelerationStructureInputs::Instances { instances, .. } => instances.len() as u64,
        }
    }
}

/// Memory requirements of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrebuildInfo {
    pub result_size: u64,
    pub scratch_size: u64,
}

/// One acceleration structure build command
#[derive(Clone, Copy)]
pub struct AccelerationStructureBuild<'a> {
    pub inputs: AccelerationStructureInputs<'a>,
    /// Result storage created with `BufferDesc::with_acceleration_structure`
    pub destination: &'a dyn Buffer,
    /// Wrapped pointer of `destination`
    pub destination_pointer: WrappedPointer,
    pub scratch: &'a dyn Buffer,
}

/// Region of a shader table passed to a ray dispatch
#[derive(Clone, Copy)]
pub struct ShaderTableRegion<'a> {
    pub buffer: &'a dyn Buffer,
    pub size: u64,
    pub stride: u64,
}

/// Ray dispatch parameters
#[derive(Clone, Copy)]
pub struct DispatchRaysDesc<'a> {
    pub ray_generation: ShaderTableRegion<'a>,
    pub miss: ShaderTableRegion<'a>,
    pub hit_group: ShaderTableRegion<'a>,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Ray tracing capability interface
///
/// Commands are recorded into `cmd`, which must be a command list created by
/// the same device.
pub trait RaytracingBackend: Send + Sync {
    fn path(&self) -> RaytracingPath;

    /// Query result and scratch sizes of a build
    fn prebuild_info(&self, inputs: &AccelerationStructureInputs<'_>) -> Result<PrebuildInfo>;

    /// Bind the shader-visible heaps for the rest of the list
    fn set_descriptor_heaps(
        &self,
        cmd: &mut dyn CommandList,
        heaps: &[&dyn DescriptorHeap],
    ) -> Result<()>;

    fn build_acceleration_structure(
        &self,
        cmd: &mut dyn CommandList,
        build: &AccelerationStructureBuild<'_>,
    ) -> Result<()>;

    /// Bind a top-level structure to a root argument slot
    fn set_top_level_acceleration_structure(
        &self,
        cmd: &mut dyn CommandList,
        slot: u32,
        tlas: WrappedPointer,
    ) -> Result<()>;

    fn set_raytracing_pipeline(
        &self,
        cmd: &mut dyn CommandList,
        pipeline: &dyn RaytracingPipeline,
    ) -> Result<()>;

    fn dispatch_rays(&self, cmd: &mut dyn CommandList, desc: &DispatchRaysDesc<'_>) -> Result<()>;
}
