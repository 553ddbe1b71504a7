/// CommandList trait - for recording GPU commands
///
/// Commands are recorded and later submitted to the GPU via
/// `GraphicsDevice::execute_command_lists()`. Ray tracing commands go through
/// the `RaytracingBackend` capability, which records into the same list.

use std::any::Any;
use crate::error::Result;
use crate::graphics_device::{Buffer, ComputePipeline, Texture};

/// Number of root argument slots a pipeline can address
pub const MAX_ROOT_ARGUMENTS: u32 = 16;

/// Usage state of a resource, tracked manually by the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Common,
    CopySource,
    CopyDest,
    GenericRead,
    UnorderedAccess,
    ShaderResource,
    AccelerationStructure,
    RenderTarget,
    Present,
}

/// Resource referenced by a barrier
#[derive(Clone, Copy)]
pub enum BarrierResource<'a> {
    Buffer(&'a dyn Buffer),
    Texture(&'a dyn Texture),
}

/// Resource barrier
#[derive(Clone, Copy)]
pub enum ResourceBarrier<'a> {
    /// State transition
    Transition {
        resource: BarrierResource<'a>,
        before: ResourceState,
        after: ResourceState,
    },
    /// Orders unordered-access writes before later accesses of the same resource
    UnorderedAccess {
        resource: BarrierResource<'a>,
    },
}

impl<'a> ResourceBarrier<'a> {
    pub fn buffer(buffer: &'a dyn Buffer, before: ResourceState, after: ResourceState) -> Self {
        ResourceBarrier::Transition {
            resource: BarrierResource::Buffer(buffer),
            before,
            after,
        }
    }

    pub fn texture(texture: &'a dyn Texture, before: ResourceState, after: ResourceState) -> Self {
        ResourceBarrier::Transition {
            resource: BarrierResource::Texture(texture),
            before,
            after,
        }
    }

    pub fn uav_buffer(buffer: &'a dyn Buffer) -> Self {
        ResourceBarrier::UnorderedAccess {
            resource: BarrierResource::Buffer(buffer),
        }
    }

    pub fn uav_texture(texture: &'a dyn Texture) -> Self {
        ResourceBarrier::UnorderedAccess {
            resource: BarrierResource::Texture(texture),
        }
    }
}

/// Value bound to a root argument slot
///
/// Addresses are GPU virtual addresses, descriptor tables are GPU descriptor
/// handles of the first slot of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootArgument {
    ConstantBuffer(u64),
    ShaderResource(u64),
    UnorderedAccess(u64),
    DescriptorTable(u64),
    Constant(u32),
}

impl RootArgument {
    /// Raw 64-bit value written into the root table
    pub fn raw(self) -> u64 {
        match self {
            RootArgument::ConstantBuffer(v)
            | RootArgument::ShaderResource(v)
            | RootArgument::UnorderedAccess(v)
            | RootArgument::DescriptorTable(v) => v,
            RootArgument::Constant(v) => v as u64,
        }
    }
}

/// Command list for recording GPU commands
pub trait CommandList: Send + Sync {
    /// Reset the list and its allocator and begin recording
    ///
    /// The caller guarantees the GPU finished the previous submission of this list.
    fn begin(&mut self) -> Result<()>;

    /// End recording
    fn end(&mut self) -> Result<()>;

    fn is_recording(&self) -> bool;

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier<'_>]) -> Result<()>;

    /// Copy the whole of `src` into `dst` (sizes must match)
    fn copy_buffer(&mut self, dst: &dyn Buffer, src: &dyn Buffer) -> Result<()>;

    fn copy_buffer_region(
        &mut self,
        dst: &dyn Buffer,
        dst_offset: u64,
        src: &dyn Buffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()>;

    /// Copy a whole texture, converting between compatible formats
    fn copy_texture(&mut self, dst: &dyn Texture, src: &dyn Texture) -> Result<()>;

    /// Copy tightly packed pixels from `src` into `dst`
    fn copy_buffer_to_texture(&mut self, dst: &dyn Texture, src: &dyn Buffer) -> Result<()>;

    /// Copy `src` tightly packed into `dst`
    fn copy_texture_to_buffer(&mut self, dst: &dyn Buffer, src: &dyn Texture) -> Result<()>;

    fn set_compute_pipeline(&mut self, pipeline: &dyn ComputePipeline) -> Result<()>;

    /// Bind a value to a root argument slot (`slot < MAX_ROOT_ARGUMENTS`)
    ///
    /// Arguments persist until overwritten and are shared by compute and ray
    /// tracing dispatches recorded on this list.
    fn set_compute_root_argument(&mut self, slot: u32, argument: RootArgument) -> Result<()>;

    /// Dispatch compute thread groups
    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
