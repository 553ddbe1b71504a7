/// Buffer trait and buffer descriptor

use std::any::Any;
use bitflags::bitflags;
use crate::error::Result;
use crate::graphics_device::{AccelerationStructureKind, ResourceState};

/// Memory residency class of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device-local memory, not CPU visible
    Default,
    /// CPU-writable memory, read by the GPU
    Upload,
    /// GPU-writable memory, read back by the CPU
    Readback,
}

impl MemoryLocation {
    /// Returns true if the CPU can access buffers of this class
    pub fn is_cpu_visible(self) -> bool {
        !matches!(self, MemoryLocation::Default)
    }
}

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const CONSTANT = 1 << 2;
        const STORAGE = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
        /// Read as geometry or instance input by acceleration structure builds
        const ACCELERATION_STRUCTURE_INPUT = 1 << 6;
        /// Holds a built acceleration structure
        const ACCELERATION_STRUCTURE_STORAGE = 1 << 7;
        /// Scratch memory for acceleration structure builds
        const SCRATCH = 1 << 8;
        const SHADER_TABLE = 1 << 9;
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Debug name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Residency class
    pub location: MemoryLocation,
    /// Usage flags
    pub usage: BufferUsage,
    /// State the buffer is in right after creation
    pub initial_state: ResourceState,
    /// Set when the buffer stores an acceleration structure of the given kind
    pub acceleration_structure: Option<AccelerationStructureKind>,
}

impl BufferDesc {
    /// Create a descriptor with the conventional initial state of its residency class
    ///
    /// Upload buffers start in `GenericRead`, readback buffers in `CopyDest`,
    /// default buffers in `Common`.
    pub fn new(name: impl Into<String>, size: u64, location: MemoryLocation, usage: BufferUsage) -> Self {
        let initial_state = match location {
            MemoryLocation::Default => ResourceState::Common,
            MemoryLocation::Upload => ResourceState::GenericRead,
            MemoryLocation::Readback => ResourceState::CopyDest,
        };
        Self {
            name: name.into(),
            size,
            location,
            usage,
            initial_state,
            acceleration_structure: None,
        }
    }

    pub fn with_initial_state(mut self, state: ResourceState) -> Self {
        self.initial_state = state;
        self
    }

    /// Mark the buffer as acceleration structure storage
    pub fn with_acceleration_structure(mut self, kind: AccelerationStructureKind) -> Self {
        self.acceleration_structure = Some(kind);
        self.usage |= BufferUsage::ACCELERATION_STRUCTURE_STORAGE;
        self.initial_state = ResourceState::AccelerationStructure;
        self
    }
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g., VulkanBuffer).
/// The buffer is automatically destroyed when dropped. CPU-visible buffers
/// stay mapped for their whole lifetime.
pub trait Buffer: Send + Sync {
    /// Creation parameters
    fn desc(&self) -> &BufferDesc;

    /// Size in bytes
    fn size(&self) -> u64 {
        self.desc().size
    }

    /// GPU virtual address
    ///
    /// For acceleration structure storage this is the address of the structure
    /// itself, which is what instance records and trace calls reference.
    fn gpu_address(&self) -> u64;

    /// Write bytes through the persistent mapping
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset into the buffer in bytes
    /// * `data` - Data to write
    ///
    /// # Errors
    ///
    /// Fails for device-local buffers and for writes past the end of the buffer.
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Read bytes through the persistent mapping
    ///
    /// # Errors
    ///
    /// Fails for device-local buffers and for reads past the end of the buffer.
    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
