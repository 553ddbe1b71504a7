/// Wrapped acceleration structure pointer
///
/// The native path addresses acceleration structures by GPU virtual address.
/// The compute-emulated path cannot dereference arbitrary addresses, so every
/// structure is also registered as a raw UAV in the shader-visible heap and
/// addressed by descriptor index.

use crate::error::Result;
use crate::graphics_device::{Buffer, RaytracingPath, ViewDesc};
use crate::resource::DescriptorAllocator;

/// Pointer to an acceleration structure, valid for the active ray tracing path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrappedPointer {
    Native {
        address: u64,
    },
    Emulated {
        descriptor_index: u32,
        address: u64,
    },
}

impl WrappedPointer {
    /// Wrap an acceleration structure buffer
    ///
    /// On the emulated path this consumes one slot of `heap`.
    pub fn create(
        path: RaytracingPath,
        heap: &mut DescriptorAllocator,
        buffer: &dyn Buffer,
    ) -> Result<Self> {
        let address = buffer.gpu_address();
        match path {
            RaytracingPath::Native => Ok(WrappedPointer::Native { address }),
            RaytracingPath::ComputeEmulated => {
                let handle = heap.create_descriptor(&ViewDesc::UnorderedAccessBuffer {
                    buffer,
                    first_element: 0,
                    num_elements: (buffer.size() / 4) as u32,
                    stride: 0,
                    raw: true,
                })?;
                Ok(WrappedPointer::Emulated {
                    descriptor_index: handle.index(),
                    address,
                })
            }
        }
    }

    pub fn address(&self) -> u64 {
        match *self {
            WrappedPointer::Native { address } | WrappedPointer::Emulated { address, .. } => address,
        }
    }

    pub fn descriptor_index(&self) -> Option<u32> {
        match *self {
            WrappedPointer::Native { .. } => None,
            WrappedPointer::Emulated { descriptor_index, .. } => Some(descriptor_index),
        }
    }

    /// 64-bit value stored in instance records and root tables
    ///
    /// Emulated pointers pack the descriptor index in the low word and the
    /// byte offset into the view (always 0) in the high word.
    pub fn encode(&self) -> u64 {
        match *self {
            WrappedPointer::Native { address } => address,
            WrappedPointer::Emulated { descriptor_index, .. } => descriptor_index as u64,
        }
    }
}
