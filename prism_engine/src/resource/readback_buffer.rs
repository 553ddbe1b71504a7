/// GPU-to-CPU readback buffer

use std::sync::Arc;
use bytemuck::Pod;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, BufferDesc, BufferUsage, GraphicsDevice, MemoryLocation};

pub struct ReadbackBuffer {
    buffer: Arc<dyn Buffer>,
}

impl ReadbackBuffer {
    pub fn new(device: &dyn GraphicsDevice, name: &str, size: u64) -> Result<Self> {
        let desc = BufferDesc::new(name, size, MemoryLocation::Readback, BufferUsage::TRANSFER_DST);
        Ok(Self { buffer: device.create_buffer(&desc)? })
    }

    /// Snapshot the buffer contents
    ///
    /// The caller guarantees the GPU finished writing (the copy into this
    /// buffer was submitted and waited on).
    pub fn map(&self) -> Result<ReadbackMapping> {
        let mut bytes = vec![0u8; self.buffer.size() as usize];
        self.buffer.read(0, &mut bytes)?;
        Ok(ReadbackMapping { bytes })
    }

    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }
}

/// Bytes read back from the GPU
pub struct ReadbackMapping {
    bytes: Vec<u8>,
}

impl ReadbackMapping {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Element `index` of a tightly packed `T` array
    pub fn read_pod<T: Pod>(&self, index: usize) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let start = index * size;
        self.bytes
            .get(start..start + size)
            .map(bytemuck::pod_read_unaligned)
            .ok_or_else(|| Error::InvalidResource(format!(
                "Readback element {} out of range ({} bytes)",
                index,
                self.bytes.len()
            )))
    }

    /// Whole buffer as a `T` array, ignoring trailing bytes
    pub fn to_vec<T: Pod>(&self) -> Vec<T> {
        self.bytes
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }
}

#[cfg(test)]
#[path = "readback_buffer_tests.rs"]
mod tests;
