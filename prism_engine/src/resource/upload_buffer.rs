/// CPU-writable GPU buffer
///
/// Backed by upload memory that the device keeps mapped for the buffer's
/// whole lifetime. Writes are bounds-checked against the buffer size.
/// Dropping the buffer releases the allocation.

use std::sync::Arc;
use bytemuck::Pod;
use crate::engine_error;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, BufferDesc, BufferUsage, GraphicsDevice, MemoryLocation};

pub struct UploadBuffer {
    buffer: Arc<dyn Buffer>,
}

impl UploadBuffer {
    /// Allocate `size` bytes of upload memory
    pub fn new(device: &dyn GraphicsDevice, name: &str, size: u64, usage: BufferUsage) -> Result<Self> {
        let desc = BufferDesc::new(name, size, MemoryLocation::Upload, usage);
        let buffer = device.create_buffer(&desc)?;
        Ok(Self { buffer })
    }

    /// Allocate and fill with `data`
    pub fn with_data(device: &dyn GraphicsDevice, name: &str, usage: BufferUsage, data: &[u8]) -> Result<Self> {
        let buffer = Self::new(device, name, data.len() as u64, usage)?;
        buffer.write(data, 0)?;
        Ok(buffer)
    }

    /// Copy `data` into the buffer at `offset`
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the write would pass the end of the buffer.
    /// Nothing is written in that case.
    pub fn write(&self, data: &[u8], offset: u64) -> Result<()> {
        let name = &self.buffer.desc().name;
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size()) {
            engine_error!("prism::UploadBuffer",
                "Write of {} bytes at offset {} overflows buffer '{}' ({} bytes)",
                data.len(), offset, name, self.size());
            return Err(Error::InvalidResource(format!(
                "Write of {} bytes at offset {} overflows upload buffer '{}'",
                data.len(), offset, name
            )));
        }

        self.buffer.write(offset, data)
    }

    /// Write one plain-old-data value
    pub fn write_pod<T: Pod>(&self, value: &T, offset: u64) -> Result<()> {
        self.write(bytemuck::bytes_of(value), offset)
    }

    /// Write a slice of plain-old-data values
    pub fn write_slice<T: Pod>(&self, values: &[T], offset: u64) -> Result<()> {
        self.write(bytemuck::cast_slice(values), offset)
    }

    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    pub fn gpu_address(&self) -> u64 {
        self.buffer.gpu_address()
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }
}

#[cfg(test)]
#[path = "upload_buffer_tests.rs"]
mod tests;
