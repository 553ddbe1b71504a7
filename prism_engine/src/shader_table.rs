/// Shader tables
///
/// A shader table is an upload buffer of fixed-stride records, each made of a
/// shader identifier followed by that record's root arguments. The stride is
/// the largest record size rounded up to `SHADER_RECORD_ALIGNMENT`. Records
/// are appended in order up to the capacity given at creation.

use crate::error::{Error, Result};
use crate::graphics_device::{BufferUsage, GraphicsDevice, RaytracingPipeline, ShaderTableRegion};
use crate::resource::UploadBuffer;
use crate::{engine_debug, engine_error};

/// Alignment of every record in a shader table
pub const SHADER_RECORD_ALIGNMENT: u64 = 32;

/// One shader table entry
#[derive(Debug, Clone, Copy)]
pub struct ShaderRecord<'a> {
    pub identifier: &'a [u8],
    pub root_arguments: &'a [u8],
}

impl<'a> ShaderRecord<'a> {
    pub fn new(identifier: &'a [u8], root_arguments: &'a [u8]) -> Self {
        Self { identifier, root_arguments }
    }

    /// Record of an exported shader of `pipeline`
    pub fn from_export(pipeline: &'a dyn RaytracingPipeline, export: &str, root_arguments: &'a [u8]) -> Result<Self> {
        let identifier = pipeline.shader_identifier(export).ok_or_else(|| {
            Error::InvalidResource(format!("Pipeline '{}' has no export '{}'", pipeline.name(), export))
        })?;
        Ok(Self { identifier, root_arguments })
    }

    /// Unpadded size in bytes
    pub fn size(&self) -> u64 {
        (self.identifier.len() + self.root_arguments.len()) as u64
    }
}

pub struct ShaderTable {
    buffer: UploadBuffer,
    stride: u64,
    capacity: u32,
    len: u32,
}

impl ShaderTable {
    /// Allocate a table of `capacity` records of at most `max_record_size` bytes
    pub fn new(device: &dyn GraphicsDevice, name: &str, capacity: u32, max_record_size: u64) -> Result<Self> {
        if capacity == 0 || max_record_size == 0 {
            return Err(Error::InvalidResource(format!(
                "Shader table '{}' needs a non-zero capacity and record size",
                name
            )));
        }
        let stride = max_record_size.div_ceil(SHADER_RECORD_ALIGNMENT) * SHADER_RECORD_ALIGNMENT;
        let buffer = UploadBuffer::new(device, name, stride * capacity as u64, BufferUsage::SHADER_TABLE)?;
        engine_debug!("prism::ShaderTable", "'{}': {} records of {} bytes", name, capacity, stride);
        Ok(Self { buffer, stride, capacity, len: 0 })
    }

    /// Append a record
    ///
    /// # Errors
    ///
    /// `ShaderTableFull` once `capacity` records were appended, and
    /// `InvalidResource` for a record larger than the stride. Nothing is
    /// written in either case.
    pub fn push(&mut self, record: &ShaderRecord<'_>) -> Result<()> {
        let name = &self.buffer.buffer().desc().name;
        if self.len >= self.capacity {
            engine_error!("prism::ShaderTable", "'{}' is full ({} records)", name, self.capacity);
            return Err(Error::ShaderTableFull { capacity: self.capacity });
        }
        if record.size() > self.stride {
            engine_error!("prism::ShaderTable", "Record of {} bytes exceeds stride {} of '{}'",
                record.size(), self.stride, name);
            return Err(Error::InvalidResource(format!(
                "Shader record of {} bytes exceeds the {} byte stride of '{}'",
                record.size(), self.stride, name
            )));
        }

        // Full stride, zero padded, so stale bytes never follow a short record
        let mut bytes = vec![0u8; self.stride as usize];
        bytes[..record.identifier.len()].copy_from_slice(record.identifier);
        bytes[record.identifier.len()..record.size() as usize].copy_from_slice(record.root_arguments);

        self.buffer.write(&bytes, self.len as u64 * self.stride)?;
        self.len += 1;
        Ok(())
    }

    /// Append the record of an exported shader
    pub fn push_export(
        &mut self,
        pipeline: &dyn RaytracingPipeline,
        export: &str,
        root_arguments: &[u8],
    ) -> Result<()> {
        self.push(&ShaderRecord::from_export(pipeline, export, root_arguments)?)
    }

    /// Region covering the records appended so far
    pub fn region(&self) -> ShaderTableRegion<'_> {
        ShaderTableRegion {
            buffer: self.buffer.buffer().as_ref(),
            size: self.len as u64 * self.stride,
            stride: self.stride,
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn buffer(&self) -> &UploadBuffer {
        &self.buffer
    }
}

#[cfg(test)]
#[path = "shader_table_tests.rs"]
mod tests;
