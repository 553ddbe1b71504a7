/// Constant data shared with the shaders
///
/// Layouts mirror the shader-side structures field for field and keep every
/// vector on a 16-byte boundary.

use std::marker::PhantomData;
use std::mem::size_of;
use bytemuck::{Pod, Zeroable};
use glam::{IVec2, Mat4, Vec2, Vec4};
use crate::engine_debug;
use crate::error::{Error, Result};
use crate::graphics_device::{BufferUsage, GraphicsDevice};
use crate::resource::UploadBuffer;

/// Alignment of constant buffer views
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Per-frame constants of the path tracing and picking passes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneConstants {
    pub projection_to_world: Mat4,
    pub camera_position: Vec4,
    pub gi_num_bounces: u32,
    pub gi_bounce_distance: f32,
    pub lens_diameter: f32,
    pub aa_enabled: u32,
    pub aa_sampling_point: Vec2,
    pub aa_algorithm: u32,
    pub ao_samples: u32,
    pub ao_size: u32,
    pub frame_count: u32,
    /// Pixel the picking ray is shot through
    pub picking_point: IVec2,
    pub sky_color: Vec4,
}

/// Per-frame constants of the averaging pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AveragerConstants {
    /// 0 restarts the average with this frame's sample, 1 accumulates
    pub clear_samples: u32,
    pub gamma: f32,
    pub padding: [f32; 2],
}

impl AveragerConstants {
    pub fn new(clearing: bool, gamma: f32) -> Self {
        Self {
            clear_samples: if clearing { 0 } else { 1 },
            gamma,
            padding: [0.0; 2],
        }
    }
}

/// Upload buffer of `T` records in 256-byte aligned slots, written round-robin
///
/// A slot is rewritten `slot_count` writes later, so the ring must be larger
/// than the number of frames the GPU can have in flight.
pub struct ConstantBufferRing<T: Pod> {
    buffer: UploadBuffer,
    slot_size: u64,
    slot_count: u32,
    next: u32,
    _marker: PhantomData<T>,
}

impl<T: Pod> ConstantBufferRing<T> {
    pub fn new(device: &dyn GraphicsDevice, name: &str, slot_count: u32) -> Result<Self> {
        if slot_count == 0 {
            return Err(Error::InvalidResource(format!("Constant ring '{}' needs at least one slot", name)));
        }
        let slot_size = (size_of::<T>() as u64).div_ceil(CONSTANT_BUFFER_ALIGNMENT) * CONSTANT_BUFFER_ALIGNMENT;
        let buffer = UploadBuffer::new(device, name, slot_size * slot_count as u64, BufferUsage::CONSTANT)?;
        engine_debug!("prism::ConstantBufferRing", "'{}': {} slots of {} bytes", name, slot_count, slot_size);
        Ok(Self {
            buffer,
            slot_size,
            slot_count,
            next: 0,
            _marker: PhantomData,
        })
    }

    /// Write `value` into the next slot
    ///
    /// # Returns
    ///
    /// The GPU address of the written slot.
    pub fn write(&mut self, value: &T) -> Result<u64> {
        let offset = self.next as u64 * self.slot_size;
        self.buffer.write_pod(value, offset)?;
        self.next = (self.next + 1) % self.slot_count;
        Ok(self.buffer.gpu_address() + offset)
    }

    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }

    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    pub fn buffer(&self) -> &UploadBuffer {
        &self.buffer
    }
}

#[cfg(test)]
#[path = "shader_data_tests.rs"]
mod tests;
