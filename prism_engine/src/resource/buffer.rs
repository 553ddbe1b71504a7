/// Device-local GPU buffer
///
/// Not CPU visible. Initial contents go through a transient upload buffer and
/// a copy on the frame context's command list; the calling thread blocks
/// until the copy completed.

use std::sync::Arc;
use crate::engine_bail;
use crate::error::Result;
use crate::frame::FrameContext;
use crate::graphics_device::{
    Buffer, BufferDesc, BufferUsage, CommandList, MemoryLocation, ResourceBarrier, ResourceState,
};

pub struct DeviceBuffer {
    buffer: Arc<dyn Buffer>,
    state: ResourceState,
}

impl DeviceBuffer {
    /// Allocate uninitialized device memory in `initial_state`
    pub fn new(
        ctx: &FrameContext,
        name: &str,
        size: u64,
        usage: BufferUsage,
        initial_state: ResourceState,
    ) -> Result<Self> {
        let desc = BufferDesc::new(name, size, MemoryLocation::Default, usage)
            .with_initial_state(initial_state);
        let buffer = ctx.device().create_buffer(&desc)?;
        Ok(Self { buffer, state: initial_state })
    }

    /// Allocate, upload `data` and transition to `final_state`
    ///
    /// Blocks until the GPU finished the copy.
    pub fn with_data(
        ctx: &mut FrameContext,
        name: &str,
        usage: BufferUsage,
        data: &[u8],
        final_state: ResourceState,
    ) -> Result<Self> {
        if data.is_empty() {
            engine_bail!("prism::DeviceBuffer", "Buffer '{}' created from empty data", name);
        }

        let usage = usage | BufferUsage::TRANSFER_DST;
        let mut buffer = Self::new(ctx, name, data.len() as u64, usage, ResourceState::CopyDest)?;

        let staging_desc = BufferDesc::new(
            format!("{} (upload)", name),
            data.len() as u64,
            MemoryLocation::Upload,
            BufferUsage::TRANSFER_SRC,
        );
        let staging = ctx.device().create_buffer(&staging_desc)?;
        staging.write(0, data)?;

        let dst = buffer.buffer.clone();
        ctx.immediate(|cmd| {
            cmd.copy_buffer(dst.as_ref(), staging.as_ref())?;
            if final_state != ResourceState::CopyDest {
                cmd.resource_barrier(&[ResourceBarrier::buffer(dst.as_ref(), ResourceState::CopyDest, final_state)])?;
            }
            Ok(())
        })?;

        buffer.state = final_state;
        Ok(buffer)
    }

    /// State the buffer was left in by its last recorded transition
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Record a transition to `after`, if the buffer is not already there
    pub fn transition(&mut self, cmd: &mut dyn CommandList, after: ResourceState) -> Result<()> {
        if self.state == after {
            return Ok(());
        }
        cmd.resource_barrier(&[ResourceBarrier::buffer(self.buffer.as_ref(), self.state, after)])?;
        self.state = after;
        Ok(())
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
#[path = "buffer_tests.rs"]
mod tests;
