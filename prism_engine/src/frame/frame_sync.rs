/// Per-back-buffer fence bookkeeping
///
/// `fence_values[i]` is the value that will be signaled when the frame
/// recorded into back buffer `i` completes. Before back buffer `i` is
/// recorded again, the fence must have reached that value.

use crate::error::Result;
use crate::graphics_device::{Fence, GraphicsDevice};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSync {
    fence_values: Vec<u64>,
    back_buffer_index: u32,
}

impl FrameSync {
    /// Bookkeeping for a fence created with value 0
    pub fn new(back_buffer_count: u32, back_buffer_index: u32) -> Self {
        let mut fence_values = vec![0; back_buffer_count as usize];
        fence_values[back_buffer_index as usize] = 1;
        Self { fence_values, back_buffer_index }
    }

    pub fn back_buffer_index(&self) -> u32 {
        self.back_buffer_index
    }

    pub fn back_buffer_count(&self) -> u32 {
        self.fence_values.len() as u32
    }

    /// Value the next signal for back buffer `index` will use
    pub fn fence_value(&self, index: u32) -> u64 {
        self.fence_values[index as usize]
    }

    /// Signal the current fence value and block until the GPU reaches it
    pub fn wait_for_gpu(&mut self, device: &dyn GraphicsDevice, fence: &dyn Fence) -> Result<()> {
        let bb = self.back_buffer_index as usize;
        let value = self.fence_values[bb];
        device.signal(fence, value)?;
        fence.wait(value)?;
        self.fence_values[bb] += 1;
        Ok(())
    }

    /// Close the current frame and move to `next_index`
    ///
    /// Signals the current frame's value, then blocks if the next back buffer
    /// is still in flight on the GPU.
    pub fn advance(&mut self, device: &dyn GraphicsDevice, fence: &dyn Fence, next_index: u32) -> Result<()> {
        let current = self.fence_values[self.back_buffer_index as usize];
        device.signal(fence, current)?;

        self.back_buffer_index = next_index;
        let next = self.fence_values[next_index as usize];
        if fence.completed_value()? < next {
            fence.wait(next)?;
        }

        self.fence_values[next_index as usize] = current + 1;
        Ok(())
    }

    /// Restart after the swapchain was recreated
    ///
    /// The caller guarantees the GPU is idle.
    pub fn reset(&mut self, back_buffer_count: u32, back_buffer_index: u32) {
        let value = self.fence_values[self.back_buffer_index as usize];
        self.fence_values = vec![value; back_buffer_count as usize];
        self.back_buffer_index = back_buffer_index;
    }
}

#[cfg(test)]
#[path = "frame_sync_tests.rs"]
mod tests;
