/// Swapchain trait - for window presentation

use std::any::Any;
use crate::error::Result;
use crate::graphics_device::{Texture, TextureFormat};

/// Parameters for swapchain creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub width: u32,
    pub height: u32,
    /// Number of back buffers
    pub back_buffer_count: u32,
}

/// Swapchain for presenting rendered images to a window
///
/// A back buffer is always acquired: right after creation, and again by every
/// `present()`. The last command list submission of a frame must pass the
/// swapchain to `GraphicsDevice::execute_command_lists()` so that it waits for
/// the acquire and signals presentation.
pub trait Swapchain: Send + Sync {
    /// Index of the back buffer being rendered this frame
    fn current_back_buffer_index(&self) -> u32;

    /// Back buffer at `index`
    fn back_buffer(&self, index: u32) -> Option<&dyn Texture>;

    /// Present the current back buffer and acquire the next one
    ///
    /// # Returns
    ///
    /// The index of the newly acquired back buffer.
    fn present(&mut self) -> Result<u32>;

    /// Recreate the swapchain (e.g., after window resize)
    ///
    /// The caller guarantees the GPU is idle.
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    fn back_buffer_count(&self) -> u32;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn format(&self) -> TextureFormat;

    fn as_any(&self) -> &dyn Any;
}
