/// Graphics device module - backend-agnostic GPU traits and descriptors

pub mod graphics_device;
pub mod buffer;
pub mod texture;
pub mod descriptor_heap;
pub mod command_list;
pub mod pipeline;
pub mod raytracing;
pub mod fence;
pub mod swapchain;

pub use graphics_device::*;
pub use buffer::*;
pub use texture::*;
pub use descriptor_heap::*;
pub use command_list::*;
pub use pipeline::*;
pub use raytracing::*;
pub use fence::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
