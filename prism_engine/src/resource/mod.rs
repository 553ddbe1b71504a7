//! GPU resource wrappers and descriptor allocation
//!
//! Each wrapper exclusively owns its backing buffer. Dropping the wrapper
//! releases the allocation.

pub mod buffer;
pub mod upload_buffer;
pub mod readback_buffer;
pub mod descriptor_allocator;

pub use buffer::DeviceBuffer;
pub use upload_buffer::UploadBuffer;
pub use readback_buffer::{ReadbackBuffer, ReadbackMapping};
pub use descriptor_allocator::{DescriptorAllocator, DescriptorHandle};
