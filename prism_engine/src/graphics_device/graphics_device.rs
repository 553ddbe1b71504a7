/// GraphicsDevice trait - factory for GPU resources and owner of the command queue

use std::sync::Arc;
use winit::window::Window;
use crate::adapter::AdapterInfo;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, CommandList, ComputePipeline, ComputePipelineDesc, DescriptorHeap,
    DescriptorHeapDesc, Fence, RaytracingBackend, RaytracingPipeline, RaytracingPipelineDesc,
    Swapchain, SwapchainDesc, Texture, TextureDesc,
};

/// Logical GPU device with a single command queue
///
/// Implemented by backend plugins (e.g., VulkanGraphicsDevice). Dropping the
/// device waits for the GPU before releasing anything.
pub trait GraphicsDevice: Send + Sync {
    /// Adapter the device was created on
    fn adapter_info(&self) -> &AdapterInfo;

    /// Ray tracing implementation selected at startup
    fn raytracing(&self) -> Arc<dyn RaytracingBackend>;

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>>;

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Arc<dyn DescriptorHeap>>;

    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// Create a fence whose completed value starts at `initial_value`
    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>>;

    fn create_swapchain(&self, window: &Window, desc: &SwapchainDesc) -> Result<Box<dyn Swapchain>>;

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<dyn ComputePipeline>>;

    fn create_raytracing_pipeline(
        &self,
        desc: &RaytracingPipelineDesc,
    ) -> Result<Arc<dyn RaytracingPipeline>>;

    /// Submit closed command lists to the queue
    ///
    /// # Arguments
    ///
    /// * `lists` - Command lists in submission order
    /// * `present` - Swapchain whose current back buffer is written by this
    ///   submission; the submission waits for its acquire and signals its
    ///   presentation
    fn execute_command_lists(
        &self,
        lists: &[&dyn CommandList],
        present: Option<&dyn Swapchain>,
    ) -> Result<()>;

    /// Queue a signal of `value` on `fence` after all submitted work
    fn signal(&self, fence: &dyn Fence, value: u64) -> Result<()>;

    /// Block until the queue is idle
    fn wait_idle(&self) -> Result<()>;
}
