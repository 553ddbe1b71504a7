/// Frame context: command lists, fence pacing and descriptor heaps
///
/// Owns one command list per back buffer, the frame fence and the four
/// descriptor heaps. Every GPU submission of the renderer goes through it:
///
/// ```text
/// prepare_command_lists -> record -> execute_frame_command_lists -> present -> wait_for_gpu
/// ```
///
/// One-off work (uploads, acceleration structure builds) uses `immediate()`,
/// which records, submits and waits on the current back buffer's list.

use std::sync::Arc;
use winit::window::Window;
use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::frame::FrameSync;
use crate::graphics_device::{
    CommandList, DescriptorHeapKind, Fence, GraphicsDevice, RaytracingBackend, Swapchain,
    SwapchainDesc, Texture,
};
use crate::resource::DescriptorAllocator;
use crate::{engine_bail, engine_debug, engine_error, engine_info};

pub struct FrameContext {
    device: Arc<dyn GraphicsDevice>,
    raytracing: Arc<dyn RaytracingBackend>,
    swapchain: Box<dyn Swapchain>,
    /// One per back buffer
    command_lists: Vec<Box<dyn CommandList>>,
    fence: Arc<dyn Fence>,
    sync: FrameSync,
    /// Shader-visible CBV/SRV/UAV heap, bound for every list
    resource_heap: DescriptorAllocator,
    sampler_heap: DescriptorAllocator,
    rtv_heap: DescriptorAllocator,
    dsv_heap: DescriptorAllocator,
}

impl FrameContext {
    /// Create a frame context presenting to `window`
    pub fn for_window(
        device: Arc<dyn GraphicsDevice>,
        window: &Window,
        config: &RendererConfig,
    ) -> Result<Self> {
        config.validate()?;
        let swapchain = device.create_swapchain(window, &SwapchainDesc {
            width: config.width,
            height: config.height,
            back_buffer_count: config.back_buffer_count,
        })?;
        Self::new(device, swapchain, config)
    }

    /// Create a frame context around an existing swapchain
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swapchain: Box<dyn Swapchain>,
        config: &RendererConfig,
    ) -> Result<Self> {
        config.validate()?;

        let back_buffer_count = swapchain.back_buffer_count();
        let command_lists = (0..back_buffer_count)
            .map(|_| device.create_command_list())
            .collect::<Result<Vec<_>>>()?;

        let fence = device.create_fence(0)?;
        let sync = FrameSync::new(back_buffer_count, swapchain.current_back_buffer_index());

        let resource_heap = DescriptorAllocator::new(
            device.as_ref(), DescriptorHeapKind::CbvSrvUav, config.cbv_srv_uav_heap_capacity)?;
        let sampler_heap = DescriptorAllocator::new(
            device.as_ref(), DescriptorHeapKind::Sampler, config.sampler_heap_capacity)?;
        let rtv_heap = DescriptorAllocator::new(
            device.as_ref(), DescriptorHeapKind::RenderTarget, config.rtv_heap_capacity)?;
        let dsv_heap = DescriptorAllocator::new(
            device.as_ref(), DescriptorHeapKind::DepthStencil, config.dsv_heap_capacity)?;

        let raytracing = device.raytracing();

        let mut ctx = Self {
            device,
            raytracing,
            swapchain,
            command_lists,
            fence,
            sync,
            resource_heap,
            sampler_heap,
            rtv_heap,
            dsv_heap,
        };
        ctx.wait_for_gpu()?;

        engine_info!("prism::FrameContext",
            "Frame context ready: {}x{}, {} back buffers, {:?} ray tracing",
            ctx.swapchain.width(), ctx.swapchain.height(), back_buffer_count, ctx.raytracing.path());

        Ok(ctx)
    }

    // ===== ACCESSORS =====

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn raytracing(&self) -> &Arc<dyn RaytracingBackend> {
        &self.raytracing
    }

    pub fn swapchain(&self) -> &dyn Swapchain {
        self.swapchain.as_ref()
    }

    pub fn fence(&self) -> &Arc<dyn Fence> {
        &self.fence
    }

    pub fn sync(&self) -> &FrameSync {
        &self.sync
    }

    pub fn back_buffer_index(&self) -> u32 {
        self.sync.back_buffer_index()
    }

    /// Back buffer written by the current frame
    pub fn back_buffer(&self) -> Result<&dyn Texture> {
        let index = self.back_buffer_index();
        self.swapchain
            .back_buffer(index)
            .ok_or_else(|| Error::InvalidResource(format!("No back buffer at index {}", index)))
    }

    pub fn width(&self) -> u32 {
        self.swapchain.width()
    }

    pub fn height(&self) -> u32 {
        self.swapchain.height()
    }

    pub fn resource_heap(&self) -> &DescriptorAllocator {
        &self.resource_heap
    }

    pub fn resource_heap_mut(&mut self) -> &mut DescriptorAllocator {
        &mut self.resource_heap
    }

    pub fn sampler_heap_mut(&mut self) -> &mut DescriptorAllocator {
        &mut self.sampler_heap
    }

    pub fn rtv_heap_mut(&mut self) -> &mut DescriptorAllocator {
        &mut self.rtv_heap
    }

    pub fn dsv_heap_mut(&mut self) -> &mut DescriptorAllocator {
        &mut self.dsv_heap
    }

    /// Command list of the current back buffer
    pub fn command_list(&mut self) -> &mut dyn CommandList {
        let index = self.sync.back_buffer_index() as usize;
        self.command_lists[index].as_mut()
    }

    /// Command list and back buffer of the current frame, borrowed together
    pub fn frame_targets(&mut self) -> Result<(&mut dyn CommandList, &dyn Texture)> {
        let index = self.sync.back_buffer_index();
        let back_buffer = self
            .swapchain
            .back_buffer(index)
            .ok_or_else(|| Error::InvalidResource(format!("No back buffer at index {}", index)))?;
        Ok((self.command_lists[index as usize].as_mut(), back_buffer))
    }

    // ===== FRAME CYCLE =====

    /// Reset the current back buffer's list and bind the shader-visible heaps
    ///
    /// The fence protocol guarantees the GPU finished with this list: either
    /// `present()` waited for it, or `wait_for_gpu()` drained the queue.
    pub fn prepare_command_lists(&mut self) -> Result<()> {
        let index = self.sync.back_buffer_index() as usize;
        let cmd = self.command_lists[index].as_mut();
        cmd.begin()?;

        let heaps = [self.resource_heap.heap().as_ref(), self.sampler_heap.heap().as_ref()];
        self.raytracing.set_descriptor_heaps(cmd, &heaps)
    }

    /// Close and submit the current list without presenting
    pub fn execute_command_lists(&mut self) -> Result<()> {
        self.submit(false)
    }

    /// Close and submit the current list as the last work writing the back buffer
    pub fn execute_frame_command_lists(&mut self) -> Result<()> {
        self.submit(true)
    }

    fn submit(&mut self, present: bool) -> Result<()> {
        let index = self.sync.back_buffer_index() as usize;
        let cmd = self.command_lists[index].as_mut();
        cmd.end()?;

        let swapchain = present.then(|| self.swapchain.as_ref());
        self.device.execute_command_lists(&[&*self.command_lists[index]], swapchain)
    }

    /// Present the back buffer and move to the next one
    ///
    /// Blocks if the next back buffer is still in use by the GPU.
    pub fn present(&mut self) -> Result<()> {
        let next = self.swapchain.present()?;
        self.sync.advance(self.device.as_ref(), self.fence.as_ref(), next)
    }

    /// Block until the GPU finished all submitted work
    pub fn wait_for_gpu(&mut self) -> Result<()> {
        self.sync.wait_for_gpu(self.device.as_ref(), self.fence.as_ref())
    }

    /// Record, submit and wait for one-off work
    ///
    /// Uses the current back buffer's list, so it must not be called while a
    /// frame is being recorded.
    pub fn immediate<F>(&mut self, record: F) -> Result<()>
    where
        F: FnOnce(&mut dyn CommandList) -> Result<()>,
    {
        if self.command_list().is_recording() {
            engine_bail!("prism::FrameContext", "immediate() called while a frame is being recorded");
        }

        self.prepare_command_lists()?;
        if let Err(e) = record(self.command_list()) {
            self.abort_frame();
            return Err(e);
        }
        self.execute_command_lists()?;
        self.wait_for_gpu()
    }

    /// Close the current list without submitting it
    ///
    /// Called after a recording error so the next `prepare_command_lists()`
    /// can begin the list again. Does nothing if the list is not recording.
    pub fn abort_frame(&mut self) {
        let cmd = self.command_list();
        if !cmd.is_recording() {
            return;
        }
        match cmd.end() {
            Ok(()) => engine_debug!("prism::FrameContext", "Aborted frame recording"),
            Err(e) => engine_error!("prism::FrameContext", "Failed to close aborted command list: {}", e),
        }
    }

    /// Recreate the swapchain for a new window size
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            engine_debug!("prism::FrameContext", "Ignoring resize to {}x{}", width, height);
            return Ok(());
        }

        self.wait_for_gpu()?;
        self.swapchain.recreate(width, height)?;

        let count = self.swapchain.back_buffer_count();
        if count as usize != self.command_lists.len() {
            self.command_lists = (0..count)
                .map(|_| self.device.create_command_list())
                .collect::<Result<Vec<_>>>()?;
        }
        self.sync.reset(count, self.swapchain.current_back_buffer_index());

        engine_info!("prism::FrameContext", "Swapchain resized to {}x{}", width, height);
        Ok(())
    }
}

impl Drop for FrameContext {
    fn drop(&mut self) {
        if let Err(e) = self.wait_for_gpu() {
            engine_error!("prism::FrameContext", "Failed to drain the GPU on shutdown: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "frame_context_tests.rs"]
mod tests;
