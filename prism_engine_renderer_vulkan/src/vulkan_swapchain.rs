/// VulkanSwapchain - Vulkan implementation of the Swapchain trait
///
/// Back buffers are written by transfer commands only (copy or blit of the
/// displayed image), presented with FIFO. A back buffer is acquired at
/// creation and again by every `present()`.

use ash::vk;
use prism_engine::prism::device::{Swapchain, SwapchainDesc, Texture, TextureFormat};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_debug, engine_error, engine_info, engine_warn_err};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::any::Any;
use std::sync::Arc;
use winit::window::Window;

use crate::vulkan_context::{vk_err, GpuContext, LOG_SOURCE};
use crate::vulkan_format::vk_to_texture_format;
use crate::vulkan_texture::VulkanTexture;

/// Surface formats usable as copy destinations of the engine's images, by preference
const PREFERRED_FORMATS: [vk::Format; 2] = [vk::Format::B8G8R8A8_UNORM, vk::Format::R8G8B8A8_UNORM];

pub struct VulkanSwapchain {
    ctx: Arc<GpuContext>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    surface_format: vk::SurfaceFormatKHR,
    format: TextureFormat,
    extent: vk::Extent2D,
    requested_count: u32,
    back_buffers: Vec<VulkanTexture>,

    /// Acquire semaphores, one more than images so a free one always exists
    acquire_semaphores: Vec<vk::Semaphore>,
    next_acquire: usize,
    /// Semaphore the current image was acquired with
    current_acquire: usize,
    /// One semaphore per swapchain image (for present)
    render_finished_semaphores: Vec<vk::Semaphore>,
    current_image: u32,
}

fn init_error(what: &str, e: impl std::fmt::Debug) -> Error {
    engine_error!(LOG_SOURCE, "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

impl VulkanSwapchain {
    /// Create a swapchain for `window` and acquire its first back buffer
    pub fn new(ctx: Arc<GpuContext>, window: &Window, desc: &SwapchainDesc) -> Result<Self> {
        let display_handle = window
            .display_handle()
            .map_err(|e| init_error("Failed to get display handle", e))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| init_error("Failed to get window handle", e))?;

        unsafe {
            let surface = ash_window::create_surface(
                &ctx.entry,
                &ctx.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_error("Failed to create surface", e))?;
            let surface_loader = ash::khr::surface::Instance::new(&ctx.entry, &ctx.instance);

            let supported = surface_loader
                .get_physical_device_surface_support(ctx.physical_device, ctx.queue_family, surface)
                .unwrap_or(false);
            if !supported {
                surface_loader.destroy_surface(surface, None);
                return Err(init_error("Queue family cannot present to the window", ctx.queue_family));
            }

            let formats = match surface_loader.get_physical_device_surface_formats(ctx.physical_device, surface) {
                Ok(formats) => formats,
                Err(e) => {
                    surface_loader.destroy_surface(surface, None);
                    return Err(init_error("Failed to query surface formats", e));
                }
            };
            let chosen = PREFERRED_FORMATS
                .iter()
                .find_map(|&wanted| formats.iter().find(|f| f.format == wanted))
                .copied();
            let Some(surface_format) = chosen else {
                surface_loader.destroy_surface(surface, None);
                return Err(init_error("No UNORM RGBA/BGRA surface format", formats));
            };
            let format = vk_to_texture_format(surface_format.format).unwrap_or(TextureFormat::B8G8R8A8_UNORM);

            let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);
            let mut chain = Self {
                ctx,
                surface,
                surface_loader,
                swapchain: vk::SwapchainKHR::null(),
                swapchain_loader,
                surface_format,
                format,
                extent: vk::Extent2D { width: desc.width, height: desc.height },
                requested_count: desc.back_buffer_count,
                back_buffers: Vec::new(),
                acquire_semaphores: Vec::new(),
                next_acquire: 0,
                current_acquire: 0,
                render_finished_semaphores: Vec::new(),
                current_image: 0,
            };
            chain.build(desc.width, desc.height)?;
            chain.acquire()?;

            engine_info!(LOG_SOURCE, "Swapchain {}x{} with {} back buffers ({:?})",
                chain.extent.width, chain.extent.height, chain.back_buffers.len(), chain.format);
            Ok(chain)
        }
    }

    /// (Re)create the swapchain, its back buffers and its semaphores
    unsafe fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let caps = self
            .surface_loader
            .get_physical_device_surface_capabilities(self.ctx.physical_device, self.surface)
            .map_err(|e| init_error("Failed to get surface capabilities", e))?;

        let extent = if caps.current_extent.width != u32::MAX {
            caps.current_extent
        } else {
            vk::Extent2D {
                width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
                height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
            }
        };

        let image_count = self.requested_count.max(caps.min_image_count);
        let image_count = if caps.max_image_count > 0 {
            image_count.min(caps.max_image_count)
        } else {
            image_count
        };

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = self
            .swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| init_error("Failed to create swapchain", e))?;

        // Old back buffer views go before the old swapchain
        self.back_buffers.clear();
        if old_swapchain != vk::SwapchainKHR::null() {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }
        self.swapchain = swapchain;
        self.extent = extent;

        let images = self
            .swapchain_loader
            .get_swapchain_images(swapchain)
            .map_err(|e| init_error("Failed to get swapchain images", e))?;
        for (index, &image) in images.iter().enumerate() {
            self.back_buffers.push(VulkanTexture::from_swapchain_image(
                self.ctx.clone(),
                image,
                self.format,
                extent.width,
                extent.height,
                index,
            )?);
        }

        self.destroy_semaphores();
        let create_semaphore = || {
            self.ctx
                .device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| vk_err("Failed to create swapchain semaphore", e))
        };
        let acquire = (0..=images.len()).map(|_| create_semaphore()).collect::<Result<Vec<_>>>()?;
        let finished = (0..images.len()).map(|_| create_semaphore()).collect::<Result<Vec<_>>>()?;
        self.acquire_semaphores = acquire;
        self.render_finished_semaphores = finished;
        self.next_acquire = 0;

        engine_debug!(LOG_SOURCE, "Swapchain built: {}x{}, {} images", extent.width, extent.height, images.len());
        Ok(())
    }

    unsafe fn destroy_semaphores(&mut self) {
        for &semaphore in self.acquire_semaphores.iter().chain(&self.render_finished_semaphores) {
            self.ctx.device.destroy_semaphore(semaphore, None);
        }
        self.acquire_semaphores.clear();
        self.render_finished_semaphores.clear();
    }

    /// Acquire the next image with the next free acquire semaphore
    fn acquire(&mut self) -> Result<u32> {
        let slot = self.next_acquire;
        let (index, _suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, u64::MAX, self.acquire_semaphores[slot], vk::Fence::null())
                .map_err(|e| match e {
                    vk::Result::ERROR_OUT_OF_DATE_KHR => {
                        engine_warn_err!(LOG_SOURCE, "Swapchain out of date during acquire")
                    }
                    other => vk_err("Failed to acquire swapchain image", other),
                })?
        };
        self.current_acquire = slot;
        self.next_acquire = (slot + 1) % self.acquire_semaphores.len();
        self.current_image = index;
        Ok(index)
    }

    /// (acquire semaphore to wait on, render-finished semaphore to signal)
    /// for the submission writing the current back buffer
    pub(crate) fn sync_info(&self) -> (vk::Semaphore, vk::Semaphore) {
        (
            self.acquire_semaphores[self.current_acquire],
            self.render_finished_semaphores[self.current_image as usize],
        )
    }
}

impl Swapchain for VulkanSwapchain {
    fn current_back_buffer_index(&self) -> u32 {
        self.current_image
    }

    fn back_buffer(&self, index: u32) -> Option<&dyn Texture> {
        self.back_buffers.get(index as usize).map(|t| t as &dyn Texture)
    }

    fn present(&mut self) -> Result<u32> {
        let swapchains = [self.swapchain];
        let image_indices = [self.current_image];
        let wait_semaphores = [self.render_finished_semaphores[self.current_image as usize]];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = {
            let queue = self.ctx.queue()?;
            unsafe { self.swapchain_loader.queue_present(*queue, &present_info) }
        };
        match result {
            Ok(_) | Err(vk::Result::SUBOPTIMAL_KHR) => {}
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                return Err(engine_warn_err!(LOG_SOURCE, "Swapchain out of date during present"));
            }
            Err(e) => return Err(vk_err("Failed to present swapchain image", e)),
        }

        self.acquire()
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| vk_err("Failed to wait idle before swapchain recreate", e))?;
            self.build(width, height)?;
        }
        self.acquire()?;
        engine_info!(LOG_SOURCE, "Swapchain recreated at {}x{}", self.extent.width, self.extent.height);
        Ok(())
    }

    fn back_buffer_count(&self) -> u32 {
        self.back_buffers.len() as u32
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            self.destroy_semaphores();
            self.back_buffers.clear();
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

/// Downcast an engine swapchain to a Vulkan swapchain
pub(crate) fn vulkan_swapchain(swapchain: &dyn Swapchain) -> Result<&VulkanSwapchain> {
    swapchain
        .as_any()
        .downcast_ref::<VulkanSwapchain>()
        .ok_or_else(|| Error::InvalidResource("Swapchain was not created by the Vulkan device".to_string()))
}
