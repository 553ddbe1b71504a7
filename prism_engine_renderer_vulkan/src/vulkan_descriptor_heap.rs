/// VulkanDescriptorHeap - descriptor heaps on top of bindless descriptor sets
///
/// The shader-visible CBV/SRV/UAV heap is one descriptor set with four
/// update-after-bind arrays that share a single index space: slot `i` of the
/// heap is element `i` of whichever array matches the view written there.
/// The sampler heap is a second set holding one sampler array. Render target
/// and depth-stencil heaps are CPU-only tables of image views.
///
/// Handles are slot indices: start 0, increment 1.

use ash::vk;
use prism_engine::prism::device::{
    DescriptorHeap, DescriptorHeapDesc, DescriptorHeapKind, SamplerDesc, Texture, ViewDesc,
};
use prism_engine::prism::{Error, Result};
use prism_engine::engine_trace;
use std::any::Any;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::vulkan_buffer;
use crate::vulkan_context::{lock, vk_err, GpuContext, LOG_SOURCE};
use crate::vulkan_format::{address_mode_to_vk, filter_to_vk, mipmap_mode_to_vk, texture_format_to_vk};
use crate::vulkan_texture::{full_subresource_range, vulkan_texture};

pub const UNIFORM_BUFFER_BINDING: u32 = 0;
pub const STORAGE_BUFFER_BINDING: u32 = 1;
pub const SAMPLED_IMAGE_BINDING: u32 = 2;
pub const STORAGE_IMAGE_BINDING: u32 = 3;
pub const SAMPLER_BINDING: u32 = 0;

/// Descriptor types of the resource set, indexed by binding
const RESOURCE_BINDINGS: [vk::DescriptorType; 4] = [
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::STORAGE_IMAGE,
];

fn create_set_layout(
    device: &ash::Device,
    types: &[vk::DescriptorType],
    capacity: u32,
) -> Result<vk::DescriptorSetLayout> {
    let bindings: Vec<vk::DescriptorSetLayoutBinding> = types
        .iter()
        .enumerate()
        .map(|(binding, &ty)| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding as u32)
                .descriptor_type(ty)
                .descriptor_count(capacity)
                .stage_flags(vk::ShaderStageFlags::ALL)
        })
        .collect();
    let flags = vec![
        vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND;
        types.len()
    ];
    let mut binding_flags = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&flags);
    let create_info = vk::DescriptorSetLayoutCreateInfo::default()
        .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
        .bindings(&bindings)
        .push_next(&mut binding_flags);
    unsafe {
        device
            .create_descriptor_set_layout(&create_info, None)
            .map_err(|e| vk_err("Failed to create descriptor set layout", e))
    }
}

/// Layout of the bindless CBV/SRV/UAV set
pub(crate) fn create_resource_set_layout(device: &ash::Device, capacity: u32) -> Result<vk::DescriptorSetLayout> {
    create_set_layout(device, &RESOURCE_BINDINGS, capacity)
}

/// Layout of the sampler set
pub(crate) fn create_sampler_set_layout(device: &ash::Device, capacity: u32) -> Result<vk::DescriptorSetLayout> {
    create_set_layout(device, &[vk::DescriptorType::SAMPLER], capacity)
}

enum HeapStorage {
    /// Shader-visible heap: one descriptor set from a dedicated pool
    Bindless {
        pool: vk::DescriptorPool,
        set: vk::DescriptorSet,
        /// Samplers written into a sampler heap, destroyed with it
        samplers: Mutex<Vec<vk::Sampler>>,
    },
    /// CPU-only heap; overwritten views are retired until the heap is dropped
    Views {
        slots: Mutex<Vec<vk::ImageView>>,
        retired: Mutex<Vec<vk::ImageView>>,
    },
}

/// Vulkan descriptor heap
pub struct VulkanDescriptorHeap {
    ctx: Arc<GpuContext>,
    desc: DescriptorHeapDesc,
    storage: HeapStorage,
}

impl VulkanDescriptorHeap {
    pub fn new(ctx: Arc<GpuContext>, desc: &DescriptorHeapDesc) -> Result<Self> {
        if desc.capacity == 0 {
            return Err(Error::InvalidResource(format!("{:?} heap with zero capacity", desc.kind)));
        }

        let storage = match desc.kind {
            DescriptorHeapKind::CbvSrvUav | DescriptorHeapKind::Sampler => {
                let (layout, layout_capacity, types): (_, _, &[vk::DescriptorType]) =
                    if desc.kind == DescriptorHeapKind::CbvSrvUav {
                        (ctx.resource_set_layout, ctx.resource_heap_capacity, &RESOURCE_BINDINGS)
                    } else {
                        (ctx.sampler_set_layout, ctx.sampler_heap_capacity, &[vk::DescriptorType::SAMPLER])
                    };
                if desc.capacity > layout_capacity {
                    return Err(Error::InvalidResource(format!(
                        "{:?} heap of {} slots exceeds the device limit of {}",
                        desc.kind, desc.capacity, layout_capacity
                    )));
                }
                let (pool, set) = Self::allocate_set(&ctx, layout, layout_capacity, types)?;
                HeapStorage::Bindless { pool, set, samplers: Mutex::new(Vec::new()) }
            }
            DescriptorHeapKind::RenderTarget | DescriptorHeapKind::DepthStencil => HeapStorage::Views {
                slots: Mutex::new(vec![vk::ImageView::null(); desc.capacity as usize]),
                retired: Mutex::new(Vec::new()),
            },
        };

        engine_trace!(LOG_SOURCE, "Created {:?} heap with {} slots", desc.kind, desc.capacity);
        Ok(Self { ctx, desc: *desc, storage })
    }

    fn allocate_set(
        ctx: &GpuContext,
        layout: vk::DescriptorSetLayout,
        capacity: u32,
        types: &[vk::DescriptorType],
    ) -> Result<(vk::DescriptorPool, vk::DescriptorSet)> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = types
            .iter()
            .map(|&ty| vk::DescriptorPoolSize { ty, descriptor_count: capacity })
            .collect();
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        unsafe {
            let pool = ctx
                .device
                .create_descriptor_pool(&pool_info, None)
                .map_err(|e| vk_err("Failed to create descriptor pool", e))?;
            let layouts = [layout];
            let alloc_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            match ctx.device.allocate_descriptor_sets(&alloc_info) {
                Ok(sets) => Ok((pool, sets[0])),
                Err(e) => {
                    ctx.device.destroy_descriptor_pool(pool, None);
                    Err(vk_err("Failed to allocate descriptor set", e))
                }
            }
        }
    }

    /// Descriptor set of a shader-visible heap
    pub(crate) fn descriptor_set(&self) -> Option<vk::DescriptorSet> {
        match &self.storage {
            HeapStorage::Bindless { set, .. } => Some(*set),
            HeapStorage::Views { .. } => None,
        }
    }

    /// Image view stored in a render target or depth-stencil slot
    pub fn view(&self, index: u32) -> Option<vk::ImageView> {
        match &self.storage {
            HeapStorage::Views { slots, .. } => slots
                .lock()
                .ok()
                .and_then(|slots| slots.get(index as usize).copied())
                .filter(|view| *view != vk::ImageView::null()),
            HeapStorage::Bindless { .. } => None,
        }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<vk::Sampler> {
        let address_mode = address_mode_to_vk(desc.address_mode);
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.filter))
            .min_filter(filter_to_vk(desc.filter))
            .mipmap_mode(mipmap_mode_to_vk(desc.filter))
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .max_lod(vk::LOD_CLAMP_NONE);
        unsafe {
            self.ctx
                .device
                .create_sampler(&create_info, None)
                .map_err(|e| vk_err("Failed to create sampler", e))
        }
    }

    fn write_descriptor(&self, set: vk::DescriptorSet, index: u32, view: &ViewDesc<'_>) -> Result<()> {
        let buffer_write = |binding: u32, ty: vk::DescriptorType, info: vk::DescriptorBufferInfo| {
            let infos = [info];
            let write = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(binding)
                .dst_array_element(index)
                .descriptor_type(ty)
                .buffer_info(&infos);
            unsafe { self.ctx.device.update_descriptor_sets(&[write], &[]) };
        };
        let image_write = |binding: u32, ty: vk::DescriptorType, info: vk::DescriptorImageInfo| {
            let infos = [info];
            let write = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(binding)
                .dst_array_element(index)
                .descriptor_type(ty)
                .image_info(&infos);
            unsafe { self.ctx.device.update_descriptor_sets(&[write], &[]) };
        };

        match *view {
            ViewDesc::ConstantBuffer { buffer, offset, size } => {
                let info = vk::DescriptorBufferInfo {
                    buffer: vulkan_buffer(buffer)?.buffer,
                    offset,
                    range: size,
                };
                buffer_write(UNIFORM_BUFFER_BINDING, vk::DescriptorType::UNIFORM_BUFFER, info);
            }
            ViewDesc::ShaderResourceBuffer { buffer, first_element, num_elements, stride }
            | ViewDesc::UnorderedAccessBuffer { buffer, first_element, num_elements, stride, raw: false } => {
                let info = vk::DescriptorBufferInfo {
                    buffer: vulkan_buffer(buffer)?.buffer,
                    offset: first_element * stride as u64,
                    range: num_elements as u64 * stride as u64,
                };
                buffer_write(STORAGE_BUFFER_BINDING, vk::DescriptorType::STORAGE_BUFFER, info);
            }
            ViewDesc::UnorderedAccessBuffer { buffer, first_element, num_elements, raw: true, .. } => {
                // Raw views address 32-bit words
                let info = vk::DescriptorBufferInfo {
                    buffer: vulkan_buffer(buffer)?.buffer,
                    offset: first_element * 4,
                    range: num_elements as u64 * 4,
                };
                buffer_write(STORAGE_BUFFER_BINDING, vk::DescriptorType::STORAGE_BUFFER, info);
            }
            ViewDesc::ShaderResourceTexture { texture } => {
                let info = vk::DescriptorImageInfo {
                    sampler: vk::Sampler::null(),
                    image_view: vulkan_texture(texture)?.view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                };
                image_write(SAMPLED_IMAGE_BINDING, vk::DescriptorType::SAMPLED_IMAGE, info);
            }
            ViewDesc::UnorderedAccessTexture { texture } => {
                let info = vk::DescriptorImageInfo {
                    sampler: vk::Sampler::null(),
                    image_view: vulkan_texture(texture)?.view,
                    image_layout: vk::ImageLayout::GENERAL,
                };
                image_write(STORAGE_IMAGE_BINDING, vk::DescriptorType::STORAGE_IMAGE, info);
            }
            ViewDesc::Sampler(ref sampler_desc) => {
                let sampler = self.create_sampler(sampler_desc)?;
                if let HeapStorage::Bindless { samplers, .. } = &self.storage {
                    lock(samplers, "Sampler list")?.push(sampler);
                }
                let info = vk::DescriptorImageInfo {
                    sampler,
                    image_view: vk::ImageView::null(),
                    image_layout: vk::ImageLayout::UNDEFINED,
                };
                image_write(SAMPLER_BINDING, vk::DescriptorType::SAMPLER, info);
            }
            ViewDesc::RenderTarget { .. } | ViewDesc::DepthStencil { .. } => {
                return Err(Error::InvalidResource(format!(
                    "{} view cannot be written into a shader-visible heap",
                    view.label()
                )));
            }
        }
        Ok(())
    }

    fn write_image_view(&self, index: u32, view: &ViewDesc<'_>) -> Result<()> {
        let texture = match *view {
            ViewDesc::RenderTarget { texture } | ViewDesc::DepthStencil { texture } => vulkan_texture(texture)?,
            _ => {
                return Err(Error::InvalidResource(format!(
                    "{} view cannot be written into a {:?} heap",
                    view.label(),
                    self.desc.kind
                )))
            }
        };
        let HeapStorage::Views { slots, retired } = &self.storage else {
            return Ok(());
        };

        let create_info = vk::ImageViewCreateInfo::default()
            .image(texture.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(texture_format_to_vk(texture.info().format))
            .subresource_range(full_subresource_range(texture.info().format));
        let image_view = unsafe {
            self.ctx
                .device
                .create_image_view(&create_info, None)
                .map_err(|e| vk_err("Failed to create attachment view", e))?
        };

        let previous = std::mem::replace(&mut lock(slots, "Heap slots")?[index as usize], image_view);
        if previous != vk::ImageView::null() {
            lock(retired, "Retired views")?.push(previous);
        }
        Ok(())
    }
}

impl DescriptorHeap for VulkanDescriptorHeap {
    fn desc(&self) -> &DescriptorHeapDesc {
        &self.desc
    }

    fn increment_size(&self) -> u32 {
        1
    }

    fn cpu_start(&self) -> u64 {
        0
    }

    fn gpu_start(&self) -> Option<u64> {
        self.desc.kind.is_shader_visible().then_some(0)
    }

    fn write_view(&self, index: u32, view: &ViewDesc<'_>) -> Result<()> {
        if index >= self.desc.capacity {
            return Err(Error::InvalidResource(format!(
                "Slot {} out of range for {:?} heap of {} slots",
                index, self.desc.kind, self.desc.capacity
            )));
        }
        if view.heap_kind() != self.desc.kind {
            return Err(Error::InvalidResource(format!(
                "{} view cannot be written into a {:?} heap",
                view.label(),
                self.desc.kind
            )));
        }

        match &self.storage {
            HeapStorage::Bindless { set, .. } => self.write_descriptor(*set, index, view),
            HeapStorage::Views { .. } => self.write_image_view(index, view),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorHeap {
    fn drop(&mut self) {
        let device = &self.ctx.device;
        unsafe {
            match &mut self.storage {
                HeapStorage::Bindless { pool, samplers, .. } => {
                    // Destroying the pool frees its set
                    device.destroy_descriptor_pool(*pool, None);
                    if let Ok(samplers) = samplers.get_mut() {
                        for &sampler in samplers.iter() {
                            device.destroy_sampler(sampler, None);
                        }
                    }
                }
                HeapStorage::Views { slots, retired } => {
                    let live = slots.get_mut().map(|s| s.as_slice()).unwrap_or(&[]);
                    let old = retired.get_mut().map(|r| r.as_slice()).unwrap_or(&[]);
                    for &view in live.iter().chain(old) {
                        if view != vk::ImageView::null() {
                            device.destroy_image_view(view, None);
                        }
                    }
                }
            }
        }
    }
}

/// Downcast an engine heap to a Vulkan heap
pub(crate) fn vulkan_heap(heap: &dyn DescriptorHeap) -> Result<&VulkanDescriptorHeap> {
    heap.as_any()
        .downcast_ref::<VulkanDescriptorHeap>()
        .ok_or_else(|| Error::InvalidResource(format!("{:?} heap was not created by the Vulkan device", heap.desc().kind)))
}
