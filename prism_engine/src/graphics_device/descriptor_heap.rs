/// Descriptor heap trait and view descriptors
///
/// A descriptor heap is a fixed-size array of resource views. Shader-visible
/// heaps (resource views and samplers) are bound for a whole frame; render
/// target and depth-stencil heaps are CPU-only.

use std::any::Any;
use crate::error::Result;
use crate::graphics_device::{Buffer, Texture};

/// Kind of views a heap stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Constant buffer, shader resource and unordered access views
    CbvSrvUav,
    Sampler,
    RenderTarget,
    DepthStencil,
}

impl DescriptorHeapKind {
    /// Returns true if heaps of this kind can be bound to shaders
    pub fn is_shader_visible(self) -> bool {
        matches!(self, DescriptorHeapKind::CbvSrvUav | DescriptorHeapKind::Sampler)
    }
}

/// Descriptor for creating a descriptor heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorHeapDesc {
    pub kind: DescriptorHeapKind,
    /// Number of slots
    pub capacity: u32,
}

/// Texture filtering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Texture addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
}

/// Sampler parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: Filter,
    pub address_mode: AddressMode,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            filter: Filter::Linear,
            address_mode: AddressMode::Wrap,
        }
    }
}

/// A view to write into a heap slot
pub enum ViewDesc<'a> {
    /// Constant buffer view over `size` bytes at `offset`
    ConstantBuffer {
        buffer: &'a dyn Buffer,
        offset: u64,
        size: u64,
    },
    /// Read-only structured buffer view
    ShaderResourceBuffer {
        buffer: &'a dyn Buffer,
        first_element: u64,
        num_elements: u32,
        stride: u32,
    },
    ShaderResourceTexture {
        texture: &'a dyn Texture,
    },
    /// Read-write buffer view; `raw` views address the buffer as 32-bit words
    /// and ignore `stride`
    UnorderedAccessBuffer {
        buffer: &'a dyn Buffer,
        first_element: u64,
        num_elements: u32,
        stride: u32,
        raw: bool,
    },
    UnorderedAccessTexture {
        texture: &'a dyn Texture,
    },
    RenderTarget {
        texture: &'a dyn Texture,
    },
    DepthStencil {
        texture: &'a dyn Texture,
    },
    Sampler(SamplerDesc),
}

impl<'a> ViewDesc<'a> {
    /// Heap kind able to hold this view
    pub fn heap_kind(&self) -> DescriptorHeapKind {
        match self {
            ViewDesc::ConstantBuffer { .. }
            | ViewDesc::ShaderResourceBuffer { .. }
            | ViewDesc::ShaderResourceTexture { .. }
            | ViewDesc::UnorderedAccessBuffer { .. }
            | ViewDesc::UnorderedAccessTexture { .. } => DescriptorHeapKind::CbvSrvUav,
            ViewDesc::RenderTarget { .. } => DescriptorHeapKind::RenderTarget,
            ViewDesc::DepthStencil { .. } => DescriptorHeapKind::DepthStencil,
            ViewDesc::Sampler(_) => DescriptorHeapKind::Sampler,
        }
    }

    /// Short name used in logs and mock command traces
    pub fn label(&self) -> &'static str {
        match self {
            ViewDesc::ConstantBuffer { .. } => "cbv",
            ViewDesc::ShaderResourceBuffer { .. } => "srv_buffer",
            ViewDesc::ShaderResourceTexture { .. } => "srv_texture",
            ViewDesc::UnorderedAccessBuffer { raw: true, .. } => "uav_raw",
            ViewDesc::UnorderedAccessBuffer { .. } => "uav_buffer",
            ViewDesc::UnorderedAccessTexture { .. } => "uav_texture",
            ViewDesc::RenderTarget { .. } => "rtv",
            ViewDesc::DepthStencil { .. } => "dsv",
            ViewDesc::Sampler(_) => "sampler",
        }
    }
}

/// Descriptor heap resource trait
///
/// Handles are computed as `start + index * increment_size`.
pub trait DescriptorHeap: Send + Sync {
    fn desc(&self) -> &DescriptorHeapDesc;

    /// Distance in handle units between two consecutive slots
    fn increment_size(&self) -> u32;

    /// Handle of slot 0 for CPU-side view writes
    fn cpu_start(&self) -> u64;

    /// Handle of slot 0 for shader binding, None for CPU-only heaps
    fn gpu_start(&self) -> Option<u64>;

    /// Write a view into the slot at `index`
    ///
    /// The caller guarantees `index < capacity` and a view kind matching the heap.
    fn write_view(&self, index: u32, view: &ViewDesc<'_>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}
