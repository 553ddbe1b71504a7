use super::*;
use crate::graphics_device::mock_graphics_device::{upload_desc, MockDescriptorHeap, MockGraphicsDevice};
use crate::graphics_device::SamplerDesc;

fn allocator(kind: DescriptorHeapKind, capacity: u32) -> DescriptorAllocator {
    let device = MockGraphicsDevice::new();
    DescriptorAllocator::new(&device, kind, capacity).unwrap()
}

// ============================================================================
// Allocation order
// ============================================================================

#[test]
fn test_sequential_allocations_are_distinct_and_increasing() {
    let device = MockGraphicsDevice::new();
    let buffer = device.create_buffer(&upload_desc("constants", 4096)).unwrap();
    let mut heap = DescriptorAllocator::new(&device, DescriptorHeapKind::CbvSrvUav, 64).unwrap();

    let indices: Vec<u32> = (0..64)
        .map(|i| {
            heap.create_descriptor(&ViewDesc::ConstantBuffer {
                buffer: buffer.as_ref(),
                offset: i * 64,
                size: 64,
            })
            .unwrap()
            .index()
        })
        .collect();

    assert_eq!(indices, (0..64).collect::<Vec<u32>>());
    assert_eq!(heap.allocated(), 64);
    assert_eq!(heap.remaining(), 0);
}

#[test]
fn test_views_are_written_into_their_slot() {
    let mut heap = allocator(DescriptorHeapKind::Sampler, 4);
    heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();
    heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();

    let mock = heap.heap().as_any().downcast_ref::<MockDescriptorHeap>().unwrap();
    assert_eq!(mock.written(), vec![(0, "sampler".to_string()), (1, "sampler".to_string())]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_overflow_is_a_hard_error() {
    let mut heap = allocator(DescriptorHeapKind::Sampler, 1);
    heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();

    let result = heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default()));
    assert!(matches!(
        result,
        Err(Error::DescriptorHeapFull { kind: DescriptorHeapKind::Sampler, capacity: 1 })
    ));
    assert_eq!(heap.allocated(), 1);
}

#[test]
fn test_kind_mismatch_is_rejected_without_consuming_a_slot() {
    let mut heap = allocator(DescriptorHeapKind::RenderTarget, 4);
    let result = heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default()));
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(heap.allocated(), 0);
}

// ============================================================================
// Handles
// ============================================================================

#[test]
fn test_handles_offset_by_increment() {
    let mut heap = allocator(DescriptorHeapKind::Sampler, 4);
    heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();
    let second = heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();

    let increment = MockDescriptorHeap::INCREMENT as u64;
    assert_eq!(second.cpu_handle().unwrap(), MockDescriptorHeap::CPU_START + increment);
    assert_eq!(second.gpu_handle().unwrap(), MockDescriptorHeap::GPU_START + increment);
}

#[test]
fn test_cpu_only_heap_has_no_gpu_handle() {
    let device = MockGraphicsDevice::new();
    let texture = device
        .create_texture(&crate::graphics_device::TextureDesc {
            name: "target".to_string(),
            width: 4,
            height: 4,
            format: crate::graphics_device::TextureFormat::R8G8B8A8_UNORM,
            usage: crate::graphics_device::TextureUsage::RENDER_TARGET,
            initial_state: crate::graphics_device::ResourceState::RenderTarget,
        })
        .unwrap();
    let mut heap = DescriptorAllocator::new(&device, DescriptorHeapKind::RenderTarget, 2).unwrap();
    let handle = heap.create_descriptor(&ViewDesc::RenderTarget { texture: texture.as_ref() }).unwrap();

    assert!(handle.cpu_handle().is_ok());
    assert!(matches!(handle.gpu_handle(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_handle_is_invalidated_with_its_heap() {
    let mut heap = allocator(DescriptorHeapKind::Sampler, 2);
    let handle = heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();
    assert!(handle.is_valid());

    drop(heap);
    assert!(!handle.is_valid());
    assert!(handle.cpu_handle().is_err());
}

// ============================================================================
// Rewind
// ============================================================================

#[test]
fn test_rewind_reuses_released_slots() {
    let mut heap = allocator(DescriptorHeapKind::Sampler, 4);
    heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();
    let mark = heap.allocated();
    heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();
    heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();

    heap.rewind(mark).unwrap();
    assert_eq!(heap.allocated(), 1);
    assert_eq!(heap.remaining(), 3);
    let reused = heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();
    assert_eq!(reused.index(), 1);
}

#[test]
fn test_rewind_past_allocation_fails() {
    let mut heap = allocator(DescriptorHeapKind::Sampler, 4);
    heap.create_descriptor(&ViewDesc::Sampler(SamplerDesc::default())).unwrap();
    assert!(matches!(heap.rewind(2), Err(Error::InvalidResource(_))));
    assert_eq!(heap.allocated(), 1);
}
