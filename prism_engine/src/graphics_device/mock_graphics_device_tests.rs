//! Unit tests for the mock device itself

use super::*;

// ============================================================================
// Fence
// ============================================================================

#[test]
fn test_fence_without_latency_completes_on_signal() {
    let fence = MockFence::new(0, 0, 1);
    fence.signal(5);
    assert_eq!(fence.peek(), 5);
}

#[test]
fn test_fence_completes_in_signal_order() {
    let fence = MockFence::new(0, 8, 42);
    for value in 1..=20 {
        fence.signal(value);
    }
    let mut last = 0;
    for _ in 0..500 {
        let completed = fence.completed_value().unwrap();
        assert!(completed >= last);
        last = completed;
    }
    assert_eq!(last, 20);
}

#[test]
fn test_fence_wait_blocks_until_value() {
    let fence = MockFence::new(0, 1000, 7);
    fence.signal(1);
    fence.signal(2);
    fence.wait(1).unwrap();
    assert!(fence.peek() >= 1);
}

#[test]
fn test_fence_wait_on_unsignaled_value_fails() {
    let fence = MockFence::new(0, 0, 1);
    fence.signal(1);
    assert!(fence.wait(2).is_err());
}

// ============================================================================
// Command list
// ============================================================================

#[test]
fn test_recording_into_closed_list_fails() {
    let mut cmd = MockCommandList::new();
    assert!(cmd.dispatch(1, 1, 1).is_err());
    cmd.begin().unwrap();
    cmd.dispatch(1, 1, 1).unwrap();
    cmd.end().unwrap();
    assert_eq!(cmd.commands, vec!["begin", "dispatch 1x1x1", "end"]);
}

#[test]
fn test_buffer_copy_executes_eagerly() {
    let device = MockGraphicsDevice::new();
    let src = device.create_buffer(&upload_desc("src", 8)).unwrap();
    let dst = device.create_buffer(&upload_desc("dst", 8)).unwrap();
    src.write(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

    let mut cmd = MockCommandList::new();
    cmd.begin().unwrap();
    cmd.copy_buffer_region(dst.as_ref(), 4, src.as_ref(), 0, 4).unwrap();

    let mut out = [0u8; 8];
    dst.read(0, &mut out).unwrap();
    assert_eq!(out, [0, 0, 0, 0, 1, 2, 3, 4]);
}

// ============================================================================
// Device
// ============================================================================

#[test]
fn test_buffer_addresses_do_not_overlap() {
    let device = MockGraphicsDevice::new();
    let a = device.create_buffer(&upload_desc("a", 300)).unwrap();
    let b = device.create_buffer(&upload_desc("b", 16)).unwrap();
    assert!(b.gpu_address() >= a.gpu_address() + 300);
}

#[test]
fn test_default_buffer_is_not_cpu_writable() {
    let device = MockGraphicsDevice::new();
    let desc = BufferDesc::new("gpu", 16, MemoryLocation::Default, crate::graphics_device::BufferUsage::STORAGE);
    let buffer = device.create_buffer(&desc).unwrap();
    assert!(buffer.write(0, &[0; 4]).is_err());
}

#[test]
fn test_swapchain_round_robin() {
    let mut swapchain = MockSwapchain::new(SwapchainDesc { width: 4, height: 4, back_buffer_count: 3 });
    let order: Vec<u32> = (0..4).map(|_| swapchain.present().unwrap()).collect();
    assert_eq!(order, vec![1, 2, 0, 1]);
}
