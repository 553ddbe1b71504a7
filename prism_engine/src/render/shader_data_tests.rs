use super::*;
use std::mem::offset_of;
use crate::graphics_device::mock_graphics_device::{MockBuffer, MockGraphicsDevice};

// ============================================================================
// LAYOUT
// ============================================================================

#[test]
fn test_scene_constants_layout() {
    assert_eq!(size_of::<SceneConstants>(), 144);
    assert_eq!(offset_of!(SceneConstants, camera_position), 64);
    assert_eq!(offset_of!(SceneConstants, gi_num_bounces), 80);
    assert_eq!(offset_of!(SceneConstants, aa_sampling_point), 96);
    assert_eq!(offset_of!(SceneConstants, ao_size), 112);
    assert_eq!(offset_of!(SceneConstants, picking_point), 120);
    assert_eq!(offset_of!(SceneConstants, sky_color), 128);
}

#[test]
fn test_averager_constants() {
    assert_eq!(size_of::<AveragerConstants>(), 16);
    assert_eq!(AveragerConstants::new(true, 2.2).clear_samples, 0);
    assert_eq!(AveragerConstants::new(false, 2.2).clear_samples, 1);
}

// ============================================================================
// RING
// ============================================================================

#[test]
fn test_slots_are_256_byte_aligned() {
    let device = MockGraphicsDevice::new();
    let ring = ConstantBufferRing::<SceneConstants>::new(&device, "Scene constants", 3).unwrap();
    assert_eq!(ring.slot_size(), 256);
    assert_eq!(ring.buffer().size(), 768);
    assert!(ring.buffer().buffer().desc().usage.contains(BufferUsage::CONSTANT));
}

#[test]
fn test_write_returns_slot_addresses_round_robin() {
    let device = MockGraphicsDevice::new();
    let mut ring = ConstantBufferRing::<AveragerConstants>::new(&device, "Averager constants", 2).unwrap();
    let base = ring.buffer().gpu_address();

    let a = ring.write(&AveragerConstants::new(true, 1.0)).unwrap();
    let b = ring.write(&AveragerConstants::new(false, 2.0)).unwrap();
    let c = ring.write(&AveragerConstants::new(false, 3.0)).unwrap();

    assert_eq!(a, base);
    assert_eq!(b, base + 256);
    assert_eq!(c, base);

    let bytes = ring.buffer().buffer().as_any().downcast_ref::<MockBuffer>().unwrap().contents();
    let first: AveragerConstants = bytemuck::pod_read_unaligned(&bytes[..16]);
    let second: AveragerConstants = bytemuck::pod_read_unaligned(&bytes[256..272]);
    assert_eq!(first.gamma, 3.0);
    assert_eq!(second.gamma, 2.0);
}

#[test]
fn test_zero_slots_rejected() {
    let device = MockGraphicsDevice::new();
    assert!(ConstantBufferRing::<SceneConstants>::new(&device, "empty", 0).is_err());
}
