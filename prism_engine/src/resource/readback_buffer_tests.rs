use super::*;
use crate::graphics_device::mock_graphics_device::{MockBuffer, MockGraphicsDevice};

fn readback_with(bytes: &[u8]) -> ReadbackBuffer {
    let device = MockGraphicsDevice::new();
    let readback = ReadbackBuffer::new(&device, "picking readback", bytes.len() as u64).unwrap();
    readback.buffer().as_any().downcast_ref::<MockBuffer>().unwrap().poke(0, bytes);
    readback
}

#[test]
fn test_read_pod_by_index() {
    let values: [i32; 3] = [-1, 7, 42];
    let readback = readback_with(bytemuck::cast_slice(&values));
    let mapping = readback.map().unwrap();
    assert_eq!(mapping.read_pod::<i32>(0).unwrap(), -1);
    assert_eq!(mapping.read_pod::<i32>(2).unwrap(), 42);
}

#[test]
fn test_read_past_end_fails() {
    let readback = readback_with(&[0; 8]);
    let mapping = readback.map().unwrap();
    assert!(matches!(mapping.read_pod::<u64>(1), Err(Error::InvalidResource(_))));
}

#[test]
fn test_to_vec_ignores_trailing_bytes() {
    let readback = readback_with(&[1, 0, 0, 0, 2, 0, 0, 0, 3]);
    assert_eq!(readback.map().unwrap().to_vec::<u32>(), vec![1, 2]);
}

#[test]
fn test_readback_buffers_live_in_readback_memory() {
    let readback = readback_with(&[0; 4]);
    assert_eq!(readback.buffer().desc().location, MemoryLocation::Readback);
    assert_eq!(readback.size(), 4);
}
