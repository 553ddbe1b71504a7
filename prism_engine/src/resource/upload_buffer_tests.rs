use super::*;
use crate::graphics_device::mock_graphics_device::{MockBuffer, MockGraphicsDevice};

fn contents(buffer: &UploadBuffer) -> Vec<u8> {
    buffer.buffer().as_any().downcast_ref::<MockBuffer>().unwrap().contents()
}

// ============================================================================
// Writes
// ============================================================================

#[test]
fn test_with_data_fills_buffer() {
    let device = MockGraphicsDevice::new();
    let buffer = UploadBuffer::with_data(&device, "lights", BufferUsage::STORAGE, &[1, 2, 3]).unwrap();
    assert_eq!(contents(&buffer), vec![1, 2, 3]);
}

#[test]
fn test_write_at_offset() {
    let device = MockGraphicsDevice::new();
    let buffer = UploadBuffer::new(&device, "materials", 8, BufferUsage::STORAGE).unwrap();
    buffer.write_pod(&0xAABBCCDDu32, 4).unwrap();
    assert_eq!(contents(&buffer), vec![0, 0, 0, 0, 0xDD, 0xCC, 0xBB, 0xAA]);
}

#[test]
fn test_write_ending_exactly_at_size_succeeds() {
    let device = MockGraphicsDevice::new();
    let buffer = UploadBuffer::new(&device, "exact", 8, BufferUsage::STORAGE).unwrap();
    assert!(buffer.write(&[1; 4], 4).is_ok());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_overflowing_write_fails_without_writing() {
    let device = MockGraphicsDevice::new();
    let buffer = UploadBuffer::new(&device, "small", 8, BufferUsage::STORAGE).unwrap();

    assert!(matches!(buffer.write(&[1; 4], 6), Err(Error::InvalidResource(_))));
    assert!(matches!(buffer.write(&[1; 1], u64::MAX), Err(Error::InvalidResource(_))));
    assert_eq!(contents(&buffer), vec![0; 8]);
}

#[test]
fn test_buffer_is_upload_memory() {
    let device = MockGraphicsDevice::new();
    let buffer = UploadBuffer::new(&device, "staging", 8, BufferUsage::TRANSFER_SRC).unwrap();
    assert_eq!(buffer.buffer().desc().location, MemoryLocation::Upload);
    assert!(buffer.buffer().desc().location.is_cpu_visible());
}
