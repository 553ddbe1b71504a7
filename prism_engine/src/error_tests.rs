//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Debug, Clone, std::error::Error).

use crate::error::{Error, Result};
use crate::graphics_device::DescriptorHeapKind;

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkQueueSubmit failed"));
}

#[test]
fn test_out_of_memory_display() {
    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of GPU memory");
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("buffer is not mapped".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid resource"));
    assert!(display.contains("buffer is not mapped"));
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("no ray tracing capable adapter".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Initialization failed"));
    assert!(display.contains("no ray tracing capable adapter"));
}

#[test]
fn test_descriptor_heap_full_display() {
    let err = Error::DescriptorHeapFull { kind: DescriptorHeapKind::RenderTarget, capacity: 16 };
    let display = format!("{}", err);
    assert!(display.contains("Descriptor heap full"));
    assert!(display.contains("RenderTarget"));
    assert!(display.contains("16"));
}

#[test]
fn test_shader_table_full_display() {
    let err = Error::ShaderTableFull { capacity: 2 };
    assert_eq!(format!("{}", err), "Shader table full: capacity is 2 records");
}

#[test]
fn test_unsupported_geometry_display() {
    let err = Error::UnsupportedGeometry("mesh 3 has no triangles".to_string());
    assert!(format!("{}", err).contains("mesh 3 has no triangles"));
}

#[test]
fn test_device_lost_display() {
    assert_eq!(format!("{}", Error::DeviceLost), "GPU device lost");
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug() {
    let debug = format!("{:?}", Error::BackendError("test".to_string()));
    assert!(debug.contains("BackendError"));

    let debug = format!("{:?}", Error::ShaderTableFull { capacity: 1 });
    assert!(debug.contains("ShaderTableFull"));
}

#[test]
fn test_error_clone() {
    let err = Error::UnsupportedGeometry("empty".to_string());
    let cloned = err.clone();
    assert_eq!(format!("{}", err), format!("{}", cloned));
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

#[test]
fn test_result_propagation() {
    fn inner() -> Result<u32> {
        Err(Error::DeviceLost)
    }

    fn outer() -> Result<u32> {
        let value = inner()?;
        Ok(value + 1)
    }

    assert!(matches!(outer(), Err(Error::DeviceLost)));
}
