//! Error types for the Prism engine
//!
//! This module defines the error types used throughout the engine,
//! including device initialization, resource management, descriptor
//! allocation and acceleration structure builds.

use std::fmt;
use crate::graphics_device::DescriptorHeapKind;

/// Result type for Prism engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prism engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (driver call failure, invalid usage)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (buffer, texture, descriptor, pipeline, etc.)
    InvalidResource(String),

    /// Initialization failed (adapter, device, swapchain)
    InitializationFailed(String),

    /// A descriptor heap has no free slot left
    DescriptorHeapFull {
        kind: DescriptorHeapKind,
        capacity: u32,
    },

    /// A shader table already holds its declared number of records
    ShaderTableFull {
        capacity: u32,
    },

    /// Geometry the acceleration structure builder cannot handle
    UnsupportedGeometry(String),

    /// The device was removed or reset
    DeviceLost,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::DescriptorHeapFull { kind, capacity } => {
                write!(f, "Descriptor heap full: {:?} heap has {} slots", kind, capacity)
            }
            Error::ShaderTableFull { capacity } => {
                write!(f, "Shader table full: capacity is {} records", capacity)
            }
            Error::UnsupportedGeometry(msg) => write!(f, "Unsupported geometry: {}", msg),
            Error::DeviceLost => write!(f, "GPU device lost"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
