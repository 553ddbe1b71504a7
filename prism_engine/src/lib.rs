/*!
# Prism Engine

Core of an interactive progressive path tracer.

A scene (node hierarchy, triangle meshes, materials, lights, textures) is
uploaded once and traced every frame. Each frame adds one sample to a
running average; once enough samples were taken the average is denoised on
the CPU and shown until the image is invalidated by a camera move, a
settings change or a material edit.

This crate is backend-agnostic: GPU work goes through the traits of
`graphics_device`. Backends (Vulkan) implement them in their own crate, with
ray tracing either native or emulated in compute shaders.

## Architecture

- **GraphicsDevice**: factory for buffers, textures, heaps, pipelines and swapchains
- **RaytracingBackend**: acceleration structure builds and ray dispatch, native or emulated
- **FrameContext**: per-back-buffer command lists, fence pacing and descriptor heaps
- **GpuScene**: GPU copy of the scene's geometry, materials, lights and textures
- **SceneAccelerationStructures**: one bottom-level structure per mesh, one top-level for the instances
- **FrameRenderer**: picking, tracing, averaging, denoising and presenting
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod adapter;
pub mod graphics_device;
pub mod resource;
pub mod acceleration;
pub mod shader_table;
pub mod frame;
pub mod scene;
pub mod camera;
pub mod render;

// Main prism namespace module
pub mod prism {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine-wide services
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::RendererConfig;
    pub use crate::adapter::{
        select_adapter, select_raytracing_path, AdapterInfo, AdapterKind, RaytracingPathPreference,
    };

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Device abstraction
    pub mod device {
        pub use crate::graphics_device::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod acceleration {
        pub use crate::acceleration::*;
        pub use crate::shader_table::{ShaderRecord, ShaderTable, SHADER_RECORD_ALIGNMENT};
    }

    pub mod frame {
        pub use crate::frame::*;
    }

    pub mod scene {
        pub use crate::scene::*;
        pub use crate::camera::*;
    }

    pub mod render {
        pub use crate::render::*;
    }
}

// Re-export math library at crate root
pub use glam;
