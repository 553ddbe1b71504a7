//! Acceleration structures
//!
//! Bottom-level structures are built per mesh, the top-level structure
//! instances them with world transforms. Every reference to a built structure
//! goes through a `WrappedPointer` so the native and compute-emulated ray
//! tracing paths share the same code.

pub mod wrapped_pointer;
pub mod instance;
pub mod bvh;
pub mod acceleration_structure;

pub use wrapped_pointer::WrappedPointer;
pub use instance::{transform_3x4, mat4_from_3x4, InstanceDesc, Transform3x4};
pub use bvh::Aabb;
pub use acceleration_structure::{
    instance_descs, AccelerationStructure, AccelerationStructureBuilder, GeometryBuffers, MeshGeometry,
    SceneAccelerationStructures, INSTANCE_MASK,
};
