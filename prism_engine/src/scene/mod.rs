//! Scene module
//!
//! Host-side scene description (node hierarchy, meshes, materials, lights,
//! textures) and its GPU-resident counterpart.

mod types;
mod scene;
mod texture_registry;
mod gpu_scene;

pub use types::{
    default_lights, Light, Material, MaterialDesc, MaterialMaps, MeshRecord, Vertex, NO_TEXTURE,
};
pub use scene::{Mesh, Node, NodeKey, Scene, SceneGeometry, SceneInstance};
pub use texture_registry::{TextureData, TextureRegistry, TextureSource};
pub use gpu_scene::GpuScene;
