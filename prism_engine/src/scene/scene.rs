/// Scene: node hierarchy, meshes, materials, lights and textures
///
/// Nodes live in a SlotMap arena with stable keys. The root node always has
/// the identity transform; every other node's world transform is its parent's
/// world transform composed with its local one.

use glam::Mat4;
use slotmap::{new_key_type, SlotMap};
use crate::acceleration::MeshGeometry;
use crate::error::{Error, Result};
use super::texture_registry::TextureRegistry;
use super::types::{default_lights, Light, MaterialDesc, MeshRecord, Vertex};

new_key_type! {
    /// Stable key of a node in a `Scene`
    pub struct NodeKey;
}

/// Node of the scene hierarchy
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    local: Mat4,
    meshes: Vec<u32>,
    children: Vec<NodeKey>,
    parent: Option<NodeKey>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_transform(&self) -> Mat4 {
        self.local
    }

    /// Indices into the scene's mesh list
    pub fn meshes(&self) -> &[u32] {
        &self.meshes
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }
}

/// Triangle mesh with per-mesh local indices
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Index into the scene's material list
    pub material: u32,
}

/// One mesh placed in the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneInstance {
    pub mesh: u32,
    pub world: Mat4,
}

/// All meshes concatenated into shared buffers
#[derive(Debug, Clone, Default)]
pub struct SceneGeometry {
    pub vertices: Vec<Vertex>,
    /// Local to each mesh's first vertex
    pub indices: Vec<u32>,
    pub meshes: Vec<MeshGeometry>,
    pub records: Vec<MeshRecord>,
}

pub struct Scene {
    nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,
    meshes: Vec<Mesh>,
    materials: Vec<MaterialDesc>,
    lights: Vec<Light>,
    textures: TextureRegistry,
}

impl Scene {
    /// Empty scene with a root node and the default lights
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node {
            name: "root".to_string(),
            local: Mat4::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
            parent: None,
        });
        Self {
            nodes,
            root,
            meshes: Vec::new(),
            materials: Vec::new(),
            lights: default_lights(),
            textures: TextureRegistry::new(),
        }
    }

    // ===== NODES =====

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a child of `parent` drawing `meshes`
    ///
    /// # Errors
    ///
    /// `InvalidResource` if `parent` is not in the scene or a mesh index is
    /// out of range.
    pub fn add_node(
        &mut self,
        parent: NodeKey,
        name: impl Into<String>,
        local: Mat4,
        meshes: &[u32],
    ) -> Result<NodeKey> {
        let name = name.into();
        if !self.nodes.contains_key(parent) {
            return Err(Error::InvalidResource(format!("Parent of node '{}' is not in the scene", name)));
        }
        if let Some(bad) = meshes.iter().find(|&&m| m as usize >= self.meshes.len()) {
            return Err(Error::InvalidResource(format!(
                "Node '{}' references mesh {} but the scene has {} meshes",
                name, bad, self.meshes.len()
            )));
        }

        let key = self.nodes.insert(Node {
            name,
            local,
            meshes: meshes.to_vec(),
            children: Vec::new(),
            parent: Some(parent),
        });
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(key);
        }
        Ok(key)
    }

    /// Replace the local transform of a node. Returns false for the root or
    /// an unknown key.
    pub fn set_local_transform(&mut self, key: NodeKey, local: Mat4) -> bool {
        if key == self.root {
            return false;
        }
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.local = local;
                true
            }
            None => false,
        }
    }

    /// World transform of a node (identity for the root)
    pub fn world_transform(&self, key: NodeKey) -> Option<Mat4> {
        let mut node = self.nodes.get(key)?;
        let mut world = Mat4::IDENTITY;
        let mut current = key;
        while current != self.root {
            world = node.local * world;
            current = node.parent?;
            node = self.nodes.get(current)?;
        }
        Some(world)
    }

    /// One instance per (node, mesh) pair, depth first from the root
    pub fn instances(&self) -> Vec<SceneInstance> {
        let mut instances = Vec::new();
        let mut stack = vec![(self.root, Mat4::IDENTITY)];

        while let Some((key, world)) = stack.pop() {
            let Some(node) = self.nodes.get(key) else { continue };
            instances.extend(node.meshes.iter().map(|&mesh| SceneInstance { mesh, world }));
            // Reversed so children pop in insertion order
            for &child in node.children.iter().rev() {
                if let Some(child_node) = self.nodes.get(child) {
                    stack.push((child, world * child_node.local));
                }
            }
        }

        instances
    }

    // ===== MESHES =====

    /// Add a mesh and return its index
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the material index is out of range.
    pub fn add_mesh(&mut self, mesh: Mesh) -> Result<u32> {
        if mesh.material as usize >= self.materials.len() {
            return Err(Error::InvalidResource(format!(
                "Mesh '{}' references material {} but the scene has {} materials",
                mesh.name, mesh.material, self.materials.len()
            )));
        }
        self.meshes.push(mesh);
        Ok(self.meshes.len() as u32 - 1)
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Concatenate every mesh into shared vertex and index arrays
    pub fn geometry(&self) -> SceneGeometry {
        let mut geometry = SceneGeometry::default();
        for mesh in &self.meshes {
            let first_vertex = geometry.vertices.len() as u32;
            let first_index = geometry.indices.len() as u32;
            geometry.meshes.push(MeshGeometry {
                first_vertex,
                vertex_count: mesh.vertices.len() as u32,
                first_index,
                index_count: mesh.indices.len() as u32,
            });
            geometry.records.push(MeshRecord {
                first_vertex,
                first_index,
                material: mesh.material,
            });
            geometry.vertices.extend_from_slice(&mesh.vertices);
            geometry.indices.extend_from_slice(&mesh.indices);
        }
        geometry
    }

    // ===== MATERIALS =====

    pub fn add_material(&mut self, material: MaterialDesc) -> u32 {
        self.materials.push(material);
        self.materials.len() as u32 - 1
    }

    pub fn materials(&self) -> &[MaterialDesc] {
        &self.materials
    }

    pub fn material(&self, index: u32) -> Option<&MaterialDesc> {
        self.materials.get(index as usize)
    }

    pub fn material_mut(&mut self, index: u32) -> Option<&mut MaterialDesc> {
        self.materials.get_mut(index as usize)
    }

    // ===== LIGHTS =====

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn set_lights(&mut self, lights: Vec<Light>) {
        self.lights = lights;
    }

    // ===== TEXTURES =====

    pub fn texture_registry(&self) -> &TextureRegistry {
        &self.textures
    }

    pub fn texture_registry_mut(&mut self) -> &mut TextureRegistry {
        &mut self.textures
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
