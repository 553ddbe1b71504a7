/// Scene data resident on the GPU
///
/// Vertices, indices and mesh records are uploaded once into device-local
/// buffers. Materials and lights stay in upload buffers so they can be
/// edited between frames. Textures get one shader resource view each,
/// allocated contiguously so the first one is the base of the texture table.

use std::mem::size_of;
use std::sync::Arc;
use crate::acceleration::{GeometryBuffers, MeshGeometry};
use crate::error::{Error, Result};
use crate::frame::FrameContext;
use crate::graphics_device::{
    BufferUsage, ResourceBarrier, ResourceState, Texture, TextureDesc, TextureFormat, TextureUsage,
    ViewDesc,
};
use crate::resource::{DescriptorHandle, DeviceBuffer, UploadBuffer};
use crate::{engine_info, engine_warn};
use super::scene::{Scene, SceneGeometry};
use super::texture_registry::{TextureData, TextureSource};
use super::types::{Light, Material, MaterialDesc, Vertex};

/// Texture used when a source fails to load
const FALLBACK_TEXEL: [u8; 4] = [255, 255, 255, 255];

pub struct GpuScene {
    vertices: DeviceBuffer,
    indices: DeviceBuffer,
    meshes: DeviceBuffer,
    materials: UploadBuffer,
    material_count: u32,
    lights: UploadBuffer,
    light_count: u32,
    textures: Vec<Arc<dyn Texture>>,
    texture_table: Option<DescriptorHandle>,
    geometry: SceneGeometry,
}

impl GpuScene {
    /// Upload `scene`, loading its textures through `textures`
    ///
    /// Blocks until every copy completed.
    ///
    /// # Errors
    ///
    /// `UnsupportedGeometry` for a scene without meshes. Textures that fail
    /// to load are replaced by a white texel and logged as warnings.
    pub fn upload(ctx: &mut FrameContext, scene: &Scene, textures: &dyn TextureSource) -> Result<Self> {
        let geometry = scene.geometry();
        if geometry.meshes.is_empty() || geometry.indices.is_empty() {
            return Err(Error::UnsupportedGeometry("Scene has no triangles".to_string()));
        }

        let vertices = DeviceBuffer::with_data(
            ctx,
            "Scene vertices",
            BufferUsage::STORAGE | BufferUsage::VERTEX | BufferUsage::ACCELERATION_STRUCTURE_INPUT,
            bytemuck::cast_slice(&geometry.vertices),
            ResourceState::ShaderResource,
        )?;
        let indices = DeviceBuffer::with_data(
            ctx,
            "Scene indices",
            BufferUsage::STORAGE | BufferUsage::INDEX | BufferUsage::ACCELERATION_STRUCTURE_INPUT,
            bytemuck::cast_slice(&geometry.indices),
            ResourceState::ShaderResource,
        )?;
        let meshes = DeviceBuffer::with_data(
            ctx,
            "Scene meshes",
            BufferUsage::STORAGE,
            bytemuck::cast_slice(&geometry.records),
            ResourceState::ShaderResource,
        )?;

        let material_records: Vec<Material> = scene.materials().iter().map(MaterialDesc::to_material).collect();
        let materials = UploadBuffer::with_data(
            ctx.device().as_ref(),
            "Scene materials",
            BufferUsage::STORAGE,
            bytemuck::cast_slice(&material_records),
        )?;

        // Keep one record so the buffer exists even without lights
        let light_size = (scene.lights().len().max(1) * size_of::<Light>()) as u64;
        let lights = UploadBuffer::new(ctx.device().as_ref(), "Scene lights", light_size, BufferUsage::STORAGE)?;
        lights.write_slice(scene.lights(), 0)?;

        let (textures_gpu, texture_table) = Self::upload_textures(ctx, scene, textures)?;

        engine_info!("prism::GpuScene",
            "Uploaded {} meshes, {} vertices, {} indices, {} materials, {} textures",
            geometry.meshes.len(), geometry.vertices.len(), geometry.indices.len(),
            material_records.len(), textures_gpu.len());

        Ok(Self {
            vertices,
            indices,
            meshes,
            material_count: material_records.len() as u32,
            materials,
            light_count: scene.lights().len() as u32,
            lights,
            textures: textures_gpu,
            texture_table,
            geometry,
        })
    }

    fn upload_textures(
        ctx: &mut FrameContext,
        scene: &Scene,
        source: &dyn TextureSource,
    ) -> Result<(Vec<Arc<dyn Texture>>, Option<DescriptorHandle>)> {
        let registry = scene.texture_registry();
        let mut textures = Vec::with_capacity(registry.len());
        let mut staging = Vec::with_capacity(registry.len());

        for (slot, path) in registry.iter() {
            let data = source.load(path).unwrap_or_else(|err| {
                engine_warn!("prism::GpuScene", "Texture '{}' failed to load ({}), using fallback",
                    path.display(), err);
                TextureData::solid(FALLBACK_TEXEL)
            });

            let texture = ctx.device().create_texture(&TextureDesc {
                name: format!("Texture {}", slot),
                width: data.width(),
                height: data.height(),
                format: TextureFormat::R8G8B8A8_UNORM,
                usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
                initial_state: ResourceState::CopyDest,
            })?;
            let upload = UploadBuffer::with_data(
                ctx.device().as_ref(),
                &format!("Texture {} (upload)", slot),
                BufferUsage::TRANSFER_SRC,
                data.pixels(),
            )?;
            textures.push(texture);
            staging.push(upload);
        }

        if textures.is_empty() {
            return Ok((textures, None));
        }

        ctx.immediate(|cmd| {
            for (texture, upload) in textures.iter().zip(&staging) {
                cmd.copy_buffer_to_texture(texture.as_ref(), upload.buffer().as_ref())?;
            }
            let barriers: Vec<_> = textures
                .iter()
                .map(|t| ResourceBarrier::texture(t.as_ref(), ResourceState::CopyDest, ResourceState::ShaderResource))
                .collect();
            cmd.resource_barrier(&barriers)
        })?;

        let mut table = None;
        for texture in &textures {
            let handle = ctx
                .resource_heap_mut()
                .create_descriptor(&ViewDesc::ShaderResourceTexture { texture: texture.as_ref() })?;
            table.get_or_insert(handle);
        }

        Ok((textures, table))
    }

    /// Rewrite one material record
    pub fn update_material(&self, index: u32, material: &MaterialDesc) -> Result<()> {
        if index >= self.material_count {
            return Err(Error::InvalidResource(format!(
                "Material {} out of range ({} materials)",
                index, self.material_count
            )));
        }
        let offset = index as u64 * size_of::<Material>() as u64;
        self.materials.write_pod(&material.to_material(), offset)
    }

    /// Rewrite every material record
    pub fn update_materials(&self, materials: &[MaterialDesc]) -> Result<()> {
        if materials.len() as u32 != self.material_count {
            return Err(Error::InvalidResource(format!(
                "Expected {} materials, got {}",
                self.material_count,
                materials.len()
            )));
        }
        let records: Vec<Material> = materials.iter().map(MaterialDesc::to_material).collect();
        self.materials.write_slice(&records, 0)
    }

    /// Shared buffers as acceleration structure build input
    pub fn geometry_buffers(&self) -> GeometryBuffers<'_> {
        GeometryBuffers {
            vertex_buffer: self.vertices.buffer().as_ref(),
            index_buffer: self.indices.buffer().as_ref(),
            vertex_stride: size_of::<Vertex>() as u64,
            vertex_data: bytemuck::cast_slice(&self.geometry.vertices),
            index_data: &self.geometry.indices,
        }
    }

    pub fn mesh_geometry(&self) -> &[MeshGeometry] {
        &self.geometry.meshes
    }

    pub fn vertices(&self) -> &DeviceBuffer {
        &self.vertices
    }

    pub fn indices(&self) -> &DeviceBuffer {
        &self.indices
    }

    pub fn meshes(&self) -> &DeviceBuffer {
        &self.meshes
    }

    pub fn materials(&self) -> &UploadBuffer {
        &self.materials
    }

    pub fn material_count(&self) -> u32 {
        self.material_count
    }

    pub fn lights(&self) -> &UploadBuffer {
        &self.lights
    }

    pub fn light_count(&self) -> u32 {
        self.light_count
    }

    pub fn textures(&self) -> &[Arc<dyn Texture>] {
        &self.textures
    }

    /// First texture view, None when the scene has no textures
    pub fn texture_table(&self) -> Option<&DescriptorHandle> {
        self.texture_table.as_ref()
    }
}

#[cfg(test)]
#[path = "gpu_scene_tests.rs"]
mod tests;
