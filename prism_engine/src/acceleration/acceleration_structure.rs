/// Acceleration structure building
///
/// `AccelerationStructureBuilder::build()` creates one bottom-level structure
/// per mesh and a single top-level structure instancing them. Builds run on
/// the frame context's command list and block until the GPU finished:
///
/// 1. describe one opaque triangle geometry per mesh
/// 2. query prebuild sizes, rejecting zero-sized results
/// 3. allocate one result buffer per structure and one shared scratch buffer
/// 4. wrap every result buffer
/// 5. build the bottom level, one UAV barrier after each build
/// 6. write the instance list (one record per node/mesh pair)
/// 7. build the top level after UAV barriers on every bottom-level structure

use std::sync::Arc;
use crate::acceleration::{InstanceDesc, WrappedPointer};
use crate::error::{Error, Result};
use crate::frame::FrameContext;
use crate::graphics_device::{
    AccelerationStructureBuild, AccelerationStructureInputs, AccelerationStructureKind, Buffer,
    BufferDesc, BufferUsage, BuildFlags, IndexFormat, MemoryLocation, PrebuildInfo,
    ResourceBarrier, ResourceState, TriangleGeometry, VertexFormat,
};
use crate::resource::UploadBuffer;
use crate::scene::SceneInstance;
use crate::{engine_debug, engine_error, engine_info};

/// Instance mask of every scene instance
pub const INSTANCE_MASK: u8 = 1;

// ===== GEOMETRY INPUT =====

/// Range of one mesh inside the shared vertex and index buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshGeometry {
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub first_index: u32,
    pub index_count: u32,
}

/// Shared vertex and index buffers with their CPU copies
///
/// Indices are local to each mesh's first vertex.
#[derive(Clone, Copy)]
pub struct GeometryBuffers<'a> {
    pub vertex_buffer: &'a dyn Buffer,
    pub index_buffer: &'a dyn Buffer,
    /// Bytes per vertex; the position is the first attribute
    pub vertex_stride: u64,
    pub vertex_data: &'a [u8],
    pub index_data: &'a [u32],
}

impl<'a> GeometryBuffers<'a> {
    /// Triangle geometry of `mesh`, validated against the buffer contents
    pub fn describe(&self, index: usize, mesh: &MeshGeometry) -> Result<TriangleGeometry<'a>> {
        if mesh.vertex_count == 0 || mesh.index_count == 0 {
            return Err(Error::UnsupportedGeometry(format!("Mesh {} is empty", index)));
        }
        if mesh.index_count % 3 != 0 {
            return Err(Error::UnsupportedGeometry(format!(
                "Mesh {} has {} indices, not a triangle list",
                index, mesh.index_count
            )));
        }

        let stride = self.vertex_stride as usize;
        let vertex_start = mesh.first_vertex as usize * stride;
        let vertex_end = vertex_start + mesh.vertex_count as usize * stride;
        let index_start = mesh.first_index as usize;
        let index_end = index_start + mesh.index_count as usize;

        let cpu_vertices = self.vertex_data.get(vertex_start..vertex_end).ok_or_else(|| {
            Error::InvalidResource(format!("Mesh {} vertices out of range", index))
        })?;
        let cpu_indices = self.index_data.get(index_start..index_end).ok_or_else(|| {
            Error::InvalidResource(format!("Mesh {} indices out of range", index))
        })?;
        if let Some(bad) = cpu_indices.iter().find(|&&i| i >= mesh.vertex_count) {
            return Err(Error::UnsupportedGeometry(format!(
                "Mesh {} references vertex {} of {}",
                index, bad, mesh.vertex_count
            )));
        }

        Ok(TriangleGeometry {
            vertex_buffer: self.vertex_buffer,
            vertex_offset: vertex_start as u64,
            vertex_count: mesh.vertex_count,
            vertex_stride: self.vertex_stride,
            vertex_format: VertexFormat::R32G32B32_SFLOAT,
            index_buffer: self.index_buffer,
            index_offset: index_start as u64 * 4,
            index_count: mesh.index_count,
            index_format: IndexFormat::U32,
            opaque: true,
            cpu_vertices,
            cpu_indices,
        })
    }
}

// ===== ACCELERATION STRUCTURE =====

/// Built structures of one level
pub struct AccelerationStructure {
    kind: AccelerationStructureKind,
    structures: Vec<Arc<dyn Buffer>>,
    pointers: Vec<WrappedPointer>,
    scratch: Option<Arc<dyn Buffer>>,
    instances: Option<UploadBuffer>,
    instance_descs: Vec<InstanceDesc>,
}

impl AccelerationStructure {
    pub fn kind(&self) -> AccelerationStructureKind {
        self.kind
    }

    /// Number of structures (one per mesh for the bottom level, one for the top level)
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn structure(&self, index: usize) -> Option<&Arc<dyn Buffer>> {
        self.structures.get(index)
    }

    pub fn structures(&self) -> &[Arc<dyn Buffer>] {
        &self.structures
    }

    pub fn pointer(&self, index: usize) -> Option<WrappedPointer> {
        self.pointers.get(index).copied()
    }

    pub fn pointers(&self) -> &[WrappedPointer] {
        &self.pointers
    }

    pub fn scratch(&self) -> Option<&Arc<dyn Buffer>> {
        self.scratch.as_ref()
    }

    /// Instance buffer of a top-level structure
    pub fn instance_buffer(&self) -> Option<&UploadBuffer> {
        self.instances.as_ref()
    }

    /// CPU copy of the instance buffer
    pub fn instance_descs(&self) -> &[InstanceDesc] {
        &self.instance_descs
    }

    pub fn instance_count(&self) -> usize {
        self.instance_descs.len()
    }
}

/// Bottom and top level of a scene
pub struct SceneAccelerationStructures {
    pub bottom_level: AccelerationStructure,
    pub top_level: AccelerationStructure,
}

impl SceneAccelerationStructures {
    /// Pointer bound to the ray tracing shaders
    pub fn top_level_pointer(&self) -> Result<WrappedPointer> {
        self.top_level
            .pointer(0)
            .ok_or_else(|| Error::InvalidResource("Top-level structure was not built".to_string()))
    }
}

/// One instance record per scene instance
///
/// Instance ID is the mesh index, the mask is `INSTANCE_MASK`.
pub fn instance_descs(instances: &[SceneInstance], bottom_level: &[WrappedPointer]) -> Result<Vec<InstanceDesc>> {
    instances
        .iter()
        .map(|instance| -> Result<InstanceDesc> {
            let pointer = bottom_level.get(instance.mesh as usize).ok_or_else(|| {
                Error::InvalidResource(format!(
                    "Instance references mesh {} but only {} meshes exist",
                    instance.mesh,
                    bottom_level.len()
                ))
            })?;
            Ok(InstanceDesc::new(&instance.world, instance.mesh, INSTANCE_MASK, *pointer))
        })
        .collect()
}

// ===== BUILDER =====

pub struct AccelerationStructureBuilder {
    flags: BuildFlags,
}

impl Default for AccelerationStructureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AccelerationStructureBuilder {
    pub fn new() -> Self {
        Self { flags: BuildFlags::PREFER_FAST_TRACE }
    }

    pub fn with_flags(mut self, flags: BuildFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Build every bottom-level structure and the top-level structure
    ///
    /// # Errors
    ///
    /// `UnsupportedGeometry` for empty meshes, an empty instance list, or a
    /// zero-sized prebuild result. These are detected before any allocation.
    pub fn build(
        &self,
        ctx: &mut FrameContext,
        geometry: &GeometryBuffers<'_>,
        meshes: &[MeshGeometry],
        instances: &[SceneInstance],
    ) -> Result<SceneAccelerationStructures> {
        // 1. Describe geometry
        if meshes.is_empty() {
            return Err(Error::UnsupportedGeometry("Scene has no meshes".to_string()));
        }
        if instances.is_empty() {
            return Err(Error::UnsupportedGeometry("Scene has no mesh instances".to_string()));
        }
        let geometries = meshes
            .iter()
            .enumerate()
            .map(|(i, mesh)| geometry.describe(i, mesh))
            .collect::<Result<Vec<_>>>()?;

        // 2. Bottom-level prebuild sizes
        let raytracing = ctx.raytracing().clone();
        let mut bottom_sizes = Vec::with_capacity(geometries.len());
        for (i, geometry) in geometries.iter().enumerate() {
            let inputs = AccelerationStructureInputs::Triangles {
                geometry: std::slice::from_ref(geometry),
                flags: self.flags,
            };
            let info = raytracing.prebuild_info(&inputs)?;
            check_prebuild(&info, &format!("bottom-level structure {}", i))?;
            bottom_sizes.push(info);
        }

        // 3-4. Bottom-level results, wrapped
        let device = ctx.device().clone();
        let path = raytracing.path();
        let mut bottom_structures = Vec::with_capacity(geometries.len());
        let mut bottom_pointers = Vec::with_capacity(geometries.len());
        for (i, info) in bottom_sizes.iter().enumerate() {
            let name = format!("BLAS {}", i);
            let desc = BufferDesc::new(name, info.result_size, MemoryLocation::Default, BufferUsage::empty())
                .with_acceleration_structure(AccelerationStructureKind::BottomLevel);
            let buffer = device.create_buffer(&desc)?;
            bottom_pointers.push(WrappedPointer::create(path, ctx.resource_heap_mut(), buffer.as_ref())?);
            bottom_structures.push(buffer);
        }

        // 6. Instance list
        let descs = instance_descs(instances, &bottom_pointers)?;
        let instance_buffer = UploadBuffer::new(
            device.as_ref(),
            "TLAS instances",
            descs.len() as u64 * InstanceDesc::SIZE,
            BufferUsage::ACCELERATION_STRUCTURE_INPUT,
        )?;
        instance_buffer.write_slice(&descs, 0)?;

        let top_inputs = AccelerationStructureInputs::Instances {
            instance_buffer: instance_buffer.buffer().as_ref(),
            instances: &descs,
            flags: self.flags,
        };
        let top_size = raytracing.prebuild_info(&top_inputs)?;
        check_prebuild(&top_size, "top-level structure")?;

        // 3. Shared scratch
        let scratch_size = bottom_sizes
            .iter()
            .chain(std::iter::once(&top_size))
            .map(|info| info.scratch_size)
            .max()
            .unwrap_or(0)
            .max(1);
        let scratch_desc = BufferDesc::new(
            "AS scratch",
            scratch_size,
            MemoryLocation::Default,
            BufferUsage::SCRATCH | BufferUsage::STORAGE,
        )
        .with_initial_state(ResourceState::UnorderedAccess);
        let scratch = device.create_buffer(&scratch_desc)?;

        let top_desc = BufferDesc::new("TLAS", top_size.result_size, MemoryLocation::Default, BufferUsage::empty())
            .with_acceleration_structure(AccelerationStructureKind::TopLevel);
        let top_structure = device.create_buffer(&top_desc)?;
        let top_pointer = WrappedPointer::create(path, ctx.resource_heap_mut(), top_structure.as_ref())?;

        engine_debug!("prism::AccelerationStructure",
            "Scratch {} bytes shared by {} builds", scratch_size, geometries.len() + 1);

        // 5. Bottom level
        ctx.immediate(|cmd| {
            for (i, geometry) in geometries.iter().enumerate() {
                let build = AccelerationStructureBuild {
                    inputs: AccelerationStructureInputs::Triangles {
                        geometry: std::slice::from_ref(geometry),
                        flags: self.flags,
                    },
                    destination: bottom_structures[i].as_ref(),
                    destination_pointer: bottom_pointers[i],
                    scratch: scratch.as_ref(),
                };
                raytracing.build_acceleration_structure(cmd, &build)?;
                cmd.resource_barrier(&[
                    ResourceBarrier::uav_buffer(bottom_structures[i].as_ref()),
                    ResourceBarrier::uav_buffer(scratch.as_ref()),
                ])?;
            }
            Ok(())
        }).map_err(|e| {
            engine_error!("prism::AccelerationStructure", "Bottom-level build failed: {}", e);
            e
        })?;

        // 7. Top level
        ctx.immediate(|cmd| {
            let barriers: Vec<ResourceBarrier<'_>> = bottom_structures
                .iter()
                .map(|b| ResourceBarrier::uav_buffer(b.as_ref()))
                .collect();
            cmd.resource_barrier(&barriers)?;

            let build = AccelerationStructureBuild {
                inputs: top_inputs,
                destination: top_structure.as_ref(),
                destination_pointer: top_pointer,
                scratch: scratch.as_ref(),
            };
            raytracing.build_acceleration_structure(cmd, &build)?;
            cmd.resource_barrier(&[ResourceBarrier::uav_buffer(top_structure.as_ref())])
        }).map_err(|e| {
            engine_error!("prism::AccelerationStructure", "Top-level build failed: {}", e);
            e
        })?;

        engine_info!("prism::AccelerationStructure",
            "Built {} bottom-level structures and {} instances ({:?} path)",
            bottom_structures.len(), descs.len(), path);

        Ok(SceneAccelerationStructures {
            bottom_level: AccelerationStructure {
                kind: AccelerationStructureKind::BottomLevel,
                structures: bottom_structures,
                pointers: bottom_pointers,
                scratch: Some(scratch.clone()),
                instances: None,
                instance_descs: Vec::new(),
            },
            top_level: AccelerationStructure {
                kind: AccelerationStructureKind::TopLevel,
                structures: vec![top_structure],
                pointers: vec![top_pointer],
                scratch: Some(scratch),
                instances: Some(instance_buffer),
                instance_descs: descs,
            },
        })
    }
}

fn check_prebuild(info: &PrebuildInfo, what: &str) -> Result<()> {
    if info.result_size == 0 {
        engine_error!("prism::AccelerationStructure", "Prebuild of {} reported a zero-sized result", what);
        return Err(Error::UnsupportedGeometry(format!("Zero-sized prebuild result for {}", what)));
    }
    Ok(())
}

#[cfg(test)]
#[path = "acceleration_structure_tests.rs"]
mod tests;
