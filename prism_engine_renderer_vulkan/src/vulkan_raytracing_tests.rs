/// Unit tests for the host-side parts of the ray tracing backends

use super::*;
use prism_engine::prism::device::{IndexFormat, VertexFormat};
use std::any::Any;

// ============================================================================
// Test helpers
// ============================================================================

struct HostBuffer {
    desc: BufferDesc,
}

impl HostBuffer {
    fn new(size: u64) -> Self {
        Self {
            desc: BufferDesc::new("host", size, MemoryLocation::Default, BufferUsage::ACCELERATION_STRUCTURE_INPUT),
        }
    }
}

impl Buffer for HostBuffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn gpu_address(&self) -> u64 {
        0x1000
    }

    fn write(&self, _offset: u64, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn read(&self, _offset: u64, _out: &mut [u8]) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn vertex_bytes(positions: &[[f32; 3]]) -> Vec<u8> {
    bytemuck::cast_slice(positions).to_vec()
}

fn mesh<'a>(buffer: &'a HostBuffer, vertices: &'a [u8], indices: &'a [u32]) -> TriangleGeometry<'a> {
    TriangleGeometry {
        vertex_buffer: buffer,
        vertex_offset: 0,
        vertex_count: (vertices.len() / 12) as u32,
        vertex_stride: 12,
        vertex_format: VertexFormat::R32G32B32_SFLOAT,
        index_buffer: buffer,
        index_offset: 0,
        index_count: indices.len() as u32,
        index_format: IndexFormat::U32,
        opaque: true,
        cpu_vertices: vertices,
        cpu_indices: indices,
    }
}

// ============================================================================
// Emulated dispatch layout
// ============================================================================

#[test]
fn test_emulation_slots_are_the_last_four() {
    assert_eq!(EMULATION_RAY_GENERATION_SLOT, 12);
    assert_eq!(EMULATION_MISS_SLOT, 13);
    assert_eq!(EMULATION_HIT_GROUP_SLOT, 14);
    assert_eq!(EMULATION_EXTENT_SLOT, 15);
    assert_eq!(EMULATION_EXTENT_SLOT, MAX_ROOT_ARGUMENTS - 1);
}

#[test]
fn test_pack_extent() {
    let packed = pack_extent(1920, 1080);
    assert_eq!(packed & 0xFFFF_FFFF, 1920);
    assert_eq!(packed >> 32, 1080);
}

// ============================================================================
// Geometry merging
// ============================================================================

#[test]
fn test_merge_geometry_rebases_indices() {
    let buffer = HostBuffer::new(1024);
    let first = vertex_bytes(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    let second = vertex_bytes(&[[0.0, 0.0, 2.0], [1.0, 0.0, 2.0], [0.0, 1.0, 2.0], [1.0, 1.0, 2.0]]);
    let first_indices = [0, 1, 2];
    let second_indices = [0, 1, 2, 1, 3, 2];

    let meshes = [
        mesh(&buffer, &first, &first_indices),
        mesh(&buffer, &second, &second_indices),
    ];
    let (positions, indices) = merge_geometry(&meshes);

    assert_eq!(positions.len(), 7);
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5, 4, 6, 5]);
    assert_eq!(positions[3], glam::Vec3::new(0.0, 0.0, 2.0));
}

#[test]
fn test_merge_geometry_empty() {
    let (positions, indices) = merge_geometry(&[]);
    assert!(positions.is_empty());
    assert!(indices.is_empty());
}

// ============================================================================
// Bottom-level bounds
// ============================================================================

fn unit_bounds(offset: f32) -> Aabb {
    Aabb {
        min: glam::Vec3::splat(offset),
        max: glam::Vec3::splat(offset + 1.0),
    }
}

#[test]
fn test_bounds_are_found_by_pointer() {
    use ash::vk::Handle;

    let mut bounds = BottomLevelBounds::default();
    bounds.insert(0x10, vk::Buffer::from_raw(1), unit_bounds(0.0));
    bounds.insert(0x20, vk::Buffer::from_raw(2), unit_bounds(5.0));

    assert_eq!(bounds.get(0x20), Some(unit_bounds(5.0)));
    assert_eq!(bounds.get(0x30), None);
    assert_eq!(bounds.len(), 2);
}

#[test]
fn test_dropped_storage_forgets_its_bounds() {
    use ash::vk::Handle;

    let mut bounds = BottomLevelBounds::default();
    bounds.insert(0x10, vk::Buffer::from_raw(1), unit_bounds(0.0));
    bounds.insert(0x20, vk::Buffer::from_raw(2), unit_bounds(5.0));

    assert_eq!(bounds.forget_storage(vk::Buffer::from_raw(1)), 1);
    assert_eq!(bounds.get(0x10), None);
    assert_eq!(bounds.len(), 1);
    assert_eq!(bounds.forget_storage(vk::Buffer::from_raw(1)), 0);
}

#[test]
fn test_rebuild_into_same_storage_replaces_entry() {
    use ash::vk::Handle;

    let mut bounds = BottomLevelBounds::default();
    let storage = vk::Buffer::from_raw(7);
    bounds.insert(0x10, storage, unit_bounds(0.0));
    bounds.insert(0x18, storage, unit_bounds(2.0));

    assert_eq!(bounds.len(), 1);
    assert_eq!(bounds.get(0x10), None);
    assert_eq!(bounds.get(0x18), Some(unit_bounds(2.0)));
}
