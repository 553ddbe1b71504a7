/// Top-level instance records

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use crate::acceleration::WrappedPointer;

/// Row-major 3x4 affine transform as consumed by acceleration structure builds
pub type Transform3x4 = [[f32; 4]; 3];

/// Rows of the affine part of `m` (column-vector convention)
pub fn transform_3x4(m: &Mat4) -> Transform3x4 {
    let rows = [m.row(0), m.row(1), m.row(2)];
    rows.map(|r| r.to_array())
}

/// Expand a 3x4 transform back to a 4x4 matrix
pub fn mat4_from_3x4(t: &Transform3x4) -> Mat4 {
    Mat4::from_cols(
        Vec4::new(t[0][0], t[1][0], t[2][0], 0.0),
        Vec4::new(t[0][1], t[1][1], t[2][1], 0.0),
        Vec4::new(t[0][2], t[1][2], t[2][2], 0.0),
        Vec4::new(t[0][3], t[1][3], t[2][3], 1.0),
    )
}

/// One instance of a bottom-level structure (64 bytes)
///
/// Bit layout matches both the hardware instance format and the emulated
/// traversal shader: 24-bit instance ID + 8-bit mask, 24-bit hit group offset +
/// 8-bit flags, then the wrapped pointer of the bottom-level structure.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceDesc {
    pub transform: Transform3x4,
    pub instance_id_and_mask: u32,
    pub hit_group_offset_and_flags: u32,
    pub acceleration_structure: u64,
}

impl InstanceDesc {
    pub const SIZE: u64 = std::mem::size_of::<InstanceDesc>() as u64;

    pub fn new(world: &Mat4, instance_id: u32, mask: u8, bottom_level: WrappedPointer) -> Self {
        Self {
            transform: transform_3x4(world),
            instance_id_and_mask: (instance_id & 0x00FF_FFFF) | ((mask as u32) << 24),
            hit_group_offset_and_flags: 0,
            acceleration_structure: bottom_level.encode(),
        }
    }

    pub fn instance_id(&self) -> u32 {
        self.instance_id_and_mask & 0x00FF_FFFF
    }

    pub fn mask(&self) -> u8 {
        (self.instance_id_and_mask >> 24) as u8
    }

    pub fn hit_group_offset(&self) -> u32 {
        self.hit_group_offset_and_flags & 0x00FF_FFFF
    }

    pub fn flags(&self) -> u8 {
        (self.hit_group_offset_and_flags >> 24) as u8
    }

    pub fn world_transform(&self) -> Mat4 {
        mat4_from_3x4(&self.transform)
    }
}
