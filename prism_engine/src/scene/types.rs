/// Scene records shared with the ray tracing shaders
///
/// Every record is `#[repr(C)]` and `Pod` so it can be copied into GPU
/// buffers as is. Vectors are stored as float arrays to keep the layouts
/// free of SIMD alignment padding.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Texture slot value meaning "no texture"
pub const NO_TEXTURE: u32 = 0xFFFF_FFFF;

/// Vertex (60 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            tangent: [0.0; 3],
            uv: uv.to_array(),
            color: [1.0; 4],
        }
    }

    pub fn with_tangent(mut self, tangent: Vec3) -> Self {
        self.tangent = tangent.to_array();
        self
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color.to_array();
        self
    }
}

/// Material record read by the hit shaders (120 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Material {
    pub color_emissive: [f32; 4],
    pub color_ambient: [f32; 4],
    pub color_diffuse: [f32; 4],
    pub color_specular: [f32; 4],
    pub opacity: f32,
    pub specular_scale: f32,
    pub specular_power: f32,
    pub bump_intensity: f32,
    pub emissive_map: u32,
    pub ambient_map: u32,
    pub diffuse_map: u32,
    pub specular_map: u32,
    pub specular_power_map: u32,
    pub bump_map: u32,
    pub normal_map: u32,
    pub index_of_refraction: f32,
    pub shading_model: u32,
    pub glossiness: f32,
}

/// Texture slots of a material, indices into the scene's texture table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialMaps {
    pub emissive: Option<u32>,
    pub ambient: Option<u32>,
    pub diffuse: Option<u32>,
    pub specular: Option<u32>,
    pub specular_power: Option<u32>,
    pub bump: Option<u32>,
    pub normal: Option<u32>,
}

/// Editable host-side material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDesc {
    pub name: String,
    pub color_emissive: Vec3,
    pub color_ambient: Vec3,
    pub color_diffuse: Vec3,
    pub color_specular: Vec3,
    pub opacity: f32,
    pub specular_scale: f32,
    /// Clamped to 2..=1000 when converted to a `Material`
    pub specular_power: f32,
    pub bump_intensity: f32,
    pub index_of_refraction: f32,
    pub shading_model: u32,
    pub glossiness: f32,
    pub maps: MaterialMaps,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            color_emissive: Vec3::ZERO,
            color_ambient: Vec3::ZERO,
            color_diffuse: Vec3::ONE,
            color_specular: Vec3::ZERO,
            opacity: 1.0,
            specular_scale: 0.5,
            specular_power: 1.0,
            bump_intensity: 5.0,
            index_of_refraction: 1.0,
            shading_model: 0,
            glossiness: 0.0,
            maps: MaterialMaps::default(),
        }
    }
}

impl MaterialDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// GPU record; colours get alpha 1 and missing maps the `NO_TEXTURE` sentinel
    pub fn to_material(&self) -> Material {
        let color = |c: Vec3| c.extend(1.0).to_array();
        let slot = |s: Option<u32>| s.unwrap_or(NO_TEXTURE);
        Material {
            color_emissive: color(self.color_emissive),
            color_ambient: color(self.color_ambient),
            color_diffuse: color(self.color_diffuse),
            color_specular: color(self.color_specular),
            opacity: self.opacity,
            specular_scale: self.specular_scale,
            specular_power: self.specular_power.clamp(2.0, 1000.0),
            bump_intensity: self.bump_intensity,
            emissive_map: slot(self.maps.emissive),
            ambient_map: slot(self.maps.ambient),
            diffuse_map: slot(self.maps.diffuse),
            specular_map: slot(self.maps.specular),
            specular_power_map: slot(self.maps.specular_power),
            bump_map: slot(self.maps.bump),
            normal_map: slot(self.maps.normal),
            index_of_refraction: self.index_of_refraction,
            shading_model: self.shading_model,
            glossiness: self.glossiness,
        }
    }
}

/// Location of a mesh in the shared vertex and index buffers (12 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct MeshRecord {
    pub first_vertex: u32,
    pub first_index: u32,
    pub material: u32,
}

/// Point light (24 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub intensity: [f32; 3],
    pub position: [f32; 3],
}

impl Light {
    pub fn new(intensity: Vec3, position: Vec3) -> Self {
        Self {
            intensity: intensity.to_array(),
            position: position.to_array(),
        }
    }
}

/// Lights of the default scene
pub fn default_lights() -> Vec<Light> {
    vec![
        Light::new(Vec3::splat(2.0), Vec3::new(0.0, 255.0, 0.0)),
        Light::new(Vec3::ZERO, Vec3::new(5000.0, 10000.0, 5000.0)),
    ]
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
