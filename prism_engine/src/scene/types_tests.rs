use super::*;

// ============================================================================
// LAYOUT
// ============================================================================

#[test]
fn test_record_sizes() {
    assert_eq!(std::mem::size_of::<Vertex>(), 60);
    assert_eq!(std::mem::size_of::<Material>(), 120);
    assert_eq!(std::mem::size_of::<MeshRecord>(), 12);
    assert_eq!(std::mem::size_of::<Light>(), 24);
}

#[test]
fn test_vertex_defaults_to_white() {
    let v = Vertex::new(Vec3::X, Vec3::Y, Vec2::new(0.5, 0.25));
    assert_eq!(v.position, [1.0, 0.0, 0.0]);
    assert_eq!(v.normal, [0.0, 1.0, 0.0]);
    assert_eq!(v.uv, [0.5, 0.25]);
    assert_eq!(v.color, [1.0; 4]);
    assert_eq!(v.tangent, [0.0; 3]);
}

// ============================================================================
// MATERIAL
// ============================================================================

#[test]
fn test_material_defaults() {
    let m = MaterialDesc::new("default").to_material();
    assert_eq!(m.opacity, 1.0);
    assert_eq!(m.specular_scale, 0.5);
    assert_eq!(m.specular_power, 2.0);
    assert_eq!(m.bump_intensity, 5.0);
    assert_eq!(m.index_of_refraction, 1.0);
    assert_eq!(m.glossiness, 0.0);
    assert_eq!(m.color_diffuse, [1.0, 1.0, 1.0, 1.0]);
    assert_eq!(m.color_emissive, [0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_material_missing_maps_use_sentinel() {
    let mut desc = MaterialDesc::new("textured");
    desc.maps.diffuse = Some(3);
    let m = desc.to_material();
    assert_eq!(m.diffuse_map, 3);
    assert_eq!(m.normal_map, NO_TEXTURE);
    assert_eq!(m.emissive_map, 0xFFFF_FFFF);
}

#[test]
fn test_specular_power_clamped() {
    let mut desc = MaterialDesc::default();
    desc.specular_power = 5000.0;
    assert_eq!(desc.to_material().specular_power, 1000.0);
    desc.specular_power = 40.0;
    assert_eq!(desc.to_material().specular_power, 40.0);
}

// ============================================================================
// LIGHTS
// ============================================================================

#[test]
fn test_default_lights() {
    let lights = default_lights();
    assert_eq!(lights.len(), 2);
    assert_eq!(lights[0].intensity, [2.0, 2.0, 2.0]);
    assert_eq!(lights[0].position, [0.0, 255.0, 0.0]);
    assert_eq!(lights[1].position, [5000.0, 10000.0, 5000.0]);
}
