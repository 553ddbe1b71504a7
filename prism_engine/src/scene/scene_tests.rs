/// Tests for Scene
///
/// Node hierarchy, world transform composition, depth-first instance order
/// and geometry concatenation.

use super::*;
use glam::{Quat, Vec2, Vec3};

// ============================================================================
// Helper Functions
// ============================================================================

fn triangle(material: u32) -> Mesh {
    Mesh {
        name: "triangle".to_string(),
        vertices: vec![
            Vertex::new(Vec3::ZERO, Vec3::Z, Vec2::ZERO),
            Vertex::new(Vec3::X, Vec3::Z, Vec2::X),
            Vertex::new(Vec3::Y, Vec3::Z, Vec2::Y),
        ],
        indices: vec![0, 1, 2],
        material,
    }
}

fn scene_with_meshes(count: usize) -> Scene {
    let mut scene = Scene::new();
    let material = scene.add_material(MaterialDesc::new("default"));
    for _ in 0..count {
        scene.add_mesh(triangle(material)).unwrap();
    }
    scene
}

fn assert_mat_eq(a: Mat4, b: Mat4) {
    assert!(a.abs_diff_eq(b, 1e-5), "{:?} != {:?}", a, b);
}

// ============================================================================
// NODES
// ============================================================================

#[test]
fn test_new_scene_has_identity_root() {
    let scene = Scene::new();
    assert_eq!(scene.node_count(), 1);
    let root = scene.node(scene.root()).unwrap();
    assert_eq!(root.name(), "root");
    assert!(root.parent().is_none());
    assert_eq!(scene.world_transform(scene.root()), Some(Mat4::IDENTITY));
}

#[test]
fn test_add_node_links_parent_and_child() {
    let mut scene = scene_with_meshes(1);
    let root = scene.root();
    let child = scene.add_node(root, "child", Mat4::IDENTITY, &[0]).unwrap();
    assert_eq!(scene.node(child).unwrap().parent(), Some(root));
    assert_eq!(scene.node(root).unwrap().children(), &[child]);
    assert_eq!(scene.node(child).unwrap().meshes(), &[0]);
}

#[test]
fn test_add_node_rejects_unknown_mesh() {
    let mut scene = scene_with_meshes(1);
    let root = scene.root();
    let result = scene.add_node(root, "bad", Mat4::IDENTITY, &[1]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(scene.node_count(), 1);
}

#[test]
fn test_root_transform_cannot_change() {
    let mut scene = Scene::new();
    let root = scene.root();
    assert!(!scene.set_local_transform(root, Mat4::from_scale(Vec3::splat(2.0))));
    assert_eq!(scene.world_transform(root), Some(Mat4::IDENTITY));
}

// ============================================================================
// WORLD TRANSFORMS
// ============================================================================

#[test]
fn test_three_level_chain_equals_explicit_product() {
    let mut scene = scene_with_meshes(1);
    let a = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    let b = Mat4::from_rotation_y(0.7);
    let c = Mat4::from_scale_rotation_translation(
        Vec3::new(2.0, 1.0, 0.5),
        Quat::from_rotation_x(0.3),
        Vec3::new(-4.0, 0.0, 1.0),
    );

    let root = scene.root();
    let n1 = scene.add_node(root, "a", a, &[]).unwrap();
    let n2 = scene.add_node(n1, "b", b, &[]).unwrap();
    let n3 = scene.add_node(n2, "c", c, &[0]).unwrap();

    let expected = a * b * c;
    assert_mat_eq(scene.world_transform(n3).unwrap(), expected);
    assert_mat_eq(scene.world_transform(n2).unwrap(), a * b);

    let instances = scene.instances();
    assert_eq!(instances.len(), 1);
    assert_mat_eq(instances[0].world, expected);
}

#[test]
fn test_child_world_is_parent_world_composed_with_local() {
    let mut scene = scene_with_meshes(1);
    let root = scene.root();
    let parent = scene.add_node(root, "parent", Mat4::from_translation(Vec3::X * 5.0), &[]).unwrap();
    let child = scene.add_node(parent, "child", Mat4::from_translation(Vec3::Y), &[0]).unwrap();

    let world = scene.world_transform(child).unwrap();
    assert!(world.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(5.0, 1.0, 0.0), 1e-6));
}

#[test]
fn test_set_local_transform_moves_subtree() {
    let mut scene = scene_with_meshes(1);
    let root = scene.root();
    let parent = scene.add_node(root, "parent", Mat4::IDENTITY, &[]).unwrap();
    scene.add_node(parent, "child", Mat4::IDENTITY, &[0]).unwrap();

    assert!(scene.set_local_transform(parent, Mat4::from_translation(Vec3::Z)));
    let instances = scene.instances();
    assert_mat_eq(instances[0].world, Mat4::from_translation(Vec3::Z));
}

// ============================================================================
// INSTANCES
// ============================================================================

#[test]
fn test_instance_per_node_mesh_pair() {
    let mut scene = scene_with_meshes(3);
    let root = scene.root();
    let a = scene.add_node(root, "a", Mat4::IDENTITY, &[0, 1]).unwrap();
    scene.add_node(a, "b", Mat4::IDENTITY, &[2]).unwrap();
    scene.add_node(root, "c", Mat4::IDENTITY, &[0, 1, 2]).unwrap();

    let instances = scene.instances();
    assert_eq!(instances.len(), 6);
}

#[test]
fn test_instances_are_depth_first_in_insertion_order() {
    let mut scene = scene_with_meshes(4);
    let root = scene.root();
    let a = scene.add_node(root, "a", Mat4::IDENTITY, &[0]).unwrap();
    scene.add_node(root, "d", Mat4::IDENTITY, &[3]).unwrap();
    let b = scene.add_node(a, "b", Mat4::IDENTITY, &[1]).unwrap();
    scene.add_node(b, "c", Mat4::IDENTITY, &[2]).unwrap();

    let order: Vec<u32> = scene.instances().iter().map(|i| i.mesh).collect();
    assert_eq!(order, vec![0, 1, 2, 3]);
}

#[test]
fn test_unreferenced_meshes_have_no_instances() {
    let scene = scene_with_meshes(2);
    assert!(scene.instances().is_empty());
}

// ============================================================================
// MESHES AND GEOMETRY
// ============================================================================

#[test]
fn test_add_mesh_rejects_unknown_material() {
    let mut scene = Scene::new();
    assert!(matches!(scene.add_mesh(triangle(0)), Err(Error::InvalidResource(_))));
}

#[test]
fn test_geometry_concatenates_meshes() {
    let scene = scene_with_meshes(2);
    let geometry = scene.geometry();

    assert_eq!(geometry.vertices.len(), 6);
    assert_eq!(geometry.indices, vec![0, 1, 2, 0, 1, 2]);
    assert_eq!(geometry.meshes[1], MeshGeometry {
        first_vertex: 3,
        vertex_count: 3,
        first_index: 3,
        index_count: 3,
    });
    assert_eq!(geometry.records[1], MeshRecord { first_vertex: 3, first_index: 3, material: 0 });
}

// ============================================================================
// MATERIALS AND LIGHTS
// ============================================================================

#[test]
fn test_material_edit() {
    let mut scene = scene_with_meshes(0);
    scene.material_mut(0).unwrap().opacity = 0.25;
    assert_eq!(scene.material(0).unwrap().opacity, 0.25);
    assert!(scene.material_mut(1).is_none());
}

#[test]
fn test_default_lights_present() {
    let mut scene = Scene::new();
    assert_eq!(scene.lights().len(), 2);
    scene.set_lights(Vec::new());
    assert!(scene.lights().is_empty());
}
