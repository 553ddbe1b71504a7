//! Host-built BVH for the compute-emulated ray tracing path
//!
//! Bottom-level structures hold a flat node array followed by the triangles in
//! leaf order; top-level structures hold a node array followed by instance
//! records with their inverse transforms. Both use the same header and 32-byte
//! node layout so the traversal shader walks them with one loop.
//!
//! Nodes are built with a binned surface area heuristic.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use crate::acceleration::{transform_3x4, InstanceDesc, Transform3x4};

/// Number of SAH bins for split evaluation
const NUM_BINS: usize = 12;

const TRAVERSAL_COST: f32 = 1.0;
const INTERSECT_COST: f32 = 1.0;

/// Maximum primitives per leaf before forcing a split
const MAX_LEAF_SIZE: usize = 4;

pub const BOTTOM_LEVEL_MAGIC: u32 = u32::from_le_bytes(*b"PBLS");
pub const TOP_LEVEL_MAGIC: u32 = u32::from_le_bytes(*b"PTLS");

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut aabb = Self::EMPTY;
        for &p in points {
            aabb.grow_point(p);
        }
        aabb
    }

    #[inline]
    pub fn grow_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    #[inline]
    pub fn area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    #[inline]
    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Bounds of this box after an affine transform
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        let mut out = Aabb::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.grow_point(m.transform_point3(corner));
        }
        out
    }
}

/// BVH node (32 bytes)
///
/// Internal node: `left_or_first` = left child index (right child follows it), `count` = 0.
/// Leaf node: `left_or_first` = first primitive slot, `count` > 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub aabb_min: [f32; 3],
    pub left_or_first: u32,
    pub aabb_max: [f32; 3],
    pub count: u32,
}

impl BvhNode {
    fn leaf(aabb: &Aabb, first: usize, count: usize) -> Self {
        Self {
            aabb_min: aabb.min.to_array(),
            left_or_first: first as u32,
            aabb_max: aabb.max.to_array(),
            count: count as u32,
        }
    }

    fn internal(aabb: &Aabb, left: usize) -> Self {
        Self {
            aabb_min: aabb.min.to_array(),
            left_or_first: left as u32,
            aabb_max: aabb.max.to_array(),
            count: 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.count > 0
    }

    pub fn bounds(&self) -> Aabb {
        Aabb {
            min: Vec3::from_array(self.aabb_min),
            max: Vec3::from_array(self.aabb_max),
        }
    }
}

/// Header shared by both structure levels (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct EmulatedHeader {
    pub magic: u32,
    pub node_count: u32,
    pub primitive_count: u32,
    /// Byte offset of the primitive array from the start of the structure
    pub primitives_offset: u32,
}

/// Triangle in leaf order (48 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct EmulatedTriangle {
    pub v0: [f32; 3],
    /// Index of the triangle in the source mesh
    pub primitive_index: u32,
    pub v1: [f32; 3],
    pub _pad0: u32,
    pub v2: [f32; 3],
    pub _pad1: u32,
}

/// Instance in leaf order with its world-to-object transform (112 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct EmulatedInstance {
    pub desc: InstanceDesc,
    pub world_to_object: Transform3x4,
}

/// Built BVH
pub struct Bvh {
    /// Flat node array (index 0 = root)
    pub nodes: Vec<BvhNode>,
    /// Primitive indices in leaf order
    pub primitive_indices: Vec<u32>,
}

impl Bvh {
    /// Build over primitive bounds
    ///
    /// An empty input yields a single empty leaf.
    pub fn build(bounds: &[Aabb]) -> Bvh {
        let n = bounds.len();
        if n == 0 {
            return Bvh {
                nodes: vec![BvhNode::zeroed()],
                primitive_indices: Vec::new(),
            };
        }

        let centroids: Vec<Vec3> = bounds.iter().map(Aabb::centroid).collect();
        let mut indices: Vec<u32> = (0..n as u32).collect();
        let mut nodes: Vec<BvhNode> = Vec::with_capacity(2 * n);
        nodes.push(BvhNode::zeroed());

        struct Task {
            node: usize,
            start: usize,
            end: usize,
        }

        let mut stack = vec![Task { node: 0, start: 0, end: n }];

        while let Some(Task { node, start, end }) = stack.pop() {
            let count = end - start;

            let mut node_aabb = Aabb::EMPTY;
            let mut centroid_bounds = Aabb::EMPTY;
            for &i in &indices[start..end] {
                node_aabb.grow(&bounds[i as usize]);
                centroid_bounds.grow_point(centroids[i as usize]);
            }

            if count <= MAX_LEAF_SIZE {
                nodes[node] = BvhNode::leaf(&node_aabb, start, count);
                continue;
            }

            let split = find_best_split(&indices[start..end], bounds, &centroids, &centroid_bounds);
            let leaf_cost = count as f32 * INTERSECT_COST * node_aabb.area();

            let (axis, position) = match split {
                Some((axis, position, cost)) if cost < leaf_cost => (axis, position),
                // Degenerate centroids: split the range in half to bound leaf size
                None if centroid_bounds.area() == 0.0 => (usize::MAX, 0.0),
                _ => {
                    nodes[node] = BvhNode::leaf(&node_aabb, start, count);
                    continue;
                }
            };

            let mid = if axis == usize::MAX {
                (start + end) / 2
            } else {
                let mid = partition(&mut indices[start..end], |&i| centroids[i as usize][axis] < position) + start;
                if mid == start || mid == end { (start + end) / 2 } else { mid }
            };

            let left = nodes.len();
            nodes.push(BvhNode::zeroed());
            nodes.push(BvhNode::zeroed());
            nodes[node] = BvhNode::internal(&node_aabb, left);

            stack.push(Task { node: left + 1, start: mid, end });
            stack.push(Task { node: left, start, end: mid });
        }

        Bvh { nodes, primitive_indices: indices }
    }

    /// Bounds of the whole hierarchy
    pub fn bounds(&self) -> Aabb {
        self.nodes[0].bounds()
    }
}

/// SAH binned split search across all 3 axes
///
/// Returns (axis, split position, cost), or None if every axis is degenerate.
fn find_best_split(
    indices: &[u32],
    bounds: &[Aabb],
    centroids: &[Vec3],
    centroid_bounds: &Aabb,
) -> Option<(usize, f32, f32)> {
    let mut best: Option<(usize, f32, f32)> = None;

    for axis in 0..3 {
        let extent = centroid_bounds.max[axis] - centroid_bounds.min[axis];
        if extent < 1e-8 {
            continue;
        }

        let mut bin_bounds = [Aabb::EMPTY; NUM_BINS];
        let mut bin_counts = [0usize; NUM_BINS];
        let inv_extent = NUM_BINS as f32 / extent;

        for &i in indices {
            let bin = ((centroids[i as usize][axis] - centroid_bounds.min[axis]) * inv_extent) as usize;
            let bin = bin.min(NUM_BINS - 1);
            bin_bounds[bin].grow(&bounds[i as usize]);
            bin_counts[bin] += 1;
        }

        let mut left_area = [0.0f32; NUM_BINS - 1];
        let mut left_count = [0usize; NUM_BINS - 1];
        let mut sweep = Aabb::EMPTY;
        let mut sweep_count = 0;
        for i in 0..NUM_BINS - 1 {
            sweep.grow(&bin_bounds[i]);
            sweep_count += bin_counts[i];
            left_area[i] = sweep.area();
            left_count[i] = sweep_count;
        }

        sweep = Aabb::EMPTY;
        sweep_count = 0;
        for i in (1..NUM_BINS).rev() {
            sweep.grow(&bin_bounds[i]);
            sweep_count += bin_counts[i];
            let cost = TRAVERSAL_COST
                + INTERSECT_COST
                    * (left_count[i - 1] as f32 * left_area[i - 1] + sweep_count as f32 * sweep.area());

            if best.map_or(true, |(_, _, c)| cost < c) {
                let position = centroid_bounds.min[axis] + (i as f32 / NUM_BINS as f32) * extent;
                best = Some((axis, position, cost));
            }
        }
    }

    best
}

/// Partition in place; returns the number of elements matching `pred`
fn partition<T, F>(slice: &mut [T], pred: F) -> usize
where
    F: Fn(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();
    while left < right {
        if pred(&slice[left]) {
            left += 1;
        } else {
            right -= 1;
            slice.swap(left, right);
        }
    }
    left
}

// ===== SERIALIZED LAYOUT =====

fn max_nodes(primitive_count: u64) -> u64 {
    (2 * primitive_count).saturating_sub(1).max(1)
}

/// Worst-case byte size of an emulated bottom-level structure
pub fn bottom_level_size(triangle_count: u64) -> u64 {
    if triangle_count == 0 {
        return 0;
    }
    std::mem::size_of::<EmulatedHeader>() as u64
        + max_nodes(triangle_count) * std::mem::size_of::<BvhNode>() as u64
        + triangle_count * std::mem::size_of::<EmulatedTriangle>() as u64
}

/// Worst-case byte size of an emulated top-level structure
pub fn top_level_size(instance_count: u64) -> u64 {
    if instance_count == 0 {
        return 0;
    }
    std::mem::size_of::<EmulatedHeader>() as u64
        + max_nodes(instance_count) * std::mem::size_of::<BvhNode>() as u64
        + instance_count * std::mem::size_of::<EmulatedInstance>() as u64
}

/// Read vertex positions (first attribute, 3 floats) out of interleaved vertex bytes
pub fn read_positions(vertex_bytes: &[u8], stride: usize) -> Vec<Vec3> {
    if stride < 12 {
        return Vec::new();
    }
    vertex_bytes
        .chunks_exact(stride)
        .map(|v| Vec3::from_array(bytemuck::pod_read_unaligned::<[f32; 3]>(&v[..12])))
        .collect()
}

fn serialize<P: Pod>(magic: u32, bvh: &Bvh, primitives: &[P]) -> Vec<u8> {
    let header_size = std::mem::size_of::<EmulatedHeader>();
    let nodes_size = bvh.nodes.len() * std::mem::size_of::<BvhNode>();
    let header = EmulatedHeader {
        magic,
        node_count: bvh.nodes.len() as u32,
        primitive_count: primitives.len() as u32,
        primitives_offset: (header_size + nodes_size) as u32,
    };

    let mut bytes = Vec::with_capacity(header_size + nodes_size + std::mem::size_of_val(primitives));
    bytes.extend_from_slice(bytemuck::bytes_of(&header));
    bytes.extend_from_slice(bytemuck::cast_slice(&bvh.nodes));
    bytes.extend_from_slice(bytemuck::cast_slice(primitives));
    bytes
}

/// Build and serialize a bottom-level structure
///
/// Indices reference `positions`; out-of-range indices are clamped to the
/// last vertex. Returns the bytes and the bounds of the geometry.
pub fn encode_bottom_level(positions: &[Vec3], indices: &[u32]) -> (Vec<u8>, Aabb) {
    let last = positions.len().saturating_sub(1);
    let fetch = |i: u32| positions.get((i as usize).min(last)).copied().unwrap_or(Vec3::ZERO);

    let triangles: Vec<[Vec3; 3]> = indices
        .chunks_exact(3)
        .map(|t| [fetch(t[0]), fetch(t[1]), fetch(t[2])])
        .collect();
    let bounds: Vec<Aabb> = triangles.iter().map(|t| Aabb::from_points(t)).collect();
    let bvh = Bvh::build(&bounds);

    let ordered: Vec<EmulatedTriangle> = bvh
        .primitive_indices
        .iter()
        .map(|&i| {
            let [v0, v1, v2] = triangles[i as usize];
            EmulatedTriangle {
                v0: v0.to_array(),
                primitive_index: i,
                v1: v1.to_array(),
                _pad0: 0,
                v2: v2.to_array(),
                _pad1: 0,
            }
        })
        .collect();

    (serialize(BOTTOM_LEVEL_MAGIC, &bvh, &ordered), bvh.bounds())
}

/// Build and serialize a top-level structure
///
/// `object_bounds[i]` is the object-space bounds of the bottom-level structure
/// referenced by `instances[i]`.
pub fn encode_top_level(instances: &[InstanceDesc], object_bounds: &[Aabb]) -> Vec<u8> {
    let world_bounds: Vec<Aabb> = instances
        .iter()
        .zip(object_bounds)
        .map(|(instance, bounds)| bounds.transformed(&instance.world_transform()))
        .collect();
    let bvh = Bvh::build(&world_bounds);

    let ordered: Vec<EmulatedInstance> = bvh
        .primitive_indices
        .iter()
        .map(|&i| {
            let desc = instances[i as usize];
            EmulatedInstance {
                desc,
                world_to_object: transform_3x4(&desc.world_transform().inverse()),
            }
        })
        .collect();

    serialize(TOP_LEVEL_MAGIC, &bvh, &ordered)
}

#[cfg(test)]
#[path = "bvh_tests.rs"]
mod tests;
