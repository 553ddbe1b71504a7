/// Compute and ray tracing pipeline traits and descriptors

use std::any::Any;

/// Descriptor for creating a compute pipeline
#[derive(Debug, Clone)]
pub struct ComputePipelineDesc {
    /// Debug name
    pub name: String,
    /// SPIR-V words
    pub code: Vec<u32>,
    pub entry_point: String,
    /// Number of root argument slots the shader reads
    pub root_argument_count: u32,
}

/// Compiled compute pipeline
pub trait ComputePipeline: Send + Sync {
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// Hit group: a named set of hit shaders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitGroupDesc {
    /// Export name of the group, used for identifier lookup
    pub name: String,
    /// Entry point of the closest-hit shader in the library
    pub closest_hit: Option<String>,
    /// Entry point of the any-hit shader in the library
    pub any_hit: Option<String>,
}

/// Descriptor for creating a ray tracing pipeline
///
/// Every exported entry point lives in a single shader library.
#[derive(Debug, Clone)]
pub struct RaytracingPipelineDesc {
    /// Debug name
    pub name: String,
    /// SPIR-V words of the shader library
    pub library: Vec<u32>,
    /// Ray generation entry points
    pub ray_generation: Vec<String>,
    /// Miss entry points
    pub miss: Vec<String>,
    pub hit_groups: Vec<HitGroupDesc>,
    /// Ray payload size in bytes
    pub max_payload_size: u32,
    /// Intersection attribute size in bytes
    pub max_attribute_size: u32,
    pub max_recursion_depth: u32,
    /// Number of root argument slots the shaders read
    pub root_argument_count: u32,
    /// SPIR-V of the compute shader that emulates the pipeline when native
    /// ray tracing is unavailable
    pub emulation: Option<Vec<u32>>,
}

impl RaytracingPipelineDesc {
    /// All export names in group order: ray generation, miss, hit groups
    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.ray_generation
            .iter()
            .chain(self.miss.iter())
            .map(String::as_str)
            .chain(self.hit_groups.iter().map(|g| g.name.as_str()))
    }
}

/// Compiled ray tracing pipeline
pub trait RaytracingPipeline: Send + Sync {
    fn name(&self) -> &str;

    /// Shader identifier of an exported ray generation, miss or hit group
    fn shader_identifier(&self, export_name: &str) -> Option<&[u8]>;

    /// Size in bytes of every shader identifier
    fn shader_identifier_size(&self) -> u32;

    fn as_any(&self) -> &dyn Any;
}
