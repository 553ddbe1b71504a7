/// Vulkan compute and ray tracing pipelines
///
/// Every pipeline uses the universal pipeline layout of the GpuContext, so
/// descriptor heaps and root tables stay bound across pipeline switches.

use ash::vk;
use prism_engine::prism::device::{
    ComputePipeline, ComputePipelineDesc, RaytracingPipeline, RaytracingPipelineDesc, MAX_ROOT_ARGUMENTS,
};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_debug, engine_error, engine_warn};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_context::{vk_err, GpuContext, LOG_SOURCE};

/// Size of the shader identifiers handed out on the emulated path
pub const EMULATED_IDENTIFIER_SIZE: u32 = 32;

/// Root slots reserved by the emulated dispatch (raygen, miss, hit, extent)
pub const EMULATION_RESERVED_SLOTS: u32 = 4;

/// Create a shader module from SPIR-V words
pub(crate) fn create_shader_module(ctx: &GpuContext, code: &[u32], name: &str) -> Result<vk::ShaderModule> {
    if code.is_empty() {
        return Err(Error::InvalidResource(format!("Shader '{}' has no SPIR-V code", name)));
    }
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);
    unsafe {
        ctx.device
            .create_shader_module(&create_info, None)
            .map_err(|e| vk_err(&format!("Failed to create shader module '{}'", name), e))
    }
}

fn entry_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::InvalidResource(format!("Invalid entry point name '{}'", name)))
}

fn check_root_arguments(name: &str, count: u32, limit: u32) -> Result<()> {
    if count > limit {
        engine_error!(LOG_SOURCE, "Pipeline '{}' reads {} root arguments (limit {})", name, count, limit);
        return Err(Error::InvalidResource(format!(
            "Pipeline '{}' reads {} root arguments (limit {})",
            name, count, limit
        )));
    }
    Ok(())
}

/// Build a compute pipeline on the universal layout
fn build_compute_pipeline(ctx: &GpuContext, name: &str, code: &[u32], entry_point: &str) -> Result<vk::Pipeline> {
    let module = create_shader_module(ctx, code, name)?;
    let entry = match entry_name(entry_point) {
        Ok(entry) => entry,
        Err(e) => {
            unsafe { ctx.device.destroy_shader_module(module, None) };
            return Err(e);
        }
    };

    let stage = vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(module)
        .name(&entry);
    let create_info = vk::ComputePipelineCreateInfo::default()
        .stage(stage)
        .layout(ctx.pipeline_layout);

    let result = unsafe {
        ctx.device
            .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
    };
    // The module is no longer needed once the pipeline exists
    unsafe { ctx.device.destroy_shader_module(module, None) };

    match result {
        Ok(pipelines) => Ok(pipelines[0]),
        Err((_, e)) => Err(vk_err(&format!("Failed to create compute pipeline '{}'", name), e)),
    }
}

// ============================================================================
// Compute pipeline
// ============================================================================

pub struct VulkanComputePipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    name: String,
    root_argument_count: u32,
}

impl VulkanComputePipeline {
    pub fn new(ctx: Arc<GpuContext>, desc: &ComputePipelineDesc) -> Result<Self> {
        check_root_arguments(&desc.name, desc.root_argument_count, MAX_ROOT_ARGUMENTS)?;
        let pipeline = build_compute_pipeline(&ctx, &desc.name, &desc.code, &desc.entry_point)?;
        engine_debug!(LOG_SOURCE, "Created compute pipeline '{}'", desc.name);
        Ok(Self {
            ctx,
            pipeline,
            name: desc.name.clone(),
            root_argument_count: desc.root_argument_count,
        })
    }

    pub fn root_argument_count(&self) -> u32 {
        self.root_argument_count
    }
}

impl ComputePipeline for VulkanComputePipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanComputePipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

// ============================================================================
// Ray tracing pipeline
// ============================================================================

/// Ray tracing pipeline for either ray tracing path
///
/// On the native path `native` holds the hardware pipeline and identifiers are
/// the driver's shader group handles. On the emulated path `emulation` holds
/// the compute pipeline that traces the rays and identifiers carry the group
/// index the emulation shader switches on.
pub struct VulkanRaytracingPipeline {
    ctx: Arc<GpuContext>,
    name: String,
    pub(crate) native: Option<vk::Pipeline>,
    pub(crate) emulation: Option<vk::Pipeline>,
    identifiers: FxHashMap<String, Vec<u8>>,
    identifier_size: u32,
    pub(crate) root_argument_count: u32,
}

fn check_unique_exports(desc: &RaytracingPipelineDesc) -> Result<()> {
    let mut seen = FxHashMap::default();
    for (group, export) in desc.export_names().enumerate() {
        if let Some(first) = seen.insert(export, group) {
            engine_error!(LOG_SOURCE, "Pipeline '{}' exports '{}' twice (groups {} and {})",
                desc.name, export, first, group);
            return Err(Error::InvalidResource(format!(
                "Pipeline '{}' exports '{}' more than once",
                desc.name, export
            )));
        }
    }
    Ok(())
}

/// Identifier of group `index` on the emulated path: the index, then zeros
pub fn emulated_identifier(index: u32) -> Vec<u8> {
    let mut identifier = vec![0u8; EMULATED_IDENTIFIER_SIZE as usize];
    identifier[..4].copy_from_slice(&index.to_le_bytes());
    identifier
}

impl VulkanRaytracingPipeline {
    /// Create a hardware ray tracing pipeline from a single shader library
    pub fn new_native(ctx: Arc<GpuContext>, desc: &RaytracingPipelineDesc) -> Result<Self> {
        check_root_arguments(&desc.name, desc.root_argument_count, MAX_ROOT_ARGUMENTS)?;
        check_unique_exports(desc)?;
        let loaders = ctx.native_raytracing()?;
        let properties = loaders.properties;

        let recursion = if desc.max_recursion_depth > properties.max_recursion_depth {
            engine_warn!(LOG_SOURCE, "Pipeline '{}': recursion depth {} clamped to {}",
                desc.name, desc.max_recursion_depth, properties.max_recursion_depth);
            properties.max_recursion_depth
        } else {
            desc.max_recursion_depth
        };

        // Entry point names, then stages referencing them
        let mut stage_entries: Vec<(vk::ShaderStageFlags, CString)> = Vec::new();
        let mut groups: Vec<vk::RayTracingShaderGroupCreateInfoKHR> = Vec::new();
        let general_group = |stage: u32| {
            vk::RayTracingShaderGroupCreateInfoKHR::default()
                .ty(vk::RayTracingShaderGroupTypeKHR::GENERAL)
                .general_shader(stage)
                .closest_hit_shader(vk::SHADER_UNUSED_KHR)
                .any_hit_shader(vk::SHADER_UNUSED_KHR)
                .intersection_shader(vk::SHADER_UNUSED_KHR)
        };

        for raygen in &desc.ray_generation {
            groups.push(general_group(stage_entries.len() as u32));
            stage_entries.push((vk::ShaderStageFlags::RAYGEN_KHR, entry_name(raygen)?));
        }
        for miss in &desc.miss {
            groups.push(general_group(stage_entries.len() as u32));
            stage_entries.push((vk::ShaderStageFlags::MISS_KHR, entry_name(miss)?));
        }
        for hit_group in &desc.hit_groups {
            let mut closest_hit = vk::SHADER_UNUSED_KHR;
            let mut any_hit = vk::SHADER_UNUSED_KHR;
            if let Some(entry) = &hit_group.closest_hit {
                closest_hit = stage_entries.len() as u32;
                stage_entries.push((vk::ShaderStageFlags::CLOSEST_HIT_KHR, entry_name(entry)?));
            }
            if let Some(entry) = &hit_group.any_hit {
                any_hit = stage_entries.len() as u32;
                stage_entries.push((vk::ShaderStageFlags::ANY_HIT_KHR, entry_name(entry)?));
            }
            groups.push(
                vk::RayTracingShaderGroupCreateInfoKHR::default()
                    .ty(vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP)
                    .general_shader(vk::SHADER_UNUSED_KHR)
                    .closest_hit_shader(closest_hit)
                    .any_hit_shader(any_hit)
                    .intersection_shader(vk::SHADER_UNUSED_KHR),
            );
        }

        let module = create_shader_module(&ctx, &desc.library, &desc.name)?;
        let stages: Vec<vk::PipelineShaderStageCreateInfo> = stage_entries
            .iter()
            .map(|(stage, entry)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(*stage)
                    .module(module)
                    .name(entry)
            })
            .collect();

        let create_info = vk::RayTracingPipelineCreateInfoKHR::default()
            .stages(&stages)
            .groups(&groups)
            .max_pipeline_ray_recursion_depth(recursion)
            .layout(ctx.pipeline_layout);

        let mut pipeline = vk::Pipeline::null();
        let result = unsafe {
            (loaders.ray_tracing_pipeline.fp().create_ray_tracing_pipelines_khr)(
                ctx.device.handle(),
                vk::DeferredOperationKHR::null(),
                vk::PipelineCache::null(),
                1,
                &create_info,
                std::ptr::null(),
                &mut pipeline,
            )
        };
        unsafe { ctx.device.destroy_shader_module(module, None) };
        if result != vk::Result::SUCCESS {
            return Err(vk_err(&format!("Failed to create ray tracing pipeline '{}'", desc.name), result));
        }

        let handle_size = properties.shader_group_handle_size;
        let group_count = groups.len() as u32;
        let handles = unsafe {
            loaders.ray_tracing_pipeline.get_ray_tracing_shader_group_handles(
                pipeline,
                0,
                group_count,
                (handle_size * group_count) as usize,
            )
        };
        let handles = match handles {
            Ok(handles) => handles,
            Err(e) => {
                unsafe { ctx.device.destroy_pipeline(pipeline, None) };
                return Err(vk_err("Failed to get shader group handles", e));
            }
        };

        let identifiers = desc
            .export_names()
            .zip(handles.chunks_exact(handle_size as usize))
            .map(|(name, handle)| (name.to_string(), handle.to_vec()))
            .collect();

        engine_debug!(LOG_SOURCE, "Created ray tracing pipeline '{}' ({} groups, recursion {})",
            desc.name, group_count, recursion);
        Ok(Self {
            ctx,
            name: desc.name.clone(),
            native: Some(pipeline),
            emulation: None,
            identifiers,
            identifier_size: handle_size,
            root_argument_count: desc.root_argument_count,
        })
    }

    /// Create the compute pipeline that emulates `desc`
    ///
    /// The last four root slots are taken by the dispatch, so the shaders may
    /// read at most `MAX_ROOT_ARGUMENTS - 4` arguments.
    pub fn new_emulated(ctx: Arc<GpuContext>, desc: &RaytracingPipelineDesc) -> Result<Self> {
        check_root_arguments(
            &desc.name,
            desc.root_argument_count,
            MAX_ROOT_ARGUMENTS - EMULATION_RESERVED_SLOTS,
        )?;
        check_unique_exports(desc)?;
        let code = desc.emulation.as_ref().ok_or_else(|| {
            engine_error!(LOG_SOURCE, "Pipeline '{}' has no emulation shader", desc.name);
            Error::InvalidResource(format!("Pipeline '{}' has no emulation shader", desc.name))
        })?;
        let pipeline = build_compute_pipeline(&ctx, &desc.name, code, "main")?;

        let identifiers = desc
            .export_names()
            .enumerate()
            .map(|(index, name)| (name.to_string(), emulated_identifier(index as u32)))
            .collect();

        engine_debug!(LOG_SOURCE, "Created emulated ray tracing pipeline '{}'", desc.name);
        Ok(Self {
            ctx,
            name: desc.name.clone(),
            native: None,
            emulation: Some(pipeline),
            identifiers,
            identifier_size: EMULATED_IDENTIFIER_SIZE,
            root_argument_count: desc.root_argument_count,
        })
    }
}

impl RaytracingPipeline for VulkanRaytracingPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn shader_identifier(&self, export_name: &str) -> Option<&[u8]> {
        self.identifiers.get(export_name).map(Vec::as_slice)
    }

    fn shader_identifier_size(&self) -> u32 {
        self.identifier_size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanRaytracingPipeline {
    fn drop(&mut self) {
        unsafe {
            for pipeline in self.native.iter().chain(self.emulation.iter()) {
                self.ctx.device.destroy_pipeline(*pipeline, None);
            }
        }
    }
}

/// Downcast an engine ray tracing pipeline to a Vulkan one
pub(crate) fn vulkan_raytracing_pipeline(pipeline: &dyn RaytracingPipeline) -> Result<&VulkanRaytracingPipeline> {
    pipeline
        .as_any()
        .downcast_ref::<VulkanRaytracingPipeline>()
        .ok_or_else(|| Error::InvalidResource(format!("Pipeline '{}' is not a Vulkan pipeline", pipeline.name())))
}
