/// Progressive path tracing frame loop
///
/// Every frame shoots one picking ray through the cursor, then either adds a
/// sample to the running average and shows it, or, once `sample_cap` samples
/// were taken, reads the average back, denoises it on the CPU and shows the
/// result:
///
/// ```text
/// picking -> readback -> update -> [trace -> average -> copy] | [readback -> denoise -> upload] -> present
/// ```
///
/// Each phase is submitted on its own and waited for before the next one.

use std::sync::Arc;
use glam::{Vec2, Vec3};
use crate::acceleration::{AccelerationStructureBuilder, SceneAccelerationStructures, WrappedPointer};
use crate::camera::Camera;
use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::frame::FrameContext;
use crate::graphics_device::{
    BufferUsage, CommandList, ComputePipeline, ComputePipelineDesc, DispatchRaysDesc, RaytracingBackend,
    RaytracingPipeline, RaytracingPipelineDesc, ResourceBarrier, ResourceState, RootArgument, Texture,
    TextureDesc, TextureFormat, TextureUsage, ViewDesc,
};
use crate::resource::{DeviceBuffer, ReadbackBuffer, UploadBuffer};
use crate::scene::{GpuScene, MaterialDesc, Scene, TextureSource};
use crate::shader_table::ShaderTable;
use crate::{engine_debug, engine_error, engine_info, engine_warn};
use super::denoiser::{to_rgba8, Denoiser, DenoiserInput};
use super::settings::{RenderSettings, SampleAccumulator};
use super::shader_data::{AveragerConstants, ConstantBufferRing, SceneConstants};

/// Thread group size of the averaging shader in both dimensions
pub const AVERAGER_GROUP_SIZE: u32 = 8;

/// Bytes per pixel of the RGBA32F targets
const FLOAT4_SIZE: u64 = 16;

/// Root argument slots of the path tracing and picking pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GlobalRootSlot {
    AccelerationStructure = 0,
    Output = 1,
    Normals = 2,
    Albedo = 3,
    SceneConstants = 4,
    Materials = 5,
    Textures = 6,
    Meshes = 7,
    Vertices = 8,
    Indices = 9,
    Lights = 10,
    PickingBuffer = 11,
}

/// Root argument slots of the averaging pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AveragerRootSlot {
    Constants = 0,
    InputColor = 1,
    InputNormals = 2,
    InputAlbedo = 3,
    OutputTexture = 4,
    OutputColor = 5,
    OutputNormals = 6,
    OutputAlbedo = 7,
}

/// Global slots bound by the ray tracing passes
pub const GLOBAL_ROOT_ARGUMENT_COUNT: u32 = 12;

/// Slots bound by the averaging pass
pub const AVERAGER_ROOT_ARGUMENT_COUNT: u32 = 8;

/// Shader programs of the renderer
#[derive(Debug, Clone)]
pub struct RendererShaders {
    pub path_tracer: RaytracingPipelineDesc,
    /// Writes the mesh ID under the picking point, -1 for a miss
    pub picking: RaytracingPipelineDesc,
    pub averager: ComputePipelineDesc,
}

/// User input of one frame
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput {
    /// Cursor position in pixels
    pub cursor: Vec2,
    /// Select the material of the mesh under the cursor
    pub select_material: bool,
    /// Restart accumulation
    pub clear_samples: bool,
    /// Camera translation along its right, up and forward axes
    pub translate: Vec3,
    /// Pitch, yaw and roll added to the camera
    pub rotate: Vec3,
}

/// What a rendered frame showed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A new sample was averaged in
    Accumulated { sample_count: u32 },
    /// Accumulation is frozen, the last average was shown again
    Frozen { sample_count: u32 },
    /// The sample cap was reached and the denoised average was shown
    Denoised,
}

// ============================================================================
// Passes and targets
// ============================================================================

/// Ray tracing pipeline with its three shader tables
struct RaytracingPass {
    pipeline: Arc<dyn RaytracingPipeline>,
    ray_generation: ShaderTable,
    miss: ShaderTable,
    hit_group: ShaderTable,
}

impl RaytracingPass {
    fn new(ctx: &FrameContext, desc: &RaytracingPipelineDesc) -> Result<Self> {
        let Some(ray_generation_export) = desc.ray_generation.first() else {
            engine_error!("prism::FrameRenderer", "Pipeline '{}' has no ray generation shader", desc.name);
            return Err(Error::InvalidResource(format!("Pipeline '{}' has no ray generation shader", desc.name)));
        };
        if desc.miss.is_empty() || desc.hit_groups.is_empty() {
            engine_error!("prism::FrameRenderer", "Pipeline '{}' needs miss shaders and hit groups", desc.name);
            return Err(Error::InvalidResource(format!(
                "Pipeline '{}' needs miss shaders and hit groups",
                desc.name
            )));
        }
        check_root_arguments(&desc.name, desc.root_argument_count, GLOBAL_ROOT_ARGUMENT_COUNT)?;

        let device = ctx.device().as_ref();
        let pipeline = device.create_raytracing_pipeline(desc)?;
        let record_size = pipeline.shader_identifier_size() as u64;

        let mut ray_generation = ShaderTable::new(device, &format!("{} ray generation", desc.name), 1, record_size)?;
        ray_generation.push_export(pipeline.as_ref(), ray_generation_export, &[])?;

        let mut miss = ShaderTable::new(device, &format!("{} miss", desc.name), desc.miss.len() as u32, record_size)?;
        for export in &desc.miss {
            miss.push_export(pipeline.as_ref(), export, &[])?;
        }

        let mut hit_group = ShaderTable::new(
            device,
            &format!("{} hit groups", desc.name),
            desc.hit_groups.len() as u32,
            record_size,
        )?;
        for group in &desc.hit_groups {
            hit_group.push_export(pipeline.as_ref(), &group.name, &[])?;
        }

        Ok(Self { pipeline, ray_generation, miss, hit_group })
    }

    fn dispatch_desc(&self, width: u32, height: u32) -> DispatchRaysDesc<'_> {
        DispatchRaysDesc {
            ray_generation: self.ray_generation.region(),
            miss: self.miss.region(),
            hit_group: self.hit_group.region(),
            width,
            height,
            depth: 1,
        }
    }
}

fn check_root_arguments(name: &str, declared: u32, required: u32) -> Result<()> {
    if declared < required {
        engine_error!("prism::FrameRenderer", "Pipeline '{}' reads {} root arguments, {} are bound",
            name, declared, required);
        return Err(Error::InvalidResource(format!(
            "Pipeline '{}' declares {} root arguments but the renderer binds {}",
            name, declared, required
        )));
    }
    Ok(())
}

/// Textures and buffers written by the passes
struct RenderTargets {
    /// RGBA32F outputs of the path tracer
    color: Arc<dyn Texture>,
    normals: Arc<dyn Texture>,
    albedo: Arc<dyn Texture>,
    /// Gamma-corrected RGBA8 average, copied to the back buffer
    display: Arc<dyn Texture>,
    averaged_color: DeviceBuffer,
    averaged_normals: DeviceBuffer,
    averaged_albedo: DeviceBuffer,
    picking: DeviceBuffer,
}

impl RenderTargets {
    fn new(ctx: &FrameContext, width: u32, height: u32) -> Result<Self> {
        let device = ctx.device();
        let texture = |name: &str, format: TextureFormat| {
            device.create_texture(&TextureDesc {
                name: name.to_string(),
                width,
                height,
                format,
                usage: TextureUsage::STORAGE | TextureUsage::TRANSFER_SRC,
                initial_state: ResourceState::UnorderedAccess,
            })
        };
        let float_buffer = |name: &str| {
            DeviceBuffer::new(
                ctx,
                name,
                width as u64 * height as u64 * FLOAT4_SIZE,
                BufferUsage::STORAGE | BufferUsage::TRANSFER_SRC,
                ResourceState::UnorderedAccess,
            )
        };

        Ok(Self {
            color: texture("Path tracer output", TextureFormat::R32G32B32A32_SFLOAT)?,
            normals: texture("Path tracer normals", TextureFormat::R32G32B32A32_SFLOAT)?,
            albedo: texture("Path tracer albedo", TextureFormat::R32G32B32A32_SFLOAT)?,
            display: texture("Averaged display", TextureFormat::R8G8B8A8_UNORM)?,
            averaged_color: float_buffer("Averaged colour")?,
            averaged_normals: float_buffer("Averaged normals")?,
            averaged_albedo: float_buffer("Averaged albedo")?,
            picking: DeviceBuffer::new(
                ctx,
                "Picking buffer",
                4,
                BufferUsage::STORAGE | BufferUsage::TRANSFER_SRC,
                ResourceState::UnorderedAccess,
            )?,
        })
    }

    fn averaged_buffers_mut(&mut self) -> [&mut DeviceBuffer; 3] {
        [&mut self.averaged_color, &mut self.averaged_normals, &mut self.averaged_albedo]
    }
}

/// Descriptor table handles of the targets
#[derive(Debug, Clone, Copy)]
struct TargetViews {
    color: u64,
    normals: u64,
    albedo: u64,
    display: u64,
    averaged_color: u64,
    averaged_normals: u64,
    averaged_albedo: u64,
    picking: u64,
}

impl TargetViews {
    fn new(ctx: &mut FrameContext, targets: &RenderTargets, pixel_count: u32) -> Result<Self> {
        let heap = ctx.resource_heap_mut();
        let mut texture_view = |texture: &Arc<dyn Texture>| -> Result<u64> {
            heap.create_descriptor(&ViewDesc::UnorderedAccessTexture { texture: texture.as_ref() })?
                .gpu_handle()
        };
        let color = texture_view(&targets.color)?;
        let normals = texture_view(&targets.normals)?;
        let albedo = texture_view(&targets.albedo)?;
        let display = texture_view(&targets.display)?;

        let mut buffer_view = |buffer: &DeviceBuffer, num_elements: u32, stride: u32| -> Result<u64> {
            heap.create_descriptor(&ViewDesc::UnorderedAccessBuffer {
                buffer: buffer.buffer().as_ref(),
                first_element: 0,
                num_elements,
                stride,
                raw: false,
            })?
            .gpu_handle()
        };
        Ok(Self {
            color,
            normals,
            albedo,
            display,
            averaged_color: buffer_view(&targets.averaged_color, pixel_count, FLOAT4_SIZE as u32)?,
            averaged_normals: buffer_view(&targets.averaged_normals, pixel_count, FLOAT4_SIZE as u32)?,
            averaged_albedo: buffer_view(&targets.averaged_albedo, pixel_count, FLOAT4_SIZE as u32)?,
            picking: buffer_view(&targets.picking, 1, 4)?,
        })
    }
}

/// Everything bound to the global root slots except the per-frame constants
#[derive(Debug, Clone, Copy)]
struct GlobalBindings {
    top_level: WrappedPointer,
    views: TargetViews,
    materials: u64,
    textures: Option<u64>,
    meshes: u64,
    vertices: u64,
    indices: u64,
    lights: u64,
}

impl GlobalBindings {
    fn bind(&self, cmd: &mut dyn CommandList, raytracing: &dyn RaytracingBackend, constants: u64) -> Result<()> {
        let mut arguments = vec![
            (GlobalRootSlot::SceneConstants, RootArgument::ConstantBuffer(constants)),
            (GlobalRootSlot::Output, RootArgument::DescriptorTable(self.views.color)),
            (GlobalRootSlot::Normals, RootArgument::DescriptorTable(self.views.normals)),
            (GlobalRootSlot::Albedo, RootArgument::DescriptorTable(self.views.albedo)),
            (GlobalRootSlot::PickingBuffer, RootArgument::DescriptorTable(self.views.picking)),
            (GlobalRootSlot::Materials, RootArgument::ShaderResource(self.materials)),
            (GlobalRootSlot::Meshes, RootArgument::ShaderResource(self.meshes)),
            (GlobalRootSlot::Vertices, RootArgument::ShaderResource(self.vertices)),
            (GlobalRootSlot::Indices, RootArgument::ShaderResource(self.indices)),
            (GlobalRootSlot::Lights, RootArgument::ShaderResource(self.lights)),
        ];
        if let Some(table) = self.textures {
            arguments.push((GlobalRootSlot::Textures, RootArgument::DescriptorTable(table)));
        }

        for (slot, argument) in arguments {
            cmd.set_compute_root_argument(slot as u32, argument)?;
        }
        raytracing.set_top_level_acceleration_structure(
            cmd,
            GlobalRootSlot::AccelerationStructure as u32,
            self.top_level,
        )
    }
}

/// Readback copies of the picking buffer and the averaged images
struct Readbacks {
    picking: ReadbackBuffer,
    color: ReadbackBuffer,
    normals: ReadbackBuffer,
    albedo: ReadbackBuffer,
    /// 8-bit denoised frame on its way to the back buffer
    denoised: UploadBuffer,
}

impl Readbacks {
    fn new(ctx: &FrameContext, width: u32, height: u32) -> Result<Self> {
        let device = ctx.device().as_ref();
        let image_size = width as u64 * height as u64 * FLOAT4_SIZE;
        Ok(Self {
            picking: ReadbackBuffer::new(device, "Picking readback", 4)?,
            color: ReadbackBuffer::new(device, "Averaged colour readback", image_size)?,
            normals: ReadbackBuffer::new(device, "Averaged normals readback", image_size)?,
            albedo: ReadbackBuffer::new(device, "Averaged albedo readback", image_size)?,
            denoised: UploadBuffer::new(
                device,
                "Denoised frame",
                width as u64 * height as u64 * 4,
                BufferUsage::TRANSFER_SRC,
            )?,
        })
    }
}

// ============================================================================
// Frame renderer
// ============================================================================

pub struct FrameRenderer {
    // Dropped first: waits for the GPU before any resource below is released
    ctx: FrameContext,
    scene: Scene,
    gpu_scene: GpuScene,
    acceleration: SceneAccelerationStructures,
    path_tracer: RaytracingPass,
    picking: RaytracingPass,
    averager: Arc<dyn ComputePipeline>,
    targets: RenderTargets,
    /// First resource heap slot of the target views
    target_views_start: u32,
    bindings: GlobalBindings,
    readbacks: Readbacks,
    scene_constants: ConstantBufferRing<SceneConstants>,
    averager_constants: ConstantBufferRing<AveragerConstants>,
    settings: RenderSettings,
    accumulator: SampleAccumulator,
    camera: Camera,
    denoiser: Box<dyn Denoiser>,
    width: u32,
    height: u32,
    sample_cap: u32,
    selected_material: Option<u32>,
    materials_dirty: bool,
    last_picked_mesh: Option<u32>,
}

impl FrameRenderer {
    /// Upload `scene`, build its acceleration structures and create every
    /// pipeline, target and readback of the frame loop
    ///
    /// Blocks until all uploads and builds completed.
    pub fn new(
        mut ctx: FrameContext,
        scene: Scene,
        textures: &dyn TextureSource,
        shaders: &RendererShaders,
        config: &RendererConfig,
        denoiser: Box<dyn Denoiser>,
    ) -> Result<Self> {
        config.validate()?;
        let (width, height) = (ctx.width(), ctx.height());

        // 1. Scene data and acceleration structures
        let gpu_scene = GpuScene::upload(&mut ctx, &scene, textures)?;
        let instances = scene.instances();
        let acceleration = AccelerationStructureBuilder::new().build(
            &mut ctx,
            &gpu_scene.geometry_buffers(),
            gpu_scene.mesh_geometry(),
            &instances,
        )?;

        // 2. Pipelines and shader tables
        let path_tracer = RaytracingPass::new(&ctx, &shaders.path_tracer)?;
        let picking = RaytracingPass::new(&ctx, &shaders.picking)?;
        check_root_arguments(&shaders.averager.name, shaders.averager.root_argument_count, AVERAGER_ROOT_ARGUMENT_COUNT)?;
        let averager = ctx.device().create_compute_pipeline(&shaders.averager)?;

        // 3. Targets and their views, allocated last so a resize can rewrite them
        let target_views_start = ctx.resource_heap().allocated();
        let targets = RenderTargets::new(&ctx, width, height)?;
        let views = TargetViews::new(&mut ctx, &targets, width * height)?;
        let bindings = GlobalBindings {
            top_level: acceleration.top_level_pointer()?,
            views,
            materials: gpu_scene.materials().gpu_address(),
            textures: gpu_scene.texture_table().map(|table| table.gpu_handle()).transpose()?,
            meshes: gpu_scene.meshes().gpu_address(),
            vertices: gpu_scene.vertices().gpu_address(),
            indices: gpu_scene.indices().gpu_address(),
            lights: gpu_scene.lights().gpu_address(),
        };

        // 4. Readbacks and per-frame constants
        let readbacks = Readbacks::new(&ctx, width, height)?;
        let device = ctx.device().clone();
        let scene_constants = ConstantBufferRing::new(
            device.as_ref(), "Scene constants", config.constant_buffer_ring_size)?;
        let averager_constants = ConstantBufferRing::new(
            device.as_ref(), "Averager constants", config.constant_buffer_ring_size)?;

        let settings = RenderSettings::default();
        let mut camera = settings.camera();
        camera.set_aspect_ratio(width as f32 / height as f32);
        let mut accumulator = SampleAccumulator::default();
        accumulator.set_freeze_at_sample(settings.freeze_at_sample);

        engine_info!("prism::FrameRenderer",
            "Renderer ready: {}x{}, {} instances, {} materials, {} textures, denoiser '{}'",
            width, height, instances.len(), gpu_scene.material_count(), gpu_scene.textures().len(),
            denoiser.name());

        Ok(Self {
            ctx,
            scene,
            gpu_scene,
            acceleration,
            path_tracer,
            picking,
            averager,
            targets,
            target_views_start,
            bindings,
            readbacks,
            scene_constants,
            averager_constants,
            settings,
            accumulator,
            camera,
            denoiser,
            width,
            height,
            sample_cap: config.sample_cap,
            selected_material: None,
            materials_dirty: false,
            last_picked_mesh: None,
        })
    }

    // ===== FRAME =====

    /// Render and present one frame
    ///
    /// A failed frame is dropped: its command list is closed without being
    /// submitted, so the next call starts from a clean list.
    pub fn render(&mut self, input: &FrameInput) -> Result<FrameOutcome> {
        let result = self.render_frame(input);
        if result.is_err() {
            self.ctx.abort_frame();
        }
        result
    }

    fn render_frame(&mut self, input: &FrameInput) -> Result<FrameOutcome> {
        // 1. Picking
        let picked = self.pick(input.cursor)?;

        // 2. Input and accumulation state
        self.update(input, picked);
        if self.materials_dirty {
            self.gpu_scene.update_materials(self.scene.materials())?;
            self.materials_dirty = false;
        }

        // 3. Trace and average, or denoise the final frame
        self.ctx.prepare_command_lists()?;
        let sample_count = self.accumulator.sample_count();
        let outcome = if sample_count < self.sample_cap {
            let outcome = if self.accumulator.is_frozen() {
                FrameOutcome::Frozen { sample_count }
            } else {
                self.record_path_tracing(input.cursor)?;
                FrameOutcome::Accumulated { sample_count }
            };
            self.record_display_copy()?;
            outcome
        } else {
            self.record_denoised_frame()?;
            FrameOutcome::Denoised
        };

        // 4. Present
        self.ctx.execute_frame_command_lists()?;
        self.ctx.present()?;
        self.ctx.wait_for_gpu()?;
        Ok(outcome)
    }

    /// Trace the picking ray and read back the mesh it hit
    fn pick(&mut self, cursor: Vec2) -> Result<Option<u32>> {
        let constants = self.scene_constants(cursor, Vec2::ZERO);
        let address = self.scene_constants.write(&constants)?;
        let raytracing = self.ctx.raytracing().clone();

        self.ctx.prepare_command_lists()?;
        {
            let cmd = self.ctx.command_list();
            self.bindings.bind(cmd, raytracing.as_ref(), address)?;
            raytracing.set_raytracing_pipeline(cmd, self.picking.pipeline.as_ref())?;
            raytracing.dispatch_rays(cmd, &self.picking.dispatch_desc(1, 1))?;
        }
        self.ctx.execute_command_lists()?;
        self.ctx.wait_for_gpu()?;

        self.ctx.prepare_command_lists()?;
        {
            let cmd = self.ctx.command_list();
            let picking = &mut self.targets.picking;
            picking.transition(cmd, ResourceState::CopySource)?;
            cmd.copy_buffer(self.readbacks.picking.buffer().as_ref(), picking.buffer().as_ref())?;
            picking.transition(cmd, ResourceState::UnorderedAccess)?;
        }
        self.ctx.execute_command_lists()?;
        self.ctx.wait_for_gpu()?;

        let id: i32 = self.readbacks.picking.map()?.read_pod(0)?;
        Ok(u32::try_from(id).ok())
    }

    fn update(&mut self, input: &FrameInput, picked: Option<u32>) {
        self.last_picked_mesh = picked;

        if !self.accumulator.is_frozen() {
            if input.translate != Vec3::ZERO || input.rotate != Vec3::ZERO {
                self.camera.translate(input.translate);
                self.camera.rotate(input.rotate);
                self.accumulator.request_clear();
            }
            if input.clear_samples {
                self.accumulator.request_clear();
            }
            if input.select_material {
                self.selected_material = picked
                    .and_then(|mesh| self.scene.meshes().get(mesh as usize))
                    .map(|mesh| mesh.material);
                engine_debug!("prism::FrameRenderer", "Picked mesh {:?}, material {:?}",
                    picked, self.selected_material);
            }
        }

        self.settings.apply_to_camera(&mut self.camera);
        if self.materials_dirty {
            self.accumulator.request_clear();
        }
        self.accumulator.begin_frame();
    }

    fn scene_constants(&mut self, cursor: Vec2, aa_sampling_point: Vec2) -> SceneConstants {
        let settings = &self.settings;
        let picking_point = cursor
            .clamp(Vec2::ZERO, Vec2::new(self.width as f32, self.height as f32))
            .as_ivec2();
        SceneConstants {
            projection_to_world: self.camera.projection_to_world(),
            camera_position: self.camera.position().extend(1.0),
            gi_num_bounces: settings.global_illumination.bounces,
            gi_bounce_distance: settings.global_illumination.bounce_distance,
            lens_diameter: settings.lens.diameter,
            aa_enabled: settings.anti_aliasing.enabled as u32,
            aa_sampling_point,
            aa_algorithm: settings.anti_aliasing.algorithm.as_u32(),
            ao_samples: settings.ambient_occlusion.samples,
            ao_size: settings.ambient_occlusion.size,
            frame_count: self.accumulator.frame_count(),
            picking_point,
            sky_color: settings.sky_color,
        }
    }

    /// Path trace one sample and fold it into the average
    fn record_path_tracing(&mut self, cursor: Vec2) -> Result<()> {
        let aa_point = self.accumulator.aa_sample_point(self.settings.anti_aliasing.algorithm);
        let constants = self.scene_constants(cursor, aa_point);
        let scene_address = self.scene_constants.write(&constants)?;
        let averager_address = self
            .averager_constants
            .write(&AveragerConstants::new(self.accumulator.is_clearing(), self.settings.gamma))?;
        let raytracing = self.ctx.raytracing().clone();
        let (width, height) = (self.width, self.height);

        let cmd = self.ctx.command_list();
        self.bindings.bind(cmd, raytracing.as_ref(), scene_address)?;
        raytracing.set_raytracing_pipeline(cmd, self.path_tracer.pipeline.as_ref())?;
        raytracing.dispatch_rays(cmd, &self.path_tracer.dispatch_desc(width, height))?;

        let targets = &self.targets;
        cmd.resource_barrier(&[
            ResourceBarrier::uav_texture(targets.color.as_ref()),
            ResourceBarrier::uav_texture(targets.normals.as_ref()),
            ResourceBarrier::uav_texture(targets.albedo.as_ref()),
        ])?;

        let views = &self.bindings.views;
        cmd.set_compute_pipeline(self.averager.as_ref())?;
        let arguments = [
            (AveragerRootSlot::Constants, RootArgument::ConstantBuffer(averager_address)),
            (AveragerRootSlot::InputColor, RootArgument::DescriptorTable(views.color)),
            (AveragerRootSlot::InputNormals, RootArgument::DescriptorTable(views.normals)),
            (AveragerRootSlot::InputAlbedo, RootArgument::DescriptorTable(views.albedo)),
            (AveragerRootSlot::OutputTexture, RootArgument::DescriptorTable(views.display)),
            (AveragerRootSlot::OutputColor, RootArgument::DescriptorTable(views.averaged_color)),
            (AveragerRootSlot::OutputNormals, RootArgument::DescriptorTable(views.averaged_normals)),
            (AveragerRootSlot::OutputAlbedo, RootArgument::DescriptorTable(views.averaged_albedo)),
        ];
        for (slot, argument) in arguments {
            cmd.set_compute_root_argument(slot as u32, argument)?;
        }
        cmd.dispatch(width.div_ceil(AVERAGER_GROUP_SIZE), height.div_ceil(AVERAGER_GROUP_SIZE), 1)
    }

    /// Copy the averaged display texture into the back buffer
    fn record_display_copy(&mut self) -> Result<()> {
        let display = self.targets.display.clone();
        let (cmd, back_buffer) = self.ctx.frame_targets()?;
        cmd.resource_barrier(&[
            ResourceBarrier::texture(back_buffer, ResourceState::Present, ResourceState::CopyDest),
            ResourceBarrier::texture(display.as_ref(), ResourceState::UnorderedAccess, ResourceState::CopySource),
        ])?;
        cmd.copy_texture(back_buffer, display.as_ref())?;
        cmd.resource_barrier(&[
            ResourceBarrier::texture(back_buffer, ResourceState::CopyDest, ResourceState::Present),
            ResourceBarrier::texture(display.as_ref(), ResourceState::CopySource, ResourceState::UnorderedAccess),
        ])
    }

    /// Read back the averages, denoise them and upload the result to the back buffer
    fn record_denoised_frame(&mut self) -> Result<()> {
        // 1. Averages to readback memory
        {
            let cmd = self.ctx.command_list();
            let readbacks = [&self.readbacks.color, &self.readbacks.normals, &self.readbacks.albedo];
            for (buffer, readback) in self.targets.averaged_buffers_mut().into_iter().zip(readbacks) {
                buffer.transition(cmd, ResourceState::CopySource)?;
                cmd.copy_buffer(readback.buffer().as_ref(), buffer.buffer().as_ref())?;
                buffer.transition(cmd, ResourceState::UnorderedAccess)?;
            }
        }
        self.ctx.execute_command_lists()?;
        self.ctx.wait_for_gpu()?;
        self.ctx.prepare_command_lists()?;

        // 2. Denoise
        let color: Vec<f32> = self.readbacks.color.map()?.to_vec();
        let normals: Vec<f32> = self.readbacks.normals.map()?.to_vec();
        let albedo: Vec<f32> = self.readbacks.albedo.map()?.to_vec();
        let input = DenoiserInput {
            width: self.width,
            height: self.height,
            color: &color,
            normals: &normals,
            albedo: &albedo,
        };
        let denoised = self.denoiser.denoise(&input)?;
        if denoised.len() != input.expected_len() {
            engine_warn!("prism::FrameRenderer", "Denoiser '{}' returned {} floats, expected {}",
                self.denoiser.name(), denoised.len(), input.expected_len());
            return Err(Error::InvalidResource(format!(
                "Denoiser '{}' returned an image of the wrong size",
                self.denoiser.name()
            )));
        }

        // 3. 8-bit upload into the back buffer
        let swap_red_blue = self.ctx.swapchain().format() == TextureFormat::B8G8R8A8_UNORM;
        self.readbacks.denoised.write(&to_rgba8(&denoised, swap_red_blue), 0)?;

        let staging = self.readbacks.denoised.buffer().clone();
        let (cmd, back_buffer) = self.ctx.frame_targets()?;
        cmd.resource_barrier(&[ResourceBarrier::texture(back_buffer, ResourceState::Present, ResourceState::CopyDest)])?;
        cmd.copy_buffer_to_texture(back_buffer, staging.as_ref())?;
        cmd.resource_barrier(&[ResourceBarrier::texture(back_buffer, ResourceState::CopyDest, ResourceState::Present)])
    }

    // ===== RESIZE =====

    /// Follow a window resize: recreate the swapchain, the targets and the
    /// readbacks at the new size and restart accumulation
    ///
    /// A zero-sized window (minimized) is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            engine_debug!("prism::FrameRenderer", "Ignoring resize to {}x{}", width, height);
            return Ok(());
        }

        // Waits for the GPU, so the old targets are no longer in use
        self.ctx.resize(width, height)?;
        let (width, height) = (self.ctx.width(), self.ctx.height());

        self.ctx.resource_heap_mut().rewind(self.target_views_start)?;
        let targets = RenderTargets::new(&self.ctx, width, height)?;
        self.bindings.views = TargetViews::new(&mut self.ctx, &targets, width * height)?;
        self.targets = targets;
        self.readbacks = Readbacks::new(&self.ctx, width, height)?;

        self.width = width;
        self.height = height;
        self.camera.set_aspect_ratio(width as f32 / height as f32);
        self.accumulator.request_clear();

        engine_info!("prism::FrameRenderer", "Renderer resized to {}x{}", width, height);
        Ok(())
    }

    // ===== SETTINGS =====

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Replace the settings, restarting accumulation when they change the image
    pub fn set_settings(&mut self, mut settings: RenderSettings) {
        settings.sanitize();
        if settings.requires_clear(&self.settings) {
            self.accumulator.request_clear();
        }
        self.accumulator.set_freeze_at_sample(settings.freeze_at_sample);
        settings.apply_to_camera(&mut self.camera);
        self.settings = settings;
    }

    /// Freeze or resume accumulation
    pub fn set_frozen(&mut self, frozen: bool) {
        self.accumulator.set_frozen(frozen);
    }

    /// Restart accumulation at the next frame
    pub fn request_clear(&mut self) {
        self.accumulator.request_clear();
    }

    pub fn accumulator(&self) -> &SampleAccumulator {
        &self.accumulator
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Direct camera access; callers request a clear after moving it
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    // ===== MATERIALS =====

    /// Material of the last mesh picked with `FrameInput::select_material`
    pub fn selected_material(&self) -> Option<u32> {
        self.selected_material
    }

    /// Mesh under the cursor at the last frame
    pub fn last_picked_mesh(&self) -> Option<u32> {
        self.last_picked_mesh
    }

    /// Edit the selected material
    ///
    /// # Returns
    ///
    /// False when no material is selected.
    pub fn edit_selected_material<F>(&mut self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut MaterialDesc),
    {
        match self.selected_material {
            Some(index) => self.edit_material(index, edit).map(|_| true),
            None => Ok(false),
        }
    }

    /// Edit a material; the GPU copy is rewritten before the next trace
    pub fn edit_material<F>(&mut self, index: u32, edit: F) -> Result<()>
    where
        F: FnOnce(&mut MaterialDesc),
    {
        let material = self
            .scene
            .material_mut(index)
            .ok_or_else(|| Error::InvalidResource(format!("Material {} does not exist", index)))?;
        edit(material);
        self.materials_dirty = true;
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn gpu_scene(&self) -> &GpuScene {
        &self.gpu_scene
    }

    pub fn acceleration_structures(&self) -> &SceneAccelerationStructures {
        &self.acceleration
    }

    pub fn context(&self) -> &FrameContext {
        &self.ctx
    }

    pub fn sample_cap(&self) -> u32 {
        self.sample_cap
    }
}

#[cfg(test)]
#[path = "frame_renderer_tests.rs"]
mod tests;
