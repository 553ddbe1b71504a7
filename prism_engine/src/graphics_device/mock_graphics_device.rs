/// Mock graphics device for unit tests (no GPU required)
///
/// Buffers are byte vectors and buffer copies execute while they are recorded.
/// Command lists record every command as a string. Fences complete their
/// signaled values after a random number of polls, which lets the frame
/// pacing code be tested against an asynchronous GPU.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use winit::window::Window;
use crate::adapter::{AdapterInfo, AdapterKind};
use crate::engine_bail;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AccelerationStructureBuild, AccelerationStructureInputs, BarrierResource, Buffer, BufferDesc,
    CommandList, ComputePipeline, ComputePipelineDesc, DescriptorHeap, DescriptorHeapDesc,
    DispatchRaysDesc, Fence, GraphicsDevice, MemoryLocation, PrebuildInfo, RaytracingBackend,
    RaytracingPath, RaytracingPipeline, RaytracingPipelineDesc, ResourceBarrier, RootArgument,
    Swapchain, SwapchainDesc, Texture, TextureDesc, TextureFormat, TextureInfo, TextureUsage,
    ViewDesc, MAX_ROOT_ARGUMENTS,
};
use crate::acceleration::WrappedPointer;

pub use crate::render::XorShift;

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub desc: BufferDesc,
    pub address: u64,
    data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(desc: BufferDesc, address: u64) -> Self {
        let data = Mutex::new(vec![0u8; desc.size as usize]);
        Self { desc, address, data }
    }

    /// Snapshot of the whole buffer, regardless of residency
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    /// Overwrite bytes regardless of residency (simulates GPU writes)
    pub fn poke(&self, offset: u64, bytes: &[u8]) {
        let mut data = self.data.lock().unwrap();
        data[offset as usize..offset as usize + bytes.len()].copy_from_slice(bytes);
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        if !self.desc.location.is_cpu_visible() {
            engine_bail!("prism::mock", "Buffer '{}' is not CPU visible", self.desc.name);
        }
        if offset + len as u64 > self.desc.size {
            engine_bail!("prism::mock",
                "Access of {} bytes at {} overflows buffer '{}' ({} bytes)",
                len, offset, self.desc.name, self.desc.size);
        }
        Ok(())
    }
}

impl Buffer for MockBuffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn gpu_address(&self) -> u64 {
        self.address
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        self.poke(offset, data);
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        self.check_range(offset, out.len())?;
        let data = self.data.lock().unwrap();
        out.copy_from_slice(&data[offset as usize..offset as usize + out.len()]);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn mock_buffer(buffer: &dyn Buffer) -> Result<&MockBuffer> {
    buffer
        .as_any()
        .downcast_ref::<MockBuffer>()
        .ok_or_else(|| Error::InvalidResource("Buffer is not a MockBuffer".to_string()))
}

// ============================================================================
// Mock Texture
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    pub info: TextureInfo,
    pub name: String,
}

impl MockTexture {
    pub fn new(width: u32, height: u32, format: TextureFormat, usage: TextureUsage, name: String) -> Self {
        Self {
            info: TextureInfo { width, height, format, usage },
            name,
        }
    }
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn texture_name(texture: &dyn Texture) -> String {
    texture
        .as_any()
        .downcast_ref::<MockTexture>()
        .map(|t| t.name.clone())
        .unwrap_or_else(|| "?".to_string())
}

// ============================================================================
// Mock DescriptorHeap
// ============================================================================

pub struct MockDescriptorHeap {
    pub desc: DescriptorHeapDesc,
    /// (slot, view label) in write order
    pub writes: Mutex<Vec<(u32, String)>>,
}

impl MockDescriptorHeap {
    pub const CPU_START: u64 = 0x1000;
    pub const GPU_START: u64 = 0x8000_0000;
    pub const INCREMENT: u32 = 32;

    pub fn new(desc: DescriptorHeapDesc) -> Self {
        Self { desc, writes: Mutex::new(Vec::new()) }
    }

    pub fn written(&self) -> Vec<(u32, String)> {
        self.writes.lock().unwrap().clone()
    }
}

impl DescriptorHeap for MockDescriptorHeap {
    fn desc(&self) -> &DescriptorHeapDesc {
        &self.desc
    }

    fn increment_size(&self) -> u32 {
        Self::INCREMENT
    }

    fn cpu_start(&self) -> u64 {
        Self::CPU_START
    }

    fn gpu_start(&self) -> Option<u64> {
        self.desc.kind.is_shader_visible().then_some(Self::GPU_START)
    }

    fn write_view(&self, index: u32, view: &ViewDesc<'_>) -> Result<()> {
        if index >= self.desc.capacity {
            engine_bail!("prism::mock", "Descriptor write at {} past capacity {}", index, self.desc.capacity);
        }
        self.writes.lock().unwrap().push((index, view.label().to_string()));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

#[derive(Debug, Default)]
pub struct MockCommandList {
    pub commands: Vec<String>,
    pub recording: bool,
    /// Number of `begin()` calls
    pub resets: u32,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command; fails when the list is closed
    pub fn record(&mut self, command: String) -> Result<()> {
        if !self.recording {
            engine_bail!("prism::mock", "Command '{}' recorded into a closed list", command);
        }
        self.commands.push(command);
        Ok(())
    }

    /// Recorded commands starting with `prefix`
    pub fn count(&self, prefix: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

fn barrier_target(resource: &BarrierResource<'_>) -> String {
    match resource {
        BarrierResource::Buffer(buffer) => buffer.desc().name.clone(),
        BarrierResource::Texture(texture) => texture_name(*texture),
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            engine_bail!("prism::mock", "begin() on a list that is already recording");
        }
        self.commands.clear();
        self.recording = true;
        self.resets += 1;
        self.commands.push("begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.record("end".to_string())?;
        self.recording = false;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording
    }

    fn resource_barrier(&mut self, barriers: &[ResourceBarrier<'_>]) -> Result<()> {
        for barrier in barriers {
            let command = match barrier {
                ResourceBarrier::Transition { resource, before, after } => {
                    format!("barrier {} {:?}->{:?}", barrier_target(resource), before, after)
                }
                ResourceBarrier::UnorderedAccess { resource } => {
                    format!("uav_barrier {}", barrier_target(resource))
                }
            };
            self.record(command)?;
        }
        Ok(())
    }

    fn copy_buffer(&mut self, dst: &dyn Buffer, src: &dyn Buffer) -> Result<()> {
        if dst.size() != src.size() {
            engine_bail!("prism::mock", "copy_buffer size mismatch: {} vs {}", dst.size(), src.size());
        }
        self.copy_buffer_region(dst, 0, src, 0, src.size())
    }

    fn copy_buffer_region(
        &mut self,
        dst: &dyn Buffer,
        dst_offset: u64,
        src: &dyn Buffer,
        src_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.record(format!("copy_buffer {} -> {} ({} bytes)", src.desc().name, dst.desc().name, size))?;
        let bytes = mock_buffer(src)?.contents();
        let range = src_offset as usize..(src_offset + size) as usize;
        let chunk = bytes.get(range).ok_or_else(|| Error::InvalidResource("copy source overflow".to_string()))?;
        let dst = mock_buffer(dst)?;
        if dst_offset + size > dst.desc.size {
            engine_bail!("prism::mock", "copy destination overflow");
        }
        dst.poke(dst_offset, chunk);
        Ok(())
    }

    fn copy_texture(&mut self, dst: &dyn Texture, src: &dyn Texture) -> Result<()> {
        self.record(format!("copy_texture {} -> {}", texture_name(src), texture_name(dst)))
    }

    fn copy_buffer_to_texture(&mut self, dst: &dyn Texture, src: &dyn Buffer) -> Result<()> {
        if src.size() < dst.info().byte_size() {
            engine_bail!("prism::mock", "copy_buffer_to_texture: source too small");
        }
        self.record(format!("copy_buffer_to_texture {} -> {}", src.desc().name, texture_name(dst)))
    }

    fn copy_texture_to_buffer(&mut self, dst: &dyn Buffer, src: &dyn Texture) -> Result<()> {
        if dst.size() < src.info().byte_size() {
            engine_bail!("prism::mock", "copy_texture_to_buffer: destination too small");
        }
        self.record(format!("copy_texture_to_buffer {} -> {}", texture_name(src), dst.desc().name))
    }

    fn set_compute_pipeline(&mut self, pipeline: &dyn ComputePipeline) -> Result<()> {
        self.record(format!("set_compute_pipeline {}", pipeline.name()))
    }

    fn set_compute_root_argument(&mut self, slot: u32, argument: RootArgument) -> Result<()> {
        if slot >= MAX_ROOT_ARGUMENTS {
            engine_bail!("prism::mock", "Root argument slot {} out of range", slot);
        }
        self.record(format!("root {} {:#x}", slot, argument.raw()))
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.record(format!("dispatch {}x{}x{}", x, y, z))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn mock_list(cmd: &mut dyn CommandList) -> Result<&mut MockCommandList> {
    cmd.as_any_mut()
        .downcast_mut::<MockCommandList>()
        .ok_or_else(|| Error::InvalidResource("Command list is not a MockCommandList".to_string()))
}

// ============================================================================
// Mock Fence
// ============================================================================

struct MockFenceState {
    completed: u64,
    last_signaled: u64,
    /// (value, polls left before completion), in signal order
    pending: VecDeque<(u64, u64)>,
    rng: XorShift,
    max_latency: u64,
    waits: u32,
}

impl MockFenceState {
    fn complete_front(&mut self) {
        if let Some((value, _)) = self.pending.pop_front() {
            self.completed = value;
        }
    }
}

pub struct MockFence {
    state: Mutex<MockFenceState>,
}

impl MockFence {
    /// `max_latency` = 0 completes every signal immediately
    pub fn new(initial_value: u64, max_latency: u64, seed: u64) -> Self {
        Self {
            state: Mutex::new(MockFenceState {
                completed: initial_value,
                last_signaled: initial_value,
                pending: VecDeque::new(),
                rng: XorShift::new(seed),
                max_latency,
                waits: 0,
            }),
        }
    }

    pub fn signal(&self, value: u64) {
        let mut state = self.state.lock().unwrap();
        let max_latency = state.max_latency;
        let latency = if max_latency == 0 { 0 } else { state.rng.below(max_latency + 1) };
        if latency == 0 && state.pending.is_empty() {
            state.completed = value;
        } else {
            state.pending.push_back((value, latency));
        }
        state.last_signaled = value;
    }

    /// Completed value without simulating GPU progress
    pub fn peek(&self) -> u64 {
        self.state.lock().unwrap().completed
    }

    pub fn last_signaled(&self) -> u64 {
        self.state.lock().unwrap().last_signaled
    }

    /// Number of `wait()` calls that had to block
    pub fn blocking_waits(&self) -> u32 {
        self.state.lock().unwrap().waits
    }

    /// Complete everything signaled so far
    pub fn drain(&self) {
        let mut state = self.state.lock().unwrap();
        while !state.pending.is_empty() {
            state.complete_front();
        }
    }
}

impl Fence for MockFence {
    fn completed_value(&self) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        if let Some(front) = state.pending.front_mut() {
            front.1 = front.1.saturating_sub(1);
        }
        while matches!(state.pending.front(), Some((_, 0))) {
            state.complete_front();
        }
        Ok(state.completed)
    }

    fn wait(&self, value: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.completed >= value {
            return Ok(());
        }
        if value > state.last_signaled {
            engine_bail!("prism::mock",
                "Deadlock: waiting for {} but the last signaled value is {}",
                value, state.last_signaled);
        }
        state.waits += 1;
        while state.completed < value {
            state.complete_front();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    pub desc: SwapchainDesc,
    pub current: u32,
    pub presents: u32,
    back_buffers: Vec<MockTexture>,
    /// Random back buffer order instead of round robin
    shuffle: Option<XorShift>,
}

impl MockSwapchain {
    pub fn new(desc: SwapchainDesc) -> Self {
        let back_buffers = (0..desc.back_buffer_count)
            .map(|i| MockTexture::new(
                desc.width,
                desc.height,
                TextureFormat::B8G8R8A8_UNORM,
                TextureUsage::TRANSFER_DST | TextureUsage::RENDER_TARGET,
                format!("back_buffer_{}", i),
            ))
            .collect();
        Self { desc, current: 0, presents: 0, back_buffers, shuffle: None }
    }

    pub fn with_shuffled_order(mut self, seed: u64) -> Self {
        self.shuffle = Some(XorShift::new(seed));
        self
    }
}

impl Swapchain for MockSwapchain {
    fn current_back_buffer_index(&self) -> u32 {
        self.current
    }

    fn back_buffer(&self, index: u32) -> Option<&dyn Texture> {
        self.back_buffers.get(index as usize).map(|t| t as &dyn Texture)
    }

    fn present(&mut self) -> Result<u32> {
        self.presents += 1;
        let count = self.desc.back_buffer_count;
        self.current = match self.shuffle.as_mut() {
            Some(rng) => rng.below(count as u64) as u32,
            None => (self.current + 1) % count,
        };
        Ok(self.current)
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        *self = MockSwapchain {
            shuffle: self.shuffle.take(),
            ..MockSwapchain::new(SwapchainDesc { width, height, ..self.desc })
        };
        Ok(())
    }

    fn back_buffer_count(&self) -> u32 {
        self.desc.back_buffer_count
    }

    fn width(&self) -> u32 {
        self.desc.width
    }

    fn height(&self) -> u32 {
        self.desc.height
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::B8G8R8A8_UNORM
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Pipelines
// ============================================================================

#[derive(Debug)]
pub struct MockComputePipeline {
    pub name: String,
}

impl ComputePipeline for MockComputePipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MockRaytracingPipeline {
    pub name: String,
    identifiers: Vec<(String, Vec<u8>)>,
}

impl MockRaytracingPipeline {
    pub const IDENTIFIER_SIZE: u32 = 32;

    /// Identifier of export `i` is 32 bytes of `i + 1`
    pub fn new(desc: &RaytracingPipelineDesc) -> Self {
        let identifiers = desc
            .export_names()
            .enumerate()
            .map(|(i, name)| (name.to_string(), vec![i as u8 + 1; Self::IDENTIFIER_SIZE as usize]))
            .collect();
        Self { name: desc.name.clone(), identifiers }
    }
}

impl RaytracingPipeline for MockRaytracingPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn shader_identifier(&self, export_name: &str) -> Option<&[u8]> {
        self.identifiers
            .iter()
            .find(|(name, _)| name == export_name)
            .map(|(_, id)| id.as_slice())
    }

    fn shader_identifier_size(&self) -> u32 {
        Self::IDENTIFIER_SIZE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock RaytracingBackend
// ============================================================================

pub struct MockRaytracingBackend {
    pub path: RaytracingPath,
}

impl RaytracingBackend for MockRaytracingBackend {
    fn path(&self) -> RaytracingPath {
        self.path
    }

    /// Zero-sized for empty inputs, otherwise 64 bytes per primitive plus a header
    fn prebuild_info(&self, inputs: &AccelerationStructureInputs<'_>) -> Result<PrebuildInfo> {
        let primitives = inputs.primitive_count();
        if primitives == 0 {
            return Ok(PrebuildInfo::default());
        }
        Ok(PrebuildInfo {
            result_size: 256 + primitives * 64,
            scratch_size: 128 + primitives * 32,
        })
    }

    fn set_descriptor_heaps(&self, cmd: &mut dyn CommandList, heaps: &[&dyn DescriptorHeap]) -> Result<()> {
        let kinds: Vec<String> = heaps.iter().map(|h| format!("{:?}", h.desc().kind)).collect();
        mock_list(cmd)?.record(format!("set_descriptor_heaps {}", kinds.join(",")))
    }

    fn build_acceleration_structure(
        &self,
        cmd: &mut dyn CommandList,
        build: &AccelerationStructureBuild<'_>,
    ) -> Result<()> {
        if build.scratch.size() == 0 {
            engine_bail!("prism::mock", "Build without scratch memory");
        }
        let command = match build.inputs {
            AccelerationStructureInputs::Triangles { geometry, .. } => {
                format!("build_bottom_level {} ({} geometries)", build.destination.desc().name, geometry.len())
            }
            AccelerationStructureInputs::Instances { instances, .. } => {
                format!("build_top_level {} ({} instances)", build.destination.desc().name, instances.len())
            }
        };
        mock_list(cmd)?.record(command)
    }

    fn set_top_level_acceleration_structure(
        &self,
        cmd: &mut dyn CommandList,
        slot: u32,
        tlas: WrappedPointer,
    ) -> Result<()> {
        mock_list(cmd)?.record(format!("set_top_level {} {:#x}", slot, tlas.encode()))
    }

    fn set_raytracing_pipeline(&self, cmd: &mut dyn CommandList, pipeline: &dyn RaytracingPipeline) -> Result<()> {
        mock_list(cmd)?.record(format!("set_raytracing_pipeline {}", pipeline.name()))
    }

    fn dispatch_rays(&self, cmd: &mut dyn CommandList, desc: &DispatchRaysDesc<'_>) -> Result<()> {
        mock_list(cmd)?.record(format!(
            "dispatch_rays {}x{}x{} raygen={} miss={} hit={}",
            desc.width, desc.height, desc.depth,
            desc.ray_generation.buffer.desc().name,
            desc.miss.buffer.desc().name,
            desc.hit_group.buffer.desc().name,
        ))
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

/// One `execute_command_lists()` call
#[derive(Debug, Clone)]
pub struct MockSubmission {
    /// Commands of every list, in submission order
    pub commands: Vec<String>,
    pub presents: bool,
}

/// Mock device that tracks created resources and submissions without GPU
pub struct MockGraphicsDevice {
    info: AdapterInfo,
    raytracing: Arc<MockRaytracingBackend>,
    next_address: AtomicU64,
    fence_latency: u64,
    seed: Mutex<XorShift>,
    fences: Mutex<Vec<Weak<MockFence>>>,
    pub created_buffers: Mutex<Vec<String>>,
    pub created_textures: Mutex<Vec<String>>,
    pub created_heaps: Mutex<Vec<DescriptorHeapDesc>>,
    pub submissions: Mutex<Vec<MockSubmission>>,
    pub signals: Mutex<Vec<u64>>,
}

impl MockGraphicsDevice {
    /// Native ray tracing, fences complete immediately
    pub fn new() -> Self {
        Self::with_path(RaytracingPath::Native)
    }

    pub fn with_path(path: RaytracingPath) -> Self {
        Self {
            info: AdapterInfo {
                name: "Mock Adapter".to_string(),
                vendor_id: 0,
                device_id: 0,
                kind: AdapterKind::Discrete,
                dedicated_memory: 8 << 30,
                supports_native_raytracing: path == RaytracingPath::Native,
                supports_compute_emulation: true,
            },
            raytracing: Arc::new(MockRaytracingBackend { path }),
            next_address: AtomicU64::new(0x1_0000),
            fence_latency: 0,
            seed: Mutex::new(XorShift::new(0x9E37_79B9_7F4A_7C15)),
            fences: Mutex::new(Vec::new()),
            created_buffers: Mutex::new(Vec::new()),
            created_textures: Mutex::new(Vec::new()),
            created_heaps: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            signals: Mutex::new(Vec::new()),
        }
    }

    /// Fences created afterwards complete each signal after up to `max_polls` polls
    pub fn with_fence_latency(mut self, max_polls: u64, seed: u64) -> Self {
        self.fence_latency = max_polls;
        self.seed = Mutex::new(XorShift::new(seed));
        self
    }

    pub fn get_created_buffers(&self) -> Vec<String> {
        self.created_buffers.lock().unwrap().clone()
    }

    pub fn get_created_textures(&self) -> Vec<String> {
        self.created_textures.lock().unwrap().clone()
    }

    pub fn get_submissions(&self) -> Vec<MockSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    /// Every command of every submission, flattened
    pub fn submitted_commands(&self) -> Vec<String> {
        self.get_submissions().into_iter().flat_map(|s| s.commands).collect()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn adapter_info(&self) -> &AdapterInfo {
        &self.info
    }

    fn raytracing(&self) -> Arc<dyn RaytracingBackend> {
        self.raytracing.clone()
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        if desc.size == 0 {
            engine_bail!("prism::mock", "Buffer '{}' has zero size", desc.name);
        }
        let span = (desc.size + 255) & !255;
        let address = self.next_address.fetch_add(span, Ordering::Relaxed);
        self.created_buffers.lock().unwrap().push(desc.name.clone());
        Ok(Arc::new(MockBuffer::new(desc.clone(), address)))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        self.created_textures.lock().unwrap().push(desc.name.clone());
        Ok(Arc::new(MockTexture::new(desc.width, desc.height, desc.format, desc.usage, desc.name.clone())))
    }

    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Arc<dyn DescriptorHeap>> {
        self.created_heaps.lock().unwrap().push(*desc);
        Ok(Arc::new(MockDescriptorHeap::new(*desc)))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new()))
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>> {
        let seed = self.seed.lock().unwrap().next_u64();
        let fence = Arc::new(MockFence::new(initial_value, self.fence_latency, seed));
        self.fences.lock().unwrap().push(Arc::downgrade(&fence));
        Ok(fence)
    }

    fn create_swapchain(&self, _window: &Window, desc: &SwapchainDesc) -> Result<Box<dyn Swapchain>> {
        Ok(Box::new(MockSwapchain::new(*desc)))
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<Arc<dyn ComputePipeline>> {
        Ok(Arc::new(MockComputePipeline { name: desc.name.clone() }))
    }

    fn create_raytracing_pipeline(&self, desc: &RaytracingPipelineDesc) -> Result<Arc<dyn RaytracingPipeline>> {
        if self.raytracing.path == RaytracingPath::ComputeEmulated && desc.emulation.is_none() {
            engine_bail!("prism::mock", "Pipeline '{}' has no emulation shader", desc.name);
        }
        Ok(Arc::new(MockRaytracingPipeline::new(desc)))
    }

    fn execute_command_lists(&self, lists: &[&dyn CommandList], present: Option<&dyn Swapchain>) -> Result<()> {
        let mut commands = Vec::new();
        for list in lists {
            let list = list
                .as_any()
                .downcast_ref::<MockCommandList>()
                .ok_or_else(|| Error::InvalidResource("Command list is not a MockCommandList".to_string()))?;
            if list.recording {
                engine_bail!("prism::mock", "Submitted a command list that is still recording");
            }
            commands.extend(list.commands.iter().cloned());
        }
        self.submissions.lock().unwrap().push(MockSubmission {
            commands,
            presents: present.is_some(),
        });
        Ok(())
    }

    fn signal(&self, fence: &dyn Fence, value: u64) -> Result<()> {
        let fence = fence
            .as_any()
            .downcast_ref::<MockFence>()
            .ok_or_else(|| Error::InvalidResource("Fence is not a MockFence".to_string()))?;
        fence.signal(value);
        self.signals.lock().unwrap().push(value);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        for fence in self.fences.lock().unwrap().iter().filter_map(Weak::upgrade) {
            fence.drain();
        }
        Ok(())
    }
}

/// Buffer descriptor shorthand for tests
pub fn upload_desc(name: &str, size: u64) -> BufferDesc {
    BufferDesc::new(name, size, MemoryLocation::Upload, crate::graphics_device::BufferUsage::STORAGE)
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
