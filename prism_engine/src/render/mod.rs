//! Progressive renderer
//!
//! Render settings and sample accumulation, the constant buffers shared with
//! the shaders, the CPU denoiser seam and the frame loop tying them together.

pub mod settings;
pub mod shader_data;
pub mod denoiser;
pub mod frame_renderer;

pub use settings::{
    AmbientOcclusionSettings, AntiAliasingAlgorithm, AntiAliasingSettings, CameraSettings,
    GlobalIlluminationSettings, LensSettings, RenderSettings, SampleAccumulator, XorShift, AA_SAMPLE_POINTS,
};
pub use shader_data::{AveragerConstants, ConstantBufferRing, SceneConstants, CONSTANT_BUFFER_ALIGNMENT};
pub use denoiser::{to_rgba8, Denoiser, DenoiserInput, PassthroughDenoiser};
pub use frame_renderer::{
    AveragerRootSlot, FrameInput, FrameOutcome, FrameRenderer, GlobalRootSlot, RendererShaders,
    AVERAGER_GROUP_SIZE, AVERAGER_ROOT_ARGUMENT_COUNT, GLOBAL_ROOT_ARGUMENT_COUNT,
};
