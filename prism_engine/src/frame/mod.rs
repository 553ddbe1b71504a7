//! Frame lifecycle: command lists, fence pacing and presentation

pub mod frame_sync;
pub mod frame_context;

pub use frame_sync::FrameSync;
pub use frame_context::FrameContext;
