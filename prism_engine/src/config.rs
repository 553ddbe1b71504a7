//! Renderer configuration
//!
//! Compiled-in defaults reproduce the reference setup: a 1280x720 window,
//! triple buffering and a 100-sample cap before the denoised frame.

use crate::adapter::RaytracingPathPreference;
use crate::error::{Error, Result};

/// Configuration for device, frame context and frame renderer creation
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Render target width in pixels
    pub width: u32,
    /// Render target height in pixels
    pub height: u32,
    /// Number of swapchain back buffers (2..=4)
    pub back_buffer_count: u32,
    /// Accumulated samples before the denoised final frame is shown
    pub sample_cap: u32,
    pub cbv_srv_uav_heap_capacity: u32,
    pub rtv_heap_capacity: u32,
    pub dsv_heap_capacity: u32,
    pub sampler_heap_capacity: u32,
    /// Number of per-frame slots in each constant buffer ring
    pub constant_buffer_ring_size: u32,
    pub raytracing_path: RaytracingPathPreference,
    /// Enable API validation when the backend was built with it
    pub enable_validation: bool,
    /// Case-insensitive substring of the adapter name to prefer
    pub preferred_adapter: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            back_buffer_count: 3,
            sample_cap: 100,
            cbv_srv_uav_heap_capacity: 2048,
            rtv_heap_capacity: 16,
            dsv_heap_capacity: 4,
            sampler_heap_capacity: 16,
            constant_buffer_ring_size: 16,
            raytracing_path: RaytracingPathPreference::Auto,
            enable_validation: cfg!(debug_assertions),
            preferred_adapter: None,
        }
    }
}

impl RendererConfig {
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_back_buffer_count(mut self, count: u32) -> Self {
        self.back_buffer_count = count;
        self
    }

    pub fn with_sample_cap(mut self, samples: u32) -> Self {
        self.sample_cap = samples;
        self
    }

    pub fn with_raytracing_path(mut self, preference: RaytracingPathPreference) -> Self {
        self.raytracing_path = preference;
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = enabled;
        self
    }

    pub fn with_preferred_adapter(mut self, name: impl Into<String>) -> Self {
        self.preferred_adapter = Some(name.into());
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InitializationFailed(format!(
                "Invalid resolution {}x{}",
                self.width, self.height
            )));
        }
        if !(2..=4).contains(&self.back_buffer_count) {
            return Err(Error::InitializationFailed(format!(
                "Back buffer count must be between 2 and 4, got {}",
                self.back_buffer_count
            )));
        }
        if self.constant_buffer_ring_size < self.back_buffer_count {
            return Err(Error::InitializationFailed(
                "Constant buffer ring must hold at least one slot per back buffer".to_string(),
            ));
        }
        let heaps = [
            ("CBV/SRV/UAV", self.cbv_srv_uav_heap_capacity),
            ("RTV", self.rtv_heap_capacity),
            ("DSV", self.dsv_heap_capacity),
            ("sampler", self.sampler_heap_capacity),
        ];
        if let Some((name, _)) = heaps.iter().find(|(_, capacity)| *capacity == 0) {
            return Err(Error::InitializationFailed(format!("{} heap capacity must be non-zero", name)));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
