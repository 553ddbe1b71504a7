//! Adapter description and selection
//!
//! Backends enumerate physical adapters into `AdapterInfo` records; the
//! selection logic here is backend-agnostic.

use crate::error::{Error, Result};
use crate::graphics_device::RaytracingPath;
use crate::{engine_info, engine_warn};

/// Kind of physical adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Discrete,
    Integrated,
    Virtual,
    /// Software rasterizer
    Cpu,
    Other,
}

/// Physical adapter properties relevant to device creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub kind: AdapterKind,
    /// Device-local memory in bytes
    pub dedicated_memory: u64,
    /// Hardware acceleration structures and ray tracing pipelines
    pub supports_native_raytracing: bool,
    /// Features required by the compute-emulated path
    pub supports_compute_emulation: bool,
}

impl AdapterInfo {
    /// Returns true if either ray tracing path can run on this adapter
    pub fn can_raytrace(&self) -> bool {
        self.supports_native_raytracing || self.supports_compute_emulation
    }
}

/// Requested ray tracing path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RaytracingPathPreference {
    /// Native when supported, emulated otherwise
    #[default]
    Auto,
    ForceNative,
    ForceEmulated,
}

/// Pick the adapter to create the device on
///
/// CPU adapters and adapters that cannot ray trace are skipped. A preferred
/// name (case-insensitive substring) wins when it matches; otherwise native ray
/// tracing beats emulation, discrete beats integrated, and more dedicated
/// memory wins ties.
///
/// # Returns
///
/// Index into `adapters`.
///
/// # Errors
///
/// `InitializationFailed` when no adapter is usable.
pub fn select_adapter(adapters: &[AdapterInfo], preferred: Option<&str>) -> Result<usize> {
    let usable: Vec<usize> = adapters
        .iter()
        .enumerate()
        .filter(|(_, a)| a.kind != AdapterKind::Cpu && a.can_raytrace())
        .map(|(i, _)| i)
        .collect();

    if let Some(wanted) = preferred {
        let wanted_lower = wanted.to_lowercase();
        if let Some(&index) = usable
            .iter()
            .find(|&&i| adapters[i].name.to_lowercase().contains(&wanted_lower))
        {
            engine_info!("prism::Adapter", "Using preferred adapter {}", adapters[index].name);
            return Ok(index);
        }
        engine_warn!("prism::Adapter", "Preferred adapter '{}' not found, selecting automatically", wanted);
    }

    let kind_rank = |kind: AdapterKind| match kind {
        AdapterKind::Discrete => 3,
        AdapterKind::Integrated => 2,
        AdapterKind::Virtual => 1,
        _ => 0,
    };

    usable
        .into_iter()
        .max_by_key(|&i| {
            let a = &adapters[i];
            (a.supports_native_raytracing, kind_rank(a.kind), a.dedicated_memory)
        })
        .ok_or_else(|| {
            Error::InitializationFailed("No adapter supports ray tracing, natively or emulated".to_string())
        })
}

/// Decide which ray tracing path to run on an adapter
///
/// # Errors
///
/// `InitializationFailed` when the requested path is not available.
pub fn select_raytracing_path(
    adapter: &AdapterInfo,
    preference: RaytracingPathPreference,
) -> Result<RaytracingPath> {
    match preference {
        RaytracingPathPreference::Auto if adapter.supports_native_raytracing => Ok(RaytracingPath::Native),
        RaytracingPathPreference::Auto if adapter.supports_compute_emulation => {
            engine_warn!("prism::Adapter", "{} has no native ray tracing, using compute emulation", adapter.name);
            Ok(RaytracingPath::ComputeEmulated)
        }
        RaytracingPathPreference::ForceNative if adapter.supports_native_raytracing => Ok(RaytracingPath::Native),
        RaytracingPathPreference::ForceEmulated if adapter.supports_compute_emulation => {
            Ok(RaytracingPath::ComputeEmulated)
        }
        _ => Err(Error::InitializationFailed(format!(
            "Ray tracing path {:?} unavailable on {}",
            preference, adapter.name
        ))),
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
