//! Unit tests for adapter.rs

use crate::adapter::*;
use crate::error::Error;
use crate::graphics_device::RaytracingPath;

fn adapter(name: &str, kind: AdapterKind, memory_gb: u64, native: bool, emulation: bool) -> AdapterInfo {
    AdapterInfo {
        name: name.to_string(),
        vendor_id: 0x10de,
        device_id: 1,
        kind,
        dedicated_memory: memory_gb << 30,
        supports_native_raytracing: native,
        supports_compute_emulation: emulation,
    }
}

// ============================================================================
// ADAPTER SELECTION
// ============================================================================

#[test]
fn test_native_raytracing_beats_bigger_emulated_adapter() {
    let adapters = vec![
        adapter("Big Emulated", AdapterKind::Discrete, 24, false, true),
        adapter("Small Native", AdapterKind::Discrete, 8, true, true),
    ];
    assert_eq!(select_adapter(&adapters, None).unwrap(), 1);
}

#[test]
fn test_discrete_beats_integrated() {
    let adapters = vec![
        adapter("iGPU", AdapterKind::Integrated, 2, false, true),
        adapter("dGPU", AdapterKind::Discrete, 1, false, true),
    ];
    assert_eq!(select_adapter(&adapters, None).unwrap(), 1);
}

#[test]
fn test_memory_breaks_ties() {
    let adapters = vec![
        adapter("A", AdapterKind::Discrete, 8, true, true),
        adapter("B", AdapterKind::Discrete, 16, true, true),
    ];
    assert_eq!(select_adapter(&adapters, None).unwrap(), 1);
}

#[test]
fn test_cpu_adapters_are_skipped() {
    let adapters = vec![
        adapter("llvmpipe", AdapterKind::Cpu, 64, true, true),
        adapter("iGPU", AdapterKind::Integrated, 1, false, true),
    ];
    assert_eq!(select_adapter(&adapters, None).unwrap(), 1);
}

#[test]
fn test_preferred_adapter_matches_case_insensitively() {
    let adapters = vec![
        adapter("NVIDIA GeForce", AdapterKind::Discrete, 8, true, true),
        adapter("AMD Radeon", AdapterKind::Discrete, 8, false, true),
    ];
    assert_eq!(select_adapter(&adapters, Some("radeon")).unwrap(), 1);
}

#[test]
fn test_missing_preferred_adapter_falls_back() {
    let adapters = vec![adapter("NVIDIA GeForce", AdapterKind::Discrete, 8, true, true)];
    assert_eq!(select_adapter(&adapters, Some("Intel Arc")).unwrap(), 0);
}

#[test]
fn test_no_usable_adapter_is_an_error() {
    let adapters = vec![adapter("Old GPU", AdapterKind::Discrete, 2, false, false)];
    assert!(matches!(select_adapter(&adapters, None), Err(Error::InitializationFailed(_))));
    assert!(select_adapter(&[], None).is_err());
}

// ============================================================================
// RAY TRACING PATH SELECTION
// ============================================================================

#[test]
fn test_auto_prefers_native() {
    let a = adapter("GPU", AdapterKind::Discrete, 8, true, true);
    assert_eq!(select_raytracing_path(&a, RaytracingPathPreference::Auto).unwrap(), RaytracingPath::Native);
}

#[test]
fn test_auto_falls_back_to_emulation() {
    let a = adapter("GPU", AdapterKind::Discrete, 8, false, true);
    assert_eq!(
        select_raytracing_path(&a, RaytracingPathPreference::Auto).unwrap(),
        RaytracingPath::ComputeEmulated
    );
}

#[test]
fn test_force_emulated_on_native_hardware() {
    let a = adapter("GPU", AdapterKind::Discrete, 8, true, true);
    assert_eq!(
        select_raytracing_path(&a, RaytracingPathPreference::ForceEmulated).unwrap(),
        RaytracingPath::ComputeEmulated
    );
}

#[test]
fn test_force_native_without_support_fails() {
    let a = adapter("GPU", AdapterKind::Discrete, 8, false, true);
    assert!(select_raytracing_path(&a, RaytracingPathPreference::ForceNative).is_err());
}
