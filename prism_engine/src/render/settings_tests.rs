use super::*;

// ============================================================================
// XORSHIFT
// ============================================================================

#[test]
fn test_xorshift_is_deterministic() {
    let mut a = XorShift::new(42);
    let mut b = XorShift::new(42);
    for _ in 0..16 {
        assert_eq!(a.next_u64(), b.next_u64());
    }
}

#[test]
fn test_xorshift_zero_seed_still_advances() {
    let mut rng = XorShift::new(0);
    assert_ne!(rng.next_u64(), rng.next_u64());
}

#[test]
fn test_xorshift_ranges() {
    let mut rng = XorShift::new(7);
    for _ in 0..1000 {
        assert!(rng.below(3) < 3);
        let f = rng.next_f32();
        assert!((0.0..1.0).contains(&f));
    }
}

// ============================================================================
// SAMPLE POINTS
// ============================================================================

#[test]
fn test_table_ranges_tile_the_table() {
    let mut next = 0;
    for algorithm in AntiAliasingAlgorithm::ALL {
        let (base, count) = algorithm.table_range();
        assert_eq!(base, next);
        next = base + count;
    }
    assert_eq!(next, AA_SAMPLE_POINTS.len());
}

#[test]
fn test_sample_points_stay_inside_the_pixel() {
    for [x, y] in AA_SAMPLE_POINTS {
        assert!((-0.5..=0.5).contains(&x) && (-0.5..=0.5).contains(&y));
    }
}

#[test]
fn test_stratified_points_cycle_with_sample_count() {
    let mut accumulator = SampleAccumulator::new(1);
    let mut seen = Vec::new();
    for _ in 0..8 {
        accumulator.begin_frame();
        seen.push(accumulator.aa_sample_point(AntiAliasingAlgorithm::Stratified4));
    }
    // Sample counts 1..=8: offsets 3 + (1..=8 % 4)
    assert_eq!(seen[0], Vec2::new(0.375, -0.125));
    assert_eq!(seen[3], Vec2::new(-0.125, -0.375));
    assert_eq!(seen[0], seen[4]);
    assert_eq!(seen[1], seen[5]);
}

#[test]
fn test_random_points_are_centered_percentages() {
    let mut accumulator = SampleAccumulator::new(99);
    for _ in 0..200 {
        let p = accumulator.aa_sample_point(AntiAliasingAlgorithm::Random);
        assert!(p.x >= -0.5 && p.x < 0.5);
        assert!(p.y >= -0.5 && p.y < 0.5);
        assert!(((p.x + 0.5) * 100.0 - ((p.x + 0.5) * 100.0).round()).abs() < 1e-3);
    }
}

#[test]
fn test_algorithm_shader_values() {
    assert_eq!(AntiAliasingAlgorithm::Random.as_u32(), 0);
    assert_eq!(AntiAliasingAlgorithm::Stratified16.as_u32(), 4);
}

// ============================================================================
// SETTINGS
// ============================================================================

#[test]
fn test_default_settings() {
    let settings = RenderSettings::default();
    assert_eq!(settings.ambient_occlusion, AmbientOcclusionSettings { size: 50, samples: 2 });
    assert_eq!(settings.lens.focal_length, 1.0);
    assert!(settings.anti_aliasing.enabled);
    assert_eq!(settings.global_illumination.bounces, 2);
    assert_eq!(settings.gamma, 2.2);
    assert_eq!(settings.freeze_at_sample, -1);
}

#[test]
fn test_sanitize_clamps() {
    let mut settings = RenderSettings::default();
    settings.global_illumination.bounces = 40;
    settings.global_illumination.bounce_distance = -1.0;
    settings.lens.diameter = -3.0;
    settings.lens.focal_length = 0.0;
    settings.gamma = 0.0;
    settings.sanitize();

    assert_eq!(settings.global_illumination.bounces, 15);
    assert_eq!(settings.global_illumination.bounce_distance, 0.01);
    assert_eq!(settings.lens.diameter, 0.0);
    assert_eq!(settings.lens.focal_length, 0.01);
    assert_eq!(settings.gamma, 0.1);
}

#[test]
fn test_camera_uses_focal_length_as_near_plane() {
    let mut settings = RenderSettings::default();
    settings.lens.focal_length = 3.5;
    let camera = settings.camera();

    assert_eq!(camera.near_plane(), 3.5);
    assert_eq!(camera.far_plane(), 1000.0);
    assert_eq!(camera.position(), Vec3::new(0.0, 0.75, 2.0));
    assert!((camera.fov_radians() - 70f32.to_radians()).abs() < 1e-6);
}

#[test]
fn test_gamma_and_freeze_do_not_require_clear() {
    let previous = RenderSettings::default();
    let mut next = previous.clone();
    next.gamma = 1.0;
    next.freeze_at_sample = 10;
    assert!(!next.requires_clear(&previous));

    next.sky_color = Vec4::new(0.5, 0.5, 1.0, 1.0);
    assert!(next.requires_clear(&previous));
}

#[test]
fn test_lens_change_requires_clear() {
    let previous = RenderSettings::default();
    let mut next = previous.clone();
    next.lens.diameter = 0.2;
    assert!(next.requires_clear(&previous));
}

// ============================================================================
// ACCUMULATION
// ============================================================================

#[test]
fn test_counts_advance_every_frame() {
    let mut accumulator = SampleAccumulator::default();
    for _ in 0..5 {
        assert!(!accumulator.begin_frame());
    }
    assert_eq!(accumulator.sample_count(), 5);
    assert_eq!(accumulator.frame_count(), 5);
}

#[test]
fn test_clear_resets_samples_but_not_frames() {
    let mut accumulator = SampleAccumulator::default();
    accumulator.begin_frame();
    accumulator.begin_frame();
    accumulator.request_clear();

    assert!(accumulator.begin_frame());
    assert!(accumulator.is_clearing());
    assert_eq!(accumulator.sample_count(), 0);
    assert_eq!(accumulator.frame_count(), 3);

    assert!(!accumulator.begin_frame());
    assert!(!accumulator.is_clearing());
    assert_eq!(accumulator.sample_count(), 1);
}

#[test]
fn test_freeze_at_sample() {
    let mut accumulator = SampleAccumulator::default();
    accumulator.set_freeze_at_sample(3);
    for _ in 0..10 {
        accumulator.begin_frame();
    }
    assert!(accumulator.is_frozen());
    assert_eq!(accumulator.sample_count(), 3);
    assert_eq!(accumulator.frame_count(), 10);
}

#[test]
fn test_unfreezing_resumes_counting() {
    let mut accumulator = SampleAccumulator::default();
    accumulator.set_frozen(true);
    accumulator.begin_frame();
    assert_eq!(accumulator.sample_count(), 0);

    accumulator.set_frozen(false);
    accumulator.begin_frame();
    assert_eq!(accumulator.sample_count(), 1);
}
