/// Render settings and progressive sample accumulation
///
/// `RenderSettings` holds every user-tunable parameter of the path tracer.
/// `SampleAccumulator` tracks how many samples the averaged image holds and
/// decides, frame by frame, whether accumulation restarts or freezes.

use glam::{Vec2, Vec3, Vec4};
use crate::camera::Camera;

// ============================================================================
// Random numbers
// ============================================================================

/// Small deterministic xorshift64* generator
#[derive(Debug, Clone)]
pub struct XorShift {
    state: u64,
}

impl XorShift {
    pub fn new(seed: u64) -> Self {
        // Zero is a fixed point of xorshift
        Self { state: if seed == 0 { 0x2545_F491_4F6C_DD1D } else { seed } }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform value in `0..bound` (`bound > 0`)
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }

    /// Uniform value in `[0, 1)`
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

// ============================================================================
// Anti-aliasing
// ============================================================================

/// Sub-pixel sampling pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum AntiAliasingAlgorithm {
    /// A fresh random offset every frame
    #[default]
    Random = 0,
    Stratified2 = 1,
    Stratified4 = 2,
    Stratified8 = 3,
    Stratified16 = 4,
}

impl AntiAliasingAlgorithm {
    pub const ALL: [AntiAliasingAlgorithm; 5] = [
        AntiAliasingAlgorithm::Random,
        AntiAliasingAlgorithm::Stratified2,
        AntiAliasingAlgorithm::Stratified4,
        AntiAliasingAlgorithm::Stratified8,
        AntiAliasingAlgorithm::Stratified16,
    ];

    /// First entry of the pattern in `AA_SAMPLE_POINTS` and its length
    pub fn table_range(self) -> (usize, usize) {
        match self {
            AntiAliasingAlgorithm::Random => (0, 1),
            AntiAliasingAlgorithm::Stratified2 => (1, 2),
            AntiAliasingAlgorithm::Stratified4 => (3, 4),
            AntiAliasingAlgorithm::Stratified8 => (7, 8),
            AntiAliasingAlgorithm::Stratified16 => (15, 16),
        }
    }

    /// Value passed to the shaders
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Pixel offsets of every pattern, in `[-0.5, 0.5]`
///
/// Entry 0 is the slot of the random pattern and is replaced by a new
/// jitter each frame.
pub const AA_SAMPLE_POINTS: [[f32; 2]; 31] = [
    // Random
    [0.0, 0.0],
    // Stratified 2x
    [0.25, 0.25],
    [-0.25, -0.25],
    // Stratified 4x
    [-0.125, -0.375],
    [0.375, -0.125],
    [-0.375, 0.125],
    [0.125, 0.375],
    // Stratified 8x
    [0.0625, -0.1875],
    [-0.0625, 0.1875],
    [0.3125, 0.0625],
    [-0.1875, -0.3125],
    [-0.3125, 0.3125],
    [-0.4375, -0.0625],
    [0.1875, 0.4375],
    [0.4375, -0.4375],
    // Stratified 16x
    [0.0625, 0.0625],
    [-0.0625, -0.1875],
    [-0.1875, 0.125],
    [0.25, -0.0625],
    [-0.3125, -0.125],
    [0.125, 0.3125],
    [0.3125, 0.1875],
    [0.1875, -0.3125],
    [-0.125, 0.375],
    [0.0, -0.4375],
    [-0.25, -0.375],
    [-0.375, 0.25],
    [-0.5, 0.0],
    [0.4375, -0.25],
    [0.375, 0.4375],
    [-0.4375, -0.5],
];

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientOcclusionSettings {
    /// Occlusion ray length
    pub size: u32,
    pub samples: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensSettings {
    /// Distance of the focal plane, also used as the camera's near plane
    pub focal_length: f32,
    /// Zero gives a pinhole camera
    pub diameter: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntiAliasingSettings {
    pub enabled: bool,
    pub algorithm: AntiAliasingAlgorithm,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalIlluminationSettings {
    pub bounce_distance: f32,
    /// Indirect bounces per path (0..=15)
    pub bounces: u32,
}

/// Initial camera placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub far_plane: f32,
    pub fov_degrees: f32,
    pub aperture: f32,
    pub position: Vec3,
    /// Pitch, yaw and roll in radians
    pub rotation: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub ambient_occlusion: AmbientOcclusionSettings,
    pub lens: LensSettings,
    pub anti_aliasing: AntiAliasingSettings,
    pub global_illumination: GlobalIlluminationSettings,
    /// Applied by the averager when writing the display texture
    pub gamma: f32,
    pub sky_color: Vec4,
    pub shadow_distance: f32,
    /// Stop accumulating once this many samples were taken, -1 never stops
    pub freeze_at_sample: i32,
    pub camera: CameraSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ambient_occlusion: AmbientOcclusionSettings { size: 50, samples: 2 },
            lens: LensSettings { focal_length: 1.0, diameter: 0.0 },
            anti_aliasing: AntiAliasingSettings {
                enabled: true,
                algorithm: AntiAliasingAlgorithm::Random,
            },
            global_illumination: GlobalIlluminationSettings { bounce_distance: 10000.0, bounces: 2 },
            gamma: 2.2,
            sky_color: Vec4::ONE,
            shadow_distance: 10000.0,
            freeze_at_sample: -1,
            camera: CameraSettings {
                far_plane: 1000.0,
                fov_degrees: 70.0,
                aperture: 0.0,
                position: Vec3::new(0.0, 0.75, 2.0),
                rotation: Vec3::new(0.0, 180f32.to_radians(), 0.0),
            },
        }
    }
}

impl RenderSettings {
    /// Clamp every value into its valid range
    pub fn sanitize(&mut self) {
        self.global_illumination.bounces = self.global_illumination.bounces.min(15);
        self.global_illumination.bounce_distance = self.global_illumination.bounce_distance.max(0.01);
        self.lens.diameter = self.lens.diameter.max(0.0);
        self.lens.focal_length = self.lens.focal_length.max(0.01);
        self.gamma = self.gamma.max(0.1);
    }

    /// Camera at the configured initial placement
    pub fn camera(&self) -> Camera {
        let mut camera = Camera::new();
        camera.set_far_plane(self.camera.far_plane);
        camera.set_fov_degrees(self.camera.fov_degrees);
        camera.set_aperture(self.camera.aperture);
        camera.set_position(self.camera.position);
        camera.set_rotation(self.camera.rotation);
        self.apply_to_camera(&mut camera);
        camera
    }

    /// Lens parameters that live on the camera
    pub fn apply_to_camera(&self, camera: &mut Camera) {
        if camera.near_plane() != self.lens.focal_length {
            camera.set_near_plane(self.lens.focal_length);
        }
    }

    /// Returns true if switching from `previous` invalidates the accumulated samples
    ///
    /// Gamma is applied after averaging and the freeze point only gates
    /// accumulation, so neither restarts it.
    pub fn requires_clear(&self, previous: &RenderSettings) -> bool {
        let mut normalized = previous.clone();
        normalized.gamma = self.gamma;
        normalized.freeze_at_sample = self.freeze_at_sample;
        normalized != *self
    }
}

// ============================================================================
// Sample accumulation
// ============================================================================

#[derive(Debug, Clone)]
pub struct SampleAccumulator {
    sample_count: u32,
    frame_count: u32,
    frozen: bool,
    freeze_at_sample: i32,
    clear_requested: bool,
    /// Whether the frame being prepared restarts accumulation
    clearing: bool,
    rng: XorShift,
}

impl SampleAccumulator {
    pub fn new(seed: u64) -> Self {
        Self {
            sample_count: 0,
            frame_count: 0,
            frozen: false,
            freeze_at_sample: -1,
            clear_requested: false,
            clearing: false,
            rng: XorShift::new(seed),
        }
    }

    /// Restart accumulation at the next frame
    pub fn request_clear(&mut self) {
        self.clear_requested = true;
    }

    pub fn set_freeze_at_sample(&mut self, sample: i32) {
        self.freeze_at_sample = sample;
    }

    pub fn freeze_at_sample(&self) -> i32 {
        self.freeze_at_sample
    }

    /// Freeze or resume accumulation
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Advance the counters for a new frame
    ///
    /// Freezes when the sample count reaches the freeze point, counts the new
    /// sample unless frozen, then applies a pending clear.
    ///
    /// # Returns
    ///
    /// True if this frame restarts accumulation.
    pub fn begin_frame(&mut self) -> bool {
        if !self.frozen && self.freeze_at_sample >= 0 && self.sample_count == self.freeze_at_sample as u32 {
            self.frozen = true;
        }

        if !self.frozen {
            self.sample_count += 1;
        }
        self.frame_count = self.frame_count.wrapping_add(1);

        self.clearing = std::mem::take(&mut self.clear_requested);
        if self.clearing {
            self.sample_count = 0;
        }
        self.clearing
    }

    /// Pixel offset of the current sample for `algorithm`
    pub fn aa_sample_point(&mut self, algorithm: AntiAliasingAlgorithm) -> Vec2 {
        let (base, count) = algorithm.table_range();
        if algorithm == AntiAliasingAlgorithm::Random {
            let x = self.rng.below(100) as f32 / 100.0 - 0.5;
            let y = self.rng.below(100) as f32 / 100.0 - 0.5;
            return Vec2::new(x, y);
        }
        Vec2::from(AA_SAMPLE_POINTS[base + self.sample_count as usize % count])
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// True between `begin_frame()` returning true and the next `begin_frame()`
    pub fn is_clearing(&self) -> bool {
        self.clearing
    }
}

impl Default for SampleAccumulator {
    fn default() -> Self {
        Self::new(0x5EED)
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
