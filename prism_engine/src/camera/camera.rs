/// Camera: position, Euler rotation and lens parameters.
///
/// View and projection matrices are recomputed lazily when their inputs
/// change. Translations accumulate in camera space and are applied along the
/// rotated axes at the next view update. Both matrices are left-handed.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Aspect ratio of the default 1280x720 output
pub const DEFAULT_ASPECT_RATIO: f32 = 1280.0 / 720.0;

#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    /// Pitch (x), yaw (y) and roll (z) in radians
    rotation: Vec3,
    translation_accumulator: Vec3,
    view: Mat4,
    projection: Mat4,
    view_dirty: bool,
    projection_dirty: bool,
    near_plane: f32,
    far_plane: f32,
    aperture: f32,
    fov: f32,
    aspect_ratio: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            translation_accumulator: Vec3::ZERO,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_dirty: true,
            projection_dirty: true,
            near_plane: 1.0,
            far_plane: 1000.0,
            aperture: 0.1,
            fov: std::f32::consts::FRAC_PI_2,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== MOTION =====

    /// Move along the camera's right (x), up (y) and forward (z) axes
    pub fn translate(&mut self, translation: Vec3) {
        self.translation_accumulator += translation;
        self.view_dirty = true;
    }

    /// Add to pitch, yaw and roll
    pub fn rotate(&mut self, rotation: Vec3) {
        self.rotation += rotation;
        self.view_dirty = true;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.view_dirty = true;
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.view_dirty = true;
    }

    /// Position as of the last view update
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    // ===== LENS =====

    pub fn set_near_plane(&mut self, near_plane: f32) {
        self.near_plane = near_plane;
        self.projection_dirty = true;
    }

    pub fn set_far_plane(&mut self, far_plane: f32) {
        self.far_plane = far_plane;
        self.projection_dirty = true;
    }

    pub fn near_plane(&self) -> f32 {
        self.near_plane
    }

    pub fn far_plane(&self) -> f32 {
        self.far_plane
    }

    pub fn set_aperture(&mut self, aperture: f32) {
        self.aperture = aperture;
    }

    pub fn aperture(&self) -> f32 {
        self.aperture
    }

    pub fn set_fov_radians(&mut self, fov: f32) {
        self.fov = fov;
        self.projection_dirty = true;
    }

    pub fn set_fov_degrees(&mut self, fov: f32) {
        self.set_fov_radians(fov.to_radians());
    }

    /// Vertical field of view
    pub fn fov_radians(&self) -> f32 {
        self.fov
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
        self.projection_dirty = true;
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    // ===== MATRICES =====

    pub fn view_matrix(&mut self) -> Mat4 {
        if self.view_dirty {
            self.update_view();
        }
        self.view
    }

    pub fn projection_matrix(&mut self) -> Mat4 {
        if self.projection_dirty {
            self.projection = Mat4::perspective_lh(self.fov, self.aspect_ratio, self.near_plane, self.far_plane);
            self.projection_dirty = false;
        }
        self.projection
    }

    /// Inverse view-projection, mapping clip space back to world space
    pub fn projection_to_world(&mut self) -> Mat4 {
        let view = self.view_matrix();
        (self.projection_matrix() * view).inverse()
    }

    /// Forward, right and up axes of the current rotation
    pub fn axes(&self) -> (Vec3, Vec3, Vec3) {
        let rotation = Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z);
        let forward = rotation * Vec3::Z;
        let right = rotation * Vec3::X;
        (forward, right, forward.cross(right))
    }

    fn update_view(&mut self) {
        let (forward, right, up) = self.axes();
        let acc = self.translation_accumulator;
        let position = self.position + forward * acc.z + right * acc.x + up * acc.y;
        let target = position + forward.normalize();

        self.view = Mat4::look_at_lh(position, target, up);
        self.position = position;
        self.translation_accumulator = Vec3::ZERO;
        self.view_dirty = false;
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
