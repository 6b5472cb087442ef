//! Camera and first-person fly controller.

use glam::{Mat4, Quat, Vec2, Vec3};

/// Projection type for the camera.
#[derive(Clone, Debug)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov_y: 45.0_f32.to_radians(),
                aspect: 16.0 / 9.0,
                near: 0.1,
                far: 1000.0,
            },
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection::Perspective {
            fov_y,
            aspect,
            near,
            far,
        };
    }

    /// Update the aspect ratio (perspective only).
    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective {
            aspect: current, ..
        } = &mut self.projection
        {
            *current = aspect;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// Projection matrix with the Vulkan Y-flip applied.
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = match self.projection {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
        };
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn look_at(&mut self, target: Vec3) {
        let forward = (target - self.position).normalize_or_zero();
        if forward != Vec3::ZERO {
            self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, forward);
        }
    }
}

/// Movement intent for one frame, in camera-relative axes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlyInput {
    /// +1 forward, -1 backward.
    pub forward: f32,
    /// +1 right, -1 left.
    pub right: f32,
    /// +1 up, -1 down (world Y).
    pub up: f32,
    /// Mouse-look delta in pixels; +x turns right, +y looks down.
    pub look: Vec2,
}

/// First-person fly camera: yaw/pitch mouse-look and planar WASD
/// movement with vertical strafing.
#[derive(Clone, Debug)]
pub struct FlyController {
    /// Degrees; 0 looks down -Z.
    pub yaw: f32,
    /// Degrees, clamped to +/- [`FlyController::PITCH_LIMIT`].
    pub pitch: f32,
    /// World units per second.
    pub speed: f32,
    /// Degrees per pixel of mouse motion.
    pub sensitivity: f32,
}

impl Default for FlyController {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            speed: 2.5,
            sensitivity: 0.1,
        }
    }
}

impl FlyController {
    pub const PITCH_LIMIT: f32 = 89.0;

    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            speed,
            sensitivity,
            ..Self::default()
        }
    }

    /// Adopts the camera's current orientation.
    pub fn sync_from(&mut self, camera: &Camera) {
        let forward = camera.forward();
        self.yaw = (-forward.x).atan2(-forward.z).to_degrees();
        self.pitch = forward
            .y
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
            .clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw.to_radians()) * Quat::from_rotation_x(self.pitch.to_radians())
    }

    /// Applies one frame of input scaled by `dt` seconds.
    pub fn update(&mut self, camera: &mut Camera, input: &FlyInput, dt: f32) {
        self.yaw -= input.look.x * self.sensitivity;
        self.pitch = (self.pitch - input.look.y * self.sensitivity)
            .clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
        camera.rotation = self.rotation();

        // Planar movement ignores pitch.
        let yaw = Quat::from_rotation_y(self.yaw.to_radians());
        let forward = yaw * Vec3::NEG_Z;
        let right = yaw * Vec3::X;
        let direction = forward * input.forward + right * input.right + Vec3::Y * input.up;
        camera.position += direction.normalize_or_zero() * self.speed * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_view_looks_down_neg_z() {
        let camera = Camera::default();
        assert!(camera.forward().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        let origin_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!(origin_in_view.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-5));
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::default();
        assert!(camera.projection_matrix().y_axis.y < 0.0);
    }

    #[test]
    fn test_set_aspect() {
        let mut camera = Camera::default();
        camera.set_aspect(2.0);
        let Projection::Perspective { aspect, .. } = camera.projection else {
            panic!("expected perspective");
        };
        assert_eq!(aspect, 2.0);
    }

    #[test]
    fn test_fly_forward_moves_along_view() {
        let mut camera = Camera::default();
        let mut controller = FlyController::new(2.0, 0.1);
        let input = FlyInput {
            forward: 1.0,
            ..FlyInput::default()
        };
        controller.update(&mut camera, &input, 0.5);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, 4.0), 1e-5));
    }

    #[test]
    fn test_fly_pitch_is_clamped() {
        let mut camera = Camera::default();
        let mut controller = FlyController::default();
        let input = FlyInput {
            look: Vec2::new(0.0, -10_000.0),
            ..FlyInput::default()
        };
        controller.update(&mut camera, &input, 0.016);
        assert_eq!(controller.pitch, FlyController::PITCH_LIMIT);
        assert!(camera.forward().y > 0.99);
    }

    #[test]
    fn test_fly_vertical_ignores_pitch() {
        let mut camera = Camera::default();
        let mut controller = FlyController::new(1.0, 1.0);
        controller.pitch = 45.0;
        let input = FlyInput {
            up: 1.0,
            ..FlyInput::default()
        };
        controller.update(&mut camera, &input, 1.0);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 1.0, 5.0), 1e-5));
    }

    #[test]
    fn test_sync_from_round_trips_orientation() {
        let mut camera = Camera::default();
        camera.look_at(Vec3::new(-5.0, 0.0, 0.0));
        let mut controller = FlyController::default();
        controller.sync_from(&camera);
        assert!(controller.rotation().mul_vec3(Vec3::NEG_Z).abs_diff_eq(camera.forward(), 1e-4));
    }
}
