//! Camera and fly-camera controller.

use glam::{Mat4, Vec3};
use volchara_core::{CameraUniforms, Space, Transform};
use volchara_input::KeyCode;

use crate::object::FrameInput;

/// Camera for rendering.
///
/// The view matrix is the inverse of the transform's model matrix. The
/// projection is reversed-Z with an infinite far plane, so depth is 1.0 at
/// the near plane and approaches 0.0 with distance.
#[derive(Debug, Clone)]
pub struct Camera {
    pub transform: Transform,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::IDENTITY,
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.01,
        }
    }
}

impl Camera {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            ..Self::default()
        }
    }

    /// Look at a target position, keeping +Y up.
    pub fn look_at(&mut self, target: Vec3) {
        self.transform.look_at(target, Vec3::Y);
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.transform.model_matrix().inverse()
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_infinite_reverse_rh(self.fov_y, aspect, self.near)
    }

    /// Get camera uniforms for GPU.
    pub fn uniforms(&self, aspect: f32) -> CameraUniforms {
        CameraUniforms::new(self.view_matrix(), self.projection_matrix(aspect))
    }
}

/// Keyboard and mouse camera controller.
///
/// WASD moves in the camera's local plane, Q and E move down and up along
/// world Y. Mouse motion pitches locally and yaws about world Y so the
/// horizon stays level.
#[derive(Debug, Clone, Copy)]
pub struct FlyCamera {
    /// Units per second.
    pub speed: f32,
    /// Radians per unit of cursor motion.
    pub sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            speed: 1.0,
            sensitivity: 0.002,
        }
    }
}

impl FlyCamera {
    pub fn update(&self, transform: &mut Transform, input: &FrameInput<'_>) {
        let step = input.elapsed * self.speed;

        if input.is_pressed(KeyCode::KeyW) {
            transform.move_forward(step, Space::Local);
        }
        if input.is_pressed(KeyCode::KeyS) {
            transform.move_backward(step, Space::Local);
        }
        if input.is_pressed(KeyCode::KeyA) {
            transform.move_left(step, Space::Local);
        }
        if input.is_pressed(KeyCode::KeyD) {
            transform.move_right(step, Space::Local);
        }
        if input.is_pressed(KeyCode::KeyQ) {
            transform.move_down(step, Space::World);
        }
        if input.is_pressed(KeyCode::KeyE) {
            transform.move_up(step, Space::World);
        }

        let delta = input.cursor_delta;
        if delta.y != 0.0 {
            transform.rotate_up(-delta.y * self.sensitivity, Space::Local);
        }
        if delta.x != 0.0 {
            transform.rotate_right(delta.x * self.sensitivity, Space::World);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Vec2, Vec4};
    use hashbrown::HashSet;

    #[test]
    fn view_inverts_camera_transform() {
        let camera = Camera::new(Transform::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        let origin = camera.view_matrix() * Vec4::new(1.0, 2.0, 3.0, 1.0);
        assert!(origin.truncate().abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn depth_is_reversed() {
        let camera = Camera::default();
        let projection = camera.projection_matrix(1.0);

        let depth = |distance: f32| {
            let clip = projection * Vec4::new(0.0, 0.0, -distance, 1.0);
            clip.z / clip.w
        };
        assert_relative_eq!(depth(camera.near), 1.0, epsilon = 1e-5);
        assert!(depth(10.0) < depth(1.0));
        assert!(depth(1000.0) > 0.0);
    }

    #[test]
    fn fly_camera_moves_and_turns() {
        let controller = FlyCamera::default();
        let mut transform = Transform::IDENTITY;
        let keys: HashSet<KeyCode> = [KeyCode::KeyW, KeyCode::KeyE].into_iter().collect();

        controller.update(
            &mut transform,
            &FrameInput {
                elapsed: 0.5,
                pressed_keys: &keys,
                cursor_delta: Vec2::ZERO,
            },
        );
        assert!(transform
            .translation
            .abs_diff_eq(Vec3::new(0.0, 0.5, -0.5), 1e-5));

        let none = HashSet::new();
        controller.update(
            &mut transform,
            &FrameInput {
                elapsed: 0.5,
                pressed_keys: &none,
                cursor_delta: Vec2::new(100.0, 0.0),
            },
        );
        // Positive horizontal motion turns right, toward +X
        assert!(transform.forward().x > 0.0);
        assert_relative_eq!(transform.forward().y, 0.0, epsilon = 1e-5);
    }
}
