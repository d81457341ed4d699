//! Transform math and movement helpers.
//!
//! Conventions: right-handed, +Y up, forward is -Z. Angles are radians.
//! A positive `rotate_left` turns about +Y, a positive `rotate_up` about +X.

use glam::{Mat4, Quat, Vec3};

/// Frame of reference for a movement or rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Space {
    /// Relative to the transform's own orientation.
    #[default]
    Local,
    /// Relative to the world axes.
    World,
}

/// Translation, rotation and scale of an object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Transform positioned at `translation` with no rotation or scaling.
    #[inline]
    pub const fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    #[must_use]
    pub const fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub const fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Model matrix, composed as translation * rotation * scale.
    #[inline]
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Direction the transform is facing.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Move by `offset`, interpreted in the given space.
    pub fn translate(&mut self, offset: Vec3, space: Space) {
        self.translation += match space {
            Space::Local => self.rotation * offset,
            Space::World => offset,
        };
    }

    /// Apply `delta` on top of the current rotation.
    ///
    /// Local rotations post-multiply (`q * delta`), world rotations
    /// pre-multiply (`delta * q`). The result is renormalized.
    pub fn rotate(&mut self, delta: Quat, space: Space) {
        self.rotation = match space {
            Space::Local => self.rotation * delta,
            Space::World => delta * self.rotation,
        }
        .normalize();
    }

    pub fn move_forward(&mut self, distance: f32, space: Space) {
        self.translate(Vec3::new(0.0, 0.0, -distance), space);
    }

    pub fn move_backward(&mut self, distance: f32, space: Space) {
        self.move_forward(-distance, space);
    }

    pub fn move_left(&mut self, distance: f32, space: Space) {
        self.translate(Vec3::new(-distance, 0.0, 0.0), space);
    }

    pub fn move_right(&mut self, distance: f32, space: Space) {
        self.move_left(-distance, space);
    }

    pub fn move_up(&mut self, distance: f32, space: Space) {
        self.translate(Vec3::new(0.0, distance, 0.0), space);
    }

    pub fn move_down(&mut self, distance: f32, space: Space) {
        self.move_up(-distance, space);
    }

    /// Pitch up.
    pub fn rotate_up(&mut self, angle: f32, space: Space) {
        self.rotate(Quat::from_rotation_x(angle), space);
    }

    pub fn rotate_down(&mut self, angle: f32, space: Space) {
        self.rotate_up(-angle, space);
    }

    /// Yaw left.
    pub fn rotate_left(&mut self, angle: f32, space: Space) {
        self.rotate(Quat::from_rotation_y(angle), space);
    }

    pub fn rotate_right(&mut self, angle: f32, space: Space) {
        self.rotate_left(-angle, space);
    }

    /// Roll counter-clockwise, as seen looking down -Z.
    pub fn rotate_ccw(&mut self, angle: f32, space: Space) {
        self.rotate(Quat::from_rotation_z(angle), space);
    }

    pub fn rotate_cw(&mut self, angle: f32, space: Space) {
        self.rotate_ccw(-angle, space);
    }

    /// Orient so that [`forward`](Self::forward) points at `target`.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let direction = target - self.translation;
        if direction.length_squared() <= f32::EPSILON {
            return;
        }
        // look_at_rh yields the view rotation; its inverse is the object's orientation.
        let view = Mat4::look_at_rh(self.translation, target, up);
        self.rotation = Quat::from_mat4(&view.inverse()).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn model_matrix_applies_scale_then_rotation_then_translation() {
        let transform = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Quat::from_rotation_y(FRAC_PI_2))
            .with_scale(Vec3::splat(2.0));

        let point = transform.model_matrix().transform_point3(Vec3::X);
        // scale: (2,0,0) -> rotate +90 about Y: (0,0,-2) -> translate
        assert_relative_eq!(point.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(point.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(point.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn forward_is_negative_z() {
        let transform = Transform::default();
        assert_eq!(transform.forward(), Vec3::NEG_Z);
    }

    #[test]
    fn local_movement_follows_rotation() {
        let mut transform = Transform::default();
        transform.rotate_left(FRAC_PI_2, Space::Local);
        transform.move_forward(1.0, Space::Local);

        // Facing -X after a left turn
        assert_relative_eq!(transform.translation.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(transform.translation.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn world_movement_ignores_rotation() {
        let mut transform = Transform::default();
        transform.rotate_left(FRAC_PI_2, Space::Local);
        transform.move_forward(1.0, Space::World);

        assert_relative_eq!(transform.translation.z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(transform.translation.x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn local_and_world_rotation_order() {
        let mut local = Transform::default().with_rotation(Quat::from_rotation_x(0.3));
        let mut world = local;
        local.rotate_left(0.5, Space::Local);
        world.rotate_left(0.5, Space::World);

        let expected_local = Quat::from_rotation_x(0.3) * Quat::from_rotation_y(0.5);
        let expected_world = Quat::from_rotation_y(0.5) * Quat::from_rotation_x(0.3);
        assert!(local.rotation.abs_diff_eq(expected_local, 1e-5));
        assert!(world.rotation.abs_diff_eq(expected_world, 1e-5));
    }

    #[test]
    fn opposite_rotations_cancel() {
        let mut transform = Transform::default();
        transform.rotate_up(0.7, Space::Local);
        transform.rotate_down(0.7, Space::Local);
        transform.rotate_cw(0.2, Space::World);
        transform.rotate_ccw(0.2, Space::World);
        assert!(transform.rotation.abs_diff_eq(Quat::IDENTITY, 1e-5));
    }

    #[test]
    fn look_at_faces_target() {
        let mut transform = Transform::from_translation(Vec3::new(0.0, 0.0, 5.0));
        transform.look_at(Vec3::new(5.0, 0.0, 5.0), Vec3::Y);
        let forward = transform.forward();
        assert_relative_eq!(forward.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(forward.z, 0.0, epsilon = 1e-5);
    }
}
