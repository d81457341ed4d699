//! Cursor motion tracking.

use glam::Vec2;

/// Cursor position and per-frame motion.
///
/// Raw device motion is preferred once any has been seen, since it keeps
/// working while the cursor is grabbed. Until then the delta comes from
/// successive window cursor positions.
#[derive(Debug, Default)]
pub struct CursorState {
    position: Option<Vec2>,
    window_delta: Vec2,
    raw_delta: Vec2,
    raw_motion_seen: bool,
}

impl CursorState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Window cursor moved to `(x, y)` in physical pixels.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set_position(&mut self, x: f64, y: f64) {
        let new = Vec2::new(x as f32, y as f32);
        // First sample after entering the window has no reference point
        if let Some(old) = self.position {
            self.window_delta += new - old;
        }
        self.position = Some(new);
    }

    /// The cursor left the window; the next position starts fresh.
    pub fn left_window(&mut self) {
        self.position = None;
    }

    /// Raw device motion in device units.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_raw_motion(&mut self, dx: f64, dy: f64) {
        self.raw_delta += Vec2::new(dx as f32, dy as f32);
        self.raw_motion_seen = true;
    }

    #[must_use]
    pub fn position(&self) -> Option<Vec2> {
        self.position
    }

    /// Motion accumulated since the last [`end_frame`](Self::end_frame).
    #[must_use]
    pub fn delta(&self) -> Vec2 {
        if self.raw_motion_seen {
            self.raw_delta
        } else {
            self.window_delta
        }
    }

    pub fn end_frame(&mut self) {
        self.window_delta = Vec2::ZERO;
        self.raw_delta = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_motion_accumulates() {
        let mut cursor = CursorState::new();
        cursor.set_position(100.0, 200.0);
        assert_eq!(cursor.delta(), Vec2::ZERO);

        cursor.set_position(110.0, 190.0);
        cursor.set_position(115.0, 195.0);
        assert_eq!(cursor.delta(), Vec2::new(15.0, -5.0));

        cursor.end_frame();
        assert_eq!(cursor.delta(), Vec2::ZERO);
        assert_eq!(cursor.position(), Some(Vec2::new(115.0, 195.0)));
    }

    #[test]
    fn raw_motion_takes_over() {
        let mut cursor = CursorState::new();
        cursor.set_position(0.0, 0.0);
        cursor.add_raw_motion(3.0, 4.0);
        cursor.set_position(50.0, 50.0);
        assert_eq!(cursor.delta(), Vec2::new(3.0, 4.0));

        cursor.end_frame();
        cursor.set_position(60.0, 60.0);
        assert_eq!(cursor.delta(), Vec2::ZERO);
    }

    #[test]
    fn reentering_window_does_not_jump() {
        let mut cursor = CursorState::new();
        cursor.set_position(10.0, 10.0);
        cursor.left_window();
        cursor.set_position(500.0, 500.0);
        assert_eq!(cursor.delta(), Vec2::ZERO);
    }
}
