//! Input state fed from winit events.

use glam::Vec2;
use winit::event::{DeviceEvent, WindowEvent};
use winit::keyboard::KeyCode;

use crate::cursor::CursorState;
use crate::keyboard::KeyboardState;

/// Keyboard and cursor state for one window.
///
/// The runner feeds window and device events in, the frame loop reads the
/// snapshot, and [`end_frame`](Self::end_frame) is called once per rendered
/// tick to clear edges and deltas.
#[derive(Debug, Default)]
pub struct InputState {
    keyboard: KeyboardState,
    cursor: CursorState,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a window event.
    ///
    /// Returns `true` if the event was consumed.
    pub fn process_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                self.keyboard.process_key_event(event);
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor.set_position(position.x, position.y);
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor.left_window();
                true
            }
            WindowEvent::Focused(false) => {
                // Releases are not delivered while unfocused
                tracing::debug!("Window lost focus, clearing input state");
                self.clear();
                false
            }
            _ => false,
        }
    }

    /// Process a device event (raw mouse motion).
    pub fn process_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.cursor.add_raw_motion(delta.0, delta.1);
        }
    }

    pub fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut KeyboardState {
        &mut self.keyboard
    }

    pub fn cursor(&self) -> &CursorState {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut CursorState {
        &mut self.cursor
    }

    #[must_use]
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keyboard.is_pressed(key)
    }

    #[must_use]
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.keyboard.is_just_pressed(key)
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.keyboard.pressed_keys()
    }

    #[must_use]
    pub fn cursor_delta(&self) -> Vec2 {
        self.cursor.delta()
    }

    /// Called once per frame after the frame has consumed the input.
    pub fn end_frame(&mut self) {
        self.keyboard.end_frame();
        self.cursor.end_frame();
    }

    /// Clear all input state.
    pub fn clear(&mut self) {
        self.keyboard.clear();
        self.cursor = CursorState::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_idle() {
        let input = InputState::new();
        assert!(!input.is_key_pressed(KeyCode::KeyW));
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
    }

    #[test]
    fn device_motion_feeds_cursor_delta() {
        let mut input = InputState::new();
        input.process_device_event(&DeviceEvent::MouseMotion { delta: (2.0, -1.0) });
        input.process_device_event(&DeviceEvent::MouseMotion { delta: (1.0, 1.0) });
        assert_eq!(input.cursor_delta(), Vec2::new(3.0, 0.0));

        input.end_frame();
        assert_eq!(input.cursor_delta(), Vec2::ZERO);
    }

    #[test]
    fn focus_loss_releases_everything() {
        let mut input = InputState::new();
        input.keyboard_mut().press(KeyCode::KeyW);
        assert!(!input.process_window_event(&WindowEvent::Focused(false)));
        assert!(!input.is_key_pressed(KeyCode::KeyW));
    }
}
