//! Keyboard state tracking.

use hashbrown::HashMap;
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::key_state::KeyState;

/// Keyboard state keyed by physical key code.
#[derive(Debug, Default)]
pub struct KeyboardState {
    keys: HashMap<KeyCode, KeyState>,
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a winit key event. Keys without a known code are ignored.
    pub fn process_key_event(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        match event.state {
            ElementState::Pressed => self.press(code),
            ElementState::Released => self.release(code),
        }
    }

    pub fn press(&mut self, key: KeyCode) {
        self.keys.entry(key).or_default().press();
    }

    pub fn release(&mut self, key: KeyCode) {
        if let Some(state) = self.keys.get_mut(&key) {
            state.release();
        }
    }

    fn state(&self, key: KeyCode) -> KeyState {
        self.keys.get(&key).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.state(key).is_down()
    }

    #[must_use]
    pub fn is_just_pressed(&self, key: KeyCode) -> bool {
        self.state(key).is_just_pressed()
    }

    #[must_use]
    pub fn is_just_released(&self, key: KeyCode) -> bool {
        self.state(key).is_just_released()
    }

    /// Every key currently down.
    pub fn pressed_keys(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.keys
            .iter()
            .filter(|(_, state)| state.is_down())
            .map(|(&key, _)| key)
    }

    /// Advance edges and forget keys that are fully up.
    pub fn end_frame(&mut self) {
        self.keys.retain(|_, state| {
            state.end_frame();
            *state != KeyState::Up
        });
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_hold_release() {
        let mut keyboard = KeyboardState::new();
        assert!(!keyboard.is_pressed(KeyCode::KeyW));

        keyboard.press(KeyCode::KeyW);
        assert!(keyboard.is_pressed(KeyCode::KeyW));
        assert!(keyboard.is_just_pressed(KeyCode::KeyW));

        keyboard.end_frame();
        assert!(keyboard.is_pressed(KeyCode::KeyW));
        assert!(!keyboard.is_just_pressed(KeyCode::KeyW));

        keyboard.release(KeyCode::KeyW);
        assert!(!keyboard.is_pressed(KeyCode::KeyW));
        assert!(keyboard.is_just_released(KeyCode::KeyW));

        keyboard.end_frame();
        assert!(!keyboard.is_just_released(KeyCode::KeyW));
        assert_eq!(keyboard.keys.len(), 0);
    }

    #[test]
    fn pressed_keys_lists_only_down_keys() {
        let mut keyboard = KeyboardState::new();
        keyboard.press(KeyCode::KeyA);
        keyboard.press(KeyCode::KeyD);
        keyboard.end_frame();
        keyboard.release(KeyCode::KeyA);

        let pressed: Vec<KeyCode> = keyboard.pressed_keys().collect();
        assert_eq!(pressed, vec![KeyCode::KeyD]);
    }

    #[test]
    fn releasing_unknown_key_is_noop() {
        let mut keyboard = KeyboardState::new();
        keyboard.release(KeyCode::Escape);
        assert_eq!(keyboard.pressed_keys().count(), 0);
    }
}
