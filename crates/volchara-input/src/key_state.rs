//! Per-key press state with single-frame edges.

/// State of one key.
///
/// ```text
/// Up ─press()─> Pressed ─end_frame()─> Held
///  ^                                     │
///  │                                 release()
///  │                                     v
///  └────────end_frame()──────────── Released
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    /// Went down this frame.
    Pressed,
    /// Down since an earlier frame.
    Held,
    /// Went up this frame.
    Released,
    #[default]
    Up,
}

impl KeyState {
    /// Down, whether this frame or earlier.
    #[inline]
    #[must_use]
    pub const fn is_down(self) -> bool {
        matches!(self, Self::Pressed | Self::Held)
    }

    #[inline]
    #[must_use]
    pub const fn is_just_pressed(self) -> bool {
        matches!(self, Self::Pressed)
    }

    #[inline]
    #[must_use]
    pub const fn is_just_released(self) -> bool {
        matches!(self, Self::Released)
    }

    /// Key repeat events for a held key do not produce a new edge.
    #[inline]
    pub fn press(&mut self) {
        if !self.is_down() {
            *self = Self::Pressed;
        }
    }

    #[inline]
    pub fn release(&mut self) {
        if self.is_down() {
            *self = Self::Released;
        }
    }

    #[inline]
    pub fn end_frame(&mut self) {
        *self = match *self {
            Self::Pressed => Self::Held,
            Self::Released => Self::Up,
            other => other,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let mut state = KeyState::default();
        assert!(!state.is_down());

        state.press();
        assert!(state.is_down());
        assert!(state.is_just_pressed());

        state.end_frame();
        assert_eq!(state, KeyState::Held);
        assert!(!state.is_just_pressed());

        state.release();
        assert!(!state.is_down());
        assert!(state.is_just_released());

        state.end_frame();
        assert_eq!(state, KeyState::Up);
    }

    #[test]
    fn repeats_do_not_retrigger() {
        let mut state = KeyState::Held;
        state.press();
        assert_eq!(state, KeyState::Held);

        let mut up = KeyState::Up;
        up.release();
        assert_eq!(up, KeyState::Up);
    }
}
