//! Input handling for the Volchara engine.
//!
//! Tracks which keys are down and how far the cursor moved since the last
//! frame. The application runner feeds winit events into [`InputState`];
//! the frame loop reads it and calls [`InputState::end_frame`].

mod cursor;
mod input;
mod key_state;
mod keyboard;

pub use cursor::CursorState;
pub use input::InputState;
pub use key_state::KeyState;
pub use keyboard::KeyboardState;

// Re-export winit types commonly used with input
pub use winit::event::{DeviceEvent, WindowEvent};
pub use winit::keyboard::KeyCode;
