//! Application framework for the Volchara engine.
//!
//! This crate provides a trait-based application framework that handles
//! common boilerplate like:
//! - Logging setup
//! - Window creation and resize tracking
//! - Engine initialization
//! - Feeding keyboard and mouse input to the frame loop
//! - Event loop handling and orderly shutdown
//!
//! # Example
//!
//! ```no_run
//! use volchara_app::{run_app, App, AppConfig, Engine, KeyCode, Object};
//!
//! struct MyApp;
//!
//! impl App for MyApp {
//!     fn init(engine: &mut Engine) -> anyhow::Result<Self> {
//!         engine.add_object(Object::from_vertices(&[]).on_frame(|_, input, commands| {
//!             if input.is_pressed(KeyCode::Escape) {
//!                 commands.exit();
//!             }
//!         }));
//!         Ok(MyApp)
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::new("My App"))
//! }
//! ```

mod app;
mod runner;

pub use app::App;
pub use runner::{run_app, AppConfig};

// Re-export commonly used types for convenience
pub use volchara_input::{InputState, KeyCode};
pub use volchara_render::{
    Camera, Engine, EngineConfig, FlyCamera, FrameInput, FrameOutcome, Object, ObjectId,
    SceneCommands, FRAGMENT_SHADER, VERTEX_SHADER,
};
pub use winit::event::{DeviceEvent, DeviceId, WindowEvent};
