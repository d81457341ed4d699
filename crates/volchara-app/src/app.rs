//! `App` trait definition.

use volchara_render::Engine;
use winit::event::WindowEvent;

/// Trait for Volchara applications.
///
/// The runner creates the window and [`Engine`], feeds input, drives the
/// frame loop and handles resizes. An application populates the scene in
/// [`init`](Self::init) and attaches per-object callbacks for behaviour.
pub trait App: Sized {
    /// Initialize the application.
    ///
    /// Called once after the window and engine have been created. Add
    /// objects, load textures and position the camera here.
    fn init(engine: &mut Engine) -> anyhow::Result<Self>;

    /// Handle window events.
    ///
    /// Called for each window event after the input state has seen it.
    /// Return `true` if the event was handled and should not be processed
    /// further.
    ///
    /// Default implementation does nothing and returns `false`.
    #[allow(unused_variables)]
    fn on_event(&mut self, engine: &mut Engine, event: &WindowEvent) -> bool {
        false
    }

    /// Cleanup before shutdown.
    ///
    /// Called when the application is about to exit. The GPU is idle.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn cleanup(&mut self, engine: &mut Engine) {}
}
