//! Application runner and event loop.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use volchara_input::InputState;
use volchara_render::{Engine, EngineConfig, FrameOutcome};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::app::App;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Engine settings.
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Volchara Engine".to_string(),
            width: 800,
            height: 600,
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            engine: EngineConfig::new(title.clone()),
            title,
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the engine configuration.
    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Run an [`App`] with the given configuration.
///
/// This function initializes logging, creates the window and engine, and
/// runs the event loop until the window closes or a callback requests an
/// exit. Initialization and frame errors are returned. A frame error is
/// fatal: it is logged, the app is cleaned up and the loop exits.
pub fn run_app<A: App + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
        failure: None,
    };
    event_loop.run_app(&mut runner)?;

    match runner.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Internal application runner that implements winit's `ApplicationHandler`.
struct AppRunner<A: App> {
    config: AppConfig,
    state: Option<AppState<A>>,
    failure: Option<anyhow::Error>,
}

/// Internal application state.
///
/// The engine holds the window's surface, so it is declared (and dropped)
/// before the window.
struct AppState<A: App> {
    app: A,
    engine: Engine,
    input: InputState,
    /// Zero-sized drawable; ticks are skipped until it grows.
    minimized: bool,
    window: Arc<Window>,
}

impl<A: App + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        state.input.process_window_event(&event);
        if state.app.on_event(&mut state.engine, &event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => state.handle_resize(size),
            WindowEvent::RedrawRequested => {
                if state.minimized {
                    return;
                }
                match state.engine.frame(&state.input) {
                    Ok(FrameOutcome::Paced) => {}
                    Ok(FrameOutcome::Exit) => self.shutdown(event_loop),
                    Ok(_) => state.input.end_frame(),
                    Err(e) => {
                        error!("Render error: {e}");
                        self.failure = Some(e.into());
                        self.shutdown(event_loop);
                    }
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let Some(state) = &mut self.state {
            state.input.process_device_event(&event);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

impl<A: App + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();

        let mut engine = Engine::new(
            window.as_ref(),
            size.width,
            size.height,
            self.config.engine.clone(),
        )?;

        let app = A::init(&mut engine)?;

        Ok(AppState {
            app,
            engine,
            input: InputState::new(),
            minimized: size.width == 0 || size.height == 0,
            window,
        })
    }

    /// Wait for the GPU, let the app clean up, then release everything.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut state) = self.state.take() {
            info!("Starting cleanup...");
            if let Err(e) = state.engine.wait_idle() {
                error!("Failed to wait for device idle: {e}");
            }
            state.app.cleanup(&mut state.engine);
            drop(state);
            info!("Cleanup complete");
        }
        event_loop.exit();
    }
}

impl<A: App> AppState<A> {
    fn handle_resize(&mut self, size: PhysicalSize<u32>) {
        self.minimized = size.width == 0 || size.height == 0;
        if !self.minimized {
            self.engine.resize(size.width, size.height);
        }
    }
}
