//! Volchara Engine Demo Viewer
//!
//! Renders a textured floor, a spinning cube and a directional light with a
//! fly camera.
//!
//! ## Usage
//!
//! The shaders are not compiled by the build. Compile them once with `glslc`
//! before the first run:
//!
//! ```bash
//! glslc --target-env=vulkan1.2 shaders/base.vert -o shaders/base.vert.spv
//! glslc --target-env=vulkan1.2 shaders/base.frag -o shaders/base.frag.spv
//! cargo run -p volchara-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--texture <PATH>`: Image used for the floor (default: generated checkerboard)
//! - `--shaders <DIR>`: Directory holding compiled SPIR-V (default: shaders)
//! - `--fps <N>`: Frame-rate cap, 0 for unlimited (default: 60)
//! - `--vsync`: Force FIFO presentation
//! - `-h, --help`: Print help message
//!
//! ## Controls
//!
//! - `W/A/S/D`: Move, `Q/E`: down/up
//! - Mouse: look around
//! - `Space`: toggle cube rotation
//! - `Escape`: quit
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use volchara_app::{run_app, AppConfig, EngineConfig, FlyCamera};

use crate::app::{missing_shaders, Viewer, ViewerParams};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

const COMPILE_SHADERS: &str = "Compile the shaders with glslc (Vulkan SDK) first:
    glslc --target-env=vulkan1.2 shaders/base.vert -o shaders/base.vert.spv
    glslc --target-env=vulkan1.2 shaders/base.frag -o shaders/base.frag.spv";

/// Camera movement speed in units per second.
const CAMERA_SPEED: f32 = 3.0;

fn main() -> anyhow::Result<()> {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    let params = ViewerParams::from_args();

    let missing = missing_shaders(&params.shader_dir);
    if !missing.is_empty() {
        for path in &missing {
            eprintln!("Missing compiled shader: {}", path.display());
        }
        eprintln!("{COMPILE_SHADERS}");
        anyhow::bail!("compiled shaders not found in {}", params.shader_dir.display());
    }

    let engine = EngineConfig::new("Volchara Viewer")
        .with_shader_dir(params.shader_dir)
        .with_target_fps(Some(params.target_fps))
        .with_vsync(params.vsync)
        .with_clear_color([0.05, 0.06, 0.08, 1.0])
        .with_fly_camera(FlyCamera {
            speed: CAMERA_SPEED,
            ..FlyCamera::default()
        });

    run_app::<Viewer>(
        AppConfig::new("Volchara Engine - Viewer")
            .with_size(WIDTH, HEIGHT)
            .with_engine(engine),
    )
}

fn print_help() {
    eprintln!(
        "Volchara Engine Demo Viewer

USAGE:
    cargo run -p volchara-viewer -- [OPTIONS]

SHADERS:
    The build does not compile shaders. Before the first run:
    glslc --target-env=vulkan1.2 shaders/base.vert -o shaders/base.vert.spv
    glslc --target-env=vulkan1.2 shaders/base.frag -o shaders/base.frag.spv

OPTIONS:
    --texture <PATH>        Image used for the floor
                            Default: generated checkerboard
    --shaders <DIR>         Directory holding base.vert.spv and base.frag.spv
                            Default: shaders
    --fps <N>               Frame-rate cap, 0 for unlimited (default: 60)
    --vsync                 Force FIFO presentation
    -h, --help              Print this help message

CONTROLS:
    W/A/S/D                 Move
    Q/E                     Move down/up
    Mouse                   Look around
    Space                   Toggle cube rotation
    Escape                  Quit

EXAMPLES:
    # Default scene
    cargo run -p volchara-viewer

    # Custom floor texture, unlimited frame rate
    cargo run -p volchara-viewer -- --texture assets/floor.png --fps 0

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
