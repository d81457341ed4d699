//! Viewer application implementation.

use std::f32::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};

use glam::{Quat, Vec3, Vec4};
use tracing::{info, warn};

use volchara_app::{App, Engine, KeyCode, Object, ObjectId, FRAGMENT_SHADER, VERTEX_SHADER};
use volchara_core::constants::DEFAULT_TARGET_FPS;
use volchara_core::primitives::{cuboid, plane};
use volchara_core::{Space, Transform};

/// Checkerboard resolution in texels.
const CHECKER_SIZE: u32 = 256;

/// Texels per checker square.
const CHECKER_CELL: u32 = 32;

/// Cube rotation speed in radians per second.
const SPIN_SPEED: f32 = 0.8;

/// Viewer settings parsed from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerParams {
    pub texture: Option<PathBuf>,
    pub shader_dir: PathBuf,
    pub target_fps: u32,
    pub vsync: bool,
}

impl Default for ViewerParams {
    fn default() -> Self {
        Self {
            texture: None,
            shader_dir: PathBuf::from("shaders"),
            target_fps: DEFAULT_TARGET_FPS,
            vsync: false,
        }
    }
}

impl ViewerParams {
    /// Parse viewer parameters from command line arguments.
    pub fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::parse(&args)
    }

    /// Parse `args`, skipping the program name. Unknown or malformed
    /// options are ignored.
    fn parse(args: &[String]) -> Self {
        let mut params = Self::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--texture" => {
                    if let Some(path) = args.get(i + 1) {
                        params.texture = Some(PathBuf::from(path));
                        i += 1;
                    }
                }
                "--shaders" => {
                    if let Some(dir) = args.get(i + 1) {
                        params.shader_dir = PathBuf::from(dir);
                        i += 1;
                    }
                }
                "--fps" => {
                    if let Some(Ok(v)) = args.get(i + 1).map(|s| s.parse()) {
                        params.target_fps = v;
                        i += 1;
                    }
                }
                "--vsync" => params.vsync = true,
                _ => {}
            }
            i += 1;
        }

        params
    }
}

/// Compiled shaders the engine needs that are absent from `dir`.
pub fn missing_shaders(dir: &Path) -> Vec<PathBuf> {
    [VERTEX_SHADER, FRAGMENT_SHADER]
        .into_iter()
        .map(|name| dir.join(name))
        .filter(|path| !path.is_file())
        .collect()
}

/// RGBA8 checkerboard used when no floor texture is given.
fn checkerboard(size: u32, cell: u32) -> Vec<u8> {
    let mut texels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / cell) + (y / cell)) % 2 == 0;
            let value = if light { 200 } else { 60 };
            texels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    texels
}

/// Viewer application state.
pub struct Viewer {
    cube: ObjectId,
}

impl App for Viewer {
    fn init(engine: &mut Engine) -> anyhow::Result<Self> {
        let params = ViewerParams::from_args();

        let floor_texture = match &params.texture {
            Some(path) => match engine.load_texture(path) {
                Ok(index) => index,
                Err(e) => {
                    warn!("Failed to load {}: {e}, using checkerboard", path.display());
                    engine.load_texture_rgba(
                        CHECKER_SIZE,
                        CHECKER_SIZE,
                        &checkerboard(CHECKER_SIZE, CHECKER_CELL),
                    )?
                }
            },
            None => engine.load_texture_rgba(
                CHECKER_SIZE,
                CHECKER_SIZE,
                &checkerboard(CHECKER_SIZE, CHECKER_CELL),
            )?,
        };

        // The plane faces +Z; lay it flat facing up.
        engine.add_object(
            Object::mesh(plane(10.0, 10.0, Vec3::ONE))
                .with_transform(
                    Transform::IDENTITY.with_rotation(Quat::from_rotation_x(-FRAC_PI_2)),
                )
                .with_texture(floor_texture),
        );

        let mut spinning = true;
        let mut space_was_down = false;
        let cube = engine.add_object(
            Object::mesh(cuboid(Vec3::ONE, Vec3::new(0.9, 0.35, 0.2)))
                .with_transform(Transform::from_translation(Vec3::new(0.0, 0.5, 0.0)))
                .on_frame(move |cube, input, _| {
                    let space_down = input.is_pressed(KeyCode::Space);
                    if space_down && !space_was_down {
                        spinning = !spinning;
                    }
                    space_was_down = space_down;

                    if spinning {
                        cube.transform.rotate_right(SPIN_SPEED * input.elapsed, Space::World);
                    }
                }),
        );

        // Small emissive marker above the cube.
        engine.add_object(
            Object::mesh(cuboid(Vec3::splat(0.2), Vec3::ONE))
                .with_transform(Transform::from_translation(Vec3::new(0.0, 1.6, 0.0)))
                .with_tint(Vec4::new(1.0, 0.9, 0.5, 1.0))
                .with_brightness(0.8),
        );

        let mut sun = Transform::from_translation(Vec3::new(3.0, 5.0, 2.0));
        sun.look_at(Vec3::ZERO, Vec3::Y);
        engine.add_object(
            Object::directional_light(Vec3::new(1.0, 0.95, 0.85), 1.0)
                .with_transform(sun)
                .on_frame(|_, input, commands| {
                    if input.is_pressed(KeyCode::Escape) {
                        commands.exit();
                    }
                }),
        );
        engine.set_ambient_light(Vec3::new(0.6, 0.7, 1.0), 0.15);

        let camera = engine.camera_mut();
        camera.transform = Transform::from_translation(Vec3::new(0.0, 2.0, 6.0));
        camera.look_at(Vec3::new(0.0, 0.5, 0.0));

        info!(
            "Viewer ready: {} objects, {} textures",
            engine.scene().len(),
            engine.texture_count()
        );

        Ok(Self { cube })
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        if let Some(cube) = engine.scene().get(self.cube) {
            info!(
                "Exiting after {} frames, cube at yaw {:.2}",
                engine.frame_count(),
                cube.transform.rotation.to_euler(glam::EulerRot::YXZ).0
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("volchara-viewer")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parse_defaults() {
        assert_eq!(ViewerParams::parse(&args(&[])), ViewerParams::default());
    }

    #[test]
    fn parse_all_options() {
        let params = ViewerParams::parse(&args(&[
            "--texture",
            "floor.png",
            "--shaders",
            "out/spv",
            "--fps",
            "0",
            "--vsync",
        ]));
        assert_eq!(params.texture, Some(PathBuf::from("floor.png")));
        assert_eq!(params.shader_dir, PathBuf::from("out/spv"));
        assert_eq!(params.target_fps, 0);
        assert!(params.vsync);
    }

    #[test]
    fn malformed_fps_is_ignored() {
        let params = ViewerParams::parse(&args(&["--fps", "fast", "--vsync"]));
        assert_eq!(params.target_fps, DEFAULT_TARGET_FPS);
        assert!(params.vsync);
    }

    #[test]
    fn missing_shaders_lists_absent_files() {
        let dir = std::env::temp_dir().join(format!("volchara-viewer-shaders-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        assert_eq!(
            missing_shaders(&dir),
            vec![dir.join(VERTEX_SHADER), dir.join(FRAGMENT_SHADER)]
        );

        std::fs::write(dir.join(VERTEX_SHADER), [0u8; 4]).unwrap();
        assert_eq!(missing_shaders(&dir), vec![dir.join(FRAGMENT_SHADER)]);

        std::fs::write(dir.join(FRAGMENT_SHADER), [0u8; 4]).unwrap();
        assert!(missing_shaders(&dir).is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn checkerboard_alternates() {
        let texels = checkerboard(4, 2);
        assert_eq!(texels.len(), 4 * 4 * 4);
        assert_eq!(texels[0], 200);
        // Texel (2, 0) starts the second cell.
        assert_eq!(texels[2 * 4], 60);
        // Texel (2, 2) is back to light.
        assert_eq!(texels[(2 * 4 + 2) * 4], 200);
    }
}
