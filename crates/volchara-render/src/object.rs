//! Scene objects and their per-frame callbacks.

use glam::{Vec2, Vec3, Vec4};
use hashbrown::HashSet;
use volchara_core::{DirectionalLightData, MeshData, Transform, Vertex};
use volchara_input::KeyCode;

use crate::scene::SceneCommands;

/// Handle to an object owned by a [`Scene`](crate::Scene).
///
/// Handles are generational: once an object is removed its handle never
/// resolves again, even if the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// What an object contributes to the frame.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// Indexed geometry drawn with the object's transform.
    Mesh(MeshData),
    /// Directional light shining along the object's forward axis.
    DirectionalLight { color: Vec3, brightness: f32 },
}

/// Snapshot handed to frame callbacks.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// Seconds since the previous simulated frame.
    pub elapsed: f32,
    pub pressed_keys: &'a HashSet<KeyCode>,
    pub cursor_delta: Vec2,
}

impl FrameInput<'_> {
    #[inline]
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }
}

/// Per-frame hook attached to an object.
pub type FrameCallback = Box<dyn FnMut(&mut Object, &FrameInput<'_>, &mut SceneCommands)>;

/// A drawable mesh or a light, with transform and appearance.
pub struct Object {
    kind: ObjectKind,
    pub transform: Transform,
    texture: Option<u32>,
    tint: Vec4,
    brightness: f32,
    pub(crate) callbacks: Vec<FrameCallback>,
    geometry_dirty: bool,
}

impl Object {
    fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            transform: Transform::IDENTITY,
            texture: None,
            tint: Vec4::ONE,
            brightness: 0.0,
            callbacks: Vec::new(),
            geometry_dirty: false,
        }
    }

    pub fn mesh(mesh: MeshData) -> Self {
        Self::new(ObjectKind::Mesh(mesh))
    }

    /// Build a mesh object from an unindexed triangle list, collapsing
    /// identical vertices.
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        Self::mesh(MeshData::from_unindexed(vertices))
    }

    pub fn directional_light(color: Vec3, brightness: f32) -> Self {
        Self::new(ObjectKind::DirectionalLight { color, brightness })
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_texture(mut self, index: u32) -> Self {
        self.texture = Some(index);
        self
    }

    #[must_use]
    pub fn with_tint(mut self, tint: Vec4) -> Self {
        self.tint = tint;
        self
    }

    #[must_use]
    pub fn with_brightness(mut self, brightness: f32) -> Self {
        self.brightness = brightness;
        self
    }

    /// Attach a callback run once per rendered frame.
    #[must_use]
    pub fn on_frame(
        mut self,
        callback: impl FnMut(&mut Self, &FrameInput<'_>, &mut SceneCommands) + 'static,
    ) -> Self {
        self.add_callback(callback);
        self
    }

    pub fn add_callback(
        &mut self,
        callback: impl FnMut(&mut Self, &FrameInput<'_>, &mut SceneCommands) + 'static,
    ) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Geometry, if this is a mesh.
    pub fn mesh_data(&self) -> Option<&MeshData> {
        match &self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            ObjectKind::DirectionalLight { .. } => None,
        }
    }

    /// Mutable geometry. Borrowing it schedules a geometry re-upload.
    pub fn mesh_data_mut(&mut self) -> Option<&mut MeshData> {
        match &mut self.kind {
            ObjectKind::Mesh(mesh) => {
                self.geometry_dirty = true;
                Some(mesh)
            }
            ObjectKind::DirectionalLight { .. } => None,
        }
    }

    /// Paint every vertex with `color`.
    pub fn set_vertex_color(&mut self, color: Vec3) {
        if let Some(mesh) = self.mesh_data_mut() {
            mesh.set_color(color);
        }
    }

    pub fn has_geometry(&self) -> bool {
        self.mesh_data().is_some_and(|mesh| !mesh.is_empty())
    }

    #[inline]
    pub fn texture(&self) -> Option<u32> {
        self.texture
    }

    pub fn set_texture(&mut self, index: Option<u32>) {
        self.texture = index;
    }

    #[inline]
    pub fn tint(&self) -> Vec4 {
        self.tint
    }

    pub fn set_tint(&mut self, tint: Vec4) {
        self.tint = tint;
    }

    #[inline]
    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn set_brightness(&mut self, brightness: f32) {
        self.brightness = brightness;
    }

    /// Light contribution, if this is a light.
    pub fn light_data(&self) -> Option<DirectionalLightData> {
        match self.kind {
            ObjectKind::DirectionalLight { color, brightness } => Some(DirectionalLightData::new(
                self.transform.forward(),
                color,
                brightness,
            )),
            ObjectKind::Mesh(_) => None,
        }
    }

    pub(crate) fn take_geometry_dirty(&mut self) -> bool {
        std::mem::take(&mut self.geometry_dirty)
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("kind", &self.kind)
            .field("transform", &self.transform)
            .field("texture", &self.texture)
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volchara_core::primitives;

    #[test]
    fn mesh_mutation_marks_geometry_dirty() {
        let mut object = Object::mesh(primitives::plane(1.0, 1.0, Vec3::ONE));
        assert!(!object.take_geometry_dirty());

        object.set_vertex_color(Vec3::X);
        assert!(object.take_geometry_dirty());
        assert!(!object.take_geometry_dirty());
        assert!(object
            .mesh_data()
            .unwrap()
            .vertices()
            .iter()
            .all(|v| v.color == Vec3::X));
    }

    #[test]
    fn lights_have_no_geometry() {
        let mut light = Object::directional_light(Vec3::ONE, 0.5);
        assert!(!light.has_geometry());
        assert!(light.mesh_data_mut().is_none());
        assert!(!light.take_geometry_dirty());

        let data = light.light_data().unwrap();
        assert_eq!(data.direction[..3], Vec3::NEG_Z.to_array());
    }

    #[test]
    fn square_from_vertices_is_deduplicated() {
        let v = |x: f32, y: f32| Vertex::new(Vec3::new(x, y, 0.0), Vec3::Z, Vec3::ONE, Vec2::ZERO);
        let object = Object::from_vertices(&[
            v(-1.0, -1.0),
            v(1.0, -1.0),
            v(1.0, 1.0),
            v(-1.0, -1.0),
            v(1.0, 1.0),
            v(-1.0, 1.0),
        ]);
        let mesh = object.mesh_data().unwrap();
        assert_eq!(mesh.vertices().len(), 4);
        assert!(mesh.indices().iter().all(|&i| i < 4));
    }
}
