//! Object arena and per-frame simulation.

use bitflags::bitflags;
use glam::Vec3;
use volchara_core::LightingData;

use crate::camera::{Camera, FlyCamera};
use crate::object::{FrameInput, Object, ObjectId};

bitflags! {
    /// What changed since the GPU copy was last synchronized.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct SceneChanges: u8 {
        /// Objects with geometry were added, removed or mutated.
        const GEOMETRY = 1 << 0;
        /// The lighting buffer contents differ from the last upload.
        const LIGHTING = 1 << 1;
    }
}

/// Structural requests queued by frame callbacks.
///
/// Applied once every callback of the frame has run, so objects never
/// appear or vanish mid-iteration.
#[derive(Default)]
pub struct SceneCommands {
    exit: bool,
    spawn: Vec<Object>,
    despawn: Vec<ObjectId>,
}

impl SceneCommands {
    /// Stop the frame loop after this tick.
    pub fn exit(&mut self) {
        self.exit = true;
    }

    pub fn spawn(&mut self, object: Object) {
        self.spawn.push(object);
    }

    pub fn despawn(&mut self, id: ObjectId) {
        self.despawn.push(id);
    }

    pub fn exit_requested(&self) -> bool {
        self.exit
    }
}

/// Result of [`Scene::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameUpdate {
    pub exit: bool,
}

struct Slot {
    generation: u32,
    object: Option<Object>,
}

/// Objects addressed by generational handles, iterated in insertion order.
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: Vec<ObjectId>,
    pub camera: Camera,
    fly_camera: Option<FlyCamera>,
    ambient_color: Vec3,
    ambient_brightness: f32,
    changes: SceneChanges,
    uploaded_lighting: Option<LightingData>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            camera: Camera::default(),
            fly_camera: None,
            ambient_color: Vec3::ONE,
            ambient_brightness: 1.0,
            changes: SceneChanges::empty(),
            uploaded_lighting: None,
        }
    }

    pub fn add(&mut self, object: Object) -> ObjectId {
        if object.has_geometry() {
            self.changes |= SceneChanges::GEOMETRY;
        }

        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            ObjectId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 0,
                object: Some(object),
            });
            ObjectId {
                index,
                generation: 0,
            }
        };
        self.order.push(id);
        id
    }

    /// Remove an object. Stale handles return `None`.
    pub fn remove(&mut self, id: ObjectId) -> Option<Object> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let object = slot.object.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.order.retain(|&other| other != id);

        if object.has_geometry() {
            self.changes |= SceneChanges::GEOMETRY;
        }
        Some(object)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_mut())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> + '_ {
        self.order
            .iter()
            .filter_map(|&id| self.get(id).map(|object| (id, object)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn fly_camera(&self) -> Option<&FlyCamera> {
        self.fly_camera.as_ref()
    }

    /// Drive the camera from WASD/QE and mouse motion each frame.
    pub fn set_fly_camera(&mut self, controller: Option<FlyCamera>) {
        self.fly_camera = controller;
    }

    pub fn set_ambient_light(&mut self, color: Vec3, brightness: f32) {
        self.ambient_color = color;
        self.ambient_brightness = brightness;
    }

    /// Current lighting buffer contents and the number of lights that did
    /// not fit.
    pub fn lighting(&self) -> (LightingData, usize) {
        LightingData::new(
            self.ambient_color,
            self.ambient_brightness,
            self.iter().filter_map(|(_, object)| object.light_data()),
        )
    }

    /// Run one frame of simulation.
    ///
    /// Callbacks run in insertion order; each sees its own object mutably.
    /// Commands they queue are applied afterwards, then the fly camera
    /// moves.
    pub fn update(&mut self, input: &FrameInput<'_>) -> FrameUpdate {
        let mut commands = SceneCommands::default();

        for position in 0..self.order.len() {
            let id = self.order[position];
            let Some(object) = self.get_mut(id) else {
                continue;
            };
            if object.callbacks.is_empty() {
                continue;
            }
            let mut callbacks = std::mem::take(&mut object.callbacks);
            for callback in &mut callbacks {
                callback(&mut *object, input, &mut commands);
            }
            // Callbacks registered from inside a callback run next frame
            callbacks.append(&mut object.callbacks);
            object.callbacks = callbacks;
        }

        self.apply(commands.spawn, commands.despawn);

        if let Some(controller) = &self.fly_camera {
            controller.update(&mut self.camera.transform, input);
        }

        FrameUpdate {
            exit: commands.exit,
        }
    }

    fn apply(&mut self, spawn: Vec<Object>, despawn: Vec<ObjectId>) {
        for id in despawn {
            if self.remove(id).is_none() {
                tracing::debug!("Ignoring despawn of unknown object {:?}", id);
            }
        }
        for object in spawn {
            self.add(object);
        }
    }

    /// Flag changes so the next [`take_changes`](Self::take_changes)
    /// reports them again.
    ///
    /// Re-flagged lighting also forgets the last uploaded snapshot, so it
    /// stays reported until an upload succeeds.
    pub(crate) fn mark_changed(&mut self, changes: SceneChanges) {
        self.changes |= changes;
        if changes.contains(SceneChanges::LIGHTING) {
            self.uploaded_lighting = None;
        }
    }

    /// Collect and clear pending changes.
    ///
    /// Lighting is compared against what the previous call returned, so a
    /// caller must upload whenever [`SceneChanges::LIGHTING`] is reported,
    /// or hand the changes back through `mark_changed` if it cannot.
    pub fn take_changes(&mut self) -> SceneChanges {
        let mut changes = std::mem::take(&mut self.changes);

        for position in 0..self.order.len() {
            let id = self.order[position];
            if let Some(object) = self.get_mut(id) {
                if object.take_geometry_dirty() {
                    changes |= SceneChanges::GEOMETRY;
                }
            }
        }

        let (lighting, _) = self.lighting();
        if self.uploaded_lighting != Some(lighting) {
            self.uploaded_lighting = Some(lighting);
            changes |= SceneChanges::LIGHTING;
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use hashbrown::HashSet;
    use volchara_core::primitives;
    use volchara_input::KeyCode;

    fn quad() -> Object {
        Object::mesh(primitives::plane(1.0, 1.0, Vec3::ONE))
    }

    fn frame(keys: &HashSet<KeyCode>) -> FrameInput<'_> {
        FrameInput {
            elapsed: 1.0 / 60.0,
            pressed_keys: keys,
            cursor_delta: Vec2::ZERO,
        }
    }

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut scene = Scene::new();
        let first = scene.add(quad());
        assert!(scene.remove(first).is_some());

        let second = scene.add(quad());
        assert_eq!(first.index, second.index);
        assert!(scene.get(first).is_none());
        assert!(scene.remove(first).is_none());
        assert!(scene.get(second).is_some());
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut scene = Scene::new();
        let a = scene.add(quad());
        let b = scene.add(quad());
        let c = scene.add(quad());
        scene.remove(a);
        let d = scene.add(quad());

        let ids: Vec<ObjectId> = scene.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![b, c, d]);
    }

    #[test]
    fn structural_changes_flag_geometry() {
        let mut scene = Scene::new();
        let changes = scene.take_changes();
        assert!(!changes.contains(SceneChanges::GEOMETRY));
        assert!(changes.contains(SceneChanges::LIGHTING));

        let id = scene.add(quad());
        assert_eq!(scene.take_changes(), SceneChanges::GEOMETRY);
        assert_eq!(scene.take_changes(), SceneChanges::empty());

        scene.get_mut(id).unwrap().set_vertex_color(Vec3::X);
        assert_eq!(scene.take_changes(), SceneChanges::GEOMETRY);

        // Moving an object only changes its push constants
        scene.get_mut(id).unwrap().transform.translation = Vec3::ONE;
        assert_eq!(scene.take_changes(), SceneChanges::empty());
    }

    #[test]
    fn moving_a_light_flags_lighting() {
        let mut scene = Scene::new();
        let light = scene.add(Object::directional_light(Vec3::ONE, 1.0));
        scene.take_changes();

        scene
            .get_mut(light)
            .unwrap()
            .transform
            .rotate_up(0.5, volchara_core::Space::Local);
        assert_eq!(scene.take_changes(), SceneChanges::LIGHTING);

        scene.set_ambient_light(Vec3::ONE, 0.2);
        assert_eq!(scene.take_changes(), SceneChanges::LIGHTING);
    }

    #[test]
    fn callbacks_mutate_their_object() {
        let mut scene = Scene::new();
        let id = scene.add(quad().on_frame(|object, input, _| {
            object.transform.translation.x += input.elapsed;
        }));
        let keys = HashSet::new();
        scene.update(&frame(&keys));
        scene.update(&frame(&keys));

        let x = scene.get(id).unwrap().transform.translation.x;
        assert!((x - 2.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn exit_is_requested_on_key() {
        let mut scene = Scene::new();
        scene.add(quad().on_frame(|_, input, commands| {
            if input.is_pressed(KeyCode::Escape) {
                commands.exit();
            }
        }));

        let idle = HashSet::new();
        assert!(!scene.update(&frame(&idle)).exit);

        let escape: HashSet<KeyCode> = [KeyCode::Escape].into_iter().collect();
        assert!(scene.update(&frame(&escape)).exit);
    }

    #[test]
    fn spawn_and_despawn_apply_after_iteration() {
        let mut scene = Scene::new();
        let victim = scene.add(quad());
        let mut fired = false;
        scene.add(quad().on_frame(move |_, _, commands| {
            if !fired {
                fired = true;
                commands.despawn(victim);
                commands.spawn(quad());
                commands.spawn(quad());
            }
        }));
        scene.take_changes();

        let keys = HashSet::new();
        scene.update(&frame(&keys));
        assert_eq!(scene.len(), 3);
        assert!(!scene.contains(victim));
        assert!(scene.take_changes().contains(SceneChanges::GEOMETRY));

        scene.update(&frame(&keys));
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn lights_beyond_capacity_are_reported() {
        let mut scene = Scene::new();
        for _ in 0..volchara_core::constants::MAX_DIRECTIONAL_LIGHTS + 2 {
            scene.add(Object::directional_light(Vec3::ONE, 1.0));
        }
        let (data, dropped) = scene.lighting();
        assert_eq!(data.light_count as usize, volchara_core::constants::MAX_DIRECTIONAL_LIGHTS);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn handed_back_changes_are_reported_again() {
        let mut scene = Scene::new();
        scene.add(quad());
        scene.add(Object::directional_light(Vec3::ONE, 1.0));

        let first = scene.take_changes();
        assert_eq!(first, SceneChanges::GEOMETRY | SceneChanges::LIGHTING);

        scene.mark_changed(first);
        assert_eq!(scene.take_changes(), first);
        assert!(scene.take_changes().is_empty());
    }
}
