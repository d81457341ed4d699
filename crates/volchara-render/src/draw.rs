//! Geometry packing and draw-list construction.
//!
//! All meshes share one vertex and one index buffer. Packing walks the
//! scene in insertion order, so the draw list built afterwards can address
//! each object's slice by summing index counts in the same order.

use volchara_core::{PushConstants, Vertex};

use crate::error::{RenderError, Result};
use crate::scene::Scene;

/// Whole-scene geometry ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedGeometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl PackedGeometry {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Concatenate every mesh, rebasing indices by a running vertex offset.
pub fn pack_geometry(scene: &Scene) -> PackedGeometry {
    let mut packed = PackedGeometry::default();

    for mesh in scene.iter().filter_map(|(_, object)| object.mesh_data()) {
        let base = u32::try_from(packed.vertices.len()).unwrap_or(u32::MAX);
        packed.vertices.extend_from_slice(mesh.vertices());
        packed
            .indices
            .extend(mesh.indices().iter().map(|&index| base + index));
    }
    packed
}

/// One indexed draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub push_constants: PushConstants,
    pub index_count: u32,
    pub first_index: u32,
}

/// Build the draws for the current scene.
///
/// Objects without geometry are skipped but their index slices are still
/// accounted for, so `first_index` always matches [`pack_geometry`].
pub fn build_draw_list(scene: &Scene, texture_count: u32) -> Result<Vec<DrawCall>> {
    let mut draws = Vec::with_capacity(scene.len());
    let mut first_index = 0u32;

    for (id, object) in scene.iter() {
        let Some(mesh) = object.mesh_data() else {
            continue;
        };
        let index_count = u32::try_from(mesh.indices().len()).unwrap_or(u32::MAX);

        if let Some(index) = object.texture() {
            if index >= texture_count {
                return Err(RenderError::InvalidTextureIndex {
                    object: id,
                    index,
                    loaded: texture_count,
                });
            }
        }

        if index_count > 0 {
            draws.push(DrawCall {
                push_constants: PushConstants::new(
                    object.transform.model_matrix(),
                    object.texture(),
                    object.tint(),
                    object.brightness(),
                ),
                index_count,
                first_index,
            });
        }
        first_index += index_count;
    }
    Ok(draws)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use glam::{Vec2, Vec3};
    use volchara_core::primitives;

    fn square() -> Object {
        let v = |x: f32, y: f32| Vertex::new(Vec3::new(x, y, 0.0), Vec3::Z, Vec3::ONE, Vec2::ZERO);
        Object::from_vertices(&[
            v(-1.0, -1.0),
            v(1.0, -1.0),
            v(1.0, 1.0),
            v(-1.0, -1.0),
            v(1.0, 1.0),
            v(-1.0, 1.0),
        ])
    }

    fn assert_indices_in_range(packed: &PackedGeometry) {
        let count = packed.vertices.len() as u32;
        assert!(packed.indices.iter().all(|&index| index < count));
    }

    #[test]
    fn single_square_packs_four_vertices() {
        let mut scene = Scene::new();
        scene.add(square());

        let packed = pack_geometry(&scene);
        assert_eq!(packed.vertices.len(), 4);
        assert_eq!(packed.indices.len(), 6);
        assert!(packed.indices.iter().all(|&index| index <= 3));
    }

    #[test]
    fn indices_stay_valid_across_add_and_remove() {
        let mut scene = Scene::new();
        let a = scene.add(square());
        let b = scene.add(Object::mesh(primitives::cuboid(Vec3::ONE, Vec3::ONE)));
        scene.add(Object::directional_light(Vec3::ONE, 1.0));
        assert_indices_in_range(&pack_geometry(&scene));

        scene.remove(a);
        assert_indices_in_range(&pack_geometry(&scene));

        scene.add(square());
        scene.add(square());
        scene.remove(b);
        let packed = pack_geometry(&scene);
        assert_indices_in_range(&packed);
        assert_eq!(packed.vertices.len(), 8);
        assert_eq!(packed.index_bytes().len(), 12 * 4);
    }

    #[test]
    fn first_index_is_running_sum() {
        let mut scene = Scene::new();
        scene.add(square());
        scene.add(Object::directional_light(Vec3::ONE, 1.0));
        scene.add(Object::mesh(primitives::cuboid(Vec3::ONE, Vec3::ONE)));
        scene.add(square());

        let draws = build_draw_list(&scene, 0).unwrap();
        assert_eq!(draws.len(), 3);
        assert_eq!(draws[0].first_index, 0);
        assert_eq!(draws[1].first_index, 6);
        assert_eq!(draws[2].first_index, 6 + draws[1].index_count);

        let total: u32 = draws.iter().map(|draw| draw.index_count).sum();
        assert_eq!(total as usize, pack_geometry(&scene).indices.len());
    }

    #[test]
    fn unloaded_texture_is_rejected() {
        let mut scene = Scene::new();
        let id = scene.add(square().with_texture(2));

        assert!(build_draw_list(&scene, 3).is_ok());
        match build_draw_list(&scene, 2) {
            Err(RenderError::InvalidTextureIndex {
                object,
                index,
                loaded,
            }) => {
                assert_eq!(object, id);
                assert_eq!(index, 2);
                assert_eq!(loaded, 2);
            }
            other => panic!("expected InvalidTextureIndex, got {other:?}"),
        }
    }

    #[test]
    fn untextured_objects_push_sentinel() {
        let mut scene = Scene::new();
        scene.add(square());
        let draws = build_draw_list(&scene, 0).unwrap();
        assert_eq!(
            draws[0].push_constants.texture_index,
            volchara_core::constants::UNTEXTURED
        );
    }
}
