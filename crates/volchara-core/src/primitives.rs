//! Simple mesh generators.
//!
//! Triangles wind counter-clockwise when viewed from the side their normal
//! points to.

use crate::math::Transform;
use crate::vertex::{MeshData, Vertex};
use glam::{Mat3, Quat, Vec2, Vec3};

/// Quad corners in (u, v) order: top-left, bottom-left, bottom-right, top-right.
const QUAD_CORNERS: [(f32, f32); 4] = [(-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0), (1.0, 1.0)];
const QUAD_TEX_COORDS: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(1.0, 0.0),
];
/// Two triangles per quad, as corner indices into `QUAD_CORNERS`.
const QUAD_TRIANGLES: [usize; 6] = [0, 1, 2, 0, 2, 3];

/// Push one quad as six unindexed vertices.
fn push_quad(out: &mut Vec<Vertex>, center: Vec3, u: Vec3, v: Vec3, normal: Vec3, color: Vec3) {
    for corner in QUAD_TRIANGLES {
        let (su, sv) = QUAD_CORNERS[corner];
        out.push(Vertex::new(
            center + u * su + v * sv,
            normal,
            color,
            QUAD_TEX_COORDS[corner],
        ));
    }
}

/// Axis-aligned rectangle in the local XY plane facing +Z.
pub fn plane(width: f32, height: f32, color: Vec3) -> MeshData {
    let mut vertices = Vec::with_capacity(6);
    push_quad(
        &mut vertices,
        Vec3::ZERO,
        Vec3::X * (width / 2.0),
        Vec3::Y * (height / 2.0),
        Vec3::Z,
        color,
    );
    MeshData::from_unindexed(&vertices)
}

/// Rectangle spanning three world-space corners.
///
/// The fourth corner is inferred. The mesh is built around the local
/// origin; the returned transform places and orients it in the world.
pub fn plane_from_corners(
    top_left: Vec3,
    top_right: Vec3,
    bottom_right: Vec3,
    color: Vec3,
) -> (MeshData, Transform) {
    let bottom_left = top_left - (top_right - bottom_right);
    let across = top_right - top_left;
    let up = top_left - bottom_left;
    let center = bottom_left + across / 2.0 + up / 2.0;

    let x = across.normalize_or_zero();
    let y = up.normalize_or_zero();
    let rotation = Quat::from_mat3(&Mat3::from_cols(x, y, x.cross(y))).normalize();

    let mesh = plane(across.length(), up.length(), color);
    (
        mesh,
        Transform::from_translation(center).with_rotation(rotation),
    )
}

/// Box centered on the local origin.
pub fn cuboid(size: Vec3, color: Vec3) -> MeshData {
    let half = size / 2.0;
    // (normal, u, v) with u x v == normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let extent = |axis: Vec3| axis.abs().dot(half);
        push_quad(
            &mut vertices,
            normal * extent(normal),
            u * extent(u),
            v * extent(v),
            normal,
            color,
        );
    }
    MeshData::from_unindexed(&vertices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    fn winding_normal(mesh: &MeshData, triangle: usize) -> Vec3 {
        let tri = &mesh.triangles()[triangle];
        (tri[1].position - tri[0].position)
            .cross(tri[2].position - tri[0].position)
            .normalize()
    }

    #[test]
    fn plane_is_two_triangles_over_four_vertices() {
        let mesh = plane(2.0, 1.0, Vec3::ONE);
        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(mesh.indices().len(), 6);
        assert!(mesh.indices().iter().all(|&i| i < 4));
        assert_vec3_eq(winding_normal(&mesh, 0), Vec3::Z);
        assert_vec3_eq(winding_normal(&mesh, 1), Vec3::Z);
    }

    #[test]
    fn plane_from_corners_reproduces_corners() {
        let top_left = Vec3::new(-1.0, 1.0, -2.0);
        let top_right = Vec3::new(1.0, 1.0, -2.0);
        let bottom_right = Vec3::new(1.0, -1.0, -2.0);
        let (mesh, transform) = plane_from_corners(top_left, top_right, bottom_right, Vec3::ONE);

        let model = transform.model_matrix();
        let world: Vec<Vec3> = mesh
            .vertices()
            .iter()
            .map(|v| model.transform_point3(v.position))
            .collect();

        assert_vec3_eq(world[0], top_left);
        assert!(world
            .iter()
            .any(|p| p.abs_diff_eq(top_right, 1e-5)));
        assert!(world
            .iter()
            .any(|p| p.abs_diff_eq(bottom_right, 1e-5)));
        assert!(world
            .iter()
            .any(|p| p.abs_diff_eq(Vec3::new(-1.0, -1.0, -2.0), 1e-5)));
    }

    #[test]
    fn tilted_plane_normal_points_out_of_the_front() {
        // Floor quad seen from above
        let (_, transform) = plane_from_corners(
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::ONE,
        );
        assert_vec3_eq(transform.rotation * Vec3::Z, Vec3::Y);
    }

    #[test]
    fn cuboid_faces_point_outward() {
        let mesh = cuboid(Vec3::new(2.0, 4.0, 6.0), Vec3::ONE);
        assert_eq!(mesh.vertices().len(), 24);
        assert_eq!(mesh.indices().len(), 36);

        for (i, tri) in mesh.triangles().iter().enumerate() {
            let normal = winding_normal(&mesh, i);
            assert_vec3_eq(normal, tri[0].normal);
            let centroid = (tri[0].position + tri[1].position + tri[2].position) / 3.0;
            assert!(centroid.dot(normal) > 0.0);
        }
    }

    #[test]
    fn cuboid_spans_requested_size() {
        let mesh = cuboid(Vec3::new(2.0, 4.0, 6.0), Vec3::ONE);
        let max = mesh
            .vertices()
            .iter()
            .fold(Vec3::splat(f32::MIN), |acc, v| acc.max(v.position));
        assert_vec3_eq(max, Vec3::new(1.0, 2.0, 3.0));
    }
}
