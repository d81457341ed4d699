//! Vertex format and mesh data.

use crate::error::{Error, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use hashbrown::HashMap;

/// Vertex as consumed by the graphics pipeline.
///
/// Layout (44 bytes, one binding, per-vertex rate):
/// position @0, normal @12, color @24, texture coordinate @36.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
    pub tex_coord: Vec2,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, color: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            color,
            tex_coord,
        }
    }

    /// Bit pattern of every field, used as the deduplication key.
    ///
    /// Comparing bits keeps `-0.0` and `0.0` distinct and makes NaN hashable,
    /// so two vertices collapse only when they are byte-identical.
    fn key(&self) -> [u32; 11] {
        bytemuck::cast(*self)
    }
}

/// Indexed triangle list owned by a single object.
///
/// Every index addresses a position inside `vertices`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl MeshData {
    /// Build from an explicit vertex and index list.
    ///
    /// Fails if any index is out of range.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(Error::InvalidData(format!(
                "index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }
        Ok(Self { vertices, indices })
    }

    /// Build from an unindexed triangle list, collapsing identical vertices.
    pub fn from_unindexed(vertices: &[Vertex]) -> Self {
        let (vertices, indices) = deduplicate(vertices);
        Self { vertices, indices }
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Overwrite the color of every vertex.
    pub fn set_color(&mut self, color: Vec3) {
        for vertex in &mut self.vertices {
            vertex.color = color;
        }
    }

    /// Expand back into an unindexed triangle list.
    pub fn triangles(&self) -> Vec<[Vertex; 3]> {
        self.indices
            .chunks_exact(3)
            .map(|tri| {
                [
                    self.vertices[tri[0] as usize],
                    self.vertices[tri[1] as usize],
                    self.vertices[tri[2] as usize],
                ]
            })
            .collect()
    }
}

/// Collapse identical vertices, returning the unique vertices and an index
/// list that points every input vertex at its first occurrence.
///
/// Running it on already unique input returns the input unchanged with
/// sequential indices.
pub fn deduplicate(input: &[Vertex]) -> (Vec<Vertex>, Vec<u32>) {
    let mut first_seen: HashMap<[u32; 11], u32> = HashMap::with_capacity(input.len());
    let mut vertices = Vec::with_capacity(input.len());
    let mut indices = Vec::with_capacity(input.len());

    for vertex in input {
        let index = *first_seen.entry(vertex.key()).or_insert_with(|| {
            vertices.push(*vertex);
            (vertices.len() - 1) as u32
        });
        indices.push(index);
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32, y: f32) -> Vertex {
        Vertex::new(Vec3::new(x, y, 0.0), Vec3::Z, Vec3::ONE, Vec2::new(x, y))
    }

    fn square() -> Vec<Vertex> {
        vec![
            vertex(0.0, 1.0),
            vertex(1.0, 0.0),
            vertex(1.0, 1.0),
            vertex(0.0, 1.0),
            vertex(0.0, 0.0),
            vertex(1.0, 0.0),
        ]
    }

    #[test]
    fn vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 44);
        assert_eq!(std::mem::offset_of!(Vertex, position), 0);
        assert_eq!(std::mem::offset_of!(Vertex, normal), 12);
        assert_eq!(std::mem::offset_of!(Vertex, color), 24);
        assert_eq!(std::mem::offset_of!(Vertex, tex_coord), 36);
    }

    #[test]
    fn square_collapses_to_four_vertices() {
        let mesh = MeshData::from_unindexed(&square());
        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(mesh.indices(), &[0, 1, 2, 0, 3, 1]);
        assert!(mesh.indices().iter().all(|&i| i < 4));
    }

    #[test]
    fn deduplication_preserves_triangles() {
        let input = square();
        let mesh = MeshData::from_unindexed(&input);
        let expected: Vec<[Vertex; 3]> = input
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();
        assert_eq!(mesh.triangles(), expected);
    }

    #[test]
    fn deduplication_is_idempotent() {
        let (unique, _) = deduplicate(&square());
        let (again, indices) = deduplicate(&unique);
        assert_eq!(again, unique);
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn differing_attributes_are_kept_apart() {
        let a = vertex(0.0, 0.0);
        let mut b = a;
        b.color = Vec3::X;
        let mut c = a;
        c.normal = Vec3::NEG_Z;
        let (unique, indices) = deduplicate(&[a, b, c, a]);
        assert_eq!(unique.len(), 3);
        assert_eq!(indices, vec![0, 1, 2, 0]);
    }

    #[test]
    fn out_of_range_index_rejected() {
        let result = MeshData::new(vec![vertex(0.0, 0.0)], vec![0, 0, 1]);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn set_color_touches_every_vertex() {
        let mut mesh = MeshData::from_unindexed(&square());
        mesh.set_color(Vec3::new(0.5, 0.25, 1.0));
        assert!(mesh
            .vertices()
            .iter()
            .all(|v| v.color == Vec3::new(0.5, 0.25, 1.0)));
    }
}
