//! Host-side mesh data.

use glam::{Vec2, Vec3, Vec4};
use tessera_rhi::vertex::Vertex;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |aabb, p| Self {
            min: aabb.min.min(p),
            max: aabb.max.max(p),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }
}

/// One drawable primitive: interleaved vertices, u32 indices and the
/// material it is drawn with.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: u32,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| v.position))
    }

    /// Axis-aligned cube of edge `size` centered on the origin, with
    /// per-face normals and UVs.
    pub fn cube(size: f32, material: u32) -> Self {
        let h = size * 0.5;
        // (normal, tangent, up) per face.
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, tangent, up) in faces {
            let base = vertices.len() as u32;
            let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
            for (u, v) in corners {
                let position = (normal + tangent * u + up * v) * h;
                vertices.push(Vertex::new(
                    position,
                    normal,
                    Vec2::new((u + 1.0) * 0.5, 1.0 - (v + 1.0) * 0.5),
                    tangent.extend(1.0),
                ));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self {
            name: "cube".to_string(),
            vertices,
            indices,
            material,
        }
    }

    /// Square in the XZ plane facing +Y, edge `size`.
    pub fn plane(size: f32, material: u32) -> Self {
        let h = size * 0.5;
        let corners = [(-h, h), (h, h), (h, -h), (-h, -h)];
        let vertices = corners
            .iter()
            .map(|&(x, z)| {
                Vertex::new(
                    Vec3::new(x, 0.0, z),
                    Vec3::Y,
                    Vec2::new(x / size + 0.5, z / size + 0.5),
                    Vec4::new(1.0, 0.0, 0.0, 1.0),
                )
            })
            .collect();

        Self {
            name: "plane".to_string(),
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
            material,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_topology() {
        let cube = MeshData::cube(2.0, 0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));

        let bounds = cube.bounds();
        assert!(bounds.min.abs_diff_eq(Vec3::splat(-1.0), 1e-6));
        assert!(bounds.max.abs_diff_eq(Vec3::splat(1.0), 1e-6));
    }

    #[test]
    fn test_cube_winding_faces_outward() {
        let cube = MeshData::cube(1.0, 0);
        for tri in cube.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|k| cube.vertices[tri[k] as usize].position);
            let face_normal = (b - a).cross(c - a).normalize();
            let vertex_normal = cube.vertices[tri[0] as usize].normal;
            assert!(face_normal.dot(vertex_normal) > 0.99);
        }
    }

    #[test]
    fn test_plane_faces_up() {
        let plane = MeshData::plane(4.0, 3);
        assert_eq!(plane.material, 3);
        let [a, b, c] = [0, 1, 2].map(|k| plane.vertices[plane.indices[k] as usize].position);
        assert!((b - a).cross(c - a).normalize().abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_empty_bounds() {
        assert!(Aabb::from_points([]).is_empty());
        let aabb = Aabb::from_points([Vec3::ZERO, Vec3::new(2.0, 4.0, 6.0)]);
        assert_eq!(aabb.center(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.extent(), Vec3::new(2.0, 4.0, 6.0));
    }
}
