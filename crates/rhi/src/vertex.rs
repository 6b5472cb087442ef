//! Mesh vertex layout.

use std::mem::{offset_of, size_of};

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Interleaved mesh vertex as consumed by the mesh shaders.
///
/// | location | field | format |
/// |---|---|---|
/// | 0 | position | `R32G32B32_SFLOAT` |
/// | 1 | normal | `R32G32B32_SFLOAT` |
/// | 2 | tex_coord | `R32G32_SFLOAT` |
/// | 3 | tangent | `R32G32B32A32_SFLOAT` (w = handedness) |
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub tangent: Vec4,
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            tex_coord: Vec2::ZERO,
            tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
        }
    }
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, tex_coord: Vec2, tangent: Vec4) -> Self {
        Self {
            position,
            normal,
            tex_coord,
            tangent,
        }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        let attribute = |location, format, offset: usize| vk::VertexInputAttributeDescription {
            binding: 0,
            location,
            format,
            offset: offset as u32,
        };
        [
            attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
            attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
            attribute(2, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, tex_coord)),
            attribute(3, vk::Format::R32G32B32A32_SFLOAT, offset_of!(Vertex, tangent)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(size_of::<Vertex>(), 48);
        assert_eq!(Vertex::binding_description().stride, 48);

        let offsets: Vec<u32> = Vertex::attribute_descriptions()
            .iter()
            .map(|attr| attr.offset)
            .collect();
        assert_eq!(offsets, vec![0, 12, 24, 32]);
    }

    #[test]
    fn test_vertex_locations_are_sequential() {
        for (i, attr) in Vertex::attribute_descriptions().iter().enumerate() {
            assert_eq!(attr.location, i as u32);
            assert_eq!(attr.binding, 0);
        }
    }

    #[test]
    fn test_default_vertex_has_valid_frame() {
        let vertex = Vertex::default();
        assert_eq!(vertex.normal, Vec3::Z);
        assert_eq!(vertex.tangent.w, 1.0);
        assert_eq!(bytemuck::bytes_of(&vertex).len(), 48);
    }
}
