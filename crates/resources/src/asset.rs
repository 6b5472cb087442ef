//! A loaded scene: graph, meshes, materials, textures and animations.

use glam::{Quat, Vec3, Vec4};
use tessera_scene::{
    AlphaMode, AnimationClip, Interpolation, KeyframeTrack, Keyframes, LocalTransform,
    MaterialSource, MeshId, SceneGraph, Trs, TrackProperty,
};

use crate::error::ResourceResult;
use crate::image::ImageData;
use crate::material::{Material, MaterialTable};
use crate::mesh::{Aabb, MeshData};

/// Host-side scene ready for GPU upload. Mesh `i` is addressed by
/// `MeshId(i)`; textures are addressed by index into `textures`.
#[derive(Debug, Default)]
pub struct SceneAsset {
    pub graph: SceneGraph,
    pub meshes: Vec<MeshData>,
    pub materials: MaterialTable,
    pub textures: Vec<ImageData>,
    pub animations: Vec<AnimationClip>,
}

impl SceneAsset {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(MeshData::triangle_count).sum()
    }

    /// World-space bounds of every mesh instance.
    pub fn bounds(&self) -> Aabb {
        let globals = self.graph.global_transforms();
        let corners = self.graph.ids().flat_map(|id| {
            let world = globals.get(id).copied().unwrap_or_default();
            let node_meshes = self.graph.node(id).map(|n| n.meshes()).unwrap_or(&[]);
            node_meshes
                .iter()
                .filter_map(|mesh| self.meshes.get(mesh.index()))
                .flat_map(move |mesh| {
                    mesh.vertices
                        .iter()
                        .map(move |v| world.transform_point3(v.position))
                })
                .collect::<Vec<_>>()
        });
        Aabb::from_points(corners)
    }

    /// Built-in scene used when no model is configured: a floor, a spinning
    /// opaque cube and two translucent cubes at different depths.
    pub fn demo() -> ResourceResult<Self> {
        let mut materials = MaterialTable::new(Vec::new(), 0);
        let floor_material = materials.push(Material {
            name: "floor".to_string(),
            base_color_factor: Vec4::new(0.35, 0.35, 0.4, 1.0),
            roughness_factor: 0.9,
            metallic_factor: 0.0,
            ..Material::default()
        });
        let solid_material = materials.push(Material {
            name: "solid".to_string(),
            base_color_factor: Vec4::new(0.8, 0.3, 0.2, 1.0),
            roughness_factor: 0.4,
            metallic_factor: 0.1,
            ..Material::default()
        });
        let glass_material = materials.push(
            Material {
                name: "glass".to_string(),
                roughness_factor: 0.1,
                metallic_factor: 0.0,
                ..Material::default()
            }
            .with_base_color(Vec4::new(0.2, 0.5, 0.9, 0.4))
            .with_alpha_mode(AlphaMode::Blend),
        );

        let meshes = vec![
            MeshData::plane(20.0, floor_material),
            MeshData::cube(1.0, solid_material),
            MeshData::cube(1.0, glass_material),
        ];

        let mut graph = SceneGraph::new();
        let floor = graph.add_node("floor", LocalTransform::from_translation(Vec3::NEG_Y), None)?;
        graph.attach_mesh(floor, MeshId(0))?;

        let spinner = graph.add_node("spinner", Trs::IDENTITY, None)?;
        graph.attach_mesh(spinner, MeshId(1))?;

        for (name, offset) in [("glass_near", 1.5_f32), ("glass_far", -1.5)] {
            let glass = graph.add_node(
                name,
                LocalTransform::from_translation(Vec3::new(offset, 0.0, offset)),
                Some(spinner),
            )?;
            graph.attach_mesh(glass, MeshId(2))?;
        }

        let quarter_turns: Vec<Quat> = (0..=4)
            .map(|i| Quat::from_rotation_y(i as f32 * std::f32::consts::FRAC_PI_2))
            .collect();
        let spin = Keyframes::new(
            vec![0.0, 2.0, 4.0, 6.0, 8.0],
            quarter_turns,
            Interpolation::Linear,
        )?;
        let animations = vec![AnimationClip::new(
            "spin",
            vec![KeyframeTrack::new(spinner, TrackProperty::Rotation(spin))],
        )];

        Ok(Self {
            graph,
            meshes,
            materials,
            textures: Vec::new(),
            animations,
        })
    }
}

impl MaterialSource for SceneAsset {
    fn mesh_material(&self, mesh: MeshId) -> Option<u32> {
        self.meshes.get(mesh.index()).map(|mesh| mesh.material)
    }

    fn material_alpha(&self, material: u32) -> Option<(AlphaMode, f32)> {
        self.materials
            .get(material)
            .map(|m| (m.alpha_mode, m.base_alpha()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_scene::{DrawList, DrawListBuilder};

    #[test]
    fn test_demo_scene_has_both_buckets() {
        let asset = SceneAsset::demo().unwrap();
        assert_eq!(asset.graph.len(), 4);
        assert_eq!(asset.animations.len(), 1);

        let mut list = DrawList::new();
        DrawListBuilder::default()
            .build(&asset.graph, Vec3::new(0.0, 1.0, 6.0), &asset, &mut list)
            .unwrap();
        assert_eq!(list.opaque.len(), 2);
        assert_eq!(list.transparent.len(), 2);
        assert!(list.transparent[0].distance >= list.transparent[1].distance);
    }

    #[test]
    fn test_demo_animation_rotates_spinner() {
        let mut asset = SceneAsset::demo().unwrap();
        let spinner = asset.graph.find("spinner").unwrap();
        asset.animations[0].apply(2.0, &mut asset.graph).unwrap();
        let rotation = asset.graph.node(spinner).unwrap().local.trs().rotation;
        assert!(rotation.abs_diff_eq(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2), 1e-5));
    }

    #[test]
    fn test_bounds_cover_floor() {
        let asset = SceneAsset::demo().unwrap();
        let bounds = asset.bounds();
        assert!(bounds.min.x <= -10.0 && bounds.max.x >= 10.0);
        assert!((bounds.min.y + 1.0).abs() < 1e-5);
    }
}
