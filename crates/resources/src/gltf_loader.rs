//! glTF 2.0 import into a [`SceneAsset`].
//!
//! - the default scene is imported, or every scene when none is marked
//!   default;
//! - each primitive becomes one [`MeshData`]; a node references all
//!   primitives of its mesh;
//! - materials are appended after a trailing default material used by
//!   primitives that declare none;
//! - images are converted to RGBA8 and tagged sRGB when any material uses
//!   them as color.

use std::collections::HashMap;
use std::path::Path;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use gltf::accessor::DataType;
use tessera_rhi::vertex::Vertex;
use tessera_scene::{
    AlphaMode, AnimationClip, Interpolation, KeyframeTrack, Keyframes, LocalTransform, MeshId,
    NodeId, SceneGraph, TrackProperty, Trs,
};
use tracing::{debug, info, warn};

use crate::asset::SceneAsset;
use crate::error::{ResourceError, ResourceResult};
use crate::image::ImageData;
use crate::material::{Material, MaterialTable, TextureChannel};
use crate::mesh::MeshData;

/// Imports a `.gltf` or `.glb` file and everything it references.
pub fn load_gltf(path: &Path) -> ResourceResult<SceneAsset> {
    let (document, buffers, images) = gltf::import(path).map_err(|source| ResourceError::Gltf {
        path: path.to_path_buf(),
        source,
    })?;
    let asset = build_asset(&document, &buffers, images)?;
    info!(
        "Loaded {:?}: {} nodes, {} meshes, {} materials, {} textures, {} animations, {} triangles",
        path,
        asset.graph.len(),
        asset.meshes.len(),
        asset.materials.len(),
        asset.textures.len(),
        asset.animations.len(),
        asset.triangle_count()
    );
    Ok(asset)
}

/// Imports a self-contained glTF (GLB, or JSON with data URIs) from memory.
pub fn load_gltf_slice(bytes: &[u8]) -> ResourceResult<SceneAsset> {
    let (document, buffers, images) =
        gltf::import_slice(bytes).map_err(|source| ResourceError::Gltf {
            path: "<memory>".into(),
            source,
        })?;
    build_asset(&document, &buffers, images)
}

fn build_asset(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    images: Vec<gltf::image::Data>,
) -> ResourceResult<SceneAsset> {
    let textures = load_textures(document, images)?;
    let materials = load_materials(document, textures.len() as u32);
    let default_material = (materials.len() - 1) as u32;

    // gltf mesh index -> MeshIds of its primitives
    let mut meshes = Vec::new();
    let mut primitive_ids: Vec<Vec<MeshId>> = Vec::with_capacity(document.meshes().len());
    for mesh in document.meshes() {
        let mut ids = Vec::new();
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!(
                    "Skipping {:?} primitive of mesh '{}'",
                    primitive.mode(),
                    mesh_name(&mesh)
                );
                continue;
            }
            ids.push(MeshId(meshes.len() as u32));
            meshes.push(load_primitive(&mesh, &primitive, buffers, default_material)?);
        }
        primitive_ids.push(ids);
    }

    let (graph, node_ids) = load_graph(document, &primitive_ids)?;
    let animations = load_animations(document, buffers, &node_ids);

    Ok(SceneAsset {
        graph,
        meshes,
        materials,
        textures,
        animations,
    })
}

fn mesh_name(mesh: &gltf::Mesh) -> String {
    mesh.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("mesh{}", mesh.index()))
}

/// One texture per glTF texture, in glTF order.
fn load_textures(
    document: &gltf::Document,
    images: Vec<gltf::image::Data>,
) -> ResourceResult<Vec<ImageData>> {
    let mut srgb_images = vec![false; images.len()];
    for material in document.materials() {
        let pbr = material.pbr_metallic_roughness();
        let color_textures = [
            pbr.base_color_texture().map(|info| info.texture()),
            material.emissive_texture().map(|info| info.texture()),
        ];
        for texture in color_textures.into_iter().flatten() {
            srgb_images[texture.source().index()] = true;
        }
    }

    let decoded: Vec<ImageData> = images
        .into_iter()
        .zip(srgb_images)
        .map(|(data, srgb)| {
            ImageData::from_gltf(data).map(|image| ImageData { srgb, ..image })
        })
        .collect::<ResourceResult<_>>()?;

    Ok(document
        .textures()
        .map(|texture| decoded[texture.source().index()].clone())
        .collect())
}

fn load_materials(document: &gltf::Document, texture_count: u32) -> MaterialTable {
    let mut table = MaterialTable::new(Vec::new(), texture_count);
    for material in document.materials() {
        let pbr = material.pbr_metallic_roughness();
        let mut textures = [None; TextureChannel::COUNT];
        textures[TextureChannel::BaseColor as usize] =
            pbr.base_color_texture().map(|t| t.texture().index() as u32);
        textures[TextureChannel::MetallicRoughness as usize] = pbr
            .metallic_roughness_texture()
            .map(|t| t.texture().index() as u32);
        textures[TextureChannel::Normal as usize] =
            material.normal_texture().map(|t| t.texture().index() as u32);
        textures[TextureChannel::Occlusion as usize] = material
            .occlusion_texture()
            .map(|t| t.texture().index() as u32);
        textures[TextureChannel::Emissive as usize] =
            material.emissive_texture().map(|t| t.texture().index() as u32);

        let alpha_mode = match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask,
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        };

        table.push(Material {
            name: material
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material{}", table.len())),
            base_color_factor: Vec4::from_array(pbr.base_color_factor()),
            metallic_factor: pbr.metallic_factor(),
            roughness_factor: pbr.roughness_factor(),
            emissive_factor: Vec3::from_array(material.emissive_factor()),
            textures,
            alpha_mode,
            alpha_cutoff: material.alpha_cutoff().unwrap_or(0.5),
            double_sided: material.double_sided(),
        });
    }
    table.push(Material::default());
    table
}

fn load_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    default_material: u32,
) -> ResourceResult<MeshData> {
    let name = mesh_name(mesh);
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .ok_or_else(|| ResourceError::MissingAttribute {
            mesh: name.clone(),
            attribute: "POSITION",
        })?
        .map(Vec3::from_array)
        .collect();
    let count = positions.len();

    let normals: Vec<Vec3> = match reader.read_normals() {
        Some(iter) => iter.map(Vec3::from_array).collect(),
        None => vec![Vec3::Z; count],
    };
    let tex_coords: Vec<Vec2> = match reader.read_tex_coords(0) {
        Some(iter) => iter.into_f32().map(Vec2::from_array).collect(),
        None => vec![Vec2::ZERO; count],
    };
    let tangents: Vec<Vec4> = match reader.read_tangents() {
        Some(iter) => iter.map(Vec4::from_array).collect(),
        None => vec![Vec4::new(1.0, 0.0, 0.0, 1.0); count],
    };

    let vertices = (0..count)
        .map(|i| {
            Vertex::new(
                positions[i],
                normals.get(i).copied().unwrap_or(Vec3::Z),
                tex_coords.get(i).copied().unwrap_or(Vec2::ZERO),
                tangents
                    .get(i)
                    .copied()
                    .unwrap_or(Vec4::new(1.0, 0.0, 0.0, 1.0)),
            )
        })
        .collect();

    let indices = match primitive.indices() {
        Some(accessor) => {
            let data_type = accessor.data_type();
            if !matches!(data_type, DataType::U8 | DataType::U16 | DataType::U32) {
                return Err(ResourceError::UnsupportedIndexFormat {
                    mesh: name,
                    data_type: format!("{:?}", data_type),
                });
            }
            reader
                .read_indices()
                .map(|indices| indices.into_u32().collect())
                .unwrap_or_default()
        }
        None => (0..count as u32).collect(),
    };

    Ok(MeshData {
        material: primitive
            .material()
            .index()
            .map_or(default_material, |index| index as u32),
        name,
        vertices,
        indices,
    })
}

fn local_transform(node: &gltf::Node) -> LocalTransform {
    match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => {
            LocalTransform::from_source(Some(Mat4::from_cols_array_2d(&matrix)), Trs::IDENTITY)
        }
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => LocalTransform::from_source(
            None,
            Trs {
                translation: Vec3::from_array(translation),
                rotation: Quat::from_array(rotation),
                scale: Vec3::from_array(scale),
            },
        ),
    }
}

/// Builds the scene graph. Returns the graph and a glTF-node-index to
/// [`NodeId`] map for animation targets.
fn load_graph(
    document: &gltf::Document,
    primitive_ids: &[Vec<MeshId>],
) -> ResourceResult<(SceneGraph, HashMap<usize, NodeId>)> {
    let scenes: Vec<gltf::Scene> = match document.default_scene() {
        Some(scene) => vec![scene],
        None => document.scenes().collect(),
    };

    let mut graph = SceneGraph::new();
    let mut node_ids = HashMap::new();
    for scene in scenes {
        debug!(
            "Importing scene '{}'",
            scene.name().unwrap_or("<unnamed>")
        );
        let mut stack: Vec<(gltf::Node, Option<NodeId>)> =
            scene.nodes().map(|node| (node, None)).collect();
        stack.reverse();

        while let Some((node, parent)) = stack.pop() {
            if node_ids.contains_key(&node.index()) {
                warn!("Node {} is referenced more than once; skipping", node.index());
                continue;
            }
            let name = node
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("node{}", node.index()));
            let id = graph.add_node(name, local_transform(&node), parent)?;
            node_ids.insert(node.index(), id);

            if let Some(mesh) = node.mesh() {
                for &mesh_id in &primitive_ids[mesh.index()] {
                    graph.attach_mesh(id, mesh_id)?;
                }
            }

            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev().map(|child| (child, Some(id))));
        }
    }
    Ok((graph, node_ids))
}

fn load_animations(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    node_ids: &HashMap<usize, NodeId>,
) -> Vec<AnimationClip> {
    use gltf::animation::util::ReadOutputs;

    let mut clips = Vec::new();
    for animation in document.animations() {
        let name = animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation{}", animation.index()));
        let mut tracks = Vec::new();

        for channel in animation.channels() {
            let Some(&target) = node_ids.get(&channel.target().node().index()) else {
                debug!("Animation '{}' targets a node outside the scene", name);
                continue;
            };
            let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|d| &d[..]));
            let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs())
            else {
                warn!("Animation '{}' has a channel without data", name);
                continue;
            };
            let times: Vec<f32> = inputs.collect();
            let interpolation = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Linear => Interpolation::Linear,
                gltf::animation::Interpolation::Step => Interpolation::Step,
                gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
            };

            let property = match outputs {
                ReadOutputs::Translations(values) => Keyframes::new(
                    times,
                    values.map(Vec3::from_array).collect(),
                    interpolation,
                )
                .map(TrackProperty::Translation),
                ReadOutputs::Rotations(values) => Keyframes::new(
                    times,
                    values.into_f32().map(Quat::from_array).collect(),
                    interpolation,
                )
                .map(TrackProperty::Rotation),
                ReadOutputs::Scales(values) => Keyframes::new(
                    times,
                    values.map(Vec3::from_array).collect(),
                    interpolation,
                )
                .map(TrackProperty::Scale),
                ReadOutputs::MorphTargetWeights(_) => {
                    debug!("Skipping morph target channel in '{}'", name);
                    continue;
                }
            };

            match property {
                Ok(property) => tracks.push(KeyframeTrack::new(target, property)),
                Err(e) => warn!("Dropping channel of '{}': {}", name, e),
            }
        }

        if !tracks.is_empty() {
            clips.push(AnimationClip::new(name, tracks));
        }
    }
    clips
}
