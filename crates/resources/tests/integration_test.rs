//! Integration tests for glTF import.

use std::path::Path;

use glam::{Mat4, Vec3};
use tessera_resources::{SceneAsset, TextureChannel, load_gltf, load_gltf_slice};
use tessera_scene::{AlphaMode, LocalTransform, MaterialSource, MeshId};

fn base64(bytes: &[u8]) -> String {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::new();
    for chunk in bytes.chunks(3) {
        let b = [chunk[0], *chunk.get(1).unwrap_or(&0), *chunk.get(2).unwrap_or(&0)];
        let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        for i in 0..4 {
            if i <= chunk.len() {
                out.push(TABLE[(n >> (18 - 6 * i) & 63) as usize] as char);
            } else {
                out.push('=');
            }
        }
    }
    out
}

/// One triangle used by two meshes. Node "parent" carries a matrix,
/// node "child" carries TRS and is animated; a third root node references
/// the same mesh with the blend material.
fn sample_gltf() -> Vec<u8> {
    let mut buffer = Vec::new();
    for p in [[0.0_f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        for c in p {
            buffer.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in [0u16, 1, 2] {
        buffer.extend_from_slice(&i.to_le_bytes());
    }
    buffer.extend_from_slice(&[0, 0]);
    // animation: times at offset 44, translations at offset 52
    for t in [0.0_f32, 1.0] {
        buffer.extend_from_slice(&t.to_le_bytes());
    }
    for p in [[0.0_f32, 0.0, 0.0], [0.0, 2.0, 0.0]] {
        for c in p {
            buffer.extend_from_slice(&c.to_le_bytes());
        }
    }

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "nodes": [0, 2] }} ],
  "nodes": [
    {{ "name": "parent", "matrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 5,0,0,1], "children": [1] }},
    {{ "name": "child", "translation": [0, 0, 2], "mesh": 0 }},
    {{ "name": "glass", "mesh": 1 }}
  ],
  "meshes": [
    {{ "primitives": [ {{ "attributes": {{ "POSITION": 0 }}, "indices": 1, "material": 0 }} ] }},
    {{ "primitives": [ {{ "attributes": {{ "POSITION": 0 }}, "material": 1 }} ] }}
  ],
  "materials": [
    {{ "name": "solid", "pbrMetallicRoughness": {{ "baseColorFactor": [1, 1, 1, 1] }} }},
    {{ "name": "glass", "alphaMode": "BLEND", "pbrMetallicRoughness": {{ "baseColorFactor": [1, 1, 1, 0.3] }} }}
  ],
  "animations": [ {{
    "name": "bob",
    "channels": [ {{ "sampler": 0, "target": {{ "node": 1, "path": "translation" }} }} ],
    "samplers": [ {{ "input": 2, "output": 3, "interpolation": "LINEAR" }} ]
  }} ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0,0,0], "max": [1,1,0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }},
    {{ "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0], "max": [1] }},
    {{ "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" }}
  ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }},
    {{ "buffer": 0, "byteOffset": 44, "byteLength": 8 }},
    {{ "buffer": 0, "byteOffset": 52, "byteLength": 24 }}
  ],
  "buffers": [ {{ "byteLength": {len}, "uri": "data:application/octet-stream;base64,{data}" }} ]
}}"#,
        len = buffer.len(),
        data = base64(&buffer),
    );
    json.into_bytes()
}

fn load_sample() -> SceneAsset {
    load_gltf_slice(&sample_gltf()).expect("sample glTF should import")
}

#[test]
fn test_base64_helper() {
    assert_eq!(base64(b"Man"), "TWFu");
    assert_eq!(base64(b"Ma"), "TWE=");
    assert_eq!(base64(b"M"), "TQ==");
}

#[test]
fn test_import_graph_and_transforms() {
    let asset = load_sample();
    assert_eq!(asset.graph.len(), 3);
    assert_eq!(asset.graph.roots().len(), 2);

    let parent = asset.graph.find("parent").unwrap();
    let child = asset.graph.find("child").unwrap();
    assert!(matches!(
        asset.graph.node(parent).unwrap().local,
        LocalTransform::Matrix(_)
    ));
    assert_eq!(asset.graph.parent(child).unwrap(), Some(parent));

    let world = asset.graph.global_transform(child).unwrap();
    assert!(world.abs_diff_eq(Mat4::from_translation(Vec3::new(5.0, 0.0, 2.0)), 1e-6));
}

#[test]
fn test_import_meshes_and_defaults() {
    let asset = load_sample();
    assert_eq!(asset.meshes.len(), 2);

    let indexed = &asset.meshes[0];
    assert_eq!(indexed.indices, vec![0, 1, 2]);
    assert_eq!(indexed.vertices[1].position, Vec3::X);
    // Missing attributes take their defaults.
    assert_eq!(indexed.vertices[0].normal, Vec3::Z);
    assert_eq!(indexed.vertices[0].tangent.w, 1.0);

    // Non-indexed primitive gets sequential indices.
    assert_eq!(asset.meshes[1].indices, vec![0, 1, 2]);
}

#[test]
fn test_import_materials() {
    let asset = load_sample();
    // Two declared materials plus the trailing default.
    assert_eq!(asset.materials.len(), 3);
    assert_eq!(asset.material_alpha(1), Some((AlphaMode::Blend, 0.3)));
    assert_eq!(asset.mesh_material(MeshId(1)), Some(1));

    let solid = asset.materials.get(0).unwrap();
    assert_eq!(
        asset
            .materials
            .resolve_texture(solid, TextureChannel::BaseColor),
        asset.materials.default_texture_index()
    );
}

#[test]
fn test_import_animation() {
    let mut asset = load_sample();
    assert_eq!(asset.animations.len(), 1);
    let clip = &asset.animations[0];
    assert_eq!(clip.name, "bob");
    assert_eq!((clip.start, clip.end), (0.0, 1.0));
    assert_eq!(clip.duration(), 1.0);

    let child = asset.graph.find("child").unwrap();
    let clip = clip.clone();
    clip.apply(0.5, &mut asset.graph).unwrap();
    let translation = asset.graph.node(child).unwrap().local.translation();
    assert!(translation.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-6));
}

#[test]
fn test_missing_file_is_gltf_error() {
    let result = load_gltf(Path::new("does/not/exist.gltf"));
    assert!(result.is_err());
}

#[test]
fn test_load_model_from_disk() {
    let model_path = Path::new("../../assets/models/scene.gltf");

    // Skip test if file doesn't exist (CI environment may not have assets)
    if !model_path.exists() {
        println!("Skipping test: model file not found at {:?}", model_path);
        return;
    }

    let asset = load_gltf(model_path).expect("Failed to load glTF model");
    assert!(!asset.meshes.is_empty(), "Model should have at least one mesh");
    for (i, mesh) in asset.meshes.iter().enumerate() {
        assert!(!mesh.vertices.is_empty(), "Mesh {} should have vertices", i);
        assert!(
            mesh.indices.iter().all(|&index| (index as usize) < mesh.vertices.len()),
            "Mesh {} has out-of-range indices",
            i
        );
    }
    let bounds = asset.bounds();
    assert!(!bounds.is_empty());
}
