//! Integration tests for graph flattening and draw ordering.

use std::collections::HashSet;

use glam::{Mat4, Quat, Vec3};
use tessera_scene::{
    AlphaMode, DrawItem, DrawItemCollector, DrawList, DrawListBuilder, DrawOrderPolicy,
    LocalTransform, MaterialSource, MeshId, NodeId, SceneGraph, Trs,
};

/// Mesh table mapping mesh index to material index, plus the material
/// alpha table.
struct Materials {
    mesh_materials: Vec<u32>,
    alphas: Vec<(AlphaMode, f32)>,
}

impl MaterialSource for Materials {
    fn mesh_material(&self, mesh: MeshId) -> Option<u32> {
        self.mesh_materials.get(mesh.index()).copied()
    }

    fn material_alpha(&self, material: u32) -> Option<(AlphaMode, f32)> {
        self.alphas.get(material as usize).copied()
    }
}

fn build(graph: &SceneGraph, camera: Vec3, materials: &Materials) -> DrawList {
    let mut list = DrawList::new();
    DrawListBuilder::default()
        .build(graph, camera, materials, &mut list)
        .expect("collection should succeed");
    list
}

/// Small deterministic generator so the property tests cover varied trees
/// without an external dependency.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn unit(&mut self) -> f32 {
        self.next() as f32 / (1u32 << 31) as f32
    }
}

/// Random forest: 3 roots, `count` nodes, 0..=2 meshes per node, a mix of
/// matrix and TRS locals.
fn random_scene(seed: u64, count: usize) -> (SceneGraph, Materials) {
    let mut rng = Lcg(seed);
    let mut graph = SceneGraph::new();
    let mut ids: Vec<NodeId> = Vec::new();
    let mut next_mesh = 0u32;

    for i in 0..count {
        let offset = Vec3::new(rng.unit() * 4.0 - 2.0, rng.unit() * 4.0 - 2.0, rng.unit() * 4.0 - 2.0);
        let local: LocalTransform = if rng.next() % 3 == 0 {
            Mat4::from_rotation_translation(Quat::from_rotation_z(rng.unit()), offset).into()
        } else {
            Trs::from_translation(offset)
                .with_rotation(Quat::from_rotation_y(rng.unit() * 3.0))
                .with_scale(Vec3::splat(0.5 + rng.unit()))
                .into()
        };
        let parent = if i < 3 {
            None
        } else {
            Some(ids[rng.next() as usize % ids.len()])
        };
        let id = graph.add_node(format!("n{i}"), local, parent).unwrap();
        for _ in 0..rng.next() % 3 {
            graph.attach_mesh(id, MeshId(next_mesh)).unwrap();
            next_mesh += 1;
        }
        ids.push(id);
    }

    let alphas = vec![
        (AlphaMode::Opaque, 1.0),
        (AlphaMode::Blend, 0.5),
        (AlphaMode::Mask, 0.3),
        (AlphaMode::Opaque, 0.4),
    ];
    let mesh_materials = (0..next_mesh).map(|_| rng.next() % 4).collect();
    (
        graph,
        Materials {
            mesh_materials,
            alphas,
        },
    )
}

#[test]
fn test_global_equals_parent_times_local() {
    for seed in 0..8 {
        let (graph, _) = random_scene(seed, 60);
        for id in graph.ids() {
            let node = graph.node(id).unwrap();
            let Some(parent) = node.parent() else {
                continue;
            };
            let expected = graph.global_transform(parent).unwrap() * node.local.matrix();
            let actual = graph.global_transform(id).unwrap();
            let magnitude = expected
                .to_cols_array()
                .iter()
                .fold(1.0_f32, |max, v| max.max(v.abs()));
            assert!(
                actual.abs_diff_eq(expected, 1e-4 * magnitude),
                "seed {seed}, node {id:?}"
            );
        }
    }
}

#[test]
fn test_item_count_matches_reachable_meshes() {
    for seed in 0..8 {
        let (graph, materials) = random_scene(seed, 80);

        let expected: usize = graph
            .roots()
            .iter()
            .map(|&root| graph.mesh_count_from(root).unwrap())
            .sum();
        assert_eq!(build(&graph, Vec3::ZERO, &materials).len(), expected);

        // A single subtree contributes only its own meshes.
        let root = graph.roots()[0];
        let mut items = Vec::new();
        DrawItemCollector::new()
            .collect(&graph, Some(root), Vec3::ZERO, &materials, &mut items)
            .unwrap();
        assert_eq!(items.len(), graph.mesh_count_from(root).unwrap());

        let pairs: HashSet<(NodeId, MeshId)> = items.iter().map(|i| (i.node, i.mesh)).collect();
        assert_eq!(pairs.len(), items.len(), "each pair visited exactly once");
    }
}

#[test]
fn test_unreachable_nodes_contribute_nothing() {
    let mut graph = SceneGraph::new();
    let a = graph.add_node("a", Trs::IDENTITY, None).unwrap();
    let b = graph.add_node("b", Trs::IDENTITY, None).unwrap();
    graph.attach_mesh(a, MeshId(0)).unwrap();
    graph.attach_mesh(b, MeshId(1)).unwrap();
    let materials = Materials {
        mesh_materials: vec![0, 0],
        alphas: vec![(AlphaMode::Opaque, 1.0)],
    };

    let mut items = Vec::new();
    DrawItemCollector::new()
        .collect(&graph, Some(b), Vec3::ZERO, &materials, &mut items)
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].node, b);
}

#[test]
fn test_transparent_bucket_is_back_to_front() {
    for seed in 0..8 {
        let (graph, materials) = random_scene(seed, 100);
        let camera = Vec3::new(1.0, 2.0, 3.0);
        let list = build(&graph, camera, &materials);

        assert!(list.transparent.iter().all(|item| item.transparent));
        assert!(list.opaque.iter().all(|item| !item.transparent));
        for pair in list.transparent.windows(2) {
            assert!(pair[0].distance >= pair[1].distance);
        }
    }
}

#[test]
fn test_collection_is_idempotent() {
    let (graph, materials) = random_scene(42, 120);
    let camera = Vec3::new(-1.0, 0.5, 6.0);
    let first = build(&graph, camera, &materials);
    let second = build(&graph, camera, &materials);

    let as_set = |items: &[DrawItem]| -> HashSet<(NodeId, MeshId)> {
        items.iter().map(|item| (item.node, item.mesh)).collect()
    };
    assert_eq!(as_set(&first.opaque), as_set(&second.opaque));
    assert_eq!(first.transparent, second.transparent);
}

#[test]
fn test_scenario_opaque_and_blend_split() {
    let mut graph = SceneGraph::new();
    let opaque = graph
        .add_node("mesh1", LocalTransform::from_translation(Vec3::new(0.0, 0.0, -5.0)), None)
        .unwrap();
    let blend = graph
        .add_node("mesh2", LocalTransform::from_translation(Vec3::new(0.0, 0.0, -2.0)), None)
        .unwrap();
    graph.attach_mesh(opaque, MeshId(0)).unwrap();
    graph.attach_mesh(blend, MeshId(1)).unwrap();
    let materials = Materials {
        mesh_materials: vec![0, 1],
        alphas: vec![(AlphaMode::Opaque, 1.0), (AlphaMode::Blend, 0.3)],
    };

    let list = build(&graph, Vec3::ZERO, &materials);

    assert_eq!(list.opaque.len(), 1);
    assert_eq!(list.opaque[0].mesh, MeshId(0));
    assert!((list.opaque[0].distance - 5.0).abs() < 1e-5);
    assert_eq!(list.transparent.len(), 1);
    assert_eq!(list.transparent[0].mesh, MeshId(1));
    assert!((list.transparent[0].distance - 2.0).abs() < 1e-5);
}

#[test]
fn test_scenario_three_transparent_sorted() {
    let mut graph = SceneGraph::new();
    for (mesh, distance) in [1.0_f32, 5.0, 3.0].into_iter().enumerate() {
        let node = graph
            .add_node(
                format!("glass{mesh}"),
                LocalTransform::from_translation(Vec3::new(distance, 0.0, 0.0)),
                None,
            )
            .unwrap();
        graph.attach_mesh(node, MeshId(mesh as u32)).unwrap();
    }
    let materials = Materials {
        mesh_materials: vec![0, 0, 0],
        alphas: vec![(AlphaMode::Opaque, 0.5)],
    };

    let list = build(&graph, Vec3::ZERO, &materials);

    assert!(list.opaque.is_empty());
    let distances: Vec<f32> = list.transparent.iter().map(|item| item.distance).collect();
    assert_eq!(distances, vec![5.0, 3.0, 1.0]);
}

#[test]
fn test_policy_without_opaque_sort_keeps_traversal_order() {
    let mut graph = SceneGraph::new();
    for mesh in [3u32, 1, 2] {
        let node = graph.add_node("n", Trs::IDENTITY, None).unwrap();
        graph.attach_mesh(node, MeshId(mesh)).unwrap();
    }
    let materials = Materials {
        mesh_materials: vec![0, 1, 2, 3],
        alphas: vec![(AlphaMode::Opaque, 1.0); 4],
    };

    let mut list = DrawList::new();
    DrawListBuilder::new(DrawOrderPolicy {
        sort_opaque_by_material: false,
    })
    .build(&graph, Vec3::ZERO, &materials, &mut list)
    .unwrap();
    let order: Vec<u32> = list.opaque.iter().map(|item| item.mesh.0).collect();
    assert_eq!(order, vec![3, 1, 2]);
}
