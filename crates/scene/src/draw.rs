//! Per-frame draw list construction.
//!
//! [`DrawItemCollector`] flattens the graph into one [`DrawItem`] per
//! reachable (node, mesh) pair. [`DrawOrderPolicy`] splits the items into
//! opaque and transparent buckets and sorts the transparent bucket
//! back-to-front for blending.

use std::cmp::Ordering;

use glam::{Mat4, Vec3};

use crate::error::{SceneError, SceneResult};
use crate::graph::{MeshId, NodeId, SceneGraph};

/// glTF alpha mode. Materials that never declare one are `Opaque`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    /// Alpha-tested against a cutoff; drawn with the opaque pipeline.
    Mask,
    Blend,
}

/// Material lookups the collector needs.
pub trait MaterialSource {
    /// Material index used by `mesh`, or `None` if the mesh is unknown.
    fn mesh_material(&self, mesh: MeshId) -> Option<u32>;

    /// Alpha mode and base-color alpha of `material`, or `None` if the
    /// table has no such material.
    fn material_alpha(&self, material: u32) -> Option<(AlphaMode, f32)>;
}

/// Transparency rule: `Blend` is transparent, `Mask` is opaque, and
/// anything else is transparent only when its base-color alpha is below 1.
///
/// The alpha fallback keeps materials without an explicit mode blending
/// when they carry a translucent base color.
// TODO: fold the alpha fallback into the loader by promoting such
// materials to `Blend`, leaving the mode as the single rule.
pub fn is_transparent(mode: AlphaMode, base_alpha: f32) -> bool {
    match mode {
        AlphaMode::Blend => true,
        AlphaMode::Mask => false,
        AlphaMode::Opaque => base_alpha < 1.0,
    }
}

/// One draw of one mesh. Rebuilt every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    /// Node the mesh is attached to.
    pub node: NodeId,
    pub mesh: MeshId,
    /// Material index resolved from the mesh.
    pub material: u32,
    /// World transform of `node` at collection time.
    pub model: Mat4,
    /// Distance from the node's world-space origin to the camera.
    pub distance: f32,
    /// Whether the item goes to the blend pipeline. See [`is_transparent`].
    pub transparent: bool,
}

/// Opaque and transparent buckets, reused across frames.
#[derive(Debug, Default, Clone)]
pub struct DrawList {
    pub opaque: Vec<DrawItem>,
    pub transparent: Vec<DrawItem>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties both buckets, keeping their capacity.
    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
    }

    /// Total items across both buckets.
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }
}

/// Iterative depth-first flattener. Holds its traversal stack between
/// frames to avoid reallocating.
#[derive(Debug, Default)]
pub struct DrawItemCollector {
    stack: Vec<(NodeId, Mat4)>,
}

impl DrawItemCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one item per (node, mesh) pair reachable from `root`, or
    /// from every root of the graph when `root` is `None`.
    ///
    /// A subtree root that has a parent starts from the parent's world
    /// transform, so its items carry the same matrices as in a full pass.
    ///
    /// # Arguments
    ///
    /// * `graph` - Scene to traverse
    /// * `root` - Subtree to collect, or `None` for the whole forest
    /// * `camera_position` - World-space eye position for `distance`
    /// * `materials` - Mesh-to-material and alpha lookups
    /// * `out` - Destination; existing contents are kept
    ///
    /// # Errors
    ///
    /// - [`SceneError::UnknownNode`] if `root` is not in the graph
    /// - [`SceneError::UnknownMesh`] if a node carries a mesh `materials`
    ///   does not know
    /// - [`SceneError::MissingMaterial`] if a mesh names a material that
    ///   does not exist
    ///
    /// Items pushed before the error stay in `out`.
    pub fn collect<M: MaterialSource + ?Sized>(
        &mut self,
        graph: &SceneGraph,
        root: Option<NodeId>,
        camera_position: Vec3,
        materials: &M,
        out: &mut Vec<DrawItem>,
    ) -> SceneResult<()> {
        self.stack.clear();
        match root {
            Some(root) => {
                let parent_world = match graph.parent(root)? {
                    Some(parent) => graph.global_transform(parent)?,
                    None => Mat4::IDENTITY,
                };
                self.stack.push((root, parent_world));
            }
            None => self
                .stack
                .extend(graph.roots().iter().rev().map(|&id| (id, Mat4::IDENTITY))),
        }

        while let Some((id, parent_world)) = self.stack.pop() {
            let node = graph.node(id)?;
            let model = parent_world * node.local.matrix();

            if !node.meshes().is_empty() {
                let distance = model.w_axis.truncate().distance(camera_position);
                for &mesh in node.meshes() {
                    let material = materials
                        .mesh_material(mesh)
                        .ok_or(SceneError::UnknownMesh(mesh))?;
                    let (mode, alpha) = materials.material_alpha(material).ok_or(
                        SceneError::MissingMaterial {
                            node: id,
                            mesh,
                            material,
                        },
                    )?;
                    out.push(DrawItem {
                        node: id,
                        mesh,
                        material,
                        model,
                        distance,
                        transparent: is_transparent(mode, alpha),
                    });
                }
            }

            self.stack
                .extend(node.children().iter().rev().map(|&child| (child, model)));
        }
        Ok(())
    }
}

/// Bucketing and ordering rules.
#[derive(Debug, Clone, Copy)]
pub struct DrawOrderPolicy {
    /// Group opaque items by material so consecutive draws share bindings.
    pub sort_opaque_by_material: bool,
}

impl Default for DrawOrderPolicy {
    fn default() -> Self {
        Self {
            sort_opaque_by_material: true,
        }
    }
}

impl DrawOrderPolicy {
    /// Replaces the contents of `list` with `items`, partitioned and
    /// ordered. Transparent items end up farthest first; ties keep
    /// collection order.
    pub fn order(&self, items: impl IntoIterator<Item = DrawItem>, list: &mut DrawList) {
        list.clear();
        for item in items {
            if item.transparent {
                list.transparent.push(item);
            } else {
                list.opaque.push(item);
            }
        }

        list.transparent.sort_by(back_to_front);
        if self.sort_opaque_by_material {
            list.opaque.sort_by_key(|item| item.material);
        }
    }
}

/// Descending camera distance.
pub fn back_to_front(a: &DrawItem, b: &DrawItem) -> Ordering {
    b.distance.total_cmp(&a.distance)
}

/// Collector, policy and scratch storage bundled for the render loop.
///
/// # Example
///
/// ```
/// use glam::{Mat4, Vec3};
/// use tessera_scene::{AlphaMode, DrawList, DrawListBuilder, MaterialSource, MeshId, SceneGraph};
///
/// struct OneMaterial;
///
/// impl MaterialSource for OneMaterial {
///     fn mesh_material(&self, _mesh: MeshId) -> Option<u32> {
///         Some(0)
///     }
///
///     fn material_alpha(&self, _material: u32) -> Option<(AlphaMode, f32)> {
///         Some((AlphaMode::Blend, 0.5))
///     }
/// }
///
/// # fn example() -> tessera_scene::SceneResult<()> {
/// let mut graph = SceneGraph::new();
/// for z in [-1.0, -5.0] {
///     let node = graph.add_node("quad", Mat4::from_translation(Vec3::Z * z), None)?;
///     graph.attach_mesh(node, MeshId(0))?;
/// }
///
/// let mut builder = DrawListBuilder::default();
/// let mut list = DrawList::new();
/// builder.build(&graph, Vec3::ZERO, &OneMaterial, &mut list)?;
///
/// assert!(list.opaque.is_empty());
/// assert_eq!(list.transparent[0].distance, 5.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct DrawListBuilder {
    collector: DrawItemCollector,
    policy: DrawOrderPolicy,
    items: Vec<DrawItem>,
}

impl DrawListBuilder {
    /// Creates a builder with a custom ordering policy.
    pub fn new(policy: DrawOrderPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Rebuilds `list` for the whole graph as seen from `camera_position`.
    ///
    /// `list` is cleared even on error and its capacity is reused, so
    /// calling this every frame does not allocate once the scene is warm.
    ///
    /// # Errors
    ///
    /// Same as [`DrawItemCollector::collect`]. On error `list` is left
    /// empty.
    pub fn build<M: MaterialSource + ?Sized>(
        &mut self,
        graph: &SceneGraph,
        camera_position: Vec3,
        materials: &M,
        list: &mut DrawList,
    ) -> SceneResult<()> {
        self.items.clear();
        list.clear();
        self.collector
            .collect(graph, None, camera_position, materials, &mut self.items)?;
        self.policy.order(self.items.drain(..), list);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::LocalTransform;

    /// Mesh `i` uses material `i`; materials are given as (mode, alpha).
    struct Table(Vec<(AlphaMode, f32)>);

    impl MaterialSource for Table {
        fn mesh_material(&self, mesh: MeshId) -> Option<u32> {
            Some(mesh.0)
        }

        fn material_alpha(&self, material: u32) -> Option<(AlphaMode, f32)> {
            self.0.get(material as usize).copied()
        }
    }

    fn mesh_at(graph: &mut SceneGraph, z: f32, mesh: u32) -> NodeId {
        let node = graph
            .add_node(
                format!("mesh{mesh}"),
                LocalTransform::from_translation(Vec3::new(0.0, 0.0, z)),
                None,
            )
            .unwrap();
        graph.attach_mesh(node, MeshId(mesh)).unwrap();
        node
    }

    #[test]
    fn test_builder_empties_list_on_error() {
        let mut graph = SceneGraph::new();
        mesh_at(&mut graph, -1.0, 0);
        let table = Table(vec![(AlphaMode::Opaque, 1.0)]);
        let mut builder = DrawListBuilder::default();
        let mut list = DrawList::new();

        builder.build(&graph, Vec3::ZERO, &table, &mut list).unwrap();
        assert_eq!(list.len(), 1);

        // Mesh 1 names material 1, which the table lacks.
        mesh_at(&mut graph, -2.0, 1);
        let err = builder.build(&graph, Vec3::ZERO, &table, &mut list);
        assert!(matches!(err, Err(SceneError::MissingMaterial { material: 1, .. })));
        assert!(list.is_empty());
    }

    #[test]
    fn test_classification_rules() {
        assert!(is_transparent(AlphaMode::Blend, 1.0));
        assert!(!is_transparent(AlphaMode::Mask, 0.2));
        assert!(is_transparent(AlphaMode::Opaque, 0.5));
        assert!(!is_transparent(AlphaMode::Opaque, 1.0));
    }

    #[test]
    fn test_collect_carries_world_transform_and_distance() {
        let mut graph = SceneGraph::new();
        let parent = graph
            .add_node("p", LocalTransform::from_translation(Vec3::X * 3.0), None)
            .unwrap();
        let child = graph
            .add_node("c", LocalTransform::from_translation(Vec3::Y * 4.0), Some(parent))
            .unwrap();
        graph.attach_mesh(child, MeshId(0)).unwrap();

        let mut items = Vec::new();
        DrawItemCollector::new()
            .collect(
                &graph,
                None,
                Vec3::ZERO,
                &Table(vec![(AlphaMode::Opaque, 1.0)]),
                &mut items,
            )
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].node, child);
        assert!((items[0].distance - 5.0).abs() < 1e-5);
        assert_eq!(items[0].model.w_axis.truncate(), Vec3::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn test_collect_from_subtree_root_uses_ancestors() {
        let mut graph = SceneGraph::new();
        let top = graph
            .add_node("top", LocalTransform::from_translation(Vec3::Z * 10.0), None)
            .unwrap();
        let mid = graph.add_node("mid", LocalTransform::default(), Some(top)).unwrap();
        graph.attach_mesh(mid, MeshId(0)).unwrap();
        graph.attach_mesh(top, MeshId(0)).unwrap();

        let mut items = Vec::new();
        DrawItemCollector::new()
            .collect(
                &graph,
                Some(mid),
                Vec3::ZERO,
                &Table(vec![(AlphaMode::Opaque, 1.0)]),
                &mut items,
            )
            .unwrap();

        assert_eq!(items.len(), 1);
        assert!((items[0].distance - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_missing_material_is_an_error() {
        let mut graph = SceneGraph::new();
        let node = mesh_at(&mut graph, 1.0, 3);

        let mut items = Vec::new();
        let err = DrawItemCollector::new()
            .collect(&graph, None, Vec3::ZERO, &Table(vec![]), &mut items)
            .unwrap_err();
        assert_eq!(
            err,
            SceneError::MissingMaterial {
                node,
                mesh: MeshId(3),
                material: 3
            }
        );
    }

    #[test]
    fn test_equal_distances_keep_collection_order() {
        let mut graph = SceneGraph::new();
        for mesh in 0..4 {
            mesh_at(&mut graph, 2.0, mesh);
        }
        let table = Table(vec![(AlphaMode::Blend, 0.5); 4]);

        let mut list = DrawList::new();
        DrawListBuilder::default()
            .build(&graph, Vec3::ZERO, &table, &mut list)
            .unwrap();

        let order: Vec<u32> = list.transparent.iter().map(|item| item.mesh.0).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_opaque_grouped_by_material() {
        let mut graph = SceneGraph::new();
        let table = Table(vec![(AlphaMode::Opaque, 1.0); 3]);
        for mesh in [2, 0, 1, 0, 2] {
            mesh_at(&mut graph, 1.0, mesh);
        }

        let mut list = DrawList::new();
        DrawListBuilder::default()
            .build(&graph, Vec3::ZERO, &table, &mut list)
            .unwrap();
        let materials: Vec<u32> = list.opaque.iter().map(|item| item.material).collect();
        assert_eq!(materials, vec![0, 0, 1, 2, 2]);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut list = DrawList::new();
        list.transparent.reserve(16);
        let capacity = list.transparent.capacity();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.transparent.capacity(), capacity);
    }
}
