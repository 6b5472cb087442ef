//! Arena-backed scene graph.
//!
//! Nodes live in a flat `Vec` addressed by [`NodeId`]. Ownership runs
//! strictly parent to child through `children`; `parent` is a lookup-only
//! back-reference used for transform composition. A node can only be
//! attached to a parent that already exists, so the graph is acyclic by
//! construction.

use glam::Mat4;

use crate::error::{SceneError, SceneResult};
use crate::transform::LocalTransform;

/// Handle to a node in a [`SceneGraph`].
///
/// Ids are dense indices in insertion order and stay valid until
/// [`SceneGraph::clear`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Builds an id from its raw index. The id is not checked against any
    /// graph; lookups with an out-of-range id return
    /// [`SceneError::UnknownNode`].
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into the mesh table owned by the GPU scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

impl MeshId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node: a name, a local transform and the meshes drawn at it.
///
/// Topology fields are private so they can only change through
/// [`SceneGraph`], which keeps parent and child links consistent.
#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub local: LocalTransform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    meshes: Vec<MeshId>,
}

impl Node {
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn meshes(&self) -> &[MeshId] {
        &self.meshes
    }
}

/// Forest of transform nodes.
///
/// # Example
///
/// ```
/// use glam::{Mat4, Vec3};
/// use tessera_scene::{MeshId, SceneGraph};
///
/// # fn example() -> tessera_scene::SceneResult<()> {
/// let mut graph = SceneGraph::new();
/// let root = graph.add_node("root", Mat4::from_translation(Vec3::X), None)?;
/// let child = graph.add_node("child", Mat4::from_translation(Vec3::Y), Some(root))?;
/// graph.attach_mesh(child, MeshId(0))?;
///
/// let world = graph.global_transform(child)?;
/// assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 1.0, 0.0));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its id.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name, not required to be unique
    /// * `local` - Transform relative to the parent, as a matrix or TRS
    /// * `parent` - Existing parent node, or `None` for a new root
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownNode`] if `parent` is not in the graph.
    /// The graph is left unchanged.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        local: impl Into<LocalTransform>,
        parent: Option<NodeId>,
    ) -> SceneResult<NodeId> {
        if let Some(parent) = parent {
            self.check(parent)?;
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.into(),
            local: local.into(),
            parent,
            children: Vec::new(),
            meshes: Vec::new(),
        });

        match parent {
            Some(parent) => self.nodes[parent.index()].children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Attaches `mesh` to `node`. A node can carry several meshes, and the
    /// same mesh can be attached to several nodes.
    ///
    /// The mesh id is not checked here; an id with no loaded mesh fails
    /// when the frame is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownNode`] if `node` is not in the graph.
    pub fn attach_mesh(&mut self, node: NodeId, mesh: MeshId) -> SceneResult<()> {
        self.node_mut(node)?.meshes.push(mesh);
        Ok(())
    }

    /// Looks up a node.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownNode`] if `id` is not in the graph.
    pub fn node(&self, id: NodeId) -> SceneResult<&Node> {
        self.nodes.get(id.index()).ok_or(SceneError::UnknownNode(id))
    }

    /// Mutable lookup, used to edit a node's name or local transform.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownNode`] if `id` is not in the graph.
    pub fn node_mut(&mut self, id: NodeId) -> SceneResult<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or(SceneError::UnknownNode(id))
    }

    /// Nodes without a parent, in insertion order.
    #[inline]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Direct children of `id`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownNode`] if `id` is not in the graph.
    pub fn children(&self, id: NodeId) -> SceneResult<&[NodeId]> {
        Ok(self.node(id)?.children())
    }

    /// Parent of `id`, or `None` for a root.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownNode`] if `id` is not in the graph.
    pub fn parent(&self, id: NodeId) -> SceneResult<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node id, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Finds the first node with the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(|index| NodeId(index as u32))
    }

    /// World transform of `id`: the product of every ancestor's local
    /// matrix, root first, ending with the node's own.
    ///
    /// Walks the parent chain iteratively, so deep hierarchies cannot
    /// overflow the stack. Use [`global_transforms`](Self::global_transforms)
    /// when many nodes are needed.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownNode`] if `id` is not in the graph.
    pub fn global_transform(&self, id: NodeId) -> SceneResult<Mat4> {
        let mut matrix = self.node(id)?.local.matrix();
        let mut current = self.nodes[id.index()].parent;
        while let Some(parent) = current {
            let node = &self.nodes[parent.index()];
            matrix = node.local.matrix() * matrix;
            current = node.parent;
        }
        Ok(matrix)
    }

    /// World transforms of every node, computed in one top-down pass.
    pub fn global_transforms(&self) -> GlobalTransforms {
        let mut matrices = vec![Mat4::IDENTITY; self.nodes.len()];
        let mut stack: Vec<(NodeId, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|&root| (root, Mat4::IDENTITY))
            .collect();

        while let Some((id, parent_matrix)) = stack.pop() {
            let node = &self.nodes[id.index()];
            let world = parent_matrix * node.local.matrix();
            matrices[id.index()] = world;
            stack.extend(node.children.iter().rev().map(|&child| (child, world)));
        }

        GlobalTransforms { matrices }
    }

    /// Every node reachable from `root` (inclusive), in depth-first
    /// pre-order.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownNode`] if `root` is not in the graph.
    pub fn reachable_from(&self, root: NodeId) -> SceneResult<Vec<NodeId>> {
        self.check(root)?;
        let mut visited = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            visited.push(id);
            stack.extend(self.nodes[id.index()].children.iter().rev());
        }
        Ok(visited)
    }

    /// Total number of meshes attached to nodes reachable from `root`.
    pub fn mesh_count_from(&self, root: NodeId) -> SceneResult<usize> {
        Ok(self
            .reachable_from(root)?
            .into_iter()
            .map(|id| self.nodes[id.index()].meshes.len())
            .sum())
    }

    /// Drops every node. Mesh GPU resources are owned elsewhere and must be
    /// released by their owner.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    fn check(&self, id: NodeId) -> SceneResult<()> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(SceneError::UnknownNode(id))
        }
    }
}

/// Dense world-transform cache indexed by [`NodeId`].
#[derive(Clone, Debug, Default)]
pub struct GlobalTransforms {
    matrices: Vec<Mat4>,
}

impl GlobalTransforms {
    /// World matrix of `id`, or `None` if the node did not exist when the
    /// cache was built.
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Mat4> {
        self.matrices.get(id.index())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::transform::Trs;

    fn world_position(graph: &SceneGraph, id: NodeId) -> Vec3 {
        graph
            .global_transform(id)
            .unwrap()
            .transform_point3(Vec3::ZERO)
    }

    #[test]
    fn test_add_node_links_parent_and_child() {
        let mut graph = SceneGraph::new();
        let root = graph.add_node("root", Trs::IDENTITY, None).unwrap();
        let child = graph.add_node("child", Trs::IDENTITY, Some(root)).unwrap();

        assert_eq!(graph.roots(), &[root]);
        assert_eq!(graph.children(root).unwrap(), &[child]);
        assert_eq!(graph.parent(child).unwrap(), Some(root));
        assert_eq!(graph.parent(root).unwrap(), None);
        assert_eq!(graph.find("child"), Some(child));
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let mut graph = SceneGraph::new();
        let err = graph.add_node("orphan", Trs::IDENTITY, Some(NodeId(7)));
        assert_eq!(err, Err(SceneError::UnknownNode(NodeId(7))));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_world_translation_composes() {
        let mut graph = SceneGraph::new();
        let grandparent = graph
            .add_node("a", LocalTransform::from_translation(Vec3::X * 100.0), None)
            .unwrap();
        let parent = graph
            .add_node("b", LocalTransform::from_translation(Vec3::X * 10.0), Some(grandparent))
            .unwrap();
        let child = graph
            .add_node("c", LocalTransform::from_translation(Vec3::X), Some(parent))
            .unwrap();

        assert!(world_position(&graph, child).abs_diff_eq(Vec3::new(111.0, 0.0, 0.0), 1e-4));
    }

    #[test]
    fn test_world_with_parent_rotation_and_scale() {
        let mut graph = SceneGraph::new();
        let parent = graph
            .add_node(
                "parent",
                Trs::from_translation(Vec3::new(10.0, 0.0, 0.0))
                    .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
                    .with_scale(Vec3::splat(2.0)),
                None,
            )
            .unwrap();
        let child = graph
            .add_node("child", LocalTransform::from_translation(Vec3::X), Some(parent))
            .unwrap();

        // (1,0,0) scaled by 2, rotated 90 degrees about Y, offset by 10 on X.
        assert!(world_position(&graph, child).abs_diff_eq(Vec3::new(10.0, 0.0, -2.0), 1e-4));
    }

    #[test]
    fn test_global_transforms_match_ancestor_walk() {
        let mut graph = SceneGraph::new();
        let a = graph
            .add_node("a", LocalTransform::from_translation(Vec3::Y), None)
            .unwrap();
        let b = graph
            .add_node("b", Trs::IDENTITY.with_scale(Vec3::splat(3.0)), Some(a))
            .unwrap();
        graph
            .add_node("c", LocalTransform::from_translation(Vec3::Z), Some(b))
            .unwrap();
        graph
            .add_node("d", Mat4::from_rotation_x(0.5), None)
            .unwrap();

        let cache = graph.global_transforms();
        assert_eq!(cache.len(), graph.len());
        for id in graph.ids() {
            let walked = graph.global_transform(id).unwrap();
            assert!(cache.get(id).unwrap().abs_diff_eq(walked, 1e-5));
        }
    }

    #[test]
    fn test_reachable_from_excludes_other_trees() {
        let mut graph = SceneGraph::new();
        let a = graph.add_node("a", Trs::IDENTITY, None).unwrap();
        let b = graph.add_node("b", Trs::IDENTITY, Some(a)).unwrap();
        let c = graph.add_node("c", Trs::IDENTITY, Some(b)).unwrap();
        let other = graph.add_node("other", Trs::IDENTITY, None).unwrap();
        graph.attach_mesh(c, MeshId(0)).unwrap();
        graph.attach_mesh(other, MeshId(1)).unwrap();

        assert_eq!(graph.reachable_from(a).unwrap(), vec![a, b, c]);
        assert_eq!(graph.mesh_count_from(a).unwrap(), 1);
        assert_eq!(graph.mesh_count_from(other).unwrap(), 1);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut graph = SceneGraph::new();
        let mut parent = graph
            .add_node("0", LocalTransform::from_translation(Vec3::X), None)
            .unwrap();
        let root = parent;
        for i in 1..50_000 {
            parent = graph
                .add_node(i.to_string(), LocalTransform::from_translation(Vec3::X), Some(parent))
                .unwrap();
        }

        assert_eq!(graph.reachable_from(root).unwrap().len(), 50_000);
        let cache = graph.global_transforms();
        let tip = cache.get(parent).unwrap().transform_point3(Vec3::ZERO);
        assert!((tip.x - 50_000.0).abs() < 1.0);
    }

    #[test]
    fn test_clear() {
        let mut graph = SceneGraph::new();
        graph.add_node("a", Trs::IDENTITY, None).unwrap();
        graph.clear();
        assert!(graph.is_empty());
        assert!(graph.roots().is_empty());
    }
}
