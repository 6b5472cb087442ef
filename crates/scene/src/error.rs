//! Scene error types.

use thiserror::Error;

use crate::graph::{MeshId, NodeId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),

    /// A mesh references a material the table does not contain.
    #[error("Mesh {mesh:?} on node {node:?} references missing material {material}")]
    MissingMaterial {
        node: NodeId,
        mesh: MeshId,
        material: u32,
    },

    #[error("Unknown mesh: {0:?}")]
    UnknownMesh(MeshId),

    #[error("Invalid keyframe track: {0}")]
    InvalidTrack(String),
}

pub type SceneResult<T> = std::result::Result<T, SceneError>;
