//! Scene graph, animation and draw-list construction.
//!
//! This crate is GPU-agnostic:
//! - arena scene graph with matrix-or-TRS local transforms
//! - keyframe animation of node TRS
//! - draw item collection, opaque/transparent bucketing and back-to-front sort
//! - camera, fly controller and lights

pub mod animation;
pub mod camera;
pub mod draw;
mod error;
pub mod graph;
pub mod light;
pub mod transform;

pub use animation::{
    AnimationClip, AnimationClock, Interpolation, KeyframeTrack, Keyframes, TrackProperty,
};
pub use camera::{Camera, FlyController, FlyInput, Projection};
pub use draw::{
    AlphaMode, DrawItem, DrawItemCollector, DrawList, DrawListBuilder, DrawOrderPolicy,
    MaterialSource, is_transparent,
};
pub use error::{SceneError, SceneResult};
pub use graph::{GlobalTransforms, MeshId, Node, NodeId, SceneGraph};
pub use light::{DirectionalLight, SceneLighting};
pub use transform::{LocalTransform, Trs};
